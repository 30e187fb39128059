//! Knowledge-base client: UDP transport, serialized request dispatcher,
//! session state.
//!
//! The pieces fit together like this: a [`UdpTransport`] moves framed
//! datagrams to and from the daemon, a [`RequestManager`] feeds it one
//! command at a time from a FIFO queue (retrying on timeout, advancing on
//! any decoded reply), and a [`Session`] collects what the handlers
//! decode so a renderer can snapshot it.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use dispatcher::{
    DispatcherConfig, HandlerRegistry, RequestHandle, RequestManager, ResponseHandler,
    StatusSink, TickOutcome,
};
pub use error::{ClientError, ClientResult};
pub use graph::TopologyGraph;
pub use session::{Session, SessionState};
pub use transport::{Transport, TrafficObserver, UdpTransport};
