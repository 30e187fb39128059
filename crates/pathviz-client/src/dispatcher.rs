//! Serialized request dispatcher.
//!
//! The knowledge-base protocol has no request ids: replies are matched to
//! requests purely by order. The dispatcher therefore enforces
//! at-most-one-outstanding-request over the transport — a command is sent,
//! its reply (or a timeout) is fully processed, and only then may the next
//! command go out.
//!
//! Lifecycle of one command:
//!
//! ```text
//! enqueued -> sent -> decoded -> dispatched          (leaves the queue)
//!                  -> decode/shape failure -> reported (leaves the queue)
//!                  -> timeout -> reported, stays at the head, resent next tick
//! ```
//!
//! Only true timeouts retry; a reply that arrives but fails to decode
//! advances the queue, on the grounds that resending would produce the
//! same malformed answer again.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, trace, warn};

use pathviz_protocol::{
    Command, CommandEnvelope, CommandKind, ResponsePayload, decode_frame, decode_response,
    encode_command,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::Transport;

/// Consumes decoded replies for one command kind.
///
/// Returns whether the payload matched expectations; `false` is surfaced
/// as a malformed-response condition but never retried.
pub trait ResponseHandler: Send {
    fn handle(&mut self, request: &Command, payload: &ResponsePayload) -> bool;
}

/// Routing table from command kind to its handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandKind, Box<dyn ResponseHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one for the same kind.
    pub fn register(&mut self, kind: CommandKind, handler: Box<dyn ResponseHandler>) {
        self.handlers.insert(kind, handler);
    }

    fn get_mut(&mut self, kind: CommandKind) -> Option<&mut Box<dyn ResponseHandler>> {
        self.handlers.get_mut(&kind)
    }
}

/// Single status line for user-visible error conditions.
///
/// The dispatcher sets it on timeouts and malformed replies and clears it
/// on the next successful dispatch; errors never stop the polling loop.
pub trait StatusSink: Send {
    fn set_error(&mut self, message: &str);
    fn clear(&mut self);
}

/// Status sink that only logs.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn set_error(&mut self, message: &str) {
        warn!(status = message, "knowledge base error");
    }

    fn clear(&mut self) {}
}

/// Dispatcher timing and retry settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How long to wait for a reply before reporting a timeout.
    pub reply_timeout: Duration,
    /// Queue polling interval; a timed-out command is resent on the next
    /// tick, so this is also the retry cadence.
    pub poll_interval: Duration,
    /// Give up on a command after this many timeouts; `None` retries
    /// forever.
    pub max_retries: Option<u32>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(1500),
            poll_interval: Duration::from_millis(250),
            max_retries: None,
        }
    }
}

impl From<&ClientConfig> for DispatcherConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            reply_timeout: config.reply_timeout(),
            poll_interval: config.poll_interval(),
            max_retries: config.requests.max_retries,
        }
    }
}

/// What one tick of the dispatcher did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Queue empty (or a request already in flight).
    Idle,
    /// Reply decoded and accepted by its handler.
    Dispatched(CommandKind),
    /// Reply arrived but could not be decoded (corrupt frame, bad JSON or
    /// wrong shape); the command was reported and removed.
    DecodeFailed(CommandKind),
    /// Reply decoded but the handler rejected its shape; reported, removed.
    ShapeMismatch(CommandKind),
    /// Reply decoded but no handler is registered for the command.
    Unhandled(CommandKind),
    /// No reply within the timeout window; the command stays at the head
    /// and will be resent.
    TimedOut(CommandKind),
    /// Retry budget exhausted; the command was reported and removed.
    GaveUp(CommandKind),
}

struct PendingRequest {
    command: Command,
    kind: CommandKind,
    /// Pre-built frame; retries resend these exact bytes.
    frame: Vec<u8>,
    timeouts: u32,
}

/// Cloneable handle for enqueueing commands while the manager runs.
#[derive(Clone)]
pub struct RequestHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RequestHandle {
    /// Appends a command to the manager's queue.
    pub fn enqueue(&self, command: Command) -> ClientResult<()> {
        self.tx.send(command).map_err(|_| ClientError::ManagerStopped)
    }
}

/// Owns the pending queue, the in-flight lock and the handler table.
pub struct RequestManager<T: Transport> {
    transport: T,
    config: DispatcherConfig,
    queue: VecDeque<PendingRequest>,
    in_flight: bool,
    handlers: HandlerRegistry,
    status: Box<dyn StatusSink>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl<T: Transport> RequestManager<T> {
    /// Creates a manager with the log-only status sink.
    pub fn new(
        transport: T,
        handlers: HandlerRegistry,
        config: DispatcherConfig,
    ) -> (Self, RequestHandle) {
        Self::with_status(transport, handlers, config, Box::new(LogStatusSink))
    }

    /// Creates a manager reporting user-visible errors to `status`.
    pub fn with_status(
        transport: T,
        handlers: HandlerRegistry,
        config: DispatcherConfig,
        status: Box<dyn StatusSink>,
    ) -> (Self, RequestHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            transport,
            config,
            queue: VecDeque::new(),
            in_flight: false,
            handlers,
            status,
            rx,
        };
        (manager, RequestHandle { tx })
    }

    /// Appends a command to the queue; its frame is built once, up front,
    /// so every resend is byte-identical.
    pub fn enqueue(&mut self, command: Command) -> ClientResult<()> {
        let frame = encode_command(&CommandEnvelope::new(command.clone()))?;
        debug!(command = %command.kind(), pending = self.queue.len() + 1, "command enqueued");
        self.queue.push_back(PendingRequest {
            kind: command.kind(),
            command,
            frame,
            timeouts: 0,
        });
        Ok(())
    }

    /// Number of commands waiting for a reply.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True while a request has been sent and neither its reply nor its
    /// timeout has been processed.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Kind of the command currently at the queue head.
    pub fn head_kind(&self) -> Option<CommandKind> {
        self.queue.front().map(|p| p.kind)
    }

    /// Drops all queued commands, returning how many were discarded.
    ///
    /// Disconnecting the transport does not do this implicitly; a caller
    /// tearing down a connection clears the queue itself.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// The underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Processes at most one command: sends the queue head and waits for
    /// its reply or timeout. Does nothing if a request is already in
    /// flight or the queue is empty.
    ///
    /// Transport errors (`NoAddress`, `NotConnected`, IO) propagate to the
    /// caller after the in-flight lock is released; everything in the
    /// protocol's failure taxonomy is handled internally.
    pub async fn tick(&mut self) -> ClientResult<TickOutcome> {
        if self.in_flight || self.queue.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        self.in_flight = true;
        let outcome = self.send_and_await().await;
        // Release the lock on every path, errors included
        self.in_flight = false;
        outcome
    }

    async fn send_and_await(&mut self) -> ClientResult<TickOutcome> {
        // A reply that arrived after its round timed out would otherwise be
        // matched to the wrong command; remove it before sending.
        let stale = self.transport.drain();
        if stale > 0 {
            warn!(stale, "discarded stale replies before send");
        }

        let head = self.queue.front().expect("queue checked non-empty");
        let kind = head.kind;
        trace!(command = %kind, attempt = head.timeouts + 1, "sending request");
        self.transport.send(&head.frame).await?;

        match timeout(self.config.reply_timeout, self.transport.recv()).await {
            Ok(Ok(datagram)) => Ok(self.complete(&datagram)),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Ok(self.on_timeout()),
        }
    }

    /// Decodes a reply against the queue head and routes it. The head
    /// leaves the queue whatever the decode outcome; only timeouts retry.
    fn complete(&mut self, datagram: &[u8]) -> TickOutcome {
        let head = self
            .queue
            .pop_front()
            .expect("reply matched against non-empty queue");

        let decoded =
            decode_frame(datagram).and_then(|payload| decode_response(head.kind, payload));

        let payload = match decoded {
            Ok(payload) => payload,
            Err(err) => {
                warn!(command = %head.kind, error = %err, "response decode failed");
                self.status
                    .set_error(&format!("malformed response for command {}: {}", head.kind, err));
                return TickOutcome::DecodeFailed(head.kind);
            }
        };

        match self.handlers.get_mut(head.kind) {
            Some(handler) => {
                if handler.handle(&head.command, &payload) {
                    trace!(command = %head.kind, "response dispatched");
                    self.status.clear();
                    TickOutcome::Dispatched(head.kind)
                } else {
                    warn!(command = %head.kind, "handler rejected response shape");
                    self.status
                        .set_error(&format!("malformed response for command {}", head.kind));
                    TickOutcome::ShapeMismatch(head.kind)
                }
            }
            None => {
                warn!(command = %head.kind, "no handler registered, response dropped");
                TickOutcome::Unhandled(head.kind)
            }
        }
    }

    /// Reports a timeout. The command stays at the queue head so the next
    /// free tick resends it, unless its retry budget is exhausted.
    fn on_timeout(&mut self) -> TickOutcome {
        let head = self.queue.front_mut().expect("timeout with empty queue");
        head.timeouts += 1;
        let kind = head.kind;
        let timeouts = head.timeouts;
        warn!(command = %kind, timeouts, "knowledge base response timeout");

        if let Some(max) = self.config.max_retries
            && timeouts > max
        {
            self.queue.pop_front();
            self.status
                .set_error(&format!("no response for command {kind} after {max} retries"));
            return TickOutcome::GaveUp(kind);
        }

        self.status.set_error("knowledge base response timeout");
        TickOutcome::TimedOut(kind)
    }

    /// Runs the polling loop until every handle is dropped and the queue
    /// is empty.
    pub async fn run(&mut self) -> ClientResult<()> {
        // A cancelled run can leave the flag set mid-tick; no reply
        // matching survives cancellation (stale datagrams are drained
        // before the next send), so the lock is safe to release here.
        self.in_flight = false;

        let mut ticker = interval(self.config.poll_interval);
        let mut inbox_open = true;

        loop {
            tokio::select! {
                received = self.rx.recv(), if inbox_open => match received {
                    Some(command) => self.enqueue(command)?,
                    None => inbox_open = false,
                },
                _ = ticker.tick() => {
                    self.tick().await?;
                    if !inbox_open && self.queue.is_empty() {
                        debug!("queue drained, request manager stopping");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs the polling loop until the shutdown future completes.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> ClientResult<()> {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                debug!("shutdown signal received");
                Ok(())
            }
        }
    }
}
