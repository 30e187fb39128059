//! Per-window session state.
//!
//! The original visualization kept the current topology, location table
//! and statistics in page globals; here they live in one explicit
//! [`Session`] shared between the dispatcher's handlers and whatever
//! renders the data. Handlers update it, renderers snapshot it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use pathviz_protocol::{
    Command, CommandKind, EndpointsReply, LocationMap, PathStats, ResourceEntry, ResponsePayload,
    TopologyLink,
};

use crate::dispatcher::{HandlerRegistry, ResponseHandler, StatusSink};

/// Everything the knowledge base has told us so far.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// AS-level topology links.
    pub topology: Vec<TopologyLink>,
    /// ISD-AS to country code.
    pub locations: LocationMap,
    /// Resources the daemon tracks, newest LIST reply.
    pub resources: Vec<ResourceEntry>,
    /// Path statistics keyed by resource name.
    pub stats: HashMap<String, PathStats>,
    /// Allowed ISDs; `Some(vec![])` means explicitly "all allowed".
    pub whitelist: Option<Vec<u16>>,
    /// Monitored connection endpoints.
    pub endpoints: Option<EndpointsReply>,
    /// STATUS field of the last mutating command's reply.
    pub last_status: Option<String>,
    /// Current status-line error, if any.
    pub last_error: Option<String>,
    /// When any reply last updated this state.
    pub updated: Option<DateTime<Utc>>,
}

/// Shared handle to one session's state.
#[derive(Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the current state out for rendering.
    pub fn snapshot(&self) -> SessionState {
        self.read().clone()
    }

    /// Current status-line error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    /// Registers a session-updating handler for every command kind.
    pub fn register_handlers(&self, registry: &mut HandlerRegistry) {
        for kind in [
            CommandKind::Lookup,
            CommandKind::List,
            CommandKind::Topology,
            CommandKind::Locations,
            CommandKind::SetIsdWhitelist,
            CommandKind::GetIsdWhitelist,
            CommandKind::GetIsdEndpoints,
            CommandKind::ClearStats,
        ] {
            registry.register(
                kind,
                Box::new(SessionHandler {
                    state: Arc::clone(&self.state),
                }),
            );
        }
    }

    /// A status sink writing the dispatcher's status line into this
    /// session.
    pub fn status_sink(&self) -> Box<dyn StatusSink> {
        Box::new(SessionStatusSink {
            state: Arc::clone(&self.state),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct SessionHandler {
    state: Arc<RwLock<SessionState>>,
}

impl ResponseHandler for SessionHandler {
    fn handle(&mut self, request: &Command, payload: &ResponsePayload) -> bool {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let accepted = match payload {
            ResponsePayload::Topology(links) => {
                state.topology = links.clone();
                true
            }
            ResponsePayload::Locations(map) => {
                state.locations = map.clone();
                true
            }
            ResponsePayload::PathStats(stats) => {
                // Parallel arrays must line up, and only a LOOKUP tells us
                // which resource these numbers belong to.
                if !stats.is_consistent() {
                    return false;
                }
                let Command::Lookup { res_name, .. } = request else {
                    return false;
                };
                state.stats.insert(res_name.clone(), stats.clone());
                true
            }
            ResponsePayload::Resources(entries) => {
                state.resources = entries.clone();
                true
            }
            ResponsePayload::Whitelist(isds) => {
                state.whitelist = Some(isds.clone());
                true
            }
            ResponsePayload::Status(status) => {
                // An error STATUS is still a well-shaped reply
                state.last_status = Some(status.status.clone());
                true
            }
            ResponsePayload::Endpoints(endpoints) => {
                state.endpoints = Some(*endpoints);
                true
            }
        };

        if accepted {
            state.updated = Some(Utc::now());
        }
        accepted
    }
}

struct SessionStatusSink {
    state: Arc<RwLock<SessionState>>,
}

impl StatusSink for SessionStatusSink {
    fn set_error(&mut self, message: &str) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.last_error = Some(message.to_string());
    }

    fn clear(&mut self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.last_error = None;
    }
}
