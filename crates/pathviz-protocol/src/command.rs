//! Request commands understood by the knowledge-base daemon.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Versioned envelope wrapping every request.
///
/// The daemon expects the `version` field alongside the command fields in
/// one flat JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Protocol version (always "0.1" for this version).
    pub version: String,
    /// The command and its arguments.
    #[serde(flatten)]
    pub command: Command,
}

impl CommandEnvelope {
    /// Wraps a command with the current protocol version.
    pub fn new(command: Command) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            command,
        }
    }

    /// Checks whether this envelope carries a version we speak.
    pub fn is_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

/// Commands that can be sent to the knowledge-base daemon.
///
/// The wire representation is a flat JSON object tagged by the `command`
/// field, e.g. `{"command": "LOOKUP", "req_type": "GET", "res_name": "/x"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    /// Path statistics for one proxied resource.
    #[serde(rename = "LOOKUP")]
    Lookup {
        /// HTTP method of the resource ("GET", "POST", "CONNECT", ...).
        req_type: String,
        /// Resource name (path or host:port).
        res_name: String,
        /// Connection id, when the daemon tracks multiple connections per
        /// resource.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conn_id: Option<u32>,
    },

    /// List of resources the daemon has statistics for.
    #[serde(rename = "LIST")]
    List,

    /// Current AS-level topology links.
    #[serde(rename = "TOPO")]
    Topology,

    /// ISD-AS to country-code location table.
    #[serde(rename = "LOCATIONS")]
    Locations,

    /// Restrict path selection to the given ISDs.
    #[serde(rename = "ISD_WHITELIST")]
    SetIsdWhitelist {
        /// ISD identifiers; empty means "all allowed".
        isds: Vec<u16>,
    },

    /// Read back the current ISD whitelist.
    #[serde(rename = "GET_ISD_WHITELIST")]
    GetIsdWhitelist,

    /// Source and target endpoints of the monitored connection.
    #[serde(rename = "GET_ISD_ENDPOINTS")]
    GetIsdEndpoints,

    /// Drop all accumulated statistics. Older daemons send `CLEAR`.
    #[serde(rename = "LIST_CLEAR", alias = "CLEAR")]
    ClearStats,
}

impl Command {
    /// Creates a LOOKUP command without a connection id.
    pub fn lookup(req_type: impl Into<String>, res_name: impl Into<String>) -> Self {
        Self::Lookup {
            req_type: req_type.into(),
            res_name: res_name.into(),
            conn_id: None,
        }
    }

    /// Creates a LOOKUP command scoped to one connection.
    pub fn lookup_conn(
        req_type: impl Into<String>,
        res_name: impl Into<String>,
        conn_id: u32,
    ) -> Self {
        Self::Lookup {
            req_type: req_type.into(),
            res_name: res_name.into(),
            conn_id: Some(conn_id),
        }
    }

    /// Returns the routing key for this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Lookup { .. } => CommandKind::Lookup,
            Self::List => CommandKind::List,
            Self::Topology => CommandKind::Topology,
            Self::Locations => CommandKind::Locations,
            Self::SetIsdWhitelist { .. } => CommandKind::SetIsdWhitelist,
            Self::GetIsdWhitelist => CommandKind::GetIsdWhitelist,
            Self::GetIsdEndpoints => CommandKind::GetIsdEndpoints,
            Self::ClearStats => CommandKind::ClearStats,
        }
    }
}

/// Field-free copy of [`Command`], used as the key for response decoding
/// and handler routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Lookup,
    List,
    Topology,
    Locations,
    SetIsdWhitelist,
    GetIsdWhitelist,
    GetIsdEndpoints,
    ClearStats,
}

impl CommandKind {
    /// The `command` tag as it appears on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Lookup => "LOOKUP",
            Self::List => "LIST",
            Self::Topology => "TOPO",
            Self::Locations => "LOCATIONS",
            Self::SetIsdWhitelist => "ISD_WHITELIST",
            Self::GetIsdWhitelist => "GET_ISD_WHITELIST",
            Self::GetIsdEndpoints => "GET_ISD_ENDPOINTS",
            Self::ClearStats => "LIST_CLEAR",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
