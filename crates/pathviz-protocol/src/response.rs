//! Typed response payloads.
//!
//! The daemon's replies carry no type tag; their shape is implied by the
//! command they answer. [`decode_response`] recovers a tagged
//! [`ResponsePayload`] from the originating [`CommandKind`], turning the
//! legacy field-sniffing into one decode step with a real error.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::command::CommandKind;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::IsdAs;

/// Relationship between the two ends of a topology link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    /// Core link. Older daemons emit `ROUTING` for the same relationship.
    #[serde(rename = "CORE", alias = "ROUTING")]
    Core,
    #[serde(rename = "PARENT")]
    Parent,
    #[serde(rename = "PEER")]
    Peer,
    #[serde(rename = "CHILD")]
    Child,
}

impl LinkType {
    /// True for links between core ASes.
    pub fn is_core(&self) -> bool {
        matches!(self, Self::Core)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Core => "CORE",
            Self::Parent => "PARENT",
            Self::Peer => "PEER",
            Self::Child => "CHILD",
        };
        f.write_str(name)
    }
}

/// One directed link of the TOPO reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyLink {
    pub a: IsdAs,
    pub b: IsdAs,
    pub ltype: LinkType,
}

/// LOCATIONS reply: ISD-AS to two-letter country code.
pub type LocationMap = BTreeMap<IsdAs, String>;

/// One interface hop of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    #[serde(rename = "IFID")]
    pub ifid: u32,
    #[serde(rename = "ISD")]
    pub isd: u16,
    /// Older daemons used `AD` where newer ones say `AS`.
    #[serde(rename = "AS", alias = "AD")]
    pub asn: u32,
}

impl Hop {
    /// The AS this hop's interface belongs to.
    pub fn isd_as(&self) -> IsdAs {
        IsdAs::new(self.isd, self.asn)
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.ifid, self.isd, self.asn)
    }
}

/// LOOKUP reply: per-path statistics for one resource.
///
/// All top-level arrays are parallel, one entry per path; `if_lists[p]`
/// holds the hops of path `p` and `if_counts[p]` their number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    pub sent_packets: Vec<u64>,
    pub received_packets: Vec<u64>,
    pub acked_packets: Vec<u64>,
    pub rtts: Vec<f64>,
    pub loss_rates: Vec<f64>,
    pub if_lists: Vec<Vec<Hop>>,
    pub if_counts: Vec<u32>,
}

impl PathStats {
    /// Number of paths described by this reply.
    pub fn paths(&self) -> usize {
        self.if_lists.len()
    }

    /// Checks that every parallel array has one entry per path.
    pub fn is_consistent(&self) -> bool {
        let n = self.paths();
        self.sent_packets.len() == n
            && self.received_packets.len() == n
            && self.acked_packets.len() == n
            && self.rtts.len() == n
            && self.loss_rates.len() == n
            && self.if_counts.len() == n
    }

    /// Longest hop list across all paths.
    pub fn max_hops(&self) -> usize {
        self.if_lists.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// One entry of the LIST reply.
///
/// On the wire this is a `[method, path]` or `[conn_id, method, path]`
/// tuple, depending on whether the daemon tracks per-connection stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub conn_id: Option<u64>,
    pub method: String,
    pub path: String,
}

impl ResourceEntry {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            conn_id: None,
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn with_conn(conn_id: u64, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            conn_id: Some(conn_id),
            method: method.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl Serialize for ResourceEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.conn_id.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        if let Some(conn_id) = self.conn_id {
            seq.serialize_element(&conn_id)?;
        }
        seq.serialize_element(&self.method)?;
        seq.serialize_element(&self.path)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResourceEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = ResourceEntry;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a [method, path] or [conn_id, method, path] sequence")
            }

            fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<ResourceEntry, S::Error> {
                let first: serde_json::Value = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;

                let (conn_id, method) = match first {
                    serde_json::Value::Number(n) => {
                        let conn_id = n
                            .as_u64()
                            .ok_or_else(|| de::Error::custom("conn_id is not an unsigned int"))?;
                        let method: String = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                        (Some(conn_id), method)
                    }
                    serde_json::Value::String(method) => (None, method),
                    other => {
                        return Err(de::Error::custom(format!(
                            "expected conn_id or method, got {other}"
                        )));
                    }
                };

                let path: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(if conn_id.is_some() { 2 } else { 1 }, &self))?;

                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("trailing elements in resource entry"));
                }

                Ok(ResourceEntry {
                    conn_id,
                    method,
                    path,
                })
            }
        }

        deserializer.deserialize_seq(EntryVisitor)
    }
}

/// Generic status reply for mutating commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(rename = "STATUS")]
    pub status: String,
}

impl StatusReply {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// GET_ISD_ENDPOINTS reply: the monitored connection's two ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsReply {
    #[serde(rename = "source_ISD_AS")]
    pub source: (u16, u32),
    #[serde(rename = "target_ISD_AS")]
    pub target: (u16, u32),
}

impl EndpointsReply {
    pub fn source_isd_as(&self) -> IsdAs {
        IsdAs::new(self.source.0, self.source.1)
    }

    pub fn target_isd_as(&self) -> IsdAs {
        IsdAs::new(self.target.0, self.target.1)
    }
}

/// A decoded reply, tagged by the command that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Topology(Vec<TopologyLink>),
    Locations(LocationMap),
    PathStats(PathStats),
    Resources(Vec<ResourceEntry>),
    /// Allowed ISDs; empty means "all allowed".
    Whitelist(Vec<u16>),
    Status(StatusReply),
    Endpoints(EndpointsReply),
}

impl ResponsePayload {
    /// The command kind this payload answers.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Topology(_) => CommandKind::Topology,
            Self::Locations(_) => CommandKind::Locations,
            Self::PathStats(_) => CommandKind::Lookup,
            Self::Resources(_) => CommandKind::List,
            Self::Whitelist(_) => CommandKind::GetIsdWhitelist,
            Self::Status(_) => CommandKind::ClearStats,
            Self::Endpoints(_) => CommandKind::GetIsdEndpoints,
        }
    }
}

/// Decodes a reply payload against the command that is waiting for it.
///
/// Malformed JSON yields [`ProtocolError::Serialization`]; valid JSON of
/// the wrong shape yields [`ProtocolError::Shape`]. Both leave the caller
/// free to advance past the command, which is what the dispatcher does.
pub fn decode_response(kind: CommandKind, payload: &[u8]) -> ProtocolResult<ResponsePayload> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;

    let shape = |source: serde_json::Error| ProtocolError::Shape {
        command: kind,
        source,
    };

    let decoded = match kind {
        CommandKind::Lookup => {
            ResponsePayload::PathStats(serde_json::from_value(value).map_err(shape)?)
        }
        CommandKind::List => {
            ResponsePayload::Resources(serde_json::from_value(value).map_err(shape)?)
        }
        CommandKind::Topology => {
            ResponsePayload::Topology(serde_json::from_value(value).map_err(shape)?)
        }
        CommandKind::Locations => {
            ResponsePayload::Locations(serde_json::from_value(value).map_err(shape)?)
        }
        CommandKind::GetIsdWhitelist => {
            ResponsePayload::Whitelist(serde_json::from_value(value).map_err(shape)?)
        }
        CommandKind::SetIsdWhitelist | CommandKind::ClearStats => {
            ResponsePayload::Status(serde_json::from_value(value).map_err(shape)?)
        }
        CommandKind::GetIsdEndpoints => {
            ResponsePayload::Endpoints(serde_json::from_value(value).map_err(shape)?)
        }
    };

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_payload(paths: usize) -> String {
        let mut stats = PathStats {
            sent_packets: vec![40; paths],
            received_packets: vec![38; paths],
            acked_packets: vec![37; paths],
            rtts: vec![22833.0; paths],
            loss_rates: vec![0.05; paths],
            if_lists: Vec::new(),
            if_counts: vec![2; paths],
        };
        for p in 0..paths {
            stats.if_lists.push(vec![
                Hop {
                    ifid: 1,
                    isd: 1,
                    asn: 10 + p as u32,
                },
                Hop {
                    ifid: 2,
                    isd: 2,
                    asn: 20 + p as u32,
                },
            ]);
        }
        serde_json::to_string(&stats).unwrap()
    }

    #[test]
    fn topology_reply_decodes() {
        let json = r#"[
            {"a": "1-11", "b": "1-12", "ltype": "CORE"},
            {"a": "1-12", "b": "2-21", "ltype": "PARENT"}
        ]"#;
        let payload = decode_response(CommandKind::Topology, json.as_bytes()).unwrap();

        let ResponsePayload::Topology(links) = payload else {
            panic!("wrong variant");
        };
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].a, IsdAs::new(1, 11));
        assert!(links[0].ltype.is_core());
    }

    #[test]
    fn legacy_routing_ltype_maps_to_core() {
        let json = r#"[{"a": "1-11", "b": "1-12", "ltype": "ROUTING"}]"#;
        let ResponsePayload::Topology(links) =
            decode_response(CommandKind::Topology, json.as_bytes()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(links[0].ltype, LinkType::Core);
    }

    #[test]
    fn locations_reply_decodes() {
        let json = r#"{"1-11": "US", "2-21": "CH"}"#;
        let ResponsePayload::Locations(map) =
            decode_response(CommandKind::Locations, json.as_bytes()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(map[&IsdAs::new(2, 21)], "CH");
    }

    #[test]
    fn lookup_reply_decodes() {
        let json = lookup_payload(3);
        let ResponsePayload::PathStats(stats) =
            decode_response(CommandKind::Lookup, json.as_bytes()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(stats.paths(), 3);
        assert!(stats.is_consistent());
        assert_eq!(stats.max_hops(), 2);
        assert_eq!(stats.if_lists[0][0].isd_as(), IsdAs::new(1, 10));
    }

    #[test]
    fn legacy_ad_field_accepted_in_hops() {
        let json = r#"{"IFID": 3, "ISD": 1, "AD": 25}"#;
        let hop: Hop = serde_json::from_str(json).unwrap();
        assert_eq!(hop.asn, 25);
        assert_eq!(hop.to_string(), "3-1-25");
    }

    #[test]
    fn inconsistent_lookup_is_detected() {
        let json = r#"{
            "sent_packets": [1], "received_packets": [1], "acked_packets": [1],
            "rtts": [1.0], "loss_rates": [0.0, 0.5],
            "if_lists": [[]], "if_counts": [0]
        }"#;
        let ResponsePayload::PathStats(stats) =
            decode_response(CommandKind::Lookup, json.as_bytes()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(!stats.is_consistent());
    }

    #[test]
    fn list_reply_two_and_three_tuples() {
        let json = r#"[["CONNECT", "github.com:443"], [7, "POST", "http://ocsp.digicert.com/"]]"#;
        let ResponsePayload::Resources(entries) =
            decode_response(CommandKind::List, json.as_bytes()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(entries[0], ResourceEntry::new("CONNECT", "github.com:443"));
        assert_eq!(
            entries[1],
            ResourceEntry::with_conn(7, "POST", "http://ocsp.digicert.com/")
        );
    }

    #[test]
    fn resource_entry_roundtrip() {
        let entry = ResourceEntry::with_conn(3, "GET", "/img.png");
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"[3,"GET","/img.png"]"#);
        let back: ResourceEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn resource_entry_rejects_extra_elements() {
        let result: Result<ResourceEntry, _> =
            serde_json::from_str(r#"["GET", "/x", "surprise"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn whitelist_reply_decodes() {
        let ResponsePayload::Whitelist(isds) =
            decode_response(CommandKind::GetIsdWhitelist, b"[1, 2]").unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(isds, vec![1, 2]);

        // Empty list means all ISDs are allowed
        let ResponsePayload::Whitelist(all) =
            decode_response(CommandKind::GetIsdWhitelist, b"[]").unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(all.is_empty());
    }

    #[test]
    fn status_reply_for_mutating_commands() {
        for kind in [CommandKind::SetIsdWhitelist, CommandKind::ClearStats] {
            let ResponsePayload::Status(status) =
                decode_response(kind, br#"{"STATUS": "OK"}"#).unwrap()
            else {
                panic!("wrong variant");
            };
            assert!(status.is_ok());
        }

        let ResponsePayload::Status(err) =
            decode_response(CommandKind::ClearStats, br#"{"STATUS": "no stats"}"#).unwrap()
        else {
            panic!("wrong variant");
        };
        assert!(!err.is_ok());
    }

    #[test]
    fn endpoints_reply_decodes() {
        let json = r#"{"source_ISD_AS": [1, 11], "target_ISD_AS": [2, 26]}"#;
        let ResponsePayload::Endpoints(ep) =
            decode_response(CommandKind::GetIsdEndpoints, json.as_bytes()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(ep.source_isd_as(), IsdAs::new(1, 11));
        assert_eq!(ep.target_isd_as(), IsdAs::new(2, 26));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let result = decode_response(CommandKind::Topology, b"{not json");
        assert!(matches!(result, Err(ProtocolError::Serialization(_))));
    }

    #[test]
    fn wrong_shape_is_a_shape_error() {
        // Valid JSON, but a LOOKUP answer is expected to be an object
        let result = decode_response(CommandKind::Lookup, br#"[["GET", "/x"]]"#);
        match result {
            Err(err @ ProtocolError::Shape { .. }) => assert!(err.is_shape_mismatch()),
            other => panic!("expected shape error, got {other:?}"),
        }
    }
}
