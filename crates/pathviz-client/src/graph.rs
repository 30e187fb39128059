//! Topology graph model.
//!
//! Builds a node/link structure from the flat TOPO link list: nodes are
//! deduplicated ISD-ASes, links refer to them by index, and every node
//! gets an ISD-derived group number used for stable color coding. Layout
//! is the consumer's business; none happens here.

use std::collections::HashMap;

use pathviz_protocol::{IsdAs, LinkType, TopologyLink};

/// One AS in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    pub name: IsdAs,
    /// Color group: ISDs four apart, core ASes offset from non-core.
    pub group: u32,
    /// Link type of the link that introduced this node.
    pub link_type: LinkType,
}

/// One link, by node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLink {
    pub source: usize,
    pub target: usize,
    pub ltype: LinkType,
}

/// Deduplicated node/link view of a TOPO reply.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    ids: HashMap<IsdAs, usize>,
}

impl TopologyGraph {
    /// Builds the graph from the daemon's link list.
    pub fn from_links(links: &[TopologyLink]) -> Self {
        let mut sorted = links.to_vec();
        // Order by ISD, core-ness, then AS so group colors come out stable
        // across refreshes regardless of daemon ordering.
        sorted.sort_by_key(|link| (link.b.isd, !link.ltype.is_core(), link.b.asn));

        let mut graph = Self::default();
        for link in &sorted {
            graph.add_node(link.a, link.ltype);
            graph.add_node(link.b, link.ltype);
        }
        for link in &sorted {
            graph.links.push(GraphLink {
                source: graph.ids[&link.a],
                target: graph.ids[&link.b],
                ltype: link.ltype,
            });
        }
        graph
    }

    /// Index of a node by name.
    pub fn node_index(&self, name: IsdAs) -> Option<usize> {
        self.ids.get(&name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn add_node(&mut self, name: IsdAs, link_type: LinkType) {
        if self.ids.contains_key(&name) {
            return;
        }
        self.ids.insert(name, self.nodes.len());
        self.nodes.push(GraphNode {
            name,
            group: group_number(name, link_type.is_core()),
            link_type,
        });
    }
}

/// Color group of an AS: `(isd - 1) * 4 + core_offset`.
fn group_number(name: IsdAs, core: bool) -> u32 {
    u32::from(name.isd).saturating_sub(1) * 4 + u32::from(!core)
}
