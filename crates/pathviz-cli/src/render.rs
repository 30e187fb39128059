//! Text-table rendering of decoded knowledge-base payloads.
//!
//! Reproduces the statistics table of the original visualization: one
//! column per path, the packet/rtt/loss rows on top, then one row per
//! interface hop padded with `-` where a path is shorter.

use pathviz_client::TopologyGraph;
use pathviz_protocol::{EndpointsReply, LocationMap, PathStats, ResourceEntry};

/// Renders the per-path statistics table for one resource.
pub fn render_stats(res_name: &str, stats: &PathStats) -> String {
    let paths = stats.paths();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut header = vec![String::new()];
    header.extend((0..paths).map(|p| format!("P{p}")));
    rows.push(header);

    rows.push(row("sent pkts", stats.sent_packets.iter().map(|v| v.to_string())));
    rows.push(row(
        "recv pkts",
        stats.received_packets.iter().map(|v| v.to_string()),
    ));
    rows.push(row("ack pkts", stats.acked_packets.iter().map(|v| v.to_string())));
    rows.push(row("rtts", stats.rtts.iter().map(|v| format!("{v:.0}"))));
    rows.push(row(
        "loss rates",
        stats.loss_rates.iter().map(|v| format!("{v:.2}")),
    ));
    rows.push(row("IF counts", stats.if_counts.iter().map(|v| v.to_string())));

    for hop_index in 0..stats.max_hops() {
        let cells = stats.if_lists.iter().map(|hops| {
            hops.get(hop_index)
                .map(|hop| hop.to_string())
                .unwrap_or_else(|| "-".to_string())
        });
        rows.push(row(&format!("IF{hop_index}"), cells));
    }

    format!("{} path(s) for {}\n{}", paths, res_name, table(&rows))
}

/// Renders the deduplicated topology graph as node and link lists.
pub fn render_topology(graph: &TopologyGraph) -> String {
    if graph.is_empty() {
        return "no topology".to_string();
    }

    let mut rows: Vec<Vec<String>> = vec![vec![
        "node".to_string(),
        "type".to_string(),
        "group".to_string(),
    ]];
    for node in &graph.nodes {
        rows.push(vec![
            node.name.to_string(),
            node.link_type.to_string(),
            node.group.to_string(),
        ]);
    }

    let mut out = table(&rows);
    out.push('\n');

    let mut link_rows: Vec<Vec<String>> = Vec::new();
    for link in &graph.links {
        link_rows.push(vec![
            graph.nodes[link.source].name.to_string(),
            "->".to_string(),
            graph.nodes[link.target].name.to_string(),
            link.ltype.to_string(),
        ]);
    }
    out.push_str(&table(&link_rows));
    out
}

/// Renders the ISD-AS location table.
pub fn render_locations(locations: &LocationMap) -> String {
    if locations.is_empty() {
        return "no locations".to_string();
    }
    let rows: Vec<Vec<String>> = locations
        .iter()
        .map(|(isd_as, country)| vec![isd_as.to_string(), country.clone()])
        .collect();
    table(&rows)
}

/// Renders the tracked resource list, sorted the way the original
/// accordion sorted its headers.
pub fn render_resources(resources: &[ResourceEntry]) -> String {
    if resources.is_empty() {
        return "no resources".to_string();
    }

    let mut sorted: Vec<&ResourceEntry> = resources.iter().collect();
    sorted.sort_by_key(|entry| (entry.method.clone(), entry.path.clone()));

    let rows: Vec<Vec<String>> = sorted
        .iter()
        .map(|entry| {
            vec![
                entry
                    .conn_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                entry.method.clone(),
                entry.path.clone(),
            ]
        })
        .collect();
    table(&rows)
}

/// Renders the ISD whitelist; an empty list means no restriction.
pub fn render_whitelist(isds: &[u16]) -> String {
    if isds.is_empty() {
        "all ISDs allowed".to_string()
    } else {
        format!(
            "allowed ISDs: {}",
            isds.iter()
                .map(|isd| isd.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Renders the monitored connection's endpoints.
pub fn render_endpoints(endpoints: &EndpointsReply) -> String {
    format!(
        "source {} -> target {}",
        endpoints.source_isd_as(),
        endpoints.target_isd_as()
    )
}

fn row(name: &str, cells: impl Iterator<Item = String>) -> Vec<String> {
    let mut out = vec![name.to_string()];
    out.extend(cells);
    out
}

/// Right-aligns every column but the first to its widest cell.
fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for cells in rows {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    rows.iter()
        .map(|cells| {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    if i == 0 {
                        format!("{:<width$}", cell, width = widths[i])
                    } else {
                        format!("{:>width$}", cell, width = widths[i])
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathviz_protocol::Hop;

    fn hop(ifid: u32, isd: u16, asn: u32) -> Hop {
        Hop { ifid, isd, asn }
    }

    fn two_path_stats() -> PathStats {
        PathStats {
            sent_packets: vec![40, 12],
            received_packets: vec![38, 12],
            acked_packets: vec![37, 11],
            rtts: vec![22833.0, 31450.0],
            loss_rates: vec![0.05, 0.0],
            if_lists: vec![
                vec![hop(1, 1, 10), hop(2, 1, 12)],
                vec![hop(3, 2, 21)],
            ],
            if_counts: vec![2, 1],
        }
    }

    #[test]
    fn stats_table_rows_and_padding() {
        let out = render_stats("/img.png", &two_path_stats());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "2 path(s) for /img.png");
        assert!(lines[1].contains("P0") && lines[1].contains("P1"));
        assert!(out.contains("sent pkts"));
        assert!(out.contains("loss rates"));
        // Two decimals on loss rates
        assert!(out.contains("0.05") && out.contains("0.00"));
        // Hop rows in IFID-ISD-AS form; the shorter path is padded
        assert!(out.contains("1-1-10"));
        let if1 = lines.iter().find(|l| l.starts_with("IF1")).unwrap();
        assert!(if1.contains("2-1-12"));
        assert!(if1.trim_end().ends_with('-'));
    }

    #[test]
    fn stats_table_empty_paths() {
        let stats = PathStats {
            sent_packets: vec![],
            received_packets: vec![],
            acked_packets: vec![],
            rtts: vec![],
            loss_rates: vec![],
            if_lists: vec![],
            if_counts: vec![],
        };
        let out = render_stats("/x", &stats);
        assert!(out.starts_with("0 path(s) for /x"));
    }

    #[test]
    fn resources_sorted_like_the_accordion() {
        let resources = vec![
            ResourceEntry::new("POST", "http://ocsp.digicert.com/"),
            ResourceEntry::new("CONNECT", "github.com:443"),
            ResourceEntry::with_conn(2, "CONNECT", "api.github.com:443"),
        ];
        let out = render_resources(&resources);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("api.github.com:443"));
        assert!(lines[2].contains("ocsp.digicert.com"));
        // conn id column shows '-' when absent
        assert!(lines[1].starts_with('-'));
    }

    #[test]
    fn whitelist_rendering() {
        assert_eq!(render_whitelist(&[]), "all ISDs allowed");
        assert_eq!(render_whitelist(&[1, 2]), "allowed ISDs: 1, 2");
    }

    #[test]
    fn endpoints_rendering() {
        let endpoints = EndpointsReply {
            source: (1, 11),
            target: (2, 26),
        };
        assert_eq!(render_endpoints(&endpoints), "source 1-11 -> target 2-26");
    }

    #[test]
    fn empty_collections_have_placeholders() {
        assert_eq!(render_locations(&LocationMap::new()), "no locations");
        assert_eq!(render_resources(&[]), "no resources");
        assert_eq!(
            render_topology(&TopologyGraph::from_links(&[])),
            "no topology"
        );
    }
}
