//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pathviz - live path statistics and topology from the knowledge base
#[derive(Debug, Parser)]
#[command(name = "pathviz")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PATHVIZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Knowledge-base address (host:port), overrides the config file
    #[arg(long, env = "PATHVIZ_ADDRESS")]
    pub address: Option<String>,

    /// Give up on a command after this many timeouts instead of retrying
    /// forever
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// One knowledge-base interaction per subcommand.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch and print the AS-level topology
    Topo,

    /// Fetch and print the ISD-AS location table
    Locations,

    /// Print path statistics for one resource
    Lookup {
        /// Resource name (path or host:port)
        res_name: String,

        /// HTTP method of the resource
        #[arg(long, default_value = "GET")]
        req_type: String,

        /// Restrict to one connection id
        #[arg(long)]
        conn_id: Option<u32>,
    },

    /// List the resources the daemon has statistics for
    List,

    /// Restrict path selection to the given ISDs (none = allow all)
    Whitelist {
        /// ISD identifiers
        isds: Vec<u16>,
    },

    /// Print the current ISD whitelist
    GetWhitelist,

    /// Print the monitored connection's endpoints
    Endpoints,

    /// Drop all accumulated statistics
    Clear,

    /// Poll the resource list periodically and print updates
    Watch {
        /// Refresh interval in seconds (defaults to the configured
        /// list_refresh_ms)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookup() {
        let cli = Cli::parse_from(["pathviz", "lookup", "/x", "--req-type", "POST"]);
        match cli.command {
            CliCommand::Lookup {
                res_name,
                req_type,
                conn_id,
            } => {
                assert_eq!(res_name, "/x");
                assert_eq!(req_type, "POST");
                assert_eq!(conn_id, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_global_flags() {
        let cli = Cli::parse_from([
            "pathviz",
            "--address",
            "10.1.1.1:7777",
            "--max-retries",
            "3",
            "topo",
        ]);
        assert_eq!(cli.address.as_deref(), Some("10.1.1.1:7777"));
        assert_eq!(cli.max_retries, Some(3));
        assert!(matches!(cli.command, CliCommand::Topo));
    }

    #[test]
    fn whitelist_takes_isd_list() {
        let cli = Cli::parse_from(["pathviz", "whitelist", "1", "2"]);
        match cli.command {
            CliCommand::Whitelist { isds } => assert_eq!(isds, vec![1, 2]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
