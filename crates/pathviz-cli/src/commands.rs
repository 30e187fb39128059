//! Subcommand execution: build the transport and dispatcher, enqueue the
//! requested commands, render whatever the session collected.

use std::time::Duration;

use chrono::Local;
use tracing::{debug, info};

use pathviz_client::dispatcher::DispatcherConfig;
use pathviz_client::error::{ClientError, ClientResult};
use pathviz_client::{
    ClientConfig, HandlerRegistry, RequestManager, Session, SessionState, TopologyGraph,
    UdpTransport,
};
use pathviz_protocol::Command;

use crate::cli::{Cli, CliCommand};
use crate::render;

/// Loads the configuration and applies command-line overrides.
pub fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    if let Some(address) = &cli.address {
        config.knowledge_base.address = address.clone();
    }
    if cli.max_retries.is_some() {
        config.requests.max_retries = cli.max_retries;
    }
    if cli.debug {
        config.debug = true;
    }
    Ok(config)
}

/// Runs one subcommand to completion.
pub async fn run(cli: Cli) -> ClientResult<()> {
    let config = load_config(&cli)?;

    match cli.command {
        CliCommand::Topo => {
            let state = run_once(&config, vec![Command::Topology]).await?;
            let graph = TopologyGraph::from_links(&state.topology);
            println!("{}", render::render_topology(&graph));
            report_error(&state);
            Ok(())
        }
        CliCommand::Locations => {
            let state = run_once(&config, vec![Command::Locations]).await?;
            println!("{}", render::render_locations(&state.locations));
            report_error(&state);
            Ok(())
        }
        CliCommand::Lookup {
            res_name,
            req_type,
            conn_id,
        } => {
            let command = match conn_id {
                Some(id) => Command::lookup_conn(req_type, res_name.clone(), id),
                None => Command::lookup(req_type, res_name.clone()),
            };
            let state = run_once(&config, vec![command]).await?;
            match state.stats.get(&res_name) {
                Some(stats) => println!("{}", render::render_stats(&res_name, stats)),
                None => println!("no statistics for {}", res_name),
            }
            report_error(&state);
            Ok(())
        }
        CliCommand::List => {
            let state = run_once(&config, vec![Command::List]).await?;
            println!("{}", render::render_resources(&state.resources));
            report_error(&state);
            Ok(())
        }
        CliCommand::Whitelist { isds } => {
            let state = run_once(&config, vec![Command::SetIsdWhitelist { isds }]).await?;
            println!("status: {}", state.last_status.as_deref().unwrap_or("-"));
            report_error(&state);
            Ok(())
        }
        CliCommand::GetWhitelist => {
            let state = run_once(&config, vec![Command::GetIsdWhitelist]).await?;
            match &state.whitelist {
                Some(isds) => println!("{}", render::render_whitelist(isds)),
                None => println!("whitelist unknown"),
            }
            report_error(&state);
            Ok(())
        }
        CliCommand::Endpoints => {
            let state = run_once(&config, vec![Command::GetIsdEndpoints]).await?;
            match &state.endpoints {
                Some(endpoints) => println!("{}", render::render_endpoints(endpoints)),
                None => println!("endpoints unknown"),
            }
            report_error(&state);
            Ok(())
        }
        CliCommand::Clear => {
            let state = run_once(&config, vec![Command::ClearStats]).await?;
            println!("status: {}", state.last_status.as_deref().unwrap_or("-"));
            report_error(&state);
            Ok(())
        }
        CliCommand::Watch { interval } => watch(&config, interval).await,
    }
}

/// Connects a transport for the configured daemon address.
async fn connect(config: &ClientConfig) -> ClientResult<UdpTransport> {
    let (host, port) = config.host_port()?;
    let mut transport =
        UdpTransport::new(host, port).with_recv_buffer(config.knowledge_base.recv_buffer);
    transport.connect().await?;
    Ok(transport)
}

/// Enqueues the given commands and runs the dispatcher until the queue is
/// drained, returning the resulting session state.
async fn run_once(config: &ClientConfig, commands: Vec<Command>) -> ClientResult<SessionState> {
    let transport = connect(config).await?;

    let session = Session::new();
    let mut registry = HandlerRegistry::new();
    session.register_handlers(&mut registry);

    let (mut manager, handle) = RequestManager::with_status(
        transport,
        registry,
        DispatcherConfig::from(config),
        session.status_sink(),
    );

    for command in commands {
        manager.enqueue(command)?;
    }
    drop(handle);

    manager.run().await?;
    Ok(session.snapshot())
}

/// Polls the resource list on the configured cadence, printing updates,
/// until interrupted.
async fn watch(config: &ClientConfig, interval_secs: Option<u64>) -> ClientResult<()> {
    let transport = connect(config).await?;

    let session = Session::new();
    let mut registry = HandlerRegistry::new();
    session.register_handlers(&mut registry);

    let (mut manager, handle) = RequestManager::with_status(
        transport,
        registry,
        DispatcherConfig::from(config),
        session.status_sink(),
    );

    let refresh = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.list_refresh());
    info!(refresh_secs = refresh.as_secs(), "watching resource list");

    // Topology and locations once up front, then the list on a cadence
    handle.enqueue(Command::Topology)?;
    handle.enqueue(Command::Locations)?;

    let watch_session = session.clone();
    let driver = async move {
        let mut ticker = tokio::time::interval(refresh);
        let mut last_rendered = String::new();
        loop {
            ticker.tick().await;
            if handle.enqueue(Command::List).is_err() {
                debug!("request manager gone, watch driver stopping");
                return;
            }

            let state = watch_session.snapshot();
            let rendered = render::render_resources(&state.resources);
            if rendered != last_rendered {
                println!(
                    "[{}] {} resource(s)",
                    Local::now().format("%H:%M:%S"),
                    state.resources.len()
                );
                println!("{rendered}");
                last_rendered = rendered;
            }
            if let Some(error) = &state.last_error {
                eprintln!("warning: {error}");
            }
        }
    };

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            debug!(%error, "ctrl-c listener failed");
        }
    };

    tokio::select! {
        result = manager.run_until(shutdown) => result,
        _ = driver => Err(ClientError::ManagerStopped),
    }
}

/// Prints the session's status line, if an error is pending.
fn report_error(state: &SessionState) {
    if let Some(error) = &state.last_error {
        eprintln!("warning: {error}");
    }
}
