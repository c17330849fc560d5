//! `clusterd`: binds the discovery socket, runs the supervisor to
//! completion, and serves the Unix control socket `cluster-cli status`
//! talks to. spec.md's "CLI surface" (§6) defines none for the core itself
//! — this is the ambient operability wrapper around it, grounded in the
//! teacher's `cli::run` (telemetry init, then hand off to a long-running
//! async main) and `storage_agent`'s `Daemon`/`Status` split.
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cluster_config::ClusterConfig;
use collab::{NoopEditingServer, NoopGateway, NoopMessageBrokerClient, NoopMessageBrokerServer, NoopStorage};
use events::{EventRouter, Topic};
use node::{Collaborators, Supervisor};
use telemetry::{error, info};
use tokio::net::{UnixListener, UnixStream};

use crate::control::{self, ControlRequest, ControlResponse, DEFAULT_CONTROL_SOCKET_PATH};
use crate::result::{CliError, Result};
use crate::status_cache::{self, StatusCache};

#[derive(Parser, Debug)]
#[command(name = "clusterd", author, version, about = "Cluster membership and coordination daemon")]
pub struct DaemonOpts {
    /// Local interface address this node is identified by; also the source
    /// the host-bits priority is derived from (spec.md §4.1).
    #[arg(long)]
    pub local_address: Ipv4Addr,

    /// Netmask of the selected interface.
    #[arg(long, default_value = "255.255.255.0")]
    pub netmask: Ipv4Addr,

    /// Path of the Unix control socket `cluster-cli` connects to.
    #[arg(long)]
    pub control_socket: Option<PathBuf>,
}

/// Wires the supervisor, its external collaborators, the status cache, and
/// the control socket together, then blocks until SIGINT.
pub async fn run(opts: DaemonOpts) -> Result<()> {
    let config = ClusterConfig::from_env(opts.local_address, opts.netmask)
        .map_err(|err| CliError::Other(err.to_string()))?;

    let mut router = EventRouter::new();
    router.add_topic(Topic::Nodes, Some(16));
    router.add_topic(Topic::Roles, Some(16));

    let nodes_rx = router
        .subscribe(&Topic::Nodes)
        .map_err(|err| CliError::Other(err.to_string()))?;
    let roles_rx = router
        .subscribe(&Topic::Roles)
        .map_err(|err| CliError::Other(err.to_string()))?;

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let router_handle = tokio::spawn(async move { router.start(&mut events_rx).await });

    // Real deployments supply their own broker/gateway/editing/storage
    // implementations; the daemon binary exercises full role transitions
    // against the log-only stubs (spec.md §6 lists the traits, not impls).
    let collaborators = Collaborators {
        broker_server: Arc::new(NoopMessageBrokerServer),
        broker_client: Arc::new(NoopMessageBrokerClient),
        gateway: Arc::new(NoopGateway),
        editing_server: Arc::new(NoopEditingServer),
        storage: Arc::new(NoopStorage::default()),
    };

    let (supervisor, handle) = Supervisor::bind(config.clone(), events_tx, collaborators).await?;

    let status_cache = status_cache::new(config.local_address, config.priority());
    let status_task = tokio::spawn(status_cache::run(
        status_cache.clone(),
        config.local_address,
        nodes_rx,
        roles_rx,
    ));

    let socket_path = opts
        .control_socket
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTROL_SOCKET_PATH));
    let _ = std::fs::remove_file(&socket_path);

    let listener = UnixListener::bind(&socket_path)
        .map_err(|err| CliError::Control(format!("failed to bind {}: {err}", socket_path.display())))?;
    let control_task = tokio::spawn(serve_control_socket(listener, status_cache));

    info!("clusterd listening for discovery traffic on port {}", config.discovery_port);
    let supervisor_task = tokio::spawn(supervisor.run());

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| CliError::Other(err.to_string()))?;
    info!("received shutdown signal");

    let _ = handle.shutdown_tx.send(());
    let _ = supervisor_task.await;

    control_task.abort();
    status_task.abort();
    router_handle.abort();
    let _ = std::fs::remove_file(&socket_path);

    Ok(())
}

async fn serve_control_socket(listener: UnixListener, cache: StatusCache) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let cache = cache.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, cache).await {
                        error!("control connection error: {err}");
                    }
                });
            },
            Err(err) => {
                error!("control socket accept failed: {err}");
                return;
            },
        }
    }
}

async fn handle_connection(stream: UnixStream, cache: StatusCache) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(reader);

    while let Some(request) = control::read_request(&mut reader).await? {
        let response = match request {
            ControlRequest::Status => ControlResponse::Status(cache.read().await.clone()),
        };

        control::write_response(&mut writer, &response).await?;
    }

    Ok(())
}
