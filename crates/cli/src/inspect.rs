//! `cluster-cli`: a thin client for `clusterd`'s Unix control socket
//! (spec.md §9 supplement — see SPEC_FULL.md §6 for why this exists
//! instead of a `/status` HTTP endpoint: the gateway is out of core scope).
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio::net::UnixStream;

use crate::control::{self, ControlRequest, ControlResponse, DEFAULT_CONTROL_SOCKET_PATH};
use crate::result::{CliError, Result};

#[derive(Parser, Debug)]
#[command(name = "cluster-cli", author, version, about = "Inspect a running clusterd daemon")]
pub struct InspectOpts {
    /// Path of the Unix control socket `clusterd` is listening on.
    #[arg(long, global = true)]
    pub control_socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: InspectCommand,
}

#[derive(Subcommand, Debug)]
pub enum InspectCommand {
    /// Prints the daemon's current membership table and local role set as JSON.
    Status,
}

pub async fn run(opts: InspectOpts) -> Result<()> {
    let socket_path = opts
        .control_socket
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTROL_SOCKET_PATH));

    match opts.command {
        InspectCommand::Status => status(&socket_path).await,
    }
}

async fn status(socket_path: &Path) -> Result<()> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|err| CliError::Control(format!("failed to connect to {}: {err}", socket_path.display())))?;

    control::write_request(&mut stream, &ControlRequest::Status)
        .await
        .map_err(|err| CliError::Control(err.to_string()))?;

    let response = control::read_response(&mut stream)
        .await
        .map_err(|err| CliError::Control(err.to_string()))?;

    match response {
        Some(ControlResponse::Status(status)) => {
            let rendered = serde_json::to_string_pretty(&status).map_err(|err| CliError::Other(err.to_string()))?;
            println!("{rendered}");
            Ok(())
        },
        Some(ControlResponse::Error(message)) => Err(CliError::Control(message)),
        None => Err(CliError::Control("daemon closed the connection without responding".into())),
    }
}
