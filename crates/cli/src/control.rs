//! Unix control socket protocol spoken between `clusterd` and `cluster-cli`
//! (spec.md's `/healthz`/`/status` introspection is explicitly a Non-goal of
//! the wire protocol itself; this is the out-of-band substitute, grounded in
//! the teacher's `storage_agent` `Daemon`/`Status` CLI shape).
//!
//! Framing is newline-delimited JSON: one `ControlRequest` per line in, one
//! `ControlResponse` per line out.
use std::collections::HashSet;

use membership::MembershipEntry;
use primitives::{NodeAddress, Priority, Role};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

pub const DEFAULT_CONTROL_SOCKET_PATH: &str = "/tmp/clusterd.sock";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlRequest {
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub local_address: NodeAddress,
    pub local_priority: Priority,
    pub local_roles: HashSet<Role>,
    pub nodes: Vec<MembershipEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlResponse {
    Status(StatusResponse),
    Error(String),
}

pub async fn write_request(stream: &mut UnixStream, request: &ControlRequest) -> std::io::Result<()> {
    let mut line = serde_json::to_string(request).expect("ControlRequest always serializes");
    line.push('\n');
    stream.write_all(line.as_bytes()).await
}

pub async fn read_request(reader: &mut (impl AsyncBufReadExt + Unpin)) -> std::io::Result<Option<ControlRequest>> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line).await?;

    if bytes == 0 {
        return Ok(None);
    }

    Ok(serde_json::from_str(line.trim_end()).ok())
}

pub async fn write_response(stream: &mut (impl AsyncWriteExt + Unpin), response: &ControlResponse) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).expect("ControlResponse always serializes");
    line.push('\n');
    stream.write_all(line.as_bytes()).await
}

pub async fn read_response(stream: &mut UnixStream) -> std::io::Result<Option<ControlResponse>> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let bytes = reader.read_line(&mut line).await?;

    if bytes == 0 {
        return Ok(None);
    }

    Ok(serde_json::from_str(line.trim_end()).ok())
}
