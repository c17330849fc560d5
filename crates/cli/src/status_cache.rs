//! Keeps a `StatusResponse` up to date from the node's own event bus, so the
//! control socket handler never touches the supervisor's single-writer
//! state directly (spec §5: only the dispatch loop mutates core state).
use std::sync::Arc;

use events::{Event, Topic};
use primitives::NodeAddress;
use tokio::sync::{broadcast, RwLock};

use crate::control::StatusResponse;

pub type StatusCache = Arc<RwLock<StatusResponse>>;

pub fn new(local_address: NodeAddress, local_priority: primitives::Priority) -> StatusCache {
    Arc::new(RwLock::new(StatusResponse {
        local_address,
        local_priority,
        local_roles: Default::default(),
        nodes: Vec::new(),
    }))
}

/// Consumes `Nodes`/`Roles` broadcasts and keeps `cache` current until the
/// channel closes (the supervisor shut down).
pub async fn run(cache: StatusCache, local_address: NodeAddress, mut nodes_rx: broadcast::Receiver<Event>, mut roles_rx: broadcast::Receiver<Event>) {
    loop {
        tokio::select! {
            result = nodes_rx.recv() => {
                match result {
                    Ok(Event::NodesChanged(snapshot)) => {
                        cache.write().await.nodes = snapshot;
                    },
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            },
            result = roles_rx.recv() => {
                match result {
                    Ok(Event::RolesChanged { snapshot, .. }) => {
                        let mut guard = cache.write().await;
                        guard.nodes = snapshot.clone();
                        guard.local_roles = snapshot
                            .into_iter()
                            .find(|entry| entry.address == local_address)
                            .map(|entry| entry.roles)
                            .unwrap_or_default();
                    },
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            },
        }
    }
}
