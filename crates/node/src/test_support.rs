//! Shared scaffolding for `node`'s own unit tests — not part of the public
//! API, mirrors the teacher's per-module test fixtures in spirit rather
//! than being lifted from one specific file.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cluster_config::ClusterConfig;
use collab::{NoopEditingServer, NoopGateway, NoopMessageBrokerClient, NoopMessageBrokerServer, NoopStorage};
use events::{Event, Topic};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::supervisor::{Collaborators, Supervisor};

pub(crate) fn noop_collaborators() -> Collaborators {
    Collaborators {
        broker_server: Arc::new(NoopMessageBrokerServer),
        broker_client: Arc::new(NoopMessageBrokerClient),
        gateway: Arc::new(NoopGateway),
        editing_server: Arc::new(NoopEditingServer),
        storage: Arc::new(NoopStorage::default()),
    }
}

/// A `MessageBrokerServer` that counts `start` calls, so tests can assert a
/// collaborator was (or wasn't) restarted without inspecting log output.
#[derive(Default)]
pub(crate) struct CountingBroker {
    pub(crate) starts: AtomicUsize,
}

impl CountingBroker {
    pub(crate) fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl collab::MessageBrokerServer for CountingBroker {
    async fn start(&self) -> collab::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> collab::Result<()> {
        Ok(())
    }
}

pub(crate) fn counting_collaborators() -> (Collaborators, Arc<CountingBroker>) {
    let broker = Arc::new(CountingBroker::default());

    let collaborators = Collaborators {
        broker_server: broker.clone(),
        broker_client: Arc::new(NoopMessageBrokerClient),
        gateway: Arc::new(NoopGateway),
        editing_server: Arc::new(NoopEditingServer),
        storage: Arc::new(NoopStorage::default()),
    };

    (collaborators, broker)
}

pub(crate) async fn supervisor_with_counting_broker(
    local: &str,
) -> (Supervisor, Arc<CountingBroker>, events::Publisher, UnboundedReceiver<(Topic, Event)>) {
    let (collaborators, broker) = counting_collaborators();
    let (tx, rx) = unbounded_channel();
    let (supervisor, _handle) = Supervisor::bind(config(local), tx.clone(), collaborators).await.unwrap();
    (supervisor, broker, tx, rx)
}

/// Fast timings so unit tests don't wait out real `MESSAGE_TIMEOUT`/
/// `PREELECTION_TIMEOUT` defaults.
pub(crate) fn config(local: &str) -> ClusterConfig {
    ClusterConfig {
        local_address: local.parse().unwrap(),
        netmask: "255.255.255.0".parse().unwrap(),
        discovery_port: 0,
        message_interval: Duration::from_millis(20),
        message_timeout: Duration::from_millis(100),
        preelection_timeout: Duration::from_millis(100),
    }
}

pub(crate) async fn supervisor(local: &str) -> (Supervisor, events::Publisher, UnboundedReceiver<(Topic, Event)>) {
    let (tx, rx) = unbounded_channel();
    let (supervisor, _handle) = Supervisor::bind(config(local), tx.clone(), noop_collaborators())
        .await
        .unwrap();
    (supervisor, tx, rx)
}
