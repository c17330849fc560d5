//! Trait contracts for the external collaborators the core drives but does
//! not implement: the message broker, HTTP gateway, editing server, and
//! document storage (spec §6). Also ships `Noop*` log-only implementations
//! so the daemon and integration tests can exercise full role transitions
//! without a real broker/gateway/editing server present.
use std::net::SocketAddr;

use async_trait::async_trait;
use telemetry::info;

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("collaborator refused to start: {0}")]
    StartRejected(String),

    #[error("collaborator refused to stop: {0}")]
    StopRejected(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),
}

pub type Result<T> = std::result::Result<T, CollabError>;

#[async_trait]
pub trait MessageBrokerServer: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

#[async_trait]
pub trait MessageBrokerClient: Send + Sync {
    async fn start(&self, broker_address: SocketAddr) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

#[async_trait]
pub trait EditingServer: Send + Sync {
    async fn start(&self, gateway_address: SocketAddr) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// A stored document. `id` is a monotonically increasing integer rendered
/// as a string, per spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn get_documents(&self) -> Result<Vec<Document>>;
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;
    async fn create_document(&self, name: &str) -> Result<Document>;
}

pub struct NoopMessageBrokerServer;

#[async_trait]
impl MessageBrokerServer for NoopMessageBrokerServer {
    async fn start(&self) -> Result<()> {
        info!("message broker server started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("message broker server stopped");
        Ok(())
    }
}

pub struct NoopMessageBrokerClient;

#[async_trait]
impl MessageBrokerClient for NoopMessageBrokerClient {
    async fn start(&self, broker_address: SocketAddr) -> Result<()> {
        info!("message broker client connected to {broker_address}");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("message broker client disconnected");
        Ok(())
    }
}

pub struct NoopGateway;

#[async_trait]
impl Gateway for NoopGateway {
    async fn start(&self) -> Result<()> {
        info!("gateway started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("gateway stopped");
        Ok(())
    }
}

pub struct NoopEditingServer;

#[async_trait]
impl EditingServer for NoopEditingServer {
    async fn start(&self, gateway_address: SocketAddr) -> Result<()> {
        info!("editing server started behind gateway {gateway_address}");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        info!("editing server stopped");
        Ok(())
    }
}

/// An in-memory stand-in for the JSON-file document store (spec.md §6
/// notes the real storage persists to disk; that detail is outside core
/// scope, so the test/demo double just keeps documents in memory).
pub struct NoopStorage {
    documents: tokio::sync::Mutex<Vec<Document>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl Default for NoopStorage {
    fn default() -> Self {
        Self {
            documents: tokio::sync::Mutex::new(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Storage for NoopStorage {
    async fn start(&self) -> Result<()> {
        info!("storage started");
        Ok(())
    }

    async fn get_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.lock().await.clone())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.lock().await.iter().find(|d| d.id == id).cloned())
    }

    async fn create_document(&self, name: &str) -> Result<Document> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .to_string();

        let document = Document {
            id,
            name: name.to_string(),
        };

        self.documents.lock().await.push(document.clone());

        Ok(document)
    }
}
