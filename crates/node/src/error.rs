use primitives::NodeAddress;

/// The six error categories of spec.md §7. Every variant is either logged
/// and dropped by the supervisor, or (bind failure only) fatal to the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("malformed datagram from {from}: {source}")]
    MalformedDatagram { from: NodeAddress, source: wire::WireError },

    #[error("protocol violation from {from}: {reason}")]
    ProtocolViolation { from: NodeAddress, reason: String },

    #[error("peer {0} unresponsive, evicting")]
    PeerUnresponsive(NodeAddress),

    #[error("send to {to} failed: {source}")]
    SendFailure { to: NodeAddress, source: std::io::Error },

    #[error("failed to bind discovery socket: {0}")]
    BindFailure(std::io::Error),

    #[error("collaborator rejected role transition: {0}")]
    RoleTransitionFailure(#[from] collab::CollabError),
}

pub type Result<T> = std::result::Result<T, NodeError>;
