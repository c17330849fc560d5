#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("control socket error: {0}")]
    Control(String),

    #[error(transparent)]
    Node(#[from] node::NodeError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
