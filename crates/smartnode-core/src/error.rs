use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node is not registered with the network")]
    NotRegistered,

    #[error("execution client is not synced")]
    NotSynced,

    #[error("node account unavailable: {0}")]
    AccountUnavailable(String),

    #[error("cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("invalid address '{0}': expected 20 hex-encoded bytes")]
    InvalidAddress(String),

    #[error("unknown minipool status: {0}")]
    UnknownStatus(String),

    #[error("api call '{command}' failed: {message}")]
    Api { command: String, message: String },

    #[error("unexpected api response: {0}")]
    ApiResponse(String),

    #[error("could not {action} minipool {address}: {message}")]
    Action {
        action: String,
        address: String,
        message: String,
    },

    #[error("config not found at {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("home directory not found: set HOME or pass --dir")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
