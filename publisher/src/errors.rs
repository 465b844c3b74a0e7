use thiserror::Error;

/// Raised while building a publisher: missing or malformed configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Connection string targets entity '{entity_path}' but event hub '{eventhub_name}' was requested")]
    EntityPathMismatch {
        entity_path: String,
        eventhub_name: String,
    },

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Raised by a sink when a batch cannot be accepted. Never retried here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Request(reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Batch rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Batch of {size} bytes exceeds the sink limit of {limit} bytes")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Sink is closed")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(err)
        }
    }
}

/// Either failure, for callers that open and publish through one `?` chain.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, Error>;
