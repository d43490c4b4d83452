use thiserror::Error;

/// Errors surfaced by the scanner, its RPC client and the checkpoint writer.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to build or drive the HTTP client
    #[error("Rpc client error: {0}")]
    RpcError(String),
    /// The fetcher gave up on an endpoint
    #[error("Request to {url} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
    #[error("Failed to decode rpc response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Custom(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Self::Custom(error)
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}
