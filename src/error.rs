use thiserror::Error;

/// Errors produced by the data visualisation core
///
/// Most reconciliation failures never reach the caller as an `Err`: the
/// workspace turns them into notifications and resets its state. What is left
/// here are the failures a caller can actually act on.
#[derive(Debug, Error)]
pub enum DatavisError {
    /// The backing key/value store refused an operation
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The on-disk store snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The upstream spreadsheet parser rejected the file
    #[error("{0}")]
    Parse(String),

    #[error("unknown chart type: {0}")]
    InvalidChartType(String),

    #[error("unknown chart dimension: {0}")]
    InvalidDimension(String),

    #[error("no identity is signed in")]
    NotAuthenticated,

    /// An identity must be a non-empty token
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),

    /// The suggestion service failed to answer
    #[error("suggestion request failed: {0}")]
    Suggestion(String),

    /// Rendering or encoding the chart image failed
    #[error("export failed: {0}")]
    Export(String),
}

impl From<bincode::Error> for DatavisError {
    fn from(e: bincode::Error) -> Self {
        DatavisError::Snapshot(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DatavisError>;
