use std::net::SocketAddr;

/// Failures of the remote language model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Transport failure, timeout or a non-2xx status from the endpoint
    #[error("model unavailable: {0}")]
    Unavailable(String),
    /// The endpoint answered 2xx but without the expected text field
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Failures of the vector index store
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single save-pipeline event. The event is aborted, nothing else is.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid file: {0}")]
    InvalidFile(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("cannot bind control endpoint on {addr}: {source}")]
    ControlBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("daemon is shutting down")]
    ShuttingDown,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IndexResult<T> = Result<T, IndexError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
