use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    // The service's own message, surfaced verbatim.
    #[error("{message}")]
    Service { message: String },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, BackendError>;
