/// Shared error type used across all cronicorn crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("application failure: status {status}: {message}")]
    ApplicationFailure { status: u16, message: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
