//! Document database error types.

/// Errors from a document database.
///
/// `NotFound` and `Conflict` are ordinary outcomes that callers inspect;
/// everything else is a failure of the database or of the connection to it.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// No item with the given id in the given partition
    #[error("item not found")]
    NotFound,

    /// An item with the same id already exists in the partition
    #[error("conflict: item already exists")]
    Conflict,

    /// Authorization token rejected
    #[error("unauthorized: check COSMOS_AUTH_TOKEN")]
    Unauthorized,

    /// Database returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Document could not be encoded or decoded
    #[error("JSON error: {message}")]
    Json { message: String },

    /// Database or container does not exist
    #[error("missing resource: {0}")]
    MissingResource(String),
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        DocumentError::Json {
            message: err.to_string(),
        }
    }
}
