//! Store error types.

use std::path::PathBuf;

use super::document::DocumentError;

/// Errors raised by station stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Seed file missing or unreadable
    #[error("failed to read seed file {}: {source}", .path.display())]
    SeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Seed file is not a JSON array of station records
    #[error("malformed seed file {}: {message}", .path.display())]
    SeedFormat { path: PathBuf, message: String },

    /// The document database rejected or failed an operation
    #[error("document database: {0}")]
    Document(#[from] DocumentError),

    /// A document store was used before `initialize` completed
    #[error("document store not initialized")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::SeedFormat {
            path: PathBuf::from("data/dublinbike.json"),
            message: "expected array".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed seed file data/dublinbike.json: expected array"
        );

        let err = StoreError::Document(DocumentError::Conflict);
        assert_eq!(err.to_string(), "document database: conflict: item already exists");

        assert_eq!(
            StoreError::NotInitialized.to_string(),
            "document store not initialized"
        );
    }
}
