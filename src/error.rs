//! Errors raised at the record-source boundary.
//!
//! Anything that goes wrong while talking to the data source is fatal for
//! the run. Record-level problems never show up here: malformed documents
//! are dropped by the aggregator instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to fetch a collection from a record source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The data source could not be reached at all.
    #[error("Cannot connect to {url}: {message}")]
    Connect { url: String, message: String },

    /// A request did not complete within the configured timeout.
    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// The data source answered with a non-success status (auth failures land here).
    #[error("Firestore API error {status} for collection '{collection}': {body}")]
    Status {
        collection: String,
        status: u16,
        body: String,
    },

    /// The source cannot be built from the given settings.
    #[error("Invalid data source settings: {0}")]
    Settings(String),

    /// Any other transport-level failure.
    #[error("Failed to send request: {0}")]
    Transport(String),

    /// The response or export could not be decoded.
    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// A local export file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub(crate) fn decode(what: impl Into<String>, message: impl ToString) -> Self {
        SourceError::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = SourceError::Status {
            collection: "acceptedProjects".to_string(),
            status: 403,
            body: "PERMISSION_DENIED".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("acceptedProjects"));
        assert!(msg.contains("PERMISSION_DENIED"));
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = SourceError::Io {
            path: PathBuf::from("export.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("export.json"));
    }
}
