//! Local JSON export as a record source.
//!
//! The export is a single JSON object keyed by collection name. A collection
//! is either an array of documents (iterated in array order) or an object
//! mapping document id to document (iterated in id order, matching what
//! Firestore itself returns).
//!
//! ```json
//! {
//!   "projectApplications": [
//!     {"project_id": "P1", "user_id": "U1", "appliedDate": "2025-03-01T10:00:00Z", "major": "CS"}
//!   ],
//!   "acceptedProjects": {
//!     "a1": {"project_id": "P1", "user_id": "U1", "acceptedDate": "2025-03-01T10:15:00Z"}
//!   }
//! }
//! ```

use super::RecordSource;
use crate::error::SourceError;
use crate::models::Document;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Reads collections out of a JSON export file.
///
/// The file is read and parsed on the first fetch; later fetches reuse it.
pub struct JsonFileSource {
    path: PathBuf,
    export: OnceCell<Map<String, Value>>,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            export: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        let root: Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::decode(self.path.display().to_string(), e))?;

        match root {
            Value::Object(collections) => {
                debug!(
                    "Loaded export {} with {} collection(s)",
                    self.path.display(),
                    collections.len()
                );
                Ok(collections)
            }
            _ => Err(SourceError::decode(
                self.path.display().to_string(),
                "top level must be an object keyed by collection name",
            )),
        }
    }

    async fn collections(&self) -> Result<&Map<String, Value>, SourceError> {
        self.export.get_or_try_init(|| self.load()).await
    }
}

/// Turn one collection of an export into documents.
///
/// Entries that are not JSON objects cannot carry fields and are dropped.
pub fn parse_collection(collection: &str, value: Value) -> Result<Vec<Document>, SourceError> {
    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
        Value::Object(map) => map.into_iter().map(|(id, item)| (Some(id), item)).collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(SourceError::decode(
                format!("collection '{}'", collection),
                format!("expected an array or object, found {}", json_type(&other)),
            ))
        }
    };

    let mut documents = Vec::with_capacity(entries.len());
    for (id, item) in entries {
        match item {
            Value::Object(fields) => documents.push(Document::from_json_object(id, fields)),
            other => warn!(
                "Skipping non-object entry in {}: {}",
                collection,
                json_type(&other)
            ),
        }
    }
    Ok(documents)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl RecordSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Document>, SourceError> {
        let collections = self.collections().await?;

        let documents = match collections.get(collection) {
            Some(value) => parse_collection(collection, value.clone())?,
            None => {
                debug!("Collection {} not present in export", collection);
                Vec::new()
            }
        };

        debug!(
            "Read {} documents from {} in {}",
            documents.len(),
            collection,
            self.path.display()
        );
        Ok(documents)
    }
}
