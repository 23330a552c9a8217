//! Record sources.
//!
//! A record source hands out whole collections of [`Document`]s. The
//! aggregator only depends on the [`RecordSource`] trait, so it can be fed by
//! Firestore, by a local JSON export, or by an in-memory fake in tests.
//!
//! Every fetch reads the full collection into memory. Nothing here streams
//! or bounds collection size.

pub mod firestore;
pub mod json_file;

pub use firestore::{FirestoreOptions, FirestoreSource};
pub use json_file::JsonFileSource;

use crate::error::SourceError;
use crate::models::Document;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A provider of named document collections.
pub trait RecordSource {
    /// Short description used in log lines and summaries.
    fn describe(&self) -> String;

    /// Fetch every document of a collection, in the source's iteration order.
    ///
    /// A collection that does not exist is returned as empty.
    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Document>, SourceError>;
}

/// The concrete sources selectable from the command line.
pub enum Source {
    Firestore(FirestoreSource),
    JsonFile(JsonFileSource),
}

impl RecordSource for Source {
    fn describe(&self) -> String {
        match self {
            Source::Firestore(s) => s.describe(),
            Source::JsonFile(s) => s.describe(),
        }
    }

    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Document>, SourceError> {
        match self {
            Source::Firestore(s) => s.fetch_collection(collection).await,
            Source::JsonFile(s) => s.fetch_collection(collection).await,
        }
    }
}

/// Spinner shown while a collection is being fetched.
pub(crate) fn fetch_spinner(show: bool, collection: &str) -> Option<ProgressBar> {
    if !show {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Fetching {}...", collection));
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::HashMap;

    /// In-memory source for aggregator tests.
    #[derive(Default)]
    pub struct MemorySource {
        collections: HashMap<String, Vec<Document>>,
        failing: Option<String>,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_collection(mut self, name: &str, docs: Vec<Document>) -> Self {
            self.collections.insert(name.to_string(), docs);
            self
        }

        /// Make fetching `name` fail like an unreachable backend.
        pub fn failing_on(mut self, name: &str) -> Self {
            self.failing = Some(name.to_string());
            self
        }
    }

    impl RecordSource for MemorySource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn fetch_collection(&self, collection: &str) -> Result<Vec<Document>, SourceError> {
            if self.failing.as_deref() == Some(collection) {
                return Err(SourceError::Connect {
                    url: "memory://".to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(self.collections.get(collection).cloned().unwrap_or_default())
        }
    }
}
