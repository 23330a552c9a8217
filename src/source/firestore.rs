//! Cloud Firestore record source.
//!
//! Reads collections through the Firestore REST API (`documents.list`),
//! following `nextPageToken` until the collection is exhausted. Documents come
//! back ordered by document id, which is therefore the iteration order seen
//! by the aggregator.
//!
//! Obtaining an access token is not handled here: a bearer token can be
//! passed through as-is, and the local emulator needs none.

use super::{fetch_spinner, RecordSource};
use crate::config::FirestoreConfig;
use crate::error::SourceError;
use crate::models::{Document, FieldValue};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Token the Firestore emulator accepts as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// Connection options for [`FirestoreSource`].
#[derive(Debug, Clone)]
pub struct FirestoreOptions {
    /// REST root, e.g. `https://firestore.googleapis.com`.
    pub endpoint: String,
    pub project_id: String,
    pub database: String,
    pub page_size: u32,
    pub timeout_seconds: u64,
    pub access_token: Option<String>,
    /// True when `endpoint` points at the local emulator.
    pub emulator: bool,
    pub show_progress: bool,
}

impl FirestoreOptions {
    /// Build options from the `[firestore]` config section.
    pub fn from_config(
        config: &FirestoreConfig,
        access_token: Option<String>,
        show_progress: bool,
    ) -> Result<Self, SourceError> {
        let project_id = config
            .project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                SourceError::Settings(
                    "no Firestore project id configured (use --project-id or [firestore].project_id)"
                        .to_string(),
                )
            })?;

        Ok(Self {
            endpoint: config.endpoint(),
            project_id,
            database: config.database.clone(),
            page_size: config.page_size,
            timeout_seconds: config.timeout_seconds,
            access_token,
            emulator: config
                .emulator_host
                .as_deref()
                .is_some_and(|h| !h.is_empty()),
            show_progress,
        })
    }
}

/// One page of a `documents.list` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn into_document(self) -> Document {
        let id = self.name.rsplit('/').next().map(str::to_string);
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), decode_value(value)))
            .collect();
        Document { id, fields }
    }
}

/// Decode a Firestore typed value (`{"stringValue": "..."}` and friends).
pub fn decode_value(value: &Value) -> FieldValue {
    let Some(typed) = value.as_object() else {
        return FieldValue::Other(value.clone());
    };

    if typed.contains_key("nullValue") {
        return FieldValue::Null;
    }
    if let Some(b) = typed.get("booleanValue").and_then(Value::as_bool) {
        return FieldValue::Boolean(b);
    }
    if let Some(raw) = typed.get("integerValue") {
        // int64 values travel as JSON strings
        let parsed = match raw {
            Value::String(s) => s.parse().ok(),
            other => other.as_i64(),
        };
        if let Some(i) = parsed {
            return FieldValue::Integer(i);
        }
    }
    if let Some(d) = typed.get("doubleValue").and_then(Value::as_f64) {
        return FieldValue::Double(d);
    }
    if let Some(ts) = typed.get("timestampValue").and_then(Value::as_str) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
            return FieldValue::Timestamp(parsed.with_timezone(&Utc));
        }
    }
    if let Some(s) = typed.get("stringValue").and_then(Value::as_str) {
        return FieldValue::String(s.to_string());
    }

    FieldValue::Other(value.clone())
}

/// Firestore REST client.
pub struct FirestoreSource {
    options: FirestoreOptions,
    http_client: reqwest::Client,
}

impl FirestoreSource {
    /// Create a client. No request is made until a collection is fetched.
    pub fn new(options: FirestoreOptions) -> Result<Self, SourceError> {
        info!(
            "Using Firestore project {} (database {}) at {}",
            options.project_id, options.database, options.endpoint
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(Self {
            options,
            http_client,
        })
    }

    /// URL of the `documents.list` endpoint for a collection.
    pub fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents/{}",
            self.options.endpoint, self.options.project_id, self.options.database, collection
        )
    }

    fn bearer_token(&self) -> Option<&str> {
        match self.options.access_token.as_deref() {
            Some(token) if !token.is_empty() => Some(token),
            _ if self.options.emulator => Some(EMULATOR_TOKEN),
            _ => None,
        }
    }

    async fn fetch_page(
        &self,
        collection: &str,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, SourceError> {
        let url = self.collection_url(collection);

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("pageSize", self.options.page_size.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        if let Some(token) = self.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    url: url.clone(),
                    seconds: self.options.timeout_seconds,
                }
            } else if e.is_connect() {
                SourceError::Connect {
                    url: self.options.endpoint.clone(),
                    message: e.to_string(),
                }
            } else {
                SourceError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                collection: collection.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ListDocumentsResponse>()
            .await
            .map_err(|e| SourceError::decode(format!("'{}' page", collection), e))
    }
}

impl RecordSource for FirestoreSource {
    fn describe(&self) -> String {
        format!(
            "firestore://{}/{}",
            self.options.project_id, self.options.database
        )
    }

    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Document>, SourceError> {
        let spinner = fetch_spinner(self.options.show_progress, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = match self.fetch_page(collection, page_token.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    if let Some(ref pb) = spinner {
                        pb.abandon_with_message(format!("Failed to fetch {}", collection));
                    }
                    return Err(e);
                }
            };
            pages += 1;
            documents.extend(page.documents.into_iter().map(RawDocument::into_document));

            if let Some(ref pb) = spinner {
                pb.set_message(format!("Fetching {}: {} documents", collection, documents.len()));
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if let Some(ref pb) = spinner {
            pb.finish_and_clear();
        }

        debug!(
            "Fetched {} documents from {} in {} page(s)",
            documents.len(),
            collection,
            pages
        );
        Ok(documents)
    }
}
