//! Application/acceptance join and per-major averaging.
//!
//! Applications are indexed by `(project_id, user_id)`; each acceptance is
//! looked up in that index and, when both timestamps are present, contributes
//! `accepted - applied` (in minutes) to the application's major. Anything
//! incomplete or unmatched is skipped without error.

use crate::config::{CollectionConfig, FieldConfig};
use crate::error::SourceError;
use crate::models::{
    CategoryAverages, CompositeKey, Document, FieldValue, JoinStats, UNDECLARED_MAJOR,
};
use crate::source::RecordSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Field names the join reads from each document.
#[derive(Debug, Clone)]
pub struct JoinFields {
    pub project_id: String,
    pub user_id: String,
    pub applied_date: String,
    pub accepted_date: String,
    pub major: String,
}

impl Default for JoinFields {
    fn default() -> Self {
        Self::from(&FieldConfig::default())
    }
}

impl From<&FieldConfig> for JoinFields {
    fn from(config: &FieldConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            user_id: config.user_id.clone(),
            applied_date: config.applied_date.clone(),
            accepted_date: config.accepted_date.clone(),
            major: config.major.clone(),
        }
    }
}

/// Result of a join: the averages plus counters on what was skipped.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub averages: CategoryAverages,
    pub stats: JoinStats,
}

/// Extract the composite key, if both halves are usable.
pub fn composite_key(doc: &Document, fields: &JoinFields) -> Option<CompositeKey> {
    let project_id = doc.get(&fields.project_id)?.as_key_part()?;
    let user_id = doc.get(&fields.user_id)?.as_key_part()?;
    Some(CompositeKey::new(project_id, user_id))
}

/// The major an application is grouped under.
pub fn major_of(application: &Document, fields: &JoinFields) -> String {
    application
        .get(&fields.major)
        .and_then(FieldValue::as_label)
        .unwrap_or_else(|| UNDECLARED_MAJOR.to_string())
}

/// Time from `applied` to `accepted` in fractional minutes.
///
/// Negative when the acceptance predates the application; such intervals
/// are kept as they are.
pub fn interval_minutes(applied: DateTime<Utc>, accepted: DateTime<Utc>) -> f64 {
    let delta = accepted - applied;
    let seconds = delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1_000_000_000.0;
    seconds / 60.0
}

/// Index applications by composite key. Later duplicates replace earlier ones.
pub fn index_applications<'a>(
    applications: &'a [Document],
    fields: &JoinFields,
    stats: &mut JoinStats,
) -> HashMap<CompositeKey, &'a Document> {
    let mut index = HashMap::with_capacity(applications.len());

    for application in applications {
        stats.applications_seen += 1;

        let Some(key) = composite_key(application, fields) else {
            stats.applications_without_key += 1;
            continue;
        };

        if index.insert(key, application).is_some() {
            stats.duplicate_application_keys += 1;
        }
    }

    index
}

/// Join both collections and average the intervals per major.
pub fn aggregate(
    applications: &[Document],
    acceptances: &[Document],
    fields: &JoinFields,
) -> Aggregation {
    let mut stats = JoinStats::default();
    let index = index_applications(applications, fields, &mut stats);

    // Majors in order of first match, so ties rank deterministically.
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for acceptance in acceptances {
        stats.acceptances_seen += 1;

        let key = composite_key(acceptance, fields);
        let accepted = acceptance
            .get(&fields.accepted_date)
            .and_then(FieldValue::as_timestamp);
        let (Some(key), Some(accepted)) = (key, accepted) else {
            stats.acceptances_incomplete += 1;
            continue;
        };

        let Some(application) = index.get(&key) else {
            stats.acceptances_unmatched += 1;
            continue;
        };

        let Some(applied) = application
            .get(&fields.applied_date)
            .and_then(FieldValue::as_timestamp)
        else {
            stats.matches_without_applied_date += 1;
            continue;
        };

        let minutes = interval_minutes(applied, accepted);
        let major = major_of(application, fields);
        stats.matched += 1;

        info!("Match found: {} - {:.2} minutes", major, minutes);
        debug!("Matched {} (applied {}, accepted {})", key, applied, accepted);

        let slot = *positions.entry(major.clone()).or_insert_with(|| {
            groups.push((major, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(minutes);
    }

    let averages = CategoryAverages::from_intervals(groups);
    if averages.is_empty() {
        debug!("No acceptance matched an application with an applied date");
    }
    for entry in &averages {
        info!(
            "{}: {} applications, avg {:.2} minutes",
            entry.category, entry.count, entry.average_minutes
        );
    }

    debug!(
        "{} majors with matches; join statistics: {:?}",
        averages.len(),
        stats
    );

    Aggregation { averages, stats }
}

/// Fetch both collections from `source` and aggregate them.
///
/// Applications are read first, then acceptances. A failure on either
/// fetch is returned as-is and nothing is aggregated.
pub async fn aggregate_from_source<S: RecordSource>(
    source: &S,
    collections: &CollectionConfig,
    fields: &JoinFields,
) -> Result<Aggregation, SourceError> {
    info!("Fetching data from {}", source.describe());

    let applications = source.fetch_collection(&collections.applications).await?;
    info!(
        "Fetched {} documents from {}",
        applications.len(),
        collections.applications
    );

    let acceptances = source.fetch_collection(&collections.acceptances).await?;
    info!(
        "Fetched {} documents from {}",
        acceptances.len(),
        collections.acceptances
    );

    Ok(aggregate(&applications, &acceptances, fields))
}
