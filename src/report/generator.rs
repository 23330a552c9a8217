//! Ranking, text listing and JSON summary generation.
//!
//! The ranking is the single ordering used by every output: descending by
//! average, ties kept in the order the aggregator produced them.

use crate::models::{CategoryAverages, JoinStats};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One row of the ranked output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCategory {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub category: String,
    pub average_minutes: f64,
    pub count: usize,
}

/// Sort majors by descending average (stable).
pub fn rank(averages: &CategoryAverages) -> Vec<RankedCategory> {
    let mut entries: Vec<_> = averages.iter().collect();
    entries.sort_by(|a, b| b.average_minutes.total_cmp(&a.average_minutes));

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| RankedCategory {
            rank: i + 1,
            category: entry.category.clone(),
            average_minutes: entry.average_minutes,
            count: entry.count,
        })
        .collect()
}

/// Human-readable listing of the ranking.
pub fn render_listing(ranked: &[RankedCategory]) -> String {
    let mut output = String::new();

    output.push_str(&format!("Found {} majors with data\n", ranked.len()));
    output.push_str("\nAverage Response Times:\n");
    for entry in ranked {
        output.push_str(&format!(
            "  {}: {:.2} minutes\n",
            entry.category, entry.average_minutes
        ));
    }

    output
}

/// Machine-readable summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub generated_at: DateTime<Utc>,
    /// Where the records came from.
    pub source: String,
    pub categories: Vec<RankedCategory>,
    pub stats: JoinStats,
    /// The chart, when one was rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<PathBuf>,
}

impl Summary {
    pub fn new(source: String, categories: Vec<RankedCategory>, stats: JoinStats) -> Self {
        Self {
            generated_at: Utc::now(),
            source,
            categories,
            stats,
            chart: None,
        }
    }
}

/// Generate a JSON summary.
pub fn generate_json_summary(summary: &Summary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write a JSON summary to a file.
pub fn write_json_summary(summary: &Summary, path: &Path) -> Result<()> {
    let content = generate_json_summary(summary)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn averages(entries: &[(&str, Vec<f64>)]) -> CategoryAverages {
        CategoryAverages::from_intervals(
            entries
                .iter()
                .map(|(name, times)| (name.to_string(), times.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_rank_descending() {
        let ranked = rank(&averages(&[
            ("Art", vec![5.0]),
            ("CS", vec![30.0]),
            ("Law", vec![12.5]),
        ]));

        let order: Vec<_> = ranked.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(order, vec!["CS", "Law", "Art"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].average_minutes >= w[1].average_minutes));
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let ranked = rank(&averages(&[
            ("Zoology", vec![10.0]),
            ("Art", vec![20.0]),
            ("Biology", vec![10.0]),
        ]));

        let order: Vec<_> = ranked.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(order, vec!["Art", "Zoology", "Biology"]);
    }

    #[test]
    fn test_rank_handles_negative_averages() {
        let ranked = rank(&averages(&[("Late", vec![-4.0]), ("CS", vec![2.0])]));
        assert_eq!(ranked[0].category, "CS");
        assert_eq!(ranked[1].category, "Late");
    }

    #[test]
    fn test_render_listing() {
        let ranked = rank(&averages(&[("CS", vec![15.0]), ("Undeclared", vec![30.0])]));
        let listing = render_listing(&ranked);

        assert!(listing.starts_with("Found 2 majors with data\n"));
        assert!(listing.contains("Average Response Times:"));
        let undeclared = listing.find("  Undeclared: 30.00 minutes").unwrap();
        let cs = listing.find("  CS: 15.00 minutes").unwrap();
        assert!(undeclared < cs);
    }

    #[test]
    fn test_generate_json_summary() {
        let ranked = rank(&averages(&[("CS", vec![15.0])]));
        let summary = Summary::new("memory".to_string(), ranked, JoinStats::default());
        let json = generate_json_summary(&summary).unwrap();

        assert!(json.contains("\"generated_at\""));
        assert!(json.contains("\"categories\""));
        assert!(json.contains("\"average_minutes\": 15.0"));
        assert!(!json.contains("\"chart\""));
    }

    #[test]
    fn test_write_json_summary_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.json");
        let summary = Summary::new("memory".to_string(), Vec::new(), JoinStats::default());

        write_json_summary(&summary, &path).unwrap();

        let written: Summary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written.categories.is_empty());
        assert_eq!(written.source, "memory");
    }
}
