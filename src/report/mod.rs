//! Report output: ranking, listings, JSON summary and the bar chart.

pub mod chart;
pub mod generator;

pub use generator::{rank, render_listing, write_json_summary, RankedCategory, Summary};

use crate::config::ChartConfig;
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// What the chart step did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// A chart with `bars` bars was written to `path`.
    Rendered { path: PathBuf, bars: usize },
    /// There was nothing to plot; no file was touched.
    NothingToDo,
}

/// Render the ranked averages as a bar chart.
///
/// An empty ranking is not an error: nothing is drawn and any existing
/// file at the output path is left alone.
pub fn render_chart(ranked: &[RankedCategory], config: &ChartConfig) -> Result<ReportOutcome> {
    if ranked.is_empty() {
        info!("No data to plot");
        return Ok(ReportOutcome::NothingToDo);
    }

    chart::draw_bar_chart(ranked, config)?;

    Ok(ReportOutcome::Rendered {
        path: config.output.clone(),
        bars: ranked.len(),
    })
}
