//! response-time-report - Average application response time per major
//!
//! A one-shot report that joins the `projectApplications` and
//! `acceptedProjects` Firestore collections on (project_id, user_id),
//! averages the time from application to acceptance per major, and
//! renders the result as a bar chart.
//!
//! Exit codes:
//!   0 - Success, including runs that found no matching data
//!   1 - Runtime error (connection, auth, config, rendering, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod source;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use report::{ReportOutcome, Summary};
use source::{FirestoreOptions, FirestoreSource, JsonFileSource, RecordSource, Source};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded before logging so that `general.verbose` applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: Invalid configuration: {:#}", e);
        std::process::exit(1);
    }

    init_logging(log_level(&args, &config));

    info!("response-time-report v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    match run_report(&args, &config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .response-times.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set firestore.project_id, then adjust collections, fields and chart as needed.");
    Ok(())
}

/// Effective log level: CLI flags first, then the config file.
fn log_level(args: &Args, config: &Config) -> tracing::Level {
    if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging. Logs go to stderr so stdout carries only the report.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from the explicit path or the default location.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    Ok(Config::load_default()?.unwrap_or_default())
}

/// Build the record source selected by the arguments.
fn build_source(args: &Args, config: &Config, show_progress: bool) -> Result<Source> {
    if let Some(ref input) = args.input {
        let source = JsonFileSource::new(input);
        info!("Reading records from export {}", source.path().display());
        return Ok(Source::JsonFile(source));
    }

    let options =
        FirestoreOptions::from_config(&config.firestore, args.access_token.clone(), show_progress)?;
    Ok(Source::Firestore(FirestoreSource::new(options)?))
}

/// Run the complete fetch, aggregate and report workflow.
async fn run_report(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();
    let text = args.format == OutputFormat::Text;

    // Step 1: Connect to the data source
    let source = build_source(args, config, text && !args.quiet)?;
    let fields = analysis::JoinFields::from(&config.fields);

    // Step 2: Fetch both collections and join them
    if text {
        println!("📥 Fetching data from {}...", source.describe());
    }
    let aggregation =
        analysis::aggregate_from_source(&source, &config.collections, &fields)
            .await
            .context("Failed to fetch records")?;

    let stats = aggregation.stats;
    debug!(
        "Matched {} of {} acceptances ({} skipped); {} of {} applications had no key",
        stats.matched,
        stats.acceptances_seen,
        stats.skipped_acceptances(),
        stats.applications_without_key,
        stats.applications_seen
    );

    // Step 3: Rank and list
    let ranked = report::rank(&aggregation.averages);
    let mut summary = Summary::new(source.describe(), ranked.clone(), stats);

    if ranked.is_empty() {
        if text {
            println!(
                "No matching data found between {} and {}",
                config.collections.acceptances, config.collections.applications
            );
        }
    } else if text {
        print!("\n{}", report::render_listing(&ranked));
        println!("\n📊 Generating chart...");
    }

    // Step 4: Render the chart (skipped when there is nothing to plot)
    match report::render_chart(&ranked, &config.chart)? {
        ReportOutcome::Rendered { path, bars } => {
            if text {
                println!("\n✅ Chart saved as '{}' ({} bars)", path.display(), bars);
            }
            summary.chart = Some(path);
        }
        ReportOutcome::NothingToDo => debug!("Chart step skipped"),
    }

    // Step 5: Optional machine-readable output
    if let Some(ref path) = config.general.summary_json {
        report::write_json_summary(&summary, path)?;
        if text {
            println!("   Summary written to {}", path.display());
        }
    }
    if !text {
        println!("{}", report::generator::generate_json_summary(&summary)?);
    }

    debug!(
        "Report finished in {:.1}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
