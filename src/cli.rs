//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{MAX_DPI, MAX_PAGE_SIZE};
use clap::Parser;
use std::path::PathBuf;

/// response-time-report - average application response time per major
///
/// Joins the `projectApplications` and `acceptedProjects` Firestore
/// collections on (project_id, user_id), averages the time between applying
/// and being accepted for each major, and renders a bar chart.
///
/// Examples:
///   response-time-report --project-id talentbridge-dev --access-token "$(gcloud auth print-access-token)"
///   response-time-report --project-id demo --emulator-host localhost:8080
///   response-time-report --input export.json --output chart.svg
///   response-time-report --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Google Cloud project that hosts the Firestore database
    #[arg(short, long, value_name = "PROJECT", env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Firestore database id
    ///
    /// Defaults to "(default)".
    #[arg(long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Firestore REST API root
    #[arg(long, value_name = "URL", env = "FIRESTORE_BASE_URL")]
    pub base_url: Option<String>,

    /// Local Firestore emulator (host:port); takes precedence over --base-url
    #[arg(long, value_name = "HOST", env = "FIRESTORE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// OAuth2 bearer token sent with every Firestore request
    #[arg(long, value_name = "TOKEN", env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Read both collections from a local JSON export instead of Firestore
    ///
    /// The file holds one array of documents per collection name.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Chart output path; the extension picks the format (png, jpg, bmp, svg)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write the ranked averages as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Format of the listing printed to stdout
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .response-times.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Documents requested per Firestore page
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// Chart resolution in dots per inch
    #[arg(long, value_name = "DPI")]
    pub dpi: Option<u32>,

    /// Generate a default .response-times.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the stdout listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines (default)
    #[default]
    Text,
    /// JSON document
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(page_size) = self.page_size {
            if page_size == 0 || page_size > MAX_PAGE_SIZE {
                return Err(format!("Page size must be between 1 and {}", MAX_PAGE_SIZE));
            }
        }

        if let Some(dpi) = self.dpi {
            if dpi == 0 || dpi > MAX_DPI {
                return Err(format!("DPI must be between 1 and {}", MAX_DPI));
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            project_id: None,
            database: None,
            base_url: None,
            emulator_host: None,
            access_token: None,
            input: None,
            output: None,
            summary_json: None,
            format: OutputFormat::Text,
            config: None,
            verbose: false,
            quiet: false,
            timeout: None,
            page_size: None,
            dpi: None,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from(["response-time-report", "--project-id", "demo"]).unwrap();
        assert_eq!(args.project_id.as_deref(), Some("demo"));
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.output.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_json_format() {
        let args = Args::try_parse_from(["response-time-report", "--format", "json"]).unwrap();
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_base_url() {
        let mut args = make_args();
        args.base_url = Some("firestore.googleapis.com".to_string());
        assert!(args.validate().is_err());

        args.base_url = Some("https://firestore.googleapis.com".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.page_size = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.dpi = Some(5000);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.init_config = true;
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
