//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.response-times.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".response-times.toml";

/// Firestore caps list page sizes well below this.
pub const MAX_PAGE_SIZE: u32 = 10_000;
pub const MAX_DPI: u32 = 1200;
/// Largest chart edge, in inches.
const MAX_CHART_INCHES: f64 = 100.0;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Firestore connection settings.
    #[serde(default)]
    pub firestore: FirestoreConfig,

    /// Collection names.
    #[serde(default)]
    pub collections: CollectionConfig,

    /// Document field names.
    #[serde(default)]
    pub fields: FieldConfig,

    /// Chart settings.
    #[serde(default)]
    pub chart: ChartConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Also write a JSON summary to this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_json: Option<PathBuf>,
}

/// Firestore REST settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    /// Google Cloud project id. Required unless reading a local export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Database id within the project.
    #[serde(default = "default_database")]
    pub database: String,

    /// REST API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// `host:port` of a local Firestore emulator; overrides `base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator_host: Option<String>,

    /// Documents requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            database: default_database(),
            base_url: default_base_url(),
            emulator_host: None,
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl FirestoreConfig {
    /// The REST root actually used, taking the emulator into account.
    pub fn endpoint(&self) -> String {
        match self.emulator_host.as_deref() {
            Some(host) if !host.is_empty() => format!("http://{}", host.trim_end_matches('/')),
            _ => self.base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_page_size() -> u32 {
    300
}

fn default_timeout() -> u64 {
    60
}

/// Names of the two collections that get joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection holding project applications.
    #[serde(default = "default_applications")]
    pub applications: String,

    /// Collection holding accepted applications.
    #[serde(default = "default_acceptances")]
    pub acceptances: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            applications: default_applications(),
            acceptances: default_acceptances(),
        }
    }
}

fn default_applications() -> String {
    "projectApplications".to_string()
}

fn default_acceptances() -> String {
    "acceptedProjects".to_string()
}

/// Field names read from each document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default = "default_project_id_field")]
    pub project_id: String,

    #[serde(default = "default_user_id_field")]
    pub user_id: String,

    /// Timestamp on applications.
    #[serde(default = "default_applied_field")]
    pub applied_date: String,

    /// Timestamp on acceptances.
    #[serde(default = "default_accepted_field")]
    pub accepted_date: String,

    /// Grouping label on applications.
    #[serde(default = "default_major_field")]
    pub major: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id_field(),
            user_id: default_user_id_field(),
            applied_date: default_applied_field(),
            accepted_date: default_accepted_field(),
            major: default_major_field(),
        }
    }
}

fn default_project_id_field() -> String {
    "project_id".to_string()
}

fn default_user_id_field() -> String {
    "user_id".to_string()
}

fn default_applied_field() -> String {
    "appliedDate".to_string()
}

fn default_accepted_field() -> String {
    "acceptedDate".to_string()
}

fn default_major_field() -> String {
    "major".to_string()
}

/// Chart rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Output image; the extension picks the format.
    #[serde(default = "default_chart_output")]
    pub output: PathBuf,

    /// Dots per inch.
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    #[serde(default = "default_width_inches")]
    pub width_inches: f64,

    #[serde(default = "default_height_inches")]
    pub height_inches: f64,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_x_label")]
    pub x_label: String,

    #[serde(default = "default_y_label")]
    pub y_label: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output: default_chart_output(),
            dpi: default_dpi(),
            width_inches: default_width_inches(),
            height_inches: default_height_inches(),
            title: default_title(),
            x_label: default_x_label(),
            y_label: default_y_label(),
        }
    }
}

impl ChartConfig {
    /// Reject settings that would produce an unusable image.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 || self.dpi > MAX_DPI {
            bail!("chart.dpi must be between 1 and {}, got {}", MAX_DPI, self.dpi);
        }
        for (name, inches) in [("width_inches", self.width_inches), ("height_inches", self.height_inches)] {
            if !inches.is_finite() || inches <= 0.0 || inches > MAX_CHART_INCHES {
                bail!(
                    "chart.{} must be greater than 0 and at most {}, got {}",
                    name,
                    MAX_CHART_INCHES,
                    inches
                );
            }
        }
        Ok(())
    }

    /// Pixel dimensions of the rendered image.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = f64::from(self.dpi);
        (
            (self.width_inches * dpi).round().max(1.0) as u32,
            (self.height_inches * dpi).round().max(1.0) as u32,
        )
    }
}

fn default_chart_output() -> PathBuf {
    PathBuf::from("average_response_time_by_major.png")
}

fn default_dpi() -> u32 {
    300
}

fn default_width_inches() -> f64 {
    12.0
}

fn default_height_inches() -> f64 {
    6.0
}

fn default_title() -> String {
    "Average Project Application Response Time by Major".to_string()
}

fn default_x_label() -> String {
    "Major".to_string()
}

fn default_y_label() -> String {
    "Average Response Time (minutes)".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.response-times.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref project_id) = args.project_id {
            self.firestore.project_id = Some(project_id.clone());
        }
        if let Some(ref database) = args.database {
            self.firestore.database = database.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.firestore.base_url = base_url.clone();
        }
        if let Some(ref host) = args.emulator_host {
            self.firestore.emulator_host = Some(host.clone());
        }
        if let Some(page_size) = args.page_size {
            self.firestore.page_size = page_size;
        }
        if let Some(timeout) = args.timeout {
            self.firestore.timeout_seconds = timeout;
        }

        if let Some(ref output) = args.output {
            self.chart.output = output.clone();
        }
        if let Some(dpi) = args.dpi {
            self.chart.dpi = dpi;
        }

        if let Some(ref summary) = args.summary_json {
            self.general.summary_json = Some(summary.clone());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged settings before anything is fetched.
    ///
    /// Covers values from the config file as well as from the command line.
    pub fn validate(&self) -> Result<()> {
        let firestore = &self.firestore;
        if firestore.page_size == 0 || firestore.page_size > MAX_PAGE_SIZE {
            bail!(
                "firestore.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                firestore.page_size
            );
        }
        if firestore.timeout_seconds == 0 {
            bail!("firestore.timeout_seconds must be at least 1");
        }
        let base_url = firestore.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!(
                "firestore.base_url must start with 'http://' or 'https://', got '{}'",
                firestore.base_url
            );
        }

        for (name, value) in [
            ("collections.applications", &self.collections.applications),
            ("collections.acceptances", &self.collections.acceptances),
            ("fields.project_id", &self.fields.project_id),
            ("fields.user_id", &self.fields.user_id),
            ("fields.applied_date", &self.fields.applied_date),
            ("fields.accepted_date", &self.fields.accepted_date),
            ("fields.major", &self.fields.major),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }

        self.chart.validate()?;
        crate::report::chart::image_format(&self.chart.output)?;
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collections.applications, "projectApplications");
        assert_eq!(config.collections.acceptances, "acceptedProjects");
        assert_eq!(config.fields.major, "major");
        assert_eq!(
            config.chart.output,
            PathBuf::from("average_response_time_by_major.png")
        );
        assert_eq!(config.chart.pixel_size(), (3600, 1800));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[firestore]
project_id = "talentbridge-dev"
page_size = 50

[fields]
major = "degree"

[chart]
output = "out/chart.svg"
dpi = 100
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.firestore.project_id.as_deref(), Some("talentbridge-dev"));
        assert_eq!(config.firestore.page_size, 50);
        assert_eq!(config.firestore.database, "(default)");
        assert_eq!(config.fields.major, "degree");
        assert_eq!(config.fields.applied_date, "appliedDate");
        assert_eq!(config.chart.output, PathBuf::from("out/chart.svg"));
        assert_eq!(config.chart.pixel_size(), (1200, 600));
    }

    #[test]
    fn test_endpoint_prefers_emulator() {
        let mut firestore = FirestoreConfig::default();
        assert_eq!(firestore.endpoint(), "https://firestore.googleapis.com");

        firestore.base_url = "https://example.test/".to_string();
        assert_eq!(firestore.endpoint(), "https://example.test");

        firestore.emulator_host = Some("localhost:8080".to_string());
        assert_eq!(firestore.endpoint(), "http://localhost:8080");
    }

    #[test]
    fn test_merge_only_overrides_given_args() {
        let mut config = Config::default();
        config.firestore.project_id = Some("from-file".to_string());
        config.firestore.page_size = 25;

        let mut args = make_args();
        args.dpi = Some(150);
        config.merge_with_args(&args);

        assert_eq!(config.firestore.project_id.as_deref(), Some("from-file"));
        assert_eq!(config.firestore.page_size, 25);
        assert_eq!(config.chart.dpi, 150);

        args.project_id = Some("from-cli".to_string());
        args.verbose = true;
        config.merge_with_args(&args);
        assert_eq!(config.firestore.project_id.as_deref(), Some("from-cli"));
        assert!(config.general.verbose);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[collections]\napplications = \"apps\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.collections.applications, "apps");
        assert_eq!(config.collections.acceptances, "acceptedProjects");
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[chart\noutput = ").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_file_values_out_of_range() {
        let config: Config = toml::from_str("[chart]\ndpi = 0\n").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chart.dpi"));

        let config: Config = toml::from_str("[firestore]\ntimeout_seconds = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[firestore]\npage_size = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[firestore]\nbase_url = \"ftp://x\"\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[chart]\nwidth_inches = -1.0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[fields]\nmajor = \" \"\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[chart]\noutput = \"chart.pdf\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_sees_merged_cli_values() {
        let mut config: Config = toml::from_str("[chart]\ndpi = 5000\n").unwrap();
        assert!(config.validate().is_err());

        let mut args = make_args();
        args.dpi = Some(150);
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[firestore]"));
        assert!(toml_str.contains("[collections]"));
        assert!(toml_str.contains("[chart]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.chart.dpi, 300);
    }
}
