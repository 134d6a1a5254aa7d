//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.coursemon.toml` files.

use crate::cli::OutputFormat;
use crate::taxonomy::TaxonomyOverride;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".coursemon.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Replacement curricula, one entry per scenario.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taxonomy: Vec<TaxonomyOverride>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "coursemon_report.md".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List individual skills under each domain.
    #[serde(default = "default_true")]
    pub include_skills: bool,

    /// Include the case list in participant reports.
    #[serde(default = "default_true")]
    pub include_cases: bool,

    /// Print the band legend under skill matrices.
    #[serde(default = "default_true")]
    pub include_matrix_legend: bool,

    /// Maximum case rows in a participant report (0 for no limit).
    #[serde(default = "default_max_case_rows")]
    pub max_case_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_skills: true,
            include_cases: true,
            include_matrix_legend: true,
            max_case_rows: default_max_case_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_case_rows() -> usize {
    100
}

impl Config {
    /// Load configuration from a TOML file.
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
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
        if args.no_skills {
            self.report.include_skills = false;
        }
    }

    /// Log level after merging: `quiet` wins, then `[general].verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
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
    use crate::cli::{Args, ReportKind};
    use crate::models::Scenario;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "coursemon_report.md");
        assert_eq!(config.general.format, OutputFormat::Markdown);
        assert!(config.report.include_skills);
        assert_eq!(config.report.max_case_rows, 100);
        assert!(config.taxonomy.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "course_report.json"
verbose = true
format = "json"

[report]
include_cases = false
max_case_rows = 20

[[taxonomy]]
scenario = "ETAT"

[[taxonomy.domains]]
key = "triage"
label = "Triage"
items = ["Assess ABCD"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "course_report.json");
        assert!(config.general.verbose);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(config.report.include_skills);
        assert!(!config.report.include_cases);
        assert_eq!(config.report.max_case_rows, 20);

        assert_eq!(config.taxonomy.len(), 1);
        assert_eq!(config.taxonomy[0].scenario, Scenario::Etat);
        assert_eq!(config.taxonomy[0].domains[0].items, vec!["Assess ABCD"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[report]\ninclude_skills = false").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(!config.report.include_skills);
        assert_eq!(config.general.output, "coursemon_report.md");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general\noutput = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args {
            data: None,
            course: None,
            report: ReportKind::Course,
            participant: None,
            output: Some(PathBuf::from("out.json")),
            format: Some(OutputFormat::Json),
            day: None,
            setting: None,
            group: None,
            scenario: None,
            domain: None,
            item: None,
            course_type: None,
            state: None,
            locality: None,
            year: None,
            month: None,
            exclude_participant: Vec::new(),
            exclude_case: Vec::new(),
            config: None,
            verbose: true,
            quiet: false,
            no_skills: true,
            fail_below: None,
            init_config: false,
        };

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.general.output, "out.json");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(config.general.verbose);
        assert!(!config.report.include_skills);
    }

    #[test]
    fn test_log_level() {
        let mut config = Config::default();
        assert_eq!(config.log_level(false), tracing::Level::INFO);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);

        // The config file alone turns on debug output.
        config = toml::from_str("[general]\nverbose = true").unwrap();
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[report]"));
        assert!(!toml_str.contains("[[taxonomy]]"));
    }
}
