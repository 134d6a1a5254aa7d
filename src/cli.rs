//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{CareSetting, Protocol, Scenario, TrainingGroup};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coursemon - performance reports for clinical-training courses
///
/// Reads an exported monitoring snapshot (courses, participants, cases and
/// observations) and writes participant, course, skill-matrix or
/// cross-course dashboard reports.
///
/// Examples:
///   coursemon --data export.json --course abc123
///   coursemon --data export/ --course abc123 --report participant --participant p42
///   coursemon --data export.json --report matrix --group a --scenario ge2m-le5y
///   coursemon --data export.json --format json --fail-below 60
///   coursemon --data export.json --report dashboard --course-type etat --year 2024
///   coursemon --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Exported dataset: a JSON file or a directory of per-collection JSON files
    #[arg(
        short,
        long,
        value_name = "PATH",
        required_unless_present = "init_config",
        env = "COURSEMON_DATA"
    )]
    pub data: Option<PathBuf>,

    /// Course to report on
    ///
    /// May be omitted when the dataset holds exactly one course.
    #[arg(short = 'C', long, value_name = "ID")]
    pub course: Option<String>,

    /// Report to generate
    #[arg(short, long, default_value = "course", value_name = "KIND")]
    pub report: ReportKind,

    /// Participant for the participant report
    #[arg(short, long, value_name = "ID")]
    pub participant: Option<String>,

    /// Output file path for the report
    ///
    /// Defaults to the config file value, then coursemon_report.md.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Only include records from this day of the course
    #[arg(long, value_name = "DAY")]
    pub day: Option<u32>,

    /// Only include records from this care setting
    #[arg(long, value_name = "SETTING")]
    pub setting: Option<SettingArg>,

    /// Only include participants from this training group
    #[arg(short, long, value_name = "GROUP")]
    pub group: Option<GroupArg>,

    /// Only include this age group or scenario
    #[arg(long, value_name = "SCENARIO")]
    pub scenario: Option<ScenarioArg>,

    /// Only include observations of this domain key (e.g. airway_breathing)
    #[arg(long, value_name = "KEY")]
    pub domain: Option<String>,

    /// Only include observations of this skill text
    #[arg(long, value_name = "TEXT", requires = "domain")]
    pub item: Option<String>,

    /// Dashboard: only courses of this type
    #[arg(long, value_name = "TYPE")]
    pub course_type: Option<ProtocolArg>,

    /// Dashboard: only courses held in this state
    #[arg(long, value_name = "NAME")]
    pub state: Option<String>,

    /// Dashboard: only courses held in this locality
    #[arg(long, value_name = "NAME", requires = "state")]
    pub locality: Option<String>,

    /// Dashboard: only courses starting in this year
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// Dashboard: only courses starting in this month (1-12)
    #[arg(long, value_name = "MONTH")]
    pub month: Option<u32>,

    /// Drop a participant and their cases and observations before reporting
    ///
    /// May be repeated.
    #[arg(long, value_name = "ID")]
    pub exclude_participant: Vec<String>,

    /// Drop a case and its observations before reporting
    ///
    /// May be repeated.
    #[arg(long, value_name = "ID")]
    pub exclude_case: Vec<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .coursemon.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Leave per-skill rows out of domain tables
    #[arg(long)]
    pub no_skills: bool,

    /// Exit with code 2 when overall correctness is below this percentage
    ///
    /// Useful for scripted checks. A report with no observations also fails.
    #[arg(long, value_name = "PCT")]
    pub fail_below: Option<f64>,

    /// Generate a default .coursemon.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Report kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportKind {
    /// One participant: summary, days, settings, domains, cases
    Participant,
    /// Whole course: groups, roster performance, setting or scenario summary
    #[default]
    Course,
    /// Skill by participant matrix per group
    Matrix,
    /// Course and participant counts across courses
    Dashboard,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Care setting for --setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SettingArg {
    Opd,
    Ipd,
}

/// Training group for --group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GroupArg {
    A,
    B,
    C,
    D,
}

/// Course type for --course-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProtocolArg {
    Imnci,
    Etat,
    Eenc,
}

/// Age group or scenario for --scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioArg {
    /// IMNCI 0-59 days
    Lt2m,
    /// IMNCI 2-59 months
    Ge2mLe5y,
    Etat,
    /// EENC breathing baby
    Breathing,
    /// EENC not breathing baby
    NotBreathing,
}

impl From<SettingArg> for CareSetting {
    fn from(arg: SettingArg) -> Self {
        match arg {
            SettingArg::Opd => CareSetting::OutPatient,
            SettingArg::Ipd => CareSetting::InPatient,
        }
    }
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Imnci => Protocol::Imnci,
            ProtocolArg::Etat => Protocol::Etat,
            ProtocolArg::Eenc => Protocol::Eenc,
        }
    }
}

impl From<GroupArg> for TrainingGroup {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::A => TrainingGroup::A,
            GroupArg::B => TrainingGroup::B,
            GroupArg::C => TrainingGroup::C,
            GroupArg::D => TrainingGroup::D,
        }
    }
}

impl From<ScenarioArg> for Scenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Lt2m => Scenario::Under2Months,
            ScenarioArg::Ge2mLe5y => Scenario::From2MonthsTo5Years,
            ScenarioArg::Etat => Scenario::Etat,
            ScenarioArg::Breathing => Scenario::Breathing,
            ScenarioArg::NotBreathing => Scenario::NotBreathing,
        }
    }
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

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.report == ReportKind::Participant && self.participant.is_none() {
            return Err("The participant report requires --participant".to_string());
        }

        if let Some(day) = self.day {
            if day == 0 {
                return Err("Day of course starts at 1".to_string());
            }
        }

        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err("--month must be between 1 and 12".to_string());
            }
        }

        if self.report == ReportKind::Dashboard {
            if self.has_record_filters() {
                return Err(
                    "The dashboard report takes --course-type, --state, --locality, --year and --month; \
                     course and record filters do not apply"
                        .to_string(),
                );
            }
            if self.fail_below.is_some() {
                return Err("--fail-below does not apply to the dashboard report".to_string());
            }
        } else if self.has_course_filters() {
            return Err(
                "--course-type, --state, --locality, --year and --month only apply to the dashboard report"
                    .to_string(),
            );
        }

        if let Some(threshold) = self.fail_below {
            if !(0.0..=100.0).contains(&threshold) {
                return Err("--fail-below must be between 0 and 100".to_string());
            }
        }

        // Validate data path if provided
        if let Some(ref data) = self.data {
            if !data.exists() {
                return Err(format!("Data path does not exist: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Whether any course-scoped record filter was given.
    fn has_record_filters(&self) -> bool {
        self.course.is_some()
            || self.participant.is_some()
            || self.day.is_some()
            || self.setting.is_some()
            || self.group.is_some()
            || self.scenario.is_some()
            || self.domain.is_some()
    }

    /// Whether any dashboard course filter was given.
    fn has_course_filters(&self) -> bool {
        self.course_type.is_some()
            || self.state.is_some()
            || self.locality.is_some()
            || self.year.is_some()
            || self.month.is_some()
    }
}
