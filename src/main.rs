//! Coursemon - clinical training course monitoring reports
//!
//! A CLI tool that aggregates facilitator observations from IMNCI, ETAT
//! and EENC courses into participant, course and skill-matrix reports, and
//! counts courses and trained participants across courses.
//!
//! Exit codes:
//!   0 - Success (overall percentage at or above --fail-below, or no threshold set)
//!   1 - Runtime error (unreadable dataset, unknown course, bad config, etc.)
//!   2 - Overall percentage below --fail-below, or no observations to score

mod analysis;
mod cli;
mod config;
mod dataset;
mod models;
mod report;
mod taxonomy;

use analysis::{format_percentage, CourseFilter, RecordFilter};
use anyhow::{bail, Context, Result};
use cli::{Args, OutputFormat, ReportKind};
use config::{Config, DEFAULT_CONFIG_FILE};
use dataset::Dataset;
use models::{Course, Scenario};
use report::{Report, ReportContext};
use std::path::Path;
use std::time::Instant;
use taxonomy::TaxonomyRegistry;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
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

    // Load configuration before logging so [general].verbose applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("Coursemon v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .coursemon.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

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
    println!("   Edit it to change report sections or replace a curriculum.");
    Ok(())
}

/// Initialize logging at the merged verbosity level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
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

/// Load the dataset, build the requested report and write it. Returns the exit code.
fn run_report(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();
    let registry = TaxonomyRegistry::with_overrides(&config.taxonomy);

    // Step 1: Load the snapshot
    let data_path = args
        .data
        .as_deref()
        .context("--data is required unless --init-config is given")?;
    println!("📥 Loading dataset: {}", data_path.display());
    let mut dataset = Dataset::load(data_path)?;

    if !args.exclude_participant.is_empty() || !args.exclude_case.is_empty() {
        let removed = dataset.exclude(&args.exclude_participant, &args.exclude_case);
        info!("Excluded {} records: {:?}", removed.total(), removed);
    }

    let orphaned = dataset.orphaned_observations();
    if orphaned > 0 {
        warn!("{} observations reference cases missing from the dataset", orphaned);
    }
    let stale = dataset.stale_case_flags();
    if stale > 0 {
        warn!(
            "{} cases carry an all-correct flag that disagrees with their observations",
            stale
        );
    }

    // Step 2: Build the report
    println!("📝 Generating {:?} report...", args.report);
    let report = if args.report == ReportKind::Dashboard {
        let filter = build_course_filter(&args);
        debug!("Course filter: {:?}", filter);
        Report::Dashboard(report::build_dashboard_report(&dataset, &filter))
    } else {
        let course_id = resolve_course(&dataset, args.course.as_deref())?.id.clone();
        let removed = dataset.scope_to_course(&course_id);
        if removed.total() > 0 {
            debug!("Set aside records of other courses: {:?}", removed);
        }
        let course = dataset.course(&course_id)?;
        info!(
            "Course {} ({}, {})",
            course.id,
            course.course_type,
            course.location()
        );

        let filter = build_filter(&args);
        if let Some(scenario) = filter.scenario {
            check_scenario(course, scenario)?;
        }
        if !filter.is_empty() {
            debug!("Filter: {:?}", filter);
        }

        let ctx = ReportContext::new(&dataset, course, &registry, filter);
        match args.report {
            ReportKind::Participant => {
                let participant = args
                    .participant
                    .as_deref()
                    .context("--participant is required for the participant report")?;
                Report::Participant(report::build_participant_report(&ctx, participant)?)
            }
            ReportKind::Matrix => Report::Matrix(report::build_matrix_report(&ctx)),
            ReportKind::Course | ReportKind::Dashboard => {
                Report::Course(report::build_course_report(&ctx))
            }
        }
    };

    // Step 3: Render and save
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    let overall = report.overall_percentage();
    println!("\n📊 Summary:");
    for (label, count) in report.counts() {
        println!("   {}: {}", label, count);
    }
    if let Some(overall) = overall {
        println!("   Overall: {}", format_percentage(overall));
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Report saved to: {}", output_path.display());

    // Check --fail-below threshold
    if let (Some(threshold), Some(overall)) = (args.fail_below, overall) {
        if overall.is_nan() {
            eprintln!("\n⛔ No observations to score. Failing (exit code 2).");
            return Ok(2);
        }
        if overall < threshold {
            eprintln!(
                "\n⛔ Overall {} is below {}. Failing (exit code 2).",
                format_percentage(overall),
                format_percentage(threshold)
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Pick the requested course, or the only one in the snapshot.
fn resolve_course<'a>(dataset: &'a Dataset, course_id: Option<&str>) -> Result<&'a Course> {
    match course_id {
        Some(id) => Ok(dataset.course(id)?),
        None => match dataset.single_course() {
            Some(course) => {
                info!("Using the only course in the dataset: {}", course.id);
                Ok(course)
            }
            None => bail!(
                "Dataset holds {} courses; select one with --course",
                dataset.courses.len()
            ),
        },
    }
}

/// Translate CLI filter flags into a record filter.
fn build_filter(args: &Args) -> RecordFilter {
    RecordFilter {
        day: args.day,
        setting: args.setting.map(Into::into),
        group: args.group.map(Into::into),
        scenario: args.scenario.map(Into::into),
        domain: args.domain.clone(),
        item: args.item.clone(),
        ..RecordFilter::default()
    }
}

/// Translate the dashboard flags into a course filter.
fn build_course_filter(args: &Args) -> CourseFilter {
    CourseFilter {
        protocol: args.course_type.map(Into::into),
        state: args.state.clone(),
        locality: args.locality.clone(),
        year: args.year,
        month: args.month,
    }
}

fn check_scenario(course: &Course, scenario: Scenario) -> Result<()> {
    if scenario.protocol() != course.course_type {
        bail!(
            "Scenario {} does not belong to {} courses",
            scenario.tag(),
            course.course_type
        );
    }
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{GroupArg, ProtocolArg, ScenarioArg};
    use clap::Parser;
    use crate::models::fixtures::course;
    use crate::models::{Protocol, TrainingGroup};

    #[test]
    fn test_resolve_course() {
        let mut dataset = Dataset {
            courses: vec![course(Protocol::Etat)],
            ..Dataset::default()
        };
        assert_eq!(resolve_course(&dataset, None).unwrap().id, "course-1");
        assert!(resolve_course(&dataset, Some("other")).is_err());

        let mut second = course(Protocol::Eenc);
        second.id = "course-2".to_string();
        dataset.courses.push(second);
        assert!(resolve_course(&dataset, None).is_err());
        assert_eq!(
            resolve_course(&dataset, Some("course-2")).unwrap().course_type,
            Protocol::Eenc
        );
    }

    #[test]
    fn test_check_scenario() {
        let imnci = course(Protocol::Imnci);
        assert!(check_scenario(&imnci, Scenario::Under2Months).is_ok());
        assert!(check_scenario(&imnci, Scenario::Breathing).is_err());
    }

    #[test]
    fn test_build_filter() {
        let args = Args::try_parse_from([
            "coursemon",
            "--data",
            "export.json",
            "--group",
            "c",
            "--scenario",
            "etat",
            "--day",
            "3",
        ])
        .unwrap();
        let filter = build_filter(&args);
        assert_eq!(filter.group, Some(TrainingGroup::C));
        assert_eq!(filter.scenario, Some(Scenario::Etat));
        assert_eq!(filter.day, Some(3));
        assert!(filter.setting.is_none());
        assert!(filter.course.is_none());

        // Conversions used by the filter
        assert_eq!(TrainingGroup::from(GroupArg::A), TrainingGroup::A);
        assert_eq!(Scenario::from(ScenarioArg::NotBreathing), Scenario::NotBreathing);
    }

    #[test]
    fn test_build_course_filter() {
        let args = Args::try_parse_from([
            "coursemon",
            "--data",
            "export.json",
            "--report",
            "dashboard",
            "--course-type",
            "imnci",
            "--state",
            "Khartoum",
            "--year",
            "2024",
            "--month",
            "3",
        ])
        .unwrap();

        let filter = build_course_filter(&args);
        assert_eq!(filter.protocol, Some(Protocol::from(ProtocolArg::Imnci)));
        assert_eq!(filter.state.as_deref(), Some("Khartoum"));
        assert!(filter.locality.is_none());
        assert!(filter.matches(&course(Protocol::Imnci)));
        assert!(!filter.matches(&course(Protocol::Etat)));
    }
}
