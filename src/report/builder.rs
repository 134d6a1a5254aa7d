//! Report assembly.
//!
//! Resolves a course, a filter and the taxonomy registry into the report
//! structures rendered by [`super::generator`].

use crate::analysis::dashboard;
use crate::analysis::{
    self, CaseRollup, CaseRow, CourseFilter, CourseKpis, CourseListing, CrossTab, DayBreakdown,
    DomainBreakdown, GroupCaseSummary, GroupPerformance, ParticipantSummary, RecordFilter,
    ScenarioSummaryRow, SettingBreakdown, SettingSummaryRow, SkillMatrix, Stat,
};
use crate::dataset::{Dataset, DatasetResult};
use crate::models::{Case, Course, Observation, Participant, Protocol, Scenario, TrainingGroup};
use crate::taxonomy::{Taxonomy, TaxonomyRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Metadata shared by every report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub course_id: String,
    pub protocol: Protocol,
    pub location: String,
    /// Human-readable descriptions of the filters applied.
    pub filters: Vec<String>,
    pub observations: usize,
    pub cases: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub group: Option<TrainingGroup>,
    pub job_title: Option<String>,
    pub center_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantOverview {
    pub cases: usize,
    pub skills: usize,
    pub overall: Stat,
    pub case_rollup: CaseRollup,
}

/// Domain breakdown for one age group; `scenario` is `None` when the
/// section spans the whole protocol or holds untagged records.
#[derive(Debug, Clone, Serialize)]
pub struct DomainSection {
    pub scenario: Option<Scenario>,
    pub domains: Vec<DomainBreakdown>,
}

/// Everything recorded for one participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub metadata: ReportMetadata,
    pub participant: ParticipantInfo,
    pub summary: ParticipantOverview,
    pub by_day: Vec<DayBreakdown>,
    pub by_setting: Vec<SettingBreakdown>,
    pub by_domain: Vec<DomainSection>,
    pub cases: Vec<CaseRow>,
}

/// Course-wide performance.
#[derive(Debug, Clone, Serialize)]
pub struct CourseReport {
    pub metadata: ReportMetadata,
    pub course: Course,
    pub overall: Stat,
    pub groups: GroupPerformance,
    pub participants: Vec<ParticipantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Vec<SettingSummaryRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<ScenarioSummaryRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_summary: Option<Vec<GroupCaseSummary>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMatrices {
    pub group: TrainingGroup,
    pub matrices: Vec<SkillMatrix>,
}

/// Skill × participant matrices, one set per training group.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixReport {
    pub metadata: ReportMetadata,
    pub overall: Stat,
    pub groups: Vec<GroupMatrices>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetadata {
    pub generated_at: DateTime<Utc>,
    pub filters: Vec<String>,
}

/// Course and participant counts across every course matching the filter.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: DashboardMetadata,
    pub kpis: CourseKpis,
    pub by_state: CrossTab,
    pub by_cadre: CrossTab,
    pub courses: Vec<CourseListing>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Participant(ParticipantReport),
    Course(CourseReport),
    Matrix(MatrixReport),
    Dashboard(DashboardReport),
}

impl Report {
    /// Record counts for the console summary.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        let observed = |m: &ReportMetadata| vec![("Cases", m.cases), ("Observations", m.observations)];
        match self {
            Report::Participant(r) => observed(&r.metadata),
            Report::Course(r) => observed(&r.metadata),
            Report::Matrix(r) => observed(&r.metadata),
            Report::Dashboard(r) => vec![
                ("Courses", r.kpis.courses),
                ("Participants", r.kpis.participants),
            ],
        }
    }

    /// Overall percentage across every observation in the report; `None`
    /// for reports that do not score observations.
    pub fn overall_percentage(&self) -> Option<f64> {
        match self {
            Report::Participant(r) => Some(r.summary.overall.percentage()),
            Report::Course(r) => Some(r.overall.percentage()),
            Report::Matrix(r) => Some(r.overall.percentage()),
            Report::Dashboard(_) => None,
        }
    }
}

/// Describe the active filter criteria for report headers.
pub fn describe_filter(filter: &RecordFilter) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(day) = filter.day {
        parts.push(format!("Day {}", day));
    }
    if let Some(setting) = filter.setting {
        parts.push(format!("Setting {}", setting));
    }
    if let Some(group) = filter.group {
        parts.push(group.to_string());
    }
    if let Some(scenario) = filter.scenario {
        parts.push(format!("Scenario {}", scenario.label()));
    }
    if let Some(ref domain) = filter.domain {
        parts.push(format!("Domain {}", domain));
    }
    if let Some(ref item) = filter.item {
        parts.push(format!("Item {}", item));
    }
    parts
}

/// Inputs shared by all report builders.
pub struct ReportContext<'a> {
    pub dataset: &'a Dataset,
    pub course: &'a Course,
    pub registry: &'a TaxonomyRegistry,
    filter: RecordFilter,
}

impl<'a> ReportContext<'a> {
    /// The filter is scoped to `course` regardless of its course criterion.
    pub fn new(
        dataset: &'a Dataset,
        course: &'a Course,
        registry: &'a TaxonomyRegistry,
        mut filter: RecordFilter,
    ) -> Self {
        filter.course = Some(course.id.clone());
        Self {
            dataset,
            course,
            registry,
            filter,
        }
    }

    fn protocol(&self) -> Protocol {
        self.course.course_type
    }

    /// Taxonomy for domain ordering: the filtered scenario, or the whole protocol.
    fn taxonomy(&self) -> Taxonomy {
        match self.filter.scenario {
            Some(scenario) => self.registry.scenario(scenario).clone(),
            None => self.registry.protocol(self.protocol()),
        }
    }

    /// Course participants, restricted to the filtered group.
    fn roster(&self) -> Vec<Participant> {
        let mut roster = self.dataset.participants_for(&self.course.id);
        if let Some(group) = self.filter.group {
            roster.retain(|p| p.group == Some(group));
        }
        roster
    }

    /// Domain sections for a participant report. Multi-age-group protocols
    /// get one section per age group unless a scenario filter is set.
    fn domain_sections(&self, observations: &[&Observation]) -> Vec<DomainSection> {
        let protocol = self.protocol();
        if self.filter.scenario.is_some() || !protocol.splits_domains_by_scenario() {
            return vec![DomainSection {
                scenario: self.filter.scenario,
                domains: analysis::by_domain(&self.taxonomy(), protocol, observations),
            }];
        }

        let scenarios = protocol.scenarios();
        let mut sections: Vec<DomainSection> = scenarios
            .iter()
            .filter_map(|scenario| {
                let own: Vec<&Observation> = observations
                    .iter()
                    .copied()
                    .filter(|o| o.scenario == Some(*scenario))
                    .collect();
                (!own.is_empty()).then(|| DomainSection {
                    scenario: Some(*scenario),
                    domains: analysis::by_domain(
                        self.registry.scenario(*scenario),
                        protocol,
                        &own,
                    ),
                })
            })
            .collect();

        let untagged: Vec<&Observation> = observations
            .iter()
            .copied()
            .filter(|o| !o.scenario.is_some_and(|s| scenarios.contains(&s)))
            .collect();
        if !untagged.is_empty() || sections.is_empty() {
            sections.push(DomainSection {
                scenario: None,
                domains: analysis::by_domain(&self.taxonomy(), protocol, &untagged),
            });
        }

        sections
    }

    fn records(
        &self,
        filter: &RecordFilter,
        participants: &[Participant],
    ) -> (Vec<&'a Observation>, Vec<&'a Case>) {
        let dataset: &'a Dataset = self.dataset;
        let bound = filter.bind(participants);
        let observations = bound.observations(&dataset.observations);
        let cases = bound.cases(&dataset.cases);
        debug!(
            "Filter kept {} of {} observations, {} of {} cases",
            observations.len(),
            dataset.observations.len(),
            cases.len(),
            dataset.cases.len()
        );
        (observations, cases)
    }

    fn metadata(&self, observations: usize, cases: usize) -> ReportMetadata {
        ReportMetadata {
            generated_at: Utc::now(),
            course_id: self.course.id.clone(),
            protocol: self.protocol(),
            location: self.course.location(),
            filters: describe_filter(&self.filter),
            observations,
            cases,
        }
    }
}

/// Build the report for one participant of the course.
pub fn build_participant_report(
    ctx: &ReportContext<'_>,
    participant_id: &str,
) -> DatasetResult<ParticipantReport> {
    let participant = ctx.dataset.participant(&ctx.course.id, participant_id)?;
    let protocol = ctx.protocol();

    let mut filter = ctx.filter.clone();
    filter.participant = Some(participant.id.clone());
    let roster = ctx.dataset.participants_for(&ctx.course.id);
    let (observations, cases) = ctx.records(&filter, &roster);

    let overall = analysis::summarize(protocol, &observations);

    Ok(ParticipantReport {
        metadata: ctx.metadata(observations.len(), cases.len()),
        participant: ParticipantInfo {
            id: participant.id.clone(),
            name: participant.name.clone(),
            group: participant.group,
            job_title: participant.job_title.clone(),
            center_name: participant.center_name.clone(),
        },
        summary: ParticipantOverview {
            cases: cases.len(),
            skills: overall.total,
            overall: overall.stat(protocol),
            case_rollup: analysis::case_rollup(&cases),
        },
        by_day: analysis::by_day(protocol, &observations),
        by_setting: analysis::by_setting(protocol, &observations),
        by_domain: ctx.domain_sections(&observations),
        cases: analysis::case_rows(protocol, &cases, &observations),
    })
}

/// Build the course report: groups, roster, and the protocol-specific summary.
pub fn build_course_report(ctx: &ReportContext<'_>) -> CourseReport {
    let protocol = ctx.protocol();
    let roster = ctx.roster();
    let (observations, cases) = ctx.records(&ctx.filter, &roster);

    let overall = analysis::summarize(protocol, &observations);

    let settings = protocol
        .has_settings()
        .then(|| analysis::setting_summary(&roster, &cases, &observations));
    let scenarios = protocol
        .is_scored()
        .then(|| analysis::scenario_summary(&roster, &cases, &observations));
    let case_summary = protocol
        .has_case_summary()
        .then(|| analysis::case_summary(&roster, &cases));

    CourseReport {
        metadata: ctx.metadata(observations.len(), cases.len()),
        course: ctx.course.clone(),
        overall: overall.stat(protocol),
        groups: analysis::by_group(protocol, &roster, &cases, &observations),
        participants: analysis::participant_summaries(protocol, &roster, &cases, &observations),
        settings,
        scenarios,
        case_summary,
    }
}

/// Build skill matrices for every group with participants.
pub fn build_matrix_report(ctx: &ReportContext<'_>) -> MatrixReport {
    let protocol = ctx.protocol();
    let roster = ctx.roster();
    let (observations, cases) = ctx.records(&ctx.filter, &roster);

    let scenarios: Vec<_> = match ctx.filter.scenario {
        Some(scenario) => vec![scenario],
        None => protocol.scenarios().to_vec(),
    };

    let groups = TrainingGroup::ALL
        .iter()
        .filter_map(|group| {
            let members: Vec<&Participant> =
                roster.iter().filter(|p| p.group == Some(*group)).collect();
            if members.is_empty() {
                return None;
            }
            let matrices = scenarios
                .iter()
                .map(|scenario| {
                    analysis::skill_matrix(
                        ctx.registry.scenario(*scenario),
                        *scenario,
                        &members,
                        &observations,
                    )
                })
                .collect();
            Some(GroupMatrices {
                group: *group,
                matrices,
            })
        })
        .collect();

    MatrixReport {
        metadata: ctx.metadata(observations.len(), cases.len()),
        overall: analysis::summarize(protocol, &observations).stat(protocol),
        groups,
    }
}

/// Build the cross-course dashboard.
pub fn build_dashboard_report(dataset: &Dataset, filter: &CourseFilter) -> DashboardReport {
    let courses = filter.courses(&dataset.courses);
    debug!(
        "Dashboard filter kept {} of {} courses",
        courses.len(),
        dataset.courses.len()
    );

    DashboardReport {
        metadata: DashboardMetadata {
            generated_at: Utc::now(),
            filters: filter.describe(),
        },
        kpis: dashboard::course_kpis(&courses, &dataset.participants),
        by_state: dashboard::courses_by_state(&courses),
        by_cadre: dashboard::trained_by_cadre(&courses, &dataset.participants),
        courses: dashboard::course_listing(&courses, &dataset.participants),
    }
}
