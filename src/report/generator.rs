//! Markdown report generation.
//!
//! This module renders participant, course, skill-matrix and dashboard
//! reports as Markdown, and all of them as JSON.

use super::builder::{
    CourseReport, DashboardReport, DomainSection, GroupMatrices, MatrixReport, ParticipantReport,
    Report, ReportMetadata,
};
use crate::analysis::{
    band, format_percentage, Band, Cell, CrossTab, DomainBreakdown, GroupCaseSummary,
    GroupPerformance, ScenarioSummaryRow, ScoreTotals, SeenCorrect, SettingSummaryRow,
    SkillMatrix, Stat,
};
use crate::config::ReportConfig;
use crate::models::{Course, Protocol, TrainingGroup};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = match report {
        Report::Participant(r) => generate_participant_report(r, options),
        Report::Course(r) => generate_course_report(r),
        Report::Matrix(r) => generate_matrix_report(r, options),
        Report::Dashboard(r) => generate_dashboard_report(r),
    };

    output.push_str(&generate_footer());
    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Percentage with its band marker, e.g. `🟢 85 %`.
fn banded(value: f64) -> String {
    match band(value) {
        Band::None => format_percentage(value),
        b => format!("{} {}", b.emoji(), format_percentage(value)),
    }
}

fn result_header(protocol: Protocol) -> &'static str {
    if protocol.is_scored() {
        "Score / Max"
    } else {
        "Correct / Seen"
    }
}

fn group_name(group: Option<TrainingGroup>) -> &'static str {
    group.map(|g| g.name()).unwrap_or("-")
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Course:** `{}`\n", metadata.course_id));
    section.push_str(&format!("- **Protocol:** {}\n", metadata.protocol));
    section.push_str(&format!("- **Location:** {}\n", metadata.location));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if !metadata.filters.is_empty() {
        section.push_str(&format!("- **Filters:** {}\n", metadata.filters.join(", ")));
    }
    section.push_str(&format!("- **Cases:** {}\n", metadata.cases));
    section.push_str(&format!("- **Observations:** {}\n", metadata.observations));
    section.push('\n');

    section
}

fn generate_participant_report(report: &ParticipantReport, options: &ReportConfig) -> String {
    let protocol = report.metadata.protocol;
    let mut output = String::new();

    output.push_str(&format!(
        "# Participant Report: {}\n\n",
        report.participant.name
    ));
    output.push_str(&generate_metadata_section(&report.metadata));

    // Participant details
    output.push_str("## Participant\n\n");
    output.push_str(&format!("- **ID:** `{}`\n", report.participant.id));
    output.push_str(&format!(
        "- **Group:** {}\n",
        group_name(report.participant.group)
    ));
    if let Some(ref job) = report.participant.job_title {
        output.push_str(&format!("- **Job Title:** {}\n", job));
    }
    if let Some(ref center) = report.participant.center_name {
        output.push_str(&format!("- **Health Center:** {}\n", center));
    }
    output.push('\n');

    // Summary
    let summary = &report.summary;
    output.push_str("## Summary\n\n");
    output.push_str(&format!(
        "| Cases | Skills Observed | {} | Overall | Cases All Correct |\n",
        result_header(protocol)
    ));
    output.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {} | {} | {} | {}/{} ({}) |\n\n",
        summary.cases,
        summary.skills,
        summary.overall.fraction(),
        banded(summary.overall.percentage()),
        summary.case_rollup.all_correct,
        summary.case_rollup.total,
        format_percentage(summary.case_rollup.percentage)
    ));

    // By day
    if !report.by_day.is_empty() {
        output.push_str("## Performance by Day\n\n");
        output.push_str(&format!(
            "| Day | {} | Percentage |\n",
            result_header(protocol)
        ));
        output.push_str("|:---:|:---:|:---:|\n");
        for row in &report.by_day {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                row.day,
                row.stat.fraction(),
                banded(row.stat.percentage())
            ));
        }
        output.push('\n');
    }

    // By setting
    if !report.by_setting.is_empty() {
        output.push_str("## Performance by Setting\n\n");
        output.push_str(&format!(
            "| Setting | {} | Percentage |\n",
            result_header(protocol)
        ));
        output.push_str("|:---|:---:|:---:|\n");
        for row in &report.by_setting {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                row.setting,
                row.stat.fraction(),
                banded(row.stat.percentage())
            ));
        }
        output.push('\n');
    }

    output.push_str(&generate_domain_section(
        &report.by_domain,
        protocol,
        options.include_skills,
    ));

    if options.include_cases {
        output.push_str(&generate_cases_section(report, options.max_case_rows));
    }

    output
}

/// Generate the per-domain section, one subsection per age group when the
/// report is split.
fn generate_domain_section(
    sections: &[DomainSection],
    protocol: Protocol,
    include_skills: bool,
) -> String {
    let mut section = String::new();

    section.push_str("## Performance by Domain\n\n");

    if sections.iter().all(|s| s.domains.is_empty()) {
        section.push_str("No observations recorded.\n\n");
        return section;
    }

    let split = sections.len() > 1;
    for part in sections.iter().filter(|s| !s.domains.is_empty()) {
        let heading = if split {
            let title = part.scenario.map(|s| s.label()).unwrap_or("Untagged records");
            section.push_str(&format!("### Age Group: {}\n\n", title));
            "####"
        } else {
            "###"
        };
        section.push_str(&generate_domain_tables(
            &part.domains,
            protocol,
            include_skills,
            heading,
        ));
    }

    section
}

/// Domain table followed by one skill table per domain under `heading`.
fn generate_domain_tables(
    domains: &[DomainBreakdown],
    protocol: Protocol,
    include_skills: bool,
    heading: &str,
) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "| Domain | {} | Percentage |\n",
        result_header(protocol)
    ));
    section.push_str("|:---|:---:|:---:|\n");
    for domain in domains {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            domain.label,
            domain.stat.fraction(),
            banded(domain.stat.percentage())
        ));
    }
    section.push('\n');

    if !include_skills {
        return section;
    }

    for domain in domains {
        section.push_str(&format!("{} {}\n\n", heading, domain.label));
        section.push_str(&format!(
            "| Skill | {} | Percentage |\n",
            result_header(protocol)
        ));
        section.push_str("|:---|:---:|:---:|\n");
        for skill in &domain.skills {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                skill.item,
                skill.stat.fraction(),
                banded(skill.stat.percentage())
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_cases_section(report: &ParticipantReport, max_rows: usize) -> String {
    let mut section = String::new();
    let protocol = report.metadata.protocol;

    section.push_str("## Cases\n\n");

    if report.cases.is_empty() {
        section.push_str("No cases recorded.\n\n");
        return section;
    }

    section.push_str(&format!(
        "| Date | Serial | Day | Setting | Age Group | {} | Percentage | All Correct |\n",
        result_header(protocol)
    ));
    section.push_str("|:---|:---:|:---:|:---:|:---|:---:|:---:|:---:|\n");

    let limit = if max_rows == 0 {
        report.cases.len()
    } else {
        max_rows
    };
    for row in report.cases.iter().take(limit) {
        let setting = if protocol.has_settings() {
            row.setting.code()
        } else {
            "-"
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            row.encounter_date,
            row.serial,
            row.day,
            setting,
            row.scenario.map(|s| s.label()).unwrap_or("-"),
            row.stat.fraction(),
            banded(row.stat.percentage()),
            if row.all_correct { "✅" } else { "❌" }
        ));
    }
    section.push('\n');

    if report.cases.len() > limit {
        section.push_str(&format!(
            "*Showing {} of {} cases.*\n\n",
            limit,
            report.cases.len()
        ));
    }

    section
}

fn generate_course_report(report: &CourseReport) -> String {
    let protocol = report.metadata.protocol;
    let mut output = String::new();

    output.push_str(&format!("# Course Report: {}\n\n", protocol));
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_course_details(&report.course));
    output.push_str(&generate_group_section(&report.groups, protocol));

    // Participant performance
    output.push_str("## Participant Performance\n\n");
    output.push_str(&format!(
        "**Overall:** {} ({})\n\n",
        banded(report.overall.percentage()),
        report.overall.fraction()
    ));
    output.push_str(&format!(
        "| Participant | Group | Cases | Skills | {} | Percentage |\n",
        result_header(protocol)
    ));
    output.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for row in &report.participants {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            row.name,
            group_name(row.group),
            row.cases,
            row.skills,
            row.stat.fraction(),
            banded(row.stat.percentage())
        ));
    }
    output.push('\n');

    if let Some(ref rows) = report.settings {
        output.push_str(&generate_setting_summary(rows));
    }
    if let Some(ref rows) = report.scenarios {
        output.push_str(&generate_scenario_summary(rows));
    }
    if let Some(ref groups) = report.case_summary {
        output.push_str(&generate_case_summary(groups));
    }

    output
}

fn generate_course_details(course: &Course) -> String {
    let mut section = String::new();

    section.push_str("## Course Details\n\n");
    let fields = [
        ("State", course.state.as_deref()),
        ("Locality", course.locality.as_deref()),
        ("Hall", course.hall.as_deref()),
        ("Coordinator", course.coordinator.as_deref()),
        ("Course Director", course.director.as_deref()),
        ("Clinical Instructor", course.clinical_instructor.as_deref()),
        ("Funded By", course.funded_by.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            section.push_str(&format!("- **{}:** {}\n", label, value));
        }
    }
    if !course.facilitators.is_empty() {
        section.push_str(&format!(
            "- **Facilitators:** {}\n",
            course.facilitators.join(", ")
        ));
    }
    if let Some(count) = course.participants_count {
        section.push_str(&format!("- **Planned Participants:** {}\n", count));
    }
    section.push('\n');

    section
}

/// Generate the group performance table with its grand total.
fn generate_group_section(groups: &GroupPerformance, protocol: Protocol) -> String {
    let mut section = String::new();

    section.push_str("## Group Performance\n\n");
    section.push_str(&format!(
        "| Group | Participants | Cases | Skills | {} | Percentage |\n",
        result_header(protocol)
    ));
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for row in &groups.groups {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            row.group,
            row.participant_count,
            row.total_cases,
            row.tally.total,
            row.stat.fraction(),
            banded(row.stat.percentage())
        ));
    }
    let total = &groups.total;
    section.push_str(&format!(
        "| **Total** | **{}** | **{}** | **{}** | **{}** | **{}** |\n\n",
        total.participant_count,
        total.total_cases,
        total.tally.total,
        total.stat.fraction(),
        format_percentage(total.stat.percentage())
    ));
    section.push_str(&format!(
        "- **Average cases per participant:** {:.1}\n",
        total.avg_cases
    ));
    section.push_str(&format!(
        "- **Average skills per participant:** {:.1}\n\n",
        total.avg_skills
    ));

    section
}

fn seen_correct(value: &SeenCorrect) -> String {
    format!(
        "{}/{} ({})",
        value.correct,
        value.seen,
        format_percentage(value.percentage())
    )
}

fn generate_setting_summary(rows: &[SettingSummaryRow]) -> String {
    let mut section = String::new();

    section.push_str("## In-patient vs Out-patient\n\n");
    section.push_str(
        "| Participant | Group | IPD Cases | OPD Cases | IPD Classifications | OPD Classifications | All Classifications |\n",
    );
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            row.name,
            group_name(row.group),
            seen_correct(&row.cases_in_patient),
            seen_correct(&row.cases_out_patient),
            seen_correct(&row.items_in_patient),
            seen_correct(&row.items_out_patient),
            seen_correct(&row.items_in_patient.combined(&row.items_out_patient))
        ));
    }
    section.push('\n');

    section
}

fn score_totals(value: &ScoreTotals) -> String {
    format!(
        "{} cases, {}/{} ({})",
        value.cases,
        value.score,
        value.max_score,
        format_percentage(value.percentage())
    )
}

fn generate_scenario_summary(rows: &[ScenarioSummaryRow]) -> String {
    let mut section = String::new();

    section.push_str("## Breathing vs Not Breathing\n\n");
    section.push_str("| Participant | Group | All Cases | Breathing | Not Breathing |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.name,
            group_name(row.group),
            score_totals(&row.total),
            score_totals(&row.breathing),
            score_totals(&row.not_breathing)
        ));
    }
    section.push('\n');

    section
}

fn generate_case_summary(groups: &[GroupCaseSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Case Summary\n\n");
    if groups.is_empty() {
        section.push_str("No participants are assigned to a training group.\n\n");
        return section;
    }

    for group in groups {
        section.push_str(&format!("### {}\n\n", group.group));
        section.push_str("| Participant | Total Cases | Correct Cases | % Correct |\n");
        section.push_str("|:---|:---:|:---:|:---:|\n");
        for row in &group.participants {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                row.name,
                row.cases.total,
                row.cases.all_correct,
                banded(row.cases.percentage)
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_matrix_report(report: &MatrixReport, options: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Skill Matrix: {}\n\n",
        report.metadata.protocol
    ));
    output.push_str(&generate_metadata_section(&report.metadata));

    if report.groups.is_empty() {
        output.push_str("No participants are assigned to a training group.\n\n");
        return output;
    }

    for group in &report.groups {
        output.push_str(&generate_group_matrices(group));
    }

    if options.include_matrix_legend {
        output.push_str(&generate_matrix_legend());
    }

    output
}

fn generate_group_matrices(group: &GroupMatrices) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", group.group));
    for matrix in &group.matrices {
        section.push_str(&generate_matrix_table(matrix));
    }

    section
}

/// Render one cell: `correct/total (pct)` or, when scored, `average (pct)`.
fn matrix_cell(cell: &Cell) -> String {
    match cell {
        Cell::NotApplicable => "N/A".to_string(),
        Cell::Observed {
            stat,
            average_score,
        } => {
            let value = match stat {
                Stat::Binary { total, correct, .. } => format!("{}/{}", correct, total),
                Stat::Scored { .. } => format!("{:.1}", average_score),
            };
            format!("{} ({})", value, banded(cell.percentage()))
        }
    }
}

fn generate_matrix_table(matrix: &SkillMatrix) -> String {
    let mut section = String::new();

    section.push_str(&format!("### {}\n\n", matrix.scenario.label()));

    if !matrix.has_data() {
        section.push_str("No observations recorded for this group.\n\n");
        return section;
    }

    section.push_str("| Skill |");
    for column in &matrix.columns {
        section.push_str(&format!(" {} |", column.name));
    }
    section.push('\n');
    section.push_str("|:---|");
    for _ in &matrix.columns {
        section.push_str(":---:|");
    }
    section.push('\n');

    for domain in &matrix.domains {
        section.push_str(&format!("| **{}** |", domain.label));
        for _ in &matrix.columns {
            section.push_str(" |");
        }
        section.push('\n');

        for row in &domain.rows {
            section.push_str(&format!("| {} |", row.item));
            for cell in &row.cells {
                section.push_str(&format!(" {} |", matrix_cell(cell)));
            }
            section.push('\n');
        }
    }
    section.push('\n');

    section
}

fn generate_matrix_legend() -> String {
    format!(
        "**Legend:** {} above 80 % | {} 50 to 80 % | {} below 50 % | N/A not observed\n\n",
        Band::High.emoji(),
        Band::Medium.emoji(),
        Band::Low.emoji()
    )
}

fn generate_dashboard_report(report: &DashboardReport) -> String {
    let mut output = String::new();

    output.push_str("# Training Dashboard\n\n");

    output.push_str("## Metadata\n\n");
    output.push_str(&format!(
        "- **Generated:** {}\n",
        report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if !report.metadata.filters.is_empty() {
        output.push_str(&format!(
            "- **Filters:** {}\n",
            report.metadata.filters.join(", ")
        ));
    }
    output.push('\n');

    let kpis = &report.kpis;
    output.push_str("## Courses and Participants\n\n");
    output.push_str("| Course Type | Courses | Participants |\n");
    output.push_str("|:---|:---:|:---:|\n");
    for row in &kpis.by_protocol {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            row.protocol, row.courses, row.participants
        ));
    }
    output.push_str(&format!(
        "| **Total** | **{}** | **{}** |\n\n",
        kpis.courses, kpis.participants
    ));

    output.push_str("## Courses by State\n\n");
    output.push_str(&generate_cross_tab("State", &report.by_state));
    output.push_str("## Participants by Health Cadre\n\n");
    output.push_str(&generate_cross_tab("Health Cadre", &report.by_cadre));

    output.push_str("## Course List\n\n");
    if report.courses.is_empty() {
        output.push_str("No courses match the filters.\n\n");
        return output;
    }
    output.push_str("| Course Type | State | Locality | Course Director | Start Date | Participants |\n");
    output.push_str("|:---|:---|:---|:---|:---:|:---:|\n");
    for course in &report.courses {
        let participants = match course.planned {
            Some(planned) => format!("{} / {}", course.participants, planned),
            None => course.participants.to_string(),
        };
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            course.protocol,
            course.state.as_deref().unwrap_or("-"),
            course.locality.as_deref().unwrap_or("-"),
            course.director.as_deref().unwrap_or("-"),
            course.start_date.as_deref().unwrap_or("-"),
            participants
        ));
    }
    output.push('\n');

    output
}

/// Label × protocol table with a total column and a total row.
fn generate_cross_tab(label: &str, table: &CrossTab) -> String {
    let mut section = String::new();

    if table.is_empty() {
        section.push_str("No courses match the filters.\n\n");
        return section;
    }

    section.push_str(&format!("| {} |", label));
    for protocol in &table.columns {
        section.push_str(&format!(" {} |", protocol));
    }
    section.push_str(" Total |\n|:---|");
    for _ in &table.columns {
        section.push_str(":---:|");
    }
    section.push_str(":---:|\n");

    for row in &table.rows {
        section.push_str(&format!("| {} |", row.label));
        for count in &row.counts {
            section.push_str(&format!(" {} |", count));
        }
        section.push_str(&format!(" {} |\n", row.total));
    }

    section.push_str("| **Total** |");
    for total in &table.totals {
        section.push_str(&format!(" **{}** |", total));
    }
    section.push_str(&format!(" **{}** |\n\n", table.grand_total));

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by coursemon*\n");

    footer
}
