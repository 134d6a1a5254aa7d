//! Cross-course counts for the training dashboard.
//!
//! These folds work on course and participant records only; no observation
//! is read.

use crate::models::{Course, Participant, Protocol};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Row label for records with no state or job title.
const UNSPECIFIED: &str = "Unspecified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolCount {
    pub protocol: Protocol,
    pub courses: usize,
    pub participants: usize,
}

/// Headline numbers: courses and trained participants per protocol.
#[derive(Debug, Clone, Serialize)]
pub struct CourseKpis {
    pub courses: usize,
    pub participants: usize,
    pub by_protocol: Vec<ProtocolCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossTabRow {
    pub label: String,
    pub counts: Vec<usize>,
    pub total: usize,
}

/// Label × protocol counts with row and column totals.
#[derive(Debug, Clone, Serialize)]
pub struct CrossTab {
    pub columns: Vec<Protocol>,
    pub rows: Vec<CrossTabRow>,
    pub totals: Vec<usize>,
    pub grand_total: usize,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One line of the dashboard course list.
#[derive(Debug, Clone, Serialize)]
pub struct CourseListing {
    pub id: String,
    pub protocol: Protocol,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub director: Option<String>,
    pub start_date: Option<String>,
    /// Participants enrolled in the snapshot.
    pub participants: usize,
    /// Participant count declared on the course.
    pub planned: Option<u32>,
}

/// Protocols present among `courses`, in protocol order.
fn present_protocols(courses: &[&Course]) -> Vec<Protocol> {
    Protocol::ALL
        .iter()
        .copied()
        .filter(|p| courses.iter().any(|c| c.course_type == *p))
        .collect()
}

/// Participants enrolled in one of `courses`, paired with its protocol.
fn enrolled<'p>(
    courses: &[&Course],
    participants: &'p [Participant],
) -> Vec<(&'p Participant, Protocol)> {
    let protocol_of: HashMap<&str, Protocol> = courses
        .iter()
        .map(|c| (c.id.as_str(), c.course_type))
        .collect();

    participants
        .iter()
        .filter_map(|p| protocol_of.get(p.course_id.as_str()).map(|proto| (p, *proto)))
        .collect()
}

fn label_or_unspecified(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNSPECIFIED)
        .to_string()
}

/// Count `(label, protocol)` pairs into a table; rows sorted by label.
fn cross_tab<I>(columns: Vec<Protocol>, entries: I) -> CrossTab
where
    I: IntoIterator<Item = (String, Protocol)>,
{
    let mut counts: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (label, protocol) in entries {
        if let Some(slot) = columns.iter().position(|p| *p == protocol) {
            counts
                .entry(label)
                .or_insert_with(|| vec![0; columns.len()])[slot] += 1;
        }
    }

    let mut totals = vec![0; columns.len()];
    let rows: Vec<CrossTabRow> = counts
        .into_iter()
        .map(|(label, counts)| {
            for (total, count) in totals.iter_mut().zip(&counts) {
                *total += count;
            }
            CrossTabRow {
                total: counts.iter().sum(),
                label,
                counts,
            }
        })
        .collect();
    let grand_total = totals.iter().sum();

    CrossTab {
        columns,
        rows,
        totals,
        grand_total,
    }
}

/// Course and participant counts, with every protocol listed.
pub fn course_kpis(courses: &[&Course], participants: &[Participant]) -> CourseKpis {
    let enrolled = enrolled(courses, participants);

    CourseKpis {
        courses: courses.len(),
        participants: enrolled.len(),
        by_protocol: Protocol::ALL
            .iter()
            .map(|protocol| ProtocolCount {
                protocol: *protocol,
                courses: courses.iter().filter(|c| c.course_type == *protocol).count(),
                participants: enrolled.iter().filter(|(_, p)| p == protocol).count(),
            })
            .collect(),
    }
}

/// Courses per state and protocol.
pub fn courses_by_state(courses: &[&Course]) -> CrossTab {
    cross_tab(
        present_protocols(courses),
        courses
            .iter()
            .map(|c| (label_or_unspecified(c.state.as_deref()), c.course_type)),
    )
}

/// Trained participants per job title and protocol.
pub fn trained_by_cadre(courses: &[&Course], participants: &[Participant]) -> CrossTab {
    cross_tab(
        present_protocols(courses),
        enrolled(courses, participants)
            .into_iter()
            .map(|(p, protocol)| (label_or_unspecified(p.job_title.as_deref()), protocol)),
    )
}

/// Course list, most recent start date first; undated courses last.
pub fn course_listing(courses: &[&Course], participants: &[Participant]) -> Vec<CourseListing> {
    let mut ordered: Vec<&Course> = courses.to_vec();
    ordered.sort_by(|a, b| b.start().cmp(&a.start()).then_with(|| a.id.cmp(&b.id)));

    ordered
        .into_iter()
        .map(|c| CourseListing {
            id: c.id.clone(),
            protocol: c.course_type,
            state: c.state.clone(),
            locality: c.locality.clone(),
            director: c.director.clone(),
            start_date: c.start().map(|d| d.to_string()),
            participants: participants.iter().filter(|p| p.course_id == c.id).count(),
            planned: c.participants_count,
        })
        .collect()
}
