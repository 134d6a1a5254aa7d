//! Exported monitoring snapshots.
//!
//! A snapshot is either one JSON document holding all four collections or a
//! directory with `courses.json`, `participants.json`, `cases.json` and
//! `observations.json`. Missing collections load as empty.

use crate::models::{Case, Course, Observation, Participant};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while loading or querying a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Course not found: {0}")]
    MissingCourse(String),

    #[error("Participant {participant} not found in course {course}")]
    MissingParticipant { course: String, participant: String },
}

pub type DatasetResult<T> = std::result::Result<T, DatasetError>;

/// All records of one export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// Number of records dropped by a cascade helper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub courses: usize,
    pub participants: usize,
    pub cases: usize,
    pub observations: usize,
}

impl Removed {
    pub fn total(&self) -> usize {
        self.courses + self.participants + self.cases + self.observations
    }
}

impl AddAssign for Removed {
    fn add_assign(&mut self, other: Removed) {
        self.courses += other.courses;
        self.participants += other.participants;
        self.cases += other.cases;
        self.observations += other.observations;
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> DatasetResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| DatasetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_collection<T: DeserializeOwned>(dir: &Path, name: &str) -> DatasetResult<Vec<T>> {
    let path = dir.join(format!("{}.json", name));
    if !path.exists() {
        debug!("No {} in {}", path.display(), dir.display());
        return Ok(Vec::new());
    }
    read_json(&path)
}

impl Dataset {
    /// Load a snapshot from a JSON file or a collection directory.
    pub fn load(path: &Path) -> DatasetResult<Self> {
        let dataset: Dataset = if path.is_dir() {
            Dataset {
                courses: read_collection(path, "courses")?,
                participants: read_collection(path, "participants")?,
                cases: read_collection(path, "cases")?,
                observations: read_collection(path, "observations")?,
            }
        } else {
            read_json(path)?
        };

        info!(
            "Loaded {} courses, {} participants, {} cases, {} observations from {}",
            dataset.courses.len(),
            dataset.participants.len(),
            dataset.cases.len(),
            dataset.observations.len(),
            path.display()
        );

        Ok(dataset)
    }

    pub fn course(&self, id: &str) -> DatasetResult<&Course> {
        self.courses
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DatasetError::MissingCourse(id.to_string()))
    }

    /// The only course of the snapshot, if there is exactly one.
    pub fn single_course(&self) -> Option<&Course> {
        match self.courses.as_slice() {
            [course] => Some(course),
            _ => None,
        }
    }

    pub fn participant(&self, course_id: &str, id: &str) -> DatasetResult<&Participant> {
        self.participants
            .iter()
            .find(|p| p.id == id && p.course_id == course_id)
            .ok_or_else(|| DatasetError::MissingParticipant {
                course: course_id.to_string(),
                participant: id.to_string(),
            })
    }

    /// Participants of a course sorted by name.
    pub fn participants_for(&self, course_id: &str) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self
            .participants
            .iter()
            .filter(|p| p.course_id == course_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.name.cmp(&b.name));
        participants
    }

    /// Observations whose case is not in the snapshot.
    pub fn orphaned_observations(&self) -> usize {
        let case_ids: HashSet<&str> = self.cases.iter().map(|c| c.id.as_str()).collect();
        self.observations
            .iter()
            .filter(|o| matches!(o.case_id.as_deref(), Some(id) if !case_ids.contains(id)))
            .count()
    }

    /// Cases whose stored all-correct flag disagrees with their observations.
    ///
    /// Cases without any observation in the snapshot are not judged.
    pub fn stale_case_flags(&self) -> usize {
        let mut by_case: HashMap<&str, Vec<&Observation>> = HashMap::new();
        for obs in &self.observations {
            if let Some(case_id) = obs.case_id.as_deref() {
                by_case.entry(case_id).or_default().push(obs);
            }
        }

        self.cases
            .iter()
            .filter(|case| {
                by_case.get(case.id.as_str()).is_some_and(|obs| {
                    Case::derive_all_correct(obs.iter().copied()) != case.all_correct
                })
            })
            .count()
    }
}

/// Cascading removals that keep a pruned snapshot consistent.
impl Dataset {
    /// Drop every course other than `id`, with their records.
    pub fn scope_to_course(&mut self, id: &str) -> Removed {
        let others: Vec<String> = self
            .courses
            .iter()
            .filter(|c| c.id != id)
            .map(|c| c.id.clone())
            .collect();

        let mut removed = Removed::default();
        for other in others {
            removed += self.remove_course(&other);
        }
        removed
    }

    /// Remove the listed participants and cases, cascading to their records.
    pub fn exclude(&mut self, participants: &[String], cases: &[String]) -> Removed {
        let mut removed = Removed::default();

        for id in participants {
            let r = self.remove_participant(id);
            if r.participants == 0 {
                warn!("No participant {} to exclude", id);
            }
            removed += r;
        }
        for id in cases {
            let r = self.remove_case(id);
            if r.cases == 0 {
                warn!("No case {} to exclude", id);
            }
            removed += r;
        }

        removed
    }

    /// Remove a course with its participants, cases and observations.
    pub fn remove_course(&mut self, id: &str) -> Removed {
        let mut removed = Removed::default();

        let before = self.courses.len();
        self.courses.retain(|c| c.id != id);
        removed.courses = before - self.courses.len();

        let before = self.participants.len();
        self.participants.retain(|p| p.course_id != id);
        removed.participants = before - self.participants.len();

        let before = self.cases.len();
        self.cases.retain(|c| c.course_id != id);
        removed.cases = before - self.cases.len();

        let before = self.observations.len();
        self.observations.retain(|o| o.course_id != id);
        removed.observations = before - self.observations.len();

        debug!("Removed course {}: {:?}", id, removed);
        removed
    }

    /// Remove a participant with their cases and observations.
    pub fn remove_participant(&mut self, id: &str) -> Removed {
        let mut removed = Removed::default();

        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        removed.participants = before - self.participants.len();

        let before = self.cases.len();
        self.cases.retain(|c| c.participant_id != id);
        removed.cases = before - self.cases.len();

        let before = self.observations.len();
        self.observations.retain(|o| o.participant_id != id);
        removed.observations = before - self.observations.len();

        debug!("Removed participant {}: {:?}", id, removed);
        removed
    }

    /// Remove a case and the observations recorded for it.
    pub fn remove_case(&mut self, id: &str) -> Removed {
        let mut removed = Removed::default();

        let before = self.cases.len();
        self.cases.retain(|c| c.id != id);
        removed.cases = before - self.cases.len();

        let before = self.observations.len();
        self.observations
            .retain(|o| o.case_id.as_deref() != Some(id));
        removed.observations = before - self.observations.len();

        debug!("Removed case {}: {:?}", id, removed);
        removed
    }
}
