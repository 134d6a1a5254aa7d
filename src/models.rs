//! Data models for course monitoring.
//!
//! This module contains the records exported from the monitoring store
//! (courses, participants, cases, observations) and the closed enumerations
//! they are tagged with.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Training curriculum of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Integrated Management of Neonatal and Childhood Illness
    #[serde(rename = "IMNCI")]
    Imnci,
    /// Emergency Triage Assessment and Treatment
    #[serde(rename = "ETAT")]
    Etat,
    /// Early Essential Newborn Care (scored 0/1/2)
    #[serde(rename = "EENC")]
    Eenc,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Imnci, Protocol::Etat, Protocol::Eenc];

    /// Whether items are scored 0/1/2 rather than judged correct/incorrect.
    pub fn is_scored(&self) -> bool {
        matches!(self, Protocol::Eenc)
    }

    /// Maximum value a single observation can contribute.
    pub fn max_item_score(&self) -> u32 {
        if self.is_scored() {
            2
        } else {
            1
        }
    }

    /// Whether observations are split into out-patient and in-patient.
    pub fn has_settings(&self) -> bool {
        matches!(self, Protocol::Imnci)
    }

    /// Whether participant reports list domains separately per age group.
    pub fn splits_domains_by_scenario(&self) -> bool {
        matches!(self, Protocol::Imnci)
    }

    /// Whether course reports carry the per-group all-correct case summary.
    pub fn has_case_summary(&self) -> bool {
        matches!(self, Protocol::Etat)
    }

    /// Scenarios (age groups) that carry their own taxonomy.
    pub fn scenarios(&self) -> &'static [Scenario] {
        match self {
            Protocol::Imnci => &[Scenario::Under2Months, Scenario::From2MonthsTo5Years],
            Protocol::Etat => &[Scenario::Etat],
            Protocol::Eenc => &[Scenario::Breathing, Scenario::NotBreathing],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Imnci => write!(f, "IMNCI"),
            Protocol::Etat => write!(f, "ETAT"),
            Protocol::Eenc => write!(f, "EENC"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IMNCI" | "IMCI" => Ok(Protocol::Imnci),
            "ETAT" => Ok(Protocol::Etat),
            "EENC" => Ok(Protocol::Eenc),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// Where a case was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CareSetting {
    #[serde(rename = "OPD")]
    OutPatient,
    #[serde(rename = "IPD")]
    InPatient,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl CareSetting {
    /// The two settings reported on, in report order.
    pub const REPORTED: [CareSetting; 2] = [CareSetting::OutPatient, CareSetting::InPatient];

    /// Short code used in exports and tables.
    pub fn code(&self) -> &'static str {
        match self {
            CareSetting::OutPatient => "OPD",
            CareSetting::InPatient => "IPD",
            CareSetting::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for CareSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for CareSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPD" | "OUT-PATIENT" | "OUTPATIENT" => Ok(CareSetting::OutPatient),
            "IPD" | "IN-PATIENT" | "INPATIENT" => Ok(CareSetting::InPatient),
            "N/A" | "NA" => Ok(CareSetting::NotApplicable),
            other => Err(format!("unknown care setting: {}", other)),
        }
    }
}

/// One of the four fixed training groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrainingGroup {
    #[serde(rename = "Group A")]
    A,
    #[serde(rename = "Group B")]
    B,
    #[serde(rename = "Group C")]
    C,
    #[serde(rename = "Group D")]
    D,
}

impl TrainingGroup {
    pub const ALL: [TrainingGroup; 4] = [
        TrainingGroup::A,
        TrainingGroup::B,
        TrainingGroup::C,
        TrainingGroup::D,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrainingGroup::A => "Group A",
            TrainingGroup::B => "Group B",
            TrainingGroup::C => "Group C",
            TrainingGroup::D => "Group D",
        }
    }
}

impl fmt::Display for TrainingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TrainingGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Group A" => Ok(TrainingGroup::A),
            "Group B" => Ok(TrainingGroup::B),
            "Group C" => Ok(TrainingGroup::C),
            "Group D" => Ok(TrainingGroup::D),
            other => Err(format!("unknown training group: {}", other)),
        }
    }
}

/// Age group (IMNCI) or clinical scenario (EENC) a case belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scenario {
    #[serde(rename = "LT2M")]
    Under2Months,
    #[serde(rename = "GE2M_LE5Y")]
    From2MonthsTo5Years,
    #[serde(rename = "ETAT")]
    Etat,
    #[serde(rename = "breathing")]
    Breathing,
    #[serde(rename = "not_breathing")]
    NotBreathing,
}

impl Scenario {
    /// Tag as stored on observations.
    pub fn tag(&self) -> &'static str {
        match self {
            Scenario::Under2Months => "LT2M",
            Scenario::From2MonthsTo5Years => "GE2M_LE5Y",
            Scenario::Etat => "ETAT",
            Scenario::Breathing => "breathing",
            Scenario::NotBreathing => "not_breathing",
        }
    }

    /// Human-readable label for report headings.
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::Under2Months => "0-59 days",
            Scenario::From2MonthsTo5Years => "2-59 months",
            Scenario::Etat => "ETAT",
            Scenario::Breathing => "Breathing baby",
            Scenario::NotBreathing => "Not breathing baby",
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Scenario::Under2Months | Scenario::From2MonthsTo5Years => Protocol::Imnci,
            Scenario::Etat => Protocol::Etat,
            Scenario::Breathing | Scenario::NotBreathing => Protocol::Eenc,
        }
    }

    /// Whether a record tagged `tag` belongs to this scenario. Untagged
    /// records belong to the only scenario of a single-scenario protocol.
    pub fn matches(&self, tag: Option<Scenario>) -> bool {
        match tag {
            Some(t) => t == *self,
            None => self.protocol().scenarios().len() == 1,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Cases carry an `EENC_` prefix, observations don't.
        match s.trim() {
            "LT2M" => Ok(Scenario::Under2Months),
            "GE2M_LE5Y" => Ok(Scenario::From2MonthsTo5Years),
            "ETAT" => Ok(Scenario::Etat),
            "breathing" | "EENC_breathing" => Ok(Scenario::Breathing),
            "not_breathing" | "EENC_not_breathing" => Ok(Scenario::NotBreathing),
            other => Err(format!("unknown scenario: {}", other)),
        }
    }
}

/// Deserialize an optional tag, mapping unrecognised values to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// A training course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(alias = "course_type")]
    pub course_type: Protocol,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub hall: Option<String>,
    #[serde(default)]
    pub coordinator: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default, alias = "clinical_instructor")]
    pub clinical_instructor: Option<String>,
    #[serde(default, alias = "funded_by")]
    pub funded_by: Option<String>,
    #[serde(default)]
    pub facilitators: Vec<String>,
    #[serde(default, alias = "participants_count")]
    pub participants_count: Option<u32>,
    /// ISO date, optionally followed by a time.
    #[serde(default, alias = "start_date")]
    pub start_date: Option<String>,
}

impl Course {
    /// "State / Locality" line used in report headers.
    pub fn location(&self) -> String {
        format!(
            "{} / {}",
            self.state.as_deref().unwrap_or("-"),
            self.locality.as_deref().unwrap_or("-")
        )
    }

    /// Parsed start date; `None` when absent or not `YYYY-MM-DD`.
    pub fn start(&self) -> Option<NaiveDate> {
        let raw = self.start_date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
    }
}

/// A trainee enrolled in one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(alias = "course_id")]
    pub course_id: String,
    #[serde(default)]
    pub name: String,
    /// `None` when the stored group is missing or not one of the four groups.
    #[serde(default, deserialize_with = "lenient")]
    pub group: Option<TrainingGroup>,
    #[serde(default, alias = "job_title")]
    pub job_title: Option<String>,
    #[serde(default, alias = "center_name")]
    pub center_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// One monitored clinical encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    #[serde(alias = "participant_id")]
    pub participant_id: String,
    #[serde(alias = "course_id")]
    pub course_id: String,
    /// ISO `YYYY-MM-DD`, compared lexically.
    #[serde(default, alias = "encounter_date")]
    pub encounter_date: String,
    #[serde(default, alias = "case_serial")]
    pub serial: u32,
    #[serde(default, alias = "day_of_course")]
    pub day: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub setting: Option<CareSetting>,
    #[serde(default, alias = "age_group", deserialize_with = "lenient")]
    pub scenario: Option<Scenario>,
    #[serde(default)]
    pub all_correct: bool,
}

impl Case {
    /// Day of course, defaulting to day 1.
    pub fn day(&self) -> u32 {
        normalize_day(self.day)
    }

    /// Care setting, defaulting to out-patient.
    pub fn setting(&self) -> CareSetting {
        self.setting.unwrap_or(CareSetting::OutPatient)
    }

    /// True when every observation in the case was judged positively.
    pub fn derive_all_correct<'a, I>(observations: I) -> bool
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        observations.into_iter().all(Observation::is_correct)
    }
}

/// One judgement of a skill or classification within a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "participant_id")]
    pub participant_id: String,
    #[serde(alias = "course_id")]
    pub course_id: String,
    #[serde(default, alias = "case_id")]
    pub case_id: Option<String>,
    pub domain: String,
    #[serde(alias = "item_recorded")]
    pub item: String,
    /// 0/1 for binary protocols, 0/1/2 for scored ones.
    #[serde(default, alias = "item_correct")]
    pub correctness: u8,
    #[serde(default, alias = "day_of_course")]
    pub day: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub setting: Option<CareSetting>,
    #[serde(default, alias = "age_group", deserialize_with = "lenient")]
    pub scenario: Option<Scenario>,
    #[serde(default, alias = "course_type", deserialize_with = "lenient")]
    pub course_type: Option<Protocol>,
    #[serde(default, alias = "encounter_date")]
    pub encounter_date: Option<String>,
    #[serde(default, alias = "case_serial")]
    pub case_serial: Option<u32>,
    #[serde(default, alias = "case_age_months")]
    pub case_age_months: Option<f64>,
}

impl Observation {
    pub fn day(&self) -> u32 {
        normalize_day(self.day)
    }

    pub fn setting(&self) -> CareSetting {
        self.setting.unwrap_or(CareSetting::OutPatient)
    }

    /// Positive judgement; partial EENC marks count as correct.
    pub fn is_correct(&self) -> bool {
        self.correctness > 0
    }
}

fn normalize_day(day: Option<u32>) -> u32 {
    match day {
        Some(d) if d > 0 => d,
        _ => 1,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn observation(participant: &str, domain: &str, item: &str, correctness: u8) -> Observation {
        Observation {
            id: None,
            participant_id: participant.to_string(),
            course_id: "course-1".to_string(),
            case_id: Some("case-1".to_string()),
            domain: domain.to_string(),
            item: item.to_string(),
            correctness,
            day: Some(1),
            setting: Some(CareSetting::OutPatient),
            scenario: None,
            course_type: None,
            encounter_date: None,
            case_serial: None,
            case_age_months: None,
        }
    }

    pub fn participant(id: &str, group: Option<TrainingGroup>) -> Participant {
        Participant {
            id: id.to_string(),
            course_id: "course-1".to_string(),
            name: format!("Participant {}", id),
            group,
            job_title: None,
            center_name: None,
            phone: None,
        }
    }

    pub fn case(id: &str, participant: &str, date: &str, serial: u32) -> Case {
        Case {
            id: id.to_string(),
            participant_id: participant.to_string(),
            course_id: "course-1".to_string(),
            encounter_date: date.to_string(),
            serial,
            day: Some(1),
            setting: Some(CareSetting::OutPatient),
            scenario: None,
            all_correct: false,
        }
    }

    pub fn course(protocol: Protocol) -> Course {
        Course {
            id: "course-1".to_string(),
            course_type: protocol,
            state: Some("Khartoum".to_string()),
            locality: Some("Omdurman".to_string()),
            hall: None,
            coordinator: Some("Coordinator".to_string()),
            director: None,
            clinical_instructor: None,
            funded_by: None,
            facilitators: vec!["Facilitator One".to_string()],
            participants_count: Some(4),
            start_date: Some("2024-03-03".to_string()),
        }
    }
}
