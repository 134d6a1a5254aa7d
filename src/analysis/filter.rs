//! Record filtering ahead of aggregation.

use crate::models::{
    Case, CareSetting, Course, Observation, Participant, Protocol, Scenario, TrainingGroup,
};
use chrono::Datelike;
use std::collections::HashMap;

/// Criteria applied to observations and cases. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub course: Option<String>,
    pub participant: Option<String>,
    pub domain: Option<String>,
    pub item: Option<String>,
    pub day: Option<u32>,
    pub setting: Option<CareSetting>,
    pub group: Option<TrainingGroup>,
    pub scenario: Option<Scenario>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.course.is_none()
            && self.participant.is_none()
            && self.domain.is_none()
            && self.item.is_none()
            && self.day.is_none()
            && self.setting.is_none()
            && self.group.is_none()
            && self.scenario.is_none()
    }

    /// Bind the filter to a participant list so group criteria can be resolved.
    pub fn bind<'a>(&'a self, participants: &'a [Participant]) -> BoundFilter<'a> {
        BoundFilter {
            filter: self,
            groups: participants
                .iter()
                .map(|p| (p.id.as_str(), p.group))
                .collect(),
        }
    }
}

/// A [`RecordFilter`] with participant groups resolved.
#[derive(Debug)]
pub struct BoundFilter<'a> {
    filter: &'a RecordFilter,
    groups: HashMap<&'a str, Option<TrainingGroup>>,
}

impl<'a> BoundFilter<'a> {
    fn group_matches(&self, participant_id: &str) -> bool {
        match self.filter.group {
            None => true,
            Some(wanted) => matches!(self.groups.get(participant_id), Some(Some(g)) if *g == wanted),
        }
    }

    fn common_matches(
        &self,
        course_id: &str,
        participant_id: &str,
        day: u32,
        setting: CareSetting,
        scenario: Option<Scenario>,
    ) -> bool {
        let f = self.filter;
        f.course.as_deref().map_or(true, |c| c == course_id)
            && f.participant.as_deref().map_or(true, |p| p == participant_id)
            && f.day.map_or(true, |d| d == day)
            && f.setting.map_or(true, |s| s == setting)
            && f.scenario.map_or(true, |s| s.matches(scenario))
            && self.group_matches(participant_id)
    }

    pub fn matches_observation(&self, observation: &Observation) -> bool {
        let f = self.filter;
        self.common_matches(
            &observation.course_id,
            &observation.participant_id,
            observation.day(),
            observation.setting(),
            observation.scenario,
        ) && f.domain.as_deref().map_or(true, |d| d == observation.domain)
            && f.item.as_deref().map_or(true, |i| i == observation.item)
    }

    /// Domain and item criteria do not apply to cases.
    pub fn matches_case(&self, case: &Case) -> bool {
        self.common_matches(
            &case.course_id,
            &case.participant_id,
            case.day(),
            case.setting(),
            case.scenario,
        )
    }

    pub fn observations<'o>(&self, observations: &'o [Observation]) -> Vec<&'o Observation> {
        observations
            .iter()
            .filter(|o| self.matches_observation(o))
            .collect()
    }

    pub fn cases<'c>(&self, cases: &'c [Case]) -> Vec<&'c Case> {
        cases.iter().filter(|c| self.matches_case(c)).collect()
    }
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Course-level criteria for the dashboard. Unset fields match everything;
/// year and month criteria never match a course without a start date.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub protocol: Option<Protocol>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub year: Option<i32>,
    /// 1 to 12.
    pub month: Option<u32>,
}

impl CourseFilter {
    pub fn matches(&self, course: &Course) -> bool {
        let start = course.start();
        self.protocol.map_or(true, |p| p == course.course_type)
            && self
                .state
                .as_deref()
                .map_or(true, |s| course.state.as_deref() == Some(s))
            && self
                .locality
                .as_deref()
                .map_or(true, |l| course.locality.as_deref() == Some(l))
            && self
                .year
                .map_or(true, |y| start.is_some_and(|d| d.year() == y))
            && self
                .month
                .map_or(true, |m| start.is_some_and(|d| d.month() == m))
    }

    pub fn courses<'c>(&self, courses: &'c [Course]) -> Vec<&'c Course> {
        courses.iter().filter(|c| self.matches(c)).collect()
    }

    /// Human-readable criteria for report headers.
    pub fn describe(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(protocol) = self.protocol {
            parts.push(format!("Course type {}", protocol));
        }
        if let Some(ref state) = self.state {
            parts.push(format!("State {}", state));
        }
        if let Some(ref locality) = self.locality {
            parts.push(format!("Locality {}", locality));
        }
        if let Some(year) = self.year {
            parts.push(format!("Year {}", year));
        }
        if let Some(month) = self.month {
            let name = month
                .checked_sub(1)
                .and_then(|i| MONTHS.get(i as usize))
                .copied()
                .unwrap_or("?");
            parts.push(format!("Month {}", name));
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{case, course, observation, participant};

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = RecordFilter::default();
        assert!(filter.is_empty());

        let participants = vec![participant("p1", None)];
        let bound = filter.bind(&participants);
        assert!(bound.matches_observation(&observation("p1", "d", "i", 0)));
        assert!(bound.matches_case(&case("k1", "p1", "2024-01-01", 1)));
    }

    #[test]
    fn test_day_filter_uses_default_day() {
        let mut obs = observation("p1", "d", "i", 1);
        obs.day = None;

        let filter = RecordFilter {
            day: Some(1),
            ..RecordFilter::default()
        };
        let participants: Vec<Participant> = Vec::new();
        assert!(filter.bind(&participants).matches_observation(&obs));

        let filter = RecordFilter {
            day: Some(2),
            ..RecordFilter::default()
        };
        assert!(!filter.bind(&participants).matches_observation(&obs));
    }

    #[test]
    fn test_group_filter_excludes_ungrouped_and_unknown() {
        let participants = vec![
            participant("p1", Some(TrainingGroup::A)),
            participant("p2", None),
        ];
        let filter = RecordFilter {
            group: Some(TrainingGroup::A),
            ..RecordFilter::default()
        };
        let bound = filter.bind(&participants);

        assert!(bound.matches_observation(&observation("p1", "d", "i", 1)));
        assert!(!bound.matches_observation(&observation("p2", "d", "i", 1)));
        assert!(!bound.matches_observation(&observation("p3", "d", "i", 1)));
    }

    #[test]
    fn test_domain_and_item_filter() {
        let filter = RecordFilter {
            domain: Some("ear".to_string()),
            item: Some("Mastoiditis".to_string()),
            ..RecordFilter::default()
        };
        let participants: Vec<Participant> = Vec::new();
        let bound = filter.bind(&participants);

        let observations = vec![
            observation("p1", "ear", "Mastoiditis", 1),
            observation("p1", "ear", "No ear infection", 1),
            observation("p1", "anaemia", "Mastoiditis", 1),
        ];
        assert_eq!(bound.observations(&observations).len(), 1);
    }

    #[test]
    fn test_setting_filter_defaults_to_out_patient() {
        let mut obs = observation("p1", "d", "i", 1);
        obs.setting = None;

        let filter = RecordFilter {
            setting: Some(CareSetting::OutPatient),
            ..RecordFilter::default()
        };
        let participants: Vec<Participant> = Vec::new();
        assert!(filter.bind(&participants).matches_observation(&obs));
    }

    #[test]
    fn test_course_filter() {
        let imnci = course(Protocol::Imnci);
        let mut etat = course(Protocol::Etat);
        etat.id = "course-2".to_string();
        etat.state = Some("Gezira".to_string());
        etat.start_date = Some("2023-11-20".to_string());
        let mut undated = course(Protocol::Etat);
        undated.id = "course-3".to_string();
        undated.start_date = None;
        let courses = vec![imnci, etat, undated];

        let ids = |filter: &CourseFilter| -> Vec<String> {
            filter.courses(&courses).iter().map(|c| c.id.clone()).collect()
        };

        assert_eq!(ids(&CourseFilter::default()).len(), 3);

        let by_type = CourseFilter {
            protocol: Some(Protocol::Etat),
            ..CourseFilter::default()
        };
        assert_eq!(ids(&by_type), vec!["course-2", "course-3"]);

        let by_place = CourseFilter {
            state: Some("Khartoum".to_string()),
            locality: Some("Omdurman".to_string()),
            ..CourseFilter::default()
        };
        assert_eq!(ids(&by_place), vec!["course-1", "course-3"]);

        // Undated courses never match a date criterion.
        let by_date = CourseFilter {
            year: Some(2023),
            month: Some(11),
            ..CourseFilter::default()
        };
        assert_eq!(ids(&by_date), vec!["course-2"]);
        assert_eq!(by_date.describe(), vec!["Year 2023", "Month November"]);
    }
}
