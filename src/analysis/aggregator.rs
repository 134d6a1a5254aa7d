//! Observation aggregation and statistics.
//!
//! Pure folds over observation and case collections. Every function takes
//! shared references and builds its result from scratch; calling one twice on
//! the same input yields the same output.

use super::score::{percentage, per_participant_average, serialize_percentage, Stat, Tally};
use crate::models::{Case, CareSetting, Observation, Participant, Protocol, Scenario, TrainingGroup};
use crate::taxonomy::Taxonomy;
use serde::Serialize;
use std::collections::HashMap;

/// Statistics for one skill or classification within a domain.
#[derive(Debug, Clone, Serialize)]
pub struct SkillBreakdown {
    pub item: String,
    pub stat: Stat,
}

/// Statistics for one domain plus its skills.
#[derive(Debug, Clone, Serialize)]
pub struct DomainBreakdown {
    pub domain: String,
    pub label: String,
    pub stat: Stat,
    pub skills: Vec<SkillBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayBreakdown {
    pub day: u32,
    pub stat: Stat,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingBreakdown {
    pub setting: CareSetting,
    pub stat: Stat,
}

/// One training group's row in the course performance table.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRow {
    pub group: TrainingGroup,
    pub participant_count: usize,
    pub total_cases: usize,
    #[serde(skip)]
    pub tally: Tally,
    pub stat: Stat,
}

/// Grand total across the four groups.
#[derive(Debug, Clone, Serialize)]
pub struct GroupTotal {
    pub participant_count: usize,
    pub total_cases: usize,
    #[serde(skip)]
    pub tally: Tally,
    pub stat: Stat,
    pub avg_cases: f64,
    pub avg_skills: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupPerformance {
    pub groups: Vec<GroupRow>,
    pub total: GroupTotal,
}

/// Share of cases where every observation was correct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaseRollup {
    pub total: usize,
    pub all_correct: usize,
    #[serde(serialize_with = "serialize_percentage")]
    pub percentage: f64,
}

/// Fully correct cases of one participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantCases {
    pub participant_id: String,
    pub name: String,
    pub cases: CaseRollup,
}

/// Case totals for the members of one training group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupCaseSummary {
    pub group: TrainingGroup,
    pub participants: Vec<ParticipantCases>,
}

/// Per-case statistics for case listings.
#[derive(Debug, Clone, Serialize)]
pub struct CaseRow {
    pub case_id: String,
    pub encounter_date: String,
    pub serial: u32,
    pub day: u32,
    pub setting: CareSetting,
    pub scenario: Option<Scenario>,
    pub all_correct: bool,
    pub stat: Stat,
}

/// Roster line: cases seen, skills recorded and correctness per participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    pub participant_id: String,
    pub name: String,
    pub group: Option<TrainingGroup>,
    pub cases: usize,
    pub skills: usize,
    pub stat: Stat,
}

/// A skill × participant matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Cell {
    /// No observation of this skill for this participant.
    NotApplicable,
    Observed {
        stat: Stat,
        average_score: f64,
    },
}

impl Cell {
    fn from_tally(protocol: Protocol, tally: &Tally) -> Self {
        if tally.is_empty() {
            Cell::NotApplicable
        } else {
            Cell::Observed {
                stat: tally.stat(protocol),
                average_score: tally.average_score(),
            }
        }
    }

    pub fn percentage(&self) -> f64 {
        match self {
            Cell::NotApplicable => f64::NAN,
            Cell::Observed { stat, .. } => stat.percentage(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixColumn {
    pub participant_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub item: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixDomain {
    pub domain: String,
    pub label: String,
    pub rows: Vec<MatrixRow>,
}

/// Taxonomy skills down, participants across.
#[derive(Debug, Clone, Serialize)]
pub struct SkillMatrix {
    pub scenario: Scenario,
    pub columns: Vec<MatrixColumn>,
    pub domains: Vec<MatrixDomain>,
}

impl SkillMatrix {
    /// Whether any participant has any observation in this matrix.
    pub fn has_data(&self) -> bool {
        self.domains
            .iter()
            .flat_map(|d| &d.rows)
            .flat_map(|r| &r.cells)
            .any(|c| matches!(c, Cell::Observed { .. }))
    }
}

/// Seen and correct counts in one care setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeenCorrect {
    pub seen: usize,
    pub correct: usize,
}

impl SeenCorrect {
    fn record(&mut self, correct: bool) {
        self.seen += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.correct as f64, self.seen as f64)
    }

    pub fn combined(&self, other: &SeenCorrect) -> SeenCorrect {
        SeenCorrect {
            seen: self.seen + other.seen,
            correct: self.correct + other.correct,
        }
    }
}

/// In-patient versus out-patient performance for one participant.
#[derive(Debug, Clone, Serialize)]
pub struct SettingSummaryRow {
    pub participant_id: String,
    pub name: String,
    pub group: Option<TrainingGroup>,
    pub cases_in_patient: SeenCorrect,
    pub cases_out_patient: SeenCorrect,
    pub items_in_patient: SeenCorrect,
    pub items_out_patient: SeenCorrect,
}

/// Case count and score totals for one scored scenario bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreTotals {
    pub cases: usize,
    pub score: u32,
    pub max_score: u32,
}

impl ScoreTotals {
    fn add_case(&mut self, tally: &Tally) {
        self.cases += 1;
        self.score += tally.score;
        self.max_score += tally.max_score;
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.score as f64, self.max_score as f64)
    }
}

/// Breathing versus not-breathing scores for one participant.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummaryRow {
    pub participant_id: String,
    pub name: String,
    pub group: Option<TrainingGroup>,
    pub total: ScoreTotals,
    pub breathing: ScoreTotals,
    pub not_breathing: ScoreTotals,
}

/// Overall statistic for a set of observations.
pub fn summarize(protocol: Protocol, observations: &[&Observation]) -> Tally {
    Tally::from_observations(protocol, observations.iter().copied())
}

/// Partition by domain, then by item within each domain.
///
/// Domains and items follow the taxonomy order; anything the taxonomy does
/// not list is appended in first-seen order.
pub fn by_domain(
    taxonomy: &Taxonomy,
    protocol: Protocol,
    observations: &[&Observation],
) -> Vec<DomainBreakdown> {
    struct Acc<'o> {
        domain: &'o str,
        tally: Tally,
        skills: Vec<(&'o str, Tally)>,
    }

    let mut accs: Vec<Acc> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for obs in observations.iter().copied() {
        let slot = *index.entry(obs.domain.as_str()).or_insert_with(|| {
            accs.push(Acc {
                domain: obs.domain.as_str(),
                tally: Tally::default(),
                skills: Vec::new(),
            });
            accs.len() - 1
        });

        let acc = &mut accs[slot];
        acc.tally.record(protocol, obs);

        match acc.skills.iter_mut().find(|(item, _)| *item == obs.item) {
            Some((_, tally)) => tally.record(protocol, obs),
            None => {
                let mut tally = Tally::default();
                tally.record(protocol, obs);
                acc.skills.push((obs.item.as_str(), tally));
            }
        }
    }

    // Stable sort keeps first-seen order among entries the taxonomy lacks.
    accs.sort_by_key(|a| taxonomy.domain_position(a.domain).unwrap_or(usize::MAX));

    accs.into_iter()
        .map(|mut acc| {
            let spec = taxonomy.domain(acc.domain);
            acc.skills.sort_by_key(|(item, _)| {
                spec.and_then(|s| s.items.iter().position(|i| i == *item))
                    .unwrap_or(usize::MAX)
            });

            DomainBreakdown {
                domain: acc.domain.to_string(),
                label: taxonomy.label(acc.domain).to_string(),
                stat: acc.tally.stat(protocol),
                skills: acc
                    .skills
                    .into_iter()
                    .map(|(item, tally)| SkillBreakdown {
                        item: item.to_string(),
                        stat: tally.stat(protocol),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Partition by day of course, ascending. Records without a day count as day 1.
pub fn by_day(protocol: Protocol, observations: &[&Observation]) -> Vec<DayBreakdown> {
    let mut days: HashMap<u32, Tally> = HashMap::new();

    for obs in observations {
        days.entry(obs.day()).or_default().record(protocol, obs);
    }

    let mut rows: Vec<DayBreakdown> = days
        .into_iter()
        .map(|(day, tally)| DayBreakdown {
            day,
            stat: tally.stat(protocol),
        })
        .collect();
    rows.sort_by_key(|r| r.day);
    rows
}

/// Out-patient and in-patient rows; empty for protocols without settings.
pub fn by_setting(protocol: Protocol, observations: &[&Observation]) -> Vec<SettingBreakdown> {
    if !protocol.has_settings() {
        return Vec::new();
    }

    CareSetting::REPORTED
        .iter()
        .map(|setting| {
            let tally = Tally::from_observations(
                protocol,
                observations
                    .iter()
                    .copied()
                    .filter(|o| o.setting() == *setting),
            );
            SettingBreakdown {
                setting: *setting,
                stat: tally.stat(protocol),
            }
        })
        .collect()
}

/// Per-group participant, case and skill totals with a grand total row.
///
/// Participants outside the four groups are left out of every bucket; the
/// per-participant averages still divide by the full roster.
pub fn by_group(
    protocol: Protocol,
    participants: &[Participant],
    cases: &[&Case],
    observations: &[&Observation],
) -> GroupPerformance {
    let group_of: HashMap<&str, TrainingGroup> = participants
        .iter()
        .filter_map(|p| p.group.map(|g| (p.id.as_str(), g)))
        .collect();

    let mut rows: Vec<GroupRow> = TrainingGroup::ALL
        .iter()
        .map(|group| GroupRow {
            group: *group,
            participant_count: participants
                .iter()
                .filter(|p| p.group == Some(*group))
                .count(),
            total_cases: 0,
            tally: Tally::default(),
            stat: Tally::default().stat(protocol),
        })
        .collect();

    let slot = |group: TrainingGroup| {
        TrainingGroup::ALL
            .iter()
            .position(|g| *g == group)
            .unwrap_or_default()
    };

    for obs in observations {
        if let Some(group) = group_of.get(obs.participant_id.as_str()) {
            rows[slot(*group)].tally.record(protocol, obs);
        }
    }

    for case in cases {
        if let Some(group) = group_of.get(case.participant_id.as_str()) {
            rows[slot(*group)].total_cases += 1;
        }
    }

    let mut tally = Tally::default();
    let mut total_cases = 0;
    let mut participant_count = 0;
    for row in &mut rows {
        row.stat = row.tally.stat(protocol);
        tally.merge(&row.tally);
        total_cases += row.total_cases;
        participant_count += row.participant_count;
    }

    let total = GroupTotal {
        participant_count,
        total_cases,
        tally,
        stat: tally.stat(protocol),
        avg_cases: per_participant_average(total_cases, participants.len()),
        avg_skills: per_participant_average(tally.total, participants.len()),
    };

    GroupPerformance { groups: rows, total }
}

/// Case-level share of fully correct cases.
pub fn case_rollup(cases: &[&Case]) -> CaseRollup {
    let total = cases.len();
    let all_correct = cases.iter().filter(|c| c.all_correct).count();
    CaseRollup {
        total,
        all_correct,
        percentage: percentage(all_correct as f64, total as f64),
    }
}

/// Total and fully correct cases per participant, grouped by training group.
///
/// Groups without members are skipped and ungrouped participants are left
/// out. Members without cases get an empty roll-up.
pub fn case_summary(participants: &[Participant], cases: &[&Case]) -> Vec<GroupCaseSummary> {
    TrainingGroup::ALL
        .iter()
        .filter_map(|group| {
            let members: Vec<ParticipantCases> = participants
                .iter()
                .filter(|p| p.group == Some(*group))
                .map(|p| {
                    let own: Vec<&Case> = cases
                        .iter()
                        .copied()
                        .filter(|c| c.participant_id == p.id)
                        .collect();
                    ParticipantCases {
                        participant_id: p.id.clone(),
                        name: p.name.clone(),
                        cases: case_rollup(&own),
                    }
                })
                .collect();

            (!members.is_empty()).then(|| GroupCaseSummary {
                group: *group,
                participants: members,
            })
        })
        .collect()
}

/// Order cases most recent first: date descending, then serial descending.
pub fn sort_cases_recent_first(cases: &mut [&Case]) {
    cases.sort_by(|a, b| {
        b.encounter_date
            .cmp(&a.encounter_date)
            .then_with(|| b.serial.cmp(&a.serial))
    });
}

/// Group observations by the case they belong to.
pub fn observations_by_case<'o>(
    observations: &[&'o Observation],
) -> HashMap<&'o str, Vec<&'o Observation>> {
    let mut grouped: HashMap<&str, Vec<&Observation>> = HashMap::new();
    for obs in observations.iter().copied() {
        if let Some(case_id) = obs.case_id.as_deref() {
            grouped.entry(case_id).or_default().push(obs);
        }
    }
    grouped
}

/// Per-case statistics, most recent case first.
pub fn case_rows(protocol: Protocol, cases: &[&Case], observations: &[&Observation]) -> Vec<CaseRow> {
    let by_case = observations_by_case(observations);

    let mut ordered: Vec<&Case> = cases.to_vec();
    sort_cases_recent_first(&mut ordered);

    ordered
        .into_iter()
        .map(|case| {
            let tally = by_case
                .get(case.id.as_str())
                .map(|obs| Tally::from_observations(protocol, obs.iter().copied()))
                .unwrap_or_default();
            CaseRow {
                case_id: case.id.clone(),
                encounter_date: case.encounter_date.clone(),
                serial: case.serial,
                day: case.day(),
                setting: case.setting(),
                scenario: case.scenario,
                all_correct: case.all_correct,
                stat: tally.stat(protocol),
            }
        })
        .collect()
}

/// Roster performance: one row per participant, in roster order.
pub fn participant_summaries(
    protocol: Protocol,
    participants: &[Participant],
    cases: &[&Case],
    observations: &[&Observation],
) -> Vec<ParticipantSummary> {
    participants
        .iter()
        .map(|p| {
            let case_count = cases.iter().filter(|c| c.participant_id == p.id).count();
            let tally = Tally::from_observations(
                protocol,
                observations
                    .iter()
                    .copied()
                    .filter(|o| o.participant_id == p.id),
            );
            ParticipantSummary {
                participant_id: p.id.clone(),
                name: p.name.clone(),
                group: p.group,
                cases: case_count,
                skills: tally.total,
                stat: tally.stat(protocol),
            }
        })
        .collect()
}

/// Skill × participant matrix for one scenario.
///
/// Cells are keyed by `(domain, item)`; an item text listed under two
/// domains yields two independent rows.
pub fn skill_matrix(
    taxonomy: &Taxonomy,
    scenario: Scenario,
    participants: &[&Participant],
    observations: &[&Observation],
) -> SkillMatrix {
    let protocol = scenario.protocol();
    let mut tallies: HashMap<(&str, &str, &str), Tally> = HashMap::new();

    for obs in observations
        .iter()
        .copied()
        .filter(|o| scenario.matches(o.scenario))
    {
        tallies
            .entry((
                obs.participant_id.as_str(),
                obs.domain.as_str(),
                obs.item.as_str(),
            ))
            .or_default()
            .record(protocol, obs);
    }

    let domains = taxonomy
        .domains
        .iter()
        .map(|spec| MatrixDomain {
            domain: spec.key.clone(),
            label: spec.label.clone(),
            rows: spec
                .items
                .iter()
                .map(|item| MatrixRow {
                    item: item.clone(),
                    cells: participants
                        .iter()
                        .map(|p| {
                            let tally = tallies
                                .get(&(p.id.as_str(), spec.key.as_str(), item.as_str()))
                                .copied()
                                .unwrap_or_default();
                            Cell::from_tally(protocol, &tally)
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    SkillMatrix {
        scenario,
        columns: participants
            .iter()
            .map(|p| MatrixColumn {
                participant_id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect(),
        domains,
    }
}

/// In-patient / out-patient case and classification counts per participant.
///
/// Anything not tagged in-patient is counted as out-patient.
pub fn setting_summary(
    participants: &[Participant],
    cases: &[&Case],
    observations: &[&Observation],
) -> Vec<SettingSummaryRow> {
    participants
        .iter()
        .map(|p| {
            let mut row = SettingSummaryRow {
                participant_id: p.id.clone(),
                name: p.name.clone(),
                group: p.group,
                cases_in_patient: SeenCorrect::default(),
                cases_out_patient: SeenCorrect::default(),
                items_in_patient: SeenCorrect::default(),
                items_out_patient: SeenCorrect::default(),
            };

            for case in cases.iter().filter(|c| c.participant_id == p.id) {
                match case.setting() {
                    CareSetting::InPatient => row.cases_in_patient.record(case.all_correct),
                    _ => row.cases_out_patient.record(case.all_correct),
                }
            }

            for obs in observations.iter().filter(|o| o.participant_id == p.id) {
                match obs.setting() {
                    CareSetting::InPatient => row.items_in_patient.record(obs.is_correct()),
                    _ => row.items_out_patient.record(obs.is_correct()),
                }
            }

            row
        })
        .collect()
}

/// Breathing / not-breathing case scores per participant.
///
/// A case's maximum is twice the number of observations recorded for it.
pub fn scenario_summary(
    participants: &[Participant],
    cases: &[&Case],
    observations: &[&Observation],
) -> Vec<ScenarioSummaryRow> {
    let by_case = observations_by_case(observations);

    participants
        .iter()
        .map(|p| {
            let mut row = ScenarioSummaryRow {
                participant_id: p.id.clone(),
                name: p.name.clone(),
                group: p.group,
                total: ScoreTotals::default(),
                breathing: ScoreTotals::default(),
                not_breathing: ScoreTotals::default(),
            };

            for case in cases.iter().filter(|c| c.participant_id == p.id) {
                let tally = by_case
                    .get(case.id.as_str())
                    .map(|obs| Tally::from_observations(Protocol::Eenc, obs.iter().copied()))
                    .unwrap_or_default();

                row.total.add_case(&tally);
                if case.scenario == Some(Scenario::Breathing) {
                    row.breathing.add_case(&tally);
                } else {
                    row.not_breathing.add_case(&tally);
                }
            }

            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{case, observation, participant};
    use crate::taxonomy::TaxonomyRegistry;

    fn refs<T>(items: &[T]) -> Vec<&T> {
        items.iter().collect()
    }

    #[test]
    fn test_by_domain_binary_single_domain() {
        let observations: Vec<_> = (0..10)
            .map(|i| observation("p1", "triage", "Triage Assessment", u8::from(i < 7)))
            .collect();
        let taxonomy = TaxonomyRegistry::builtin().protocol(Protocol::Etat);

        let domains = by_domain(&taxonomy, Protocol::Etat, &refs(&observations));

        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].label, "Triage");
        let expected = Stat::Binary {
            total: 10,
            correct: 7,
            percentage: 70.0,
        };
        assert_eq!(domains[0].stat, expected);
        assert_eq!(domains[0].skills.len(), 1);
        assert_eq!(domains[0].skills[0].stat, expected);
    }

    #[test]
    fn test_by_domain_scored() {
        let observations: Vec<_> = [2, 1, 0, 2]
            .into_iter()
            .map(|v| observation("p1", "eenc", "Dry the baby thoroughly", v))
            .collect();
        let taxonomy = TaxonomyRegistry::builtin().protocol(Protocol::Eenc);

        let domains = by_domain(&taxonomy, Protocol::Eenc, &refs(&observations));

        assert_eq!(
            domains[0].stat,
            Stat::Scored {
                score: 5,
                max_score: 8,
                percentage: 62.5
            }
        );
    }

    #[test]
    fn test_by_domain_follows_taxonomy_order() {
        let observations = vec![
            observation("p1", "dehydration", "Reassesses", 1),
            observation("p1", "mystery", "Something", 1),
            observation("p1", "triage", "Assigns Triage Category", 0),
            observation("p1", "triage", "Triage Assessment", 1),
            observation("p1", "coma", "Gives IV fluids", 1),
        ];
        let taxonomy = TaxonomyRegistry::builtin().protocol(Protocol::Etat);

        let domains = by_domain(&taxonomy, Protocol::Etat, &refs(&observations));
        let keys: Vec<_> = domains.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(keys, vec!["triage", "coma", "dehydration", "mystery"]);

        // Skills follow the taxonomy too, not insertion order.
        let triage_items: Vec<_> = domains[0].skills.iter().map(|s| s.item.as_str()).collect();
        assert_eq!(
            triage_items,
            vec!["Triage Assessment", "Assigns Triage Category"]
        );
        assert_eq!(domains[3].label, "mystery");
    }

    #[test]
    fn test_by_domain_repeated_items_accumulate() {
        let observations = vec![
            observation("p1", "ear", "Mastoiditis", 1),
            observation("p1", "ear", "Mastoiditis", 0),
            observation("p1", "ear", "Mastoiditis", 1),
        ];
        let taxonomy = TaxonomyRegistry::builtin().protocol(Protocol::Imnci);

        let domains = by_domain(&taxonomy, Protocol::Imnci, &refs(&observations));
        assert_eq!(domains[0].skills.len(), 1);
        assert_eq!(domains[0].skills[0].stat.fraction(), "2/3");
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let observations = vec![
            observation("p1", "triage", "Triage Assessment", 1),
            observation("p1", "coma", "Gives IV fluids", 0),
        ];
        let taxonomy = TaxonomyRegistry::builtin().protocol(Protocol::Etat);
        let obs = refs(&observations);

        let first = serde_json::to_string(&by_domain(&taxonomy, Protocol::Etat, &obs)).unwrap();
        let second = serde_json::to_string(&by_domain(&taxonomy, Protocol::Etat, &obs)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_by_day_defaults_and_order() {
        let mut a = observation("p1", "d", "i", 1);
        a.day = Some(3);
        let mut b = observation("p1", "d", "i", 0);
        b.day = None;
        let mut c = observation("p1", "d", "i", 1);
        c.day = Some(10);
        let mut d = observation("p1", "d", "i", 1);
        d.day = Some(1);
        let observations = vec![a, b, c, d];

        let days = by_day(Protocol::Imnci, &refs(&observations));
        let order: Vec<_> = days.iter().map(|d| d.day).collect();
        assert_eq!(order, vec![1, 3, 10]);
        assert_eq!(days[0].stat.fraction(), "1/2");
        assert_eq!(days[0].stat.percentage(), 50.0);
    }

    #[test]
    fn test_by_setting_only_for_imnci() {
        let mut inpatient = observation("p1", "d", "i", 0);
        inpatient.setting = Some(CareSetting::InPatient);
        let mut untagged = observation("p1", "d", "i", 1);
        untagged.setting = None;
        let mut not_applicable = observation("p1", "d", "i", 1);
        not_applicable.setting = Some(CareSetting::NotApplicable);
        let observations = vec![inpatient, untagged, not_applicable];
        let obs = refs(&observations);

        let rows = by_setting(Protocol::Imnci, &obs);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].setting, CareSetting::OutPatient);
        assert_eq!(rows[0].stat.fraction(), "1/1");
        assert_eq!(rows[0].stat.percentage(), 100.0);
        assert_eq!(rows[1].setting, CareSetting::InPatient);
        assert_eq!(rows[1].stat.percentage(), 0.0);

        assert!(by_setting(Protocol::Etat, &obs).is_empty());
    }

    #[test]
    fn test_by_group_excludes_ungrouped() {
        let participants = vec![
            participant("p1", Some(TrainingGroup::A)),
            participant("p2", Some(TrainingGroup::B)),
            participant("p3", None),
        ];
        let observations = vec![
            observation("p1", "d", "i", 1),
            observation("p1", "d", "i", 0),
            observation("p2", "d", "i", 1),
            observation("p3", "d", "i", 0),
        ];
        let cases = vec![
            case("k1", "p1", "2024-01-01", 1),
            case("k2", "p2", "2024-01-01", 1),
            case("k3", "p3", "2024-01-01", 1),
        ];

        let perf = by_group(
            Protocol::Imnci,
            &participants,
            &refs(&cases),
            &refs(&observations),
        );

        assert_eq!(perf.groups.len(), 4);
        assert_eq!(perf.groups[0].participant_count, 1);
        assert_eq!(perf.groups[0].tally.total, 2);
        assert_eq!(perf.groups[0].stat.percentage(), 50.0);
        assert_eq!(perf.groups[1].total_cases, 1);
        assert!(perf.groups[2].stat.percentage().is_nan());
        assert!(perf.groups[3].tally.is_empty());

        assert_eq!(perf.total.tally.total, 3);
        assert_eq!(perf.total.total_cases, 2);
        assert_eq!(perf.total.participant_count, 2);
        assert!((perf.total.stat.percentage() - 200.0 / 3.0).abs() < 1e-9);
        assert!((perf.total.avg_cases - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_by_group_no_participants_averages_zero() {
        let perf = by_group(Protocol::Etat, &[], &[], &[]);
        assert_eq!(perf.total.avg_cases, 0.0);
        assert_eq!(perf.total.avg_skills, 0.0);
        assert!(perf.total.stat.percentage().is_nan());
    }

    #[test]
    fn test_case_rollup() {
        let mut good = case("k1", "p1", "2024-01-01", 1);
        good.all_correct = true;
        let bad = case("k2", "p1", "2024-01-01", 2);
        let cases = vec![good, bad];

        let rollup = case_rollup(&refs(&cases));
        assert_eq!(rollup.total, 2);
        assert_eq!(rollup.all_correct, 1);
        assert_eq!(rollup.percentage, 50.0);

        assert!(case_rollup(&[]).percentage.is_nan());
    }

    #[test]
    fn test_case_summary_by_group() {
        let participants = vec![
            participant("p1", Some(TrainingGroup::B)),
            participant("p2", Some(TrainingGroup::A)),
            participant("p3", Some(TrainingGroup::B)),
            participant("p4", None),
        ];
        let mut good = case("k1", "p1", "2024-01-01", 1);
        good.all_correct = true;
        let cases = vec![
            good,
            case("k2", "p1", "2024-01-02", 1),
            case("k3", "p2", "2024-01-02", 1),
            case("k4", "p4", "2024-01-02", 1),
        ];

        let summary = case_summary(&participants, &refs(&cases));
        let groups: Vec<_> = summary.iter().map(|g| g.group).collect();
        assert_eq!(groups, vec![TrainingGroup::A, TrainingGroup::B]);

        let group_b = &summary[1].participants;
        assert_eq!(group_b.len(), 2);
        assert_eq!(group_b[0].participant_id, "p1");
        assert_eq!(group_b[0].cases.total, 2);
        assert_eq!(group_b[0].cases.all_correct, 1);
        assert_eq!(group_b[0].cases.percentage, 50.0);
        assert_eq!(group_b[1].cases.total, 0);
        assert!(group_b[1].cases.percentage.is_nan());

        assert_eq!(summary[0].participants[0].cases.percentage, 0.0);
    }

    #[test]
    fn test_case_rows_most_recent_first() {
        let cases = vec![
            case("k1", "p1", "2024-03-01", 1),
            case("k2", "p1", "2024-03-02", 1),
            case("k3", "p1", "2024-03-02", 2),
            case("k4", "p1", "2024-02-28", 5),
        ];
        let mut obs = observation("p1", "d", "i", 1);
        obs.case_id = Some("k3".to_string());
        let observations = vec![obs];

        let rows = case_rows(Protocol::Etat, &refs(&cases), &refs(&observations));
        let order: Vec<_> = rows.iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(order, vec!["k3", "k2", "k1", "k4"]);
        assert_eq!(rows[0].stat.fraction(), "1/1");
        assert!(rows[1].stat.percentage().is_nan());
    }

    #[test]
    fn test_participant_summaries() {
        let participants = vec![
            participant("p1", Some(TrainingGroup::A)),
            participant("p2", Some(TrainingGroup::A)),
        ];
        let observations = vec![
            observation("p1", "d", "i", 1),
            observation("p1", "d", "j", 0),
        ];
        let cases = vec![case("k1", "p1", "2024-01-01", 1)];

        let rows = participant_summaries(
            Protocol::Imnci,
            &participants,
            &refs(&cases),
            &refs(&observations),
        );
        assert_eq!(rows[0].cases, 1);
        assert_eq!(rows[0].skills, 2);
        assert_eq!(rows[0].stat.percentage(), 50.0);
        assert_eq!(rows[1].skills, 0);
        assert!(rows[1].stat.percentage().is_nan());
    }

    #[test]
    fn test_skill_matrix_not_applicable_vs_zero() {
        let registry = TaxonomyRegistry::builtin();
        let participants = vec![
            participant("p1", Some(TrainingGroup::A)),
            participant("p2", Some(TrainingGroup::A)),
        ];
        let observations = vec![observation("p1", "triage", "Triage Assessment", 0)];

        let matrix = skill_matrix(
            registry.scenario(Scenario::Etat),
            Scenario::Etat,
            &refs(&participants),
            &refs(&observations),
        );

        let row = &matrix.domains[0].rows[0];
        assert_eq!(row.item, "Triage Assessment");
        assert_eq!(row.cells[0].percentage(), 0.0);
        assert_eq!(row.cells[1], Cell::NotApplicable);
        assert!(matrix.has_data());
    }

    #[test]
    fn test_skill_matrix_keys_by_domain_and_item() {
        let registry = TaxonomyRegistry::builtin();
        let participants = vec![participant("p1", None)];
        let observations = vec![observation("p1", "coma", "Gives IV fluids", 1)];

        let matrix = skill_matrix(
            registry.scenario(Scenario::Etat),
            Scenario::Etat,
            &refs(&participants),
            &refs(&observations),
        );

        let find = |domain: &str| {
            matrix
                .domains
                .iter()
                .find(|d| d.domain == domain)
                .and_then(|d| d.rows.iter().find(|r| r.item == "Gives IV fluids"))
                .map(|r| r.cells[0])
        };
        assert!(matches!(find("coma"), Some(Cell::Observed { .. })));
        assert_eq!(find("circulation"), Some(Cell::NotApplicable));
    }

    #[test]
    fn test_skill_matrix_filters_scenario() {
        let registry = TaxonomyRegistry::builtin();
        let participants = vec![participant("p1", None)];
        let mut obs = observation("p1", "pre_birth", "Put on two pairs of clean gloves", 2);
        obs.scenario = Some(Scenario::NotBreathing);
        let observations = vec![obs];

        let breathing = skill_matrix(
            registry.scenario(Scenario::Breathing),
            Scenario::Breathing,
            &refs(&participants),
            &refs(&observations),
        );
        assert!(!breathing.has_data());

        let not_breathing = skill_matrix(
            registry.scenario(Scenario::NotBreathing),
            Scenario::NotBreathing,
            &refs(&participants),
            &refs(&observations),
        );
        assert!(not_breathing.has_data());
    }

    #[test]
    fn test_setting_summary() {
        let participants = vec![participant("p1", Some(TrainingGroup::C))];
        let mut ipd_case = case("k1", "p1", "2024-01-01", 1);
        ipd_case.setting = Some(CareSetting::InPatient);
        ipd_case.all_correct = true;
        let opd_case = case("k2", "p1", "2024-01-01", 2);
        let cases = vec![ipd_case, opd_case];

        let mut ipd_obs = observation("p1", "d", "i", 1);
        ipd_obs.setting = Some(CareSetting::InPatient);
        let observations = vec![ipd_obs, observation("p1", "d", "i", 0)];

        let rows = setting_summary(&participants, &refs(&cases), &refs(&observations));
        let row = &rows[0];
        assert_eq!(row.cases_in_patient, SeenCorrect { seen: 1, correct: 1 });
        assert_eq!(row.cases_out_patient, SeenCorrect { seen: 1, correct: 0 });
        assert_eq!(row.items_out_patient.percentage(), 0.0);
        assert_eq!(
            row.cases_in_patient.combined(&row.cases_out_patient).percentage(),
            50.0
        );
    }

    #[test]
    fn test_scenario_summary() {
        let participants = vec![participant("p1", Some(TrainingGroup::A))];
        let mut breathing = case("k1", "p1", "2024-01-01", 1);
        breathing.scenario = Some(Scenario::Breathing);
        let mut not_breathing = case("k2", "p1", "2024-01-01", 2);
        not_breathing.scenario = Some(Scenario::NotBreathing);
        let cases = vec![breathing, not_breathing];

        let mut a = observation("p1", "eenc", "Dry the baby thoroughly", 2);
        a.case_id = Some("k1".to_string());
        let mut b = observation("p1", "eenc", "Remove the wet cloth", 1);
        b.case_id = Some("k1".to_string());
        let mut c = observation("p1", "resuscitation", "Applied face mask firmly", 0);
        c.case_id = Some("k2".to_string());
        let observations = vec![a, b, c];

        let rows = scenario_summary(&participants, &refs(&cases), &refs(&observations));
        let row = &rows[0];
        assert_eq!(
            row.breathing,
            ScoreTotals {
                cases: 1,
                score: 3,
                max_score: 4
            }
        );
        assert_eq!(row.not_breathing.percentage(), 0.0);
        assert_eq!(row.total.cases, 2);
        assert_eq!(row.total.percentage(), 50.0);
    }
}
