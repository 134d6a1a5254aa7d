//! Percentage scoring primitives.
//!
//! Every breakdown in the aggregator reduces to a [`Tally`] and reports its
//! percentage through [`percentage`]. A zero denominator is "no data" and is
//! represented by `NaN`, which renders as an em-dash.

use crate::models::{Observation, Protocol};
use serde::{Serialize, Serializer};
use std::fmt;

/// Placeholder rendered for percentages without data.
pub const NO_DATA: &str = "—";

/// `numerator * 100 / denominator`, or `NaN` when there is nothing to divide by.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || denominator.is_nan() {
        return f64::NAN;
    }
    numerator * 100.0 / denominator
}

/// Round to a whole percent for display, e.g. `"70 %"`.
pub fn format_percentage(value: f64) -> String {
    if !value.is_finite() {
        return NO_DATA.to_string();
    }
    format!("{:.0} %", value.round())
}

/// Average of `count` over `participants`; zero participants yields 0, not NaN.
pub fn per_participant_average(count: usize, participants: usize) -> f64 {
    if participants == 0 {
        return 0.0;
    }
    count as f64 / participants as f64
}

/// Colour band a percentage falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Medium,
    High,
    None,
}

impl Band {
    /// Marker used in Markdown tables.
    pub fn emoji(&self) -> &'static str {
        match self {
            Band::Low => "🔴",
            Band::Medium => "🟡",
            Band::High => "🟢",
            Band::None => "⚪",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Low => write!(f, "Low"),
            Band::Medium => write!(f, "Medium"),
            Band::High => write!(f, "High"),
            Band::None => write!(f, "-"),
        }
    }
}

/// Band for a percentage: below 50 low, 50 to 80 inclusive medium, above 80 high.
pub fn band(value: f64) -> Band {
    if !value.is_finite() {
        Band::None
    } else if value < 50.0 {
        Band::Low
    } else if value <= 80.0 {
        Band::Medium
    } else {
        Band::High
    }
}

/// Serialize a percentage, writing `null` for the no-data sentinel.
pub fn serialize_percentage<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Running counts for a set of observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Observations seen.
    pub total: usize,
    /// Observations with a positive judgement.
    pub correct: usize,
    /// Sum of correctness values.
    pub score: u32,
    /// Sum of the per-item maxima.
    pub max_score: u32,
}

impl Tally {
    pub fn record(&mut self, protocol: Protocol, observation: &Observation) {
        self.total += 1;
        if observation.is_correct() {
            self.correct += 1;
        }
        self.score += u32::from(observation.correctness);
        self.max_score += protocol.max_item_score();
    }

    pub fn from_observations<'a, I>(protocol: Protocol, observations: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut tally = Self::default();
        for observation in observations {
            tally.record(protocol, observation);
        }
        tally
    }

    /// Combine two tallies.
    pub fn merge(&mut self, other: &Tally) {
        self.total += other.total;
        self.correct += other.correct;
        self.score += other.score;
        self.max_score += other.max_score;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Percentage under the protocol's scoring rule.
    pub fn percentage(&self, protocol: Protocol) -> f64 {
        if protocol.is_scored() {
            percentage(self.score as f64, self.max_score as f64)
        } else {
            percentage(self.correct as f64, self.total as f64)
        }
    }

    /// Mean item score, used for scored matrix cells.
    pub fn average_score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.score as f64 / self.total as f64
    }

    /// Protocol-shaped statistic.
    pub fn stat(&self, protocol: Protocol) -> Stat {
        let percentage = self.percentage(protocol);
        if protocol.is_scored() {
            Stat::Scored {
                score: self.score,
                max_score: self.max_score,
                percentage,
            }
        } else {
            Stat::Binary {
                total: self.total,
                correct: self.correct,
                percentage,
            }
        }
    }
}

/// Output statistic, shaped by the protocol's scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Stat {
    Binary {
        total: usize,
        correct: usize,
        #[serde(serialize_with = "serialize_percentage")]
        percentage: f64,
    },
    Scored {
        score: u32,
        #[serde(rename = "maxScore")]
        max_score: u32,
        #[serde(serialize_with = "serialize_percentage")]
        percentage: f64,
    },
}

impl Stat {
    pub fn percentage(&self) -> f64 {
        match self {
            Stat::Binary { percentage, .. } | Stat::Scored { percentage, .. } => *percentage,
        }
    }

    /// `correct/total` or `score/max` fraction text.
    pub fn fraction(&self) -> String {
        match self {
            Stat::Binary { total, correct, .. } => format!("{}/{}", correct, total),
            Stat::Scored {
                score, max_score, ..
            } => format!("{}/{}", score, max_score),
        }
    }
}
