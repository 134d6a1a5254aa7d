//! Analysis modules.
//!
//! Scoring primitives, record filtering, the observation aggregator and the
//! cross-course dashboard counts.

pub mod aggregator;
pub mod dashboard;
pub mod filter;
pub mod score;

pub use aggregator::*;
pub use dashboard::{CourseKpis, CourseListing, CrossTab};
pub use filter::{CourseFilter, RecordFilter};
pub use score::{band, format_percentage, Band, Stat};
