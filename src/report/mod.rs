//! Report assembly and rendering.

pub mod builder;
pub mod generator;

pub use builder::{
    build_course_report, build_dashboard_report, build_matrix_report, build_participant_report,
    Report, ReportContext,
};
pub use generator::{generate_json_report, generate_markdown_report};
