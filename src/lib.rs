//! sheetgrader - Colour-coded exam answer sheet grader for XLSX workbooks
//!
//! This crate reads an answer sheet whose cells are shaded green (full marks),
//! yellow (partial marks) or red (no marks), totals the scores of every student
//! row, and regenerates the workbook with a `grading result` sheet holding the
//! per-question scores and `SUM` formulas.
//!
//! The default layout expects the student name in column C, ten objective
//! questions in E..N (2.5 points each) and fifteen subjective questions in
//! P..AD (5 points each), with data starting on row 2.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sheetgrader::GraderBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grader = GraderBuilder::new().build()?;
//!
//!     // Load the answer workbook
//!     let workbook = grader.load_path("answers.xlsx")?;
//!
//!     // Grade the first sheet
//!     let report = grader.analyze(&workbook);
//!     for student in &report {
//!         println!("{}: {}", student.name, student.total);
//!     }
//!
//!     // Write the graded workbook
//!     let graded = grader.regenerate(&workbook, &report)?;
//!     std::fs::write("graded.xlsx", graded.into_inner())?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # One-shot Grading
//!
//! ```rust,no_run
//! use std::fs::File;
//! use sheetgrader::{GraderBuilder, SummaryFormat};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grader = GraderBuilder::new().build()?;
//!     let graded = grader.grade(File::open("answers.xlsx")?)?;
//!
//!     grader.render_summary(&graded.report, SummaryFormat::Markdown, std::io::stdout())?;
//!     if let Some(average) = graded.report.average_total() {
//!         println!("average: {:.2}", average);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Classifying Colours Directly
//!
//! ```rust
//! use sheetgrader::{classify_hex, Grade};
//!
//! assert_eq!(classify_hex(Some("FFB6D7A8")), Grade::Full);
//! assert_eq!(classify_hex(Some("#FFE599")), Grade::Partial);
//! assert_eq!(classify_hex(Some("zzzzzz")), Grade::Unknown);
//! assert_eq!(classify_hex(None), Grade::Unknown);
//! ```

mod analysis;
mod api;
mod builder;
mod classify;
mod error;
mod layout;
mod output;
mod parser;
mod regenerate;
mod security;
mod types;
mod workbook;

// 公開API
pub use analysis::{GradingReport, StudentScore};
pub use api::{Grade, SummaryFormat, UnnamedRowPolicy};
pub use builder::{
    graded_file_name, GradedWorkbook, Grader, GraderBuilder, DEFAULT_RESULT_SHEET_NAME,
    DEFAULT_SCORE_COLUMN_WIDTH,
};
pub use classify::{
    classify, classify_hex, Rgb, ScoreWeights, COLOR_TOLERANCE, FULL_REFERENCE, HEURISTIC_HIGH,
    HEURISTIC_LOW, NONE_REFERENCE, PARTIAL_REFERENCE,
};
pub use error::GradingError;
pub use layout::{ColumnSpan, GradingLayout};
pub use security::SecurityConfig;
pub use workbook::AnswerWorkbook;
