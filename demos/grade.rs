//! Grading Example
//!
//! Grades a colour-coded answer sheet with default settings, prints the
//! summary table and writes the graded workbook.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example grade -- answers.xlsx graded.xlsx
//! ```
//!
//! Without an output path the graded workbook is written to
//! `PE-Training-Test-YYYY.MM.DD.xlsx` in the current directory.

use std::fs::File;

use chrono::Local;
use sheetgrader::{graded_file_name, GraderBuilder, SummaryFormat};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(input_path) = std::env::args().nth(1) else {
        eprintln!("Usage: grade <answers.xlsx> [graded.xlsx]");
        std::process::exit(1);
    };
    let output_path = std::env::args()
        .nth(2)
        .unwrap_or_else(|| graded_file_name(Local::now().date_naive()));

    let grader = GraderBuilder::new().build()?;

    let input = File::open(&input_path).map_err(|e| {
        eprintln!("Error: Could not open input file '{}'", input_path);
        e
    })?;
    let graded = grader.grade(input)?;

    grader.render_summary(&graded.report, SummaryFormat::Markdown, std::io::stdout())?;
    if let Some(average) = graded.report.average_total() {
        println!("\n{} students, average {:.1}", graded.report.len(), average);
    }

    std::fs::write(&output_path, graded.workbook.into_inner())?;
    println!("Graded workbook written to: {}", output_path);

    Ok(())
}
