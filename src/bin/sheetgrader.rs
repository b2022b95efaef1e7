//! sheetgrader CLI - grade colour-coded answer sheets

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use sheetgrader::{graded_file_name, GraderBuilder, SummaryFormat, UnnamedRowPolicy};
use std::io;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "sheetgrader")]
#[command(author, version, about = "Grade colour-coded XLSX answer sheets")]
struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade the first sheet of a workbook and write the graded copy
    Grade {
        /// Input answer workbook (xlsx)
        input: PathBuf,

        /// Output workbook (default: PE-Training-Test-YYYY.MM.DD.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Summary table format
        #[arg(short, long, value_enum, default_value_t = Format::Markdown)]
        format: Format,

        /// Grade rows without a student name if they carry coloured cells
        #[arg(long)]
        report_unnamed: bool,

        /// Name of the grading result sheet
        #[arg(long, default_value = sheetgrader::DEFAULT_RESULT_SHEET_NAME)]
        sheet_name: String,

        /// Print the summary without writing a graded workbook
        #[arg(long)]
        no_write: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
    Csv,
}

impl From<Format> for SummaryFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Markdown => SummaryFormat::Markdown,
            Format::Json => SummaryFormat::Json,
            Format::Csv => SummaryFormat::Csv,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Grade {
            input,
            output,
            format,
            report_unnamed,
            sheet_name,
            no_write,
        } => grade(
            &input,
            output.as_deref(),
            format,
            report_unnamed,
            sheet_name,
            no_write,
        ),
    }
}

fn grade(
    input: &Path,
    output: Option<&Path>,
    format: Format,
    report_unnamed: bool,
    sheet_name: String,
    no_write: bool,
) -> Result<()> {
    let policy = if report_unnamed {
        UnnamedRowPolicy::Report
    } else {
        UnnamedRowPolicy::Skip
    };

    let grader = GraderBuilder::new()
        .with_unnamed_rows(policy)
        .with_result_sheet_name(sheet_name)
        .build()
        .context("Invalid grading configuration")?;

    let workbook = grader
        .load_path(input)
        .with_context(|| format!("Failed to load '{}'", input.display()))?;

    let report = grader.analyze(&workbook);

    grader
        .render_summary(&report, format.into(), io::stdout().lock())
        .context("Failed to write summary")?;

    // 集計値は標準エラーへ（標準出力はJSON/CSVとして使えるように保つ）
    eprintln!("Students: {}", report.len());
    if let Some(average) = report.average_total() {
        eprintln!("Average total: {:.1}", average);
    }
    if !report.skipped_rows.is_empty() {
        eprintln!(
            "Warning: skipped {} row(s) with marks but no name: {:?}",
            report.skipped_rows.len(),
            report.skipped_rows
        );
    }

    if no_write {
        return Ok(());
    }

    let graded = grader
        .regenerate(&workbook, &report)
        .context("Failed to build graded workbook")?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(graded_file_name(Local::now().date_naive())),
    };
    std::fs::write(&path, graded.into_inner())
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    eprintln!("Wrote graded workbook to '{}'", path.display());

    Ok(())
}
