//! Output Format Module
//!
//! 採点結果（`GradingReport`）を集計表として出力するモジュール。

mod formatters;

use crate::analysis::GradingReport;
use crate::api::SummaryFormat;
use crate::error::GradingError;
use std::io::Write;

pub use formatters::*;

/// 集計表の列見出し
pub(crate) const SUMMARY_HEADERS: [&str; 5] = [
    "#",
    "Name",
    "Objective (25)",
    "Subjective (75)",
    "Total (100)",
];

/// 集計表フォーマッター
#[derive(Debug, Clone, Copy)]
pub enum SummaryFormatter {
    Markdown,
    Json,
    Csv,
}

impl SummaryFormatter {
    /// 出力フォーマットからフォーマッターを生成
    pub fn from_format(format: SummaryFormat) -> Self {
        match format {
            SummaryFormat::Markdown => SummaryFormatter::Markdown,
            SummaryFormat::Json => SummaryFormatter::Json,
            SummaryFormat::Csv => SummaryFormatter::Csv,
        }
    }

    /// 採点結果を指定されたフォーマットで出力する
    pub fn render<W: Write>(
        &self,
        report: &GradingReport,
        writer: &mut W,
    ) -> Result<(), GradingError> {
        match self {
            SummaryFormatter::Markdown => MarkdownFormatter.render(report, writer),
            SummaryFormatter::Json => JsonFormatter.render(report, writer),
            SummaryFormatter::Csv => CsvFormatter.render(report, writer),
        }
    }
}

/// 集計表の行（見出しを除く）を文字列で生成
///
/// 点数は小数点以下1桁で表示します。JSON出力は元の値のままです。
pub(crate) fn summary_rows(report: &GradingReport) -> Vec<[String; 5]> {
    report
        .iter()
        .enumerate()
        .map(|(i, student)| {
            [
                (i + 1).to_string(),
                student.display_name(),
                format_score(student.objective_total),
                format_score(student.subjective_total),
                format_score(student.total),
            ]
        })
        .collect()
}

fn format_score(score: f64) -> String {
    format!("{:.1}", score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StudentScore;

    #[test]
    fn test_summary_rows_use_one_decimal() {
        let report = GradingReport {
            sheet_name: None,
            students: vec![StudentScore {
                row: 7,
                name: String::new(),
                unnamed: true,
                objective_grades: Vec::new(),
                subjective_grades: Vec::new(),
                objective_total: 2.5,
                subjective_total: 0.0,
                total: 2.5,
            }],
            skipped_rows: Vec::new(),
        };

        let rows = summary_rows(&report);
        assert_eq!(
            rows,
            vec![[
                "1".to_string(),
                "(unnamed row 7)".to_string(),
                "2.5".to_string(),
                "0.0".to_string(),
                "2.5".to_string(),
            ]]
        );
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(25.0), "25.0");
        assert_eq!(format_score(100.0), "100.0");
        assert_eq!(format_score(18.8), "18.8");
    }
}
