//! Output Formatters Implementation
//!
//! 各出力フォーマットの実装を提供するモジュール。

use super::{summary_rows, SUMMARY_HEADERS};
use crate::analysis::GradingReport;
use crate::error::GradingError;
use std::io::Write;
use unicode_width::UnicodeWidthStr;

/// Markdown形式のフォーマッター
///
/// 全角文字（日本語の氏名など）は表示幅2として列幅を揃えます。
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn render<W: Write>(
        &self,
        report: &GradingReport,
        writer: &mut W,
    ) -> Result<(), GradingError> {
        let header: [String; 5] = SUMMARY_HEADERS.map(str::to_string);
        let rows = summary_rows(report);

        // 1. 列幅の計算（最小幅は3文字）
        let mut widths = [3usize; 5];
        for row in std::iter::once(&header).chain(&rows) {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.trim().width());
            }
        }

        // 2. 見出し、区切り行、各行の出力
        write_row(writer, &header, &widths)?;
        writeln!(writer, "{}", separator(&widths))?;
        for row in &rows {
            write_row(writer, row, &widths)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn write_row<W: Write>(
    writer: &mut W,
    row: &[String; 5],
    widths: &[usize; 5],
) -> Result<(), GradingError> {
    write!(writer, "|")?;
    for (cell, width) in row.iter().zip(widths) {
        let content = cell.trim();
        // 表示幅に基づいて左揃え
        let padding = width.saturating_sub(content.width());
        write!(writer, " {}{} |", content, " ".repeat(padding))?;
    }
    writeln!(writer)?;
    Ok(())
}

/// ヘッダー区切り行（セル前後のスペース分を含む）
fn separator(widths: &[usize]) -> String {
    let mut line = String::from("|");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('|');
    }
    line
}

/// JSON形式のフォーマッター
///
/// 各問の判定結果を含む`GradingReport`全体を出力します。
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn render<W: Write>(
        &self,
        report: &GradingReport,
        writer: &mut W,
    ) -> Result<(), GradingError> {
        serde_json::to_writer_pretty(&mut *writer, report).map_err(|e| {
            GradingError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// CSV形式のフォーマッター
pub struct CsvFormatter;

impl CsvFormatter {
    pub fn render<W: Write>(
        &self,
        report: &GradingReport,
        writer: &mut W,
    ) -> Result<(), GradingError> {
        writeln!(writer, "{}", SUMMARY_HEADERS.map(escape_csv).join(","))?;
        for row in summary_rows(report) {
            let escaped: Vec<String> = row.iter().map(|cell| escape_csv(cell)).collect();
            writeln!(writer, "{}", escaped.join(","))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// CSV文字列をエスケープ
///
/// ダブルクォート、改行、カンマを含む場合はダブルクォートで囲み、
/// 内部のダブルクォートは2つにエスケープします。
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
