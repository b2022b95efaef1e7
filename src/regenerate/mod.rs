//! Regenerate Module
//!
//! 読み込んだ答案ワークブックと採点結果から、採点済みワークブックを新規に構築する。
//!
//! 出力ワークブックのシート構成:
//!
//! 1. 答案シートのコピー（集計列に採点結果シートへの参照数式を追加）
//! 2. その他のシートのコピー
//! 3. 採点結果シート（各問の点数、塗りつぶし色、SUM数式）
//!
//! 元のモデルは借用するだけで変更しないため、同じ入力から何度でも再生成できます。
//! テーブル定義は出力に含めません。

mod style;

use std::io::Cursor;

use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet, XlsxError};
use tracing::{debug, info};

use crate::analysis::{GradingReport, StudentScore};
use crate::builder::{GraderConfig, MAX_SHEET_NAME_LEN};
use crate::classify::ScoreWeights;
use crate::error::GradingError;
use crate::layout::GradingLayout;
use crate::types::{CellCoord, CellValue};
use crate::workbook::{AnswerWorkbook, SheetData};

pub(crate) use style::StyleTransfer;

/// 列幅のXML値とユーザー向けの値の差（5px / 7px）
const COLUMN_WIDTH_PADDING: f64 = 5.0 / 7.0;

/// 採点済みワークブックを構築してXLSXのバイト列を返す
///
/// 返される`Cursor`の位置は先頭です。
///
/// # 発生し得るエラー
///
/// * `GradingError::NoAnswerSheet` - ワークブックにシートがない場合
/// * `GradingError::Config` - 採点結果が別のシートのものである場合
/// * `GradingError::Regenerate` - ワークブックの構築・シリアライズに失敗した場合
pub(crate) fn regenerate(
    workbook: &AnswerWorkbook,
    report: &GradingReport,
    config: &GraderConfig,
) -> Result<Cursor<Vec<u8>>, GradingError> {
    let answer = workbook.answer_sheet().ok_or(GradingError::NoAnswerSheet)?;

    if let Some(graded) = &report.sheet_name {
        if graded != &answer.name {
            return Err(GradingError::Config(format!(
                "Report was produced for sheet '{}', not '{}'",
                graded, answer.name
            )));
        }
    }

    let layout = &config.layout;
    let result_name = unique_sheet_name(&config.result_sheet_name, &workbook.sheet_names());
    let mut styles = StyleTransfer::new();
    let mut output = Workbook::new();

    // 1. 答案シート
    let mut original = copy_sheet(answer, &mut styles)?;
    write_headers(&mut original, answer, layout, &config.summary_headers, &mut styles)?;
    for student in report {
        write_cross_references(&mut original, answer, layout, &result_name, student, &mut styles)?;
    }
    output.push_worksheet(original);

    // 2. その他のシート
    for sheet in workbook.sheets.iter().skip(1) {
        output.push_worksheet(copy_sheet(sheet, &mut styles)?);
    }

    // 3. 採点結果シート
    let result = build_result_sheet(answer, report, config, &result_name, &mut styles)?;
    output.push_worksheet(result);

    let buffer = output.save_to_buffer()?;

    info!(
        result_sheet = %result_name,
        students = report.len(),
        formats = styles.len(),
        dropped_tables = workbook.table_part_count(),
        bytes = buffer.len(),
        "regenerated graded workbook"
    );

    Ok(Cursor::new(buffer))
}

/// 既存のシート名と重複しない結果シート名を決める
///
/// 重複判定はExcelと同じく大文字小文字を区別しません。
/// 重複した場合は`name(2)`, `name(3)`, ...と番号を付けます。
/// 番号を付けると31文字を超える場合は、元の名前の末尾を切り詰めます。
pub(crate) fn unique_sheet_name(base: &str, existing: &[&str]) -> String {
    let taken = |candidate: &str| {
        let candidate = candidate.to_lowercase();
        existing.iter().any(|name| name.to_lowercase() == candidate)
    };

    if !taken(base) {
        return base.to_string();
    }

    let mut counter = 2usize;
    loop {
        let suffix = format!("({})", counter);
        let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
        let stem: String = base.chars().take(keep).collect();
        let candidate = format!("{}{}", stem, suffix);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// シートの値・数式・スタイル・レイアウトをコピー
fn copy_sheet(sheet: &SheetData, styles: &mut StyleTransfer) -> Result<Worksheet, GradingError> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(&sheet.name)?;

    for (col, width) in &sheet.column_widths {
        worksheet.set_column_width(to_col(*col)?, user_column_width(*width))?;
    }
    for col in &sheet.hidden_cols {
        worksheet.set_column_hidden(to_col(*col)?)?;
    }
    for row in &sheet.hidden_rows {
        worksheet.set_row_hidden(*row)?;
    }

    // 結合範囲を先に作成し、左上セルの値は後から上書きする
    let plain = Format::new();
    for region in &sheet.merged_regions {
        if region.range.is_single_cell() {
            continue;
        }
        let parent = region.parent();
        let format = match sheet.cell(parent.row, parent.col) {
            Some(cell) => styles.format_for(&cell.style),
            None => None,
        };
        worksheet.merge_range(
            region.range.start.row,
            to_col(region.range.start.col)?,
            region.range.end.row,
            to_col(region.range.end.col)?,
            "",
            format.unwrap_or(&plain),
        )?;
    }

    for (coord, cell) in &sheet.cells {
        let format = styles.format_for(&cell.style);
        write_cell(
            &mut worksheet,
            *coord,
            &cell.value,
            cell.formula.as_deref(),
            format,
        )?;
    }

    debug!(sheet = %sheet.name, cells = sheet.cells.len(), "copied sheet");
    Ok(worksheet)
}

/// 採点結果シートを構築
///
/// 答案シートの値をコピーした上で、採点対象行の採点範囲を点数で置き換え、
/// 集計列にSUM数式を書き込みます。
fn build_result_sheet(
    answer: &SheetData,
    report: &GradingReport,
    config: &GraderConfig,
    name: &str,
    styles: &mut StyleTransfer,
) -> Result<Worksheet, GradingError> {
    let layout = &config.layout;
    let mut worksheet = Worksheet::new();
    worksheet.set_name(name)?;

    // 値のみのコピー（数式セルはキャッシュ値）
    for (coord, cell) in &answer.cells {
        write_cell(&mut worksheet, *coord, &cell.value, None, None)?;
    }

    for (col, label) in layout.summary_columns().into_iter().zip(&config.summary_headers) {
        worksheet.write_string(header_row(layout), col, label)?;
    }

    for student in report {
        let row = student.row_index();

        let scored = [
            (layout.objective, &student.objective_grades, ScoreWeights::OBJECTIVE),
            (layout.subjective, &student.subjective_grades, ScoreWeights::SUBJECTIVE),
        ];
        for (span, grades, weights) in scored {
            for (col, grade) in span.columns().zip(grades) {
                let score = weights.points(*grade);
                let format = match answer.cell(row, u32::from(col)) {
                    Some(cell) => styles.fill_only(&cell.style),
                    None => None,
                };
                match format {
                    Some(format) => worksheet.write_number_with_format(row, col, score, format)?,
                    None => worksheet.write_number(row, col, score)?,
                };
            }
        }

        let sums = [
            (
                layout.objective_total_column,
                format!("SUM({})", layout.objective.a1_range(row)),
                student.objective_total,
            ),
            (
                layout.subjective_total_column,
                format!("SUM({})", layout.subjective.a1_range(row)),
                student.subjective_total,
            ),
            (
                layout.total_column,
                format!(
                    "{}+{}",
                    CellCoord::new(row, u32::from(layout.objective_total_column)).to_a1_notation(),
                    CellCoord::new(row, u32::from(layout.subjective_total_column)).to_a1_notation()
                ),
                student.total,
            ),
        ];
        for (col, formula, cached) in sums {
            worksheet.write_formula(row, col, Formula::new(formula).set_result(cached.to_string()))?;
        }
    }

    let last_col = answer
        .max_col()
        .unwrap_or(0)
        .max(u32::from(layout.last_column()));
    for col in layout.objective.first..=to_col(last_col)? {
        worksheet.set_column_width(col, config.score_column_width)?;
    }

    debug!(sheet = %name, students = report.len(), "built result sheet");
    Ok(worksheet)
}

/// 集計列の見出しを書き込む（元セルの書式は維持）
fn write_headers(
    worksheet: &mut Worksheet,
    sheet: &SheetData,
    layout: &GradingLayout,
    labels: &[String; 3],
    styles: &mut StyleTransfer,
) -> Result<(), GradingError> {
    let row = header_row(layout);
    for (col, label) in layout.summary_columns().into_iter().zip(labels) {
        let format = match sheet.cell(row, u32::from(col)) {
            Some(cell) => styles.format_for(&cell.style),
            None => None,
        };
        match format {
            Some(format) => worksheet.write_string_with_format(row, col, label, format)?,
            None => worksheet.write_string(row, col, label)?,
        };
    }
    Ok(())
}

/// 答案シートの集計列に採点結果シートへの参照数式を書き込む
///
/// 呼び出すのは採点結果に含まれる行だけです。氏名が空欄でスキップされた行には
/// 参照数式も点数も書き込まず、元の値のコピーのみが残ります。
fn write_cross_references(
    worksheet: &mut Worksheet,
    sheet: &SheetData,
    layout: &GradingLayout,
    result_name: &str,
    student: &StudentScore,
    styles: &mut StyleTransfer,
) -> Result<(), GradingError> {
    let row = student.row_index();
    let quoted = quote_sheet_name(result_name);
    let targets = [
        (layout.objective_total_column, student.objective_total),
        (layout.subjective_total_column, student.subjective_total),
        (layout.total_column, student.total),
    ];

    for (col, cached) in targets {
        let target = CellCoord::new(row, u32::from(col)).to_a1_notation();
        let formula = Formula::new(format!("{}!{}", quoted, target)).set_result(cached.to_string());
        let format = match sheet.cell(row, u32::from(col)) {
            Some(cell) => styles.format_for(&cell.style),
            None => None,
        };
        match format {
            Some(format) => worksheet.write_formula_with_format(row, col, formula, format)?,
            None => worksheet.write_formula(row, col, formula)?,
        };
    }
    Ok(())
}

/// セル1つを書き込む（数式がある場合は数式とキャッシュ値）
fn write_cell(
    worksheet: &mut Worksheet,
    coord: CellCoord,
    value: &CellValue,
    formula: Option<&str>,
    format: Option<&Format>,
) -> Result<(), GradingError> {
    let row = coord.row;
    let col = to_col(coord.col)?;

    if let Some(formula) = formula {
        let formula = Formula::new(formula).set_result(value.as_raw_string());
        match format {
            Some(format) => worksheet.write_formula_with_format(row, col, formula, format)?,
            None => worksheet.write_formula(row, col, formula)?,
        };
        return Ok(());
    }

    match (value, format) {
        (CellValue::Number(n), Some(format)) => {
            worksheet.write_number_with_format(row, col, *n, format)?;
        }
        (CellValue::Number(n), None) => {
            worksheet.write_number(row, col, *n)?;
        }
        // エラー値は文字列として残す
        (CellValue::String(s) | CellValue::Error(s), Some(format)) => {
            worksheet.write_string_with_format(row, col, s, format)?;
        }
        (CellValue::String(s) | CellValue::Error(s), None) => {
            worksheet.write_string(row, col, s)?;
        }
        (CellValue::Bool(b), Some(format)) => {
            worksheet.write_boolean_with_format(row, col, *b, format)?;
        }
        (CellValue::Bool(b), None) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        (CellValue::Empty, Some(format)) => {
            worksheet.write_blank(row, col, format)?;
        }
        (CellValue::Empty, None) => {}
    }
    Ok(())
}

fn header_row(layout: &GradingLayout) -> u32 {
    layout.data_start_row.saturating_sub(1)
}

fn to_col(col: u32) -> Result<u16, GradingError> {
    u16::try_from(col).map_err(|_| GradingError::Regenerate(XlsxError::RowColumnLimitError))
}

/// XML上の列幅を`set_column_width`に渡す値に変換
fn user_column_width(xml_width: f64) -> f64 {
    (xml_width - COLUMN_WIDTH_PADDING).max(0.0)
}

/// 数式中で使うシート名の表記（常に引用符で囲み、`'`は二重にする）
fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sheet_name_without_collision() {
        assert_eq!(
            unique_sheet_name("grading result", &["Answers", "Notes"]),
            "grading result"
        );
    }

    #[test]
    fn test_unique_sheet_name_with_collisions() {
        assert_eq!(
            unique_sheet_name("grading result", &["Answers", "grading result"]),
            "grading result(2)"
        );
        assert_eq!(
            unique_sheet_name(
                "grading result",
                &["grading result", "Grading Result(2)", "x"]
            ),
            "grading result(3)"
        );
    }

    #[test]
    fn test_unique_sheet_name_stays_within_length_limit() {
        let base = "x".repeat(31);
        let existing = [base.as_str()];
        let name = unique_sheet_name(&base, &existing);
        assert_eq!(name, format!("{}(2)", "x".repeat(28)));
        assert_eq!(name.chars().count(), MAX_SHEET_NAME_LEN);

        let second = format!("{}(2)", "x".repeat(28));
        let name = unique_sheet_name(&base, &[base.as_str(), second.as_str()]);
        assert_eq!(name, format!("{}(3)", "x".repeat(28)));

        // 全角文字も1文字として数える
        let wide = "採".repeat(30);
        let name = unique_sheet_name(&wide, &[wide.as_str()]);
        assert_eq!(name, format!("{}(2)", "採".repeat(28)));
    }

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("grading result"), "'grading result'");
        assert_eq!(quote_sheet_name("Kim's"), "'Kim''s'");
    }

    #[test]
    fn test_user_column_width() {
        assert!((user_column_width(8.7109375) - 8.0).abs() < 0.01);
        assert_eq!(user_column_width(0.5), 0.0);
    }

    #[test]
    fn test_header_row_sits_above_data() {
        assert_eq!(header_row(&GradingLayout::default()), 0);
    }

    #[test]
    fn test_to_col_limit() {
        assert_eq!(to_col(31).ok(), Some(31));
        assert!(matches!(
            to_col(u32::MAX),
            Err(GradingError::Regenerate(XlsxError::RowColumnLimitError))
        ));
    }

    #[test]
    fn test_empty_workbook_has_no_answer_sheet() {
        let result = regenerate(
            &AnswerWorkbook::default(),
            &GradingReport::default(),
            &GraderConfig::default(),
        );
        assert!(matches!(result, Err(GradingError::NoAnswerSheet)));
    }

    #[test]
    fn test_report_from_other_sheet_is_rejected() {
        let workbook = AnswerWorkbook {
            sheets: vec![SheetData {
                name: "Answers".to_string(),
                ..SheetData::default()
            }],
        };
        let report = GradingReport {
            sheet_name: Some("Other".to_string()),
            ..GradingReport::default()
        };
        let result = regenerate(&workbook, &report, &GraderConfig::default());
        assert!(matches!(result, Err(GradingError::Config(_))));
    }

    #[test]
    fn test_regenerate_returns_cursor_at_start() {
        let workbook = AnswerWorkbook {
            sheets: vec![SheetData {
                name: "Answers".to_string(),
                ..SheetData::default()
            }],
        };
        let cursor = regenerate(&workbook, &GradingReport::default(), &GraderConfig::default())
            .expect("regenerate");
        assert_eq!(cursor.position(), 0);
        assert!(cursor.get_ref().starts_with(b"PK"));
    }
}
