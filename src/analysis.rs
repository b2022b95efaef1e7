//! Analysis Module
//!
//! 答案シートの各行について、採点範囲のセル背景色を判定して
//! 学生ごとの客観式・主観式・総合計を集計するモジュール。

use serde::Serialize;
use tracing::{debug, info};

use crate::api::{Grade, UnnamedRowPolicy};
use crate::classify::{classify_hex, ScoreWeights};
use crate::layout::{ColumnSpan, GradingLayout};
use crate::types::CellValue;
use crate::workbook::SheetData;

/// 学生1人分（答案シート1行分）の採点結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentScore {
    /// Excel上の行番号（1始まり）
    pub row: u32,
    /// 氏名セルの値
    pub name: String,
    /// 氏名が空の行を`UnnamedRowPolicy::Report`で採点した場合に`true`
    pub unnamed: bool,
    /// 客観式範囲の各列の判定結果（左から順）
    pub objective_grades: Vec<Grade>,
    /// 主観式範囲の各列の判定結果（左から順）
    pub subjective_grades: Vec<Grade>,
    pub objective_total: f64,
    pub subjective_total: f64,
    /// 客観式合計 + 主観式合計
    pub total: f64,
}

impl StudentScore {
    /// 表示用の氏名（無記名行は行番号で表す）
    pub fn display_name(&self) -> String {
        if self.unnamed {
            format!("(unnamed row {})", self.row)
        } else {
            self.name.clone()
        }
    }

    /// 0始まりの行インデックス
    pub(crate) fn row_index(&self) -> u32 {
        self.row - 1
    }
}

/// 答案シート全体の採点結果
///
/// `students`は常に元のシートの行順に並びます。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradingReport {
    /// 採点した答案シート名（シートがない場合は`None`）
    pub sheet_name: Option<String>,
    pub students: Vec<StudentScore>,
    /// 氏名が空のためスキップした行のうち、判定可能な色セルを持っていた行（1始まり）
    pub skipped_rows: Vec<u32>,
}

impl GradingReport {
    /// 採点した学生数
    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StudentScore> {
        self.students.iter()
    }

    /// 総合計の平均点（学生がいない場合は`None`）
    pub fn average_total(&self) -> Option<f64> {
        if self.students.is_empty() {
            return None;
        }
        let sum: f64 = self.students.iter().map(|s| s.total).sum();
        Some(sum / self.students.len() as f64)
    }
}

impl<'a> IntoIterator for &'a GradingReport {
    type Item = &'a StudentScore;
    type IntoIter = std::slice::Iter<'a, StudentScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.students.iter()
    }
}

/// 答案シートを採点
///
/// シートが存在しない、または空の場合は空の結果を返します（エラーにはなりません）。
pub(crate) fn analyze_sheet(
    sheet: Option<&SheetData>,
    layout: &GradingLayout,
    policy: UnnamedRowPolicy,
) -> GradingReport {
    let Some(sheet) = sheet else {
        return GradingReport::default();
    };

    let mut report = GradingReport {
        sheet_name: Some(sheet.name.clone()),
        ..GradingReport::default()
    };

    let Some(max_row) = sheet.max_row() else {
        return report;
    };

    let name_col = u32::from(layout.name_column);

    for row in layout.data_start_row..=max_row {
        let objective_grades = grades_for(sheet, row, &layout.objective);
        let subjective_grades = grades_for(sheet, row, &layout.subjective);

        let name_cell = sheet.value(row, name_col);
        let unnamed = name_cell.is_blank();
        if unnamed {
            let has_marks = objective_grades
                .iter()
                .chain(&subjective_grades)
                .any(Grade::is_known);
            if !has_marks {
                continue;
            }
            if policy == UnnamedRowPolicy::Skip {
                debug!(row = row + 1, "skipping row without a student name");
                report.skipped_rows.push(row + 1);
                continue;
            }
        }

        let objective_total = sum_points(&objective_grades, &ScoreWeights::OBJECTIVE);
        let subjective_total = sum_points(&subjective_grades, &ScoreWeights::SUBJECTIVE);

        let name = match name_cell {
            CellValue::Empty => String::new(),
            value => value.as_raw_string(),
        };

        debug!(
            row = row + 1,
            name = %name,
            objective_total,
            subjective_total,
            "graded row"
        );

        report.students.push(StudentScore {
            row: row + 1,
            name,
            unnamed,
            objective_grades,
            subjective_grades,
            objective_total,
            subjective_total,
            total: objective_total + subjective_total,
        });
    }

    report.students.sort_by_key(|student| student.row);

    info!(
        sheet = %sheet.name,
        students = report.students.len(),
        skipped = report.skipped_rows.len(),
        "analyzed answer sheet"
    );

    report
}

fn grades_for(sheet: &SheetData, row: u32, span: &ColumnSpan) -> Vec<Grade> {
    span.columns()
        .map(|col| classify_hex(sheet.fill_rgb(row, u32::from(col))))
        .collect()
}

fn sum_points(grades: &[Grade], weights: &ScoreWeights) -> f64 {
    grades.iter().map(|grade| weights.points(*grade)).sum()
}
