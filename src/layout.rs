//! Grading Layout Module
//!
//! 答案シートの列配置（氏名列、客観式・主観式の採点範囲、集計列）を
//! 名前付きの設定構造体として表現するモジュール。

use crate::error::GradingError;
use crate::types::column_letter;

/// Excelの最大列インデックス（0始まり、XFD列）
const MAX_COLUMN: u16 = 16_383;

/// 連続した列範囲（0始まり、両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    pub first: u16,
    pub last: u16,
}

impl ColumnSpan {
    pub const fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    /// 範囲に含まれる列数
    pub fn len(&self) -> usize {
        if self.last < self.first {
            0
        } else {
            usize::from(self.last - self.first) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, col: u16) -> bool {
        col >= self.first && col <= self.last
    }

    pub fn columns(&self) -> impl Iterator<Item = u16> {
        self.first..=self.last
    }

    /// 指定行の範囲をA1形式で表す（例: `E2:N2`）
    pub fn a1_range(&self, row: u32) -> String {
        format!(
            "{}{}:{}{}",
            column_letter(self.first),
            row + 1,
            column_letter(self.last),
            row + 1
        )
    }

    fn overlaps(&self, other: &ColumnSpan) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// 答案シートの列配置
///
/// すべてのインデックスは0始まりです。デフォルト値は以下の固定レイアウトです。
///
/// | 項目 | 列 |
/// | ---- | -- |
/// | 氏名 | C |
/// | 客観式（10問） | E〜N |
/// | 客観式合計 | O |
/// | 主観式（15問） | P〜AD |
/// | 主観式合計 | AE |
/// | 総合計 | AF |
///
/// データ行は2行目（インデックス1）から始まり、1行目はヘッダーとして扱います。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingLayout {
    /// 氏名列
    pub name_column: u16,
    /// 最初のデータ行
    pub data_start_row: u32,
    /// 客観式の採点範囲
    pub objective: ColumnSpan,
    /// 主観式の採点範囲
    pub subjective: ColumnSpan,
    /// 客観式合計の列
    pub objective_total_column: u16,
    /// 主観式合計の列
    pub subjective_total_column: u16,
    /// 総合計の列
    pub total_column: u16,
}

impl Default for GradingLayout {
    fn default() -> Self {
        Self {
            name_column: 2,
            data_start_row: 1,
            objective: ColumnSpan::new(4, 13),
            subjective: ColumnSpan::new(15, 29),
            objective_total_column: 14,
            subjective_total_column: 30,
            total_column: 31,
        }
    }
}

impl GradingLayout {
    /// 集計3列（客観式合計、主観式合計、総合計）
    pub fn summary_columns(&self) -> [u16; 3] {
        [
            self.objective_total_column,
            self.subjective_total_column,
            self.total_column,
        ]
    }

    /// 採点範囲に関わる最も右の列
    pub fn last_column(&self) -> u16 {
        self.summary_columns()
            .into_iter()
            .chain([self.objective.last, self.subjective.last, self.name_column])
            .max()
            .unwrap_or(self.total_column)
    }

    /// レイアウトの整合性を検証
    ///
    /// # 発生し得るエラー
    ///
    /// * `GradingError::Config` - 以下のいずれかに該当する場合
    ///   * 採点範囲の開始列が終了列より大きい
    ///   * 採点範囲同士、または採点範囲と氏名列・集計列が重なっている
    ///   * 集計列が重複している
    ///   * 列がExcelの最大列を超えている
    ///   * データ開始行が1行目（ヘッダー行）になっている
    pub fn validate(&self) -> Result<(), GradingError> {
        for (label, span) in [("objective", self.objective), ("subjective", self.subjective)] {
            if span.first > span.last {
                return Err(GradingError::Config(format!(
                    "Invalid {} range: first column ({}) > last column ({})",
                    label, span.first, span.last
                )));
            }
        }

        if self.objective.overlaps(&self.subjective) {
            return Err(GradingError::Config(
                "Objective and subjective ranges overlap".to_string(),
            ));
        }

        let singles = [
            ("name", self.name_column),
            ("objective total", self.objective_total_column),
            ("subjective total", self.subjective_total_column),
            ("total", self.total_column),
        ];

        for (label, col) in singles {
            if col > MAX_COLUMN {
                return Err(GradingError::Config(format!(
                    "The {} column ({}) exceeds the worksheet limit",
                    label, col
                )));
            }
            if self.objective.contains(col) || self.subjective.contains(col) {
                return Err(GradingError::Config(format!(
                    "The {} column ({}) lies inside a scoring range",
                    label,
                    column_letter(col)
                )));
            }
        }

        if self.objective.last > MAX_COLUMN || self.subjective.last > MAX_COLUMN {
            return Err(GradingError::Config(
                "Scoring range exceeds the worksheet limit".to_string(),
            ));
        }

        for (i, (label_a, a)) in singles.iter().enumerate() {
            for (label_b, b) in singles.iter().skip(i + 1) {
                if a == b {
                    return Err(GradingError::Config(format!(
                        "The {} and {} columns are both {}",
                        label_a,
                        label_b,
                        column_letter(*a)
                    )));
                }
            }
        }

        if self.data_start_row == 0 {
            return Err(GradingError::Config(
                "Data rows must start below the header row".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = GradingLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.objective.len(), 10);
        assert_eq!(layout.subjective.len(), 15);
        assert_eq!(layout.last_column(), 31);
    }

    #[test]
    fn test_default_layout_letters() {
        let layout = GradingLayout::default();
        assert_eq!(layout.objective.a1_range(1), "E2:N2");
        assert_eq!(layout.subjective.a1_range(1), "P2:AD2");
        assert_eq!(column_letter(layout.objective_total_column), "O");
        assert_eq!(column_letter(layout.subjective_total_column), "AE");
        assert_eq!(column_letter(layout.total_column), "AF");
    }

    #[test]
    fn test_reversed_span_is_rejected() {
        let layout = GradingLayout {
            objective: ColumnSpan::new(13, 4),
            ..GradingLayout::default()
        };
        match layout.validate() {
            Err(GradingError::Config(msg)) => assert!(msg.contains("objective")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_overlapping_spans_are_rejected() {
        let layout = GradingLayout {
            subjective: ColumnSpan::new(10, 29),
            ..GradingLayout::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_summary_column_inside_range_is_rejected() {
        let layout = GradingLayout {
            total_column: 20,
            ..GradingLayout::default()
        };
        match layout.validate() {
            Err(GradingError::Config(msg)) => assert!(msg.contains("scoring range")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_summary_columns_are_rejected() {
        let layout = GradingLayout {
            total_column: 30,
            ..GradingLayout::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_header_row_as_data_is_rejected() {
        let layout = GradingLayout {
            data_start_row: 0,
            ..GradingLayout::default()
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_span_helpers() {
        let span = ColumnSpan::new(4, 6);
        assert_eq!(span.len(), 3);
        assert!(!span.is_empty());
        assert!(span.contains(5));
        assert!(!span.contains(7));
        assert_eq!(span.columns().collect::<Vec<_>>(), vec![4, 5, 6]);
    }
}
