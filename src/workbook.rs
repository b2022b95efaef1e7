//! Answer Workbook Model
//!
//! 読み込んだ答案ワークブックのメモリ上の表現。
//! 一度構築された後は読み取り専用で、採点・再生成はこのモデルを借用するだけです。

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{CellCoord, CellValue, MergedRegion, SourceCell};

static EMPTY_VALUE: CellValue = CellValue::Empty;

/// ワークシート1枚分のデータ（値、数式、スタイル、レイアウト）
#[derive(Debug, Clone, Default)]
pub(crate) struct SheetData {
    pub name: String,
    /// 値または書式を持つセル（疎行列）
    pub cells: BTreeMap<CellCoord, SourceCell>,
    /// 使用範囲の右下（0始まり）
    pub extent: Option<CellCoord>,
    /// 列インデックス -> 列幅（XML上の値）
    pub column_widths: BTreeMap<u32, f64>,
    pub hidden_rows: BTreeSet<u32>,
    pub hidden_cols: BTreeSet<u32>,
    pub merged_regions: Vec<MergedRegion>,
    /// 元ファイルに存在したテーブル定義の数
    pub table_parts: usize,
}

impl SheetData {
    pub fn cell(&self, row: u32, col: u32) -> Option<&SourceCell> {
        self.cells.get(&CellCoord::new(row, col))
    }

    /// セルの値（存在しないセルは空）
    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        self.cell(row, col).map_or(&EMPTY_VALUE, |cell| &cell.value)
    }

    /// セルの塗りつぶし色コード
    pub fn fill_rgb(&self, row: u32, col: u32) -> Option<&str> {
        self.cell(row, col)
            .and_then(|cell| cell.style.fill_rgb.as_deref())
    }

    /// 最終行のインデックス（0始まり）
    pub fn max_row(&self) -> Option<u32> {
        self.extent.map(|coord| coord.row)
    }

    /// 最終列のインデックス（0始まり）
    pub fn max_col(&self) -> Option<u32> {
        self.extent.map(|coord| coord.col)
    }
}

/// 読み込み済みの答案ワークブック
///
/// `Grader::load`または`Grader::load_path`で生成します。
/// 最初のシートが答案シートとして扱われます。
#[derive(Debug, Clone, Default)]
pub struct AnswerWorkbook {
    pub(crate) sheets: Vec<SheetData>,
}

impl AnswerWorkbook {
    /// すべてのシート名（ワークブック内の順序）
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    /// 答案シート（最初のシート）の名前
    pub fn answer_sheet_name(&self) -> Option<&str> {
        self.answer_sheet().map(|sheet| sheet.name.as_str())
    }

    /// 答案シートの使用行数（ヘッダー行を含む）
    pub fn answer_row_count(&self) -> u32 {
        self.answer_sheet()
            .and_then(SheetData::max_row)
            .map_or(0, |row| row + 1)
    }

    /// 元ファイルに含まれていたテーブル定義の総数
    ///
    /// 再生成したワークブックには引き継がれません。
    pub fn table_part_count(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.table_parts).sum()
    }

    pub(crate) fn answer_sheet(&self) -> Option<&SheetData> {
        self.sheets.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with_cell(name: &str, coord: CellCoord, value: CellValue) -> SheetData {
        let mut sheet = SheetData {
            name: name.to_string(),
            extent: Some(coord),
            ..SheetData::default()
        };
        sheet.cells.insert(
            coord,
            SourceCell {
                value,
                ..SourceCell::default()
            },
        );
        sheet
    }

    #[test]
    fn test_empty_workbook() {
        let workbook = AnswerWorkbook::default();
        assert!(workbook.sheet_names().is_empty());
        assert_eq!(workbook.answer_sheet_name(), None);
        assert_eq!(workbook.answer_row_count(), 0);
    }

    #[test]
    fn test_first_sheet_is_answer_sheet() {
        let workbook = AnswerWorkbook {
            sheets: vec![
                sheet_with_cell("Answers", CellCoord::new(4, 2), CellValue::Number(1.0)),
                sheet_with_cell("Notes", CellCoord::new(0, 0), CellValue::Empty),
            ],
        };
        assert_eq!(workbook.sheet_names(), vec!["Answers", "Notes"]);
        assert_eq!(workbook.answer_sheet_name(), Some("Answers"));
        assert_eq!(workbook.answer_row_count(), 5);
    }

    #[test]
    fn test_missing_cell_reads_as_empty() {
        let sheet = sheet_with_cell("Answers", CellCoord::new(1, 1), CellValue::Bool(true));
        assert_eq!(sheet.value(1, 1), &CellValue::Bool(true));
        assert_eq!(sheet.value(7, 7), &CellValue::Empty);
        assert_eq!(sheet.fill_rgb(1, 1), None);
    }
}
