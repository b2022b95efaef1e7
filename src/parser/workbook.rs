//! Workbook Parser Module
//!
//! calamineとXMLメタデータパーサーを組み合わせて、答案ワークブックを
//! 読み取り専用のモデル（`AnswerWorkbook`）に変換します。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets, Xlsx};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

use crate::error::GradingError;
use crate::parser::XlsxMetadataParser;
use crate::security::SecurityConfig;
use crate::types::{CellCoord, CellRange, CellValue, MergedRegion, SourceCell};
use crate::workbook::{AnswerWorkbook, SheetData};

/// ワークブックパーサー
///
/// calamineのラッパーとして値と数式を、`XlsxMetadataParser`として
/// スタイルとレイアウトを取得します。
pub(crate) struct WorkbookParser {
    /// calamineのワークブック（XLSX形式のみサポート）
    workbook: Xlsx<Cursor<Vec<u8>>>,
    /// XMLメタデータパーサー
    metadata: XlsxMetadataParser,
}

impl WorkbookParser {
    /// ワークブックを開き、XMLメタデータも解析する
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - ワークブックとメタデータの読み込みに成功した場合
    /// * `Err(GradingError)` - 入力が大きすぎる、XLSXでない、破損している場合
    pub fn open<R: Read>(mut reader: R, security: &SecurityConfig) -> Result<Self, GradingError> {
        // ファイル全体をメモリに読み込む
        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        security.check_input_size(bytes_read)?;

        // セキュリティチェックを含むため、calamineより先にメタデータを解析
        let metadata = XlsxMetadataParser::new(&buffer, security)?;

        let sheets = open_workbook_auto_from_rs(Cursor::new(buffer))?;
        let workbook = match sheets {
            Sheets::Xlsx(workbook) => workbook,
            _ => {
                return Err(GradingError::Load(calamine::Error::Msg(
                    "Only XLSX format is supported",
                )))
            }
        };

        Ok(Self { workbook, metadata })
    }

    /// すべてのシートを読み込んでモデルを構築
    pub fn into_answer_workbook(mut self) -> Result<AnswerWorkbook, GradingError> {
        self.workbook
            .load_merged_regions()
            .map_err(|e| GradingError::Load(e.into()))?;

        let sheet_names = self.workbook.sheet_names();
        let mut sheets = Vec::with_capacity(sheet_names.len());

        for sheet_name in sheet_names {
            sheets.push(self.parse_sheet(&sheet_name)?);
        }

        Ok(AnswerWorkbook { sheets })
    }

    /// シートをパースして、値・数式・スタイル・レイアウトを抽出
    fn parse_sheet(&mut self, sheet_name: &str) -> Result<SheetData, GradingError> {
        // 1. 値の取得
        let range = self
            .workbook
            .worksheet_range(sheet_name)
            .map_err(|e| GradingError::Load(e.into()))?;

        // 2. 数式の取得（取得できない場合は数式なしとして扱う）
        let formula_range = self.workbook.worksheet_formula(sheet_name).ok();

        // 3. 結合セル範囲の取得
        let merged_regions = match self.workbook.worksheet_merge_cells(sheet_name) {
            Some(Ok(regions)) => regions
                .iter()
                .map(|dims| {
                    let start = CellCoord::new(dims.start.0, dims.start.1);
                    let end = CellCoord::new(dims.end.0, dims.end.1);
                    MergedRegion::new(CellRange::new(start, end))
                })
                .collect(),
            Some(Err(_)) | None => Vec::new(),
        };

        // 4. XMLメタデータ（スタイル、列幅、非表示行・列）
        let layout = self.metadata.take_sheet_layout(sheet_name);

        let mut cells: BTreeMap<CellCoord, SourceCell> = BTreeMap::new();
        let mut extent = layout.extent;

        for (coord, data) in absolute_cells(&range) {
            let value = convert_value(data);
            if value.is_empty() {
                continue;
            }
            cells.entry(coord).or_default().value = value;
            extent = Some(widen(extent, coord));
        }

        if let Some(formula_range) = &formula_range {
            for (coord, formula) in absolute_cells(formula_range) {
                if formula.is_empty() {
                    continue;
                }
                let formula = formula.strip_prefix('=').unwrap_or(formula);
                cells.entry(coord).or_default().formula = Some(formula.to_string());
                extent = Some(widen(extent, coord));
            }
        }

        let mut styled = 0usize;
        for (coord, style_id) in &layout.cell_styles {
            let style = self.metadata.cell_style(*style_id);
            if style.is_plain() {
                continue;
            }
            cells.entry(*coord).or_default().style = style;
            styled += 1;
        }

        if layout.table_parts > 0 {
            warn!(
                sheet = %sheet_name,
                tables = layout.table_parts,
                "table definitions will not be carried into the graded workbook"
            );
        }

        debug!(
            sheet = %sheet_name,
            cells = cells.len(),
            styled,
            merged = merged_regions.len(),
            "loaded sheet"
        );

        Ok(SheetData {
            name: sheet_name.to_string(),
            cells,
            extent,
            column_widths: layout.column_widths,
            hidden_rows: layout.hidden_rows,
            hidden_cols: layout.hidden_cols,
            merged_regions,
            table_parts: layout.table_parts,
        })
    }
}

/// calamineの範囲を絶対座標のセル列に変換（空セルは除く）
///
/// `Range::used_cells`は範囲の開始位置からの相対座標を返すため、開始位置を加算します。
fn absolute_cells<T>(range: &Range<T>) -> impl Iterator<Item = (CellCoord, &T)>
where
    T: calamine::CellType,
{
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    range.used_cells().map(move |(row, col, value)| {
        (
            CellCoord::new(start_row + row as u32, start_col + col as u32),
            value,
        )
    })
}

fn widen(extent: Option<CellCoord>, coord: CellCoord) -> CellCoord {
    match extent {
        Some(current) => CellCoord::new(current.row.max(coord.row), current.col.max(coord.col)),
        None => coord,
    }
}

/// calamineのセルデータを変換
fn convert_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        // 日付はシリアル値として保持し、表示形式で日付として表示させる
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}
