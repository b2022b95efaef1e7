//! XML Metadata Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得不可能な情報を抽出するモジュール。
//! セルの塗りつぶし色、表示形式、列幅、非表示行/列、テーブル定義の有無などを提供します。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::GradingError;
use crate::security::{validate_zip_path, SecurityConfig};
use crate::types::{CellCoord, CellStyle};

/// Excelの列数上限
const COLUMN_LIMIT: u32 = 16_384;

/// セルスタイル情報（cellXfs要素）
#[derive(Debug, Clone, Default)]
pub(crate) struct CellXf {
    pub num_fmt_id: u32,
    pub fill_id: Option<u32>,
}

/// 塗りつぶし定義（fills要素）
#[derive(Debug, Clone, Default)]
pub(crate) struct FillDef {
    /// patternType属性（未指定は"none"扱い）
    pub pattern: Option<String>,
    /// fgColorのrgb属性
    pub fg_rgb: Option<String>,
}

impl FillDef {
    /// 塗りつぶしとして有効な前景色
    fn visible_rgb(&self) -> Option<&str> {
        match self.pattern.as_deref() {
            None | Some("none") => None,
            Some(_) => self.fg_rgb.as_deref(),
        }
    }
}

/// ワークシート1枚分のレイアウト情報
#[derive(Debug, Clone, Default)]
pub(crate) struct SheetLayout {
    /// セル座標 -> スタイルID（s属性）
    pub cell_styles: BTreeMap<CellCoord, u32>,
    /// 列インデックス -> 列幅（XML上の値）
    pub column_widths: BTreeMap<u32, f64>,
    pub hidden_rows: BTreeSet<u32>,
    pub hidden_cols: BTreeSet<u32>,
    /// `<tablePart>`の数（再生成時には引き継がない）
    pub table_parts: usize,
    /// `<c>`要素が存在する最も右下の位置（値のない書式のみのセルを含む）
    pub extent: Option<CellCoord>,
}

impl SheetLayout {
    fn extend(&mut self, coord: CellCoord) {
        self.extent = Some(match self.extent {
            Some(current) => CellCoord::new(current.row.max(coord.row), current.col.max(coord.col)),
            None => coord,
        });
    }
}

/// XLSXメタデータパーサー
///
/// XLSXファイル（ZIPアーカイブ）からXMLを直接解析し、
/// calamineで取得できない情報を抽出します。
#[derive(Debug, Clone, Default)]
pub(crate) struct XlsxMetadataParser {
    /// numFmtId -> formatCode のマッピング
    num_formats: HashMap<u32, String>,
    /// fillId -> 塗りつぶし定義
    fills: Vec<FillDef>,
    /// styleId -> CellXf のマッピング
    cell_xfs: Vec<CellXf>,
    /// シート名 -> レイアウト情報
    sheets: HashMap<String, SheetLayout>,
}

impl XlsxMetadataParser {
    /// XLSXファイルのバイト列からメタデータを解析
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxMetadataParser)` - メタデータの解析に成功した場合
    /// * `Err(GradingError)` - ZIPが不正、セキュリティ制限違反、XMLが不正な場合
    pub fn new(data: &[u8], security: &SecurityConfig) -> Result<Self, GradingError> {
        let mut archive =
            ZipArchive::new(Cursor::new(data)).map_err(|e| GradingError::Zip(format!("{}", e)))?;

        security.check_archive(&mut archive)?;

        // 1. xl/styles.xml を解析
        let (num_formats, fills, cell_xfs) = match read_entry(&mut archive, "xl/styles.xml")? {
            Some(xml) => Self::parse_styles(&xml)?,
            None => (HashMap::new(), Vec::new(), Vec::new()),
        };

        // 2. xl/workbook.xml とリレーションシップからシート名 -> パスを解決
        let sheet_paths = Self::resolve_sheet_paths(&mut archive)?;

        // 3. 各ワークシートXMLを解析
        let mut sheets = HashMap::new();
        for (name, path) in sheet_paths {
            validate_zip_path(&path).map_err(|e| {
                GradingError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            if let Some(xml) = read_entry(&mut archive, &path)? {
                let layout = Self::parse_worksheet_xml(&xml)?;
                debug!(
                    sheet = %name,
                    styled_cells = layout.cell_styles.len(),
                    table_parts = layout.table_parts,
                    "parsed worksheet metadata"
                );
                sheets.insert(name, layout);
            }
        }

        Ok(Self {
            num_formats,
            fills,
            cell_xfs,
            sheets,
        })
    }

    /// シートのレイアウト情報を取り出す
    pub fn take_sheet_layout(&mut self, sheet_name: &str) -> SheetLayout {
        self.sheets.remove(sheet_name).unwrap_or_default()
    }

    /// styleIdからセルスタイルを解決
    pub fn cell_style(&self, style_id: u32) -> CellStyle {
        let Some(xf) = self.cell_xfs.get(style_id as usize) else {
            return CellStyle::default();
        };

        let fill_rgb = xf
            .fill_id
            .and_then(|id| self.fills.get(id as usize))
            .and_then(FillDef::visible_rgb)
            .map(str::to_string);

        let num_format = self
            .format_string(xf.num_fmt_id)
            .filter(|code| !code.eq_ignore_ascii_case("General"))
            .map(str::to_string);

        CellStyle {
            fill_rgb,
            num_format,
        }
    }

    /// numFmtIdからNumber Format Stringを取得
    fn format_string(&self, num_fmt_id: u32) -> Option<&str> {
        if num_fmt_id < 164 {
            // ビルトイン書式ID（0-163）の場合はハードコードマッピングを使用
            get_builtin_format(num_fmt_id)
        } else {
            self.num_formats.get(&num_fmt_id).map(|s| s.as_str())
        }
    }

    /// xl/styles.xml の解析（プライベート）
    ///
    /// `<numFmts>`、`<fills>`、`<cellXfs>` を解析します。
    #[allow(clippy::type_complexity)]
    fn parse_styles(
        xml: &[u8],
    ) -> Result<(HashMap<u32, String>, Vec<FillDef>, Vec<CellXf>), GradingError> {
        let mut num_formats = HashMap::new();
        let mut fills = Vec::new();
        let mut cell_xfs = Vec::new();

        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut in_num_fmts = false;
        let mut in_fills = false;
        let mut in_cell_xfs = false;
        let mut current_fill: Option<FillDef> = None;

        loop {
            buf.clear();
            let (e, self_closing) = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => (e, false),
                Ok(Event::Empty(e)) => (e, true),
                Ok(Event::End(e)) => {
                    match e.local_name().as_ref() {
                        b"numFmts" => in_num_fmts = false,
                        b"fills" => in_fills = false,
                        b"fill" => {
                            if let Some(fill) = current_fill.take() {
                                fills.push(fill);
                            }
                        }
                        b"cellXfs" => in_cell_xfs = false,
                        _ => {}
                    }
                    continue;
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(e)),
                _ => continue,
            };

            match e.local_name().as_ref() {
                b"numFmts" => in_num_fmts = !self_closing,
                b"numFmt" if in_num_fmts => {
                    // <numFmt numFmtId="165" formatCode="0.000"/>
                    let id = attr(&e, b"numFmtId")?;
                    let code = attr(&e, b"formatCode")?;
                    if let (Some(id), Some(code)) = (id, code) {
                        let id: u32 = id.parse()?;
                        // カスタム書式ID（>= 164）のみ保存
                        if id >= 164 {
                            num_formats.insert(id, code);
                        }
                    }
                }
                b"fills" => in_fills = !self_closing,
                b"fill" if in_fills => {
                    if self_closing {
                        fills.push(FillDef::default());
                    } else {
                        current_fill = Some(FillDef::default());
                    }
                }
                b"patternFill" => {
                    if let Some(fill) = current_fill.as_mut() {
                        fill.pattern = attr(&e, b"patternType")?;
                    }
                }
                b"fgColor" => {
                    if let Some(fill) = current_fill.as_mut() {
                        fill.fg_rgb = attr(&e, b"rgb")?;
                    }
                }
                b"cellXfs" => in_cell_xfs = !self_closing,
                b"xf" if in_cell_xfs => {
                    // <xf numFmtId="165" fontId="0" fillId="2" borderId="0"/>
                    let num_fmt_id = match attr(&e, b"numFmtId")? {
                        Some(id) => id.parse()?,
                        None => 0,
                    };
                    let fill_id = match attr(&e, b"fillId")? {
                        Some(id) => Some(id.parse()?),
                        None => None,
                    };
                    cell_xfs.push(CellXf {
                        num_fmt_id,
                        fill_id,
                    });
                }
                _ => {}
            }
        }

        Ok((num_formats, fills, cell_xfs))
    }

    /// シート名とワークシートXMLのパスを対応付ける
    ///
    /// `xl/workbook.xml`の`<sheet r:id>`を`xl/_rels/workbook.xml.rels`で解決します。
    fn resolve_sheet_paths<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<(String, String)>, GradingError> {
        let Some(workbook_xml) = read_entry(archive, "xl/workbook.xml")? else {
            return Ok(Vec::new());
        };
        let sheets = Self::parse_workbook_sheets(&workbook_xml)?;

        let relationships = match read_entry(archive, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => Self::parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        Ok(sheets
            .into_iter()
            .filter_map(|(name, rel_id)| {
                let target = relationships.get(&rel_id)?;
                Some((name, resolve_target(target)))
            })
            .collect())
    }

    /// xl/workbook.xml から (シート名, リレーションシップID) を順序通りに取得
    fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, String)>, GradingError> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() == b"sheet" {
                        // <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
                        if let (Some(name), Some(id)) = (attr(&e, b"name")?, attr(&e, b"id")?) {
                            sheets.push((name, id));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(e)),
                _ => {}
            }
        }

        Ok(sheets)
    }

    /// リレーションシップファイルを解析（Id -> Target）
    fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, GradingError> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut relationships = HashMap::new();

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() == b"Relationship" {
                        if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                            relationships.insert(id, target);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(e)),
                _ => {}
            }
        }

        Ok(relationships)
    }

    /// ワークシートXMLからセルスタイル、列幅、非表示行・列、テーブル定義数を解析
    fn parse_worksheet_xml(xml: &[u8]) -> Result<SheetLayout, GradingError> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut layout = SheetLayout::default();
        let mut current_row: Option<u32> = None;
        let mut next_col: u32 = 0;

        loop {
            buf.clear();
            let e = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => e,
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(e)),
                _ => continue,
            };

            match e.local_name().as_ref() {
                b"col" => {
                    // <col min="3" max="3" width="12.5" customWidth="1" hidden="1"/>
                    let (Some(min), Some(max)) = (attr(&e, b"min")?, attr(&e, b"max")?) else {
                        continue;
                    };
                    // Excelの列番号は1始まりなので、0始まりに変換
                    let min = min.parse::<u32>()?.saturating_sub(1);
                    let max = max.parse::<u32>()?.saturating_sub(1).min(COLUMN_LIMIT - 1);
                    let width = match attr(&e, b"width")? {
                        Some(w) => w.parse::<f64>().ok(),
                        None => None,
                    };
                    let hidden = is_truthy(attr(&e, b"hidden")?.as_deref());

                    for col in min..=max {
                        if let Some(width) = width {
                            layout.column_widths.insert(col, width);
                        }
                        if hidden {
                            layout.hidden_cols.insert(col);
                        }
                    }
                }
                b"row" => {
                    // <row r="15" hidden="1">
                    let row = match attr(&e, b"r")? {
                        Some(r) => r.parse::<u32>()?.saturating_sub(1),
                        None => current_row.map_or(0, |r| r + 1),
                    };
                    current_row = Some(row);
                    next_col = 0;

                    if is_truthy(attr(&e, b"hidden")?.as_deref()) {
                        layout.hidden_rows.insert(row);
                    }
                }
                b"c" => {
                    // <c r="E2" s="3" t="s">
                    let coord = attr(&e, b"r")?
                        .and_then(|r| CellCoord::from_a1(&r))
                        .unwrap_or_else(|| CellCoord::new(current_row.unwrap_or(0), next_col));
                    next_col = coord.col + 1;

                    if let Some(style) = attr(&e, b"s")? {
                        layout.cell_styles.insert(coord, style.parse()?);
                    }
                    layout.extend(coord);
                }
                b"tablePart" => {
                    layout.table_parts += 1;
                }
                _ => {}
            }
        }

        Ok(layout)
    }
}

/// ZIPエントリをメモリに読み込む（存在しない場合は`None`）
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, GradingError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(GradingError::Zip(format!("{}", e))),
    };

    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// リレーションシップのTargetをアーカイブ内パスに変換
///
/// "worksheets/sheet1.xml" -> "xl/worksheets/sheet1.xml"、
/// "/xl/worksheets/sheet1.xml" -> "xl/worksheets/sheet1.xml"
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// 属性値をローカル名で取得（名前空間プレフィックスは無視）
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, GradingError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| GradingError::Xml(format!("XML attribute error: {}", e)))?;
        if attr.key.local_name().as_ref() == key {
            let raw = std::str::from_utf8(&attr.value)
                .map_err(|e| GradingError::Xml(format!("XML attribute error: {}", e)))?;
            let value = quick_xml::escape::unescape(raw)
                .map_err(|e| GradingError::Xml(format!("XML attribute error: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

fn xml_error(e: quick_xml::Error) -> GradingError {
    GradingError::Xml(format!("{}", e))
}

/// ビルトイン書式ID（0-163）のマッピング
///
/// Excelの標準書式IDとフォーマット文字列の対応表です。
fn get_builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0_);(#,##0)"),
        38 => Some("#,##0_);[Red](#,##0)"),
        39 => Some("#,##0.00_);(#,##0.00)"),
        40 => Some("#,##0.00_);[Red](#,##0.00)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mm:ss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}
