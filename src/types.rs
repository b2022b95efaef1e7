//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellValue {
    /// 数値（f64）。日付もシリアル値として保持する
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// 氏名セルとして空白かどうか（空セル、または空白文字のみの文字列）
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 値を文字列として取得（書式適用前）
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Number(n) => n.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列を座標に変換（例: "A1" -> (0, 0)、"$AE$12" -> (11, 30)）
    pub fn from_a1(ref_str: &str) -> Option<Self> {
        let mut col: u32 = 0;
        let mut row_str = String::new();

        for ch in ref_str.chars().filter(|&ch| ch != '$') {
            if ch.is_ascii_alphabetic() && row_str.is_empty() {
                let val = u32::from(ch.to_ascii_uppercase()) - u32::from('A') + 1;
                col = col.checked_mul(26)?.checked_add(val)?;
            } else if ch.is_ascii_digit() {
                row_str.push(ch);
            } else {
                return None;
            }
        }

        if col == 0 || row_str.is_empty() {
            return None;
        }

        // 1始まりなので0始まりに変換
        let row = row_str.parse::<u32>().ok()?.checked_sub(1)?;
        Some(Self::new(row, col - 1))
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}{}", col_index_to_letter(self.col), self.row + 1)
    }
}

/// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
fn col_index_to_letter(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// 列インデックス（0始まり）をExcelの列名に変換
pub(crate) fn column_letter(col: u16) -> String {
    col_index_to_letter(u32::from(col))
}

/// セル範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    /// 新しい範囲を生成
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    /// 1セルのみの範囲かどうか
    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }
}

/// セル結合範囲の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergedRegion {
    /// 結合範囲
    pub range: CellRange,
}

impl MergedRegion {
    pub fn new(range: CellRange) -> Self {
        Self { range }
    }

    /// 親セル（左上セル）の座標
    pub fn parent(&self) -> CellCoord {
        self.range.start
    }
}

/// セルのスタイル情報（採点と再生成に必要な部分のみ）
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct CellStyle {
    /// 塗りつぶしの前景色（`fgColor`の`rgb`属性そのまま、例: "FFB6D7A8"）
    ///
    /// パターンが`none`の塗りつぶしやテーマ色の場合は`None`。
    pub fill_rgb: Option<String>,

    /// 表示形式文字列（"General"以外）
    pub num_format: Option<String>,
}

impl CellStyle {
    pub fn is_plain(&self) -> bool {
        self.fill_rgb.is_none() && self.num_format.is_none()
    }
}

/// 読み込んだセル1つ分のデータ
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourceCell {
    pub value: CellValue,
    /// 数式（先頭の`=`なし）
    pub formula: Option<String>,
    pub style: CellStyle,
}

impl Default for SourceCell {
    fn default() -> Self {
        Self {
            value: CellValue::Empty,
            formula: None,
            style: CellStyle::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_a1_notation() {
        assert_eq!(CellCoord::new(0, 0).to_a1_notation(), "A1");
        assert_eq!(CellCoord::new(1, 25).to_a1_notation(), "Z2");
        assert_eq!(CellCoord::new(9, 26).to_a1_notation(), "AA10");
        assert_eq!(CellCoord::new(0, 29).to_a1_notation(), "AD1");
        assert_eq!(CellCoord::new(0, 31).to_a1_notation(), "AF1");
    }

    #[test]
    fn test_from_a1() {
        assert_eq!(CellCoord::from_a1("A1"), Some(CellCoord::new(0, 0)));
        assert_eq!(CellCoord::from_a1("AE12"), Some(CellCoord::new(11, 30)));
        assert_eq!(CellCoord::from_a1("$C$3"), Some(CellCoord::new(2, 2)));
        assert_eq!(CellCoord::from_a1("xfd1"), Some(CellCoord::new(0, 16_383)));
        assert_eq!(CellCoord::from_a1("A0"), None);
        assert_eq!(CellCoord::from_a1("12"), None);
        assert_eq!(CellCoord::from_a1("A"), None);
        assert_eq!(CellCoord::from_a1("1A"), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::String("   ".to_string()).is_blank());
        assert!(!CellValue::String("Kim".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_as_raw_string() {
        assert_eq!(CellValue::Number(18.75).as_raw_string(), "18.75");
        assert_eq!(CellValue::Number(25.0).as_raw_string(), "25");
        assert_eq!(CellValue::Bool(true).as_raw_string(), "TRUE");
        assert_eq!(CellValue::Empty.as_raw_string(), "");
    }
}
