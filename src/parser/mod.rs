//! Parser Module
//!
//! calamineとXMLの直接解析を組み合わせて答案ワークブックを読み込みます。
//! セルの値・数式はcalamine、塗りつぶし色などのスタイルはXMLから取得します。

mod metadata;
mod workbook;

pub(crate) use metadata::XlsxMetadataParser;
pub(crate) use workbook::WorkbookParser;
