//! Style Transfer Module
//!
//! 元セルのスタイル（塗りつぶし色、表示形式）を`rust_xlsxwriter`の
//! `Format`に変換して出力セルへ引き継ぐ。同じスタイルの`Format`は使い回す。

use std::collections::HashMap;

use rust_xlsxwriter::{Color, Format, FormatPattern};
use tracing::warn;

use crate::classify::Rgb;
use crate::types::CellStyle;

/// スタイル転写
#[derive(Debug, Default)]
pub(crate) struct StyleTransfer {
    formats: HashMap<CellStyle, Format>,
}

impl StyleTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 元セルのスタイルに対応する書式（書式なしの場合は`None`）
    pub fn format_for(&mut self, style: &CellStyle) -> Option<&Format> {
        if style.is_plain() {
            return None;
        }
        Some(
            self.formats
                .entry(style.clone())
                .or_insert_with(|| build_format(style)),
        )
    }

    /// 塗りつぶし色のみを引き継ぐ書式（採点セル用）
    pub fn fill_only(&mut self, style: &CellStyle) -> Option<&Format> {
        let fill = CellStyle {
            fill_rgb: style.fill_rgb.clone(),
            num_format: None,
        };
        self.format_for(&fill)
    }

    /// 作成済みの書式数
    pub fn len(&self) -> usize {
        self.formats.len()
    }
}

fn build_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if let Some(code) = &style.fill_rgb {
        match Rgb::from_hex(code) {
            Some(rgb) => {
                format = format
                    .set_pattern(FormatPattern::Solid)
                    .set_background_color(Color::RGB(rgb.to_u32()));
            }
            None => warn!(fill = %code, "dropping unreadable fill colour"),
        }
    }

    if let Some(num_format) = &style.num_format {
        format = format.set_num_format(num_format);
    }

    format
}
