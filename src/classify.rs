//! Color Classifier Module
//!
//! セル背景色（RGB）を採点区分（`Grade`）に変換するモジュール。
//! 手作業での塗りつぶしによる色のずれを許容するため、基準色との距離判定と
//! 大まかな色相ヒューリスティックの2段階で判定します。

use crate::api::Grade;
use serde::Serialize;

/// 基準色との距離の許容半径（RGB空間のユークリッド距離）
pub const COLOR_TOLERANCE: f64 = 30.0;

/// 満点の基準色（#B6D7A8）
pub const FULL_REFERENCE: Rgb = Rgb::new(182, 215, 168);

/// 部分点の基準色（#FFE599）
pub const PARTIAL_REFERENCE: Rgb = Rgb::new(255, 229, 153);

/// 0点の基準色（#EA9999）
pub const NONE_REFERENCE: Rgb = Rgb::new(234, 153, 153);

/// ヒューリスティック判定で「高い」とみなすチャンネル値の下限（この値を超える）
pub const HEURISTIC_HIGH: u8 = 200;

/// ヒューリスティック判定で「低い」とみなすチャンネル値の上限（この値未満）
pub const HEURISTIC_LOW: u8 = 180;

const REFERENCES: [(Rgb, Grade); 3] = [
    (FULL_REFERENCE, Grade::Full),
    (PARTIAL_REFERENCE, Grade::Partial),
    (NONE_REFERENCE, Grade::None),
];

/// RGB色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// OOXMLの色コード文字列を解析
    ///
    /// `RRGGBB`形式と、先頭にアルファ値を持つ`AARRGGBB`形式を受け付けます。
    /// 先頭の`#`は無視します。7文字の場合は先頭6文字をRGBとして扱います。
    ///
    /// 16進数でない文字列、6文字未満の文字列、非ASCII文字列は`None`を返します
    /// （パニックしません）。
    ///
    /// ```
    /// use sheetgrader::Rgb;
    ///
    /// assert_eq!(Rgb::from_hex("FFB6D7A8"), Some(Rgb::new(182, 215, 168)));
    /// assert_eq!(Rgb::from_hex("B6D7A8"), Some(Rgb::new(182, 215, 168)));
    /// assert_eq!(Rgb::from_hex("zzzzzz"), None);
    /// assert_eq!(Rgb::from_hex("FFF"), None);
    /// ```
    pub fn from_hex(code: &str) -> Option<Self> {
        let hex = code.trim().trim_start_matches('#');
        if !hex.is_ascii() || hex.len() < 6 {
            return None;
        }

        // ARGBの場合はアルファ値を除去
        let hex = if hex.len() == 8 { &hex[2..] } else { hex };

        let channel = |range: std::ops::Range<usize>| -> Option<u8> {
            let part = &hex[range];
            // from_str_radixは先頭の'+'を受け付けるため、事前に16進数字のみを確認
            if !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            u8::from_str_radix(part, 16).ok()
        };

        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// `0xRRGGBB`形式の整数値に変換
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// RGB空間でのユークリッド距離
    pub fn distance(&self, other: &Rgb) -> f64 {
        let dr = f64::from(self.r) - f64::from(other.r);
        let dg = f64::from(self.g) - f64::from(other.g);
        let db = f64::from(self.b) - f64::from(other.b);
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

/// 背景色を採点区分に変換
///
/// 1. 色がなければ`Unknown`
/// 2. 最も近い基準色が許容半径（`COLOR_TOLERANCE`）以内ならその区分
/// 3. それ以外は色相ヒューリスティック（緑系→満点、黄系→部分点、赤系→0点）
pub fn classify(color: Option<Rgb>) -> Grade {
    let Some(color) = color else {
        return Grade::Unknown;
    };

    let nearest = REFERENCES
        .iter()
        .map(|(reference, grade)| (color.distance(reference), *grade))
        .min_by(|a, b| a.0.total_cmp(&b.0));

    if let Some((distance, grade)) = nearest {
        if distance <= COLOR_TOLERANCE {
            return grade;
        }
    }

    classify_by_hue(color)
}

/// 色コード文字列を直接採点区分に変換
///
/// 解析できない色コードは`Unknown`になります。
pub fn classify_hex(code: Option<&str>) -> Grade {
    classify(code.and_then(Rgb::from_hex))
}

fn classify_by_hue(Rgb { r, g, .. }: Rgb) -> Grade {
    if g > HEURISTIC_HIGH && r < HEURISTIC_LOW {
        Grade::Full
    } else if r > HEURISTIC_HIGH && g > HEURISTIC_HIGH {
        Grade::Partial
    } else if r > HEURISTIC_HIGH && g < HEURISTIC_LOW {
        Grade::None
    } else {
        Grade::Unknown
    }
}

/// 採点区分ごとの配点表
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub full: f64,
    pub partial: f64,
    pub none: f64,
}

impl ScoreWeights {
    /// 客観式（選択問題）の配点: 満点2.5 / 部分点1.25 / 0点
    pub const OBJECTIVE: ScoreWeights = ScoreWeights {
        full: 2.5,
        partial: 1.25,
        none: 0.0,
    };

    /// 主観式（記述問題）の配点: 満点5.0 / 部分点2.5 / 0点
    pub const SUBJECTIVE: ScoreWeights = ScoreWeights {
        full: 5.0,
        partial: 2.5,
        none: 0.0,
    };

    /// 採点区分に対応する点数（`Unknown`は常に0）
    pub fn points(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Full => self.full,
            Grade::Partial => self.partial,
            Grade::None => self.none,
            Grade::Unknown => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_colors_classify_exactly() {
        assert_eq!(classify(Some(FULL_REFERENCE)), Grade::Full);
        assert_eq!(classify(Some(PARTIAL_REFERENCE)), Grade::Partial);
        assert_eq!(classify(Some(NONE_REFERENCE)), Grade::None);
    }

    #[test]
    fn test_absent_color_is_unknown() {
        assert_eq!(classify(None), Grade::Unknown);
        assert_eq!(classify_hex(None), Grade::Unknown);
    }

    #[test]
    fn test_argb_alpha_is_stripped() {
        assert_eq!(classify_hex(Some("FFB6D7A8")), Grade::Full);
        assert_eq!(classify_hex(Some("00FFE599")), Grade::Partial);
        assert_eq!(classify_hex(Some("#FFEA9999")), Grade::None);
    }

    #[test]
    fn test_malformed_codes_are_unknown() {
        for code in ["", "FFF", "GGGGGG", "12345", "+1+2+3", "日本語の色", "FF-1FF00"] {
            assert_eq!(classify_hex(Some(code)), Grade::Unknown, "code: {code:?}");
        }
    }

    #[test]
    fn test_drift_within_tolerance() {
        // 手作業の塗りつぶしで少しずれた緑
        assert_eq!(classify(Some(Rgb::new(190, 210, 160))), Grade::Full);
        // 距離ちょうど30は許容範囲内
        assert_eq!(classify(Some(Rgb::new(212, 215, 168))), Grade::Full);
    }

    #[test]
    fn test_heuristic_fallback() {
        // 純粋な緑
        assert_eq!(classify(Some(Rgb::new(0, 255, 0))), Grade::Full);
        // 純粋な黄
        assert_eq!(classify(Some(Rgb::new(255, 255, 0))), Grade::Partial);
        // 純粋な赤
        assert_eq!(classify(Some(Rgb::new(255, 0, 0))), Grade::None);
        // 青・白・黒はいずれにも該当しない
        assert_eq!(classify(Some(Rgb::new(0, 0, 255))), Grade::Unknown);
        assert_eq!(classify(Some(Rgb::new(0, 0, 0))), Grade::Unknown);
        assert_eq!(classify(Some(Rgb::new(190, 190, 190))), Grade::Unknown);
    }

    #[test]
    fn test_white_is_partial_by_heuristic() {
        // 白(255,255,255)は黄系の条件(r>200, g>200)に一致する
        assert_eq!(classify(Some(Rgb::new(255, 255, 255))), Grade::Partial);
    }

    #[test]
    fn test_weights() {
        assert_eq!(ScoreWeights::OBJECTIVE.points(Grade::Full), 2.5);
        assert_eq!(ScoreWeights::OBJECTIVE.points(Grade::Partial), 1.25);
        assert_eq!(ScoreWeights::OBJECTIVE.points(Grade::None), 0.0);
        assert_eq!(ScoreWeights::OBJECTIVE.points(Grade::Unknown), 0.0);
        assert_eq!(ScoreWeights::SUBJECTIVE.points(Grade::Full), 5.0);
        assert_eq!(ScoreWeights::SUBJECTIVE.points(Grade::Partial), 2.5);
        assert_eq!(ScoreWeights::SUBJECTIVE.points(Grade::Unknown), 0.0);
    }

    #[test]
    fn test_to_u32() {
        assert_eq!(FULL_REFERENCE.to_u32(), 0xB6D7A8);
        assert_eq!(PARTIAL_REFERENCE.to_u32(), 0xFFE599);
    }

    fn offset(base: u8, delta: i16) -> Option<u8> {
        u8::try_from(i16::from(base) + delta).ok()
    }

    proptest! {
        #[test]
        fn prop_within_tolerance_keeps_reference_grade(
            idx in 0usize..3,
            dr in -17i16..=17,
            dg in -17i16..=17,
            db in -17i16..=17,
        ) {
            let (reference, grade) = REFERENCES[idx];
            if let (Some(r), Some(g), Some(b)) = (
                offset(reference.r, dr),
                offset(reference.g, dg),
                offset(reference.b, db),
            ) {
                let color = Rgb::new(r, g, b);
                prop_assume!(color.distance(&reference) <= COLOR_TOLERANCE);
                prop_assert_eq!(classify(Some(color)), grade);
            }
        }

        #[test]
        fn prop_arbitrary_strings_never_panic(code in ".{0,12}") {
            let grade = classify_hex(Some(&code));
            if Rgb::from_hex(&code).is_none() {
                prop_assert_eq!(grade, Grade::Unknown);
                prop_assert_eq!(ScoreWeights::SUBJECTIVE.points(grade), 0.0);
            }
        }
    }
}
