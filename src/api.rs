//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use serde::Serialize;

/// セル背景色から判定した採点区分
///
/// 答案セルの塗りつぶし色を3色の基準色と比較した結果です。
/// 色が存在しない・解析できない場合は`Unknown`となり、配点は常に0です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    /// 満点（緑）
    Full,

    /// 部分点（黄）
    Partial,

    /// 0点（赤）
    None,

    /// 判定不能（塗りつぶしなし、不正な色コード、基準外の色）
    Unknown,
}

impl Grade {
    /// 3色のいずれかに判定されたかどうか
    pub fn is_known(&self) -> bool {
        !matches!(self, Grade::Unknown)
    }
}

/// 氏名セルが空の行の扱い
///
/// 元のシステムでは氏名が空の行は採点対象から完全に除外されていました。
/// 色付きの答案セルを持つ無記名行を別途報告したい場合は`Report`を指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum UnnamedRowPolicy {
    /// 無記名行をスキップする（デフォルト）
    ///
    /// 集計表にも出力されず、採点済みワークブックでも採点・数式の書き込みは行われません。
    #[default]
    Skip,

    /// 判定可能な色セルを1つ以上持つ無記名行を採点し、無記名として報告する
    Report,
}

/// 集計表の出力フォーマット
///
/// `GradingReport`を表示用に出力する際の形式を指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SummaryFormat {
    /// Markdownテーブル形式（デフォルト）
    ///
    /// # 出力例
    ///
    /// ```markdown
    /// | #   | Name  | Objective (25) | Subjective (75) | Total (100) |
    /// | --- | ----- | -------------- | --------------- | ----------- |
    /// | 1   | Alice | 25             | 75              | 100         |
    /// ```
    #[default]
    Markdown,

    /// JSON形式
    ///
    /// 行番号・各問の判定結果を含む詳細な構造で出力します。
    Json,

    /// CSV形式
    ///
    /// ```csv
    /// #,Name,Objective (25),Subjective (75),Total (100)
    /// 1,Alice,25,75,100
    /// ```
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_is_known() {
        assert!(Grade::Full.is_known());
        assert!(Grade::Partial.is_known());
        assert!(Grade::None.is_known());
        assert!(!Grade::Unknown.is_known());
    }

    #[test]
    fn test_grade_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Grade::Partial).unwrap(), "\"partial\"");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(UnnamedRowPolicy::default(), UnnamedRowPolicy::Skip);
        assert_eq!(SummaryFormat::default(), SummaryFormat::Markdown);
    }
}
