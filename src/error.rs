//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// sheetgraderクレート全体で使用するエラー型
///
/// 答案ワークブックの読み込み、採点、採点済みワークブックの再生成中に
/// 発生するすべてのエラーを統一的に扱うために使用されます。
///
/// セル単位の異常（不正な色コード、塗りつぶしなし）はエラーにならず、
/// `Grade::Unknown`（0点）として吸収されます。ここに現れるのは
/// ファイル単位・構造単位の失敗のみです。
///
/// # エラーの種類
///
/// - 読み込み失敗: `Io`, `Load`, `Zip`, `Xml`, `ParseInt`, `SecurityViolation`
/// - 再生成失敗: `Regenerate`, `NoAnswerSheet`
/// - 設定エラー: `Config`
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetgrader::{GraderBuilder, GradingError};
///
/// fn run(path: &str) -> Result<(), GradingError> {
///     let grader = GraderBuilder::new().build()?;
///     let workbook = grader.load_path(path)?;
///     let report = grader.analyze(&workbook);
///     let _bytes = grader.regenerate(&workbook, &report)?;
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum GradingError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックの読み込み中に発生したエラー（calamine由来）
    ///
    /// ファイル形式が不正、破損したファイルなどが原因となります。
    #[error("Failed to load workbook: {0}")]
    Load(#[from] calamine::Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLパーツの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// 数値の解析エラー
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// 設定の検証に失敗したエラー
    ///
    /// `GraderBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。例えば、列範囲が重なっている場合や、
    /// 結果シート名がExcelのシート名規則に違反している場合などです。
    ///
    /// ```rust,no_run
    /// use sheetgrader::{GraderBuilder, GradingError};
    ///
    /// let result = GraderBuilder::new()
    ///     .with_result_sheet_name("bad:name")
    ///     .build();
    ///
    /// if let Err(GradingError::Config(msg)) = result {
    ///     println!("設定エラー: {}", msg);
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 答案シートが存在しないワークブックを再生成しようとした
    #[error("Workbook has no answer sheet to grade")]
    NoAnswerSheet,

    /// 採点済みワークブックの構築・シリアライズ中に発生したエラー
    ///
    /// このエラーが返された場合、部分的な出力は返されません。
    #[error("Failed to build graded workbook: {0}")]
    Regenerate(#[from] rust_xlsxwriter::XlsxError),
}

impl GradingError {
    /// 入力ファイルの読み込み段階で発生したエラーかどうか
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            GradingError::Io(_)
                | GradingError::Load(_)
                | GradingError::Zip(_)
                | GradingError::Xml(_)
                | GradingError::ParseInt(_)
                | GradingError::SecurityViolation(_)
        )
    }

    /// 採点済みワークブックの再生成段階で発生したエラーかどうか
    pub fn is_regeneration_failure(&self) -> bool {
        matches!(
            self,
            GradingError::Regenerate(_) | GradingError::NoAnswerSheet
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: GradingError = io_err.into();

        match error {
            GradingError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_load_error_display() {
        let load_err = calamine::Error::Msg("Corrupted file");
        let error: GradingError = load_err.into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("Failed to load workbook"));
        assert!(error_msg.contains("Corrupted file"));
        assert!(error.is_load_failure());
        assert!(!error.is_regeneration_failure());
    }

    #[test]
    fn test_regenerate_error_conversion() {
        let xlsx_err = rust_xlsxwriter::XlsxError::ParameterError("bad cell".to_string());
        let error: GradingError = xlsx_err.into();

        assert!(matches!(error, GradingError::Regenerate(_)));
        assert!(error.is_regeneration_failure());
        assert!(!error.is_load_failure());
        assert!(error.to_string().starts_with("Failed to build graded workbook"));
    }

    #[test]
    fn test_no_answer_sheet_is_regeneration_failure() {
        let error = GradingError::NoAnswerSheet;
        assert!(error.is_regeneration_failure());
        assert_eq!(error.to_string(), "Workbook has no answer sheet to grade");
    }

    #[test]
    fn test_config_error_is_neither_stage() {
        let error = GradingError::Config("Invalid layout".to_string());
        assert!(!error.is_load_failure());
        assert!(!error.is_regeneration_failure());
        assert!(error.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), GradingError> {
            let _file = std::fs::File::open("nonexistent_answer_sheet.xlsx")?;
            Ok(())
        }

        match io_operation() {
            Err(GradingError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }
}
