//! Builder Module
//!
//! Fluent Builder APIを提供し、`Grader`インスタンスを段階的に構築する。

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::analysis::{analyze_sheet, GradingReport};
use crate::api::{SummaryFormat, UnnamedRowPolicy};
use crate::error::GradingError;
use crate::layout::GradingLayout;
use crate::output::SummaryFormatter;
use crate::parser::WorkbookParser;
use crate::regenerate::regenerate;
use crate::security::SecurityConfig;
use crate::workbook::AnswerWorkbook;

/// 採点結果シートのデフォルト名
pub const DEFAULT_RESULT_SHEET_NAME: &str = "grading result";

/// 採点結果シートの採点列のデフォルト幅
pub const DEFAULT_SCORE_COLUMN_WIDTH: f64 = 6.0;

/// Excelのシート名の最大文字数
pub(crate) const MAX_SHEET_NAME_LEN: usize = 31;

/// Excelの最大列幅
const MAX_COLUMN_WIDTH: f64 = 255.0;

/// 採点処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct GraderConfig {
    /// 答案シートの列配置
    pub layout: GradingLayout,

    /// 氏名が空の行の扱い
    pub unnamed_rows: UnnamedRowPolicy,

    /// 採点結果シートの名前（重複時は番号を付加）
    pub result_sheet_name: String,

    /// 集計列の見出し（客観式、主観式、総合計）
    pub summary_headers: [String; 3],

    /// 採点結果シートの採点列の幅
    pub score_column_width: f64,

    /// 入力ファイルのセキュリティ制限
    pub security: SecurityConfig,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            layout: GradingLayout::default(),
            unnamed_rows: UnnamedRowPolicy::Skip,
            result_sheet_name: DEFAULT_RESULT_SHEET_NAME.to_string(),
            summary_headers: [
                "Objective".to_string(),
                "Subjective".to_string(),
                "Total".to_string(),
            ],
            score_column_width: DEFAULT_SCORE_COLUMN_WIDTH,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Grader`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetgrader::{GraderBuilder, UnnamedRowPolicy};
///
/// # fn main() -> Result<(), sheetgrader::GradingError> {
/// let grader = GraderBuilder::new()
///     .with_unnamed_rows(UnnamedRowPolicy::Report)
///     .with_result_sheet_name("scores")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GraderBuilder {
    /// 内部設定（構築中）
    config: GraderConfig,
}

impl Default for GraderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraderBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 列配置: `GradingLayout::default()`（氏名C列、客観式E〜N、主観式P〜AD）
    /// - 無記名行: スキップ
    /// - 採点結果シート名: "grading result"
    /// - 集計列の見出し: "Objective", "Subjective", "Total"
    /// - 採点列の幅: 6
    pub fn new() -> Self {
        Self {
            config: GraderConfig::default(),
        }
    }

    /// 答案シートの列配置を指定する
    pub fn with_layout(mut self, layout: GradingLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// 氏名が空の行の扱いを指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use sheetgrader::{GraderBuilder, UnnamedRowPolicy};
    ///
    /// let builder = GraderBuilder::new()
    ///     .with_unnamed_rows(UnnamedRowPolicy::Report);
    /// ```
    pub fn with_unnamed_rows(mut self, policy: UnnamedRowPolicy) -> Self {
        self.config.unnamed_rows = policy;
        self
    }

    /// 採点結果シートの名前を指定する
    ///
    /// 既存のシートと重複する場合は、再生成時に`name(2)`のように番号が付きます。
    pub fn with_result_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.result_sheet_name = name.into();
        self
    }

    /// 集計列の見出しを指定する
    pub fn with_summary_headers(
        mut self,
        objective: impl Into<String>,
        subjective: impl Into<String>,
        total: impl Into<String>,
    ) -> Self {
        self.config.summary_headers = [objective.into(), subjective.into(), total.into()];
        self
    }

    /// 採点結果シートの採点列の幅を指定する
    pub fn with_score_column_width(mut self, width: f64) -> Self {
        self.config.score_column_width = width;
        self
    }

    /// 入力ファイルのセキュリティ制限を指定する
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// 設定を検証し、`Grader`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `GradingError::Config(String)`: 設定の検証に失敗した場合
    ///   * 列配置が不正（範囲の逆転、重なり、最大列超過）
    ///   * 採点結果シート名がExcelのシート名規則に違反
    ///   * 採点列の幅が範囲外
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use sheetgrader::GraderBuilder;
    ///
    /// # fn main() -> Result<(), sheetgrader::GradingError> {
    /// let grader = GraderBuilder::new().build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<Grader, GradingError> {
        // 1. 列配置の検証
        self.config.layout.validate()?;

        // 2. シート名の検証
        validate_sheet_name(&self.config.result_sheet_name)?;

        // 3. 列幅の検証
        let width = self.config.score_column_width;
        if !width.is_finite() || !(0.0..=MAX_COLUMN_WIDTH).contains(&width) {
            return Err(GradingError::Config(format!(
                "Score column width must be between 0 and {}: {}",
                MAX_COLUMN_WIDTH, width
            )));
        }

        Ok(Grader {
            config: self.config,
        })
    }
}

/// Excelのシート名規則を検証
fn validate_sheet_name(name: &str) -> Result<(), GradingError> {
    if name.is_empty() {
        return Err(GradingError::Config(
            "Result sheet name must not be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(GradingError::Config(format!(
            "Result sheet name exceeds {} characters: '{}'",
            MAX_SHEET_NAME_LEN, name
        )));
    }

    if let Some(c) = name.chars().find(|c| "[]:*?/\\".contains(*c)) {
        return Err(GradingError::Config(format!(
            "Result sheet name contains invalid character '{}': '{}'",
            c, name
        )));
    }

    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(GradingError::Config(format!(
            "Result sheet name must not start or end with an apostrophe: '{}'",
            name
        )));
    }

    if name.eq_ignore_ascii_case("history") {
        return Err(GradingError::Config(
            "'History' is a reserved sheet name".to_string(),
        ));
    }

    Ok(())
}

/// 採点済みワークブックのデフォルトのファイル名
///
/// ```rust
/// use chrono::NaiveDate;
/// use sheetgrader::graded_file_name;
///
/// let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
/// assert_eq!(graded_file_name(date), "PE-Training-Test-2024.05.03.xlsx");
/// ```
pub fn graded_file_name(date: NaiveDate) -> String {
    format!("PE-Training-Test-{}.xlsx", date.format("%Y.%m.%d"))
}

/// 採点結果と再生成したワークブック
#[derive(Debug)]
pub struct GradedWorkbook {
    /// 集計結果
    pub report: GradingReport,
    /// 採点済みワークブック（XLSX、位置は先頭）
    pub workbook: Cursor<Vec<u8>>,
}

/// 採点処理のファサード
///
/// 答案ワークブックの読み込み、採点、採点済みワークブックの再生成を行う
/// メインエントリーポイントです。各呼び出しは独立しており、状態を持ちません。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetgrader::GraderBuilder;
///
/// # fn main() -> Result<(), sheetgrader::GradingError> {
/// let grader = GraderBuilder::new().build()?;
/// let workbook = grader.load_path("answers.xlsx")?;
/// let report = grader.analyze(&workbook);
/// for student in &report {
///     println!("{}: {}", student.name, student.total);
/// }
/// let graded = grader.regenerate(&workbook, &report)?;
/// std::fs::write("graded.xlsx", graded.into_inner())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Grader {
    /// 採点設定
    config: GraderConfig,
}

impl Grader {
    /// 答案ワークブックを読み込む
    ///
    /// # 発生し得るエラー
    ///
    /// 入力がXLSXでない、破損している、セキュリティ制限を超える場合は
    /// `GradingError::is_load_failure()`が`true`となるエラーを返します。
    pub fn load<R: Read>(&self, reader: R) -> Result<AnswerWorkbook, GradingError> {
        let workbook =
            WorkbookParser::open(reader, &self.config.security)?.into_answer_workbook()?;

        info!(
            sheets = workbook.sheets.len(),
            rows = workbook.answer_row_count(),
            "loaded answer workbook"
        );

        Ok(workbook)
    }

    /// ファイルパスから答案ワークブックを読み込む
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<AnswerWorkbook, GradingError> {
        let file = File::open(path.as_ref())?;
        self.load(BufReader::new(file))
    }

    /// 答案シートを採点する
    ///
    /// シートがない場合は空の結果を返します。
    pub fn analyze(&self, workbook: &AnswerWorkbook) -> GradingReport {
        analyze_sheet(
            workbook.answer_sheet(),
            &self.config.layout,
            self.config.unnamed_rows,
        )
    }

    /// 採点済みワークブックを再生成する
    ///
    /// `workbook`は変更されないため、同じ入力で何度呼び出しても同じ内容になります。
    ///
    /// # 発生し得るエラー
    ///
    /// * `GradingError::NoAnswerSheet` - シートが1枚もない場合
    /// * `GradingError::Regenerate` - ワークブックの構築に失敗した場合
    pub fn regenerate(
        &self,
        workbook: &AnswerWorkbook,
        report: &GradingReport,
    ) -> Result<Cursor<Vec<u8>>, GradingError> {
        regenerate(workbook, report, &self.config)
    }

    /// 読み込み、採点、再生成をまとめて行う
    pub fn grade<R: Read>(&self, reader: R) -> Result<GradedWorkbook, GradingError> {
        let workbook = self.load(reader)?;
        let report = self.analyze(&workbook);
        let graded = self.regenerate(&workbook, &report)?;
        Ok(GradedWorkbook {
            report,
            workbook: graded,
        })
    }

    /// 集計表を指定された形式で出力する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use sheetgrader::{GraderBuilder, SummaryFormat};
    ///
    /// # fn main() -> Result<(), sheetgrader::GradingError> {
    /// let grader = GraderBuilder::new().build()?;
    /// let workbook = grader.load_path("answers.xlsx")?;
    /// let report = grader.analyze(&workbook);
    /// grader.render_summary(&report, SummaryFormat::Csv, std::io::stdout())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn render_summary<W: Write>(
        &self,
        report: &GradingReport,
        format: SummaryFormat,
        mut writer: W,
    ) -> Result<(), GradingError> {
        SummaryFormatter::from_format(format).render(report, &mut writer)
    }

    /// 集計表を文字列として出力する
    pub fn summary_to_string(
        &self,
        report: &GradingReport,
        format: SummaryFormat,
    ) -> Result<String, GradingError> {
        let mut buffer = Vec::new();
        self.render_summary(report, format, &mut buffer)?;

        let result = String::from_utf8(buffer).map_err(|e| {
            GradingError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        Ok(result)
    }

    /// 列配置
    pub fn layout(&self) -> &GradingLayout {
        &self.config.layout
    }

    /// 設定された採点結果シート名（重複解決前）
    pub fn result_sheet_name(&self) -> &str {
        &self.config.result_sheet_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ColumnSpan;

    #[test]
    fn test_grader_builder_new() {
        let builder = GraderBuilder::new();
        assert_eq!(builder.config.layout, GradingLayout::default());
        assert_eq!(builder.config.unnamed_rows, UnnamedRowPolicy::Skip);
        assert_eq!(builder.config.result_sheet_name, "grading result");
        assert_eq!(builder.config.summary_headers[2], "Total");
        assert_eq!(builder.config.score_column_width, 6.0);
    }

    #[test]
    fn test_builder_method_chaining() {
        let builder = GraderBuilder::new()
            .with_unnamed_rows(UnnamedRowPolicy::Report)
            .with_result_sheet_name("scores")
            .with_summary_headers("Obj", "Subj", "Sum")
            .with_score_column_width(8.5);

        assert_eq!(builder.config.unnamed_rows, UnnamedRowPolicy::Report);
        assert_eq!(builder.config.result_sheet_name, "scores");
        assert_eq!(builder.config.summary_headers[0], "Obj");
        assert_eq!(builder.config.score_column_width, 8.5);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_build_success() {
        let grader = GraderBuilder::new().build().unwrap();
        assert_eq!(grader.result_sheet_name(), "grading result");
        assert_eq!(grader.layout(), &GradingLayout::default());
    }

    #[test]
    fn test_build_with_invalid_layout() {
        let layout = GradingLayout {
            subjective: ColumnSpan::new(10, 20),
            ..GradingLayout::default()
        };
        let result = GraderBuilder::new().with_layout(layout).build();
        assert!(matches!(result, Err(GradingError::Config(_))));
    }

    #[test]
    fn test_build_with_invalid_sheet_names() {
        for name in ["", "bad:name", "a/b", "[x]", "'quoted", "trailing'", "History"] {
            let result = GraderBuilder::new().with_result_sheet_name(name).build();
            assert!(
                matches!(result, Err(GradingError::Config(_))),
                "expected '{}' to be rejected",
                name
            );
        }

        let long = "x".repeat(32);
        let result = GraderBuilder::new().with_result_sheet_name(long).build();
        match result {
            Err(GradingError::Config(msg)) => assert!(msg.contains("31")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_build_accepts_non_ascii_sheet_name() {
        let result = GraderBuilder::new().with_result_sheet_name("採点結果").build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_with_invalid_column_width() {
        for width in [-1.0, 256.0, f64::NAN] {
            let result = GraderBuilder::new().with_score_column_width(width).build();
            assert!(matches!(result, Err(GradingError::Config(_))));
        }
    }

    #[test]
    fn test_load_rejects_invalid_input() {
        let grader = GraderBuilder::new().build().unwrap();
        let result = grader.load(Cursor::new(Vec::<u8>::new()));
        match result {
            Err(e) => assert!(e.is_load_failure()),
            Ok(_) => panic!("Expected load failure"),
        }
    }

    #[test]
    fn test_load_path_missing_file() {
        let grader = GraderBuilder::new().build().unwrap();
        let result = grader.load_path("does/not/exist.xlsx");
        assert!(matches!(result, Err(GradingError::Io(_))));
    }

    #[test]
    fn test_analyze_empty_workbook() {
        let grader = GraderBuilder::new().build().unwrap();
        let report = grader.analyze(&AnswerWorkbook::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_graded_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 30).unwrap();
        assert_eq!(graded_file_name(date), "PE-Training-Test-2025.11.30.xlsx");
    }

    #[test]
    fn test_summary_to_string() {
        let grader = GraderBuilder::new().build().unwrap();
        let csv = grader
            .summary_to_string(&GradingReport::default(), SummaryFormat::Csv)
            .unwrap();
        assert_eq!(csv, "#,Name,Objective (25),Subjective (75),Total (100)\n");
    }
}
