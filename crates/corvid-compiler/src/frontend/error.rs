//! # エラー処理モジュール
//!
//! Corvidコンパイラのエラー処理を担当するモジュールです。
//! 意味解析で発生するエラーと警告を、重大度・メッセージ・位置情報と
//! 「なぜそうなったか」を説明する注釈（note/help）の列として表現します。
//!
//! 一度で結果が確定する検査（修飾子の不正、再宣言など）は単一のエラーを
//! 即座に返し、まとめて報告した方が有用な検査（オーバーロードの候補、
//! 構造的キャストの不一致、継承メンバーの衝突など）は [`ErrorGroup`] に
//! 蓄積してから一度に返します。

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// エラーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 字句解析・構文解析エラー
    Syntax,
    /// 未定義の参照
    UnresolvedReference,
    /// アクセスできないメンバー
    InaccessibleMember,
    /// 型の不一致
    TypeMismatch,
    /// 呼び出しが曖昧
    AmbiguousOverload,
    /// 一致するオーバーロードがない
    NoMatchingOverload,
    /// 宣言が曖昧
    AmbiguousDeclaration,
    /// 継承の非互換
    IncompatibleInheritance,
    /// 不正な宣言
    MalformedDeclaration,
    /// 再宣言
    Redeclaration,
    /// 到達不能コード
    UnreachableCode,
    /// 冗長なループ
    RedundantLoop,
    /// インポートを解決できない
    UnresolvedImport,
    /// 未使用のシンボル（警告）
    Unused,
    /// 型推論（警告）
    TypeInference,
    /// 内部エラー
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorKind::Syntax => "構文エラー",
            ErrorKind::UnresolvedReference => "未定義の参照",
            ErrorKind::InaccessibleMember => "アクセス不可",
            ErrorKind::TypeMismatch => "型の不一致",
            ErrorKind::AmbiguousOverload => "曖昧な呼び出し",
            ErrorKind::NoMatchingOverload => "一致するオーバーロードなし",
            ErrorKind::AmbiguousDeclaration => "曖昧な宣言",
            ErrorKind::IncompatibleInheritance => "継承エラー",
            ErrorKind::MalformedDeclaration => "不正な宣言",
            ErrorKind::Redeclaration => "再宣言",
            ErrorKind::UnreachableCode => "到達不能コード",
            ErrorKind::RedundantLoop => "冗長なループ",
            ErrorKind::UnresolvedImport => "インポートエラー",
            ErrorKind::Unused => "未使用",
            ErrorKind::TypeInference => "型推論",
            ErrorKind::Internal => "内部エラー",
        };
        write!(f, "{}", message)
    }
}

/// ソースコード内の位置情報
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    /// 行番号（1から始まる）
    pub line: usize,
    /// 列番号（1から始まる）
    pub column: usize,
    /// 位置のバイトオフセット
    pub offset: usize,
    /// 範囲の長さ（バイト単位）
    pub length: usize,
    /// 終了行
    pub end_line: Option<usize>,
    /// 終了列
    pub end_column: Option<usize>,
}

impl SourceLocation {
    /// 新しい位置情報を作成
    pub fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
            end_line: None,
            end_column: None,
        }
    }

    /// 別の位置情報と結合して範囲を作成
    pub fn merge_with(&self, other: &SourceLocation) -> Self {
        let (start, end) = if self.offset <= other.offset {
            (self, other)
        } else {
            (other, self)
        };

        let end_offset = (end.offset + end.length).max(start.offset + start.length);

        Self {
            line: start.line,
            column: start.column,
            offset: start.offset,
            length: end_offset - start.offset,
            end_line: Some(end.end_line.unwrap_or(end.line)),
            end_column: Some(end.end_column.unwrap_or(end.column + end.length)),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.end_line, self.end_column) {
            (Some(end_line), Some(end_column)) if end_line == self.line => {
                write!(f, "{}:{}-{}", self.line, self.column, end_column)
            }
            (Some(end_line), Some(end_column)) => {
                write!(f, "{}:{}-{}:{}", self.line, self.column, end_line, end_column)
            }
            _ => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// エラーの重大度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ErrorSeverity {
    /// エラー（現在の宣言の解析を中断する）
    Error,
    /// 警告（解析は続行する）
    Warning,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Error => write!(f, "エラー"),
            ErrorSeverity::Warning => write!(f, "警告"),
        }
    }
}

/// 注釈のレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticLevel {
    /// 補足説明（「ここで宣言されています」など）
    Note,
    /// 修正のヒント（「もしかして: ...」など）
    Help,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Note => write!(f, "注"),
            DiagnosticLevel::Help => write!(f, "ヘルプ"),
        }
    }
}

/// エラーに付随する注釈
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// レベル
    pub level: DiagnosticLevel,
    /// メッセージ
    pub message: String,
    /// 位置情報
    pub location: Option<SourceLocation>,
    /// 位置情報が属するファイル
    pub file_path: Option<PathBuf>,
}

impl Diagnostic {
    /// 補足説明を作成
    pub fn note(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            level: DiagnosticLevel::Note,
            message: message.into(),
            location,
            file_path: None,
        }
    }

    /// 修正のヒントを作成
    pub fn help(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Help,
            message: message.into(),
            location: None,
            file_path: None,
        }
    }

    /// ファイルパスを設定
    pub fn with_file_path(mut self, path: Option<&Path>) -> Self {
        self.file_path = path.map(Path::to_path_buf);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)?;
        match (&self.file_path, &self.location) {
            (Some(path), Some(loc)) => write!(f, " ({}:{})", path.display(), loc),
            (None, Some(loc)) => write!(f, " ({})", loc),
            _ => Ok(()),
        }
    }
}

/// コンパイラエラー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilerError {
    /// エラーの種類
    pub kind: ErrorKind,
    /// エラーの重大度
    pub severity: ErrorSeverity,
    /// エラーメッセージ
    pub message: String,
    /// エラーの位置
    pub location: Option<SourceLocation>,
    /// ソースファイルのパス
    pub file_path: Option<PathBuf>,
    /// 追加の注釈
    pub notes: Vec<Diagnostic>,
}

impl CompilerError {
    /// 新しいエラーを作成
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            kind,
            severity: ErrorSeverity::Error,
            message: message.into(),
            location,
            file_path: None,
            notes: Vec::new(),
        }
    }

    /// 新しい警告を作成
    pub fn warning(kind: ErrorKind, message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::new(kind, message, location).with_severity(ErrorSeverity::Warning)
    }

    /// 構文エラーを作成
    pub fn syntax_error(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::new(ErrorKind::Syntax, message, location)
    }

    /// 内部エラーを作成
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message, None)
    }

    /// ファイルパスを設定（未設定の場合のみ）
    pub fn with_file_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        if self.file_path.is_none() {
            self.file_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// 重大度を設定
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 注釈を追加
    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.notes.push(diagnostic);
        self
    }

    /// 注釈を追加
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) -> &mut Self {
        self.notes.push(diagnostic);
        self
    }

    /// 警告かどうか
    pub fn is_warning(&self) -> bool {
        self.severity == ErrorSeverity::Warning
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file_path, &self.location) {
            (Some(path), Some(loc)) => write!(f, "{}:{}: ", path.display(), loc)?,
            (Some(path), None) => write!(f, "{}: ", path.display())?,
            (None, Some(loc)) => write!(f, "{}: ", loc)?,
            (None, None) => {}
        }
        write!(f, "{}[{}]: {}", self.severity, self.kind, self.message)?;
        for note in &self.notes {
            write!(f, "\n  {}", note)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompilerError {}

/// エラーグループ
///
/// 空でないエラーの列です。バッチ処理の検査はここにすべての失敗を
/// 蓄積し、最後に一度だけ返します。
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}件のエラーが発生しました", .errors.len())]
pub struct ErrorGroup {
    errors: Vec<CompilerError>,
}

impl ErrorGroup {
    /// エラー列からグループを作成（空の場合はNone）
    pub fn from_errors(errors: Vec<CompilerError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// エラーを取得
    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    /// エラー列に変換
    pub fn into_errors(self) -> Vec<CompilerError> {
        self.errors
    }

    /// 最初のエラー
    pub fn first(&self) -> &CompilerError {
        &self.errors[0]
    }

    /// エラーの数
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// 常にfalse（グループは空にならない）
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// 指定した種類のエラーを含むかどうか
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// すべてのエラーに注釈を追加
    pub fn with_note(mut self, diagnostic: Diagnostic) -> Self {
        for error in &mut self.errors {
            error.notes.push(diagnostic.clone());
        }
        self
    }

    /// ファイルパスが未設定のエラーに設定
    pub fn with_file_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        for error in &mut self.errors {
            if error.file_path.is_none() {
                error.file_path = Some(path.as_ref().to_path_buf());
            }
        }
        self
    }
}

impl From<CompilerError> for ErrorGroup {
    fn from(error: CompilerError) -> Self {
        Self { errors: vec![error] }
    }
}

impl IntoIterator for ErrorGroup {
    type Item = CompilerError;
    type IntoIter = std::vec::IntoIter<CompilerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Result型のエイリアス
pub type Result<T> = std::result::Result<T, ErrorGroup>;

/// エラーを蓄積して最後に一度だけ返すためのコレクタ
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<CompilerError>,
}

impl ErrorCollector {
    /// 新しいコレクタを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// エラーを追加
    pub fn push(&mut self, error: CompilerError) {
        self.errors.push(error);
    }

    /// グループ内のエラーをすべて追加
    pub fn extend(&mut self, group: ErrorGroup) {
        self.errors.extend(group.errors);
    }

    /// 結果を取り込み、成功値があれば返す
    pub fn absorb<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(group) => {
                self.extend(group);
                None
            }
        }
    }

    /// エラーがあるかどうか
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 蓄積したエラーを返す（空ならOk）
    pub fn finish(self) -> Result<()> {
        match ErrorGroup::from_errors(self.errors) {
            Some(group) => Err(group),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_notes() {
        let error = CompilerError::new(
            ErrorKind::Redeclaration,
            "'x' は既に宣言されています",
            Some(SourceLocation::new(3, 5, 20, 1)),
        )
        .with_file_path("main.crv")
        .with_diagnostic(Diagnostic::note("以前の宣言はここです", Some(SourceLocation::new(1, 5, 4, 1))));

        let text = error.to_string();
        assert!(text.starts_with("main.crv:3:5: エラー[再宣言]"));
        assert!(text.contains("注: 以前の宣言はここです (1:5)"));
    }

    #[test]
    fn test_collector_finish() {
        let mut collector = ErrorCollector::new();
        assert!(collector.absorb::<i32>(Ok(1)).is_some());
        collector.finish().unwrap();

        let mut collector = ErrorCollector::new();
        let failed: Result<()> = Err(CompilerError::internal("a").into());
        assert!(collector.absorb(failed).is_none());
        collector.push(CompilerError::internal("b"));
        let group = collector.finish().unwrap_err();
        assert_eq!(group.len(), 2);
        assert!(group.contains(ErrorKind::Internal));
    }

    #[test]
    fn test_group_with_note() {
        let group = ErrorGroup::from(CompilerError::internal("x"))
            .with_note(Diagnostic::note("ここで宣言されています", None));
        assert_eq!(group.first().notes.len(), 1);
    }

    #[test]
    fn test_merge_locations() {
        let a = SourceLocation::new(1, 1, 0, 3);
        let b = SourceLocation::new(1, 10, 9, 2);
        let merged = a.merge_with(&b);
        assert_eq!(merged.offset, 0);
        assert_eq!(merged.length, 11);
        assert_eq!(merged.to_string(), "1:1-12");
    }
}
