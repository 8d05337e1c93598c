//! 診断の出力

use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;
use corvid_compiler::{CompilerError, Diagnostic, DiagnosticLevel, ErrorSeverity};
use serde::Serialize;

/// JSON出力の形
#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a Path,
    success: bool,
    errors: &'a [CompilerError],
    warnings: &'a [CompilerError],
}

/// テキスト形式で出力（エラー、警告、件数の順）
pub fn write_text(out: &mut impl Write, errors: &[CompilerError], warnings: &[CompilerError]) -> io::Result<()> {
    for record in errors.iter().chain(warnings) {
        write_record(out, record)?;
    }
    let summary = format!("エラー {}件, 警告 {}件", errors.len(), warnings.len());
    if errors.is_empty() {
        writeln!(out, "{}", summary.green())
    } else {
        writeln!(out, "{}", summary.red().bold())
    }
}

fn write_record(out: &mut impl Write, record: &CompilerError) -> io::Result<()> {
    let label = format!("{}[{}]", record.severity, record.kind);
    let label = match record.severity {
        ErrorSeverity::Error => label.red().bold(),
        ErrorSeverity::Warning => label.yellow().bold(),
    };
    writeln!(out, "{}: {}", label, record.message.bold())?;
    if let Some(position) = position(record.file_path.as_deref(), record.location.map(|l| l.to_string())) {
        writeln!(out, "  {} {}", "-->".blue(), position)?;
    }
    for note in &record.notes {
        write_note(out, note)?;
    }
    writeln!(out)
}

fn write_note(out: &mut impl Write, note: &Diagnostic) -> io::Result<()> {
    let label = match note.level {
        DiagnosticLevel::Note => note.level.to_string().cyan(),
        DiagnosticLevel::Help => note.level.to_string().green(),
    };
    write!(out, "  = {}: {}", label, note.message)?;
    if let Some(position) = position(note.file_path.as_deref(), note.location.map(|l| l.to_string())) {
        write!(out, " ({})", position)?;
    }
    writeln!(out)
}

fn position(file: Option<&Path>, location: Option<String>) -> Option<String> {
    match (file, location) {
        (Some(file), Some(location)) => Some(format!("{}:{}", file.display(), location)),
        (Some(file), None) => Some(file.display().to_string()),
        (None, Some(location)) => Some(location),
        (None, None) => None,
    }
}

/// JSON形式で出力
pub fn write_json(
    out: &mut impl Write,
    file: &Path,
    errors: &[CompilerError],
    warnings: &[CompilerError],
) -> io::Result<()> {
    let report = JsonReport {
        file,
        success: errors.is_empty(),
        errors,
        warnings,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_compiler::{ErrorKind, SourceLocation};

    fn sample() -> CompilerError {
        CompilerError::new(ErrorKind::TypeMismatch, "'int' を 'bool' に代入できません", Some(SourceLocation::new(3, 5, 20, 1)))
            .with_file_path("main.crv")
            .with_diagnostic(Diagnostic::help("型を確認してください"))
    }

    #[test]
    fn test_text_contains_position_and_notes() {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        write_text(&mut buffer, &[sample()], &[]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("エラー[型の不一致]: 'int' を 'bool' に代入できません"));
        assert!(text.contains("--> main.crv:3:5"));
        assert!(text.contains("= ヘルプ: 型を確認してください"));
        assert!(text.contains("エラー 1件, 警告 0件"));
    }

    #[test]
    fn test_json_is_parseable() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, Path::new("main.crv"), &[sample()], &[]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["errors"][0]["kind"], "TypeMismatch");
        assert_eq!(value["errors"][0]["location"]["line"], 3);
        assert_eq!(value["warnings"].as_array().map(Vec::len), Some(0));
    }
}
