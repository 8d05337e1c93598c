//! 使用状況の警告と解析オプションの統合テスト

mod common;

use common::{analyze, analyze_files, analyze_with, assert_clean, messages, ENTRY};
use corvid_compiler::{CompilerOptions, ErrorKind, ErrorSeverity};

fn unused_messages(source: &str) -> Vec<String> {
    let program = analyze(source);
    assert_clean(&program);
    program
        .warnings_of(ErrorKind::Unused)
        .into_iter()
        .map(|w| w.message.clone())
        .collect()
}

#[test]
fn test_unused_declarations_are_reported() {
    let warnings = unused_messages(
        r#"
class Helper {
}

fun helper(): int {
    return 1
}

fun main() {
    var idle = 1
}
"#,
    );
    assert_eq!(warnings.len(), 3, "{:?}", warnings);
    assert!(warnings.iter().any(|w| w.contains("Helper")));
    assert!(warnings.iter().any(|w| w.contains("helper")));
    assert!(warnings.iter().any(|w| w.contains("idle")));
}

#[test]
fn test_read_and_write_are_distinguished() {
    let warnings = unused_messages(
        r#"
fun main() {
    var written = 1
    written = 2
    var never: int
    print(never)
}
"#,
    );
    assert_eq!(warnings.len(), 2, "{:?}", warnings);
    assert!(warnings.iter().any(|w| w.contains("written") && w.contains("読まれていません")));
    assert!(warnings.iter().any(|w| w.contains("never") && w.contains("代入されていません")));
}

#[test]
fn test_unused_parameter() {
    let warnings = unused_messages(
        r#"
fun main() {
    print(scale(2, 3))
}

fun scale(value: int, factor: int): int {
    return value
}
"#,
    );
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("factor"));
}

#[test]
fn test_exemptions() {
    let warnings = unused_messages(
        r#"
public class Api {
    public fun call() {
    }
}

abstract class Shape {
    abstract fun area(): float
}

class Square : Shape {
    override fun area(): float {
        return 1.0
    }
}

fun main() {
    var _ignored = 1
    var s: Shape = Square()
    print(s.area())
}
"#,
    );
    assert!(warnings.is_empty(), "{:?}", warnings);
}

#[test]
fn test_unused_import_is_reported() {
    let program = analyze_files(&[
        (ENTRY, "import util\nimport other as _other\n\nfun main() {\n}\n"),
        ("/src/util.crv", "public fun twice(x: int): int { return x * 2 }\n"),
        ("/src/other.crv", "public fun noop() {\n}\n"),
    ]);
    assert_clean(&program);
    let warnings = program.warnings_of(ErrorKind::Unused);
    assert_eq!(warnings.len(), 1, "{:?}", messages(&program.warnings));
    assert!(warnings[0].message.contains("util"));
    assert_eq!(warnings[0].file_path.as_deref(), Some(std::path::Path::new(ENTRY)));
}

#[test]
fn test_open_import_counts_as_used() {
    let program = analyze_files(&[
        (ENTRY, "import util.*\n\nfun main() {\n    print(twice(2))\n}\n"),
        ("/src/util.crv", "public fun twice(x: int): int { return x * 2 }\n"),
    ]);
    assert_clean(&program);
    assert!(program.warnings.is_empty(), "{:?}", messages(&program.warnings));
}

#[test]
fn test_warnings_as_errors() {
    let options = CompilerOptions {
        warnings_as_errors: true,
        ..CompilerOptions::default()
    };
    let program = analyze_with(&[(ENTRY, "fun main() {\n    var idle = 1\n}\n")], options);
    assert!(program.warnings.is_empty());
    assert_eq!(program.errors.len(), 1);
    assert_eq!(program.errors[0].kind, ErrorKind::Unused);
    assert_eq!(program.errors[0].severity, ErrorSeverity::Error);
}

#[test]
fn test_parallel_pairwise_checks_agree_with_sequential() {
    let source = r#"
class Shapes {
    fun add(a: int) {
    }

    fun add(a: float) {
    }

    fun add(a: string) {
    }

    fun add(a: bool) {
    }

    fun add(a: int, b: int = 0) {
    }

    fun add(a: float, b: float) {
    }

    fun add() {
    }

    fun add(flag: bool = true) {
    }
}
"#;
    let sequential = analyze_with(&[(ENTRY, source)], CompilerOptions::default().with_parallel_threshold(100));
    let parallel = analyze_with(&[(ENTRY, source)], CompilerOptions::default().with_parallel_threshold(0));

    let mut expected = messages(&sequential.errors);
    let mut actual = messages(&parallel.errors);
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual);
    assert_eq!(sequential.errors_of(ErrorKind::AmbiguousDeclaration).len(), 2);
}
