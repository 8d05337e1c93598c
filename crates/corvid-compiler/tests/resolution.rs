//! 名前解決とアクセス制御の統合テスト

mod common;

use common::{analyze, analyze_files, assert_clean, messages};
use corvid_compiler::ErrorKind;

#[test]
fn test_undefined_name_suggests_similar_local() {
    let program = analyze(
        r#"
fun main() {
    var count = 1
    print(cout)
}
"#,
    );
    let errors = program.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    let helps: Vec<&str> = errors[0].notes.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(helps, vec!["もしかして: 'count'"]);
}

#[test]
fn test_local_shadows_field() {
    let program = analyze(
        r#"
class Counter {
    var value: int = 0

    fun read(): string {
        var value = "local"
        return value
    }
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_parameter_shadows_module_variable() {
    let program = analyze(
        r#"
var limit: string = "none"

fun check(limit: int): int {
    return limit + 1
}

fun main() {
    print(check(2))
    print(limit)
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_redeclared_local_in_same_block() {
    let program = analyze(
        r#"
fun main() {
    var a = 1
    var a = 2
    print(a)
}
"#,
    );
    let errors = program.errors_of(ErrorKind::Redeclaration);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
}

#[test]
fn test_nested_block_may_reuse_name() {
    let program = analyze(
        r#"
fun main() {
    var a = 1
    if (a > 0) {
        var a = "inner"
        print(a)
    }
    print(a)
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_private_member_is_inaccessible_outside_class() {
    let program = analyze(
        r#"
class Safe {
    private var secret: int = 1

    fun reveal(): int {
        return secret
    }
}

fun main() {
    var s = Safe()
    print(s.secret)
    print(s.reveal())
}
"#,
    );
    let errors = program.errors_of(ErrorKind::InaccessibleMember);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(program.errors.len(), 1);
}

/// 修飾子ごとに、同じクラス・同じモジュールの派生クラス・同じモジュール・
/// 他モジュールの派生クラス・他モジュールから参照する
#[test]
fn test_accessor_table_across_modules() {
    let program = analyze_files(&[
        (
            "/src/main.crv",
            r#"import util

class Remote : util.Base {
    fun read() {
        print(a)
        print(b)
        print(c)
        print(d)
        print(e)
    }
}

fun main() {
    var x = util.Base()
    print(x.a)
    print(x.b)
    print(x.c)
    print(x.d)
    print(x.e)
    Remote().read()
}
"#,
        ),
        (
            "/src/util.crv",
            r#"public class Base {
    private var a: int = 1
    internal var b: int = 2
    var c: int = 3
    protected var d: int = 4
    public var e: int = 5

    fun all() {
        print(a)
        print(b)
        print(c)
        print(d)
        print(e)
    }
}

class Local : Base {
    fun read() {
        print(a)
        print(b)
        print(c)
        print(d)
        print(e)
    }
}

fun same_module(x: Base) {
    print(x.a)
    print(x.b)
    print(x.c)
    print(x.d)
    print(x.e)
}
"#,
        ),
    ]);
    assert_eq!(
        program.errors.len(),
        program.errors_of(ErrorKind::InaccessibleMember).len(),
        "{:?}",
        messages(&program.errors)
    );
    let mut denied: Vec<(String, usize)> = program
        .errors
        .iter()
        .map(|e| {
            let file = e
                .file_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (file, e.location.map(|l| l.line).unwrap_or(0))
        })
        .collect();
    denied.sort();

    let expected: Vec<(String, usize)> = [
        ("main.crv", 5),
        ("main.crv", 6),
        ("main.crv", 7),
        ("main.crv", 15),
        ("main.crv", 16),
        ("main.crv", 17),
        ("main.crv", 18),
        ("util.crv", 19),
        ("util.crv", 28),
        ("util.crv", 29),
    ]
    .iter()
    .map(|&(f, l)| (f.to_string(), l))
    .collect();
    assert_eq!(denied, expected);
}

#[test]
fn test_instance_member_from_static_function() {
    let program = analyze(
        r#"
class Holder {
    var x: int = 0

    static fun read(): int {
        return x
    }
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::InaccessibleMember).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_this_in_top_level_function() {
    let program = analyze(
        r#"
fun main() {
    print(this)
}
"#,
    );
    assert_eq!(program.errors.len(), 1, "{:?}", messages(&program.errors));
}

#[test]
fn test_member_lookup_on_nullable_requires_safe_access() {
    let program = analyze(
        r#"
class Box {
    var size: int = 1
}

fun measure(box: Box?): int? {
    return box?.size
}

fun broken(box: Box?): int {
    return box.size
}

fun main() {
    print(measure(Box()))
    print(broken(null))
}
"#,
    );
    let errors = program.errors_of(ErrorKind::TypeMismatch);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("?."));
}

#[test]
fn test_module_member_via_qualified_import() {
    let program = analyze_files(&[
        (
            "/src/main.crv",
            r#"
import util

fun main() {
    print(util.twice(2))
}
"#,
        ),
        (
            "/src/util.crv",
            r#"
public fun twice(x: int): int {
    return x * 2
}
"#,
        ),
    ]);
    assert_clean(&program);
    assert!(program.warnings.is_empty(), "{:?}", messages(&program.warnings));
    assert!(program.lookup("util.twice").is_some());
}

#[test]
fn test_missing_module_member_is_reported() {
    let program = analyze_files(&[
        (
            "/src/main.crv",
            r#"
import util

fun main() {
    print(util.thrice(2))
}
"#,
        ),
        ("/src/util.crv", "public fun twice(x: int): int { return x * 2 }\n"),
    ]);
    let errors = program.errors_of(ErrorKind::UnresolvedReference);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
}

#[test]
fn test_unresolved_import() {
    let program = analyze(
        r#"
import nowhere

fun main() {
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::UnresolvedImport).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_lookup_finds_nested_declarations() {
    let program = analyze(
        r#"
public class Point {
    public var x: int = 0
}
"#,
    );
    assert_clean(&program);
    assert!(program.lookup("main.Point.x").is_some());
    assert!(program.lookup("main.Point.y").is_none());
    assert!(program.lookup("basic.int").is_some());
}
