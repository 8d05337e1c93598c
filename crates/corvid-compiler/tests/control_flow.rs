//! 制御フロー解析の統合テスト

mod common;

use common::{analyze, assert_clean, messages};
use corvid_compiler::ErrorKind;

#[test]
fn test_statement_after_return_is_unreachable() {
    let program = analyze("fun value(): int {\n    return 1\n    print(2)\n    print(3)\n}\n");
    let errors = program.errors_of(ErrorKind::UnreachableCode);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(errors[0].location.map(|l| l.line), Some(3));
    assert_eq!(program.errors.len(), 1);
}

#[test]
fn test_empty_block_after_return_is_unreachable() {
    let program = analyze("fun value(): int {\n    return 1\n    {\n    }\n}\n");
    let errors = program.errors_of(ErrorKind::UnreachableCode);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(errors[0].location.map(|l| l.line), Some(3));
    assert_eq!(program.errors.len(), 1);
}

#[test]
fn test_statement_after_throw_is_unreachable() {
    let program = analyze(
        r#"
fun fail() {
    throw Exception("boom")
    print("never")
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::UnreachableCode).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_if_else_both_returning_terminates() {
    let program = analyze(
        r#"
fun sign(n: int): int {
    if (n < 0) {
        return -1
    } else {
        return 1
    }
}

fun main() {
    print(sign(3))
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_missing_return_on_some_path() {
    let program = analyze(
        r#"
fun choose(flag: bool): int {
    if (flag) {
        return 1
    }
}
"#,
    );
    let errors = program.errors_of(ErrorKind::TypeMismatch);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("choose"));
}

#[test]
fn test_return_value_in_void_function() {
    let program = analyze(
        r#"
fun run() {
    return 1
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::TypeMismatch).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_loop_whose_body_never_returns_to_condition() {
    let program = analyze(
        r#"
fun main() {
    var i = 0
    while (i < 10) {
        break
    }
    while (i < 10) {
        i += 1
    }
}
"#,
    );
    let errors = program.errors_of(ErrorKind::RedundantLoop);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(errors[0].location.map(|l| l.line), Some(4));
}

#[test]
fn test_continue_keeps_loop_alive() {
    let program = analyze(
        r#"
fun main() {
    var i = 0
    while (i < 10) {
        i += 1
        continue
    }
    do {
        i -= 1
    } while (i > 0)
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_infinite_loop_without_break_makes_rest_unreachable() {
    let program = analyze(
        r#"
fun spin(): int {
    while (true) {
        print(1)
    }
}

fun halt(): int {
    while (true) {
        print(1)
    }
    return 0
}
"#,
    );
    assert!(
        program.errors_of(ErrorKind::TypeMismatch).is_empty(),
        "{:?}",
        messages(&program.errors)
    );
    assert_eq!(program.errors_of(ErrorKind::UnreachableCode).len(), 1);
}

#[test]
fn test_break_outside_loop() {
    let program = analyze(
        r#"
fun main() {
    break
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::Syntax).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_condition_must_be_bool() {
    let program = analyze(
        r#"
fun main() {
    var n = 1
    if (n) {
        print(n)
    }
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::TypeMismatch).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_throw_requires_throwable() {
    let program = analyze(
        r#"
fun fail() {
    throw 1
}
"#,
    );
    let errors = program.errors_of(ErrorKind::TypeMismatch);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("Throwable"));
}

#[test]
fn test_try_catch_paths() {
    let program = analyze(
        r#"
fun risky(): int {
    try {
        return 1
    } catch (e: Exception) {
        print(e.message)
        return 2
    }
}

fun cleanup(): int {
    try {
        print("work")
    } catch (e: Exception) {
        print(e)
    } finally {
        print("done")
    }
    return 0
}

fun main() {
    print(risky())
    print(cleanup())
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_catch_type_must_be_throwable() {
    let program = analyze(
        r#"
fun main() {
    try {
        print(1)
    } catch (e: int) {
        print(e)
    }
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::TypeMismatch).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_discarded_value_warns() {
    let program = analyze(
        r#"
fun main() {
    var n = 1
    n + 2
    print(n)
}
"#,
    );
    assert_clean(&program);
    assert_eq!(program.warnings_of(ErrorKind::Unused).len(), 1);
}

#[test]
fn test_function_body_gets_control_flow_graph() {
    let program = analyze(
        r#"
public fun loop(n: int): int {
    var i = 0
    while (i < n) {
        i += 1
    }
    return i
}
"#,
    );
    assert_clean(&program);
    let set = program.lookup("main.loop").expect("loop が見つかりません");
    let function = program
        .tree
        .get(set)
        .as_function_set()
        .map(|data| data.functions[0].1)
        .expect("関数集合ではありません");
    let data = program.tree.get(function).as_function().expect("関数ではありません");
    let cfg = data.cfg.as_ref().expect("CFGがありません");
    assert!(cfg.len() >= 4);
}

#[test]
fn test_errors_in_one_statement_do_not_stop_the_block() {
    let program = analyze(
        r#"
fun main() {
    print(missing)
    var b: bool = 3
    print(b)
}
"#,
    );
    assert_eq!(program.errors_of(ErrorKind::UnresolvedReference).len(), 1);
    assert_eq!(program.errors_of(ErrorKind::TypeMismatch).len(), 1);
}
