//! 型検査・オーバーロード・継承・キャストの統合テスト

mod common;

use common::{analyze, assert_clean, messages};
use corvid_compiler::ErrorKind;

#[test]
fn test_well_typed_class_program() {
    let program = analyze(
        r#"
class Point {
    var x: int
    var y: int

    constructor(x: int, y: int) {
        this.x = x
        this.y = y
    }

    fun sum(): int {
        return x + y
    }
}

fun main() {
    var p = Point(1, 2)
    print(p.sum())
}
"#,
    );
    assert_clean(&program);
    assert!(program.warnings.is_empty(), "{:?}", messages(&program.warnings));
    assert!(!program.call_bindings.is_empty());
}

#[test]
fn test_assignment_type_mismatch() {
    let program = analyze(
        r#"
fun main() {
    var b: bool = 1
    var n: int = null
    var text: string = 2
    print(b)
    print(n)
    print(text)
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::TypeMismatch).len(),
        2,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_nullable_source_to_non_null_target() {
    let program = analyze(
        r#"
fun pick(value: string?): string {
    return value
}
"#,
    );
    let errors = program.errors_of(ErrorKind::TypeMismatch);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("null許容型"));
}

#[test]
fn test_subclass_is_assignable_to_superclass() {
    let program = analyze(
        r#"
class Animal {
}

class Dog : Animal {
}

fun main() {
    var a: Animal = Dog()
    var d: Dog = Animal()
    print(a)
    print(d)
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
fn test_default_tail_overload_is_ambiguous_declaration() {
    let program = analyze(
        r#"
class K {
    fun f(x: int) {
    }

    fun f(x: int, y: int = 0) {
    }
}
"#,
    );
    let errors = program.errors_of(ErrorKind::AmbiguousDeclaration);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
}

#[test]
fn test_zero_required_parameters_always_conflict() {
    let program = analyze(
        r#"
fun g() {
}

fun g(a: string = "") {
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::AmbiguousDeclaration).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_overload_conflicting_with_inherited_function() {
    let program = analyze(
        r#"
class Base {
    fun f(x: int) {
    }
}

class Derived : Base {
    fun f(x: int, y: int = 0) {
    }
}

class Other : Base {
    fun f(x: string) {
    }
}

fun main() {
    Derived().f(1)
    Other().f("a")
}
"#,
    );
    let errors = program.errors_of(ErrorKind::AmbiguousDeclaration);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("'f(int)'"));
    assert!(errors[0].message.contains("'f(int,int)'"));
    assert_eq!(errors[0].location.map(|l| l.line), Some(8));
    assert_eq!(errors[0].notes[0].location.map(|l| l.line), Some(3));
}

#[test]
fn test_ambiguous_call_between_equal_priorities() {
    let program = analyze(
        r#"
fun g(a: int, b: any) {
}

fun g(a: any, b: int) {
}

fun main() {
    g(1, 2)
}
"#,
    );
    assert!(program.errors_of(ErrorKind::AmbiguousDeclaration).is_empty());
    let errors = program.errors_of(ErrorKind::AmbiguousOverload);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(errors[0].notes.len(), 2);
}

#[test]
fn test_exact_match_beats_conversion() {
    let program = analyze(
        r#"
fun h(x: int): int {
    return x
}

fun h(x: float): string {
    return "float"
}

fun main() {
    var a: int = h(1)
    var b: string = h(1.5)
    print(a)
    print(b)
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_no_matching_overload_lists_candidates() {
    let program = analyze(
        r#"
class Tag {
}

fun k(x: Tag) {
}

fun k(x: bool) {
}

fun main() {
    k(1)
}
"#,
    );
    let errors = program.errors_of(ErrorKind::NoMatchingOverload);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(errors[0].notes.len(), 2);
}

#[test]
fn test_keyword_only_parameter() {
    let program = analyze(
        r#"
fun draw(size: int, *, filled: bool = false) {
    print(size)
    print(filled)
}

fun main() {
    draw(1, filled = true)
    draw(size = 2)
    draw(3, true)
}
"#,
    );
    let errors = program.errors_of(ErrorKind::NoMatchingOverload);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert_eq!(program.errors.len(), 1);
}

#[test]
fn test_positional_after_keyword_argument() {
    let program = analyze(
        r#"
fun pair(a: int, b: int) {
    print(a)
    print(b)
}

fun main() {
    pair(a = 1, 2)
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
fn test_variadic_parameter_absorbs_arguments() {
    let program = analyze(
        r#"
fun total(first: int, rest: int...): int {
    print(rest)
    return first
}

fun main() {
    print(total(1))
    print(total(1, 2, 3))
    print(total(1, "x"))
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::NoMatchingOverload).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_unused_variadic_keeps_exact_priority() {
    let program = analyze(
        r#"
fun f(x: float): string {
    return "float"
}

fun f(x: int, rest: int...): int {
    print(rest)
    return x
}

fun main() {
    var a: int = f(1)
    var b: int = f(1, 2)
    var c: string = f(1.5)
    print(a)
    print(b)
    print(c)
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_function_value_assignment() {
    let program = analyze(
        r#"
fun inc(x: int): int {
    return x + 1
}

fun main() {
    var f: fun(int): int = inc
    var g: fun(string): int = inc
    print(f(1))
    print(g)
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
fn test_lambda_has_function_type() {
    let program = analyze(
        r#"
fun main() {
    var double = fun (x: int): int { return x * 2 }
    print(double(4))
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_cyclic_inheritance() {
    let program = analyze(
        r#"
class A : B {
}

class B : A {
}
"#,
    );
    let errors = program.errors_of(ErrorKind::IncompatibleInheritance);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("循環"));
    assert!(errors[0].message.contains('A') && errors[0].message.contains('B'));
    assert!(errors[0].notes.len() >= 2);
}

#[test]
fn test_abstract_function_must_be_implemented() {
    let program = analyze(
        r#"
abstract class Shape {
    abstract fun area(): float
}

class Square : Shape {
}

class Circle : Shape {
    fun area(): float {
        return 3.14
    }
}
"#,
    );
    let errors = program.errors_of(ErrorKind::IncompatibleInheritance);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("Square"));
}

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    let program = analyze(
        r#"
abstract class Shape {
}

fun main() {
    print(Shape())
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
fn test_override_rules() {
    let program = analyze(
        r#"
class Base {
    fun greet(): string {
        return "hi"
    }
}

class Polite : Base {
    override fun greet(): string {
        return "good day"
    }
}

class Rude : Base {
    fun greet(): string {
        return "hey"
    }
}

class Confused : Base {
    override fun wave() {
    }
}
"#,
    );
    let errors = program.errors_of(ErrorKind::IncompatibleInheritance);
    assert_eq!(errors.len(), 2, "{:?}", messages(&program.errors));
    assert!(errors.iter().any(|e| e.message.contains("override")));
    assert!(errors.iter().any(|e| e.message.contains("wave")));
}

#[test]
fn test_final_class_cannot_be_extended() {
    let program = analyze(
        r#"
final class Leaf {
}

class Branch : Leaf {
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::IncompatibleInheritance).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
}

#[test]
fn test_inherited_members_are_visible() {
    let program = analyze(
        r#"
class Base {
    var id: int = 7

    fun describe(): string {
        return "base"
    }
}

class Derived : Base {
    fun show(): int {
        print(describe())
        return id
    }
}

fun main() {
    var d = Derived()
    print(d.show())
    print(d.id)
}
"#,
    );
    assert_clean(&program);
}

#[test]
fn test_structural_cast_between_unrelated_classes() {
    let program = analyze(
        r#"
class Point {
    var x: int = 0
    var y: int = 0
}

class Pair {
    var x: int = 0
    var y: int = 0
}

class Named {
    var x: float = 0.0
    var y: string = ""
}

fun main() {
    var p = Point()
    var q = p as Pair
    var r = p as Named
    print(q)
    print(r)
}
"#,
    );
    let errors = program.errors_of(ErrorKind::TypeMismatch);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("Named"));
    assert_eq!(errors[0].notes.len(), 2);
}

#[test]
fn test_safe_cast_of_incompatible_type_warns() {
    let program = analyze(
        r#"
class Point {
    var x: int = 0
}

class Label {
    var text: string = ""
}

fun main() {
    var p = Point()
    var l = p as? Label
    print(l)
}
"#,
    );
    assert_clean(&program);
    assert_eq!(program.warnings_of(ErrorKind::TypeMismatch).len(), 1);
}

#[test]
fn test_cast_from_any_always_fails() {
    let program = analyze(
        r#"
class Point {
}

fun main() {
    var a: any = Point()
    var p = a as Point
    var q = a as? Point
    print(p)
    print(q)
}
"#,
    );
    assert_eq!(
        program.errors_of(ErrorKind::TypeMismatch).len(),
        1,
        "{:?}",
        messages(&program.errors)
    );
    assert_eq!(program.warnings_of(ErrorKind::TypeMismatch).len(), 1);
}

#[test]
fn test_downcast_is_checked_structurally() {
    let program = analyze(
        r#"
class Animal {
    var name: string = ""
}

class Dog : Animal {
    var bark: int = 1
}

class Cat : Animal {
}

fun main() {
    var a: Animal = Dog()
    var d = a as Dog
    var c = a as Cat
    var up = Dog() as Animal
    print(d)
    print(c)
    print(up)
}
"#,
    );
    let errors = program.errors_of(ErrorKind::TypeMismatch);
    assert_eq!(errors.len(), 1, "{:?}", messages(&program.errors));
    assert!(errors[0].message.contains("'Dog'"));
    assert_eq!(errors[0].notes.len(), 1);
    assert!(errors[0].notes[0].message.contains("bark"));
}

#[test]
fn test_numeric_and_string_casts_are_allowed() {
    let program = analyze(
        r#"
fun main() {
    var f = 1 as float
    var s = 2.5 as string
    print(f)
    print(s)
}
"#,
    );
    assert_clean(&program);
}
