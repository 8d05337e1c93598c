//! ファイルシステム上のモジュール読み込みの統合テスト

mod common;

use std::fs;

use common::messages;
use corvid_compiler::{analyze_file, CompilerOptions, ErrorKind};
use tempfile::TempDir;

fn write(dir: &TempDir, relative: &str, source: &str) {
    let path = dir.path().join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

#[test]
fn test_imports_across_files_and_folders() {
    let dir = TempDir::new().unwrap();
    write(&dir, "util.crv", "public fun twice(x: int): int {\n    return x * 2\n}\n");
    write(
        &dir,
        "geometry/shapes.crv",
        "public class Square {\n    public var side: int = 1\n}\n",
    );
    write(
        &dir,
        "main.crv",
        r#"
import util
import geometry.shapes

fun main() {
    var square = shapes.Square()
    print(util.twice(square.side))
}
"#,
    );

    let options = CompilerOptions::default().with_import_dir(dir.path());
    let program = analyze_file(&dir.path().join("main.crv"), options);
    assert!(program.errors.is_empty(), "{:?}", messages(&program.errors));
    assert!(program.warnings.is_empty(), "{:?}", messages(&program.warnings));
    assert!(program.lookup("util.twice").is_some());
    assert!(program.lookup("shapes.Square").is_some());
}

#[test]
fn test_relative_import_from_same_directory() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app/helpers.crv", "public fun greet(): string {\n    return \"hi\"\n}\n");
    write(&dir, "app/main.crv", "import .helpers\n\nfun main() {\n    print(helpers.greet())\n}\n");

    let program = analyze_file(&dir.path().join("app/main.crv"), CompilerOptions::default());
    assert!(program.errors.is_empty(), "{:?}", messages(&program.errors));
}

#[test]
fn test_each_file_is_loaded_once() {
    let dir = TempDir::new().unwrap();
    write(&dir, "shared.crv", "public var counter: int = 0\n");
    write(&dir, "left.crv", "import shared\n\npublic fun left(): int {\n    return shared.counter\n}\n");
    write(&dir, "right.crv", "import shared\n\npublic fun right(): int {\n    return shared.counter\n}\n");
    write(
        &dir,
        "main.crv",
        "import left\nimport right\n\nfun main() {\n    print(left.left() + right.right())\n}\n",
    );

    let options = CompilerOptions::default().with_import_dir(dir.path());
    let program = analyze_file(&dir.path().join("main.crv"), options);
    assert!(program.errors.is_empty(), "{:?}", messages(&program.errors));
    let shared = program
        .modules
        .iter()
        .filter(|&&m| program.tree.get(m).name == "shared")
        .count();
    assert_eq!(shared, 1);
}

#[test]
fn test_syntax_error_in_imported_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "broken.crv", "public fun oops( {\n");
    write(&dir, "main.crv", "import broken\n\nfun main() {\n    print(1)\n}\n");

    let options = CompilerOptions::default().with_import_dir(dir.path());
    let program = analyze_file(&dir.path().join("main.crv"), options);
    let errors = program.errors_of(ErrorKind::Syntax);
    assert!(!errors.is_empty(), "{:?}", messages(&program.errors));
    let broken = dir.path().join("broken.crv").canonicalize().unwrap();
    assert!(errors.iter().all(|e| e.file_path.as_deref() == Some(broken.as_path())));
}

#[test]
fn test_missing_entry_file() {
    let dir = TempDir::new().unwrap();
    let program = analyze_file(&dir.path().join("absent.crv"), CompilerOptions::default());
    assert!(program.has_errors());
    assert!(program.entry.is_none());
}
