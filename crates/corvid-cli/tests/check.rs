//! `corvid check` の統合テスト

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn corvid() -> Command {
    let mut cmd = Command::cargo_bin("corvid").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).unwrap();
}

#[test]
fn test_clean_program_exits_zero() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.crv", "fun main() {\n    print(1 + 2)\n}\n");

    corvid()
        .arg("check")
        .arg(dir.path().join("main.crv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("エラー 0件, 警告 0件"));
}

#[test]
fn test_errors_exit_one() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.crv", "fun main() {\n    print(cout)\n}\n");

    corvid()
        .arg("check")
        .arg(dir.path().join("main.crv"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("未定義の参照"))
        .stdout(predicate::str::contains("main.crv:2:"));
}

#[test]
fn test_warnings_as_errors_flag() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.crv", "fun main() {\n    var idle = 1\n}\n");
    let entry = dir.path().join("main.crv");

    corvid().arg("check").arg(&entry).assert().success();
    corvid()
        .arg("check")
        .arg(&entry)
        .arg("--warnings-as-errors")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("idle"));
}

#[test]
fn test_json_output() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.crv", "fun main() {\n    var b: bool = 1\n    print(b)\n}\n");

    let output = corvid()
        .arg("check")
        .arg(dir.path().join("main.crv"))
        .args(["--error-format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["errors"][0]["kind"], "TypeMismatch");
}

#[test]
fn test_entry_directory_is_default_import_dir() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "util.crv", "public fun twice(x: int): int {\n    return x * 2\n}\n");
    write(dir.path(), "main.crv", "import util\n\nfun main() {\n    print(util.twice(2))\n}\n");

    corvid().arg("check").arg(dir.path().join("main.crv")).assert().success();
}

#[test]
fn test_import_dir_flag() {
    let dir = TempDir::new().unwrap();
    let lib = dir.path().join("lib");
    let app = dir.path().join("app");
    fs::create_dir_all(&lib).unwrap();
    fs::create_dir_all(&app).unwrap();
    write(&lib, "util.crv", "public fun twice(x: int): int {\n    return x * 2\n}\n");
    write(&app, "main.crv", "import util\n\nfun main() {\n    print(util.twice(2))\n}\n");

    corvid().arg("check").arg(app.join("main.crv")).assert().code(1);
    corvid().arg("check").arg(app.join("main.crv")).arg("-I").arg(&lib).assert().success();
}

#[test]
fn test_config_file_next_to_entry() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "corvid.toml", "warnings_as_errors = true\n");
    write(dir.path(), "main.crv", "fun main() {\n    var idle = 1\n}\n");

    corvid().arg("check").arg(dir.path().join("main.crv")).assert().code(1);
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.toml", "warnings_as_errors = \"yes\"\n");
    write(dir.path(), "main.crv", "fun main() {\n}\n");

    corvid()
        .arg("check")
        .arg(dir.path().join("main.crv"))
        .arg("--config")
        .arg(dir.path().join("broken.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("broken.toml"));
}

#[test]
fn test_custom_basic_module() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tiny.crv",
        "public class any {\n}\npublic class void {\n}\npublic class bool {\n}\npublic class int {\n}\npublic class float {\n}\npublic class string {\n}\npublic class Throwable {\n}\n",
    );
    write(dir.path(), "main.crv", "fun main() {\n    print(1)\n}\n");

    corvid()
        .arg("check")
        .arg(dir.path().join("main.crv"))
        .arg("--basic")
        .arg(dir.path().join("tiny.crv"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("print"));
}
