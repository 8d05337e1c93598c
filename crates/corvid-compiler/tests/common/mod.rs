//! 統合テスト共通のヘルパー
#![allow(dead_code)]

use std::path::Path;

use corvid_compiler::{Analyzer, CompilerError, CompilerOptions, MemoryLoader, Program};

pub const ENTRY: &str = "/src/main.crv";

/// `/src/main.crv` だけからなるプログラムを解析
pub fn analyze(source: &str) -> Program {
    analyze_files(&[(ENTRY, source)])
}

/// 複数のファイルをメモリ上に置き、先頭のファイルをエントリとして解析
pub fn analyze_files(files: &[(&str, &str)]) -> Program {
    analyze_with(files, CompilerOptions::default())
}

pub fn analyze_with(files: &[(&str, &str)], options: CompilerOptions) -> Program {
    let _ = env_logger::builder().is_test(true).try_init();
    let loader = files
        .iter()
        .fold(MemoryLoader::new(), |loader, (path, source)| loader.with_file(*path, *source));
    let entry = files.first().map(|(path, _)| *path).unwrap_or(ENTRY);
    Analyzer::new(&loader, options.with_import_dir("/src")).analyze_entry(Path::new(entry))
}

/// エラーメッセージの一覧（失敗時の表示用）
pub fn messages(errors: &[CompilerError]) -> Vec<String> {
    errors.iter().map(|e| format!("{}: {}", e.kind, e.message)).collect()
}

/// エラーがないことを確認
pub fn assert_clean(program: &Program) {
    assert!(
        program.errors.is_empty(),
        "エラーは期待していません: {:?}",
        messages(&program.errors)
    );
}
