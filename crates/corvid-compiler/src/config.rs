//! コンパイラ設定モジュール
//!
//! 意味解析の動作を設定するオプションを提供します。
//! CLIは `corvid.toml` からこの構造体を読み込み、コマンドライン引数で上書きします。

use std::path::PathBuf;

use serde::Deserialize;

use crate::frontend::semantic::pairwise::MAX_FUN_CHECK_SEQ;

/// コンパイラオプション
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
    /// 基本モジュールのソースファイル（Noneなら組み込みのものを使用）
    pub basic_module: Option<PathBuf>,

    /// インポートの検索ディレクトリ（先頭から順に検索）
    pub import_dirs: Vec<PathBuf>,

    /// 警告をエラーとして扱うか
    pub warnings_as_errors: bool,

    /// これより大きい集合のペアワイズ検査を並列に実行する
    pub parallel_threshold: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            basic_module: None,
            import_dirs: Vec::new(),
            warnings_as_errors: false,
            parallel_threshold: MAX_FUN_CHECK_SEQ,
        }
    }
}

impl CompilerOptions {
    /// インポート検索ディレクトリを追加
    pub fn with_import_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.import_dirs.push(dir.into());
        self
    }

    /// 並列化の閾値を設定
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.parallel_threshold, 5);
        assert!(options.import_dirs.is_empty());
        assert!(!options.warnings_as_errors);
    }

    #[test]
    fn test_builder_methods() {
        let options = CompilerOptions::default()
            .with_import_dir("lib")
            .with_parallel_threshold(0);
        assert_eq!(options.import_dirs, vec![PathBuf::from("lib")]);
        assert_eq!(options.parallel_threshold, 0);
    }
}
