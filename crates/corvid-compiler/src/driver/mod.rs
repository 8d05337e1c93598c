//! # Corvid コンパイラドライバー
//!
//! ソースの読み込みとモジュールの解決を管理し、意味解析を起動します。

pub mod loader;
pub mod modules;

// 再エクスポート
pub use self::loader::{FsLoader, LoadError, MemoryLoader, SourceLoader};
pub use self::modules::ModuleSet;

use std::path::Path;

use crate::config::CompilerOptions;
use crate::frontend::semantic::{analyze_path, Program};

/// ファイルシステム上のエントリファイル（またはディレクトリ）を解析する
pub fn analyze_file(entry: &Path, options: CompilerOptions) -> Program {
    analyze_path(&FsLoader, options, entry)
}
