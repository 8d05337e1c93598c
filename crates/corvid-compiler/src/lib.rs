// Corvid Compiler Library
// 意味解析フロントエンド

//! # Corvid Compiler
//!
//! Corvid言語のソースコードを解析し、注釈付きのスコープツリーを生成する
//! ライブラリです。
//!
//! 解析結果の [`Program`] には、すべての宣言の解決済みの型、関数ごとの
//! 制御フローグラフ、呼び出し式と選択された関数の対応、エラーと警告が
//! 含まれます。

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod frontend;

// 再エクスポート
pub use self::config::CompilerOptions;
pub use self::diagnostics::DiagnosticEmitter;
pub use self::driver::{analyze_file, FsLoader, MemoryLoader, SourceLoader};
pub use self::frontend::ast;
pub use self::frontend::error::{CompilerError, Diagnostic, DiagnosticLevel, ErrorGroup, ErrorKind, ErrorSeverity, Result, SourceLocation};
pub use self::frontend::semantic::{Analyzer, Program};

/// コンパイラのバージョン
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
