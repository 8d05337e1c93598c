//! # 意味解析モジュール
//!
//! 構文解析で生成された構文木からスコープツリーを構築し、
//! 名前解決、アクセス制御、型検査、オーバーロード解決、
//! 制御フロー検査、使用状況の検査を行います。

pub mod analyzer;
pub mod builder;
pub mod cfg;
pub mod pairwise;
pub mod scope;
pub mod suggest;
pub mod symbol_path;
pub mod symbol_table;
pub mod types;
pub mod usage;

// 再エクスポート
pub use self::analyzer::{analyze_path, Analyzer, Builtins, Program};
pub use self::scope::{Scope, ScopeData, ScopeId, ScopeKind};
pub use self::symbol_table::ScopeTree;
pub use self::types::{ExprInfo, FunctionType, TypeInfo};
