//! # Corvid コンパイラフロントエンド
//!
//! ソースコードの字句解析から意味解析までを担当します。
//!
//! ## コンパイルフェーズ
//! 1. 字句解析（[`lexer`]）
//! 2. 構文解析（[`parser`]）
//! 3. 意味解析（[`semantic`]）

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
