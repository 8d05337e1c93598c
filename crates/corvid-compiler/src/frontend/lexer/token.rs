//! # トークン定義
//!
//! Corvid言語のレキサーが生成するトークンの定義を提供します。

use std::fmt;

use crate::frontend::error::SourceLocation;

/// トークンの種類
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // 識別子とリテラル
    /// 識別子
    Identifier(String),
    /// 整数リテラル
    IntLiteral(i64),
    /// 浮動小数点リテラル
    FloatLiteral(f64),
    /// 文字列リテラル
    StringLiteral(String),

    // キーワード
    Class,
    Interface,
    Enum,
    Annotation,
    Fun,
    Var,
    Const,
    Constructor,
    Import,
    As,
    Is,
    If,
    Else,
    While,
    Do,
    Break,
    Continue,
    Return,
    Throw,
    Yield,
    Try,
    Catch,
    Finally,
    True,
    False,
    Null,
    This,
    Super,
    Public,
    Private,
    Internal,
    Protected,
    Static,
    Final,
    Abstract,
    Override,
    Native,

    // 区切り記号
    /// (
    LeftParen,
    /// )
    RightParen,
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// ,
    Comma,
    /// .
    Dot,
    /// ...
    Ellipsis,
    /// ;
    Semicolon,
    /// :
    Colon,
    /// ?
    Question,
    /// ?.
    QuestionDot,
    /// ?:
    Elvis,
    /// ->
    Arrow,
    /// @
    At,

    // 演算子
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAnd,
    OrOr,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,

    /// ファイル終端
    EOF,
}

impl TokenKind {
    /// 識別子文字列からキーワードを判定
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "class" => TokenKind::Class,
            "interface" => TokenKind::Interface,
            "enum" => TokenKind::Enum,
            "annotation" => TokenKind::Annotation,
            "fun" => TokenKind::Fun,
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "constructor" => TokenKind::Constructor,
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "is" => TokenKind::Is,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "throw" => TokenKind::Throw,
            "yield" => TokenKind::Yield,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "this" => TokenKind::This,
            "super" => TokenKind::Super,
            "public" => TokenKind::Public,
            "private" => TokenKind::Private,
            "internal" => TokenKind::Internal,
            "protected" => TokenKind::Protected,
            "static" => TokenKind::Static,
            "final" => TokenKind::Final,
            "abstract" => TokenKind::Abstract,
            "override" => TokenKind::Override,
            "native" => TokenKind::Native,
            _ => return None,
        };
        Some(kind)
    }

    /// 修飾子キーワードかどうか
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Private
                | TokenKind::Internal
                | TokenKind::Protected
                | TokenKind::Static
                | TokenKind::Final
                | TokenKind::Abstract
                | TokenKind::Override
                | TokenKind::Native
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "識別子 '{}'", name),
            TokenKind::IntLiteral(value) => write!(f, "整数 {}", value),
            TokenKind::FloatLiteral(value) => write!(f, "浮動小数点数 {}", value),
            TokenKind::StringLiteral(value) => write!(f, "文字列 \"{}\"", value),
            TokenKind::EOF => write!(f, "ファイル終端"),
            other => write!(f, "'{}'", other.lexeme()),
        }
    }
}

impl TokenKind {
    /// 固定トークンの綴り
    pub fn lexeme(&self) -> &'static str {
        match self {
            TokenKind::Class => "class",
            TokenKind::Interface => "interface",
            TokenKind::Enum => "enum",
            TokenKind::Annotation => "annotation",
            TokenKind::Fun => "fun",
            TokenKind::Var => "var",
            TokenKind::Const => "const",
            TokenKind::Constructor => "constructor",
            TokenKind::Import => "import",
            TokenKind::As => "as",
            TokenKind::Is => "is",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Throw => "throw",
            TokenKind::Yield => "yield",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::This => "this",
            TokenKind::Super => "super",
            TokenKind::Public => "public",
            TokenKind::Private => "private",
            TokenKind::Internal => "internal",
            TokenKind::Protected => "protected",
            TokenKind::Static => "static",
            TokenKind::Final => "final",
            TokenKind::Abstract => "abstract",
            TokenKind::Override => "override",
            TokenKind::Native => "native",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Ellipsis => "...",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            TokenKind::QuestionDot => "?.",
            TokenKind::Elvis => "?:",
            TokenKind::Arrow => "->",
            TokenKind::At => "@",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::Identifier(_)
            | TokenKind::IntLiteral(_)
            | TokenKind::FloatLiteral(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::EOF => "",
        }
    }
}

/// トークン
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// トークンの種類
    pub kind: TokenKind,
    /// 位置情報
    pub location: SourceLocation,
}

impl Token {
    /// 新しいトークンを作成
    pub fn new(kind: TokenKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}
