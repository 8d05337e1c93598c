//! # レキサー（字句解析器）
//!
//! Corvid言語のソースコードを字句解析し、トークン列に変換するモジュールです。

use std::iter::Peekable;
use std::str::CharIndices;

use crate::frontend::error::{CompilerError, Result, SourceLocation};

pub mod token;

pub use token::{Token, TokenKind};

/// レキサー
pub struct Lexer<'a> {
    /// ソースコード
    source: &'a str,
    /// 文字イテレータ
    chars: Peekable<CharIndices<'a>>,
    /// 現在のバイト位置
    position: usize,
    /// 現在の行番号（1から始まる）
    line: usize,
    /// 現在の列番号（1から始まる）
    column: usize,
    /// 現在のトークンの開始位置
    start_position: usize,
    /// 現在のトークンの開始行
    start_line: usize,
    /// 現在のトークンの開始列
    start_column: usize,
}

impl<'a> Lexer<'a> {
    /// 新しいレキサーを作成
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            position: 0,
            line: 1,
            column: 1,
            start_position: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// ソース全体をトークン列に変換
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::EOF;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// 次のトークンを取得
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;

        self.start_position = self.position;
        self.start_line = self.line;
        self.start_column = self.column;

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(self.make_token(TokenKind::EOF)),
        };

        if c.is_alphabetic() || c == '_' {
            return Ok(self.identifier());
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '@' => TokenKind::At,
            '%' => TokenKind::Percent,
            '"' => return self.string(),
            '.' => {
                if self.peek() == Some('.') && self.peek_second() == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '?' => {
                if self.match_char('.') {
                    TokenKind::QuestionDot
                } else if self.match_char(':') {
                    TokenKind::Elvis
                } else {
                    TokenKind::Question
                }
            }
            '+' => self.either('=', TokenKind::PlusEqual, TokenKind::Plus),
            '*' => self.either('=', TokenKind::StarEqual, TokenKind::Star),
            '/' => self.either('=', TokenKind::SlashEqual, TokenKind::Slash),
            '!' => self.either('=', TokenKind::BangEqual, TokenKind::Bang),
            '=' => self.either('=', TokenKind::EqualEqual, TokenKind::Equal),
            '<' => self.either('=', TokenKind::LessEqual, TokenKind::Less),
            '>' => self.either('=', TokenKind::GreaterEqual, TokenKind::Greater),
            '-' => {
                if self.match_char('>') {
                    TokenKind::Arrow
                } else {
                    self.either('=', TokenKind::MinusEqual, TokenKind::Minus)
                }
            }
            '&' if self.match_char('&') => TokenKind::AndAnd,
            '|' if self.match_char('|') => TokenKind::OrOr,
            other => {
                return Err(CompilerError::syntax_error(
                    format!("予期しない文字 '{}'", other),
                    Some(self.current_location()),
                )
                .into())
            }
        };
        Ok(self.make_token(kind))
    }

    /// 空白とコメントをスキップ
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = SourceLocation::new(self.line, self.column, self.position, 2);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek() == Some('/') {
                            self.advance();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(CompilerError::syntax_error("閉じられていないブロックコメント", Some(start)).into());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// 識別子またはキーワード
    fn identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[self.start_position..self.position];
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.make_token(kind)
    }

    /// 数値リテラル
    fn number(&mut self) -> Result<Token> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
                self.advance();
            }
        }

        let text: String = self.source[self.start_position..self.position]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let location = self.current_location();
        let kind = if is_float {
            text.parse::<f64>()
                .map(TokenKind::FloatLiteral)
                .map_err(|_| CompilerError::syntax_error(format!("不正な浮動小数点数 '{}'", text), Some(location)))?
        } else {
            text.parse::<i64>()
                .map(TokenKind::IntLiteral)
                .map_err(|_| CompilerError::syntax_error(format!("整数リテラル '{}' が範囲外です", text), Some(location)))?
        };
        Ok(self.make_token(kind))
    }

    /// 文字列リテラル
    fn string(&mut self) -> Result<Token> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(CompilerError::syntax_error(
                        "閉じられていない文字列リテラル",
                        Some(self.current_location()),
                    )
                    .into())
                }
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        other => {
                            return Err(CompilerError::syntax_error(
                                format!("不正なエスケープシーケンス '\\{}'", other.unwrap_or(' ')),
                                Some(self.current_location()),
                            )
                            .into())
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
        Ok(self.make_token(TokenKind::StringLiteral(value)))
    }

    fn either(&mut self, expected: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.match_char(expected) {
            matched
        } else {
            otherwise
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut iter = self.source[self.position..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let (index, c) = self.chars.next()?;
        self.position = index + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn current_location(&self) -> SourceLocation {
        let mut location = SourceLocation::new(
            self.start_line,
            self.start_column,
            self.start_position,
            self.position - self.start_position,
        );
        location.end_line = Some(self.line);
        location.end_column = Some(self.column);
        location
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("public class Point : Base"),
            vec![
                TokenKind::Public,
                TokenKind::Class,
                TokenKind::Identifier("Point".to_string()),
                TokenKind::Colon,
                TokenKind::Identifier("Base".to_string()),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_nullable_operators() {
        assert_eq!(
            kinds("a?.b ?: c as? T"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::QuestionDot,
                TokenKind::Identifier("b".to_string()),
                TokenKind::Elvis,
                TokenKind::Identifier("c".to_string()),
                TokenKind::As,
                TokenKind::Question,
                TokenKind::Identifier("T".to_string()),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_numbers_and_variadic() {
        assert_eq!(
            kinds("1_000 2.5 xs: int..."),
            vec![
                TokenKind::IntLiteral(1000),
                TokenKind::FloatLiteral(2.5),
                TokenKind::Identifier("xs".to_string()),
                TokenKind::Colon,
                TokenKind::Identifier("int".to_string()),
                TokenKind::Ellipsis,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_comments_and_locations() {
        let tokens = Lexer::new("// comment\n/* block */ x").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x".to_string()));
        assert_eq!(tokens[0].location.line, 2);
        assert_eq!(tokens[0].location.column, 13);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\n\"b\"""#),
            vec![TokenKind::StringLiteral("a\n\"b\"".to_string()), TokenKind::EOF]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("\"abc").tokenize().is_err());
    }
}
