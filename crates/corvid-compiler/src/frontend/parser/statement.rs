//! # 文の構文解析
//!
//! Corvid言語の文（変数宣言、制御構文、式文など）の
//! 構文解析を担当するモジュールです。

use std::sync::Arc;

use crate::frontend::ast::{Block, CatchClause, Modifiers, Statement, StatementKind};
use crate::frontend::error::Result;
use crate::frontend::lexer::TokenKind;

use super::Parser;

impl Parser {
    /// `{ ... }` ブロックを解析
    pub fn parse_block(&mut self) -> Result<Block> {
        let start = self.consume(&TokenKind::LeftBrace, "ブロックの '{' が必要です")?.location;
        let mut statements = Vec::new();
        self.skip_semicolons();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
            self.skip_semicolons();
        }
        self.consume(&TokenKind::RightBrace, "ブロックの '}' が必要です")?;
        Ok(Block {
            statements,
            location: self.span_from(start),
        })
    }

    /// 文を解析
    pub fn parse_statement(&mut self) -> Result<Statement> {
        let start = self.peek().location;
        let kind = match self.peek().kind {
            TokenKind::Var | TokenKind::Const => {
                let decl = self.parse_variable(Modifiers::default(), start)?;
                StatementKind::Variable(Arc::new(decl))
            }
            TokenKind::LeftBrace => StatementKind::Block(self.parse_block()?),
            TokenKind::If => return self.parse_if(),
            TokenKind::While => {
                self.advance();
                let condition = self.parse_condition("while")?;
                let body = self.parse_block()?;
                StatementKind::While { condition, body }
            }
            TokenKind::Do => {
                self.advance();
                let body = self.parse_block()?;
                self.consume(&TokenKind::While, "do文の後に 'while' が必要です")?;
                let condition = self.parse_condition("while")?;
                StatementKind::DoWhile { body, condition }
            }
            TokenKind::Break => {
                self.advance();
                StatementKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StatementKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                StatementKind::Return(self.parse_trailing_value()?)
            }
            TokenKind::Yield => {
                self.advance();
                StatementKind::Yield(self.parse_trailing_value()?)
            }
            TokenKind::Throw => {
                self.advance();
                StatementKind::Throw(self.parse_expression()?)
            }
            TokenKind::Try => return self.parse_try(),
            _ => StatementKind::Expression(self.parse_expression()?),
        };
        self.match_token(&TokenKind::Semicolon);
        Ok(Statement {
            kind,
            location: self.span_from(start),
        })
    }

    /// `( 式 )` 形式の条件を解析
    fn parse_condition(&mut self, keyword: &str) -> Result<crate::frontend::ast::Expression> {
        self.consume(&TokenKind::LeftParen, format!("{}の条件の '(' が必要です", keyword))?;
        let condition = self.parse_expression()?;
        self.consume(&TokenKind::RightParen, format!("{}の条件の ')' が必要です", keyword))?;
        Ok(condition)
    }

    /// return/yieldの値（同じ行に続く場合のみ）
    fn parse_trailing_value(&mut self) -> Result<Option<crate::frontend::ast::Expression>> {
        let keyword_line = self.previous().location.line;
        let next = self.peek();
        let ends = matches!(
            next.kind,
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::EOF
        ) || next.location.line != keyword_line;
        if ends {
            Ok(None)
        } else {
            Ok(Some(self.parse_expression()?))
        }
    }

    /// if文を解析
    fn parse_if(&mut self) -> Result<Statement> {
        let start = self.consume(&TokenKind::If, "'if' が必要です")?.location;
        let condition = self.parse_condition("if")?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.match_token(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                let block = self.parse_block()?;
                let location = block.location;
                Some(Box::new(Statement {
                    kind: StatementKind::Block(block),
                    location,
                }))
            }
        } else {
            None
        };
        Ok(Statement {
            kind: StatementKind::If {
                condition,
                then_branch,
                else_branch,
            },
            location: self.span_from(start),
        })
    }

    /// try文を解析
    fn parse_try(&mut self) -> Result<Statement> {
        let start = self.consume(&TokenKind::Try, "'try' が必要です")?.location;
        let body = self.parse_block()?;

        let mut catches = Vec::new();
        while self.check(&TokenKind::Catch) {
            let catch_start = self.advance().location;
            self.consume(&TokenKind::LeftParen, "catch節の '(' が必要です")?;
            let name = self.expect_identifier("例外変数名が必要です")?;
            self.consume(&TokenKind::Colon, "例外変数の型注釈 ':' が必要です")?;
            let ty = self.parse_type()?;
            self.consume(&TokenKind::RightParen, "catch節の ')' が必要です")?;
            let body = self.parse_block()?;
            catches.push(CatchClause {
                name,
                ty,
                body,
                location: self.span_from(catch_start),
            });
        }

        let finally = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catches.is_empty() && finally.is_none() {
            return Err(self.error_at_current("try文には catch 節か finally 節が必要です"));
        }

        Ok(Statement {
            kind: StatementKind::Try { body, catches, finally },
            location: self.span_from(start),
        })
    }
}
