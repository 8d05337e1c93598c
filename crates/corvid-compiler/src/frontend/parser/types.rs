//! # 型とパラメータリストの構文解析
//!
//! 型式（名前付き型・関数型）と、`/` と `*` で3つに区切られる
//! パラメータリストの構文解析を担当するモジュールです。

use crate::frontend::ast::{FunctionTypeParam, FunctionTypeParams, Param, ParamLists, TypeExpr};
use crate::frontend::error::Result;
use crate::frontend::lexer::TokenKind;

use super::Parser;

/// パラメータリスト解析中の区切り状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamSection {
    /// `/` より前（位置専用になりうる）
    Leading,
    /// `/` より後
    Regular,
    /// `*` より後
    Keyword,
}

impl Parser {
    /// 型式を解析
    pub fn parse_type(&mut self) -> Result<TypeExpr> {
        let start = self.peek().location;
        if self.match_token(&TokenKind::Fun) {
            return self.parse_function_type(start);
        }

        let mut path = vec![self.expect_identifier("型名が必要です")?];
        while self.match_token(&TokenKind::Dot) {
            path.push(self.expect_identifier("'.' の後に型名が必要です")?);
        }

        let mut args = Vec::new();
        if self.match_token(&TokenKind::Less) {
            loop {
                args.push(self.parse_type()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume(&TokenKind::Greater, "型引数リストの '>' が必要です")?;
        }

        let nullable = self.match_token(&TokenKind::Question);
        Ok(TypeExpr::Named {
            path,
            args,
            nullable,
            location: self.span_from(start),
        })
    }

    /// 関数型 `fun(...): R` を解析（`fun` は消費済み）
    fn parse_function_type(&mut self, start: crate::frontend::error::SourceLocation) -> Result<TypeExpr> {
        self.consume(&TokenKind::LeftParen, "関数型の '(' が必要です")?;
        let mut params = FunctionTypeParams::default();
        let mut section = ParamSection::Leading;

        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            if self.match_token(&TokenKind::Slash) {
                if section != ParamSection::Leading {
                    return Err(self.error_at_current("'/' は '*' より前に一度だけ記述できます"));
                }
                params.positional.append(&mut params.regular);
                section = ParamSection::Regular;
            } else if self.match_token(&TokenKind::Star) {
                if section == ParamSection::Keyword {
                    return Err(self.error_at_current("'*' は一度だけ記述できます"));
                }
                section = ParamSection::Keyword;
            } else {
                let name = if matches!(self.peek().kind, TokenKind::Identifier(_))
                    && self.peek_next().kind == TokenKind::Colon
                {
                    let name = self.expect_identifier("パラメータ名が必要です")?;
                    self.advance();
                    Some(name)
                } else {
                    None
                };
                let ty = self.parse_type()?;
                let is_variadic = self.match_token(&TokenKind::Ellipsis);
                let param = FunctionTypeParam { name, ty, is_variadic };
                match section {
                    ParamSection::Keyword => params.keyword.push(param),
                    _ => params.regular.push(param),
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::RightParen, "関数型の ')' が必要です")?;
        self.consume(&TokenKind::Colon, "関数型の戻り値の型の前に ':' が必要です")?;
        let return_type = Box::new(self.parse_type()?);
        let nullable = self.match_token(&TokenKind::Question);

        Ok(TypeExpr::Function {
            params,
            return_type,
            nullable,
            location: self.span_from(start),
        })
    }

    /// `(` から `)` までのパラメータリストを解析
    pub(crate) fn parse_params(&mut self) -> Result<ParamLists> {
        self.consume(&TokenKind::LeftParen, "パラメータリストの '(' が必要です")?;
        let mut lists = ParamLists::default();
        let mut section = ParamSection::Leading;

        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            if self.match_token(&TokenKind::Slash) {
                if section != ParamSection::Leading {
                    return Err(self.error_at_current("'/' は '*' より前に一度だけ記述できます"));
                }
                lists.positional.append(&mut lists.regular);
                section = ParamSection::Regular;
            } else if self.match_token(&TokenKind::Star) {
                if section == ParamSection::Keyword {
                    return Err(self.error_at_current("'*' は一度だけ記述できます"));
                }
                section = ParamSection::Keyword;
            } else {
                let param = self.parse_param()?;
                match section {
                    ParamSection::Keyword => lists.keyword.push(param),
                    _ => lists.regular.push(param),
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::RightParen, "パラメータリストの ')' が必要です")?;
        Ok(lists)
    }

    /// `[const] name: Type[...] [= default]`
    fn parse_param(&mut self) -> Result<Param> {
        let start = self.peek().location;
        let is_const = self.match_token(&TokenKind::Const);
        let name = self.expect_identifier("パラメータ名が必要です")?;
        self.consume(&TokenKind::Colon, "パラメータの型注釈 ':' が必要です")?;
        let ty = self.parse_type()?;
        let is_variadic = self.match_token(&TokenKind::Ellipsis);
        let default = if self.match_token(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Param {
            name,
            ty,
            is_const,
            is_variadic,
            default,
            location: self.span_from(start),
        })
    }
}
