//! # 式の構文解析
//!
//! Corvid言語の式（リテラル、演算子、関数呼び出しなど）の
//! 構文解析を担当するモジュールです。
//!
//! 優先順位（低い順）: 代入、エルビス、`||`、`&&`、等価、比較、`is`、
//! 加減算、乗除算、キャスト、単項、後置、一次式。

use std::sync::Arc;

use crate::frontend::ast::{
    Argument, BinaryOp, Expression, ExpressionKind, FunctionDecl, Identifier, Literal, Modifiers, UnaryOp,
};
use crate::frontend::error::{CompilerError, Result, SourceLocation};
use crate::frontend::lexer::TokenKind;

use super::Parser;

impl Parser {
    /// 式を解析
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_assignment()
    }

    fn make(&mut self, kind: ExpressionKind, start: SourceLocation) -> Expression {
        let id = self.next_id();
        Expression {
            kind,
            id,
            location: self.span_from(start),
        }
    }

    /// 代入式を解析（右結合）
    fn parse_assignment(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let target = self.parse_elvis()?;

        let op = match self.peek().kind {
            TokenKind::Equal => None,
            TokenKind::PlusEqual => Some(BinaryOp::Add),
            TokenKind::MinusEqual => Some(BinaryOp::Sub),
            TokenKind::StarEqual => Some(BinaryOp::Mul),
            TokenKind::SlashEqual => Some(BinaryOp::Div),
            _ => return Ok(target),
        };
        let operator = self.advance();

        // 左辺が有効な代入先（変数、メンバー、添字アクセス）かチェック
        match &target.kind {
            ExpressionKind::Identifier(_) | ExpressionKind::Member { safe: false, .. } | ExpressionKind::Index { .. } => {}
            _ => {
                return Err(CompilerError::syntax_error("不正な代入先です", Some(operator.location)).into());
            }
        }

        let value = self.parse_assignment()?;
        Ok(self.make(
            ExpressionKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            start,
        ))
    }

    /// エルビス演算子 `a ?: b` を解析（右結合）
    fn parse_elvis(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let left = self.parse_logical_or()?;
        if self.match_token(&TokenKind::Elvis) {
            let right = self.parse_elvis()?;
            return Ok(self.make(
                ExpressionKind::Elvis {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                start,
            ));
        }
        Ok(left)
    }

    /// 左結合の二項演算子の列を解析
    fn parse_binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expression>,
    ) -> Result<Expression> {
        let start = self.peek().location;
        let mut expr = next(self)?;
        loop {
            let op = operators
                .iter()
                .find(|(kind, _)| self.check(kind))
                .map(|(_, op)| *op);
            let Some(op) = op else {
                return Ok(expr);
            };
            self.advance();
            let right = next(self)?;
            expr = self.make(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                start,
            );
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expression> {
        self.parse_binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::parse_logical_and)
    }

    fn parse_logical_and(&mut self) -> Result<Expression> {
        self.parse_binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                (TokenKind::EqualEqual, BinaryOp::Eq),
                (TokenKind::BangEqual, BinaryOp::NotEq),
            ],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                (TokenKind::Less, BinaryOp::Less),
                (TokenKind::LessEqual, BinaryOp::LessEq),
                (TokenKind::Greater, BinaryOp::Greater),
                (TokenKind::GreaterEqual, BinaryOp::GreaterEq),
            ],
            Self::parse_is,
        )
    }

    /// 型検査 `e is T` を解析
    fn parse_is(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let mut expr = self.parse_additive()?;
        while self.match_token(&TokenKind::Is) {
            let ty = self.parse_type()?;
            expr = self.make(
                ExpressionKind::Is {
                    expr: Box::new(expr),
                    ty,
                },
                start,
            );
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_cast,
        )
    }

    /// キャスト `e as T` / `e as? T` を解析
    fn parse_cast(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let mut expr = self.parse_unary()?;
        while self.match_token(&TokenKind::As) {
            let safe = self.match_token(&TokenKind::Question);
            let ty = self.parse_type()?;
            expr = self.make(
                ExpressionKind::Cast {
                    expr: Box::new(expr),
                    ty,
                    safe,
                },
                start,
            );
        }
        Ok(expr)
    }

    /// 単項演算子を解析
    fn parse_unary(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(self.make(
            ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
        ))
    }

    /// 後置演算子（呼び出し、メンバーアクセス、添字）を解析
    fn parse_postfix(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LeftParen => {
                    let args = self.parse_arguments()?;
                    expr = self.make(
                        ExpressionKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        start,
                    );
                }
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let safe = self.advance().kind == TokenKind::QuestionDot;
                    let name = self.expect_identifier("'.' の後にメンバー名が必要です")?;
                    expr = self.make(
                        ExpressionKind::Member {
                            object: Box::new(expr),
                            name,
                            safe,
                        },
                        start,
                    );
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.consume(&TokenKind::RightBracket, "添字の ']' が必要です")?;
                    expr = self.make(
                        ExpressionKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        start,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    /// 呼び出し引数リストを解析
    fn parse_arguments(&mut self) -> Result<Vec<Argument>> {
        self.consume(&TokenKind::LeftParen, "引数リストの '(' が必要です")?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            let name = if matches!(self.peek().kind, TokenKind::Identifier(_))
                && self.peek_next().kind == TokenKind::Equal
            {
                let name = self.expect_identifier("引数名が必要です")?;
                self.advance();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression()?;
            args.push(Argument { name, value });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(&TokenKind::RightParen, "引数リストの ')' が必要です")?;
        Ok(args)
    }

    /// 一次式を解析
    fn parse_primary(&mut self) -> Result<Expression> {
        let start = self.peek().location;
        let kind = match self.peek().kind.clone() {
            TokenKind::IntLiteral(value) => ExpressionKind::Literal(Literal::Int(value)),
            TokenKind::FloatLiteral(value) => ExpressionKind::Literal(Literal::Float(value)),
            TokenKind::StringLiteral(value) => ExpressionKind::Literal(Literal::String(value)),
            TokenKind::True => ExpressionKind::Literal(Literal::Bool(true)),
            TokenKind::False => ExpressionKind::Literal(Literal::Bool(false)),
            TokenKind::Null => ExpressionKind::Literal(Literal::Null),
            TokenKind::This => ExpressionKind::This,
            TokenKind::Super => ExpressionKind::Super,
            TokenKind::Identifier(name) => ExpressionKind::Identifier(Identifier::new(name, start)),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(&TokenKind::RightParen, "括弧の ')' が必要です")?;
                return Ok(inner);
            }
            TokenKind::Fun => return self.parse_lambda(),
            other => {
                return Err(self.error_at_current(format!("式が必要ですが {} が見つかりました", other)));
            }
        };
        self.advance();
        Ok(self.make(kind, start))
    }

    /// 無名関数 `fun (params)[: Ret] { ... }` を解析
    fn parse_lambda(&mut self) -> Result<Expression> {
        let start = self.consume(&TokenKind::Fun, "'fun' が必要です")?.location;
        let params = self.parse_params()?;
        let return_type = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let decl = FunctionDecl {
            modifiers: Modifiers::default(),
            name: Identifier::new("%lambda", start),
            is_constructor: false,
            params,
            return_type,
            body: Some(body),
            location: self.span_from(start),
        };
        Ok(self.make(ExpressionKind::Lambda(Arc::new(decl)), start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn expr(source: &str) -> Expression {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(tokens).parse_expression().unwrap()
    }

    #[test]
    fn test_cast_binds_tighter_than_additive() {
        let e = expr("a + b as int");
        let ExpressionKind::Binary { op, right, .. } = e.kind else {
            panic!("二項演算が必要です");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(right.kind, ExpressionKind::Cast { safe: false, .. }));
    }

    #[test]
    fn test_safe_cast_and_is() {
        let e = expr("x as? Point is Point");
        let ExpressionKind::Is { expr: inner, .. } = e.kind else {
            panic!("is式が必要です");
        };
        assert!(matches!(inner.kind, ExpressionKind::Cast { safe: true, .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let e = expr("a = b += 1");
        let ExpressionKind::Assign { op: None, value, .. } = e.kind else {
            panic!("代入式が必要です");
        };
        assert!(matches!(value.kind, ExpressionKind::Assign { op: Some(BinaryOp::Add), .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let tokens = Lexer::new("f() = 1").tokenize().unwrap();
        assert!(Parser::new(tokens).parse_expression().is_err());
    }

    #[test]
    fn test_keyword_arguments() {
        let e = expr("f(1, key = 2)");
        let ExpressionKind::Call { args, .. } = e.kind else {
            panic!("呼び出し式が必要です");
        };
        assert!(args[0].name.is_none());
        assert_eq!(args[1].name.as_ref().unwrap().name, "key");
    }

    #[test]
    fn test_lambda() {
        let e = expr("fun (x: int): int { return x }");
        let ExpressionKind::Lambda(decl) = e.kind else {
            panic!("無名関数が必要です");
        };
        assert_eq!(decl.params.regular.len(), 1);
        assert!(decl.body.is_some());
    }
}
