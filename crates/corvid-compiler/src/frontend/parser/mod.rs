//! # 構文解析器
//!
//! Corvid言語の構文解析を担当するモジュールです。
//! 字句解析器からのトークン列を受け取り、言語の文法に基づいて
//! 抽象構文木（AST）を構築します。
//!
//! 再帰下降法で実装しており、セミコロンは省略可能な文の終端子として扱います。
//! 最初の構文エラーで解析を打ち切ります。

use std::path::Path;
use std::sync::Arc;

use crate::frontend::ast::{
    CompoundDecl, CompoundKind, Declaration, FunctionDecl, Identifier, Import, Modifier, ModifierKind,
    Modifiers, Module, NodeId, VariableDecl,
};
use crate::frontend::error::{CompilerError, Result, SourceLocation};
use crate::frontend::lexer::{Lexer, Token, TokenKind};

pub mod expression;
pub mod statement;
pub mod types;

/// ソースコードを字句解析・構文解析してモジュールを生成
pub fn parse_source(source: &str, name: &str, path: &Path) -> Result<Module> {
    let tokens = Lexer::new(source).tokenize().map_err(|e| e.with_file_path(path))?;
    Parser::new(tokens)
        .parse_module(name, path)
        .map_err(|e| e.with_file_path(path))
}

/// パーサー
pub struct Parser {
    /// トークン列（末尾は必ずEOF）
    tokens: Vec<Token>,
    /// 現在のトークンインデックス
    current: usize,
    /// 次に割り当てるノードID
    next_node_id: NodeId,
}

impl Parser {
    /// 新しいパーサーを作成
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind != TokenKind::EOF).unwrap_or(true) {
            let location = tokens.last().map(|t| t.location).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, location));
        }
        Self {
            tokens,
            current: 0,
            next_node_id: 0,
        }
    }

    /// モジュール全体を解析
    pub fn parse_module(&mut self, name: &str, path: &Path) -> Result<Module> {
        let start = self.peek().location;
        let mut imports = Vec::new();
        self.skip_semicolons();
        while self.check(&TokenKind::Import) {
            imports.push(Arc::new(self.parse_import()?));
            self.skip_semicolons();
        }

        let mut declarations = Vec::new();
        while !self.is_at_end() {
            if self.check(&TokenKind::Import) {
                return Err(self.error_at_current("インポート宣言はモジュールの先頭に記述してください"));
            }
            declarations.push(self.parse_declaration()?);
            self.skip_semicolons();
        }

        Ok(Module {
            name: name.to_string(),
            path: path.to_path_buf(),
            imports,
            declarations,
            location: start,
        })
    }

    /// インポート宣言を解析
    fn parse_import(&mut self) -> Result<Import> {
        let start = self.consume(&TokenKind::Import, "'import' が必要です")?.location;

        let mut relative = 0;
        loop {
            if self.match_token(&TokenKind::Dot) {
                relative += 1;
            } else if self.match_token(&TokenKind::Ellipsis) {
                relative += 3;
            } else {
                break;
            }
        }

        let mut segments = vec![self.expect_identifier("インポートするモジュール名が必要です")?];
        let mut open = false;
        while self.match_token(&TokenKind::Dot) {
            if self.match_token(&TokenKind::Star) {
                open = true;
                break;
            }
            segments.push(self.expect_identifier("'.' の後にモジュール名が必要です")?);
        }

        let alias = if !open && self.match_token(&TokenKind::As) {
            Some(self.expect_identifier("'as' の後に別名が必要です")?)
        } else {
            None
        };

        Ok(Import {
            relative,
            segments,
            alias,
            open,
            location: self.span_from(start),
        })
    }

    /// 宣言を解析
    pub(crate) fn parse_declaration(&mut self) -> Result<Declaration> {
        let start = self.peek().location;
        let modifiers = self.parse_modifiers();
        match self.peek().kind {
            TokenKind::Class | TokenKind::Interface | TokenKind::Enum | TokenKind::Annotation => Ok(
                Declaration::Compound(Arc::new(self.parse_compound(modifiers, start)?)),
            ),
            TokenKind::Fun => Ok(Declaration::Function(Arc::new(self.parse_function(modifiers, start)?))),
            TokenKind::Constructor => Ok(Declaration::Function(Arc::new(
                self.parse_constructor(modifiers, start)?,
            ))),
            TokenKind::Var | TokenKind::Const => {
                let decl = self.parse_variable(modifiers, start)?;
                self.match_token(&TokenKind::Semicolon);
                Ok(Declaration::Variable(Arc::new(decl)))
            }
            _ => Err(self.error_at_current(format!("宣言が必要ですが {} が見つかりました", self.peek().kind))),
        }
    }

    /// 修飾子リストを解析
    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Vec::new();
        while self.peek().kind.is_modifier() {
            let token = self.advance();
            let kind = match token.kind {
                TokenKind::Public => ModifierKind::Public,
                TokenKind::Private => ModifierKind::Private,
                TokenKind::Internal => ModifierKind::Internal,
                TokenKind::Protected => ModifierKind::Protected,
                TokenKind::Static => ModifierKind::Static,
                TokenKind::Final => ModifierKind::Final,
                TokenKind::Abstract => ModifierKind::Abstract,
                TokenKind::Override => ModifierKind::Override,
                _ => ModifierKind::Native,
            };
            modifiers.push(Modifier {
                kind,
                location: token.location,
            });
        }
        Modifiers(modifiers)
    }

    /// 複合型宣言を解析
    fn parse_compound(&mut self, modifiers: Modifiers, start: SourceLocation) -> Result<CompoundDecl> {
        let kind = match self.advance().kind {
            TokenKind::Class => CompoundKind::Class,
            TokenKind::Interface => CompoundKind::Interface,
            TokenKind::Enum => CompoundKind::Enum,
            _ => CompoundKind::Annotation,
        };
        let name = self.expect_identifier(format!("{}名が必要です", kind))?;

        let mut type_params = Vec::new();
        if self.match_token(&TokenKind::Less) {
            loop {
                type_params.push(self.expect_identifier("型パラメータ名が必要です")?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.consume(&TokenKind::Greater, "型パラメータリストの '>' が必要です")?;
        }

        let mut supers = Vec::new();
        if self.match_token(&TokenKind::Colon) {
            loop {
                supers.push(self.parse_type()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(&TokenKind::LeftBrace, format!("{}本体の '{{' が必要です", kind))?;

        let mut enumerators = Vec::new();
        if kind == CompoundKind::Enum {
            while let TokenKind::Identifier(_) = self.peek().kind {
                enumerators.push(self.expect_identifier("列挙子名が必要です")?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let mut members = Vec::new();
        self.skip_semicolons();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            members.push(self.parse_declaration()?);
            self.skip_semicolons();
        }
        self.consume(&TokenKind::RightBrace, format!("{}本体の '}}' が必要です", kind))?;

        Ok(CompoundDecl {
            modifiers,
            kind,
            name,
            type_params,
            supers,
            enumerators,
            members,
            location: self.span_from(start),
        })
    }

    /// 関数宣言を解析
    fn parse_function(&mut self, modifiers: Modifiers, start: SourceLocation) -> Result<FunctionDecl> {
        self.consume(&TokenKind::Fun, "'fun' が必要です")?;
        let name = self.expect_identifier("関数名が必要です")?;
        let params = self.parse_params()?;
        let return_type = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = if self.check(&TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            self.match_token(&TokenKind::Semicolon);
            None
        };

        Ok(FunctionDecl {
            modifiers,
            name,
            is_constructor: false,
            params,
            return_type,
            body,
            location: self.span_from(start),
        })
    }

    /// コンストラクタ宣言を解析
    fn parse_constructor(&mut self, modifiers: Modifiers, start: SourceLocation) -> Result<FunctionDecl> {
        let keyword = self.consume(&TokenKind::Constructor, "'constructor' が必要です")?;
        let name = Identifier::new("constructor", keyword.location);
        let params = self.parse_params()?;
        let body = if self.check(&TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            self.match_token(&TokenKind::Semicolon);
            None
        };

        Ok(FunctionDecl {
            modifiers,
            name,
            is_constructor: true,
            params,
            return_type: None,
            body,
            location: self.span_from(start),
        })
    }

    /// 変数宣言を解析（`var`/`const` から始まる）
    pub(crate) fn parse_variable(&mut self, modifiers: Modifiers, start: SourceLocation) -> Result<VariableDecl> {
        let is_const = self.advance().kind == TokenKind::Const;
        let name = self.expect_identifier("変数名が必要です")?;
        let ty = if self.match_token(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(VariableDecl {
            modifiers,
            is_const,
            name,
            ty,
            initializer,
            location: self.span_from(start),
        })
    }

    // ---- トークン操作 ----

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_next(&self) -> &Token {
        &self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EOF
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn consume(&mut self, kind: &TokenKind, message: impl Into<String>) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let message = message.into();
            Err(self.error_at_current(format!("{}（{} が見つかりました）", message, self.peek().kind)))
        }
    }

    pub(crate) fn expect_identifier(&mut self, message: impl Into<String>) -> Result<Identifier> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let ident = Identifier::new(name.clone(), self.peek().location);
                self.advance();
                Ok(ident)
            }
            other => Err(self.error_at_current(format!("{}（{} が見つかりました）", message.into(), other))),
        }
    }

    pub(crate) fn skip_semicolons(&mut self) {
        while self.match_token(&TokenKind::Semicolon) {}
    }

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// 開始位置から直前のトークンまでの範囲
    pub(crate) fn span_from(&self, start: SourceLocation) -> SourceLocation {
        start.merge_with(&self.previous().location)
    }

    pub(crate) fn error_at_current(&self, message: impl Into<String>) -> crate::frontend::error::ErrorGroup {
        CompilerError::syntax_error(message, Some(self.peek().location)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{ExpressionKind, StatementKind, TypeExpr};

    fn parse(source: &str) -> Module {
        parse_source(source, "test", Path::new("test.crv")).unwrap()
    }

    #[test]
    fn test_parse_imports() {
        let module = parse("import a.b.c as d\nimport ..x.*\nvar y = 1");
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[0].binding_name(), Some("d"));
        assert_eq!(module.imports[0].display_path(), "a.b.c");
        assert_eq!(module.imports[1].relative, 2);
        assert!(module.imports[1].open);
        assert_eq!(module.imports[1].display_path(), "..x.*");
    }

    #[test]
    fn test_parse_class_with_members() {
        let module = parse(
            "public class Point : Base, Shape {
                var x: int = 0
                constructor(x: int) { this.x = x }
                fun norm(): float { return 0.0 }
            }",
        );
        let Declaration::Compound(class) = &module.declarations[0] else {
            panic!("クラス宣言が必要です");
        };
        assert_eq!(class.name.name, "Point");
        assert!(class.modifiers.has(ModifierKind::Public));
        assert_eq!(class.supers.len(), 2);
        assert_eq!(class.members.len(), 3);
        let Declaration::Function(ctor) = &class.members[1] else {
            panic!("コンストラクタが必要です");
        };
        assert!(ctor.is_constructor);
        assert_eq!(ctor.name.name, "constructor");
    }

    #[test]
    fn test_parse_enum() {
        let module = parse("enum Color { Red, Green, Blue; fun f() {} }");
        let Declaration::Compound(decl) = &module.declarations[0] else {
            panic!("列挙型が必要です");
        };
        let names: Vec<&str> = decl.enumerators.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Red", "Green", "Blue"]);
        assert_eq!(decl.members.len(), 1);
    }

    #[test]
    fn test_parse_param_groups() {
        let module = parse("fun f(a: int, /, b: string, *, c: int = 1, d: int...) {}");
        let Declaration::Function(fun) = &module.declarations[0] else {
            panic!("関数宣言が必要です");
        };
        assert_eq!(fun.params.positional.len(), 1);
        assert_eq!(fun.params.regular.len(), 1);
        assert_eq!(fun.params.keyword.len(), 2);
        assert!(fun.params.keyword[0].default.is_some());
        assert!(fun.params.keyword[1].is_variadic);
    }

    #[test]
    fn test_parse_statements_and_precedence() {
        let module = parse(
            "fun f(): int {
                var a = 1 + 2 * 3
                if (a > 2 && true) { return a } else if (false) { a += 1 } else { }
                while (a < 10) { a = a + 1; continue }
                try { throw Exception() } catch (e: Exception) { } finally { }
                return g(1, name = 2)?.h ?: 0
            }",
        );
        let Declaration::Function(fun) = &module.declarations[0] else {
            panic!("関数宣言が必要です");
        };
        let body = fun.body.as_ref().unwrap();
        assert_eq!(body.statements.len(), 5);

        let StatementKind::Variable(var) = &body.statements[0].kind else {
            panic!("変数宣言が必要です");
        };
        let init = var.initializer.as_ref().unwrap();
        let ExpressionKind::Binary { right, .. } = &init.kind else {
            panic!("二項演算が必要です");
        };
        assert!(matches!(right.kind, ExpressionKind::Binary { .. }));

        let StatementKind::Return(Some(ret)) = &body.statements[4].kind else {
            panic!("return文が必要です");
        };
        assert!(matches!(ret.kind, ExpressionKind::Elvis { .. }));
    }

    #[test]
    fn test_parse_function_type() {
        let module = parse("var cb: fun(int, /, string, *, key: int): void? = null");
        let Declaration::Variable(var) = &module.declarations[0] else {
            panic!("変数宣言が必要です");
        };
        let Some(TypeExpr::Function { params, nullable, .. }) = &var.ty else {
            panic!("関数型が必要です");
        };
        assert!(nullable);
        assert_eq!(params.positional.len(), 1);
        assert_eq!(params.regular.len(), 1);
        assert_eq!(params.keyword[0].name.as_ref().unwrap().name, "key");
    }

    #[test]
    fn test_node_ids_unique() {
        let module = parse("var a = f(1, 2) + 3");
        let Declaration::Variable(var) = &module.declarations[0] else {
            panic!("変数宣言が必要です");
        };
        let mut ids = Vec::new();
        fn collect(expr: &crate::frontend::ast::Expression, ids: &mut Vec<NodeId>) {
            ids.push(expr.id);
            match &expr.kind {
                ExpressionKind::Binary { left, right, .. } => {
                    collect(left, ids);
                    collect(right, ids);
                }
                ExpressionKind::Call { callee, args } => {
                    collect(callee, ids);
                    for arg in args {
                        collect(&arg.value, ids);
                    }
                }
                _ => {}
            }
        }
        collect(var.initializer.as_ref().unwrap(), &mut ids);
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn test_syntax_error_location() {
        let error = parse_source("class {", "test", Path::new("test.crv")).unwrap_err();
        assert_eq!(error.first().location.unwrap().column, 7);
        assert!(error.first().file_path.is_some());
    }
}
