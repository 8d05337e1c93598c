//! 式の型付け

use std::sync::Arc;

use log::trace;

use crate::frontend::ast::{BinaryOp, Expression, ExpressionKind, FunctionDecl, Literal, UnaryOp};
use crate::frontend::error::{CompilerError, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::builder::add_parameters;
use crate::frontend::semantic::scope::{FunctionData, Scope, ScopeData, ScopeId};
use crate::frontend::semantic::types::{ExprInfo, TypeInfo, ValueInfo};

use super::overload::CallArg;
use super::resolve::{type_error, Access, MemberHit};
use super::Analyzer;

impl Analyzer<'_> {
    /// 式を評価（読み出し）
    pub(super) fn visit_expr(&mut self, expr: &Expression) -> Result<ExprInfo> {
        self.visit_expr_with(expr, Access::Read)
    }

    fn visit_expr_with(&mut self, expr: &Expression, access: Access) -> Result<ExprInfo> {
        match &expr.kind {
            ExpressionKind::Literal(literal) => self.visit_literal(literal),
            ExpressionKind::Identifier(ident) => self.resolve_name(ident, access),
            ExpressionKind::This => {
                let compound = self.self_compound("this", expr.location)?;
                Ok(self_value(TypeInfo::basic(compound, false)))
            }
            ExpressionKind::Super => {
                let compound = self.self_compound("super", expr.location)?;
                let parent = self.class_super(compound, expr.location)?;
                Ok(self_value(TypeInfo::basic(parent, false)))
            }
            ExpressionKind::Member { object, name, safe } => {
                let object = self.visit_expr(object)?;
                self.resolve_member(object, name, *safe, access)
            }
            ExpressionKind::Call { callee, args } => self.resolve_call(expr, callee, args),
            ExpressionKind::Index { object, index } => {
                let receiver = self.visit_expr(object)?;
                let index = self.visit_expr(index)?;
                let args = vec![CallArg { name: None, info: index }];
                self.operator(expr, receiver, "__index__", "[]", args)
            }
            ExpressionKind::Unary { op, operand } => match op {
                UnaryOp::Negate => {
                    let operand = self.visit_expr(operand)?;
                    self.operator(expr, operand, "__neg__", "-", Vec::new())
                }
                UnaryOp::Not => {
                    self.expect_bool(operand)?;
                    self.builtin_type(|b| b.bool, false).map(ExprInfo::value)
                }
            },
            ExpressionKind::Binary { op, left, right } => self.visit_binary(expr, *op, left, right),
            ExpressionKind::Assign { op, target, value } => self.visit_assign(expr, *op, target, value),
            ExpressionKind::Cast { expr: inner, ty, safe } => {
                let info = self.visit_expr(inner)?;
                self.check_cast(info, ty, *safe, expr.location)
            }
            ExpressionKind::Is { expr: inner, ty } => {
                self.expect_value(inner)?;
                self.resolve_type(ty)?;
                self.builtin_type(|b| b.bool, false).map(ExprInfo::value)
            }
            ExpressionKind::Elvis { left, right } => {
                let left_ty = self.expect_value(left)?;
                let right_info = self.visit_expr(right)?;
                if !left_ty.is_nullable() {
                    self.warn(CompilerError::warning(
                        ErrorKind::TypeMismatch,
                        format!("'{}' はnullにならないため '?:' の右辺は使われません", left_ty.render(&self.tree)),
                        Some(right.location),
                    ));
                }
                let result = left_ty.with_nullable(false);
                self.check_assign(&result.with_nullable(true), &right_info, right.location)?;
                let nullable = right_info.ty().map(|t| t.is_nullable()).unwrap_or(false);
                Ok(ExprInfo::value(result.with_nullable(nullable)))
            }
            ExpressionKind::Lambda(decl) => self.visit_lambda(decl),
        }
    }

    fn visit_literal(&mut self, literal: &Literal) -> Result<ExprInfo> {
        let ty = match literal {
            Literal::Int(_) => self.builtin_type(|b| b.int, false)?,
            Literal::Float(_) => self.builtin_type(|b| b.float, false)?,
            Literal::String(_) => self.builtin_type(|b| b.string, false)?,
            Literal::Bool(_) => self.builtin_type(|b| b.bool, false)?,
            Literal::Null => {
                return Ok(ExprInfo::Normal {
                    ty: self.builtin_type(|b| b.any, true)?,
                    value: ValueInfo {
                        is_null: true,
                        ..ValueInfo::rvalue()
                    },
                });
            }
        };
        Ok(ExprInfo::value(ty))
    }

    /// `this` / `super` が指す複合型
    fn self_compound(&self, keyword: &str, location: SourceLocation) -> Result<ScopeId> {
        if self.is_static_context(self.current) {
            return Err(CompilerError::new(
                ErrorKind::InaccessibleMember,
                format!("静的な文脈では '{}' は使えません", keyword),
                Some(location),
            )
            .into());
        }
        self.tree.enclosing_compound(self.current).ok_or_else(|| {
            CompilerError::new(
                ErrorKind::UnresolvedReference,
                format!("'{}' は複合型の外では使えません", keyword),
                Some(location),
            )
            .into()
        })
    }

    fn visit_binary(&mut self, expr: &Expression, op: BinaryOp, left: &Expression, right: &Expression) -> Result<ExprInfo> {
        match (op, op.method_name()) {
            (BinaryOp::And | BinaryOp::Or, _) => {
                self.expect_bool(left)?;
                self.expect_bool(right)?;
            }
            (BinaryOp::Eq | BinaryOp::NotEq, _) => {
                self.expect_value(left)?;
                self.expect_value(right)?;
            }
            (_, Some(method)) => {
                let receiver = self.visit_expr(left)?;
                let arg = self.visit_expr(right)?;
                let display = op.to_string();
                return self.operator(expr, receiver, method, &display, vec![CallArg { name: None, info: arg }]);
            }
            (_, None) => {
                return Err(CompilerError::internal(format!("演算子 '{}' のメソッドがありません", op)).into());
            }
        }
        self.builtin_type(|b| b.bool, false).map(ExprInfo::value)
    }

    fn visit_assign(
        &mut self,
        expr: &Expression,
        op: Option<BinaryOp>,
        target: &Expression,
        value: &Expression,
    ) -> Result<ExprInfo> {
        let access = if op.is_some() { Access::ReadWrite } else { Access::Write };
        let target_info = self.visit_expr_with(target, access)?;
        let ExprInfo::Normal { ty, value: place } = &target_info else {
            return Err(type_error(format!("{}には代入できません", target_info.describe()), target.location));
        };
        if place.is_const {
            let name = place
                .declaration
                .map(|d| self.tree.get(d).name.clone())
                .unwrap_or_default();
            return Err(type_error(format!("const '{}' には代入できません", name), target.location));
        }
        if !place.is_lvalue {
            return Err(type_error("代入できない式です", target.location));
        }
        let ty = ty.clone();

        let source = self.visit_expr(value)?;
        match op.and_then(BinaryOp::method_name) {
            Some(method) => {
                let display = op.map(|o| format!("{}=", o)).unwrap_or_default();
                let receiver = ExprInfo::value(ty.clone());
                let result = self.operator(expr, receiver, method, &display, vec![CallArg { name: None, info: source }])?;
                self.check_assign(&ty, &result, expr.location)?;
            }
            None => self.check_assign(&ty, &source, value.location)?,
        }
        Ok(ExprInfo::value(ty))
    }

    /// 演算子メソッドの呼び出し
    fn operator(
        &mut self,
        expr: &Expression,
        receiver: ExprInfo,
        method: &str,
        display: &str,
        args: Vec<CallArg>,
    ) -> Result<ExprInfo> {
        let ty = match receiver {
            ExprInfo::Normal { ty, .. } => ty,
            other => {
                return Err(type_error(
                    format!("演算子 '{}' は{}には使えません", display, other.describe()),
                    expr.location,
                ));
            }
        };
        if ty.is_nullable() {
            return Err(type_error(
                format!("null許容型 '{}' には演算子 '{}' を使えません", ty.render(&self.tree), display),
                expr.location,
            ));
        }
        let message = format!("型 '{}' は演算子 '{}' をサポートしていません", ty.render(&self.tree), display);
        let unsupported = || type_error(message.clone(), expr.location);
        let Some(compound) = ty.compound() else {
            return Err(unsupported());
        };
        self.eval_compound(compound)?;
        let Some(MemberHit::Functions(functions)) = self.instance_member_hit(compound, method)? else {
            return Err(unsupported());
        };
        let functions: Vec<ScopeId> = functions.into_iter().filter(|&f| self.can_access(f)).collect();
        if functions.is_empty() {
            return Err(unsupported());
        }
        let name = format!("operator{}", display);
        let chosen = self.select_overload(&functions, &args, &name, expr.location)?;
        self.bind_call(expr, chosen);
        let ret = *self.eval_proto(chosen)?.ret;
        trace!("演算子 '{}' を {} に解決", display, self.tree.qualified_name(chosen));
        Ok(ExprInfo::value(ret))
    }

    /// 無名関数：その場でスコープを作り本体まで解析する
    fn visit_lambda(&mut self, decl: &Arc<FunctionDecl>) -> Result<ExprInfo> {
        self.lambda_counter += 1;
        let name = format!("%lambda{}", self.lambda_counter);
        let path = &self.tree.get(self.current).path / name.as_str();
        let scope = Scope::new(
            name.clone(),
            path,
            Some(decl.location),
            ScopeData::Lambda(FunctionData::new(Arc::clone(decl))),
        );
        let lambda = self
            .tree
            .add_member(self.current, &name, scope)
            .map_err(|_| CompilerError::internal(format!("無名関数 '{}' が重複しています", name)))?;
        let params = add_parameters(&mut self.tree, lambda, decl)?;
        if let Some(data) = self.tree.get_mut(lambda).as_function_mut() {
            data.params = params;
        }
        self.analyze_function_body(lambda)?;
        let ty = self.eval_proto(lambda)?;
        Ok(ExprInfo::value(TypeInfo::Function(ty)))
    }

    /// null非許容の bool を要求
    pub(super) fn expect_bool(&mut self, expr: &Expression) -> Result<()> {
        let ty = self.expect_value(expr)?;
        let bool_ty = self.builtin_type(|b| b.bool, false)?;
        if ty == bool_ty {
            return Ok(());
        }
        if ty.weak_equals(&bool_ty) {
            return Err(type_error("null許容の 'bool?' は条件に使えません", expr.location));
        }
        Err(type_error(
            format!("'bool' が必要ですが '{}' です", ty.render(&self.tree)),
            expr.location,
        ))
    }

    /// 値を要求してその型を返す
    pub(super) fn expect_value(&mut self, expr: &Expression) -> Result<TypeInfo> {
        match self.visit_expr(expr)? {
            ExprInfo::Normal { ty, .. } => Ok(ty),
            other => Err(type_error(format!("{}は値として使えません", other.describe()), expr.location)),
        }
    }
}

fn self_value(ty: TypeInfo) -> ExprInfo {
    ExprInfo::Normal {
        ty,
        value: ValueInfo {
            is_self: true,
            ..ValueInfo::rvalue()
        },
    }
}
