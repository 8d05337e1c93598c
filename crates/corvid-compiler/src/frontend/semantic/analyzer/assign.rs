//! 代入可能性と変数の評価

use std::sync::Arc;

use crate::frontend::ast::{Expression, TypeExpr};
use crate::frontend::error::{CompilerError, ErrorGroup, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::scope::{Eval, ScopeId, ScopeKind, VariableSource};
use crate::frontend::semantic::types::{ExprInfo, TypeInfo};

use super::resolve::type_error;
use super::Analyzer;

impl Analyzer<'_> {
    /// `source` を `target` 型の場所に代入できるか
    ///
    /// 成功時は型が完全に一致したかどうかを返し、失敗時は理由を返します。
    pub(super) fn assignable(&mut self, target: &TypeInfo, source: &ExprInfo) -> Result<std::result::Result<bool, String>> {
        match source {
            ExprInfo::Module(_) => Ok(Err("モジュールは値として使えません".to_string())),
            ExprInfo::Static(ty) => {
                if target.compound().is_none() && matches!(target, TypeInfo::Basic(_)) {
                    return Ok(Ok(true));
                }
                Ok(Err(format!("型 '{}' は値として使えません", ty.render(&self.tree))))
            }
            ExprInfo::FunctionSet(info) => {
                let Some(expected) = target.as_function() else {
                    return Ok(Err(format!("関数を '{}' 型に代入できません", target.render(&self.tree))));
                };
                let mut matched = Vec::new();
                for &function in &info.functions {
                    let ty = self.eval_proto(function)?;
                    if ty.same_signature(expected) && ty.ret.weak_equals(&expected.ret) {
                        matched.push(function);
                    }
                }
                match matched.as_slice() {
                    [function] => {
                        self.tree.get_mut(*function).usage += 1;
                        Ok(Ok(true))
                    }
                    [] => Ok(Err(format!(
                        "'{}' と一致するシグネチャの関数がありません",
                        target.render(&self.tree)
                    ))),
                    _ => Ok(Err(format!(
                        "'{}' と一致する関数が複数あり曖昧です",
                        target.render(&self.tree)
                    ))),
                }
            }
            ExprInfo::Normal { ty, value } => self.type_assignable(target, ty, value.is_null),
        }
    }

    fn type_assignable(
        &mut self,
        target: &TypeInfo,
        source: &TypeInfo,
        is_null: bool,
    ) -> Result<std::result::Result<bool, String>> {
        let builtins = self.builtins()?;
        if is_null {
            return Ok(if target.is_nullable() {
                Ok(false)
            } else {
                Err(format!("null を null非許容型 '{}' に代入できません", target.render(&self.tree)))
            });
        }
        if source.is_nullable() && !target.is_nullable() {
            return Ok(Err(format!(
                "null許容型 '{}' を null非許容型 '{}' に代入できません",
                source.render(&self.tree),
                target.render(&self.tree)
            )));
        }
        let mismatch = format!(
            "'{}' を '{}' に代入できません",
            source.render(&self.tree),
            target.render(&self.tree)
        );

        match (target, source) {
            (TypeInfo::Basic(t), TypeInfo::Basic(s)) => {
                let (Some(tc), Some(sc)) = (t.compound, s.compound) else {
                    return Ok(if t.compound == s.compound { Ok(true) } else { Err(mismatch) });
                };
                if tc == sc {
                    if !t.args.is_empty() && !s.args.is_empty() && t.args.len() != s.args.len() {
                        return Err(type_error_group(format!(
                            "型引数の数が一致しません（'{}' と '{}'）",
                            target.render(&self.tree),
                            source.render(&self.tree)
                        )));
                    }
                    return Ok(Ok(target == source));
                }
                let numeric = [builtins.int, builtins.float];
                if tc == builtins.any
                    || tc == builtins.string
                    || tc == builtins.void
                    || (numeric.contains(&tc) && numeric.contains(&sc))
                    || self.is_subtype_of(sc, tc)?
                {
                    return Ok(Ok(false));
                }
                Ok(Err(mismatch))
            }
            (TypeInfo::Basic(t), TypeInfo::Function(_)) => {
                let accepts = t.compound.map(|c| c == builtins.any || c == builtins.string || c == builtins.void);
                Ok(if accepts == Some(true) { Ok(false) } else { Err(mismatch) })
            }
            (TypeInfo::Function(t), TypeInfo::Function(s)) => {
                if t.same_signature(s) && t.ret.weak_equals(&s.ret) {
                    Ok(Ok(t == s))
                } else {
                    Ok(Err(mismatch))
                }
            }
            (TypeInfo::Function(_), TypeInfo::Basic(_)) => Ok(Err(mismatch)),
        }
    }

    /// 代入できなければエラー
    pub(super) fn check_assign(&mut self, target: &TypeInfo, source: &ExprInfo, location: SourceLocation) -> Result<()> {
        match self.assignable(target, source)? {
            Ok(_) => Ok(()),
            Err(reason) => Err(type_error(reason, location)),
        }
    }

    /// 宣言型と初期化式から変数の型を決める
    ///
    /// 宣言型がある場合は初期化式を評価する前に変数へ書き込み、
    /// 初期化式からの自己参照が型を得られるようにします。
    pub(super) fn resolve_assign(
        &mut self,
        declared: Option<&TypeExpr>,
        initializer: Option<&Expression>,
        variable: Option<ScopeId>,
    ) -> Result<TypeInfo> {
        match (declared, initializer) {
            (Some(declared), Some(init)) => {
                let ty = self.resolve_type(declared)?;
                if let Some(variable) = variable {
                    if let Some(data) = self.tree.get_mut(variable).as_variable_mut() {
                        data.ty = Some(ty.clone());
                    }
                }
                let info = self.visit_expr(init)?;
                self.check_assign(&ty, &info, init.location)?;
                Ok(ty)
            }
            (Some(declared), None) => self.resolve_type(declared),
            (None, Some(init)) => {
                let info = self.visit_expr(init)?;
                self.infer_type(&info, init.location)
            }
            (None, None) => self.builtin_type(|b| b.any, true),
        }
    }

    /// 初期化式の情報から推論される型
    fn infer_type(&mut self, info: &ExprInfo, location: SourceLocation) -> Result<TypeInfo> {
        match info {
            ExprInfo::Normal { value, .. } if value.is_null => self.builtin_type(|b| b.any, true),
            ExprInfo::Normal { ty, .. } => {
                if ty.compound() == Some(self.builtins()?.void) {
                    return Err(type_error("void の値は変数に代入できません", location));
                }
                Ok(ty.clone())
            }
            ExprInfo::Static(_) => Ok(TypeInfo::type_literal()),
            ExprInfo::FunctionSet(_) => Err(CompilerError::new(
                ErrorKind::TypeInference,
                "関数集合から変数の型を推論することはできません",
                Some(location),
            )
            .into()),
            ExprInfo::Module(_) => Err(type_error("モジュールは値として使えません", location)),
        }
    }

    /// 変数の型を評価
    pub(super) fn eval_variable(&mut self, id: ScopeId) -> Result<TypeInfo> {
        let (eval, stamped, source) = match self.tree.get(id).as_variable() {
            Some(data) => (data.eval, data.ty.clone(), data.source.clone()),
            None => return Err(CompilerError::internal(format!("{} は変数ではありません", id)).into()),
        };
        match eval {
            Eval::Done => match stamped {
                Some(ty) => Ok(ty),
                None => self.builtin_type(|b| b.any, true),
            },
            Eval::InProgress => {
                if let Some(ty) = stamped {
                    return Ok(ty);
                }
                let scope = self.tree.get(id);
                let warning = CompilerError::warning(
                    ErrorKind::TypeInference,
                    format!("'{}' の型は自身の初期化式に依存しているため 'any?' とみなします", scope.name),
                    scope.location,
                );
                self.warn(warning);
                self.builtin_type(|b| b.any, true)
            }
            Eval::NotStarted => match source {
                VariableSource::Declared(decl) => {
                    self.set_variable_eval(id, Eval::InProgress);
                    let is_local = self
                        .tree
                        .parent(id)
                        .map(|p| self.tree.kind(p) == ScopeKind::Block)
                        .unwrap_or(false);
                    let decl = Arc::clone(&decl);
                    let resolve = |this: &mut Self| this.resolve_assign(decl.ty.as_ref(), decl.initializer.as_ref(), Some(id));
                    let result = if is_local {
                        self.with_current(id, resolve)
                    } else {
                        self.in_scope(id, resolve)
                    };
                    let fallback = self.builtin_type(|b| b.any, true)?;
                    if let Some(data) = self.tree.get_mut(id).as_variable_mut() {
                        data.eval = Eval::Done;
                        data.ty = Some(result.as_ref().cloned().unwrap_or(fallback));
                        if decl.initializer.is_some() {
                            data.assigned += 1;
                        }
                    }
                    result
                }
                VariableSource::Parameter { .. } => {
                    let function = self
                        .tree
                        .parent(id)
                        .ok_or_else(|| CompilerError::internal("パラメータの親がありません"))?;
                    self.eval_proto(function)?;
                    match self.tree.get(id).as_variable().and_then(|v| v.ty.clone()) {
                        Some(ty) => Ok(ty),
                        None => self.builtin_type(|b| b.any, true),
                    }
                }
                VariableSource::Catch => self.builtin_type(|b| b.throwable, false),
            },
        }
    }

    fn set_variable_eval(&mut self, id: ScopeId, eval: Eval) {
        if let Some(data) = self.tree.get_mut(id).as_variable_mut() {
            data.eval = eval;
        }
    }
}

fn type_error_group(message: String) -> ErrorGroup {
    CompilerError::new(ErrorKind::TypeMismatch, message, None).into()
}
