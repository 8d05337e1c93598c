//! 明示的なキャスト `as` / `as?`
//!
//! キャスト元がキャスト先の派生型でなければ（ダウンキャストを含む）、
//! キャスト先のすべてのメンバーをキャスト元が同じ名前と種類で持つときだけ
//! 構造的に互換とみなします。

use crate::frontend::ast::TypeExpr;
use crate::frontend::error::{CompilerError, Diagnostic, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::scope::{ScopeId, ScopeKind};
use crate::frontend::semantic::types::{ExprInfo, TypeInfo};

use super::resolve::{type_error, MemberHit};
use super::Analyzer;

/// キャストの判定結果
enum CastCheck {
    Allowed,
    /// `any` からのキャスト（結果は常にnull）
    AlwaysNull,
    /// 構造的に互換でない（メンバーごとの注記）
    Incompatible(Vec<Diagnostic>),
}

impl Analyzer<'_> {
    /// キャスト式の検査
    pub(super) fn check_cast(&mut self, info: ExprInfo, target: &TypeExpr, safe: bool, location: SourceLocation) -> Result<ExprInfo> {
        let target = self.resolve_type(target)?;
        let result = if safe { target.with_nullable(true) } else { target.clone() };

        let (source, is_null) = match &info {
            ExprInfo::Normal { ty, value } => (ty.clone(), value.is_null),
            ExprInfo::FunctionSet(_) => {
                return match self.assignable(&target, &info)? {
                    Ok(_) => Ok(ExprInfo::value(result)),
                    Err(reason) => Err(type_error(reason, location)),
                };
            }
            other => {
                return Err(type_error(format!("{}はキャストできません", other.describe()), location));
            }
        };
        if is_null {
            return Ok(ExprInfo::value(target.with_nullable(true)));
        }

        let rendered = format!(
            "'{}' から '{}' へのキャスト",
            source.render(&self.tree),
            target.render(&self.tree)
        );
        match self.cast_compatible(&source, &target)? {
            CastCheck::Allowed => Ok(ExprInfo::value(result)),
            CastCheck::AlwaysNull if safe => {
                self.warn(CompilerError::warning(
                    ErrorKind::TypeMismatch,
                    format!("{}は常に null になります", rendered),
                    Some(location),
                ));
                Ok(ExprInfo::value(result))
            }
            CastCheck::AlwaysNull => Err(type_error(format!("{}は常に失敗します", rendered), location)),
            CastCheck::Incompatible(notes) => {
                let mut error = if safe {
                    CompilerError::warning(ErrorKind::TypeMismatch, format!("{}は常に null になります", rendered), Some(location))
                } else {
                    CompilerError::new(ErrorKind::TypeMismatch, format!("{}はできません", rendered), Some(location))
                };
                for note in notes {
                    error.add_diagnostic(note);
                }
                if safe {
                    self.warn(error);
                    Ok(ExprInfo::value(result))
                } else {
                    Err(error.into())
                }
            }
        }
    }

    fn cast_compatible(&mut self, source: &TypeInfo, target: &TypeInfo) -> Result<CastCheck> {
        let builtins = self.builtins()?;
        if source.weak_equals(target) {
            return Ok(CastCheck::Allowed);
        }
        match (source, target) {
            (TypeInfo::Function(s), TypeInfo::Function(t)) => {
                if s.same_signature(t) && s.ret.weak_equals(&t.ret) {
                    Ok(CastCheck::Allowed)
                } else {
                    Ok(CastCheck::Incompatible(vec![Diagnostic::note("関数のシグネチャが一致しません", None)]))
                }
            }
            (_, TypeInfo::Basic(t)) if t.compound == Some(builtins.string) || t.compound == Some(builtins.void) => {
                Ok(CastCheck::Allowed)
            }
            (TypeInfo::Basic(s), TypeInfo::Basic(t)) => {
                let (Some(sc), Some(tc)) = (s.compound, t.compound) else {
                    return Ok(CastCheck::Incompatible(Vec::new()));
                };
                let numeric = [builtins.int, builtins.float];
                if numeric.contains(&sc) && numeric.contains(&tc) {
                    return Ok(CastCheck::Allowed);
                }
                if sc == builtins.any {
                    return Ok(CastCheck::AlwaysNull);
                }
                if self.is_subtype_of(sc, tc)? {
                    return Ok(CastCheck::Allowed);
                }
                let notes = self.structural_mismatches(sc, tc)?;
                Ok(if notes.is_empty() {
                    CastCheck::Allowed
                } else {
                    CastCheck::Incompatible(notes)
                })
            }
            _ => Ok(CastCheck::Incompatible(Vec::new())),
        }
    }

    /// キャスト先のメンバーのうち、キャスト元と一致しないものの注記
    fn structural_mismatches(&mut self, source: ScopeId, target: ScopeId) -> Result<Vec<Diagnostic>> {
        self.eval_compound(source)?;
        self.eval_compound(target)?;

        let mut names: Vec<String> = self
            .tree
            .get(target)
            .members()
            .map(|(n, _)| n.to_string())
            .filter(|n| n != "constructor" && !n.starts_with('%'))
            .collect();
        if let Some(data) = self.tree.get(target).as_compound() {
            for name in data
                .super_fields
                .iter()
                .map(|&f| self.tree.get(f).name.clone())
                .chain(data.super_functions.iter().map(|(n, _)| n.clone()))
            {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut notes = Vec::new();
        for name in names {
            let Some(expected) = self.instance_member_hit(target, &name)? else {
                continue;
            };
            let found = self.instance_member_hit(source, &name)?;
            if let Some(reason) = self.member_mismatch(&expected, found.as_ref())? {
                let anchor = match &expected {
                    MemberHit::Scope(id) => Some(*id),
                    MemberHit::Functions(functions) => functions.first().copied(),
                };
                let note = match anchor {
                    Some(id) => Diagnostic::note(format!("メンバー '{}': {}", name, reason), self.tree.get(id).location)
                        .with_file_path(self.file_of(id).as_deref()),
                    None => Diagnostic::note(format!("メンバー '{}': {}", name, reason), None),
                };
                notes.push(note);
            }
        }
        Ok(notes)
    }

    fn member_mismatch(&mut self, expected: &MemberHit, found: Option<&MemberHit>) -> Result<Option<String>> {
        let Some(found) = found else {
            return Ok(Some("キャスト元にありません".to_string()));
        };
        match (expected, found) {
            (MemberHit::Functions(expected), MemberHit::Functions(found)) => {
                for &e in expected {
                    let ty = self.eval_proto(e)?;
                    let mut matched = false;
                    for &f in found {
                        let other = self.eval_proto(f)?;
                        if other.same_signature(&ty) && other.ret.weak_equals(&ty.ret) {
                            matched = true;
                            break;
                        }
                    }
                    if !matched {
                        return Ok(Some("一致するシグネチャの関数がありません".to_string()));
                    }
                }
                Ok(None)
            }
            (MemberHit::Scope(e), MemberHit::Scope(f)) => {
                let (e, f) = (*e, *f);
                match (self.tree.kind(e), self.tree.kind(f)) {
                    (ScopeKind::Variable, ScopeKind::Variable) => {
                        let const_of = |id: ScopeId| self.tree.get(id).as_variable().map(|v| v.is_const).unwrap_or(false);
                        if const_of(e) != const_of(f) {
                            return Ok(Some("var と const が一致しません".to_string()));
                        }
                        let expected_ty = self.eval_variable(e)?;
                        let found_ty = self.eval_variable(f)?;
                        if !expected_ty.weak_equals(&found_ty) {
                            return Ok(Some(format!(
                                "型が '{}' ではなく '{}' です",
                                expected_ty.render(&self.tree),
                                found_ty.render(&self.tree)
                            )));
                        }
                        Ok(None)
                    }
                    (ScopeKind::Compound, ScopeKind::Compound) => {
                        let kind_of = |id: ScopeId| self.tree.get(id).as_compound().map(|c| c.kind());
                        if kind_of(e) != kind_of(f) {
                            return Ok(Some("複合型の種類が一致しません".to_string()));
                        }
                        Ok(None)
                    }
                    (a, b) if a == b => Ok(None),
                    (a, b) => Ok(Some(format!("{} ではなく {} です", a, b))),
                }
            }
            (MemberHit::Functions(_), MemberHit::Scope(f)) => Ok(Some(format!("関数ではなく {} です", self.tree.kind(*f)))),
            (MemberHit::Scope(e), MemberHit::Functions(_)) => Ok(Some(format!("{} ではなく関数です", self.tree.kind(*e)))),
        }
    }
}
