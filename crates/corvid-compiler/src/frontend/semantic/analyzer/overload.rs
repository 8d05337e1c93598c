//! 関数シグネチャとオーバーロード解決
//!
//! ## 宣言の曖昧性
//!
//! 同じ集合の2つの関数 F と G は、互いに相手の「最小呼び出し」を
//! 受け付けるとき曖昧です。最小呼び出しは必須の位置専用・兼用パラメータを
//! 位置引数で、必須のキーワード専用パラメータをキーワード引数で渡すだけの
//! 呼び出しです。型は null許容性を無視した緩い等価性で比較します。
//! 派生型の関数は、継承した同名でシグネチャの異なる関数とも同じ規則で比較します。
//!
//! ## 呼び出しの選択
//!
//! 実引数を束縛できた候補に優先度を付け、最も高いものを選びます。
//!
//! | 優先度 | 条件 |
//! |---|---|
//! | 4 | すべての引数の型が完全一致 |
//! | 3 | 暗黙の変換や部分型を経由した |
//! | 2 | デフォルト値を使った |
//! | 1 | 可変長パラメータに引数を渡した |
//!
//! 最高の優先度の候補が複数あれば呼び出しは曖昧です。

use std::path::PathBuf;

use log::trace;

use crate::frontend::ast::{Argument, CompoundKind, Expression, ExpressionKind, Identifier, ModifierKind};
use crate::frontend::error::{CompilerError, Diagnostic, ErrorCollector, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::pairwise::{check_pairs, CheckStrategy};
use crate::frontend::semantic::scope::{Eval, ScopeId, ScopeKind};
use crate::frontend::semantic::types::{render_params, ExprInfo, FunctionType, ParamInfo, TypeInfo};

use super::Analyzer;

/// 評価済みの実引数
#[derive(Debug, Clone)]
pub(super) struct CallArg {
    /// キーワード引数の名前
    pub name: Option<Identifier>,
    /// 値
    pub info: ExprInfo,
}

/// 曖昧性検査の対象
struct Candidate {
    ty: FunctionType,
    display: String,
    location: Option<SourceLocation>,
    file: Option<PathBuf>,
}

/// 最小呼び出し
struct MinimalCall<'a> {
    positional: Vec<&'a TypeInfo>,
    keywords: Vec<(&'a str, &'a TypeInfo)>,
}

fn minimal_call(ty: &FunctionType) -> MinimalCall<'_> {
    MinimalCall {
        positional: ty
            .positional
            .iter()
            .chain(ty.regular.iter())
            .filter(|p| !p.is_optional())
            .map(|p| &p.ty)
            .collect(),
        keywords: ty
            .keyword
            .iter()
            .filter(|p| !p.is_optional())
            .map(|p| (p.name.as_str(), &p.ty))
            .collect(),
    }
}

/// `ty` が最小呼び出し `call` を受け付けるか
fn accepts(ty: &FunctionType, call: &MinimalCall<'_>) -> bool {
    let ordered: Vec<&ParamInfo> = ty.positional.iter().chain(ty.regular.iter()).collect();
    let mut bound = vec![false; ordered.len() + ty.keyword.len()];

    let mut index = 0;
    for arg in &call.positional {
        let Some(param) = ordered.get(index) else {
            return false;
        };
        if !param.ty.weak_equals(arg) {
            return false;
        }
        bound[index] = true;
        if !param.is_variadic {
            index += 1;
        }
    }

    for (name, arg) in &call.keywords {
        let regular = (ty.positional.len()..ordered.len()).find(|&i| ordered[i].name == *name && !bound[i]);
        let keyword = ty
            .keyword
            .iter()
            .position(|p| !p.is_variadic && p.name == *name)
            .map(|i| ordered.len() + i)
            .filter(|&i| !bound[i]);
        match regular.or(keyword) {
            Some(i) => {
                let param = if i < ordered.len() { ordered[i] } else { &ty.keyword[i - ordered.len()] };
                if !param.ty.weak_equals(arg) {
                    return false;
                }
                bound[i] = true;
            }
            None => match ty.keyword.iter().find(|p| p.is_variadic) {
                Some(rest) if rest.ty.weak_equals(arg) => {}
                _ => return false,
            },
        }
    }

    ordered
        .iter()
        .copied()
        .chain(ty.keyword.iter())
        .zip(&bound)
        .all(|(param, &bound)| bound || param.is_optional())
}

fn ambiguous_declaration(a: &Candidate, b: &Candidate) -> Option<CompilerError> {
    if !(accepts(&b.ty, &minimal_call(&a.ty)) && accepts(&a.ty, &minimal_call(&b.ty))) {
        return None;
    }
    let mut error = CompilerError::new(
        ErrorKind::AmbiguousDeclaration,
        format!("'{}' と '{}' の宣言は曖昧です", a.display, b.display),
        b.location,
    )
    .with_diagnostic(Diagnostic::note("もう一方の宣言はここです", a.location).with_file_path(a.file.as_deref()));
    if let Some(file) = &b.file {
        error = error.with_file_path(file);
    }
    Some(error)
}

impl Analyzer<'_> {
    /// 関数のシグネチャを評価
    ///
    /// 解決できなかった型は `any?` に置き換えて記録するため、
    /// シグネチャのエラーは一度だけ報告されます。
    pub(super) fn eval_proto(&mut self, function: ScopeId) -> Result<FunctionType> {
        let data = self
            .tree
            .get(function)
            .as_function()
            .ok_or_else(|| CompilerError::internal(format!("{} は関数ではありません", function)))?;
        match data.proto_eval {
            Eval::Done => {
                return data
                    .ty
                    .clone()
                    .ok_or_else(|| CompilerError::internal("シグネチャが記録されていません").into());
            }
            Eval::InProgress => {
                return Err(CompilerError::new(
                    ErrorKind::TypeInference,
                    format!("関数 '{}' のシグネチャが自身に依存しています", self.tree.get(function).name),
                    self.tree.get(function).location,
                )
                .into());
            }
            Eval::NotStarted => {}
        }

        self.set_proto_eval(function, Eval::InProgress);
        let mut errors = ErrorCollector::new();
        let result = self.in_scope(function, |this| this.eval_proto_inner(function));
        let ty = match result {
            Ok((ty, group)) => {
                if let Err(group) = self.tag(function, group.finish()) {
                    errors.extend(group);
                }
                ty
            }
            Err(group) => {
                self.set_proto_eval(function, Eval::Done);
                return Err(group);
            }
        };

        let params = self
            .tree
            .get(function)
            .as_function()
            .map(|f| f.params.clone())
            .unwrap_or_default();
        for (param, info) in params.into_iter().zip(ty.params()) {
            if let Some(data) = self.tree.get_mut(param).as_variable_mut() {
                data.ty = Some(info.ty.clone());
                data.eval = Eval::Done;
                data.assigned += 1;
            }
        }
        if let Some(data) = self.tree.get_mut(function).as_function_mut() {
            data.ty = Some(ty.clone());
            data.proto_eval = Eval::Done;
        }
        errors.finish()?;
        Ok(ty)
    }

    fn set_proto_eval(&mut self, function: ScopeId, eval: Eval) {
        if let Some(data) = self.tree.get_mut(function).as_function_mut() {
            data.proto_eval = eval;
        }
    }

    fn eval_proto_inner(&mut self, function: ScopeId) -> Result<(FunctionType, ErrorCollector)> {
        let decl = self.function_decl(function)?;
        let mut errors = ErrorCollector::new();
        let fallback = self.builtin_type(|b| b.any, true)?;

        let lists = [&decl.params.positional, &decl.params.regular, &decl.params.keyword];
        let mut converted: [Vec<ParamInfo>; 3] = Default::default();
        for (index, list) in lists.into_iter().enumerate() {
            for param in list.iter() {
                let ty = errors.absorb(self.resolve_type(&param.ty)).unwrap_or_else(|| fallback.clone());
                if let Some(default) = &param.default {
                    if let Some(info) = errors.absorb(self.visit_expr(default)) {
                        errors.absorb(self.check_assign(&ty, &info, default.location));
                    }
                }
                converted[index].push(ParamInfo {
                    name: param.name.name.clone(),
                    ty,
                    is_const: param.is_const,
                    is_variadic: param.is_variadic,
                    is_default: param.default.is_some(),
                    is_keyword_only: index == 2,
                });
            }
        }

        let ret = match (&decl.return_type, decl.is_constructor) {
            (Some(ty), false) => errors.absorb(self.resolve_type(ty)).unwrap_or(fallback),
            _ => self.builtin_type(|b| b.void, false)?,
        };
        let [positional, regular, keyword] = converted;
        let ty = FunctionType {
            ret: Box::new(ret),
            positional,
            regular,
            keyword,
            nullable: false,
        };
        Ok((ty, errors))
    }

    /// オーバーロード集合の宣言の曖昧性を検査（集合ごとに一度だけ）
    ///
    /// 検査の後、集合のキーと関数の修飾名を解決済みのシグネチャで付け直します。
    pub(super) fn check_funs(&mut self, set: ScopeId) -> Result<()> {
        match self.tree.get_mut(set).as_function_set_mut() {
            Some(data) if !data.checked => data.checked = true,
            _ => return Ok(()),
        }
        let name = self.tree.get(set).name.clone();
        let mut errors = ErrorCollector::new();
        let mut candidates: Vec<(ScopeId, Candidate)> = Vec::new();
        for function in self.set_functions(set) {
            if let Err(group) = self.eval_proto(function) {
                errors.extend(group);
            }
            let Some(ty) = self.tree.get(function).as_function().and_then(|f| f.ty.clone()) else {
                continue;
            };
            candidates.push((function, self.candidate(&name, function, ty)));
        }

        let strategy = CheckStrategy::for_size(candidates.len(), self.options.parallel_threshold);
        trace!("曖昧性検査: {} ({}件, {:?})", name, candidates.len(), strategy);
        for error in check_pairs(&candidates, strategy, |(_, a), (_, b)| ambiguous_declaration(a, b)) {
            errors.push(error);
        }

        let base = self.tree.get(set).path.clone();
        for (function, candidate) in &candidates {
            let signature = format!("({})", render_params(&candidate.ty, &self.tree));
            self.tree.get_mut(*function).path = base.clone() + signature.as_str();
            if let Some(data) = self.tree.get_mut(set).as_function_set_mut() {
                if let Some(entry) = data.functions.iter_mut().find(|(_, f)| f == function) {
                    entry.0 = signature;
                }
            }
        }
        errors.finish()
    }

    /// 自身の関数と、継承した同名の関数との宣言の曖昧性を検査
    ///
    /// 同じシグネチャの組はオーバーライドとして扱うため対象外です。
    /// エラーは自身の関数の位置に、注記は継承した関数の位置に付きます。
    pub(super) fn check_inherited_funs(
        &self,
        name: &str,
        own: &[(ScopeId, FunctionType)],
        inherited: &[(ScopeId, FunctionType)],
    ) -> Vec<CompilerError> {
        let mut candidates: Vec<(bool, Candidate)> = inherited
            .iter()
            .filter(|(_, ty)| !own.iter().any(|(_, o)| o.same_signature(ty)))
            .map(|(id, ty)| (false, self.candidate(name, *id, ty.clone())))
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }
        candidates.extend(own.iter().map(|(id, ty)| (true, self.candidate(name, *id, ty.clone()))));

        let strategy = CheckStrategy::for_size(candidates.len(), self.options.parallel_threshold);
        trace!("継承した関数との曖昧性検査: {} ({}件, {:?})", name, candidates.len(), strategy);
        check_pairs(&candidates, strategy, |(a_own, a), (b_own, b)| {
            if a_own == b_own {
                None
            } else {
                ambiguous_declaration(a, b)
            }
        })
    }

    fn candidate(&self, name: &str, function: ScopeId, ty: FunctionType) -> Candidate {
        Candidate {
            display: format!("{}({})", name, render_params(&ty, &self.tree)),
            ty,
            location: self.tree.get(function).location,
            file: self.file_of(function),
        }
    }

    /// 実引数を評価（キーワード引数の後に位置引数は置けない）
    pub(super) fn visit_args(&mut self, args: &[Argument]) -> Result<Vec<CallArg>> {
        let mut result: Vec<CallArg> = Vec::with_capacity(args.len());
        for arg in args {
            match &arg.name {
                None if result.iter().any(|a| a.name.is_some()) => {
                    return Err(CompilerError::syntax_error(
                        "キーワード引数の後に位置引数は置けません",
                        Some(arg.value.location),
                    )
                    .into());
                }
                Some(name) if result.iter().any(|a| a.name.as_ref().map(|n| &n.name) == Some(&name.name)) => {
                    return Err(CompilerError::syntax_error(
                        format!("キーワード引数 '{}' が重複しています", name.name),
                        Some(name.location),
                    )
                    .into());
                }
                _ => {}
            }
            let info = self.visit_expr(&arg.value)?;
            result.push(CallArg {
                name: arg.name.clone(),
                info,
            });
        }
        Ok(result)
    }

    /// 実引数をシグネチャに束縛して優先度を返す（束縛できなければ理由）
    pub(super) fn bind_args(&mut self, ty: &FunctionType, args: &[CallArg]) -> Result<std::result::Result<u8, Vec<String>>> {
        let ordered: Vec<&ParamInfo> = ty.positional.iter().chain(ty.regular.iter()).collect();
        let all: Vec<&ParamInfo> = ordered.iter().copied().chain(ty.keyword.iter()).collect();
        let mut bound = vec![false; all.len()];
        let mut reasons = Vec::new();
        let mut exact = true;
        let mut used_variadic = false;

        let mut index = 0;
        for arg in args.iter().filter(|a| a.name.is_none()) {
            let Some(param) = ordered.get(index) else {
                reasons.push(format!("位置引数が多すぎます（最大 {} 個）", ordered.len()));
                break;
            };
            match self.assignable(&param.ty, &arg.info)? {
                Ok(is_exact) => exact &= is_exact,
                Err(reason) => reasons.push(format!("引数 '{}': {}", param.name, reason)),
            }
            bound[index] = true;
            if param.is_variadic {
                used_variadic = true;
            } else {
                index += 1;
            }
        }

        for arg in args.iter().filter(|a| a.name.is_some()) {
            let Some(name) = arg.name.as_ref().map(|n| n.name.as_str()) else {
                continue;
            };
            if ty.positional.iter().any(|p| p.name == name) {
                reasons.push(format!("位置専用パラメータ '{}' はキーワードで渡せません", name));
                continue;
            }
            let slot = (ty.positional.len()..all.len()).find(|&i| all[i].name == name && !all[i].is_variadic);
            let param = match slot {
                Some(i) if bound[i] => {
                    reasons.push(format!("パラメータ '{}' に値が複数回渡されています", name));
                    continue;
                }
                Some(i) => {
                    bound[i] = true;
                    all[i]
                }
                None => match ty.keyword.iter().find(|p| p.is_variadic) {
                    Some(rest) => {
                        used_variadic = true;
                        rest
                    }
                    None => {
                        reasons.push(format!("'{}' という名前のパラメータはありません", name));
                        continue;
                    }
                },
            };
            match self.assignable(&param.ty, &arg.info)? {
                Ok(is_exact) => exact &= is_exact,
                Err(reason) => reasons.push(format!("引数 '{}': {}", name, reason)),
            }
        }

        let mut used_default = false;
        for (param, bound) in all.iter().zip(&bound) {
            if *bound || param.is_variadic {
                continue;
            }
            if param.is_default {
                used_default = true;
            } else {
                reasons.push(format!("引数 '{}' がありません", param.name));
            }
        }

        if !reasons.is_empty() {
            return Ok(Err(reasons));
        }
        let priority = if used_variadic {
            1
        } else if used_default {
            2
        } else if !exact {
            3
        } else {
            4
        };
        Ok(Ok(priority))
    }

    /// 候補から呼び出す関数を選ぶ
    pub(super) fn select_overload(
        &mut self,
        functions: &[ScopeId],
        args: &[CallArg],
        name: &str,
        location: SourceLocation,
    ) -> Result<ScopeId> {
        let mut viable: Vec<(ScopeId, u8)> = Vec::new();
        let mut rejected: Vec<Diagnostic> = Vec::new();
        for &function in functions {
            if let Some(set) = self.tree.function_set_of(function) {
                let checked = self.check_funs(set);
                self.tag(set, checked)?;
            }
            let ty = self.eval_proto(function)?;
            match self.bind_args(&ty, args)? {
                Ok(priority) => viable.push((function, priority)),
                Err(reasons) => rejected.push(self.candidate_note(function, &ty, Some(reasons.join("、")))),
            }
        }

        let Some(best) = viable.iter().map(|&(_, p)| p).max() else {
            let mut error = CompilerError::new(
                ErrorKind::NoMatchingOverload,
                format!("'{}' の呼び出しに一致する関数がありません", name),
                Some(location),
            );
            for note in rejected {
                error.add_diagnostic(note);
            }
            return Err(error.into());
        };
        let top: Vec<ScopeId> = viable.iter().filter(|&&(_, p)| p == best).map(|&(f, _)| f).collect();
        if let [chosen] = top.as_slice() {
            trace!("'{}' の呼び出しを解決: {}", name, self.tree.qualified_name(*chosen));
            return Ok(*chosen);
        }

        let mut error = CompilerError::new(
            ErrorKind::AmbiguousOverload,
            format!("'{}' の呼び出しは曖昧です", name),
            Some(location),
        );
        for function in top {
            let ty = self.eval_proto(function)?;
            error.add_diagnostic(self.candidate_note(function, &ty, None));
        }
        Err(error.into())
    }

    fn candidate_note(&self, function: ScopeId, ty: &FunctionType, reason: Option<String>) -> Diagnostic {
        let scope = self.tree.get(function);
        let mut message = format!("候補: {}({})", scope.name, render_params(ty, &self.tree));
        if let Some(reason) = reason {
            message.push_str(" - ");
            message.push_str(&reason);
        }
        Diagnostic::note(message, scope.location).with_file_path(self.file_of(function).as_deref())
    }

    /// 呼び出し式の選択結果を記録
    pub(super) fn bind_call(&mut self, expr: &Expression, function: ScopeId) {
        if let Some(module) = self.tree.enclosing_module(self.current) {
            self.call_bindings.insert((module, expr.id), function);
        }
        self.tree.get_mut(function).usage += 1;
    }

    /// 呼び出し式
    pub(super) fn resolve_call(&mut self, expr: &Expression, callee: &Expression, args: &[Argument]) -> Result<ExprInfo> {
        if matches!(callee.kind, ExpressionKind::This | ExpressionKind::Super) {
            return self.resolve_delegation(expr, callee, args);
        }
        let callee_info = self.visit_expr(callee)?;
        let args = self.visit_args(args)?;
        let name = callee_name(callee);

        match callee_info {
            ExprInfo::FunctionSet(info) => {
                let chosen = self.select_overload(&info.functions, &args, &name, expr.location)?;
                self.bind_call(expr, chosen);
                let ret = *self.eval_proto(chosen)?.ret;
                Ok(ExprInfo::value(if info.nullable_result { ret.with_nullable(true) } else { ret }))
            }
            ExprInfo::Static(ty) => self.construct(expr, &ty, &args, &name),
            ExprInfo::Normal {
                ty: TypeInfo::Function(function),
                ..
            } => {
                if function.nullable {
                    return Err(CompilerError::new(
                        ErrorKind::TypeMismatch,
                        format!("null許容の関数値 '{}' は直接呼び出せません", name),
                        Some(callee.location),
                    )
                    .into());
                }
                match self.bind_args(&function, &args)? {
                    Ok(_) => Ok(ExprInfo::value(*function.ret)),
                    Err(reasons) => {
                        let mut error = CompilerError::new(
                            ErrorKind::NoMatchingOverload,
                            format!(
                                "呼び出しが関数型 '{}' と一致しません",
                                TypeInfo::Function(function).render(&self.tree)
                            ),
                            Some(expr.location),
                        );
                        for reason in reasons {
                            error.add_diagnostic(Diagnostic::help(reason));
                        }
                        Err(error.into())
                    }
                }
            }
            other => Err(CompilerError::new(
                ErrorKind::TypeMismatch,
                format!("{} '{}' は呼び出せません", other.describe(), name),
                Some(callee.location),
            )
            .into()),
        }
    }

    /// インスタンス生成 `C(...)`
    fn construct(&mut self, expr: &Expression, ty: &TypeInfo, args: &[CallArg], name: &str) -> Result<ExprInfo> {
        let Some(compound) = ty.compound() else {
            return Err(CompilerError::new(ErrorKind::TypeMismatch, "型リテラルはインスタンス化できません", Some(expr.location)).into());
        };
        self.eval_compound(compound)?;
        let scope = self.tree.get(compound);
        let instantiable = scope
            .as_compound()
            .map(|c| c.kind() == CompoundKind::Class)
            .unwrap_or(false)
            && !scope.has_modifier(ModifierKind::Abstract);
        if !instantiable {
            let kind = scope.as_compound().map(|c| c.kind().to_string()).unwrap_or_default();
            let qualifier = if scope.has_modifier(ModifierKind::Abstract) { "抽象" } else { "" };
            return Err(CompilerError::new(
                ErrorKind::TypeMismatch,
                format!("{}{} '{}' はインスタンス化できません", qualifier, kind, scope.name),
                Some(expr.location),
            )
            .into());
        }

        self.call_constructor(expr, compound, args, name)?;
        Ok(ExprInfo::value(ty.with_nullable(false)))
    }

    fn call_constructor(&mut self, expr: &Expression, compound: ScopeId, args: &[CallArg], name: &str) -> Result<()> {
        let set = self
            .tree
            .member(compound, "constructor")
            .filter(|&s| self.tree.kind(s) == ScopeKind::FunctionSet);
        match set {
            Some(set) => {
                let constructors = self.set_functions(set);
                let accessible: Vec<ScopeId> = constructors.iter().copied().filter(|&f| self.can_access(f)).collect();
                if accessible.is_empty() {
                    if let Some(&first) = constructors.first() {
                        self.check_access(first, expr.location)?;
                    }
                }
                let chosen = self.select_overload(&accessible, args, name, expr.location)?;
                self.bind_call(expr, chosen);
                Ok(())
            }
            None if args.is_empty() => Ok(()),
            None => Err(CompilerError::new(
                ErrorKind::NoMatchingOverload,
                format!("'{}' のコンストラクタは引数を取りません", self.tree.get(compound).name),
                Some(expr.location),
            )
            .into()),
        }
    }

    /// コンストラクタ内の `this(...)` / `super(...)`
    fn resolve_delegation(&mut self, expr: &Expression, callee: &Expression, args: &[Argument]) -> Result<ExprInfo> {
        let keyword = if matches!(callee.kind, ExpressionKind::This) { "this" } else { "super" };
        if !self.flow.as_ref().map(|f| f.is_constructor).unwrap_or(false) {
            return Err(CompilerError::syntax_error(
                format!("'{}(...)' はコンストラクタの中でのみ呼び出せます", keyword),
                Some(callee.location),
            )
            .into());
        }
        let class = self
            .tree
            .enclosing_compound(self.current)
            .ok_or_else(|| CompilerError::internal("コンストラクタが複合型の外にあります"))?;
        let target = if keyword == "this" { class } else { self.class_super(class, callee.location)? };
        let args = self.visit_args(args)?;
        let name = self.tree.get(target).name.clone();
        self.call_constructor(expr, target, &args, &name)?;
        self.builtin_type(|b| b.void, false).map(ExprInfo::value)
    }

    /// クラスの親クラス（なければエラー）
    pub(super) fn class_super(&mut self, class: ScopeId, location: SourceLocation) -> Result<ScopeId> {
        self.eval_compound(class)?;
        let supers = self.tree.supers(class).to_vec();
        supers
            .into_iter()
            .find(|&s| {
                self.tree
                    .get(s)
                    .as_compound()
                    .map(|c| c.kind() == CompoundKind::Class)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                CompilerError::new(
                    ErrorKind::UnresolvedReference,
                    format!("'{}' には親クラスがありません", self.tree.get(class).name),
                    Some(location),
                )
                .into()
            })
    }
}

/// 診断用の呼び出し先の名前
fn callee_name(callee: &Expression) -> String {
    match &callee.kind {
        ExpressionKind::Identifier(ident) => ident.name.clone(),
        ExpressionKind::Member { name, .. } => name.name.clone(),
        ExpressionKind::This => "this".to_string(),
        ExpressionKind::Super => "super".to_string(),
        _ => "式".to_string(),
    }
}
