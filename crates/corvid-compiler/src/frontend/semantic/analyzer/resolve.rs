//! 名前解決
//!
//! 修飾されていない名前は現在のスコープから外側へ向かって探します。
//!
//! 1. 各祖先スコープのメンバー（関数ならパラメータも）
//! 2. 最も内側の複合型が継承したフィールドと関数
//! 3. モジュールのトップレベル宣言
//! 4. 修飾インポート、続いてオープンインポート
//! 5. 基本モジュール
//!
//! 最初に見つかったものが採用されます。

use std::sync::Arc;

use log::trace;

use crate::frontend::ast::{FunctionDecl, FunctionTypeParam, Identifier, TypeExpr};
use crate::frontend::error::{CompilerError, Diagnostic, ErrorGroup, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::scope::{ScopeId, ScopeKind};
use crate::frontend::semantic::suggest::similar_names;
use crate::frontend::semantic::types::{ExprInfo, FunctionInfo, FunctionType, ParamInfo, TypeInfo, ValueInfo};

use super::Analyzer;

/// 名前が参照される目的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Access {
    Read,
    Write,
    ReadWrite,
}

/// 複合型のメンバー検索の結果
#[derive(Debug, Clone)]
pub(super) enum MemberHit {
    /// 単一の宣言
    Scope(ScopeId),
    /// 関数の候補（自身の宣言と継承したもの）
    Functions(Vec<ScopeId>),
}

impl Analyzer<'_> {
    /// 修飾されていない名前を解決
    pub(super) fn resolve_name(&mut self, ident: &Identifier, access: Access) -> Result<ExprInfo> {
        let name = ident.name.as_str();
        trace!("名前を解決: {} ({:?})", name, access);
        let module = self
            .tree
            .enclosing_module(self.current)
            .ok_or_else(|| CompilerError::internal("モジュール外で名前を解決しようとしました"))?;

        let chain: Vec<ScopeId> = self.tree.ancestors(self.current).collect();
        let mut seen_compound = false;
        for scope in chain {
            let kind = self.tree.kind(scope);
            if kind == ScopeKind::Module {
                break;
            }
            if kind == ScopeKind::Compound {
                self.eval_compound(scope)?;
            }

            if let Some(found) = self.tree.member(scope, name) {
                let hit = if self.tree.kind(found) == ScopeKind::FunctionSet {
                    if kind == ScopeKind::Compound {
                        MemberHit::Functions(self.compound_functions(scope, name)?)
                    } else {
                        MemberHit::Functions(self.set_functions(found))
                    }
                } else {
                    MemberHit::Scope(found)
                };
                return self.use_hit(hit, ident, access, kind == ScopeKind::Compound);
            }

            if matches!(kind, ScopeKind::Function | ScopeKind::Lambda) {
                let params = self
                    .tree
                    .get(scope)
                    .as_function()
                    .map(|f| f.params.clone())
                    .unwrap_or_default();
                if let Some(param) = params.into_iter().find(|&p| self.tree.get(p).name == name) {
                    return self.use_hit(MemberHit::Scope(param), ident, access, false);
                }
            }

            if kind == ScopeKind::Compound {
                if !seen_compound {
                    if let Some(hit) = self.inherited_member(scope, name) {
                        return self.use_hit(hit, ident, access, true);
                    }
                }
                seen_compound = true;
                let is_type_param = self
                    .tree
                    .get(scope)
                    .as_compound()
                    .map(|c| c.decl.type_params.iter().any(|p| p.name == name))
                    .unwrap_or(false);
                if is_type_param {
                    return Ok(ExprInfo::Static(self.builtin_type(|b| b.any, true)?));
                }
            }
        }

        if let Some(found) = self.tree.member(module, name) {
            let hit = match self.tree.kind(found) {
                ScopeKind::FunctionSet => MemberHit::Functions(self.set_functions(found)),
                _ => MemberHit::Scope(found),
            };
            return self.use_hit(hit, ident, access, false);
        }

        if let Some(info) = self.resolve_import(module, ident, access)? {
            return Ok(info);
        }

        if let Some(basic) = self.basic.filter(|&b| b != module) {
            if let Some(found) = self.tree.member(basic, name) {
                let hit = match self.tree.kind(found) {
                    ScopeKind::FunctionSet => MemberHit::Functions(self.set_functions(found)),
                    _ => MemberHit::Scope(found),
                };
                return self.use_hit(hit, ident, access, false);
            }
        }

        let candidates = self.visible_names(module);
        Err(unresolved(
            format!("'{}' は定義されていません", name),
            name,
            ident.location,
            candidates.iter().map(String::as_str),
        ))
    }

    /// インポートを経由した名前解決
    fn resolve_import(&mut self, module: ScopeId, ident: &Identifier, access: Access) -> Result<Option<ExprInfo>> {
        let name = ident.name.as_str();
        let imports: Vec<(usize, Option<String>, Option<ScopeId>)> = match self.tree.get(module).as_module() {
            Some(data) => data
                .imports
                .iter()
                .enumerate()
                .map(|(i, entry)| (i, entry.decl.binding_name().map(str::to_string), entry.target))
                .collect(),
            None => return Ok(None),
        };

        for (index, binding, target) in &imports {
            if binding.as_deref() != Some(name) {
                continue;
            }
            self.mark_import_used(module, *index);
            return match target {
                Some(target) => Ok(Some(ExprInfo::Module(*target))),
                None => Err(CompilerError::new(
                    ErrorKind::UnresolvedImport,
                    format!("インポート '{}' は解決されていません", name),
                    Some(ident.location),
                )
                .into()),
            };
        }

        for (index, binding, target) in imports {
            let (None, Some(target)) = (binding, target) else {
                continue;
            };
            let found = match self.tree.kind(target) {
                ScopeKind::FolderModule => self.modules.folder_entry(&mut self.tree, target, name)?,
                _ => self.tree.member(target, name),
            };
            if let Some(found) = found {
                self.mark_import_used(module, index);
                let hit = match self.tree.kind(found) {
                    ScopeKind::FunctionSet => MemberHit::Functions(self.set_functions(found)),
                    _ => MemberHit::Scope(found),
                };
                return self.use_hit(hit, ident, access, false).map(Some);
            }
        }
        Ok(None)
    }

    fn mark_import_used(&mut self, module: ScopeId, index: usize) {
        if let Some(data) = self.tree.get_mut(module).as_module_mut() {
            data.imports[index].is_used = true;
        }
    }

    /// 式の値に対するメンバーアクセス `object.name`
    pub(super) fn resolve_member(
        &mut self,
        object: ExprInfo,
        ident: &Identifier,
        safe: bool,
        access: Access,
    ) -> Result<ExprInfo> {
        let name = ident.name.as_str();
        match object {
            ExprInfo::Module(module) => {
                let found = match self.tree.kind(module) {
                    ScopeKind::FolderModule => self.modules.folder_entry(&mut self.tree, module, name)?,
                    _ => self.tree.member(module, name),
                };
                let Some(found) = found else {
                    let names: Vec<String> = self.tree.get(module).members().map(|(n, _)| n.to_string()).collect();
                    return Err(unresolved(
                        format!("モジュール '{}' に '{}' はありません", self.tree.get(module).name, name),
                        name,
                        ident.location,
                        names.iter().map(String::as_str),
                    ));
                };
                let hit = match self.tree.kind(found) {
                    ScopeKind::FunctionSet => MemberHit::Functions(self.set_functions(found)),
                    _ => MemberHit::Scope(found),
                };
                self.use_hit(hit, ident, access, false)
            }
            ExprInfo::Static(ty) => {
                let Some(compound) = ty.compound() else {
                    return Err(type_error("型リテラルにはメンバーがありません", ident.location));
                };
                self.eval_compound(compound)?;
                match self.instance_member_hit(compound, name)? {
                    Some(MemberHit::Scope(found)) => {
                        self.check_access(found, ident.location)?;
                        if self.is_instance_member(found) {
                            return Err(static_reference(name, ident.location));
                        }
                        self.symbol_info(found, access)
                    }
                    Some(MemberHit::Functions(functions)) => {
                        let functions = self.accessible_functions(functions, ident.location)?;
                        let functions: Vec<ScopeId> =
                            functions.into_iter().filter(|&f| !self.is_instance_member(f)).collect();
                        if functions.is_empty() {
                            return Err(static_reference(name, ident.location));
                        }
                        Ok(ExprInfo::FunctionSet(FunctionInfo {
                            functions,
                            receiver: None,
                            nullable_result: false,
                        }))
                    }
                    None => Err(self.missing_member(compound, &ty, ident)),
                }
            }
            ExprInfo::Normal { ty, value } => {
                if ty.is_nullable() && !safe {
                    return Err(type_error(
                        format!(
                            "null許容型 '{}' のメンバー '{}' には '?.' でアクセスしてください",
                            ty.render(&self.tree),
                            name
                        ),
                        ident.location,
                    ));
                }
                if safe && value.is_null {
                    self.warn(CompilerError::warning(
                        ErrorKind::TypeMismatch,
                        "null に対する '?.' は常に null になります",
                        Some(ident.location),
                    ));
                }
                let Some(compound) = ty.compound() else {
                    return Err(type_error(
                        format!("'{}' 型の値にはメンバーがありません", ty.render(&self.tree)),
                        ident.location,
                    ));
                };
                self.eval_compound(compound)?;
                match self.instance_member_hit(compound, name)? {
                    Some(MemberHit::Scope(found)) => {
                        self.check_access(found, ident.location)?;
                        let info = self.symbol_info(found, access)?;
                        Ok(match info {
                            ExprInfo::Normal { ty, value } if safe => ExprInfo::Normal {
                                ty: ty.with_nullable(true),
                                value: ValueInfo {
                                    is_lvalue: false,
                                    ..value
                                },
                            },
                            other => other,
                        })
                    }
                    Some(MemberHit::Functions(functions)) => {
                        let functions = self.accessible_functions(functions, ident.location)?;
                        Ok(ExprInfo::FunctionSet(FunctionInfo {
                            functions,
                            receiver: Some(ty.with_nullable(false)),
                            nullable_result: safe,
                        }))
                    }
                    None => Err(self.missing_member(compound, &ty, ident)),
                }
            }
            ExprInfo::FunctionSet(_) => Err(type_error(
                format!("関数にはメンバー '{}' がありません", name),
                ident.location,
            )),
        }
    }

    /// 見つかった宣言を式の情報に変換（アクセス制御と静的文脈の検査を含む）
    fn use_hit(&mut self, hit: MemberHit, ident: &Identifier, access: Access, via_compound: bool) -> Result<ExprInfo> {
        match hit {
            MemberHit::Scope(found) => {
                self.check_access(found, ident.location)?;
                if via_compound && self.is_instance_member(found) && self.is_static_context(self.current) {
                    return Err(static_context(&ident.name, ident.location));
                }
                self.symbol_info(found, access)
            }
            MemberHit::Functions(functions) => {
                let mut functions = self.accessible_functions(functions, ident.location)?;
                if via_compound && self.is_static_context(self.current) {
                    functions.retain(|&f| !self.is_instance_member(f));
                    if functions.is_empty() {
                        return Err(static_context(&ident.name, ident.location));
                    }
                }
                Ok(ExprInfo::FunctionSet(FunctionInfo {
                    functions,
                    receiver: None,
                    nullable_result: false,
                }))
            }
        }
    }

    /// アクセス可能な関数だけを残す（1つもなければ最初の候補のアクセスエラー）
    fn accessible_functions(&self, functions: Vec<ScopeId>, location: SourceLocation) -> Result<Vec<ScopeId>> {
        let first = functions.first().copied();
        let accessible: Vec<ScopeId> = functions.into_iter().filter(|&f| self.can_access(f)).collect();
        match (accessible.is_empty(), first) {
            (true, Some(first)) => {
                self.check_access(first, location)?;
                Ok(accessible)
            }
            _ => Ok(accessible),
        }
    }

    /// 宣言の種類ごとの式情報
    pub(super) fn symbol_info(&mut self, found: ScopeId, access: Access) -> Result<ExprInfo> {
        match self.tree.kind(found) {
            ScopeKind::Module | ScopeKind::FolderModule => Ok(ExprInfo::Module(found)),
            ScopeKind::Compound => {
                self.tree.get_mut(found).usage += 1;
                Ok(ExprInfo::Static(TypeInfo::basic(found, false)))
            }
            ScopeKind::Variable => {
                let ty = self.eval_variable(found)?;
                let scope = self.tree.get_mut(found);
                scope.usage += 1;
                let is_const = match scope.as_variable_mut() {
                    Some(data) => {
                        match access {
                            Access::Read => data.accessed += 1,
                            Access::Write => data.assigned += 1,
                            Access::ReadWrite => {
                                data.accessed += 1;
                                data.assigned += 1;
                            }
                        }
                        data.is_const
                    }
                    None => false,
                };
                Ok(ExprInfo::Normal {
                    ty,
                    value: ValueInfo {
                        is_lvalue: !is_const,
                        is_const,
                        declaration: Some(found),
                        ..ValueInfo::default()
                    },
                })
            }
            ScopeKind::Enumerator => {
                let owner = self
                    .tree
                    .parent(found)
                    .ok_or_else(|| CompilerError::internal("列挙子の親がありません"))?;
                Ok(ExprInfo::Normal {
                    ty: TypeInfo::basic(owner, false),
                    value: ValueInfo {
                        is_const: true,
                        declaration: Some(found),
                        ..ValueInfo::default()
                    },
                })
            }
            ScopeKind::FunctionSet => Ok(ExprInfo::FunctionSet(FunctionInfo {
                functions: self.set_functions(found),
                receiver: None,
                nullable_result: false,
            })),
            kind => Err(CompilerError::internal(format!("{} {} を名前で参照しました", kind, found)).into()),
        }
    }

    /// オーバーロード集合の関数（宣言順）
    pub(super) fn set_functions(&self, set: ScopeId) -> Vec<ScopeId> {
        self.tree
            .get(set)
            .as_function_set()
            .map(|data| data.functions.iter().map(|&(_, f)| f).collect())
            .unwrap_or_default()
    }

    /// 複合型の同名関数（自身の宣言と、オーバーライドされていない継承関数）
    pub(super) fn compound_functions(&mut self, compound: ScopeId, name: &str) -> Result<Vec<ScopeId>> {
        let own = self
            .tree
            .member(compound, name)
            .filter(|&m| self.tree.kind(m) == ScopeKind::FunctionSet)
            .map(|set| self.set_functions(set))
            .unwrap_or_default();
        if name == "constructor" {
            return Ok(own);
        }
        let inherited: Vec<ScopeId> = self
            .tree
            .get(compound)
            .as_compound()
            .map(|c| c.super_functions.iter().filter(|(n, _)| n == name).map(|&(_, f)| f).collect())
            .unwrap_or_default();

        let mut own_types = Vec::with_capacity(own.len());
        for &f in &own {
            own_types.push(self.eval_proto(f)?);
        }
        let mut functions = own;
        for f in inherited {
            let ty = self.eval_proto(f)?;
            if !own_types.iter().any(|t| t.same_signature(&ty)) && !functions.contains(&f) {
                functions.push(f);
            }
        }
        Ok(functions)
    }

    /// 継承したメンバーの検索
    pub(super) fn inherited_member(&self, compound: ScopeId, name: &str) -> Option<MemberHit> {
        let data = self.tree.get(compound).as_compound()?;
        if let Some(&field) = data.super_fields.iter().find(|&&f| self.tree.get(f).name == name) {
            return Some(MemberHit::Scope(field));
        }
        let functions: Vec<ScopeId> = data
            .super_functions
            .iter()
            .filter(|(n, _)| n == name)
            .map(|&(_, f)| f)
            .collect();
        (!functions.is_empty()).then_some(MemberHit::Functions(functions))
    }

    /// 複合型のメンバー（自身の宣言、なければ継承したもの）
    pub(super) fn instance_member_hit(&mut self, compound: ScopeId, name: &str) -> Result<Option<MemberHit>> {
        if let Some(found) = self.tree.member(compound, name) {
            if self.tree.kind(found) == ScopeKind::FunctionSet {
                return Ok(Some(MemberHit::Functions(self.compound_functions(compound, name)?)));
            }
            return Ok(Some(MemberHit::Scope(found)));
        }
        Ok(self.inherited_member(compound, name))
    }

    fn missing_member(&self, compound: ScopeId, ty: &TypeInfo, ident: &Identifier) -> ErrorGroup {
        let mut names: Vec<String> = self.tree.get(compound).members().map(|(n, _)| n.to_string()).collect();
        if let Some(data) = self.tree.get(compound).as_compound() {
            names.extend(data.super_fields.iter().map(|&f| self.tree.get(f).name.clone()));
            names.extend(data.super_functions.iter().map(|(n, _)| n.clone()));
        }
        unresolved(
            format!("型 '{}' にメンバー '{}' はありません", ty.render(&self.tree), ident.name),
            &ident.name,
            ident.location,
            names.iter().map(String::as_str),
        )
    }

    /// 現在のスコープから見えるすべての名前（候補の提示用）
    fn visible_names(&self, module: ScopeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut seen_compound = false;
        for scope in self.tree.ancestors(self.current) {
            let data = self.tree.get(scope);
            names.extend(data.members().map(|(n, _)| n.to_string()));
            if let Some(function) = data.as_function() {
                names.extend(function.params.iter().map(|&p| self.tree.get(p).name.clone()));
            }
            if let Some(compound) = data.as_compound() {
                if !seen_compound {
                    names.extend(compound.super_fields.iter().map(|&f| self.tree.get(f).name.clone()));
                    names.extend(compound.super_functions.iter().map(|(n, _)| n.clone()));
                }
                names.extend(compound.decl.type_params.iter().map(|p| p.name.clone()));
                seen_compound = true;
            }
            if scope == module {
                break;
            }
        }
        if let Some(data) = self.tree.get(module).as_module() {
            names.extend(data.imports.iter().filter_map(|i| i.decl.binding_name().map(str::to_string)));
            for target in data.imports.iter().filter(|i| i.decl.open).filter_map(|i| i.target) {
                names.extend(self.tree.get(target).members().map(|(n, _)| n.to_string()));
            }
        }
        if let Some(basic) = self.basic {
            names.extend(self.tree.get(basic).members().map(|(n, _)| n.to_string()));
        }
        names
    }

    /// 型式を解決
    pub(super) fn resolve_type(&mut self, expr: &TypeExpr) -> Result<TypeInfo> {
        match expr {
            TypeExpr::Named {
                path,
                args,
                nullable,
                location,
            } => {
                let (first, rest) = path
                    .split_first()
                    .ok_or_else(|| CompilerError::internal("空の型名"))?;
                let mut info = self.resolve_name(first, Access::Read)?;
                for segment in rest {
                    info = self.resolve_member(info, segment, false, Access::Read)?;
                }
                let ExprInfo::Static(TypeInfo::Basic(mut basic)) = info else {
                    return Err(type_error(format!("'{}' は型ではありません", expr), *location));
                };
                if !args.is_empty() {
                    if let Some(compound) = basic.compound {
                        let expected = self
                            .tree
                            .get(compound)
                            .as_compound()
                            .map(|c| c.decl.type_params.len())
                            .unwrap_or(0);
                        if expected != args.len() {
                            return Err(type_error(
                                format!(
                                    "型 '{}' は {} 個の型引数を取りますが {} 個指定されています",
                                    self.tree.get(compound).name,
                                    expected,
                                    args.len()
                                ),
                                *location,
                            ));
                        }
                    }
                    basic.args = args.iter().map(|a| self.resolve_type(a)).collect::<Result<_>>()?;
                }
                basic.nullable |= *nullable;
                Ok(TypeInfo::Basic(basic))
            }
            TypeExpr::Function {
                params,
                return_type,
                nullable,
                ..
            } => {
                let mut convert = |list: &[FunctionTypeParam], keyword: bool| {
                    list.iter()
                        .map(|p| {
                            Ok(ParamInfo {
                                name: p.name.as_ref().map(|n| n.name.clone()).unwrap_or_default(),
                                ty: self.resolve_type(&p.ty)?,
                                is_const: false,
                                is_variadic: p.is_variadic,
                                is_default: false,
                                is_keyword_only: keyword,
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                };
                let positional = convert(&params.positional, false)?;
                let regular = convert(&params.regular, false)?;
                let keyword = convert(&params.keyword, true)?;
                let ret = self.resolve_type(return_type)?;
                Ok(TypeInfo::Function(FunctionType {
                    ret: Box::new(ret),
                    positional,
                    regular,
                    keyword,
                    nullable: *nullable,
                }))
            }
        }
    }

    /// 宣言を共有参照として取り出す
    pub(super) fn function_decl(&self, function: ScopeId) -> Result<Arc<FunctionDecl>> {
        self.tree
            .get(function)
            .as_function()
            .map(|f| Arc::clone(&f.decl))
            .ok_or_else(|| CompilerError::internal(format!("{} は関数ではありません", function)).into())
    }
}

/// 型の不一致エラー
pub(super) fn type_error(message: impl Into<String>, location: SourceLocation) -> ErrorGroup {
    CompilerError::new(ErrorKind::TypeMismatch, message, Some(location)).into()
}

/// 未解決の参照エラー（似た名前の候補を添える）
fn unresolved<'a>(
    message: String,
    name: &str,
    location: SourceLocation,
    candidates: impl IntoIterator<Item = &'a str>,
) -> ErrorGroup {
    let mut error = CompilerError::new(ErrorKind::UnresolvedReference, message, Some(location));
    for suggestion in similar_names(name, candidates) {
        error.add_diagnostic(Diagnostic::help(format!("もしかして: '{}'", suggestion)));
    }
    error.into()
}

fn static_context(name: &str, location: SourceLocation) -> ErrorGroup {
    CompilerError::new(
        ErrorKind::InaccessibleMember,
        format!("静的な文脈からインスタンスメンバー '{}' は参照できません", name),
        Some(location),
    )
    .into()
}

fn static_reference(name: &str, location: SourceLocation) -> ErrorGroup {
    CompilerError::new(
        ErrorKind::InaccessibleMember,
        format!("インスタンスメンバー '{}' は型を通して参照できません", name),
        Some(location),
    )
    .into()
}
