//! 複合型の評価と継承
//!
//! 複合型は最初に参照された時点で評価されます。評価では親型を解決し、
//! 継承したフィールドと関数のテーブルを作り、親型どうし・自身と親型の
//! メンバーの互換性を検査します。
//!
//! 評価中の複合型に親型の解決で再び出会った場合は循環継承です。
//! 名前解決の途中で評価中の複合型に出会うのは正常で、そのまま進みます。

use std::path::PathBuf;
use std::sync::Arc;

use log::trace;

use crate::frontend::ast::{CompoundDecl, CompoundKind, Locatable, ModifierKind};
use crate::frontend::error::{CompilerError, Diagnostic, ErrorCollector, ErrorGroup, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::pairwise::{check_pairs, CheckStrategy};
use crate::frontend::semantic::scope::{Eval, ScopeId, ScopeKind};
use crate::frontend::semantic::types::{render_params, FunctionType};

use super::Analyzer;

/// 継承したメンバー
#[derive(Debug, Clone)]
struct Inherited {
    name: String,
    id: ScopeId,
    /// 経由した直接の親型
    origin: ScopeId,
    origin_name: String,
    kind: InheritedKind,
    location: Option<SourceLocation>,
    file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum InheritedKind {
    Field,
    Function { ty: FunctionType, is_abstract: bool },
}

impl Analyzer<'_> {
    /// 複合型を評価（評価済み・評価中なら何もしない）
    pub(super) fn eval_compound(&mut self, id: ScopeId) -> Result<()> {
        match self.tree.get(id).as_compound() {
            Some(data) if data.eval == Eval::NotStarted => {}
            _ => return Ok(()),
        }
        trace!("複合型を評価: {}", self.tree.qualified_name(id));
        self.set_compound_eval(id, Eval::InProgress);
        let result = self.in_scope(id, |this| this.eval_compound_inner(id));
        self.set_compound_eval(id, Eval::Done);

        result.map_err(|group| {
            let scope = self.tree.get(id);
            let kind = scope.as_compound().map(|c| c.kind().to_string()).unwrap_or_default();
            group.with_note(
                Diagnostic::note(format!("{} '{}' の宣言はここです", kind, scope.name), scope.location)
                    .with_file_path(self.file_of(id).as_deref()),
            )
        })
    }

    fn set_compound_eval(&mut self, id: ScopeId, eval: Eval) {
        if let Some(data) = self.tree.get_mut(id).as_compound_mut() {
            data.eval = eval;
        }
    }

    fn eval_compound_inner(&mut self, id: ScopeId) -> Result<()> {
        let decl = self
            .tree
            .get(id)
            .as_compound()
            .map(|c| Arc::clone(&c.decl))
            .ok_or_else(|| CompilerError::internal("複合型ではありません"))?;

        let supers = self.resolve_supers(id, &decl)?;
        if let Some(data) = self.tree.get_mut(id).as_compound_mut() {
            data.supers = supers.clone();
        }

        let inherited = self.collect_inherited(&supers)?;
        let strategy = CheckStrategy::for_size(inherited.len(), self.options.parallel_threshold);
        let mut errors = ErrorCollector::new();
        for error in check_pairs(&inherited, strategy, inherited_conflict) {
            errors.push(error);
        }

        let fields: Vec<ScopeId> = dedup(
            inherited
                .iter()
                .filter(|i| matches!(i.kind, InheritedKind::Field))
                .map(|i| i.id),
        );
        let mut table: Vec<Inherited> = Vec::new();
        for item in inherited.iter().filter(|i| matches!(i.kind, InheritedKind::Function { .. })) {
            if !table.iter().any(|t| t.id == item.id) {
                table.push(item.clone());
            }
        }

        self.check_own_members(id, &decl, &inherited, &mut table, &mut errors);

        if decl.kind == CompoundKind::Class && !decl.modifiers.has(ModifierKind::Abstract) {
            for item in &table {
                if let InheritedKind::Function { ty, is_abstract: true } = &item.kind {
                    errors.push(
                        CompilerError::new(
                            ErrorKind::IncompatibleInheritance,
                            format!(
                                "クラス '{}' は抽象関数 '{}({})' を実装していません",
                                decl.name.name,
                                item.name,
                                render_params(ty, &self.tree)
                            ),
                            Some(decl.name.location),
                        )
                        .with_diagnostic(Diagnostic::note("抽象関数の宣言はここです", item.location).with_file_path(item.file.as_deref())),
                    );
                }
            }
        }

        if let Some(data) = self.tree.get_mut(id).as_compound_mut() {
            data.super_fields = fields;
            data.super_functions = table.into_iter().map(|i| (i.name, i.id)).collect();
        }
        errors.finish()
    }

    /// 親型を解決して種類の規則を検査
    fn resolve_supers(&mut self, id: ScopeId, decl: &CompoundDecl) -> Result<Vec<ScopeId>> {
        let mut supers: Vec<ScopeId> = Vec::new();
        let mut class_super: Option<ScopeId> = None;
        for expr in &decl.supers {
            let location = expr.location();
            let ty = self.resolve_type(expr)?;
            let Some(sup) = ty.compound().filter(|_| !ty.is_nullable()) else {
                return Err(inheritance_error(
                    format!("'{}' は親型として指定できません", ty.render(&self.tree)),
                    location,
                ));
            };

            let state = self.tree.get(sup).as_compound().map(|c| c.eval);
            if sup == id || state == Some(Eval::InProgress) {
                let other = self.tree.get(sup);
                return Err(CompilerError::new(
                    ErrorKind::IncompatibleInheritance,
                    format!("循環した継承が検出されました: '{}' と '{}'", decl.name.name, other.name),
                    Some(location),
                )
                .with_diagnostic(
                    Diagnostic::note(format!("'{}' の宣言はここです", other.name), other.location)
                        .with_file_path(self.file_of(sup).as_deref()),
                )
                .into());
            }
            if supers.contains(&sup) {
                return Err(inheritance_error(
                    format!("親型 '{}' が重複しています", self.tree.get(sup).name),
                    location,
                ));
            }
            self.eval_compound(sup)?;

            let sup_scope = self.tree.get(sup);
            let sup_kind = sup_scope.as_compound().map(|c| c.kind()).unwrap_or(CompoundKind::Class);
            match (decl.kind, sup_kind) {
                (_, CompoundKind::Enum | CompoundKind::Annotation) => {
                    return Err(inheritance_error(format!("{} '{}' は継承できません", sup_kind, sup_scope.name), location));
                }
                (CompoundKind::Class, CompoundKind::Class) => {
                    if class_super.is_some() {
                        return Err(inheritance_error("クラスは複数のクラスを継承できません", location));
                    }
                    if sup_scope.has_modifier(ModifierKind::Final) {
                        return Err(inheritance_error(
                            format!("final クラス '{}' は継承できません", sup_scope.name),
                            location,
                        ));
                    }
                    class_super = Some(sup);
                }
                (kind, CompoundKind::Class) => {
                    return Err(inheritance_error(format!("{}はクラスを継承できません", kind), location));
                }
                _ => {}
            }
            supers.push(sup);
        }
        Ok(supers)
    }

    /// 直接の親型から見えるフィールドと関数を集める
    fn collect_inherited(&mut self, supers: &[ScopeId]) -> Result<Vec<Inherited>> {
        let mut items = Vec::new();
        for &sup in supers {
            let origin_name = self.tree.get(sup).name.clone();
            let own: Vec<(String, ScopeId)> = self
                .tree
                .get(sup)
                .members()
                .map(|(n, id)| (n.to_string(), id))
                .collect();
            let mut own_functions: Vec<(String, FunctionType)> = Vec::new();

            for (name, member) in own {
                match self.tree.kind(member) {
                    ScopeKind::Variable => items.push(self.inherited(member, sup, &origin_name, InheritedKind::Field)),
                    ScopeKind::FunctionSet if name != "constructor" => {
                        for function in self.set_functions(member) {
                            let ty = self.eval_proto(function)?;
                            own_functions.push((name.clone(), ty.clone()));
                            let is_abstract = self.is_abstract_function(function);
                            items.push(self.inherited(function, sup, &origin_name, InheritedKind::Function { ty, is_abstract }));
                        }
                    }
                    _ => {}
                }
            }

            let (fields, functions) = match self.tree.get(sup).as_compound() {
                Some(data) => (data.super_fields.clone(), data.super_functions.clone()),
                None => (Vec::new(), Vec::new()),
            };
            for field in fields {
                items.push(self.inherited(field, sup, &origin_name, InheritedKind::Field));
            }
            for (name, function) in functions {
                let ty = self.eval_proto(function)?;
                let overridden = own_functions.iter().any(|(n, t)| *n == name && t.same_signature(&ty));
                if !overridden {
                    let is_abstract = self.is_abstract_function(function);
                    items.push(self.inherited(function, sup, &origin_name, InheritedKind::Function { ty, is_abstract }));
                }
            }
        }
        Ok(items)
    }

    fn inherited(&self, id: ScopeId, origin: ScopeId, origin_name: &str, kind: InheritedKind) -> Inherited {
        let scope = self.tree.get(id);
        Inherited {
            name: scope.name.clone(),
            id,
            origin,
            origin_name: origin_name.to_string(),
            kind,
            location: scope.location,
            file: self.file_of(id),
        }
    }

    /// 自身のメンバーと継承したメンバーの関係を検査し、実装済みの抽象関数をテーブルから除く
    fn check_own_members(
        &mut self,
        id: ScopeId,
        decl: &CompoundDecl,
        inherited: &[Inherited],
        table: &mut Vec<Inherited>,
        errors: &mut ErrorCollector,
    ) {
        let own: Vec<(String, ScopeId)> = self
            .tree
            .get(id)
            .members()
            .map(|(n, m)| (n.to_string(), m))
            .collect();
        let is_abstract_class = decl.modifiers.has(ModifierKind::Abstract) || decl.kind == CompoundKind::Interface;

        for (name, member) in own {
            let location = self.tree.get(member).location;
            let clash = inherited.iter().find(|i| i.name == name);
            match self.tree.kind(member) {
                ScopeKind::Variable => {
                    if let Some(item) = clash {
                        let message = match item.kind {
                            InheritedKind::Field => format!("フィールド '{}' は '{}' から継承したフィールドを隠しています", name, item.origin_name),
                            InheritedKind::Function { .. } => format!("フィールド '{}' は '{}' から継承した関数と同じ名前です", name, item.origin_name),
                        };
                        errors.push(inheritance_at(message, location, item));
                    }
                }
                ScopeKind::FunctionSet if name != "constructor" => {
                    if let Some(item) = clash.filter(|i| matches!(i.kind, InheritedKind::Field)) {
                        errors.push(inheritance_at(
                            format!("関数 '{}' は '{}' から継承したフィールドと同じ名前です", name, item.origin_name),
                            location,
                            item,
                        ));
                    }
                    let mut own_functions: Vec<(ScopeId, FunctionType)> = Vec::new();
                    for function in self.set_functions(member) {
                        let ty = match self.eval_proto(function) {
                            Ok(ty) => ty,
                            Err(group) => {
                                errors.extend(group);
                                continue;
                            }
                        };
                        self.check_override(function, &name, &ty, table, errors);
                        own_functions.push((function, ty));
                        if !is_abstract_class && self.is_abstract_function(function) {
                            errors.push(inheritance_error_at(
                                format!("抽象関数 '{}' を持つクラス '{}' は abstract でなければなりません", name, decl.name.name),
                                self.tree.get(function).location,
                            ));
                        }
                    }

                    let mut super_functions: Vec<(ScopeId, FunctionType)> = Vec::new();
                    for item in inherited.iter().filter(|i| i.name == name) {
                        if let InheritedKind::Function { ty, .. } = &item.kind {
                            if !super_functions.iter().any(|(id, _)| *id == item.id) {
                                super_functions.push((item.id, ty.clone()));
                            }
                        }
                    }
                    for error in self.check_inherited_funs(&name, &own_functions, &super_functions) {
                        errors.push(error);
                    }
                }
                _ => {}
            }
        }
    }

    fn check_override(
        &self,
        function: ScopeId,
        name: &str,
        ty: &FunctionType,
        table: &mut Vec<Inherited>,
        errors: &mut ErrorCollector,
    ) {
        let scope = self.tree.get(function);
        let location = scope.location;
        let has_override = scope.has_modifier(ModifierKind::Override);
        let accessor = scope.modifiers.accessor();

        let matches: Vec<usize> = table
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.name == name && matches!(&item.kind, InheritedKind::Function { ty: other, .. } if other.same_signature(ty))
            })
            .map(|(i, _)| i)
            .collect();
        if matches.is_empty() {
            if has_override {
                errors.push(inheritance_error_at(
                    format!("'{}' はオーバーライドする関数がありません", name),
                    location,
                ));
            }
            return;
        }

        let mut implemented = Vec::new();
        for index in matches {
            let item = &table[index];
            let InheritedKind::Function { ty: other, is_abstract } = &item.kind else {
                continue;
            };
            let other_scope = self.tree.get(item.id);
            if !other.ret.weak_equals(&ty.ret) {
                errors.push(inheritance_at(
                    format!(
                        "'{}' の戻り値の型 '{}' は継承した関数の '{}' と一致しません",
                        name,
                        ty.ret.render(&self.tree),
                        other.ret.render(&self.tree)
                    ),
                    location,
                    item,
                ));
            }
            if other_scope.has_modifier(ModifierKind::Final) {
                errors.push(inheritance_at(
                    format!("final 関数 '{}' はオーバーライドできません", name),
                    location,
                    item,
                ));
            } else if *is_abstract {
                if other_scope.modifiers.accessor() != accessor {
                    errors.push(inheritance_at(
                        format!("'{}' のアクセス修飾子が抽象関数の宣言と一致しません", name),
                        location,
                        item,
                    ));
                } else {
                    implemented.push(index);
                }
            } else if !has_override {
                errors.push(inheritance_at(
                    format!("'{}' は '{}' の関数をオーバーライドするため 'override' が必要です", name, item.origin_name),
                    location,
                    item,
                ));
            }
        }
        for index in implemented.into_iter().rev() {
            table.remove(index);
        }
    }

    /// 抽象関数か（インターフェースの本体なしの関数を含む）
    pub(super) fn is_abstract_function(&self, function: ScopeId) -> bool {
        let scope = self.tree.get(function);
        if scope.has_modifier(ModifierKind::Abstract) {
            return true;
        }
        let in_interface = self
            .tree
            .owner_class(function)
            .and_then(|owner| self.tree.get(owner).as_compound())
            .map(|c| c.kind() == CompoundKind::Interface)
            .unwrap_or(false);
        let has_body = scope.as_function().map(|f| f.decl.body.is_some()).unwrap_or(false);
        in_interface && !has_body && !scope.has_modifier(ModifierKind::Native)
    }

    /// `sub` が `sup` の部分型か（すべての型は暗黙に `any` の部分型）
    pub(super) fn is_subtype_of(&mut self, sub: ScopeId, sup: ScopeId) -> Result<bool> {
        if sup == self.builtins()?.any || sub == sup {
            return Ok(true);
        }
        self.eval_compound(sub)?;
        Ok(self.tree.is_subtype(sub, sup))
    }
}

/// 異なる親型から継承した同名メンバーの衝突
fn inherited_conflict(a: &Inherited, b: &Inherited) -> Option<CompilerError> {
    if a.id == b.id || a.origin == b.origin || a.name != b.name {
        return None;
    }
    let message = match (&a.kind, &b.kind) {
        (InheritedKind::Field, InheritedKind::Field) => format!(
            "'{}' と '{}' から同名のフィールド '{}' を継承しています",
            a.origin_name, b.origin_name, a.name
        ),
        (
            InheritedKind::Function { ty: f, is_abstract: fa },
            InheritedKind::Function { ty: g, is_abstract: ga },
        ) => {
            if !f.same_signature(g) || (*fa && *ga) {
                return None;
            }
            format!(
                "'{}' と '{}' から同じシグネチャの関数 '{}' を継承しています",
                a.origin_name, b.origin_name, a.name
            )
        }
        _ => format!(
            "'{}' は '{}' と '{}' からフィールドと関数の両方として継承されています",
            a.name, a.origin_name, b.origin_name
        ),
    };
    let mut error = CompilerError::new(ErrorKind::IncompatibleInheritance, message, b.location)
        .with_diagnostic(Diagnostic::note("もう一方の宣言はここです", a.location).with_file_path(a.file.as_deref()));
    if let Some(file) = &b.file {
        error = error.with_file_path(file);
    }
    Some(error)
}

fn dedup(ids: impl Iterator<Item = ScopeId>) -> Vec<ScopeId> {
    let mut result: Vec<ScopeId> = Vec::new();
    for id in ids {
        if !result.contains(&id) {
            result.push(id);
        }
    }
    result
}

fn inheritance_error(message: impl Into<String>, location: SourceLocation) -> ErrorGroup {
    CompilerError::new(ErrorKind::IncompatibleInheritance, message, Some(location)).into()
}

fn inheritance_error_at(message: impl Into<String>, location: Option<SourceLocation>) -> CompilerError {
    CompilerError::new(ErrorKind::IncompatibleInheritance, message, location)
}

fn inheritance_at(message: String, location: Option<SourceLocation>, item: &Inherited) -> CompilerError {
    inheritance_error_at(message, location).with_diagnostic(
        Diagnostic::note(format!("'{}' の宣言はここです", item.origin_name), item.location)
            .with_file_path(item.file.as_deref()),
    )
}
