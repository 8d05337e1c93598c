//! # スコープツリー構築
//!
//! ソースファイルごとの構文木を走査してスコープツリーを実体化する前処理です。
//! 各宣言について修飾名を計算し、完全な再宣言を拒否し、修飾子の組み合わせを
//! 固定の互換性表で検証します。型や値はまだ一切解決しません。
//!
//! 関数はパラメータの型シグネチャを含む名前（`f(int,string)`）で登録されるため、
//! 同名のオーバーロードは1つのオーバーロード集合の下に共存できます。

use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::frontend::ast::{
    CompoundDecl, CompoundKind, Declaration, FunctionDecl, Modifiers, ModifierKind, Module, Param, VariableDecl,
};
use crate::frontend::error::{CompilerError, Diagnostic, ErrorKind, Result, SourceLocation};

use super::scope::{
    CompoundData, Eval, FunctionData, FunctionSetData, ImportEntry, ModuleData, Scope, ScopeData, ScopeId,
    VariableData, VariableSource,
};
use super::symbol_path::SymbolPath;
use super::symbol_table::ScopeTree;

/// 互いに排他な修飾子の組
const EXCLUSIVE_PAIRS: &[(ModifierKind, ModifierKind)] = &[
    (ModifierKind::Abstract, ModifierKind::Final),
    (ModifierKind::Static, ModifierKind::Override),
    (ModifierKind::Abstract, ModifierKind::Private),
    (ModifierKind::Final, ModifierKind::Private),
    (ModifierKind::Override, ModifierKind::Private),
    (ModifierKind::Abstract, ModifierKind::Static),
    (ModifierKind::Abstract, ModifierKind::Native),
];

/// 宣言の置かれている場所
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclContext {
    /// モジュールのトップレベル
    Module,
    /// 複合型のメンバー
    Member(CompoundKind),
}

/// 宣言の種類（修飾子の検証用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Compound(CompoundKind),
    Function { has_body: bool },
    Constructor,
    Variable { is_const: bool },
}

/// 重複と排他的な組み合わせを検証
fn check_modifier_table(modifiers: &Modifiers) -> Result<()> {
    let list: Vec<_> = modifiers.iter().collect();
    for (i, a) in list.iter().enumerate() {
        for b in &list[..i] {
            if a.kind == b.kind {
                return Err(malformed(format!("修飾子 '{}' が重複しています", a.kind), a.location));
            }
            let exclusive = (a.kind.is_accessor() && b.kind.is_accessor())
                || EXCLUSIVE_PAIRS
                    .iter()
                    .any(|&(x, y)| (x == a.kind && y == b.kind) || (x == b.kind && y == a.kind));
            if exclusive {
                return Err(malformed(
                    format!("修飾子 '{}' と '{}' は同時に指定できません", b.kind, a.kind),
                    a.location,
                ));
            }
        }
    }
    Ok(())
}

/// 文脈に依存する修飾子の禁止規則
fn check_context(modifiers: &Modifiers, context: DeclContext, kind: DeclKind, location: SourceLocation) -> Result<()> {
    check_modifier_table(modifiers)?;

    let banned: &[ModifierKind] = match (context, kind) {
        (_, DeclKind::Constructor) => &[
            ModifierKind::Abstract,
            ModifierKind::Static,
            ModifierKind::Final,
            ModifierKind::Override,
        ],
        (DeclContext::Module, DeclKind::Function { .. }) => {
            &[ModifierKind::Static, ModifierKind::Override, ModifierKind::Abstract]
        }
        (DeclContext::Module, DeclKind::Variable { .. }) => &[
            ModifierKind::Static,
            ModifierKind::Override,
            ModifierKind::Abstract,
            ModifierKind::Final,
            ModifierKind::Native,
        ],
        (_, DeclKind::Variable { .. }) => &[
            ModifierKind::Override,
            ModifierKind::Abstract,
            ModifierKind::Final,
            ModifierKind::Native,
        ],
        (_, DeclKind::Compound(CompoundKind::Enum | CompoundKind::Annotation)) => &[
            ModifierKind::Abstract,
            ModifierKind::Static,
            ModifierKind::Override,
            ModifierKind::Native,
        ],
        (_, DeclKind::Compound(CompoundKind::Interface)) => &[
            ModifierKind::Final,
            ModifierKind::Static,
            ModifierKind::Override,
            ModifierKind::Native,
        ],
        (_, DeclKind::Compound(_)) => &[ModifierKind::Static, ModifierKind::Override, ModifierKind::Native],
        (DeclContext::Member(_), DeclKind::Function { .. }) => &[],
    };
    if let Some(modifier) = modifiers.iter().find(|m| banned.contains(&m.kind)) {
        let place = match (context, kind) {
            (_, DeclKind::Constructor) => "コンストラクタ".to_string(),
            (_, DeclKind::Compound(compound)) => compound.to_string(),
            (DeclContext::Module, DeclKind::Function { .. }) => "モジュールレベルの関数".to_string(),
            (DeclContext::Module, _) => "モジュールレベルの変数".to_string(),
            _ => "この宣言".to_string(),
        };
        return Err(malformed(
            format!("{}には修飾子 '{}' を指定できません", place, modifier.kind),
            modifier.location,
        ));
    }

    // インターフェースのフィールドはstaticかconstでなければならない
    if let (DeclContext::Member(CompoundKind::Interface), DeclKind::Variable { is_const }) = (context, kind) {
        if !is_const && !modifiers.has(ModifierKind::Static) {
            return Err(malformed(
                "インターフェースのフィールドは static または const でなければなりません",
                location,
            ));
        }
    }

    if let DeclKind::Function { has_body } = kind {
        let is_abstract = modifiers.has(ModifierKind::Abstract);
        let is_native = modifiers.has(ModifierKind::Native);
        let implicit_abstract = context == DeclContext::Member(CompoundKind::Interface) && !is_native;
        if has_body && (is_abstract || is_native) {
            let which = if is_abstract { "abstract" } else { "native" };
            return Err(malformed(format!("{} 関数は本体を持てません", which), location));
        }
        if !has_body && !is_abstract && !is_native && !implicit_abstract {
            return Err(malformed("関数の本体がありません", location));
        }
        if is_abstract && matches!(context, DeclContext::Member(CompoundKind::Enum | CompoundKind::Annotation)) {
            return Err(malformed("列挙型とアノテーションは abstract 関数を持てません", location));
        }
    }
    Ok(())
}

fn malformed(message: impl Into<String>, location: SourceLocation) -> crate::frontend::error::ErrorGroup {
    CompilerError::new(ErrorKind::MalformedDeclaration, message, Some(location)).into()
}

/// 再宣言エラー（両方の宣言位置を指す）
pub fn redeclaration(name: &str, location: SourceLocation, previous: Option<SourceLocation>) -> CompilerError {
    CompilerError::new(
        ErrorKind::Redeclaration,
        format!("'{}' は既に宣言されています", name),
        Some(location),
    )
    .with_diagnostic(Diagnostic::note("以前の宣言はここです", previous))
}

/// パラメータ型の構文上のシグネチャ `(int,/,string,*,key:int)`
pub fn syntactic_signature(decl: &FunctionDecl) -> String {
    let render = |p: &Param, named: bool| {
        let mut text = if named {
            format!("{}:{}", p.name.name, p.ty)
        } else {
            p.ty.to_string()
        };
        if p.is_variadic {
            text.push_str("...");
        }
        text
    };
    let mut parts: Vec<String> = decl.params.positional.iter().map(|p| render(p, false)).collect();
    if !decl.params.positional.is_empty() {
        parts.push("/".to_string());
    }
    parts.extend(decl.params.regular.iter().map(|p| render(p, false)));
    if !decl.params.keyword.is_empty() {
        parts.push("*".to_string());
        parts.extend(decl.params.keyword.iter().map(|p| render(p, true)));
    }
    format!("({})", parts.join(","))
}

/// パラメータリストの形を検証
///
/// 可変長パラメータは各リストに高々1つで末尾に置き、デフォルト値を持つ
/// パラメータが始まったら（位置パラメータの並びでは）最後まで続かなければなりません。
fn check_param_lists(decl: &FunctionDecl) -> Result<()> {
    let lists = [&decl.params.positional, &decl.params.regular, &decl.params.keyword];
    for list in lists {
        for (i, param) in list.iter().enumerate() {
            if param.is_variadic && i + 1 != list.len() {
                return Err(malformed("可変長パラメータはリストの最後に置かなければなりません", param.location));
            }
            if param.is_variadic && param.default.is_some() {
                return Err(malformed("可変長パラメータはデフォルト値を持てません", param.location));
            }
        }
    }

    let mut seen_default = false;
    for param in decl.params.positional.iter().chain(decl.params.regular.iter()) {
        if param.default.is_some() {
            seen_default = true;
        } else if seen_default && !param.is_variadic {
            return Err(malformed(
                format!("デフォルト値を持つパラメータの後に必須パラメータ '{}' は置けません", param.name.name),
                param.location,
            ));
        }
    }
    Ok(())
}

/// 関数スコープにパラメータの変数スコープを追加
pub fn add_parameters(tree: &mut ScopeTree, function: ScopeId, decl: &Arc<FunctionDecl>) -> Result<Vec<ScopeId>> {
    check_param_lists(decl)?;
    let base = tree.get(function).path.clone();
    let mut params: Vec<ScopeId> = Vec::new();
    for (index, param) in decl.params.iter().enumerate() {
        if let Some(&previous) = params.iter().find(|&&p| tree.get(p).name == param.name.name) {
            return Err(redeclaration(&param.name.name, param.name.location, tree.get(previous).location).into());
        }
        let data = VariableData::new(
            VariableSource::Parameter {
                function: Arc::clone(decl),
                index,
            },
            param.is_const,
        );
        let scope = Scope::new(
            param.name.name.clone(),
            &base / param.name.name.as_str(),
            Some(param.name.location),
            ScopeData::Variable(data),
        );
        params.push(tree.add_child(function, scope));
    }
    Ok(params)
}

/// スコープツリー構築器
pub struct ScopeBuilder<'t> {
    tree: &'t mut ScopeTree,
}

impl<'t> ScopeBuilder<'t> {
    /// 新しい構築器を作成
    pub fn new(tree: &'t mut ScopeTree) -> Self {
        Self { tree }
    }

    /// モジュールのスコープを構築
    pub fn build_module(&mut self, ast: Arc<Module>, file: PathBuf, path: SymbolPath, is_basic: bool) -> Result<ScopeId> {
        debug!("スコープ構築: {}", path);
        let imports = ast
            .imports
            .iter()
            .map(|decl| ImportEntry {
                decl: Arc::clone(decl),
                target: None,
                is_used: false,
            })
            .collect();
        let data = ModuleData {
            ast: Arc::clone(&ast),
            file: file.clone(),
            imports,
            is_basic,
        };
        let name = path.last().unwrap_or_default().to_string();
        let module = self
            .tree
            .add_root(Scope::new(name, path, Some(ast.location), ScopeData::Module(data)));

        for decl in &ast.declarations {
            self.declare(module, decl, DeclContext::Module)
                .map_err(|e| e.with_file_path(&file))?;
        }
        Ok(module)
    }

    fn declare(&mut self, parent: ScopeId, decl: &Declaration, context: DeclContext) -> Result<()> {
        match decl {
            Declaration::Compound(compound) => self.declare_compound(parent, compound, context),
            Declaration::Function(function) => self.declare_function(parent, function, context),
            Declaration::Variable(variable) => self.declare_variable(parent, variable, context),
        }
    }

    fn register(&mut self, parent: ScopeId, name: &str, location: SourceLocation, scope: Scope) -> Result<ScopeId> {
        self.tree
            .add_member(parent, name, scope)
            .map_err(|existing| redeclaration(name, location, self.tree.get(existing).location).into())
    }

    fn declare_compound(&mut self, parent: ScopeId, decl: &Arc<CompoundDecl>, context: DeclContext) -> Result<()> {
        check_context(&decl.modifiers, context, DeclKind::Compound(decl.kind), decl.location)?;

        let path = &self.tree.get(parent).path / decl.name.name.as_str();
        let data = CompoundData {
            decl: Arc::clone(decl),
            eval: Eval::NotStarted,
            supers: Vec::new(),
            super_fields: Vec::new(),
            super_functions: Vec::new(),
        };
        let scope = Scope::new(decl.name.name.clone(), path.clone(), Some(decl.name.location), ScopeData::Compound(data))
            .with_modifiers(decl.modifiers.clone());
        let id = self.register(parent, &decl.name.name, decl.name.location, scope)?;

        for param in &decl.type_params {
            if let Some(other) = decl.type_params.iter().find(|p| p.name == param.name && p.location != param.location) {
                return Err(redeclaration(&param.name, param.location, Some(other.location)).into());
            }
        }

        for enumerator in &decl.enumerators {
            let scope = Scope::new(
                enumerator.name.clone(),
                &path / enumerator.name.as_str(),
                Some(enumerator.location),
                ScopeData::Enumerator,
            );
            self.register(id, &enumerator.name, enumerator.location, scope)?;
        }

        let member_context = DeclContext::Member(decl.kind);
        for member in &decl.members {
            self.declare(id, member, member_context)?;
        }
        Ok(())
    }

    fn declare_function(&mut self, parent: ScopeId, decl: &Arc<FunctionDecl>, context: DeclContext) -> Result<()> {
        let kind = if decl.is_constructor {
            if context == DeclContext::Module {
                return Err(malformed("コンストラクタは複合型の中でのみ宣言できます", decl.location));
            }
            DeclKind::Constructor
        } else {
            DeclKind::Function {
                has_body: decl.body.is_some(),
            }
        };
        check_context(&decl.modifiers, context, kind, decl.location)?;
        if decl.is_constructor && decl.body.is_none() && !decl.modifiers.has(ModifierKind::Native) {
            return Err(malformed("コンストラクタの本体がありません", decl.location));
        }

        let name = decl.name.name.as_str();
        let set = match self.tree.member(parent, name) {
            Some(existing) => {
                if self.tree.get(existing).as_function_set().is_none() {
                    return Err(redeclaration(name, decl.name.location, self.tree.get(existing).location).into());
                }
                existing
            }
            None => {
                let path = &self.tree.get(parent).path / name;
                let scope = Scope::new(
                    name,
                    path,
                    Some(decl.name.location),
                    ScopeData::FunctionSet(FunctionSetData::default()),
                );
                self.register(parent, name, decl.name.location, scope)?
            }
        };

        let signature = syntactic_signature(decl);
        let previous = self
            .tree
            .get(set)
            .as_function_set()
            .and_then(|data| data.functions.iter().find(|(key, _)| *key == signature))
            .map(|&(_, id)| id);
        if let Some(previous) = previous {
            return Err(redeclaration(
                &format!("{}{}", name, signature),
                decl.name.location,
                self.tree.get(previous).location,
            )
            .into());
        }

        let path = self.tree.get(set).path.clone() + signature.as_str();
        let scope = Scope::new(
            name,
            path,
            Some(decl.name.location),
            ScopeData::Function(FunctionData::new(Arc::clone(decl))),
        )
        .with_modifiers(decl.modifiers.clone());
        let function = self.tree.add_child(set, scope);
        if let Some(data) = self.tree.get_mut(set).as_function_set_mut() {
            data.functions.push((signature, function));
        }

        let params = add_parameters(self.tree, function, decl)?;
        if let Some(data) = self.tree.get_mut(function).as_function_mut() {
            data.params = params;
        }
        Ok(())
    }

    fn declare_variable(&mut self, parent: ScopeId, decl: &Arc<VariableDecl>, context: DeclContext) -> Result<()> {
        check_context(
            &decl.modifiers,
            context,
            DeclKind::Variable { is_const: decl.is_const },
            decl.location,
        )?;
        let path = &self.tree.get(parent).path / decl.name.name.as_str();
        let data = VariableData::new(VariableSource::Declared(Arc::clone(decl)), decl.is_const);
        let scope = Scope::new(decl.name.name.clone(), path, Some(decl.name.location), ScopeData::Variable(data))
            .with_modifiers(decl.modifiers.clone());
        self.register(parent, &decl.name.name, decl.name.location, scope)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::frontend::semantic::scope::ScopeKind;
    use std::path::Path;

    fn build(source: &str) -> Result<(ScopeTree, ScopeId)> {
        let module = parse_source(source, "main", Path::new("main.crv"))?;
        let mut tree = ScopeTree::new();
        let id = ScopeBuilder::new(&mut tree).build_module(
            Arc::new(module),
            PathBuf::from("main.crv"),
            SymbolPath::from_segment("main"),
            false,
        )?;
        Ok((tree, id))
    }

    #[test]
    fn test_overloads_share_a_set() {
        let (tree, module) = build("fun f(x: int) {}\nfun f(x: string, y: int) {}").unwrap();
        let set = tree.member(module, "f").unwrap();
        assert_eq!(tree.kind(set), ScopeKind::FunctionSet);
        let data = tree.get(set).as_function_set().unwrap();
        let keys: Vec<&str> = data.functions.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["(int)", "(string,int)"]);
        assert_eq!(tree.qualified_name(data.functions[1].1), "main.f(string,int)");
    }

    #[test]
    fn test_exact_redeclaration_points_at_both_sites() {
        let error = build("fun f(x: int) {}\nfun f(y: int) {}").unwrap_err();
        let error = error.first();
        assert_eq!(error.kind, ErrorKind::Redeclaration);
        assert_eq!(error.location.unwrap().line, 2);
        assert_eq!(error.notes[0].location.unwrap().line, 1);
    }

    #[test]
    fn test_variable_and_function_clash() {
        let error = build("var f = 1\nfun f() {}").unwrap_err();
        assert!(error.contains(ErrorKind::Redeclaration));
    }

    #[test]
    fn test_exclusive_modifiers() {
        let error = build("class A { abstract final fun f() }").unwrap_err();
        assert!(error.first().message.contains("同時に指定できません"));
        let error = build("class A { public private var x = 1 }").unwrap_err();
        assert_eq!(error.first().kind, ErrorKind::MalformedDeclaration);
    }

    #[test]
    fn test_context_bans() {
        assert!(build("static fun f() {}").is_err());
        assert!(build("class A { static constructor() {} }").is_err());
        assert!(build("abstract enum E { A }").is_err());
        assert!(build("interface I { var x: int }").is_err());
        assert!(build("interface I { const x: int = 1\nfun f(): int }").is_ok());
    }

    #[test]
    fn test_body_rules() {
        assert!(build("class A { fun f() }").is_err());
        assert!(build("class A { native fun f() {} }").is_err());
        assert!(build("class A { native fun f(): int }").is_ok());
    }

    #[test]
    fn test_param_list_rules() {
        assert!(build("fun f(a: int = 1, b: int) {}").is_err());
        assert!(build("fun f(a: int..., b: int) {}").is_err());
        assert!(build("fun f(a: int, a: string) {}").is_err());
        assert!(build("fun f(a: int = 1, *, b: int) {}").is_ok());
    }

    #[test]
    fn test_parameters_are_not_members() {
        let (tree, module) = build("fun f(x: int) {}").unwrap();
        let set = tree.member(module, "f").unwrap();
        let function = tree.get(set).as_function_set().unwrap().functions[0].1;
        assert_eq!(tree.get(function).member_count(), 0);
        let params = &tree.get(function).as_function().unwrap().params;
        assert_eq!(params.len(), 1);
        assert_eq!(tree.get(params[0]).name, "x");
    }

    #[test]
    fn test_enumerators_registered() {
        let (tree, module) = build("enum Color { Red, Green }").unwrap();
        let color = tree.member(module, "Color").unwrap();
        let red = tree.member(color, "Red").unwrap();
        assert_eq!(tree.kind(red), ScopeKind::Enumerator);
        assert_eq!(tree.qualified_name(red), "main.Color.Red");
    }
}
