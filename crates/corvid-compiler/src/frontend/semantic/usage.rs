//! # 使用状況の検査
//!
//! 解析が終わったスコープツリーを走査し、一度も使われなかった宣言と
//! インポートを警告します。変数は読み出しと代入を区別して報告します。

use log::debug;

use crate::frontend::ast::ModifierKind;
use crate::frontend::error::{CompilerError, Diagnostic, ErrorKind};

use super::scope::{ScopeData, ScopeId};
use super::symbol_table::ScopeTree;

const UNUSED_HELP: &str = "使わない場合は名前を '_' で始めるか、削除するか、public にしてください";

/// 未使用の宣言とインポートの警告を集める
pub fn check_usage(tree: &ScopeTree, modules: &[ScopeId]) -> Vec<CompilerError> {
    let mut checker = UsageChecker {
        tree,
        warnings: Vec::new(),
    };
    for &module in modules {
        let Some(data) = tree.get(module).as_module() else {
            continue;
        };
        if data.is_basic {
            continue;
        }
        debug!("使用状況を検査: {}", tree.qualified_name(module));
        let before = checker.warnings.len();
        checker.check_imports(module);
        checker.walk_members(module);
        for warning in &mut checker.warnings[before..] {
            if warning.file_path.is_none() {
                warning.file_path = Some(data.file.clone());
            }
        }
    }
    checker.warnings
}

struct UsageChecker<'t> {
    tree: &'t ScopeTree,
    warnings: Vec<CompilerError>,
}

impl UsageChecker<'_> {
    fn report(&mut self, message: String, id: ScopeId) {
        let warning = CompilerError::warning(ErrorKind::Unused, message, self.tree.get(id).location)
            .with_diagnostic(Diagnostic::help(UNUSED_HELP));
        self.warnings.push(warning);
    }

    fn check_imports(&mut self, module: ScopeId) {
        let tree = self.tree;
        let Some(data) = tree.get(module).as_module() else {
            return;
        };
        for import in data.imports.iter().filter(|i| !i.is_used) {
            if import.decl.binding_name().map(|n| n.starts_with('_')).unwrap_or(false) {
                continue;
            }
            self.warnings.push(
                CompilerError::warning(
                    ErrorKind::Unused,
                    format!("インポート '{}' は使われていません", import.decl.display_path()),
                    Some(import.decl.location),
                )
                .with_diagnostic(Diagnostic::help("使わないインポートは削除してください")),
            );
        }
    }

    fn walk_members(&mut self, scope: ScopeId) {
        let members: Vec<ScopeId> = self.tree.get(scope).members().map(|(_, id)| id).collect();
        for member in members {
            self.walk(member);
        }
    }

    fn walk(&mut self, id: ScopeId) {
        let tree = self.tree;
        let scope = tree.get(id);
        let exempt = scope.name.starts_with('_')
            || scope.name.starts_with('%')
            || scope.has_modifier(ModifierKind::Public);

        match &scope.data {
            ScopeData::Compound(data) => {
                if !exempt && scope.usage == 0 {
                    self.report(format!("{} '{}' は使われていません", data.kind(), scope.name), id);
                }
                self.walk_members(id);
            }
            ScopeData::FunctionSet(set) => {
                for &(_, function) in &set.functions {
                    self.walk(function);
                }
            }
            ScopeData::Function(data) => {
                let has_body = data.decl.body.is_some();
                let skip = exempt
                    || !has_body
                    || data.decl.is_constructor
                    || scope.name == "main"
                    || scope.has_modifier(ModifierKind::Override)
                    || scope.has_modifier(ModifierKind::Abstract)
                    || scope.has_modifier(ModifierKind::Native);
                if !skip && scope.usage == 0 {
                    self.report(format!("関数 '{}' は使われていません", scope.name), id);
                }
                if has_body && !scope.has_modifier(ModifierKind::Override) {
                    for &param in &data.params {
                        self.walk(param);
                    }
                }
                self.walk_members(id);
            }
            ScopeData::Lambda(data) => {
                for &param in &data.params {
                    self.walk(param);
                }
                self.walk_members(id);
            }
            ScopeData::Variable(data) => {
                if !exempt {
                    let message = if data.accessed == 0 && data.assigned == 0 {
                        Some(format!("変数 '{}' は一度も読み書きされていません", scope.name))
                    } else if data.accessed == 0 {
                        Some(format!("変数 '{}' の値は一度も読まれていません", scope.name))
                    } else if data.assigned == 0 && !data.is_parameter() {
                        Some(format!("変数 '{}' は一度も代入されていません", scope.name))
                    } else {
                        None
                    };
                    if let Some(message) = message {
                        self.report(message, id);
                    }
                }
                self.walk_members(id);
            }
            ScopeData::Block => self.walk_members(id),
            ScopeData::Enumerator | ScopeData::Module(_) | ScopeData::FolderModule(_) => {}
        }
    }
}
