//! アクセス制御と静的文脈
//!
//! アクセス修飾子ごとに、参照元から宣言が見えるかどうかを判定します。
//! 判定は宣言の「クラス」（所属する複合型、なければモジュール）を基準にします。
//!
//! | 修飾子 | 参照できる場所 |
//! |---|---|
//! | private | 同じクラスの内側 |
//! | internal | 同じクラス、または同じモジュール内の派生クラス |
//! | （なし） | 同じモジュール |
//! | protected | 同じモジュール、または任意の派生クラス |
//! | public | どこからでも |

use crate::frontend::ast::ModifierKind;
use crate::frontend::error::{CompilerError, Diagnostic, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::scope::{ScopeId, ScopeKind};

use super::Analyzer;

impl Analyzer<'_> {
    /// 現在のスコープから宣言にアクセスできるか
    pub(super) fn can_access(&self, target: ScopeId) -> bool {
        let from = self.current;
        let scope = self.tree.get(target);
        match scope.kind() {
            ScopeKind::Variable => {
                let owner = scope.parent.map(|p| self.tree.kind(p));
                if !matches!(owner, Some(ScopeKind::Compound | ScopeKind::Module)) {
                    return true;
                }
            }
            ScopeKind::Compound | ScopeKind::Function => {}
            _ => return true,
        }
        if self.in_basic(target) {
            return true;
        }
        let Some(target_class) = self.tree.owner_class(target) else {
            return true;
        };

        let same_module = self.tree.enclosing_module(target) == self.tree.enclosing_module(from);
        let same_class = self.tree.is_ancestor(target_class, from);
        let subclass = self.tree.kind(target_class) == ScopeKind::Compound
            && self
                .tree
                .ancestors(from)
                .filter(|&a| self.tree.kind(a) == ScopeKind::Compound)
                .any(|c| self.tree.is_subtype(c, target_class));

        match scope.modifiers.accessor() {
            Some(ModifierKind::Private) => same_class,
            Some(ModifierKind::Internal) => same_class || (subclass && same_module),
            Some(ModifierKind::Protected) => same_class || same_module || subclass,
            Some(ModifierKind::Public) => true,
            _ => same_class || same_module,
        }
    }

    /// アクセスできなければエラー
    pub(super) fn check_access(&self, target: ScopeId, location: SourceLocation) -> Result<()> {
        if self.can_access(target) {
            return Ok(());
        }
        let scope = self.tree.get(target);
        let accessor = match scope.modifiers.accessor() {
            Some(kind) => format!("'{}'", kind),
            None => "アクセス修飾子なし".to_string(),
        };
        let error = CompilerError::new(
            ErrorKind::InaccessibleMember,
            format!("'{}' は {} で宣言されているため、ここからはアクセスできません", scope.name, accessor),
            Some(location),
        )
        .with_diagnostic(
            Diagnostic::note("宣言はここです", scope.location).with_file_path(self.file_of(target).as_deref()),
        );
        Err(error.into())
    }

    /// インスタンスメンバー（複合型の非staticなフィールドと関数）か
    ///
    /// constフィールドは型を通して参照できます。
    pub(super) fn is_instance_member(&self, target: ScopeId) -> bool {
        let scope = self.tree.get(target);
        let owner = match scope.kind() {
            ScopeKind::Variable => {
                if scope.as_variable().map(|v| v.is_const).unwrap_or(false) {
                    return false;
                }
                scope.parent
            }
            ScopeKind::Function => scope.parent.and_then(|set| self.tree.parent(set)),
            _ => return false,
        };
        owner.map(|o| self.tree.kind(o)) == Some(ScopeKind::Compound) && !scope.is_static() && !scope.is_constructor()
    }

    /// `from` が静的な文脈（`this` が存在しない）か
    pub(super) fn is_static_context(&self, from: ScopeId) -> bool {
        for scope in self.tree.ancestors(from) {
            let data = self.tree.get(scope);
            match data.kind() {
                ScopeKind::Function => {
                    if data.is_constructor() {
                        return false;
                    }
                    let in_compound = self
                        .tree
                        .parent(scope)
                        .and_then(|set| self.tree.parent(set))
                        .map(|o| self.tree.kind(o) == ScopeKind::Compound)
                        .unwrap_or(false);
                    return !in_compound || data.is_static();
                }
                ScopeKind::Variable => {
                    let field = data.parent.map(|p| self.tree.kind(p)) == Some(ScopeKind::Compound);
                    if field {
                        return data.is_static();
                    }
                }
                ScopeKind::Compound => return false,
                ScopeKind::Module => return true,
                _ => {}
            }
        }
        true
    }
}
