//! # スコープツリー（シンボルテーブル）
//!
//! 名前解決のための永続的なシンボルテーブルです。
//! すべてのスコープをアリーナに格納し、[`ScopeId`] で参照します。
//! ツリーは構築後に意味解析によって段階的に注釈され、コンパイル終了時に
//! まとめて破棄されます。

use std::collections::HashSet;

use super::scope::{Scope, ScopeData, ScopeId, ScopeKind};

/// スコープツリー
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    /// 空のツリーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ルートスコープ（親を持たない）を追加
    pub fn add_root(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope);
        ScopeId(self.scopes.len() - 1)
    }

    /// 親の名前空間に登録せずに子スコープを追加
    ///
    /// パラメータやオーバーロード集合内の関数のように、名前ではなく
    /// 専用のテーブルから辿るスコープに使います。
    pub fn add_child(&mut self, parent: ScopeId, mut scope: Scope) -> ScopeId {
        scope.parent = Some(parent);
        self.add_root(scope)
    }

    /// 子スコープを追加して親の名前空間に登録
    ///
    /// 同名のメンバーが既にある場合は何も追加せず既存のIDを返します。
    pub fn add_member(&mut self, parent: ScopeId, name: &str, scope: Scope) -> std::result::Result<ScopeId, ScopeId> {
        if let Some(existing) = self.get(parent).member(name) {
            return Err(existing);
        }
        let id = self.add_child(parent, scope);
        self.get_mut(parent).insert_member(name, id)?;
        Ok(id)
    }

    /// スコープを取得
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// スコープを可変で取得
    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    /// スコープ数
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// すべてのスコープID
    pub fn ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    /// 種類
    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.get(id).kind()
    }

    /// 親スコープ
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.get(id).parent
    }

    /// メンバーを名前で検索
    pub fn member(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        self.get(id).member(name)
    }

    /// 自身を含む祖先を内側から順に列挙
    pub fn ancestors(&self, id: ScopeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// 自身を含む祖先のうち、最初に条件を満たすもの
    pub fn find_ancestor(&self, id: ScopeId, predicate: impl Fn(&Scope) -> bool) -> Option<ScopeId> {
        self.ancestors(id).find(|&a| predicate(self.get(a)))
    }

    /// 囲んでいるファイルモジュール
    pub fn enclosing_module(&self, id: ScopeId) -> Option<ScopeId> {
        self.find_ancestor(id, |s| s.kind() == ScopeKind::Module)
    }

    /// 囲んでいる最も内側の複合型
    pub fn enclosing_compound(&self, id: ScopeId) -> Option<ScopeId> {
        self.find_ancestor(id, |s| s.kind() == ScopeKind::Compound)
    }

    /// 宣言が属する「クラス」（複合型、なければモジュール）
    ///
    /// オーバーロード集合内の関数は集合の所有者に属します。
    pub fn owner_class(&self, id: ScopeId) -> Option<ScopeId> {
        let parent = self.parent(id)?;
        self.find_ancestor(parent, |s| matches!(s.kind(), ScopeKind::Compound | ScopeKind::Module))
    }

    /// `ancestor` が `id` 自身または祖先か
    pub fn is_ancestor(&self, ancestor: ScopeId, id: ScopeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// 複合型の直接の親型
    pub fn supers(&self, id: ScopeId) -> &[ScopeId] {
        self.get(id).as_compound().map(|c| c.supers.as_slice()).unwrap_or(&[])
    }

    /// `sub` が `sup` 自身または（推移的な）部分型か
    ///
    /// 親型が未解決の複合型は自身とのみ一致します。
    pub fn is_subtype(&self, sub: ScopeId, sup: ScopeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![sub];
        while let Some(id) = stack.pop() {
            if id == sup {
                return true;
            }
            if visited.insert(id) {
                stack.extend(self.supers(id).iter().copied());
            }
        }
        false
    }

    /// 修飾名
    pub fn qualified_name(&self, id: ScopeId) -> String {
        self.get(id).path.to_string()
    }

    /// 関数が属するオーバーロード集合
    pub fn function_set_of(&self, function: ScopeId) -> Option<ScopeId> {
        self.parent(function)
            .filter(|&parent| matches!(self.get(parent).data, ScopeData::FunctionSet(_)))
    }
}

/// 祖先の反復子
pub struct Ancestors<'a> {
    tree: &'a ScopeTree,
    next: Option<ScopeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ScopeId;

    fn next(&mut self) -> Option<ScopeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::semantic::symbol_path::SymbolPath;

    fn block(name: &str) -> Scope {
        Scope::new(name, SymbolPath::from_segment(name), None, ScopeData::Block)
    }

    #[test]
    fn test_add_member_rejects_duplicates() {
        let mut tree = ScopeTree::new();
        let root = tree.add_root(block("root"));
        let a = tree.add_member(root, "a", block("a")).unwrap();
        assert_eq!(tree.add_member(root, "a", block("a2")), Err(a));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.parent(a), Some(root));
    }

    #[test]
    fn test_ancestors_innermost_first() {
        let mut tree = ScopeTree::new();
        let root = tree.add_root(block("root"));
        let mid = tree.add_member(root, "mid", block("mid")).unwrap();
        let leaf = tree.add_child(mid, block("leaf"));
        let chain: Vec<ScopeId> = tree.ancestors(leaf).collect();
        assert_eq!(chain, vec![leaf, mid, root]);
        assert!(tree.is_ancestor(root, leaf));
        assert!(!tree.is_ancestor(leaf, root));
    }
}
