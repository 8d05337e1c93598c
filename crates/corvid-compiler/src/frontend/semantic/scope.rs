//! # スコープ
//!
//! スコープツリーの各ノードを定義するモジュールです。
//! スコープはアリーナ（[`ScopeTree`](super::symbol_table::ScopeTree)）に格納され、
//! 親や継承テーブルは [`ScopeId`] で参照します。

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::frontend::ast::{
    CompoundDecl, CompoundKind, FunctionDecl, Import, Modifiers, Module, ModifierKind, VariableDecl,
};
use crate::frontend::error::SourceLocation;

use super::cfg::ControlFlowGraph;
use super::symbol_path::SymbolPath;
use super::types::{FunctionType, TypeInfo};

/// スコープID（アリーナ内のインデックス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 遅延評価の進行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eval {
    /// 未着手
    #[default]
    NotStarted,
    /// 評価中（再突入は循環の検出を意味する）
    InProgress,
    /// 完了
    Done,
}

/// スコープの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// ディレクトリ
    FolderModule,
    /// ソースファイル
    Module,
    /// クラス・インターフェース・列挙型・アノテーション
    Compound,
    /// 関数
    Function,
    /// 同名関数のオーバーロード集合
    FunctionSet,
    /// ブロック
    Block,
    /// 変数・フィールド・パラメータ
    Variable,
    /// 列挙子
    Enumerator,
    /// 無名関数
    Lambda,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ScopeKind::FolderModule => "フォルダモジュール",
            ScopeKind::Module => "モジュール",
            ScopeKind::Compound => "複合型",
            ScopeKind::Function => "関数",
            ScopeKind::FunctionSet => "関数",
            ScopeKind::Block => "ブロック",
            ScopeKind::Variable => "変数",
            ScopeKind::Enumerator => "列挙子",
            ScopeKind::Lambda => "無名関数",
        };
        write!(f, "{}", text)
    }
}

/// インポートの解決状態
#[derive(Debug, Clone)]
pub struct ImportEntry {
    /// インポート宣言
    pub decl: Arc<Import>,
    /// 解決先のモジュール
    pub target: Option<ScopeId>,
    /// 名前解決で一度でも経由されたか
    pub is_used: bool,
}

/// ディレクトリモジュールのデータ
#[derive(Debug, Clone, Default)]
pub struct FolderData {
    /// ディレクトリのパス
    pub dir: PathBuf,
    /// 読み込み済みのエントリ（所有しない参照）
    pub entries: HashMap<String, ScopeId>,
}

/// ファイルモジュールのデータ
#[derive(Debug, Clone)]
pub struct ModuleData {
    /// 構文木
    pub ast: Arc<Module>,
    /// ソースファイルのパス
    pub file: PathBuf,
    /// インポート
    pub imports: Vec<ImportEntry>,
    /// 組み込みの基本モジュールか
    pub is_basic: bool,
}

/// 複合型のデータ
#[derive(Debug, Clone)]
pub struct CompoundData {
    /// 宣言
    pub decl: Arc<CompoundDecl>,
    /// 宣言パスの評価状態
    pub eval: Eval,
    /// 直接の親型
    pub supers: Vec<ScopeId>,
    /// 継承したフィールド（所有しない参照）
    pub super_fields: Vec<ScopeId>,
    /// 継承した関数（名前、関数）。実装済みの抽象関数は取り除かれる
    pub super_functions: Vec<(String, ScopeId)>,
}

impl CompoundData {
    /// 種類
    pub fn kind(&self) -> CompoundKind {
        self.decl.kind
    }
}

/// 関数のデータ（無名関数も共通）
#[derive(Debug, Clone)]
pub struct FunctionData {
    /// 宣言
    pub decl: Arc<FunctionDecl>,
    /// プロトタイプ（シグネチャ）の評価状態
    pub proto_eval: Eval,
    /// 解決済みのシグネチャ
    pub ty: Option<FunctionType>,
    /// パラメータの変数スコープ（宣言順）
    pub params: Vec<ScopeId>,
    /// 本体の解析が済んだか
    pub body_done: bool,
    /// 本体の制御フローグラフ
    pub cfg: Option<ControlFlowGraph>,
}

impl FunctionData {
    /// 新しい関数データ
    pub fn new(decl: Arc<FunctionDecl>) -> Self {
        Self {
            decl,
            proto_eval: Eval::NotStarted,
            ty: None,
            params: Vec::new(),
            body_done: false,
            cfg: None,
        }
    }
}

/// オーバーロード集合のデータ
#[derive(Debug, Clone, Default)]
pub struct FunctionSetData {
    /// (シグネチャ, 関数)。宣言時は構文上のシグネチャ、曖昧性検査後は解決済みのシグネチャ
    pub functions: Vec<(String, ScopeId)>,
    /// 宣言の曖昧性検査が済んだか
    pub checked: bool,
}

/// 変数の由来
#[derive(Debug, Clone)]
pub enum VariableSource {
    /// `var`/`const` 宣言
    Declared(Arc<VariableDecl>),
    /// 関数パラメータ（`ParamLists::iter()` 順のインデックス）
    Parameter { function: Arc<FunctionDecl>, index: usize },
    /// catch節の例外変数
    Catch,
}

/// 変数のデータ
#[derive(Debug, Clone)]
pub struct VariableData {
    /// 由来
    pub source: VariableSource,
    /// 評価状態
    pub eval: Eval,
    /// 解決済みの型（評価中に宣言型が先に書き込まれることもある）
    pub ty: Option<TypeInfo>,
    /// const宣言か
    pub is_const: bool,
    /// 読み出された回数
    pub accessed: usize,
    /// 代入された回数（初期化式を含む）
    pub assigned: usize,
}

impl VariableData {
    /// 新しい変数データ
    pub fn new(source: VariableSource, is_const: bool) -> Self {
        Self {
            source,
            eval: Eval::NotStarted,
            ty: None,
            is_const,
            accessed: 0,
            assigned: 0,
        }
    }

    /// パラメータか
    pub fn is_parameter(&self) -> bool {
        matches!(self.source, VariableSource::Parameter { .. })
    }
}

/// 種類ごとのスコープデータ
#[derive(Debug, Clone)]
pub enum ScopeData {
    FolderModule(FolderData),
    Module(ModuleData),
    Compound(CompoundData),
    Function(FunctionData),
    FunctionSet(FunctionSetData),
    Block,
    Variable(VariableData),
    Enumerator,
    Lambda(FunctionData),
}

/// スコープ
#[derive(Debug, Clone)]
pub struct Scope {
    /// 宣言名
    pub name: String,
    /// 修飾パス
    pub path: SymbolPath,
    /// 宣言位置
    pub location: Option<SourceLocation>,
    /// 親スコープ（ルートはNone）
    pub parent: Option<ScopeId>,
    /// 修飾子
    pub modifiers: Modifiers,
    /// 参照された回数
    pub usage: usize,
    /// 種類ごとのデータ
    pub data: ScopeData,
    members: Vec<(String, ScopeId)>,
    index: HashMap<String, usize>,
}

impl Scope {
    /// 新しいスコープを作成
    pub fn new(name: impl Into<String>, path: SymbolPath, location: Option<SourceLocation>, data: ScopeData) -> Self {
        Self {
            name: name.into(),
            path,
            location,
            parent: None,
            modifiers: Modifiers::default(),
            usage: 0,
            data,
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// 修飾子を設定
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// 種類（データから決まり、変化しない）
    pub fn kind(&self) -> ScopeKind {
        match &self.data {
            ScopeData::FolderModule(_) => ScopeKind::FolderModule,
            ScopeData::Module(_) => ScopeKind::Module,
            ScopeData::Compound(_) => ScopeKind::Compound,
            ScopeData::Function(_) => ScopeKind::Function,
            ScopeData::FunctionSet(_) => ScopeKind::FunctionSet,
            ScopeData::Block => ScopeKind::Block,
            ScopeData::Variable(_) => ScopeKind::Variable,
            ScopeData::Enumerator => ScopeKind::Enumerator,
            ScopeData::Lambda(_) => ScopeKind::Lambda,
        }
    }

    /// 修飾子を持つか
    pub fn has_modifier(&self, kind: ModifierKind) -> bool {
        self.modifiers.has(kind)
    }

    /// static宣言か
    pub fn is_static(&self) -> bool {
        self.has_modifier(ModifierKind::Static)
    }

    /// メンバーを名前で検索
    pub fn member(&self, name: &str) -> Option<ScopeId> {
        self.index.get(name).map(|&i| self.members[i].1)
    }

    /// メンバーを宣言順に列挙
    pub fn members(&self) -> impl Iterator<Item = (&str, ScopeId)> {
        self.members.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// メンバー数
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// メンバーを追加（同名が既にあれば既存のIDを返す）
    pub(crate) fn insert_member(&mut self, name: &str, id: ScopeId) -> std::result::Result<(), ScopeId> {
        if let Some(existing) = self.member(name) {
            return Err(existing);
        }
        self.index.insert(name.to_string(), self.members.len());
        self.members.push((name.to_string(), id));
        Ok(())
    }

    pub fn as_compound(&self) -> Option<&CompoundData> {
        match &self.data {
            ScopeData::Compound(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut CompoundData> {
        match &mut self.data {
            ScopeData::Compound(data) => Some(data),
            _ => None,
        }
    }

    /// 関数または無名関数のデータ
    pub fn as_function(&self) -> Option<&FunctionData> {
        match &self.data {
            ScopeData::Function(data) | ScopeData::Lambda(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.data {
            ScopeData::Function(data) | ScopeData::Lambda(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_function_set(&self) -> Option<&FunctionSetData> {
        match &self.data {
            ScopeData::FunctionSet(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_function_set_mut(&mut self) -> Option<&mut FunctionSetData> {
        match &mut self.data {
            ScopeData::FunctionSet(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&VariableData> {
        match &self.data {
            ScopeData::Variable(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut VariableData> {
        match &mut self.data {
            ScopeData::Variable(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match &self.data {
            ScopeData::Module(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_module_mut(&mut self) -> Option<&mut ModuleData> {
        match &mut self.data {
            ScopeData::Module(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderData> {
        match &self.data {
            ScopeData::FolderModule(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_folder_mut(&mut self) -> Option<&mut FolderData> {
        match &mut self.data {
            ScopeData::FolderModule(data) => Some(data),
            _ => None,
        }
    }

    /// コンストラクタか
    pub fn is_constructor(&self) -> bool {
        self.as_function().map(|f| f.decl.is_constructor).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_keep_declaration_order() {
        let mut scope = Scope::new("m", SymbolPath::from_segment("m"), None, ScopeData::Block);
        scope.insert_member("b", ScopeId(2)).unwrap();
        scope.insert_member("a", ScopeId(1)).unwrap();
        assert_eq!(scope.insert_member("b", ScopeId(3)), Err(ScopeId(2)));

        let names: Vec<&str> = scope.members().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(scope.member("a"), Some(ScopeId(1)));
        assert_eq!(scope.kind(), ScopeKind::Block);
    }
}
