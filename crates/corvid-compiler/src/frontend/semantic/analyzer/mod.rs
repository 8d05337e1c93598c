//! # 意味解析器
//!
//! スコープツリーを注釈しながらプログラム全体を検査します。
//!
//! 解析は次の段階で進みます。
//!
//! 1. 宣言パス: 複合型の親型と継承テーブル、関数のシグネチャとオーバーロード
//!    曖昧性、変数の型を評価する
//! 2. 定義パス: 関数本体を走査し、式の型付けと制御フローグラフを構築する
//! 3. 使用状況パス: 未使用の宣言とインポートを警告する
//!
//! 宣言の評価は要求駆動です。名前解決が未評価の宣言に出会うとその場で評価し、
//! 3状態（未着手・評価中・完了）のマーカーで循環を検出します。
//! エラーは宣言単位で記録され、解析はそのまま次の宣言へ進みます。

mod access;
mod assign;
mod cast;
mod expr;
mod inherit;
mod overload;
mod resolve;
mod stmt;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticEmitter;
use crate::driver::loader::SourceLoader;
use crate::driver::modules::ModuleSet;
use crate::frontend::ast::NodeId;
use crate::frontend::error::{CompilerError, ErrorCollector, ErrorKind, ErrorSeverity, Result};

use super::cfg::FlowState;
use super::scope::{ScopeId, ScopeKind};
use super::symbol_table::ScopeTree;
use super::types::TypeInfo;
use super::usage::check_usage;

/// 基本モジュールが提供する組み込み型
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub any: ScopeId,
    pub void: ScopeId,
    pub bool: ScopeId,
    pub int: ScopeId,
    pub float: ScopeId,
    pub string: ScopeId,
    pub throwable: ScopeId,
}

/// 関数本体の走査中の状態
struct FunctionFlow {
    /// 走査中の関数（または無名関数）
    function: ScopeId,
    /// 宣言された戻り値の型
    ret: TypeInfo,
    /// コンストラクタか
    is_constructor: bool,
    /// CFG構築状態
    state: FlowState,
}

/// 解析結果
#[derive(Debug)]
pub struct Program {
    /// 注釈済みのスコープツリー
    pub tree: ScopeTree,
    /// ファイルモジュール（読み込み順、先頭は基本モジュール）
    pub modules: Vec<ScopeId>,
    /// エントリモジュール
    pub entry: Option<ScopeId>,
    /// エラー
    pub errors: Vec<CompilerError>,
    /// 警告
    pub warnings: Vec<CompilerError>,
    /// 呼び出し式（モジュール, ノードID）から選択された関数への対応
    pub call_bindings: HashMap<(ScopeId, NodeId), ScopeId>,
}

impl Program {
    /// エラーがあるか
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 指定した種類のエラー
    pub fn errors_of(&self, kind: ErrorKind) -> Vec<&CompilerError> {
        self.errors.iter().filter(|e| e.kind == kind).collect()
    }

    /// 指定した種類の警告
    pub fn warnings_of(&self, kind: ErrorKind) -> Vec<&CompilerError> {
        self.warnings.iter().filter(|e| e.kind == kind).collect()
    }

    /// 修飾名（`main.Point.x`）でスコープを検索
    pub fn lookup(&self, path: &str) -> Option<ScopeId> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self
            .modules
            .iter()
            .copied()
            .find(|&m| self.tree.get(m).name == first)?;
        for segment in segments {
            current = self.tree.member(current, segment)?;
        }
        Some(current)
    }
}

/// 意味解析器
pub struct Analyzer<'l> {
    tree: ScopeTree,
    options: CompilerOptions,
    modules: ModuleSet<'l>,
    builtins: Option<Builtins>,
    basic: Option<ScopeId>,
    /// 名前解決の起点となる現在のスコープ
    current: ScopeId,
    flow: Option<FunctionFlow>,
    emitter: DiagnosticEmitter,
    call_bindings: HashMap<(ScopeId, NodeId), ScopeId>,
    block_counter: usize,
    lambda_counter: usize,
}

impl<'l> Analyzer<'l> {
    /// 新しい解析器を作成
    pub fn new(loader: &'l dyn SourceLoader, options: CompilerOptions) -> Self {
        let modules = ModuleSet::new(loader, options.import_dirs.clone());
        Self {
            tree: ScopeTree::new(),
            options,
            modules,
            builtins: None,
            basic: None,
            current: ScopeId(0),
            flow: None,
            emitter: DiagnosticEmitter::new(),
            call_bindings: HashMap::new(),
            block_counter: 0,
            lambda_counter: 0,
        }
    }

    /// エントリファイル（またはディレクトリ）から解析する
    pub fn analyze_entry(mut self, entry: &Path) -> Program {
        info!("意味解析を開始: {}", entry.display());
        let mut errors = ErrorCollector::new();

        let basic_source = self.options.basic_module.clone();
        match self.modules.load_basic(&mut self.tree, basic_source.as_deref()) {
            Ok(basic) => {
                self.basic = Some(basic);
                errors.absorb(self.init_builtins(basic));
            }
            Err(group) => {
                errors.extend(group);
                return self.finish(None, errors);
            }
        }
        if errors.has_errors() {
            return self.finish(None, errors);
        }

        let entry = errors.absorb(self.modules.load_path(&mut self.tree, entry));

        let mut declared = 0;
        let mut defined = 0;
        loop {
            while declared < self.modules.files().len() {
                let module = self.modules.files()[declared];
                declared += 1;
                self.declaration_pass(module, &mut errors);
            }
            if defined < self.modules.files().len() {
                let module = self.modules.files()[defined];
                defined += 1;
                self.definition_pass(module, &mut errors);
                continue;
            }
            break;
        }

        let analyzed: Vec<ScopeId> = self.modules.files().to_vec();
        for warning in check_usage(&self.tree, &analyzed) {
            self.emitter.warn(warning);
        }
        self.finish(entry, errors)
    }

    fn finish(mut self, entry: Option<ScopeId>, errors: ErrorCollector) -> Program {
        let mut errors = match errors.finish() {
            Ok(()) => Vec::new(),
            Err(group) => group.into_errors(),
        };
        let mut warnings = self.emitter.take();
        if self.options.warnings_as_errors {
            errors.extend(
                warnings
                    .drain(..)
                    .map(|w| w.with_severity(ErrorSeverity::Error)),
            );
        }
        info!("意味解析を終了: エラー {}件, 警告 {}件", errors.len(), warnings.len());
        Program {
            tree: self.tree,
            modules: self.modules.files().to_vec(),
            entry,
            errors,
            warnings,
            call_bindings: self.call_bindings,
        }
    }

    fn init_builtins(&mut self, basic: ScopeId) -> Result<()> {
        let lookup = |name: &str| {
            self.tree
                .member(basic, name)
                .filter(|&id| self.tree.kind(id) == ScopeKind::Compound)
                .ok_or_else(|| CompilerError::internal(format!("基本モジュールに型 '{}' がありません", name)))
        };
        self.builtins = Some(Builtins {
            any: lookup("any")?,
            void: lookup("void")?,
            bool: lookup("bool")?,
            int: lookup("int")?,
            float: lookup("float")?,
            string: lookup("string")?,
            throwable: lookup("Throwable")?,
        });
        Ok(())
    }

    /// 組み込み型
    fn builtins(&self) -> Result<Builtins> {
        self.builtins
            .ok_or_else(|| CompilerError::internal("基本モジュールが読み込まれていません").into())
    }

    fn builtin_type(&self, pick: impl Fn(&Builtins) -> ScopeId, nullable: bool) -> Result<TypeInfo> {
        Ok(TypeInfo::basic(pick(&self.builtins()?), nullable))
    }

    /// 基本モジュールに属するスコープか
    fn in_basic(&self, id: ScopeId) -> bool {
        self.tree
            .enclosing_module(id)
            .and_then(|m| self.tree.get(m).as_module())
            .map(|m| m.is_basic)
            .unwrap_or(false)
    }

    /// スコープが属するファイル
    fn file_of(&self, id: ScopeId) -> Option<PathBuf> {
        self.tree
            .enclosing_module(id)
            .and_then(|m| self.tree.get(m).as_module())
            .map(|m| m.file.clone())
    }

    /// エラーにスコープのファイルを設定
    fn tag<T>(&self, id: ScopeId, result: Result<T>) -> Result<T> {
        match (result, self.file_of(id)) {
            (Err(group), Some(file)) => Err(group.with_file_path(file)),
            (result, _) => result,
        }
    }

    /// 別の宣言の文脈で評価する（関数本体の状態は退避される）
    fn in_scope<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved_scope = std::mem::replace(&mut self.current, scope);
        let saved_flow = self.flow.take();
        let result = f(self);
        self.current = saved_scope;
        self.flow = saved_flow;
        self.tag(scope, result)
    }

    /// 同じ関数本体の中で現在のスコープだけを切り替える
    fn with_current<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved_scope = std::mem::replace(&mut self.current, scope);
        let result = f(self);
        self.current = saved_scope;
        result
    }

    /// 警告を発行（現在のモジュールのファイルを付ける）
    fn warn(&mut self, warning: CompilerError) {
        let warning = match self.file_of(self.current) {
            Some(file) => warning.with_file_path(file),
            None => warning,
        };
        self.emitter.warn(warning);
    }

    /// 宣言パス
    fn declaration_pass(&mut self, module: ScopeId, errors: &mut ErrorCollector) {
        if self.tree.kind(module) != ScopeKind::Module {
            return;
        }
        debug!("宣言パス: {}", self.tree.qualified_name(module));
        for error in self.modules.take_errors(module) {
            errors.push(error);
        }
        let members: Vec<ScopeId> = self.tree.get(module).members().map(|(_, id)| id).collect();
        for member in members {
            self.declare_member(member, errors);
        }
    }

    fn declare_member(&mut self, member: ScopeId, errors: &mut ErrorCollector) {
        match self.tree.kind(member) {
            ScopeKind::Compound => {
                let result = self.eval_compound(member);
                errors.absorb(self.tag(member, result));
                let members: Vec<ScopeId> = self.tree.get(member).members().map(|(_, id)| id).collect();
                for nested in members {
                    self.declare_member(nested, errors);
                }
            }
            ScopeKind::FunctionSet => {
                let result = self.check_funs(member);
                errors.absorb(self.tag(member, result));
            }
            ScopeKind::Variable => {
                let result = self.eval_variable(member);
                errors.absorb(self.tag(member, result));
            }
            _ => {}
        }
    }

    /// 定義パス
    fn definition_pass(&mut self, module: ScopeId, errors: &mut ErrorCollector) {
        if self.tree.kind(module) != ScopeKind::Module {
            return;
        }
        debug!("定義パス: {}", self.tree.qualified_name(module));
        let members: Vec<ScopeId> = self.tree.get(module).members().map(|(_, id)| id).collect();
        for member in members {
            self.define_member(member, errors);
        }
    }

    fn define_member(&mut self, member: ScopeId, errors: &mut ErrorCollector) {
        match self.tree.kind(member) {
            ScopeKind::Compound => {
                let members: Vec<ScopeId> = self.tree.get(member).members().map(|(_, id)| id).collect();
                for nested in members {
                    self.define_member(nested, errors);
                }
            }
            ScopeKind::FunctionSet => {
                let functions: Vec<ScopeId> = self
                    .tree
                    .get(member)
                    .as_function_set()
                    .map(|set| set.functions.iter().map(|&(_, f)| f).collect())
                    .unwrap_or_default();
                for function in functions {
                    let result = self.analyze_function_body(function);
                    errors.absorb(self.tag(function, result));
                }
            }
            _ => {}
        }
    }
}

/// ファイルシステム上のエントリを解析する
pub fn analyze_path(loader: &dyn SourceLoader, options: CompilerOptions, entry: &Path) -> Program {
    Analyzer::new(loader, options).analyze_entry(entry)
}
