//! # モジュールの読み込みとインポート解決
//!
//! ソースファイルとディレクトリをスコープツリーのルートとして読み込みます。
//! 同じ正規化パスのファイルは一度しか読み込まれず、2回目以降は同じ
//! スコープを返します。モジュールはインポートを解決する前にキャッシュへ
//! 登録されるため、循環インポートも有限の処理で終わります。
//!
//! ディレクトリ（フォルダモジュール）のエントリはメンバーアクセス時に遅延して
//! 読み込まれ、所有者はディレクトリではなく読み込んだファイル自身です。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, trace};

use crate::frontend::ast::Import;
use crate::frontend::error::{CompilerError, ErrorKind, Result};
use crate::frontend::parser::parse_source;
use crate::frontend::semantic::builder::{redeclaration, ScopeBuilder};
use crate::frontend::semantic::scope::{FolderData, Scope, ScopeData, ScopeId};
use crate::frontend::semantic::symbol_path::SymbolPath;
use crate::frontend::semantic::symbol_table::ScopeTree;

use super::loader::{LoadError, SourceLoader, SOURCE_EXTENSION};

/// 組み込みの基本モジュールのソース
pub const BASIC_SOURCE: &str = include_str!("../../lib/basic.crv");

/// 組み込みの基本モジュールに割り当てるパス
pub const BASIC_PATH: &str = "<basic>/basic.crv";

/// 読み込み済みモジュールの集合
pub struct ModuleSet<'l> {
    loader: &'l dyn SourceLoader,
    import_dirs: Vec<PathBuf>,
    /// 正規化パス → モジュール
    cache: HashMap<PathBuf, ScopeId>,
    /// ファイルモジュール（読み込み順）
    files: Vec<ScopeId>,
    /// インポート解決のエラー（モジュールごと）
    pending: HashMap<ScopeId, Vec<CompilerError>>,
}

impl<'l> ModuleSet<'l> {
    /// 新しいモジュール集合を作成
    pub fn new(loader: &'l dyn SourceLoader, import_dirs: Vec<PathBuf>) -> Self {
        Self {
            loader,
            import_dirs,
            cache: HashMap::new(),
            files: Vec::new(),
            pending: HashMap::new(),
        }
    }

    /// 読み込み済みのファイルモジュール（読み込み順）
    pub fn files(&self) -> &[ScopeId] {
        &self.files
    }

    /// 基本モジュールを読み込む
    ///
    /// `source` が None なら組み込みのソースを使います。
    pub fn load_basic(&mut self, tree: &mut ScopeTree, source: Option<&Path>) -> Result<ScopeId> {
        match source {
            Some(path) => {
                let canonical = self.loader.canonicalize(path).map_err(CompilerError::from)?;
                let text = self.loader.read(&canonical).map_err(CompilerError::from)?;
                self.build(tree, &text, canonical, true)
            }
            None => self.build(tree, BASIC_SOURCE, PathBuf::from(BASIC_PATH), true),
        }
    }

    /// ファイルまたはディレクトリを読み込む（キャッシュ済みなら同じスコープを返す）
    pub fn load_path(&mut self, tree: &mut ScopeTree, path: &Path) -> Result<ScopeId> {
        let canonical = self.loader.canonicalize(path).map_err(CompilerError::from)?;
        if let Some(&cached) = self.cache.get(&canonical) {
            trace!("キャッシュ済みモジュール: {}", canonical.display());
            return Ok(cached);
        }
        if self.loader.is_file(&canonical) {
            if canonical.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
                return Err(CompilerError::from(LoadError::NotSource(canonical)).into());
            }
            let text = self.loader.read(&canonical).map_err(CompilerError::from)?;
            self.build(tree, &text, canonical, false)
        } else if self.loader.is_dir(&canonical) {
            Ok(self.folder(tree, canonical))
        } else {
            Err(CompilerError::from(LoadError::NotSource(canonical)).into())
        }
    }

    /// フォルダモジュールのエントリを遅延して読み込む
    pub fn folder_entry(&mut self, tree: &mut ScopeTree, folder: ScopeId, name: &str) -> Result<Option<ScopeId>> {
        let Some(data) = tree.get(folder).as_folder() else {
            return Ok(None);
        };
        if let Some(&entry) = data.entries.get(name) {
            return Ok(Some(entry));
        }
        let Some(path) = self.locate(&data.dir.join(name)) else {
            return Ok(None);
        };
        let entry = self.load_path(tree, &path)?;
        if let Some(data) = tree.get_mut(folder).as_folder_mut() {
            data.entries.insert(name.to_string(), entry);
        }
        Ok(Some(entry))
    }

    /// モジュールのインポート解決エラーを取り出す
    pub fn take_errors(&mut self, module: ScopeId) -> Vec<CompilerError> {
        self.pending.remove(&module).unwrap_or_default()
    }

    fn build(&mut self, tree: &mut ScopeTree, source: &str, file: PathBuf, is_basic: bool) -> Result<ScopeId> {
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        debug!("モジュール読み込み: {} ({})", name, file.display());
        let ast = parse_source(source, &name, &file)?;
        let module = ScopeBuilder::new(tree).build_module(
            Arc::new(ast),
            file.clone(),
            SymbolPath::from_segment(name),
            is_basic,
        )?;
        self.cache.insert(file.clone(), module);
        self.files.push(module);

        let errors = self.resolve_imports(tree, module, &file);
        if !errors.is_empty() {
            let errors = errors.into_iter().map(|e| e.with_file_path(&file)).collect();
            self.pending.insert(module, errors);
        }
        Ok(module)
    }

    fn folder(&mut self, tree: &mut ScopeTree, dir: PathBuf) -> ScopeId {
        let name = dir.file_name().and_then(|s| s.to_str()).unwrap_or("").to_string();
        debug!("フォルダモジュール: {}", dir.display());
        let data = FolderData {
            dir: dir.clone(),
            entries: HashMap::new(),
        };
        let id = tree.add_root(Scope::new(
            name.clone(),
            SymbolPath::from_segment(name),
            None,
            ScopeData::FolderModule(data),
        ));
        self.cache.insert(dir, id);
        id
    }

    /// `base` をファイル（`base.crv`）またはディレクトリとして探す
    fn locate(&self, base: &Path) -> Option<PathBuf> {
        let mut file = base.as_os_str().to_owned();
        file.push(".");
        file.push(SOURCE_EXTENSION);
        let file = PathBuf::from(file);
        if self.loader.is_file(&file) {
            Some(file)
        } else if self.loader.is_dir(base) {
            Some(base.to_path_buf())
        } else {
            None
        }
    }

    /// インポートの検索先の候補
    fn candidates(&self, import: &Import, file: &Path) -> Vec<PathBuf> {
        let relative: PathBuf = import.segments.iter().map(|s| s.name.as_str()).collect();
        if import.relative == 0 {
            return self.import_dirs.iter().map(|dir| dir.join(&relative)).collect();
        }
        let mut base = file.parent().map(Path::to_path_buf).unwrap_or_default();
        for _ in 1..import.relative {
            base.push("..");
        }
        vec![base.join(relative)]
    }

    fn resolve_imports(&mut self, tree: &mut ScopeTree, module: ScopeId, file: &Path) -> Vec<CompilerError> {
        let mut errors = Vec::new();
        let imports: Vec<Arc<Import>> = match tree.get(module).as_module() {
            Some(data) => data.imports.iter().map(|entry| Arc::clone(&entry.decl)).collect(),
            None => return errors,
        };

        for (index, import) in imports.iter().enumerate() {
            if let Some(name) = import.binding_name() {
                let previous = imports[..index].iter().find(|other| other.binding_name() == Some(name));
                if let Some(previous) = previous {
                    errors.push(redeclaration(name, import.location, Some(previous.location)));
                    continue;
                }
            }

            let found = self
                .candidates(import, file)
                .into_iter()
                .find_map(|candidate| self.locate(&candidate));
            let Some(path) = found else {
                errors.push(CompilerError::new(
                    ErrorKind::UnresolvedImport,
                    format!("モジュール '{}' が見つかりません", import.display_path()),
                    Some(import.location),
                ));
                continue;
            };

            match self.load_path(tree, &path) {
                Ok(target) => {
                    trace!("インポート解決: {} -> {}", import.display_path(), tree.qualified_name(target));
                    if let Some(data) = tree.get_mut(module).as_module_mut() {
                        data.imports[index].target = Some(target);
                    }
                }
                Err(group) => {
                    for error in group {
                        errors.push(error.with_diagnostic(crate::frontend::error::Diagnostic::note(
                            format!("'{}' のインポート中に発生しました", import.display_path()),
                            Some(import.location),
                        )));
                    }
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::loader::MemoryLoader;
    use crate::frontend::semantic::scope::ScopeKind;

    #[test]
    fn test_cycle_loads_each_file_once() {
        let loader = MemoryLoader::new()
            .with_file("/src/a.crv", "import b\nvar x = 1")
            .with_file("/src/b.crv", "import a\nvar y = 2");
        let mut tree = ScopeTree::new();
        let mut modules = ModuleSet::new(&loader, vec![PathBuf::from("/src")]);
        let a = modules.load_path(&mut tree, Path::new("/src/a.crv")).unwrap();
        assert_eq!(modules.files().len(), 2);

        let b = tree.get(a).as_module().unwrap().imports[0].target.unwrap();
        let back = tree.get(b).as_module().unwrap().imports[0].target.unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_relative_and_folder_imports() {
        let loader = MemoryLoader::new()
            .with_file("/p/app/main.crv", "import .util\nimport ..shared.text as t")
            .with_file("/p/app/util/io.crv", "")
            .with_file("/p/shared/text.crv", "");
        let mut tree = ScopeTree::new();
        let mut modules = ModuleSet::new(&loader, Vec::new());
        let main = modules.load_path(&mut tree, Path::new("/p/app/main.crv")).unwrap();
        assert!(modules.take_errors(main).is_empty());

        let imports = &tree.get(main).as_module().unwrap().imports;
        let util = imports[0].target.unwrap();
        assert_eq!(tree.kind(util), ScopeKind::FolderModule);
        assert_eq!(tree.kind(imports[1].target.unwrap()), ScopeKind::Module);

        let io = modules.folder_entry(&mut tree, util, "io").unwrap().unwrap();
        assert_eq!(tree.get(io).name, "io");
        assert_eq!(modules.folder_entry(&mut tree, util, "io").unwrap(), Some(io));
        assert_eq!(modules.folder_entry(&mut tree, util, "none").unwrap(), None);
    }

    #[test]
    fn test_missing_import_is_recorded() {
        let loader = MemoryLoader::new().with_file("/m/main.crv", "import nothing.here");
        let mut tree = ScopeTree::new();
        let mut modules = ModuleSet::new(&loader, vec![PathBuf::from("/m")]);
        let main = modules.load_path(&mut tree, Path::new("/m/main.crv")).unwrap();
        let errors = modules.take_errors(main);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::UnresolvedImport);
        assert!(errors[0].message.contains("nothing.here"));
    }

    #[test]
    fn test_duplicate_binding_names() {
        let loader = MemoryLoader::new()
            .with_file("/m/main.crv", "import x.a\nimport y.a")
            .with_file("/m/x/a.crv", "")
            .with_file("/m/y/a.crv", "");
        let mut tree = ScopeTree::new();
        let mut modules = ModuleSet::new(&loader, vec![PathBuf::from("/m")]);
        let main = modules.load_path(&mut tree, Path::new("/m/main.crv")).unwrap();
        let errors = modules.take_errors(main);
        assert_eq!(errors[0].kind, ErrorKind::Redeclaration);
    }

    #[test]
    fn test_embedded_basic_module_builds() {
        let loader = MemoryLoader::new();
        let mut tree = ScopeTree::new();
        let mut modules = ModuleSet::new(&loader, Vec::new());
        let basic = modules.load_basic(&mut tree, None).unwrap();
        for name in ["any", "void", "bool", "int", "float", "string", "Throwable", "Exception", "print"] {
            assert!(tree.member(basic, name).is_some(), "{} がありません", name);
        }
        assert!(tree.get(basic).as_module().unwrap().is_basic);
    }
}
