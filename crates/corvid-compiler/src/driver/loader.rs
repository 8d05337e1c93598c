//! # ソースローダー
//!
//! モジュールのソースコードを読み込むための抽象化です。
//! 通常はファイルシステムから読み込み、テストではメモリ上のファイル集合を使います。

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::frontend::error::{CompilerError, ErrorKind};

/// ソースファイルの拡張子
pub const SOURCE_EXTENSION: &str = "crv";

/// 読み込みエラー
#[derive(Debug, Error)]
pub enum LoadError {
    /// 入出力エラー
    #[error("'{path}' を読み込めません: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 存在しない
    #[error("'{0}' が見つかりません")]
    NotFound(PathBuf),
    /// ソースファイルでもディレクトリでもない
    #[error("'{0}' はソースファイルでもディレクトリでもありません")]
    NotSource(PathBuf),
}

impl From<LoadError> for CompilerError {
    fn from(error: LoadError) -> Self {
        let path = match &error {
            LoadError::Io { path, .. } | LoadError::NotFound(path) | LoadError::NotSource(path) => path.clone(),
        };
        CompilerError::new(ErrorKind::UnresolvedImport, error.to_string(), None).with_file_path(path)
    }
}

/// ソースコードの読み込み元
pub trait SourceLoader {
    /// ファイルの内容を読み込む
    fn read(&self, path: &Path) -> Result<String, LoadError>;

    /// 正規化した絶対パス（モジュールキャッシュのキー）
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError>;

    /// ファイルが存在するか
    fn is_file(&self, path: &Path) -> bool;

    /// ディレクトリが存在するか
    fn is_dir(&self, path: &Path) -> bool;
}

/// ファイルシステムから読み込むローダー
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn read(&self, path: &Path) -> Result<String, LoadError> {
        fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError> {
        fs::canonicalize(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
            _ => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// メモリ上のファイル集合から読み込むローダー
///
/// ディレクトリは登録されたファイルのパスから暗黙に決まります。
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryLoader {
    /// 空のローダーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルを追加
    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.add_file(path, source);
        self
    }

    /// ファイルを追加
    pub fn add_file(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), source.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn read(&self, path: &Path) -> Result<String, LoadError> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, LoadError> {
        let normalized = normalize(path);
        if self.is_file(&normalized) || self.is_dir(&normalized) {
            Ok(normalized)
        } else {
            Err(LoadError::NotFound(path.to_path_buf()))
        }
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize(path);
        self.files.keys().any(|file| file != &dir && file.starts_with(&dir))
    }
}

/// `.` と `..` を字句的に取り除いたパス
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c.crv")), PathBuf::from("/a/c.crv"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_memory_loader_directories() {
        let loader = MemoryLoader::new()
            .with_file("/app/main.crv", "var x = 1")
            .with_file("/app/util/text.crv", "");
        assert!(loader.is_file(Path::new("/app/main.crv")));
        assert!(loader.is_dir(Path::new("/app/util")));
        assert!(!loader.is_dir(Path::new("/app/main.crv")));
        assert_eq!(loader.read(Path::new("/app/./main.crv")).unwrap(), "var x = 1");
        assert!(matches!(
            loader.canonicalize(Path::new("/app/missing.crv")),
            Err(LoadError::NotFound(_))
        ));
    }

    #[test]
    fn test_fs_loader_with_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.crv");
        std::fs::write(&file, "var x = 1").unwrap();
        let loader = FsLoader;
        assert!(loader.is_file(&file));
        assert!(loader.is_dir(dir.path()));
        assert_eq!(loader.read(&file).unwrap(), "var x = 1");
        assert!(loader.canonicalize(&dir.path().join("none.crv")).is_err());
    }

    #[test]
    fn test_load_error_becomes_import_error() {
        let error: CompilerError = LoadError::NotFound(PathBuf::from("x.crv")).into();
        assert_eq!(error.kind, ErrorKind::UnresolvedImport);
        assert_eq!(error.file_path, Some(PathBuf::from("x.crv")));
    }
}
