//! 設定ファイル `corvid.toml` の読み込み

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use corvid_compiler::CompilerOptions;
use log::debug;

/// エントリと同じディレクトリで探す設定ファイル名
pub const CONFIG_FILE: &str = "corvid.toml";

/// 設定ファイルを読み込む
///
/// 相対パスは設定ファイルのあるディレクトリを基準に解決します。
pub fn load_options(path: &Path) -> Result<CompilerOptions> {
    debug!("設定ファイルを読み込み: {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("設定ファイル {} を読み込めません", path.display()))?;
    let mut options: CompilerOptions =
        toml::from_str(&text).with_context(|| format!("設定ファイル {} の形式が不正です", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    options.basic_module = options.basic_module.map(|p| relative_to(base, p));
    options.import_dirs = options
        .import_dirs
        .into_iter()
        .map(|p| relative_to(base, p))
        .collect();
    Ok(options)
}

fn relative_to(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "import_dirs = [\"lib\", \"/abs\"]\nwarnings_as_errors = true\nparallel_threshold = 2\n",
        )
        .unwrap();

        let options = load_options(&path).unwrap();
        assert_eq!(options.import_dirs, vec![dir.path().join("lib"), PathBuf::from("/abs")]);
        assert!(options.warnings_as_errors);
        assert_eq!(options.parallel_threshold, 2);
        assert_eq!(options.basic_module, None);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "optimize = true\n").unwrap();
        assert!(load_options(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = load_options(&dir.path().join("none.toml")).unwrap_err();
        assert!(error.to_string().contains("読み込めません"));
    }
}
