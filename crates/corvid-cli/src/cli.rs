/*
 * Corvid CLI - コマンドライン引数処理モジュール
 *
 * コマンドライン引数と設定ファイルからコンパイラオプションを組み立て、
 * 意味解析の呼び出しに変換します。
 */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use corvid_compiler::{analyze_file, CompilerOptions, VERSION};
use log::{debug, info};

use crate::config;
use crate::report;

/// Corvid言語の意味解析ツール
#[derive(Parser)]
#[command(name = "corvid")]
#[command(version = VERSION)]
#[command(about = "Corvid言語の意味解析ツール", long_about = None)]
pub struct Cli {
    /// 詳細なログ出力を有効にする
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// サブコマンド
    #[command(subcommand)]
    pub command: Commands,
}

/// サブコマンド
#[derive(Subcommand)]
pub enum Commands {
    /// ソースファイルを解析して診断を出力
    Check(CheckArgs),
}

/// 解析サブコマンドの引数
#[derive(Args)]
pub struct CheckArgs {
    /// エントリファイルまたはディレクトリ
    #[arg(required = true)]
    pub file: PathBuf,

    /// 組み込みの代わりに使う基本モジュール
    #[arg(long, value_name = "FILE")]
    pub basic: Option<PathBuf>,

    /// インポートの検索ディレクトリ（指定順に検索）
    #[arg(short = 'I', long = "import-dir", value_name = "DIR")]
    pub import_dirs: Vec<PathBuf>,

    /// 設定ファイル（省略時はエントリと同じディレクトリの corvid.toml）
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 警告をエラーとして扱う
    #[arg(short = 'W', long)]
    pub warnings_as_errors: bool,

    /// 診断の出力形式
    #[arg(long, value_enum, default_value = "text")]
    pub error_format: ErrorFormat,
}

/// 診断の出力形式
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ErrorFormat {
    /// 人が読むためのテキスト
    Text,
    /// 機械処理のためのJSON
    Json,
}

/// ログ設定を初期化
pub fn setup_logging(verbose: bool) {
    let env = env_logger::Env::default().filter_or("CORVID_LOG", if verbose { "debug" } else { "error" });
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(verbose)
        .init();
}

/// サブコマンドを実行（エラーがなければ true）
pub fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Check(args) => check(args),
    }
}

/// 解析コマンドの処理
fn check(args: &CheckArgs) -> Result<bool> {
    info!("Corvid v{} で解析を開始: {}", VERSION, args.file.display());
    let options = build_options(args)?;
    debug!("コンパイラオプション: {:?}", options);

    let program = analyze_file(&args.file, options);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.error_format {
        ErrorFormat::Text => report::write_text(&mut out, &program.errors, &program.warnings),
        ErrorFormat::Json => report::write_json(&mut out, &args.file, &program.errors, &program.warnings),
    }
    .context("診断の出力に失敗しました")?;
    Ok(!program.has_errors())
}

/// 設定ファイルとコマンドライン引数からオプションを組み立てる
///
/// コマンドラインの検索ディレクトリは設定ファイルのものより先に検索されます。
/// どちらも指定されていなければエントリのあるディレクトリを検索します。
fn build_options(args: &CheckArgs) -> Result<CompilerOptions> {
    let entry_dir = entry_dir(&args.file);
    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(entry_dir.join(config::CONFIG_FILE)).filter(|p| p.is_file()),
    };
    let mut options = match &config_path {
        Some(path) => config::load_options(path)?,
        None => CompilerOptions::default(),
    };

    if let Some(basic) = &args.basic {
        options.basic_module = Some(basic.clone());
    }
    let mut import_dirs = args.import_dirs.clone();
    import_dirs.append(&mut options.import_dirs);
    if import_dirs.is_empty() {
        import_dirs.push(entry_dir);
    }
    options.import_dirs = import_dirs;
    options.warnings_as_errors |= args.warnings_as_errors;
    Ok(options)
}

/// エントリを含むディレクトリ（ディレクトリ自体が指定されればそれ自身）
fn entry_dir(entry: &Path) -> PathBuf {
    if entry.is_dir() {
        return entry.to_path_buf();
    }
    match entry.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_flags() {
        let cli = Cli::parse_from([
            "corvid",
            "check",
            "src/main.crv",
            "-I",
            "lib",
            "-I",
            "vendor",
            "--warnings-as-errors",
            "--error-format",
            "json",
        ]);
        let Commands::Check(args) = cli.command;
        assert_eq!(args.file, PathBuf::from("src/main.crv"));
        assert_eq!(args.import_dirs, vec![PathBuf::from("lib"), PathBuf::from("vendor")]);
        assert!(args.warnings_as_errors);
        assert_eq!(args.error_format, ErrorFormat::Json);
    }

    #[test]
    fn test_default_import_dir_is_entry_directory() {
        let cli = Cli::parse_from(["corvid", "check", "/nonexistent/project/main.crv"]);
        let Commands::Check(args) = cli.command;
        let options = build_options(&args).unwrap();
        assert_eq!(options.import_dirs, vec![PathBuf::from("/nonexistent/project")]);
        assert!(!options.warnings_as_errors);
    }

    #[test]
    fn test_entry_dir_of_bare_file_name() {
        assert_eq!(entry_dir(Path::new("main.crv")), PathBuf::from("."));
    }
}
