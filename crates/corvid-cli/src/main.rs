/*
 * Corvid CLI - メインエントリーポイント
 *
 * コマンドライン引数を解析し、意味解析を実行して診断を出力します。
 * エラーが一件でもあれば終了コード1で終了します。
 */

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use log::{error, info};

mod cli;
mod config;
mod report;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    cli::setup_logging(cli.verbose);

    match cli::run(&cli) {
        Ok(true) => {
            info!("解析が正常に完了しました");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("実行に失敗しました: {:#}", e);
            eprintln!("{} {:#}", "エラー:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
