// ==========================================
// 营销后台 - 命令行入口
// ==========================================
// 用法:
//   campaign-backoffice <db_path> <file>... [--set key=value]...
// 输出: stdout 为 JSON 导入报告,日志写 stderr
// 退出码: 0 已提交 / 1 整批回滚 / 2 已取消或运行错误
// ==========================================

use anyhow::{bail, Context, Result};
use campaign_backoffice::api::{ApiError, ImportApi, ImportApiResponse};
use campaign_backoffice::logging;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

struct CliArgs {
    db_path: String,
    files: Vec<String>,
    overrides: Vec<(String, String)>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .context("缺少数据库路径\n用法: campaign-backoffice <db_path> <file>... [--set key=value]")?;

    let mut files = Vec::new();
    let mut overrides = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--set" {
            let pair = args.next().context("--set 需要 key=value 参数")?;
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("无效的 --set 参数: {}", pair))?;
            overrides.push((key.trim().to_string(), value.to_string()));
        } else {
            files.push(arg);
        }
    }

    if files.is_empty() {
        bail!("至少需要一个导入文件");
    }

    Ok(CliArgs {
        db_path,
        files,
        overrides,
    })
}

fn print_response(response: &ImportApiResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    let api = ImportApi::new(&args.db_path)?;
    for (key, value) in &args.overrides {
        api.set_config(key, value)
            .with_context(|| format!("配置覆写失败: {}", key))?;
    }

    // Ctrl-C 触发取消,整批回滚
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号,取消导入");
            signal_token.cancel();
        }
    });

    match api.import_files(&args.files, cancel).await {
        Ok(response) => {
            print_response(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(ApiError::ImportRejected { report }) => {
            print_response(&ImportApiResponse::from_report(&report, false))?;
            for diagnostic in &report.errors {
                eprintln!("{}", diagnostic);
            }
            Ok(ExitCode::from(1))
        }
        Err(ApiError::Cancelled) => {
            eprintln!("导入已取消, 未写入任何记录");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    tracing::info!(
        "{} v{}",
        campaign_backoffice::APP_NAME,
        campaign_backoffice::VERSION
    );

    let result = match parse_args() {
        Ok(args) => run(args).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            ExitCode::from(2)
        }
    }
}
