//! # evalmux CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 批次配置加载与验证
//! - 批次执行 (加载 → 分发 → 汇总 → 输出)
//! - 中断处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_batch, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(observability::ObservabilityConfig::new(
        cli.log_format.into(),
        default_log_level(&cli),
    ))?;

    info!(version = env!("CARGO_PKG_VERSION"), "evalmux starting");

    let result = match &cli.command {
        Commands::Run(args) => run_batch(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// `RUST_LOG` 优先；否则由 -q / -v 决定
fn default_log_level(cli: &Cli) -> &'static str {
    if cli.quiet {
        return "warn";
    }
    match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
