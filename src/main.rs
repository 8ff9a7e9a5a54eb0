//! A股打板复盘系统: command-line entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;

use fupan::config::Config;
use fupan::data::{EastmoneyProvider, MarketDataProvider};
use fupan::logging::init_logging;
use fupan::strategy::StrategyReport;
use fupan::{default_trade_date, ReviewEngine};

#[derive(Parser)]
#[command(name = "fupan", version, about = "A股打板复盘：涨停分析、角色识别与策略报告生成")]
struct Cli {
    /// Trading day to review (YYYY-MM-DD); defaults to the last completed session
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Disable webhook notification for this run
    #[arg(long)]
    no_notify: bool,

    /// Run a data-source connectivity check and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("fupan v{}", env!("CARGO_PKG_VERSION"));

    if cli.no_notify {
        config.notification.enabled = false;
        tracing::info!("Notifications disabled via --no-notify");
    }

    let provider = Arc::new(EastmoneyProvider::new(
        config.data_sources.request_timeout_secs,
        config.analysis.limit_threshold,
    ));

    let trade_date = cli.date.unwrap_or_else(default_trade_date);

    if cli.check {
        return run_check(&provider, trade_date).await;
    }

    let report_dir = config.output.report_dir.clone();
    let engine = ReviewEngine::new(config, provider);
    let report = engine.run(trade_date).await?;

    print_summary(&report, &report_dir);
    Ok(())
}

/// Connectivity self-test: health check plus one roster and one kline call.
async fn run_check(provider: &Arc<EastmoneyProvider>, trade_date: NaiveDate) -> Result<()> {
    println!("数据源连通性检查 ({})", provider.name());

    match provider.health_check().await {
        Ok(()) => println!("  ✓ 接口可达"),
        Err(e) => {
            println!("  ✗ 接口不可达: {}", e);
            anyhow::bail!("Health check failed");
        }
    }

    match provider.get_limit_up_roster(trade_date).await {
        Ok(roster) => {
            println!("  ✓ 涨停数据: {} 获取到 {} 只", trade_date, roster.len());
            for record in roster.iter().take(3) {
                println!(
                    "      {} {} 涨幅: {:.2}%",
                    record.code, record.name, record.pct_change
                );
            }
        }
        Err(e) => println!("  ✗ 涨停数据获取失败: {}", e),
    }

    let start = trade_date - chrono::Days::new(30);
    match provider.get_daily_bars("600519", start, trade_date).await {
        Ok(bars) => println!("  ✓ 日线数据: 600519 获取到 {} 根K线", bars.len()),
        Err(e) => println!("  ✗ 日线数据获取失败: {}", e),
    }

    println!("检查完成");
    Ok(())
}

/// Console summary, shown after the report files are written.
fn print_summary(report: &StrategyReport, report_dir: &str) {
    println!("\n============================================================");
    println!("A股打板复盘完成 - {}", report.metadata.trade_date);
    println!("============================================================");

    println!("\n📊 市场概况:");
    println!("   涨停家数: {}家", report.market.limit_up_count);
    println!("   连板高度: {}板", report.market.max_streak);
    println!("   市场情绪: {}", report.market.sentiment);
    println!("   赚钱效应: {}", report.market.profit_effect);

    println!("\n🎯 主线板块: {}个", report.themes.len());
    for (i, theme) in report.themes.iter().enumerate() {
        println!("   {}. {} ({}只涨停)", i + 1, theme.sector, theme.limit_up_count);
    }

    println!("\n🚀 推荐个股: {}只", report.stock_strategies.len());
    for (i, stock) in report.stock_strategies.iter().take(5).enumerate() {
        println!("   {}. {} ({}) - {}", i + 1, stock.name, stock.code, stock.role);
    }

    println!("\n📁 报告已保存至 {}/ 目录", report_dir);
    println!("============================================================");
}
