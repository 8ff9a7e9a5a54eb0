//! Report rendering.
//!
//! Renders the immutable [`StrategyReport`] into Markdown, JSON and plain
//! text, and writes the per-day report files. Rendering is a pure function
//! of the report structure.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::strategy::{truncate_chars, StrategyReport};

/// Markdown shows at most this many stock strategies.
const MARKDOWN_MAX_STOCKS: usize = 10;

/// The WeCom message shows at most this many stock strategies.
const NOTIFY_MAX_STOCKS: usize = 5;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Markdown (human-readable)
    Markdown,
    /// JSON (machine-readable)
    Json,
    /// Plain-text summary
    Text,
}

impl ReportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Text => "txt",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Review Report
// ============================================================================

/// Renderer around an immutable strategy report.
pub struct ReviewReport<'a> {
    report: &'a StrategyReport,
}

impl<'a> ReviewReport<'a> {
    pub fn new(report: &'a StrategyReport) -> Self {
        Self { report }
    }

    /// Render in the given format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Text => self.to_text(),
        }
    }

    /// Write the per-day files for the requested formats plus the
    /// `latest.md` pointer. Returns the written paths.
    pub fn save_all(&self, dir: &Path, formats: &[ReportFormat]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let date_tag = self.report.metadata.trade_date.format("%Y%m%d").to_string();
        let mut written = Vec::with_capacity(formats.len() + 1);

        for format in formats {
            let stem = match format {
                ReportFormat::Text => format!("summary_{}", date_tag),
                _ => format!("strategy_{}", date_tag),
            };
            let path = dir.join(format!("{}.{}", stem, format.extension()));
            std::fs::write(&path, self.generate(*format))
                .with_context(|| format!("Failed to write report file {}", path.display()))?;
            written.push(path);
        }

        let latest = dir.join("latest.md");
        std::fs::write(&latest, self.latest_pointer(&date_tag))
            .context("Failed to write latest.md")?;
        written.push(latest);

        Ok(written)
    }

    fn latest_pointer(&self, date_tag: &str) -> String {
        format!(
            "# 最新复盘报告\n\n**交易日**: {}\n\n**生成时间**: {}\n\n**报告文件**: [strategy_{}.md](strategy_{}.md)\n",
            self.report.metadata.trade_date, self.report.metadata.generated_at, date_tag, date_tag,
        )
    }

    /// Full Markdown report.
    pub fn to_markdown(&self) -> String {
        let r = self.report;
        let mut lines: Vec<String> = Vec::new();

        lines.push(format!("# A股打板复盘报告 - {}", r.metadata.trade_date));
        lines.push(format!("*生成时间: {}*", r.metadata.generated_at));
        lines.push(String::new());

        lines.push("## 📊 市场概况".to_string());
        lines.push(format!("- **涨停家数**: {}家", r.market.limit_up_count));
        lines.push(format!("- **连板高度**: {}板", r.market.max_streak));
        lines.push(format!("- **封板成功率**: {}", r.market.success_rate));
        lines.push(format!("- **市场情绪**: {}", r.market.sentiment));
        lines.push(format!("- **赚钱效应**: {}", r.market.profit_effect));
        lines.push(String::new());

        lines.push("## 🎯 主线分析".to_string());
        if r.themes.is_empty() {
            lines.push("暂无明确主线".to_string());
        } else {
            for (i, theme) in r.themes.iter().enumerate() {
                lines.push(format!("{}. **{}**", i + 1, theme.sector));
                lines.push(format!(
                    "   - 涨停: {}家 | 龙头: {}只 | 强度: {}",
                    theme.limit_up_count, theme.leader_count, theme.strength_stars
                ));
                lines.push(format!("   - 持续性: {}", theme.persistence));
            }
        }
        lines.push(String::new());

        lines.push("## 🚀 个股策略".to_string());
        if r.stock_strategies.is_empty() {
            lines.push("暂无推荐个股".to_string());
        } else {
            for stock in r.stock_strategies.iter().take(MARKDOWN_MAX_STOCKS) {
                lines.push(format!("### {} ({})", stock.name, stock.code));
                lines.push(format!("- **角色**: {}", stock.role));
                if let Some(ai_role) = &stock.ai_role {
                    lines.push(format!("- **AI确认角色**: {}", ai_role));
                }
                lines.push(format!("- **策略**: {}", stock.strategy_type));
                lines.push(format!("- **建议**: {}", stock.action));
                lines.push(format!("- **买入条件**: {}", stock.entry_hint));
                lines.push(format!("- **止损**: {}", stock.stop_loss));
                lines.push(format!("- **目标**: {}", stock.target));
                if !stock.catalysts.is_empty() {
                    lines.push("- **涨停原因/消息催化**:".to_string());
                    for (i, reason) in stock.catalysts.iter().take(3).enumerate() {
                        lines.push(format!("  {}. {}", i + 1, truncate_chars(reason, 50)));
                    }
                }
                if let Some(summary) = &stock.ai_summary {
                    lines.push(format!("- **AI分析**: {}", truncate_chars(summary, 100)));
                }
                if let Some(note) = &stock.note {
                    lines.push(format!("- **备注**: {}", note));
                }
                lines.push(String::new());
            }
        }

        lines.push("## ⚠️ 风险提示".to_string());
        if r.risk_warnings.is_empty() {
            lines.push("- 暂无特殊风险提示".to_string());
        } else {
            for warning in &r.risk_warnings {
                lines.push(format!("- {}", warning));
            }
        }
        lines.push(String::new());

        lines.push("## 💡 操作建议".to_string());
        for suggestion in &r.trading_suggestions {
            lines.push(format!("- {}", suggestion));
        }
        lines.push(String::new());

        lines.push("---".to_string());
        lines.push("*本报告由系统自动生成，仅供参考，投资有风险，入市需谨慎。*".to_string());

        lines.join("\n")
    }

    /// JSON of the whole structure.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self.report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Plain-text box summary.
    pub fn to_text(&self) -> String {
        let r = self.report;
        format!(
            "========================================\n\
             A股打板复盘摘要 - {}\n\
             ========================================\n\n\
             市场概况\n\
             \u{3000}涨停家数: {}\n\
             \u{3000}连板高度: {}\n\
             \u{3000}市场情绪: {}\n\
             \u{3000}赚钱效应: {}\n\n\
             主线板块: {}个\n\
             推荐个股: {}只\n\
             风险提示: {}条\n\
             操作建议: {}条\n\n\
             ========================================\n\
             生成时间: {}\n\
             ========================================\n",
            r.metadata.trade_date,
            r.market.limit_up_count,
            r.market.max_streak,
            r.market.sentiment,
            r.market.profit_effect,
            r.themes.len(),
            r.stock_strategies.len(),
            r.risk_warnings.len(),
            r.trading_suggestions.len(),
            r.metadata.generated_at,
        )
    }

    /// Markdown body for the WeCom webhook, capped for chat readability.
    pub fn to_notification_message(&self) -> String {
        let r = self.report;
        let mut lines: Vec<String> = Vec::new();

        lines.push(format!("## 📊 A股打板复盘报告 - {}", r.metadata.trade_date));
        lines.push(format!("**生成时间**: {}", r.metadata.generated_at));
        lines.push(String::new());

        lines.push("### 📈 市场概况".to_string());
        lines.push(format!("- **涨停家数**: {}家", r.market.limit_up_count));
        lines.push(format!("- **连板高度**: {}板", r.market.max_streak));
        lines.push(format!("- **封板成功率**: {}", r.market.success_rate));
        lines.push(format!("- **市场情绪**: {}", r.market.sentiment));
        lines.push(format!("- **赚钱效应**: {}", r.market.profit_effect));
        lines.push(String::new());

        lines.push("### 🎯 主线分析".to_string());
        if r.themes.is_empty() {
            lines.push("暂无明确主线".to_string());
        } else {
            for (i, theme) in r.themes.iter().enumerate() {
                lines.push(format!("{}. **{}**", i + 1, theme.sector));
                lines.push(format!(
                    "   - 涨停: {}家 | 强度: {}",
                    theme.limit_up_count, theme.strength_stars
                ));
                lines.push(format!("   - 持续性: {}", theme.persistence));
            }
        }
        lines.push(String::new());

        lines.push("### 🚀 个股策略".to_string());
        if r.stock_strategies.is_empty() {
            lines.push("暂无推荐个股".to_string());
        } else {
            for stock in r.stock_strategies.iter().take(NOTIFY_MAX_STOCKS) {
                lines.push(format!("**{}** ({})", stock.name, stock.code));
                lines.push(format!("- 角色: {} | 策略: {}", stock.role, stock.strategy_type));
                lines.push(format!("- 建议: {}", stock.action));
                lines.push(format!("- 止损: {} | 目标: {}", stock.stop_loss, stock.target));
                if let Some(catalyst) = &stock.catalyst_summary {
                    lines.push(format!("- 🚀 催化: {}", catalyst));
                }
                if let Some(summary) = &stock.ai_summary {
                    lines.push(format!("- 🤖 AI分析: {}", truncate_chars(summary, 100)));
                }
                lines.push(String::new());
            }
        }

        lines.push("### ⚠️ 风险提示".to_string());
        if r.risk_warnings.is_empty() {
            lines.push("- 暂无特殊风险提示".to_string());
        } else {
            for warning in &r.risk_warnings {
                lines.push(format!("- {}", warning));
            }
        }
        lines.push(String::new());

        lines.push("### 💡 操作建议".to_string());
        for suggestion in &r.trading_suggestions {
            lines.push(format!("- {}", suggestion));
        }

        lines.push(String::new());
        lines.push("---".to_string());
        lines.push("**提示**: 以上为系统自动生成，仅供参考，投资需谨慎".to_string());

        lines.join("\n")
    }
}

// ============================================================================
// Tests
// ============================================================================
