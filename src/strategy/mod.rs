//! Strategy report structures.
//!
//! The [`StrategyReport`] is the final aggregate of a review run. It is
//! created once by the generator and never mutated afterwards; rendering
//! and notification read it only.

pub mod generator;

pub use generator::StrategyGenerator;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::{MarketSentiment, Role};

/// Report metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Generation timestamp, "%Y-%m-%d %H:%M:%S" local time
    pub generated_at: String,
    /// Trading day the report covers
    pub trade_date: NaiveDate,
    /// Report schema version
    pub version: String,
    /// Data source label
    pub data_source: String,
}

/// Day-level market overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    /// Number of limit-up stocks
    pub limit_up_count: usize,
    /// Highest streak among streak-qualified stocks
    pub max_streak: u32,
    /// Seal success-rate label
    pub success_rate: String,
    /// Sentiment tier
    pub sentiment: MarketSentiment,
    /// 赚钱效应 label: 好 / 一般 / 差
    pub profit_effect: String,
}

/// One market theme (sector) entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeAnalysis {
    /// Sector name
    pub sector: String,
    /// Limit-up stocks in the sector
    pub limit_up_count: usize,
    /// Leaders identified in the sector
    pub leader_count: usize,
    /// Star rating, ★-★★★★★
    pub strength_stars: String,
    /// Persistence verdict
    pub persistence: String,
}

/// Trade plan for one Leader/Core/Catch-up stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockStrategy {
    pub code: String,
    pub name: String,
    /// Narrative role
    pub role: Role,
    /// Strategy type label
    pub strategy_type: String,
    /// Action guidance
    pub action: String,
    /// Entry condition
    pub entry_hint: String,
    /// Stop-loss price, 2 decimal places
    pub stop_loss: String,
    /// Target price, 2 decimal places
    pub target: String,
    /// Extra note (Catch-up only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Limit-up reasons from commentary, verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catalysts: Vec<String>,
    /// Short first-reason excerpt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalyst_summary: Option<String>,
    /// Commentary summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    /// Full commentary text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_detail: Option<String>,
    /// Externally confirmed role, when the commentary asserts one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_role: Option<String>,
}

/// The final strategy report for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub metadata: ReportMeta,
    pub market: MarketOverview,
    pub themes: Vec<ThemeAnalysis>,
    pub stock_strategies: Vec<StockStrategy>,
    pub risk_warnings: Vec<String>,
    pub trading_suggestions: Vec<String>,
}

/// Truncate to at most `max` characters, appending an ellipsis when text
/// was cut. Operates on chars, never inside a UTF-8 sequence.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_text_untouched() {
        assert_eq!(truncate_chars("政策利好", 50), "政策利好");
    }

    #[test]
    fn test_truncate_chars_cuts_on_char_boundary() {
        let text = "新能源汽车产业链政策利好持续发酵".repeat(10);
        let cut = truncate_chars(&text, 50);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 53);
    }
}
