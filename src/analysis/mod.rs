//! Analysis module: limit-up features, sector strength, role identification.
//!
//! The pipeline is strictly sequential. [`limit_up::LimitUpAnalyzer`] turns
//! the raw roster plus history into per-stock features and streak counts;
//! [`sector::SectorAnalyzer`] groups and scores sectors;
//! [`roles::RoleIdentifier`] partitions the day's stocks into
//! 龙头/中军/补涨/观察.

pub mod limit_up;
pub mod roles;
pub mod sector;

pub use limit_up::{AnalysisResult, LimitUpAnalyzer, MarketSummary};
pub use roles::{RoleAssignment, RoleIdentifier};
pub use sector::{
    CoreStock, HashSectorLookup, SectorAnalyzer, SectorGroup, SectorLookup, SectorPersistence,
    StructureRating,
};

use serde::{Deserialize, Serialize};

/// Round to 2 decimal places, the precision used throughout the report.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 1 decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Roles
// ============================================================================

/// Market-narrative role of a limit-up stock within its sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// 龙头: the sector's leading stock
    Leader,
    /// 中军: the high-turnover trend carrier
    Core,
    /// 补涨: the low-position catch-up candidate
    CatchUp,
    /// 观察: everything else
    Watch,
}

impl Role {
    /// Chinese display label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Leader => "龙头",
            Self::Core => "中军",
            Self::CatchUp => "补涨",
            Self::Watch => "观察",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Market Sentiment
// ============================================================================

/// Market sentiment tier, derived from the day's limit-up count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSentiment {
    /// 高潮: more than 100 limit-ups
    Mania,
    /// 活跃: more than 60
    Active,
    /// 温和: more than 30
    Mild,
    /// 清淡: more than 10
    Quiet,
    /// 冰点: 10 or fewer
    Frozen,
}

impl MarketSentiment {
    /// Tier from the limit-up count.
    pub fn from_count(count: usize) -> Self {
        if count > 100 {
            Self::Mania
        } else if count > 60 {
            Self::Active
        } else if count > 30 {
            Self::Mild
        } else if count > 10 {
            Self::Quiet
        } else {
            Self::Frozen
        }
    }

    /// Chinese display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mania => "高潮",
            Self::Active => "活跃",
            Self::Mild => "温和",
            Self::Quiet => "清淡",
            Self::Frozen => "冰点",
        }
    }
}

impl std::fmt::Display for MarketSentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Seal success-rate label. A static lookup by tier, not a measured
/// statistic.
pub fn estimate_success_rate(count: usize) -> &'static str {
    if count == 0 {
        "0%"
    } else if count > 80 {
        "85%"
    } else if count > 50 {
        "75%"
    } else if count > 30 {
        "65%"
    } else {
        "55%"
    }
}

// ============================================================================
// Per-stock Analysis
// ============================================================================

/// Technical features used by the composite score.
///
/// Defaults are the neutral values applied when history is missing or too
/// short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalFeatures {
    /// Close position within the 20-day range, 0-100
    pub price_position: f64,
    /// Last volume over the mean of the previous 5
    pub volume_ratio: f64,
    /// Close above the previous 9-day high by more than 3%
    pub is_breakout: bool,
    /// 5-day percent gain
    pub trend_strength: f64,
}

impl Default for TechnicalFeatures {
    fn default() -> Self {
        Self {
            price_position: 50.0,
            volume_ratio: 1.0,
            is_breakout: false,
            trend_strength: 0.0,
        }
    }
}

/// Auxiliary indicators, displayed in reports but never scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    /// 5-day RSI
    pub rsi_5: Option<f64>,
    /// 5-day moving average of closes
    pub ma_5: Option<f64>,
    /// 10-day moving average of closes
    pub ma_10: Option<f64>,
}

/// Derived per-stock record for one trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAnalysis {
    /// Security code
    pub code: String,
    /// Security name
    pub name: String,
    /// Close price
    pub close: f64,
    /// Percent change
    pub pct_change: f64,
    /// Turnover (yuan)
    pub amount: f64,
    /// Volume (shares)
    pub volume: f64,
    /// Technical features (neutral defaults when history is short)
    pub features: TechnicalFeatures,
    /// Display-only indicators
    pub indicators: TechnicalIndicators,
    /// Consecutive limit-up days including today
    pub continuous_days: u32,
    /// Cumulative percent gain over the streak
    pub total_increase: f64,
    /// Day-by-day percent gains across the streak, oldest first
    pub daily_increases: Vec<f64>,
    /// Streak-strength diagnostic, 0-100 (streak stocks only)
    pub continuous_strength: f64,
    /// Sector, attached during role identification
    pub sector: Option<String>,
    /// Composite score, attached during role identification
    pub composite_score: f64,
}

impl StockAnalysis {
    /// Build a bare analysis from a roster row, before enrichment.
    pub fn from_record(record: &crate::data::LimitUpRecord) -> Self {
        Self {
            code: record.code.clone(),
            name: record.name.clone(),
            close: record.close,
            pct_change: record.pct_change,
            amount: record.amount,
            volume: record.volume,
            features: TechnicalFeatures::default(),
            indicators: TechnicalIndicators::default(),
            continuous_days: 0,
            total_increase: 0.0,
            daily_increases: Vec::new(),
            continuous_strength: 0.0,
            sector: None,
            composite_score: 0.0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
