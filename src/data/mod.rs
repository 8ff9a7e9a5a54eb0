//! Market data module for A-shares.
//!
//! Defines the daily-bar and limit-up roster types, the provider
//! abstraction, and the eastmoney adapter used as the default source.

mod cache;
mod eastmoney;
mod provider;

pub use cache::StockBasicCache;
pub use eastmoney::EastmoneyProvider;
pub use provider::{MarketDataProvider, ProviderError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-stock daily history, oldest bar first.
pub type HistoryMap = HashMap<String, Vec<DailyBar>>;

// ============================================================================
// Core Data Types
// ============================================================================

/// One daily OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Previous session close (absent on the first bar of a series)
    #[serde(default)]
    pub pre_close: Option<f64>,
    /// Volume (shares)
    pub volume: f64,
    /// Turnover (yuan)
    pub amount: f64,
    /// Percent change, when the source reports it directly
    #[serde(default)]
    pub pct_change: Option<f64>,
}

impl DailyBar {
    /// Percent change for the day.
    ///
    /// Prefers the source-reported value; otherwise derives it from
    /// `pre_close`. Returns `None` when `pre_close` is missing or zero.
    pub fn change_percent(&self) -> Option<f64> {
        if let Some(pct) = self.pct_change {
            return Some(pct);
        }
        match self.pre_close {
            Some(pre) if pre > 0.0 => Some((self.close / pre - 1.0) * 100.0),
            _ => None,
        }
    }
}

/// One row of the day's limit-up roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitUpRecord {
    /// Security code (e.g. "600519")
    pub code: String,
    /// Security name
    pub name: String,
    /// Close price
    pub close: f64,
    /// Percent change
    pub pct_change: f64,
    /// Turnover (yuan)
    pub amount: f64,
    /// Volume (shares); 0.0 when the source does not report it
    pub volume: f64,
    /// Turnover rate (%), when reported
    #[serde(default)]
    pub turnover_rate: Option<f64>,
    /// Trading date
    pub trade_date: NaiveDate,
}

// ============================================================================
// Tests
// ============================================================================
