//! Market data provider abstraction.
//!
//! All data sources implement the `MarketDataProvider` trait, so the review
//! engine never depends on a concrete upstream API.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::{DailyBar, LimitUpRecord};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Data not available for the requested symbol/date
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal provider error (malformed response, upstream failure)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Whether retrying the same call could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Internal(_))
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for market data providers.
///
/// Both methods tolerate "no data": an empty trading day or an unknown
/// symbol yields an empty vector, never an error.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name (e.g. "eastmoney")
    fn name(&self) -> &'static str;

    /// Lightweight availability check.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Fetch the limit-up roster for a trading day.
    async fn get_limit_up_roster(
        &self,
        trade_date: NaiveDate,
    ) -> Result<Vec<LimitUpRecord>, ProviderError>;

    /// Fetch daily bars for a symbol, oldest first.
    async fn get_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
