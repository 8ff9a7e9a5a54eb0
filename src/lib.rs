//! A股打板复盘: daily limit-up review and strategy report generation.
//!
//! The pipeline is a once-a-day batch, strictly sequential:
//!
//! ```text
//! roster + history          (data provider)
//!   → per-stock features    (analysis::limit_up)
//!   → sector strength       (analysis::sector)
//!   → 龙头/中军/补涨/观察    (analysis::roles)
//!   → strategy report       (strategy::generator, + optional AI commentary)
//!   → files / webhook       (report, notification)
//! ```
//!
//! Every stage consumes the previous stage's output and produces a new
//! structure; nothing is mutated across stages. Missing data degrades to
//! neutral defaults instead of failing the run.

#![warn(clippy::all)]

pub mod analysis;
pub mod commentary;
pub mod config;
pub mod data;
pub mod logging;
pub mod notification;
pub mod report;
pub mod strategy;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use tracing::{info, warn};

use crate::analysis::{
    HashSectorLookup, LimitUpAnalyzer, RoleIdentifier, SectorAnalyzer, SectorLookup,
};
use crate::commentary::CommentaryEngine;
use crate::config::Config;
use crate::data::{HistoryMap, LimitUpRecord, MarketDataProvider};
use crate::notification::WecomNotifier;
use crate::report::{ReportFormat, ReviewReport};
use crate::strategy::{StrategyGenerator, StrategyReport};

/// History bars shorter than this are treated as missing.
const MIN_HISTORY_BARS: usize = 5;

// ============================================================================
// Review Engine
// ============================================================================

/// Orchestrates one review run.
pub struct ReviewEngine<P: MarketDataProvider> {
    config: Config,
    provider: Arc<P>,
    lookup: Arc<dyn SectorLookup>,
}

impl<P: MarketDataProvider> ReviewEngine<P> {
    /// Engine with the default hash-based sector lookup.
    pub fn new(config: Config, provider: Arc<P>) -> Self {
        Self::with_sector_lookup(config, provider, Arc::new(HashSectorLookup))
    }

    /// Engine with an injected sector lookup.
    pub fn with_sector_lookup(
        config: Config,
        provider: Arc<P>,
        lookup: Arc<dyn SectorLookup>,
    ) -> Self {
        Self {
            config,
            provider,
            lookup,
        }
    }

    /// Run the full review for one trading day and return the report.
    ///
    /// The report always exists once this stage is reached: an empty
    /// roster, failed history fetches or a dead commentary endpoint all
    /// degrade the content, never abort the run.
    pub async fn run(&self, trade_date: NaiveDate) -> Result<StrategyReport> {
        info!(%trade_date, provider = self.provider.name(), "Starting review run");

        // Step 1: roster. Provider failure degrades to an empty day.
        let roster = match self.provider.get_limit_up_roster(trade_date).await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(error = %e, "Failed to fetch limit-up roster, proceeding with empty day");
                Vec::new()
            }
        };
        info!(count = roster.len(), "Limit-up roster fetched");

        // Step 2: per-stock history, tolerant of individual failures.
        let history = self.fetch_history(&roster, trade_date).await;

        // Step 3-5: the scoring core.
        let analyzer = LimitUpAnalyzer::new(&self.config.analysis);
        let analysis = analyzer.analyze(&roster, &history);

        let sector_analyzer = SectorAnalyzer::new(Arc::clone(&self.lookup));
        let sectors = sector_analyzer.analyze(&analysis.stocks);

        let identifier = RoleIdentifier::new(&self.config.analysis, Arc::clone(&self.lookup));
        let roles = identifier.identify(&analysis.stocks, &sectors);

        // Step 6: optional AI commentary, purely additive.
        let commentary_engine = CommentaryEngine::new(self.config.commentary.clone());
        let commentary = commentary_engine.annotate(&roles, trade_date).await;

        // Step 7: the report.
        let generator = StrategyGenerator::new(&self.config.analysis);
        let report = generator.generate(
            &analysis,
            &roles,
            &commentary,
            trade_date,
            &self.config.data_sources.primary,
        );

        // Step 8: files.
        self.save_report(&report)?;

        // Step 9: best-effort notification.
        let notifier = WecomNotifier::new(&self.config.notification);
        if notifier.is_enabled() {
            let body = ReviewReport::new(&report).to_notification_message();
            if let Err(e) = notifier.send_report(&body).await {
                warn!(error = %e, "Failed to send notification");
            }
        }

        info!(%trade_date, "Review run complete");
        Ok(report)
    }

    async fn fetch_history(&self, roster: &[LimitUpRecord], trade_date: NaiveDate) -> HistoryMap {
        let mut history = HistoryMap::new();
        if roster.is_empty() {
            return history;
        }

        let start_date = trade_date - chrono::Days::new(self.config.data_sources.history_days as u64);

        info!(count = roster.len(), %start_date, "Fetching per-stock history");
        let mut fetched = 0usize;
        for record in roster {
            match self
                .provider
                .get_daily_bars(&record.code, start_date, trade_date)
                .await
            {
                Ok(bars) if bars.len() >= MIN_HISTORY_BARS => {
                    history.insert(record.code.clone(), bars);
                    fetched += 1;
                }
                Ok(bars) => {
                    warn!(code = %record.code, bars = bars.len(), "History too short, skipping");
                }
                Err(e) => {
                    warn!(code = %record.code, error = %e, "Failed to fetch history");
                }
            }
        }
        info!(fetched, total = roster.len(), "History fetch complete");

        history
    }

    fn save_report(&self, report: &StrategyReport) -> Result<()> {
        let formats: Vec<ReportFormat> = self
            .config
            .output
            .formats
            .iter()
            .filter_map(|raw| match ReportFormat::from_str(raw) {
                Ok(format) => Some(format),
                Err(e) => {
                    warn!(format = %raw, error = %e, "Skipping unknown report format");
                    None
                }
            })
            .collect();

        let dir = std::path::Path::new(&self.config.output.report_dir);
        let written = ReviewReport::new(report)
            .save_all(dir, &formats)
            .context("Failed to save report files")?;

        for path in &written {
            info!(path = %path.display(), "Report file written");
        }
        Ok(())
    }
}

// ============================================================================
// Trade Date Selection
// ============================================================================

/// The most recent completed trading session: weekends roll back to
/// Friday, and before the 15:00 close the previous weekday is used.
pub fn default_trade_date() -> NaiveDate {
    let now = chrono::Local::now();
    trade_date_for(now.date_naive(), now.hour())
}

fn trade_date_for(today: NaiveDate, hour: u32) -> NaiveDate {
    let mut date = today;
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date - chrono::Days::new(1);
    }

    if date == today && hour < 15 {
        date = date - chrono::Days::new(1);
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date = date - chrono::Days::new(1);
        }
    }

    date
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trade_date_weekday_after_close() {
        // Friday 2025-06-20 at 18:00 -> same day
        assert_eq!(trade_date_for(date(2025, 6, 20), 18), date(2025, 6, 20));
    }

    #[test]
    fn test_trade_date_weekday_before_close() {
        // Friday at 10:00 -> Thursday
        assert_eq!(trade_date_for(date(2025, 6, 20), 10), date(2025, 6, 19));
        // Monday at 10:00 -> previous Friday
        assert_eq!(trade_date_for(date(2025, 6, 23), 10), date(2025, 6, 20));
    }

    #[test]
    fn test_trade_date_weekend_rolls_back_to_friday() {
        // Saturday and Sunday -> Friday, regardless of hour
        assert_eq!(trade_date_for(date(2025, 6, 21), 10), date(2025, 6, 20));
        assert_eq!(trade_date_for(date(2025, 6, 22), 18), date(2025, 6, 20));
    }
}
