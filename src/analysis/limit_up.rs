//! Limit-up analyzer.
//!
//! Turns the raw roster plus per-stock history into technical features,
//! streak counts and a market summary. Missing or short history is never an
//! error: every derived field degrades to a documented neutral value and
//! the batch continues.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::data::{DailyBar, HistoryMap, LimitUpRecord};

use super::{
    estimate_success_rate, round1, round2, MarketSentiment, StockAnalysis, TechnicalFeatures,
    TechnicalIndicators,
};

/// Streak detection never looks further back than this many sessions.
const STREAK_LOOKBACK_CAP: usize = 10;

// ============================================================================
// Results
// ============================================================================

/// Day-level summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    /// Number of limit-up stocks
    pub total_count: usize,
    /// Total turnover in 亿 (1e8 yuan)
    pub amount_total: f64,
    /// Total volume
    pub volume_total: f64,
    /// Mean percent change
    pub avg_pct_change: f64,
    /// Mean turnover in 亿
    pub avg_amount: f64,
    /// Highest percent change
    pub max_pct_change: f64,
    /// Lowest percent change
    pub min_pct_change: f64,
    /// Sentiment tier
    pub sentiment: MarketSentiment,
    /// Seal success-rate label (static lookup)
    pub success_rate: String,
}

impl MarketSummary {
    fn empty() -> Self {
        Self {
            total_count: 0,
            amount_total: 0.0,
            volume_total: 0.0,
            avg_pct_change: 0.0,
            avg_amount: 0.0,
            max_pct_change: 0.0,
            min_pct_change: 0.0,
            sentiment: MarketSentiment::Frozen,
            success_rate: "0%".to_string(),
        }
    }
}

/// Full analyzer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Day-level summary
    pub summary: MarketSummary,
    /// One analysis per roster stock, in roster order
    pub stocks: Vec<StockAnalysis>,
    /// Stocks with a streak of 2+ days, sorted by streak descending
    pub streak_stocks: Vec<StockAnalysis>,
}

// ============================================================================
// Limit-up Analyzer
// ============================================================================

/// Analyzer for the day's limit-up roster.
pub struct LimitUpAnalyzer {
    limit_threshold: f64,
}

impl LimitUpAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            limit_threshold: config.limit_threshold,
        }
    }

    /// Analyze the roster against per-stock history.
    pub fn analyze(&self, roster: &[LimitUpRecord], history: &HistoryMap) -> AnalysisResult {
        if roster.is_empty() {
            return AnalysisResult {
                summary: MarketSummary::empty(),
                stocks: Vec::new(),
                streak_stocks: Vec::new(),
            };
        }

        info!(count = roster.len(), "Analyzing limit-up stocks");

        let stocks: Vec<StockAnalysis> = roster
            .iter()
            .map(|record| self.analyze_single(record, history.get(&record.code)))
            .collect();

        let mut streak_stocks: Vec<StockAnalysis> = stocks
            .iter()
            .filter(|s| s.continuous_days >= 2)
            .cloned()
            .collect();
        streak_stocks.sort_by(|a, b| b.continuous_days.cmp(&a.continuous_days));

        let summary = self.summarize(roster);

        debug!(
            streaks = streak_stocks.len(),
            sentiment = %summary.sentiment,
            "Limit-up analysis complete"
        );

        AnalysisResult {
            summary,
            stocks,
            streak_stocks,
        }
    }

    fn summarize(&self, roster: &[LimitUpRecord]) -> MarketSummary {
        let count = roster.len();
        let amounts: Vec<f64> = roster.iter().map(|r| r.amount).collect();
        let changes: Vec<f64> = roster.iter().map(|r| r.pct_change).collect();

        MarketSummary {
            total_count: count,
            amount_total: round2(amounts.iter().sum::<f64>() / 1e8),
            volume_total: roster.iter().map(|r| r.volume).sum(),
            avg_pct_change: round2((&changes).mean()),
            avg_amount: round2((&amounts).mean() / 1e8),
            max_pct_change: changes.iter().copied().fold(f64::MIN, f64::max),
            min_pct_change: changes.iter().copied().fold(f64::MAX, f64::min),
            sentiment: MarketSentiment::from_count(count),
            success_rate: estimate_success_rate(count).to_string(),
        }
    }

    fn analyze_single(&self, record: &LimitUpRecord, bars: Option<&Vec<DailyBar>>) -> StockAnalysis {
        let mut analysis = StockAnalysis::from_record(record);

        let Some(bars) = bars.filter(|b| b.len() >= 5) else {
            return analysis;
        };

        analysis.indicators = compute_indicators(bars);
        analysis.features = TechnicalFeatures {
            price_position: price_position(bars),
            volume_ratio: volume_ratio(bars),
            is_breakout: is_breakout(bars),
            trend_strength: trend_strength(bars),
        };

        analysis.continuous_days = self.count_streak_days(bars);
        if analysis.continuous_days > 0 {
            analysis.total_increase = total_increase(bars, analysis.continuous_days as usize);
            analysis.daily_increases = daily_increases(bars, analysis.continuous_days as usize);
        }
        if analysis.continuous_days >= 2 {
            analysis.continuous_strength =
                continuous_strength(analysis.continuous_days, bars, record.amount);
        }

        analysis
    }

    /// Count consecutive limit-up days, walking backward from the most
    /// recent bar. Stops at the first day below the threshold or at a day
    /// whose change cannot be determined.
    fn count_streak_days(&self, bars: &[DailyBar]) -> u32 {
        if bars.len() < 2 {
            return 0;
        }

        let mut days = 0u32;
        for i in 0..STREAK_LOOKBACK_CAP.min(bars.len() - 1) {
            let bar = &bars[bars.len() - 1 - i];
            match bar.change_percent() {
                Some(pct) if pct >= self.limit_threshold => days += 1,
                _ => break,
            }
        }
        days
    }
}

// ============================================================================
// Feature Calculations
// ============================================================================

/// Close position within the 20-day range, 0-100. 50.0 when the range is
/// degenerate or history is short.
fn price_position(bars: &[DailyBar]) -> f64 {
    if bars.len() < 20 {
        return 50.0;
    }

    let closes: Vec<f64> = bars[bars.len() - 20..].iter().map(|b| b.close).collect();
    let current = closes[closes.len() - 1];
    let lowest = closes.iter().copied().fold(f64::MAX, f64::min);
    let highest = closes.iter().copied().fold(f64::MIN, f64::max);

    if highest <= lowest {
        return 50.0;
    }
    round2((current - lowest) / (highest - lowest) * 100.0)
}

/// Last volume over the mean of the previous five. 1.0 when history is
/// short or the mean is zero.
fn volume_ratio(bars: &[DailyBar]) -> f64 {
    if bars.len() < 6 {
        return 1.0;
    }

    let window = &bars[bars.len() - 6..];
    let today = window[5].volume;
    let previous: Vec<f64> = window[..5].iter().map(|b| b.volume).collect();
    let avg = (&previous).mean();

    if avg > 0.0 {
        round2(today / avg)
    } else {
        1.0
    }
}

/// Whether the close clears the previous 9-day high by more than 3%.
fn is_breakout(bars: &[DailyBar]) -> bool {
    if bars.len() < 10 {
        return false;
    }

    let window = &bars[bars.len() - 10..];
    let current = window[9].close;
    let prev_max = window[..9].iter().map(|b| b.close).fold(f64::MIN, f64::max);

    current > prev_max * 1.03
}

/// Percent gain over the last five closes.
fn trend_strength(bars: &[DailyBar]) -> f64 {
    if bars.len() < 5 {
        return 0.0;
    }

    let window = &bars[bars.len() - 5..];
    let first = window[0].close;
    let last = window[4].close;

    if first > 0.0 {
        round2((last / first - 1.0) * 100.0)
    } else {
        0.0
    }
}

/// Display-only indicators over the last 10 closes.
fn compute_indicators(bars: &[DailyBar]) -> TechnicalIndicators {
    if bars.len() < 5 {
        return TechnicalIndicators::default();
    }

    let tail = &bars[bars.len().saturating_sub(10)..];
    let closes: Vec<f64> = tail.iter().map(|b| b.close).collect();

    let ma_5 = (&closes[closes.len() - 5..]).mean();
    let ma_10 = if closes.len() >= 10 {
        (&closes[..]).mean()
    } else {
        closes[closes.len() - 1]
    };

    TechnicalIndicators {
        rsi_5: Some(rsi(&closes, 5)),
        ma_5: Some(round2(ma_5)),
        ma_10: Some(round2(ma_10)),
    }
}

/// Classic RSI over `period` deltas. 50.0 when history is short.
fn rsi(prices: &[f64], period: usize) -> f64 {
    if prices.len() < period + 1 {
        return 50.0;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let avg_gain = (&gains[..period]).mean();
    let avg_loss = (&losses[..period]).mean();

    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    round2(100.0 - 100.0 / (1.0 + rs))
}

/// Cumulative percent gain from the close `days` sessions before today.
fn total_increase(bars: &[DailyBar], days: usize) -> f64 {
    if days == 0 || bars.len() < days + 1 {
        return 0.0;
    }

    let start = bars[bars.len() - 1 - days].close;
    let end = bars[bars.len() - 1].close;

    if start > 0.0 {
        round2((end / start - 1.0) * 100.0)
    } else {
        0.0
    }
}

/// Day-by-day percent gains across the streak, oldest first.
fn daily_increases(bars: &[DailyBar], days: usize) -> Vec<f64> {
    if days == 0 || bars.len() < days + 1 {
        return Vec::new();
    }

    let mut increases = Vec::with_capacity(days);
    for i in 0..days {
        let current = bars[bars.len() - 1 - i].close;
        let prev = bars[bars.len() - 2 - i].close;
        if prev > 0.0 {
            increases.push(round2((current / prev - 1.0) * 100.0));
        } else {
            increases.push(0.0);
        }
    }
    increases.reverse();
    increases
}

/// Streak-strength diagnostic, 0-100. Shrinking volume into the streak and
/// heavy turnover both raise it.
fn continuous_strength(days: u32, bars: &[DailyBar], amount: f64) -> f64 {
    let mut strength = (f64::from(days) * 20.0).min(100.0) * 0.4;

    if bars.len() >= 3 {
        let volumes: Vec<f64> = bars[bars.len() - 3..].iter().map(|b| b.volume).collect();
        let avg = (&volumes).mean();
        if avg > 0.0 {
            let ratio = volumes[2] / avg;
            if ratio < 0.8 {
                strength += 30.0;
            } else if ratio < 1.2 {
                strength += 20.0;
            } else {
                strength += 10.0;
            }
        }
    }

    if amount > 1e9 {
        strength += 30.0;
    } else if amount > 5e8 {
        strength += 20.0;
    } else if amount > 1e8 {
        strength += 10.0;
    }

    round1(strength.min(100.0))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn record(code: &str, amount: f64) -> LimitUpRecord {
        LimitUpRecord {
            code: code.to_string(),
            name: format!("股票{}", code),
            close: 11.0,
            pct_change: 10.0,
            amount,
            volume: 1_000_000.0,
            turnover_rate: Some(2.0),
            trade_date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
        }
    }

    /// Build a history whose final `streak` sessions each gain `daily_pct`
    /// and whose earlier sessions are flat.
    fn history(len: usize, streak: usize, daily_pct: f64) -> Vec<DailyBar> {
        let mut bars = Vec::with_capacity(len);
        let mut close = 10.0;
        for i in 0..len {
            let pct = if i >= len - streak { daily_pct } else { 0.0 };
            let pre = close;
            close = pre * (1.0 + pct / 100.0);
            bars.push(DailyBar {
                date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap() + chrono::Days::new(i as u64),
                open: pre,
                high: close,
                low: pre,
                close,
                pre_close: Some(pre),
                volume: 1_000_000.0,
                amount: close * 1_000_000.0,
                pct_change: Some(pct),
            });
        }
        bars
    }

    fn analyzer() -> LimitUpAnalyzer {
        LimitUpAnalyzer::new(&crate::config::AnalysisConfig::default())
    }

    #[test]
    fn test_empty_roster_yields_frozen_summary() {
        let result = analyzer().analyze(&[], &HashMap::new());
        assert_eq!(result.summary.total_count, 0);
        assert_eq!(result.summary.sentiment, MarketSentiment::Frozen);
        assert_eq!(result.summary.success_rate, "0%");
        assert!(result.stocks.is_empty());
        assert!(result.streak_stocks.is_empty());
    }

    #[test]
    fn test_missing_history_degrades_to_defaults() {
        let roster = vec![record("600001", 2e8)];
        let result = analyzer().analyze(&roster, &HashMap::new());
        let stock = &result.stocks[0];
        assert_eq!(stock.continuous_days, 0);
        assert!((stock.features.price_position - 50.0).abs() < 1e-9);
        assert!((stock.features.volume_ratio - 1.0).abs() < 1e-9);
        assert!(stock.indicators.rsi_5.is_none());
    }

    #[test]
    fn test_short_history_degrades_to_defaults() {
        let mut hist = HashMap::new();
        hist.insert("600001".to_string(), history(3, 3, 10.0));
        let roster = vec![record("600001", 2e8)];
        let result = analyzer().analyze(&roster, &hist);
        assert_eq!(result.stocks[0].continuous_days, 0);
    }

    #[test]
    fn test_streak_detection() {
        let mut hist = HashMap::new();
        hist.insert("600001".to_string(), history(25, 3, 10.0));
        let roster = vec![record("600001", 2e8)];
        let result = analyzer().analyze(&roster, &hist);
        let stock = &result.stocks[0];
        assert_eq!(stock.continuous_days, 3);
        // Three 10% sessions compound to 33.1%
        assert!((stock.total_increase - 33.1).abs() < 0.01);
        assert_eq!(stock.daily_increases, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_streak_stops_below_threshold() {
        // 9.5% gains never reach the 9.8% threshold
        let mut hist = HashMap::new();
        hist.insert("600001".to_string(), history(25, 4, 9.5));
        let roster = vec![record("600001", 2e8)];
        let result = analyzer().analyze(&roster, &hist);
        assert_eq!(result.stocks[0].continuous_days, 0);
        assert!(result.streak_stocks.is_empty());
    }

    #[test]
    fn test_streak_capped_at_lookback() {
        let mut hist = HashMap::new();
        hist.insert("600001".to_string(), history(25, 15, 10.0));
        let roster = vec![record("600001", 2e8)];
        let result = analyzer().analyze(&roster, &hist);
        assert_eq!(result.stocks[0].continuous_days, 10);
    }

    #[test]
    fn test_streak_stocks_sorted_by_days() {
        let mut hist = HashMap::new();
        hist.insert("600001".to_string(), history(25, 2, 10.0));
        hist.insert("600002".to_string(), history(25, 5, 10.0));
        hist.insert("600003".to_string(), history(25, 1, 10.0));
        let roster = vec![record("600001", 2e8), record("600002", 2e8), record("600003", 2e8)];
        let result = analyzer().analyze(&roster, &hist);

        assert_eq!(result.streak_stocks.len(), 2);
        assert_eq!(result.streak_stocks[0].code, "600002");
        assert_eq!(result.streak_stocks[1].code, "600001");
        assert!(result.streak_stocks[0].continuous_strength > 0.0);
    }

    #[test]
    fn test_price_position_range() {
        let bars = history(25, 3, 10.0);
        let pos = price_position(&bars);
        assert!((0.0..=100.0).contains(&pos));
        // The streak put the close at the top of the 20-day range
        assert!((pos - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_price_position_flat_range_is_neutral() {
        let bars = history(25, 0, 0.0);
        assert!((price_position(&bars) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_ratio_flat_volume() {
        let bars = history(25, 3, 10.0);
        assert!((volume_ratio(&bars) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakout_detection() {
        let bars = history(25, 3, 10.0);
        // Close is 33% above the flat pre-streak closes
        assert!(is_breakout(&bars));

        let flat = history(25, 0, 0.0);
        assert!(!is_breakout(&flat));
    }

    #[test]
    fn test_trend_strength_five_day_gain() {
        let bars = history(25, 5, 10.0);
        // The last five closes span four 10% gains: 1.1^4 - 1 = 46.41%
        assert!((trend_strength(&bars) - 46.41).abs() < 0.01);
    }

    #[test]
    fn test_rsi_all_gains_saturates() {
        let closes = vec![10.0, 10.5, 11.0, 11.5, 12.0, 12.5];
        assert!((rsi(&closes, 5) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_short_history_neutral() {
        let closes = vec![10.0, 10.5];
        assert!((rsi(&closes, 5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_continuous_strength_capped() {
        let bars = history(25, 5, 10.0);
        let s = continuous_strength(5, &bars, 2e9);
        // 100*0.4 + 20 (flat volume) + 30 (heavy amount) = 90
        assert!((s - 90.0).abs() < 1e-9);
        assert!(s <= 100.0);
    }

    #[test]
    fn test_summary_statistics() {
        let roster = vec![record("600001", 1e8), record("600002", 3e8)];
        let result = analyzer().analyze(&roster, &HashMap::new());
        assert_eq!(result.summary.total_count, 2);
        assert!((result.summary.amount_total - 4.0).abs() < 1e-9);
        assert!((result.summary.avg_amount - 2.0).abs() < 1e-9);
        assert!((result.summary.avg_pct_change - 10.0).abs() < 1e-9);
        assert_eq!(result.summary.sentiment, MarketSentiment::Frozen);
    }
}
