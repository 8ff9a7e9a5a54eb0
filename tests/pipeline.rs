//! End-to-end tests for the review pipeline.
//!
//! Runs the full analyze → identify → generate chain (and the engine on a
//! mock provider) over deterministic fixtures and checks the pipeline
//! invariants: partition completeness, idempotence, graceful degradation
//! and the role-selection scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use fupan::analysis::{LimitUpAnalyzer, RoleIdentifier, SectorAnalyzer, SectorLookup};
use fupan::config::Config;
use fupan::data::{
    DailyBar, HistoryMap, LimitUpRecord, MarketDataProvider, ProviderError,
};
use fupan::report::ReviewReport;
use fupan::strategy::{StrategyGenerator, StrategyReport};
use fupan::ReviewEngine;

// ============================================================================
// Fixtures
// ============================================================================

fn trade_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()
}

fn record(code: &str, close: f64, amount: f64) -> LimitUpRecord {
    LimitUpRecord {
        code: code.to_string(),
        name: format!("股票{}", code),
        close,
        pct_change: 10.0,
        amount,
        volume: 1_000_000.0,
        turnover_rate: Some(2.5),
        trade_date: trade_date(),
    }
}

/// History whose final `streak` sessions each gain 10% and whose earlier
/// sessions are flat.
fn streak_history(len: usize, streak: usize) -> Vec<DailyBar> {
    let mut bars = Vec::with_capacity(len);
    let mut close = 10.0;
    for i in 0..len {
        let pct = if i >= len - streak { 10.0 } else { 0.0 };
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

/// Everything in one sector, so role selection is exercised.
struct SingleSectorLookup;

impl SectorLookup for SingleSectorLookup {
    fn sector_of(&self, _code: &str) -> String {
        "科技".to_string()
    }
}

/// Sector by code prefix: 60xxxx -> 科技, everything else -> 医药.
struct PrefixSectorLookup;

impl SectorLookup for PrefixSectorLookup {
    fn sector_of(&self, code: &str) -> String {
        if code.starts_with('6') {
            "科技".to_string()
        } else {
            "医药".to_string()
        }
    }
}

/// Run the scoring core over a roster + history with the given lookup.
fn run_core(
    roster: &[LimitUpRecord],
    history: &HistoryMap,
    lookup: Arc<dyn SectorLookup>,
) -> (StrategyReport, usize) {
    let config = Config::default();

    let analyzer = LimitUpAnalyzer::new(&config.analysis);
    let analysis = analyzer.analyze(roster, history);

    let sectors = SectorAnalyzer::new(Arc::clone(&lookup)).analyze(&analysis.stocks);
    let roles = RoleIdentifier::new(&config.analysis, lookup).identify(&analysis.stocks, &sectors);
    let total = roles.total();

    let report = StrategyGenerator::new(&config.analysis).generate(
        &analysis,
        &roles,
        &HashMap::new(),
        trade_date(),
        "eastmoney",
    );
    (report, total)
}

/// Five-stock tech-sector fixture with streaks 5/3/2/1/0.
fn tech_fixture() -> (Vec<LimitUpRecord>, HistoryMap) {
    let roster = vec![
        record("600001", 16.1, 9e8),
        record("600002", 13.3, 4e8),
        record("600003", 12.1, 6e8),
        record("600004", 11.0, 1e8),
        record("600005", 11.0, 3e7),
    ];

    let mut history = HistoryMap::new();
    history.insert("600001".to_string(), streak_history(25, 5));
    history.insert("600002".to_string(), streak_history(25, 3));
    history.insert("600003".to_string(), streak_history(25, 2));
    history.insert("600004".to_string(), streak_history(25, 1));
    history.insert("600005".to_string(), streak_history(25, 0));

    (roster, history)
}

// ============================================================================
// Core Pipeline Properties
// ============================================================================

#[test]
fn test_partition_invariant() {
    let (roster, history) = tech_fixture();
    let config = Config::default();

    let analysis = LimitUpAnalyzer::new(&config.analysis).analyze(&roster, &history);
    let lookup: Arc<dyn SectorLookup> = Arc::new(SingleSectorLookup);
    let sectors = SectorAnalyzer::new(Arc::clone(&lookup)).analyze(&analysis.stocks);
    let roles =
        RoleIdentifier::new(&config.analysis, lookup).identify(&analysis.stocks, &sectors);

    // Every roster stock appears in exactly one role list.
    assert_eq!(roles.total(), roster.len());
    let mut codes: Vec<&str> = roles.all_stocks().map(|s| s.code.as_str()).collect();
    codes.sort_unstable();
    let mut expected: Vec<&str> = roster.iter().map(|r| r.code.as_str()).collect();
    expected.sort_unstable();
    assert_eq!(codes, expected);
}

#[test]
fn test_streak_stocks_are_exactly_two_plus() {
    let (roster, history) = tech_fixture();
    let config = Config::default();
    let analysis = LimitUpAnalyzer::new(&config.analysis).analyze(&roster, &history);

    let streak_codes: Vec<&str> = analysis
        .streak_stocks
        .iter()
        .map(|s| s.code.as_str())
        .collect();
    assert_eq!(streak_codes, vec!["600001", "600002", "600003"]);

    for stock in &analysis.stocks {
        let in_streaks = streak_codes.contains(&stock.code.as_str());
        assert_eq!(in_streaks, stock.continuous_days >= 2, "{}", stock.code);
    }
}

#[test]
fn test_idempotence_modulo_timestamp() {
    let (roster, history) = tech_fixture();

    let (first, _) = run_core(&roster, &history, Arc::new(SingleSectorLookup));
    let (second, _) = run_core(&roster, &history, Arc::new(SingleSectorLookup));

    let mut a = serde_json::to_value(&first).unwrap();
    let mut b = serde_json::to_value(&second).unwrap();
    a["metadata"]["generated_at"] = serde_json::Value::Null;
    b["metadata"]["generated_at"] = serde_json::Value::Null;
    assert_eq!(a, b);
}

#[test]
fn test_empty_roster_degrades_gracefully() {
    let (report, total) = run_core(&[], &HistoryMap::new(), Arc::new(SingleSectorLookup));

    assert_eq!(total, 0);
    assert_eq!(report.market.limit_up_count, 0);
    assert!(report.themes.is_empty());
    assert!(report.stock_strategies.is_empty());
    assert!(report
        .risk_warnings
        .iter()
        .any(|w| w.contains("市场情绪低迷")));
    assert!(report
        .trading_suggestions
        .iter()
        .any(|s| s.contains("小仓位试错")));
}

// ============================================================================
// Role Scenarios
// ============================================================================

#[test]
fn test_leader_is_longest_streak() {
    let (roster, history) = tech_fixture();
    let (report, _) = run_core(&roster, &history, Arc::new(SingleSectorLookup));

    let leaders: Vec<&str> = report
        .stock_strategies
        .iter()
        .filter(|s| s.role.label() == "龙头")
        .map(|s| s.code.as_str())
        .collect();
    assert_eq!(leaders, vec!["600001"]);
}

#[test]
fn test_core_is_amount_pick_within_top_five() {
    // 600003 ranks below 600002 by score but carries the largest turnover
    // after the leader.
    let (roster, history) = tech_fixture();
    let (report, _) = run_core(&roster, &history, Arc::new(SingleSectorLookup));

    let cores: Vec<&str> = report
        .stock_strategies
        .iter()
        .filter(|s| s.role.label() == "中军")
        .map(|s| s.code.as_str())
        .collect();
    assert_eq!(cores, vec!["600003"]);
}

#[test]
fn test_under_strength_sector_bypass() {
    // Two stocks in 医药 with the default threshold of 3: no roles, both
    // watched, no strategies.
    let roster = vec![record("000001", 11.0, 2e8), record("000002", 11.0, 1e8)];
    let mut history = HistoryMap::new();
    history.insert("000001".to_string(), streak_history(25, 2));
    history.insert("000002".to_string(), streak_history(25, 1));

    let (report, total) = run_core(&roster, &history, Arc::new(PrefixSectorLookup));

    assert_eq!(total, 2);
    assert!(report.stock_strategies.is_empty());
    assert!(report.risk_warnings.iter().any(|w| w.contains("无明显龙头")));
}

#[test]
fn test_mixed_sectors_split_correctly() {
    let mut roster = vec![
        record("600001", 16.1, 9e8),
        record("600002", 13.3, 4e8),
        record("600003", 12.1, 6e8),
    ];
    roster.push(record("000001", 11.0, 2e8));
    roster.push(record("000002", 11.0, 1e8));

    let mut history = HistoryMap::new();
    history.insert("600001".to_string(), streak_history(25, 5));
    history.insert("600002".to_string(), streak_history(25, 3));
    history.insert("600003".to_string(), streak_history(25, 2));

    let (report, total) = run_core(&roster, &history, Arc::new(PrefixSectorLookup));

    assert_eq!(total, 5);
    // Only 科技 reaches the threshold; its leader comes from the streaks.
    assert_eq!(report.themes.len(), 1);
    assert_eq!(report.themes[0].sector, "科技");
    let leader = report
        .stock_strategies
        .iter()
        .find(|s| s.role.label() == "龙头")
        .unwrap();
    assert_eq!(leader.code, "600001");
}

// ============================================================================
// Rendering over Pipeline Output
// ============================================================================

#[test]
fn test_markdown_renders_pipeline_output() {
    let (roster, history) = tech_fixture();
    let (report, _) = run_core(&roster, &history, Arc::new(SingleSectorLookup));

    let md = ReviewReport::new(&report).to_markdown();
    assert!(md.contains("2025-06-20"));
    assert!(md.contains("涨停家数"));
    assert!(md.contains("股票600001"));
    assert!(md.contains("止损"));

    let json = ReviewReport::new(&report).to_json();
    let parsed: StrategyReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}

// ============================================================================
// Engine with Mock Provider
// ============================================================================

struct MockProvider {
    roster: Vec<LimitUpRecord>,
    history: HistoryMap,
    fail_roster: bool,
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn get_limit_up_roster(
        &self,
        _trade_date: NaiveDate,
    ) -> Result<Vec<LimitUpRecord>, ProviderError> {
        if self.fail_roster {
            return Err(ProviderError::Network("mock outage".into()));
        }
        Ok(self.roster.clone())
    }

    async fn get_daily_bars(
        &self,
        code: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        Ok(self.history.get(code).cloned().unwrap_or_default())
    }
}

fn engine_config(report_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.output.report_dir = report_dir.to_string_lossy().into_owned();
    config
}

#[tokio::test]
async fn test_engine_writes_report_files() {
    let (roster, history) = tech_fixture();
    let dir = tempfile::tempdir().unwrap();

    let provider = Arc::new(MockProvider {
        roster,
        history,
        fail_roster: false,
    });
    let engine = ReviewEngine::new(engine_config(dir.path()), provider);
    let report = engine.run(trade_date()).await.unwrap();

    assert_eq!(report.market.limit_up_count, 5);
    assert_eq!(report.market.max_streak, 5);
    assert!(dir.path().join("strategy_20250620.md").exists());
    assert!(dir.path().join("strategy_20250620.json").exists());
    assert!(dir.path().join("summary_20250620.txt").exists());
    assert!(dir.path().join("latest.md").exists());
}

#[tokio::test]
async fn test_engine_survives_roster_outage() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(MockProvider {
        roster: Vec::new(),
        history: HistoryMap::new(),
        fail_roster: true,
    });

    let engine = ReviewEngine::new(engine_config(dir.path()), provider);
    let report = engine.run(trade_date()).await.unwrap();

    // A provider outage degrades to the empty-day report, never an error.
    assert_eq!(report.market.limit_up_count, 0);
    assert!(dir.path().join("strategy_20250620.md").exists());
}
