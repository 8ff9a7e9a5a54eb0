//! Strategy generator.
//!
//! Turns the analysis result plus role assignment (plus optional AI
//! commentary) into the final [`StrategyReport`]: market overview, themes,
//! per-stock trade plans, risk warnings and trading suggestions.

use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::analysis::sector::sector_strength;
use crate::analysis::{
    estimate_success_rate, AnalysisResult, MarketSentiment, Role, RoleAssignment,
    SectorPersistence, StockAnalysis,
};
use crate::commentary::StockCommentary;
use crate::config::AnalysisConfig;

use super::{
    truncate_chars, MarketOverview, ReportMeta, StockStrategy, StrategyReport, ThemeAnalysis,
};

/// The report keeps at most this many themes.
const MAX_THEMES: usize = 3;

/// Report schema version.
const REPORT_VERSION: &str = "1.0";

// ============================================================================
// Strategy Generator
// ============================================================================

/// Generates the final strategy report.
pub struct StrategyGenerator {
    sector_strength_threshold: usize,
}

impl StrategyGenerator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            sector_strength_threshold: config.sector_strength_threshold,
        }
    }

    /// Generate the report. `commentary` may be empty; its absence changes
    /// nothing but the AI fields.
    pub fn generate(
        &self,
        analysis: &AnalysisResult,
        roles: &RoleAssignment,
        commentary: &HashMap<String, StockCommentary>,
        trade_date: NaiveDate,
        data_source: &str,
    ) -> StrategyReport {
        let market = build_market_overview(analysis);
        let themes = self.build_themes(roles);
        let stock_strategies = build_stock_strategies(roles, commentary);
        let risk_warnings = build_risk_warnings(&market, roles);
        let trading_suggestions = build_trading_suggestions(&market, &themes);

        info!(
            themes = themes.len(),
            strategies = stock_strategies.len(),
            warnings = risk_warnings.len(),
            "Strategy report generated"
        );

        StrategyReport {
            metadata: ReportMeta {
                generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                trade_date,
                version: REPORT_VERSION.to_string(),
                data_source: data_source.to_string(),
            },
            market,
            themes,
            stock_strategies,
            risk_warnings,
            trading_suggestions,
        }
    }

    /// Top themes by stock count among sectors that reach the strength
    /// threshold. Persistence recomputes the sector strength rule over the
    /// role assignment's members.
    fn build_themes(&self, roles: &RoleAssignment) -> Vec<ThemeAnalysis> {
        let mut members: HashMap<String, Vec<&StockAnalysis>> = HashMap::new();
        for stock in roles.all_stocks() {
            let sector = stock.sector.clone().unwrap_or_else(|| "其他".to_string());
            members.entry(sector).or_default().push(stock);
        }

        let mut themes: Vec<ThemeAnalysis> = members
            .into_iter()
            .filter(|(_, stocks)| stocks.len() >= self.sector_strength_threshold)
            .map(|(sector, stocks)| {
                let leader_count = roles
                    .leaders
                    .iter()
                    .filter(|l| l.sector.as_deref() == Some(sector.as_str()))
                    .count();
                let owned: Vec<StockAnalysis> = stocks.iter().map(|s| (*s).clone()).collect();
                let strength = sector_strength(&owned);

                ThemeAnalysis {
                    strength_stars: strength_stars(stocks.len()).to_string(),
                    persistence: SectorPersistence::from_strength(strength).label().to_string(),
                    limit_up_count: stocks.len(),
                    leader_count,
                    sector,
                }
            })
            .collect();

        themes.sort_by(|a, b| {
            b.limit_up_count
                .cmp(&a.limit_up_count)
                .then_with(|| a.sector.cmp(&b.sector))
        });
        themes.truncate(MAX_THEMES);
        themes
    }
}

// ============================================================================
// Section Builders
// ============================================================================

fn build_market_overview(analysis: &AnalysisResult) -> MarketOverview {
    let count = analysis.summary.total_count;
    let max_streak = analysis
        .streak_stocks
        .iter()
        .map(|s| s.continuous_days)
        .max()
        .unwrap_or(0);

    MarketOverview {
        limit_up_count: count,
        max_streak,
        success_rate: estimate_success_rate(count).to_string(),
        sentiment: MarketSentiment::from_count(count),
        profit_effect: profit_effect(count).to_string(),
    }
}

/// 赚钱效应 tier from the limit-up count.
fn profit_effect(count: usize) -> &'static str {
    if count > 60 {
        "好"
    } else if count > 40 {
        "一般"
    } else {
        "差"
    }
}

/// Star rating from the theme's stock count.
fn strength_stars(count: usize) -> &'static str {
    if count >= 10 {
        "★★★★★"
    } else if count >= 7 {
        "★★★★"
    } else if count >= 5 {
        "★★★"
    } else if count >= 3 {
        "★★"
    } else {
        "★"
    }
}

/// Trade plans for Leader/Core/Catch-up stocks. Watch stocks get none.
fn build_stock_strategies(
    roles: &RoleAssignment,
    commentary: &HashMap<String, StockCommentary>,
) -> Vec<StockStrategy> {
    let mut strategies = Vec::new();

    for leader in &roles.leaders {
        let mut entry = StockStrategy {
            code: leader.code.clone(),
            name: leader.name.clone(),
            role: Role::Leader,
            strategy_type: "核心持仓".to_string(),
            action: leader_action(leader.continuous_days).to_string(),
            entry_hint: "分歧低吸或弱转强时".to_string(),
            stop_loss: format!("{:.2}", leader.close * 0.93),
            target: format!("{:.2}", leader.close * 1.15),
            note: None,
            catalysts: Vec::new(),
            catalyst_summary: None,
            ai_summary: None,
            ai_detail: None,
            ai_role: None,
        };
        merge_commentary(&mut entry, commentary.get(&leader.code));
        strategies.push(entry);
    }

    for core in &roles.cores {
        let mut entry = StockStrategy {
            code: core.code.clone(),
            name: core.name.clone(),
            role: Role::Core,
            strategy_type: "趋势跟随".to_string(),
            action: "5日线附近低吸，趋势持有".to_string(),
            entry_hint: "回踩5日线不破时".to_string(),
            stop_loss: format!("{:.2}", core.close * 0.95),
            target: format!("{:.2}", core.close * 1.10),
            note: None,
            catalysts: Vec::new(),
            catalyst_summary: None,
            ai_summary: None,
            ai_detail: None,
            ai_role: None,
        };
        merge_commentary(&mut entry, commentary.get(&core.code));
        strategies.push(entry);
    }

    for catch_up in &roles.catch_ups {
        let mut entry = StockStrategy {
            code: catch_up.code.clone(),
            name: catch_up.name.clone(),
            role: Role::CatchUp,
            strategy_type: "短线套利".to_string(),
            action: "竞价强势或首封打板".to_string(),
            entry_hint: "板块强势时早盘首板".to_string(),
            stop_loss: format!("{:.2}", catch_up.close * 0.92),
            target: format!("{:.2}", catch_up.close * 1.08),
            note: Some("快进快出，注意龙头走势".to_string()),
            catalysts: Vec::new(),
            catalyst_summary: None,
            ai_summary: None,
            ai_detail: None,
            ai_role: None,
        };
        merge_commentary(&mut entry, commentary.get(&catch_up.code));
        strategies.push(entry);
    }

    strategies
}

/// Leader action guidance by streak height.
fn leader_action(continuous_days: u32) -> &'static str {
    if continuous_days >= 5 {
        "持有为主，断板时减仓，反包失败离场"
    } else if continuous_days >= 3 {
        "分歧时低吸，加速时持有，放量滞涨时减仓"
    } else {
        "确认龙头地位后加仓，关注板块梯队完整性"
    }
}

/// Attach commentary fields. Absent commentary changes nothing.
fn merge_commentary(entry: &mut StockStrategy, commentary: Option<&StockCommentary>) {
    let Some(commentary) = commentary else {
        return;
    };

    if !commentary.reasons.is_empty() {
        entry.catalysts = commentary.reasons.clone();
        entry.catalyst_summary = Some(truncate_chars(&commentary.reasons[0], 50));
    }
    if !commentary.summary.is_empty() {
        entry.ai_summary = Some(commentary.summary.clone());
    }
    if !commentary.detail.is_empty() {
        entry.ai_detail = Some(commentary.detail.clone());
    }
    entry.ai_role = commentary.role_confirmed.clone();
}

/// Threshold-rule risk warnings, in fixed insertion order.
fn build_risk_warnings(market: &MarketOverview, roles: &RoleAssignment) -> Vec<String> {
    let mut warnings = Vec::new();

    if market.limit_up_count > 100 {
        warnings.push("涨停家数过多，警惕情绪高潮后的分化风险".to_string());
    }
    if market.limit_up_count < 30 {
        warnings.push("涨停家数较少，市场情绪低迷，注意仓位控制".to_string());
    }
    if market.max_streak >= 7 {
        warnings.push(format!("最高连板{}天，注意高位股补跌风险", market.max_streak));
    }
    if roles.leaders.is_empty() {
        warnings.push("无明显龙头板块，市场主线不清晰，谨慎操作".to_string());
    }

    warnings
}

/// Canned suggestions by sentiment, plus one referencing the top theme.
fn build_trading_suggestions(market: &MarketOverview, themes: &[ThemeAnalysis]) -> Vec<String> {
    let mut suggestions = Vec::new();

    match market.sentiment {
        MarketSentiment::Mania => {
            suggestions.push("控制仓位，优先处理持仓，谨慎开新仓".to_string());
            suggestions.push("关注低位首板或新题材机会".to_string());
        }
        MarketSentiment::Frozen => {
            suggestions.push("小仓位试错，关注率先走强的板块".to_string());
            suggestions.push("重点观察连板股能否打开空间".to_string());
        }
        _ => {
            suggestions.push("去弱留强，聚焦主线板块核心个股".to_string());
            suggestions.push("龙头分歧时低吸，跟风股冲高减仓".to_string());
        }
    }

    if let Some(top) = themes.first() {
        suggestions.push(format!("重点关注{}板块，{}", top.sector, top.persistence));
    }

    suggestions
}

// ============================================================================
// Tests
// ============================================================================
