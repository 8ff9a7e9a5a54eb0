//! Role identification.
//!
//! Partitions the day's limit-up stocks into 龙头 (Leader), 中军 (Core),
//! 补涨 (Catch-up) and 观察 (Watch) within each sufficiently strong sector,
//! using a weighted multi-factor score. Every stock lands in exactly one
//! role list.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{AnalysisConfig, ScoreWeights};

use super::sector::{SectorGroup, SectorLookup};
use super::{round2, StockAnalysis};

/// No limit-up timestamp data is modeled; the timing factor is this
/// constant for every stock.
const LIMIT_TIME_PLACEHOLDER_SCORE: f64 = 60.0;

// ============================================================================
// Role Assignment
// ============================================================================

/// Disjoint partition of the day's stocks into the four roles.
///
/// Each list is sorted by composite score descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub leaders: Vec<StockAnalysis>,
    pub cores: Vec<StockAnalysis>,
    pub catch_ups: Vec<StockAnalysis>,
    pub watch: Vec<StockAnalysis>,
}

impl RoleAssignment {
    /// Total number of stocks across all four lists.
    pub fn total(&self) -> usize {
        self.leaders.len() + self.cores.len() + self.catch_ups.len() + self.watch.len()
    }

    /// All stocks of every role, in role order.
    pub fn all_stocks(&self) -> impl Iterator<Item = &StockAnalysis> {
        self.leaders
            .iter()
            .chain(self.cores.iter())
            .chain(self.catch_ups.iter())
            .chain(self.watch.iter())
    }
}

// ============================================================================
// Role Identifier
// ============================================================================

/// Identifies sector roles using the configured score weights.
pub struct RoleIdentifier {
    sector_strength_threshold: usize,
    weights: ScoreWeights,
    lookup: Arc<dyn SectorLookup>,
}

impl RoleIdentifier {
    pub fn new(config: &AnalysisConfig, lookup: Arc<dyn SectorLookup>) -> Self {
        Self {
            sector_strength_threshold: config.sector_strength_threshold,
            weights: config.score_weights.clone(),
            lookup,
        }
    }

    /// Partition the stocks into roles.
    pub fn identify(&self, stocks: &[StockAnalysis], sectors: &[SectorGroup]) -> RoleAssignment {
        if stocks.is_empty() {
            return RoleAssignment::default();
        }

        info!(count = stocks.len(), "Identifying sector roles");

        // Group by sector, scoring every stock along the way. BTreeMap keeps
        // sector iteration deterministic.
        let mut by_sector: BTreeMap<String, Vec<StockAnalysis>> = BTreeMap::new();
        for stock in stocks {
            let sector = self.sector_of(&stock.code, sectors);
            let mut scored = stock.clone();
            scored.sector = Some(sector.clone());
            scored.composite_score = self.composite_score(stock);
            by_sector.entry(sector).or_default().push(scored);
        }

        let mut assignment = RoleAssignment::default();

        for (sector, mut members) in by_sector {
            if members.len() < self.sector_strength_threshold {
                assignment.watch.append(&mut members);
                continue;
            }

            debug!(sector = %sector, count = members.len(), "Analyzing sector roles");
            self.assign_sector_roles(members, &mut assignment);
        }

        sort_by_score(&mut assignment.leaders);
        sort_by_score(&mut assignment.cores);
        sort_by_score(&mut assignment.catch_ups);
        sort_by_score(&mut assignment.watch);

        info!(
            leaders = assignment.leaders.len(),
            cores = assignment.cores.len(),
            catch_ups = assignment.catch_ups.len(),
            watch = assignment.watch.len(),
            "Role identification complete"
        );

        assignment
    }

    /// Sector of a stock: the sector data's core-stock lists first, then the
    /// same lookup the sector analyzer used, so names always agree.
    fn sector_of(&self, code: &str, sectors: &[SectorGroup]) -> String {
        for group in sectors {
            if group.core_stocks.iter().any(|cs| cs.code == code) {
                return group.name.clone();
            }
        }
        self.lookup.sector_of(code)
    }

    /// Pick the sector's Leader, Core and Catch-up; the rest go to Watch.
    fn assign_sector_roles(&self, members: Vec<StockAnalysis>, assignment: &mut RoleAssignment) {
        let mut ranked = members;
        sort_by_score(&mut ranked);

        // Leader: highest score among streak stocks, else highest overall.
        let leader_code = ranked
            .iter()
            .filter(|s| s.continuous_days >= 2)
            .max_by(|a, b| cmp_score(a, b))
            .or_else(|| ranked.first())
            .map(|s| s.code.clone());

        // Core: largest turnover within the top-5 scored; on collision with
        // the Leader, retry among ranks 2-3 excluding the Leader's code.
        let core_code = if ranked.len() > 1 {
            let top5 = &ranked[..ranked.len().min(5)];
            let mut pick = top5
                .iter()
                .max_by(|a, b| cmp_amount(a, b))
                .map(|s| s.code.clone());

            if pick == leader_code {
                pick = if ranked.len() > 2 {
                    ranked[1..ranked.len().min(3)]
                        .iter()
                        .filter(|s| Some(&s.code) != leader_code.as_ref())
                        .max_by(|a, b| cmp_amount(a, b))
                        .map(|s| s.code.clone())
                } else {
                    None
                };
            }
            pick
        } else {
            None
        };

        // Catch-up: low-position early-streak stocks, falling back to
        // breakout names at the bottom of the ranking. A pick that collides
        // with the Leader or Core is discarded without replacement.
        let catch_up_code = if ranked.len() > 2 {
            let mut candidates: Vec<&StockAnalysis> = ranked
                .iter()
                .filter(|s| s.continuous_days <= 1 && s.features.price_position < 50.0)
                .collect();

            if candidates.is_empty() {
                candidates = ranked[ranked.len() - 3..]
                    .iter()
                    .filter(|s| s.features.is_breakout)
                    .collect();
            }

            candidates
                .into_iter()
                .max_by(|a, b| {
                    a.features
                        .trend_strength
                        .partial_cmp(&b.features.trend_strength)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|s| s.code.clone())
                .filter(|code| Some(code) != leader_code.as_ref() && Some(code) != core_code.as_ref())
        } else {
            None
        };

        for stock in ranked {
            if Some(&stock.code) == leader_code.as_ref() {
                assignment.leaders.push(stock);
            } else if Some(&stock.code) == core_code.as_ref() {
                assignment.cores.push(stock);
            } else if Some(&stock.code) == catch_up_code.as_ref() {
                assignment.catch_ups.push(stock);
            } else {
                assignment.watch.push(stock);
            }
        }
    }

    /// Weighted multi-factor score, bounded to [0, 100] for weights that
    /// sum to 1.0.
    pub fn composite_score(&self, stock: &StockAnalysis) -> f64 {
        let streak_score = (f64::from(stock.continuous_days) * 25.0).min(100.0);

        let amount_score = if stock.amount > 1e9 {
            100.0
        } else if stock.amount > 5e8 {
            80.0
        } else if stock.amount > 2e8 {
            65.0
        } else if stock.amount > 5e7 {
            50.0
        } else {
            30.0
        };

        let features = &stock.features;
        let mut technical_score: f64 = 50.0;
        if features.is_breakout {
            technical_score += 20.0;
        }
        if features.price_position > 70.0 {
            technical_score += 15.0;
        } else if features.price_position < 30.0 {
            technical_score += 10.0;
        }
        if features.trend_strength > 5.0 {
            technical_score += 10.0;
        }
        if features.volume_ratio > 2.0 {
            technical_score += 5.0;
        }
        technical_score = technical_score.min(100.0);

        round2(
            streak_score * self.weights.streak
                + LIMIT_TIME_PLACEHOLDER_SCORE * self.weights.limit_time
                + amount_score * self.weights.seal_amount
                + technical_score * self.weights.float_cap,
        )
    }
}

/// Sort descending by score, ties broken by code for determinism.
fn sort_by_score(stocks: &mut [StockAnalysis]) {
    stocks.sort_by(|a, b| cmp_score(b, a).then_with(|| a.code.cmp(&b.code)));
}

fn cmp_score(a: &StockAnalysis, b: &StockAnalysis) -> std::cmp::Ordering {
    a.composite_score
        .partial_cmp(&b.composite_score)
        .unwrap_or(std::cmp::Ordering::Equal)
}

fn cmp_amount(a: &StockAnalysis, b: &StockAnalysis) -> std::cmp::Ordering {
    a.amount.partial_cmp(&b.amount).unwrap_or(std::cmp::Ordering::Equal)
}

// ============================================================================
// Tests
// ============================================================================
