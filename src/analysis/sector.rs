//! Sector analysis.
//!
//! Groups the day's limit-up stocks by sector and scores each sector's
//! strength, ladder structure and persistence. The sector-of-code mapping
//! is behind the [`SectorLookup`] trait; the default implementation is a
//! deterministic hash over a fixed catalogue, a coarse stand-in for real
//! industry classification data.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{round2, StockAnalysis};

// ============================================================================
// Sector Lookup
// ============================================================================

/// Capability: map a security code to a sector name.
pub trait SectorLookup: Send + Sync {
    fn sector_of(&self, code: &str) -> String;
}

/// Fixed sector catalogue used by the hash-based lookup.
const SECTOR_CATALOGUE: &[&str] = &["科技", "新能源", "医药", "消费", "周期", "金融", "其他"];

/// Default lookup: deterministic hash of the code modulo the catalogue.
///
/// A placeholder for authoritative classification data; kept deterministic
/// so repeated runs group identically.
#[derive(Debug, Default)]
pub struct HashSectorLookup;

impl HashSectorLookup {
    /// FNV-1a over the code bytes.
    fn code_hash(code: &str) -> u64 {
        code.bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
            })
    }
}

impl SectorLookup for HashSectorLookup {
    fn sector_of(&self, code: &str) -> String {
        let index = (Self::code_hash(code) % SECTOR_CATALOGUE.len() as u64) as usize;
        SECTOR_CATALOGUE[index].to_string()
    }
}

// ============================================================================
// Sector Group Types
// ============================================================================

/// Ladder structure of streak heights within a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureRating {
    /// Three or more distinct streak heights
    MultiTier,
    /// Two distinct streak heights
    DoubleTier,
    /// One streak height
    SingleTier,
}

impl StructureRating {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MultiTier => "完整（多梯队）",
            Self::DoubleTier => "一般（双梯队）",
            Self::SingleTier => "单一（单梯队）",
        }
    }
}

impl std::fmt::Display for StructureRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Persistence verdict derived from the strength score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorPersistence {
    /// Score ≥ 70
    Strong,
    /// Score ≥ 50
    Moderate,
    /// Score ≥ 30
    Weak,
    /// Below 30
    OneDayMove,
}

impl SectorPersistence {
    /// Verdict from a strength score.
    pub fn from_strength(score: f64) -> Self {
        if score >= 70.0 {
            Self::Strong
        } else if score >= 50.0 {
            Self::Moderate
        } else if score >= 30.0 {
            Self::Weak
        } else {
            Self::OneDayMove
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Strong => "强势，有望持续",
            Self::Moderate => "中等，可能分化",
            Self::Weak => "一般，谨慎参与",
            Self::OneDayMove => "弱势，可能一日游",
        }
    }
}

impl std::fmt::Display for SectorPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One of a sector's top-3 stocks by streak height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreStock {
    pub code: String,
    pub name: String,
    /// Role label within the sector ladder
    pub role_label: String,
    pub continuous_days: u32,
    pub amount: f64,
}

/// A sector with its member stocks and derived aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorGroup {
    /// Sector name
    pub name: String,
    /// Member stocks (roster order)
    pub stocks: Vec<StockAnalysis>,
    /// Strength score
    pub strength_score: f64,
    /// Ladder structure
    pub structure: StructureRating,
    /// Sum of member turnover (yuan)
    pub capital_inflow: f64,
    /// Persistence verdict
    pub persistence: SectorPersistence,
    /// Top 3 by streak height, tagged with ladder roles
    pub core_stocks: Vec<CoreStock>,
}

impl SectorGroup {
    pub fn stock_count(&self) -> usize {
        self.stocks.len()
    }
}

// ============================================================================
// Sector Analyzer
// ============================================================================

/// Analyzer for sector effects.
pub struct SectorAnalyzer {
    lookup: Arc<dyn SectorLookup>,
}

impl SectorAnalyzer {
    pub fn new(lookup: Arc<dyn SectorLookup>) -> Self {
        Self { lookup }
    }

    /// Group and score sectors. Only sectors with 2+ limit-up stocks are
    /// included; the result is sorted by strength descending.
    pub fn analyze(&self, stocks: &[StockAnalysis]) -> Vec<SectorGroup> {
        if stocks.is_empty() {
            return Vec::new();
        }

        let mut by_sector: HashMap<String, Vec<StockAnalysis>> = HashMap::new();
        for stock in stocks {
            let sector = self.lookup.sector_of(&stock.code);
            by_sector.entry(sector).or_default().push(stock.clone());
        }

        let mut groups: Vec<SectorGroup> = by_sector
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(name, members)| build_group(name, members))
            .collect();

        groups.sort_by(|a, b| {
            b.strength_score
                .partial_cmp(&a.strength_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        debug!(sectors = groups.len(), "Sector analysis complete");
        groups
    }
}

fn build_group(name: String, members: Vec<StockAnalysis>) -> SectorGroup {
    let strength_score = sector_strength(&members);
    let capital_inflow = members.iter().map(|s| s.amount).sum();

    SectorGroup {
        strength_score,
        structure: sector_structure(&members),
        capital_inflow,
        persistence: SectorPersistence::from_strength(strength_score),
        core_stocks: core_stocks(&members),
        name,
        stocks: members,
    }
}

/// Sector strength: count term + max-streak term + capital term.
pub fn sector_strength(members: &[StockAnalysis]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }

    let count_score = (members.len() as f64 * 10.0).min(50.0);

    let max_streak = members.iter().map(|s| s.continuous_days).max().unwrap_or(0);
    let streak_score = (f64::from(max_streak) * 15.0).min(30.0);

    let total_amount: f64 = members.iter().map(|s| s.amount).sum();
    let amount_score = if total_amount > 5e9 {
        20.0
    } else if total_amount > 1e9 {
        15.0
    } else if total_amount > 5e8 {
        10.0
    } else {
        5.0
    };

    round2(count_score + streak_score + amount_score)
}

/// Ladder structure from the number of distinct streak heights.
fn sector_structure(members: &[StockAnalysis]) -> StructureRating {
    let mut heights: Vec<u32> = members.iter().map(|s| s.continuous_days).collect();
    heights.sort_unstable();
    heights.dedup();

    match heights.len() {
        n if n >= 3 => StructureRating::MultiTier,
        2 => StructureRating::DoubleTier,
        _ => StructureRating::SingleTier,
    }
}

/// Top 3 by streak height, each tagged with its ladder role.
fn core_stocks(members: &[StockAnalysis]) -> Vec<CoreStock> {
    let max_amount = members.iter().map(|s| s.amount).fold(f64::MIN, f64::max);

    let mut sorted: Vec<&StockAnalysis> = members.iter().collect();
    sorted.sort_by(|a, b| b.continuous_days.cmp(&a.continuous_days));

    sorted
        .iter()
        .take(3)
        .map(|stock| CoreStock {
            code: stock.code.clone(),
            name: stock.name.clone(),
            role_label: ladder_role(stock, max_amount).to_string(),
            continuous_days: stock.continuous_days,
            amount: stock.amount,
        })
        .collect()
}

fn ladder_role(stock: &StockAnalysis, max_amount: f64) -> &'static str {
    if stock.continuous_days >= 3 {
        "高度龙头"
    } else if stock.continuous_days == 2 {
        "跟随龙"
    } else if max_amount > 0.0 && stock.amount >= max_amount * 0.7 {
        "趋势中军"
    } else {
        "补涨/跟风"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(code: &str, days: u32, amount: f64) -> StockAnalysis {
        let mut s = StockAnalysis {
            code: code.to_string(),
            name: format!("股票{}", code),
            close: 11.0,
            pct_change: 10.0,
            amount,
            volume: 1_000_000.0,
            features: Default::default(),
            indicators: Default::default(),
            continuous_days: days,
            total_increase: 0.0,
            daily_increases: Vec::new(),
            continuous_strength: 0.0,
            sector: None,
            composite_score: 0.0,
        };
        s.total_increase = f64::from(days) * 10.0;
        s
    }

    struct FixedLookup;

    impl SectorLookup for FixedLookup {
        fn sector_of(&self, code: &str) -> String {
            if code.starts_with('6') {
                "科技".to_string()
            } else {
                "医药".to_string()
            }
        }
    }

    #[test]
    fn test_hash_lookup_is_deterministic() {
        let lookup = HashSectorLookup;
        let first = lookup.sector_of("600519");
        for _ in 0..10 {
            assert_eq!(lookup.sector_of("600519"), first);
        }
        assert!(SECTOR_CATALOGUE.contains(&first.as_str()));
    }

    #[test]
    fn test_singleton_sectors_excluded() {
        let analyzer = SectorAnalyzer::new(Arc::new(FixedLookup));
        let stocks = vec![stock("600001", 2, 1e8), stock("600002", 1, 1e8), stock("000001", 1, 1e8)];
        let groups = analyzer.analyze(&stocks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "科技");
        assert_eq!(groups[0].stock_count(), 2);
    }

    #[test]
    fn test_strength_score_components() {
        // 3 stocks * 10 = 30, max streak 4 capped at 30, amount 6e9 -> 20
        let members = vec![stock("600001", 4, 2e9), stock("600002", 1, 2e9), stock("600003", 0, 2e9)];
        assert!((sector_strength(&members) - 80.0).abs() < 1e-9);

        // 2 stocks, no streak, light amount -> 20 + 0 + 5
        let weak = vec![stock("600001", 0, 1e8), stock("600002", 0, 1e8)];
        assert!((sector_strength(&weak) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_structure_rating() {
        let multi = vec![stock("a", 3, 1e8), stock("b", 2, 1e8), stock("c", 1, 1e8)];
        assert_eq!(sector_structure(&multi), StructureRating::MultiTier);

        let double = vec![stock("a", 2, 1e8), stock("b", 1, 1e8)];
        assert_eq!(sector_structure(&double), StructureRating::DoubleTier);

        let single = vec![stock("a", 1, 1e8), stock("b", 1, 1e8)];
        assert_eq!(sector_structure(&single), StructureRating::SingleTier);
    }

    #[test]
    fn test_persistence_tiers() {
        assert_eq!(SectorPersistence::from_strength(75.0), SectorPersistence::Strong);
        assert_eq!(SectorPersistence::from_strength(70.0), SectorPersistence::Strong);
        assert_eq!(SectorPersistence::from_strength(55.0), SectorPersistence::Moderate);
        assert_eq!(SectorPersistence::from_strength(35.0), SectorPersistence::Weak);
        assert_eq!(SectorPersistence::from_strength(10.0), SectorPersistence::OneDayMove);
    }

    #[test]
    fn test_core_stocks_top_three_with_roles() {
        let members = vec![
            stock("600001", 4, 5e8),
            stock("600002", 2, 9e8),
            stock("600003", 0, 9e8),
            stock("600004", 0, 1e8),
        ];
        let cores = core_stocks(&members);
        assert_eq!(cores.len(), 3);
        assert_eq!(cores[0].code, "600001");
        assert_eq!(cores[0].role_label, "高度龙头");
        assert_eq!(cores[1].role_label, "跟随龙");
        // 9e8 >= 0.7 * 9e8, no streak -> trend carrier
        assert_eq!(cores[2].role_label, "趋势中军");
    }

    #[test]
    fn test_groups_sorted_by_strength() {
        let analyzer = SectorAnalyzer::new(Arc::new(FixedLookup));
        let stocks = vec![
            // 科技: strong streaks
            stock("600001", 4, 2e9),
            stock("600002", 2, 2e9),
            stock("600003", 1, 2e9),
            // 医药: two quiet stocks
            stock("000001", 0, 1e8),
            stock("000002", 0, 1e8),
        ];
        let groups = analyzer.analyze(&stocks);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "科技");
        assert!(groups[0].strength_score > groups[1].strength_score);
        assert_eq!(groups[0].persistence, SectorPersistence::Strong);
        assert_eq!(groups[1].persistence, SectorPersistence::OneDayMove);
    }

    #[test]
    fn test_capital_inflow_sums_amounts() {
        let analyzer = SectorAnalyzer::new(Arc::new(FixedLookup));
        let stocks = vec![stock("600001", 1, 3e8), stock("600002", 1, 2e8)];
        let groups = analyzer.analyze(&stocks);
        assert!((groups[0].capital_inflow - 5e8).abs() < 1e-3);
    }
}
