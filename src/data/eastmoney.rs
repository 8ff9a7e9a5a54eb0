//! Eastmoney adapter for A-share market data.
//!
//! Free, keyless endpoints:
//! - Limit-up pool: push2ex.eastmoney.com (date-addressable)
//! - Spot snapshot: push2.eastmoney.com (fallback roster source)
//! - Daily K-line: push2his.eastmoney.com

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::cache::StockBasicCache;
use super::provider::{MarketDataProvider, ProviderError};
use super::{DailyBar, LimitUpRecord};

// ============================================================================
// Constants
// ============================================================================

/// Limit-up pool (涨停池) API
const ZT_POOL_URL: &str = "https://push2ex.eastmoney.com/getTopicZTPool";

/// Full-market spot snapshot API
const SPOT_LIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

/// Historical K-line API
const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";

/// Market filter covering SZ main board, ChiNext, SH main board and STAR
const SPOT_MARKET_FS: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23";

// ============================================================================
// Symbol Mapping
// ============================================================================

/// Convert a bare security code to the eastmoney secid format.
///
/// "600519" -> "1.600519" (SH), "000001" -> "0.000001" (SZ)
fn to_secid(code: &str) -> Option<String> {
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let market = match code.as_bytes()[0] {
        b'6' => "1",
        b'0' | b'3' => "0",
        _ => return None,
    };
    Some(format!("{}.{}", market, code))
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ZtPoolResponse {
    #[serde(default)]
    data: Option<ZtPoolData>,
}

#[derive(Debug, Deserialize)]
struct ZtPoolData {
    #[serde(default)]
    pool: Vec<ZtPoolItem>,
}

/// One limit-up pool entry. Prices come scaled by 1000; the pool reports
/// turnover but no share volume.
#[derive(Debug, Deserialize)]
struct ZtPoolItem {
    /// Security code
    c: String,
    /// Security name
    #[serde(default)]
    n: Option<String>,
    /// Price × 1000
    #[serde(default)]
    p: Option<f64>,
    /// Percent change
    #[serde(default)]
    zdp: Option<f64>,
    /// Turnover (yuan)
    #[serde(default)]
    amount: Option<f64>,
    /// Turnover rate (%)
    #[serde(default)]
    hs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct KlineResponse {
    #[serde(default)]
    rc: i32,
    #[serde(default)]
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Option<Vec<String>>,
}

// ============================================================================
// Eastmoney Provider
// ============================================================================

/// Eastmoney data provider.
///
/// Owns a [`StockBasicCache`] used to backfill names on roster rows; call
/// `basics().invalidate()` to force a refresh.
pub struct EastmoneyProvider {
    client: reqwest::Client,
    limit_threshold: f64,
    basics: StockBasicCache,
}

impl EastmoneyProvider {
    /// Create a provider with the given request timeout and limit threshold
    /// (used by the spot-snapshot fallback to decide what counts as
    /// limit-up).
    pub fn new(request_timeout_secs: u64, limit_threshold: f64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            limit_threshold,
            basics: StockBasicCache::new(),
        }
    }

    /// The owned basic-info cache.
    pub fn basics(&self) -> &StockBasicCache {
        &self.basics
    }

    /// Fetch the limit-up pool for a given date.
    async fn fetch_zt_pool(
        &self,
        trade_date: NaiveDate,
    ) -> Result<Vec<LimitUpRecord>, ProviderError> {
        let url = format!(
            "{}?ut=7eea3edcaed734bea9cbfc24409ed989&dpt=wz.ztzt&Pageindex=0&pagesize=10000&sort=fbt%3Aasc&date={}",
            ZT_POOL_URL,
            trade_date.format("%Y%m%d"),
        );

        debug!(url = %url, "Fetching limit-up pool from eastmoney");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", response.status())));
        }

        let parsed: ZtPoolResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse pool response: {}", e)))?;

        let pool = parsed.data.map(|d| d.pool).unwrap_or_default();

        let mut records = Vec::with_capacity(pool.len());
        for item in pool {
            let name = match item.n.filter(|n| !n.is_empty()) {
                Some(n) => n,
                None => self.stock_name(&item.c).await,
            };
            records.push(LimitUpRecord {
                code: item.c,
                name,
                close: item.p.unwrap_or(0.0) / 1000.0,
                pct_change: item.zdp.unwrap_or(0.0),
                amount: item.amount.unwrap_or(0.0),
                volume: 0.0,
                turnover_rate: item.hs,
                trade_date,
            });
        }
        Ok(records)
    }

    /// Fallback roster: filter the full-market spot snapshot by the limit
    /// threshold. Only reflects the latest session, like the upstream page.
    async fn fetch_spot_limit_ups(
        &self,
        trade_date: NaiveDate,
    ) -> Result<Vec<LimitUpRecord>, ProviderError> {
        let rows = self.fetch_spot_list().await?;

        let mut records = Vec::new();
        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let (Some(code), Some(name)) = (
                row.get("f12").and_then(|v| v.as_str()),
                row.get("f14").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            names.push((code.to_string(), name.to_string()));

            let pct = field_f64(row, "f3");
            if pct < self.limit_threshold {
                continue;
            }
            records.push(LimitUpRecord {
                code: code.to_string(),
                name: name.to_string(),
                close: field_f64(row, "f2"),
                pct_change: pct,
                amount: field_f64(row, "f6"),
                volume: field_f64(row, "f5"),
                turnover_rate: row.get("f8").and_then(|v| v.as_f64()),
                trade_date,
            });
        }

        // Refresh the basic-info cache as a side benefit of the full scan.
        self.basics.fill(names);

        Ok(records)
    }

    /// Fetch the full-market spot snapshot rows.
    async fn fetch_spot_list(&self) -> Result<Vec<serde_json::Value>, ProviderError> {
        let url = format!(
            "{}?pn=1&pz=10000&po=1&np=1&fltt=2&invt=2&fid=f3&fs={}&fields=f2,f3,f5,f6,f8,f12,f14",
            SPOT_LIST_URL, SPOT_MARKET_FS,
        );

        debug!(url = %url, "Fetching spot snapshot from eastmoney");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", response.status())));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse spot response: {}", e)))?;

        let rows = parsed
            .get("data")
            .and_then(|d| d.get("diff"))
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(rows)
    }

    /// Look up a stock name, refilling the cache from the spot list on miss.
    async fn stock_name(&self, code: &str) -> String {
        if let Some(name) = self.basics.name_of(code) {
            return name;
        }

        if let Ok(rows) = self.fetch_spot_list().await {
            let names: Vec<(String, String)> = rows
                .iter()
                .filter_map(|row| {
                    let code = row.get("f12")?.as_str()?;
                    let name = row.get("f14")?.as_str()?;
                    Some((code.to_string(), name.to_string()))
                })
                .collect();
            self.basics.fill(names);
        }

        self.basics.name_of(code).unwrap_or_else(|| code.to_string())
    }

    /// Parse eastmoney kline strings into daily bars.
    ///
    /// Each line: "date,open,close,high,low,volume,amount,amplitude,pct_chg,chg,turnover"
    fn parse_klines(code: &str, klines: &[String]) -> Vec<DailyBar> {
        let mut bars: Vec<DailyBar> = Vec::with_capacity(klines.len());

        for line in klines {
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < 9 {
                warn!(code, line = %line, "Skipping malformed kline row");
                continue;
            }

            let Ok(date) = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d") else {
                warn!(code, raw = parts[0], "Skipping kline row with bad date");
                continue;
            };

            let num = |idx: usize| parts.get(idx).and_then(|s| s.parse::<f64>().ok());
            let (Some(open), Some(close), Some(high), Some(low)) =
                (num(1), num(2), num(3), num(4))
            else {
                warn!(code, line = %line, "Skipping kline row with bad prices");
                continue;
            };

            let pre_close = bars.last().map(|prev: &DailyBar| prev.close);
            bars.push(DailyBar {
                date,
                open,
                high,
                low,
                close,
                pre_close,
                volume: num(5).unwrap_or(0.0),
                amount: num(6).unwrap_or(0.0),
                pct_change: num(8),
            });
        }

        bars
    }
}

/// Extract a numeric field, tolerating the "-" placeholder eastmoney uses
/// for suspended stocks.
fn field_f64(row: &serde_json::Value, key: &str) -> f64 {
    row.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

#[async_trait]
impl MarketDataProvider for EastmoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // One bar of the Shanghai index is the cheapest round trip.
        let url = format!(
            "{}?secid=1.000001&klt=101&fqt=0&lmt=1&fields1=f1,f2,f3&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61",
            KLINE_URL,
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Network(format!("HTTP {}", response.status())))
        }
    }

    async fn get_limit_up_roster(
        &self,
        trade_date: NaiveDate,
    ) -> Result<Vec<LimitUpRecord>, ProviderError> {
        match self.fetch_zt_pool(trade_date).await {
            Ok(records) if !records.is_empty() => {
                debug!(count = records.len(), %trade_date, "Limit-up pool fetched");
                return Ok(records);
            }
            Ok(_) => {
                debug!(%trade_date, "Limit-up pool empty, trying spot snapshot");
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Limit-up pool fetch failed, trying spot snapshot");
            }
            Err(e) => return Err(e),
        }

        self.fetch_spot_limit_ups(trade_date).await
    }

    async fn get_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let secid = to_secid(code)
            .ok_or_else(|| ProviderError::InvalidRequest(format!("Invalid code: {}", code)))?;

        let url = format!(
            "{}?secid={}&klt=101&fqt=2&beg={}&end={}&fields1=f1,f2,f3&fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61",
            KLINE_URL,
            secid,
            start_date.format("%Y%m%d"),
            end_date.format("%Y%m%d"),
        );

        debug!(url = %url, code, "Fetching daily kline from eastmoney");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", response.status())));
        }

        let parsed: KlineResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse kline response: {}", e)))?;

        if parsed.rc != 0 {
            return Err(ProviderError::Internal(format!(
                "Eastmoney API error: rc={}",
                parsed.rc
            )));
        }

        let klines = parsed.data.and_then(|d| d.klines).unwrap_or_default();
        Ok(Self::parse_klines(code, &klines))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_secid() {
        assert_eq!(to_secid("600519").as_deref(), Some("1.600519"));
        assert_eq!(to_secid("000001").as_deref(), Some("0.000001"));
        assert_eq!(to_secid("300750").as_deref(), Some("0.300750"));
        assert!(to_secid("sh600519").is_none());
        assert!(to_secid("8888").is_none());
    }

    #[test]
    fn test_parse_klines() {
        let lines = vec![
            "2025-06-02,10.00,10.50,10.60,9.90,120000,1260000.0,7.0,5.00,0.50,1.2".to_string(),
            "2025-06-03,10.50,11.55,11.55,10.40,150000,1700000.0,10.9,10.00,1.05,1.5".to_string(),
        ];
        let bars = EastmoneyProvider::parse_klines("600519", &lines);
        assert_eq!(bars.len(), 2);
        assert!(bars[0].pre_close.is_none());
        assert!((bars[1].pre_close.unwrap() - 10.50).abs() < 1e-9);
        assert!((bars[1].pct_change.unwrap() - 10.0).abs() < 1e-9);
        assert!(bars[0].date < bars[1].date);
    }

    #[test]
    fn test_parse_klines_skips_malformed_rows() {
        let lines = vec![
            "garbage".to_string(),
            "2025-06-03,10.50,11.55,11.55,10.40,150000,1700000.0,10.9,10.00,1.05,1.5".to_string(),
            "not-a-date,1,2,3,4,5,6,7,8,9,10".to_string(),
        ];
        let bars = EastmoneyProvider::parse_klines("600519", &lines);
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_field_f64_tolerates_dash() {
        let row = serde_json::json!({"f2": "-", "f3": 10.01});
        assert!((field_f64(&row, "f2") - 0.0).abs() < 1e-9);
        assert!((field_f64(&row, "f3") - 10.01).abs() < 1e-9);
    }

    #[test]
    fn test_zt_pool_item_parsing() {
        let raw = r#"{"c":"600519","n":"贵州茅台","p":1680500,"zdp":10.0,"amount":5.2e9,"hs":1.3}"#;
        let item: ZtPoolItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.c, "600519");
        assert!((item.p.unwrap() / 1000.0 - 1680.5).abs() < 1e-9);
    }
}
