//! Stock basic-info cache.
//!
//! An explicitly owned, TTL'd code→name cache held by the data provider.
//! Used to backfill names on roster rows when the upstream response omits
//! them; `invalidate` forces a refresh on the next fill.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

struct CacheState {
    names: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// Cache of per-stock basic info (currently: names).
pub struct StockBasicCache {
    state: RwLock<CacheState>,
    ttl_secs: i64,
}

impl StockBasicCache {
    /// Create an empty cache with the default TTL (one trading day is
    /// plenty; names change only on rare renames).
    pub fn new() -> Self {
        Self::with_ttl(24 * 3600)
    }

    /// Create with a custom TTL in seconds.
    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            state: RwLock::new(CacheState {
                names: HashMap::new(),
                expires_at: Utc::now(),
            }),
            ttl_secs,
        }
    }

    /// Look up a stock name. `None` when unknown or expired.
    pub fn name_of(&self, code: &str) -> Option<String> {
        let state = self.state.read().ok()?;
        if Utc::now() > state.expires_at {
            return None;
        }
        state.names.get(code).cloned()
    }

    /// Replace the cache contents and reset the TTL.
    pub fn fill(&self, names: impl IntoIterator<Item = (String, String)>) {
        if let Ok(mut state) = self.state.write() {
            state.names = names.into_iter().collect();
            state.expires_at = Utc::now() + Duration::seconds(self.ttl_secs);
        }
    }

    /// Drop all entries; the next `name_of` miss triggers a refill upstream.
    pub fn invalidate(&self) {
        if let Ok(mut state) = self.state.write() {
            state.names.clear();
            state.expires_at = Utc::now();
        }
    }

    /// Number of cached entries (expired entries included).
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.names.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StockBasicCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_lookup() {
        let cache = StockBasicCache::new();
        assert!(cache.is_empty());

        cache.fill(vec![("600519".to_string(), "贵州茅台".to_string())]);
        assert_eq!(cache.name_of("600519").as_deref(), Some("贵州茅台"));
        assert!(cache.name_of("000001").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate() {
        let cache = StockBasicCache::new();
        cache.fill(vec![("600519".to_string(), "贵州茅台".to_string())]);
        cache.invalidate();
        assert!(cache.name_of("600519").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_not_returned() {
        let cache = StockBasicCache::with_ttl(-1);
        cache.fill(vec![("600519".to_string(), "贵州茅台".to_string())]);
        assert!(cache.name_of("600519").is_none());
    }
}
