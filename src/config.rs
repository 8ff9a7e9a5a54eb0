//! Configuration module.
//!
//! Loads the YAML configuration file and provides defaults for every
//! section, so a missing or partial file still yields a runnable setup.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::Role;

/// Weights must sum to 1.0 within this tolerance.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

// ============================================================================
// Top-level Configuration
// ============================================================================

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Market data source settings
    #[serde(default)]
    pub data_sources: DataSourceConfig,

    /// Analysis parameters (thresholds, scoring weights)
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// AI commentary settings (optional, disabled by default)
    #[serde(default)]
    pub commentary: CommentaryConfig,

    /// WeCom webhook notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Report output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is not an error: defaults are used so the tool can
    /// run out of the box. A present-but-invalid file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate structural preconditions.
    ///
    /// The only fatal condition: the four scoring weights must sum to ~1.0.
    pub fn validate(&self) -> Result<()> {
        let sum = self.analysis.score_weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            anyhow::bail!(
                "score_weights must sum to 1.0 (got {:.3}): streak={} limit_time={} seal_amount={} float_cap={}",
                sum,
                self.analysis.score_weights.streak,
                self.analysis.score_weights.limit_time,
                self.analysis.score_weights.seal_amount,
                self.analysis.score_weights.float_cap,
            );
        }
        Ok(())
    }
}

// ============================================================================
// Data Source Configuration
// ============================================================================

/// Market data source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Primary provider name (label recorded in report metadata)
    #[serde(default = "default_primary")]
    pub primary: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Calendar days of history to fetch per stock
    #[serde(default = "default_history_days")]
    pub history_days: i64,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            request_timeout_secs: default_request_timeout(),
            history_days: default_history_days(),
        }
    }
}

fn default_primary() -> String {
    "eastmoney".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_history_days() -> i64 {
    30
}

// ============================================================================
// Analysis Configuration
// ============================================================================

/// Analysis thresholds and scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Percent change at or above which a day counts as limit-up
    #[serde(default = "default_limit_threshold")]
    pub limit_threshold: f64,

    /// Minimum same-sector limit-up count for a sector to enter role analysis
    #[serde(default = "default_sector_strength_threshold")]
    pub sector_strength_threshold: usize,

    /// Composite score weights
    #[serde(default)]
    pub score_weights: ScoreWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            limit_threshold: default_limit_threshold(),
            sector_strength_threshold: default_sector_strength_threshold(),
            score_weights: ScoreWeights::default(),
        }
    }
}

fn default_limit_threshold() -> f64 {
    9.8
}

fn default_sector_strength_threshold() -> usize {
    3
}

/// Weights of the four composite-score factors. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Streak height factor
    #[serde(default = "default_streak_weight")]
    pub streak: f64,

    /// Limit-up timing factor (no timestamp data is modeled; the sub-score
    /// is a constant, but the weight is still configurable)
    #[serde(default = "default_limit_time_weight")]
    pub limit_time: f64,

    /// Seal/traded amount factor
    #[serde(default = "default_seal_amount_weight")]
    pub seal_amount: f64,

    /// Technical quality factor, standing in for float market cap
    #[serde(default = "default_float_cap_weight")]
    pub float_cap: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.streak + self.limit_time + self.seal_amount + self.float_cap
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            streak: default_streak_weight(),
            limit_time: default_limit_time_weight(),
            seal_amount: default_seal_amount_weight(),
            float_cap: default_float_cap_weight(),
        }
    }
}

fn default_streak_weight() -> f64 {
    0.35
}

fn default_limit_time_weight() -> f64 {
    0.25
}

fn default_seal_amount_weight() -> f64 {
    0.20
}

fn default_float_cap_weight() -> f64 {
    0.20
}

// ============================================================================
// Commentary Configuration
// ============================================================================

/// AI commentary settings (DeepSeek chat completions API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentaryConfig {
    /// Whether commentary is enabled
    #[serde(default)]
    pub enabled: bool,

    /// API key (empty disables commentary even when enabled)
    #[serde(default)]
    pub api_key: String,

    /// API base URL
    #[serde(default = "default_commentary_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_commentary_model")]
    pub model: String,

    /// Maximum tokens per completion
    #[serde(default = "default_commentary_max_tokens")]
    pub max_tokens: i64,

    /// Sampling temperature
    #[serde(default = "default_commentary_temperature")]
    pub temperature: f64,

    /// Per-stock request timeout in seconds
    #[serde(default = "default_commentary_timeout")]
    pub timeout_secs: u64,

    /// Maximum in-flight requests
    #[serde(default = "default_commentary_concurrency")]
    pub max_concurrency: usize,

    /// Which roles get commentary
    #[serde(default = "default_analyze_roles")]
    pub analyze_roles: Vec<Role>,
}

impl CommentaryConfig {
    /// Commentary runs only when enabled and a key is configured.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: default_commentary_base_url(),
            model: default_commentary_model(),
            max_tokens: default_commentary_max_tokens(),
            temperature: default_commentary_temperature(),
            timeout_secs: default_commentary_timeout(),
            max_concurrency: default_commentary_concurrency(),
            analyze_roles: default_analyze_roles(),
        }
    }
}

fn default_commentary_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_commentary_model() -> String {
    "deepseek-chat".to_string()
}

fn default_commentary_max_tokens() -> i64 {
    1000
}

fn default_commentary_temperature() -> f64 {
    0.3
}

fn default_commentary_timeout() -> u64 {
    60
}

fn default_commentary_concurrency() -> usize {
    4
}

fn default_analyze_roles() -> Vec<Role> {
    vec![Role::Leader]
}

// ============================================================================
// Notification Configuration
// ============================================================================

/// WeCom group-robot webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether notifications are enabled
    #[serde(default)]
    pub enabled: bool,

    /// Webhook URL
    #[serde(default)]
    pub webhook_url: String,

    /// Send retry attempts
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            retry_count: default_retry_count(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for report files
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    /// Report formats to generate
    #[serde(default = "default_report_formats")]
    pub formats: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            formats: default_report_formats(),
        }
    }
}

fn default_report_dir() -> String {
    "reports".to_string()
}

fn default_report_formats() -> Vec<String> {
    vec!["markdown".to_string(), "json".to_string(), "text".to_string()]
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Tests
// ============================================================================
