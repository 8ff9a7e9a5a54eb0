//! AI commentary engine.
//!
//! Optional, config-gated enrichment: asks a DeepSeek chat-completions
//! endpoint why each Leader/Core/Catch-up stock hit its limit. Requests fan
//! out with bounded concurrency and a per-stock timeout; any failure yields
//! an empty result for that stock only and never touches the core pipeline.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{Role, RoleAssignment, StockAnalysis};
use crate::config::CommentaryConfig;

/// Lines mentioning one of these keywords are extracted as limit-up
/// reasons.
const REASON_KEYWORDS: &[&str] = &[
    "消息催化",
    "政策",
    "公告",
    "业绩",
    "技术突破",
    "资金流入",
    "板块轮动",
];

/// Summary excerpt length in chars.
const SUMMARY_CHARS: usize = 200;

// ============================================================================
// Commentary Result
// ============================================================================

/// Commentary for one stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCommentary {
    pub code: String,
    /// Short excerpt of the analysis
    pub summary: String,
    /// Full analysis text
    pub detail: String,
    /// Extracted limit-up reasons
    pub reasons: Vec<String>,
    /// Role the commentary was requested for
    pub role_confirmed: Option<String>,
}

// ============================================================================
// Chat Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i64,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

// ============================================================================
// Commentary Engine
// ============================================================================

/// Config-gated commentary engine.
pub struct CommentaryEngine {
    config: CommentaryConfig,
    client: reqwest::Client,
}

impl CommentaryEngine {
    pub fn new(config: CommentaryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client }
    }

    /// Whether commentary is enabled and configured.
    pub fn is_active(&self) -> bool {
        self.config.is_active()
    }

    /// Annotate the configured roles' stocks, keyed by code.
    ///
    /// Always returns; a failed stock is simply absent from the map.
    pub async fn annotate(
        &self,
        roles: &RoleAssignment,
        trade_date: NaiveDate,
    ) -> HashMap<String, StockCommentary> {
        if !self.is_active() {
            debug!("Commentary disabled, skipping");
            return HashMap::new();
        }

        let mut targets: Vec<(Role, StockAnalysis)> = Vec::new();
        for role in &self.config.analyze_roles {
            let stocks = match role {
                Role::Leader => &roles.leaders,
                Role::Core => &roles.cores,
                Role::CatchUp => &roles.catch_ups,
                Role::Watch => continue,
            };
            for stock in stocks {
                targets.push((*role, stock.clone()));
            }
        }

        if targets.is_empty() {
            return HashMap::new();
        }

        info!(count = targets.len(), "Requesting AI commentary");

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let results: Vec<Option<StockCommentary>> = stream::iter(targets)
            .map(|(role, stock)| async move {
                match tokio::time::timeout(timeout, self.analyze_stock(&stock, role, trade_date))
                    .await
                {
                    Ok(Ok(commentary)) => Some(commentary),
                    Ok(Err(e)) => {
                        warn!(code = %stock.code, error = %e, "Commentary request failed");
                        None
                    }
                    Err(_) => {
                        warn!(code = %stock.code, "Commentary request timed out");
                        None
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let map: HashMap<String, StockCommentary> = results
            .into_iter()
            .flatten()
            .map(|c| (c.code.clone(), c))
            .collect();

        info!(succeeded = map.len(), "AI commentary complete");
        map
    }

    async fn analyze_stock(
        &self,
        stock: &StockAnalysis,
        role: Role,
        trade_date: NaiveDate,
    ) -> anyhow::Result<StockCommentary> {
        let prompt = build_prompt(stock, role, trade_date);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "你是一名资深A股分析师，擅长分析涨停原因和消息催化。".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status.as_u16(), body);
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Empty completion"))?;

        Ok(parse_commentary(&stock.code, role, &content))
    }
}

/// Per-stock analysis prompt.
fn build_prompt(stock: &StockAnalysis, role: Role, trade_date: NaiveDate) -> String {
    format!(
        "请分析以下股票{}涨停的原因和消息催化：\n\n\
         股票信息：\n\
         名称：{}\n\
         代码：{}\n\
         角色：{}\n\
         连板天数：{}天\n\
         累计涨幅：{:.2}%\n\
         所属板块：{}\n\n\
         请从以下角度进行结构化分析：\n\
         1. **直接消息催化**：哪些具体消息、公告、政策导致了涨停？\n\
         2. **板块效应**：所属板块整体表现如何？是否是板块龙头？\n\
         3. **技术面分析**：资金流向、技术形态、突破情况。\n\
         4. **持续性判断**：涨停势头是否可持续？后续可能走势。\n\
         5. **风险提示**：需要关注哪些风险？\n\n\
         要求：分析要具体、有逻辑性，给出明确的判断依据。",
        trade_date.format("%Y-%m-%d"),
        stock.name,
        stock.code,
        role,
        stock.continuous_days,
        stock.total_increase,
        stock.sector.as_deref().unwrap_or("未知"),
    )
}

/// Structure the raw completion text.
fn parse_commentary(code: &str, role: Role, content: &str) -> StockCommentary {
    StockCommentary {
        code: code.to_string(),
        summary: crate::strategy::truncate_chars(content, SUMMARY_CHARS),
        detail: content.to_string(),
        reasons: extract_reasons(content),
        role_confirmed: Some(role.label().to_string()),
    }
}

/// Lines mentioning a reason keyword, or the generic fallback.
fn extract_reasons(content: &str) -> Vec<String> {
    let reasons: Vec<String> = content
        .lines()
        .filter(|line| REASON_KEYWORDS.iter().any(|kw| line.contains(kw)))
        .map(|line| line.trim().to_string())
        .collect();

    if reasons.is_empty() {
        vec!["综合分析推动涨停".to_string()]
    } else {
        reasons
    }
}

// ============================================================================
// Tests
// ============================================================================
