//! Notification module.
//!
//! Sends the rendered report to a WeCom (企业微信) group-robot webhook.
//! Delivery is best-effort: failures are logged and retried with backoff,
//! but never abort the run.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;

/// WeCom webhook message payload.
#[derive(Debug, Serialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
enum WecomMessage {
    Markdown { markdown: MarkdownContent },
    Text { text: TextContent },
}

#[derive(Debug, Serialize)]
struct MarkdownContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct TextContent {
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mentioned_list: Vec<String>,
}

/// WeCom webhook response.
#[derive(Debug, Deserialize)]
struct WecomResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// WeCom webhook notifier.
pub struct WecomNotifier {
    enabled: bool,
    webhook_url: String,
    retry_count: u32,
    client: reqwest::Client,
}

impl WecomNotifier {
    pub fn new(config: &NotificationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            enabled: config.enabled,
            webhook_url: config.webhook_url.clone(),
            retry_count: config.retry_count.max(1),
            client,
        }
    }

    /// Whether sending is enabled and configured.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.webhook_url.is_empty()
    }

    /// Send a markdown report body.
    pub async fn send_report(&self, markdown: &str) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!("Notifications disabled, skipping");
            return Ok(());
        }

        let message = WecomMessage::Markdown {
            markdown: MarkdownContent {
                content: markdown.to_string(),
            },
        };
        self.send_with_retry(&message).await
    }

    /// Send a failure alert mentioning everyone in the group.
    pub async fn send_error(&self, error_text: &str) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let message = WecomMessage::Text {
            text: TextContent {
                content: format!(
                    "⚠️ 复盘系统运行异常\n{}",
                    crate::strategy::truncate_chars(error_text, 200)
                ),
                mentioned_list: vec!["@all".to_string()],
            },
        };
        self.send_with_retry(&message).await
    }

    async fn send_with_retry(&self, message: &WecomMessage) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.try_send(message).await {
                Ok(()) => {
                    tracing::info!("Notification sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %e,
                        "Failed to send notification"
                    );
                    last_error = Some(e);

                    if attempt < self.retry_count {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown notification error")))
    }

    async fn try_send(&self, message: &WecomMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, body);
        }

        let result: WecomResponse = response.json().await?;
        if result.errcode == 0 {
            Ok(())
        } else {
            anyhow::bail!("WeCom error {}: {}", result.errcode, result.errmsg)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_webhook() {
        let notifier = WecomNotifier::new(&NotificationConfig::default());
        assert!(!notifier.is_enabled());

        let configured = WecomNotifier::new(&NotificationConfig {
            enabled: true,
            webhook_url: "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=test".to_string(),
            retry_count: 3,
        });
        assert!(configured.is_enabled());
    }

    #[test]
    fn test_markdown_payload_shape() {
        let message = WecomMessage::Markdown {
            markdown: MarkdownContent {
                content: "**测试**".to_string(),
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["msgtype"], "markdown");
        assert_eq!(json["markdown"]["content"], "**测试**");
    }

    #[test]
    fn test_text_payload_mentions_all() {
        let message = WecomMessage::Text {
            text: TextContent {
                content: "告警".to_string(),
                mentioned_list: vec!["@all".to_string()],
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["msgtype"], "text");
        assert_eq!(json["text"]["mentioned_list"][0], "@all");
    }

    #[tokio::test]
    async fn test_send_disabled_is_noop() {
        let notifier = WecomNotifier::new(&NotificationConfig::default());
        assert!(notifier.send_report("body").await.is_ok());
        assert!(notifier.send_error("boom").await.is_ok());
    }
}
