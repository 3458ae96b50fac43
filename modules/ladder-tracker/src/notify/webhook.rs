use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use ladder_common::{AppliedDelta, DailyReport, LeaderboardEntry};

use super::backend::Reporter;
use super::render;

/// Chat webhooks reject message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts rendered reports to a chat incoming webhook.
pub struct WebhookReporter {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookReporter {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, content: String) -> anyhow::Result<()> {
        let payload = json!({ "content": truncate(content, MAX_CONTENT_CHARS) });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Webhook returned non-success");
            anyhow::bail!("Webhook returned {status}");
        }

        Ok(())
    }
}

#[async_trait]
impl Reporter for WebhookReporter {
    async fn scoring(&self, deltas: &[AppliedDelta]) -> anyhow::Result<()> {
        if deltas.is_empty() {
            debug!("No point updates to post");
            return Ok(());
        }
        self.post(render::scoring(deltas)).await
    }

    async fn leaderboard(&self, entries: &[LeaderboardEntry]) -> anyhow::Result<()> {
        self.post(render::leaderboard(entries)).await
    }

    async fn daily(&self, report: &DailyReport) -> anyhow::Result<()> {
        self.post(render::daily(report)).await
    }
}

fn truncate(mut content: String, max_chars: usize) -> String {
    if let Some((idx, _)) = content.char_indices().nth(max_chars) {
        content.truncate(idx);
    }
    content
}
