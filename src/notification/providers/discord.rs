use async_trait::async_trait;

use crate::notification::formatter::FormattedNotification;
use crate::notification::payload::NotificationPayload;
use crate::notification::providers::{validate_webhook_url, ChannelAdapter};
use crate::notification::Channel;

/// Discord webhook 适配器
///
/// 发送 markdown 内容，成功时 Discord 返回 204 No Content。
pub struct DiscordAdapter {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordAdapter {
    pub fn new(webhook_url: String) -> anyhow::Result<Self> {
        validate_webhook_url(&webhook_url, Channel::Discord)?;

        Ok(Self {
            webhook_url,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ChannelAdapter for DiscordAdapter {
    fn channel(&self) -> Channel {
        Channel::Discord
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        rendered: &FormattedNotification,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "content": rendered.discord,
            "username": format!("sync-sentinel ({})", payload.source_id),
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook returned HTTP {}: {}", status, detail);
        }

        log::info!("Discord notification delivered");
        Ok(())
    }
}
