use async_trait::async_trait;

use crate::notification::formatter::FormattedNotification;
use crate::notification::payload::NotificationPayload;
use crate::notification::providers::{validate_webhook_url, ChannelAdapter};
use crate::notification::Channel;

/// Slack incoming webhook 适配器
///
/// 发送 mrkdwn 文本，Slack 对成功请求返回 200 和字面量 "ok"。
pub struct SlackAdapter {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackAdapter {
    pub fn new(webhook_url: String) -> anyhow::Result<Self> {
        validate_webhook_url(&webhook_url, Channel::Slack)?;

        Ok(Self {
            webhook_url,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ChannelAdapter for SlackAdapter {
    fn channel(&self) -> Channel {
        Channel::Slack
    }

    async fn send(
        &self,
        _payload: &NotificationPayload,
        rendered: &FormattedNotification,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({ "text": rendered.slack });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Slack webhook returned HTTP {}: {}", status, detail);
        }

        log::info!("Slack notification delivered");
        Ok(())
    }
}
