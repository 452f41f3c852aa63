use async_trait::async_trait;
use serde::Deserialize;

use crate::notification::formatter::FormattedNotification;
use crate::notification::payload::NotificationPayload;
use crate::notification::providers::ChannelAdapter;
use crate::notification::Channel;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API 响应
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram 机器人适配器
///
/// 通过 sendMessage 发送纯文本表示；HTTP 200 不代表成功，
/// 还要检查响应体里的 `ok` 字段。
pub struct TelegramAdapter {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramAdapter {
    pub fn new(bot_token: String, chat_id: String) -> anyhow::Result<Self> {
        if bot_token.trim().is_empty() {
            anyhow::bail!("Telegram bot token is empty");
        }
        if chat_id.trim().is_empty() {
            anyhow::bail!("Telegram chat id is empty");
        }

        Ok(Self {
            bot_token,
            chat_id,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// 测试时指向本地 mock 服务
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(
        &self,
        _payload: &NotificationPayload,
        rendered: &FormattedNotification,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": rendered.plain_text,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API returned HTTP {}: {}", status, detail);
        }

        let api_response: TelegramResponse = response.json().await?;
        if !api_response.ok {
            anyhow::bail!(
                "Telegram API rejected the message: {}",
                api_response.description.unwrap_or_default()
            );
        }

        log::info!("Telegram notification delivered to chat {}", self.chat_id);
        Ok(())
    }
}
