pub mod discord;
pub mod email;
pub mod slack;
pub mod teams;
pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::notification::formatter::FormattedNotification;
use crate::notification::payload::NotificationPayload;
use crate::notification::Channel;

pub use discord::DiscordAdapter;
pub use email::{EmailAdapter, EmailConfig};
pub use slack::SlackAdapter;
pub use teams::TeamsAdapter;
pub use telegram::TelegramAdapter;

/// 渠道适配器
///
/// 每个适配器只负责一个投递目标；凭据与连接信息在构造时校验完毕，
/// 发送阶段不再出现配置性失败以外的意外分支。
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// 结果表里的键，同渠道多实例时由适配器自行区分
    fn name(&self) -> String {
        self.channel().as_str().to_string()
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        rendered: &FormattedNotification,
    ) -> anyhow::Result<()>;
}

/// 渠道配置：按渠道种类区分的和类型
///
/// 每个变体只携带自己需要的字段，构造适配器时一次性校验。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    Email(EmailConfig),
    SlackWebhook { webhook_url: String },
    DiscordWebhook { webhook_url: String },
    TeamsWebhook { webhook_url: String },
    TelegramBot { bot_token: String, chat_id: String },
}

impl ChannelConfig {
    /// 校验配置并构造适配器，校验失败立即返回错误
    pub fn build_adapter(self) -> anyhow::Result<Arc<dyn ChannelAdapter>> {
        match self {
            ChannelConfig::Email(config) => Ok(Arc::new(EmailAdapter::new(config)?)),
            ChannelConfig::SlackWebhook { webhook_url } => {
                Ok(Arc::new(SlackAdapter::new(webhook_url)?))
            }
            ChannelConfig::DiscordWebhook { webhook_url } => {
                Ok(Arc::new(DiscordAdapter::new(webhook_url)?))
            }
            ChannelConfig::TeamsWebhook { webhook_url } => {
                Ok(Arc::new(TeamsAdapter::new(webhook_url)?))
            }
            ChannelConfig::TelegramBot { bot_token, chat_id } => {
                Ok(Arc::new(TelegramAdapter::new(bot_token, chat_id)?))
            }
        }
    }
}

/// 校验 webhook 地址：必须是带主机名的 http(s) URL
pub(crate) fn validate_webhook_url(webhook_url: &str, channel: Channel) -> anyhow::Result<()> {
    if webhook_url.is_empty() {
        anyhow::bail!("{} webhook URL is empty", channel);
    }

    let parsed = url::Url::parse(webhook_url)
        .map_err(|e| anyhow::anyhow!("Invalid {} webhook URL: {}", channel, e))?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        anyhow::bail!("{} webhook URL must use http or https", channel);
    }

    if parsed.host_str().is_none() {
        anyhow::bail!("{} webhook URL is missing a host", channel);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_validation() {
        assert!(validate_webhook_url("https://hooks.slack.com/services/T/B/x", Channel::Slack).is_ok());
        assert!(validate_webhook_url("http://127.0.0.1:9999/hook", Channel::Slack).is_ok());
        assert!(validate_webhook_url("", Channel::Slack).is_err());
        assert!(validate_webhook_url("ftp://example.com/hook", Channel::Slack).is_err());
        assert!(validate_webhook_url("not a url", Channel::Slack).is_err());
    }

    #[test]
    fn test_invalid_configs_rejected_at_construction() {
        let slack = ChannelConfig::SlackWebhook {
            webhook_url: String::new(),
        };
        assert!(slack.build_adapter().is_err());

        let telegram = ChannelConfig::TelegramBot {
            bot_token: String::new(),
            chat_id: "123".to_string(),
        };
        assert!(telegram.build_adapter().is_err());
    }

    #[test]
    fn test_valid_webhook_config_builds() {
        let discord = ChannelConfig::DiscordWebhook {
            webhook_url: "https://discord.com/api/webhooks/1/token".to_string(),
        };
        let adapter = discord.build_adapter().unwrap();
        assert_eq!(adapter.channel(), Channel::Discord);
        assert_eq!(adapter.name(), "discord");
    }

    #[test]
    fn test_channel_config_serialization_is_tagged() {
        let config = ChannelConfig::SlackWebhook {
            webhook_url: "https://hooks.slack.com/services/T/B/x".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"kind\":\"slack_webhook\""));
    }
}
