pub mod dispatcher;
pub mod formatter;
pub mod payload;
pub mod providers;

pub use dispatcher::NotificationDispatcher;
pub use formatter::{format_duration, FormattedNotification, MessageFormatter};
pub use payload::{DeliveryResult, NotificationPayload, PayloadField};
pub use providers::{ChannelAdapter, ChannelConfig};

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Channel {
    Email,
    Slack,
    Discord,
    Teams,
    Telegram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Slack => "slack",
            Channel::Discord => "discord",
            Channel::Teams => "teams",
            Channel::Telegram => "telegram",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
            Severity::Critical => "🚨",
        }
    }

    /// 各渠道共用的主题色
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Info => "#2196F3",
            Severity::Warning => "#FFC107",
            Severity::Error => "#FF5722",
            Severity::Critical => "#D32F2F",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
