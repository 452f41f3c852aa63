use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::formatter::format_duration;
use crate::notification::{Channel, Severity};

/// 结构化字段，保持插入顺序
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub label: String,
    pub value: String,
}

/// 抽象通知载荷
///
/// 构造完成后不再修改；格式化层负责把同一份内容渲染成各渠道的表示。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub source_id: String,
    pub severity: Severity,
    pub summary: String,
    pub fields: Vec<PayloadField>,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

impl NotificationPayload {
    pub fn new(source_id: impl Into<String>, severity: Severity, summary: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            severity,
            summary: summary.into(),
            fields: Vec::new(),
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    /// 从一条同步结果构造载荷，错误信息进入结构化字段
    pub fn from_outcome(outcome: &crate::outcome::SyncOutcome, severity: Severity) -> Self {
        let summary = if outcome.success {
            format!("Sync for '{}' succeeded", outcome.source_id)
        } else {
            format!("Sync for '{}' failed", outcome.source_id)
        };

        let mut payload = Self::new(outcome.source_id.clone(), severity, summary)
            .with_timestamp(outcome.timestamp);

        if let Some(kind) = outcome.error_kind {
            payload = payload.with_field("Error kind", kind.as_str());
        }
        if let Some(ref message) = outcome.error_message {
            payload = payload.with_field("Error", message.clone());
        }
        if let Some(ref correlation_id) = outcome.correlation_id {
            payload = payload.with_correlation_id(correlation_id.clone());
        }

        payload
    }

    pub fn with_field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(PayloadField {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    /// 时长字段在这里渲染一次，保证所有渠道看到同一个字符串
    pub fn with_duration_field(self, label: impl Into<String>, duration: Duration) -> Self {
        let rendered = format_duration(duration);
        self.with_field(label, rendered)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_generated_correlation_id(self) -> Self {
        let id = Uuid::new_v4().to_string();
        self.with_correlation_id(id)
    }

    /// 发送前的前置校验，任何渠道被调用之前执行
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source_id.trim().is_empty() {
            anyhow::bail!("Notification payload is missing a source id");
        }
        if self.summary.trim().is_empty() {
            anyhow::bail!("Notification payload is missing a summary");
        }
        for field in &self.fields {
            if field.label.trim().is_empty() {
                anyhow::bail!("Notification payload contains a field with an empty label");
            }
        }
        Ok(())
    }
}

/// 单渠道投递结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub channel: Channel,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl DeliveryResult {
    pub fn success(channel: Channel, elapsed: Duration) -> Self {
        Self {
            channel,
            success: true,
            error: None,
            sent_at: Utc::now(),
            elapsed,
        }
    }

    pub fn failure(channel: Channel, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.into()),
            sent_at: Utc::now(),
            elapsed,
        }
    }
}
