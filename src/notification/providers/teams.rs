use async_trait::async_trait;

use crate::notification::formatter::FormattedNotification;
use crate::notification::payload::NotificationPayload;
use crate::notification::providers::{validate_webhook_url, ChannelAdapter};
use crate::notification::Channel;

/// Microsoft Teams webhook 适配器
///
/// 发送 MessageCard：载荷字段逐条映射为卡片 facts，
/// 主题色取自严重程度。
pub struct TeamsAdapter {
    webhook_url: String,
    client: reqwest::Client,
}

impl TeamsAdapter {
    pub fn new(webhook_url: String) -> anyhow::Result<Self> {
        validate_webhook_url(&webhook_url, Channel::Teams)?;

        Ok(Self {
            webhook_url,
            client: reqwest::Client::new(),
        })
    }

    fn build_message_card(&self, payload: &NotificationPayload) -> serde_json::Value {
        let mut facts = vec![
            serde_json::json!({ "name": "Source", "value": payload.source_id }),
            serde_json::json!({ "name": "Severity", "value": payload.severity.label() }),
            serde_json::json!({
                "name": "Time",
                "value": payload.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            }),
        ];

        for field in &payload.fields {
            facts.push(serde_json::json!({ "name": field.label, "value": field.value }));
        }

        if let Some(ref correlation_id) = payload.correlation_id {
            facts.push(serde_json::json!({ "name": "Correlation", "value": correlation_id }));
        }

        serde_json::json!({
            "@type": "MessageCard",
            "@context": "http://schema.org/extensions",
            "summary": payload.summary,
            "themeColor": payload.severity.color().trim_start_matches('#'),
            "sections": [{
                "activityTitle": format!("{} {}", payload.severity.emoji(), payload.summary),
                "facts": facts,
                "markdown": false,
            }],
        })
    }
}

#[async_trait]
impl ChannelAdapter for TeamsAdapter {
    fn channel(&self) -> Channel {
        Channel::Teams
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
        _rendered: &FormattedNotification,
    ) -> anyhow::Result<()> {
        let card = self.build_message_card(payload);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&card)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Teams webhook returned HTTP {}: {}", status, detail);
        }

        log::info!("Teams notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Severity;

    #[test]
    fn test_message_card_carries_all_fields() {
        let adapter =
            TeamsAdapter::new("https://example.webhook.office.com/webhookb2/x".to_string())
                .unwrap();
        let payload = NotificationPayload::new("Main", Severity::Critical, "Sync down")
            .with_field("Attempts", "4")
            .with_correlation_id("run-7");

        let card = adapter.build_message_card(&payload);
        let facts = card["sections"][0]["facts"].as_array().unwrap();
        let names: Vec<&str> = facts.iter().map(|f| f["name"].as_str().unwrap()).collect();

        assert!(names.contains(&"Source"));
        assert!(names.contains(&"Attempts"));
        assert!(names.contains(&"Correlation"));
        assert_eq!(card["themeColor"], "D32F2F");
    }

    #[test]
    fn test_rejects_missing_host() {
        assert!(TeamsAdapter::new("https:///webhookb2/x".to_string()).is_err());
    }
}
