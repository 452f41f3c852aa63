use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sync_sentinel::notification::dispatcher::NotificationDispatcher;
use sync_sentinel::notification::formatter::MessageFormatter;
use sync_sentinel::notification::payload::NotificationPayload;
use sync_sentinel::notification::providers::{
    ChannelAdapter, DiscordAdapter, SlackAdapter, TeamsAdapter, TelegramAdapter,
};
use sync_sentinel::notification::Severity;

fn test_payload() -> NotificationPayload {
    NotificationPayload::new("Main", Severity::Error, "Sync failed after retries")
        .with_field("Server", "Main")
        .with_field("Error", "connection refused")
        .with_correlation_id("run-42")
}

#[tokio::test]
async fn test_slack_adapter_posts_mrkdwn_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/T0/B0/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter =
        SlackAdapter::new(format!("{}/services/T0/B0/xyz", mock_server.uri())).unwrap();
    let payload = test_payload();
    let rendered = MessageFormatter::new().format(&payload).unwrap();

    adapter.send(&payload, &rendered).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("Sync failed after retries"));
    assert!(text.contains("connection refused"));
}

#[tokio::test]
async fn test_slack_adapter_surfaces_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_team"))
        .mount(&mock_server)
        .await;

    let adapter = SlackAdapter::new(format!("{}/services/T0/B0/bad", mock_server.uri())).unwrap();
    let payload = test_payload();
    let rendered = MessageFormatter::new().format(&payload).unwrap();

    let err = adapter.send(&payload, &rendered).await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_discord_adapter_accepts_no_content_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/webhooks/1/token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter =
        DiscordAdapter::new(format!("{}/api/webhooks/1/token", mock_server.uri())).unwrap();
    let payload = test_payload();
    let rendered = MessageFormatter::new().format(&payload).unwrap();

    adapter.send(&payload, &rendered).await.unwrap();
}

#[tokio::test]
async fn test_teams_adapter_sends_message_card_with_facts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "@type": "MessageCard" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = TeamsAdapter::new(format!("{}/webhookb2/x", mock_server.uri())).unwrap();
    let payload = test_payload();
    let rendered = MessageFormatter::new().format(&payload).unwrap();

    adapter.send(&payload, &rendered).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let facts = body["sections"][0]["facts"].as_array().unwrap();
    assert!(facts
        .iter()
        .any(|f| f["name"] == "Error" && f["value"] == "connection refused"));
}

#[tokio::test]
async fn test_telegram_adapter_checks_api_ok_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&mock_server)
        .await;

    let adapter = TelegramAdapter::new("123:abc".to_string(), "42".to_string())
        .unwrap()
        .with_api_base(mock_server.uri());
    let payload = test_payload();
    let rendered = MessageFormatter::new().format(&payload).unwrap();

    let err = adapter.send(&payload, &rendered).await.unwrap_err();
    assert!(err.to_string().contains("chat not found"));
}

#[tokio::test]
async fn test_telegram_adapter_delivers_plain_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = TelegramAdapter::new("123:abc".to_string(), "42".to_string())
        .unwrap()
        .with_api_base(mock_server.uri());
    let payload = test_payload();
    let rendered = MessageFormatter::new().format(&payload).unwrap();

    adapter.send(&payload, &rendered).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["chat_id"], "42");
    assert!(body["text"].as_str().unwrap().contains("Server: Main"));
}

#[tokio::test]
async fn test_dispatcher_isolates_failing_webhook() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&mock_server)
        .await;

    let healthy: Arc<dyn ChannelAdapter> =
        Arc::new(SlackAdapter::new(format!("{}/ok", mock_server.uri())).unwrap());
    let broken: Arc<dyn ChannelAdapter> =
        Arc::new(DiscordAdapter::new(format!("{}/broken", mock_server.uri())).unwrap());

    let dispatcher = NotificationDispatcher::new(Duration::from_secs(5));
    let results = dispatcher
        .dispatch(&test_payload(), &[healthy, broken])
        .await
        .unwrap();

    assert!(results["slack"].success);
    assert!(!results["discord"].success);
    assert!(results["discord"].error.as_deref().unwrap().contains("500"));
}
