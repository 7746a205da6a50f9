mod common;

use std::sync::Arc;

use common::{init_tracing, CannedServer};
use interfaces::defs::{Classification, EventSummary, NotificationEvent, SourceKind};
use notification_aggregator::{
    DeliveryOutcome, DeliveryTarget, Dispatcher, PushChannel, TelegramChannel, TelegramConfig,
};

fn telegram(base_url: &str, token: Option<&str>) -> TelegramConfig {
    TelegramConfig {
        api_base: base_url.to_string(),
        bot_token: token.map(str::to_string),
        timeout_seconds: 5,
    }
}

fn upwork_event() -> NotificationEvent {
    NotificationEvent {
        source: SourceKind::Mailbox,
        item_id: "7".to_string(),
        classification: Classification::MarketplaceMail,
        summary: EventSummary::Mail {
            from: "jobs@upwork.com".to_string(),
            subject: "New offer".to_string(),
        },
    }
}

#[tokio::test]
async fn test_send_message_payload() -> anyhow::Result<()> {
    init_tracing();
    let server = CannedServer::fixed(200, r#"{"ok": true, "result": {}}"#).await;
    let channel = TelegramChannel::new(telegram(&server.base_url, Some("123:abc")))?;

    assert!(channel.is_enabled());
    channel.send(&DeliveryTarget::Chat(-1001), "hello").await?;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/bot123:abc/sendMessage");
    assert_eq!(
        requests[0].json(),
        serde_json::json!({"chat_id": -1001, "text": "hello"})
    );
    Ok(())
}

#[tokio::test]
async fn test_rejected_message_is_an_error() -> anyhow::Result<()> {
    init_tracing();
    let server = CannedServer::fixed(
        400,
        r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
    )
    .await;
    let channel = TelegramChannel::new(telegram(&server.base_url, Some("123:abc")))?;

    let err = channel
        .send(&DeliveryTarget::Named("@missing".to_string()), "hello")
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("chat not found"));
    assert!(!message.contains("123:abc"));
    Ok(())
}

#[tokio::test]
async fn test_missing_token_disables_channel() -> anyhow::Result<()> {
    init_tracing();
    let server = CannedServer::fixed(200, r#"{"ok": true}"#).await;
    let channel = Arc::new(TelegramChannel::new(telegram(&server.base_url, None))?);
    let dispatcher = Dispatcher::new(channel.clone());

    let deliveries = dispatcher
        .dispatch(&upwork_event(), &[DeliveryTarget::Chat(1), DeliveryTarget::Chat(2)])
        .await;

    assert!(!channel.is_enabled());
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries.iter().all(|d| d.outcome == DeliveryOutcome::Skipped));
    assert!(server.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failing_target_does_not_stop_the_next() -> anyhow::Result<()> {
    init_tracing();
    let server = CannedServer::start(|request, _| {
        if request.json()["chat_id"] == serde_json::json!(111) {
            (403, r#"{"ok": false, "description": "Forbidden: bot was blocked by the user"}"#.to_string())
        } else {
            (200, r#"{"ok": true}"#.to_string())
        }
    })
    .await;
    let channel = Arc::new(TelegramChannel::new(telegram(&server.base_url, Some("123:abc")))?);
    let dispatcher = Dispatcher::new(channel);

    let targets = [DeliveryTarget::Chat(111), DeliveryTarget::Chat(222)];
    let deliveries = dispatcher.dispatch(&upwork_event(), &targets).await;

    assert_eq!(deliveries.len(), 2);
    assert!(matches!(deliveries[0].outcome, DeliveryOutcome::Failed(_)));
    assert_eq!(deliveries[1].target, DeliveryTarget::Chat(222));
    assert_eq!(deliveries[1].outcome, DeliveryOutcome::Delivered);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].json()["text"],
        "💼 Yangi Upwork/email xabari:\nFrom: jobs@upwork.com\nSubject: New offer"
    );
    Ok(())
}
