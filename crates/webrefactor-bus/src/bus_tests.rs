use std::sync::Arc;
use std::time::Duration;

use webrefactor_protocols::{AgentReply, AgentRequest, AgentResponse, BusError, PageChannel, TabId};

use super::*;

fn spawn_echo(bus: &MessageBus, tab: TabId) {
    let mut mailbox = bus.register(tab);
    tokio::spawn(async move {
        while let Some(envelope) = mailbox.recv().await {
            let response = match envelope.request {
                AgentRequest::Ping => AgentResponse::ok(AgentReply::Pong),
                _ => AgentResponse::fail("unsupported in test"),
            };
            envelope.reply(response);
        }
    });
}

#[tokio::test]
async fn test_ping_round_trip() {
    let bus = MessageBus::new();
    spawn_echo(&bus, TabId(1));

    let response = bus
        .request(TabId(1), AgentRequest::Ping, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(response.into_result().unwrap(), AgentReply::Pong);
}

#[tokio::test]
async fn test_agent_failure_is_ok_response() {
    let bus = MessageBus::new();
    spawn_echo(&bus, TabId(1));

    let response = bus
        .request(TabId(1), AgentRequest::GetDebugLogs, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(!response.success);
}

#[tokio::test]
async fn test_no_listener() {
    let bus = MessageBus::new();
    let err = bus
        .request(TabId(9), AgentRequest::Ping, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.is_no_listener());
}

#[tokio::test]
async fn test_dropped_mailbox_is_no_listener() {
    let bus = MessageBus::new();
    let mailbox = bus.register(TabId(2));
    drop(mailbox);

    assert!(!bus.has_listener(TabId(2)));
    let err = bus
        .request(TabId(2), AgentRequest::Ping, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::NoListener(TabId(2))));
}

#[tokio::test(start_paused = true)]
async fn test_silent_agent_times_out() {
    let bus = MessageBus::new();
    let mut mailbox = bus.register(TabId(3));
    // Hold envelopes without answering.
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Some(env) = mailbox.recv().await {
            held.push(env);
        }
        held.len()
    });

    let err = bus
        .request(TabId(3), AgentRequest::ExtractContent, Duration::from_millis(1000))
        .await
        .unwrap_err();
    match err {
        BusError::Timeout { action, millis, .. } => {
            assert_eq!(action, "extractContent");
            assert_eq!(millis, 1000);
        }
        other => panic!("unexpected {other:?}"),
    }
    bus.unregister(TabId(3));
    assert_eq!(holder.await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_mailbox_times_out() {
    let bus = Arc::new(MessageBus::new());
    let mailbox = bus.register(TabId(6));

    let mut queued = Vec::new();
    for _ in 0..MAILBOX_CAPACITY {
        let bus = bus.clone();
        queued.push(tokio::spawn(async move {
            bus.request(TabId(6), AgentRequest::Ping, Duration::from_secs(60)).await
        }));
    }
    while mailbox.rx.len() < MAILBOX_CAPACITY {
        tokio::task::yield_now().await;
    }

    let err = bus
        .request(TabId(6), AgentRequest::GetDebugLogs, Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::Timeout { action: "getDebugLogs", millis: 500, .. }));
    assert_eq!(mailbox.rx.len(), MAILBOX_CAPACITY);

    for handle in queued {
        assert!(matches!(handle.await.unwrap(), Err(BusError::Timeout { .. })));
    }
}

#[tokio::test]
async fn test_dropped_reply_is_closed() {
    let bus = Arc::new(MessageBus::new());
    let mut mailbox = bus.register(TabId(4));
    tokio::spawn(async move {
        if let Some(envelope) = mailbox.recv().await {
            drop(envelope);
        }
    });

    let err = bus
        .request(TabId(4), AgentRequest::Ping, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::Closed(TabId(4))));
}

#[tokio::test]
async fn test_correlation_ids_increase() {
    let bus = MessageBus::new();
    let mut mailbox = bus.register(TabId(5));
    let seen = tokio::spawn(async move {
        let mut ids = Vec::new();
        for _ in 0..2 {
            let env = mailbox.recv().await.unwrap();
            ids.push(env.correlation_id);
            env.reply(AgentResponse::ok(AgentReply::Pong));
        }
        ids
    });

    for _ in 0..2 {
        bus.request(TabId(5), AgentRequest::Ping, Duration::from_secs(1))
            .await
            .unwrap();
    }
    let ids = seen.await.unwrap();
    assert!(ids[1] > ids[0]);
}
