//! End-to-end runs against an in-process tab with a real page agent.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{Harness, NEWS, NEWS_URL, ScriptedProvider, actions, hide, remove};
use serde_json::json;
use webrefactor_config::PipelineConfig;
use webrefactor_protocols::{
    DomainMemoryEntry, KeyValueStore, MemoryVersion, MutationCommand, ProviderError, RefactorError,
    RefactorErrorKind, Role, RollbackOutcome, StorageArea,
};
use webrefactor_runtime::ReplaySource;

#[tokio::test(start_paused = true)]
async fn test_happy_path_applies_batch_and_remembers_it() {
    let h = Harness::new(ScriptedProvider::new([actions(&[
        hide(".ad-banner-top"),
        hide(".sidebar-ad"),
        remove(".promotion-card"),
    ])]))
    .await;
    let tab = h.open_news();
    let original = h.html(tab);

    let outcome = h.controller.refactor(tab, "remove ads").await.unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(
        outcome.commands,
        vec![
            MutationCommand::hide(".ad-banner-top"),
            MutationCommand::hide(".sidebar-ad"),
            MutationCommand::remove(".promotion-card"),
        ]
    );
    assert_eq!(outcome.report.outcomes.len(), 3);
    assert!(outcome.report.outcomes.iter().all(|o| o.applied == 1));
    assert_eq!(outcome.report.failed().count(), 0);

    let html = h.html(tab);
    assert_ne!(html, original);
    assert!(!html.contains("promotion-card"));
    assert!(html.contains("City council approves new riverside park"));
    assert!(h.browser.agent_running(tab));

    let last = h.controller.tabs().last_batch(tab).unwrap();
    assert_eq!(last.prompt, "remove ads");
    assert_eq!(last.url, NEWS_URL);
    assert_eq!(last.commands.len(), 3);
    assert!(h.controller.tabs().snapshot(tab).is_some());

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].max_tokens, Some(2000));
    assert!(requests[0].messages[1].content.contains("remove ads"));
}

#[tokio::test(start_paused = true)]
async fn test_unsafe_batch_is_rejected_before_the_page() {
    let h = Harness::new(ScriptedProvider::new([actions(&[remove("body > *")])])).await;
    let tab = h.open_news();
    let original = h.html(tab);

    let err = h.controller.refactor(tab, "clean up").await.unwrap_err();

    assert!(matches!(err, RefactorError::NoValidCommands { rejected: 1 }));
    assert_eq!(h.html(tab), original);
    assert_eq!(h.provider.calls(), 1);
    assert!(h.controller.tabs().last_batch(tab).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_white_page_then_successful_retry() {
    let h = Harness::new(ScriptedProvider::new([
        actions(&[hide("div")]),
        actions(&[hide(".ad-banner-top")]),
    ]))
    .await;
    let tab = h.open_news();

    let outcome = h.controller.refactor(tab, "remove ads").await.unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.commands, vec![MutationCommand::hide(".ad-banner-top")]);
    assert_eq!(h.provider.calls(), 2);

    let html = h.html(tab);
    assert!(html.contains("City council approves new riverside park"));

    let retry = &h.provider.requests()[1];
    assert_eq!(retry.messages.len(), 3);
    let previous = &retry.messages[2];
    assert_eq!(previous.role, Role::Assistant);
    assert!(previous.content.contains("caused issues"));
    assert!(previous.content.contains(r#""selector":"div""#));
    assert_eq!(h.controller.tabs().last_batch(tab).unwrap().attempt, 2);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_budget_is_respected_and_page_restored() {
    let h = Harness::new(ScriptedProvider::new([
        actions(&[hide("div")]),
        actions(&[hide("div")]),
        actions(&[hide(".ad-banner-top")]),
    ]))
    .await;
    let tab = h.open_news();
    let original = h.html(tab);

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();

    match err {
        RefactorError::WhitePageDetected {
            attempts, rollback, ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(rollback, RollbackOutcome::RolledBack);
        }
        other => panic!("expected white page, got {other:?}"),
    }
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.html(tab), original);
    assert!(h.controller.tabs().last_batch(tab).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_larger_attempt_budget() {
    let provider = ScriptedProvider::new([
        actions(&[hide("div")]),
        actions(&[hide("div")]),
        actions(&[hide(".ad-banner-top")]),
    ]);
    let h = Harness::with_pipeline(
        provider,
        PipelineConfig {
            max_attempts: 3,
            ..PipelineConfig::default()
        },
    )
    .await;
    let tab = h.open_news();

    let outcome = h.controller.refactor(tab, "remove ads").await.unwrap();
    assert_eq!(outcome.attempts, 3);
    assert_eq!(h.provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_truncated_reply_is_repaired() {
    let reply = r#"Here you go:
```json
{"actions":[{"type":"hide","selector":".ad-banner-top"},{"type":"hi"#;
    let h = Harness::new(ScriptedProvider::new([reply])).await;
    let tab = h.open_news();

    let outcome = h.controller.refactor(tab, "remove ads").await.unwrap();
    assert_eq!(outcome.commands, vec![MutationCommand::hide(".ad-banner-top")]);
}

#[tokio::test(start_paused = true)]
async fn test_prose_reply_is_a_parse_failure() {
    let h = Harness::new(ScriptedProvider::new(["Sorry, I can't help with that page."])).await;
    let tab = h.open_news();
    let original = h.html(tab);

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();
    assert_eq!(err.kind(), RefactorErrorKind::LLMParseFailure);
    assert_eq!(h.html(tab), original);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_memory_is_upgraded_on_replay() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let mut legacy = DomainMemoryEntry::prompt_only("news.example.com", "remove ads", NEWS_URL);
    legacy.version = MemoryVersion::V1;
    legacy.timestamp = Utc::now() - chrono::Duration::days(10);
    h.controller.memory().save_domain_config(&legacy).await.unwrap();
    let tab = h.open_news();

    let applied = h.controller.apply_memory(tab, "News.Example.com").await.unwrap();

    assert_eq!(applied.source, ReplaySource::Prompt);
    assert_eq!(h.provider.calls(), 1);
    let stored = h
        .controller
        .memory()
        .load_domain_config("news.example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, MemoryVersion::V2);
    assert_eq!(stored.commands, vec![MutationCommand::hide(".ad-banner-top")]);
    assert!(stored.timestamp > legacy.timestamp);
    assert_eq!(stored.prompt, "remove ads");
}

#[tokio::test(start_paused = true)]
async fn test_stored_commands_replay_without_llm() {
    let h = Harness::new(ScriptedProvider::new(Vec::<String>::new())).await;
    let entry = DomainMemoryEntry::with_commands(
        "news.example.com",
        "remove ads",
        NEWS_URL,
        vec![MutationCommand::hide(".ad-banner-top"), MutationCommand::hide("body > *")],
    );
    h.controller.memory().save_domain_config(&entry).await.unwrap();
    let tab = h.open_news();

    let applied = h.controller.apply_memory(tab, "news.example.com").await.unwrap();

    assert_eq!(applied.source, ReplaySource::StoredCommands);
    assert_eq!(applied.outcome.commands, vec![MutationCommand::hide(".ad-banner-top")]);
    assert_eq!(h.provider.calls(), 0);
    assert!(h.controller.tabs().last_batch(tab).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_saved_batch_replays_identically_on_a_new_tab() {
    let batch = [hide(".ad-banner-top"), hide(".sidebar-ad"), remove(".promotion-card")];
    let h = Harness::new(ScriptedProvider::new([actions(&batch)])).await;
    let first = h.open_news();
    let refactored = h.controller.refactor(first, "remove ads").await.unwrap();
    h.controller
        .save_domain_memory_with_commands(first, None)
        .await
        .unwrap();
    let first_html = h.html(first);

    let second = h.open_news();
    let applied = h.controller.apply_memory(second, "News.Example.com").await.unwrap();

    assert_eq!(applied.hostname, "news.example.com");
    assert_eq!(applied.source, ReplaySource::StoredCommands);
    assert_eq!(applied.outcome.commands, refactored.commands);
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(h.html(second), first_html);
}

#[tokio::test(start_paused = true)]
async fn test_apply_without_memory() {
    let h = Harness::new(ScriptedProvider::new(Vec::<String>::new())).await;
    let tab = h.open_news();
    let err = h.controller.apply_memory(tab, "news.example.com").await.unwrap_err();
    assert!(matches!(err, RefactorError::NoDomainMemory(host) if host == "news.example.com"));
}

#[tokio::test(start_paused = true)]
async fn test_privileged_page_is_refused_without_io() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".x")])])).await;
    let tab = h.browser.open_tab("chrome://settings", "<html><body>settings</body></html>");

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();

    assert_eq!(err.kind(), RefactorErrorKind::UnsupportedPage);
    assert_eq!(h.provider.calls(), 0);
    assert!(!h.browser.agent_running(tab));
}

#[tokio::test(start_paused = true)]
async fn test_save_memory_within_window() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let tab = h.open_news();
    h.controller.refactor(tab, "remove ads").await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    let entry = h
        .controller
        .save_domain_memory_with_commands(tab, None)
        .await
        .unwrap();

    assert_eq!(entry.domain, "news.example.com");
    assert_eq!(entry.prompt, "remove ads");
    assert_eq!(entry.version, MemoryVersion::V2);
    assert_eq!(entry.commands, vec![MutationCommand::hide(".ad-banner-top")]);

    let history = h
        .controller
        .memory()
        .load_domain_memory_history("news.example.com")
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(
        h.store
            .get(StorageArea::Local, "domain_config_news.example.com")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test(start_paused = true)]
async fn test_save_memory_after_window_expires() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let tab = h.open_news();
    h.controller.refactor(tab, "remove ads").await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    let err = h
        .controller
        .save_domain_memory_with_commands(tab, Some("hide banners"))
        .await
        .unwrap_err();
    assert!(matches!(err, RefactorError::NoRecentRefactor(t) if t == tab));
}

#[tokio::test(start_paused = true)]
async fn test_save_memory_with_prompt_override() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let tab = h.open_news();
    h.controller.refactor(tab, "remove ads").await.unwrap();

    let entry = h
        .controller
        .save_domain_memory_with_commands(tab, Some("  hide the top banner  "))
        .await
        .unwrap();
    assert_eq!(entry.prompt, "hide the top banner");
}

#[tokio::test(start_paused = true)]
async fn test_auto_replay_on_load() {
    let h = Harness::new(ScriptedProvider::new(Vec::<String>::new())).await;
    h.controller.settings().set_auto_refactor(true).await.unwrap();
    let entry = DomainMemoryEntry::with_commands(
        "news.example.com",
        "remove ads",
        NEWS_URL,
        vec![MutationCommand::hide(".ad-banner-top")],
    );
    h.controller.memory().save_domain_config(&entry).await.unwrap();
    let tab = h.open_news();
    let original = h.html(tab);

    let handle = h.controller.on_tab_loaded(tab, NEWS_URL).await.expect("replay scheduled");
    let applied = handle.await.unwrap().unwrap();

    assert_eq!(applied.source, ReplaySource::StoredCommands);
    assert_ne!(h.html(tab), original);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_auto_replay_needs_setting_and_memory() {
    let h = Harness::new(ScriptedProvider::new(Vec::<String>::new())).await;
    let tab = h.open_news();
    let entry = DomainMemoryEntry::prompt_only("news.example.com", "remove ads", NEWS_URL);
    h.controller.memory().save_domain_config(&entry).await.unwrap();

    assert!(h.controller.on_tab_loaded(tab, NEWS_URL).await.is_none());

    h.controller.settings().set_auto_refactor(true).await.unwrap();
    assert!(h.controller.on_tab_loaded(tab, "https://other.example/").await.is_none());
    assert!(h.controller.on_tab_loaded(tab, "chrome://newtab").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_cancels_pending_replay() {
    let h = Harness::new(ScriptedProvider::new(Vec::<String>::new())).await;
    h.controller.settings().set_auto_refactor(true).await.unwrap();
    let entry = DomainMemoryEntry::with_commands(
        "news.example.com",
        "remove ads",
        NEWS_URL,
        vec![MutationCommand::hide(".ad-banner-top")],
    );
    h.controller.memory().save_domain_config(&entry).await.unwrap();
    let tab = h.open_news();

    let stale = h.controller.on_tab_loaded(tab, NEWS_URL).await.unwrap();
    h.browser.navigate(tab, NEWS_URL, NEWS).unwrap();
    let fresh = h.controller.on_tab_loaded(tab, NEWS_URL).await.unwrap();

    assert!(matches!(stale.await.unwrap(), Err(RefactorError::TabClosed(t)) if t == tab));
    assert!(fresh.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_tab_closed_mid_request_drops_result() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let tab = h.open_news();
    let controller = h.controller.clone();
    let browser = h.browser.clone();
    h.provider.set_hook(move || {
        controller.on_tab_closed(tab);
        let _ = browser.close_tab(tab);
    });

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();

    assert!(matches!(err, RefactorError::TabClosed(t) if t == tab));
    assert!(h.controller.tabs().last_batch(tab).is_none());
    assert!(h.controller.tabs().snapshot(tab).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reset_restores_original_markup() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let tab = h.open_news();
    let original = h.html(tab);
    h.controller.refactor(tab, "remove ads").await.unwrap();
    assert_ne!(h.html(tab), original);

    let used_fallback = h.controller.reset(tab).await.unwrap();

    assert!(!used_fallback);
    assert_eq!(h.html(tab), original);
    assert!(h.controller.tabs().snapshot(tab).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reset_without_snapshot() {
    let h = Harness::new(ScriptedProvider::new(Vec::<String>::new())).await;
    let tab = h.open_news();
    let err = h.controller.reset(tab).await.unwrap_err();
    assert!(matches!(err, RefactorError::NoOriginalState(t) if t == tab));
}

#[tokio::test(start_paused = true)]
async fn test_missing_credentials() {
    let h = Harness::unconfigured(ScriptedProvider::new([actions(&[hide(".x")])]));
    let tab = h.open_news();

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();

    match err {
        RefactorError::LLMConfigMissing { missing } => {
            assert_eq!(missing, vec!["API Key".to_string(), "API URL".to_string()]);
        }
        other => panic!("expected missing config, got {other:?}"),
    }
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_names_provider() {
    let h = Harness::new(ScriptedProvider::failing(ProviderError::AuthenticationFailed(
        "bad key".into(),
    )))
    .await;
    let tab = h.open_news();
    let original = h.html(tab);

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();

    match &err {
        RefactorError::LLMTransportFailure { provider, source } => {
            assert_eq!(provider, "scripted");
            assert!(matches!(source, ProviderError::AuthenticationFailed(_)));
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert!(err.user_message().contains("bad key"));
    assert_eq!(h.html(tab), original);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_injection() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".x")])])).await;
    h.browser.set_injection_blocked(true);
    let tab = h.open_news();

    let err = h.controller.refactor(tab, "remove ads").await.unwrap_err();

    assert_eq!(err.kind(), RefactorErrorKind::AgentUnavailable);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exchange_log_is_written() {
    let h = Harness::new(ScriptedProvider::new([actions(&[hide(".ad-banner-top")])])).await;
    let tab = h.open_news();
    h.controller.refactor(tab, "remove ads").await.unwrap();

    let log = h
        .store
        .get(StorageArea::Local, "llm_log_request")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["data"]["purpose"], json!("refactor"));
}

#[tokio::test]
async fn test_connection_check() {
    let h = Harness::new(ScriptedProvider::new(["OK"])).await;
    assert_eq!(h.controller.test_connection(None).await.unwrap(), "OK");
    assert_eq!(h.provider.requests()[0].messages[0].role, Role::User);
}
