use super::*;

#[test]
fn test_unsupported_page_message_names_url() {
    let err = RefactorError::UnsupportedPage {
        url: "chrome://settings".to_string(),
        scheme: "chrome".to_string(),
    };
    let msg = err.user_message();
    assert!(msg.starts_with("UnsupportedPage:"));
    assert!(msg.contains("chrome://settings"));
    assert!(msg.contains("http(s)"));
}

#[test]
fn test_config_missing_lists_fields() {
    let err = RefactorError::LLMConfigMissing {
        missing: vec!["API Key".to_string(), "API URL".to_string()],
    };
    assert!(err.to_string().contains("Missing fields: API Key, API URL"));
    assert_eq!(err.kind(), RefactorErrorKind::LLMConfigMissing);
}

#[test]
fn test_white_page_carries_rollback_outcome() {
    let rolled = RefactorError::WhitePageDetected {
        url: "https://news.example.com/".to_string(),
        attempts: 2,
        rollback: RollbackOutcome::RolledBack,
    };
    assert!(rolled.to_string().contains("rolled_back"));

    let failed = RefactorError::WhitePageDetected {
        url: "https://news.example.com/".to_string(),
        attempts: 2,
        rollback: RollbackOutcome::RollbackFailed,
    };
    assert!(failed.user_message().contains("Reload the page"));
}

#[test]
fn test_transport_failure_keeps_source() {
    let err = RefactorError::LLMTransportFailure {
        provider: "openai".to_string(),
        source: ProviderError::Network("refused".to_string()),
    };
    assert!(err.to_string().contains("refused"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_storage_failure_has_no_remediation() {
    let err = RefactorError::storage("domain_config_a.test", StorageError::Io("denied".into()));
    assert!(err.remediation().is_none());
    assert_eq!(err.user_message().matches("StorageFailure").count(), 1);
}

#[test]
fn test_kinds_are_distinct() {
    let errors = vec![
        RefactorError::NoOriginalState(TabId(1)),
        RefactorError::NoDomainMemory("a.test".into()),
        RefactorError::NoRecentRefactor(TabId(1)),
        RefactorError::TabClosed(TabId(1)),
        RefactorError::NoValidCommands { rejected: 1 },
        RefactorError::LLMParseFailure { reason: "x".into() },
    ];
    let kinds: std::collections::HashSet<_> = errors.iter().map(RefactorError::kind).collect();
    assert_eq!(kinds.len(), errors.len());
}
