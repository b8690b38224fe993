use super::*;
use webrefactor_protocols::MovePosition;

fn parse(text: &str) -> Result<ParsedBatch, ParseError> {
    ResponseParser::new().parse(text)
}

const AD_BATCH: &str = r#"{"actions":[{"type":"hide","selector":".ad-banner-top"},{"type":"hide","selector":".sidebar-ad"},{"type":"remove","selector":".promotion-card"}]}"#;

#[test]
fn test_bare_json() {
    let batch = parse(AD_BATCH).unwrap();
    assert_eq!(
        batch.commands,
        vec![
            MutationCommand::hide(".ad-banner-top"),
            MutationCommand::hide(".sidebar-ad"),
            MutationCommand::remove(".promotion-card"),
        ]
    );
    assert!(batch.rejections.is_empty());
}

#[test]
fn test_prose_and_fence_yield_same_commands() {
    let bare = parse(AD_BATCH).unwrap().commands;

    let prose = format!("Sure! Here is the plan:\n{AD_BATCH}\nLet me know if you need more.");
    assert_eq!(parse(&prose).unwrap().commands, bare);

    let fenced = format!("Here you go:\n```json\n{AD_BATCH}\n```\nDone.");
    assert_eq!(parse(&fenced).unwrap().commands, bare);
}

#[test]
fn test_unclosed_fence() {
    let text = format!("```json\n{AD_BATCH}");
    assert_eq!(parse(&text).unwrap().commands.len(), 3);
}

#[test]
fn test_truncated_reply_drops_fragment() {
    let text = r#"{"actions":[{"type":"hide","selector":".x"},{"type":"remov"#;
    let batch = parse(text).unwrap();
    assert_eq!(batch.commands, vec![MutationCommand::hide(".x")]);
    assert!(batch.rejections.is_empty());
}

#[test]
fn test_trailing_commas() {
    let text = r#"{"actions":[{"type":"hide","selector":".x"},],}"#;
    assert_eq!(parse(text).unwrap().commands, vec![MutationCommand::hide(".x")]);
}

#[test]
fn test_largest_balanced_object() {
    // The first "actions" mention sits in prose, outside any object.
    let text = r##"I will return "actions" below. {"note": {"a": 1}, "actions": [{"type": "hide", "selector": "#promo"}]}"##;
    assert_eq!(parse(text).unwrap().commands, vec![MutationCommand::hide("#promo")]);
}

#[test]
fn test_bare_command_array() {
    let text = r#"Commands: [{"type": "hide", "selector": ".banner"}, {"type": "remove", "selector": ".popup"}]"#;
    let batch = parse(text).unwrap();
    assert_eq!(
        batch.commands,
        vec![MutationCommand::hide(".banner"), MutationCommand::remove(".popup")]
    );
}

#[test]
fn test_selector_promotion() {
    let text = r#"{"actions":[{"type":"hide",".sidebar-ad":"ads"}]}"#;
    assert_eq!(parse(text).unwrap().commands, vec![MutationCommand::hide(".sidebar-ad")]);
}

#[test]
fn test_ambiguous_promotion_is_rejected() {
    let text = r##"{"actions":[{"type":"hide",".a":"x","#b":"y"}]}"##;
    let err = parse(text).unwrap_err();
    match err {
        ParseError::NoValidCommands { rejections } => {
            assert_eq!(rejections.len(), 1);
            assert!(!rejections[0].is_gate());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_gate_rejects_over_broad_selector() {
    let err = parse(r#"{"actions":[{"type":"remove","selector":"body > *"}]}"#).unwrap_err();
    assert_eq!(err.blocked_selectors(), vec!["body > *".to_string()]);
    assert!(matches!(err, ParseError::NoValidCommands { .. }));
}

#[test]
fn test_partial_rejection_keeps_rest() {
    let text = r#"{"actions":[
        {"type":"hide","selector":"*"},
        {"type":"explode","selector":".x"},
        {"type":"move","selector":".promo","targetSelector":"footer","position":"append"}
    ]}"#;
    let batch = parse(text).unwrap();
    assert_eq!(
        batch.commands,
        vec![MutationCommand::move_to(".promo", "footer", MovePosition::Append)]
    );
    assert_eq!(batch.rejections.len(), 2);
    assert_eq!(batch.blocked_selectors(), vec!["*".to_string()]);
}

#[test]
fn test_empty_actions() {
    let err = parse(r#"{"actions": []}"#).unwrap_err();
    assert_eq!(err, ParseError::NoValidCommands { rejections: vec![] });
}

#[test]
fn test_no_batch() {
    assert_eq!(parse("I cannot help with that.").unwrap_err(), ParseError::NoBatch);
    assert_eq!(parse(r#"{"result": "ok"}"#).unwrap_err(), ParseError::NoBatch);
}

#[test]
fn test_style_value_must_be_string() {
    let text = r#"{"actions":[{"type":"style","selector":"main","cssProperties":{"width":800}}]}"#;
    assert!(matches!(parse(text), Err(ParseError::NoValidCommands { .. })));
}
