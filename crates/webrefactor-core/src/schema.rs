//! Mutation command schema.
//!
//! Validates loosely-typed actions coming out of the parser, and
//! re-validates typed commands coming back from storage.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use webrefactor_protocols::{CommandAction, MovePosition, MutationCommand};

use crate::error::SchemaViolation;

/// Validate one action object and build the typed command.
pub fn validate_action(action: &Value) -> Result<MutationCommand, SchemaViolation> {
    let obj = action.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let kind = match obj.get("type") {
        None | Some(Value::Null) => return Err(SchemaViolation::MissingType),
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(SchemaViolation::UnknownType(other.to_string())),
    };

    let selector = non_empty_str(obj, "selector").ok_or(SchemaViolation::MissingSelector)?;

    let action = match kind {
        "hide" => CommandAction::Hide,
        "remove" => CommandAction::Remove,
        "style" => CommandAction::Style {
            css_properties: style_properties(obj)?,
        },
        "move" => {
            let target_selector =
                non_empty_str(obj, "targetSelector").ok_or(SchemaViolation::MissingField {
                    command: "move",
                    field: "targetSelector",
                })?;
            let position = match obj.get("position") {
                None | Some(Value::Null) => {
                    return Err(SchemaViolation::MissingField {
                        command: "move",
                        field: "position",
                    });
                }
                Some(Value::String(p)) => p.trim().to_ascii_lowercase().parse::<MovePosition>().map_err(
                    |message| SchemaViolation::InvalidField {
                        command: "move",
                        field: "position",
                        message,
                    },
                )?,
                Some(other) => {
                    return Err(SchemaViolation::InvalidField {
                        command: "move",
                        field: "position",
                        message: format!("expected a string, got {other}"),
                    });
                }
            };
            CommandAction::Move {
                target_selector,
                position,
            }
        }
        "wrap" => {
            let wrapper_html =
                non_empty_str(obj, "wrapperHtml").ok_or(SchemaViolation::MissingField {
                    command: "wrap",
                    field: "wrapperHtml",
                })?;
            if !looks_like_markup(&wrapper_html) {
                return Err(SchemaViolation::InvalidField {
                    command: "wrap",
                    field: "wrapperHtml",
                    message: "fragment contains no element".to_string(),
                });
            }
            CommandAction::Wrap { wrapper_html }
        }
        "reorderChildren" => CommandAction::ReorderChildren {
            new_order: new_order(obj)?,
        },
        other => return Err(SchemaViolation::UnknownType(other.to_string())),
    };

    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(MutationCommand {
        action,
        selector,
        reason,
    })
}

/// Re-check a typed command, e.g. one replayed from domain memory.
pub fn validate_command(command: &MutationCommand) -> Result<(), SchemaViolation> {
    if command.selector.trim().is_empty() {
        return Err(SchemaViolation::MissingSelector);
    }
    match &command.action {
        CommandAction::Hide | CommandAction::Remove => Ok(()),
        CommandAction::Style { css_properties } if css_properties.is_empty() => {
            Err(SchemaViolation::MissingField {
                command: "style",
                field: "cssProperties",
            })
        }
        CommandAction::Style { .. } => Ok(()),
        CommandAction::Move {
            target_selector, ..
        } if target_selector.trim().is_empty() => Err(SchemaViolation::MissingField {
            command: "move",
            field: "targetSelector",
        }),
        CommandAction::Move { .. } => Ok(()),
        CommandAction::Wrap { wrapper_html } if !looks_like_markup(wrapper_html) => {
            Err(SchemaViolation::InvalidField {
                command: "wrap",
                field: "wrapperHtml",
                message: "fragment contains no element".to_string(),
            })
        }
        CommandAction::Wrap { .. } => Ok(()),
        CommandAction::ReorderChildren { new_order } if new_order.is_empty() => {
            Err(SchemaViolation::MissingField {
                command: "reorderChildren",
                field: "newOrder",
            })
        }
        CommandAction::ReorderChildren { .. } => Ok(()),
    }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn style_properties(obj: &Map<String, Value>) -> Result<BTreeMap<String, String>, SchemaViolation> {
    let props = match obj.get("cssProperties") {
        None | Some(Value::Null) => {
            return Err(SchemaViolation::MissingField {
                command: "style",
                field: "cssProperties",
            });
        }
        Some(Value::Object(props)) => props,
        Some(_) => {
            return Err(SchemaViolation::InvalidField {
                command: "style",
                field: "cssProperties",
                message: "expected a mapping of property to value".to_string(),
            });
        }
    };
    if props.is_empty() {
        return Err(SchemaViolation::MissingField {
            command: "style",
            field: "cssProperties",
        });
    }

    let mut out = BTreeMap::new();
    for (name, value) in props {
        match value {
            Value::String(v) => {
                out.insert(name.clone(), v.clone());
            }
            other => {
                return Err(SchemaViolation::InvalidField {
                    command: "style",
                    field: "cssProperties",
                    message: format!("value of '{name}' must be a string, got {other}"),
                });
            }
        }
    }
    Ok(out)
}

fn new_order(obj: &Map<String, Value>) -> Result<Vec<String>, SchemaViolation> {
    let items = match obj.get("newOrder") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => {
            return Err(SchemaViolation::MissingField {
                command: "reorderChildren",
                field: "newOrder",
            });
        }
        Some(_) => {
            return Err(SchemaViolation::InvalidField {
                command: "reorderChildren",
                field: "newOrder",
                message: "expected a list of child selectors".to_string(),
            });
        }
    };
    let order: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if order.is_empty() {
        return Err(SchemaViolation::MissingField {
            command: "reorderChildren",
            field: "newOrder",
        });
    }
    Ok(order)
}

/// Cheap pre-check; the executor does the real fragment parse.
fn looks_like_markup(fragment: &str) -> bool {
    let bytes = fragment.as_bytes();
    bytes
        .windows(2)
        .any(|w| w[0] == b'<' && w[1].is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hide_with_reason() {
        let cmd = validate_action(&json!({"type": "hide", "selector": " .ad ", "reason": "ads"}))
            .unwrap();
        assert_eq!(cmd, MutationCommand::hide(".ad").with_reason("ads"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = validate_action(&json!({"type": "explode", "selector": ".x"})).unwrap_err();
        assert_eq!(err, SchemaViolation::UnknownType("explode".into()));
    }

    #[test]
    fn test_missing_selector_rejected() {
        let err = validate_action(&json!({"type": "hide", "selector": "  "})).unwrap_err();
        assert_eq!(err, SchemaViolation::MissingSelector);
    }

    #[test]
    fn test_style_requires_string_values() {
        let err = validate_action(&json!({
            "type": "style", "selector": "main",
            "cssProperties": {"width": 800}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::InvalidField { field: "cssProperties", .. }));

        let ok = validate_action(&json!({
            "type": "style", "selector": "main",
            "cssProperties": {"max-width": "800px", "x-unknown": "1"}
        }))
        .unwrap();
        assert_eq!(ok.kind(), "style");
    }

    #[test]
    fn test_move_requires_target_and_position() {
        let err = validate_action(&json!({"type": "move", "selector": ".a", "position": "after"}))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::MissingField { field: "targetSelector", .. }));

        let err = validate_action(&json!({
            "type": "move", "selector": ".a", "targetSelector": "footer", "position": "inside"
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::InvalidField { field: "position", .. }));

        let ok = validate_action(&json!({
            "type": "move", "selector": ".a", "targetSelector": "footer", "position": "Append"
        }))
        .unwrap();
        assert_eq!(ok, MutationCommand::move_to(".a", "footer", MovePosition::Append));
    }

    #[test]
    fn test_wrap_requires_element_fragment() {
        let err = validate_action(&json!({
            "type": "wrap", "selector": "img", "wrapperHtml": "just text"
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::InvalidField { field: "wrapperHtml", .. }));
        assert!(
            validate_action(&json!({
                "type": "wrap", "selector": "img", "wrapperHtml": "<figure class=\"f\"></figure>"
            }))
            .is_ok()
        );
    }

    #[test]
    fn test_reorder_skips_non_strings() {
        let cmd = validate_action(&json!({
            "type": "reorderChildren", "selector": "ul", "newOrder": [".b", 3, "", ".a"]
        }))
        .unwrap();
        assert_eq!(
            cmd,
            MutationCommand::reorder_children("ul", vec![".b".into(), ".a".into()])
        );
    }

    #[test]
    fn test_validate_typed_command() {
        assert!(validate_command(&MutationCommand::hide(".x")).is_ok());
        assert!(validate_command(&MutationCommand::hide(" ")).is_err());
        let empty_style = MutationCommand::style("main", Vec::<(String, String)>::new());
        assert!(validate_command(&empty_style).is_err());
    }
}
