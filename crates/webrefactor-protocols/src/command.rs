//! Mutation command vocabulary.
//!
//! The wire shape is a flat JSON object discriminated by `type`:
//!
//! ```json
//! {"type": "move", "selector": ".promo", "targetSelector": "footer", "position": "append"}
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A totally ordered sequence of commands produced by one LLM call.
pub type MutationBatch = Vec<MutationCommand>;

/// One page mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationCommand {
    /// What to do, plus the fields specific to that operation.
    #[serde(flatten)]
    pub action: CommandAction,

    /// CSS selector of the element(s) to mutate.
    pub selector: String,

    /// Free-text justification from the model. Ignored by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The closed set of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandAction {
    /// Inline `display: none !important`.
    Hide,
    /// Detach from the parent.
    Remove,
    /// Apply property/value pairs to the inline style.
    Style {
        #[serde(rename = "cssProperties")]
        css_properties: BTreeMap<String, String>,
    },
    /// Relocate relative to the first element matching `target_selector`.
    Move {
        #[serde(rename = "targetSelector")]
        target_selector: String,
        position: MovePosition,
    },
    /// Insert a container built from `wrapper_html` around each match.
    Wrap {
        #[serde(rename = "wrapperHtml")]
        wrapper_html: String,
    },
    /// Permute the direct children of the first match.
    ReorderChildren {
        #[serde(rename = "newOrder")]
        new_order: Vec<String>,
    },
}

impl CommandAction {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Remove => "remove",
            Self::Style { .. } => "style",
            Self::Move { .. } => "move",
            Self::Wrap { .. } => "wrap",
            Self::ReorderChildren { .. } => "reorderChildren",
        }
    }

    /// All wire names, in declaration order.
    pub const NAMES: [&'static str; 6] =
        ["hide", "remove", "style", "move", "wrap", "reorderChildren"];
}

/// Where a moved element lands relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePosition {
    Before,
    After,
    Prepend,
    Append,
}

impl MovePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Prepend => "prepend",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for MovePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            "prepend" => Ok(Self::Prepend),
            "append" => Ok(Self::Append),
            other => Err(format!("Invalid position: {other}")),
        }
    }
}

impl MutationCommand {
    pub fn new(action: CommandAction, selector: impl Into<String>) -> Self {
        Self {
            action,
            selector: selector.into(),
            reason: None,
        }
    }

    pub fn hide(selector: impl Into<String>) -> Self {
        Self::new(CommandAction::Hide, selector)
    }

    pub fn remove(selector: impl Into<String>) -> Self {
        Self::new(CommandAction::Remove, selector)
    }

    pub fn style<K, V>(selector: impl Into<String>, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let css_properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(CommandAction::Style { css_properties }, selector)
    }

    pub fn move_to(
        selector: impl Into<String>,
        target_selector: impl Into<String>,
        position: MovePosition,
    ) -> Self {
        Self::new(
            CommandAction::Move {
                target_selector: target_selector.into(),
                position,
            },
            selector,
        )
    }

    pub fn wrap(selector: impl Into<String>, wrapper_html: impl Into<String>) -> Self {
        Self::new(
            CommandAction::Wrap {
                wrapper_html: wrapper_html.into(),
            },
            selector,
        )
    }

    pub fn reorder_children(selector: impl Into<String>, new_order: Vec<String>) -> Self {
        Self::new(CommandAction::ReorderChildren { new_order }, selector)
    }

    /// Attach a justification.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Wire name of this command's operation.
    pub fn kind(&self) -> &'static str {
        self.action.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hide_wire_shape() {
        let cmd = MutationCommand::hide(".ad").with_reason("ads");
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value, json!({"type": "hide", "selector": ".ad", "reason": "ads"}));
    }

    #[test]
    fn test_move_from_wire() {
        let cmd: MutationCommand = serde_json::from_value(json!({
            "type": "move",
            "selector": ".promo",
            "targetSelector": "footer",
            "position": "append"
        }))
        .unwrap();
        assert_eq!(cmd, MutationCommand::move_to(".promo", "footer", MovePosition::Append));
    }

    #[test]
    fn test_style_from_wire() {
        let cmd: MutationCommand = serde_json::from_value(json!({
            "type": "style",
            "selector": "main",
            "cssProperties": {"max-width": "800px"}
        }))
        .unwrap();
        match cmd.action {
            CommandAction::Style { css_properties } => {
                assert_eq!(css_properties.get("max-width").map(String::as_str), Some("800px"));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_reorder_children_wire_name() {
        let cmd = MutationCommand::reorder_children("ul.menu", vec!["li.b".into()]);
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "reorderChildren");
        assert_eq!(value["newOrder"], json!(["li.b"]));
        assert_eq!(cmd.kind(), "reorderChildren");
    }

    #[test]
    fn test_unknown_type_rejected_by_serde() {
        let result: Result<MutationCommand, _> =
            serde_json::from_value(json!({"type": "explode", "selector": "div"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_move_position_from_str() {
        assert_eq!("prepend".parse::<MovePosition>().unwrap(), MovePosition::Prepend);
        assert!("inside".parse::<MovePosition>().is_err());
        assert_eq!(MovePosition::After.to_string(), "after");
    }
}
