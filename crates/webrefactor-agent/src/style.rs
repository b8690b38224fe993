//! Inline `style` attribute handling.
//!
//! Only the declarations written directly on an element are understood.
//! Stylesheets are not evaluated.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static PROPERTY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-{0,2}[a-zA-Z][a-zA-Z0-9-]*$").expect("property pattern is valid")
});

/// One `property: value [!important]` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Ordered declarations of a `style` attribute. Later writes replace
/// earlier ones in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<Declaration>,
}

impl InlineStyle {
    pub fn parse(text: &str) -> Self {
        let mut style = Self::default();
        for chunk in split_declarations(text) {
            let Some((property, value)) = chunk.split_once(':') else {
                continue;
            };
            let property = property.trim();
            if property.is_empty() {
                continue;
            }
            let (value, important) = strip_important(value.trim());
            if value.is_empty() {
                continue;
            }
            style.set(property, value, important);
        }
        style
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        let property = property.to_ascii_lowercase();
        self.declarations
            .iter()
            .find(|d| d.property == property)
            .map(|d| d.value.as_str())
    }

    pub fn set(&mut self, property: &str, value: &str, important: bool) {
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        match self.declarations.iter_mut().find(|d| d.property == property) {
            Some(existing) => {
                existing.value = value;
                existing.important = important;
            }
            None => self.declarations.push(Declaration {
                property,
                value,
                important,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {}", d.property, d.value)?;
            if d.important {
                f.write_str(" !important")?;
            }
            f.write_str(";")?;
        }
        Ok(())
    }
}

/// Whether a property name is safe to write into a style attribute.
pub fn is_valid_property(name: &str) -> bool {
    PROPERTY_NAME.is_match(name.trim())
}

/// Whether a value is safe to write into a style attribute. Values that
/// could close the declaration or the attribute are refused.
pub fn is_valid_value(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.contains([';', '{', '}', '<', '>'])
}

/// Pixel length of a value such as `120px` or `0`. Other units are ignored.
pub fn px(value: &str) -> Option<u32> {
    let value = value.trim().to_ascii_lowercase();
    let number = value.strip_suffix("px").unwrap_or(&value).trim();
    let parsed: f64 = number.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(parsed.max(0.0).round() as u32)
}

fn strip_important(value: &str) -> (&str, bool) {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(pos) if lower[pos..].trim_end() == "!important" => (value[..pos].trim_end(), true),
        _ => (value, false),
    }
}

/// Split on `;` outside quotes and parentheses, so `url(a;b)` survives.
fn split_declarations(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let style = InlineStyle::parse("color: red; DISPLAY: none !important;;");
        assert_eq!(style.get("display"), Some("none"));
        assert_eq!(style.get("color"), Some("red"));
        assert_eq!(style.to_string(), "color: red; display: none !important;");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut style = InlineStyle::parse("display: block; margin: 0");
        style.set("display", "none", true);
        assert_eq!(style.to_string(), "display: none !important; margin: 0;");
    }

    #[test]
    fn test_semicolon_inside_url() {
        let style = InlineStyle::parse("background: url('a;b.png'); width: 10px");
        assert_eq!(style.get("background"), Some("url('a;b.png')"));
        assert_eq!(style.get("width"), Some("10px"));
    }

    #[test]
    fn test_property_and_value_checks() {
        assert!(is_valid_property("max-width"));
        assert!(is_valid_property("--brand-color"));
        assert!(!is_valid_property("color;x"));
        assert!(!is_valid_property("1width"));
        assert!(is_valid_value("800px"));
        assert!(!is_valid_value("red; display: none"));
        assert!(!is_valid_value("</style>"));
    }

    #[test]
    fn test_px() {
        assert_eq!(px("120px"), Some(120));
        assert_eq!(px(" 0 "), Some(0));
        assert_eq!(px("12.6px"), Some(13));
        assert_eq!(px("50%"), None);
        assert_eq!(px("auto"), None);
    }
}
