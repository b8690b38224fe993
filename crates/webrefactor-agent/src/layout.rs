//! Box estimation for a document without a rendering engine.
//!
//! Each element is classified from its tag, its `hidden` attribute and
//! its inline style. Text flows in lines of a fixed width and height;
//! replaced elements (images, form controls, embeds) have fixed boxes.

use scraper::node::Element;

use crate::style::{InlineStyle, px};

pub const VIEWPORT_WIDTH: u32 = 1280;
pub const LINE_HEIGHT: u32 = 20;
pub const CHAR_WIDTH: u32 = 8;
pub const CHARS_PER_LINE: usize = (VIEWPORT_WIDTH / CHAR_WIDTH) as usize;

/// Tags that never produce a box.
const NEVER_RENDERED: [&str; 9] = [
    "head", "script", "style", "meta", "link", "title", "template", "noscript", "base",
];

const INLINE: [&str; 24] = [
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "dfn", "em", "i", "kbd",
    "label", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "u",
];

/// How an element takes part in layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    /// No box; descendants are not rendered either.
    None,
    Block,
    Inline,
    /// Inline box with a fixed size.
    Replaced { width: u32, height: u32 },
}

/// The subset of computed style the sampler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputedStyle {
    pub display: Display,
    /// `Some(true)` for `visibility: hidden`, `Some(false)` for an explicit
    /// `visible`, `None` to inherit.
    pub visibility_hidden: Option<bool>,
    pub transparent: bool,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

impl ComputedStyle {
    pub fn of(element: &Element) -> Self {
        let tag = element.name();
        let style = element.attr("style").map(InlineStyle::parse).unwrap_or_default();

        let display = if NEVER_RENDERED.contains(&tag)
            || element.attr("hidden").is_some()
            || (tag == "input" && element.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")))
        {
            Display::None
        } else {
            match style.get("display").map(str::to_ascii_lowercase).as_deref() {
                Some("none") => Display::None,
                Some(d) if d.starts_with("inline") => replaced(element).unwrap_or(Display::Inline),
                Some(_) => Display::Block,
                None => replaced(element).unwrap_or(if INLINE.contains(&tag) {
                    Display::Inline
                } else {
                    Display::Block
                }),
            }
        };

        let visibility_hidden = match style.get("visibility").map(str::to_ascii_lowercase).as_deref() {
            Some("hidden") | Some("collapse") => Some(true),
            Some("visible") => Some(false),
            _ => None,
        };

        let transparent = style
            .get("opacity")
            .and_then(|o| o.trim().parse::<f64>().ok())
            .is_some_and(|o| o <= 0.0);

        Self {
            display,
            visibility_hidden,
            transparent,
            height: style.get("height").and_then(px),
            width: style.get("width").and_then(px),
        }
    }
}

/// Fixed box of a replaced element, sized from its attributes.
fn replaced(element: &Element) -> Option<Display> {
    let (width, height) = match element.name() {
        "img" => (100, 150),
        "input" | "button" | "select" => (150, 24),
        "textarea" => (300, 40),
        "iframe" | "video" | "canvas" | "svg" | "embed" | "object" => (300, 150),
        _ => return None,
    };
    let dim = |name: &str, default: u32| element.attr(name).and_then(px).unwrap_or(default);
    Some(Display::Replaced {
        width: dim("width", width),
        height: dim("height", height),
    })
}

/// Lines needed for a run of text.
pub fn line_count(chars: usize) -> u32 {
    chars.div_ceil(CHARS_PER_LINE) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn style_of(markup: &str, selector: &str) -> ComputedStyle {
        let html = Html::parse_document(markup);
        let sel = Selector::parse(selector).unwrap();
        let el = html.select(&sel).next().unwrap();
        ComputedStyle::of(el.value())
    }

    #[test]
    fn test_default_display() {
        assert_eq!(style_of("<div></div>", "div").display, Display::Block);
        assert_eq!(style_of("<span></span>", "span").display, Display::Inline);
        assert_eq!(style_of("<script></script>", "script").display, Display::None);
        assert_eq!(
            style_of(r#"<input type="HIDDEN">"#, "input").display,
            Display::None
        );
    }

    #[test]
    fn test_inline_style_overrides() {
        let s = style_of(r#"<div style="display:none !important"></div>"#, "div");
        assert_eq!(s.display, Display::None);
        let s = style_of(r#"<span style="display: block; height: 40px"></span>"#, "span");
        assert_eq!(s.display, Display::Block);
        assert_eq!(s.height, Some(40));
    }

    #[test]
    fn test_visibility_and_opacity() {
        let s = style_of(r#"<p style="visibility:hidden; opacity: 0">x</p>"#, "p");
        assert_eq!(s.visibility_hidden, Some(true));
        assert!(s.transparent);
        assert_eq!(style_of("<p hidden>x</p>", "p").display, Display::None);
    }

    #[test]
    fn test_replaced_sizes() {
        assert_eq!(
            style_of(r#"<img src="a.png" height="90">"#, "img").display,
            Display::Replaced { width: 100, height: 90 }
        );
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(0), 0);
        assert_eq!(line_count(1), 1);
        assert_eq!(line_count(CHARS_PER_LINE + 1), 2);
    }
}
