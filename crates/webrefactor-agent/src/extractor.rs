//! Page summary extraction.
//!
//! Builds the structural view of a page that goes into the LLM prompt:
//! element counts, advertisement candidates, interactive elements with
//! selectors that address exactly one element, a layout hint and the
//! leading text blocks.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Node};
use tracing::debug;
use webrefactor_protocols::page::{AdCandidate, ContentStructure, InteractiveElement, LayoutHint};
use webrefactor_protocols::PageSummary;

use crate::document::{PageDocument, parse_selector};
use crate::layout::{ComputedStyle, Display};

const INTERACTIVE_SELECTORS: &str = "button, input, select, textarea, a[href], [onclick], \
    [onmousedown], [onmouseup], [tabindex], [role=\"button\"], [role=\"link\"], \
    [role=\"checkbox\"], [role=\"radio\"], [role=\"slider\"], [role=\"tab\"], \
    [role=\"menuitem\"], [role=\"textbox\"], form, [role=\"form\"]";

const AD_SELECTORS: [&str; 37] = [
    ".advertisement",
    ".ads",
    ".advert",
    ".sponsored",
    ".promotion",
    "#advertisement",
    "#ads",
    "#advert",
    "#sponsored",
    "#promotion",
    ".ad-container",
    ".ad-wrapper",
    ".ad-content",
    ".ad-banner",
    ".banner-ad",
    ".sidebar-ad",
    ".header-ad",
    ".footer-ad",
    ".commercial",
    ".marketing",
    ".promo-banner",
    "iframe[src*=\"googleads\"]",
    "iframe[src*=\"doubleclick\"]",
    "iframe[src*=\"googlesyndication\"]",
    "iframe[src*=\"amazon-adsystem\"]",
    "iframe[src*=\"facebook.com/tr\"]",
    "iframe[src*=\"google.com/ads\"]",
    ".google-ads",
    ".adsense",
    ".adsbygoogle",
    ".outbrain",
    ".taboola",
    ".revcontent",
    "[data-ad]",
    "[data-ads]",
    "[data-advertisement]",
    "[role=\"banner\"][class*=\"sponsor\"]",
];

/// Regions where ad copy is searched for by keyword.
const AD_KEYWORD_REGIONS: &str = "aside, .sidebar, .ad-space, .widget";

const AD_KEYWORDS: [&str; 8] = [
    "sponsored content",
    "advertisement",
    "promoted post",
    "ads by google",
    "google ads",
    "sponsored by",
    "promoted by",
    "affiliate link",
];

/// Regions an advertisement candidate must not live in.
const IMPORTANT_REGIONS: &str = "main, article, section, header, footer, nav, [role=\"main\"], \
    [role=\"article\"], [role=\"navigation\"], .content, .main-content, .article-content, \
    .post-content, .navigation, .menu, .navbar, .header, .footer";

const MAIN_CONTENT_SELECTORS: [&str; 13] = [
    "main", "[role=\"main\"]", ".main", "#main", "article", ".article", ".content", ".post",
    ".entry", ".text", ".body", "#content", "section",
];

const CRITICAL_INDICATORS: [&str; 4] = ["style", "css", "script", "js"];
const AD_INDICATORS: [&str; 9] = [
    "ad", "ads", "advertisement", "promo", "sponsor", "banner", "shop", "buy", "purchase",
];
const USEFUL_INDICATORS: [&str; 13] = [
    "menu", "nav", "search", "login", "submit", "comment", "share", "like", "follow",
    "subscribe", "contact", "home", "back",
];

const AD_TEXT_SAMPLE: usize = 100;
const INTERACTIVE_TEXT_SAMPLE: usize = 50;
const TEXT_BLOCK_MIN: usize = 20;
const TEXT_BLOCK_MAX: usize = 200;
const MAX_SELECTOR_DEPTH: usize = 10;

/// Summarize the page for the LLM.
pub fn extract_summary(doc: &PageDocument) -> PageSummary {
    let (interactive_elements, interactive_total) = interactive_elements(doc);
    let summary = PageSummary {
        title: doc.title(),
        url: doc.url().to_string(),
        structure: structure(doc),
        advertisements: advertisements(doc),
        interactive_elements,
        interactive_total,
        layout: Some(layout(doc)),
        text_blocks: text_blocks(doc),
    };
    debug!(
        url = %summary.url,
        ads = summary.advertisements.len(),
        interactive = summary.interactive_total,
        blocks = summary.text_blocks.len(),
        "Extracted page summary"
    );
    summary
}

fn count(doc: &PageDocument, selector: &str) -> usize {
    doc.select_ids(selector).map(|ids| ids.len()).unwrap_or(0)
}

fn elements<'a>(doc: &'a PageDocument, selector: &str) -> Vec<ElementRef<'a>> {
    doc.select_ids(selector)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| doc.element(id))
        .collect()
}

fn structure(doc: &PageDocument) -> ContentStructure {
    ContentStructure {
        headings: count(doc, "h1, h2, h3, h4, h5, h6"),
        paragraphs: count(doc, "p"),
        lists: count(doc, "ul, ol"),
        links: count(doc, "a[href]"),
        images: count(doc, "img"),
        videos: count(doc, "video"),
        forms: count(doc, "form"),
        inputs: count(doc, "input, textarea, select"),
    }
}

// ── Interactive elements ────────────────────────────────────────────────

fn interactive_elements(doc: &PageDocument) -> (Vec<InteractiveElement>, usize) {
    let found = elements(doc, INTERACTIVE_SELECTORS);
    let total = found.len();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for element in found {
        if out.len() >= PageSummary::MAX_INTERACTIVE {
            break;
        }
        let Some(selector) = unique_selector(doc, element) else {
            continue;
        };
        if !seen.insert(selector.clone()) {
            continue;
        }
        let el = element.value();
        let useful = is_useful(element);
        out.push(InteractiveElement {
            selector,
            tag_name: el.name().to_string(),
            input_type: el.attr("type").map(str::to_string),
            role: el.attr("role").map(str::to_string),
            classes: el.attr("class").unwrap_or_default().to_string(),
            text: sample_text(element, INTERACTIVE_TEXT_SAMPLE),
            purpose: guess_purpose(element).to_string(),
            can_be_removed: !useful,
        });
    }
    (out, total)
}

/// A selector that matches this element and nothing else: `#id`, then
/// `tag.classes`, then a `:nth-of-type` path from the body.
pub fn unique_selector(doc: &PageDocument, element: ElementRef<'_>) -> Option<String> {
    let el = element.value();
    let is_unique = |selector: &str| count(doc, selector) == 1;

    if let Some(id) = el.id().filter(|id| !id.is_empty()) {
        let selector = format!("#{}", escape_ident(id));
        if is_unique(&selector) {
            return Some(selector);
        }
    }

    let classes: String = el.classes().map(|c| format!(".{}", escape_ident(c))).collect();
    if !classes.is_empty() {
        let selector = format!("{}{}", el.name(), classes);
        if is_unique(&selector) {
            return Some(selector);
        }
    }

    let mut path = Vec::new();
    let mut current = Some(element);
    while let Some(node) = current {
        let name = node.value().name();
        if name == "body" || path.len() >= MAX_SELECTOR_DEPTH {
            break;
        }
        let same_tag: Vec<NodeId> = node
            .parent()
            .map(|p| {
                p.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|s| s.value().name() == name)
                    .map(|s| s.id())
                    .collect()
            })
            .unwrap_or_default();
        if same_tag.len() > 1 {
            let index = same_tag.iter().position(|id| *id == node.id()).unwrap_or(0) + 1;
            path.push(format!("{name}:nth-of-type({index})"));
        } else {
            path.push(name.to_string());
        }
        current = node.parent().and_then(ElementRef::wrap);
    }
    if current.is_some_and(|n| n.value().name() == "body") {
        path.push("body".to_string());
    }
    path.reverse();
    let selector = path.join(" > ");
    (!selector.is_empty() && is_unique(&selector)).then_some(selector)
}

/// Simple selector for display: `#id`, else `tag.c1.c2.c3`, else the tag.
pub fn simple_selector(element: ElementRef<'_>) -> String {
    let el = element.value();
    if let Some(id) = el.id().filter(|id| !id.is_empty()) {
        return format!("#{}", escape_ident(id));
    }
    let classes: String = el
        .classes()
        .take(3)
        .map(|c| format!(".{}", escape_ident(c)))
        .collect();
    format!("{}{}", el.name(), classes)
}

/// Escape a CSS identifier the way `CSS.escape` does for the common cases.
fn escape_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    for (i, c) in ident.chars().enumerate() {
        let leading_digit = c.is_ascii_digit() && (i == 0 || (i == 1 && ident.starts_with('-')));
        if leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

fn tokens(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn is_useful(element: ElementRef<'_>) -> bool {
    let el = element.value();
    let id = el.id().unwrap_or_default().to_lowercase();
    let class = el.attr("class").unwrap_or_default().to_lowercase();
    let text = element.text().collect::<String>().to_lowercase();

    if tokens(&id)
        .chain(tokens(&class))
        .any(|t| CRITICAL_INDICATORS.contains(&t.as_str()))
    {
        return true;
    }

    let has_ad_token = tokens(&id)
        .chain(tokens(&class))
        .chain(tokens(&text))
        .any(|t| AD_INDICATORS.contains(&t.as_str()));
    if has_ad_token {
        return false;
    }

    if USEFUL_INDICATORS
        .iter()
        .any(|i| text.contains(i) || class.contains(i) || id.contains(i))
    {
        return true;
    }

    within(element, "main, article, .content, .main")
}

/// The element or one of its ancestors matches `selector`.
fn within(element: ElementRef<'_>, selector: &str) -> bool {
    let Ok(sel) = parse_selector(selector) else {
        return false;
    };
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|e| sel.matches(&e))
}

fn guess_purpose(element: ElementRef<'_>) -> &'static str {
    let text = element.text().collect::<String>().to_lowercase();
    let class = element.value().attr("class").unwrap_or_default();
    if text.contains("login") || text.contains("sign in") {
        "login"
    } else if text.contains("search") || element.value().attr("type") == Some("search") {
        "search"
    } else if text.contains("menu") || text.contains("navigation") {
        "navigation"
    } else if text.contains("share") {
        "social"
    } else if text.contains("comment") {
        "engagement"
    } else if tokens(class).any(|t| t == "ad" || t == "ads") || text.contains("advertisement") {
        "advertisement"
    } else if text.contains("buy") || text.contains("purchase") {
        "commerce"
    } else {
        "unknown"
    }
}

fn sample_text(element: ElementRef<'_>, max: usize) -> String {
    let el = element.value();
    let text = collapse(&element.text().collect::<String>());
    let text = if text.is_empty() {
        ["aria-label", "placeholder", "value", "title", "alt"]
            .iter()
            .find_map(|a| el.attr(a).map(collapse).filter(|s| !s.is_empty()))
            .unwrap_or_default()
    } else {
        text
    };
    text.chars().take(max).collect()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Advertisements ──────────────────────────────────────────────────────

fn advertisements(doc: &PageDocument) -> Vec<AdCandidate> {
    let mut processed: HashSet<NodeId> = HashSet::new();
    let mut ads = Vec::new();

    let is_important = |element: ElementRef<'_>| {
        let in_region = within(element, IMPORTANT_REGIONS);
        let text_len = element.text().collect::<String>().trim().chars().count();
        let controls = element
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| matches!(e.value().name(), "input" | "textarea" | "select" | "button"))
            .count();
        in_region || text_len > 500 || controls > 2
    };

    for selector in AD_SELECTORS {
        for element in elements(doc, selector) {
            if !processed.insert(element.id()) || is_important(element) {
                continue;
            }
            ads.push(AdCandidate {
                selector: simple_selector(element),
                text: ad_text(element),
                tag_name: element.value().name().to_string(),
                reason: format!("Matched ad selector: {selector}"),
            });
        }
    }

    for element in elements(doc, AD_KEYWORD_REGIONS) {
        if processed.contains(&element.id()) || is_important(element) || !is_rendered(element) {
            continue;
        }
        let text = element.text().collect::<String>().to_lowercase();
        if AD_KEYWORDS.iter().any(|k| text.contains(k)) {
            processed.insert(element.id());
            ads.push(AdCandidate {
                selector: simple_selector(element),
                text: ad_text(element),
                tag_name: element.value().name().to_string(),
                reason: "Contains specific ad keywords".to_string(),
            });
        }
    }

    ads.truncate(PageSummary::MAX_ADS);
    ads
}

fn ad_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .trim()
        .chars()
        .take(AD_TEXT_SAMPLE)
        .collect()
}

/// Neither the element nor an ancestor has display none.
fn is_rendered(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|e| ComputedStyle::of(e.value()).display != Display::None)
}

// ── Layout and text ─────────────────────────────────────────────────────

fn layout(doc: &PageDocument) -> LayoutHint {
    let present = |selector: &str| count(doc, selector) > 0;
    let main_selector = MAIN_CONTENT_SELECTORS.iter().find_map(|selector| {
        let element = elements(doc, selector).into_iter().next()?;
        let text_len = element.text().collect::<String>().trim().chars().count();
        let has_structure = element
            .descendants()
            .filter_map(ElementRef::wrap)
            .any(|e| matches!(e.value().name(), "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"));
        (text_len > 100 && has_structure).then(|| selector.to_string())
    });
    LayoutHint {
        has_header: present("header, .header, [role=\"banner\"]"),
        has_nav: present("nav, [role=\"navigation\"]"),
        has_main: present("main, [role=\"main\"]"),
        has_sidebar: present("aside, .sidebar, .side"),
        has_footer: present("footer, .footer, [role=\"contentinfo\"]"),
        main_selector,
    }
}

fn text_blocks(doc: &PageDocument) -> Vec<String> {
    const SKIPPED: [&str; 6] = ["script", "style", "noscript", "meta", "link", "title"];
    let Some(body) = doc.body() else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| SKIPPED.contains(&a.value().name()));
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if trimmed.chars().count() > TEXT_BLOCK_MIN {
            blocks.push(trimmed.chars().take(TEXT_BLOCK_MAX).collect());
            if blocks.len() >= PageSummary::MAX_TEXT_BLOCKS {
                break;
            }
        }
    }
    blocks
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
