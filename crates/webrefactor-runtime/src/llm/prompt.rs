//! Prompt construction.
//!
//! Two shapes: the initial prompt and the stricter retry prompt used
//! after a batch collapsed the page. Both ask for a single JSON object
//! with an `actions` array and nothing else.

use std::fmt::Write;

use webrefactor_protocols::page::PageSummary;
use webrefactor_protocols::{ChatMessage, MutationCommand, PageFingerprint, RetryContext};

/// Interactive elements listed in the initial prompt.
const PROMPT_INTERACTIVE: usize = 10;
/// Interactive elements listed as "keep" in the retry prompt.
const RETRY_INTERACTIVE: usize = 5;
/// Ad candidates offered as safe targets in the retry prompt.
const RETRY_ADS: usize = 3;
/// Upper bound on commands requested after a failure.
pub const RETRY_MAX_COMMANDS: usize = 3;

const TEXT_SAMPLE: usize = 50;

pub const SYSTEM_PROMPT: &str = r#"You rewrite web pages by emitting DOM mutation commands as JSON. Do exactly what the user asks and nothing more.

Principles:
- Read the page structure below before choosing selectors.
- Target specific elements with class names, ids or precise attribute selectors of at least 3 characters.
- Keep whatever the user asked to keep, together with its titles, descriptions and controls.
- Prefer "hide" over "remove" unless the user explicitly asked for removal.

Never use:
- "*", "body > *", "div > *" or any selector that could match most of the page
- ":not()" over a universal selector
- short attribute patterns such as [class*="ad"] or [id*="a"]
- bare tag lists such as "h1,h2,h3" or "p" or "div"

Commands:
- hide: {"type":"hide","selector":"..."}
- remove: {"type":"remove","selector":"..."}
- style: {"type":"style","selector":"...","cssProperties":{"property":"value"}}
- move: {"type":"move","selector":"...","targetSelector":"...","position":"before|after|prepend|append"}
- wrap: {"type":"wrap","selector":"...","wrapperHtml":"<div class=\"...\"></div>"}
- reorderChildren: {"type":"reorderChildren","selector":"<parent>","newOrder":["<child>","..."]}
Every command may carry an optional "reason".

Output exactly one JSON object and nothing else:
{"actions":[{"type":"hide","selector":".advertisement-banner","reason":"advertisement"}]}

No prose, no code fences, no comments."#;

pub const RETRY_SYSTEM_PROMPT: &str = r#"You rewrite web pages by emitting DOM mutation commands as JSON. Your previous batch blanked the page and was rolled back. This attempt must be conservative.

Rules for this attempt:
- At most 3 commands.
- Only selectors that name individual elements: full class names, ids, data attributes.
- No tag-only selectors such as "div", "section" or "header".
- No attribute substring selectors such as [class*="..."] or [id*="..."].
- No wildcards and no ":not()".
- Use "hide". Use "remove" only for an element that is certainly an advertisement.
- If nothing can be targeted safely, return {"actions":[]}.

Output exactly one JSON object and nothing else:
{"actions":[{"type":"hide","selector":".exact-banner-class","reason":"advertisement"}]}"#;

/// Message used by the connection test.
pub const CONNECTION_TEST_MESSAGE: &str =
    "Hello, please respond with \"Connection successful\" to test the API.";

/// Messages for one model call.
///
/// On retry the conversation ends with an assistant turn echoing the
/// commands that failed.
pub fn build_messages(
    summary: &PageSummary,
    user_prompt: &str,
    retry: Option<&RetryContext>,
) -> Vec<ChatMessage> {
    match retry {
        None => vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_message(summary, user_prompt)),
        ],
        Some(ctx) => vec![
            ChatMessage::system(RETRY_SYSTEM_PROMPT),
            ChatMessage::user(retry_user_message(summary, user_prompt, ctx)),
            ChatMessage::assistant(format!(
                "Previous attempt generated these commands that caused issues:\n{}",
                commands_json(&ctx.failed_commands)
            )),
        ],
    }
}

pub fn user_message(summary: &PageSummary, user_prompt: &str) -> String {
    let s = &summary.structure;
    let mut out = String::new();
    let _ = writeln!(out, "Refactor this page according to the user's request.\n");
    let _ = writeln!(out, "User request: {}\n", user_prompt.trim());
    let _ = writeln!(out, "Title: {}", or_unknown(&summary.title));
    let _ = writeln!(out, "URL: {}\n", or_unknown(&summary.url));
    let _ = writeln!(out, "Structure:");
    let _ = writeln!(out, "- {} headings, {} paragraphs, {} lists", s.headings, s.paragraphs, s.lists);
    let _ = writeln!(out, "- {} links", s.links);
    let _ = writeln!(out, "- {} images, {} videos", s.images, s.videos);
    let _ = writeln!(out, "- {} forms, {} inputs\n", s.forms, s.inputs);

    let _ = writeln!(out, "Advertisement candidates:");
    if summary.advertisements.is_empty() {
        let _ = writeln!(out, "none detected");
    }
    for (i, ad) in summary.advertisements.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} <{}> {} \"{}\"",
            i + 1,
            ad.selector,
            ad.tag_name,
            ad.reason,
            clip(&ad.text, TEXT_SAMPLE)
        );
    }

    let _ = writeln!(out, "\nInteractive elements:");
    if summary.interactive_elements.is_empty() {
        let _ = writeln!(out, "none detected");
    }
    for (i, el) in summary.interactive_elements.iter().take(PROMPT_INTERACTIVE).enumerate() {
        let _ = writeln!(
            out,
            "{}. {} <{}> purpose={} removable={} \"{}\"",
            i + 1,
            el.selector,
            el.tag_name,
            el.purpose,
            el.can_be_removed,
            clip(&el.text, TEXT_SAMPLE)
        );
    }
    let total = summary.interactive_total.max(summary.interactive_elements.len());
    if total > PROMPT_INTERACTIVE {
        let _ = writeln!(out, "... and {} more", total - PROMPT_INTERACTIVE);
    }

    if let Some(layout) = &summary.layout {
        let _ = writeln!(
            out,
            "\nLayout: header={} nav={} main={} sidebar={} footer={}{}",
            layout.has_header,
            layout.has_nav,
            layout.has_main,
            layout.has_sidebar,
            layout.has_footer,
            layout
                .main_selector
                .as_deref()
                .map(|sel| format!(" main content at {sel}"))
                .unwrap_or_default()
        );
    }

    if !summary.text_blocks.is_empty() {
        let _ = writeln!(out, "\nLeading text:");
        for block in &summary.text_blocks {
            let _ = writeln!(out, "- {}", clip(block, 120));
        }
    }

    let _ = write!(
        out,
        "\nUse selectors that target only what the request is about. \
         Return only the JSON object described in the system message."
    );
    out
}

pub fn retry_user_message(summary: &PageSummary, user_prompt: &str, ctx: &RetryContext) -> String {
    let s = &summary.structure;
    let mut out = String::new();
    let _ = writeln!(out, "RETRY: the previous attempt blanked the page and was rolled back.\n");
    let _ = writeln!(out, "User request: {}\n", user_prompt.trim());

    let _ = writeln!(out, "Failure:");
    let _ = writeln!(out, "- attempt: {}", ctx.attempt);
    let _ = writeln!(out, "- reason: {}", ctx.failure_reason);
    let _ = writeln!(out, "- commands: {}", commands_json(&ctx.failed_commands));
    let blocked = if ctx.blocked_selectors.is_empty() {
        "none".to_string()
    } else {
        ctx.blocked_selectors.join(", ")
    };
    let _ = writeln!(out, "- blocked selectors: {blocked}");
    let _ = writeln!(out, "- page before: {}", fingerprint_line(&ctx.before));
    let _ = writeln!(out, "- page after: {}\n", fingerprint_line(&ctx.after));

    let _ = writeln!(out, "Page: {} ({})", or_unknown(&summary.title), or_unknown(&summary.url));
    let _ = writeln!(
        out,
        "- {} headings, {} paragraphs, {} links, {} images\n",
        s.headings, s.paragraphs, s.links, s.images
    );

    let _ = writeln!(out, "Keep these:");
    if summary.interactive_elements.is_empty() {
        let _ = writeln!(out, "none detected");
    }
    for (i, el) in summary.interactive_elements.iter().take(RETRY_INTERACTIVE).enumerate() {
        let _ = writeln!(
            out,
            "{}. <{}> classes: {} \"{}\"",
            i + 1,
            el.tag_name,
            if el.classes.is_empty() { "none" } else { &el.classes },
            clip(&el.text, 30)
        );
    }

    let _ = writeln!(out, "\nSafe targets:");
    if summary.advertisements.is_empty() {
        let _ = writeln!(out, "none identified");
    }
    for (i, ad) in summary.advertisements.iter().take(RETRY_ADS).enumerate() {
        let _ = writeln!(out, "{}. {} - {}", i + 1, ad.selector, ad.reason);
    }

    let _ = write!(
        out,
        "\nReturn at most {RETRY_MAX_COMMANDS} commands, each naming one specific element. \
         If no safe target exists, return {{\"actions\":[]}}."
    );
    out
}

fn fingerprint_line(fp: &PageFingerprint) -> String {
    format!(
        "text={} visible={} significant={} containers={} height={}px body={}",
        fp.body_text_length,
        fp.visible_elements,
        fp.significant_elements,
        fp.content_container_count,
        fp.body_height,
        if fp.body_present { "present" } else { "missing" }
    )
}

fn commands_json(commands: &[MutationCommand]) -> String {
    serde_json::to_string(commands).unwrap_or_else(|_| "[]".to_string())
}

fn or_unknown(s: &str) -> &str {
    if s.trim().is_empty() { "unknown" } else { s }
}

fn clip(s: &str, max: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
