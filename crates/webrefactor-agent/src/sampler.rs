//! Page state sampler.
//!
//! One pass over the attached tree computes a [`PageFingerprint`]. The
//! sampler only reads; callers make sure no mutation runs while it does.

use std::time::Instant;

use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use scraper::Node;
use scraper::node::Element;
use webrefactor_protocols::PageFingerprint;

use crate::document::PageDocument;
use crate::layout::{CHAR_WIDTH, ComputedStyle, Display, LINE_HEIGHT, VIEWPORT_WIDTH, line_count};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Tags that can count as significant content.
const CONTENT_TAGS: [&str; 15] = [
    "p", "div", "span", "article", "section", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li",
    "td", "th",
];

const MIN_SIGNIFICANT_CHARS: usize = 10;

/// Fingerprint the document as it is now.
pub fn sample(doc: &PageDocument) -> PageFingerprint {
    let mut walker = Walker::default();
    walker.walk(doc.html().tree.root());

    let body = walker.body.unwrap_or_default();
    PageFingerprint {
        body_present: doc.body().is_some(),
        body_height: body.height,
        body_width: body.width,
        body_text_length: body.text_length,
        visible_elements: walker.visible,
        significant_elements: walker.significant,
        heading_count: walker.headings,
        link_count: walker.links,
        image_count: walker.images,
        form_control_count: walker.form_controls,
        content_container_count: walker.containers,
        timestamp_ms: EPOCH.elapsed().as_millis() as u64,
    }
}

/// Length of a text run after whitespace collapsing, kept in a form that
/// can be concatenated without re-reading the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextRun {
    chars: usize,
    starts_ws: bool,
    ends_ws: bool,
    blank: bool,
}

impl TextRun {
    const EMPTY: Self = Self {
        chars: 0,
        starts_ws: false,
        ends_ws: false,
        blank: true,
    };

    /// A line break between blocks.
    const BREAK: Self = Self {
        chars: 1,
        starts_ws: true,
        ends_ws: true,
        blank: true,
    };

    fn of(text: &str) -> Self {
        let mut run = Self::EMPTY;
        let mut prev_ws = false;
        for (i, c) in text.chars().enumerate() {
            let ws = c.is_whitespace();
            if i == 0 {
                run.starts_ws = ws;
            }
            if !(ws && prev_ws) {
                run.chars += 1;
            }
            if !ws {
                run.blank = false;
            }
            prev_ws = ws;
        }
        run.ends_ws = prev_ws;
        run
    }

    fn then(self, next: Self) -> Self {
        if self.chars == 0 {
            return next;
        }
        if next.chars == 0 {
            return self;
        }
        let joined = usize::from(self.ends_ws && next.starts_ws);
        Self {
            chars: self.chars + next.chars - joined,
            starts_ws: self.starts_ws,
            ends_ws: next.ends_ws,
            blank: self.blank && next.blank,
        }
    }

    fn trimmed_len(&self) -> usize {
        if self.blank {
            return 0;
        }
        self.chars - usize::from(self.starts_ws) - usize::from(self.ends_ws)
    }
}

/// What a subtree contributes to its parent's layout.
enum Extent {
    Empty,
    Inline { text: TextRun, width: u32, height: u32 },
    Block { text: TextRun, height: u32 },
}

/// Children of one element being stacked into lines and blocks.
struct Flow {
    text: TextRun,
    height: u32,
    line_text: TextRun,
    line_height: u32,
    widest: u32,
    has_blocks: bool,
}

impl Flow {
    fn new() -> Self {
        Self {
            text: TextRun::EMPTY,
            height: 0,
            line_text: TextRun::EMPTY,
            line_height: 0,
            widest: 0,
            has_blocks: false,
        }
    }

    fn inline(&mut self, text: TextRun, width: u32, height: u32) {
        self.line_text = self.line_text.then(text);
        self.line_height = self.line_height.max(height);
        self.widest = self.widest.max(width);
    }

    fn block(&mut self, text: TextRun, height: u32) {
        self.flush();
        self.has_blocks = true;
        self.height += height;
        self.text = self.text.then(TextRun::BREAK).then(text).then(TextRun::BREAK);
    }

    fn add(&mut self, extent: Extent) {
        match extent {
            Extent::Empty => {}
            Extent::Inline { text, width, height } => self.inline(text, width, height),
            Extent::Block { text, height } => self.block(text, height),
        }
    }

    fn flush(&mut self) {
        let lines = line_count(self.line_text.trimmed_len()) * LINE_HEIGHT;
        self.height += lines.max(self.line_height);
        self.text = self.text.then(self.line_text);
        self.line_text = TextRun::EMPTY;
        self.line_height = 0;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BodyBox {
    height: u32,
    width: u32,
    text_length: usize,
}

/// An open node whose children are still being visited.
struct Frame<'a> {
    /// `None` for the document and fragment roots.
    element: Option<(&'a Element, ComputedStyle)>,
    hidden: bool,
    flow: Flow,
    next_child: Option<NodeRef<'a, Node>>,
}

enum Visit<'a> {
    Leaf(Extent),
    Open(Frame<'a>),
}

#[derive(Default)]
struct Walker {
    body: Option<BodyBox>,
    visible: usize,
    significant: usize,
    headings: usize,
    links: usize,
    images: usize,
    form_controls: usize,
    containers: usize,
}

impl Walker {
    /// Post-order walk with an explicit stack; page depth never touches
    /// the call stack.
    fn walk<'a>(&mut self, root: NodeRef<'a, Node>) {
        let mut stack = match self.enter(root, false) {
            Visit::Open(frame) => vec![frame],
            Visit::Leaf(_) => return,
        };

        while let Some(mut frame) = stack.pop() {
            match frame.next_child {
                Some(child) => {
                    frame.next_child = child.next_sibling();
                    match self.enter(child, frame.hidden) {
                        Visit::Leaf(extent) => {
                            frame.flow.add(extent);
                            stack.push(frame);
                        }
                        Visit::Open(inner) => {
                            stack.push(frame);
                            stack.push(inner);
                        }
                    }
                }
                None => {
                    let extent = self.close(frame);
                    if let Some(parent) = stack.last_mut() {
                        parent.flow.add(extent);
                    }
                }
            }
        }
    }

    fn enter<'a>(&mut self, node: NodeRef<'a, Node>, hidden_above: bool) -> Visit<'a> {
        match node.value() {
            Node::Document | Node::Fragment => Visit::Open(Frame {
                element: None,
                hidden: hidden_above,
                flow: Flow::new(),
                next_child: node.first_child(),
            }),
            // Text under visibility:hidden neither counts nor takes space.
            Node::Text(text) if !hidden_above => Visit::Leaf(Extent::Inline {
                text: TextRun::of(text),
                width: 0,
                height: 0,
            }),
            Node::Element(element) => {
                let style = ComputedStyle::of(element);
                if style.display == Display::None {
                    return Visit::Leaf(Extent::Empty);
                }
                self.count(element);
                Visit::Open(Frame {
                    element: Some((element, style)),
                    hidden: style.visibility_hidden.unwrap_or(hidden_above),
                    flow: Flow::new(),
                    next_child: node.first_child(),
                })
            }
            _ => Visit::Leaf(Extent::Empty),
        }
    }

    fn close(&mut self, frame: Frame<'_>) -> Extent {
        let Frame {
            element,
            hidden,
            mut flow,
            ..
        } = frame;
        let Some((element, style)) = element else {
            return Extent::Empty;
        };

        flow.flush();
        let text = flow.text;
        let text_length = text.trimmed_len();

        let (inline, width, height) = match style.display {
            Display::Replaced { width, height } => (
                true,
                style.width.unwrap_or(width),
                style.height.unwrap_or(height),
            ),
            Display::Inline if !flow.has_blocks => {
                let text_width = (text_length as u32).saturating_mul(CHAR_WIDTH);
                (
                    true,
                    style.width.unwrap_or(text_width.max(flow.widest).min(VIEWPORT_WIDTH)),
                    style.height.unwrap_or(flow.height),
                )
            }
            _ => (
                false,
                style.width.unwrap_or(VIEWPORT_WIDTH),
                style.height.unwrap_or(flow.height),
            ),
        };

        let visible = !hidden && !style.transparent && width > 0 && height > 0;
        if visible {
            self.visible += 1;
            if text_length >= MIN_SIGNIFICANT_CHARS && CONTENT_TAGS.contains(&element.name()) {
                self.significant += 1;
            }
        }

        if element.name() == "body" && self.body.is_none() {
            self.body = Some(BodyBox {
                height,
                width,
                text_length,
            });
        }

        if inline {
            Extent::Inline { text, width, height }
        } else {
            Extent::Block { text, height }
        }
    }

    fn count(&mut self, element: &Element) {
        let tag = element.name();
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.headings += 1,
            "a" if element.attr("href").is_some() => self.links += 1,
            "img" if element.attr("src").is_some() => self.images += 1,
            "form" | "input" | "button" | "select" | "textarea" => self.form_controls += 1,
            _ => {}
        }
        let container = matches!(tag, "main" | "article" | "section")
            || element.classes().any(|c| c == "content" || c == "main")
            || matches!(element.id(), Some("content") | Some("main"));
        if container {
            self.containers += 1;
        }
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
