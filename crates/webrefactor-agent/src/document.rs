//! Mutable HTML document.
//!
//! Wraps a parsed [`scraper::Html`] and adds the tree surgery the executor
//! needs. Detached nodes stay in the arena but are unreachable from the
//! root, so selection and serialization walk from the root only.

use ego_tree::{NodeId, NodeRef};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use webrefactor_protocols::AgentError;

use crate::style::InlineStyle;

/// A page loaded into a tab.
#[derive(Debug)]
pub struct PageDocument {
    html: Html,
    url: String,
}

impl PageDocument {
    pub fn parse(markup: &str, url: impl Into<String>) -> Self {
        Self {
            html: Html::parse_document(markup),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Full document markup.
    pub fn serialize(&self) -> String {
        self.html.html()
    }

    /// Replace the whole document, keeping the URL.
    pub fn replace_markup(&mut self, markup: &str) {
        self.html = Html::parse_document(markup);
    }

    /// Navigate: new URL, new markup.
    pub fn load(&mut self, markup: &str, url: impl Into<String>) {
        self.html = Html::parse_document(markup);
        self.url = url.into();
    }

    pub fn title(&self) -> String {
        self.find_child(self.head().map(|h| h.id()), "title")
            .and_then(|id| self.element(id))
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    pub fn root_element(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn head(&self) -> Option<ElementRef<'_>> {
        self.find_child(Some(self.root_element().id()), "head")
            .and_then(|id| self.element(id))
    }

    pub fn body(&self) -> Option<ElementRef<'_>> {
        self.find_child(Some(self.root_element().id()), "body")
            .and_then(|id| self.element(id))
    }

    fn find_child(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        let parent = self.html.tree.get(parent?)?;
        parent
            .children()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == name)
            .map(|e| e.id())
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id)
    }

    /// Attached elements matching a selector, in document order.
    pub fn select_ids(&self, selector: &str) -> Result<Vec<NodeId>, AgentError> {
        let parsed = parse_selector(selector)?;
        Ok(self.root_element().select(&parsed).map(|e| e.id()).collect())
    }

    pub fn first_match(&self, selector: &str) -> Result<Option<NodeId>, AgentError> {
        let parsed = parse_selector(selector)?;
        Ok(self.root_element().select(&parsed).next().map(|e| e.id()))
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if ancestor == node {
            return true;
        }
        self.html
            .tree
            .get(node)
            .is_some_and(|n| n.ancestors().any(|a| a.id() == ancestor))
    }

    /// Whether the node is still reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        self.contains(root, id)
    }

    pub fn style(&self, id: NodeId) -> InlineStyle {
        self.element(id)
            .and_then(|e| e.value().attr("style"))
            .map(InlineStyle::parse)
            .unwrap_or_default()
    }

    pub fn set_style(&mut self, id: NodeId, style: &InlineStyle) {
        let rendered = style.to_string();
        if rendered.is_empty() {
            self.remove_attribute(id, "style");
        } else {
            self.set_attribute(id, "style", &rendered);
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        self.rewrite_attributes(id, |attrs| {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        });
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        self.rewrite_attributes(id, |attrs| attrs.retain(|(k, _)| k != name));
    }

    /// Element attributes cannot be edited in place, so the element is
    /// rebuilt with the edited list.
    fn rewrite_attributes(&mut self, id: NodeId, edit: impl FnOnce(&mut Vec<(String, String)>)) {
        let Some(mut node) = self.html.tree.get_mut(id) else {
            return;
        };
        let Node::Element(element) = node.value() else {
            return;
        };
        let name = element.name.clone();
        let mut attrs: Vec<(String, String)> = element
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        edit(&mut attrs);

        let attributes = attrs
            .into_iter()
            .map(|(k, v)| Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from(k)),
                value: StrTendril::from(v),
            })
            .collect();
        *node.value() = Node::Element(Element::new(name, attributes));
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            node.detach();
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(mut p) = self.html.tree.get_mut(parent) {
            p.append_id(child);
        }
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(mut p) = self.html.tree.get_mut(parent) {
            p.prepend_id(child);
        }
    }

    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        if let Some(mut s) = self.html.tree.get_mut(sibling) {
            s.insert_id_before(node);
        }
    }

    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        self.detach(node);
        if let Some(mut s) = self.html.tree.get_mut(sibling) {
            s.insert_id_after(node);
        }
    }

    /// Parse a markup fragment and copy its first top-level element into
    /// this document as a detached node.
    pub fn import_fragment(&mut self, markup: &str) -> Option<NodeId> {
        let fragment = Fragment::parse(markup)?;
        self.import(&fragment)
    }

    /// Copy a parsed fragment's element into this document as a detached
    /// node. The fragment can be imported any number of times.
    pub fn import(&mut self, fragment: &Fragment) -> Option<NodeId> {
        let source = fragment.html.tree.get(fragment.element)?;
        Some(self.copy_subtree(source))
    }

    fn copy_subtree(&mut self, source: NodeRef<'_, Node>) -> NodeId {
        let root = self.html.tree.orphan(source.value().clone()).id();
        let mut pending = vec![(source, root)];
        while let Some((from, to)) = pending.pop() {
            for child in from.children() {
                let copy = self.html.tree.orphan(child.value().clone()).id();
                if let Some(mut parent) = self.html.tree.get_mut(to) {
                    parent.append_id(copy);
                }
                pending.push((child, copy));
            }
        }
        root
    }

    /// Detach every attached element matching a selector.
    pub fn remove_matching(&mut self, selector: &str) -> Result<usize, AgentError> {
        let ids = self.select_ids(selector)?;
        for id in &ids {
            self.detach(*id);
        }
        Ok(ids.len())
    }
}

/// The first top-level element of a markup fragment, parsed once.
pub struct Fragment {
    html: Html,
    element: NodeId,
}

impl Fragment {
    /// `None` when the markup has no top-level element.
    pub fn parse(markup: &str) -> Option<Self> {
        let html = Html::parse_fragment(markup);
        let element = html
            .root_element()
            .children()
            .find(|n| n.value().is_element())?
            .id();
        Some(Self { html, element })
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, AgentError> {
    Selector::parse(selector).map_err(|e| AgentError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}
