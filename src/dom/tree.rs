use crate::dom::element::{ElementNode, TEXT_TAG};
use crate::error::{LocatorError, Result};
use headless_chrome::Tab;
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Handle to an element inside a [`DomTree`].
///
/// Ids are assigned in document (pre-)order, so comparing two ids compares
/// their document position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Reported by live documents for elements created after the snapshot
    pub const UNTRACKED: NodeId = NodeId(usize::MAX);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Text(String),
    Child(NodeId),
}

/// Flattened element with parent links and precomputed text
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Lowercase tag name
    pub tag_name: String,

    /// Attributes in source order
    pub attributes: IndexMap<String, String>,

    /// Whitespace-normalized `textContent`
    pub text: String,

    /// Raw concatenated `textContent`
    pub raw_text: String,

    pub parent: Option<NodeId>,

    /// Element children in document order
    pub children: Vec<NodeId>,

    /// Exclusive end of this node's subtree in id order
    pub(crate) subtree_end: usize,

    pub(crate) pieces: Vec<Piece>,
}

impl NodeData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.classes().any(|c| c == class_name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }
}

/// One record of a flat snapshot.
///
/// Records are listed in document preorder and point at their parent by
/// index, so arbitrarily deep pages serialize without nesting. Text runs are
/// records tagged `#text` that carry only `text_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub tag_name: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Index of the parent record, `None` for the root
    #[serde(default)]
    pub parent: Option<usize>,
}

impl SnapshotNode {
    fn text(content: &str, parent: usize) -> Self {
        Self {
            tag_name: TEXT_TAG.to_string(),
            attributes: IndexMap::new(),
            text_content: Some(content.to_string()),
            parent: Some(parent),
        }
    }
}

/// Represents the DOM tree of a web page or pasted fragment
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<NodeData>,
}

/// XML whitespace: space, tab, carriage return and line feed
pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Collapse runs of XML whitespace and trim, like XPath `normalize-space`.
///
/// Other Unicode spaces such as U+00A0 are ordinary characters here.
pub fn normalize_whitespace(text: &str) -> String {
    text.split(is_xml_whitespace).filter(|word| !word.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Appends elements in preorder; ids are handed out as elements open
#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    /// Close open elements until `parent` is the innermost; false when it is not open at all
    fn enter(&mut self, parent: NodeId) -> bool {
        while let Some(top) = self.open.last().copied() {
            if top == parent {
                return true;
            }
            self.close();
        }
        false
    }

    fn close(&mut self) {
        if let Some(top) = self.open.pop() {
            self.nodes[top.0].subtree_end = self.nodes.len();
        }
    }

    fn element(
        &mut self,
        parent: Option<NodeId>,
        tag_name: &str,
        attributes: IndexMap<String, String>,
        leading_text: Option<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(parent) = parent {
            let data = &mut self.nodes[parent.0];
            data.children.push(id);
            data.pieces.push(Piece::Child(id));
        }
        self.nodes.push(NodeData {
            tag_name: tag_name.to_ascii_lowercase(),
            attributes,
            text: String::new(),
            raw_text: String::new(),
            parent,
            children: Vec::new(),
            subtree_end: id.0 + 1,
            pieces: leading_text.map(Piece::Text).into_iter().collect(),
        });
        self.open.push(id);
        id
    }

    fn text(&mut self, parent: NodeId, text: String) {
        self.nodes[parent.0].pieces.push(Piece::Text(text));
    }

    fn finish(mut self) -> DomTree {
        while !self.open.is_empty() {
            self.close();
        }

        // Ids are preorder, so every child has a larger id than its parent.
        let mut nodes = self.nodes;
        for index in (0..nodes.len()).rev() {
            let mut raw = String::new();
            for piece in &nodes[index].pieces {
                match piece {
                    Piece::Text(text) => raw.push_str(text),
                    Piece::Child(child) => raw.push_str(&nodes[child.0].raw_text),
                }
            }
            nodes[index].text = normalize_whitespace(&raw);
            nodes[index].raw_text = raw;
        }

        DomTree { nodes }
    }
}

/// Scraper nodes still to visit while parsing HTML
enum Pending<'a> {
    Element(ElementRef<'a>, Option<NodeId>),
    Text(String, NodeId),
}

fn is_skipped(tag: &str) -> bool {
    matches!(tag.to_ascii_lowercase().as_str(), "script" | "style" | "noscript")
}

impl DomTree {
    /// Create a DomTree from an element hierarchy
    pub fn new(root: ElementNode) -> Self {
        let mut builder = TreeBuilder::default();
        let mut stack: Vec<(&ElementNode, Option<NodeId>)> = vec![(&root, None)];

        while let Some((element, parent)) = stack.pop() {
            if let Some(parent) = parent {
                builder.enter(parent);
                if element.is_text() {
                    if let Some(text) = &element.text_content {
                        builder.text(parent, text.clone());
                    }
                    continue;
                }
            }
            let id = builder.element(
                parent,
                &element.tag_name,
                element.attributes.clone(),
                element.text_content.clone(),
            );
            stack.extend(element.children.iter().rev().map(|child| (child, Some(id))));
        }

        builder.finish()
    }

    /// Build a tree from flat preorder records.
    ///
    /// Fails when the list is empty, when the first record is not an element
    /// root, or when a record's parent is not an enclosing element.
    pub fn from_records(records: Vec<SnapshotNode>) -> Result<Self> {
        if records.is_empty() {
            return Err(LocatorError::DomParseFailed("Empty snapshot".to_string()));
        }

        let mut builder = TreeBuilder::default();
        let mut ids: Vec<Option<NodeId>> = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let parent = match (index, record.parent) {
                (0, None) => None,
                (0, Some(_)) => {
                    return Err(LocatorError::DomParseFailed("Snapshot root has a parent".to_string()));
                }
                (_, None) => {
                    return Err(LocatorError::DomParseFailed(format!("Snapshot record {} has no parent", index)));
                }
                (_, Some(p)) => {
                    let parent = ids.get(p).copied().flatten().filter(|parent| builder.enter(*parent));
                    match parent {
                        Some(parent) => Some(parent),
                        None => {
                            return Err(LocatorError::DomParseFailed(format!(
                                "Snapshot record {} points at {}, which is not an enclosing element",
                                index, p
                            )));
                        }
                    }
                }
            };

            match parent {
                Some(parent) if record.tag_name == TEXT_TAG => {
                    if let Some(text) = record.text_content {
                        builder.text(parent, text);
                    }
                    ids.push(None);
                }
                _ => {
                    let id = builder.element(parent, &record.tag_name, record.attributes, record.text_content);
                    ids.push(Some(id));
                }
            }
        }

        Ok(builder.finish())
    }

    /// Parse a flat snapshot serialized as a JSON array of records
    pub fn from_snapshot_json(json: &str) -> Result<Self> {
        let records: Vec<SnapshotNode> = serde_json::from_str(json)
            .map_err(|e| LocatorError::DomParseFailed(format!("Failed to parse DOM JSON: {}", e)))?;
        Self::from_records(records)
    }

    /// Parse an HTML document or fragment, dropping script, style and noscript elements.
    ///
    /// Fragments are wrapped in a synthetic `html` root element.
    pub fn parse_html(html: &str) -> Result<Self> {
        let document = if html.trim_start().to_ascii_lowercase().starts_with("<!doctype")
            || html.to_ascii_lowercase().contains("<html")
        {
            Html::parse_document(html)
        } else {
            Html::parse_fragment(html)
        };

        let mut builder = TreeBuilder::default();
        let mut stack = vec![Pending::Element(document.root_element(), None)];

        while let Some(pending) = stack.pop() {
            let (element, parent) = match pending {
                Pending::Text(text, parent) => {
                    builder.enter(parent);
                    builder.text(parent, text);
                    continue;
                }
                Pending::Element(element, parent) => (element, parent),
            };
            if let Some(parent) = parent {
                builder.enter(parent);
            }

            let value = element.value();
            let attributes = value.attrs().map(|(name, val)| (name.to_string(), val.to_string())).collect();
            let id = builder.element(parent, value.name(), attributes, None);

            let children: Vec<_> = element.children().collect();
            for child in children.into_iter().rev() {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !is_skipped(child_el.value().name()) {
                        stack.push(Pending::Element(child_el, Some(id)));
                    }
                } else if let Node::Text(text) = child.value() {
                    stack.push(Pending::Text(String::from(&**text), id));
                }
            }
        }

        let tree = builder.finish();
        log::debug!("Parsed HTML into {} elements", tree.len());
        Ok(tree)
    }

    /// Build DOM tree from a browser tab.
    ///
    /// Each captured element is also registered in the page (`window.__locatorNodes`)
    /// under its [`NodeId`], so page-side query results can be mapped back.
    pub fn from_tab(tab: &Arc<Tab>) -> Result<Self> {
        let js_code = include_str!("snapshot.js");

        let result = tab
            .evaluate(js_code, false)
            .map_err(|e| LocatorError::DomParseFailed(format!("Failed to execute DOM snapshot script: {}", e)))?;

        let json_value = result
            .value
            .ok_or_else(|| LocatorError::DomParseFailed("No value returned from DOM snapshot".to_string()))?;

        // The script returns a JSON string
        let json_str: String = serde_json::from_value(json_value)
            .map_err(|e| LocatorError::DomParseFailed(format!("Failed to get JSON string: {}", e)))?;

        let tree = Self::from_snapshot_json(&json_str)?;
        log::debug!("Captured {} elements from tab", tree.len());
        Ok(tree)
    }

    /// Flat preorder records of the tree, text runs included
    pub fn to_records(&self) -> Vec<SnapshotNode> {
        let mut records = Vec::with_capacity(self.nodes.len());
        let root = Piece::Child(self.root_id());
        let mut stack: Vec<(&Piece, Option<usize>)> = vec![(&root, None)];

        while let Some((piece, parent)) = stack.pop() {
            match (piece, parent) {
                (Piece::Text(text), Some(parent)) => records.push(SnapshotNode::text(text, parent)),
                (Piece::Text(_), None) => {}
                (Piece::Child(id), _) => {
                    let index = records.len();
                    let node = self.node(*id);
                    records.push(SnapshotNode {
                        tag_name: node.tag_name.clone(),
                        attributes: node.attributes.clone(),
                        text_content: None,
                        parent,
                    });
                    stack.extend(node.pieces.iter().rev().map(|piece| (piece, Some(index))));
                }
            }
        }
        records
    }

    /// Convert the DOM tree to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_records())
            .map_err(|e| LocatorError::DomParseFailed(format!("Failed to serialize DOM to JSON: {}", e)))
    }

    /// Count total elements in the tree
    pub fn count_elements(&self) -> usize {
        self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    /// Look up a node; `None` for ids from another tree
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    /// Look up a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.node(id).tag_name
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id).attr(name)
    }

    /// Non-empty attribute value
    pub fn attr_nonempty(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attr(id, name).filter(|v| !v.is_empty())
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.node(id).text
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// Strict descendants in document order
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        (id.0 + 1..self.nodes[id.0].subtree_end).map(NodeId)
    }

    /// Whether `node` lies strictly inside `ancestor`'s subtree
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        node.0 > ancestor.0 && node.0 < self.nodes[ancestor.0].subtree_end
    }

    /// Nearest inclusive ancestor matching a predicate, like `Element.closest`
    pub fn closest(&self, id: NodeId, mut predicate: impl FnMut(&NodeData) -> bool) -> Option<NodeId> {
        std::iter::once(id).chain(self.ancestors(id)).find(|n| predicate(self.node(*n)))
    }

    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.parent(id) {
            Some(parent) => self.children(parent),
            None => &ROOT_SIBLINGS,
        }
    }

    /// 1-based position among all element siblings
    pub fn child_index(&self, id: NodeId) -> usize {
        self.siblings(id).iter().position(|s| *s == id).map_or(1, |p| p + 1)
    }

    /// 1-based position among siblings with the same tag
    pub fn index_of_type(&self, id: NodeId) -> usize {
        let tag = self.tag(id);
        self.siblings(id).iter().take_while(|s| **s != id).filter(|s| self.tag(**s) == tag).count() + 1
    }

    /// First element whose `id` attribute equals `value`
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.ids().find(|n| self.attr(*n, "id") == Some(value))
    }

    /// Render the element as HTML, truncated to `limit` characters
    pub fn outer_html(&self, id: NodeId, limit: usize) -> String {
        let mut out = String::new();
        let mut stack = vec![Markup::Open(id)];

        while let Some(markup) = stack.pop() {
            if out.len() > limit * 4 {
                break;
            }
            match markup {
                Markup::Open(id) => {
                    let node = self.node(id);
                    out.push('<');
                    out.push_str(&node.tag_name);
                    for (name, value) in &node.attributes {
                        out.push_str(&format!(" {}=\"{}\"", name, value.replace('&', "&amp;").replace('"', "&quot;")));
                    }
                    out.push('>');
                    if is_void(&node.tag_name) {
                        continue;
                    }
                    stack.push(Markup::Close(&node.tag_name));
                    stack.extend(node.pieces.iter().rev().map(|piece| match piece {
                        Piece::Text(text) => Markup::Text(text),
                        Piece::Child(child) => Markup::Open(*child),
                    }));
                }
                Markup::Text(text) => out.push_str(&text.replace('&', "&amp;").replace('<', "&lt;")),
                Markup::Close(tag) => out.push_str(&format!("</{}>", tag)),
            }
        }

        if out.chars().count() > limit {
            out = out.chars().take(limit).collect();
        }
        out
    }
}

enum Markup<'a> {
    Open(NodeId),
    Text(&'a str),
    Close(&'a str),
}

static ROOT_SIBLINGS: [NodeId; 1] = [NodeId(0)];

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "track" | "wbr"
    )
}
