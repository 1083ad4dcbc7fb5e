use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tag name used for text runs interleaved with element children
pub const TEXT_TAG: &str = "#text";

/// Represents a DOM element node as captured from a page or parsed from HTML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name (e.g., "div", "button", "input"), or `#text` for a text run
    pub tag_name: String,

    /// Element attributes in source order
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Leading text of the element (for `#text` nodes, the text itself)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,

    /// Child nodes in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    /// Create a new ElementNode
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self { tag_name: tag_name.into(), attributes: IndexMap::new(), text_content: None, children: Vec::new() }
    }

    /// Create a text run, placed among element children to keep text order
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(TEXT_TAG).with_text(content)
    }

    /// Builder method: set attributes
    pub fn with_attributes(mut self, attributes: IndexMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder method: add one attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Builder method: set text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Builder method: set children
    pub fn with_children(mut self, children: Vec<ElementNode>) -> Self {
        self.children = children;
        self
    }

    /// Builder method: append one child
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: ElementNode) {
        self.children.push(child);
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Check if element has a specific class
    pub fn has_class(&self, class_name: &str) -> bool {
        self.get_attribute("class").is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
    }

    /// Get element ID
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    /// Check if element is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    /// Whether this node is a text run rather than an element
    pub fn is_text(&self) -> bool {
        self.tag_name == TEXT_TAG
    }

    /// Simplify element by removing children that never carry locator anchors
    pub fn simplify(&mut self) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            node.children.retain(|child| {
                !matches!(child.tag_name.to_ascii_lowercase().as_str(), "script" | "style" | "noscript")
            });
            stack.extend(node.children.iter_mut());
        }
    }

    /// Concatenated text of this node and all descendants, like `textContent`
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Some(text) = &node.text_content {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

impl Drop for ElementNode {
    // Descendants are moved onto a heap stack; dropping never recurses
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_node_creation() {
        let mut attrs = IndexMap::new();
        attrs.insert("id".to_string(), "test-id".to_string());
        attrs.insert("class".to_string(), "btn primary".to_string());

        let element = ElementNode::new("button").with_attributes(attrs).with_text("Click me");

        assert_eq!(element.tag_name, "button");
        assert_eq!(element.id(), Some("test-id"));
        assert_eq!(element.text_content, Some("Click me".to_string()));
        assert!(!element.is_text());
    }

    #[test]
    fn test_has_class() {
        let mut element = ElementNode::new("div");
        element.add_attribute("class", "container main active");

        assert!(element.has_class("container"));
        assert!(element.has_class("main"));
        assert!(element.has_class("active"));
        assert!(!element.has_class("hidden"));
    }

    #[test]
    fn test_attribute_order_is_kept() {
        let element = ElementNode::new("input").with_attribute("name", "q").with_attribute("type", "text");
        let keys: Vec<_> = element.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["name", "type"]);
    }

    #[test]
    fn test_simplify() {
        let mut parent = ElementNode::new("div");
        parent.add_child(ElementNode::new("p").with_text("Content"));
        parent.add_child(ElementNode::new("script").with_text("alert('test')"));
        parent.add_child(ElementNode::new("STYLE").with_text(".test { color: red; }"));
        parent.add_child(ElementNode::new("span").with_text("More content"));

        parent.simplify();

        assert_eq!(parent.children.len(), 2);
        assert!(parent.children[0].is_tag("p"));
        assert!(parent.children[1].is_tag("span"));
    }

    #[test]
    fn test_full_text_follows_document_order() {
        let node = ElementNode::new("p")
            .with_text("Hello ")
            .with_child(ElementNode::new("b").with_text("big"))
            .with_child(ElementNode::text(" world"));

        assert_eq!(node.full_text(), "Hello big world");
    }

    #[test]
    fn test_serialization() {
        let element = ElementNode::new("button").with_attribute("type", "submit").with_text("Click");

        let json = serde_json::to_string(&element).unwrap();
        let deserialized: ElementNode = serde_json::from_str(&json).unwrap();

        assert_eq!(element, deserialized);
    }

    #[test]
    fn test_deep_nesting() {
        let mut node = ElementNode::new("span").with_text("bottom");
        for _ in 0..10_000 {
            node = ElementNode::new("div").with_child(ElementNode::new("script")).with_child(node);
        }

        node.simplify();
        assert_eq!(node.full_text(), "bottom");
        assert_eq!(node.children.len(), 1);
        drop(node);
    }
}
