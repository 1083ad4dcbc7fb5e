//! User-facing lookups: role and accessible name, label, placeholder, alt
//! text, visible text and test identifiers.

use crate::dom::{Context, DomTree, NodeId, normalize_whitespace};
use crate::locator::volatility::{VolatilityPolicy, is_volatile_with};
use serde::{Deserialize, Serialize};

/// Attributes authored for test automation, in lookup order
pub const TEST_ID_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-nexus-id",
    "data-test-id",
    "test-id",
    "data-automation-id",
    "automation-id",
    "data-cy",
    "data-component",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLocator {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdLocator {
    pub attribute: String,
    pub value: String,
}

/// Kind of interaction the element most likely receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionIntent {
    #[default]
    Click,
    Fill,
    Select,
    Check,
}

impl ActionIntent {
    pub fn for_node(tree: &DomTree, node: NodeId) -> Self {
        match tree.tag(node) {
            "select" => Self::Select,
            "textarea" => Self::Fill,
            "input" => match input_type(tree, node).as_deref() {
                Some("checkbox" | "radio") => Self::Check,
                _ => Self::Fill,
            },
            _ => Self::Click,
        }
    }
}

/// Effective `type` of form controls, with the HTML defaults
pub fn input_type(tree: &DomTree, node: NodeId) -> Option<String> {
    let declared = tree.attr_nonempty(node, "type").map(str::to_ascii_lowercase);
    match tree.tag(node) {
        "input" => Some(declared.unwrap_or_else(|| "text".to_string())),
        "button" => Some(declared.unwrap_or_else(|| "submit".to_string())),
        _ => declared,
    }
}

/// Role implied by the element itself when no `role` attribute is present
pub fn implicit_role(tree: &DomTree, node: NodeId) -> Option<&'static str> {
    match tree.tag(node) {
        "button" => Some("button"),
        "a" => Some("link"),
        "textarea" => Some("textbox"),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading"),
        "input" => match input_type(tree, node).as_deref() {
            Some("checkbox") => Some("checkbox"),
            Some("radio") => Some("radio"),
            Some("button" | "submit" | "reset") => Some("button"),
            Some("text" | "email" | "password" | "search" | "tel" | "url") => Some("textbox"),
            _ => None,
        },
        _ => None,
    }
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE0F | 0x200D | 0x20E3 | 0xE0020..=0xE007F)
}

/// Drop emoji and pictographs, then renormalize whitespace
pub fn strip_emoji(text: &str) -> String {
    normalize_whitespace(&text.chars().filter(|c| !is_emoji(*c)).collect::<String>())
}

/// Role with accessible name; the name is dropped when empty or too long
pub fn role(tree: &DomTree, node: NodeId, name_max: usize) -> Option<RoleLocator> {
    let role = tree.attr_nonempty(node, "role").map(str::to_string).or_else(|| implicit_role(tree, node).map(String::from))?;

    let name = [
        Some(tree.text(node)),
        tree.attr_nonempty(node, "aria-label"),
        tree.attr_nonempty(node, "title"),
        tree.attr_nonempty(node, "value"),
    ]
    .into_iter()
    .flatten()
    .map(strip_emoji)
    .find(|n| !n.is_empty())
    .filter(|n| n.chars().count() < name_max);

    Some(RoleLocator { role, name })
}

/// Text of `label[for=id]` inside the context, then `aria-label`
pub fn label(tree: &DomTree, node: NodeId, context: Context) -> Option<String> {
    let for_label = tree.attr_nonempty(node, "id").and_then(|id| {
        tree.ids()
            .filter(|n| match context {
                Context::Document => true,
                Context::Sandbox(scope) => tree.is_descendant_of(*n, scope),
            })
            .find(|n| tree.tag(*n) == "label" && tree.attr(*n, "for") == Some(id))
            .map(|n| tree.text(n).to_string())
            .filter(|t| !t.is_empty())
    });
    for_label.or_else(|| tree.attr_nonempty(node, "aria-label").map(str::to_string))
}

/// Own text when short and stable
pub fn visible_text(tree: &DomTree, node: NodeId, max: usize, policy: VolatilityPolicy) -> Option<String> {
    let text = tree.text(node);
    (!text.is_empty() && text.chars().count() < max && !is_volatile_with(text, policy)).then(|| text.to_string())
}

/// First stable test-automation attribute
pub fn test_id(tree: &DomTree, node: NodeId, policy: VolatilityPolicy) -> Option<TestIdLocator> {
    TEST_ID_ATTRIBUTES.iter().find_map(|attr| {
        tree.attr_nonempty(node, attr)
            .filter(|v| !is_volatile_with(v, policy))
            .map(|v| TestIdLocator { attribute: attr.to_string(), value: v.to_string() })
    })
}
