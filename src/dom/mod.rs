//! Document model and in-memory query engines
//!
//! This module provides the read-only view of a page that locator synthesis works on:
//! - ElementNode: element hierarchy built by hand
//! - SnapshotNode: flat preorder record a page snapshot is serialized as
//! - DomTree: arena of elements in document order with normalized text
//! - css / xpath: evaluators for the selector subsets the synthesizers emit
//! - Document: the evaluation seam shared by in-memory trees and live pages

pub mod css;
pub mod element;
pub mod tree;
pub mod xpath;

pub use element::ElementNode;
pub use tree::{DomTree, NodeData, NodeId, SnapshotNode, is_xml_whitespace, normalize_whitespace};

use crate::error::Result;
use headless_chrome::Tab;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Expression language of a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    Css,
    #[serde(rename = "xpath")]
    Path,
}

/// Root against which match counts are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// The whole document
    #[default]
    Document,
    /// The subtree below an element (pasted fragment, frame document)
    Sandbox(NodeId),
}

/// Read access to a document plus expression evaluation.
///
/// `evaluate` returns matches in document order. For [`Context::Sandbox`], CSS
/// matches are limited to descendants of the sandbox element and path
/// expressions are evaluated with that element as the context node.
pub trait Document {
    fn tree(&self) -> &DomTree;

    fn evaluate(&self, expression: &str, context: Context, kind: ExpressionKind) -> Result<Vec<NodeId>>;
}

impl Document for DomTree {
    fn tree(&self) -> &DomTree {
        self
    }

    fn evaluate(&self, expression: &str, context: Context, kind: ExpressionKind) -> Result<Vec<NodeId>> {
        match kind {
            ExpressionKind::Css => {
                let matches = css::select(self, expression)?;
                Ok(match context {
                    Context::Document => matches,
                    Context::Sandbox(scope) => {
                        matches.into_iter().filter(|n| self.is_descendant_of(*n, scope)).collect()
                    }
                })
            }
            ExpressionKind::Path => {
                let node = match context {
                    Context::Document => None,
                    Context::Sandbox(scope) => Some(scope),
                };
                xpath::evaluate(self, expression, node)
            }
        }
    }
}

/// Extract the DOM tree from a browser tab
pub fn extract_dom(tab: &Arc<Tab>) -> Result<DomTree> {
    DomTree::from_tab(tab)
}
