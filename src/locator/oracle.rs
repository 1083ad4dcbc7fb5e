//! Uniqueness oracle: match counting against one fixed evaluation context.

use crate::dom::{Context, Document, DomTree, ExpressionKind, NodeId};
use crate::locator::escape_xpath_text;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Match count of an expression, plus the target's 1-based position among the matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub count: usize,
    pub ordinal: Option<usize>,
}

impl MatchResult {
    pub fn is_unique(&self) -> bool {
        self.count == 1
    }
}

/// Evaluates candidate expressions against a document and a context held
/// constant for one synthesis call. Evaluation failures count as no matches.
pub struct Oracle<'d, D: Document + ?Sized> {
    doc: &'d D,
    context: Context,
}

impl<'d, D: Document + ?Sized> Oracle<'d, D> {
    pub fn new(doc: &'d D, context: Context) -> Self {
        Self { doc, context }
    }

    pub fn context(&self) -> Context {
        self.context
    }

    pub fn document(&self) -> &'d D {
        self.doc
    }

    pub fn tree(&self) -> &'d DomTree {
        self.doc.tree()
    }

    /// Rewrite absolute path expressions so they search the sandbox only
    fn scoped<'e>(&self, expression: &'e str, kind: ExpressionKind) -> Cow<'e, str> {
        if kind != ExpressionKind::Path || self.context == Context::Document {
            return Cow::Borrowed(expression);
        }
        if expression.starts_with("//") {
            Cow::Owned(format!(".{}", expression))
        } else if let Some(rest) = expression.strip_prefix("(//") {
            Cow::Owned(format!("(.//{}", rest))
        } else {
            Cow::Borrowed(expression)
        }
    }

    /// All matches in document order; empty when evaluation fails
    pub fn matches(&self, expression: &str, kind: ExpressionKind) -> Vec<NodeId> {
        let scoped = self.scoped(expression, kind);
        match self.doc.evaluate(&scoped, self.context, kind) {
            Ok(nodes) => nodes,
            Err(e) => {
                log::debug!("Treating '{}' as unmatched: {}", scoped, e);
                Vec::new()
            }
        }
    }

    pub fn evaluate(&self, expression: &str, kind: ExpressionKind) -> MatchResult {
        MatchResult { count: self.matches(expression, kind).len(), ordinal: None }
    }

    /// Evaluate and locate `target` among the matches
    pub fn evaluate_for(&self, expression: &str, kind: ExpressionKind, target: NodeId) -> MatchResult {
        let matches = self.matches(expression, kind);
        let ordinal = matches.iter().position(|n| *n == target).map(|p| p + 1);
        MatchResult { count: matches.len(), ordinal }
    }

    /// Exactly one match, and it is the target
    pub fn is_unique(&self, expression: &str, kind: ExpressionKind, target: NodeId) -> bool {
        let result = self.evaluate_for(expression, kind, target);
        result.count == 1 && result.ordinal == Some(1)
    }

    /// 1-based position of `target` among the matches of `expression`
    pub fn ordinal_of(&self, expression: &str, kind: ExpressionKind, target: NodeId) -> Option<usize> {
        self.evaluate_for(expression, kind, target).ordinal
    }

    /// Whether exactly one element in the context has this normalized text
    pub fn is_text_unique(&self, text: &str) -> bool {
        let expression = format!("//*[normalize-space()={}]", escape_xpath_text(text));
        self.evaluate(&expression, ExpressionKind::Path).is_unique()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DomTree {
        DomTree::parse_html(
            "<div id='outside'><button>Go</button></div>\
             <div id='sandbox'><p>Hello</p><button>Go</button><button>Stop</button></div>",
        )
        .unwrap()
    }

    #[test]
    fn test_counts_and_ordinals() {
        let tree = tree();
        let oracle = Oracle::new(&tree, Context::Document);
        let buttons = oracle.matches("button", ExpressionKind::Css);

        assert_eq!(oracle.evaluate("button", ExpressionKind::Css).count, 3);
        let result = oracle.evaluate_for("//button", ExpressionKind::Path, buttons[1]);
        assert_eq!(result, MatchResult { count: 3, ordinal: Some(2) });
        assert_eq!(oracle.ordinal_of("//button", ExpressionKind::Path, buttons[2]), Some(3));
    }

    #[test]
    fn test_unique_means_the_target() {
        let tree = tree();
        let oracle = Oracle::new(&tree, Context::Document);
        let stop = oracle.matches("//button[normalize-space(.)='Stop']", ExpressionKind::Path)[0];
        let go = oracle.matches("button", ExpressionKind::Css)[0];

        assert!(oracle.is_unique("//button[normalize-space(.)='Stop']", ExpressionKind::Path, stop));
        assert!(!oracle.is_unique("//button[normalize-space(.)='Stop']", ExpressionKind::Path, go));
    }

    #[test]
    fn test_sandbox_rewrites_absolute_paths() {
        let tree = tree();
        let sandbox = tree.find_by_id("sandbox").unwrap();
        let oracle = Oracle::new(&tree, Context::Sandbox(sandbox));

        assert_eq!(oracle.evaluate("//button[normalize-space(.)='Go']", ExpressionKind::Path).count, 1);
        assert_eq!(oracle.evaluate("(//button)[2]", ExpressionKind::Path).count, 1);
        assert_eq!(oracle.evaluate("button", ExpressionKind::Css).count, 2);
        assert!(oracle.is_text_unique("Go"));
        assert!(!Oracle::new(&tree, Context::Document).is_text_unique("Go"));
    }

    #[test]
    fn test_failures_count_as_zero() {
        let tree = tree();
        let oracle = Oracle::new(&tree, Context::Document);
        assert_eq!(oracle.evaluate("//button[", ExpressionKind::Path), MatchResult::default());
        assert_eq!(oracle.evaluate("button:bogus", ExpressionKind::Css).count, 0);
    }
}
