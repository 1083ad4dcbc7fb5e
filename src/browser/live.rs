use crate::dom::{Context, Document, DomTree, ExpressionKind, NodeId};
use crate::error::{LocatorError, Result};
use headless_chrome::Tab;
use std::sync::Arc;

/// A page in a browser tab.
///
/// The element structure is snapshotted once (and on [`refresh`](Self::refresh));
/// expressions are evaluated by the page itself, so match counts reflect the
/// live document at the instant of each call.
pub struct LiveDocument {
    tab: Arc<Tab>,
    tree: DomTree,
}

impl LiveDocument {
    /// Snapshot the page currently loaded in `tab`
    pub fn capture(tab: Arc<Tab>) -> Result<Self> {
        let tree = DomTree::from_tab(&tab)?;
        Ok(Self { tab, tree })
    }

    /// Re-snapshot after the page changed; previously returned ids become stale
    pub fn refresh(&mut self) -> Result<()> {
        self.tree = DomTree::from_tab(&self.tab)?;
        Ok(())
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// First element matching a CSS selector in the page
    pub fn find(&self, selector: &str) -> Result<NodeId> {
        self.evaluate(selector, Context::Document, ExpressionKind::Css)?
            .into_iter()
            .find(|n| *n != NodeId::UNTRACKED)
            .ok_or_else(|| LocatorError::ElementNotFound(format!("No element matches '{}'", selector)))
    }
}

impl Document for LiveDocument {
    fn tree(&self) -> &DomTree {
        &self.tree
    }

    fn evaluate(&self, expression: &str, context: Context, kind: ExpressionKind) -> Result<Vec<NodeId>> {
        let literal = serde_json::to_string(expression)
            .map_err(|e| LocatorError::EvaluationFailed(format!("Failed to encode expression: {}", e)))?;
        let kind_name = match kind {
            ExpressionKind::Css => "css",
            ExpressionKind::Path => "xpath",
        };
        let context_index = match context {
            Context::Document => -1,
            Context::Sandbox(scope) => scope.0 as i64,
        };
        let js_code = format!("{}({}, '{}', {})", include_str!("evaluate.js"), literal, kind_name, context_index);

        let result = self
            .tab
            .evaluate(&js_code, false)
            .map_err(|e| LocatorError::EvaluationFailed(format!("'{}' failed in page: {}", expression, e)))?;

        let json_value =
            result.value.ok_or_else(|| LocatorError::EvaluationFailed("No value returned from page".to_string()))?;
        let json_str: String = serde_json::from_value(json_value)
            .map_err(|e| LocatorError::EvaluationFailed(format!("Failed to get JSON string: {}", e)))?;
        let indexes: Vec<i64> = serde_json::from_str(&json_str)
            .map_err(|e| LocatorError::EvaluationFailed(format!("Failed to parse match list: {}", e)))?;

        Ok(indexes
            .into_iter()
            .map(|i| usize::try_from(i).map(NodeId).unwrap_or(NodeId::UNTRACKED))
            .collect())
    }
}
