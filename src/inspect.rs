//! Per-caller inspection state: the picked element, its locators and the
//! user's manual choice among them.

use crate::dom::{Context, Document, NodeId};
use crate::error::{LocatorError, Result};
use crate::locator::{BestLocator, LocatorSet, Strategy, SynthesisOptions, generate_locators_in};

#[derive(Debug, Clone)]
struct Selection {
    node: NodeId,
    locators: LocatorSet,
    chosen: Option<Strategy>,
}

/// State of one inspection, owned by the caller and threaded through calls.
///
/// Node ids are only meaningful for the document they were picked from; call
/// [`select`](Self::select) again after the document changes.
#[derive(Debug, Clone, Default)]
pub struct InspectSession {
    options: SynthesisOptions,
    context: Option<Context>,
    selection: Option<Selection>,
}

impl InspectSession {
    pub fn new(options: SynthesisOptions) -> Self {
        Self { options, context: None, selection: None }
    }

    /// Evaluate uniqueness inside `root` instead of the whole document
    pub fn sandbox(mut self, root: NodeId) -> Self {
        self.context = Some(Context::Sandbox(root));
        self
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Pick a node and compute its locators. Any earlier manual choice is dropped.
    pub fn select<D: Document + ?Sized>(&mut self, doc: &D, node: NodeId) -> Result<&LocatorSet> {
        let context = self.context.unwrap_or(Context::Document);
        let locators = generate_locators_in(doc, node, context, &self.options)?;
        log::debug!("Selected node {} ({})", node.0, locators.tag);

        let selection = self.selection.insert(Selection { node, locators, chosen: None });
        Ok(&selection.locators)
    }

    /// Override the ranking with a specific lookup method
    pub fn choose(&mut self, strategy: Strategy) -> Result<BestLocator> {
        let selection =
            self.selection.as_mut().ok_or_else(|| LocatorError::ElementNotFound("No element selected".to_string()))?;

        let locator = selection.locators.locate(strategy).ok_or_else(|| {
            LocatorError::ElementNotFound(format!("Selected element has no {:?} locator", strategy))
        })?;
        selection.chosen = Some(strategy);
        Ok(locator)
    }

    /// The manual choice if one was made, else the ranked best
    pub fn best(&self) -> Option<BestLocator> {
        let selection = self.selection.as_ref()?;
        selection
            .chosen
            .and_then(|s| selection.locators.locate(s))
            .or_else(|| Some(selection.locators.best()))
    }

    pub fn chosen(&self) -> Option<Strategy> {
        self.selection.as_ref().and_then(|s| s.chosen)
    }

    pub fn clear_override(&mut self) {
        if let Some(selection) = self.selection.as_mut() {
            selection.chosen = None;
        }
    }

    /// Forget the selection entirely
    pub fn clear(&mut self) {
        self.selection = None;
    }

    pub fn current(&self) -> Option<(NodeId, &LocatorSet)> {
        self.selection.as_ref().map(|s| (s.node, &s.locators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, css};

    fn page() -> DomTree {
        DomTree::parse_html(
            r#"<form>
                <label for="email">Email</label>
                <input id="email" data-testid="email-field" placeholder="you@example.com">
                <button>Submit</button>
            </form>"#,
        )
        .unwrap()
    }

    fn first(tree: &DomTree, selector: &str) -> NodeId {
        css::select(tree, selector).unwrap()[0]
    }

    #[test]
    fn test_best_without_selection() {
        let session = InspectSession::default();
        assert!(session.best().is_none());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_select_ranks_test_id_first() {
        let tree = page();
        let input = first(&tree, "input");
        let mut session = InspectSession::default();

        let set = session.select(&tree, input).unwrap();
        assert_eq!(set.css.expression, "#email");

        assert_eq!(
            session.best(),
            Some(BestLocator::TestId { attribute: "data-testid".to_string(), value: "email-field".to_string() })
        );
    }

    #[test]
    fn test_choose_overrides_ranking() {
        let tree = page();
        let input = first(&tree, "input");
        let mut session = InspectSession::default();
        session.select(&tree, input).unwrap();

        let chosen = session.choose(Strategy::Placeholder).unwrap();
        assert_eq!(chosen, BestLocator::Placeholder { value: "you@example.com".to_string() });
        assert_eq!(session.best(), Some(chosen));
        assert_eq!(session.chosen(), Some(Strategy::Placeholder));

        session.clear_override();
        assert!(matches!(session.best(), Some(BestLocator::TestId { .. })));
    }

    #[test]
    fn test_choose_unavailable_strategy() {
        let tree = page();
        let button = first(&tree, "button");
        let mut session = InspectSession::default();

        assert!(matches!(session.choose(Strategy::Css), Err(LocatorError::ElementNotFound(_))));

        session.select(&tree, button).unwrap();
        assert!(session.choose(Strategy::AltText).is_err());
        assert_eq!(session.chosen(), None);
    }

    #[test]
    fn test_reselect_drops_override() {
        let tree = page();
        let mut session = InspectSession::default();
        session.select(&tree, first(&tree, "input")).unwrap();
        session.choose(Strategy::Xpath).unwrap();

        let button = first(&tree, "button");
        session.select(&tree, button).unwrap();
        assert_eq!(session.chosen(), None);
        assert_eq!(session.current().map(|(n, _)| n), Some(button));

        session.clear();
        assert!(session.best().is_none());
    }

    #[test]
    fn test_sandboxed_session_rejects_outside_node() {
        let tree =
            DomTree::parse_html(r#"<div id="a"><button>Go</button></div><div id="b"><button>Go</button></div>"#).unwrap();
        let a = tree.find_by_id("a").unwrap();
        let outside = first(&tree, "#b button");

        let mut session = InspectSession::default().sandbox(a);
        assert!(session.select(&tree, outside).is_err());

        let inside = first(&tree, "#a button");
        let set = session.select(&tree, inside).unwrap();
        assert!(set.xpath.is_unique());
    }
}
