//! Structural CSS selector synthesis.

use crate::dom::{Document, ExpressionKind, NodeId};
use crate::locator::{Candidate, Guarantee, Strength, Synthesizer, css_escape, css_string, strength_of};

/// Attributes tried, in order, to qualify one selector segment
const SEGMENT_ATTRIBUTES: &[&str] = &["name", "data-testid", "data-test-id", "data-automation-id", "aria-label"];

impl<'d, D: Document + ?Sized> Synthesizer<'d, D> {
    /// Synthesize a CSS selector for `node`.
    ///
    /// A stable unique `id` wins outright. Otherwise segments are prepended
    /// while climbing until the `>`-joined path is unique; a weak result is
    /// then retried with `:nth-of-type` from the leaf upward.
    pub fn synthesize_css(&self, node: NodeId) -> Candidate {
        let tree = self.tree();

        if let Some(id) = tree.attr_nonempty(node, "id").filter(|id| !self.volatile(id)) {
            let selector = format!("#{}", css_escape(id));
            if self.unique(&selector, ExpressionKind::Css, node) {
                return Candidate::new(selector, ExpressionKind::Css, Guarantee::Unique);
            }
        }

        let mut segments: Vec<(NodeId, String)> = Vec::new();
        let mut current = Some(node);
        let mut depth = 0;
        while let Some(cur) = current {
            if !self.in_context(cur) || depth >= self.options().deep_depth {
                break;
            }
            if let Some(id) = tree.attr_nonempty(cur, "id").filter(|id| !self.volatile(id)) {
                segments.insert(0, (cur, format!("#{}", css_escape(id))));
                break;
            }
            segments.insert(0, (cur, self.css_segment(cur)));
            if self.unique(&join(&segments), ExpressionKind::Css, node) {
                break;
            }
            current = tree.parent(cur);
            depth += 1;
        }

        let selector = join(&segments);
        if self.unique(&selector, ExpressionKind::Css, node) && strength_of(&selector, ExpressionKind::Css) == Strength::Strong {
            return Candidate::new(selector, ExpressionKind::Css, Guarantee::Unique);
        }

        let mut fallback: Option<String> = None;
        for i in (0..segments.len()).rev() {
            let (n, segment) = &segments[i];
            let indexed = format!("{}:nth-of-type({})", segment, tree.index_of_type(*n));
            segments[i].1 = indexed;

            let attempt = join(&segments);
            if self.unique(&attempt, ExpressionKind::Css, node) {
                if strength_of(&attempt, ExpressionKind::Css) == Strength::Strong {
                    return Candidate::new(attempt, ExpressionKind::Css, Guarantee::Indexed);
                }
                fallback.get_or_insert(attempt);
            }
        }

        match fallback {
            Some(selector) => Candidate::new(selector, ExpressionKind::Css, Guarantee::Indexed),
            None => {
                log::debug!("No unique CSS selector for node {}, keeping {}", node, selector);
                Candidate::new(selector, ExpressionKind::Css, Guarantee::BestEffort)
            }
        }
    }

    /// Tag plus the first stable qualifying attribute
    fn css_segment(&self, node: NodeId) -> String {
        let tree = self.tree();
        let tag = tree.tag(node);
        SEGMENT_ATTRIBUTES
            .iter()
            .find_map(|attr| {
                tree.attr_nonempty(node, attr)
                    .filter(|v| !self.volatile(v))
                    .map(|v| format!("{}[{}={}]", tag, attr, css_string(v)))
            })
            .unwrap_or_else(|| tag.to_string())
    }
}

fn join(segments: &[(NodeId, String)]) -> String {
    segments.iter().map(|(_, s)| s.as_str()).collect::<Vec<_>>().join(" > ")
}
