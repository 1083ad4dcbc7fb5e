use crate::dom::{Document, DomTree, ExpressionKind, NodeId};
use crate::locator::framework::{self, FrameworkMatch, Frontend};
use crate::locator::semantic::{self, RoleLocator, TestIdLocator};
use crate::locator::{Candidate, Guarantee, Synthesizer};
use serde::{Deserialize, Serialize};

pub use crate::locator::semantic::ActionIntent;

/// Frame element enclosing the target, addressed in the outer document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBoundary {
    pub node: NodeId,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    pub selector: Candidate,
}

impl FrameBoundary {
    pub(crate) fn new(tree: &DomTree, node: NodeId, selector: Candidate) -> Self {
        let attr = |name: &str| tree.attr_nonempty(node, name).map(str::to_string);
        Self { node, tag: tree.tag(node).to_string(), id: attr("id"), name: attr("name"), src: attr("src"), selector }
    }
}

/// Every locator computed for one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorSet {
    pub node: NodeId,
    pub tag: String,
    pub id: Option<String>,
    pub by_role: Option<RoleLocator>,
    pub by_text: Option<String>,
    pub by_label: Option<String>,
    pub by_placeholder: Option<String>,
    pub by_alt_text: Option<String>,
    pub by_test_id: Option<TestIdLocator>,
    pub input_type: Option<String>,
    pub css: Candidate,
    pub xpath: Candidate,
    pub frontend: Frontend,
    /// Convention matches, innermost first
    pub frameworks: Vec<FrameworkMatch>,
    pub frame: Option<FrameBoundary>,
    pub action: ActionIntent,
    /// Outer HTML, truncated
    pub snapshot: String,
}

/// Lookup methods a caller can pick from a [`LocatorSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TestId,
    Role,
    Label,
    Placeholder,
    AltText,
    Text,
    Css,
    Xpath,
    Framework,
}

/// The locator handed to code generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BestLocator {
    TestId { attribute: String, value: String },
    Role { role: String, name: String },
    Label { value: String },
    Placeholder { value: String },
    AltText { value: String },
    Text { value: String },
    Css { expression: String, guarantee: Guarantee },
    Xpath { expression: String, guarantee: Guarantee },
    Framework { selector: String },
}

impl BestLocator {
    fn structural(candidate: &Candidate) -> Self {
        match candidate.syntax {
            ExpressionKind::Css => Self::Css { expression: candidate.expression.clone(), guarantee: candidate.guarantee },
            ExpressionKind::Path => {
                Self::Xpath { expression: candidate.expression.clone(), guarantee: candidate.guarantee }
            }
        }
    }

    /// Whether a caller should warn that the locator may not be unique
    pub fn is_approximate(&self) -> bool {
        matches!(
            self,
            Self::Css { guarantee: Guarantee::BestEffort, .. } | Self::Xpath { guarantee: Guarantee::BestEffort, .. }
        )
    }
}

impl LocatorSet {
    pub(crate) fn assemble<D: Document + ?Sized>(
        synth: &Synthesizer<'_, D>,
        node: NodeId,
        css: Candidate,
        xpath: Candidate,
        frame: Option<FrameBoundary>,
    ) -> Self {
        let tree = synth.tree();
        let options = synth.options();
        let context = synth.oracle().context();
        let attr = |name: &str| tree.attr_nonempty(node, name).map(str::to_string);

        Self {
            node,
            tag: tree.tag(node).to_string(),
            id: attr("id"),
            by_role: semantic::role(tree, node, options.role_name_max),
            by_text: semantic::visible_text(tree, node, options.visible_text_max, options.policy),
            by_label: semantic::label(tree, node, context),
            by_placeholder: attr("placeholder"),
            by_alt_text: attr("alt"),
            by_test_id: semantic::test_id(tree, node, options.policy),
            input_type: semantic::input_type(tree, node),
            css,
            xpath,
            frontend: framework::detect_frontend(tree),
            frameworks: framework::detect_all(tree, node, options.policy),
            frame,
            action: ActionIntent::for_node(tree, node),
            snapshot: tree.outer_html(node, options.snapshot_limit),
        }
    }

    /// Innermost framework convention match
    pub fn framework(&self) -> Option<&FrameworkMatch> {
        framework::most_specific(&self.frameworks)
    }

    /// The locator for one lookup method, if this element has one
    pub fn locate(&self, strategy: Strategy) -> Option<BestLocator> {
        match strategy {
            Strategy::TestId => self
                .by_test_id
                .as_ref()
                .map(|t| BestLocator::TestId { attribute: t.attribute.clone(), value: t.value.clone() }),
            Strategy::Role => self
                .by_role
                .as_ref()
                .and_then(|r| r.name.as_ref().map(|name| BestLocator::Role { role: r.role.clone(), name: name.clone() })),
            Strategy::Label => self.by_label.clone().map(|value| BestLocator::Label { value }),
            Strategy::Placeholder => self.by_placeholder.clone().map(|value| BestLocator::Placeholder { value }),
            Strategy::AltText => self.by_alt_text.clone().map(|value| BestLocator::AltText { value }),
            Strategy::Text => self.by_text.clone().map(|value| BestLocator::Text { value }),
            Strategy::Css => Some(BestLocator::structural(&self.css)),
            Strategy::Xpath => Some(BestLocator::structural(&self.xpath)),
            Strategy::Framework => {
                self.framework().and_then(|m| m.selector()).map(|selector| BestLocator::Framework { selector: selector.to_string() })
            }
        }
    }

    /// Highest-precedence populated locator
    pub fn best(&self) -> BestLocator {
        rank(self)
    }
}

/// Test id, then role with name, label, placeholder and visible text; the
/// structural candidates come last, the better-guaranteed one first.
pub fn rank(set: &LocatorSet) -> BestLocator {
    const PRECEDENCE: [Strategy; 5] =
        [Strategy::TestId, Strategy::Role, Strategy::Label, Strategy::Placeholder, Strategy::Text];

    PRECEDENCE
        .iter()
        .find_map(|s| set.locate(*s))
        .unwrap_or_else(|| BestLocator::structural(structural_choice(&set.css, &set.xpath)))
}

fn structural_choice<'c>(css: &'c Candidate, xpath: &'c Candidate) -> &'c Candidate {
    let weight = |g: Guarantee| match g {
        Guarantee::Unique => 0,
        Guarantee::Indexed => 1,
        Guarantee::BestEffort => 2,
    };
    if weight(xpath.guarantee) < weight(css.guarantee) { xpath } else { css }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{SynthesisOptions, generate_locators};

    fn locators(html: &str, find: impl Fn(&DomTree) -> NodeId) -> LocatorSet {
        let tree = DomTree::parse_html(html).unwrap();
        generate_locators(&tree, find(&tree), &SynthesisOptions::default()).unwrap()
    }

    #[test]
    fn test_test_id_wins() {
        let set = locators("<button data-testid='checkout' aria-label='Pay now'>Pay</button>", |t| {
            t.ids().find(|n| t.tag(*n) == "button").unwrap()
        });
        assert_eq!(set.best(), BestLocator::TestId { attribute: "data-testid".to_string(), value: "checkout".to_string() });
    }

    #[test]
    fn test_role_with_name_before_label() {
        let set = locators("<label for='q'>Query</label><input id='q' type='search' title='Search box'>", |t| {
            t.find_by_id("q").unwrap()
        });
        assert_eq!(set.best(), BestLocator::Role { role: "textbox".to_string(), name: "Search box".to_string() });
        assert_eq!(set.by_label.as_deref(), Some("Query"));
        assert_eq!(set.action, ActionIntent::Fill);
    }

    #[test]
    fn test_placeholder_before_text() {
        let set = locators("<form><input placeholder='Your email' type='range'></form>", |t| {
            t.ids().find(|n| t.tag(*n) == "input").unwrap()
        });
        assert_eq!(set.best(), BestLocator::Placeholder { value: "Your email".to_string() });
    }

    #[test]
    fn test_structural_fallback_prefers_unique() {
        let set = locators("<ul><li><i></i></li><li><i></i></li></ul>", |t| {
            t.ids().filter(|n| t.tag(*n) == "i").nth(1).unwrap()
        });
        match set.best() {
            BestLocator::Css { guarantee, .. } | BestLocator::Xpath { guarantee, .. } => {
                assert_ne!(guarantee, Guarantee::BestEffort)
            }
            other => panic!("expected a structural locator, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_choice() {
        let css = Candidate::new("ul > li:nth-of-type(2)", ExpressionKind::Css, Guarantee::Indexed);
        let xpath = Candidate::new("//li[@data-testid='b']", ExpressionKind::Path, Guarantee::Unique);
        assert_eq!(structural_choice(&css, &xpath), &xpath);
        assert_eq!(structural_choice(&xpath, &css), &xpath);

        let css = Candidate::new("#b", ExpressionKind::Css, Guarantee::Unique);
        assert_eq!(structural_choice(&css, &xpath), &css);
    }

    #[test]
    fn test_snapshot_is_bounded() {
        let body = "word ".repeat(2000);
        let tree = DomTree::parse_html(&format!("<article>{}</article>", body)).unwrap();
        let article = tree.ids().find(|n| tree.tag(*n) == "article").unwrap();
        let options = SynthesisOptions::default().snapshot_limit(200);
        let set = generate_locators(&tree, article, &options).unwrap();
        assert_eq!(set.snapshot.chars().count(), 200);
        assert!(set.snapshot.starts_with("<article>"));
    }
}
