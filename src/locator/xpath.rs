//! Path expression synthesis.
//!
//! Runs a fast pass with a shallow climb and small anchor budgets, then a
//! deep pass when the fast result is not unique. Anything still ambiguous is
//! narrowed by an ancestor prefix or, as a last resort, a positional index.

use crate::dom::{Document, ExpressionKind, NodeId};
use crate::locator::{
    Candidate, CandidateKind, Guarantee, Pass, Strength, Synthesizer, escape_xpath_text, stabilize, strength_of,
};

/// Attributes tried, in priority order, to qualify a segment
const SEGMENT_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-nexus-id",
    "data-test-id",
    "id",
    "aria-label",
    "name",
    "title",
    "role",
    "placeholder",
    "alt",
    "type",
    "value",
];

/// Tags too common to identify a target on their own
const GENERIC_TAGS: &[&str] = &[
    "div", "span", "p", "a", "i", "b", "svg", "path", "section", "article", "li", "ul", "ol", "nav", "header", "footer",
    "main", "aside", "details", "summary",
];

const ANCHOR_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "label", "p", "span"];
const ANCHOR_CLASSES: &[&str] = &["title", "name", "content", "header", "label"];

const SEMANTIC_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "label"];
const SEMANTIC_CLASSES: &[&str] = &["title", "header", "name"];
const SEMANTIC_TEXT_MAX: usize = 60;

fn chars(text: &str) -> usize {
    text.chars().count()
}

impl<'d, D: Document + ?Sized> Synthesizer<'d, D> {
    /// Synthesize a path expression for `node`
    pub fn synthesize_path(&self, node: NodeId) -> Candidate {
        let fast = self.path_pass(node, Pass::Fast);
        if self.unique(&fast, ExpressionKind::Path, node) {
            return verified(fast);
        }

        log::debug!("Fast pass for node {} not unique ({}), running deep pass", node, fast);
        let deep = self.path_pass(node, Pass::Deep);
        if self.unique(&deep, ExpressionKind::Path, node) {
            return verified(deep);
        }

        self.disambiguate(node, deep)
    }

    /// Narrow an ambiguous path with an ancestor prefix, then with its ordinal
    fn disambiguate(&self, node: NodeId, expression: String) -> Candidate {
        let tree = self.tree();
        let target = self.segment(node, true);
        for parent in
            tree.ancestors(node).take_while(|a| self.in_context(*a)).take(self.options().verify_parent_attempts)
        {
            let attempt = format!("//{}//{}", self.segment(parent, true), target);
            if self.unique(&attempt, ExpressionKind::Path, node) {
                return verified(attempt);
            }
        }

        let result = self.oracle().evaluate_for(&expression, ExpressionKind::Path, node);
        if let (true, Some(ordinal)) = (result.count > 1, result.ordinal) {
            let indexed = format!("({})[{}]", expression, ordinal);
            if self.unique(&indexed, ExpressionKind::Path, node) {
                return Candidate::new(indexed, ExpressionKind::Path, Guarantee::Indexed);
            }
        }

        log::debug!("No unique path for node {}, keeping {} ({} matches)", node, expression, result.count);
        Candidate::new(expression, ExpressionKind::Path, Guarantee::BestEffort)
    }

    /// One synthesis pass; the result is unique unless every strategy failed
    fn path_pass(&self, node: NodeId, pass: Pass) -> String {
        let tree = self.tree();
        let options = self.options();
        let (max_depth, limit, deep) = match pass {
            Pass::Fast => (options.fast_depth, options.fast_candidates, false),
            Pass::Deep => (options.deep_depth, options.deep_candidates, true),
        };

        if let Some(id) = tree.attr_nonempty(node, "id").filter(|id| !self.volatile(id)) {
            let expression = format!("//*[@id={}]", escape_xpath_text(id));
            if self.unique(&expression, ExpressionKind::Path, node) {
                return expression;
            }
        }

        if let Some(expression) = self.own_text_path(node) {
            return expression;
        }

        let mut path: Vec<String> = Vec::new();
        let mut weak_unique: Option<String> = None;
        let mut current = Some(node);
        let mut depth = 0;

        while let Some(cur) = current {
            if depth >= max_depth || !self.in_context(cur) {
                break;
            }

            let segment = if cur == node { self.padded_segment(node) } else { self.segment(cur, deep) };
            path.insert(0, segment);

            let direct = format!("//{}", path.join("/"));
            let direct_unique = self.unique(&direct, ExpressionKind::Path, node);
            if direct_unique && !self.too_generic(node, path.len()) {
                return direct;
            }

            if let Some(expression) = self.ancestor_text_path(node, cur, deep) {
                return expression;
            }
            if let Some(expression) = self.anchor_jump_path(node, cur, &path) {
                return expression;
            }
            if let Some(expression) = self.container_text_path(node, cur, limit) {
                return expression;
            }
            if let Some(expression) = self.semantic_anchor_path(node, cur, limit) {
                return expression;
            }

            if direct_unique {
                if strength_of(&direct, ExpressionKind::Path) == Strength::Strong {
                    return direct;
                }
                weak_unique.get_or_insert(direct);
            }

            current = tree.parent(cur);
            depth += 1;
        }

        let leaf = format!("//{}", self.segment(node, true));
        if self.unique(&leaf, ExpressionKind::Path, node) {
            return leaf;
        }
        if let Some(parent) = tree.parent(node).filter(|p| self.in_context(*p)) {
            let pair = format!("//{}/{}", self.segment(parent, true), self.segment(node, true));
            if self.unique(&pair, ExpressionKind::Path, node) {
                return pair;
            }
        }
        weak_unique.unwrap_or(leaf)
    }

    /// Exact or stabilized own text, with a positional index when only that is unique
    fn own_text_path(&self, node: NodeId) -> Option<String> {
        let tree = self.tree();
        let text = tree.text(node);
        if text.is_empty() || chars(text) >= self.options().self_text_max {
            return None;
        }

        let tag = tree.tag(node);
        let stable = stabilize(text);
        let exact = format!("//{}[normalize-space(.)={}]", tag, escape_xpath_text(text));
        let exact_allowed = !self.volatile(text);

        if exact_allowed && stable.as_deref() == Some(text) && self.unique(&exact, ExpressionKind::Path, node) {
            return Some(exact);
        }

        match stable {
            Some(stable) => {
                let base = format!("//{}[contains(normalize-space(.), {})]", tag, escape_xpath_text(&stable));
                if self.unique(&base, ExpressionKind::Path, node) {
                    return Some(base);
                }
                let ordinal = self.oracle().ordinal_of(&base, ExpressionKind::Path, node)?;
                let indexed = format!("({})[{}]", base, ordinal);
                self.unique(&indexed, ExpressionKind::Path, node).then_some(indexed)
            }
            None => (exact_allowed && self.unique(&exact, ExpressionKind::Path, node)).then_some(exact),
        }
    }

    /// Generic targets need a qualifying attribute or a longer path
    fn too_generic(&self, node: NodeId, segments: usize) -> bool {
        let tree = self.tree();
        GENERIC_TAGS.contains(&tree.tag(node))
            && !["id", "data-testid", "name"].iter().any(|a| tree.attr_nonempty(node, a).is_some())
            && segments <= 2
    }

    /// Anchor on a nearby ancestor's stable text
    fn ancestor_text_path(&self, node: NodeId, cur: NodeId, deep: bool) -> Option<String> {
        let tree = self.tree();
        for ancestor in tree.ancestors(cur).take(self.options().ancestor_text_levels) {
            if !self.in_context(ancestor) || matches!(tree.tag(ancestor), "body" | "html") {
                break;
            }
            let text = tree.text(ancestor);
            let Some(stable) = stabilize(text) else {
                continue;
            };

            let tag = tree.tag(ancestor);
            let container = if stable == text {
                format!("{}[normalize-space(.)={}]", tag, escape_xpath_text(&stable))
            } else {
                format!("{}[contains(normalize-space(.), {})]", tag, escape_xpath_text(&stable))
            };

            let mut chain: Vec<NodeId> =
                std::iter::once(node).chain(tree.ancestors(node)).take_while(|n| *n != ancestor).collect();
            chain.reverse();
            let relative = chain.iter().map(|n| self.segment(*n, deep)).collect::<Vec<_>>().join("//");

            let expression = format!("//{}//{}", container, relative);
            if self.unique(&expression, ExpressionKind::Path, node) {
                return Some(expression);
            }
        }
        None
    }

    /// Jump from an identifying ancestor straight down to the target
    fn anchor_jump_path(&self, node: NodeId, cur: NodeId, path: &[String]) -> Option<String> {
        let tree = self.tree();
        let is_anchor = ["id", "data-testid", "name"]
            .iter()
            .any(|a| tree.attr_nonempty(cur, a).is_some_and(|v| !self.volatile(v)));
        if !is_anchor {
            return None;
        }

        let (anchor, rest) = path.split_first()?;
        let expression =
            if rest.is_empty() { format!("//{}", anchor) } else { format!("//{}//{}", anchor, rest.join("//")) };
        self.unique(&expression, ExpressionKind::Path, node).then_some(expression)
    }

    /// Anchor on text that occurs exactly once inside the current container
    fn container_text_path(&self, node: NodeId, cur: NodeId, limit: usize) -> Option<String> {
        let text = self.unique_anchor_text(cur, limit)?;
        let expression = format!(
            "//*[normalize-space(.)={}]/ancestor::{}[1]//{}",
            escape_xpath_text(&text),
            self.tree().tag(cur),
            self.padded_segment(node)
        );
        self.unique(&expression, ExpressionKind::Path, node).then_some(expression)
    }

    /// First descendant text of `container` that is unique in the context,
    /// trying headings and labels before everything else
    fn unique_anchor_text(&self, container: NodeId, limit: usize) -> Option<String> {
        let tree = self.tree();
        let max = self.options().anchor_text_max;

        let preferred: Vec<NodeId> = tree
            .descendants(container)
            .filter(|n| {
                let data = tree.node(*n);
                ANCHOR_TAGS.contains(&data.tag_name.as_str()) || data.classes().any(|c| ANCHOR_CLASSES.contains(&c))
            })
            .collect();

        [preferred, tree.descendants(container).collect()].into_iter().find_map(|group| {
            group
                .into_iter()
                .map(|n| tree.text(n))
                .filter(|t| chars(t) > 3 && chars(t) < max && !self.volatile(t))
                .take(limit)
                .find(|t| self.oracle().is_text_unique(t))
                .map(str::to_string)
        })
    }

    /// `//container[.//heading[text]]//target` for small containers
    fn semantic_anchor_path(&self, node: NodeId, cur: NodeId, limit: usize) -> Option<String> {
        let tree = self.tree();
        if tree.children(cur).len() >= self.options().semantic_child_limit {
            return None;
        }

        tree.descendants(cur)
            .filter(|a| *a != node)
            .filter(|a| {
                let data = tree.node(*a);
                SEMANTIC_TAGS.contains(&data.tag_name.as_str()) || data.classes().any(|c| SEMANTIC_CLASSES.contains(&c))
            })
            .take(limit)
            .find_map(|anchor| {
                let text = tree.text(anchor);
                if chars(text) <= 2 || chars(text) >= SEMANTIC_TEXT_MAX || self.volatile(text) {
                    return None;
                }
                let expression = format!(
                    "//{}[.//{}[normalize-space(.)={}]]//{}",
                    tree.tag(cur),
                    tree.tag(anchor),
                    escape_xpath_text(text),
                    tree.tag(node)
                );
                self.unique(&expression, ExpressionKind::Path, node).then_some(expression)
            })
    }

    /// Target segment with its own text appended when short and stable
    fn padded_segment(&self, node: NodeId) -> String {
        let segment = self.segment(node, true);
        let text = self.tree().text(node);
        if segment.contains("normalize-space")
            || text.is_empty()
            || chars(text) >= self.options().padded_text_max
            || self.volatile(text)
        {
            return segment;
        }
        format!("{}[normalize-space()={}]", segment, escape_xpath_text(text))
    }

    /// Single path step for `node`.
    ///
    /// Without `force_all` only the highest-priority stable attribute is used;
    /// if that is not unique, every stable attribute is combined. Text and
    /// class predicates follow, then the non-unique forms, then the bare tag.
    pub(crate) fn segment(&self, node: NodeId, force_all: bool) -> String {
        if let Some(cached) = self.segments.borrow().get(&(node, force_all)) {
            return cached.clone();
        }
        let segment = self.compute_segment(node, force_all);
        self.segments.borrow_mut().insert((node, force_all), segment.clone());
        segment
    }

    fn compute_segment(&self, node: NodeId, force_all: bool) -> String {
        let tree = self.tree();
        let tag = tree.tag(node);

        let mut conditions = Vec::new();
        for attr in SEGMENT_ATTRIBUTES {
            if let Some(value) = tree.attr_nonempty(node, attr).filter(|v| !self.volatile(v)) {
                conditions.push(format!("@{}={}", attr, escape_xpath_text(value)));
                if !force_all {
                    break;
                }
            }
        }

        let with_attributes = (!conditions.is_empty()).then(|| format!("{}[{}]", tag, conditions.join(" and ")));
        if let Some(segment) = &with_attributes {
            if self.unique(&format!("//{}", segment), ExpressionKind::Path, node) {
                return segment.clone();
            }
            if !force_all {
                return self.segment(node, true);
            }
        }

        let text = tree.text(node);
        let mut text_segment = None;
        if !text.is_empty() && chars(text) < self.options().segment_text_max {
            if let Some(stable) = stabilize(text) {
                let segment = format!("{}[contains(normalize-space(.), {})]", tag, escape_xpath_text(&stable));
                if self.unique(&format!("//{}", segment), ExpressionKind::Path, node) {
                    return segment;
                }
                text_segment = Some(segment);
            } else if !self.volatile(text) {
                let segment = format!("{}[normalize-space(.)={}]", tag, escape_xpath_text(text));
                if self.unique(&format!("//{}", segment), ExpressionKind::Path, node) {
                    return segment;
                }
            }
        }

        for class in tree.node(node).classes().filter(|c| !self.volatile(c)) {
            let segment = format!(
                "{}[contains(concat(' ', normalize-space(@class), ' '), {})]",
                tag,
                escape_xpath_text(&format!(" {} ", class))
            );
            if self.unique(&format!("//{}", segment), ExpressionKind::Path, node) {
                return segment;
            }
        }

        with_attributes.or(text_segment).unwrap_or_else(|| tag.to_string())
    }
}

/// A unique path, marked indexed when uniqueness came from a positional wrapper
fn verified(expression: String) -> Candidate {
    let mut candidate = Candidate::new(expression, ExpressionKind::Path, Guarantee::Unique);
    if candidate.kind == CandidateKind::Positional {
        candidate.guarantee = Guarantee::Indexed;
    }
    candidate
}
