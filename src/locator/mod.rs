//! Locator synthesis
//!
//! Given a target element, produce expressions that select exactly that
//! element and are likely to survive re-renders:
//! - volatility / stabilizer: reject generated values, keep stable text
//! - oracle: uniqueness checks against a fixed evaluation context
//! - css / xpath: the two structural synthesizers
//! - framework: convention-specific descriptors for known component libraries
//! - semantic / ranker: role, label and text lookups plus the final choice

pub mod config;
pub mod css;
pub mod framework;
pub mod oracle;
pub mod ranker;
pub mod semantic;
pub mod stabilizer;
pub mod volatility;
pub mod xpath;

pub use config::SynthesisOptions;
pub use framework::{Frontend, FrameworkMatch};
pub use oracle::{MatchResult, Oracle};
pub use ranker::{ActionIntent, BestLocator, FrameBoundary, LocatorSet, Strategy};
pub use stabilizer::stabilize;
pub use volatility::{VolatilityPolicy, is_volatile, is_volatile_with};

use crate::dom::{Context, Document, DomTree, ExpressionKind, NodeId};
use crate::error::{LocatorError, Result};
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Attributes that identify an element on purpose
const IDENTIFYING_ATTRIBUTES: &str =
    "id|name|role|data-testid|data-test-id|test-id|data-automation-id|automation-id|data-cy|data-nexus-id|data-component-id";

/// Shape of a candidate expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Id,
    Attribute,
    Text,
    Class,
    Compound,
    Positional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Weak,
}

/// How far a candidate can be trusted to select only the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guarantee {
    /// Verified unique without positional indexing
    Unique,
    /// Verified unique through a positional index
    Indexed,
    /// Nothing unique was found; the expression matches the target among others, or not at all
    BestEffort,
}

/// One synthesized expression
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub expression: String,
    pub syntax: ExpressionKind,
    pub guarantee: Guarantee,
}

impl Candidate {
    pub fn new(expression: impl Into<String>, syntax: ExpressionKind, guarantee: Guarantee) -> Self {
        let expression = expression.into();
        Self { kind: CandidateKind::classify(&expression, syntax), expression, syntax, guarantee }
    }

    /// Strong candidates carry an id, test-id, name or role predicate
    pub fn strength(&self) -> Strength {
        strength_of(&self.expression, self.syntax)
    }

    pub fn is_unique(&self) -> bool {
        self.guarantee != Guarantee::BestEffort
    }
}

impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Candidate", 5)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("expression", &self.expression)?;
        state.serialize_field("syntax", &self.syntax)?;
        state.serialize_field("guarantee", &self.guarantee)?;
        state.serialize_field("strength", &self.strength())?;
        state.end()
    }
}

fn identifying_css() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Any attribute equality predicate pins the segment
        Regex::new(r"#|\[\s*[A-Za-z_][\w:-]*\s*[~|^$*]?=").expect("static css strength pattern")
    })
}

fn identifying_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"@({})\s*=", IDENTIFYING_ATTRIBUTES)).expect("static path strength pattern"))
}

fn positional_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\)\[[0-9]+\]").expect("static positional pattern"))
}

/// Remove quoted literals so predicates inside values are not mistaken for syntax
fn strip_quoted(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in expression.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q == '"' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                    out.push(c);
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

/// Expression with quoted literals and bracketed predicates removed
fn outline(expression: &str) -> String {
    let mut depth = 0usize;
    strip_quoted(expression)
        .chars()
        .filter(|c| match c {
            '[' | '(' if depth > 0 || *c == '[' => {
                depth += 1;
                false
            }
            ']' | ')' if depth > 0 => {
                depth -= 1;
                false
            }
            _ => depth == 0,
        })
        .collect()
}

pub fn strength_of(expression: &str, syntax: ExpressionKind) -> Strength {
    let bare = strip_quoted(expression);
    let strong = match syntax {
        ExpressionKind::Css => identifying_css().is_match(&bare),
        ExpressionKind::Path => identifying_path().is_match(&bare),
    };
    if strong { Strength::Strong } else { Strength::Weak }
}

impl CandidateKind {
    pub fn classify(expression: &str, syntax: ExpressionKind) -> Self {
        let bare = strip_quoted(expression);
        let shape = outline(expression);
        match syntax {
            ExpressionKind::Css => {
                let multi = shape.trim().contains([' ', '>', '+', '~']);
                if bare.contains(":nth-of-type(") || bare.contains(":nth-child(") {
                    Self::Positional
                } else if shape.starts_with('#') && !multi {
                    Self::Id
                } else if multi {
                    Self::Compound
                } else if bare.contains(":has-text(") || bare.contains(":contains(") {
                    Self::Text
                } else if shape.contains('.') {
                    Self::Class
                } else if bare.contains('[') {
                    Self::Attribute
                } else {
                    Self::Compound
                }
            }
            ExpressionKind::Path => {
                let steps = shape.trim_start_matches('(').trim_start_matches('.').trim_start_matches("//");
                let multi = steps.contains('/');
                if positional_path().is_match(&bare) {
                    Self::Positional
                } else if bare.starts_with("//*[@id=") && !multi {
                    Self::Id
                } else if multi {
                    Self::Compound
                } else if bare.contains("@class") {
                    Self::Class
                } else if bare.contains("normalize-space(") {
                    Self::Text
                } else if bare.contains('@') {
                    Self::Attribute
                } else {
                    Self::Compound
                }
            }
        }
    }
}

/// Quote `text` as an XPath string literal, falling back to `concat()` when
/// it contains both quote characters
pub fn escape_xpath_text(text: &str) -> String {
    if text.is_empty() {
        return "\"\"".to_string();
    }
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }
    format!("concat(\"{}\")", text.split('"').collect::<Vec<_>>().join("\", '\"', \""))
}

/// Escape an identifier for use after `#` or `.` in a selector
pub fn css_escape(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1F}' | '\u{7F}' => out.push_str(&format!("\\{:x} ", c as u32)),
            '0'..='9' if i == 0 || (i == 1 && chars[0] == '-') => out.push_str(&format!("\\{:x} ", c as u32)),
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Double-quoted CSS string literal
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Which of the two path passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Fast,
    Deep,
}

/// Shared state for one synthesis call: the oracle, the options, and a cache
/// of path segments already computed for this document.
pub struct Synthesizer<'d, D: Document + ?Sized> {
    oracle: Oracle<'d, D>,
    options: &'d SynthesisOptions,
    segments: RefCell<HashMap<(NodeId, bool), String>>,
}

impl<'d, D: Document + ?Sized> Synthesizer<'d, D> {
    pub fn new(doc: &'d D, context: Context, options: &'d SynthesisOptions) -> Self {
        Self { oracle: Oracle::new(doc, context), options, segments: RefCell::new(HashMap::new()) }
    }

    pub fn oracle(&self) -> &Oracle<'d, D> {
        &self.oracle
    }

    pub fn options(&self) -> &SynthesisOptions {
        self.options
    }

    pub fn tree(&self) -> &'d DomTree {
        self.oracle.tree()
    }

    pub(crate) fn volatile(&self, value: &str) -> bool {
        is_volatile_with(value, self.options.policy)
    }

    /// Whether `node` may take part in a path under the current context
    pub(crate) fn in_context(&self, node: NodeId) -> bool {
        match self.oracle.context() {
            Context::Document => true,
            Context::Sandbox(scope) => self.tree().is_descendant_of(node, scope),
        }
    }

    pub(crate) fn unique(&self, expression: &str, kind: ExpressionKind, target: NodeId) -> bool {
        self.oracle.is_unique(expression, kind, target)
    }
}

/// Nearest enclosing `iframe`/`frame` of `node`, inside `context`
pub fn enclosing_frame(tree: &DomTree, node: NodeId, context: Context) -> Option<NodeId> {
    tree.ancestors(node)
        .take_while(|a| match context {
            Context::Document => true,
            Context::Sandbox(scope) => *a != scope,
        })
        .find(|a| matches!(tree.tag(*a), "iframe" | "frame"))
}

/// Produce the full locator set for `target`, matching counts over the whole document
pub fn generate_locators<D: Document + ?Sized>(doc: &D, target: NodeId, options: &SynthesisOptions) -> Result<LocatorSet> {
    generate_locators_in(doc, target, Context::Document, options)
}

/// Produce the full locator set for `target` under an explicit base context.
///
/// When the target sits inside a frame, its locators are computed within the
/// frame's own document and the frame element gets its own selector in the
/// base context.
pub fn generate_locators_in<D: Document + ?Sized>(
    doc: &D,
    target: NodeId,
    context: Context,
    options: &SynthesisOptions,
) -> Result<LocatorSet> {
    let tree = doc.tree();
    if tree.get(target).is_none() {
        return Err(LocatorError::DetachedNode(target.0));
    }
    if let Context::Sandbox(scope) = context {
        if !tree.is_descendant_of(target, scope) {
            return Err(LocatorError::ElementNotFound(format!("node {} is outside sandbox {}", target, scope)));
        }
    }

    let frame = enclosing_frame(tree, target, context).map(|frame| {
        let outer = Synthesizer::new(doc, context, options);
        FrameBoundary::new(tree, frame, outer.synthesize_css(frame))
    });
    let scope = frame.as_ref().map_or(context, |f| Context::Sandbox(f.node));

    log::debug!("Synthesizing locators for <{}> node {} in {:?}", tree.tag(target), target, scope);
    let synth = Synthesizer::new(doc, scope, options);
    let css = synth.synthesize_css(target);
    let xpath = synth.synthesize_path(target);
    log::debug!("css {:?} {}, xpath {:?} {}", css.guarantee, css.expression, xpath.guarantee, xpath.expression);

    Ok(LocatorSet::assemble(&synth, target, css, xpath, frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xpath_text() {
        assert_eq!(escape_xpath_text("Save"), "'Save'");
        assert_eq!(escape_xpath_text("Don't"), "\"Don't\"");
        assert_eq!(escape_xpath_text(r#"say "don't""#), r#"concat("say ", '"', "don't", '"', "")"#);
        assert_eq!(escape_xpath_text(""), "\"\"");
    }

    #[test]
    fn test_css_escape() {
        assert_eq!(css_escape("save-btn"), "save-btn");
        assert_eq!(css_escape("1st"), "\\31 st");
        assert_eq!(css_escape("a.b:c"), "a\\.b\\:c");
        assert_eq!(css_escape("-"), "\\-");
        assert_eq!(css_string(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn test_strength() {
        assert_eq!(strength_of("#login", ExpressionKind::Css), Strength::Strong);
        assert_eq!(strength_of("form > input[name=\"user\"]", ExpressionKind::Css), Strength::Strong);
        assert_eq!(strength_of("div > span:nth-of-type(2)", ExpressionKind::Css), Strength::Weak);
        assert_eq!(strength_of("button[aria-label=\"Close dialog\"]", ExpressionKind::Css), Strength::Strong);
        assert_eq!(strength_of("li:has-text(\"#1 pick\")", ExpressionKind::Css), Strength::Weak);
        assert_eq!(strength_of("input[disabled]", ExpressionKind::Css), Strength::Weak);
        assert_eq!(strength_of("//div[@data-testid='row']//span", ExpressionKind::Path), Strength::Strong);
        assert_eq!(strength_of("//button[normalize-space(.)='Go']", ExpressionKind::Path), Strength::Weak);
        assert_eq!(strength_of("//a[@title='@id=x']", ExpressionKind::Path), Strength::Weak);
    }

    #[test]
    fn test_classify() {
        use ExpressionKind::{Css, Path};
        assert_eq!(CandidateKind::classify("#save", Css), CandidateKind::Id);
        assert_eq!(CandidateKind::classify("form > input", Css), CandidateKind::Compound);
        assert_eq!(CandidateKind::classify("li:nth-of-type(2)", Css), CandidateKind::Positional);
        assert_eq!(CandidateKind::classify("input[name=\"q\"]", Css), CandidateKind::Attribute);
        assert_eq!(CandidateKind::classify("//*[@id='save']", Path), CandidateKind::Id);
        assert_eq!(CandidateKind::classify("//button[normalize-space(.)='Go']", Path), CandidateKind::Text);
        assert_eq!(CandidateKind::classify("(//td)[2]", Path), CandidateKind::Positional);
        assert_eq!(CandidateKind::classify("//form//input[@name='q']", Path), CandidateKind::Compound);
        assert_eq!(CandidateKind::classify("//input[@name='a/b']", Path), CandidateKind::Attribute);
        assert_eq!(
            CandidateKind::classify("//span[contains(concat(' ', normalize-space(@class), ' '), ' tag ')]", Path),
            CandidateKind::Class
        );
    }

    #[test]
    fn test_candidate_serializes_strength() {
        let candidate = Candidate::new("#save", ExpressionKind::Css, Guarantee::Unique);
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["strength"], "strong");
        assert_eq!(json["kind"], "id");
        assert_eq!(json["syntax"], "css");

        let back: Candidate = serde_json::from_value(json).unwrap();
        assert_eq!(back, candidate);
    }

    #[test]
    fn test_detached_node_is_an_error() {
        let tree = DomTree::parse_html("<p>hi</p>").unwrap();
        let err = generate_locators(&tree, NodeId(999), &SynthesisOptions::default()).unwrap_err();
        assert!(matches!(err, LocatorError::DetachedNode(999)));
    }
}
