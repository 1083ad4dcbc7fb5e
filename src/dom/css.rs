//! CSS selector engine over a [`DomTree`].
//!
//! Supports the subset locator synthesis emits and the framework detectors use:
//!   tag, *              type and universal selectors
//!   #id, .class         with CSS escapes (`\31 23`, `\:`)
//!   [attr]              presence
//!   [attr=v]            also `~=`, `|=`, `^=`, `$=`, `*=` and an `i` flag
//!   :nth-child(an+b)    also `:nth-of-type`, `:first-child`, `:last-child`
//!   :not(list)          negation
//!   :has(rel)           relative selectors, optionally starting with `>`, `+` or `~`
//!   :has-text("t")      case-insensitive substring of normalized text
//!   :contains("t")      case-sensitive substring of normalized text
//!   a b, a > b, a + b, a ~ b, a, b

use crate::dom::tree::{DomTree, NodeId};
use crate::error::{LocatorError, Result};

/// Select all elements matching `selector`, in document order.
pub fn select(tree: &DomTree, selector: &str) -> Result<Vec<NodeId>> {
    let list = parse(selector)?;
    Ok(tree.ids().filter(|n| list.matches(tree, *n)).collect())
}

/// Check whether a single element matches `selector`.
pub fn matches(tree: &DomTree, node: NodeId, selector: &str) -> Result<bool> {
    Ok(parse(selector)?.matches(tree, node))
}

/// Parse a selector list
pub fn parse(selector: &str) -> Result<SelectorList> {
    let mut parser = Parser { chars: selector.chars().collect(), pos: 0, source: selector };
    let list = parser.selector_list(false)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(list)
}

// ─── Parsed Selector ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SelectorList(Vec<Complex>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

/// Compounds left to right; the combinator links a compound to the one before it.
#[derive(Debug, Clone)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone)]
struct AttrSelector {
    name: String,
    test: Option<(AttrOp, String)>,
    ignore_case: bool,
}

#[derive(Debug, Clone, Copy)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone)]
enum Pseudo {
    NthChild(Nth),
    NthOfType(Nth),
    LastChild,
    Not(SelectorList),
    Has(Vec<Complex>),
    HasText(String),
    Contains(String),
}

/// `an+b`
#[derive(Debug, Clone, Copy)]
struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    fn matches(&self, index: usize) -> bool {
        let index = index as i64;
        if self.a == 0 {
            return index == self.b;
        }
        let diff = index - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

// ─── Matching ───────────────────────────────────────────────────────────────

impl SelectorList {
    pub fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.0.iter().any(|c| c.matches_at(tree, node, c.parts.len() - 1, None))
    }
}

impl Complex {
    /// Match `parts[..=index]` with `parts[index]` on `node`. For relative
    /// selectors, `anchor` is the `:has` subject the leftmost part must relate to.
    fn matches_at(&self, tree: &DomTree, node: NodeId, index: usize, anchor: Option<NodeId>) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(tree, node) {
            return false;
        }
        if index == 0 {
            return match anchor {
                Some(subject) => related(tree, node, subject, *combinator),
                None => true,
            };
        }

        match combinator {
            Combinator::Child => tree.parent(node).is_some_and(|p| self.matches_at(tree, p, index - 1, anchor)),
            Combinator::Descendant => tree.ancestors(node).any(|a| self.matches_at(tree, a, index - 1, anchor)),
            Combinator::Adjacent => {
                previous_siblings(tree, node).next().is_some_and(|s| self.matches_at(tree, s, index - 1, anchor))
            }
            Combinator::Sibling => previous_siblings(tree, node).any(|s| self.matches_at(tree, s, index - 1, anchor)),
        }
    }

    fn matches_relative(&self, tree: &DomTree, subject: NodeId) -> bool {
        let last = self.parts.len() - 1;
        let leading = self.parts[0].0;
        let mut candidates: Box<dyn Iterator<Item = NodeId>> = match leading {
            Combinator::Descendant | Combinator::Child => Box::new(tree.descendants(subject)),
            Combinator::Adjacent | Combinator::Sibling => {
                let start = subject.0 + 1;
                Box::new((start..tree.len()).map(NodeId))
            }
        };
        candidates.any(|c| self.matches_at(tree, c, last, Some(subject)))
    }
}

fn related(tree: &DomTree, node: NodeId, subject: NodeId, combinator: Combinator) -> bool {
    match combinator {
        Combinator::Descendant => tree.is_descendant_of(node, subject),
        Combinator::Child => tree.parent(node) == Some(subject),
        Combinator::Adjacent => previous_siblings(tree, node).next() == Some(subject),
        Combinator::Sibling => previous_siblings(tree, node).any(|s| s == subject),
    }
}

fn previous_siblings(tree: &DomTree, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    let siblings = tree.siblings(node);
    let position = siblings.iter().position(|s| *s == node).unwrap_or(0);
    siblings[..position].iter().rev().copied()
}

impl Compound {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let data = tree.node(node);
        if let Some(tag) = &self.tag {
            if !data.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if self.ids.iter().any(|id| data.attr("id") != Some(id.as_str())) {
            return false;
        }
        if self.classes.iter().any(|c| !data.has_class(c)) {
            return false;
        }
        if !self.attrs.iter().all(|a| a.matches(data.attr(&a.name))) {
            return false;
        }
        self.pseudos.iter().all(|p| p.matches(tree, node))
    }
}

impl AttrSelector {
    fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let Some((op, expected)) = &self.test else {
            return true;
        };
        let (value, expected) = if self.ignore_case {
            (value.to_lowercase(), expected.to_lowercase())
        } else {
            (value.to_string(), expected.clone())
        };
        match op {
            AttrOp::Equals => value == expected,
            AttrOp::Includes => value.split_ascii_whitespace().any(|t| t == expected),
            AttrOp::DashMatch => value == expected || value.starts_with(&format!("{}-", expected)),
            AttrOp::Prefix => !expected.is_empty() && value.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && value.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && value.contains(&expected),
        }
    }
}

impl Pseudo {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        match self {
            Pseudo::NthChild(nth) => nth.matches(tree.child_index(node)),
            Pseudo::NthOfType(nth) => nth.matches(tree.index_of_type(node)),
            Pseudo::LastChild => tree.siblings(node).last() == Some(&node),
            Pseudo::Not(list) => !list.matches(tree, node),
            Pseudo::Has(relatives) => relatives.iter().any(|r| r.matches_relative(tree, node)),
            Pseudo::HasText(text) => tree.text(node).to_lowercase().contains(&text.to_lowercase()),
            Pseudo::Contains(text) => tree.text(node).contains(text.as_str()),
        }
    }
}

// ─── Selector Parsing ───────────────────────────────────────────────────────

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> LocatorError {
        LocatorError::invalid(self.source, format!("{} at offset {}", reason, self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, c: char) -> Result<()> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn selector_list(&mut self, relative: bool) -> Result<SelectorList> {
        let mut complexes = vec![self.complex(relative)?];
        loop {
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
                complexes.push(self.complex(relative)?);
            } else {
                return Ok(SelectorList(complexes));
            }
        }
    }

    fn combinator_char(c: char) -> Option<Combinator> {
        match c {
            '>' => Some(Combinator::Child),
            '+' => Some(Combinator::Adjacent),
            '~' => Some(Combinator::Sibling),
            _ => None,
        }
    }

    fn complex(&mut self, relative: bool) -> Result<Complex> {
        self.skip_ws();
        let mut leading = Combinator::Descendant;
        if relative {
            if let Some(c) = self.peek().and_then(Self::combinator_char) {
                self.pos += 1;
                self.skip_ws();
                leading = c;
            }
        }

        let mut parts = vec![(leading, self.compound()?)];
        loop {
            let had_ws = self.skip_ws();
            let next = match self.peek() {
                None | Some(',') | Some(')') => break,
                Some(c) => c,
            };
            let combinator = match Self::combinator_char(next) {
                Some(c) => {
                    self.pos += 1;
                    self.skip_ws();
                    c
                }
                None if had_ws => Combinator::Descendant,
                None => return Err(self.error("expected combinator")),
            };
            parts.push((combinator, self.compound()?));
        }
        Ok(Complex { parts })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(c) if is_ident_start(c) || c == '\\' => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrSelector> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();

        let op = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.pos += 1;
                return Ok(AttrSelector { name, test: None, ignore_case: false });
            }
            (Some('='), _) => {
                self.pos += 1;
                AttrOp::Equals
            }
            (Some(c), Some('=')) => {
                let op = match c {
                    '~' => AttrOp::Includes,
                    '|' => AttrOp::DashMatch,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Substring,
                    _ => return Err(self.error("unknown attribute operator")),
                };
                self.pos += 2;
                op
            }
            _ => return Err(self.error("malformed attribute selector")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some('"') | Some('\'') => self.string()?,
            _ => self.ident()?,
        };
        self.skip_ws();
        let mut ignore_case = false;
        if matches!(self.peek(), Some('i') | Some('I')) {
            self.pos += 1;
            ignore_case = true;
        } else if matches!(self.peek(), Some('s') | Some('S')) {
            self.pos += 1;
        }
        self.expect(']')?;
        Ok(AttrSelector { name, test: Some((op, value)), ignore_case })
    }

    fn pseudo(&mut self) -> Result<Pseudo> {
        let name = self.ident()?.to_ascii_lowercase();
        let pseudo = match name.as_str() {
            "first-child" => return Ok(Pseudo::NthChild(Nth { a: 0, b: 1 })),
            "last-child" => return Ok(Pseudo::LastChild),
            "first-of-type" => return Ok(Pseudo::NthOfType(Nth { a: 0, b: 1 })),
            "nth-child" | "nth-of-type" => {
                self.expect('(')?;
                let nth = self.nth()?;
                if name == "nth-child" { Pseudo::NthChild(nth) } else { Pseudo::NthOfType(nth) }
            }
            "not" => {
                self.expect('(')?;
                Pseudo::Not(self.selector_list(false)?)
            }
            "has" => {
                self.expect('(')?;
                Pseudo::Has(self.selector_list(true)?.0)
            }
            "has-text" | "contains" => {
                self.expect('(')?;
                self.skip_ws();
                let text = match self.peek() {
                    Some('"') | Some('\'') => self.string()?,
                    _ => self.ident()?,
                };
                if name == "has-text" { Pseudo::HasText(text) } else { Pseudo::Contains(text) }
            }
            _ => return Err(self.error(&format!("unsupported pseudo-class ':{}'", name))),
        };
        self.expect(')')?;
        Ok(pseudo)
    }

    fn nth(&mut self) -> Result<Nth> {
        self.skip_ws();
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            if c == ')' {
                break;
            }
            if !c.is_whitespace() {
                raw.push(c.to_ascii_lowercase());
            }
            self.pos += 1;
        }

        match raw.as_str() {
            "odd" => return Ok(Nth { a: 2, b: 1 }),
            "even" => return Ok(Nth { a: 2, b: 0 }),
            _ => {}
        }
        let parse_int = |s: &str| -> Option<i64> {
            match s {
                "" | "+" => Some(1),
                "-" => Some(-1),
                _ => s.parse().ok(),
            }
        };
        let nth = match raw.split_once('n') {
            Some((a, b)) => {
                let b = if b.is_empty() { Some(0) } else { b.parse().ok() };
                parse_int(a).zip(b).map(|(a, b)| Nth { a, b })
            }
            None => raw.parse().ok().map(|b| Nth { a: 0, b }),
        };
        nth.ok_or_else(|| self.error("malformed nth expression"))
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.error("expected string"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    out.push(self.escape()?);
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
    }

    fn ident(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.escape()?);
            } else if is_ident_char(c) {
                self.pos += 1;
                out.push(c);
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(out)
    }

    /// Decode the escape after a backslash: up to six hex digits plus one optional space, or a literal char
    fn escape(&mut self) -> Result<char> {
        let mut hex = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit() && hex.len() < 6) {
            hex.push(c);
            self.pos += 1;
        }
        if hex.is_empty() {
            let c = self.peek().ok_or_else(|| self.error("dangling escape"))?;
            self.pos += 1;
            return Ok(c);
        }
        if self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let code = u32::from_str_radix(&hex, 16).map_err(|_| self.error("bad escape"))?;
        Ok(char::from_u32(code).filter(|c| *c != '\0').unwrap_or('\u{FFFD}'))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DomTree {
        DomTree::parse_html(
            r#"<form id="login" class="card wide">
                 <label for="user">User name</label>
                 <input id="user" name="username" type="text" data-testid="user-input">
                 <input name="password" type="password">
                 <button type="submit" aria-label="Sign in">Sign in</button>
               </form>
               <div role="row" row-id="a"><div role="gridcell">Alpha</div></div>
               <div role="row" row-id="b"><div role="gridcell">Beta</div></div>
               <span id="123">numeric</span>"#,
        )
        .unwrap()
    }

    fn count(tree: &DomTree, selector: &str) -> usize {
        select(tree, selector).unwrap().len()
    }

    #[test]
    fn test_basic_selectors() {
        let tree = tree();
        assert_eq!(count(&tree, "input"), 2);
        assert_eq!(count(&tree, "#login"), 1);
        assert_eq!(count(&tree, ".card.wide"), 1);
        assert_eq!(count(&tree, "form.card > input[name=\"username\"]"), 1);
        assert_eq!(count(&tree, "form button"), 1);
        assert_eq!(count(&tree, "*"), tree.len());
    }

    #[test]
    fn test_attribute_operators() {
        let tree = tree();
        assert_eq!(count(&tree, "[data-testid]"), 1);
        assert_eq!(count(&tree, "[class~=\"wide\"]"), 1);
        assert_eq!(count(&tree, "[name^=pass]"), 1);
        assert_eq!(count(&tree, "[name$=\"name\"]"), 1);
        assert_eq!(count(&tree, "[type*=ss]"), 1);
        assert_eq!(count(&tree, "[aria-label=\"sign in\" i]"), 1);
    }

    #[test]
    fn test_positional_pseudos() {
        let tree = tree();
        assert_eq!(count(&tree, "form > input:nth-of-type(2)"), 1);
        assert_eq!(count(&tree, "form > :nth-child(1)"), 1);
        assert_eq!(count(&tree, "[role=\"row\"]:nth-child(2n)"), 1);
        assert_eq!(count(&tree, "form > :last-child"), 1);
    }

    #[test]
    fn test_has_and_text_pseudos() {
        let tree = tree();
        assert_eq!(count(&tree, "[role=\"row\"]:has([role=\"gridcell\"]:has-text(\"beta\"))"), 1);
        assert_eq!(count(&tree, "form:has(> button)"), 1);
        assert_eq!(count(&tree, "div:has(> span)"), 0);
        assert_eq!(count(&tree, "button:contains(\"Sign\")"), 1);
        assert_eq!(count(&tree, "button:contains(\"sign\")"), 0);
        assert_eq!(count(&tree, "input:not([type=\"password\"])"), 1);
    }

    #[test]
    fn test_sibling_combinators() {
        let tree = tree();
        assert_eq!(count(&tree, "label + input"), 1);
        assert_eq!(count(&tree, "label ~ input"), 2);
    }

    #[test]
    fn test_escaped_identifiers() {
        let tree = tree();
        assert_eq!(count(&tree, "#\\31 23"), 1);
        assert_eq!(count(&tree, "#\\31\\32\\33"), 1);
    }

    #[test]
    fn test_selector_list() {
        let tree = tree();
        assert_eq!(count(&tree, "label, button"), 2);
    }

    #[test]
    fn test_invalid_selectors_error() {
        let tree = tree();
        assert!(select(&tree, "div[").is_err());
        assert!(select(&tree, "div:unknown").is_err());
        assert!(select(&tree, "").is_err());
        assert!(matches!(select(&tree, ">>"), Err(LocatorError::InvalidExpression { .. })));
    }
}
