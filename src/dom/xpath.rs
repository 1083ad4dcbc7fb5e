//! XPath 1.0 subset evaluator over a [`DomTree`].
//!
//! Covers what generated locators use: location paths on the element axes
//! (`child`, `descendant`, `descendant-or-self`, `self`, `parent`, `ancestor`,
//! `ancestor-or-self`, `following-sibling`, `preceding-sibling`, `following`,
//! `preceding`, `attribute`), the `//`, `.`, `..` and `@` abbreviations,
//! positional and boolean predicates, filter expressions such as `(//td)[2]`,
//! unions, `and`/`or`, comparisons and a small function library.
//!
//! Text nodes are not modelled; an element's string-value is its text content.

use crate::dom::tree::{DomTree, NodeId, is_xml_whitespace, normalize_whitespace};
use crate::error::{LocatorError, Result};
use std::cmp::Ordering;

/// Evaluate `expression` and return the matched elements in document order.
///
/// `context` is the context node; `None` means the document root.
pub fn evaluate(tree: &DomTree, expression: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
    let expr = parse(expression)?;
    let start = context.map_or(XNode::Root, XNode::Element);
    let evaluator = Evaluator { tree, source: expression };
    match evaluator.eval(&expr, &Focus { node: start, position: 1, size: 1 })? {
        Value::Nodes(nodes) => Ok(nodes
            .into_iter()
            .filter_map(|n| match n {
                XNode::Element(id) => Some(id),
                _ => None,
            })
            .collect()),
        _ => Err(LocatorError::invalid(expression, "expression does not select nodes")),
    }
}

// ─── AST ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    Filter { primary: Box<Expr>, predicates: Vec<Expr>, steps: Vec<Step> },
    Literal(String),
    Number(f64),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
enum NodeTest {
    Name(String),
    Any,
    Node,
}

// ─── Tokenizer ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    Pipe,
    ColonColon,
    Star,
    Op(CompareOp),
    Literal(String),
    Number(f64),
    Name(String),
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
                continue;
            }
            '/' => tokens.push(Token::Slash),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            '@' => tokens.push(Token::At),
            ',' => tokens.push(Token::Comma),
            '|' => tokens.push(Token::Pipe),
            '*' => tokens.push(Token::Star),
            '=' => tokens.push(Token::Op(CompareOp::Eq)),
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
                continue;
            }
            '<' | '>' => {
                let (op, width) = match (c, next) {
                    ('<', Some('=')) => (CompareOp::Le, 2),
                    ('<', _) => (CompareOp::Lt, 1),
                    ('>', Some('=')) => (CompareOp::Ge, 2),
                    _ => (CompareOp::Gt, 1),
                };
                tokens.push(Token::Op(op));
                i += width;
                continue;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::ColonColon);
                i += 2;
                continue;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
                continue;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => tokens.push(Token::Dot),
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| LocatorError::invalid(source, "unterminated string literal"))?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse().map_err(|_| LocatorError::invalid(source, "malformed number"))?;
                tokens.push(Token::Number(value));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '.')) {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
                continue;
            }
            _ => return Err(LocatorError::invalid(source, format!("unexpected character '{}'", c))),
        }
        i += 1;
    }
    Ok(tokens)
}

// ─── Parser ─────────────────────────────────────────────────────────────────

fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, source };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("unexpected trailing tokens"));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> LocatorError {
        LocatorError::invalid(self.source, format!("{} at token {}", reason, self.pos))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) { Ok(()) } else { Err(self.error(&format!("expected {:?}", token))) }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            left = Expr::Or(Box::new(left), Box::new(self.and_expr()?));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.compare_expr()?;
        while self.eat_keyword("and") {
            left = Expr::And(Box::new(left), Box::new(self.compare_expr()?));
        }
        Ok(left)
    }

    fn compare_expr(&mut self) -> Result<Expr> {
        let mut left = self.union_expr()?;
        while let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            left = Expr::Compare(op, Box::new(left), Box::new(self.union_expr()?));
        }
        Ok(left)
    }

    fn union_expr(&mut self) -> Result<Expr> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            left = Expr::Union(Box::new(left), Box::new(self.path_expr()?));
        }
        Ok(left)
    }

    fn starts_primary(&self) -> bool {
        match self.peek() {
            Some(Token::LParen) | Some(Token::Literal(_)) | Some(Token::Number(_)) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !matches!(name.as_str(), "node" | "text")
            }
            _ => false,
        }
    }

    fn path_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() { self.relative_steps()? } else { Vec::new() };
                Ok(Expr::Path { absolute: true, steps })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.relative_steps()?);
                Ok(Expr::Path { absolute: true, steps })
            }
            _ if self.starts_primary() => {
                let primary = self.primary()?;
                let predicates = self.predicates()?;
                let mut steps = Vec::new();
                if self.eat(&Token::Slash) {
                    steps = self.relative_steps()?;
                } else if self.eat(&Token::DoubleSlash) {
                    steps.push(descendant_or_self());
                    steps.extend(self.relative_steps()?);
                }
                if predicates.is_empty() && steps.is_empty() {
                    Ok(primary)
                } else {
                    Ok(Expr::Filter { primary: Box::new(primary), predicates, steps })
                }
            }
            _ => Ok(Expr::Path { absolute: false, steps: self.relative_steps()? }),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_)) | Some(Token::Star) | Some(Token::At) | Some(Token::Dot) | Some(Token::DotDot)
        )
    }

    fn relative_steps(&mut self) -> Result<Vec<Step>> {
        let mut steps = vec![self.step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step { axis: Axis::SelfAxis, test: NodeTest::Node, predicates: Vec::new() });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step { axis: Axis::Parent, test: NodeTest::Node, predicates: Vec::new() });
        }

        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if let (Some(Token::Name(name)), Some(Token::ColonColon)) = (self.peek(), self.peek_at(1)) {
            axis = Axis::from_name(name).ok_or_else(|| self.error(&format!("unknown axis '{}'", name)))?;
            self.pos += 2;
        }

        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::Any
            }
            Some(Token::Name(name)) if name == "node" && self.peek_at(1) == Some(&Token::LParen) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                self.expect(&Token::RParen)?;
                NodeTest::Node
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                NodeTest::Name(name.to_ascii_lowercase())
            }
            _ => return Err(self.error("expected node test")),
        };

        Ok(Step { axis, test, predicates: self.predicates()? })
    }

    fn predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Literal(text)) => {
                self.pos += 1;
                Ok(Expr::Literal(text))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            _ => Err(self.error("expected expression")),
        }
    }
}

fn descendant_or_self() -> Step {
    Step { axis: Axis::DescendantOrSelf, test: NodeTest::Node, predicates: Vec::new() }
}

// ─── Evaluation ─────────────────────────────────────────────────────────────

/// Node in the XPath data model: the document root, an element, or an attribute (owner, index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum XNode {
    Root,
    Element(NodeId),
    Attribute(NodeId, usize),
}

impl XNode {
    fn order_key(&self) -> (usize, usize) {
        match self {
            XNode::Root => (0, 0),
            XNode::Element(id) => (id.0 + 1, 0),
            XNode::Attribute(id, index) => (id.0 + 1, index + 1),
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<XNode>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Focus {
    node: XNode,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    tree: &'a DomTree,
    source: &'a str,
}

impl Evaluator<'_> {
    fn error(&self, reason: impl Into<String>) -> LocatorError {
        LocatorError::invalid(self.source, reason)
    }

    fn eval(&self, expr: &Expr, focus: &Focus) -> Result<Value> {
        match expr {
            Expr::Or(l, r) => {
                Ok(Value::Bool(self.boolean(&self.eval(l, focus)?) || self.boolean(&self.eval(r, focus)?)))
            }
            Expr::And(l, r) => {
                Ok(Value::Bool(self.boolean(&self.eval(l, focus)?) && self.boolean(&self.eval(r, focus)?)))
            }
            Expr::Compare(op, l, r) => {
                let (l, r) = (self.eval(l, focus)?, self.eval(r, focus)?);
                Ok(Value::Bool(self.compare(*op, &l, &r)))
            }
            Expr::Union(l, r) => match (self.eval(l, focus)?, self.eval(r, focus)?) {
                (Value::Nodes(mut a), Value::Nodes(b)) => {
                    a.extend(b);
                    sort_document_order(&mut a);
                    Ok(Value::Nodes(a))
                }
                _ => Err(self.error("union of non-node-sets")),
            },
            Expr::Path { absolute, steps } => {
                let start = if *absolute { XNode::Root } else { focus.node };
                Ok(Value::Nodes(self.apply_steps(vec![start], steps)?))
            }
            Expr::Filter { primary, predicates, steps } => {
                let Value::Nodes(mut nodes) = self.eval(primary, focus)? else {
                    return Err(self.error("predicate applied to a non-node-set"));
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(Value::Nodes(self.apply_steps(nodes, steps)?))
            }
            Expr::Literal(text) => Ok(Value::Str(text.clone())),
            Expr::Number(value) => Ok(Value::Num(*value)),
            Expr::Call(name, args) => self.call(name, args, focus),
        }
    }

    fn apply_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut selected: Vec<XNode> =
                    self.axis(*node, step.axis).into_iter().filter(|n| self.test(*n, &step.test, step.axis)).collect();
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            sort_document_order(&mut next);
            nodes = next;
        }
        Ok(nodes)
    }

    /// Keep nodes for which `predicate` holds; positions follow the order of `nodes`.
    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let focus = Focus { node, position: index + 1, size };
            let keep = match self.eval(predicate, &focus)? {
                Value::Num(n) => (index + 1) as f64 == n,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis`, in axis order (reverse document order for reverse axes)
    fn axis(&self, node: XNode, axis: Axis) -> Vec<XNode> {
        let tree = self.tree;
        let elements = |ids: Vec<NodeId>| ids.into_iter().map(XNode::Element).collect::<Vec<_>>();

        let id = match node {
            XNode::Root => {
                let all = || elements(tree.ids().collect());
                return match axis {
                    Axis::Child if !tree.is_empty() => vec![XNode::Element(tree.root_id())],
                    Axis::Descendant | Axis::Following => all(),
                    Axis::DescendantOrSelf => std::iter::once(XNode::Root).chain(all()).collect(),
                    Axis::SelfAxis | Axis::AncestorOrSelf => vec![XNode::Root],
                    _ => Vec::new(),
                };
            }
            XNode::Attribute(owner, _) => {
                return match axis {
                    Axis::Parent => vec![XNode::Element(owner)],
                    Axis::SelfAxis => vec![node],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = if axis == Axis::AncestorOrSelf { vec![node] } else { Vec::new() };
                        out.push(XNode::Element(owner));
                        out.extend(tree.ancestors(owner).map(XNode::Element));
                        out.push(XNode::Root);
                        out
                    }
                    _ => Vec::new(),
                };
            }
            XNode::Element(id) => id,
        };

        let parent = || tree.parent(id).map_or(XNode::Root, XNode::Element);
        match axis {
            Axis::Child => elements(tree.children(id).to_vec()),
            Axis::Descendant => elements(tree.descendants(id).collect()),
            Axis::DescendantOrSelf => std::iter::once(node).chain(tree.descendants(id).map(XNode::Element)).collect(),
            Axis::SelfAxis => vec![node],
            Axis::Parent => vec![parent()],
            Axis::Ancestor | Axis::AncestorOrSelf => {
                let mut out = if axis == Axis::AncestorOrSelf { vec![node] } else { Vec::new() };
                out.extend(tree.ancestors(id).map(XNode::Element));
                out.push(XNode::Root);
                out
            }
            Axis::FollowingSibling => {
                let siblings = tree.siblings(id);
                let position = siblings.iter().position(|s| *s == id).unwrap_or(0);
                elements(siblings[position + 1..].to_vec())
            }
            Axis::PrecedingSibling => {
                let siblings = tree.siblings(id);
                let position = siblings.iter().position(|s| *s == id).unwrap_or(0);
                elements(siblings[..position].iter().rev().copied().collect())
            }
            Axis::Following => {
                let end = tree.descendants(id).last().map_or(id.0 + 1, |last| last.0 + 1);
                elements((end..tree.len()).map(NodeId).collect())
            }
            Axis::Preceding => {
                let ancestors: Vec<NodeId> = tree.ancestors(id).collect();
                elements((0..id.0).rev().map(NodeId).filter(|n| !ancestors.contains(n)).collect())
            }
            Axis::Attribute => (0..tree.node(id).attributes.len()).map(|i| XNode::Attribute(id, i)).collect(),
        }
    }

    fn test(&self, node: XNode, test: &NodeTest, axis: Axis) -> bool {
        match (test, node) {
            (NodeTest::Node, _) => true,
            (NodeTest::Any, XNode::Element(_)) => axis != Axis::Attribute,
            (NodeTest::Any, XNode::Attribute(..)) => axis == Axis::Attribute,
            (NodeTest::Name(name), XNode::Element(id)) => axis != Axis::Attribute && self.tree.tag(id) == name,
            (NodeTest::Name(name), XNode::Attribute(owner, index)) => self
                .tree
                .node(owner)
                .attributes
                .get_index(index)
                .is_some_and(|(key, _)| key.eq_ignore_ascii_case(name)),
            (_, XNode::Root) => false,
        }
    }

    fn string_value(&self, node: XNode) -> String {
        match node {
            XNode::Root if self.tree.is_empty() => String::new(),
            XNode::Root => self.tree.node(self.tree.root_id()).raw_text.clone(),
            XNode::Element(id) => self.tree.node(id).raw_text.clone(),
            XNode::Attribute(owner, index) => {
                self.tree.node(owner).attributes.get_index(index).map(|(_, v)| v.clone()).unwrap_or_default()
            }
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes.first().map(|n| self.string_value(*n)).unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => self.string(other).trim_matches(is_xml_whitespace).parse().unwrap_or(f64::NAN),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn compare(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let xs = self.string_value(*x);
                b.iter().any(|y| self.compare_atoms(op, &Value::Str(xs.clone()), &Value::Str(self.string_value(*y))))
            }),
            (Value::Nodes(nodes), other) => {
                if let Value::Bool(_) = other {
                    return self.compare_atoms(op, &Value::Bool(!nodes.is_empty()), other);
                }
                nodes.iter().any(|n| self.compare_atoms(op, &Value::Str(self.string_value(*n)), other))
            }
            (other, Value::Nodes(nodes)) => {
                if let Value::Bool(_) = other {
                    return self.compare_atoms(op, other, &Value::Bool(!nodes.is_empty()));
                }
                nodes.iter().any(|n| self.compare_atoms(op, other, &Value::Str(self.string_value(*n))))
            }
            _ => self.compare_atoms(op, left, right),
        }
    }

    fn compare_atoms(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match op {
            CompareOp::Eq | CompareOp::Ne => {
                let equal = match (left, right) {
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => self.boolean(left) == self.boolean(right),
                    (Value::Num(_), _) | (_, Value::Num(_)) => self.number(left) == self.number(right),
                    _ => self.string(left) == self.string(right),
                };
                equal == (op == CompareOp::Eq)
            }
            _ => {
                let ordering = self.number(left).partial_cmp(&self.number(right));
                match op {
                    CompareOp::Lt => ordering == Some(Ordering::Less),
                    CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    CompareOp::Gt => ordering == Some(Ordering::Greater),
                    _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                }
            }
        }
    }

    fn call(&self, name: &str, args: &[Expr], focus: &Focus) -> Result<Value> {
        let arity = |min: usize, max: usize| -> Result<()> {
            if args.len() < min || args.len() > max {
                Err(self.error(format!("{}() takes {}..{} arguments, got {}", name, min, max, args.len())))
            } else {
                Ok(())
            }
        };
        let arg_string = |index: usize| -> Result<String> {
            match args.get(index) {
                Some(arg) => Ok(self.string(&self.eval(arg, focus)?)),
                None => Ok(self.string_value(focus.node)),
            }
        };

        match name {
            "normalize-space" => {
                arity(0, 1)?;
                Ok(Value::Str(normalize_whitespace(&arg_string(0)?)))
            }
            "string" => {
                arity(0, 1)?;
                Ok(Value::Str(arg_string(0)?))
            }
            "contains" => {
                arity(2, 2)?;
                Ok(Value::Bool(arg_string(0)?.contains(&arg_string(1)?)))
            }
            "starts-with" => {
                arity(2, 2)?;
                Ok(Value::Bool(arg_string(0)?.starts_with(&arg_string(1)?)))
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(self.error("concat() needs at least two arguments"));
                }
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&arg_string(index)?);
                }
                Ok(Value::Str(out))
            }
            "string-length" => {
                arity(0, 1)?;
                Ok(Value::Num(arg_string(0)?.chars().count() as f64))
            }
            "not" => {
                arity(1, 1)?;
                Ok(Value::Bool(!self.boolean(&self.eval(&args[0], focus)?)))
            }
            "boolean" => {
                arity(1, 1)?;
                Ok(Value::Bool(self.boolean(&self.eval(&args[0], focus)?)))
            }
            "count" => {
                arity(1, 1)?;
                match self.eval(&args[0], focus)? {
                    Value::Nodes(nodes) => Ok(Value::Num(nodes.len() as f64)),
                    _ => Err(self.error("count() expects a node-set")),
                }
            }
            "position" => {
                arity(0, 0)?;
                Ok(Value::Num(focus.position as f64))
            }
            "last" => {
                arity(0, 0)?;
                Ok(Value::Num(focus.size as f64))
            }
            "true" => {
                arity(0, 0)?;
                Ok(Value::Bool(true))
            }
            "false" => {
                arity(0, 0)?;
                Ok(Value::Bool(false))
            }
            _ => Err(self.error(format!("unsupported function {}()", name))),
        }
    }
}

fn sort_document_order(nodes: &mut Vec<XNode>) {
    nodes.sort_by_key(XNode::order_key);
    nodes.dedup();
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() { format!("{}", n as i64) } else { n.to_string() }
}
