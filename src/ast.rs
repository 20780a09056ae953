//! Pattern AST with lookaround nodes
//!
//! Lookaround-free spans of a pattern are parsed by `regex-syntax` and kept
//! as opaque [`Hir`] leaves; the structural nodes here exist only to host the
//! four assertion forms (and the alternation/grouping/repetition skeleton
//! around them). Simplification re-folds structure back into `Hir` leaves
//! wherever no assertion remains, so a simplified AST keeps assertions at the
//! shallowest possible positions.

use std::fmt;

use regex_syntax::hir::{self, Hir, HirKind};

/// Which way an assertion scans from the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lookahead: the body must match starting at the cursor
    Ahead,
    /// Lookbehind: the body must match ending exactly at the cursor
    Behind,
}

/// Whether the assertion body must match or must not match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// A zero-width lookaround assertion wrapping exactly one sub-pattern
///
/// The node never consumes input; it contributes zero to the minimum and
/// maximum match length of its containing pattern.
#[derive(Debug, Clone)]
pub struct AssertionNode {
    pub direction: Direction,
    pub polarity: Polarity,
    pub sub: Box<Ast>,
    /// Byte offset of the opening `(` in the original pattern, kept for
    /// error reporting. Not part of structural equality.
    pub offset: usize,
}

impl AssertionNode {
    /// The surface opener for this assertion, without the leading `(`
    pub fn opener(&self) -> &'static str {
        match (self.direction, self.polarity) {
            (Direction::Ahead, Polarity::Positive) => "?=",
            (Direction::Ahead, Polarity::Negative) => "?!",
            (Direction::Behind, Polarity::Positive) => "?<=",
            (Direction::Behind, Polarity::Negative) => "?<!",
        }
    }
}

impl PartialEq for AssertionNode {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction
            && self.polarity == other.polarity
            && self.sub == other.sub
    }
}

impl Eq for AssertionNode {}

/// A pattern AST node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    /// Matches the empty string
    Empty,
    /// A lookaround-free span, parsed by the general parser
    Plain(Hir),
    /// Concatenation; ordering is significant
    Concat(Vec<Ast>),
    /// Alternation of two or more branches
    Alternation(Vec<Ast>),
    /// Repetition of a sub-pattern that contains an assertion somewhere
    /// (repetition over plain spans lives inside `Plain`)
    Repeat {
        sub: Box<Ast>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
    /// A lookaround assertion
    Assertion(AssertionNode),
}

impl Ast {
    /// Recursively simplify the AST
    ///
    /// Flattens nested concatenation and alternation, drops empties, folds
    /// assertion-free structure back into single `Hir` leaves, and reduces
    /// repetition over a zero-width assertion (`(?=a)+` asserts exactly as
    /// much as `(?=a)`; `(?=a)*` asserts nothing at all). Assertion direction
    /// and polarity are never changed.
    pub fn simplify(self) -> Ast {
        match self {
            Ast::Empty => Ast::Empty,
            Ast::Plain(hir) => {
                if matches!(hir.kind(), HirKind::Empty) {
                    Ast::Empty
                } else {
                    Ast::Plain(hir)
                }
            }
            Ast::Concat(children) => simplify_concat(children),
            Ast::Alternation(branches) => simplify_alternation(branches),
            Ast::Repeat {
                sub,
                min,
                max,
                greedy,
            } => simplify_repeat(sub.simplify(), min, max, greedy),
            Ast::Assertion(node) => Ast::Assertion(AssertionNode {
                sub: Box::new(node.sub.simplify()),
                ..node
            }),
        }
    }

    /// True if the node or any descendant is an assertion
    pub fn contains_assertion(&self) -> bool {
        match self {
            Ast::Empty | Ast::Plain(_) => false,
            Ast::Concat(children) | Ast::Alternation(children) => {
                children.iter().any(Ast::contains_assertion)
            }
            Ast::Repeat { sub, .. } => sub.contains_assertion(),
            Ast::Assertion(_) => true,
        }
    }
}

fn simplify_concat(children: Vec<Ast>) -> Ast {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child.simplify() {
            Ast::Empty => {}
            Ast::Concat(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    // Adjacent plain spans fold into one leaf.
    let mut merged: Vec<Ast> = Vec::with_capacity(flat.len());
    for node in flat {
        match (merged.last_mut(), node) {
            (Some(Ast::Plain(prev)), Ast::Plain(hir)) => {
                let lhs = std::mem::replace(prev, Hir::empty());
                *prev = Hir::concat(vec![lhs, hir]);
            }
            (_, node) => merged.push(node),
        }
    }
    match merged.len() {
        0 => Ast::Empty,
        1 => merged.pop().unwrap(),
        _ => Ast::Concat(merged),
    }
}

fn simplify_alternation(branches: Vec<Ast>) -> Ast {
    let mut flat = Vec::with_capacity(branches.len());
    for branch in branches {
        match branch.simplify() {
            Ast::Alternation(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    if flat.len() == 1 {
        return flat.pop().unwrap();
    }
    if flat.iter().all(|b| matches!(b, Ast::Plain(_) | Ast::Empty)) {
        let hirs = flat
            .into_iter()
            .map(|b| match b {
                Ast::Plain(hir) => hir,
                _ => Hir::empty(),
            })
            .collect();
        return Ast::Plain(Hir::alternation(hirs));
    }
    Ast::Alternation(flat)
}

fn simplify_repeat(sub: Ast, min: u32, max: Option<u32>, greedy: bool) -> Ast {
    if max == Some(0) {
        return Ast::Empty;
    }
    if (min, max) == (1, Some(1)) {
        return sub;
    }
    match sub {
        Ast::Empty => Ast::Empty,
        // Repeating a zero-width assertion either asserts it once (min >= 1)
        // or asserts nothing (the zero-repetition branch always succeeds).
        Ast::Assertion(node) if min >= 1 => Ast::Assertion(node),
        Ast::Assertion(_) => Ast::Empty,
        Ast::Plain(hir) => Ast::Plain(Hir::repetition(hir::Repetition {
            min,
            max,
            greedy,
            sub: Box::new(hir),
        })),
        sub => Ast::Repeat {
            sub: Box::new(sub),
            min,
            max,
            greedy,
        },
    }
}

impl fmt::Display for Ast {
    /// Renders the node back to the surface syntax accepted by the parser
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Empty => Ok(()),
            Ast::Plain(hir) => write!(f, "{}", hir),
            Ast::Concat(children) => {
                for child in children {
                    // Alternation binds loosest; parenthesize it inside a
                    // concatenation.
                    if matches!(child, Ast::Alternation(_)) {
                        write!(f, "(?:{})", child)?;
                    } else {
                        write!(f, "{}", child)?;
                    }
                }
                Ok(())
            }
            Ast::Alternation(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", branch)?;
                }
                Ok(())
            }
            Ast::Repeat {
                sub,
                min,
                max,
                greedy,
            } => {
                // Assertions carry their own parentheses.
                if matches!(**sub, Ast::Assertion(_)) {
                    write!(f, "{}", sub)?;
                } else {
                    write!(f, "(?:{})", sub)?;
                }
                match (min, max) {
                    (0, Some(1)) => write!(f, "?")?,
                    (0, None) => write!(f, "*")?,
                    (1, None) => write!(f, "+")?,
                    (n, None) => write!(f, "{{{},}}", n)?,
                    (n, Some(m)) if n == m => write!(f, "{{{}}}", n)?,
                    (n, Some(m)) => write!(f, "{{{},{}}}", n, m)?,
                }
                if !greedy {
                    write!(f, "?")?;
                }
                Ok(())
            }
            Ast::Assertion(node) => write!(f, "({}{})", node.opener(), node.sub),
        }
    }
}
