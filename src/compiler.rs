//! Compiler from the pattern AST to a Thompson NFA with assertion gates
//!
//! Ordinary sub-patterns compile exactly as a lookaround-free pattern would.
//! Each assertion body compiles into its own self-contained fragment
//! automaton; the host automaton gets a zero-width [`State::Assert`] gate in
//! the position the assertion occupied. Lookbehind fragments are compiled in
//! reverse mode: concatenations are emitted back to front and literal bytes
//! are reversed, so the fragment recognizes the reversed language of its body
//! and can be run over the input read backward from the cursor. Zero-width
//! anchors are left unreversed because the evaluator checks them at absolute
//! input offsets.

use log::debug;
use regex_syntax::hir::{Class, Hir, HirKind, Look};

use crate::ast::{AssertionNode, Ast, Direction};
use crate::nfa::{AssertionFragment, CompiledPattern, Fragment, Nfa, Transition, UNPATCHED};
use crate::width::{self, Width};
use crate::{Error, Result};

/// Default cap on lookbehind window width, in bytes
///
/// Lookbehind bodies whose maximum width exceeds the cap fail compilation;
/// the cap bounds the cost of a single assertion check and is what keeps
/// overall matching linear in the input length.
pub const DEFAULT_MAX_LOOKBEHIND_WIDTH: usize = 256;

/// Parse, simplify and compile a pattern with the default configuration
pub fn compile(pattern: &str) -> Result<CompiledPattern> {
    let ast = crate::parse::parse(pattern)?.simplify();
    Compiler::new().compile(&ast)
}

/// Compiler that converts a pattern AST to a [`CompiledPattern`]
pub struct Compiler {
    max_lookbehind_width: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            max_lookbehind_width: DEFAULT_MAX_LOOKBEHIND_WIDTH,
        }
    }

    /// Override the maximum permitted lookbehind width, in bytes
    pub fn max_lookbehind_width(mut self, max: usize) -> Self {
        self.max_lookbehind_width = max;
        self
    }

    /// Compile an AST into the host automaton plus assertion fragments
    pub fn compile(&self, ast: &Ast) -> Result<CompiledPattern> {
        let mut builder = Builder {
            fragments: Vec::new(),
            max_lookbehind_width: self.max_lookbehind_width,
        };
        let host = builder.build_nfa(ast, false)?;
        debug!(
            "compiled pattern: {} host states, {} assertion fragments",
            host.states.len(),
            builder.fragments.len()
        );
        Ok(CompiledPattern {
            host,
            fragments: builder.fragments,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// A sub-pattern to compile: either a structural AST node or a plain span
#[derive(Clone, Copy)]
enum Sub<'a> {
    Ast(&'a Ast),
    Hir(&'a Hir),
}

struct Builder {
    fragments: Vec<AssertionFragment>,
    max_lookbehind_width: usize,
}

impl Builder {
    /// Compile a sub-pattern into a complete standalone NFA
    fn build_nfa(&mut self, ast: &Ast, reverse: bool) -> Result<Nfa> {
        let mut nfa = Nfa::new();
        let fragment = self.compile_ast(&mut nfa, ast, reverse)?;
        nfa.start = fragment.start;
        let match_state = nfa.match_state();
        nfa.connect(fragment.end, match_state);
        Ok(nfa)
    }

    fn compile_sub(&mut self, nfa: &mut Nfa, sub: Sub<'_>, reverse: bool) -> Result<Fragment> {
        match sub {
            Sub::Ast(ast) => self.compile_ast(nfa, ast, reverse),
            Sub::Hir(hir) => self.compile_hir(nfa, hir, reverse),
        }
    }

    fn compile_ast(&mut self, nfa: &mut Nfa, ast: &Ast, reverse: bool) -> Result<Fragment> {
        match ast {
            Ast::Empty => Ok(compile_empty(nfa)),
            Ast::Plain(hir) => self.compile_hir(nfa, hir, reverse),
            Ast::Concat(children) => {
                let mut fragments = Vec::with_capacity(children.len());
                if reverse {
                    for child in children.iter().rev() {
                        fragments.push(self.compile_ast(nfa, child, reverse)?);
                    }
                } else {
                    for child in children {
                        fragments.push(self.compile_ast(nfa, child, reverse)?);
                    }
                }
                Ok(connect_sequence(nfa, fragments))
            }
            Ast::Alternation(branches) => {
                let mut fragments = Vec::with_capacity(branches.len());
                for branch in branches {
                    fragments.push(self.compile_ast(nfa, branch, reverse)?);
                }
                Ok(compile_alternation(nfa, fragments))
            }
            Ast::Repeat {
                sub,
                min,
                max,
                greedy,
            } => self.compile_repetition(nfa, Sub::Ast(sub), *min, *max, *greedy, reverse),
            Ast::Assertion(node) => self.compile_assertion(nfa, node),
        }
    }

    /// Compile a plain span; the general automaton construction
    fn compile_hir(&mut self, nfa: &mut Nfa, hir: &Hir, reverse: bool) -> Result<Fragment> {
        match hir.kind() {
            HirKind::Empty => Ok(compile_empty(nfa)),
            HirKind::Literal(literal) => Ok(compile_literal(nfa, &literal.0, reverse)),
            HirKind::Class(class) => compile_class(nfa, class),
            HirKind::Look(look) => compile_look(nfa, *look),
            HirKind::Repetition(rep) => self.compile_repetition(
                nfa,
                Sub::Hir(&rep.sub),
                rep.min,
                rep.max,
                rep.greedy,
                reverse,
            ),
            // Capture bookkeeping is out of scope; the group is transparent.
            HirKind::Capture(capture) => self.compile_hir(nfa, &capture.sub, reverse),
            HirKind::Concat(children) => {
                let mut fragments = Vec::with_capacity(children.len());
                if reverse {
                    for child in children.iter().rev() {
                        fragments.push(self.compile_hir(nfa, child, reverse)?);
                    }
                } else {
                    for child in children {
                        fragments.push(self.compile_hir(nfa, child, reverse)?);
                    }
                }
                Ok(connect_sequence(nfa, fragments))
            }
            HirKind::Alternation(branches) => {
                let mut fragments = Vec::with_capacity(branches.len());
                for branch in branches {
                    fragments.push(self.compile_hir(nfa, branch, reverse)?);
                }
                Ok(compile_alternation(nfa, fragments))
            }
        }
    }

    /// Compile a lookaround assertion into a fragment plus a host gate
    fn compile_assertion(&mut self, nfa: &mut Nfa, node: &AssertionNode) -> Result<Fragment> {
        let (min_width, max_width) = match node.direction {
            Direction::Behind => {
                let width = width::of(&node.sub);
                let max = match width {
                    Width::Unbounded => {
                        return Err(Error::UnsupportedLookbehindWidth {
                            offset: node.offset,
                            sub: node.sub.to_string(),
                            max: self.max_lookbehind_width,
                        })
                    }
                    bounded => bounded.max().ok_or_else(|| {
                        Error::Internal(
                            "bounded width lost between analysis and compilation".to_string(),
                        )
                    })?,
                };
                if max > self.max_lookbehind_width {
                    return Err(Error::UnsupportedLookbehindWidth {
                        offset: node.offset,
                        sub: node.sub.to_string(),
                        max: self.max_lookbehind_width,
                    });
                }
                (width.min(), Some(max))
            }
            // Forward evaluation is bounded by the remaining input.
            Direction::Ahead => (0, None),
        };

        let sub_nfa = self.build_nfa(&node.sub, node.direction == Direction::Behind)?;
        debug!(
            "compiled {:?} {:?} fragment at byte {}: {} states, window {}..{:?}",
            node.direction,
            node.polarity,
            node.offset,
            sub_nfa.states.len(),
            min_width,
            max_width
        );
        let id = self.fragments.len();
        self.fragments.push(AssertionFragment {
            nfa: sub_nfa,
            direction: node.direction,
            polarity: node.polarity,
            min_width,
            max_width,
        });
        let state = nfa.assert_state(id);
        Ok(Fragment {
            start: state,
            end: state,
        })
    }

    fn compile_repetition(
        &mut self,
        nfa: &mut Nfa,
        sub: Sub<'_>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        reverse: bool,
    ) -> Result<Fragment> {
        match (min, max) {
            (0, Some(1)) => self.compile_question(nfa, sub, greedy, reverse),
            (0, None) => self.compile_star(nfa, sub, greedy, reverse),
            (1, None) => self.compile_plus(nfa, sub, greedy, reverse),
            (min, max) => self.compile_counted(nfa, sub, min, max, greedy, reverse),
        }
    }

    fn compile_question(
        &mut self,
        nfa: &mut Nfa,
        sub: Sub<'_>,
        greedy: bool,
        reverse: bool,
    ) -> Result<Fragment> {
        let body = self.compile_sub(nfa, sub, reverse)?;
        let end = nfa.epsilon(UNPATCHED);
        let split = if greedy {
            nfa.split(vec![body.start, end])
        } else {
            nfa.split(vec![end, body.start])
        };
        nfa.connect(body.end, end);
        Ok(Fragment { start: split, end })
    }

    fn compile_star(
        &mut self,
        nfa: &mut Nfa,
        sub: Sub<'_>,
        greedy: bool,
        reverse: bool,
    ) -> Result<Fragment> {
        let body = self.compile_sub(nfa, sub, reverse)?;
        let end = nfa.epsilon(UNPATCHED);
        let start = if greedy {
            nfa.split(vec![body.start, end])
        } else {
            nfa.split(vec![end, body.start])
        };
        // Loop back for further iterations.
        nfa.connect(body.end, start);
        Ok(Fragment { start, end })
    }

    fn compile_plus(
        &mut self,
        nfa: &mut Nfa,
        sub: Sub<'_>,
        greedy: bool,
        reverse: bool,
    ) -> Result<Fragment> {
        let body = self.compile_sub(nfa, sub, reverse)?;
        let end = nfa.epsilon(UNPATCHED);
        let repeat = if greedy {
            nfa.split(vec![body.start, end])
        } else {
            nfa.split(vec![end, body.start])
        };
        nfa.connect(body.end, repeat);
        Ok(Fragment {
            start: body.start,
            end,
        })
    }

    /// Compile `{n}`, `{n,}` and `{n,m}` as a required prefix plus an
    /// optional tail
    fn compile_counted(
        &mut self,
        nfa: &mut Nfa,
        sub: Sub<'_>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        reverse: bool,
    ) -> Result<Fragment> {
        if max == Some(0) {
            return Ok(compile_empty(nfa));
        }
        let mut parts = Vec::new();
        for _ in 0..min {
            parts.push(self.compile_sub(nfa, sub, reverse)?);
        }
        match max {
            None => {
                parts.push(self.compile_star(nfa, sub, greedy, reverse)?);
            }
            Some(max) => {
                // (m - n) optional copies, nested innermost-first so that
                // each copy can only be entered through the previous one.
                let extra = max.saturating_sub(min);
                let mut tail: Option<Fragment> = None;
                for _ in 0..extra {
                    let body = self.compile_sub(nfa, sub, reverse)?;
                    let (entry, exit) = match tail {
                        Some(inner) => {
                            nfa.connect(body.end, inner.start);
                            (body.start, inner.end)
                        }
                        None => (body.start, body.end),
                    };
                    let end = nfa.epsilon(UNPATCHED);
                    let split = if greedy {
                        nfa.split(vec![entry, end])
                    } else {
                        nfa.split(vec![end, entry])
                    };
                    nfa.connect(exit, end);
                    tail = Some(Fragment { start: split, end });
                }
                if let Some(tail) = tail {
                    parts.push(tail);
                }
            }
        }
        if parts.is_empty() {
            return Ok(compile_empty(nfa));
        }
        Ok(connect_sequence(nfa, parts))
    }
}

fn compile_empty(nfa: &mut Nfa) -> Fragment {
    let state = nfa.epsilon(UNPATCHED);
    Fragment {
        start: state,
        end: state,
    }
}

fn compile_literal(nfa: &mut Nfa, bytes: &[u8], reverse: bool) -> Fragment {
    if bytes.is_empty() {
        return compile_empty(nfa);
    }
    let mut states = Vec::with_capacity(bytes.len());
    let iter: Box<dyn Iterator<Item = &u8>> = if reverse {
        Box::new(bytes.iter().rev())
    } else {
        Box::new(bytes.iter())
    };
    for &b in iter {
        states.push(nfa.ranges_state(vec![Transition::byte(b, UNPATCHED)]));
    }
    for pair in states.windows(2) {
        nfa.connect(pair[0], pair[1]);
    }
    Fragment {
        start: states[0],
        end: *states.last().unwrap(),
    }
}

fn compile_class(nfa: &mut Nfa, class: &Class) -> Result<Fragment> {
    let mut transitions = Vec::new();
    match class {
        Class::Bytes(class) => {
            for range in class.iter() {
                transitions.push(Transition::range(range.start(), range.end(), UNPATCHED));
            }
        }
        // The parser runs in byte mode, so Unicode classes only reach here
        // through ASCII-only ranges.
        Class::Unicode(class) => {
            for range in class.iter() {
                if range.end() as u32 > 0x7F {
                    return Err(Error::UnsupportedFeature(
                        "non-ASCII character class in byte-oriented mode".to_string(),
                    ));
                }
                transitions.push(Transition::range(
                    range.start() as u8,
                    range.end() as u8,
                    UNPATCHED,
                ));
            }
        }
    }
    let state = nfa.ranges_state(transitions);
    Ok(Fragment {
        start: state,
        end: state,
    })
}

fn compile_look(nfa: &mut Nfa, look: Look) -> Result<Fragment> {
    match look {
        Look::Start
        | Look::End
        | Look::StartLF
        | Look::EndLF
        | Look::WordAscii
        | Look::WordAsciiNegate => {}
        other => {
            return Err(Error::UnsupportedFeature(format!(
                "anchor {:?} in byte-oriented mode",
                other
            )))
        }
    }
    let state = nfa.look_state(look);
    Ok(Fragment {
        start: state,
        end: state,
    })
}

fn connect_sequence(nfa: &mut Nfa, fragments: Vec<Fragment>) -> Fragment {
    if fragments.is_empty() {
        return compile_empty(nfa);
    }
    for pair in fragments.windows(2) {
        nfa.connect(pair[0].end, pair[1].start);
    }
    Fragment {
        start: fragments[0].start,
        end: fragments.last().unwrap().end,
    }
}

fn compile_alternation(nfa: &mut Nfa, fragments: Vec<Fragment>) -> Fragment {
    if fragments.is_empty() {
        return compile_empty(nfa);
    }
    if fragments.len() == 1 {
        return fragments.into_iter().next().unwrap();
    }
    let end = nfa.epsilon(UNPATCHED);
    let starts = fragments.iter().map(|f| f.start).collect();
    let split = nfa.split(starts);
    for fragment in &fragments {
        nfa.connect(fragment.end, end);
    }
    Fragment { start: split, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Polarity;
    use crate::nfa::State;
    use crate::parse::parse;

    fn count_asserts(nfa: &Nfa) -> usize {
        nfa.states
            .iter()
            .filter(|s| matches!(s, State::Assert { .. }))
            .count()
    }

    #[test]
    fn test_assertion_becomes_zero_width_gate() {
        let compiled = compile(r"a(?=b)c").unwrap();
        assert_eq!(count_asserts(&compiled.host), 1);
        assert_eq!(compiled.fragments.len(), 1);
        let fragment = &compiled.fragments[0];
        assert_eq!(fragment.direction, Direction::Ahead);
        assert_eq!(fragment.polarity, Polarity::Positive);
    }

    #[test]
    fn test_lookbehind_window_annotation() {
        let compiled = compile(r"(?<=hello )world").unwrap();
        let fragment = &compiled.fragments[0];
        assert_eq!(fragment.direction, Direction::Behind);
        assert_eq!(fragment.min_width, 6);
        assert_eq!(fragment.max_width, Some(6));
    }

    #[test]
    fn test_variable_width_lookbehind() {
        let compiled = compile(r"(?<=ab?c)x").unwrap();
        let fragment = &compiled.fragments[0];
        assert_eq!(fragment.min_width, 2);
        assert_eq!(fragment.max_width, Some(3));
    }

    #[test]
    fn test_unbounded_lookbehind_rejected() {
        match compile(r"(?<=a+)b") {
            Err(Error::UnsupportedLookbehindWidth { offset, sub, .. }) => {
                assert_eq!(offset, 0);
                assert!(sub.contains('a'), "sub was `{}`", sub);
            }
            other => panic!("expected UnsupportedLookbehindWidth, got {:?}", other),
        }
    }

    #[test]
    fn test_lookbehind_width_cap() {
        let ast = parse(r"(?<=abcdefgh)x").unwrap().simplify();
        match Compiler::new().max_lookbehind_width(4).compile(&ast) {
            Err(Error::UnsupportedLookbehindWidth { max, .. }) => assert_eq!(max, 4),
            other => panic!("expected UnsupportedLookbehindWidth, got {:?}", other),
        }
        assert!(Compiler::new().max_lookbehind_width(8).compile(&ast).is_ok());
    }

    #[test]
    fn test_lookahead_is_never_width_checked() {
        assert!(compile(r"a(?=b+)").is_ok());
        assert!(compile(r"a(?!b*c)").is_ok());
    }

    #[test]
    fn test_nested_assertions_share_fragment_table() {
        let compiled = compile(r"(?<=a(?=b))c").unwrap();
        assert_eq!(compiled.fragments.len(), 2);
        // The outer lookbehind's fragment contains the nested gate.
        let behind = compiled
            .fragments
            .iter()
            .find(|f| f.direction == Direction::Behind)
            .unwrap();
        assert_eq!(count_asserts(&behind.nfa), 1);
    }

    #[test]
    fn test_host_without_assertions_has_no_fragments() {
        let compiled = compile(r"ab+c").unwrap();
        assert!(compiled.fragments.is_empty());
        assert_eq!(count_asserts(&compiled.host), 0);
    }
}
