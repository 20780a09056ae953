//! Syntax recognizer for patterns containing lookaround
//!
//! The grammar delimiters this module cares about are all ASCII, so the
//! recognizer scans the pattern's bytes directly; multi-byte UTF-8 sequences
//! can never collide with them. It parses only the structural skeleton
//! (alternation, grouping, repetition) plus the four lookaround forms, and
//! hands every maximal lookaround-free span to `regex-syntax` wholesale. The
//! general parser runs in byte-oriented mode so that widths and offsets
//! throughout the crate are byte counts.

use log::trace;
use regex_syntax::ParserBuilder;

use crate::ast::{AssertionNode, Ast, Direction, Polarity};
use crate::{Error, Result};

/// Parse a pattern into an AST, recognizing `(?=)`, `(?!)`, `(?<=)`, `(?<!)`
pub fn parse(pattern: &str) -> Result<Ast> {
    let mut parser = Parser {
        pattern,
        bytes: pattern.as_bytes(),
        pos: 0,
    };
    let ast = parser.parse_alternation()?;
    if parser.pos < parser.bytes.len() {
        return Err(Error::Syntax {
            offset: parser.pos,
            message: "unmatched closing parenthesis".to_string(),
        });
    }
    trace!("parsed `{}` into {:?}", pattern, ast);
    Ok(ast)
}

struct Parser<'p> {
    pattern: &'p str,
    bytes: &'p [u8],
    pos: usize,
}

impl<'p> Parser<'p> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// True if a lookaround opener starts at byte `i`
    fn is_lookaround_at(&self, i: usize) -> bool {
        let rest = &self.bytes[i.min(self.bytes.len())..];
        rest.starts_with(b"(?=")
            || rest.starts_with(b"(?!")
            || rest.starts_with(b"(?<=")
            || rest.starts_with(b"(?<!")
    }

    fn parse_alternation(&mut self) -> Result<Ast> {
        let mut branches = vec![self.parse_concat()?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            branches.push(self.parse_concat()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap())
        } else {
            Ok(Ast::Alternation(branches))
        }
    }

    fn parse_concat(&mut self) -> Result<Ast> {
        let mut atoms = Vec::new();
        while let Some(b) = self.peek() {
            match b {
                b'|' | b')' => break,
                b'(' if self.is_lookaround_at(self.pos) => {
                    let node = self.parse_assertion()?;
                    atoms.push(self.apply_quantifier(node));
                }
                b'(' if self.group_contains_lookaround(self.pos) => {
                    let inner = self.parse_structural_group()?;
                    atoms.push(self.apply_quantifier(inner));
                }
                _ => {
                    let atom = self.parse_plain_run()?;
                    atoms.push(atom);
                }
            }
        }
        match atoms.len() {
            0 => Ok(Ast::Empty),
            1 => Ok(atoms.pop().unwrap()),
            _ => Ok(Ast::Concat(atoms)),
        }
    }

    /// Parse one of the four lookaround forms, cursor on the opening `(`
    fn parse_assertion(&mut self) -> Result<Ast> {
        let offset = self.pos;
        self.pos += 2; // consume "(?"
        let (direction, polarity) = match self.peek() {
            Some(b'<') => {
                self.pos += 1;
                match self.peek() {
                    Some(b'=') => (Direction::Behind, Polarity::Positive),
                    Some(b'!') => (Direction::Behind, Polarity::Negative),
                    _ => {
                        return Err(Error::Internal(
                            "assertion opener vanished between scan and parse".to_string(),
                        ))
                    }
                }
            }
            Some(b'=') => (Direction::Ahead, Polarity::Positive),
            Some(b'!') => (Direction::Ahead, Polarity::Negative),
            _ => {
                return Err(Error::Internal(
                    "assertion opener vanished between scan and parse".to_string(),
                ))
            }
        };
        self.pos += 1; // consume '=' or '!'

        // The body uses the full grammar; nested lookaround is permitted.
        // A body that fails to parse propagates its own offset and text.
        let sub = self.parse_alternation()?;
        if self.peek() != Some(b')') {
            return Err(Error::MalformedAssertion {
                offset,
                message: "unterminated lookaround; missing `)`".to_string(),
            });
        }
        self.pos += 1;
        trace!(
            "recognized {:?} {:?} assertion at byte {}",
            direction,
            polarity,
            offset
        );
        Ok(Ast::Assertion(AssertionNode {
            direction,
            polarity,
            sub: Box::new(sub),
            offset,
        }))
    }

    /// Parse a group that contains lookaround somewhere inside
    ///
    /// The group itself is collapsed: capture indices are not tracked by this
    /// engine, so `(...)` and `(?:...)` both contribute only their body.
    fn parse_structural_group(&mut self) -> Result<Ast> {
        let offset = self.pos;
        self.pos += 1; // consume '('
        if self.peek() == Some(b'?') {
            if self.bytes.get(self.pos + 1) == Some(&b':') {
                self.pos += 2;
            } else {
                // Flag and named-group headers are left to the general
                // parser, which cannot see through lookaround.
                return Err(Error::UnsupportedFeature(format!(
                    "group header at byte {} cannot wrap a lookaround assertion",
                    offset
                )));
            }
        }
        let inner = self.parse_alternation()?;
        if self.peek() != Some(b')') {
            return Err(Error::Syntax {
                offset,
                message: "unclosed group".to_string(),
            });
        }
        self.pos += 1;
        Ok(inner)
    }

    /// Apply a trailing quantifier to a structural atom, if one follows
    fn apply_quantifier(&mut self, atom: Ast) -> Ast {
        let (min, max) = match self.peek() {
            Some(b'*') => {
                self.pos += 1;
                (0, None)
            }
            Some(b'+') => {
                self.pos += 1;
                (1, None)
            }
            Some(b'?') => {
                self.pos += 1;
                (0, Some(1))
            }
            Some(b'{') => match self.try_counted() {
                Some(bounds) => bounds,
                // Not a counted repetition; the `{` starts the next plain
                // run as a literal.
                None => return atom,
            },
            _ => return atom,
        };
        let greedy = if self.peek() == Some(b'?') {
            self.pos += 1;
            false
        } else {
            true
        };
        Ast::Repeat {
            sub: Box::new(atom),
            min,
            max,
            greedy,
        }
    }

    /// Try to parse `{n}`, `{n,}` or `{n,m}`; restores the cursor on failure
    fn try_counted(&mut self) -> Option<(u32, Option<u32>)> {
        let save = self.pos;
        self.pos += 1; // consume '{'
        let min = match self.parse_number() {
            Some(n) => n,
            None => {
                self.pos = save;
                return None;
            }
        };
        let max = if self.peek() == Some(b',') {
            self.pos += 1;
            if self.peek() == Some(b'}') {
                None
            } else {
                match self.parse_number() {
                    Some(m) => Some(m),
                    None => {
                        self.pos = save;
                        return None;
                    }
                }
            }
        } else {
            Some(min)
        };
        if self.peek() != Some(b'}') {
            self.pos = save;
            return None;
        }
        self.pos += 1;
        Some((min, max))
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        self.pattern[start..self.pos].parse().ok()
    }

    /// Consume a maximal lookaround-free span and hand it to `regex-syntax`
    fn parse_plain_run(&mut self) -> Result<Ast> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'|' | b')' => break,
                b'\\' => self.pos = (self.pos + 2).min(self.bytes.len()),
                b'[' => self.pos = self.class_end(self.pos),
                b'(' => {
                    if self.is_lookaround_at(self.pos)
                        || self.group_contains_lookaround(self.pos)
                    {
                        break;
                    }
                    // A lookaround-free group belongs to the span wholesale,
                    // including any alternation bars inside it.
                    self.skip_group();
                }
                _ => self.pos += 1,
            }
        }
        let span = &self.pattern[start..self.pos];
        let hir = ParserBuilder::new()
            .utf8(false)
            .unicode(false)
            .build()
            .parse(span)
            .map_err(|e| rebase_syntax_error(e, start))?;
        Ok(Ast::Plain(hir))
    }

    /// Skip a balanced group starting at the cursor's `(`
    ///
    /// An unterminated group runs to end of pattern; the general parser
    /// reports the error when the span is handed over.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos = (self.pos + 2).min(self.bytes.len()),
                b'[' => self.pos = self.class_end(self.pos),
                b'(' => {
                    depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    /// True if the group opening at byte `start` has a lookaround opener
    /// anywhere before its matching close
    fn group_contains_lookaround(&self, start: usize) -> bool {
        let mut i = start;
        let mut depth = 0usize;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'[' => i = self.class_end(i),
                b'(' => {
                    if i > start && self.is_lookaround_at(i) {
                        return true;
                    }
                    depth += 1;
                    i += 1;
                }
                b')' => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        return false;
                    }
                }
                _ => i += 1,
            }
        }
        false
    }

    /// Index just past the character class opening at byte `i`
    fn class_end(&self, i: usize) -> usize {
        let mut j = i + 1;
        if self.bytes.get(j) == Some(&b'^') {
            j += 1;
        }
        // A `]` in leading position is a literal member.
        if self.bytes.get(j) == Some(&b']') {
            j += 1;
        }
        while j < self.bytes.len() {
            match self.bytes[j] {
                b'\\' => j += 2,
                b']' => return j + 1,
                _ => j += 1,
            }
        }
        j.min(self.bytes.len())
    }
}

fn rebase_syntax_error(err: regex_syntax::Error, base: usize) -> Error {
    match err {
        regex_syntax::Error::Parse(e) => Error::Syntax {
            offset: base + e.span().start.offset,
            message: e.kind().to_string(),
        },
        regex_syntax::Error::Translate(e) => Error::Syntax {
            offset: base + e.span().start.offset,
            message: e.kind().to_string(),
        },
        other => Error::Syntax {
            offset: base,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_assertion(ast: &Ast, direction: Direction, polarity: Polarity) {
        match ast {
            Ast::Assertion(node) => {
                assert_eq!(node.direction, direction);
                assert_eq!(node.polarity, polarity);
            }
            other => panic!("expected assertion, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_lookbehind() {
        let ast = parse(r"(?<!\d)test").unwrap();
        match &ast {
            Ast::Concat(children) => {
                assert_assertion(&children[0], Direction::Behind, Polarity::Negative);
            }
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_positive_lookbehind() {
        let ast = parse(r"(?<=foo)bar").unwrap();
        match &ast {
            Ast::Concat(children) => {
                assert_assertion(&children[0], Direction::Behind, Polarity::Positive);
            }
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_lookaheads() {
        let ast = parse(r"test(?!\d)").unwrap();
        match &ast {
            Ast::Concat(children) => {
                assert_assertion(children.last().unwrap(), Direction::Ahead, Polarity::Negative);
            }
            other => panic!("expected concat, got {:?}", other),
        }
        let ast = parse(r"foo(?=bar)").unwrap();
        match &ast {
            Ast::Concat(children) => {
                assert_assertion(children.last().unwrap(), Direction::Ahead, Polarity::Positive);
            }
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_lookaround() {
        let ast = parse(r"(?<=a(?=b))c").unwrap();
        match &ast {
            Ast::Concat(children) => match &children[0] {
                Ast::Assertion(outer) => {
                    assert_eq!(outer.direction, Direction::Behind);
                    assert!(outer.sub.contains_assertion());
                }
                other => panic!("expected assertion, got {:?}", other),
            },
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_assertion_offset_recorded() {
        let ast = parse(r"abc(?<!x)").unwrap();
        match &ast {
            Ast::Concat(children) => match &children[1] {
                Ast::Assertion(node) => assert_eq!(node.offset, 3),
                other => panic!("expected assertion, got {:?}", other),
            },
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_lookaround() {
        match parse(r"x(?<!abc") {
            Err(Error::MalformedAssertion { offset, .. }) => assert_eq!(offset, 1),
            other => panic!("expected MalformedAssertion, got {:?}", other),
        }
    }

    #[test]
    fn test_inner_error_keeps_position() {
        // The body fails inside the general parser; its offset must point
        // into the original pattern, not the extracted span.
        match parse(r"ab(?=[)x") {
            Err(Error::Syntax { offset, .. }) => assert!(offset >= 5, "offset was {}", offset),
            other => panic!("expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_close_paren() {
        match parse(r"a(?=b))") {
            Err(Error::Syntax { offset, .. }) => assert_eq!(offset, 6),
            other => panic!("expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_flag_group_around_lookaround_rejected() {
        match parse(r"(?i:(?=a))") {
            Err(Error::UnsupportedFeature(_)) => {}
            other => panic!("expected UnsupportedFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_group_with_bars_stays_plain() {
        // The alternation inside a lookaround-free group belongs to the
        // general parser.
        let ast = parse(r"(a|b)c").unwrap();
        assert!(matches!(ast, Ast::Plain(_)));
    }

    #[test]
    fn test_group_containing_lookaround_is_structural() {
        let ast = parse(r"(?:a(?!b))+c").unwrap();
        match &ast {
            Ast::Concat(children) => {
                assert!(matches!(children[0], Ast::Repeat { .. }));
            }
            other => panic!("expected concat, got {:?}", other),
        }
    }

    #[test]
    fn test_lookaround_opener_inside_class_is_literal() {
        // `(?=` inside a character class has no meta meaning.
        let ast = parse(r"[(?=]x").unwrap();
        assert!(matches!(ast, Ast::Plain(_)));
    }

    #[test]
    fn test_counted_quantifier_on_structural_group() {
        let ast = parse(r"(?:a(?=b)){2,3}").unwrap();
        match ast {
            Ast::Repeat { min, max, greedy, .. } => {
                assert_eq!((min, max, greedy), (2, Some(3), true));
            }
            other => panic!("expected repeat, got {:?}", other),
        }
    }
}
