//! Match execution with assertion evaluation
//!
//! The host automaton is simulated as a set of active states over the input
//! bytes. Zero-width states are expanded during closure at the current
//! absolute position: ordinary anchors check the surrounding bytes, and
//! assertion gates run their fragment over the bounded window implied by
//! direction and width. An assertion check never moves the host cursor and
//! never mutates anything shared; it only decides whether the gated epsilon
//! step is taken.

use std::collections::HashSet;

use regex_syntax::hir::Look;

use crate::ast::{Direction, Polarity};
use crate::nfa::{AssertionFragment, CompiledPattern, FragmentId, Nfa, State, StateId};

/// A matched span, in byte offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

/// Executes a compiled pattern against input
///
/// Holds only a shared reference to the compiled pattern; all mutable
/// execution state lives in the individual call, so any number of matchers
/// can run against one compiled pattern concurrently.
pub struct Matcher<'a> {
    pattern: &'a CompiledPattern,
}

impl<'a> Matcher<'a> {
    pub fn new(pattern: &'a CompiledPattern) -> Self {
        Self { pattern }
    }

    /// Find the leftmost match, preferring the longest end at that start
    pub fn find(&self, input: &str) -> Option<Match> {
        let bytes = input.as_bytes();
        for start in 0..=bytes.len() {
            if let Some(end) = self.match_at_bytes(bytes, start) {
                return Some(Match { start, end });
            }
        }
        None
    }

    /// True if the pattern matches anywhere in the input
    pub fn is_match(&self, input: &str) -> bool {
        self.find(input).is_some()
    }

    /// Find all non-overlapping matches, left to right
    pub fn find_all(&self, input: &str) -> Vec<Match> {
        let bytes = input.as_bytes();
        let mut matches = Vec::new();
        let mut start = 0;
        while start <= bytes.len() {
            match self.match_at_bytes(bytes, start) {
                Some(end) => {
                    matches.push(Match { start, end });
                    // An empty match still advances the scan.
                    start = end.max(start + 1);
                }
                None => start += 1,
            }
        }
        matches
    }

    /// Anchored match at `start`; returns the longest end offset
    pub fn match_at(&self, input: &str, start: usize) -> Option<usize> {
        self.match_at_bytes(input.as_bytes(), start)
    }

    fn match_at_bytes(&self, input: &[u8], start: usize) -> Option<usize> {
        if start > input.len() {
            return None;
        }
        let nfa = &self.pattern.host;
        let seed: HashSet<StateId> = [nfa.start].into_iter().collect();
        let mut states = self.closure(nfa, seed, input, start);
        let mut last_accept = nfa.is_accepting(&states).then_some(start);

        let mut pos = start;
        while pos < input.len() && !states.is_empty() {
            let stepped = step(nfa, &states, input[pos]);
            pos += 1;
            states = self.closure(nfa, stepped, input, pos);
            if nfa.is_accepting(&states) {
                last_accept = Some(pos);
            }
        }
        last_accept
    }

    /// Epsilon closure at absolute input position `pos`
    ///
    /// Zero-width states are resolved here: anchors against the surrounding
    /// bytes, assertion gates by running their fragment. The visited set
    /// also guards against epsilon cycles from zero-width repetition.
    fn closure(
        &self,
        nfa: &Nfa,
        states: HashSet<StateId>,
        input: &[u8],
        pos: usize,
    ) -> HashSet<StateId> {
        let mut closure = HashSet::new();
        let mut stack: Vec<StateId> = states.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !closure.insert(id) || id >= nfa.states.len() {
                continue;
            }
            match &nfa.states[id] {
                State::Epsilon { next } => stack.push(*next),
                State::Split { targets } => stack.extend(targets.iter().copied()),
                State::Look { look, next } => {
                    if look_matches(*look, input, pos) {
                        stack.push(*next);
                    }
                }
                State::Assert { fragment, next } => {
                    if self.check_assertion(*fragment, input, pos) {
                        stack.push(*next);
                    }
                }
                State::Ranges { .. } | State::Match => {}
            }
        }
        closure
    }

    /// Evaluate one assertion gate at host cursor position `pos`
    fn check_assertion(&self, id: FragmentId, input: &[u8], pos: usize) -> bool {
        let fragment = &self.pattern.fragments[id];
        let accepted = match fragment.direction {
            Direction::Ahead => self.run_ahead(&fragment.nfa, input, pos),
            Direction::Behind => self.run_behind(fragment, input, pos),
        };
        match fragment.polarity {
            Polarity::Positive => accepted,
            Polarity::Negative => !accepted,
        }
    }

    /// Lookahead: the fragment accepts for some consumed length >= 0
    fn run_ahead(&self, nfa: &Nfa, input: &[u8], pos: usize) -> bool {
        let seed: HashSet<StateId> = [nfa.start].into_iter().collect();
        let mut states = self.closure(nfa, seed, input, pos);
        if nfa.is_accepting(&states) {
            return true;
        }
        let mut at = pos;
        while at < input.len() && !states.is_empty() {
            let stepped = step(nfa, &states, input[at]);
            at += 1;
            states = self.closure(nfa, stepped, input, at);
            if nfa.is_accepting(&states) {
                return true;
            }
        }
        false
    }

    /// Lookbehind: run the reverse-built fragment backward from `pos`
    ///
    /// The fragment recognizes the reversed language of the body, so feeding
    /// it `input[pos-1]`, `input[pos-2]`, ... in that order asks whether some
    /// window `input[pos-k..pos)` with `min <= k <= max` matches the body.
    fn run_behind(&self, fragment: &AssertionFragment, input: &[u8], pos: usize) -> bool {
        if fragment.min_width > pos {
            // No admissible window before the cursor.
            return false;
        }
        let limit = fragment.max_width.unwrap_or(pos).min(pos);
        let nfa = &fragment.nfa;
        let seed: HashSet<StateId> = [nfa.start].into_iter().collect();
        let mut states = self.closure(nfa, seed, input, pos);
        if fragment.min_width == 0 && nfa.is_accepting(&states) {
            return true;
        }
        let mut consumed = 0;
        while consumed < limit && !states.is_empty() {
            let byte = input[pos - consumed - 1];
            let stepped = step(nfa, &states, byte);
            consumed += 1;
            states = self.closure(nfa, stepped, input, pos - consumed);
            if consumed >= fragment.min_width && nfa.is_accepting(&states) {
                return true;
            }
        }
        false
    }
}

/// Step every active consuming state on one input byte
fn step(nfa: &Nfa, states: &HashSet<StateId>, byte: u8) -> HashSet<StateId> {
    let mut next = HashSet::new();
    for &id in states {
        if let State::Ranges { transitions } = &nfa.states[id] {
            for transition in transitions {
                if transition.matches(byte) {
                    next.insert(transition.target);
                }
            }
        }
    }
    next
}

/// Ordinary zero-width anchor check at absolute position `pos`
fn look_matches(look: Look, input: &[u8], pos: usize) -> bool {
    let word_before = pos > 0 && regex_syntax::is_word_byte(input[pos - 1]);
    let word_after = pos < input.len() && regex_syntax::is_word_byte(input[pos]);
    match look {
        Look::Start => pos == 0,
        Look::End => pos == input.len(),
        Look::StartLF => pos == 0 || input[pos - 1] == b'\n',
        Look::EndLF => pos == input.len() || input[pos] == b'\n',
        Look::WordAscii => word_before != word_after,
        Look::WordAsciiNegate => word_before == word_after,
        // The compiler rejects every other anchor kind.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::nfa::{Transition, UNPATCHED};

    fn find(pattern: &str, input: &str) -> Option<(usize, usize)> {
        let compiled = compile(pattern).unwrap();
        Matcher::new(&compiled).find(input).map(|m| (m.start, m.end))
    }

    #[test]
    fn test_manual_literal_nfa() {
        let mut nfa = Nfa::new();
        let a = nfa.ranges_state(vec![Transition::byte(b'a', UNPATCHED)]);
        let b = nfa.ranges_state(vec![Transition::byte(b'b', UNPATCHED)]);
        let done = nfa.match_state();
        nfa.connect(a, b);
        nfa.connect(b, done);
        nfa.start = a;

        let pattern = CompiledPattern {
            host: nfa,
            fragments: Vec::new(),
        };
        let matcher = Matcher::new(&pattern);
        assert_eq!(matcher.match_at("ab", 0), Some(2));
        assert_eq!(matcher.match_at("ac", 0), None);
        assert_eq!(matcher.match_at("a", 0), None);
    }

    #[test]
    fn test_negative_lookbehind() {
        assert_eq!(find(r"(?<!\d)test", "hello test"), Some((6, 10)));
        assert_eq!(find(r"(?<!\d)test", "123test"), None);
        // At the very start there is no preceding digit.
        assert_eq!(find(r"(?<!\d)test", "test123"), Some((0, 4)));
    }

    #[test]
    fn test_positive_lookbehind() {
        assert_eq!(find(r"(?<=hello )world", "hello world"), Some((6, 11)));
        assert_eq!(find(r"(?<=hello )world", "goodbye world"), None);
    }

    #[test]
    fn test_negative_lookahead() {
        assert_eq!(find(r"test(?!\d)", "test hello"), Some((0, 4)));
        assert_eq!(find(r"test(?!\d)", "test123"), None);
        // End of input satisfies the negative lookahead.
        assert_eq!(find(r"test(?!\d)", "test"), Some((0, 4)));
    }

    #[test]
    fn test_positive_lookahead() {
        assert_eq!(find(r"test(?=\d)", "test123"), Some((0, 4)));
        assert_eq!(find(r"test(?=\d)", "test hello"), None);
    }

    #[test]
    fn test_assertion_is_zero_width() {
        // The assertion gates the match without changing its span.
        assert_eq!(find(r"(?<=hello )world", "hello world"), find("world", "hello world"));
        assert_eq!(find(r"test(?=\d)", "test123"), Some((0, 4)));
    }

    #[test]
    fn test_polarity_duality() {
        let positive = compile(r"(?=ab)").unwrap();
        let negative = compile(r"(?!ab)").unwrap();
        let pos_matcher = Matcher::new(&positive);
        let neg_matcher = Matcher::new(&negative);
        let input = "abxab";
        for p in 0..=input.len() {
            let admitted = pos_matcher.match_at(input, p).is_some();
            let denied = neg_matcher.match_at(input, p).is_some();
            assert_ne!(admitted, denied, "duality broken at position {}", p);
        }

        let positive = compile(r"(?<=ab)").unwrap();
        let negative = compile(r"(?<!ab)").unwrap();
        let pos_matcher = Matcher::new(&positive);
        let neg_matcher = Matcher::new(&negative);
        for p in 0..=input.len() {
            let admitted = pos_matcher.match_at(input, p).is_some();
            let denied = neg_matcher.match_at(input, p).is_some();
            assert_ne!(admitted, denied, "duality broken at position {}", p);
        }
    }

    #[test]
    fn test_fixed_width_window_boundary() {
        let compiled = compile(r"(?<=ab)").unwrap();
        let matcher = Matcher::new(&compiled);
        let input = "xaby";
        // Positions closer to the start than the width never admit.
        assert_eq!(matcher.match_at(input, 0), None);
        assert_eq!(matcher.match_at(input, 1), None);
        // Exactly the window [p-2, p) is consulted.
        assert_eq!(matcher.match_at(input, 3), Some(3));
        assert_eq!(matcher.match_at(input, 4), None);
    }

    #[test]
    fn test_bounded_variable_width_lookbehind() {
        // Window widths 2 through 3 are all tried.
        let compiled = compile(r"(?<=ab?c)x").unwrap();
        let matcher = Matcher::new(&compiled);
        assert!(matcher.is_match("acx"));
        assert!(matcher.is_match("abcx"));
        assert!(!matcher.is_match("ax"));
        assert!(!matcher.is_match("abbcx"));
    }

    #[test]
    fn test_multiple_lookarounds() {
        assert_eq!(find(r"(?<=\s)\d+(?=\s)", " 123 "), Some((1, 4)));
        assert_eq!(find(r"(?<=\s)\d+(?=\s)", "123 "), None);
        assert_eq!(find(r"(?<=\s)\d+(?=\s)", " 123"), None);
    }

    #[test]
    fn test_nested_lookaround() {
        // The lookbehind's body itself contains a lookahead that peeks past
        // the outer cursor.
        assert_eq!(find(r"(?<=a(?=b))b", "ab"), Some((1, 2)));
        assert_eq!(find(r"(?<=a(?=b))b", "cb"), None);
    }

    #[test]
    fn test_lookaround_inside_alternation() {
        let compiled = compile(r"(?:x|(?<=a))b").unwrap();
        let matcher = Matcher::new(&compiled);
        assert_eq!(matcher.find("xb").map(|m| (m.start, m.end)), Some((0, 2)));
        assert_eq!(matcher.find("ab").map(|m| (m.start, m.end)), Some((1, 2)));
        assert!(matcher.find("cb").is_none());
    }

    #[test]
    fn test_find_all_skips_rejected_candidates() {
        let compiled = compile(r"\d+(?=\s)").unwrap();
        let matcher = Matcher::new(&compiled);
        let spans: Vec<_> = matcher
            .find_all("123 456 789")
            .into_iter()
            .map(|m| (m.start, m.end))
            .collect();
        assert_eq!(spans, vec![(0, 3), (4, 7)]);
    }

    #[test]
    fn test_anchors_combine_with_lookaround() {
        assert_eq!(find(r"^(?<!\d)test$", "test"), Some((0, 4)));
        assert_eq!(find(r"^foo", "barfoo"), None);
        assert_eq!(find(r"foo$", "foobar"), None);
        assert_eq!(find(r"\btest\b(?!!)", "a test here"), Some((2, 6)));
    }

    #[test]
    fn test_negated_word_boundary() {
        // Interior of a word satisfies \B; the edges do not.
        assert_eq!(find(r"\Bar\b", "bar"), Some((1, 3)));
        assert_eq!(find(r"\Bfoo", "foo bar"), None);
        assert_eq!(find(r"(?<=b)\Ba", "bar"), Some((1, 2)));
    }

    #[test]
    fn test_lookbehind_window_clipped_at_input_start() {
        // min width 0: the empty window at position 0 admits.
        assert_eq!(find(r"(?<=b?)a", "a"), Some((0, 1)));
    }

    #[test]
    fn test_empty_pattern() {
        assert_eq!(find("", "abc"), Some((0, 0)));
    }
}
