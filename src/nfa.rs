//! Thompson NFA representation
//!
//! The host pattern and every assertion body compile to the same automaton
//! shape: a vector of states with byte-range transitions and zero-width
//! epsilon/split/look states. Assertion checks appear in the host as
//! [`State::Assert`], a zero-width gate referencing a self-contained
//! [`AssertionFragment`]; evaluation never advances the host cursor.

use std::collections::HashSet;

use regex_syntax::hir::Look;

use crate::ast::{Direction, Polarity};

/// A state ID in the NFA
pub type StateId = usize;

/// Index of an assertion fragment within its compiled pattern
pub type FragmentId = usize;

/// Placeholder target for transitions not yet patched by `connect`
pub const UNPATCHED: StateId = usize::MAX;

/// A byte-range transition: matches any byte in `start..=end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub start: u8,
    pub end: u8,
    pub target: StateId,
}

impl Transition {
    /// Transition on a single byte
    pub fn byte(b: u8, target: StateId) -> Self {
        Transition {
            start: b,
            end: b,
            target,
        }
    }

    /// Transition on an inclusive byte range
    pub fn range(start: u8, end: u8, target: StateId) -> Self {
        Transition { start, end, target }
    }

    pub fn matches(&self, b: u8) -> bool {
        self.start <= b && b <= self.end
    }
}

/// A Thompson NFA state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Consuming state with byte-range transitions
    Ranges { transitions: Vec<Transition> },

    /// Epsilon transition, no input consumed
    Epsilon { next: StateId },

    /// Split state with multiple epsilon transitions; order encodes
    /// greedy/lazy preference
    Split { targets: Vec<StateId> },

    /// Ordinary zero-width anchor (`^`, `$`, `\b`, ...)
    Look { look: Look, next: StateId },

    /// Zero-width lookaround gate; admits the epsilon step to `next` only
    /// if the referenced fragment's check passes at the current position
    Assert { fragment: FragmentId, next: StateId },

    /// Accepting state
    Match,
}

/// Fragment of an NFA under construction, with dangling end
#[derive(Debug, Clone)]
pub struct Fragment {
    pub start: StateId,
    pub end: StateId,
}

/// A Thompson NFA over bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nfa {
    pub states: Vec<State>,
    pub start: StateId,
    pub accepting: HashSet<StateId>,
}

impl Nfa {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            start: 0,
            accepting: HashSet::new(),
        }
    }

    /// Add a new state and return its ID
    pub fn add_state(&mut self, state: State) -> StateId {
        let id = self.states.len();
        self.states.push(state);
        id
    }

    /// Create an epsilon state
    pub fn epsilon(&mut self, next: StateId) -> StateId {
        self.add_state(State::Epsilon { next })
    }

    /// Create a split state with multiple targets
    pub fn split(&mut self, targets: Vec<StateId>) -> StateId {
        self.add_state(State::Split { targets })
    }

    /// Create a consuming state with the given transitions
    pub fn ranges_state(&mut self, transitions: Vec<Transition>) -> StateId {
        self.add_state(State::Ranges { transitions })
    }

    /// Create a zero-width anchor state
    pub fn look_state(&mut self, look: Look) -> StateId {
        self.add_state(State::Look {
            look,
            next: UNPATCHED,
        })
    }

    /// Create a zero-width assertion gate
    pub fn assert_state(&mut self, fragment: FragmentId) -> StateId {
        self.add_state(State::Assert {
            fragment,
            next: UNPATCHED,
        })
    }

    /// Create an accepting state
    pub fn match_state(&mut self) -> StateId {
        let id = self.add_state(State::Match);
        self.accepting.insert(id);
        id
    }

    /// Connect a fragment's dangling exits to `to`
    pub fn connect(&mut self, from: StateId, to: StateId) {
        if from >= self.states.len() {
            return;
        }
        match &mut self.states[from] {
            State::Epsilon { next } => *next = to,
            State::Look { next, .. } => *next = to,
            State::Assert { next, .. } => *next = to,
            State::Split { targets } => targets.push(to),
            State::Ranges { transitions } => {
                for transition in transitions {
                    if transition.target == UNPATCHED {
                        transition.target = to;
                    }
                }
            }
            State::Match => {}
        }
    }

    /// Check if any state in the set is accepting
    pub fn is_accepting(&self, states: &HashSet<StateId>) -> bool {
        states.iter().any(|state| self.accepting.contains(state))
    }
}

impl Default for Nfa {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled artifact for one lookaround assertion
///
/// A standalone automaton built purely from the assertion's body,
/// independent of the host automaton's states. Lookbehind fragments are
/// built to recognize the reversed language of the body, so evaluation can
/// scan backward from the cursor without reversing the input. Immutable
/// after compilation and safe to share across concurrent evaluations.
#[derive(Debug, Clone)]
pub struct AssertionFragment {
    pub nfa: Nfa,
    pub direction: Direction,
    pub polarity: Polarity,
    /// Smallest window the body can occupy, in bytes
    pub min_width: usize,
    /// Largest window the body can occupy; always `Some` for lookbehind
    pub max_width: Option<usize>,
}

/// A fully compiled pattern: the host automaton plus every assertion
/// fragment it references
///
/// Nested assertions inside a fragment index into the same `fragments`
/// vector. The whole structure is immutable after compilation; concurrent
/// match operations share it read-only.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub host: Nfa,
    pub fragments: Vec<AssertionFragment>,
}
