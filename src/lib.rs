//! Thompson NFA engine with bounded lookaround assertions
//!
//! This library extends a linear-time Thompson NFA regex engine with the four
//! zero-width lookaround assertions: `(?=X)`, `(?!X)`, `(?<=X)`, `(?<!X)`.
//! Each assertion body is compiled into its own self-contained automaton
//! fragment; lookbehind fragments recognize the reversed language of their
//! body so they can be run backward from the match cursor without ever
//! reversing the input buffer.
//!
//! Because every assertion check runs a fixed fragment over a bounded window,
//! matching stays linear in the input length. The price is that lookbehind
//! bodies must have a bounded byte width; unbounded ones are rejected at
//! compile time with [`Error::UnsupportedLookbehindWidth`].
//!
//! Ordinary (lookaround-free) pattern syntax is handled by `regex-syntax` in
//! byte-oriented mode, so all offsets and widths in this crate are byte
//! counts.

pub mod ast;
pub mod compiler;
pub mod matcher;
pub mod nfa;
pub mod parse;
pub mod width;

pub use ast::{AssertionNode, Ast, Direction, Polarity};
pub use compiler::{compile, Compiler, DEFAULT_MAX_LOOKBEHIND_WIDTH};
pub use matcher::{Match, Matcher};
pub use nfa::{AssertionFragment, CompiledPattern, Nfa};
pub use parse::parse;
pub use width::Width;

/// The result of parsing or compiling a pattern
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by `parse` and `compile`
///
/// Every variant carries enough context to point at the offending piece of
/// the original pattern string. Matching itself has no error path: a compiled
/// pattern either admits or rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Ordinary pattern syntax error, reported by the general parser
    Syntax {
        /// Byte offset of the error within the original pattern
        offset: usize,
        message: String,
    },
    /// Unterminated or unparsable lookaround body
    MalformedAssertion {
        /// Byte offset of the opening `(` of the assertion
        offset: usize,
        message: String,
    },
    /// Lookbehind body whose width is unbounded or exceeds the configured cap
    UnsupportedLookbehindWidth {
        /// Byte offset of the opening `(` of the lookbehind
        offset: usize,
        /// The offending sub-pattern, rendered back to surface syntax
        sub: String,
        /// The configured maximum width in bytes
        max: usize,
    },
    /// Pattern feature this engine does not support
    UnsupportedFeature(String),
    /// Invariant violation inside the compiler; a bug, not a user error
    Internal(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Syntax { offset, message } => {
                write!(f, "syntax error at byte {}: {}", offset, message)
            }
            Error::MalformedAssertion { offset, message } => {
                write!(f, "malformed lookaround at byte {}: {}", offset, message)
            }
            Error::UnsupportedLookbehindWidth { offset, sub, max } => {
                write!(
                    f,
                    "lookbehind at byte {} has no bounded width within the \
                     configured maximum of {} bytes: `{}`",
                    offset, max, sub
                )
            }
            Error::UnsupportedFeature(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
