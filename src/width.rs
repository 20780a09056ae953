//! Width analysis for assertion bodies
//!
//! Computes the set of possible consumed byte-lengths of a sub-pattern. The
//! compiler consults this for every lookbehind body: a bounded width is what
//! keeps each assertion check constant-cost, and an unbounded one is rejected
//! outright. Lookahead bodies are never width-checked.

use crate::ast::Ast;

/// The set of byte-lengths a sub-pattern can consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Every match consumes exactly `n` bytes
    Fixed(usize),
    /// Match lengths vary within `min..=max`
    Bounded(usize, usize),
    /// Match lengths have no upper bound
    Unbounded,
}

impl Width {
    fn from_bounds(min: usize, max: Option<usize>) -> Width {
        match max {
            Some(max) if max == min => Width::Fixed(min),
            Some(max) => Width::Bounded(min, max),
            None => Width::Unbounded,
        }
    }

    /// Smallest possible consumed length
    pub fn min(&self) -> usize {
        match *self {
            Width::Fixed(n) => n,
            Width::Bounded(min, _) => min,
            Width::Unbounded => 0,
        }
    }

    /// Largest possible consumed length, if bounded
    pub fn max(&self) -> Option<usize> {
        match *self {
            Width::Fixed(n) => Some(n),
            Width::Bounded(_, max) => Some(max),
            Width::Unbounded => None,
        }
    }

    /// Width of this followed by `other`
    fn then(self, other: Width) -> Width {
        let min = self.min().saturating_add(other.min());
        let max = match (self.max(), other.max()) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
        Width::from_bounds(min, max)
    }

    /// Width of this or `other`
    fn union(self, other: Width) -> Width {
        let min = self.min().min(other.min());
        let max = match (self.max(), other.max()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Width::from_bounds(min, max)
    }

    /// Width of this repeated between `min_rep` and `max_rep` times
    fn repeat(self, min_rep: u32, max_rep: Option<u32>) -> Width {
        if max_rep == Some(0) || self.max() == Some(0) {
            return Width::Fixed(0);
        }
        let min = self.min().saturating_mul(min_rep as usize);
        let max = match (self.max(), max_rep) {
            (Some(m), Some(r)) => Some(m.saturating_mul(r as usize)),
            _ => None,
        };
        Width::from_bounds(min, max)
    }
}

/// Compute the width of a sub-pattern, in bytes
///
/// Assertions themselves contribute zero: their presence never changes the
/// consumed length of the pattern around them.
pub fn of(ast: &Ast) -> Width {
    match ast {
        Ast::Empty | Ast::Assertion(_) => Width::Fixed(0),
        Ast::Plain(hir) => {
            let props = hir.properties();
            Width::from_bounds(props.minimum_len().unwrap_or(0), props.maximum_len())
        }
        Ast::Concat(children) => children
            .iter()
            .fold(Width::Fixed(0), |acc, child| acc.then(of(child))),
        Ast::Alternation(branches) => {
            let mut iter = branches.iter();
            let first = match iter.next() {
                Some(branch) => of(branch),
                None => Width::Fixed(0),
            };
            iter.fold(first, |acc, branch| acc.union(of(branch)))
        }
        Ast::Repeat { sub, min, max, .. } => of(sub).repeat(*min, *max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn width_of(pattern: &str) -> Width {
        of(&parse(pattern).unwrap().simplify())
    }

    #[test]
    fn test_fixed_widths() {
        assert_eq!(width_of("abc"), Width::Fixed(3));
        assert_eq!(width_of(r"\d"), Width::Fixed(1));
        assert_eq!(width_of(r"[a-z]{4}"), Width::Fixed(4));
        assert_eq!(width_of(""), Width::Fixed(0));
    }

    #[test]
    fn test_bounded_widths() {
        assert_eq!(width_of("a{2,5}"), Width::Bounded(2, 5));
        assert_eq!(width_of("a|bc"), Width::Bounded(1, 2));
        assert_eq!(width_of("ab?"), Width::Bounded(1, 2));
    }

    #[test]
    fn test_unbounded_widths() {
        assert_eq!(width_of("a+"), Width::Unbounded);
        assert_eq!(width_of("a*b"), Width::Unbounded);
        assert_eq!(width_of("a{3,}"), Width::Unbounded);
    }

    #[test]
    fn test_assertions_are_zero_width() {
        assert_eq!(width_of("(?=xyz)"), Width::Fixed(0));
        assert_eq!(width_of(r"ab(?<!\d)"), Width::Fixed(2));
        // An unbounded body inside an assertion does not widen the host.
        assert_eq!(width_of(r"a(?=b+)c"), Width::Fixed(2));
    }

    #[test]
    fn test_anchors_are_zero_width() {
        assert_eq!(width_of("^foo$"), Width::Fixed(3));
    }
}
