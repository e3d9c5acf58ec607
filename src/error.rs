//! Error types for tree mutation and selector evaluation.
//!
//! Structural-invariant violations are rejected *before* any link is mutated,
//! so a failed operation leaves the tree exactly as it was. Unmatched queries
//! are not errors; the find-family returns `None`/empty instead.

use thiserror::Error;

/// Errors raised by structural mutation and child lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The requested mutation would violate a structural invariant
    /// (inserting a node into itself, replacing a node with its own parent,
    /// parent-relative positioning on a detached node, ...).
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// `index_of` was asked about a node that is not a child of the given
    /// parent. Lookup is identity-based, not equality-based.
    #[error("node is not a child of the given parent")]
    NotFound,
}

/// Errors raised while evaluating a CSS selector.
///
/// Selectors are not pre-validated; syntax problems surface at evaluation
/// time, matching where the offending token is actually consumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The selector string contained no tokens.
    #[error("empty selector")]
    Empty,

    /// The selector ended with a bare combinator, e.g. `"div >"`.
    #[error("final combinator {0:?} is missing an argument")]
    TrailingCombinator(String),

    /// A comma group contained an empty alternative, e.g. `"p,,a"`.
    #[error("invalid group selection syntax: {0:?}")]
    InvalidGroup(String),

    /// The token is not part of the supported selector subset.
    #[error("unsupported or invalid CSS selector: {0:?}")]
    Unsupported(String),

    /// Pseudo-classes other than `nth-of-type` are not implemented.
    #[error("only the nth-of-type pseudo-class is implemented, got {0:?}")]
    UnknownPseudoClass(String),

    /// A bare `:pseudo-class` token, e.g. `":nth-of-type(1)"`.
    #[error("a pseudo-class must be prefixed with a tag name")]
    PseudoWithoutTag,

    /// `nth-of-type` takes a numeric argument.
    #[error("only numeric values are supported for the nth-of-type pseudo-class")]
    NonNumericNth,

    /// `nth-of-type` is 1-based; zero and negative arguments are rejected.
    #[error("nth-of-type pseudo-class value must be at least 1")]
    NthOutOfRange,
}
