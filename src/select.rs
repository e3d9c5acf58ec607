//! CSS selector subset, evaluated over the tree's traversal iterators.
//!
//! Supported: tag names, `*`, `#id`, `.class` chains (AND semantics),
//! `[attr]` / `[attr<op>"value"]` with operators `= ~ | ^ $ *`, the
//! `:nth-of-type(n)` pseudo-class, comma-separated alternatives, and the
//! combinators `>` (children), `~` (later siblings), `+` (nearest tag
//! sibling). Whitespace between tokens is the descendant combinator.
//!
//! Selectors are tokenized by whitespace and evaluated token by token against
//! a shrinking context set; there is no pre-compiled representation, so
//! syntax errors surface when the offending token is consumed.

use std::borrow::Cow;
use std::collections::HashSet;

use crate::error::SelectorError;
use crate::tree::{AttrValue, NodeId, Tree};

const COMBINATORS: [&str; 3] = [">", "~", "+"];

/// How candidates are generated from each context node for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Traversal {
    Descendants,
    Children,
    NextSiblings,
    /// `+`: only the nearest element sibling is a candidate.
    NextTagSibling,
}

/// Attribute selector operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    /// Bare `[attr]`.
    Exists,
    /// `=`: the joined value, exactly.
    Equals,
    /// `~`: membership in the whitespace-separated value list.
    Includes,
    /// `|`: exact value or a `value-` prefix.
    DashMatch,
    /// `^`: value prefix.
    Prefix,
    /// `$`: value suffix.
    Suffix,
    /// `*`: value substring.
    Substring,
}

/// What one token's checker decided about a candidate.
enum Verdict {
    Match,
    NoMatch,
    /// No further candidate from this context node can match; stop generating.
    Stop,
}

/// Per-token check, carrying its own evaluation state where needed.
#[derive(Debug, Clone)]
enum Check {
    Always,
    Id(String),
    /// All named classes must be present (AND).
    Classes(Vec<String>),
    Attr {
        name: String,
        op: AttrOp,
        value: String,
    },
    /// Stateful: counts type-matching candidates as they stream past.
    NthOfType { target: usize, count: usize },
}

impl Check {
    fn eval(&mut self, tree: &Tree, id: NodeId) -> Verdict {
        let hit = match self {
            Check::Always => true,
            Check::Id(wanted) => {
                tree.attr_str(id, "id").as_deref() == Some(wanted.as_str())
            }
            Check::Classes(wanted) => match tree.attr(id, "class") {
                Some(AttrValue::List(items)) => {
                    wanted.iter().all(|w| items.iter().any(|item| item == w))
                }
                Some(other) => {
                    let joined = other.to_joined();
                    wanted
                        .iter()
                        .all(|w| joined.split_whitespace().any(|item| item == w))
                }
                None => false,
            },
            Check::Attr { name, op, value } => {
                // A missing attribute reads as the empty string for the
                // prefix/suffix/substring operators; `=` and `~` need the
                // attribute to actually be there.
                let joined = tree
                    .attr_str(id, name)
                    .unwrap_or(Cow::Borrowed(""));
                match op {
                    AttrOp::Exists => tree.has_attr(id, name),
                    AttrOp::Equals => tree.has_attr(id, name) && joined == value.as_str(),
                    AttrOp::Includes => match tree.attr(id, name) {
                        Some(AttrValue::List(items)) => items.iter().any(|item| item == value),
                        Some(v) => v.to_joined().split_whitespace().any(|item| item == value),
                        None => false,
                    },
                    AttrOp::DashMatch => {
                        joined == value.as_str()
                            || (joined.starts_with(value.as_str())
                                && joined[value.len()..].starts_with('-'))
                    }
                    AttrOp::Prefix => joined.starts_with(value.as_str()),
                    AttrOp::Suffix => joined.ends_with(value.as_str()),
                    AttrOp::Substring => joined.contains(value.as_str()),
                }
            }
            Check::NthOfType { target, count } => {
                *count += 1;
                if *count == *target {
                    return Verdict::Match;
                }
                if *count > *target {
                    return Verdict::Stop;
                }
                return Verdict::NoMatch;
            }
        };
        if hit { Verdict::Match } else { Verdict::NoMatch }
    }
}

/// One parsed simple selector: optional tag-name filter plus a checker.
#[derive(Debug, Clone)]
struct SimpleSelector {
    tag: Option<String>,
    check: Check,
}

fn is_valid_tag_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '_'))
}

fn is_attr_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse `tag[attr<op>"value"]`-shaped tokens. `None` means "not an attribute
/// selector"; classification then falls through to the other token shapes.
fn parse_attr_selector(token: &str) -> Option<SimpleSelector> {
    let open = token.find('[')?;
    if !token.ends_with(']') {
        return None;
    }
    let tag = &token[..open];
    if !tag.is_empty() && !is_valid_tag_name(tag) {
        return None;
    }
    let inner = &token[open + 1..token.len() - 1];
    if inner.contains(']') {
        return None;
    }

    let name_len = inner.find(|c| !is_attr_name_char(c)).unwrap_or(inner.len());
    if name_len == 0 {
        return None;
    }
    let name = &inner[..name_len];
    let mut rest = &inner[name_len..];

    let op = match rest.chars().next() {
        None => AttrOp::Exists,
        Some(c @ ('=' | '~' | '|' | '^' | '$' | '*')) => {
            rest = &rest[c.len_utf8()..];
            // One optional `=` after the operator character.
            rest = rest.strip_prefix('=').unwrap_or(rest);
            match c {
                '=' => AttrOp::Equals,
                '~' => AttrOp::Includes,
                '|' => AttrOp::DashMatch,
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Substring,
            }
        }
        // Junk after the attribute name reads as a bare presence test.
        Some(_) => {
            if rest.contains('"') {
                return None;
            }
            AttrOp::Exists
        }
    };
    let mut value = rest;
    if op != AttrOp::Exists {
        value = value.strip_prefix('"').unwrap_or(value);
        value = value.strip_suffix('"').unwrap_or(value);
        if value.contains('"') {
            return None;
        }
    }
    let check = match op {
        AttrOp::Exists => Check::Attr {
            name: name.to_string(),
            op: AttrOp::Exists,
            value: String::new(),
        },
        _ => Check::Attr {
            name: name.to_string(),
            op,
            value: value.to_string(),
        },
    };
    Some(SimpleSelector {
        tag: (!tag.is_empty()).then(|| tag.to_string()),
        check,
    })
}

/// Classify one comma-free token into a [`SimpleSelector`].
fn parse_simple(token: &str) -> Result<SimpleSelector, SelectorError> {
    if let Some(parsed) = parse_attr_selector(token) {
        return Ok(parsed);
    }
    if let Some((tag, id)) = token.split_once('#') {
        return Ok(SimpleSelector {
            tag: (!tag.is_empty()).then(|| tag.to_string()),
            check: Check::Id(id.to_string()),
        });
    }
    if let Some((tag, classes)) = token.split_once('.') {
        return Ok(SimpleSelector {
            tag: (!tag.is_empty()).then(|| tag.to_string()),
            check: Check::Classes(classes.split('.').map(str::to_string).collect()),
        });
    }
    if let Some((tag, pseudo)) = token.split_once(':') {
        if tag.is_empty() {
            return Err(SelectorError::PseudoWithoutTag);
        }
        let (ptype, pvalue) = match pseudo.split_once('(') {
            Some((ptype, rest)) => match rest.split_once(')') {
                Some((arg, _)) if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric()) => {
                    (ptype, Some(arg))
                }
                // Malformed argument: the whole pseudo string is the
                // (unrecognized) pseudo-class name.
                _ => (pseudo, None),
            },
            None => (pseudo, None),
        };
        if ptype != "nth-of-type" {
            return Err(SelectorError::UnknownPseudoClass(pseudo.to_string()));
        }
        let target: usize = pvalue
            .and_then(|v| v.parse().ok())
            .ok_or(SelectorError::NonNumericNth)?;
        if target < 1 {
            return Err(SelectorError::NthOutOfRange);
        }
        return Ok(SimpleSelector {
            tag: Some(tag.to_string()),
            check: Check::NthOfType { target, count: 0 },
        });
    }
    if token == "*" {
        return Ok(SimpleSelector {
            tag: None,
            check: Check::Always,
        });
    }
    if is_valid_tag_name(token) {
        return Ok(SimpleSelector {
            tag: Some(token.to_string()),
            check: Check::Always,
        });
    }
    Err(SelectorError::Unsupported(token.to_string()))
}

/// Strip whitespace directly after each `,`, then split on whitespace: one
/// token per simple selector or combinator, with comma alternatives fused
/// into a single token.
fn tokenize(selector: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(selector.len());
    let mut chars = selector.chars().peekable();
    while let Some(c) = chars.next() {
        cleaned.push(c);
        if c == ',' {
            while chars.peek().is_some_and(|p| p.is_whitespace()) {
                chars.next();
            }
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}

impl Tree {
    fn select_candidates(
        &self,
        traversal: Traversal,
        ctx: NodeId,
    ) -> Box<dyn Iterator<Item = NodeId> + '_> {
        match traversal {
            Traversal::Descendants => Box::new(self.descendants(ctx)),
            Traversal::Children => Box::new(self.children(ctx)),
            Traversal::NextSiblings => Box::new(self.next_siblings(ctx)),
            Traversal::NextTagSibling => {
                Box::new(self.next_siblings(ctx).filter(|&s| self.is_element(s)).take(1))
            }
        }
    }

    /// Evaluate a CSS selector against this node's subtree.
    ///
    /// Results are in first-match order with duplicates removed; `limit` caps
    /// the result count.
    pub fn select(
        &self,
        id: NodeId,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>, SelectorError> {
        let tokens = tokenize(selector);
        let Some(last) = tokens.last() else {
            return Err(SelectorError::Empty);
        };
        if COMBINATORS.contains(&last.as_str()) {
            return Err(SelectorError::TrailingCombinator(last.clone()));
        }

        let mut context: Vec<NodeId> = vec![id];
        let mut skip_consumed = false;
        for (index, token_group) in tokens.iter().enumerate() {
            if skip_consumed {
                // This token already served as the combinator's argument.
                skip_consumed = false;
                continue;
            }
            let (group_token, traversal) = match token_group.as_str() {
                ">" => (tokens[index + 1].as_str(), Traversal::Children),
                "~" => (tokens[index + 1].as_str(), Traversal::NextSiblings),
                "+" => (tokens[index + 1].as_str(), Traversal::NextTagSibling),
                other => (other, Traversal::Descendants),
            };
            let combinator = traversal != Traversal::Descendants;
            if combinator {
                skip_consumed = true;
            }

            let groups: Vec<&str> = group_token.split(',').collect();
            if groups.iter().any(|g| g.is_empty()) {
                return Err(SelectorError::InvalidGroup(group_token.to_string()));
            }

            let mut new_context: Vec<NodeId> = Vec::new();
            let mut seen: HashSet<NodeId> = HashSet::new();
            'groups: for group in groups {
                let template = parse_simple(group)?;
                // A combinator evaluates its argument afresh for each context
                // node, so stateful checks restart; under descendant
                // traversal one check instance streams across all contexts.
                let mut shared = template.check.clone();
                for &ctx in &context {
                    let mut fresh;
                    let check: &mut Check = if combinator {
                        fresh = template.check.clone();
                        &mut fresh
                    } else {
                        &mut shared
                    };
                    for candidate in self.select_candidates(traversal, ctx) {
                        if !self.is_element(candidate) {
                            continue;
                        }
                        if let Some(tag) = &template.tag
                            && self.name(candidate) != Some(tag.as_str())
                        {
                            continue;
                        }
                        match check.eval(self, candidate) {
                            Verdict::Stop => break,
                            Verdict::NoMatch => {}
                            Verdict::Match => {
                                if seen.insert(candidate) {
                                    new_context.push(candidate);
                                    if limit.is_some_and(|cap| new_context.len() >= cap) {
                                        break 'groups;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            context = new_context;
        }
        if let Some(cap) = limit {
            context.truncate(cap);
        }
        Ok(context)
    }

    /// First match of a CSS selector, if any.
    pub fn select_one(&self, id: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.select(id, selector, Some(1))?.into_iter().next())
    }
}
