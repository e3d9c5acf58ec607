//! Query engine: criteria bundles and the find-family.
//!
//! A [`Strainer`] bundles up to three criteria — tag name, attribute
//! constraints, and a text constraint — and can be run over any node iterator.
//! The find-family methods on [`Tree`] are thin instantiations of one search
//! loop over the traversal iterators, with a short-circuit at `limit` and fast
//! paths for the two overwhelmingly common queries ("any element", "element by
//! literal name") that skip full criteria evaluation.

use std::fmt;

use compact_str::CompactString;
use indexmap::IndexMap;

use crate::tree::{AttrValue, NodeData, NodeId, Tree};

/// Attribute map type as stored on elements.
pub type Attrs = IndexMap<CompactString, AttrValue>;

/// Text-matching capability.
///
/// Implemented for plain closures; bring your own pattern engine by
/// implementing this on its compiled-pattern type.
pub trait TextPattern {
    fn is_match(&self, text: &str) -> bool;
}

impl<F> TextPattern for F
where
    F: Fn(&str) -> bool,
{
    fn is_match(&self, text: &str) -> bool {
        self(text)
    }
}

/// Substring search, the most common [`TextPattern`].
pub struct Substring(pub String);

impl TextPattern for Substring {
    fn is_match(&self, text: &str) -> bool {
        text.contains(self.0.as_str())
    }
}

/// One matching criterion over an optional string value.
pub enum Matcher {
    /// No constraint; matches everything, including an absent value.
    Any,
    /// Matches any present value.
    Present,
    /// Exact string equality.
    Literal(String),
    /// Membership in a fixed set.
    AnyOf(Vec<String>),
    /// Delegates to a [`TextPattern`]; absent values never match.
    Pattern(Box<dyn TextPattern>),
    /// Arbitrary predicate; the only variant that sees absent values.
    Predicate(Box<dyn Fn(Option<&str>) -> bool>),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => write!(f, "Any"),
            Matcher::Present => write!(f, "Present"),
            Matcher::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Matcher::AnyOf(v) => f.debug_tuple("AnyOf").field(v).finish(),
            Matcher::Pattern(_) => write!(f, "Pattern(..)"),
            Matcher::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl Matcher {
    pub fn literal(value: impl Into<String>) -> Self {
        Matcher::Literal(value.into())
    }

    pub fn any_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Matcher::AnyOf(values.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: impl TextPattern + 'static) -> Self {
        Matcher::Pattern(Box::new(pattern))
    }

    pub fn predicate(f: impl Fn(Option<&str>) -> bool + 'static) -> Self {
        Matcher::Predicate(Box::new(f))
    }

    /// Match against a single (possibly absent) string value.
    pub fn matches_str(&self, value: Option<&str>) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Present => value.is_some(),
            Matcher::Literal(lit) => value == Some(lit.as_str()),
            Matcher::AnyOf(set) => value.is_some_and(|v| set.iter().any(|s| s == v)),
            Matcher::Pattern(p) => value.is_some_and(|v| p.is_match(v)),
            Matcher::Predicate(f) => f(value),
        }
    }

    /// Match against a (possibly absent) attribute value.
    ///
    /// Multi-valued attributes recurse element-wise, except that a
    /// space-containing literal demands exact whitespace-split equality with
    /// the whole list. A bare attribute matches as the empty string.
    pub fn matches_attr(&self, value: Option<&AttrValue>) -> bool {
        match value {
            None => match self {
                Matcher::Any => true,
                Matcher::Predicate(f) => f(None),
                _ => false,
            },
            Some(AttrValue::List(items)) => {
                if let Matcher::Literal(lit) = self
                    && lit.contains(char::is_whitespace)
                {
                    // "class1 class2" against a multi-valued attribute means
                    // the exact list, not a substring of one item.
                    let parts: Vec<&str> = lit.split_whitespace().collect();
                    return items.len() == parts.len()
                        && items.iter().zip(&parts).all(|(item, part)| item == part);
                }
                match self {
                    Matcher::Any | Matcher::Present => true,
                    _ => items.iter().any(|item| self.matches_str(Some(item))),
                }
            }
            Some(v) => self.matches_str(Some(&v.to_joined())),
        }
    }
}

/// Name criterion: a plain [`Matcher`] over the tag name, or a predicate over
/// the whole `(name, attrs)` pair whose verdict bypasses the attribute
/// criteria entirely.
pub enum NameRule {
    Rule(Matcher),
    TagFn(Box<dyn Fn(&str, &Attrs) -> bool>),
}

impl fmt::Debug for NameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRule::Rule(m) => f.debug_tuple("Rule").field(m).finish(),
            NameRule::TagFn(_) => write!(f, "TagFn(..)"),
        }
    }
}

/// A bundle of matching criteria, built in the builder style.
///
/// ```
/// use loam::{Matcher, Strainer};
///
/// let headers = Strainer::tag("th").attr("scope", Matcher::literal("col"));
/// let _ = headers;
/// ```
#[derive(Debug)]
pub struct Strainer {
    name: NameRule,
    attrs: Vec<(String, Matcher)>,
    text: Option<Matcher>,
}

impl Strainer {
    /// Matches every element (and no text node).
    pub fn any() -> Self {
        Strainer {
            name: NameRule::Rule(Matcher::Any),
            attrs: Vec::new(),
            text: None,
        }
    }

    /// Matches elements with exactly this tag name.
    pub fn tag(name: impl Into<String>) -> Self {
        Strainer::with_name(Matcher::literal(name))
    }

    /// Matches elements whose tag name satisfies the matcher.
    pub fn with_name(matcher: Matcher) -> Self {
        Strainer {
            name: NameRule::Rule(matcher),
            attrs: Vec::new(),
            text: None,
        }
    }

    /// Matches elements for which the predicate over `(name, attrs)` holds;
    /// any `attr` criteria added afterwards are ignored by evaluation.
    pub fn tag_fn(f: impl Fn(&str, &Attrs) -> bool + 'static) -> Self {
        Strainer {
            name: NameRule::TagFn(Box::new(f)),
            attrs: Vec::new(),
            text: None,
        }
    }

    /// Add an attribute criterion; all criteria must hold.
    pub fn attr(mut self, name: impl Into<String>, matcher: Matcher) -> Self {
        self.attrs.push((name.into(), matcher));
        self
    }

    /// Add a text criterion. On elements this is checked against the node's
    /// single string; a strainer with *only* a text criterion matches text
    /// nodes instead of elements.
    pub fn text(mut self, matcher: Matcher) -> Self {
        self.text = Some(matcher);
        self
    }

    fn is_nameless(&self) -> bool {
        matches!(self.name, NameRule::Rule(Matcher::Any))
    }

    /// Evaluate the name and attribute criteria against an element, then gate
    /// on the text criterion.
    fn matches_element(&self, tree: &Tree, id: NodeId, name: &str, attrs: &Attrs) -> bool {
        let found = match &self.name {
            NameRule::TagFn(f) => f(name, attrs),
            NameRule::Rule(m) => {
                m.matches_str(Some(name))
                    && self
                        .attrs
                        .iter()
                        .all(|(key, m)| m.matches_attr(attrs.get(key.as_str())))
            }
        };
        match (&self.text, found) {
            (Some(text_matcher), true) => text_matcher.matches_str(tree.string(id)),
            _ => found,
        }
    }

    /// Full evaluation against any node.
    pub fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        match tree.data(id) {
            NodeData::Element(el) => {
                // A text-only strainer searches for strings, not tags.
                if self.text.is_some() && self.is_nameless() && self.attrs.is_empty() {
                    return false;
                }
                self.matches_element(tree, id, &el.name, &el.attrs)
            }
            NodeData::Text(t) => {
                self.is_nameless()
                    && self.attrs.is_empty()
                    && self
                        .text
                        .as_ref()
                        .is_some_and(|m| m.matches_str(Some(&t.text)))
            }
            NodeData::Root { .. } => false,
        }
    }
}

/// How a particular strainer can be evaluated over a candidate stream.
enum SearchMode<'a> {
    /// No criteria beyond "is an element".
    AnyElement,
    /// Single literal-name criterion.
    ByName(&'a str),
    /// Anything else gets full evaluation.
    Full,
}

impl Strainer {
    fn search_mode(&self) -> SearchMode<'_> {
        if self.attrs.is_empty() && self.text.is_none() {
            match &self.name {
                NameRule::Rule(Matcher::Any) => return SearchMode::AnyElement,
                NameRule::Rule(Matcher::Literal(name)) => return SearchMode::ByName(name),
                _ => {}
            }
        }
        SearchMode::Full
    }
}

impl Tree {
    /// Run a strainer over an arbitrary candidate stream, stopping at `limit`
    /// matches.
    pub fn find_in<I>(&self, candidates: I, strainer: &Strainer, limit: Option<usize>) -> Vec<NodeId>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut results = Vec::new();
        if limit == Some(0) {
            return results;
        }
        let mode = strainer.search_mode();
        for id in candidates {
            let hit = match mode {
                SearchMode::AnyElement => self.is_element(id),
                SearchMode::ByName(name) => self.name(id) == Some(name),
                SearchMode::Full => strainer.matches(self, id),
            };
            if hit {
                results.push(id);
                if limit.is_some_and(|cap| results.len() >= cap) {
                    break;
                }
            }
        }
        results
    }

    /// All matches within this node: descendants, or direct children only
    /// when `recursive` is off.
    pub fn find_all(
        &self,
        id: NodeId,
        strainer: &Strainer,
        recursive: bool,
        limit: Option<usize>,
    ) -> Vec<NodeId> {
        if recursive {
            self.find_in(self.descendants(id), strainer, limit)
        } else {
            self.find_in(self.children(id), strainer, limit)
        }
    }

    /// First match within this node's descendants.
    pub fn find(&self, id: NodeId, strainer: &Strainer) -> Option<NodeId> {
        self.find_all(id, strainer, true, Some(1)).into_iter().next()
    }

    /// All matches after this node in document order.
    pub fn find_all_next(&self, id: NodeId, strainer: &Strainer, limit: Option<usize>) -> Vec<NodeId> {
        self.find_in(self.next_elements(id), strainer, limit)
    }

    /// First match after this node in document order.
    pub fn find_next(&self, id: NodeId, strainer: &Strainer) -> Option<NodeId> {
        self.find_all_next(id, strainer, Some(1)).into_iter().next()
    }

    /// All matching later siblings.
    pub fn find_next_siblings(
        &self,
        id: NodeId,
        strainer: &Strainer,
        limit: Option<usize>,
    ) -> Vec<NodeId> {
        self.find_in(self.next_siblings(id), strainer, limit)
    }

    /// First matching later sibling.
    pub fn find_next_sibling(&self, id: NodeId, strainer: &Strainer) -> Option<NodeId> {
        self.find_next_siblings(id, strainer, Some(1)).into_iter().next()
    }

    /// All matches before this node in document order, nearest first.
    pub fn find_all_previous(
        &self,
        id: NodeId,
        strainer: &Strainer,
        limit: Option<usize>,
    ) -> Vec<NodeId> {
        self.find_in(self.prev_elements(id), strainer, limit)
    }

    /// First match before this node in document order.
    pub fn find_previous(&self, id: NodeId, strainer: &Strainer) -> Option<NodeId> {
        self.find_all_previous(id, strainer, Some(1)).into_iter().next()
    }

    /// All matching earlier siblings, nearest first.
    pub fn find_previous_siblings(
        &self,
        id: NodeId,
        strainer: &Strainer,
        limit: Option<usize>,
    ) -> Vec<NodeId> {
        self.find_in(self.prev_siblings(id), strainer, limit)
    }

    /// First matching earlier sibling.
    pub fn find_previous_sibling(&self, id: NodeId, strainer: &Strainer) -> Option<NodeId> {
        self.find_previous_siblings(id, strainer, Some(1))
            .into_iter()
            .next()
    }

    /// All matching ancestors, nearest first.
    pub fn find_parents(&self, id: NodeId, strainer: &Strainer, limit: Option<usize>) -> Vec<NodeId> {
        self.find_in(self.ancestors(id), strainer, limit)
    }

    /// Nearest matching ancestor.
    pub fn find_parent(&self, id: NodeId, strainer: &Strainer) -> Option<NodeId> {
        self.find_parents(id, strainer, Some(1)).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    /// `<div><p class="intro lead">hi</p><p id="x">bye</p><span>hi</span></div>`
    fn sample(tree: &mut Tree) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = tree.root();
        let div = tree.new_element("div");
        tree.append(root, div).expect("append div");

        let p1 = tree.new_element("p");
        tree.set_attr(p1, "class", AttrValue::list(["intro", "lead"]));
        tree.append(div, p1).expect("append p1");
        let t1 = tree.new_text("hi");
        tree.append(p1, t1).expect("append t1");

        let p2 = tree.new_element("p");
        tree.set_attr(p2, "id", AttrValue::single("x"));
        tree.append(div, p2).expect("append p2");
        let t2 = tree.new_text("bye");
        tree.append(p2, t2).expect("append t2");

        let span = tree.new_element("span");
        tree.append(div, span).expect("append span");
        let t3 = tree.new_text("hi");
        tree.append(span, t3).expect("append t3");

        (div, p1, p2, span)
    }

    #[test]
    fn test_find_all_by_name() {
        let mut tree = Tree::new();
        let (div, p1, p2, _) = sample(&mut tree);
        let ps = tree.find_all(div, &Strainer::tag("p"), true, None);
        assert_eq!(ps, vec![p1, p2]);
    }

    #[test]
    fn test_find_all_any_element_skips_text() {
        let mut tree = Tree::new();
        let (div, p1, p2, span) = sample(&mut tree);
        let all = tree.find_all(div, &Strainer::any(), true, None);
        assert_eq!(all, vec![p1, p2, span]);
    }

    #[test]
    fn test_find_all_non_recursive() {
        let mut tree = Tree::new();
        let (div, ..) = sample(&mut tree);
        let root = tree.root();
        let top = tree.find_all(root, &Strainer::any(), false, None);
        assert_eq!(top, vec![div]);
    }

    #[test]
    fn test_limit_short_circuits() {
        let mut tree = Tree::new();
        let (div, p1, ..) = sample(&mut tree);
        let first = tree.find_all(div, &Strainer::tag("p"), true, Some(1));
        assert_eq!(first, vec![p1]);
        assert!(tree.find_all(div, &Strainer::any(), true, Some(0)).is_empty());
    }

    #[test]
    fn test_attr_criteria() {
        let mut tree = Tree::new();
        let (div, p1, p2, _) = sample(&mut tree);

        // Single class name against a multi-valued attribute.
        let by_class = Strainer::any().attr("class", Matcher::literal("lead"));
        assert_eq!(tree.find_all(div, &by_class, true, None), vec![p1]);

        // Space-containing literal demands the exact list.
        let exact = Strainer::any().attr("class", Matcher::literal("intro lead"));
        assert_eq!(tree.find_all(div, &exact, true, None), vec![p1]);
        let wrong_order = Strainer::any().attr("class", Matcher::literal("lead intro"));
        assert!(tree.find_all(div, &wrong_order, true, None).is_empty());

        let by_id = Strainer::tag("p").attr("id", Matcher::Present);
        assert_eq!(tree.find_all(div, &by_id, true, None), vec![p2]);

        // Predicate is the one matcher that sees absent attributes.
        let no_id = Strainer::tag("p").attr("id", Matcher::predicate(|v| v.is_none()));
        assert_eq!(tree.find_all(div, &no_id, true, None), vec![p1]);
    }

    #[test]
    fn test_name_matchers() {
        let mut tree = Tree::new();
        let (div, p1, p2, span) = sample(&mut tree);

        let either = Strainer::with_name(Matcher::any_of(["p", "span"]));
        assert_eq!(tree.find_all(div, &either, true, None), vec![p1, p2, span]);

        let pat = Strainer::with_name(Matcher::pattern(Substring("pa".to_string())));
        assert_eq!(tree.find_all(div, &pat, true, None), vec![span]);

        let with_attrs = Strainer::tag_fn(|name, attrs| name == "p" && attrs.contains_key("id"));
        assert_eq!(tree.find_all(div, &with_attrs, true, None), vec![p2]);
    }

    #[test]
    fn test_text_criterion() {
        let mut tree = Tree::new();
        let (div, p1, _, span) = sample(&mut tree);

        // Text-only strainer matches text nodes, never elements.
        let hi = Strainer::any().text(Matcher::literal("hi"));
        let hits = tree.find_all(div, &hi, true, None);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|&id| tree.is_text(id)));

        // Combined with a name criterion it gates element matches instead.
        let p_hi = Strainer::tag("p").text(Matcher::literal("hi"));
        assert_eq!(tree.find_all(div, &p_hi, true, None), vec![p1]);
        let span_hi = Strainer::tag("span").text(Matcher::literal("hi"));
        assert_eq!(tree.find_all(div, &span_hi, true, None), vec![span]);
    }

    #[test]
    fn test_directional_finds() {
        let mut tree = Tree::new();
        let (_, p1, p2, span) = sample(&mut tree);
        let any_p = Strainer::tag("p");

        assert_eq!(tree.find_next(p1, &any_p), Some(p2));
        assert_eq!(tree.find_previous(span, &any_p), Some(p2));
        assert_eq!(tree.find_next_sibling(p1, &Strainer::tag("span")), Some(span));
        assert_eq!(tree.find_previous_sibling(span, &any_p), Some(p2));
        assert_eq!(
            tree.find_previous_siblings(span, &any_p, None),
            vec![p2, p1]
        );
        assert_eq!(tree.find_parent(p1, &Strainer::tag("div")), tree.parent(p1));
        assert_eq!(tree.find_parent(p1, &Strainer::tag("table")), None);
    }

    #[test]
    fn test_find_next_crosses_subtrees() {
        let mut tree = Tree::new();
        let (_, p1, _, _) = sample(&mut tree);
        // From inside p1's text, the next <span> lives in a sibling subtree.
        let t1 = tree.contents(p1)[0];
        let span = tree.find_next(t1, &Strainer::tag("span"));
        assert!(span.is_some());
    }
}
