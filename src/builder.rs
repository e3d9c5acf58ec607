//! Construction policy: how raw markup-ish input becomes tree nodes.
//!
//! A [`TreePolicy`] captures the per-dialect decisions a parser front-end
//! would make: which attributes are whitespace-separated lists, which tags
//! may self-close when empty, which namespace newly built elements live in,
//! and the `<meta>` charset stand-ins that let a rendered document declare
//! the encoding it is actually written in.

use std::collections::{HashMap, HashSet};

use compact_str::CompactString;
use indexmap::IndexMap;

use crate::serialize::{VOID_TAGS, XHTML_NAMESPACE};
use crate::tree::{AttrValue, ElementData, NodeId, Tree};

/// Attributes treated as whitespace-separated lists, per tag. The `"*"` entry
/// applies to every tag.
const CDATA_LIST_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("*", &["class", "accesskey", "dropzone"]),
    ("a", &["rel", "rev"]),
    ("link", &["rel", "rev"]),
    ("td", &["headers"]),
    ("th", &["headers"]),
    ("form", &["accept-charset"]),
    ("object", &["archive"]),
    ("area", &["rel"]),
    ("icon", &["sizes"]),
    ("iframe", &["sandbox"]),
    ("output", &["for"]),
];

/// Per-dialect element construction policy.
#[derive(Debug, Clone)]
pub struct TreePolicy {
    cdata_list_attributes: HashMap<String, Vec<String>>,
    /// Tags that may render self-closed when empty; `None` means all of them
    /// (the XML convention).
    empty_element_tags: Option<HashSet<String>>,
    /// Namespace assigned to elements built through this policy.
    default_namespace: Option<String>,
}

impl TreePolicy {
    /// The HTML policy: multi-valued attribute splitting, void-tag
    /// self-closing, elements in the XHTML namespace, `<meta>` charset
    /// stand-ins.
    pub fn html() -> Self {
        let cdata_list_attributes = CDATA_LIST_ATTRIBUTES
            .iter()
            .map(|(tag, attrs)| {
                (
                    tag.to_string(),
                    attrs.iter().map(|a| a.to_string()).collect(),
                )
            })
            .collect();
        TreePolicy {
            cdata_list_attributes,
            empty_element_tags: Some(VOID_TAGS.iter().map(|t| t.to_string()).collect()),
            default_namespace: Some(XHTML_NAMESPACE.to_string()),
        }
    }

    /// The XML policy: no attribute splitting, every empty element may
    /// self-close, no default namespace.
    pub fn xml() -> Self {
        TreePolicy {
            cdata_list_attributes: HashMap::new(),
            empty_element_tags: None,
            default_namespace: None,
        }
    }

    /// Is this attribute a whitespace-separated list on this tag?
    pub fn is_multi_valued(&self, tag: &str, attr: &str) -> bool {
        let listed = |key: &str| {
            self.cdata_list_attributes
                .get(key)
                .is_some_and(|attrs| attrs.iter().any(|a| a == attr))
        };
        listed("*") || listed(tag)
    }

    /// May an empty element with this tag render self-closed?
    pub fn can_be_empty(&self, tag: &str) -> bool {
        match &self.empty_element_tags {
            None => true,
            Some(tags) => tags.contains(tag),
        }
    }

    /// Turn a raw attribute string into its stored value, splitting
    /// multi-valued attributes.
    pub fn attr_value(&self, tag: &str, attr: &str, raw: &str) -> AttrValue {
        if self.is_multi_valued(tag, attr) {
            AttrValue::list(raw.split_whitespace())
        } else {
            AttrValue::single(raw)
        }
    }

    /// Build an element under this policy and return its (detached) handle.
    ///
    /// Besides list splitting and the `can_be_empty` mark, this installs the
    /// charset stand-ins on `<meta>` tags so that rendering against an
    /// eventual encoding rewrites the declared charset.
    pub fn element<'r, I>(&self, tree: &mut Tree, name: &str, raw_attrs: I) -> NodeId
    where
        I: IntoIterator<Item = (&'r str, &'r str)>,
    {
        let mut attrs: IndexMap<CompactString, AttrValue> = IndexMap::new();
        for (key, value) in raw_attrs {
            attrs.insert(key.into(), self.attr_value(name, key, value));
        }

        if name == "meta" {
            if let Some(AttrValue::Single(charset)) = attrs.get("charset") {
                let original = charset.clone();
                attrs.insert("charset".into(), AttrValue::CharsetMeta { original });
            } else if let (Some(AttrValue::Single(content)), Some(http_equiv)) =
                (attrs.get("content"), attrs.get("http-equiv"))
                && http_equiv.to_joined().eq_ignore_ascii_case("content-type")
            {
                let original = content.clone();
                attrs.insert("content".into(), AttrValue::ContentMeta { original });
            }
        }

        tree.new_element_with(ElementData {
            name: name.into(),
            namespace: self.default_namespace.clone(),
            prefix: None,
            attrs,
            contents: Vec::new(),
            can_be_empty: self.can_be_empty(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    #[test]
    fn test_class_attribute_is_split() {
        let policy = TreePolicy::html();
        let mut tree = Tree::new();
        let p = policy.element(&mut tree, "p", [("class", "intro  lead"), ("id", "x y")]);
        assert_eq!(
            tree.attr(p, "class"),
            Some(&AttrValue::list(["intro", "lead"]))
        );
        // id is not a list attribute even with a space in it.
        assert_eq!(tree.attr(p, "id"), Some(&AttrValue::single("x y")));
    }

    #[test]
    fn test_per_tag_list_attributes() {
        let policy = TreePolicy::html();
        assert!(policy.is_multi_valued("a", "rel"));
        assert!(!policy.is_multi_valued("p", "rel"));
        assert!(policy.is_multi_valued("td", "headers"));
        assert!(policy.is_multi_valued("span", "class"));
    }

    #[test]
    fn test_void_tags_can_be_empty() {
        let policy = TreePolicy::html();
        let mut tree = Tree::new();
        let br = policy.element(&mut tree, "br", []);
        let p = policy.element(&mut tree, "p", []);
        assert!(tree.is_empty_element(br));
        assert!(!tree.is_empty_element(p));
    }

    #[test]
    fn test_meta_charset_stand_ins() {
        let policy = TreePolicy::html();
        let mut tree = Tree::new();
        let meta = policy.element(&mut tree, "meta", [("charset", "utf8")]);
        assert!(matches!(
            tree.attr(meta, "charset"),
            Some(AttrValue::CharsetMeta { original }) if original == "utf8"
        ));

        let meta = policy.element(
            &mut tree,
            "meta",
            [
                ("http-equiv", "Content-Type"),
                ("content", "text/html; charset=utf8"),
            ],
        );
        assert!(matches!(
            tree.attr(meta, "content"),
            Some(AttrValue::ContentMeta { .. })
        ));

        // An unrelated meta stays plain.
        let meta = policy.element(&mut tree, "meta", [("name", "viewport")]);
        assert_eq!(tree.attr(meta, "name"), Some(&AttrValue::single("viewport")));
    }

    #[test]
    fn test_xml_policy() {
        let policy = TreePolicy::xml();
        let mut tree = Tree::new_xml();
        let item = policy.element(&mut tree, "item", [("class", "a b")]);
        // No splitting, no namespace, every empty element may self-close.
        assert_eq!(tree.attr(item, "class"), Some(&AttrValue::single("a b")));
        assert!(tree.is_empty_element(item));
        assert!(tree.element(item).expect("element").namespace.is_none());
    }
}
