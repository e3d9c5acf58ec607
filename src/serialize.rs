//! Markup output: entity substitution policies and the four renderers.
//!
//! All renderers walk the tree immutably and build a `String`; nothing here
//! mutates the tree, including the whitespace-collapse decision in
//! [`Tree::render_xml`]. The renderers are:
//!
//! - [`Tree::render`] / [`Tree::prettify`] — the generic encoder, compact or
//!   with one indentation step per nesting level
//! - [`Tree::render_xml`] — XML flavored: a fixed set of container tags
//!   escalates indentation, and a collapsible element holding only
//!   whitespace renders self-closed
//! - [`Tree::render_xhtml`] — compact XHTML with line breaks only around
//!   `html` and `body`
//! - [`Tree::render_xhtml_pretty`] — reflowing pretty-printer that collapses
//!   whitespace runs and breaks lines around block-level tags while keeping
//!   inline runs intact

use std::sync::Arc;

use crate::tree::{AttrValue, ElementData, NodeData, NodeId, TextKind, Tree};

/// The XHTML namespace; elements outside it may self-close when empty in the
/// XHTML renderers.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

// =============================================================================
// Tag classification
// =============================================================================

/// Tags that do not force a line break in the pretty-printers.
pub const NON_BREAKING_INLINE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "bdo", "big", "br", "button", "cite", "code", "del", "dfn", "em",
    "font", "i", "image", "img", "input", "ins", "kbd", "label", "map", "mark", "nobr", "object",
    "q", "ruby", "rt", "s", "samp", "select", "small", "span", "strike", "strong", "sub", "sup",
    "textarea", "tt", "u", "var", "wbr", "mbp:nu",
];

/// Tags whose text content keeps its whitespace verbatim.
pub const PRESERVE_WHITESPACE_TAGS: &[&str] = &["code", "pre", "textarea", "script", "style"];

/// Tags with no closing tag.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "command", "embed", "event-source",
    "frame", "hr", "img", "input", "keygen", "link", "meta", "param", "source", "spacer", "track",
    "wbr", "mbp:pagebreak",
];

/// Tags whose direct text children never undergo entity substitution in HTML
/// trees.
pub const NO_ENTITY_SUB_TAGS: &[&str] = &["script", "style"];

/// Tags that get line breaks around their content in the compact XHTML
/// renderer.
pub const SPECIAL_HANDLING_TAGS: &[&str] = &["html", "body"];

/// Block-level tags that own their indentation in the XHTML pretty-printer.
pub const STRUCTURAL_TAGS: &[&str] = &[
    "article", "aside", "blockquote", "body", "canvas", "colgroup", "div", "dl", "figure",
    "footer", "head", "header", "hr", "html", "ol", "section", "table", "tbody", "tfoot", "thead",
    "td", "th", "tr", "ul",
];

/// Non-structural tags that still directly hold text.
pub const OTHER_TEXTHOLDING_TAGS: &[&str] = &[
    "address", "caption", "dd", "div", "dt", "figcaption", "h1", "h2", "h3", "h4", "h5", "h6",
    "legend", "li", "option", "p", "td", "th", "title",
];

/// Container tags that escalate indentation in the XML renderer (the spine of
/// an EPUB package document).
pub const XML_PARENT_TAGS: &[&str] = &[
    "package", "metadata", "manifest", "spine", "guide", "ncx", "head", "doctitle", "docauthor",
    "navmap", "navpoint", "navlabel", "pagelist", "pagetarget",
];

fn is_inline(name: &str) -> bool {
    NON_BREAKING_INLINE_TAGS.contains(&name)
}

fn is_structural(name: &str) -> bool {
    STRUCTURAL_TAGS.contains(&name)
}

// =============================================================================
// Entity substitution
// =============================================================================

/// Characters with well-known named entities, substituted by
/// [`Formatter::Html`].
const NAMED_ENTITIES: &[(char, &str)] = &[
    ('&', "amp"),
    ('<', "lt"),
    ('>', "gt"),
    ('"', "quot"),
    ('\u{00a0}', "nbsp"),
    ('\u{00a9}', "copy"),
    ('\u{00ae}', "reg"),
    ('\u{00b0}', "deg"),
    ('\u{00b7}', "middot"),
    ('\u{00a7}', "sect"),
    ('\u{2014}', "mdash"),
    ('\u{2013}', "ndash"),
    ('\u{2018}', "lsquo"),
    ('\u{2019}', "rsquo"),
    ('\u{201c}', "ldquo"),
    ('\u{201d}', "rdquo"),
    ('\u{2026}', "hellip"),
    ('\u{2122}', "trade"),
];

/// Does `rest` (the text after a `&`) begin with something entity-shaped?
fn starts_entity(rest: &str) -> bool {
    let check = |body: &str, valid: fn(char) -> bool| {
        body.find(';')
            .is_some_and(|n| n > 0 && body[..n].chars().all(valid))
    };
    if let Some(body) = rest.strip_prefix("#x").or_else(|| rest.strip_prefix("#X")) {
        check(body, |c| c.is_ascii_hexdigit())
    } else if let Some(body) = rest.strip_prefix('#') {
        check(body, |c| c.is_ascii_digit())
    } else {
        check(rest, |c| c.is_alphanumeric() || c == '_')
    }
}

/// Minimal escaping: `<`, `>`, and any `&` that does not already start an
/// entity reference.
fn substitute_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if !starts_entity(&s[i + 1..]) => out.push_str("&amp;"),
            other => out.push(other),
        }
    }
    out
}

/// Named-entity substitution for every character in the table.
fn substitute_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match NAMED_ENTITIES.iter().find(|(ch, _)| *ch == c) {
            Some((_, name)) => {
                out.push('&');
                out.push_str(name);
                out.push(';');
            }
            None => out.push(c),
        }
    }
    out
}

/// Wrap an attribute value in quotes: double by default, single when the
/// value itself contains double quotes, entity-escaped when it contains both.
fn quoted_attribute_value(value: &str) -> String {
    if value.contains('"') {
        if value.contains('\'') {
            format!("\"{}\"", value.replace('"', "&quot;"))
        } else {
            format!("'{value}'")
        }
    } else {
        format!("\"{value}\"")
    }
}

// =============================================================================
// Options
// =============================================================================

/// Entity substitution policy for text and attribute values.
#[derive(Clone)]
pub enum Formatter {
    /// Substitute every character that has a well-known named entity.
    Html,
    /// Escape `& < >` only, leaving existing entity references alone.
    Minimal,
    /// No substitution at all.
    None,
    /// Caller-supplied transform applied to every string.
    Custom(Arc<dyn Fn(&str) -> String>),
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Formatter::Html => write!(f, "Html"),
            Formatter::Minimal => write!(f, "Minimal"),
            Formatter::None => write!(f, "None"),
            Formatter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Rendering options shared by all renderers.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub formatter: Formatter,
    /// One indentation step.
    pub indent: String,
    /// Encoding the output is destined for; substituted into charset
    /// stand-in attributes. `None` leaves them untouched.
    pub eventual_encoding: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            formatter: Formatter::Minimal,
            indent: " ".to_string(),
            eventual_encoding: Some("utf-8".to_string()),
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn eventual_encoding(mut self, encoding: Option<String>) -> Self {
        self.eventual_encoding = encoding;
        self
    }
}

// =============================================================================
// Serializer
// =============================================================================

struct Serializer<'a> {
    tree: &'a Tree,
    opts: &'a RenderOptions,
}

impl<'a> Serializer<'a> {
    fn new(tree: &'a Tree, opts: &'a RenderOptions) -> Self {
        Serializer { tree, opts }
    }

    fn indent_space(&self, level: usize) -> String {
        self.opts.indent.repeat(level.saturating_sub(1))
    }

    /// Apply the formatter to a bare string (attribute values).
    fn format_value(&self, s: &str) -> String {
        match &self.opts.formatter {
            Formatter::None => s.to_string(),
            Formatter::Minimal => substitute_xml(s),
            Formatter::Html => substitute_html(s),
            Formatter::Custom(f) => f(s),
        }
    }

    /// Apply the formatter to a plain text node, honoring the script/style
    /// exemption in HTML trees.
    fn format_text(&self, id: NodeId, s: &str) -> String {
        if !self.tree.is_xml()
            && matches!(self.opts.formatter, Formatter::Html | Formatter::Minimal)
            && self
                .tree
                .parent(id)
                .and_then(|p| self.tree.name(p))
                .is_some_and(|name| NO_ENTITY_SUB_TAGS.contains(&name))
        {
            return s.to_string();
        }
        self.format_value(s)
    }

    /// A text node as it appears in output. Preformatted payloads get their
    /// literal wrapper and bypass substitution.
    fn output_ready(&self, id: NodeId) -> String {
        let t = self
            .tree
            .text_data(id)
            .expect("output_ready is only called on text nodes");
        match t.kind {
            TextKind::Plain => self.format_text(id, &t.text),
            kind => format!("{}{}{}", kind.prefix(), t.text, kind.suffix()),
        }
    }

    /// The `" key=\"value\" ..."` string, keys sorted, or `""`.
    fn attribute_string(&self, el: &ElementData) -> String {
        let mut pairs: Vec<(&str, &AttrValue)> =
            el.attrs.iter().map(|(k, v)| (k.as_str(), v)).collect();
        pairs.sort_unstable_by_key(|(k, _)| *k);
        let mut parts: Vec<String> = Vec::with_capacity(pairs.len());
        for (key, val) in pairs {
            match val {
                AttrValue::Bare => parts.push(key.to_string()),
                _ => {
                    let value = val.encoded_for(self.opts.eventual_encoding.as_deref());
                    let formatted = self.format_value(&value);
                    parts.push(format!("{key}={}", quoted_attribute_value(&formatted)));
                }
            }
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" {}", parts.join(" "))
        }
    }

    fn prefixed_name(el: &ElementData) -> String {
        match &el.prefix {
            Some(prefix) => format!("{prefix}:{}", el.name),
            None => el.name.to_string(),
        }
    }

    // -------------------------------------------------------------------------
    // Generic encoder
    // -------------------------------------------------------------------------

    fn should_pretty_print(&self, name: &str, indent_level: Option<usize>) -> bool {
        indent_level.is_some() && ((name != "pre" && !is_inline(name)) || self.tree.is_xml())
    }

    fn decode(&self, id: NodeId, indent_level: Option<usize>) -> String {
        let el = match self.tree.data(id) {
            NodeData::Text(_) => return self.output_ready(id),
            NodeData::Root { .. } => {
                let indent_contents = indent_level.map(|l| l + 1);
                return self.decode_contents(id, indent_contents);
            }
            NodeData::Element(el) => el,
        };

        let attrs = self.attribute_string(el);
        let name = Self::prefixed_name(el);
        let (close, close_tag) = if self.tree.is_empty_element(id) {
            ("/", String::new())
        } else {
            ("", format!("</{name}>"))
        };

        let pretty_print = self.should_pretty_print(&el.name, indent_level);
        let indent_space = indent_level.map(|l| self.indent_space(l)).unwrap_or_default();
        let indent_contents = if pretty_print {
            indent_level.map(|l| l + 1)
        } else {
            None
        };
        let contents = self.decode_contents(id, indent_contents);

        let mut s = String::new();
        if indent_level.is_some() {
            // Even a non-pretty-printed tag is indented up to its start.
            s.push_str(&indent_space);
        }
        s.push_str(&format!("<{name}{attrs}{close}>"));
        if pretty_print {
            s.push('\n');
        }
        s.push_str(&contents);
        if pretty_print && !contents.is_empty() && !contents.ends_with('\n') {
            s.push('\n');
        }
        if pretty_print && !close_tag.is_empty() {
            s.push_str(&indent_space);
        }
        s.push_str(&close_tag);
        if indent_level.is_some() && !close_tag.is_empty() && self.tree.next_sibling(id).is_some() {
            s.push('\n');
        }
        s
    }

    fn decode_contents(&self, id: NodeId, indent_level: Option<usize>) -> String {
        let pretty_print = indent_level.is_some();
        let in_pre = self.tree.name(id) == Some("pre");
        let mut s = String::new();
        for &child in self.tree.contents(id) {
            if self.tree.is_text(child) {
                let mut text = self.output_ready(child);
                if indent_level.is_some_and(|l| l != 0) && !in_pre {
                    text = text.trim().to_string();
                }
                if !text.is_empty() {
                    if pretty_print && !in_pre {
                        s.push_str(&self.indent_space(indent_level.unwrap_or(0)));
                    }
                    s.push_str(&text);
                    if pretty_print && !in_pre {
                        s.push('\n');
                    }
                }
            } else {
                s.push_str(&self.decode(child, indent_level));
            }
        }
        s
    }

    // -------------------------------------------------------------------------
    // XML renderer
    // -------------------------------------------------------------------------

    /// An element counts as empty here when it is marked collapsible and its
    /// single string, if any, is pure whitespace. The tree itself is left
    /// untouched.
    fn xml_effectively_empty(&self, id: NodeId, el: &ElementData) -> bool {
        if !el.can_be_empty {
            return false;
        }
        el.contents.is_empty()
            || self
                .tree
                .string(id)
                .is_some_and(|s| s.trim().is_empty())
    }

    fn decodexml(&self, id: NodeId, indent_level: usize) -> String {
        let el = match self.tree.data(id) {
            NodeData::Text(_) => return self.output_ready(id),
            NodeData::Root { .. } => {
                return self.decodexml_contents(id, indent_level + 1);
            }
            NodeData::Element(el) => el,
        };

        let is_xmlparent = XML_PARENT_TAGS.contains(&el.name.to_lowercase().as_str());
        let attrs = self.attribute_string(el);
        let name = Self::prefixed_name(el);

        let effectively_empty = self.xml_effectively_empty(id, el);
        let (close, close_tag) = if effectively_empty {
            ("/", String::new())
        } else {
            ("", format!("</{name}>"))
        };

        let indent_space = self.indent_space(indent_level);
        let indent_contents = if is_xmlparent {
            indent_level + 1
        } else {
            indent_level
        };
        let contents = if effectively_empty {
            String::new()
        } else {
            self.decodexml_contents(id, indent_contents)
        };

        let mut s = String::new();
        s.push_str(&indent_space);
        s.push_str(&format!("<{name}{attrs}{close}>"));
        if is_xmlparent {
            s.push('\n');
        }
        s.push_str(&contents);
        if (!contents.is_empty() && !contents.ends_with('\n') && is_xmlparent) || effectively_empty
        {
            s.push('\n');
        }
        if !close_tag.is_empty() && is_xmlparent {
            s.push_str(&indent_space);
        }
        s.push_str(&close_tag);
        if !close_tag.is_empty() && self.tree.next_sibling(id).is_some() {
            s.push('\n');
        }
        s
    }

    fn decodexml_contents(&self, id: NodeId, indent_level: usize) -> String {
        let is_xmlparent = self
            .tree
            .name(id)
            .is_some_and(|n| XML_PARENT_TAGS.contains(&n.to_lowercase().as_str()));
        let mut s = String::new();
        for &child in self.tree.contents(id) {
            if self.tree.is_text(child) {
                let text = self.output_ready(child);
                let text = text.trim();
                if !text.is_empty() {
                    if is_xmlparent && s.is_empty() {
                        s.push_str(&self.indent_space(indent_level));
                    }
                    s.push_str(text);
                }
            } else {
                s.push_str(&self.decodexml(child, indent_level));
            }
        }
        s
    }

    // -------------------------------------------------------------------------
    // Compact XHTML renderer
    // -------------------------------------------------------------------------

    fn serialize_xhtml(&self, id: NodeId) -> String {
        let el = match self.tree.data(id) {
            NodeData::Text(_) => return self.output_ready(id),
            NodeData::Root { .. } => return self.serialize_xhtml_contents(id),
            NodeData::Element(el) => el,
        };

        let attrs = self.attribute_string(el);
        let name = Self::prefixed_name(el);
        let mut contents = self.serialize_xhtml_contents(id);

        let in_xml_ns = el.namespace.as_deref() != Some(XHTML_NAMESPACE);
        let special = SPECIAL_HANDLING_TAGS.contains(&el.name.as_str());
        let (close, close_tag) =
            if VOID_TAGS.contains(&el.name.as_str()) || (in_xml_ns && contents.trim().is_empty()) {
                ("/", String::new())
            } else {
                ("", format!("</{name}>"))
            };

        if special {
            contents = format!("{}\n", contents.trim());
        }

        let mut s = String::new();
        s.push_str(&format!("<{name}{attrs}{close}>"));
        if special {
            s.push('\n');
        }
        s.push_str(&contents);
        s.push_str(&close_tag);
        if special {
            s.push('\n');
        }
        s
    }

    fn serialize_xhtml_contents(&self, id: NodeId) -> String {
        let mut s = String::new();
        for &child in self.tree.contents(id) {
            if self.tree.is_text(child) {
                s.push_str(&self.output_ready(child));
            } else {
                s.push_str(&self.serialize_xhtml(child));
            }
        }
        s
    }

    // -------------------------------------------------------------------------
    // Reflowing XHTML pretty-printer
    // -------------------------------------------------------------------------

    fn prettyprint_xhtml(&self, id: NodeId, indent_level: usize) -> String {
        let el = match self.tree.data(id) {
            NodeData::Text(_) => return self.output_ready(id),
            NodeData::Root { .. } => return self.prettyprint_xhtml_contents(id, indent_level),
            NodeData::Element(el) => el,
        };

        let structural = is_structural(&el.name);
        let inline = is_inline(&el.name);
        let keep_whitespace = PRESERVE_WHITESPACE_TAGS.contains(&el.name.as_str());
        let is_void = VOID_TAGS.contains(&el.name.as_str());

        let attrs = self.attribute_string(el);
        let name = Self::prefixed_name(el);

        let mut contents = if is_void {
            String::new()
        } else if structural {
            self.prettyprint_xhtml_contents(id, indent_level + 1)
        } else {
            self.prettyprint_xhtml_contents(id, indent_level)
        };

        let in_xml_ns = el.namespace.as_deref() != Some(XHTML_NAMESPACE);
        let single = is_void || (in_xml_ns && contents.trim().is_empty());

        if !keep_whitespace && !inline {
            contents = contents.trim_end().to_string();
        }

        let indent_space = self.indent_space(indent_level);

        if single {
            let tag = format!("<{name}{attrs}/>");
            if inline {
                // A br directly inside a block always breaks the line.
                let parent_structural = self
                    .tree
                    .parent(id)
                    .and_then(|p| self.tree.name(p))
                    .is_some_and(is_structural);
                if el.name == "br" && parent_structural {
                    return format!("{tag}\n");
                }
                return tag;
            }
            return format!("{indent_space}{tag}\n");
        }

        let start_tag = format!("<{name}{attrs}>");
        let close_tag = format!("</{name}>");
        if structural {
            let mut out = format!("{indent_space}{start_tag}");
            if !contents.is_empty() {
                out.push('\n');
                out.push_str(&contents);
                out.push('\n');
                out.push_str(&indent_space);
            }
            out.push_str(&close_tag);
            out.push('\n');
            out
        } else if inline {
            format!("{start_tag}{contents}{close_tag}")
        } else {
            if !keep_whitespace {
                contents = contents.trim_start().to_string();
            }
            format!("{indent_space}{start_tag}{contents}{close_tag}\n")
        }
    }

    fn prettyprint_xhtml_contents(&self, id: NodeId, indent_level: usize) -> String {
        let (parent_name, is_root) = match self.tree.data(id) {
            NodeData::Root { .. } => (None, true),
            NodeData::Element(el) => (Some(el.name.as_str()), false),
            NodeData::Text(_) => return String::new(),
        };
        let structural = parent_name.is_some_and(is_structural);
        let inline = parent_name.is_some_and(is_inline);
        let keep_whitespace =
            parent_name.is_some_and(|n| PRESERVE_WHITESPACE_TAGS.contains(&n));
        let text_holding =
            parent_name.is_some_and(|n| OTHER_TEXTHOLDING_TAGS.contains(&n));
        let indent_space = self.indent_space(indent_level);

        // last_char drives the whitespace-collapse state machine.
        let mut last_char = if structural || is_root { '\n' } else { 'x' };
        let mut contains_block_tags = false;
        let mut s: Vec<String> = Vec::new();

        for &child in self.tree.contents(id) {
            match self.tree.data(child) {
                NodeData::Text(t) if matches!(t.kind, TextKind::Comment | TextKind::Cdata) => {
                    s.push(self.output_ready(child));
                }
                NodeData::Text(_) => {
                    let text = self.output_ready(child);
                    if text.trim().is_empty() {
                        if keep_whitespace {
                            s.push(text);
                        } else if inline || text_holding {
                            // Collapse a whitespace run to a single space.
                            if !matches!(last_char, ' ' | '\t' | '\x0b' | '\x0c' | '\r' | '\n') {
                                s.push(" ".to_string());
                            }
                        }
                    } else if structural && last_char == '\n' {
                        s.push(indent_space.clone());
                        s.push(text.trim_start().to_string());
                    } else {
                        s.push(text);
                    }
                }
                NodeData::Element(child_el) => {
                    let mut val = self.prettyprint_xhtml(child, indent_level);
                    if !is_inline(&child_el.name) {
                        contains_block_tags = true;
                        if last_char != '\n' {
                            s.push("\n".to_string());
                            last_char = '\n';
                        }
                    }
                    // An inline child starting a fresh line under a block
                    // parent picks up the block's indentation.
                    if structural && is_inline(&child_el.name) && last_char == '\n' {
                        s.push(indent_space.clone());
                        val = val.trim_start().to_string();
                    }
                    s.push(val);
                }
                NodeData::Root { .. } => {}
            }
            if let Some(last) = s.last()
                && let Some(c) = last.chars().last()
            {
                last_char = c;
            }
        }

        // An inline tag that grew block children closes on its own line.
        if inline && contains_block_tags {
            if last_char != '\n' {
                s.push("\n".to_string());
            }
            s.push(indent_space);
        }

        s.concat()
    }
}

// =============================================================================
// Public renderer API
// =============================================================================

impl Tree {
    /// Compact markup for this node and its subtree.
    pub fn render(&self, id: NodeId, opts: &RenderOptions) -> String {
        Serializer::new(self, opts).decode(id, None)
    }

    /// Compact markup for this node's contents only.
    pub fn render_contents(&self, id: NodeId, opts: &RenderOptions) -> String {
        Serializer::new(self, opts).decode_contents(id, None)
    }

    /// Indented markup, one indent step per nesting level.
    pub fn prettify(&self, id: NodeId, opts: &RenderOptions) -> String {
        let level = if id == self.root() { 0 } else { 1 };
        Serializer::new(self, opts).decode(id, Some(level))
    }

    /// XML-flavored rendering: the EPUB container tags escalate indentation,
    /// and collapsible whitespace-only elements self-close.
    pub fn render_xml(&self, id: NodeId, opts: &RenderOptions) -> String {
        Serializer::new(self, opts).decodexml(id, 0)
    }

    /// Compact XHTML with line breaks only around `html` and `body`.
    pub fn render_xhtml(&self, id: NodeId, opts: &RenderOptions) -> String {
        Serializer::new(self, opts).serialize_xhtml(id)
    }

    /// Reflowing XHTML pretty-printer.
    pub fn render_xhtml_pretty(&self, id: NodeId, opts: &RenderOptions) -> String {
        Serializer::new(self, opts).prettyprint_xhtml(id, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn text_child(tree: &mut Tree, parent: NodeId, text: &str) {
        let t = tree.new_text(text);
        tree.append(parent, t).expect("append text");
    }

    fn xhtml_element(tree: &mut Tree, name: &str) -> NodeId {
        let id = tree.new_element(name);
        tree.element_mut(id)
            .expect("is an element")
            .namespace = Some(XHTML_NAMESPACE.to_string());
        id
    }

    #[test]
    fn test_render_compact() {
        let mut tree = Tree::new();
        let root = tree.root();
        let div = tree.new_element("div");
        tree.append(root, div).expect("append");
        let p = tree.new_element("p");
        tree.set_attr(p, "class", AttrValue::list(["a", "b"]));
        tree.append(div, p).expect("append");
        text_child(&mut tree, p, "hi");

        let opts = RenderOptions::default();
        assert_eq!(tree.render(root, &opts), "<div><p class=\"a b\">hi</p></div>");
        assert_eq!(tree.render_contents(div, &opts), "<p class=\"a b\">hi</p>");
    }

    #[test]
    fn test_minimal_escaping_is_entity_aware() {
        let mut tree = Tree::new();
        let root = tree.root();
        let p = tree.new_element("p");
        tree.append(root, p).expect("append");
        text_child(&mut tree, p, "a & b < c &amp; d &#160; e");

        let out = tree.render(p, &RenderOptions::default());
        assert_eq!(out, "<p>a &amp; b &lt; c &amp; d &#160; e</p>");
    }

    #[test]
    fn test_html_formatter_named_entities() {
        let mut tree = Tree::new();
        let root = tree.root();
        let p = tree.new_element("p");
        tree.append(root, p).expect("append");
        text_child(&mut tree, p, "caf\u{e9} \u{2014} \u{a9}2026");

        let opts = RenderOptions::default().formatter(Formatter::Html);
        assert_eq!(tree.render(p, &opts), "<p>caf\u{e9} &mdash; &copy;2026</p>");
    }

    #[test]
    fn test_script_text_is_not_substituted_in_html_trees() {
        let mut tree = Tree::new();
        let root = tree.root();
        let script = tree.new_element("script");
        tree.append(root, script).expect("append");
        text_child(&mut tree, script, "if (a < b && c > d) {}");
        let p = tree.new_element("p");
        tree.append(root, p).expect("append");
        text_child(&mut tree, p, "a < b");

        let opts = RenderOptions::default();
        let out = tree.render(root, &opts);
        assert_eq!(
            out,
            "<script>if (a < b && c > d) {}</script><p>a &lt; b</p>"
        );

        // XML trees have no such exemption.
        let mut xml = Tree::new_xml();
        let root = xml.root();
        let script = xml.new_element("script");
        xml.append(root, script).expect("append");
        let t = xml.new_text("a < b");
        xml.append(script, t).expect("append");
        assert_eq!(xml.render(root, &opts), "<script>a &lt; b</script>");
    }

    #[test]
    fn test_attribute_quoting_and_sorting() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.new_element("a");
        tree.set_attr(a, "title", AttrValue::single("say \"hi\""));
        tree.set_attr(a, "href", AttrValue::single("/x?a=1&b=2"));
        tree.set_attr(a, "download", AttrValue::Bare);
        tree.append(root, a).expect("append");

        let out = tree.render(a, &RenderOptions::default());
        // Keys come out sorted; quote style adapts to the value.
        assert_eq!(
            out,
            "<a download href=\"/x?a=1&amp;b=2\" title='say \"hi\"'></a>"
        );
    }

    #[test]
    fn test_preformatted_kinds_bypass_substitution() {
        let mut tree = Tree::new();
        let root = tree.root();
        let c = tree.new_text_kind(TextKind::Comment, " a < b ");
        tree.append(root, c).expect("append");
        let cd = tree.new_text_kind(TextKind::Cdata, "x & y");
        tree.append(root, cd).expect("append");

        let opts = RenderOptions::default();
        assert_eq!(tree.render(c, &opts), "<!-- a < b -->");
        assert_eq!(tree.render(cd, &opts), "<![CDATA[x & y]]>");
    }

    #[test]
    fn test_doctype_render() {
        let mut tree = Tree::new();
        let root = tree.root();
        let dt = tree.new_doctype("html", None, Some("about:legacy-compat"));
        tree.append(root, dt).expect("append");
        assert_eq!(
            tree.render(dt, &RenderOptions::default()),
            "<!DOCTYPE html SYSTEM \"about:legacy-compat\">\n"
        );
    }

    #[test]
    fn test_charset_stand_in_rendering() {
        let mut tree = Tree::new();
        let root = tree.root();
        let meta = tree.new_element("meta");
        tree.set_attr(
            meta,
            "content",
            AttrValue::ContentMeta {
                original: "text/html; charset=utf8".to_string(),
            },
        );
        tree.append(root, meta).expect("append");

        let opts = RenderOptions::default().eventual_encoding(Some("iso-8859-1".to_string()));
        assert_eq!(
            tree.render(meta, &opts),
            "<meta content=\"text/html; charset=iso-8859-1\"></meta>"
        );
        // With no eventual encoding, the original value survives.
        let opts = RenderOptions::default().eventual_encoding(None);
        assert_eq!(
            tree.render(meta, &opts),
            "<meta content=\"text/html; charset=utf8\"></meta>"
        );
    }

    #[test]
    fn test_prettify() {
        let mut tree = Tree::new();
        let root = tree.root();
        let div = tree.new_element("div");
        tree.append(root, div).expect("append");
        let p1 = tree.new_element("p");
        tree.append(div, p1).expect("append");
        text_child(&mut tree, p1, "hi");
        let p2 = tree.new_element("p");
        tree.append(div, p2).expect("append");
        text_child(&mut tree, p2, "bye");

        let out = tree.prettify(root, &RenderOptions::default());
        assert_eq!(out, "<div>\n <p>\n  hi\n </p>\n <p>\n  bye\n </p>\n</div>");
    }

    #[test]
    fn test_prettify_leaves_pre_alone() {
        let mut tree = Tree::new();
        let root = tree.root();
        let pre = tree.new_element("pre");
        tree.append(root, pre).expect("append");
        text_child(&mut tree, pre, "  keep\n   this");

        let out = tree.prettify(root, &RenderOptions::default());
        assert_eq!(out, "<pre>  keep\n   this</pre>");
    }

    #[test]
    fn test_render_xml() {
        let mut tree = Tree::new_xml();
        let root = tree.root();
        let package = tree.new_element("package");
        tree.append(root, package).expect("append");
        let metadata = tree.new_element("metadata");
        tree.append(package, metadata).expect("append");
        let title = tree.new_element("title");
        tree.element_mut(title).expect("element").prefix = Some("dc".into());
        tree.append(metadata, title).expect("append");
        text_child(&mut tree, title, "x");
        let meta = tree.new_element("meta");
        tree.element_mut(meta).expect("element").can_be_empty = true;
        tree.append(metadata, meta).expect("append");
        text_child(&mut tree, meta, "  ");

        let before = tree.node_count();
        let out = tree.render_xml(root, &RenderOptions::default());
        assert_eq!(
            out,
            "<package>\n <metadata>\n  <dc:title>x</dc:title>\n  <meta/>\n </metadata>\n</package>"
        );
        // The whitespace collapse is a render-time decision only.
        assert_eq!(tree.node_count(), before);
        assert_eq!(tree.contents(meta).len(), 1);
    }

    #[test]
    fn test_render_xhtml_special_handling() {
        let mut tree = Tree::new();
        let root = tree.root();
        let html = xhtml_element(&mut tree, "html");
        tree.append(root, html).expect("append");
        let body = xhtml_element(&mut tree, "body");
        tree.append(html, body).expect("append");
        let p = xhtml_element(&mut tree, "p");
        tree.append(body, p).expect("append");
        text_child(&mut tree, p, "hi");
        let br = xhtml_element(&mut tree, "br");
        tree.append(body, br).expect("append");

        let out = tree.render_xhtml(root, &RenderOptions::default());
        assert_eq!(
            out,
            "<html>\n<body>\n<p>hi</p><br/>\n</body>\n</html>\n"
        );
    }

    #[test]
    fn test_render_xhtml_empty_elements() {
        let mut tree = Tree::new();
        let root = tree.root();
        // Outside the XHTML namespace an empty element self-closes.
        let foreign = tree.new_element("item");
        tree.append(root, foreign).expect("append");
        // Inside it, only void tags do.
        let p = xhtml_element(&mut tree, "p");
        tree.append(root, p).expect("append");

        let opts = RenderOptions::default();
        assert_eq!(tree.render_xhtml(foreign, &opts), "<item/>");
        assert_eq!(tree.render_xhtml(p, &opts), "<p></p>");
    }

    #[test]
    fn test_render_xhtml_pretty_reflows() {
        let mut tree = Tree::new();
        let root = tree.root();
        let body = xhtml_element(&mut tree, "body");
        tree.append(root, body).expect("append");
        let div = xhtml_element(&mut tree, "div");
        tree.append(body, div).expect("append");
        text_child(&mut tree, div, "Hello ");
        let b = xhtml_element(&mut tree, "b");
        tree.append(div, b).expect("append");
        text_child(&mut tree, b, "world");
        text_child(&mut tree, div, ".");

        let out = tree.render_xhtml_pretty(root, &RenderOptions::default());
        assert_eq!(
            out,
            "<body>\n<div>\n Hello <b>world</b>.\n</div>\n</body>\n"
        );
    }

    #[test]
    fn test_render_xhtml_pretty_br_in_block() {
        let mut tree = Tree::new();
        let root = tree.root();
        let div = xhtml_element(&mut tree, "div");
        tree.append(root, div).expect("append");
        text_child(&mut tree, div, "a");
        let br = xhtml_element(&mut tree, "br");
        tree.append(div, br).expect("append");
        text_child(&mut tree, div, "b");

        let out = tree.render_xhtml_pretty(root, &RenderOptions::default());
        assert_eq!(out, "<div>\na<br/>\nb\n</div>\n");
    }

    #[test]
    fn test_render_xhtml_pretty_collapses_whitespace_runs() {
        let mut tree = Tree::new();
        let root = tree.root();
        let p = xhtml_element(&mut tree, "p");
        tree.append(root, p).expect("append");
        text_child(&mut tree, p, "one");
        text_child(&mut tree, p, "\n   \t");
        text_child(&mut tree, p, "two");

        let out = tree.render_xhtml_pretty(p, &RenderOptions::default());
        assert_eq!(out, "<p>one two</p>\n");
    }

    #[test]
    fn test_custom_formatter() {
        let mut tree = Tree::new();
        let root = tree.root();
        let p = tree.new_element("p");
        tree.append(root, p).expect("append");
        text_child(&mut tree, p, "shout");

        let opts = RenderOptions::default()
            .formatter(Formatter::Custom(Arc::new(|s: &str| s.to_uppercase())));
        assert_eq!(tree.render(p, &opts), "<p>SHOUT</p>");
    }
}
