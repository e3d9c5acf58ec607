//! Arena-based mutable markup tree.
//!
//! This module provides the core `Tree` representation used throughout loam.
//! Key features:
//! - **Slot arena**: all nodes live in one `Vec`, addressed by stable [`NodeId`]s
//! - **Dual links**: every node carries sibling-order links (`parent`,
//!   `previous_sibling`, `next_sibling`) and document-order links
//!   (`previous_element`, `next_element`) — a flattened pre-order chain over
//!   the whole tree that makes "next match anywhere after me" a streaming walk
//! - **O(1)-step mutation**: insert/extract/replace re-stitch both orderings
//!   in place instead of re-walking the tree
//!
//! Ownership is expressed through the arena: a parent's `contents` holds the
//! owning order of its children, while all other links are plain non-owning
//! handles. Structural-invariant violations are rejected before any link is
//! touched, so a failed mutation never leaves a half-stitched tree.

use compact_str::CompactString;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::borrow::Cow;

use crate::error::TreeError;
use crate::tracing_macros::debug;

/// Handle to a node slot in a [`Tree`] arena.
///
/// Handles are plain indices: cheap to copy, compare, and hash. A handle is
/// invalidated by [`Tree::decompose`]; using a released handle panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What flavor of text payload a text node carries.
///
/// The preformatted kinds differ only in the literal prefix/suffix wrapped
/// around the payload on output; their payload is never entity-substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// Ordinary character data; subject to entity substitution on output.
    Plain,
    /// `<![CDATA[ ... ]]>`
    Cdata,
    /// `<!-- ... -->`
    Comment,
    /// `<? ... >`
    ProcessingInstruction,
    /// `<! ... !>`
    Declaration,
    /// `<!DOCTYPE ... >`
    Doctype,
}

impl TextKind {
    /// Literal prefix emitted before the payload.
    pub fn prefix(self) -> &'static str {
        match self {
            TextKind::Plain => "",
            TextKind::Cdata => "<![CDATA[",
            TextKind::Comment => "<!--",
            TextKind::ProcessingInstruction => "<?",
            TextKind::Declaration => "<!",
            TextKind::Doctype => "<!DOCTYPE ",
        }
    }

    /// Literal suffix emitted after the payload.
    pub fn suffix(self) -> &'static str {
        match self {
            TextKind::Plain => "",
            TextKind::Cdata => "]]>",
            TextKind::Comment => "-->",
            TextKind::ProcessingInstruction => ">",
            TextKind::Declaration => "!>",
            TextKind::Doctype => ">\n",
        }
    }

    /// Preformatted payloads bypass entity substitution entirely.
    pub fn is_preformatted(self) -> bool {
        !matches!(self, TextKind::Plain)
    }
}

/// Text node payload. The string itself is immutable; replace the node to
/// change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextData {
    pub kind: TextKind,
    pub text: String,
}

/// An attribute value.
///
/// Most attributes are [`Single`](AttrValue::Single) strings. Attributes the
/// builder policy designates as multi-valued (`class` and friends) are
/// whitespace-split into [`List`](AttrValue::List) at construction and
/// space-joined again on output. The two charset stand-ins track the encoding
/// declared by a `<meta>` tag and rewrite themselves against the encoding the
/// rendered bytestream is destined for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Plain string value.
    Single(String),
    /// Multi-valued attribute, e.g. `class="a b"`.
    List(SmallVec<[String; 2]>),
    /// Attribute with no value; renders as the bare name.
    Bare,
    /// Stand-in for `<meta charset="...">`; renders as the eventual encoding.
    CharsetMeta { original: String },
    /// Stand-in for `<meta http-equiv="content-type" content="...charset=...">`;
    /// the `charset=` clause is rewritten to the eventual encoding.
    ContentMeta { original: String },
}

impl AttrValue {
    /// Single value from anything string-like.
    pub fn single(value: impl Into<String>) -> Self {
        AttrValue::Single(value.into())
    }

    /// Multi-valued attribute from an iterator of items.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }

    /// The string representation: a multi-valued attribute is space-joined,
    /// a bare attribute is the empty string.
    pub fn to_joined(&self) -> Cow<'_, str> {
        match self {
            AttrValue::Single(s) => Cow::Borrowed(s),
            AttrValue::List(items) => Cow::Owned(items.join(" ")),
            AttrValue::Bare => Cow::Borrowed(""),
            AttrValue::CharsetMeta { original } | AttrValue::ContentMeta { original } => {
                Cow::Borrowed(original)
            }
        }
    }

    /// The string representation destined for a bytestream in `encoding`.
    ///
    /// Only the charset stand-ins care; everything else falls back to
    /// [`Self::to_joined`].
    pub fn encoded_for(&self, encoding: Option<&str>) -> Cow<'_, str> {
        match (self, encoding) {
            (AttrValue::CharsetMeta { .. }, Some(enc)) => Cow::Owned(enc.to_string()),
            (AttrValue::ContentMeta { original }, Some(enc)) => {
                Cow::Owned(rewrite_content_charset(original, enc))
            }
            _ => self.to_joined(),
        }
    }
}

/// Rewrite every `charset=` clause (at the start or after a `;`) to name the
/// given encoding, preserving surrounding whitespace.
fn rewrite_content_charset(original: &str, encoding: &str) -> String {
    let mut out = String::with_capacity(original.len());
    for (i, segment) in original.split(';').enumerate() {
        if i > 0 {
            out.push(';');
        }
        let trimmed = segment.trim_start();
        if trimmed.strip_prefix("charset=").is_some() {
            let ws = &segment[..segment.len() - trimmed.len()];
            out.push_str(ws);
            out.push_str("charset=");
            out.push_str(encoding);
        } else {
            out.push_str(segment);
        }
    }
    out
}

/// Element node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Tag name.
    pub name: CompactString,
    /// Namespace URI, if any.
    pub namespace: Option<String>,
    /// Namespace prefix; rendered as `prefix:name`.
    pub prefix: Option<CompactString>,
    /// Ordered attribute mapping. Unique keys, insertion order preserved.
    pub attrs: IndexMap<CompactString, AttrValue>,
    /// Owned children, in sibling order.
    pub contents: Vec<NodeId>,
    /// Whether the element may render in the self-closing form when empty.
    pub can_be_empty: bool,
}

/// Node payload stored in each arena slot.
///
/// The synthetic document root is its own variant rather than an element with
/// a flag: "renders no tag of its own" is a type-level fact. It still
/// participates in both orderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Hidden document root wrapper; contributes no markup of its own.
    Root { contents: Vec<NodeId> },
    /// Element ("tag") node.
    Element(ElementData),
    /// Text node (plain or preformatted).
    Text(TextData),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    prev_element: Option<NodeId>,
    next_element: Option<NodeId>,
}

impl NodeEntry {
    fn detached(data: NodeData) -> Self {
        NodeEntry {
            data,
            parent: None,
            prev_sibling: None,
            next_sibling: None,
            prev_element: None,
            next_element: None,
        }
    }
}

/// The tree: one arena of nodes plus the hidden document root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Option<NodeEntry>>,
    free: Vec<u32>,
    root: NodeId,
    is_xml: bool,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// New empty HTML tree with a hidden document root.
    pub fn new() -> Self {
        Self::with_kind(false)
    }

    /// New empty XML tree. Affects formatter lookup and the inline tag
    /// classification used by the pretty-printers.
    pub fn new_xml() -> Self {
        Self::with_kind(true)
    }

    fn with_kind(is_xml: bool) -> Self {
        let root_entry = NodeEntry::detached(NodeData::Root {
            contents: Vec::new(),
        });
        Tree {
            nodes: vec![Some(root_entry)],
            free: Vec::new(),
            root: NodeId(0),
            is_xml,
        }
    }

    /// The hidden document root. Participates in both orderings but renders
    /// no markup of its own.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether this tree was created as XML.
    pub fn is_xml(&self) -> bool {
        self.is_xml
    }

    /// Number of live nodes (including the root).
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    fn alloc(&mut self, data: NodeData) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(NodeEntry::detached(data));
                NodeId(slot)
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Some(NodeEntry::detached(data)));
                id
            }
        }
    }

    /// Create a detached element in the HTML namespace.
    pub fn new_element(&mut self, name: impl Into<CompactString>) -> NodeId {
        self.alloc(NodeData::Element(ElementData {
            name: name.into(),
            namespace: None,
            prefix: None,
            attrs: IndexMap::new(),
            contents: Vec::new(),
            can_be_empty: false,
        }))
    }

    /// Create a detached element with full control over its payload.
    pub fn new_element_with(&mut self, data: ElementData) -> NodeId {
        self.alloc(NodeData::Element(data))
    }

    /// Create a detached plain text node.
    pub fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        self.new_text_kind(TextKind::Plain, text)
    }

    /// Create a detached text node of the given kind.
    pub fn new_text_kind(&mut self, kind: TextKind, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(TextData {
            kind,
            text: text.into(),
        }))
    }

    /// Create a doctype node from a name plus optional public/system ids,
    /// e.g. `name PUBLIC "pub" "sys"`.
    pub fn new_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> NodeId {
        let mut value = name.to_string();
        if let Some(pub_id) = public_id {
            value.push_str(&format!(" PUBLIC \"{pub_id}\""));
            if let Some(sys_id) = system_id {
                value.push_str(&format!("\n \"{sys_id}\""));
            }
        } else if let Some(sys_id) = system_id {
            value.push_str(&format!(" SYSTEM \"{sys_id}\""));
        }
        self.new_text_kind(TextKind::Doctype, value)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    fn entry(&self, id: NodeId) -> &NodeEntry {
        self.nodes[id.index()]
            .as_ref()
            .expect("NodeId points at a released arena slot")
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        self.nodes[id.index()]
            .as_mut()
            .expect("NodeId points at a released arena slot")
    }

    /// Node payload, or `None` for a released slot.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index())?.as_ref().map(|e| &e.data)
    }

    /// Node payload. Panics on a released slot.
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.entry(id).data
    }

    /// Mutable node payload. Panics on a released slot.
    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.entry_mut(id).data
    }

    /// Sibling-order parent.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).parent
    }

    /// Previous sibling under the same parent.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).prev_sibling
    }

    /// Next sibling under the same parent.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).next_sibling
    }

    /// Document-order predecessor, anywhere in the tree.
    pub fn prev_element(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).prev_element
    }

    /// Document-order successor, anywhere in the tree.
    pub fn next_element(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).next_element
    }

    /// Owned children, in sibling order. Empty for text nodes.
    pub fn contents(&self, id: NodeId) -> &[NodeId] {
        match &self.entry(id).data {
            NodeData::Root { contents } => contents,
            NodeData::Element(el) => &el.contents,
            NodeData::Text(_) => &[],
        }
    }

    fn is_container(&self, id: NodeId) -> bool {
        !matches!(self.entry(id).data, NodeData::Text(_))
    }

    fn contents_mut(&mut self, id: NodeId) -> &mut Vec<NodeId> {
        match &mut self.entry_mut(id).data {
            NodeData::Root { contents } => contents,
            NodeData::Element(el) => &mut el.contents,
            NodeData::Text(_) => unreachable!("text nodes have no contents"),
        }
    }

    /// Tag name, or `None` for text and root nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.entry(id).data {
            NodeData::Element(el) => Some(&el.name),
            _ => None,
        }
    }

    /// Element payload, or `None` for text and root nodes.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.entry(id).data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Mutable element payload.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.entry_mut(id).data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Text payload, or `None` for non-text nodes.
    pub fn text_data(&self, id: NodeId) -> Option<&TextData> {
        match &self.entry(id).data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Is this an element node?
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.entry(id).data, NodeData::Element(_))
    }

    /// Is this a text node?
    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.entry(id).data, NodeData::Text(_))
    }

    /// Attribute value by name.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&AttrValue> {
        self.element(id)?.attrs.get(name)
    }

    /// Attribute value as its space-joined string representation.
    pub fn attr_str(&self, id: NodeId, name: &str) -> Option<Cow<'_, str>> {
        self.attr(id, name).map(AttrValue::to_joined)
    }

    /// Does the element carry this attribute?
    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.attrs.contains_key(name))
    }

    /// Set (or replace) an attribute. No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: impl Into<CompactString>, value: AttrValue) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.insert(name.into(), value);
        }
    }

    /// Remove an attribute, returning the old value if it existed.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<AttrValue> {
        self.element_mut(id)?.attrs.shift_remove(name)
    }

    /// Empty-element check: no contents AND the element's kind permits the
    /// self-closing short form.
    pub fn is_empty_element(&self, id: NodeId) -> bool {
        match &self.entry(id).data {
            NodeData::Element(el) => el.contents.is_empty() && el.can_be_empty,
            _ => false,
        }
    }

    /// The last node of this subtree in document order: the deepest last
    /// child, or the node itself if it has none.
    pub fn last_descendant(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while let Some(&last) = self.contents(cur).last() {
            cur = last;
        }
        cur
    }

    /// Identity-based position of `child` in `parent`'s contents.
    ///
    /// Identity, not equality: two distinct nodes may compare equal by value.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Result<usize, TreeError> {
        self.contents(parent)
            .iter()
            .position(|&c| c == child)
            .ok_or(TreeError::NotFound)
    }

    // =========================================================================
    // Structural mutation
    // =========================================================================

    /// Insert `child` into `parent`'s contents at `min(position, len)`,
    /// re-stitching both orderings.
    ///
    /// If `child` is already a child of `parent` at an index below `position`,
    /// the target index is decremented to account for the pending removal
    /// (stable "move" semantics). A `child` attached anywhere else is
    /// atomically extracted first.
    pub fn insert(
        &mut self,
        parent: NodeId,
        position: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        if child == parent {
            return Err(TreeError::InvalidOperation("cannot insert a node into itself"));
        }
        if child == self.root {
            return Err(TreeError::InvalidOperation(
                "cannot insert the document root into another node",
            ));
        }
        if !self.is_container(parent) {
            return Err(TreeError::InvalidOperation("cannot insert into a text node"));
        }
        debug!("insert: parent={parent:?} position={position} child={child:?}");

        let mut position = position.min(self.contents(parent).len());
        if self.entry(child).parent == Some(parent) {
            // Moving the node further down its own sibling list: once it is
            // extracted, the target index jumps down one.
            let current = self.index_of(parent, child)?;
            if current < position {
                position -= 1;
            }
        }
        if self.entry(child).parent.is_some() {
            self.extract(child);
        }

        self.entry_mut(child).parent = Some(parent);

        // Stitch the sibling chain and the child's document-order predecessor.
        if position == 0 {
            self.entry_mut(child).prev_sibling = None;
            self.entry_mut(child).prev_element = Some(parent);
        } else {
            let prev_child = self.contents(parent)[position - 1];
            self.entry_mut(child).prev_sibling = Some(prev_child);
            self.entry_mut(prev_child).next_sibling = Some(child);
            let pred = self.last_descendant(prev_child);
            self.entry_mut(child).prev_element = Some(pred);
        }
        if let Some(pred) = self.entry(child).prev_element {
            self.entry_mut(pred).next_element = Some(child);
        }

        // Stitch the successor of the subtree's own last descendant.
        let childs_last = self.last_descendant(child);
        let len = self.contents(parent).len();
        if position >= len {
            self.entry_mut(child).next_sibling = None;

            // Walk up to the nearest ancestor that has a next sibling; that
            // sibling is the document-order successor, else this subtree ends
            // the document.
            let mut ancestor = Some(parent);
            let mut successor = None;
            while let Some(a) = ancestor {
                successor = self.entry(a).next_sibling;
                if successor.is_some() {
                    break;
                }
                ancestor = self.entry(a).parent;
            }
            self.entry_mut(childs_last).next_element = successor;
        } else {
            let next_child = self.contents(parent)[position];
            self.entry_mut(child).next_sibling = Some(next_child);
            self.entry_mut(next_child).prev_sibling = Some(child);
            self.entry_mut(childs_last).next_element = Some(next_child);
        }
        if let Some(succ) = self.entry(childs_last).next_element {
            self.entry_mut(succ).prev_element = Some(childs_last);
        }

        self.contents_mut(parent).insert(position, child);
        Ok(())
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let len = self.contents(parent).len();
        self.insert(parent, len, child)
    }

    /// Remove this node (and its whole subtree) from the tree, healing both
    /// orderings around the gap.
    ///
    /// The subtree's *internal* links stay intact, so the detached node
    /// remains well-formed and reusable. Extracting an already-detached node
    /// is a no-op on links but still legal.
    pub fn extract(&mut self, id: NodeId) {
        debug!("extract: {id:?}");
        if let Some(parent) = self.entry(id).parent
            && let Ok(idx) = self.index_of(parent, id)
        {
            self.contents_mut(parent).remove(idx);
        }

        // Connect the two nodes that would be adjacent in document order if
        // this subtree had never been here.
        let last_child = self.last_descendant(id);
        let next_element = self.entry(last_child).next_element;
        let prev_element = self.entry(id).prev_element;

        if let Some(prev) = prev_element
            && Some(prev) != next_element
        {
            self.entry_mut(prev).next_element = next_element;
        }
        if let Some(next) = next_element
            && Some(next) != prev_element
        {
            self.entry_mut(next).prev_element = prev_element;
        }
        self.entry_mut(id).prev_element = None;
        self.entry_mut(last_child).next_element = None;

        self.entry_mut(id).parent = None;
        let prev_sibling = self.entry(id).prev_sibling;
        let next_sibling = self.entry(id).next_sibling;
        if let Some(prev) = prev_sibling
            && Some(prev) != next_sibling
        {
            self.entry_mut(prev).next_sibling = next_sibling;
        }
        if let Some(next) = next_sibling
            && Some(next) != prev_sibling
        {
            self.entry_mut(next).prev_sibling = prev_sibling;
        }
        self.entry_mut(id).prev_sibling = None;
        self.entry_mut(id).next_sibling = None;
    }

    /// Replace this node with another, at the same position under the same
    /// parent.
    pub fn replace_with(&mut self, id: NodeId, replacement: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.entry(id).parent else {
            return Err(TreeError::InvalidOperation(
                "cannot replace a node that is not part of a tree",
            ));
        };
        if replacement == id {
            return Err(TreeError::InvalidOperation("cannot replace a node with itself"));
        }
        if replacement == self.root {
            return Err(TreeError::InvalidOperation(
                "cannot replace a node with the document root",
            ));
        }
        if Some(replacement) == self.entry(id).parent {
            return Err(TreeError::InvalidOperation("cannot replace a node with its parent"));
        }
        // Every insert precondition is now known to hold, so the
        // extract-then-insert pair below cannot fail halfway.
        let position = self.index_of(parent, id)?;
        self.extract(id);
        self.insert(parent, position, replacement)
    }

    /// Replace this node, at its old position, with its own children in their
    /// original order. The node itself ends up detached and childless.
    pub fn unwrap_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.entry(id).parent else {
            return Err(TreeError::InvalidOperation(
                "cannot unwrap a node that is not part of a tree",
            ));
        };
        if !self.is_container(id) {
            return Err(TreeError::InvalidOperation("cannot unwrap a text node"));
        }
        let position = self.index_of(parent, id)?;
        self.extract(id);
        let children: Vec<NodeId> = self.contents(id).to_vec();
        for child in children.into_iter().rev() {
            self.insert(parent, position, child)?;
        }
        Ok(())
    }

    /// Replace this node with `container`, then append this node as
    /// `container`'s child: the node becomes the container's sole original
    /// child at the original position.
    pub fn wrap(&mut self, id: NodeId, container: NodeId) -> Result<(), TreeError> {
        // Checked here, before replace_with touches any link: the trailing
        // append must not be the step that discovers the container is no
        // container at all.
        if !self.is_container(container) {
            return Err(TreeError::InvalidOperation("cannot wrap a node in a text node"));
        }
        self.replace_with(id, container)?;
        self.append(container, id)
    }

    /// Make `other` the immediate predecessor of this node, under the same
    /// parent.
    pub fn insert_before(&mut self, id: NodeId, other: NodeId) -> Result<(), TreeError> {
        if other == id {
            return Err(TreeError::InvalidOperation(
                "cannot insert an element before itself",
            ));
        }
        let Some(parent) = self.entry(id).parent else {
            return Err(TreeError::InvalidOperation(
                "element has no parent, so 'before' has no meaning",
            ));
        };
        // Extract first so the index is not corrupted when the two nodes are
        // already siblings.
        self.extract(other);
        let index = self.index_of(parent, id)?;
        self.insert(parent, index, other)
    }

    /// Make `other` the immediate successor of this node, under the same
    /// parent.
    pub fn insert_after(&mut self, id: NodeId, other: NodeId) -> Result<(), TreeError> {
        if other == id {
            return Err(TreeError::InvalidOperation(
                "cannot insert an element after itself",
            ));
        }
        let Some(parent) = self.entry(id).parent else {
            return Err(TreeError::InvalidOperation(
                "element has no parent, so 'after' has no meaning",
            ));
        };
        self.extract(other);
        let index = self.index_of(parent, id)?;
        self.insert(parent, index + 1, other)
    }

    /// Extract this subtree and release every node in it back to the arena.
    /// All handles into the subtree are invalidated.
    pub fn decompose(&mut self, id: NodeId) {
        debug!("decompose: {id:?}");
        self.extract(id);
        // After extract, the subtree's internal chain ends at its own last
        // descendant, so this walk stays inside the subtree.
        let mut cur = Some(id);
        while let Some(node) = cur {
            let next = self.entry(node).next_element;
            self.nodes[node.index()] = None;
            self.free.push(node.0);
            cur = next;
        }
    }

    /// Extract (or, with `decompose` set, destroy) every child of this node.
    pub fn clear(&mut self, id: NodeId, decompose: bool) {
        let children: Vec<NodeId> = self.contents(id).to_vec();
        for child in children {
            if decompose {
                self.decompose(child);
            } else {
                self.extract(child);
            }
        }
    }

    // =========================================================================
    // Text access
    // =========================================================================

    /// Concatenated descendant text (plain and CDATA payloads; comments,
    /// processing instructions, and doctypes contribute nothing), joined with
    /// `separator`.
    pub fn get_text(&self, id: NodeId, separator: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let NodeData::Text(t) = &self.entry(id).data {
            if matches!(t.kind, TextKind::Plain | TextKind::Cdata) {
                parts.push(&t.text);
            }
        } else {
            for desc in self.descendants(id) {
                if let NodeData::Text(t) = &self.entry(desc).data
                    && matches!(t.kind, TextKind::Plain | TextKind::Cdata)
                {
                    parts.push(&t.text);
                }
            }
        }
        parts.join(separator)
    }

    /// Concatenated descendant text with no separator.
    pub fn text(&self, id: NodeId) -> String {
        self.get_text(id, "")
    }

    /// The single string within this node: if it has exactly one child and
    /// that child is a text node, its payload; one element child recurses;
    /// anything else is `None`.
    pub fn string(&self, id: NodeId) -> Option<&str> {
        let contents = self.contents(id);
        if contents.len() != 1 {
            return None;
        }
        let child = contents[0];
        match &self.entry(child).data {
            NodeData::Text(t) => Some(&t.text),
            _ => self.string(child),
        }
    }

    /// Replace this node's children with a single plain text node.
    pub fn set_string(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), TreeError> {
        if !self.is_container(id) {
            return Err(TreeError::InvalidOperation("cannot set a string on a text node"));
        }
        self.clear(id, true);
        let text_node = self.new_text(text);
        self.append(id, text_node)
    }

    /// Deep value equality: same payload (name, attributes, text) and
    /// recursively equal contents. Distinct nodes can compare equal, which is
    /// why [`index_of`](Self::index_of) is identity-based.
    pub fn nodes_equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        match (&self.entry(a).data, &self.entry(b).data) {
            (NodeData::Text(x), NodeData::Text(y)) => x == y,
            (NodeData::Element(x), NodeData::Element(y)) => {
                x.name == y.name
                    && x.attrs == y.attrs
                    && x.contents.len() == y.contents.len()
                    && x.contents
                        .iter()
                        .zip(&y.contents)
                        .all(|(&ca, &cb)| self.nodes_equal(ca, cb))
            }
            (NodeData::Root { contents: x }, NodeData::Root { contents: y }) => {
                x.len() == y.len()
                    && x.iter().zip(y).all(|(&ca, &cb)| self.nodes_equal(ca, cb))
            }
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
