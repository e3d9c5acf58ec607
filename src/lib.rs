//! Mutable markup tree with arena storage and document-order traversal.
//!
//! loam provides:
//! - **Arena tree**: element/text nodes in one slot arena, addressed by
//!   copyable [`NodeId`] handles, with a hidden document root
//! - **Dual orderings**: sibling links for structure plus a flattened
//!   pre-order chain for "everything after this node" walks, both healed in
//!   place by every mutation
//! - **Queries**: [`Strainer`] criteria bundles over any traversal direction,
//!   and a CSS selector subset via [`Tree::select`]
//! - **Serialization**: compact, indented, XML-flavored, and reflowing XHTML
//!   renderers with pluggable entity substitution
//!
//! # Example
//!
//! ```rust
//! use loam::{RenderOptions, Strainer, Tree};
//!
//! let mut tree = Tree::new();
//! let root = tree.root();
//! let div = tree.new_element("div");
//! tree.append(root, div)?;
//! let p = tree.new_element("p");
//! tree.append(div, p)?;
//! let text = tree.new_text("hello");
//! tree.append(p, text)?;
//!
//! // Query by tag name, or with a CSS selector.
//! assert_eq!(tree.find(root, &Strainer::tag("p")), Some(p));
//! assert_eq!(tree.select_one(root, "div p")?, Some(p));
//!
//! // Mutate and render.
//! let em = tree.new_element("em");
//! tree.wrap(text, em)?;
//! let html = tree.render(root, &RenderOptions::default());
//! assert_eq!(html, "<div><p><em>hello</em></p></div>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod tracing_macros;

pub mod builder;
pub mod error;
pub mod select;
pub mod serialize;
pub mod strainer;
pub mod traverse;
pub mod tree;

// Re-export the core types at the crate root for convenience
pub use builder::TreePolicy;
pub use error::{SelectorError, TreeError};
pub use serialize::{Formatter, RenderOptions, XHTML_NAMESPACE};
pub use strainer::{Attrs, Matcher, NameRule, Strainer, Substring, TextPattern};
pub use tree::{AttrValue, ElementData, NodeData, NodeId, TextData, TextKind, Tree};
