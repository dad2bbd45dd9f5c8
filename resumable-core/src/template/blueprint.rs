//! Parsed template structure.
//!
//! A [`Blueprint`] is the immutable result of parsing one template's
//! static strings: a tree of prototype nodes plus one
//! [`BindingDescriptor`] per interpolation hole, in hole order.
//!
//! Prototype nodes are numbered in document order. Every child position
//! is represented by a pair of marker comments, `<!--[-->` and
//! `<!--]-->`, and its binding points at the opening marker; dynamic
//! content is always inserted between the two.

use smallvec::SmallVec;

use super::value::Value;
use crate::dom::{Document, Node};

/// Child indices from the template's top level down to a node.
pub type NodePath = SmallVec<[usize; 8]>;

/// Text of the comment opening a child position.
pub const PART_START: &str = "[";
/// Text of the comment closing a child position.
pub const PART_END: &str = "]";

/// DOM properties whose attribute form would lose their boolean meaning.
pub const BOOLEAN_PROPERTIES: &[&str] = &[
    "checked",
    "disabled",
    "selected",
    "hidden",
    "readonly",
    "multiple",
    "open",
    "required",
    "autofocus",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Content between two marker comments: text, nested templates, lists.
    Text,
    Attribute,
    Property,
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescriptor {
    pub kind: BindingKind,
    /// Index of the bound node (the opening marker for text bindings).
    pub node: usize,
    pub path: NodePath,
    /// Attribute, property or event name.
    pub name: Option<String>,
    /// For attribute bindings, the attribute template the hole belongs to.
    pub group: Option<usize>,
    /// For attribute bindings, which hole of that attribute this is.
    pub segment: usize,
}

/// An attribute value with one or more holes: `strings` surrounds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTemplate {
    pub node: usize,
    pub name: String,
    pub strings: Vec<String>,
}

impl AttributeTemplate {
    /// Whether the attribute value is exactly one hole with no static text.
    pub fn is_whole(&self) -> bool {
        self.strings.len() == 2 && self.strings.iter().all(String::is_empty)
    }

    /// The attribute value for the given hole values, or `None` when the
    /// attribute should be absent.
    ///
    /// A whole-hole attribute follows boolean semantics: null and `false`
    /// remove it, `true` sets it with an empty value. Holes surrounded by
    /// static text are concatenated, null showing as nothing.
    pub fn render<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> Option<String> {
        let mut values = values.into_iter();
        if self.is_whole() {
            return match values.next() {
                None | Some(Value::Null) | Some(Value::Bool(false)) => None,
                Some(Value::Bool(true)) => Some(String::new()),
                Some(other) => Some(other.to_text()),
            };
        }

        let mut out = String::new();
        for (i, s) in self.strings.iter().enumerate() {
            out.push_str(s);
            if i + 1 < self.strings.len() {
                if let Some(v) = values.next() {
                    out.push_str(&v.to_text());
                }
            }
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProtoKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProtoNode {
    pub(crate) kind: ProtoKind,
    pub(crate) children: Vec<usize>,
    pub(crate) path: NodePath,
    /// Bindings targeting this node.
    pub(crate) bindings: Vec<usize>,
}

/// A parsed template: prototype tree plus binding descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blueprint {
    pub(crate) nodes: Vec<ProtoNode>,
    pub(crate) roots: Vec<usize>,
    pub(crate) bindings: Vec<BindingDescriptor>,
    pub(crate) attributes: Vec<AttributeTemplate>,
}

impl Blueprint {
    pub fn bindings(&self) -> &[BindingDescriptor] {
        &self.bindings
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn attribute_templates(&self) -> &[AttributeTemplate] {
        &self.attributes
    }

    pub(crate) fn node(&self, index: usize) -> &ProtoNode {
        &self.nodes[index]
    }

    pub(crate) fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Whether prototype node `index` opens a child position.
    pub(crate) fn is_part_start(&self, index: usize) -> bool {
        self.nodes[index]
            .bindings
            .iter()
            .any(|&b| self.bindings[b].kind == BindingKind::Text)
    }

    /// Build a fresh copy of the template's static structure.
    ///
    /// The nodes are returned as children of a fragment.
    pub fn instantiate(&self, doc: &Document) -> Node {
        self.instantiate_indexed(doc).0
    }

    /// Like [`Blueprint::instantiate`], also returning every created node
    /// by prototype index.
    pub(crate) fn instantiate_indexed(&self, doc: &Document) -> (Node, Vec<Node>) {
        let fragment = doc.create_fragment();
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            fragment.append_child(&self.build(doc, root, &mut nodes));
        }
        (fragment, nodes)
    }

    fn build(&self, doc: &Document, index: usize, nodes: &mut Vec<Node>) -> Node {
        let proto = &self.nodes[index];
        let node = match &proto.kind {
            ProtoKind::Text(text) => doc.create_text(text),
            ProtoKind::Comment(text) => doc.create_comment(text),
            ProtoKind::Element { tag, attributes } => {
                let element = doc.create_element(tag);
                for (name, value) in attributes {
                    element.set_attribute(name, value);
                }
                element
            }
        };
        nodes.push(node.clone());
        for &child in &proto.children {
            node.append_child(&self.build(doc, child, nodes));
        }
        node
    }

    /// Follow `path` from freshly instantiated top-level nodes.
    pub fn locate(&self, roots: &[Node], path: &[usize]) -> Option<Node> {
        let (first, rest) = path.split_first()?;
        let mut node = roots.get(*first)?.clone();
        for &index in rest {
            node = node.child(index)?;
        }
        Some(node)
    }
}
