//! Document and node tree.
//!
//! Nodes are reference-counted handles: cloning a [`Node`] yields another
//! handle to the same node, and [`Node::ptr_eq`] compares identity. Parents
//! own their children; children hold a weak link back to their parent.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::event::{Event, EventHandler};
use super::serialize;
use crate::template::Value;

#[derive(Debug, Default)]
struct DocumentInner {
    mutations: Cell<u64>,
}

impl DocumentInner {
    fn record(&self) {
        self.mutations.set(self.mutations.get() + 1);
    }
}

/// Node factory and mutation counter.
///
/// Every structural change, text write, attribute write, property write
/// and listener change made to a node of this document increments
/// [`Document::mutation_count`].
#[derive(Clone, Default)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&self, tag: &str) -> Node {
        self.create(NodeKind::Element(tag.to_ascii_lowercase()), String::new())
    }

    pub fn create_text(&self, text: &str) -> Node {
        self.create(NodeKind::Text, text.to_string())
    }

    pub fn create_comment(&self, text: &str) -> Node {
        self.create(NodeKind::Comment, text.to_string())
    }

    /// A parentless container whose children move out when it is inserted.
    pub fn create_fragment(&self) -> Node {
        self.create(NodeKind::Fragment, String::new())
    }

    /// Total mutations applied to nodes of this document so far.
    pub fn mutation_count(&self) -> u64 {
        self.inner.mutations.get()
    }

    fn create(&self, kind: NodeKind, text: String) -> Node {
        Node(Rc::new(NodeInner {
            document: Rc::clone(&self.inner),
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: RefCell::new(text),
            attributes: RefCell::new(IndexMap::new()),
            properties: RefCell::new(IndexMap::new()),
            listeners: RefCell::new(Vec::new()),
        }))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("mutation_count", &self.mutation_count())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Lower-cased tag name.
    Element(String),
    Text,
    Comment,
    Fragment,
}

struct NodeInner {
    document: Rc<DocumentInner>,
    kind: NodeKind,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    text: RefCell<String>,
    attributes: RefCell<IndexMap<String, String>>,
    properties: RefCell<IndexMap<String, Value>>,
    listeners: RefCell<Vec<(String, EventHandler)>>,
}

/// A handle to a node in a [`Document`].
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl Node {
    pub fn document(&self) -> Document {
        Document {
            inner: Rc::clone(&self.0.document),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == NodeKind::Text
    }

    pub fn is_comment(&self) -> bool {
        self.0.kind == NodeKind::Comment
    }

    pub fn is_fragment(&self) -> bool {
        self.0.kind == NodeKind::Fragment
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.children.borrow().get(index).cloned()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.child(0)
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.children.borrow().last().cloned()
    }

    /// Position of this node among its parent's children.
    pub fn index(&self) -> Option<usize> {
        let parent = self.parent()?;
        let children = parent.0.children.borrow();
        children.iter().position(|c| c.ptr_eq(self))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.index()?;
        parent.child(index + 1)
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.index()?;
        index.checked_sub(1).and_then(|i| parent.child(i))
    }

    /// Whether `self` is `other` or one of its descendants.
    pub fn is_inclusive_descendant_of(&self, other: &Node) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.ptr_eq(other) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// All descendants in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<Node>) {
        for child in self.0.children.borrow().iter() {
            out.push(child.clone());
            child.collect_descendants(out);
        }
    }

    /// First descendant matching `predicate`, in document order.
    pub fn find(&self, predicate: impl Fn(&Node) -> bool) -> Option<Node> {
        self.descendants().into_iter().find(|n| predicate(n))
    }

    /// First descendant element with the given tag name.
    pub fn find_element(&self, tag: &str) -> Option<Node> {
        self.find(|n| n.tag_name() == Some(tag))
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of `self`.
    ///
    /// A child that already has a parent is moved. Inserting a fragment
    /// moves its children in order and leaves it empty. Inserting a node
    /// into itself or one of its descendants is ignored.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child.is_fragment() {
            let moved = std::mem::take(&mut *child.0.children.borrow_mut());
            for node in moved {
                *node.0.parent.borrow_mut() = Weak::new();
                self.insert_before(&node, reference);
            }
            return;
        }
        if self.is_inclusive_descendant_of(child) {
            tracing::warn!("ignoring insertion of a node into its own subtree");
            return;
        }

        let reference = match reference {
            Some(r) if r.ptr_eq(child) => child.next_sibling(),
            other => other.cloned(),
        };

        child.detach();
        {
            let mut children = self.0.children.borrow_mut();
            let index = reference
                .as_ref()
                .and_then(|r| children.iter().position(|c| c.ptr_eq(r)))
                .unwrap_or(children.len());
            children.insert(index, child.clone());
        }
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.document.record();
    }

    /// Remove `child` if it is a child of `self`. Returns whether it was.
    pub fn remove_child(&self, child: &Node) -> bool {
        match child.parent() {
            Some(parent) if parent.ptr_eq(self) => {
                child.remove();
                true
            }
            _ => false,
        }
    }

    /// Detach this node from its parent, if any.
    pub fn remove(&self) {
        if self.detach() {
            self.0.document.record();
        }
    }

    /// Remove every child.
    pub fn clear_children(&self) {
        for child in self.children() {
            child.remove();
        }
    }

    fn detach(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        parent.0.children.borrow_mut().retain(|c| !c.ptr_eq(self));
        *self.0.parent.borrow_mut() = Weak::new();
        true
    }

    // ------------------------------------------------------------------
    // Character data
    // ------------------------------------------------------------------

    /// The data of a text or comment node.
    pub fn text(&self) -> String {
        self.0.text.borrow().clone()
    }

    pub fn set_text(&self, text: &str) {
        *self.0.text.borrow_mut() = text.to_string();
        self.0.document.record();
    }

    /// Concatenated text of this node and its descendant text nodes.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text | NodeKind::Comment => self.text(),
            _ => self
                .descendants()
                .iter()
                .filter(|n| n.is_text())
                .map(|n| n.text())
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains_key(name)
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0
            .attributes
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.0.document.record();
    }

    /// Remove an attribute. Returns whether it was present; removing a
    /// missing attribute is not a mutation.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let removed = self.0.attributes.borrow_mut().shift_remove(name).is_some();
        if removed {
            self.0.document.record();
        }
        removed
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn property(&self, name: &str) -> Option<Value> {
        self.0.properties.borrow().get(name).cloned()
    }

    pub fn set_property(&self, name: &str, value: Value) {
        self.0
            .properties
            .borrow_mut()
            .insert(name.to_string(), value);
        self.0.document.record();
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener(&self, event_type: &str, handler: EventHandler) {
        self.0
            .listeners
            .borrow_mut()
            .push((event_type.to_string(), handler));
        self.0.document.record();
    }

    /// Remove one registration of `handler` for `event_type`. Returns
    /// whether a listener was removed.
    pub fn remove_event_listener(&self, event_type: &str, handler: &EventHandler) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let position = listeners
            .iter()
            .position(|(t, h)| t == event_type && h.ptr_eq(handler));
        match position {
            Some(index) => {
                listeners.remove(index);
                drop(listeners);
                self.0.document.record();
                true
            }
            None => false,
        }
    }

    /// Number of listeners registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|(t, _)| t == event_type)
            .count()
    }

    /// Call every listener registered for the event's type on this node.
    /// Returns how many listeners ran.
    ///
    /// Listeners may add or remove listeners; the set is fixed when
    /// dispatch starts.
    pub fn dispatch(&self, event: &Event) -> usize {
        let handlers: Vec<EventHandler> = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|(t, _)| t == event.event_type())
            .map(|(_, h)| h.clone())
            .collect();
        let event = event.targeted(self);
        for handler in &handlers {
            handler.call(&event);
        }
        handlers.len()
    }

    /// Shorthand for dispatching a bare event of `event_type`.
    pub fn emit(&self, event_type: &str) -> usize {
        self.dispatch(&Event::new(event_type))
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// This node and its subtree as HTML.
    pub fn to_html(&self) -> String {
        serialize::outer_html(self)
    }

    /// The children of this node as HTML.
    pub fn inner_html(&self) -> String {
        serialize::inner_html(self)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element(tag) => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("children", &self.child_count())
                .finish(),
            NodeKind::Text => f.debug_tuple("Text").field(&*self.0.text.borrow()).finish(),
            NodeKind::Comment => f
                .debug_tuple("Comment")
                .field(&*self.0.text.borrow())
                .finish(),
            NodeKind::Fragment => f
                .debug_struct("Fragment")
                .field("children", &self.child_count())
                .finish(),
        }
    }
}
