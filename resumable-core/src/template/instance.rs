//! Template Instances
//!
//! A [`TemplateInstance`] is one live copy of a blueprint plus one part per
//! binding. Parts remember the last value they applied and touch the DOM
//! only when a new value differs:
//!
//! - child parts replace text only when its string form changes, update a
//!   nested instance in place when the template is the same, and reconcile
//!   lists through [`KeyedList`]
//! - attribute parts collect every hole of one attribute, then write the
//!   attribute once if the combined result changed
//! - property parts assign the value when it differs
//! - event parts swap the listener when a different handler arrives
//!
//! Instances are built either fresh, from a clone of the blueprint, or by
//! adopting server-rendered markup that already has the blueprint's shape.

use std::fmt;
use std::sync::Arc;

use super::blueprint::{BindingKind, Blueprint, ProtoKind, PART_END, PART_START};
use super::cache::blueprint_for;
use super::error::TemplateError;
use super::keyed::KeyedList;
use super::value::{Key, TemplateKey, TemplateResult, Value};
use crate::dom::{Document, EventHandler, Node};

enum Part {
    Child(ChildPart),
    Attribute { group: usize, segment: usize },
    Property(PropertyPart),
    Event(EventPart),
}

/// The holes of one attribute and the value last written for it.
struct AttributePart {
    node: Node,
    values: Vec<Value>,
    /// `None` until the first commit; then the attribute as last written.
    committed: Option<Option<String>>,
}

struct PropertyPart {
    node: Node,
    name: String,
    value: Option<Value>,
}

struct EventPart {
    node: Node,
    event: String,
    handler: Option<EventHandler>,
}

enum Content {
    Empty,
    Text(Node, String),
    Template(Box<TemplateInstance>),
    List(KeyedList<usize>),
    Keyed(KeyedList<Key>),
}

/// Dynamic content between a pair of marker comments.
struct ChildPart {
    start: Node,
    end: Node,
    content: Content,
}

/// Outcome of matching a template against existing markup.
pub(crate) enum Adoption {
    /// Matched; carries the node following the adopted range.
    Adopted(TemplateInstance, Option<Node>),
    Mismatch(String),
}

/// A live, updatable copy of a template.
pub struct TemplateInstance {
    key: TemplateKey,
    blueprint: Arc<Blueprint>,
    /// Owns the nodes while the instance is not mounted.
    fragment: Node,
    roots: Vec<Node>,
    parts: Vec<Part>,
    attributes: Vec<AttributePart>,
}

impl TemplateInstance {
    /// Build the template's nodes and apply the result's values.
    ///
    /// The nodes start out detached; see [`TemplateInstance::mount`].
    pub fn create(doc: &Document, result: &TemplateResult) -> Result<Self, TemplateError> {
        check_result(result)?;
        Self::build(doc, result)
    }

    /// [`create`](Self::create) for a result already passed through
    /// [`check_result`].
    pub(crate) fn build(doc: &Document, result: &TemplateResult) -> Result<Self, TemplateError> {
        let blueprint = blueprint_for(result)?;
        check_count(&blueprint, result.values())?;

        let (fragment, nodes) = blueprint.instantiate_indexed(doc);
        let mut instance = Self::bind(result.key(), blueprint, fragment, &nodes);
        instance.apply(result.values(), false)?;
        Ok(instance)
    }

    /// Match the template against markup starting at `first` and bind to
    /// the existing nodes.
    pub(crate) fn adopt(
        doc: &Document,
        result: &TemplateResult,
        first: Option<Node>,
    ) -> Result<Adoption, TemplateError> {
        let blueprint = blueprint_for(result)?;
        check_count(&blueprint, result.values())?;

        let mut walker = Walker {
            blueprint: &blueprint,
            nodes: Vec::with_capacity(blueprint.node_count()),
        };
        let next = match walker.children(blueprint.roots(), first) {
            Ok(next) => next,
            Err(reason) => return Ok(Adoption::Mismatch(reason)),
        };
        let nodes = walker.nodes;

        let mut instance = Self::bind(
            result.key(),
            Arc::clone(&blueprint),
            doc.create_fragment(),
            &nodes,
        );
        instance.hydrate(result.values())?;
        Ok(Adoption::Adopted(instance, next))
    }

    fn bind(key: TemplateKey, blueprint: Arc<Blueprint>, fragment: Node, nodes: &[Node]) -> Self {
        let roots = blueprint.roots().iter().map(|&i| nodes[i].clone()).collect();
        let attributes = blueprint
            .attribute_templates()
            .iter()
            .map(|t| AttributePart {
                node: nodes[t.node].clone(),
                values: vec![Value::Null; t.strings.len() - 1],
                committed: None,
            })
            .collect();
        let parts = blueprint
            .bindings()
            .iter()
            .map(|b| {
                let node = nodes[b.node].clone();
                let name = b.name.clone().unwrap_or_default();
                match b.kind {
                    BindingKind::Text => Part::Child(ChildPart {
                        start: node,
                        end: nodes[b.node + 1].clone(),
                        content: Content::Empty,
                    }),
                    BindingKind::Attribute => Part::Attribute {
                        group: b.group.unwrap_or_default(),
                        segment: b.segment,
                    },
                    BindingKind::Property => Part::Property(PropertyPart {
                        node,
                        name,
                        value: None,
                    }),
                    BindingKind::Event => Part::Event(EventPart {
                        node,
                        event: name,
                        handler: None,
                    }),
                }
            })
            .collect();

        Self {
            key,
            blueprint,
            fragment,
            roots,
            parts,
            attributes,
        }
    }

    pub fn key(&self) -> TemplateKey {
        self.key
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn binding_count(&self) -> usize {
        self.parts.len()
    }

    pub fn first_node(&self) -> Option<Node> {
        self.roots.first().cloned()
    }

    pub fn last_node(&self) -> Option<Node> {
        self.roots.last().cloned()
    }

    /// Every node the instance occupies, dynamic content included, in
    /// document order.
    pub fn nodes(&self) -> Vec<Node> {
        let (Some(first), Some(last)) = (self.roots.first(), self.roots.last()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut current = Some(first.clone());
        while let Some(node) = current {
            let done = node.ptr_eq(last);
            current = if done { None } else { node.next_sibling() };
            out.push(node);
        }
        out
    }

    /// Insert the instance's nodes into `parent` before `before`, or at the
    /// end. Mounted nodes are moved.
    pub fn mount(&self, parent: &Node, before: Option<&Node>) {
        for node in self.nodes() {
            parent.insert_before(&node, before);
        }
    }

    fn mount_before(&self, reference: &Node) {
        if let Some(parent) = reference.parent() {
            self.mount(&parent, Some(reference));
        }
    }

    /// Take the instance's nodes out of the document. They can be mounted
    /// again later.
    pub fn unmount(&self) {
        for node in self.nodes() {
            self.fragment.append_child(&node);
        }
    }

    /// Apply a new set of values, one per binding, in binding order.
    ///
    /// Bindings whose value is unchanged are not touched. The values,
    /// nested templates and list items included, are checked before
    /// anything is written: a failed update leaves the document as it was.
    pub fn update(&mut self, values: &[Value]) -> Result<(), TemplateError> {
        check_values(&self.blueprint, values)?;
        self.apply(values, false)
    }

    /// [`update`](Self::update) for values already checked.
    pub(crate) fn patch(&mut self, values: &[Value]) -> Result<(), TemplateError> {
        self.apply(values, false)
    }

    fn hydrate(&mut self, values: &[Value]) -> Result<(), TemplateError> {
        let templates = self.blueprint.attribute_templates();
        for (attribute, template) in self.attributes.iter_mut().zip(templates) {
            attribute.committed = Some(attribute.node.attribute(&template.name));
        }
        self.apply(values, true)
    }

    fn apply(&mut self, values: &[Value], hydrating: bool) -> Result<(), TemplateError> {
        check_count(&self.blueprint, values)?;

        let doc = self.fragment.document();
        let Self {
            parts,
            attributes,
            blueprint,
            ..
        } = self;

        for (part, value) in parts.iter_mut().zip(values) {
            match part {
                Part::Child(child) if hydrating => child.hydrate(&doc, value)?,
                Part::Child(child) => child.update(&doc, value)?,
                Part::Attribute { group, segment } => {
                    let slot = &mut attributes[*group].values[*segment];
                    if slot != value {
                        *slot = value.clone();
                    }
                }
                Part::Property(property) => property.update(value),
                Part::Event(event) => event.update(value),
            }
        }

        for (attribute, template) in attributes.iter_mut().zip(blueprint.attribute_templates()) {
            let next = template.render(&attribute.values);
            if attribute.committed.as_ref() == Some(&next) {
                continue;
            }
            match &next {
                Some(value) => attribute.node.set_attribute(&template.name, value),
                None => {
                    attribute.node.remove_attribute(&template.name);
                }
            }
            attribute.committed = Some(next);
        }
        Ok(())
    }
}

impl fmt::Debug for TemplateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInstance")
            .field("key", &self.key)
            .field("bindings", &self.parts.len())
            .field("roots", &self.roots.len())
            .finish()
    }
}

fn check_count(blueprint: &Blueprint, values: &[Value]) -> Result<(), TemplateError> {
    if blueprint.binding_count() == values.len() {
        Ok(())
    } else {
        Err(TemplateError::BindingCountMismatch {
            expected: blueprint.binding_count(),
            actual: values.len(),
        })
    }
}

/// Check `values` against `blueprint`, descending into nested templates and
/// list items, so applying them cannot fail halfway through.
fn check_values(blueprint: &Blueprint, values: &[Value]) -> Result<(), TemplateError> {
    check_count(blueprint, values)?;
    for (index, (binding, value)) in blueprint.bindings().iter().zip(values).enumerate() {
        match (binding.kind, value) {
            (BindingKind::Event, Value::Handler(_) | Value::Null) => {}
            (BindingKind::Event, found) => {
                return Err(TemplateError::NotAHandler {
                    event: binding.name.clone().unwrap_or_default(),
                    found: found.kind_name(),
                });
            }
            (BindingKind::Text, Value::Handler(_)) => {
                return Err(TemplateError::NotRenderable {
                    index,
                    found: value.kind_name(),
                });
            }
            (BindingKind::Text, Value::Template(result)) => check_result(result)?,
            (BindingKind::Text, Value::List(items)) => {
                items.iter().try_for_each(check_result)?;
            }
            (BindingKind::Text, Value::Keyed(items)) => {
                items.iter().try_for_each(|(_, result)| check_result(result))?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parse (or fetch) the result's blueprint and check its values.
pub(crate) fn check_result(result: &TemplateResult) -> Result<(), TemplateError> {
    let blueprint = blueprint_for(result)?;
    check_values(&blueprint, result.values())
}

/// Equality for change detection: NaN matches NaN.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

impl PropertyPart {
    fn update(&mut self, value: &Value) {
        if self.value.as_ref().is_some_and(|current| same_value(current, value)) {
            return;
        }
        self.node.set_property(&self.name, value.clone());
        self.value = Some(value.clone());
    }
}

impl EventPart {
    fn update(&mut self, value: &Value) {
        let next = match value {
            Value::Handler(handler) => Some(handler),
            _ => None,
        };
        match (&self.handler, next) {
            (Some(current), Some(next)) if current.ptr_eq(next) => return,
            (None, None) => return,
            _ => {}
        }
        if let Some(previous) = self.handler.take() {
            self.node.remove_event_listener(&self.event, &previous);
        }
        if let Some(handler) = next {
            self.node.add_event_listener(&self.event, handler.clone());
            self.handler = Some(handler.clone());
        }
    }
}

impl ChildPart {
    fn update(&mut self, doc: &Document, value: &Value) -> Result<(), TemplateError> {
        match value {
            // Handlers are rejected before any part is updated.
            Value::Null | Value::Handler(_) => self.clear(),
            Value::Template(result) => {
                if let Content::Template(instance) = &mut self.content {
                    if instance.key() == result.key() {
                        return instance.patch(result.values());
                    }
                }
                let instance = TemplateInstance::build(doc, result)?;
                self.clear();
                instance.mount_before(&self.end);
                self.content = Content::Template(Box::new(instance));
            }
            Value::List(items) => {
                if !matches!(self.content, Content::List(_)) {
                    self.clear();
                    self.content = Content::List(KeyedList::new());
                }
                if let (Content::List(list), Some(parent)) = (&mut self.content, self.end.parent()) {
                    list.patch(doc, &parent, Some(&self.end), items.iter().enumerate())?;
                }
            }
            Value::Keyed(items) => {
                if !matches!(self.content, Content::Keyed(_)) {
                    self.clear();
                    self.content = Content::Keyed(KeyedList::new());
                }
                if let (Content::Keyed(list), Some(parent)) = (&mut self.content, self.end.parent()) {
                    let items = items.iter().map(|(key, result)| (key.clone(), result));
                    list.patch(doc, &parent, Some(&self.end), items)?;
                }
            }
            scalar => {
                let text = scalar.to_text();
                if let Content::Text(node, current) = &mut self.content {
                    if *current != text {
                        node.set_text(&text);
                        *current = text;
                    }
                    return Ok(());
                }
                self.clear();
                let node = doc.create_text(&text);
                if let Some(parent) = self.end.parent() {
                    parent.insert_before(&node, Some(&self.end));
                }
                self.content = Content::Text(node, text);
            }
        }
        Ok(())
    }

    /// Bind to whatever the server rendered between the markers, falling
    /// back to a regular update when it does not fit the value.
    fn hydrate(&mut self, doc: &Document, value: &Value) -> Result<(), TemplateError> {
        let first = self.start.next_sibling();
        let is_end = |node: &Option<Node>| node.as_ref().is_some_and(|n| n.ptr_eq(&self.end));

        let adopted = match value {
            Value::Null => is_end(&first),
            Value::Template(result) => match TemplateInstance::adopt(doc, result, first.clone())? {
                Adoption::Adopted(instance, next) if is_end(&next) => {
                    self.content = Content::Template(Box::new(instance));
                    return Ok(());
                }
                _ => false,
            },
            Value::List(items) => match adopt_sequence(doc, items.iter().enumerate(), first.clone())? {
                Some((list, next)) if is_end(&next) => {
                    self.content = Content::List(list);
                    return Ok(());
                }
                _ => false,
            },
            Value::Keyed(items) => {
                let items = items.iter().map(|(key, result)| (key.clone(), result));
                match adopt_sequence(doc, items, first.clone())? {
                    Some((list, next)) if is_end(&next) => {
                        self.content = Content::Keyed(list);
                        return Ok(());
                    }
                    _ => false,
                }
            }
            Value::Handler(_) => false,
            _ => match &first {
                Some(node) if node.is_text() && is_end(&node.next_sibling()) => {
                    self.content = Content::Text(node.clone(), node.text());
                    true
                }
                _ => false,
            },
        };

        if !adopted && !is_end(&first) {
            tracing::warn!(
                expected = value.kind_name(),
                "server content does not match child value, rendering fresh"
            );
            self.clear();
        }
        self.update(doc, value)
    }

    /// Remove everything between the markers.
    fn clear(&mut self) {
        let mut next = self.start.next_sibling();
        while let Some(node) = next {
            if node.ptr_eq(&self.end) {
                break;
            }
            next = node.next_sibling();
            node.remove();
        }
        self.content = Content::Empty;
    }
}

/// Adopt consecutive instances, one per item, starting at `first`.
fn adopt_sequence<'a, K>(
    doc: &Document,
    items: impl IntoIterator<Item = (K, &'a TemplateResult)>,
    first: Option<Node>,
) -> Result<Option<(KeyedList<K>, Option<Node>)>, TemplateError>
where
    K: std::hash::Hash + Eq + Clone + fmt::Debug,
{
    let mut list = KeyedList::new();
    let mut cursor = first;
    for (key, result) in items {
        match TemplateInstance::adopt(doc, result, cursor)? {
            Adoption::Adopted(instance, next) => {
                if !list.push_adopted(key, instance) {
                    return Ok(None);
                }
                cursor = next;
            }
            Adoption::Mismatch(reason) => {
                tracing::debug!(%reason, "list item does not match server content");
                return Ok(None);
            }
        }
    }
    Ok(Some((list, cursor)))
}

/// Walks existing markup in step with a blueprint's prototype tree,
/// recording the node matched to each prototype index.
struct Walker<'a> {
    blueprint: &'a Blueprint,
    nodes: Vec<Node>,
}

impl Walker<'_> {
    /// Match `protos` against `first` and its following siblings. Returns
    /// the node after the last match.
    fn children(&mut self, protos: &[usize], first: Option<Node>) -> Result<Option<Node>, String> {
        let blueprint = self.blueprint;
        let mut cursor = first;
        for &index in protos {
            let node = cursor.ok_or_else(|| format!("markup ends before node {index}"))?;
            debug_assert_eq!(self.nodes.len(), index);
            self.nodes.push(node.clone());

            let proto = blueprint.node(index);
            cursor = match &proto.kind {
                ProtoKind::Element { tag, .. } => {
                    if node.tag_name() != Some(tag.as_str()) {
                        return Err(format!("expected <{tag}>, found {node:?}"));
                    }
                    if let Some(extra) = self.children(&proto.children, node.first_child())? {
                        return Err(format!("unexpected {extra:?} inside <{tag}>"));
                    }
                    node.next_sibling()
                }
                ProtoKind::Text(text) => {
                    if !node.is_text() || node.text() != *text {
                        return Err(format!("expected text {text:?}, found {node:?}"));
                    }
                    node.next_sibling()
                }
                ProtoKind::Comment(text) => {
                    if !node.is_comment() || node.text() != *text {
                        return Err(format!("expected comment {text:?}, found {node:?}"));
                    }
                    if blueprint.is_part_start(index) {
                        Some(matching_end(&node)?)
                    } else {
                        node.next_sibling()
                    }
                }
            };
        }
        Ok(cursor)
    }
}

/// The marker closing the child position opened by `start`.
fn matching_end(start: &Node) -> Result<Node, String> {
    let mut depth = 0usize;
    let mut current = start.next_sibling();
    while let Some(node) = current {
        if node.is_comment() {
            let text = node.text();
            if text == PART_START {
                depth += 1;
            } else if text == PART_END {
                if depth == 0 {
                    return Ok(node);
                }
                depth -= 1;
            }
        }
        current = node.next_sibling();
    }
    Err("child position is not closed".to_string())
}

/// A container whose content is rendered from one template at a time.
///
/// Rendering the same template again updates the existing instance;
/// rendering a different one replaces it. A root created with
/// [`RenderRoot::after`] leaves the container's children up to and
/// including the anchor alone.
pub struct RenderRoot {
    container: Node,
    anchor: Option<Node>,
    instance: Option<TemplateInstance>,
}

impl RenderRoot {
    pub fn new(container: Node) -> Self {
        Self {
            container,
            anchor: None,
            instance: None,
        }
    }

    /// Manage only the content following `anchor` in `container`.
    pub fn after(container: Node, anchor: Node) -> Self {
        Self {
            container,
            anchor: Some(anchor),
            instance: None,
        }
    }

    pub fn container(&self) -> &Node {
        &self.container
    }

    pub fn instance(&self) -> Option<&TemplateInstance> {
        self.instance.as_ref()
    }

    pub fn render(&mut self, result: &TemplateResult) -> Result<(), TemplateError> {
        if let Some(instance) = &mut self.instance {
            if instance.key() == result.key() {
                return instance.update(result.values());
            }
        }

        let doc = self.container.document();
        let instance = TemplateInstance::create(&doc, result)?;
        if let Some(previous) = self.instance.take() {
            previous.unmount();
        }
        instance.mount(&self.container, None);
        self.instance = Some(instance);
        Ok(())
    }

    /// Bind to markup already in the container instead of rendering it.
    ///
    /// Returns whether the existing markup was adopted. When it does not
    /// match the template, it is discarded and rendered fresh.
    pub fn hydrate(&mut self, result: &TemplateResult) -> Result<bool, TemplateError> {
        check_result(result)?;
        let doc = self.container.document();
        let first = match &self.anchor {
            Some(anchor) => anchor.next_sibling(),
            None => self.container.first_child(),
        };
        let reason = match TemplateInstance::adopt(&doc, result, first)? {
            Adoption::Adopted(instance, None) => {
                self.instance = Some(instance);
                return Ok(true);
            }
            Adoption::Adopted(_, Some(extra)) => format!("unexpected trailing {extra:?}"),
            Adoption::Mismatch(reason) => reason,
        };

        tracing::warn!(%reason, "server markup does not match template, rendering fresh");
        self.discard_markup();
        self.instance = None;
        self.render(result)?;
        Ok(false)
    }

    fn discard_markup(&self) {
        let stale: Vec<Node> = match &self.anchor {
            Some(anchor) => std::iter::successors(anchor.next_sibling(), Node::next_sibling).collect(),
            None => self.container.children(),
        };
        for node in stale {
            self.container.remove_child(&node);
        }
    }

    /// Remove the rendered content.
    pub fn clear(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.unmount();
        }
    }
}

impl fmt::Debug for RenderRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderRoot")
            .field("container", &self.container)
            .field("anchor", &self.anchor)
            .field("instance", &self.instance)
            .finish()
    }
}
