//! Events and listener handles.

use std::fmt;
use std::rc::Rc;

use super::Node;

/// An event delivered to listeners by [`Node::dispatch`].
#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    target: Option<Node>,
    value: Option<String>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target: None,
            value: None,
        }
    }

    /// Attach the payload of an input-style event (the field's new value).
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> Option<&Node> {
        self.target.as_ref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub(crate) fn targeted(&self, target: &Node) -> Self {
        Self {
            event_type: self.event_type.clone(),
            target: Some(target.clone()),
            value: self.value.clone(),
        }
    }
}

/// A listener function.
///
/// Handlers compare by identity: two handles are equal only if they share
/// the same allocation. Template event bindings rely on this to skip
/// rebinding an unchanged handler.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}
