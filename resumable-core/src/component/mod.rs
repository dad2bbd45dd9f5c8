//! Components
//!
//! A [`ComponentDef`] bundles declared props, named state, named actions, an
//! optional stylesheet and a view function producing a [`TemplateResult`].
//! Props only feed the initial state: whatever a prop contributes reaches
//! the client through the serialized state. The same
//! definition is rendered to HTML on the server
//! ([`crate::ssr::render_component`]) and brought to life in the client,
//! either fresh ([`MountedComponent::mount`]) or on top of server markup
//! ([`hydrate_all`]).
//!
//! ```rust
//! use resumable_core::component::ComponentDef;
//! use resumable_core::html;
//! use serde_json::json;
//!
//! let counter = ComponentDef::new("x-counter")
//!     .signal("count", json!(0))
//!     .computed("double", |s| json!(s.get_as::<i64>("count").unwrap_or(0) * 2))
//!     .action("increment", |s, _| {
//!         let _ = s.update("count", |v| json!(v.as_i64().unwrap_or(0) + 1));
//!     })
//!     .view(|cx| {
//!         html!(
//!             "<button @click=", cx.action("increment"), ">",
//!             cx.get("count"), " x2 = ", cx.get("double"), "</button>"
//!         )
//!     });
//! assert_eq!(counter.name(), "x-counter");
//! ```

mod error;
mod hydrate;
mod mount;
mod state;

pub use error::{HydrationError, MountError, SerializationSkew, StateError};
pub use hydrate::{hydrate_all, ComponentRegistry, HydrationReport};
pub use mount::MountedComponent;
pub use state::{ComponentState, StateValue};

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::dom::{Event, EventHandler};
use crate::reactive::{ComputationError, ErrorHandler, Runtime};
use crate::template::{TemplateResult, Value};

/// Resolved props of one instance, by name.
pub type Props = Map<String, JsonValue>;

pub type InitFn = Rc<dyn Fn(&Props) -> JsonValue>;
pub type ComputedFn = Rc<dyn Fn(&ComponentState) -> JsonValue>;
pub type ActionFn = Rc<dyn Fn(&ComponentState, &Event)>;
pub type ViewFn = Rc<dyn Fn(&ViewContext<'_>) -> TemplateResult>;

/// A declared prop.
#[derive(Debug, Clone, PartialEq)]
pub struct PropDef {
    pub default: JsonValue,
    /// Missing required props are logged and fall back to the default.
    pub required: bool,
}

/// Initial value of a plain or signal entry.
#[derive(Clone)]
pub enum Initial {
    Value(JsonValue),
    /// Computed from the instance's props when the state is built.
    FromProps(InitFn),
}

impl Initial {
    pub fn resolve(&self, props: &Props) -> JsonValue {
        match self {
            Initial::Value(value) => value.clone(),
            Initial::FromProps(f) => f(props),
        }
    }
}

impl fmt::Debug for Initial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initial::Value(value) => fmt::Debug::fmt(value, f),
            Initial::FromProps(_) => f.write_str("FromProps(..)"),
        }
    }
}

/// How a state entry is resolved when an instance is built.
#[derive(Clone)]
pub enum StateDef {
    /// A plain value. Serialized, never reactive.
    Raw(Initial),
    /// A signal with this initial value. Serialized.
    Signal(Initial),
    /// Derived from the other entries on each side. Not serialized.
    Computed(ComputedFn),
}

impl fmt::Debug for StateDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateDef::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
            StateDef::Signal(value) => f.debug_tuple("Signal").field(value).finish(),
            StateDef::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A component definition. Cheap to clone.
#[derive(Clone)]
pub struct ComponentDef {
    name: String,
    props: IndexMap<String, PropDef>,
    state: IndexMap<String, StateDef>,
    actions: IndexMap<String, ActionFn>,
    view: Option<ViewFn>,
    style: Option<String>,
    error_handler: Option<ErrorHandler>,
}

impl ComponentDef {
    /// `name` is also the tag of the component's root element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props: IndexMap::new(),
            state: IndexMap::new(),
            actions: IndexMap::new(),
            view: None,
            style: None,
            error_handler: None,
        }
    }

    /// An optional prop.
    pub fn prop(mut self, name: impl Into<String>, default: impl Into<JsonValue>) -> Self {
        self.props.insert(
            name.into(),
            PropDef {
                default: default.into(),
                required: false,
            },
        );
        self
    }

    /// A prop every instance is expected to receive. Its default is null.
    pub fn required_prop(mut self, name: impl Into<String>) -> Self {
        self.props.insert(
            name.into(),
            PropDef {
                default: JsonValue::Null,
                required: true,
            },
        );
        self
    }

    /// A plain state entry.
    pub fn constant(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.state
            .insert(key.into(), StateDef::Raw(Initial::Value(value.into())));
        self
    }

    /// A plain state entry computed from the props.
    pub fn constant_from_props<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Props) -> JsonValue + 'static,
    {
        self.state
            .insert(key.into(), StateDef::Raw(Initial::FromProps(Rc::new(f))));
        self
    }

    /// A writable, reactive state entry.
    pub fn signal(mut self, key: impl Into<String>, default: impl Into<JsonValue>) -> Self {
        self.state
            .insert(key.into(), StateDef::Signal(Initial::Value(default.into())));
        self
    }

    /// A signal entry whose initial value is computed from the props.
    pub fn signal_from_props<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Props) -> JsonValue + 'static,
    {
        self.state
            .insert(key.into(), StateDef::Signal(Initial::FromProps(Rc::new(f))));
        self
    }

    /// A derived state entry. It can read every entry declared before it.
    pub fn computed<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ComponentState) -> JsonValue + 'static,
    {
        self.state
            .insert(key.into(), StateDef::Computed(Rc::new(f)));
        self
    }

    /// A named action. Actions run inside a batch, so the view re-renders
    /// once per action however many entries it writes.
    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ComponentState, &Event) + 'static,
    {
        self.actions.insert(name.into(), Rc::new(f));
        self
    }

    pub fn view<F>(mut self, f: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> TemplateResult + 'static,
    {
        self.view = Some(Rc::new(f));
        self
    }

    /// Stylesheet emitted ahead of the component's markup.
    pub fn style(mut self, css: impl Into<String>) -> Self {
        self.style = Some(css.into());
        self
    }

    /// Receive failures of this component's view and computed entries
    /// instead of the runtime's handler.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ComputationError) + 'static,
    {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prop_defs(&self) -> impl Iterator<Item = (&String, &PropDef)> {
        self.props.iter()
    }

    /// Every declared prop at its default.
    pub fn default_props(&self) -> Props {
        self.props
            .iter()
            .map(|(name, prop)| (name.clone(), prop.default.clone()))
            .collect()
    }

    /// Declared props taken from `given`, defaults filling the gaps.
    /// Undeclared entries of `given` are ignored.
    pub fn resolve_props(&self, given: &Props) -> Props {
        let mut props = Props::new();
        for (name, prop) in &self.props {
            let value = match given.get(name) {
                Some(value) => value.clone(),
                None => {
                    if prop.required {
                        tracing::warn!(component = %self.name, prop = %name, "required prop is missing");
                    }
                    prop.default.clone()
                }
            };
            props.insert(name.clone(), value);
        }
        for name in given.keys().filter(|name| !self.props.contains_key(*name)) {
            tracing::debug!(component = %self.name, prop = %name, "ignoring undeclared prop");
        }
        props
    }

    pub fn state_defs(&self) -> impl Iterator<Item = (&String, &StateDef)> {
        self.state.iter()
    }

    pub fn state_def(&self, key: &str) -> Option<&StateDef> {
        self.state.get(key)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn stylesheet(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub(crate) fn view_fn(&self) -> Option<&ViewFn> {
        self.view.as_ref()
    }

    /// Run `f` with this component's error handler in scope, if it has one.
    pub(crate) fn scoped<R>(&self, rt: &Runtime, f: impl FnOnce() -> R) -> R {
        match &self.error_handler {
            Some(handler) => rt.with_error_handler(Rc::clone(handler), f),
            None => f(),
        }
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("state", &self.state)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

/// Event handlers for a component instance's actions, one per name.
///
/// Handlers are created once so that re-rendering the view rebinds the same
/// listener and leaves the DOM untouched.
pub(crate) struct ActionTable {
    handlers: IndexMap<String, EventHandler>,
}

impl ActionTable {
    pub(crate) fn new(rt: &Runtime, def: &ComponentDef, state: &ComponentState) -> Self {
        let handlers = def
            .actions
            .iter()
            .map(|(name, action)| {
                let weak = rt.downgrade();
                let action = Rc::clone(action);
                let state = state.clone();
                let handler = EventHandler::new(move |event| {
                    weak.batch(|| action(&state, event));
                });
                (name.clone(), handler)
            })
            .collect();
        Self { handlers }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&EventHandler> {
        self.handlers.get(name)
    }
}

/// What a view function sees: the instance state and its actions.
pub struct ViewContext<'a> {
    state: &'a ComponentState,
    actions: &'a ActionTable,
}

impl<'a> ViewContext<'a> {
    pub(crate) fn new(state: &'a ComponentState, actions: &'a ActionTable) -> Self {
        Self { state, actions }
    }

    pub fn state(&self) -> &ComponentState {
        self.state
    }

    /// A state entry as a template value, tracking the read.
    pub fn get(&self, key: &str) -> Value {
        match self.state.get(key) {
            Some(value) => Value::from(value),
            None => {
                tracing::debug!(key, "view read unknown state entry");
                Value::Null
            }
        }
    }

    /// The handler for a named action, for binding with `@event=`.
    pub fn action(&self, name: &str) -> Value {
        match self.actions.get(name) {
            Some(handler) => Value::Handler(handler.clone()),
            None => {
                tracing::warn!(action = name, "view bound unknown action");
                Value::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn builder_keeps_declaration_order() {
        let def = ComponentDef::new("x-form")
            .signal("b", json!(1))
            .constant("a", json!(2))
            .computed("c", |_| json!(null))
            .action("save", |_, _| {})
            .action("reset", |_, _| {});

        let keys: Vec<&str> = def.state_defs().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
        assert_eq!(def.action_names().collect::<Vec<_>>(), ["save", "reset"]);
        assert!(matches!(def.state_def("a"), Some(StateDef::Raw(_))));
    }

    #[test]
    fn props_fill_gaps_with_defaults() {
        let def = ComponentDef::new("x-greeting")
            .prop("greeting", json!("hello"))
            .required_prop("name");

        let mut given = Props::new();
        given.insert("name".into(), json!("Ada"));
        given.insert("colour".into(), json!("red"));
        let props = def.resolve_props(&given);
        assert_eq!(props.get("greeting"), Some(&json!("hello")));
        assert_eq!(props.get("name"), Some(&json!("Ada")));
        assert!(!props.contains_key("colour"));

        let props = def.resolve_props(&Props::new());
        assert_eq!(props.get("name"), Some(&JsonValue::Null));
        assert_eq!(props, def.default_props());
    }

    #[test]
    fn state_initializers_read_props() {
        let rt = Runtime::new();
        let def = ComponentDef::new("x-greeting")
            .prop("name", json!("world"))
            .constant_from_props("title", |p| json!(format!("Hi {}", p["name"].as_str().unwrap_or(""))))
            .signal_from_props("draft", |p| p["name"].clone());

        let mut given = Props::new();
        given.insert("name".into(), json!("Ada"));
        let state = ComponentState::build(&rt, &def, &def.resolve_props(&given), None);
        assert_eq!(state.get("title"), Some(json!("Hi Ada")));
        assert_eq!(state.get("draft"), Some(json!("Ada")));

        let state = ComponentState::build(&rt, &def, &def.default_props(), None);
        assert_eq!(state.get("title"), Some(json!("Hi world")));
    }

    #[test]
    fn actions_run_batched() {
        let rt = Runtime::new();
        let def = ComponentDef::new("x-pair")
            .signal("a", json!(0))
            .signal("b", json!(0))
            .action("both", |s, _| {
                s.set("a", 1).unwrap();
                s.set("b", 1).unwrap();
            });
        let state = ComponentState::build(&rt, &def, &Props::new(), None);
        let actions = ActionTable::new(&rt, &def, &state);

        let runs = Rc::new(Cell::new(0));
        let _effect = rt.effect({
            let (state, runs) = (state.clone(), runs.clone());
            move || {
                state.get("a");
                state.get("b");
                runs.set(runs.get() + 1);
            }
        });

        actions.get("both").unwrap().call(&Event::new("click"));
        assert_eq!(runs.get(), 2);
        assert_eq!(state.get("b"), Some(json!(1)));
    }

    #[test]
    fn unknown_action_binds_nothing() {
        let rt = Runtime::new();
        let def = ComponentDef::new("x-empty");
        let state = ComponentState::build(&rt, &def, &Props::new(), None);
        let actions = ActionTable::new(&rt, &def, &state);
        let cx = ViewContext::new(&state, &actions);

        assert!(cx.action("missing").is_null());
        assert!(cx.get("missing").is_null());
    }
}
