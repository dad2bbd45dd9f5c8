//! Running component instances.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value as JsonValue};

use super::error::MountError;
use super::state::ComponentState;
use super::{ActionTable, ComponentDef, Props, ViewContext};
use crate::dom::Node;
use crate::reactive::{Effect, Runtime};
use crate::template::RenderRoot;

/// Where an instance's initial state comes from.
pub(crate) struct StateInit<'a> {
    pub(crate) props: &'a Props,
    pub(crate) seed: Option<&'a Map<String, JsonValue>>,
}

/// A component instance whose view is kept in sync with its state.
pub struct MountedComponent {
    name: String,
    instance_id: String,
    host: Node,
    style: Option<Node>,
    state: ComponentState,
    root: Rc<RefCell<RenderRoot>>,
    effect: Option<Effect>,
}

impl MountedComponent {
    /// Render `def` into `host`, replacing whatever `host` contained.
    ///
    /// `seed` supplies initial values for plain and signal entries; the
    /// rest start from the definition's default props.
    pub fn mount(
        rt: &Runtime,
        def: &ComponentDef,
        host: &Node,
        seed: Option<&Map<String, JsonValue>>,
    ) -> Result<Self, MountError> {
        Self::mount_fresh(rt, def, host, &def.default_props(), seed)
    }

    /// Render `def` into `host` with initial state built from `props`.
    pub fn mount_with_props(
        rt: &Runtime,
        def: &ComponentDef,
        host: &Node,
        props: &Props,
    ) -> Result<Self, MountError> {
        Self::mount_fresh(rt, def, host, &def.resolve_props(props), None)
    }

    fn mount_fresh(
        rt: &Runtime,
        def: &ComponentDef,
        host: &Node,
        props: &Props,
        seed: Option<&Map<String, JsonValue>>,
    ) -> Result<Self, MountError> {
        host.clear_children();
        let style = append_stylesheet(def, host);
        let instance_id = host
            .attribute(crate::ssr::ATTR_INSTANCE_ID)
            .unwrap_or_else(|| def.name().to_string());
        let init = StateInit { props, seed };
        Self::start(rt, def, host, instance_id, style, init, false)
    }

    /// Build the instance state and the view effect. With `adopt`, the
    /// first render binds to the markup already following `style` (or
    /// filling `host`).
    pub(crate) fn start(
        rt: &Runtime,
        def: &ComponentDef,
        host: &Node,
        instance_id: String,
        style: Option<Node>,
        init: StateInit<'_>,
        adopt: bool,
    ) -> Result<Self, MountError> {
        let view = def.view_fn().cloned().ok_or_else(|| MountError::MissingView {
            component: def.name().to_string(),
        })?;
        let root = Rc::new(RefCell::new(match &style {
            Some(style) => RenderRoot::after(host.clone(), style.clone()),
            None => RenderRoot::new(host.clone()),
        }));

        let (state, effect) = def.scoped(rt, || {
            let state = ComponentState::build(rt, def, init.props, init.seed);
            let actions = ActionTable::new(rt, def, &state);
            let pending_adopt = Cell::new(adopt);
            let effect = rt.try_effect({
                let state = state.clone();
                let root = Rc::clone(&root);
                let id = instance_id.clone();
                move || {
                    let result = view(&ViewContext::new(&state, &actions));
                    let mut root = root
                        .try_borrow_mut()
                        .map_err(|_| "view re-rendered while rendering".to_string())?;
                    if pending_adopt.replace(false) {
                        let adopted = root.hydrate(&result).map_err(|e| e.to_string())?;
                        tracing::debug!(instance = %id, adopted, "hydrated component view");
                        Ok(())
                    } else {
                        root.render(&result).map_err(|e| e.to_string())
                    }
                }
            });
            (state, effect)
        });
        let effect = match effect {
            Ok(effect) => effect,
            Err(error) => {
                state.dispose();
                return Err(error.into());
            }
        };

        tracing::debug!(component = def.name(), instance = %instance_id, "mounted component");
        Ok(Self {
            name: def.name().to_string(),
            instance_id,
            host: host.clone(),
            style,
            state,
            root,
            effect: Some(effect),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn host(&self) -> &Node {
        &self.host
    }

    pub fn state(&self) -> &ComponentState {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.effect.is_some()
    }

    /// Number of times the view has rendered.
    pub fn render_count(&self) -> usize {
        self.effect.as_ref().map_or(0, Effect::run_count)
    }

    /// Stop the view and computed entries and remove the rendered content.
    /// Calling it again does nothing.
    pub fn unmount(&mut self) {
        let Some(effect) = self.effect.take() else {
            return;
        };
        effect.dispose();
        self.state.dispose();
        self.root.borrow_mut().clear();
        if let Some(style) = self.style.take() {
            style.remove();
        }
        tracing::debug!(component = %self.name, instance = %self.instance_id, "unmounted component");
    }
}

/// Append `def`'s stylesheet to `host` as a `<style>` element.
pub(crate) fn append_stylesheet(def: &ComponentDef, host: &Node) -> Option<Node> {
    let css = def.stylesheet()?;
    let doc = host.document();
    let style = doc.create_element("style");
    style.append_child(&doc.create_text(css));
    host.append_child(&style);
    Some(style)
}

impl fmt::Debug for MountedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedComponent")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("mounted", &self.is_mounted())
            .field("state", &self.state)
            .finish()
    }
}
