//! Component state.
//!
//! Each named entry is resolved once, when the state is built, into one of
//! three variants: a plain value, a writable signal, or a computed value
//! derived from the other entries.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use super::error::StateError;
use super::{ComponentDef, Initial, Props, StateDef};
use crate::reactive::{Computed, Runtime, Signal};

/// One resolved state entry.
#[derive(Clone)]
pub enum StateValue {
    Raw(JsonValue),
    Signal(Signal<JsonValue>),
    Computed(Computed<JsonValue>),
}

impl StateValue {
    /// Current value, tracking the read for signals and computed values.
    pub fn get(&self) -> JsonValue {
        match self {
            StateValue::Raw(value) => value.clone(),
            StateValue::Signal(signal) => signal.get(),
            StateValue::Computed(computed) => computed.get(),
        }
    }

    pub fn get_untracked(&self) -> JsonValue {
        match self {
            StateValue::Raw(value) => value.clone(),
            StateValue::Signal(signal) => signal.get_untracked(),
            StateValue::Computed(computed) => computed.get_untracked(),
        }
    }

    /// Computed values are derived on each side and never serialized.
    pub fn is_serialized(&self) -> bool {
        !matches!(self, StateValue::Computed(_))
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Raw(value) => f.debug_tuple("Raw").field(value).finish(),
            StateValue::Signal(signal) => f.debug_tuple("Signal").field(signal).finish(),
            StateValue::Computed(computed) => f.debug_tuple("Computed").field(computed).finish(),
        }
    }
}

struct StateInner {
    entries: RefCell<IndexMap<String, StateValue>>,
}

/// The named state of one component instance.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct ComponentState {
    inner: Rc<StateInner>,
}

impl ComponentState {
    /// Resolve `def`'s entries. Plain and signal entries take their value
    /// from `seed` when present there, otherwise their initial value given
    /// `props`. Computed entries see every entry defined before them.
    pub(crate) fn build(
        rt: &Runtime,
        def: &ComponentDef,
        props: &Props,
        seed: Option<&Map<String, JsonValue>>,
    ) -> Self {
        let inner = Rc::new(StateInner {
            entries: RefCell::new(IndexMap::new()),
        });

        for (key, entry) in def.state_defs() {
            let seeded = |initial: &Initial| {
                seed.and_then(|s| s.get(key))
                    .cloned()
                    .unwrap_or_else(|| initial.resolve(props))
            };
            let value = match entry {
                StateDef::Raw(default) => StateValue::Raw(seeded(default)),
                StateDef::Signal(default) => StateValue::Signal(rt.signal(seeded(default))),
                StateDef::Computed(f) => {
                    let f = Rc::clone(f);
                    let weak: Weak<StateInner> = Rc::downgrade(&inner);
                    StateValue::Computed(rt.computed(move || match weak.upgrade() {
                        Some(inner) => f(&ComponentState { inner }),
                        None => JsonValue::Null,
                    }))
                }
            };
            inner.entries.borrow_mut().insert(key.clone(), value);
        }

        Self { inner }
    }

    /// Entry value, tracking the read. `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let entry = self.entry(key)?;
        Some(entry.get())
    }

    pub fn get_untracked(&self, key: &str) -> Option<JsonValue> {
        let entry = self.entry(key)?;
        Some(entry.get_untracked())
    }

    /// Entry value deserialized into `T`, tracking the read.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_value(self.get(key)?).ok()
    }

    /// The resolved entry for `key`.
    pub fn entry(&self, key: &str) -> Option<StateValue> {
        self.inner.entries.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Write a signal entry. Returns whether the value changed.
    pub fn set(&self, key: &str, value: impl Into<JsonValue>) -> Result<bool, StateError> {
        Ok(self.signal(key)?.set(value.into()))
    }

    /// Write a signal entry from its current value.
    pub fn update<F>(&self, key: &str, f: F) -> Result<bool, StateError>
    where
        F: FnOnce(&JsonValue) -> JsonValue,
    {
        Ok(self.signal(key)?.update(f))
    }

    fn signal(&self, key: &str) -> Result<Signal<JsonValue>, StateError> {
        match self.entry(key) {
            Some(StateValue::Signal(signal)) => Ok(signal),
            Some(_) => Err(StateError::ReadOnly {
                key: key.to_string(),
            }),
            None => Err(StateError::UnknownKey {
                key: key.to_string(),
            }),
        }
    }

    /// Current values of every serialized entry, without tracking.
    pub fn snapshot(&self) -> Map<String, JsonValue> {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.is_serialized())
            .map(|(key, entry)| (key.clone(), entry.get_untracked()))
            .collect()
    }

    /// Stop recomputing computed entries.
    pub fn dispose(&self) {
        for entry in self.inner.entries.borrow().values() {
            if let StateValue::Computed(computed) = entry {
                computed.dispose();
            }
        }
    }
}

impl fmt::Debug for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.entries.borrow().iter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def() -> ComponentDef {
        ComponentDef::new("x-cart")
            .constant("currency", json!("EUR"))
            .signal("items", json!(2))
            .signal("price", json!(5))
            .computed("total", |s| {
                let items = s.get_as::<i64>("items").unwrap_or_default();
                let price = s.get_as::<i64>("price").unwrap_or_default();
                json!(items * price)
            })
    }

    #[test]
    fn entries_resolve_to_variants() {
        let rt = Runtime::new();
        let state = ComponentState::build(&rt, &def(), &Props::new(), None);

        assert!(matches!(state.entry("currency"), Some(StateValue::Raw(_))));
        assert!(matches!(state.entry("items"), Some(StateValue::Signal(_))));
        assert!(matches!(state.entry("total"), Some(StateValue::Computed(_))));
        assert_eq!(state.get("total"), Some(json!(10)));
    }

    #[test]
    fn computed_follows_signals() {
        let rt = Runtime::new();
        let state = ComponentState::build(&rt, &def(), &Props::new(), None);

        assert_eq!(state.set("items", 3), Ok(true));
        assert_eq!(state.get("total"), Some(json!(15)));
    }

    #[test]
    fn only_signals_are_writable() {
        let rt = Runtime::new();
        let state = ComponentState::build(&rt, &def(), &Props::new(), None);

        assert_eq!(
            state.set("total", 1),
            Err(StateError::ReadOnly {
                key: "total".into()
            })
        );
        assert_eq!(
            state.set("currency", "USD"),
            Err(StateError::ReadOnly {
                key: "currency".into()
            })
        );
        assert_eq!(
            state.set("nope", 1),
            Err(StateError::UnknownKey { key: "nope".into() })
        );
    }

    #[test]
    fn seed_overrides_defaults_and_snapshot_skips_computed() {
        let rt = Runtime::new();
        let mut seed = Map::new();
        seed.insert("items".into(), json!(4));
        let state = ComponentState::build(&rt, &def(), &Props::new(), Some(&seed));

        assert_eq!(state.get("total"), Some(json!(20)));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.get("items"), Some(&json!(4)));
        assert_eq!(snapshot.get("price"), Some(&json!(5)));
        assert_eq!(snapshot.get("currency"), Some(&json!("EUR")));
        assert!(!snapshot.contains_key("total"));
    }

    #[test]
    fn dispose_stops_computed_entries() {
        let rt = Runtime::new();
        let state = ComponentState::build(&rt, &def(), &Props::new(), None);
        state.dispose();

        state.set("items", 10).unwrap();
        assert_eq!(state.get("total"), Some(json!(10)));
    }
}
