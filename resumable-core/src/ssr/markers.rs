//! Attributes tying server output to client hydration.
//!
//! A rendered component is a root element carrying
//! [`ATTR_COMPONENT_NAME`] and [`ATTR_INSTANCE_ID`], followed by two JSON
//! scripts keyed by the same instance id: the serialized state
//! ([`ATTR_STATE`]) and the rendered markup ([`ATTR_CONTENT`]).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::dom::serialize::escape_attribute;

/// Component name on a root element.
pub const ATTR_COMPONENT_NAME: &str = "data-component-name";

/// Instance id on a root element. Hydration falls back to the component
/// name when it is absent.
pub const ATTR_INSTANCE_ID: &str = "data-instance-id";

/// Marks the script holding an instance's serialized state.
pub const ATTR_STATE: &str = "data-component-state";

/// Marks the script holding an instance's rendered markup.
pub const ATTR_CONTENT: &str = "data-component-ssr";

/// MIME type of both scripts.
pub const SCRIPT_TYPE: &str = "application/json";

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A process-unique instance id for a component named `name`.
pub fn generate_instance_id(name: &str) -> String {
    let n = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{name}-{n}")
}

/// The empty root element marking where an instance lives.
pub fn root_marker(name: &str, instance_id: &str) -> String {
    format!(
        "<{name} {ATTR_COMPONENT_NAME}=\"{}\" {ATTR_INSTANCE_ID}=\"{}\"></{name}>",
        escape_attribute(name),
        escape_attribute(instance_id),
    )
}

/// A JSON script tagged with `attr="instance_id"`. `json` must already be
/// script-safe.
pub fn script_tag(attr: &str, instance_id: &str, json: &str) -> String {
    format!(
        "<script type=\"{SCRIPT_TYPE}\" {attr}=\"{}\">{json}</script>",
        escape_attribute(instance_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique() {
        let a = generate_instance_id("x-card");
        let b = generate_instance_id("x-card");
        assert_ne!(a, b);
        assert!(a.starts_with("x-card-"));
    }

    #[test]
    fn root_marker_carries_both_attributes() {
        assert_eq!(
            root_marker("x-card", "x-card-7"),
            "<x-card data-component-name=\"x-card\" data-instance-id=\"x-card-7\"></x-card>"
        );
    }

    #[test]
    fn script_tag_escapes_instance_id() {
        assert_eq!(
            script_tag(ATTR_STATE, "a\"b", "{}"),
            "<script type=\"application/json\" data-component-state=\"a&quot;b\">{}</script>"
        );
    }
}
