//! Server-Side Rendering
//!
//! Renders templates and components to HTML strings, together with the
//! data the client needs to resume them. See [`crate::component::hydrate_all`]
//! for the client half.

mod markers;
mod render;
mod state;

pub use markers::{
    generate_instance_id, root_marker, script_tag, ATTR_COMPONENT_NAME, ATTR_CONTENT,
    ATTR_INSTANCE_ID, ATTR_STATE, SCRIPT_TYPE,
};
pub use render::{render_component, render_component_with_props, render_to_string, RenderError};
pub use state::{escape_script_json, ContentBlob, SsrState};
