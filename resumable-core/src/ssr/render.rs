//! HTML rendering without a document.
//!
//! The output has the node structure instantiating the template would
//! produce, so the client can adopt it node for node: child positions keep
//! their marker comments. Property bindings with scalar values are written
//! as attributes so the markup means the same thing before hydration;
//! event bindings are dropped.

use indexmap::IndexMap;
use thiserror::Error;

use super::markers::{root_marker, script_tag, ATTR_CONTENT, ATTR_STATE};
use super::state::{ContentBlob, SsrState};
use crate::component::{ActionTable, ComponentDef, ComponentState, Props, ViewContext};
use crate::dom::serialize::{escape_text, is_raw_text, is_void, write_attribute};
use crate::reactive::Runtime;
use crate::template::{
    blueprint_for, BindingKind, Blueprint, Key, ProtoKind, TemplateError, TemplateResult, Value,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("component `{component}` has no view")]
    MissingView { component: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to serialize hydration data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render a template result to HTML.
pub fn render_to_string(result: &TemplateResult) -> Result<String, TemplateError> {
    let mut out = String::new();
    write_result(&mut out, result)?;
    Ok(out)
}

/// Render one instance of a component as its root marker, state script and
/// content script.
///
/// State is built from the definition's default props; computed entries
/// are evaluated for the view and left out of the serialized state.
pub fn render_component(rt: &Runtime, def: &ComponentDef, instance_id: &str) -> Result<String, RenderError> {
    render_component_with_props(rt, def, instance_id, &Props::new())
}

/// [`render_component`] with per-instance props. Missing props take their
/// defaults; the state they produce is what the client resumes from.
pub fn render_component_with_props(
    rt: &Runtime,
    def: &ComponentDef,
    instance_id: &str,
    props: &Props,
) -> Result<String, RenderError> {
    let view = def.view_fn().ok_or_else(|| RenderError::MissingView {
        component: def.name().to_string(),
    })?;

    let props = def.resolve_props(props);
    let state = def.scoped(rt, || ComponentState::build(rt, def, &props, None));
    let actions = ActionTable::new(rt, def, &state);
    let result = rt.untrack(|| view(&ViewContext::new(&state, &actions)));
    let html = render_to_string(&result);
    let snapshot = SsrState::from(state.snapshot());
    state.dispose();

    let mut content = String::new();
    if let Some(css) = def.stylesheet() {
        content.push_str("<style>");
        content.push_str(css);
        content.push_str("</style>");
    }
    content.push_str(&html?);

    let mut out = root_marker(def.name(), instance_id);
    out.push_str(&script_tag(ATTR_STATE, instance_id, &snapshot.to_script_json()?));
    out.push_str(&script_tag(
        ATTR_CONTENT,
        instance_id,
        &ContentBlob::new(content).to_script_json()?,
    ));
    tracing::debug!(component = def.name(), instance = instance_id, "rendered component");
    Ok(out)
}

fn write_result(out: &mut String, result: &TemplateResult) -> Result<(), TemplateError> {
    let blueprint = blueprint_for(result)?;
    let values = result.values();
    if values.len() != blueprint.binding_count() {
        return Err(TemplateError::BindingCountMismatch {
            expected: blueprint.binding_count(),
            actual: values.len(),
        });
    }

    let writer = Writer {
        blueprint: &blueprint,
        values,
    };
    for &root in blueprint.roots() {
        writer.node(out, root, false)?;
    }
    Ok(())
}

struct Writer<'a> {
    blueprint: &'a Blueprint,
    values: &'a [Value],
}

impl Writer<'_> {
    fn node(&self, out: &mut String, index: usize, raw: bool) -> Result<(), TemplateError> {
        let proto = self.blueprint.node(index);
        match &proto.kind {
            ProtoKind::Text(text) if raw => out.push_str(text),
            ProtoKind::Text(text) => out.push_str(&escape_text(text)),
            ProtoKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
                for &b in &proto.bindings {
                    if self.blueprint.bindings()[b].kind == BindingKind::Text {
                        write_child(out, b, &self.values[b])?;
                    }
                }
            }
            ProtoKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    write_attribute(out, name, value);
                }
                for &b in &proto.bindings {
                    self.binding(out, b)?;
                }
                out.push('>');
                if is_void(tag) {
                    return Ok(());
                }
                let raw = is_raw_text(tag);
                for &child in &proto.children {
                    self.node(out, child, raw)?;
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        Ok(())
    }

    fn binding(&self, out: &mut String, index: usize) -> Result<(), TemplateError> {
        let binding = &self.blueprint.bindings()[index];
        let value = &self.values[index];
        let name = binding.name.as_deref().unwrap_or_default();
        match binding.kind {
            BindingKind::Attribute if binding.segment == 0 => {
                let Some(group) = binding.group else {
                    return Ok(());
                };
                let template = &self.blueprint.attribute_templates()[group];
                let segments = self
                    .blueprint
                    .bindings()
                    .iter()
                    .zip(self.values)
                    .filter(|(b, _)| b.kind == BindingKind::Attribute && b.group == Some(group))
                    .map(|(_, v)| v);
                if let Some(rendered) = template.render(segments) {
                    write_attribute(out, &template.name, &rendered);
                }
            }
            BindingKind::Property => match value {
                Value::Bool(true) => write_attribute(out, name, ""),
                Value::Bool(_) | Value::Null => {}
                v if v.is_scalar() => write_attribute(out, name, &v.to_text()),
                _ => {}
            },
            BindingKind::Event if !matches!(value, Value::Handler(_) | Value::Null) => {
                return Err(TemplateError::NotAHandler {
                    event: name.to_string(),
                    found: value.kind_name(),
                });
            }
            _ => {}
        }
        Ok(())
    }
}

fn write_child(out: &mut String, index: usize, value: &Value) -> Result<(), TemplateError> {
    match value {
        Value::Null => {}
        Value::Handler(_) => {
            return Err(TemplateError::NotRenderable {
                index,
                found: value.kind_name(),
            });
        }
        Value::Template(result) => write_result(out, result)?,
        Value::List(items) => {
            for item in items {
                write_result(out, item)?;
            }
        }
        Value::Keyed(items) => {
            // Same dedup as the client: a repeated key renders once, at
            // its last position.
            let mut unique: IndexMap<&Key, &TemplateResult> = IndexMap::new();
            for (key, item) in items {
                unique.shift_remove(key);
                unique.insert(key, item);
            }
            for item in unique.values() {
                write_result(out, item)?;
            }
        }
        scalar => out.push_str(&escape_text(&scalar.to_text())),
    }
    Ok(())
}
