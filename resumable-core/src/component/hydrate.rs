//! Client-side resumption of server-rendered components.
//!
//! For each root element carrying a component name, hydration:
//!
//! 1. reads the instance's state script, falling back per entry to the
//!    definition's default for anything missing or unreadable;
//! 2. places the instance's rendered markup inside the root element;
//! 3. mounts the component, binding its first render to that markup.
//!
//! Disagreements between the page and the definitions are reported as
//! [`SerializationSkew`] and never stop the other instances.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use super::error::{HydrationError, SerializationSkew};
use super::mount::{append_stylesheet, MountedComponent, StateInit};
use super::{ComponentDef, StateDef};
use crate::dom::Node;
use crate::reactive::Runtime;
use crate::ssr::{ContentBlob, SsrState, ATTR_COMPONENT_NAME, ATTR_CONTENT, ATTR_INSTANCE_ID, ATTR_STATE};

/// Component definitions by name.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    defs: IndexMap<String, ComponentDef>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `def` under its name, returning the definition it replaced.
    pub fn register(&mut self, def: ComponentDef) -> Option<ComponentDef> {
        self.defs.insert(def.name().to_string(), def)
    }

    pub fn get(&self, name: &str) -> Option<&ComponentDef> {
        self.defs.get(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.defs.keys()).finish()
    }
}

/// Outcome of [`hydrate_all`].
#[derive(Debug, Default)]
pub struct HydrationReport {
    /// Running instances, in document order.
    pub mounted: Vec<MountedComponent>,
    /// Every recovered disagreement, in the order found.
    pub skew: Vec<SerializationSkew>,
    /// Names of root elements with no registered definition.
    pub skipped: Vec<String>,
}

impl HydrationReport {
    pub fn instance(&self, id: &str) -> Option<&MountedComponent> {
        self.mounted.iter().find(|m| m.instance_id() == id)
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut MountedComponent> {
        self.mounted.iter_mut().find(|m| m.instance_id() == id)
    }
}

/// Hydrate every component root under `page`.
///
/// Only a failure of an instance's first render is an error; missing or
/// malformed hydration data degrades to defaults and a fresh render.
pub fn hydrate_all(
    rt: &Runtime,
    page: &Node,
    registry: &ComponentRegistry,
) -> Result<HydrationReport, HydrationError> {
    let descendants = page.descendants();
    let scripts = Scripts::collect(&descendants);
    let mut report = HydrationReport::default();

    for host in &descendants {
        let Some(name) = host.attribute(ATTR_COMPONENT_NAME) else {
            continue;
        };
        let instance = host.attribute(ATTR_INSTANCE_ID).unwrap_or_else(|| name.clone());
        let Some(def) = registry.get(&name) else {
            tracing::warn!(component = %name, instance = %instance, "no definition registered, skipping");
            report.skipped.push(name);
            continue;
        };

        let seed = read_state(def, &instance, scripts.state.get(&instance), &mut report.skew);
        let (style, adopt) = place_content(def, host, &instance, scripts.content.get(&instance), &mut report.skew);

        let props = def.default_props();
        let init = StateInit {
            props: &props,
            seed: seed.as_ref(),
        };
        let mounted = MountedComponent::start(rt, def, host, instance.clone(), style, init, adopt)
            .map_err(|source| HydrationError::Mount {
                component: name.clone(),
                instance: instance.clone(),
                source,
            })?;
        tracing::debug!(component = %name, instance = %instance, adopt, "hydrated component");
        report.mounted.push(mounted);
    }

    Ok(report)
}

/// Hydration scripts by instance id. The first script for an id wins.
struct Scripts {
    state: IndexMap<String, String>,
    content: IndexMap<String, String>,
}

impl Scripts {
    fn collect(nodes: &[Node]) -> Self {
        let mut scripts = Self {
            state: IndexMap::new(),
            content: IndexMap::new(),
        };
        for node in nodes.iter().filter(|n| n.tag_name() == Some("script")) {
            if let Some(id) = node.attribute(ATTR_STATE) {
                scripts.state.entry(id).or_insert_with(|| node.text_content());
            }
            if let Some(id) = node.attribute(ATTR_CONTENT) {
                scripts.content.entry(id).or_insert_with(|| node.text_content());
            }
        }
        scripts
    }
}

fn skew(found: &mut Vec<SerializationSkew>, skew: SerializationSkew) {
    tracing::warn!(%skew, "hydration data does not match component");
    found.push(skew);
}

/// The seed for the instance's plain and signal entries, if any state
/// could be read.
fn read_state(
    def: &ComponentDef,
    instance: &str,
    script: Option<&String>,
    found: &mut Vec<SerializationSkew>,
) -> Option<Map<String, JsonValue>> {
    let Some(json) = script else {
        skew(
            found,
            SerializationSkew::MissingState {
                instance: instance.to_string(),
            },
        );
        return None;
    };
    let state = match SsrState::from_json(json) {
        Ok(state) => state,
        Err(error) => {
            skew(
                found,
                SerializationSkew::MalformedState {
                    instance: instance.to_string(),
                    message: error.to_string(),
                },
            );
            return None;
        }
    };

    let mut seed = state.into_map();
    seed.retain(|key, _| match def.state_def(key) {
        Some(StateDef::Raw(_) | StateDef::Signal(_)) => true,
        _ => {
            skew(
                found,
                SerializationSkew::UnknownKey {
                    instance: instance.to_string(),
                    key: key.clone(),
                },
            );
            false
        }
    });
    Some(seed)
}

/// Put the server markup inside `host`. Returns the leading stylesheet
/// node, if any, and whether the markup should be adopted.
fn place_content(
    def: &ComponentDef,
    host: &Node,
    instance: &str,
    script: Option<&String>,
    found: &mut Vec<SerializationSkew>,
) -> (Option<Node>, bool) {
    let parsed = match script {
        None => Err(SerializationSkew::MissingContent {
            instance: instance.to_string(),
        }),
        Some(json) => ContentBlob::from_json(json)
            .map_err(|e| e.to_string())
            .and_then(|blob| host.document().parse_html(&blob.content).map_err(|e| e.to_string()))
            .map_err(|message| SerializationSkew::MalformedContent {
                instance: instance.to_string(),
                message,
            }),
    };

    match parsed {
        Ok(fragment) => {
            host.clear_children();
            host.append_child(&fragment);
        }
        // Markup already inlined in the host is still worth adopting.
        Err(error) if host.child_count() > 0 => skew(found, error),
        Err(error) => {
            skew(found, error);
            return (append_stylesheet(def, host), false);
        }
    }

    let style = host
        .first_child()
        .filter(|first| def.stylesheet().is_some() && first.tag_name() == Some("style"));
    (style, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::html;
    use crate::ssr::render_component;
    use serde_json::json;

    fn greeter() -> ComponentDef {
        ComponentDef::new("x-greeter")
            .signal("name", json!("world"))
            .computed("shout", |s| {
                json!(s.get_as::<String>("name").unwrap_or_default().to_uppercase())
            })
            .view(|cx| html!("<p>Hello ", cx.get("name"), "! ", cx.get("shout"), "</p>"))
    }

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register(greeter());
        registry
    }

    fn page(doc: &Document, html: &str) -> Node {
        let body = doc.create_element("body");
        body.append_child(&doc.parse_html(html).unwrap());
        body
    }

    #[test]
    fn adopts_server_markup() {
        let rt = Runtime::new();
        let html = render_component(&rt, &greeter(), "g1").unwrap();
        let doc = Document::new();
        let body = page(&doc, &html);

        let report = hydrate_all(&rt, &body, &registry()).unwrap();
        assert!(report.skew.is_empty());
        let host = body.find_element("x-greeter").unwrap();
        let paragraph = host.find_element("p").unwrap();
        assert_eq!(host.text_content(), "Hello world! WORLD");

        report.instance("g1").unwrap().state().set("name", "bob").unwrap();
        assert_eq!(host.text_content(), "Hello bob! BOB");
        assert!(host.find_element("p").unwrap().ptr_eq(&paragraph));
    }

    #[test]
    fn missing_state_falls_back_to_defaults() {
        let rt = Runtime::new();
        let doc = Document::new();
        let body = page(
            &doc,
            r#"<x-greeter data-component-name="x-greeter" data-instance-id="g2"></x-greeter>"#,
        );

        let report = hydrate_all(&rt, &body, &registry()).unwrap();
        assert_eq!(
            report.skew,
            vec![
                SerializationSkew::MissingState {
                    instance: "g2".into()
                },
                SerializationSkew::MissingContent {
                    instance: "g2".into()
                },
            ]
        );
        assert_eq!(body.text_content(), "Hello world! WORLD");
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let rt = Runtime::new();
        let doc = Document::new();
        let body = page(
            &doc,
            r#"<x-greeter data-component-name="x-greeter"></x-greeter><script type="application/json" data-component-state="x-greeter">{"name":"ann","shout":"NO","extra":1}</script>"#,
        );

        let report = hydrate_all(&rt, &body, &registry()).unwrap();
        let unknown: Vec<&SerializationSkew> = report
            .skew
            .iter()
            .filter(|s| matches!(s, SerializationSkew::UnknownKey { .. }))
            .collect();
        assert_eq!(unknown.len(), 2);
        assert_eq!(report.mounted[0].instance_id(), "x-greeter");
        let host = body.find_element("x-greeter").unwrap();
        assert_eq!(host.text_content(), "Hello ann! ANN");
    }

    #[test]
    fn unregistered_components_are_skipped() {
        let rt = Runtime::new();
        let doc = Document::new();
        let body = page(&doc, r#"<x-other data-component-name="x-other"></x-other>"#);

        let report = hydrate_all(&rt, &body, &registry()).unwrap();
        assert!(report.mounted.is_empty());
        assert_eq!(report.skipped, ["x-other"]);
    }
}
