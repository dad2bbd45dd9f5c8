//! Integration Tests for Server Rendering and Hydration
//!
//! Each test renders components to HTML the way a server would, parses the
//! page into a fresh document and resumes the components on it.

use resumable_core::component::{
    hydrate_all, ComponentDef, ComponentRegistry, HydrationError, MountError, Props, SerializationSkew,
};
use resumable_core::dom::{Document, Event, Node};
use resumable_core::html;
use resumable_core::reactive::Runtime;
use resumable_core::ssr::{render_component, render_component_with_props};
use resumable_core::template::repeat;
use serde_json::{json, Value as JsonValue};

fn todo_list() -> ComponentDef {
    ComponentDef::new("x-todos")
        .constant("title", json!("Chores"))
        .signal("items", json!(["dishes", "laundry"]))
        .signal("draft", json!(""))
        .computed("count", |s| {
            json!(s.get("items").and_then(|v| v.as_array().map(Vec::len)).unwrap_or(0))
        })
        .action("add", |s, event| {
            let draft = event.value().unwrap_or_default().to_string();
            let _ = s.update("items", |items| {
                let mut items = items.as_array().cloned().unwrap_or_default();
                items.push(JsonValue::String(draft));
                JsonValue::Array(items)
            });
        })
        .style("li { list-style: none }")
        .view(|cx| {
            let items: Vec<String> = cx.state().get_as("items").unwrap_or_default();
            let rows = repeat(items, |item| item.clone(), |item| html!("<li>", item, "</li>"));
            html!(
                "<h2>", cx.get("title"), " (", cx.get("count"), ")</h2><ul>", rows,
                "</ul><button @add=", cx.action("add"), ">add</button>"
            )
        })
}

fn registry(defs: impl IntoIterator<Item = ComponentDef>) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    for def in defs {
        registry.register(def);
    }
    registry
}

fn load(doc: &Document, html: &str) -> Node {
    let body = doc.create_element("body");
    body.append_child(&doc.parse_html(html).unwrap());
    body
}

fn host(body: &Node, id: &str) -> Node {
    body.find(|n| n.attribute("data-instance-id").as_deref() == Some(id))
        .unwrap()
}

fn view_text(host: &Node) -> String {
    host.children()
        .into_iter()
        .filter(|n| n.tag_name() != Some("style"))
        .map(|n| n.text_content())
        .collect()
}

/// Server output resumes on the client and keeps reacting.
#[test]
fn server_output_round_trips() {
    let server = Runtime::new();
    let page = render_component(&server, &todo_list(), "t1").unwrap();

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(&doc, &page);
    let report = hydrate_all(&rt, &body, &registry([todo_list()])).unwrap();

    assert!(report.skew.is_empty(), "{:?}", report.skew);
    let host = host(&body, "t1");
    assert_eq!(host.first_child().unwrap().tag_name(), Some("style"));
    assert_eq!(view_text(&host), "Chores (2)disheslaundryadd");

    let first_li = host.find_element("li").unwrap();
    host.find_element("button")
        .unwrap()
        .dispatch(&Event::new("add").with_value("ironing"));

    assert_eq!(view_text(&host), "Chores (3)disheslaundryironingadd");
    assert!(host.find_element("li").unwrap().ptr_eq(&first_li));
    assert_eq!(report.mounted[0].render_count(), 2);
}

/// Serialized values seed the client even when its defaults differ.
#[test]
fn state_seeds_signals_with_type_fidelity() {
    let payload = json!({
        "int": 7,
        "float": 1.5,
        "text": "a </script> b",
        "flag": true,
        "nothing": null,
        "list": [1, "two", [3]],
        "map": { "k": { "nested": false } }
    });
    let server_def = ComponentDef::new("x-data")
        .signal("data", payload.clone())
        .view(|cx| html!("<pre>", cx.get("data"), "</pre>"));
    let client_def = ComponentDef::new("x-data")
        .signal("data", json!("client default"))
        .view(|cx| html!("<pre>", cx.get("data"), "</pre>"));

    let page = render_component(&Runtime::new(), &server_def, "d1").unwrap();
    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(&doc, &page);
    let report = hydrate_all(&rt, &body, &registry([client_def])).unwrap();

    assert!(report.skew.is_empty());
    let state = report.instance("d1").unwrap().state();
    assert_eq!(state.get_untracked("data"), Some(payload));
}

/// Several instances on one page hydrate independently.
#[test]
fn instances_are_independent() {
    let counter = ComponentDef::new("x-count")
        .signal("n", json!(0))
        .action("inc", |s, _| {
            let _ = s.update("n", |v| json!(v.as_i64().unwrap_or(0) + 1));
        })
        .view(|cx| html!("<button @click=", cx.action("inc"), ">", cx.get("n"), "</button>"));

    let server = Runtime::new();
    let page = format!(
        "{}{}",
        render_component(&server, &counter, "a").unwrap(),
        render_component(&server, &counter, "b").unwrap()
    );

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(&doc, &page);
    let report = hydrate_all(&rt, &body, &registry([counter])).unwrap();
    assert_eq!(report.mounted.len(), 2);

    let a = host(&body, "a");
    let b = host(&body, "b");
    a.find_element("button").unwrap().emit("click");
    a.find_element("button").unwrap().emit("click");
    b.find_element("button").unwrap().emit("click");

    assert_eq!(a.text_content(), "2");
    assert_eq!(b.text_content(), "1");
}

/// Markup already inside the host is adopted node for node.
#[test]
fn inline_markup_is_adopted_in_place() {
    let def = ComponentDef::new("x-hello")
        .signal("who", json!("you"))
        .view(|cx| html!("<p>hi <b>", cx.get("who"), "</b></p>"));

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(
        &doc,
        concat!(
            r#"<x-hello data-component-name="x-hello" data-instance-id="h">"#,
            "<p>hi <b><!--[-->me<!--]--></b></p></x-hello>",
            r#"<script type="application/json" data-component-state="h">{"who":"me"}</script>"#
        ),
    );
    let paragraph = body.find_element("p").unwrap();
    let text = body.find_element("b").unwrap().child(1).unwrap();

    let report = hydrate_all(&rt, &body, &registry([def])).unwrap();
    assert_eq!(
        report.skew,
        vec![SerializationSkew::MissingContent {
            instance: "h".into()
        }]
    );

    report.instance("h").unwrap().state().set("who", "them").unwrap();
    assert!(body.find_element("p").unwrap().ptr_eq(&paragraph));
    assert!(body.find_element("b").unwrap().child(1).unwrap().ptr_eq(&text));
    assert_eq!(text.text(), "them");
}

/// Markup that does not fit the view is replaced by a fresh render.
#[test]
fn mismatched_markup_falls_back_to_fresh_render() {
    let def = ComponentDef::new("x-hello")
        .signal("who", json!("you"))
        .view(|cx| html!("<p>hi ", cx.get("who"), "</p>"));

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(
        &doc,
        concat!(
            r#"<x-hello data-component-name="x-hello" data-instance-id="h"></x-hello>"#,
            r#"<script type="application/json" data-component-state="h">{"who":"me"}</script>"#,
            r#"<script type="application/json" data-component-ssr="h">{"content":"<div>stale</div>"}</script>"#
        ),
    );

    let report = hydrate_all(&rt, &body, &registry([def])).unwrap();
    assert!(report.skew.is_empty());
    let host = host(&body, "h");
    assert!(host.find_element("div").is_none());
    assert_eq!(host.text_content(), "hi me");
}

/// Unreadable blobs are reported and replaced by defaults.
#[test]
fn malformed_blobs_are_skew() {
    let def = ComponentDef::new("x-hello")
        .signal("who", json!("you"))
        .view(|cx| html!("<p>hi ", cx.get("who"), "</p>"));

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(
        &doc,
        concat!(
            r#"<x-hello data-component-name="x-hello" data-instance-id="h"></x-hello>"#,
            r#"<script type="application/json" data-component-state="h">{"who":</script>"#,
            r#"<script type="application/json" data-component-ssr="h">["not", "an", "object"]</script>"#
        ),
    );

    let report = hydrate_all(&rt, &body, &registry([def])).unwrap();
    assert_eq!(report.skew.len(), 2);
    assert!(matches!(report.skew[0], SerializationSkew::MalformedState { .. }));
    assert!(matches!(report.skew[1], SerializationSkew::MalformedContent { .. }));
    assert_eq!(host(&body, "h").text_content(), "hi you");
}

/// A view that fails on its first client render stops hydration with an
/// error naming the instance.
#[test]
fn first_render_failure_is_an_error() {
    let def = ComponentDef::new("x-bad").view(|_| panic!("view exploded"));

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(&doc, r#"<x-bad data-component-name="x-bad" data-instance-id="z"></x-bad>"#);

    let err = hydrate_all(&rt, &body, &registry([def])).unwrap_err();
    let HydrationError::Mount {
        component,
        instance,
        source,
    } = err;
    assert_eq!(component, "x-bad");
    assert_eq!(instance, "z");
    assert!(matches!(source, MountError::Computation(_)));
}

/// Unmounting removes the view and stops updates.
#[test]
fn unmount_after_hydration() {
    let server = Runtime::new();
    let page = render_component(&server, &todo_list(), "t9").unwrap();

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(&doc, &page);
    let mut report = hydrate_all(&rt, &body, &registry([todo_list()])).unwrap();
    let computations = rt.computation_count();
    assert!(computations > 0);

    let mounted = report.instance_mut("t9").unwrap();
    let state = mounted.state().clone();
    mounted.unmount();

    assert_eq!(host(&body, "t9").child_count(), 0);
    assert_eq!(rt.computation_count(), 0);
    state.set("draft", "ignored").unwrap();
}

/// State built from server-side props reaches the client, which has no
/// props of its own.
#[test]
fn props_shape_state_across_the_round_trip() {
    let greeting = || {
        ComponentDef::new("x-greet")
            .prop("name", json!("stranger"))
            .signal_from_props("name", |props| props["name"].clone())
            .computed("shout", |s| {
                json!(s.get_as::<String>("name").unwrap_or_default().to_uppercase())
            })
            .view(|cx| html!("<p>", cx.get("shout"), "</p>"))
    };

    let mut props = Props::new();
    props.insert("name".into(), json!("ada"));
    let page = render_component_with_props(&Runtime::new(), &greeting(), "g1", &props).unwrap();
    assert!(page.contains(r#"{"name":"ada"}"#), "{page}");

    let rt = Runtime::new();
    let doc = Document::new();
    let body = load(&doc, &page);
    let report = hydrate_all(&rt, &body, &registry([greeting()])).unwrap();

    assert!(report.skew.is_empty(), "{:?}", report.skew);
    assert_eq!(host(&body, "g1").text_content(), "ADA");
    let state = report.instance("g1").unwrap().state();
    assert_eq!(state.get_untracked("name"), Some(json!("ada")));

    let fallback = render_component(&Runtime::new(), &greeting(), "g2").unwrap();
    assert!(fallback.contains("STRANGER"));
}
