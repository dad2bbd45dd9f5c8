//! Integration Tests for the Template Engine
//!
//! These tests drive templates through `RenderRoot` and observe the
//! document through its mutation counter.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use resumable_core::dom::{Document, Event, EventHandler, Node};
use resumable_core::html;
use resumable_core::reactive::Runtime;
use resumable_core::template::{
    blueprint_for, repeat, windowed, BindingKind, ParseError, RenderRoot, TemplateError, TemplateResult,
    Value, Window,
};

fn root(doc: &Document) -> RenderRoot {
    RenderRoot::new(doc.create_element("main"))
}

/// Rendering identical values twice writes nothing the second time.
#[test]
fn identical_rerender_is_free() {
    let doc = Document::new();
    let mut root = root(&doc);
    let click = EventHandler::new(|_| {});
    let view = |label: &str, n: i64| {
        html!(
            "<div class=\"box ", label, "\" title=", label, "><button @click=", click.clone(),
            ">", n, "</button><input .value=", label, " checked=", n > 0, "></div>"
        )
    };

    root.render(&view("a", 1)).unwrap();
    let before = doc.mutation_count();
    root.render(&view("a", 1)).unwrap();
    assert_eq!(doc.mutation_count(), before);
}

/// `false` and `null` remove an attribute, `true` sets it empty, text sets
/// the text.
#[test]
fn attribute_boolean_semantics() {
    let doc = Document::new();
    let mut root = root(&doc);
    let view = |v: Value| html!("<div data-flag=", v, "></div>");

    root.render(&view(Value::Bool(true))).unwrap();
    let div = root.container().find_element("div").unwrap();
    assert_eq!(div.attribute("data-flag").as_deref(), Some(""));

    root.render(&view(Value::Bool(false))).unwrap();
    assert!(!div.has_attribute("data-flag"));

    root.render(&view(Value::from("x"))).unwrap();
    assert_eq!(div.attribute("data-flag").as_deref(), Some("x"));

    root.render(&view(Value::Null)).unwrap();
    assert!(!div.has_attribute("data-flag"));
}

/// Each hole of a multi-hole attribute updates its own segment only.
#[test]
fn attribute_segments_are_independent() {
    let doc = Document::new();
    let mut root = root(&doc);
    let view = |size: &str, tone: &str| html!("<p class=\"text-", size, " tone-", tone, "\"></p>");

    root.render(&view("lg", "muted")).unwrap();
    let p = root.container().find_element("p").unwrap();
    assert_eq!(p.attribute("class").as_deref(), Some("text-lg tone-muted"));

    root.render(&view("sm", "muted")).unwrap();
    assert_eq!(p.attribute("class").as_deref(), Some("text-sm tone-muted"));

    let before = doc.mutation_count();
    root.render(&view("sm", "loud")).unwrap();
    assert_eq!(p.attribute("class").as_deref(), Some("text-sm tone-loud"));
    assert_eq!(doc.mutation_count(), before + 1);
}

/// Boolean DOM properties bind as properties, not string attributes.
#[test]
fn boolean_properties_bind_as_properties() {
    let blueprint = blueprint_for(&html!("<input disabled=", true, " name=", "n", ">")).unwrap();
    let kinds: Vec<BindingKind> = blueprint.bindings().iter().map(|b| b.kind).collect();
    assert_eq!(kinds, [BindingKind::Property, BindingKind::Attribute]);

    let doc = Document::new();
    let mut root = root(&doc);
    root.render(&html!("<input disabled=", false, ">")).unwrap();
    let input = root.container().find_element("input").unwrap();
    assert_eq!(input.property("disabled"), Some(Value::Bool(false)));
    assert!(!input.has_attribute("disabled"));
}

/// Fifty rebinds leave exactly one listener, the latest one.
#[test]
fn event_rebinding_never_duplicates() {
    let doc = Document::new();
    let mut root = root(&doc);
    let last = Rc::new(Cell::new(0));

    for i in 1..=50 {
        let handler = EventHandler::new({
            let last = last.clone();
            move |_| last.set(i)
        });
        root.render(&html!("<button @click=", handler, ">go</button>")).unwrap();
    }

    let button = root.container().find_element("button").unwrap();
    assert_eq!(button.listener_count("click"), 1);
    assert_eq!(button.dispatch(&Event::new("click")), 1);
    assert_eq!(last.get(), 50);
}

#[derive(Clone)]
struct Row {
    id: u32,
    label: &'static str,
}

fn rows(items: &[Row]) -> TemplateResult {
    let list = repeat(items.iter().cloned(), |row| row.id, |row| {
        html!("<li><input value=", row.label, ">", row.label, "</li>")
    });
    html!("<ul>", list, "</ul>")
}

fn li_for(root: &RenderRoot, label: &str) -> Node {
    root.container()
        .descendants()
        .into_iter()
        .find(|n| n.tag_name() == Some("li") && n.text_content() == label)
        .unwrap()
}

/// Reordering keyed items moves the existing nodes.
#[test]
fn keyed_reorder_preserves_identity() {
    let doc = Document::new();
    let mut root = root(&doc);
    let a = Row { id: 1, label: "a" };
    let b = Row { id: 2, label: "b" };
    let c = Row { id: 3, label: "c" };

    root.render(&rows(&[a.clone(), b.clone(), c.clone()])).unwrap();
    let (na, nb, nc) = (li_for(&root, "a"), li_for(&root, "b"), li_for(&root, "c"));

    root.render(&rows(&[c, a, b])).unwrap();
    let ul = root.container().find_element("ul").unwrap();
    let order: Vec<Node> = ul.children().into_iter().filter(|n| n.is_element()).collect();
    assert_eq!(order.len(), 3);
    assert!(order[0].ptr_eq(&nc));
    assert!(order[1].ptr_eq(&na));
    assert!(order[2].ptr_eq(&nb));
    assert_eq!(ul.text_content(), "cab");
}

/// Items keep their node when their content changes, and only new
/// identities create nodes.
#[test]
fn keyed_update_and_insert() {
    let doc = Document::new();
    let mut root = root(&doc);

    root.render(&rows(&[Row { id: 1, label: "a" }, Row { id: 2, label: "b" }]))
        .unwrap();
    let first = li_for(&root, "a");

    root.render(&rows(&[
        Row { id: 1, label: "A" },
        Row { id: 9, label: "new" },
        Row { id: 2, label: "b" },
    ]))
    .unwrap();

    assert!(li_for(&root, "A").ptr_eq(&first));
    let input = first.find_element("input").unwrap();
    assert_eq!(input.attribute("value").as_deref(), Some("A"));
    assert_eq!(root.container().find_element("ul").unwrap().text_content(), "Anewb");
}

/// Nested templates of the same shape update in place; a different shape
/// replaces the content.
#[test]
fn nested_templates_switch_shape() {
    let doc = Document::new();
    let mut root = root(&doc);
    let card = |inner: TemplateResult| html!("<article>", inner, "</article>");
    let bold = |text: &str| html!("<b>", text, "</b>");

    root.render(&card(bold("one"))).unwrap();
    let b = root.container().find_element("b").unwrap();
    root.render(&card(bold("two"))).unwrap();
    assert!(root.container().find_element("b").unwrap().ptr_eq(&b));
    assert_eq!(root.container().text_content(), "two");

    root.render(&card(html!("<i>", "three", "</i>"))).unwrap();
    assert!(root.container().find_element("b").is_none());
    assert_eq!(root.container().text_content(), "three");
}

/// Malformed templates fail at parse time.
#[test]
fn malformed_templates_are_rejected() {
    let doc = Document::new();
    let mut root = root(&doc);

    let err = root.render(&html!("<div><span>", 1, "</div>")).unwrap_err();
    assert!(matches!(
        err,
        TemplateError::Parse(ParseError::MismatchedClosingTag { .. })
    ));

    let err = root.render(&html!("<d", "iv", "></div>")).unwrap_err();
    assert_eq!(err, TemplateError::Parse(ParseError::HoleInTagName));
}

/// A view effect re-renders only the parts whose values changed.
#[test]
fn effect_driven_view_touches_changed_parts_only() {
    let rt = Runtime::new();
    let doc = Document::new();
    let root = Rc::new(RefCell::new(root(&doc)));
    let name = rt.signal("Ada".to_string());
    let clicks = rt.signal(0);

    let _view = rt.effect({
        let (root, name, clicks) = (root.clone(), name.clone(), clicks.clone());
        move || {
            let result = html!("<h1>", name.get(), "</h1><p>", clicks.get(), "</p>");
            root.borrow_mut().render(&result).unwrap();
        }
    });

    let h1 = root.borrow().container().find_element("h1").unwrap();
    let before = doc.mutation_count();
    rt.batch(|| {
        clicks.set(1);
        clicks.set(2);
    });

    assert_eq!(doc.mutation_count(), before + 1);
    assert_eq!(root.borrow().container().text_content(), "Ada2");
    assert!(root.borrow().container().find_element("h1").unwrap().ptr_eq(&h1));
}

/// A render that fails anywhere in the tree writes nothing, even to parts
/// that come before the failing one.
#[test]
fn failed_render_leaves_document_untouched() {
    let doc = Document::new();
    let mut root = root(&doc);
    let view = |label: &str, inner: TemplateResult| {
        html!("<p>", label, "</p><div>", inner, "</div>")
    };

    root.render(&view("old", html!("<b>", "ok", "</b>"))).unwrap();
    let before_html = root.container().inner_html();
    let before = doc.mutation_count();

    let err = root
        .render(&view("new", html!("<u>", "never closed", "")))
        .unwrap_err();
    assert_eq!(
        err,
        TemplateError::Parse(ParseError::UnclosedElement { tag: "u".into() })
    );
    assert_eq!(doc.mutation_count(), before);
    assert_eq!(root.container().inner_html(), before_html);

    // A bad handler deep inside a keyed list is caught the same way.
    let rows = repeat([1, 2], |n| *n, |n| {
        let handler = if n == 2 { Value::from("oops") } else { Value::Null };
        html!("<button @click=", handler, "></button>")
    });
    let err = root.render(&view("new", html!("<ul>", rows, "</ul>"))).unwrap_err();
    assert!(matches!(err, TemplateError::NotAHandler { .. }));
    assert_eq!(doc.mutation_count(), before);
    assert_eq!(root.container().inner_html(), before_html);

    // The root still updates normally afterwards.
    root.render(&view("new", html!("<b>", "ok", "</b>"))).unwrap();
    assert_eq!(root.container().text_content(), "newok");
}

/// A NaN property counts as unchanged when rendered again.
#[test]
fn nan_property_rerender_is_free() {
    let doc = Document::new();
    let mut root = root(&doc);
    let view = |v: f64| html!("<input .valueAsNumber=", v, ">");

    root.render(&view(f64::NAN)).unwrap();
    let before = doc.mutation_count();
    root.render(&view(f64::NAN)).unwrap();
    assert_eq!(doc.mutation_count(), before);

    root.render(&view(1.5)).unwrap();
    assert_eq!(doc.mutation_count(), before + 1);
}

/// Scrolling a windowed list keeps the nodes of rows that stay in range
/// and moves the spacers.
#[test]
fn windowed_scroll_reuses_rows() {
    let doc = Document::new();
    let host = doc.create_element("main");
    let mut root = RenderRoot::new(host.clone());
    let items: Vec<String> = (0..100).map(|i| format!("row {i}")).collect();
    let window = Window::new(10.0, 50.0).with_overscan(1);
    let view = |scroll: f64| {
        windowed(&items, &window, scroll, |i, _| i, |_, label| html!("<li>", label.clone(), "</li>"))
    };
    let rows = |host: &Node| -> Vec<Node> {
        host.descendants()
            .into_iter()
            .filter(|n| n.tag_name() == Some("li"))
            .collect()
    };

    root.render(&view(0.0)).unwrap();
    let first = rows(&host);
    assert_eq!(first.len(), 7);
    assert_eq!(first[0].text_content(), "row 0");

    root.render(&view(30.0)).unwrap();
    let second = rows(&host);
    assert_eq!(second.len(), 7);
    assert_eq!(second[0].text_content(), "row 2");
    assert_eq!(second[6].text_content(), "row 8");
    for (old, new) in first[2..].iter().zip(&second) {
        assert!(old.ptr_eq(new));
    }

    let viewport = host.first_child().unwrap();
    let content = viewport.first_child().unwrap();
    assert_eq!(viewport.attribute("style").unwrap(), "position: relative; height: 1000px");
    assert_eq!(content.attribute("style").unwrap(), "transform: translateY(20px)");
}
