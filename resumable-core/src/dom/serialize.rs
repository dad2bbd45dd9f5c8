//! HTML serialization and escaping.

use super::node::{Node, NodeKind};

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text content is emitted verbatim.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// Escape text content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn write_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    if !value.is_empty() {
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
}

pub fn outer_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, &mut out, false);
    out
}

pub fn inner_html(node: &Node) -> String {
    let raw = node.tag_name().is_some_and(is_raw_text);
    let mut out = String::new();
    for child in node.children() {
        write_node(&child, &mut out, raw);
    }
    out
}

fn write_node(node: &Node, out: &mut String, raw: bool) {
    match node.kind() {
        NodeKind::Text if raw => out.push_str(&node.text()),
        NodeKind::Text => out.push_str(&escape_text(&node.text())),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(&node.text());
            out.push_str("-->");
        }
        NodeKind::Fragment => {
            for child in node.children() {
                write_node(&child, out, raw);
            }
        }
        NodeKind::Element(tag) => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in node.attributes() {
                write_attribute(out, &name, &value);
            }
            out.push('>');
            if is_void(tag) {
                return;
            }
            out.push_str(&inner_html(node));
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn escapes() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attribute(r#"say "hi""#), "say &quot;hi&quot;");
    }

    #[test]
    fn serializes_tree() {
        let doc = Document::new();
        let div = doc.create_element("div");
        div.set_attribute("class", "box");
        div.set_attribute("hidden", "");
        div.append_child(&doc.create_text("1 < 2"));
        div.append_child(&doc.create_element("br"));
        div.append_child(&doc.create_comment("["));

        assert_eq!(
            div.to_html(),
            r#"<div class="box" hidden>1 &lt; 2<br><!--[--></div>"#
        );
    }

    #[test]
    fn raw_text_is_not_escaped() {
        let doc = Document::new();
        let style = doc.create_element("style");
        style.append_child(&doc.create_text("a > b { color: red }"));
        assert_eq!(style.to_html(), "<style>a > b { color: red }</style>");
    }
}
