//! Template parser.
//!
//! Works directly on the static strings of a template, treating the gap
//! between two strings as a hole. Each hole becomes exactly one binding:
//!
//! - in text content, a child position between two marker comments
//! - in an attribute value, an attribute segment, or a property binding
//!   for `.name` and the boolean properties
//! - as the value of an `@name` attribute, an event listener

use super::blueprint::{
    AttributeTemplate, BindingDescriptor, BindingKind, Blueprint, NodePath, ProtoKind, ProtoNode,
    BOOLEAN_PROPERTIES, PART_END, PART_START,
};
use super::error::ParseError;
use crate::dom::serialize::is_void;

/// Elements whose content is read as text up to the closing tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Char(char),
    Hole,
}

/// Parse a template's static strings into a blueprint.
pub fn parse(strings: &[&str]) -> Result<Blueprint, ParseError> {
    Parser::new(strings).run()
}

struct Parser {
    pieces: Vec<Piece>,
    pos: usize,
    blueprint: Blueprint,
    /// Open elements.
    stack: Vec<usize>,
    text: String,
}

impl Parser {
    fn new(strings: &[&str]) -> Self {
        let mut pieces = Vec::with_capacity(strings.iter().map(|s| s.len() + 1).sum());
        for (i, s) in strings.iter().enumerate() {
            if i > 0 {
                pieces.push(Piece::Hole);
            }
            pieces.extend(s.chars().map(Piece::Char));
        }
        Self {
            pieces,
            pos: 0,
            blueprint: Blueprint::default(),
            stack: Vec::new(),
            text: String::new(),
        }
    }

    fn run(mut self) -> Result<Blueprint, ParseError> {
        while let Some(piece) = self.peek() {
            match piece {
                Piece::Hole => {
                    self.flush_text();
                    self.pos += 1;
                    let start = self.push_node(ProtoKind::Comment(PART_START.to_string()));
                    self.push_binding(BindingKind::Text, start, None, None, 0);
                    self.push_node(ProtoKind::Comment(PART_END.to_string()));
                }
                Piece::Char('<') => self.markup()?,
                Piece::Char(c) => {
                    self.text.push(c);
                    self.pos += 1;
                }
            }
        }
        self.flush_text();

        if let Some(&open) = self.stack.last() {
            return Err(ParseError::UnclosedElement {
                tag: self.tag_of(open),
            });
        }
        Ok(self.blueprint)
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<Piece> {
        self.pieces.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Piece> {
        self.pieces.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<Piece> {
        let piece = self.peek();
        if piece.is_some() {
            self.pos += 1;
        }
        piece
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(Piece::Char(c)))
    }

    fn starts_with_ignore_case(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| match self.peek_at(i) {
            Some(Piece::Char(p)) => p.eq_ignore_ascii_case(&c),
            _ => false,
        })
    }

    fn skip_whitespace(&mut self) {
        while let Some(Piece::Char(c)) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    /// Skip to just past the next `>`.
    fn skip_past_gt(&mut self, tag: &str) -> Result<(), ParseError> {
        loop {
            match self.bump() {
                Some(Piece::Char('>')) => return Ok(()),
                Some(_) => {}
                None => {
                    return Err(ParseError::UnterminatedTag {
                        tag: tag.to_string(),
                    })
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Tree building
    // ------------------------------------------------------------------

    fn push_node(&mut self, kind: ProtoKind) -> usize {
        let index = self.blueprint.nodes.len();
        let (position, mut path) = match self.stack.last() {
            Some(&parent) => {
                let parent = &self.blueprint.nodes[parent];
                (parent.children.len(), parent.path.clone())
            }
            None => (self.blueprint.roots.len(), NodePath::new()),
        };
        path.push(position);

        self.blueprint.nodes.push(ProtoNode {
            kind,
            children: Vec::new(),
            path,
            bindings: Vec::new(),
        });
        match self.stack.last() {
            Some(&parent) => self.blueprint.nodes[parent].children.push(index),
            None => self.blueprint.roots.push(index),
        }
        index
    }

    fn push_binding(
        &mut self,
        kind: BindingKind,
        node: usize,
        name: Option<String>,
        group: Option<usize>,
        segment: usize,
    ) {
        let index = self.blueprint.bindings.len();
        let path = self.blueprint.nodes[node].path.clone();
        self.blueprint.bindings.push(BindingDescriptor {
            kind,
            node,
            path,
            name,
            group,
            segment,
        });
        self.blueprint.nodes[node].bindings.push(index);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = decode_entities(&std::mem::take(&mut self.text));
            self.push_node(ProtoKind::Text(text));
        }
    }

    fn tag_of(&self, index: usize) -> String {
        match &self.blueprint.nodes[index].kind {
            ProtoKind::Element { tag, .. } => tag.clone(),
            _ => String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Markup
    // ------------------------------------------------------------------

    fn markup(&mut self) -> Result<(), ParseError> {
        if self.starts_with("<!--") {
            return self.comment();
        }
        if self.starts_with("</") {
            return self.closing_tag();
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // Doctype or processing instruction.
            self.flush_text();
            return self.skip_past_gt("!");
        }
        match self.peek_at(1) {
            Some(Piece::Char(c)) if c.is_ascii_alphabetic() => self.opening_tag(),
            _ => {
                self.text.push('<');
                self.pos += 1;
                Ok(())
            }
        }
    }

    fn comment(&mut self) -> Result<(), ParseError> {
        self.flush_text();
        self.pos += 4;
        let mut body = String::new();
        loop {
            if self.starts_with("-->") {
                self.pos += 3;
                break;
            }
            match self.bump() {
                Some(Piece::Char(c)) => body.push(c),
                Some(Piece::Hole) => return Err(ParseError::HoleInComment),
                None => return Err(ParseError::UnterminatedComment),
            }
        }
        self.push_node(ProtoKind::Comment(body));
        Ok(())
    }

    fn tag_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some(Piece::Char(c)) if c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '_' | '.') => {
                    name.push(c.to_ascii_lowercase());
                    self.pos += 1;
                }
                Some(Piece::Hole) => return Err(ParseError::HoleInTagName),
                _ => return Ok(name),
            }
        }
    }

    fn closing_tag(&mut self) -> Result<(), ParseError> {
        self.flush_text();
        self.pos += 2;
        let found = self.tag_name()?;
        self.skip_past_gt(&found)?;

        match self.stack.pop() {
            None => Err(ParseError::UnexpectedClosingTag { tag: found }),
            Some(open) => {
                let expected = self.tag_of(open);
                if expected == found {
                    Ok(())
                } else {
                    Err(ParseError::MismatchedClosingTag { expected, found })
                }
            }
        }
    }

    fn opening_tag(&mut self) -> Result<(), ParseError> {
        self.flush_text();
        self.pos += 1;
        let tag = self.tag_name()?;
        let node = self.push_node(ProtoKind::Element {
            tag: tag.clone(),
            attributes: Vec::new(),
        });

        let self_closing = self.attributes(node, &tag)?;
        if self_closing || is_void(&tag) {
            return Ok(());
        }
        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            return self.raw_text(node, &tag);
        }
        self.stack.push(node);
        Ok(())
    }

    /// Parse attributes up to the end of the tag. Returns whether the tag
    /// was self-closing.
    fn attributes(&mut self, node: usize, tag: &str) -> Result<bool, ParseError> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ParseError::UnterminatedTag {
                        tag: tag.to_string(),
                    })
                }
                Some(Piece::Char('>')) => {
                    self.pos += 1;
                    return Ok(false);
                }
                Some(Piece::Char('/')) => {
                    self.pos += 1;
                    if self.peek() == Some(Piece::Char('>')) {
                        self.pos += 1;
                        return Ok(true);
                    }
                    continue;
                }
                Some(Piece::Hole) => return Err(ParseError::HoleInAttributeName),
                Some(Piece::Char(_)) => {}
            }

            let mut name = String::new();
            loop {
                match self.peek() {
                    Some(Piece::Char(c)) if !(c.is_whitespace() || matches!(c, '=' | '>' | '/')) => {
                        name.push(c);
                        self.pos += 1;
                    }
                    Some(Piece::Hole) => return Err(ParseError::HoleInAttributeName),
                    _ => break,
                }
            }

            self.skip_whitespace();
            let strings = if self.peek() == Some(Piece::Char('=')) {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value(tag)?
            } else {
                vec![String::new()]
            };
            self.bind_attribute(node, name, strings)?;
        }
    }

    /// The static strings around the holes of one attribute value.
    fn attribute_value(&mut self, tag: &str) -> Result<Vec<String>, ParseError> {
        let mut strings = Vec::new();
        let mut current = String::new();

        match self.peek() {
            Some(Piece::Char(quote)) if quote == '"' || quote == '\'' => {
                self.pos += 1;
                loop {
                    match self.bump() {
                        Some(Piece::Char(c)) if c == quote => break,
                        Some(Piece::Char(c)) => current.push(c),
                        Some(Piece::Hole) => strings.push(std::mem::take(&mut current)),
                        None => {
                            return Err(ParseError::UnterminatedTag {
                                tag: tag.to_string(),
                            })
                        }
                    }
                }
            }
            _ => loop {
                match self.peek() {
                    Some(Piece::Char(c)) if c.is_whitespace() || c == '>' => break,
                    Some(Piece::Char('/')) if self.peek_at(1) == Some(Piece::Char('>')) => break,
                    Some(Piece::Char(c)) => {
                        current.push(c);
                        self.pos += 1;
                    }
                    Some(Piece::Hole) => {
                        strings.push(std::mem::take(&mut current));
                        self.pos += 1;
                    }
                    None => break,
                }
            },
        }

        strings.push(current);
        Ok(strings)
    }

    fn bind_attribute(
        &mut self,
        node: usize,
        name: String,
        strings: Vec<String>,
    ) -> Result<(), ParseError> {
        let holes = strings.len() - 1;
        let whole = holes == 1 && strings.iter().all(String::is_empty);

        if let Some(event) = name.strip_prefix('@') {
            if !whole || event.is_empty() {
                return Err(ParseError::InvalidEventBinding { name });
            }
            self.push_binding(BindingKind::Event, node, Some(event.to_string()), None, 0);
            return Ok(());
        }
        if let Some(property) = name.strip_prefix('.') {
            if !whole || property.is_empty() {
                return Err(ParseError::InvalidPropertyBinding { name });
            }
            self.push_binding(BindingKind::Property, node, Some(property.to_string()), None, 0);
            return Ok(());
        }

        let name = name.to_ascii_lowercase();
        if holes == 0 {
            let value = decode_entities(&strings[0]);
            if let ProtoKind::Element { attributes, .. } = &mut self.blueprint.nodes[node].kind {
                attributes.push((name, value));
            }
            return Ok(());
        }
        if whole && BOOLEAN_PROPERTIES.contains(&name.as_str()) {
            self.push_binding(BindingKind::Property, node, Some(name), None, 0);
            return Ok(());
        }

        let group = self.blueprint.attributes.len();
        self.blueprint.attributes.push(AttributeTemplate {
            node,
            name: name.clone(),
            strings: strings.iter().map(|s| decode_entities(s)).collect(),
        });
        for segment in 0..holes {
            self.push_binding(
                BindingKind::Attribute,
                node,
                Some(name.clone()),
                Some(group),
                segment,
            );
        }
        Ok(())
    }

    fn raw_text(&mut self, node: usize, tag: &str) -> Result<(), ParseError> {
        let closing = format!("</{tag}");
        let mut body = String::new();
        while !self.starts_with_ignore_case(&closing) {
            match self.bump() {
                Some(Piece::Char(c)) => body.push(c),
                Some(Piece::Hole) => {
                    return Err(ParseError::HoleInRawText {
                        tag: tag.to_string(),
                    })
                }
                None => {
                    return Err(ParseError::UnclosedElement {
                        tag: tag.to_string(),
                    })
                }
            }
        }
        self.pos += closing.chars().count();
        self.skip_past_gt(tag)?;

        if !body.is_empty() {
            let text = if matches!(tag, "textarea" | "title") {
                decode_entities(&body)
            } else {
                body
            };
            self.stack.push(node);
            self.push_node(ProtoKind::Text(text));
            self.stack.pop();
        }
        Ok(())
    }
}

/// Decode character references. Unknown references are kept as written.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(bp: &Blueprint) -> Vec<(BindingKind, Option<&str>)> {
        bp.bindings()
            .iter()
            .map(|b| (b.kind, b.name.as_deref()))
            .collect()
    }

    #[test]
    fn static_template_has_no_bindings() {
        let bp = parse(&["<div class=\"a\"><p>hi</p></div>"]).unwrap();
        assert_eq!(bp.binding_count(), 0);
        assert_eq!(bp.node_count(), 3);
    }

    #[test]
    fn text_hole_becomes_marker_pair() {
        let bp = parse(&["<p>Hello ", "!</p>"]).unwrap();
        assert_eq!(kinds(&bp), vec![(BindingKind::Text, None)]);

        let binding = &bp.bindings()[0];
        assert_eq!(binding.path.as_slice(), &[0, 1]);
        let p = bp.node(0);
        assert_eq!(p.children.len(), 4);
        assert_eq!(bp.node(p.children[1]).kind, ProtoKind::Comment("[".into()));
        assert_eq!(bp.node(p.children[2]).kind, ProtoKind::Comment("]".into()));
        assert!(bp.is_part_start(binding.node));
    }

    #[test]
    fn binding_kinds_follow_context() {
        let bp = parse(&[
            "<input class=\"",
            "\" .value=",
            " ?x @input=",
            " checked=",
            ">",
        ])
        .unwrap();
        assert_eq!(
            kinds(&bp),
            vec![
                (BindingKind::Attribute, Some("class")),
                (BindingKind::Property, Some("value")),
                (BindingKind::Event, Some("input")),
                (BindingKind::Property, Some("checked")),
            ]
        );
    }

    #[test]
    fn multiple_holes_in_one_attribute() {
        let bp = parse(&["<a class=\"btn ", " size-", "\">x</a>"]).unwrap();
        assert_eq!(bp.binding_count(), 2);
        assert_eq!(bp.attribute_templates().len(), 1);
        assert_eq!(bp.attribute_templates()[0].strings, vec!["btn ", " size-", ""]);
        assert_eq!(bp.bindings()[0].segment, 0);
        assert_eq!(bp.bindings()[1].segment, 1);
        assert_eq!(bp.bindings()[1].group, Some(0));
    }

    #[test]
    fn multiple_holes_in_one_text_run() {
        let bp = parse(&["<p>", " of ", "</p>"]).unwrap();
        assert_eq!(bp.binding_count(), 2);
        assert_ne!(bp.bindings()[0].node, bp.bindings()[1].node);
    }

    #[test]
    fn void_and_self_closing_elements() {
        let bp = parse(&["<div><br><input type=\"text\"/><x-icon /></div>"]).unwrap();
        assert_eq!(bp.node(0).children.len(), 3);
    }

    #[test]
    fn raw_text_elements_keep_markup() {
        let bp = parse(&["<style>p > a { color: red }</style>"]).unwrap();
        let style = bp.node(0);
        assert_eq!(
            bp.node(style.children[0]).kind,
            ProtoKind::Text("p > a { color: red }".into())
        );
    }

    #[test]
    fn entities_are_decoded() {
        let bp = parse(&["<p title=\"a &amp; b\">1 &lt; 2 &#65;&#x42; &bogus;</p>"]).unwrap();
        let p = bp.node(0);
        match &p.kind {
            ProtoKind::Element { attributes, .. } => {
                assert_eq!(attributes[0], ("title".into(), "a & b".into()))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            bp.node(p.children[0]).kind,
            ProtoKind::Text("1 < 2 AB &bogus;".into())
        );
    }

    #[test]
    fn malformed_nesting_is_rejected() {
        assert_eq!(
            parse(&["<div><span></div>"]),
            Err(ParseError::MismatchedClosingTag {
                expected: "span".into(),
                found: "div".into()
            })
        );
        assert_eq!(
            parse(&["<div>"]),
            Err(ParseError::UnclosedElement { tag: "div".into() })
        );
        assert_eq!(
            parse(&["</p>"]),
            Err(ParseError::UnexpectedClosingTag { tag: "p".into() })
        );
        assert_eq!(
            parse(&["<div"]),
            Err(ParseError::UnterminatedTag { tag: "div".into() })
        );
    }

    #[test]
    fn holes_in_invalid_positions() {
        assert_eq!(parse(&["<d", "></d>"]), Err(ParseError::HoleInTagName));
        assert_eq!(parse(&["<p ", "=1></p>"]), Err(ParseError::HoleInAttributeName));
        assert_eq!(parse(&["<!-- ", " -->"]), Err(ParseError::HoleInComment));
        assert_eq!(
            parse(&["<script>", "</script>"]),
            Err(ParseError::HoleInRawText {
                tag: "script".into()
            })
        );
        assert_eq!(
            parse(&["<b @click=\"x", "\"></b>"]),
            Err(ParseError::InvalidEventBinding {
                name: "@click".into()
            })
        );
    }
}
