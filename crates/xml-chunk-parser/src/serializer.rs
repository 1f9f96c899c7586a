//! Converts a materialized, parsed node tree back into XML-like markup.
//!
//! Deliberately thin and recursive rather than a state machine: unlike the
//! tokenizer, this module never has to cope with a construct split across a
//! chunk boundary, since it only ever runs over a `ParseResult` already
//! handed back to the caller.

use crate::options::Options;
use crate::tree::{XmlItem, XmlNode, XmlValue};

/// Serializes a parsed top-level item list the same way [`crate::Parser`]
/// returned it, using `options` to know the text key and attribute prefix
/// that were used to parse it in the first place.
///
/// Guarantees only that text containing `<` or `&` survives a
/// serialize-then-parse round trip (via entity-escaping); it makes no
/// attempt at a CDATA-emission heuristic, which is out of scope (see the
/// crate-level design notes).
pub fn serialize(items: &[XmlItem], opts: &Options) -> String {
    let mut out = String::new();
    for item in items {
        serialize_item(item, opts, &mut out);
    }
    out
}

fn serialize_item(item: &XmlItem, opts: &Options, out: &mut String) {
    match item {
        XmlItem::Element { tag, value } => serialize_tagged(tag, value, opts, out),
        XmlItem::Leaf(value) => escape_text(&primitive_to_string(value), out),
    }
}

/// Serializes one `{tag: value}` pair. `value` is usually a [`XmlValue::Node`],
/// but a repeated child name promotes it to a [`XmlValue::List`] of such
/// values (emitted as that many sibling elements), and the text-collapse
/// optimization can leave it a bare primitive (emitted as `<tag>text</tag>`
/// rather than expecting a node to walk).
fn serialize_tagged(tag: &str, value: &XmlValue, opts: &Options, out: &mut String) {
    match value {
        XmlValue::Node(node) => serialize_node(tag, node, opts, out),
        XmlValue::List(items) => {
            for v in items {
                serialize_tagged(tag, v, opts, out);
            }
        }
        other => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            escape_text(&primitive_to_string(other), out);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn serialize_node(tag: &str, node: &XmlNode, opts: &Options, out: &mut String) {
    out.push('<');
    out.push_str(tag);

    let mut text = None;
    let mut children: Vec<(&str, &XmlValue)> = Vec::new();

    for (key, value) in node.iter() {
        if let Some(attr_name) = key.strip_prefix(&*opts.attribute_name_prefix) {
            out.push(' ');
            out.push_str(attr_name);
            out.push_str("=\"");
            escape_attr_value(&primitive_to_string(value), out);
            out.push('"');
        } else if key == &*opts.text_node_name {
            text = Some(value);
        } else {
            children.push((key, value));
        }
    }

    if text.is_none() && children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    if let Some(t) = text {
        escape_text(&primitive_to_string(t), out);
    }
    for (child_tag, child_value) in children {
        serialize_tagged(child_tag, child_value, opts, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Renders a leaf value's textual form, with no escaping applied yet (the
/// caller picks the escaping rule appropriate to where it's being written —
/// text content or an attribute value).
fn primitive_to_string(value: &XmlValue) -> String {
    match value {
        XmlValue::String(s) => s.clone(),
        XmlValue::Number(n) => n.to_string(),
        XmlValue::Bool(b) => b.to_string(),
        XmlValue::List(items) => items.iter().map(primitive_to_string).collect::<Vec<_>>().join(""),
        XmlValue::Node(_) => String::new(),
    }
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr_value(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Options, Parser};

    fn parse_all(input: &str, opts: Options) -> Vec<XmlItem> {
        let mut parser = Parser::new(opts);
        parser.parse_stream(input).unwrap();
        parser.parse_stream(None).unwrap().xml.unwrap_or_default()
    }

    #[test]
    fn serializes_attributes_and_text() {
        let items = parse_all(r#"<item id="1">Text1</item>"#, Options::default());
        assert_eq!(serialize(&items, &Options::default()), r#"<item id="1">Text1</item>"#);
    }

    #[test]
    fn serializes_repeated_children_as_siblings() {
        let items = parse_all(
            r#"<root><item id="1"/><item id="2"/></root>"#,
            Options::default(),
        );
        assert_eq!(
            serialize(&items, &Options::default()),
            r#"<root><item id="1"/><item id="2"/></root>"#
        );
    }

    #[test]
    fn escapes_lt_and_amp_in_text_and_attributes() {
        let opts = Options::default();
        let node = XmlNode::from_entries(vec![
            ("@title".into(), XmlValue::String("Tom & Jerry".into())),
            ("#text".into(), XmlValue::String("a < b".into())),
        ]);
        let items = vec![XmlItem::Element { tag: "a".into(), value: XmlValue::Node(node) }];
        let out = serialize(&items, &opts);
        assert_eq!(out, r#"<a title="Tom &amp; Jerry">a &lt; b</a>"#);
    }

    #[test]
    fn empty_element_serializes_self_closing() {
        let items = parse_all("<br></br>", Options::default());
        assert_eq!(serialize(&items, &Options::default()), "<br/>");
    }
}
