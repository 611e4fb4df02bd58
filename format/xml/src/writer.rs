//! Rendering nodes as XML elements.

use confnode::{CommentHandler, ConfigError, ConfigNode, NodeValue, Result, Scalar};
use tracing::trace;

use crate::reader::is_valid_name;
use crate::{KEY_ATTRIBUTE, TYPE_ATTRIBUTE, XmlFormat};

const ENTRY_TAG: &str = "entry";
const LIST_ITEM_TAG: &str = "element";

pub(crate) fn write_document(
    format: &XmlFormat,
    node: &ConfigNode,
    header: Option<&str>,
    out: &mut String,
) -> Result<()> {
    if format.include_xml_declaration() {
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }
    if let Some(header) = header {
        out.push_str(&CommentHandler::Xml.to_comment(header));
        out.push_str("\n\n");
    }

    let tag = node.tag_name().unwrap_or(format.default_tag_name());
    if !is_valid_name(tag) {
        return Err(ConfigError::Serialization(format!(
            "'{}' is not a valid XML element name",
            tag
        )));
    }

    let mut writer = XmlWriter { format, out };
    writer.write_element(tag, None, node, 0);
    Ok(())
}

struct XmlWriter<'a> {
    format: &'a XmlFormat,
    out: &'a mut String,
}

impl XmlWriter<'_> {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth * self.format.indent() {
            self.out.push(' ');
        }
    }

    fn write_element(&mut self, tag: &str, key: Option<&str>, node: &ConfigNode, depth: usize) {
        if let Some(comment) = node.comment() {
            for line in CommentHandler::Xml.to_comment(comment).lines() {
                self.indent(depth);
                self.out.push_str(line);
                self.out.push('\n');
            }
        }

        self.indent(depth);
        self.out.push('<');
        self.out.push_str(tag);
        if let Some(key) = key {
            self.write_attribute(KEY_ATTRIBUTE, key);
        }
        for (name, value) in node.attributes() {
            if name == TYPE_ATTRIBUTE || name == KEY_ATTRIBUTE {
                continue;
            }
            self.write_attribute(name, value);
        }
        if self.format.write_explicit_type() {
            match node.value() {
                NodeValue::Map(_) => self.write_attribute(TYPE_ATTRIBUTE, "map"),
                NodeValue::List(_) => self.write_attribute(TYPE_ATTRIBUTE, "list"),
                _ => {}
            }
        }

        match node.value() {
            NodeValue::Null => self.out.push_str("/>\n"),
            // Blank text reads back as null, so blank strings go in CDATA.
            NodeValue::Scalar(Scalar::String(text)) if text.trim().is_empty() => {
                self.out.push_str("><![CDATA[");
                self.out.push_str(text);
                self.out.push_str("]]>");
                self.close(tag, None);
            }
            NodeValue::Scalar(scalar) => {
                self.out.push('>');
                self.out.push_str(&escape(&render_scalar(scalar), false));
                self.close(tag, None);
            }
            NodeValue::Map(children) if children.is_empty() => self.out.push_str("/>\n"),
            NodeValue::List(items) if items.is_empty() => self.out.push_str("/>\n"),
            NodeValue::Map(children) => {
                self.out.push_str(">\n");
                for (child_key, child) in children {
                    if is_valid_name(child_key) {
                        self.write_element(child_key, None, child, depth + 1);
                    } else {
                        trace!("Writing key {:?} as <{}>", child_key, ENTRY_TAG);
                        self.write_element(ENTRY_TAG, Some(child_key), child, depth + 1);
                    }
                }
                self.close(tag, Some(depth));
            }
            NodeValue::List(items) => {
                self.out.push_str(">\n");
                for item in items {
                    let item_tag = item.tag_name().filter(|t| is_valid_name(t)).unwrap_or(LIST_ITEM_TAG);
                    self.write_element(item_tag, None, item, depth + 1);
                }
                self.close(tag, Some(depth));
            }
        }
    }

    fn write_attribute(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape(value, true));
        self.out.push('"');
    }

    /// Writes the end tag, on its own indented line when `depth` is given.
    fn close(&mut self, tag: &str, depth: Option<usize>) {
        if let Some(depth) = depth {
            self.indent(depth);
        }
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Float(f) if f.is_finite() => format!("{:?}", f),
        other => other.to_string(),
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            '\n' if attribute => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' if attribute => escaped.push_str("&#9;"),
            c => escaped.push(c),
        }
    }
    escaped
}
