//! Rendering nodes as HOCON (or JSON) text.

use confnode::{CommentHandler, ConfigError, ConfigNode, NodeValue, Result, Scalar};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::trace;

use crate::HoconFormat;

pub(crate) fn write_document(
    format: &HoconFormat,
    node: &ConfigNode,
    header: Option<&str>,
    out: &mut String,
) -> Result<()> {
    match node.value() {
        NodeValue::Null | NodeValue::Map(_) => {}
        other => {
            return Err(ConfigError::Serialization(format!(
                "a HOCON document must have a map at its root, found {}",
                other.type_name()
            )));
        }
    }

    if format.emit_json_compatible() {
        return write_json(format, node, out);
    }

    let mut writer = HoconWriter { format, out };
    if let Some(header) = header {
        writer.out.push_str(&CommentHandler::Hash.to_comment(header));
        writer.out.push_str("\n\n");
    }

    if let Some(children) = node.children_map() {
        trace!("Writing HOCON document with {} root entries", children.len());
        // Without entries below it, the root comment would read back as the
        // header.
        if !children.is_empty() {
            writer.write_comment(node, 0);
        }
        for (key, child) in children {
            writer.write_entry(key, child, 0)?;
        }
    }
    Ok(())
}

/// Plain JSON through `serde_json`, indented with the configured width.
fn write_json(format: &HoconFormat, node: &ConfigNode, out: &mut String) -> Result<()> {
    if node.is_null() {
        out.push_str("{}\n");
        return Ok(());
    }

    let indent = " ".repeat(format.indent());
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(indent.as_bytes()));
    node.serialize(&mut serializer)?;
    let json = String::from_utf8(buffer).map_err(|err| ConfigError::Serialization(err.to_string()))?;
    out.push_str(&json);
    out.push('\n');
    Ok(())
}

struct HoconWriter<'a> {
    format: &'a HoconFormat,
    out: &'a mut String,
}

impl HoconWriter<'_> {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth * self.format.indent() {
            self.out.push(' ');
        }
    }

    fn write_comment(&mut self, node: &ConfigNode, depth: usize) {
        if !self.format.emit_comments() {
            return;
        }
        if let Some(comment) = node.comment() {
            for line in CommentHandler::Hash.to_comment(comment).lines() {
                self.indent(depth);
                self.out.push_str(line);
                self.out.push('\n');
            }
        }
    }

    /// One `key = value` line (or `key { ... }` block) of a HOCON object body.
    fn write_entry(&mut self, key: &str, node: &ConfigNode, depth: usize) -> Result<()> {
        self.write_comment(node, depth);
        self.indent(depth);
        self.out.push_str(&render_key(key)?);
        if node.is_map() && !node.is_empty() {
            self.out.push(' ');
        } else {
            self.out.push_str(" = ");
        }
        self.write_value(node, depth)?;
        self.out.push('\n');
        Ok(())
    }

    fn write_value(&mut self, node: &ConfigNode, depth: usize) -> Result<()> {
        match node.value() {
            NodeValue::Null => self.out.push_str("null"),
            NodeValue::Scalar(scalar) => self.out.push_str(&render_scalar(scalar)?),
            NodeValue::List(items) => {
                if items.is_empty() {
                    self.out.push_str("[]");
                    return Ok(());
                }
                self.out.push_str("[\n");
                for (i, item) in items.iter().enumerate() {
                    self.write_comment(item, depth + 1);
                    self.indent(depth + 1);
                    self.write_value(item, depth + 1)?;
                    if i + 1 < items.len() {
                        self.out.push(',');
                    }
                    self.out.push('\n');
                }
                self.indent(depth);
                self.out.push(']');
            }
            NodeValue::Map(children) => {
                if children.is_empty() {
                    self.out.push_str("{}");
                    return Ok(());
                }
                self.out.push_str("{\n");
                for (key, child) in children {
                    self.write_entry(key, child, depth + 1)?;
                }
                self.indent(depth);
                self.out.push('}');
            }
        }
        Ok(())
    }
}

fn render_scalar(scalar: &Scalar) -> Result<String> {
    match scalar {
        Scalar::String(s) => quote(s),
        Scalar::Integer(i) => Ok(i.to_string()),
        // Debug keeps a decimal point or exponent, so the value reads back as a float.
        Scalar::Float(f) if f.is_finite() => Ok(format!("{:?}", f)),
        Scalar::Float(f) => quote(&f.to_string()),
        Scalar::Boolean(b) => Ok(b.to_string()),
    }
}

/// Keys are left bare when HOCON would read them back unchanged.
fn render_key(key: &str) -> Result<String> {
    if is_simple_key(key) {
        Ok(key.to_string())
    } else {
        quote(key)
    }
}

fn is_simple_key(key: &str) -> bool {
    let mut chars = key.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_well
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !matches!(key, "true" | "false" | "null" | "include")
}

/// A JSON string literal, which HOCON reads as a quoted string.
fn quote(s: &str) -> Result<String> {
    Ok(serde_json::to_string(s)?)
}
