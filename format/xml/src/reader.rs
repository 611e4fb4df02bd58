//! A small XML reader and the mapping from elements to nodes.
//!
//! The reader covers what configuration files use: the declaration, processing
//! instructions and a doctype (all skipped), elements, attributes, character
//! data, CDATA sections, comments, and the predefined and numeric character
//! references. It does not validate against a DTD or resolve external
//! entities.

use confnode::{ConfigError, ConfigNode, NodeValue, Result, Scalar};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{KEY_ATTRIBUTE, TYPE_ATTRIBUTE, XmlFormat};

#[derive(Debug, Error)]
#[error("{message}")]
struct SyntaxError {
    offset: usize,
    message: String,
}

type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// Deepest element nesting the reader accepts.
const MAX_DEPTH: usize = 128;

/// One parsed element, kept only long enough to be mapped onto a node.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    comment: Option<String>,
    children: Vec<Element>,
    text: String,
    /// Set when the text came at least partly from a CDATA section.
    cdata: bool,
}

pub(crate) fn read(format: &XmlFormat, input: &str) -> Result<ConfigNode> {
    let element = parse_document(input).map_err(|err| {
        let (line, column) = line_and_column(input, err.offset);
        ConfigError::parse_at(line, column, err.to_string())
    })?;

    debug!("Parsed XML document with root element <{}>", element.name);
    let mut root = ConfigNode::root();
    map_element(format, element, &mut root)?;
    Ok(root)
}

fn parse_document(input: &str) -> ParseResult<Element> {
    let mut parser = Parser { input, pos: 0 };
    parser.document()
}

fn line_and_column(input: &str, offset: usize) -> (usize, usize) {
    let before = &input[..offset.min(input.len())];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn error_at<T>(&self, offset: usize, message: impl Into<String>) -> ParseResult<T> {
        Err(SyntaxError {
            offset,
            message: message.into(),
        })
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        self.error_at(self.pos, message)
    }

    fn expect(&mut self, s: &str) -> ParseResult<()> {
        if self.starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else if self.pos >= self.input.len() {
            self.error(format!("unexpected end of document, expected '{}'", s))
        } else {
            self.error(format!("expected '{}'", s))
        }
    }

    /// Skips whitespace and returns how many line breaks it contained.
    fn skip_whitespace(&mut self) -> usize {
        let mut newlines = 0;
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                newlines += 1;
            }
            self.pos += c.len_utf8();
        }
        newlines
    }

    /// Consumes everything up to and including `terminator`, returning the
    /// text before it.
    fn take_until(&mut self, terminator: &str, what: &str) -> ParseResult<&'a str> {
        let start = self.pos;
        match self.rest().find(terminator) {
            Some(end) => {
                self.pos += end + terminator.len();
                Ok(&self.input[start..start + end])
            }
            None => self.error_at(start, format!("unterminated {}", what)),
        }
    }

    fn document(&mut self) -> ParseResult<Element> {
        let mut pending_comment: Option<String> = None;

        let mut root = loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.processing_instruction()?;
            } else if self.starts_with("<!--") {
                let comment = self.comment()?;
                // A comment set apart by a blank line is the document header,
                // which the loader handles.
                if self.skip_whitespace() >= 2 {
                    pending_comment = None;
                } else {
                    append_comment(&mut pending_comment, comment);
                }
            } else if self.starts_with("<!DOCTYPE") {
                self.doctype()?;
            } else if self.starts_with("<") {
                break self.element(1)?;
            } else if self.pos >= self.input.len() {
                return self.error("document has no root element");
            } else {
                return self.error("unexpected content before the root element");
            }
        };
        root.comment = pending_comment;

        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() {
                return Ok(root);
            } else if self.starts_with("<?") {
                self.processing_instruction()?;
            } else if self.starts_with("<!--") {
                self.comment()?;
            } else {
                return self.error("unexpected content after the root element");
            }
        }
    }

    fn processing_instruction(&mut self) -> ParseResult<()> {
        self.expect("<?")?;
        self.take_until("?>", "processing instruction")?;
        Ok(())
    }

    fn doctype(&mut self) -> ParseResult<()> {
        let start = self.pos;
        self.expect("<!DOCTYPE")?;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
        self.error_at(start, "unterminated doctype declaration")
    }

    fn comment(&mut self) -> ParseResult<String> {
        self.expect("<!--")?;
        let body = self.take_until("-->", "comment")?;
        Ok(comment_text(body))
    }

    fn name(&mut self) -> ParseResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_name_start(c) => self.pos += c.len_utf8(),
            Some(c) => return self.error(format!("invalid character '{}' at start of name", c)),
            None => return self.error("unexpected end of document, expected a name"),
        }
        while let Some(c) = self.peek() {
            if !is_name_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn element(&mut self, depth: usize) -> ParseResult<Element> {
        let start = self.pos;
        if depth > MAX_DEPTH {
            return self.error(format!("elements nested deeper than {} levels", MAX_DEPTH));
        }
        self.expect("<")?;
        let mut element = Element {
            name: self.name()?,
            ..Element::default()
        };

        loop {
            let before = self.pos;
            self.skip_whitespace();
            let had_space = self.pos > before;
            if self.starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.pos >= self.input.len() {
                return self.error_at(start, format!("unterminated start tag <{}>", element.name));
            }
            if !had_space {
                return self.error("expected whitespace before attribute");
            }

            let attribute_start = self.pos;
            let name = self.name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let value = self.attribute_value()?;
            if element.attributes.iter().any(|(existing, _)| *existing == name) {
                return self.error_at(attribute_start, format!("duplicate attribute '{}'", name));
            }
            element.attributes.push((name, value));
        }

        self.content(&mut element, depth)?;
        Ok(element)
    }

    fn attribute_value(&mut self) -> ParseResult<String> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return self.error("expected a quoted attribute value"),
        };
        self.pos += 1;
        let start = self.pos;
        let end = match self.rest().find(quote) {
            Some(end) => start + end,
            None => return self.error_at(start - 1, "unterminated attribute value"),
        };
        let raw = &self.input[start..end];
        if let Some(lt) = raw.find('<') {
            return self.error_at(start + lt, "'<' is not allowed in attribute values");
        }
        let value = decode_entities(raw, start)?;
        self.pos = end + 1;
        Ok(value)
    }

    fn content(&mut self, element: &mut Element, depth: usize) -> ParseResult<()> {
        let mut pending_comment: Option<String> = None;

        loop {
            if self.starts_with("</") {
                self.pos += 2;
                let name_start = self.pos;
                let name = self.name()?;
                if name != element.name {
                    return self.error_at(
                        name_start,
                        format!("mismatched end tag: expected </{}>, found </{}>", element.name, name),
                    );
                }
                self.skip_whitespace();
                self.expect(">")?;
                return Ok(());
            } else if self.starts_with("<!--") {
                let comment = self.comment()?;
                append_comment(&mut pending_comment, comment);
            } else if self.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let data = self.take_until("]]>", "CDATA section")?;
                element.text.push_str(data);
                element.cdata = true;
            } else if self.starts_with("<?") {
                self.processing_instruction()?;
            } else if self.starts_with("<") {
                let mut child = self.element(depth + 1)?;
                child.comment = pending_comment.take();
                element.children.push(child);
            } else if self.pos >= self.input.len() {
                return self.error(format!("unexpected end of document inside <{}>", element.name));
            } else {
                let start = self.pos;
                let end = self.rest().find('<').map_or(self.input.len(), |i| start + i);
                let text = decode_entities(&self.input[start..end], start)?;
                if !text.trim().is_empty() {
                    pending_comment = None;
                }
                element.text.push_str(&text);
                self.pos = end;
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_numeric() || c == '-' || c == '.' || c == '\u{b7}'
}

/// Whether `name` can be written as an element name. This is the rule the
/// reader applies, so every tag it accepts can be written back.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if is_name_start(c)) && chars.all(is_name_char)
}

fn comment_text(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

fn append_comment(pending: &mut Option<String>, comment: String) {
    match pending {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(&comment);
        }
        None => *pending = Some(comment),
    }
}

/// Replaces character and entity references in `raw`, which starts at byte
/// `offset` of the document.
fn decode_entities(raw: &str, offset: usize) -> ParseResult<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        let at = offset + (raw.len() - rest.len()) + amp;
        let after = &rest[amp + 1..];
        let semi = match after.find(';') {
            Some(semi) => semi,
            None => {
                return Err(SyntaxError {
                    offset: at,
                    message: "unterminated character reference".to_string(),
                });
            }
        };
        let entity = &after[..semi];
        let c = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    return Err(SyntaxError {
                        offset: at,
                        message: format!("unknown entity '&{};'", entity),
                    });
                };
                code.and_then(char::from_u32)
            }
        };
        match c {
            Some(c) => decoded.push(c),
            None => {
                return Err(SyntaxError {
                    offset: at,
                    message: format!("invalid character reference '&{};'", entity),
                });
            }
        }
        rest = &after[semi + 1..];
    }
    decoded.push_str(rest);
    Ok(decoded)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Map,
    List,
}

/// Copies `element` onto `node`: tag name, attributes, comment and value.
fn map_element(format: &XmlFormat, element: Element, node: &mut ConfigNode) -> Result<()> {
    node.set_tag_name(Some(&element.name));
    if let Some(comment) = &element.comment {
        node.set_comment(Some(comment));
    }

    let mut explicit = None;
    for (name, value) in &element.attributes {
        match name.as_str() {
            TYPE_ATTRIBUTE => {
                explicit = Some(match value.as_str() {
                    "map" => Shape::Map,
                    "list" => Shape::List,
                    other => {
                        return Err(ConfigError::parse(format!(
                            "element <{}> has unknown {} '{}'",
                            element.name, TYPE_ATTRIBUTE, other
                        )));
                    }
                });
            }
            KEY_ATTRIBUTE => {}
            _ => {
                node.set_attribute(name, value);
            }
        }
    }

    let shape = explicit.or_else(|| infer_shape(&element.children));
    match shape {
        Some(Shape::List) => {
            node.set_value(NodeValue::empty_list());
            for child in element.children {
                map_element(format, child, node.append_list_child())?;
            }
        }
        Some(Shape::Map) => {
            node.set_value(NodeValue::empty_map());
            for child in element.children {
                let key = child_key(&child);
                if node.node([key.as_str()]).is_some() {
                    trace!("Duplicate key '{}' in <{}>, later element wins", key, element.name);
                }
                let target = node.node_mut([key.as_str()]);
                *target = target.create_detached();
                map_element(format, child, target)?;
            }
        }
        None if element.cdata || !element.text.trim().is_empty() => {
            node.set_value(scalar_from_text(&element.text, format.parse_scalars()));
        }
        None => {
            node.set_value(NodeValue::Null);
        }
    }

    Ok(())
}

/// Several children sharing one tag read as a list, anything else with
/// children as a map.
fn infer_shape(children: &[Element]) -> Option<Shape> {
    let first = children.first()?;
    if children.len() > 1 && children.iter().all(|child| child.name == first.name) {
        Some(Shape::List)
    } else {
        Some(Shape::Map)
    }
}

fn child_key(child: &Element) -> String {
    child
        .attributes
        .iter()
        .find(|(name, _)| name == KEY_ATTRIBUTE)
        .map_or_else(|| child.name.clone(), |(_, value)| value.clone())
}

/// Text becomes a boolean or number only when it reads back identically, so
/// values such as `007` stay strings.
fn scalar_from_text(text: &str, parse_scalars: bool) -> Scalar {
    if !parse_scalars {
        return Scalar::String(text.to_string());
    }

    let trimmed = text.trim();
    match trimmed {
        "true" => return Scalar::Boolean(true),
        "false" => return Scalar::Boolean(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        if i.to_string() == trimmed {
            return Scalar::Integer(i);
        }
    }
    if trimmed.contains(['.', 'e', 'E']) {
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() && trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
                return Scalar::Float(f);
            }
        }
    }
    Scalar::String(text.to_string())
}

