//! XML format adapter for `confnode`.
//!
//! Each node is an element. Maps hold one child element per key, lists hold
//! one child element per item, and scalars are the element's text. Node
//! attributes and tag names round-trip, and comments directly before an
//! element become that node's comment.
//!
//! An element without children and with only whitespace text reads as null.
//! Strings that are empty or all whitespace are therefore written as CDATA
//! sections, which always read back as strings.
//!
//! ```
//! use confnode::ConfigurationLoader;
//! use confnode_xml::XmlFormat;
//!
//! let loader = XmlFormat::loader()
//!     .source_text("<config><server><port>8080</port></server></config>")
//!     .build();
//! let root = loader.load().unwrap();
//! assert_eq!(root.node(["server", "port"]).and_then(|n| n.as_integer()), Some(8080));
//! assert_eq!(root.tag_name(), Some("config"));
//! ```

use std::path::Path;

use confnode::{CommentHandler, ConfigFormat, ConfigNode, Loader, LoaderBuilder, Result};

mod reader;
mod writer;

/// Attribute recording whether an element is a `map` or a `list`.
pub const TYPE_ATTRIBUTE: &str = "configurate-type";

/// Attribute holding a map key that is not a valid element name.
pub const KEY_ATTRIBUTE: &str = "configurate-key";

/// Loader type for XML documents.
pub type XmlConfigurationLoader = Loader<XmlFormat>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlFormat {
    default_tag_name: String,
    indent: usize,
    write_explicit_type: bool,
    include_xml_declaration: bool,
    parse_scalars: bool,
}

impl XmlFormat {
    pub fn new() -> Self {
        XmlFormat {
            default_tag_name: "config".to_string(),
            indent: 2,
            write_explicit_type: true,
            include_xml_declaration: true,
            parse_scalars: true,
        }
    }

    /// A loader builder for this format with default settings.
    pub fn loader() -> LoaderBuilder<XmlFormat> {
        Loader::builder(XmlFormat::new())
    }

    pub fn default_tag_name(&self) -> &str {
        &self.default_tag_name
    }

    /// Tag used for the root element when the root node has no tag name.
    pub fn with_default_tag_name(mut self, name: impl Into<String>) -> Self {
        self.default_tag_name = name.into();
        self
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn write_explicit_type(&self) -> bool {
        self.write_explicit_type
    }

    /// Marks map and list elements with [`TYPE_ATTRIBUTE`], so that
    /// single-item lists and empty containers read back as written.
    pub fn with_write_explicit_type(mut self, explicit: bool) -> Self {
        self.write_explicit_type = explicit;
        self
    }

    pub fn include_xml_declaration(&self) -> bool {
        self.include_xml_declaration
    }

    pub fn with_xml_declaration(mut self, include: bool) -> Self {
        self.include_xml_declaration = include;
        self
    }

    pub fn parse_scalars(&self) -> bool {
        self.parse_scalars
    }

    /// When off, all element text is read as strings.
    pub fn with_parse_scalars(mut self, parse: bool) -> Self {
        self.parse_scalars = parse;
        self
    }
}

impl Default for XmlFormat {
    fn default() -> Self {
        XmlFormat::new()
    }
}

impl ConfigFormat for XmlFormat {
    fn name(&self) -> &str {
        "xml"
    }

    fn comment_handler(&self) -> CommentHandler {
        CommentHandler::Xml
    }

    fn read(&self, input: &str, _origin: Option<&Path>) -> Result<ConfigNode> {
        reader::read(self, input)
    }

    fn write(&self, node: &ConfigNode, header: Option<&str>, out: &mut String) -> Result<()> {
        writer::write_document(self, node, header, out)
    }
}
