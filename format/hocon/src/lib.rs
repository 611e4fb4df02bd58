//! HOCON format adapter for `confnode`.
//!
//! Documents are parsed with the `hocon` crate, which resolves includes and
//! substitutions, and rendered back by this crate. Comments found in the input
//! are not kept (the parser drops them), but the file header is, and node
//! comments set in code, including the root's, are written out.
//!
//! ```
//! use confnode::ConfigurationLoader;
//! use confnode_hocon::HoconFormat;
//!
//! let loader = HoconFormat::loader()
//!     .source_text("server { port = 8080 }")
//!     .build();
//! let root = loader.load().unwrap();
//! assert_eq!(root.node(["server", "port"]).and_then(|n| n.as_integer()), Some(8080));
//! ```

use std::path::Path;

use confnode::{CommentHandler, ConfigFormat, ConfigNode, Loader, LoaderBuilder, Result};

mod reader;
mod writer;

/// Loader type for HOCON documents.
pub type HoconConfigurationLoader = Loader<HoconFormat>;

/// Reads and writes HOCON.
///
/// The rendering settings only affect saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoconFormat {
    indent: usize,
    emit_comments: bool,
    emit_json_compatible: bool,
}

impl HoconFormat {
    /// Four-space indentation, comments on, HOCON syntax.
    pub fn new() -> Self {
        HoconFormat {
            indent: 4,
            emit_comments: true,
            emit_json_compatible: false,
        }
    }

    /// A loader builder for this format with default settings.
    pub fn loader() -> LoaderBuilder<HoconFormat> {
        Loader::builder(HoconFormat::new())
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn emit_comments(&self) -> bool {
        self.emit_comments
    }

    /// Whether node comments are written. The header is governed by the
    /// loader's header mode instead.
    pub fn with_emit_comments(mut self, emit: bool) -> Self {
        self.emit_comments = emit;
        self
    }

    pub fn emit_json_compatible(&self) -> bool {
        self.emit_json_compatible
    }

    /// Renders plain JSON (quoted keys, `:` and `,`, no header or comments),
    /// which is still valid HOCON. JSON has no NaN or infinities, so
    /// non-finite floats are written as `null`.
    pub fn with_json_compatible(mut self, json: bool) -> Self {
        self.emit_json_compatible = json;
        self
    }
}

impl Default for HoconFormat {
    fn default() -> Self {
        HoconFormat::new()
    }
}

impl ConfigFormat for HoconFormat {
    fn name(&self) -> &str {
        "hocon"
    }

    fn comment_handler(&self) -> CommentHandler {
        CommentHandler::Hash
    }

    fn extract_header(&self, input: &str) -> Option<String> {
        CommentHandler::Hash
            .extract_header(input)
            .or_else(|| CommentHandler::DoubleSlash.extract_header(input))
    }

    fn read(&self, input: &str, origin: Option<&Path>) -> Result<ConfigNode> {
        reader::read(input, origin)
    }

    fn write(&self, node: &ConfigNode, header: Option<&str>, out: &mut String) -> Result<()> {
        writer::write_document(self, node, header, out)
    }
}
