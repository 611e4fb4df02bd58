//! Loading and saving node trees through a file format.
//!
//! A format adapter implements [`ConfigFormat`]: it turns text into a
//! [`ConfigNode`] and back. [`Loader`] wraps a format with everything that is
//! not format specific (where the document comes from, where it goes, how the
//! header comment is handled) and exposes it through the
//! [`ConfigurationLoader`] trait.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{ConfigError, Result};
use crate::node::ConfigNode;
use crate::options::ConfigOptions;
use crate::reference::ConfigReference;
use crate::utils;

/// Something that can load and save [`ConfigNode`] trees in one specific
/// format.
pub trait ConfigurationLoader {
    /// Loads the root node using the [default options](Self::default_options).
    fn load(&self) -> Result<ConfigNode> {
        self.load_with(self.default_options())
    }

    /// Loads the root node from the configured source.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the source cannot be read or parsed, or if
    /// the loader has no source at all.
    fn load_with(&self, options: ConfigOptions) -> Result<ConfigNode>;

    /// Loads the root node into a [`ConfigReference`]. The reference does not
    /// reload by itself; call [`ConfigReference::reload`] for that.
    fn load_to_reference(self) -> Result<ConfigReference<Self>>
    where
        Self: Sized,
    {
        ConfigReference::load(self)
    }

    /// Writes `node` to the configured sink.
    fn save(&self, node: &ConfigNode) -> Result<()>;

    fn can_load(&self) -> bool {
        true
    }

    fn can_save(&self) -> bool {
        true
    }

    /// Options used by [`load`](Self::load) and for new empty nodes.
    fn default_options(&self) -> ConfigOptions;

    fn create_node(&self, options: ConfigOptions) -> ConfigNode {
        ConfigNode::root_with(options)
    }

    fn create_empty_node(&self) -> ConfigNode {
        self.create_node(self.default_options())
    }
}

/// A file format: the part of a loader that actually parses and renders text.
pub trait ConfigFormat {
    /// Short lowercase name, used in log messages.
    fn name(&self) -> &str;

    /// Comment style used for the file header.
    fn comment_handler(&self) -> CommentHandler;

    /// Extracts the header comment from a raw document.
    fn extract_header(&self, input: &str) -> Option<String> {
        self.comment_handler().extract_header(input)
    }

    /// Parses a whole document.
    ///
    /// `origin` is the file the text was read from, when there is one; formats
    /// with include directives resolve them against it.
    fn read(&self, input: &str, origin: Option<&Path>) -> Result<ConfigNode>;

    /// Renders `node` as a whole document, starting with `header` if given.
    fn write(&self, node: &ConfigNode, header: Option<&str>, out: &mut String) -> Result<()>;
}

/// How a loader treats the header comment at the top of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// The header found in the file replaces the one in the options, and the
    /// node's own header is written back on save.
    #[default]
    Preserve,
    /// The file header is ignored; the loader's default options header is
    /// always written.
    Preset,
    /// Headers are neither read nor written.
    None,
}

/// Comment syntaxes used to read and write headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentHandler {
    /// `# comment`
    Hash,
    /// `// comment`
    DoubleSlash,
    /// `/* comment */`
    SlashBlock,
    /// `<!-- comment -->`
    Xml,
}

impl CommentHandler {
    /// Returns the comment block at the very start of `input`.
    ///
    /// A comment only counts as a header when a blank line (or the end of the
    /// document) separates it from what follows; otherwise it belongs to the
    /// first entry of the document.
    pub fn extract_header(&self, input: &str) -> Option<String> {
        match self {
            CommentHandler::Hash => extract_line_header(input, "#"),
            CommentHandler::DoubleSlash => extract_line_header(input, "//"),
            CommentHandler::SlashBlock => extract_block_header(input, "/*", "*/"),
            CommentHandler::Xml => {
                let body = skip_xml_declaration(input);
                extract_block_header(body, "<!--", "-->")
            }
        }
    }

    /// Renders `text` as a comment, one output line per input line, without
    /// a trailing newline.
    pub fn to_comment(&self, text: &str) -> String {
        match self {
            CommentHandler::Hash => prefix_lines(text, "#"),
            CommentHandler::DoubleSlash => prefix_lines(text, "//"),
            CommentHandler::SlashBlock => {
                let mut out = String::from("/*\n");
                for line in text.lines() {
                    if line.is_empty() {
                        out.push_str(" *\n");
                    } else {
                        out.push_str(" * ");
                        out.push_str(&line.replace("*/", "* /"));
                        out.push('\n');
                    }
                }
                out.push_str(" */");
                out
            }
            CommentHandler::Xml => {
                let escaped = text.replace("--", "- -");
                if escaped.contains('\n') {
                    format!("<!--\n{}\n-->", escaped)
                } else {
                    format!("<!-- {} -->", escaped)
                }
            }
        }
    }
}

fn prefix_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                prefix.to_string()
            } else {
                format!("{} {}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_line_header(input: &str, prefix: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut terminated_by_blank = true;

    for line in input.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            lines.push(rest.strip_prefix(' ').unwrap_or(rest).trim_end().to_string());
        } else {
            terminated_by_blank = trimmed.is_empty();
            break;
        }
    }

    if lines.is_empty() || !terminated_by_blank {
        return None;
    }
    Some(lines.join("\n"))
}

fn extract_block_header(input: &str, open: &str, close: &str) -> Option<String> {
    let body = input.trim_start().strip_prefix(open)?;
    let end = body.find(close)?;
    let rest = &body[end + close.len()..];

    let mut rest_lines = rest.split('\n');
    // Whatever follows the closing marker on the same line.
    if !rest_lines.next().unwrap_or("").trim().is_empty() {
        return None;
    }
    match rest_lines.next() {
        Some(line) if !line.trim().is_empty() => return None,
        _ => {}
    }

    let text = body[..end]
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("* ")
                .or_else(|| line.strip_prefix('*'))
                .unwrap_or(line)
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n");

    let text = text.trim_matches('\n').to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn skip_xml_declaration(input: &str) -> &str {
    let trimmed = input.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    trimmed
}

#[derive(Debug, Clone)]
enum Source {
    None,
    Path(PathBuf),
    Text(String),
}

/// A [`ConfigurationLoader`] built from a [`ConfigFormat`].
#[derive(Debug, Clone)]
pub struct Loader<F> {
    format: F,
    source: Source,
    sink: Option<PathBuf>,
    header_mode: HeaderMode,
    default_options: ConfigOptions,
}

impl<F: ConfigFormat> Loader<F> {
    pub fn builder(format: F) -> LoaderBuilder<F> {
        LoaderBuilder::new(format)
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn header_mode(&self) -> HeaderMode {
        self.header_mode
    }

    /// File this loader reads from, if it reads from a file.
    pub fn source_path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn sink_path(&self) -> Option<&Path> {
        self.sink.as_deref()
    }

    /// Parses `input` as a document of this loader's format, applying the
    /// same header handling as [`load_with`](ConfigurationLoader::load_with).
    pub fn load_from_str(&self, input: &str, options: ConfigOptions) -> Result<ConfigNode> {
        self.parse_document(input, None, options)
    }

    /// Renders `node` as a document without writing it anywhere.
    pub fn save_to_string(&self, node: &ConfigNode) -> Result<String> {
        let header = match self.header_mode {
            HeaderMode::Preserve => node.options().header().or(self.default_options.header()),
            HeaderMode::Preset => self.default_options.header(),
            HeaderMode::None => None,
        };

        let mut out = String::new();
        self.format.write(node, header, &mut out)?;
        Ok(out)
    }

    fn parse_document(&self, input: &str, origin: Option<&Path>, options: ConfigOptions) -> Result<ConfigNode> {
        let input = utils::strip_bom(input);

        let options = match self.header_mode {
            HeaderMode::Preserve => match self.format.extract_header(input) {
                Some(header) => {
                    trace!("Read {} header: {:?}", self.format.name(), header);
                    options.with_header(Some(&header))
                }
                None => options,
            },
            HeaderMode::Preset => options,
            HeaderMode::None => options.with_header(None),
        };

        if input.trim().is_empty() {
            debug!("Empty {} document, starting from an empty node", self.format.name());
            return Ok(self.create_node(options));
        }

        let mut node = self
            .format
            .read(input, origin)
            .map_err(|err| err.with_origin(origin))?;
        node.set_options(options);
        Ok(node)
    }
}

impl<F: ConfigFormat> ConfigurationLoader for Loader<F> {
    fn load_with(&self, options: ConfigOptions) -> Result<ConfigNode> {
        match &self.source {
            Source::None => Err(ConfigError::Unsupported(format!(
                "this {} loader has no source to load from",
                self.format.name()
            ))),
            Source::Text(text) => {
                debug!("Loading {} configuration from text", self.format.name());
                self.parse_document(text, None, options)
            }
            Source::Path(path) => {
                if !path.exists() {
                    debug!("{} does not exist, starting from an empty node", path.display());
                    let options = match self.header_mode {
                        HeaderMode::None => options.with_header(None),
                        _ => options,
                    };
                    return Ok(self.create_node(options));
                }

                debug!("Loading {} configuration from {}", self.format.name(), path.display());
                let content = fs::read_to_string(path)?;
                self.parse_document(&content, Some(path), options)
            }
        }
    }

    fn save(&self, node: &ConfigNode) -> Result<()> {
        let sink = self.sink.as_ref().ok_or_else(|| {
            ConfigError::Unsupported(format!("this {} loader has no sink to save to", self.format.name()))
        })?;

        let document = self.save_to_string(node)?;
        debug!("Saving {} configuration to {}", self.format.name(), sink.display());
        utils::write_atomic(sink, &document)
    }

    fn can_load(&self) -> bool {
        !matches!(self.source, Source::None)
    }

    fn can_save(&self) -> bool {
        self.sink.is_some()
    }

    fn default_options(&self) -> ConfigOptions {
        self.default_options.clone()
    }
}

/// Builder for [`Loader`].
///
/// ```no_run
/// # use confnode::{Loader, ConfigFormat};
/// # fn demo<F: ConfigFormat>(format: F) {
/// let loader = Loader::builder(format)
///     .path("~/.config/app/app.conf")
///     .build();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LoaderBuilder<F> {
    format: F,
    source: Source,
    sink: Option<PathBuf>,
    header_mode: HeaderMode,
    default_options: ConfigOptions,
}

impl<F: ConfigFormat> LoaderBuilder<F> {
    pub fn new(format: F) -> Self {
        LoaderBuilder {
            format,
            source: Source::None,
            sink: None,
            header_mode: HeaderMode::default(),
            default_options: ConfigOptions::defaults(),
        }
    }

    /// Reads from and saves to the same file. `~` is expanded.
    pub fn path(self, path: impl AsRef<Path>) -> Self {
        let path = utils::expand_path(path.as_ref());
        LoaderBuilder {
            source: Source::Path(path.clone()),
            sink: Some(path),
            ..self
        }
    }

    pub fn source_path(mut self, path: impl AsRef<Path>) -> Self {
        self.source = Source::Path(utils::expand_path(path.as_ref()));
        self
    }

    /// Loads from in-memory text instead of a file.
    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.source = Source::Text(text.into());
        self
    }

    pub fn sink_path(mut self, path: impl AsRef<Path>) -> Self {
        self.sink = Some(utils::expand_path(path.as_ref()));
        self
    }

    pub fn header_mode(mut self, mode: HeaderMode) -> Self {
        self.header_mode = mode;
        self
    }

    pub fn default_options(mut self, options: ConfigOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Replaces the format, e.g. to change its rendering settings.
    pub fn format(mut self, format: F) -> Self {
        self.format = format;
        self
    }

    pub fn format_ref(&self) -> &F {
        &self.format
    }

    pub fn build(self) -> Loader<F> {
        Loader {
            format: self.format,
            source: self.source,
            sink: self.sink,
            header_mode: self.header_mode,
            default_options: self.default_options,
        }
    }
}
