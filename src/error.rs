//! Error type shared by the core crate and every format adapter.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Position of a parse failure inside a document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors that can occur while loading, saving or mapping configuration.
///
/// Format adapters translate their own failures into this enum so that
/// callers only ever deal with one error type, whatever the file format.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error occurred while accessing a file or resource.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document could not be parsed.
    #[error("{}", format_parse(.origin, .position, .message))]
    Parse {
        /// File the document came from, if it came from a file.
        origin: Option<PathBuf>,
        /// Where in the document the failure was detected.
        position: Option<Position>,
        message: String,
    },

    /// A value could not be converted to or from a node.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The loader was asked to do something it is not configured for.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The node tree did not satisfy a schema.
    #[error("{0}")]
    Validation(String),

    /// A node path could not be parsed.
    #[error("Invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl ConfigError {
    /// Builds a parse error without position information.
    pub fn parse(message: impl Into<String>) -> Self {
        ConfigError::Parse {
            origin: None,
            position: None,
            message: message.into(),
        }
    }

    /// Builds a parse error pointing at a line and column.
    pub fn parse_at(line: usize, column: usize, message: impl Into<String>) -> Self {
        ConfigError::Parse {
            origin: None,
            position: Some(Position { line, column }),
            message: message.into(),
        }
    }

    /// Attaches the originating file to a parse error. Other variants are
    /// returned unchanged.
    pub fn with_origin(self, path: Option<&std::path::Path>) -> Self {
        match self {
            ConfigError::Parse { origin: None, position, message } => ConfigError::Parse {
                origin: path.map(|p| p.to_path_buf()),
                position,
                message,
            },
            other => other,
        }
    }
}

fn format_parse(origin: &Option<PathBuf>, position: &Option<Position>, message: &str) -> String {
    match (origin, position) {
        (Some(path), Some(pos)) => format!("Parse error in {} at {}: {}", path.display(), pos, message),
        (Some(path), None) => format!("Parse error in {}: {}", path.display(), message),
        (None, Some(pos)) => format!("Parse error at {}: {}", pos, message),
        (None, None) => format!("Parse error: {}", message),
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
