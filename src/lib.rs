// src/lib.rs
//! # confnode
//!
//! `confnode` is the shared core of a family of configuration format
//! adapters. It provides:
//! - A tree of configuration nodes with comments, attributes and tag names
//! - Typed access to any subtree through serde
//! - A loader abstraction that handles sources, sinks and header comments,
//!   so a format adapter only has to parse and render text
//! - References that keep a loaded tree together with its loader
//! - Schemas with required fields, defaults, comments and constraints
//!
//! Format adapters live in their own crates (`confnode-hocon`,
//! `confnode-xml`) and implement [`ConfigFormat`].
//!
//! ```
//! use confnode::ConfigNode;
//!
//! let mut root = ConfigNode::root();
//! root.node_mut(["server", "host"]).set("localhost").unwrap();
//! root.node_mut(["server", "port"]).set(8080u16).unwrap();
//!
//! let port: u16 = root.node(["server", "port"]).unwrap().get().unwrap();
//! assert_eq!(port, 8080);
//! ```

mod error;
mod loader;
mod mapping;
mod node;
mod options;
mod path;
mod reference;
pub mod schema;
mod utils;
mod value;

pub use error::{ConfigError, Position, Result};
pub use loader::{CommentHandler, ConfigFormat, ConfigurationLoader, HeaderMode, Loader, LoaderBuilder};
pub use node::ConfigNode;
pub use options::ConfigOptions;
pub use path::{Key, NodePath};
pub use reference::ConfigReference;
pub use schema::{FieldConstraint, FieldDefinition, Schema, ValidationError, ValidationErrors, ValueType};
pub use value::{NodeValue, Scalar, ScalarKind};

pub use indexmap::IndexMap;
