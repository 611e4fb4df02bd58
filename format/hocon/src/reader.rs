//! Conversion from parsed HOCON into nodes.

use std::path::Path;

use confnode::{ConfigError, ConfigNode, NodePath, NodeValue, Result};
use hocon::{Hocon, HoconLoader};
use tracing::trace;

/// Parses `input`, the text the loader read.
///
/// The `hocon` crate picks a parser from a file's extension and, for anything
/// but `.conf`, also merges sibling `.json` and `.properties` files. So the
/// file itself is handed to the crate only when it is a `.conf` file with
/// `include` statements, which must resolve relative to it. Everything else is
/// parsed from `input` as HOCON.
///
/// Substitutions from the process environment are disabled: a configuration
/// means the same thing wherever it is loaded.
pub(crate) fn read(input: &str, origin: Option<&Path>) -> Result<ConfigNode> {
    let loader = HoconLoader::new().no_system();
    let loaded = match origin.filter(|path| needs_file_origin(path, input)) {
        Some(path) => {
            trace!("Parsing {} from disk to resolve includes", path.display());
            loader.load_file(path)
        }
        None => loader.load_str(input),
    }
    .map_err(|err| ConfigError::parse(err.to_string()))?;

    let document = loaded.hocon().map_err(|err| ConfigError::parse(err.to_string()))?;

    let mut root = ConfigNode::root();
    let mut path = NodePath::root();
    convert(document, &mut root, &mut path)?;
    Ok(root)
}

fn needs_file_origin(path: &Path, input: &str) -> bool {
    path.extension().is_some_and(|ext| ext == "conf") && input.contains("include")
}

fn convert(value: Hocon, target: &mut ConfigNode, path: &mut NodePath) -> Result<()> {
    match value {
        Hocon::Null => {
            target.set_value(NodeValue::Null);
        }
        Hocon::Boolean(b) => {
            target.set_value(b);
        }
        Hocon::Integer(i) => {
            target.set_value(i);
        }
        Hocon::Real(f) => {
            target.set_value(f);
        }
        Hocon::String(s) => {
            target.set_value(s);
        }
        Hocon::Array(items) => {
            target.set_value(NodeValue::empty_list());
            for (i, item) in items.into_iter().enumerate() {
                path.push(i);
                convert(item, target.append_list_child(), path)?;
                path.pop();
            }
        }
        Hocon::Hash(entries) => {
            target.set_value(NodeValue::empty_map());
            // The parser does not guarantee source order; sort for stable output.
            let mut entries: Vec<(String, Hocon)> = entries.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, child) in entries {
                path.push(key.as_str());
                convert(child, target.node_mut([key.as_str()]), path)?;
                path.pop();
            }
        }
        Hocon::BadValue(err) => {
            trace!("Bad HOCON value at {}: {}", path, err);
            return Err(ConfigError::parse(format!("invalid value at '{}': {}", path, err)));
        }
    }

    Ok(())
}
