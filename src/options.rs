//! Options shared by every node of a tree.

/// Settings that travel with a configuration tree.
///
/// Options are immutable; the `with_*` methods return a modified copy. Every
/// node created under a root shares the root's options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    header: Option<String>,
    should_copy_defaults: bool,
    implicit_initialization: bool,
}

impl ConfigOptions {
    /// The default options: no header, defaults copied into the tree,
    /// implicit initialization of empty collections enabled.
    pub fn defaults() -> Self {
        ConfigOptions {
            header: None,
            should_copy_defaults: true,
            implicit_initialization: true,
        }
    }

    /// Header comment written at the top of saved files.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn with_header(&self, header: Option<&str>) -> Self {
        ConfigOptions {
            header: header.map(str::to_string),
            ..self.clone()
        }
    }

    /// Whether `get_or_set` stores the default it falls back to.
    pub fn should_copy_defaults(&self) -> bool {
        self.should_copy_defaults
    }

    pub fn with_should_copy_defaults(&self, copy: bool) -> Self {
        ConfigOptions {
            should_copy_defaults: copy,
            ..self.clone()
        }
    }

    /// Whether a null node deserializes to an empty collection instead of
    /// failing.
    pub fn implicit_initialization(&self) -> bool {
        self.implicit_initialization
    }

    pub fn with_implicit_initialization(&self, implicit: bool) -> Self {
        ConfigOptions {
            implicit_initialization: implicit,
            ..self.clone()
        }
    }
}

impl Default for ConfigOptions {
    fn default() -> Self {
        ConfigOptions::defaults()
    }
}
