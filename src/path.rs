//! Addressing nodes inside a tree.

use std::fmt::{self, Write};
use std::str::FromStr;

use crate::error::ConfigError;

/// One step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A child of a map node.
    Name(String),
    /// A child of a list node.
    Index(usize),
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Name(s.clone())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) if needs_quoting(name) => {
                f.write_char('"')?;
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('"')
            }
            Key::Name(name) => write!(f, "{}", name),
            Key::Index(i) => write!(f, "[{}]", i),
        }
    }
}

fn needs_quoting(name: &str) -> bool {
    name.is_empty() || name.contains(['.', '[', ']', '"'])
}

/// Location of a node relative to the root, e.g. `server.listeners[0].port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Vec<Key>);

impl NodePath {
    /// The empty path, which addresses the root itself.
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last key of the path, or `None` for the root.
    pub fn last(&self) -> Option<&Key> {
        self.0.last()
    }

    /// Path of the parent node. The root is its own parent.
    pub fn parent(&self) -> NodePath {
        let mut keys = self.0.clone();
        keys.pop();
        NodePath(keys)
    }

    /// Returns a new path with `key` appended.
    pub fn child(&self, key: impl Into<Key>) -> NodePath {
        let mut keys = self.0.clone();
        keys.push(key.into());
        NodePath(keys)
    }

    pub fn push(&mut self, key: impl Into<Key>) {
        self.0.push(key.into());
    }

    pub fn pop(&mut self) -> Option<Key> {
        self.0.pop()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 && matches!(key, Key::Name(_)) {
                write!(f, ".")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

impl<K: Into<Key>> FromIterator<K> for NodePath {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        NodePath(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for NodePath {
    type Item = Key;
    type IntoIter = std::vec::IntoIter<Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodePath {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for NodePath {
    type Err = ConfigError;

    /// Parses the syntax produced by `Display`: dot-separated names,
    /// `[n]` indices and double-quoted names for keys with special characters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let mut keys = Vec::new();
        let mut chars = s.chars().peekable();
        let mut expect_key = true;

        while let Some(&c) = chars.peek() {
            match c {
                '.' => {
                    if expect_key {
                        return Err(invalid("empty key"));
                    }
                    chars.next();
                    expect_key = true;
                }
                '[' => {
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => return Err(invalid("index must be a number")),
                            None => return Err(invalid("unterminated index")),
                        }
                    }
                    let index = digits.parse::<usize>().map_err(|_| invalid("empty index"))?;
                    keys.push(Key::Index(index));
                    expect_key = false;
                }
                '"' => {
                    if !expect_key {
                        return Err(invalid("missing '.' before quoted key"));
                    }
                    chars.next();
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => match chars.next() {
                                Some(escaped) => name.push(escaped),
                                None => return Err(invalid("dangling escape")),
                            },
                            Some('"') => break,
                            Some(other) => name.push(other),
                            None => return Err(invalid("unterminated quoted key")),
                        }
                    }
                    keys.push(Key::Name(name));
                    expect_key = false;
                }
                _ => {
                    if !expect_key {
                        return Err(invalid("missing '.' between keys"));
                    }
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n == '.' || n == '[' {
                            break;
                        }
                        if n == ']' || n == '"' {
                            return Err(invalid("unexpected character in key"));
                        }
                        name.push(n);
                        chars.next();
                    }
                    keys.push(Key::Name(name));
                    expect_key = false;
                }
            }
        }

        if expect_key && !keys.is_empty() {
            return Err(invalid("trailing '.'"));
        }

        Ok(NodePath(keys))
    }
}
