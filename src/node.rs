//! The configuration node tree.
//!
//! A [`ConfigNode`] owns its value and, through it, all of its children. Nodes
//! keep no back-pointer to their parent: paths are tracked while navigating
//! from the root instead.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ConfigError, Result};
use crate::mapping::NodeSerializer;
use crate::options::ConfigOptions;
use crate::path::{Key, NodePath};
use crate::value::{NodeValue, Scalar};

/// A node in a configuration tree.
///
/// Besides its [`NodeValue`], a node may carry a comment (written by formats
/// that support comments), a set of attributes and a tag name (used by
/// element-based formats such as XML).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    value: NodeValue,
    comment: Option<String>,
    attributes: IndexMap<String, String>,
    tag_name: Option<String>,
    options: Arc<ConfigOptions>,
}

impl ConfigNode {
    /// Creates an empty root node with default options.
    pub fn root() -> Self {
        ConfigNode::root_with(ConfigOptions::defaults())
    }

    /// Creates an empty root node with the given options.
    pub fn root_with(options: ConfigOptions) -> Self {
        ConfigNode::with_shared_options(Arc::new(options))
    }

    /// Creates a node holding `value`, with default options.
    pub fn from_value(value: impl Into<NodeValue>) -> Self {
        let mut node = ConfigNode::root();
        node.set_value(value);
        node
    }

    fn with_shared_options(options: Arc<ConfigOptions>) -> Self {
        ConfigNode {
            value: NodeValue::Null,
            comment: None,
            attributes: IndexMap::new(),
            tag_name: None,
            options,
        }
    }

    /// Creates a null node that shares this node's options but is not part
    /// of the tree.
    pub fn create_detached(&self) -> ConfigNode {
        ConfigNode::with_shared_options(Arc::clone(&self.options))
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// Replaces the options of this node and of every node below it.
    pub fn set_options(&mut self, options: ConfigOptions) -> &mut Self {
        self.adopt_options(&Arc::new(options));
        self
    }

    fn adopt_options(&mut self, options: &Arc<ConfigOptions>) {
        self.options = Arc::clone(options);
        match &mut self.value {
            NodeValue::List(children) => children.iter_mut().for_each(|c| c.adopt_options(options)),
            NodeValue::Map(children) => children.values_mut().for_each(|c| c.adopt_options(options)),
            _ => {}
        }
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    /// Sets the raw value of this node. Comment, attributes and tag name are
    /// left untouched.
    pub fn set_value(&mut self, value: impl Into<NodeValue>) -> &mut Self {
        self.value = value.into();
        let options = Arc::clone(&self.options);
        self.adopt_options(&options);
        self
    }

    /// Takes the value out of this node, leaving it null.
    pub fn take_value(&mut self) -> NodeValue {
        std::mem::take(&mut self.value)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_map(&self) -> bool {
        matches!(self.value, NodeValue::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.value, NodeValue::List(_))
    }

    /// True for null nodes and for maps or lists without children.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            NodeValue::Null => true,
            NodeValue::Scalar(_) => false,
            NodeValue::List(children) => children.is_empty(),
            NodeValue::Map(children) => children.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        if let NodeValue::Scalar(s) = &self.value {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_integer)
    }

    pub fn as_float(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_float)
    }

    pub fn as_boolean(&self) -> Option<bool> {
        self.as_scalar().and_then(Scalar::as_boolean)
    }

    pub fn children_map(&self) -> Option<&IndexMap<String, ConfigNode>> {
        if let NodeValue::Map(children) = &self.value {
            Some(children)
        } else {
            None
        }
    }

    pub fn children_list(&self) -> Option<&[ConfigNode]> {
        if let NodeValue::List(children) = &self.value {
            Some(children)
        } else {
            None
        }
    }

    /// Navigates to a descendant without modifying the tree.
    ///
    /// Returns `None` as soon as one step of the path does not exist. A map
    /// can also be addressed by index, in which case the index is looked up
    /// as a string key.
    ///
    /// ```
    /// use confnode::ConfigNode;
    ///
    /// let mut root = ConfigNode::root();
    /// root.node_mut(["server", "port"]).set_value(8080);
    /// assert_eq!(root.node(["server", "port"]).and_then(|n| n.as_integer()), Some(8080));
    /// assert!(root.node(["server", "host"]).is_none());
    /// ```
    pub fn node<P>(&self, path: P) -> Option<&ConfigNode>
    where
        P: IntoIterator,
        P::Item: Into<Key>,
    {
        let mut current = self;
        for key in path {
            current = current.child(&key.into())?;
        }
        Some(current)
    }

    fn child(&self, key: &Key) -> Option<&ConfigNode> {
        match (&self.value, key) {
            (NodeValue::Map(children), Key::Name(name)) => children.get(name),
            (NodeValue::Map(children), Key::Index(i)) => children.get(&i.to_string()),
            (NodeValue::List(children), Key::Index(i)) => children.get(*i),
            _ => None,
        }
    }

    /// Navigates to a descendant, creating every missing node on the way.
    ///
    /// A null or scalar node addressed by name becomes a map, addressed by
    /// index it becomes a list. A list addressed by name is turned into a map
    /// keyed by the former indices. Lists addressed past their end are padded
    /// with null nodes.
    pub fn node_mut<P>(&mut self, path: P) -> &mut ConfigNode
    where
        P: IntoIterator,
        P::Item: Into<Key>,
    {
        let mut current = self;
        for key in path {
            current = current.child_mut(key.into());
        }
        current
    }

    fn child_mut(&mut self, key: Key) -> &mut ConfigNode {
        let options = Arc::clone(&self.options);
        match key {
            Key::Index(i) if !self.is_map() => {
                let children = self.ensure_list();
                if i >= children.len() {
                    children.resize_with(i + 1, || ConfigNode::with_shared_options(Arc::clone(&options)));
                }
                &mut children[i]
            }
            Key::Index(i) => self
                .ensure_map()
                .entry(i.to_string())
                .or_insert_with(|| ConfigNode::with_shared_options(options)),
            Key::Name(name) => self
                .ensure_map()
                .entry(name)
                .or_insert_with(|| ConfigNode::with_shared_options(options)),
        }
    }

    fn ensure_map(&mut self) -> &mut IndexMap<String, ConfigNode> {
        match std::mem::take(&mut self.value) {
            NodeValue::Map(children) => self.value = NodeValue::Map(children),
            NodeValue::List(children) => {
                trace!("Converting list of {} children to a map", children.len());
                self.value = NodeValue::Map(
                    children
                        .into_iter()
                        .enumerate()
                        .map(|(i, child)| (i.to_string(), child))
                        .collect(),
                );
            }
            previous => {
                if !previous.is_null() {
                    trace!("Replacing {} value with a map", previous.type_name());
                }
                self.value = NodeValue::empty_map();
            }
        }

        match &mut self.value {
            NodeValue::Map(children) => children,
            _ => unreachable!("value was just set to a map"),
        }
    }

    fn ensure_list(&mut self) -> &mut Vec<ConfigNode> {
        if !self.is_list() {
            if !self.is_null() {
                trace!("Replacing {} value with a list", self.value.type_name());
            }
            self.value = NodeValue::empty_list();
        }

        match &mut self.value {
            NodeValue::List(children) => children,
            _ => unreachable!("value was just set to a list"),
        }
    }

    /// Appends a new null child to this node, turning it into a list first
    /// if needed, and returns it.
    pub fn append_list_child(&mut self) -> &mut ConfigNode {
        let child = ConfigNode::with_shared_options(Arc::clone(&self.options));
        let children = self.ensure_list();
        children.push(child);
        let last = children.len() - 1;
        &mut children[last]
    }

    /// Removes a direct child, returning it if it existed.
    pub fn remove_child(&mut self, key: impl Into<Key>) -> Option<ConfigNode> {
        match (&mut self.value, key.into()) {
            (NodeValue::Map(children), Key::Name(name)) => children.shift_remove(&name),
            (NodeValue::Map(children), Key::Index(i)) => children.shift_remove(&i.to_string()),
            (NodeValue::List(children), Key::Index(i)) if i < children.len() => Some(children.remove(i)),
            _ => None,
        }
    }

    /// Deserializes this node into `T`.
    ///
    /// If the node is null and the options allow implicit initialization,
    /// collection types come back empty instead of failing.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T> {
        match T::deserialize(self) {
            Ok(value) => Ok(value),
            Err(err) if self.is_null() && self.options.implicit_initialization() => {
                let empty_list = ConfigNode::from_value(NodeValue::empty_list());
                let empty_map = ConfigNode::from_value(NodeValue::empty_map());
                T::deserialize(&empty_list)
                    .or_else(|_| T::deserialize(&empty_map))
                    .map_err(|_| ConfigError::Serialization(err.to_string()))
            }
            Err(err) => Err(ConfigError::Serialization(format!(
                "cannot read {} value: {}",
                self.value.type_name(),
                err
            ))),
        }
    }

    /// Like [`get`](Self::get), but returns `default` when the node is null.
    pub fn get_or<T: DeserializeOwned>(&self, default: T) -> Result<T> {
        if self.is_null() {
            Ok(default)
        } else {
            self.get()
        }
    }

    /// Like [`get_or`](Self::get_or), but also stores the default in the
    /// tree when the options say defaults should be copied.
    pub fn get_or_set<T: Serialize + DeserializeOwned>(&mut self, default: T) -> Result<T> {
        if self.is_null() {
            if self.options.should_copy_defaults() {
                self.set(&default)?;
            }
            Ok(default)
        } else {
            self.get()
        }
    }

    /// Serializes `value` into this node, replacing its current value.
    ///
    /// `None` and `()` produce a null node. Comment, attributes and tag name
    /// of this node are kept.
    pub fn set<T: Serialize>(&mut self, value: T) -> Result<&mut Self> {
        let node = value
            .serialize(NodeSerializer)
            .map_err(|err| ConfigError::Serialization(err.to_string()))?;
        Ok(self.set_value(node.value))
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: Option<&str>) -> &mut Self {
        self.comment = comment.map(str::to_string);
        self
    }

    /// Sets the comment only if the node does not have one yet.
    pub fn set_comment_if_absent(&mut self, comment: &str) -> &mut Self {
        if self.comment.is_none() {
            self.comment = Some(comment.to_string());
        }
        self
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) -> &mut Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag_name.as_deref()
    }

    pub fn set_tag_name(&mut self, tag_name: Option<&str>) -> &mut Self {
        self.tag_name = tag_name.map(str::to_string);
        self
    }

    /// Fills in this node from `other` without overriding anything already set.
    ///
    /// A null node takes a copy of `other`; two maps are merged key by key;
    /// in every other case the existing value wins. Comments, attributes and
    /// the tag name are copied only where this node has none.
    pub fn merge_from(&mut self, other: &ConfigNode) -> &mut Self {
        if self.comment.is_none() {
            self.comment.clone_from(&other.comment);
        }
        if self.tag_name.is_none() {
            self.tag_name.clone_from(&other.tag_name);
        }
        for (name, value) in &other.attributes {
            self.attributes.entry(name.clone()).or_insert_with(|| value.clone());
        }

        if self.is_null() {
            self.set_value(other.value.clone());
            return self;
        }

        if let (NodeValue::Map(mine), NodeValue::Map(theirs)) = (&mut self.value, &other.value) {
            for (key, their_child) in theirs {
                let options = Arc::clone(&self.options);
                mine.entry(key.clone())
                    .or_insert_with(|| ConfigNode::with_shared_options(options))
                    .merge_from(their_child);
            }
        }

        self
    }

    /// Visits this node and every descendant, parents before children.
    pub fn walk<F>(&self, mut visitor: F)
    where
        F: FnMut(&NodePath, &ConfigNode),
    {
        let mut path = NodePath::root();
        self.walk_inner(&mut path, &mut visitor);
    }

    fn walk_inner<F>(&self, path: &mut NodePath, visitor: &mut F)
    where
        F: FnMut(&NodePath, &ConfigNode),
    {
        visitor(path, self);
        match &self.value {
            NodeValue::Map(children) => {
                for (key, child) in children {
                    path.push(key.as_str());
                    child.walk_inner(path, visitor);
                    path.pop();
                }
            }
            NodeValue::List(children) => {
                for (i, child) in children.iter().enumerate() {
                    path.push(i);
                    child.walk_inner(path, visitor);
                    path.pop();
                }
            }
            _ => {}
        }
    }
}

impl Default for ConfigNode {
    fn default() -> Self {
        ConfigNode::root()
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            NodeValue::Null => write!(f, "null"),
            NodeValue::Scalar(s) => write!(f, "{}", s),
            NodeValue::List(children) => {
                write!(f, "[")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, "]")
            }
            NodeValue::Map(children) => {
                write!(f, "{{")?;
                for (i, (key, child)) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, child)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Serialize for ConfigNode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.value {
            NodeValue::Null => serializer.serialize_unit(),
            NodeValue::Scalar(Scalar::String(s)) => serializer.serialize_str(s),
            NodeValue::Scalar(Scalar::Integer(i)) => serializer.serialize_i64(*i),
            NodeValue::Scalar(Scalar::Float(f)) => serializer.serialize_f64(*f),
            NodeValue::Scalar(Scalar::Boolean(b)) => serializer.serialize_bool(*b),
            NodeValue::List(children) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(children.len()))?;
                for child in children {
                    seq.serialize_element(child)?;
                }
                seq.end()
            }
            NodeValue::Map(children) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (key, child) in children {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
        }
    }
}

/// Builds a node tree from any self-describing serde input.
///
/// Unsigned integers that do not fit an `i64` become floats.
impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, SeqAccess, Visitor};

        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = ConfigNode;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, number, boolean, sequence, map or null")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::from_value(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::from_value(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Self::Value, E> {
                match i64::try_from(value) {
                    Ok(i) => Ok(ConfigNode::from_value(i)),
                    Err(_) => Ok(ConfigNode::from_value(value as f64)),
                }
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::from_value(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::from_value(value))
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::from_value(value))
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::root())
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(ConfigNode::root())
            }

            fn visit_some<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                ConfigNode::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut children = Vec::new();
                while let Some(child) = seq.next_element::<ConfigNode>()? {
                    children.push(child);
                }
                Ok(ConfigNode::from_value(NodeValue::List(children)))
            }

            fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut children = IndexMap::new();
                while let Some((key, child)) = map.next_entry::<String, ConfigNode>()? {
                    children.insert(key, child);
                }
                Ok(ConfigNode::from_value(NodeValue::Map(children)))
            }
        }

        deserializer.deserialize_any(NodeVisitor)
    }
}
