//! Scalar and structural values held by configuration nodes.

use std::fmt;

use indexmap::IndexMap;

use crate::node::ConfigNode;

/// A leaf value.
///
/// Every format adapter maps its primitive types onto these four variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

/// The kind of a [`Scalar`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl Scalar {
    /// Returns the string slice if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        if let Scalar::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Returns the integer if this is an integer scalar.
    pub fn as_integer(&self) -> Option<i64> {
        if let Scalar::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Returns the value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) => Some(*f),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean scalar.
    pub fn as_boolean(&self) -> Option<bool> {
        if let Scalar::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::String(_) => ScalarKind::String,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Boolean(_) => ScalarKind::Boolean,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(fl) => write!(f, "{}", fl),
            Scalar::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Integer(i64::from(i))
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

/// The value stored in a [`ConfigNode`].
///
/// # Variants
///
/// * `Null` - No value. Freshly created nodes start here.
/// * `Scalar` - A leaf value.
/// * `List` - Ordered children addressed by index.
/// * `Map` - Children addressed by key, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeValue {
    #[default]
    Null,
    Scalar(Scalar),
    List(Vec<ConfigNode>),
    Map(IndexMap<String, ConfigNode>),
}

impl NodeValue {
    /// An empty map value.
    pub fn empty_map() -> Self {
        NodeValue::Map(IndexMap::new())
    }

    /// An empty list value.
    pub fn empty_list() -> Self {
        NodeValue::List(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NodeValue::Null)
    }

    /// Short name of the variant, used in error messages and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeValue::Null => "null",
            NodeValue::Scalar(Scalar::String(_)) => "string",
            NodeValue::Scalar(Scalar::Integer(_)) => "integer",
            NodeValue::Scalar(Scalar::Float(_)) => "float",
            NodeValue::Scalar(Scalar::Boolean(_)) => "boolean",
            NodeValue::List(_) => "list",
            NodeValue::Map(_) => "map",
        }
    }
}

impl From<Scalar> for NodeValue {
    fn from(value: Scalar) -> Self {
        NodeValue::Scalar(value)
    }
}

macro_rules! scalar_into_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for NodeValue {
                fn from(value: $ty) -> Self {
                    NodeValue::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

scalar_into_value!(&str, String, i64, i32, f64, bool);
