//! Schemas for node trees.
//!
//! A [`Schema`] maps node paths to field definitions. It can check a loaded
//! tree and fill in defaults and comments for fields the tree lacks.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use tracing::trace;

use crate::error::ConfigError;
use crate::node::ConfigNode;
use crate::path::{Key, NodePath};
use crate::value::{NodeValue, Scalar};

/// The kind of value a field must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Integer,
    /// Integers are accepted too.
    Float,
    Boolean,
    List,
    Map,
    /// Any non-null value.
    Any,
}

impl ValueType {
    /// Returns the type of a non-null value, or `None` for null.
    pub fn of(value: &NodeValue) -> Option<ValueType> {
        match value {
            NodeValue::Null => None,
            NodeValue::Scalar(Scalar::String(_)) => Some(ValueType::String),
            NodeValue::Scalar(Scalar::Integer(_)) => Some(ValueType::Integer),
            NodeValue::Scalar(Scalar::Float(_)) => Some(ValueType::Float),
            NodeValue::Scalar(Scalar::Boolean(_)) => Some(ValueType::Boolean),
            NodeValue::List(_) => Some(ValueType::List),
            NodeValue::Map(_) => Some(ValueType::Map),
        }
    }

    fn accepts(&self, actual: ValueType) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Float => matches!(actual, ValueType::Float | ValueType::Integer),
            expected => *expected == actual,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Any => "any",
        };
        write!(f, "{}", name)
    }
}

/// What the schema expects at one path.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub value_type: ValueType,
    /// A required field may not be missing or null.
    pub required: bool,
    /// Written by [`Schema::apply_defaults`] when the node is missing or null.
    pub default_value: Option<NodeValue>,
    pub constraints: Vec<FieldConstraint>,
    /// Attached by [`Schema::apply_defaults`] to a node without a comment.
    pub comment: Option<String>,
}

impl FieldDefinition {
    /// An optional field of the given type, with no default or constraints.
    pub fn new(value_type: ValueType) -> Self {
        FieldDefinition {
            value_type,
            required: false,
            default_value: None,
            constraints: Vec::new(),
            comment: None,
        }
    }

    /// Makes a missing or null node an error.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<NodeValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn constraint(mut self, constraint: FieldConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Comment for the node, so saved files document the field.
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Checks the node found at `path`, or `None` when nothing is there.
    /// A null node counts as missing.
    pub fn validate(&self, node: Option<&ConfigNode>, path: &NodePath) -> Result<(), ValidationError> {
        let node = match node {
            Some(node) if !node.is_null() => node,
            _ => {
                if self.required {
                    return Err(ValidationError::MissingField { path: path.clone() });
                }
                return Ok(());
            }
        };

        if let Some(actual) = ValueType::of(node.value()) {
            if !self.value_type.accepts(actual) {
                return Err(ValidationError::TypeMismatch {
                    path: path.clone(),
                    expected: self.value_type,
                    actual,
                });
            }
        }

        for constraint in &self.constraints {
            constraint.validate(node, path)?;
        }

        Ok(())
    }
}

/// A shareable closure behind [`FieldConstraint::Custom`].
#[derive(Clone)]
pub struct ValidateFn(Arc<dyn Fn(&ConfigNode) -> Result<(), String> + Send + Sync>);

impl ValidateFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ConfigNode) -> Result<(), String> + Send + Sync + 'static,
    {
        ValidateFn(Arc::new(f))
    }

    pub fn validate(&self, node: &ConfigNode) -> Result<(), String> {
        (self.0)(node)
    }
}

impl fmt::Debug for ValidateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidateFn")
    }
}

/// Extra checks on a field's value beyond its type.
#[derive(Debug, Clone)]
pub enum FieldConstraint {
    /// Length in characters, a regex, and a set of allowed values.
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        pattern: Option<Regex>,
        allowed_values: Option<Vec<String>>,
    },
    /// Inclusive range and a set of allowed values.
    Integer {
        min: Option<i64>,
        max: Option<i64>,
        allowed_values: Option<Vec<i64>>,
    },
    /// Inclusive range.
    Float {
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Item count, and a definition every item must satisfy.
    List {
        min_length: Option<usize>,
        max_length: Option<usize>,
        item_type: Option<Box<FieldDefinition>>,
    },
    /// A closure returning an explanation when the node is rejected.
    Custom {
        #[doc(hidden)]
        validate_fn: ValidateFn,
        /// Named in the error message.
        description: String,
    },
}

impl FieldConstraint {
    pub fn string() -> Self {
        FieldConstraint::String {
            min_length: None,
            max_length: None,
            pattern: None,
            allowed_values: None,
        }
    }

    /// Sets the minimum length of a string or list constraint
    pub fn min_length(mut self, min: usize) -> Self {
        match &mut self {
            FieldConstraint::String { min_length, .. } | FieldConstraint::List { min_length, .. } => {
                *min_length = Some(min);
            }
            _ => {}
        }
        self
    }

    /// Sets the maximum length of a string or list constraint
    pub fn max_length(mut self, max: usize) -> Self {
        match &mut self {
            FieldConstraint::String { max_length, .. } | FieldConstraint::List { max_length, .. } => {
                *max_length = Some(max);
            }
            _ => {}
        }
        self
    }

    /// Sets the regex pattern of a string constraint
    pub fn pattern(mut self, regex: Regex) -> Self {
        if let FieldConstraint::String { pattern, .. } = &mut self {
            *pattern = Some(regex);
        }
        self
    }

    /// Sets the allowed values of a string constraint
    pub fn allowed_string_values(mut self, values: &[&str]) -> Self {
        if let FieldConstraint::String { allowed_values, .. } = &mut self {
            *allowed_values = Some(values.iter().map(|s| s.to_string()).collect());
        }
        self
    }

    pub fn integer() -> Self {
        FieldConstraint::Integer {
            min: None,
            max: None,
            allowed_values: None,
        }
    }

    /// Sets the minimum value of an integer constraint
    pub fn min_int(mut self, value: i64) -> Self {
        if let FieldConstraint::Integer { min, .. } = &mut self {
            *min = Some(value);
        }
        self
    }

    /// Sets the maximum value of an integer constraint
    pub fn max_int(mut self, value: i64) -> Self {
        if let FieldConstraint::Integer { max, .. } = &mut self {
            *max = Some(value);
        }
        self
    }

    /// Sets the allowed values of an integer constraint
    pub fn allowed_int_values(mut self, values: &[i64]) -> Self {
        if let FieldConstraint::Integer { allowed_values, .. } = &mut self {
            *allowed_values = Some(values.to_vec());
        }
        self
    }

    pub fn float() -> Self {
        FieldConstraint::Float { min: None, max: None }
    }

    /// Sets the minimum value of a float constraint
    pub fn min_float(mut self, value: f64) -> Self {
        if let FieldConstraint::Float { min, .. } = &mut self {
            *min = Some(value);
        }
        self
    }

    /// Sets the maximum value of a float constraint
    pub fn max_float(mut self, value: f64) -> Self {
        if let FieldConstraint::Float { max, .. } = &mut self {
            *max = Some(value);
        }
        self
    }

    pub fn list() -> Self {
        FieldConstraint::List {
            min_length: None,
            max_length: None,
            item_type: None,
        }
    }

    /// Sets the definition every list item must satisfy
    pub fn item_type(mut self, item_def: FieldDefinition) -> Self {
        if let FieldConstraint::List { item_type, .. } = &mut self {
            *item_type = Some(Box::new(item_def));
        }
        self
    }

    pub fn custom<F>(validate_fn: F, description: &str) -> Self
    where
        F: Fn(&ConfigNode) -> Result<(), String> + Send + Sync + 'static,
    {
        FieldConstraint::Custom {
            validate_fn: ValidateFn::new(validate_fn),
            description: description.to_string(),
        }
    }

    /// Checks `node` against this constraint.
    ///
    /// Constraints only look at nodes of their own kind: a string constraint
    /// ignores an integer node, leaving type checks to the field definition.
    pub fn validate(&self, node: &ConfigNode, path: &NodePath) -> Result<(), ValidationError> {
        match self {
            FieldConstraint::String { min_length, max_length, pattern, allowed_values } => {
                let Some(s) = node.as_str() else { return Ok(()) };
                let length = s.chars().count();
                check_bounds(length, *min_length, *max_length).map_err(|bound| match bound {
                    Bound::Below(min) => ValidationError::StringTooShort { path: path.clone(), min, actual: length },
                    Bound::Above(max) => ValidationError::StringTooLong { path: path.clone(), max, actual: length },
                })?;

                if let Some(regex) = pattern.as_ref().filter(|regex| !regex.is_match(s)) {
                    return Err(ValidationError::PatternMismatch {
                        path: path.clone(),
                        pattern: regex.to_string(),
                        value: s.to_string(),
                    });
                }
                check_allowed(path, s, allowed_values.as_deref())
            }

            FieldConstraint::Integer { min, max, allowed_values } => {
                let Some(i) = node.as_integer() else { return Ok(()) };
                check_bounds(i, *min, *max).map_err(|bound| match bound {
                    Bound::Below(min) => ValidationError::IntegerTooSmall { path: path.clone(), min, actual: i },
                    Bound::Above(max) => ValidationError::IntegerTooLarge { path: path.clone(), max, actual: i },
                })?;
                check_allowed(path, &i, allowed_values.as_deref())
            }

            FieldConstraint::Float { min, max } => {
                let Some(f) = node.as_float() else { return Ok(()) };
                check_bounds(f, *min, *max).map_err(|bound| match bound {
                    Bound::Below(min) => ValidationError::FloatTooSmall { path: path.clone(), min, actual: f },
                    Bound::Above(max) => ValidationError::FloatTooLarge { path: path.clone(), max, actual: f },
                })
            }

            FieldConstraint::List { min_length, max_length, item_type } => {
                let Some(items) = node.children_list() else { return Ok(()) };
                let count = items.len();
                check_bounds(count, *min_length, *max_length).map_err(|bound| match bound {
                    Bound::Below(min) => ValidationError::ListTooShort { path: path.clone(), min, actual: count },
                    Bound::Above(max) => ValidationError::ListTooLong { path: path.clone(), max, actual: count },
                })?;

                if let Some(item_def) = item_type {
                    for (i, item) in items.iter().enumerate() {
                        item_def.validate(Some(item), &path.child(i))?;
                    }
                }
                Ok(())
            }

            FieldConstraint::Custom { validate_fn, description } => {
                validate_fn.validate(node).map_err(|message| ValidationError::CustomConstraintFailed {
                    path: path.clone(),
                    description: description.clone(),
                    message,
                })
            }
        }
    }
}

/// Which side of a range a value fell out of, carrying the violated bound.
enum Bound<T> {
    Below(T),
    Above(T),
}

fn check_bounds<T: PartialOrd + Copy>(value: T, min: Option<T>, max: Option<T>) -> Result<(), Bound<T>> {
    match (min, max) {
        (Some(min), _) if value < min => Err(Bound::Below(min)),
        (_, Some(max)) if value > max => Err(Bound::Above(max)),
        _ => Ok(()),
    }
}

fn check_allowed<T, V>(path: &NodePath, value: &V, allowed: Option<&[T]>) -> Result<(), ValidationError>
where
    T: PartialEq<V> + fmt::Display,
    V: fmt::Display + ?Sized,
{
    match allowed {
        Some(allowed) if !allowed.iter().any(|candidate| candidate == value) => Err(ValidationError::InvalidValue {
            path: path.clone(),
            allowed: allowed.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            actual: value.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Expected shape of a configuration tree.
///
/// Fields are kept in declaration order, which is also the order in which
/// `apply_defaults` creates missing nodes.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: IndexMap<NodePath, FieldDefinition>,
    allow_unknown_keys: bool,
}

impl Schema {
    /// Creates an empty schema that allows unknown keys.
    pub fn new() -> Self {
        Schema {
            fields: IndexMap::new(),
            allow_unknown_keys: true,
        }
    }

    /// Defines a field.
    ///
    /// # Arguments
    ///
    /// * `path` - Where the field lives, e.g. `"server.port"` parsed into a `NodePath`.
    /// * `definition` - The definition of the field.
    pub fn field(&mut self, path: NodePath, definition: FieldDefinition) -> &mut Self {
        self.fields.insert(path, definition);
        self
    }

    /// Like [`field`](Self::field), parsing the path from its string form.
    pub fn field_at(&mut self, path: &str, definition: FieldDefinition) -> Result<&mut Self, ConfigError> {
        let path: NodePath = path.parse()?;
        Ok(self.field(path, definition))
    }

    /// Configures whether keys without a definition are accepted inside maps
    /// that contain defined fields.
    pub fn allow_unknown_keys(&mut self, allow: bool) -> &mut Self {
        self.allow_unknown_keys = allow;
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&NodePath, &FieldDefinition)> {
        self.fields.iter()
    }

    /// Validates a tree against the schema, collecting every error.
    pub fn validate(&self, root: &ConfigNode) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        for (path, definition) in &self.fields {
            if let Err(err) = definition.validate(root.node(path), path) {
                errors.push(err);
            }
        }

        if !self.allow_unknown_keys {
            let mut parents: Vec<NodePath> = self.fields.keys().map(NodePath::parent).collect();
            parents.dedup();

            for parent in parents {
                let Some(children) = root.node(&parent).and_then(ConfigNode::children_map) else {
                    continue;
                };
                for key in children.keys() {
                    let child_path = parent.child(key.as_str());
                    let is_known = self
                        .fields
                        .keys()
                        .any(|field| field == &child_path || field.keys().starts_with(child_path.keys()));
                    if !is_known && !errors.iter().any(|e| matches!(e, ValidationError::UnknownKey { path } if *path == child_path)) {
                        errors.push(ValidationError::UnknownKey { path: child_path });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Writes default values for null fields and attaches field comments
    /// to nodes that do not have a comment yet.
    pub fn apply_defaults(&self, root: &mut ConfigNode) {
        for (path, definition) in &self.fields {
            let exists = root.node(path).is_some_and(|n| !n.is_null());
            if !exists {
                if let Some(default_value) = &definition.default_value {
                    if can_create(root, path) {
                        root.node_mut(path).set_value(default_value.clone());
                    } else {
                        trace!("Not writing default for {}: an ancestor is a scalar", path);
                    }
                }
            }

            if let Some(comment) = &definition.comment {
                if root.node(path).is_some() {
                    root.node_mut(path).set_comment_if_absent(comment);
                }
            }
        }
    }

    /// Applies defaults, then validates.
    pub fn validate_and_apply_defaults(&self, root: &mut ConfigNode) -> Result<(), ValidationErrors> {
        self.apply_defaults(root);
        self.validate(root)
    }
}

/// Whether `node_mut(path)` would only add nodes, never turn an existing
/// scalar (or a list addressed by name) into a map.
fn can_create(root: &ConfigNode, path: &NodePath) -> bool {
    let mut current = root;
    for key in path {
        let fits = match (current.value(), key) {
            (NodeValue::Null, _) | (NodeValue::Map(_), _) => true,
            (NodeValue::List(_), Key::Index(_)) => true,
            _ => false,
        };
        if !fits {
            return false;
        }
        match current.node([key]) {
            Some(child) => current = child,
            None => return true,
        }
    }
    true
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new()
    }
}

/// One way in which a tree failed its schema.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing field: {path}")]
    MissingField { path: NodePath },

    #[error("Unknown key: {path}")]
    UnknownKey { path: NodePath },

    #[error("Type mismatch for {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: NodePath,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("String too short for {path}: minimum length {min}, actual {actual}")]
    StringTooShort { path: NodePath, min: usize, actual: usize },

    #[error("String too long for {path}: maximum length {max}, actual {actual}")]
    StringTooLong { path: NodePath, max: usize, actual: usize },

    #[error("Pattern mismatch for {path}: pattern {pattern}, value {value}")]
    PatternMismatch {
        path: NodePath,
        pattern: String,
        value: String,
    },

    #[error("Invalid value for {path}: allowed {allowed}, actual {actual}")]
    InvalidValue {
        path: NodePath,
        allowed: String,
        actual: String,
    },

    #[error("Integer too small for {path}: minimum {min}, actual {actual}")]
    IntegerTooSmall { path: NodePath, min: i64, actual: i64 },

    #[error("Integer too large for {path}: maximum {max}, actual {actual}")]
    IntegerTooLarge { path: NodePath, max: i64, actual: i64 },

    #[error("Float too small for {path}: minimum {min}, actual {actual}")]
    FloatTooSmall { path: NodePath, min: f64, actual: f64 },

    #[error("Float too large for {path}: maximum {max}, actual {actual}")]
    FloatTooLarge { path: NodePath, max: f64, actual: f64 },

    #[error("List too short for {path}: minimum length {min}, actual {actual}")]
    ListTooShort { path: NodePath, min: usize, actual: usize },

    #[error("List too long for {path}: maximum length {max}, actual {actual}")]
    ListTooLong { path: NodePath, max: usize, actual: usize },

    #[error("Custom constraint failed for {path}: {description} - {message}")]
    CustomConstraintFailed {
        path: NodePath,
        description: String,
        message: String,
    },
}

/// Every error found by [`Schema::validate`], in field order.
#[derive(Debug, thiserror::Error)]
#[error("Configuration validation errors:\n{}", self.format_errors())]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    fn format_errors(&self) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, err)| format!("{}. {}", i + 1, err))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors.to_string())
    }
}
