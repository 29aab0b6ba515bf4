//! Typed configuration value trees.
//!
//! # Design
//! - A configuration is a two-level mapping: section name to parameter name to
//!   typed value. Ordered maps keep completion and diff output deterministic.
//! - Values are a closed enum instead of raw JSON so rule evaluation never
//!   coerces types at runtime.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// One typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean toggle.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Free-form text.
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value, when it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Integer view of the value; integral floats qualify.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integral(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            Self::Float(_) | Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Decode a single JSON scalar into a typed value.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Float)),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Encode the value as a JSON scalar.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(value) => Value::Number(Number::from(*value)),
            // Non-finite floats cannot appear via JSON input; mapped to null
            // rather than panicking if one is ever constructed directly.
            Self::Float(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(formatter, "{flag}"),
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::Text(text) => formatter.write_str(text),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Parameters of one configuration section.
pub type Section = BTreeMap<String, ParamValue>;

/// A full or partial configuration: section name to parameter map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(pub BTreeMap<String, Section>);

impl ConfigTree {
    /// Empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Whether the tree has no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up one parameter value.
    #[must_use]
    pub fn get(&self, section: &str, parameter: &str) -> Option<&ParamValue> {
        self.0.get(section).and_then(|params| params.get(parameter))
    }

    /// Section view by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.0.get(name)
    }

    /// Insert one parameter value, creating the section as needed.
    pub fn set(&mut self, section: &str, parameter: &str, value: impl Into<ParamValue>) {
        self.0
            .entry(section.to_string())
            .or_default()
            .insert(parameter.to_string(), value.into());
    }

    /// Iterate every `(section, parameter, value)` leaf in order.
    pub fn leaves(&self) -> impl Iterator<Item = (&str, &str, &ParamValue)> {
        self.0.iter().flat_map(|(section, params)| {
            params
                .iter()
                .map(move |(parameter, value)| (section.as_str(), parameter.as_str(), value))
        })
    }

    /// Decode a stored JSON document into a tree. Returns `None` when the
    /// document is not a two-level object of scalars.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(sections) = value else {
            return None;
        };
        let mut tree = BTreeMap::new();
        for (section, params) in sections {
            let Value::Object(params) = params else {
                return None;
            };
            let mut decoded = Section::new();
            for (parameter, raw) in params {
                decoded.insert(parameter.clone(), ParamValue::from_json(raw)?);
            }
            tree.insert(section.clone(), decoded);
        }
        Some(Self(tree))
    }

    /// Encode the tree as a JSON document for storage.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut sections = Map::new();
        for (section, params) in &self.0 {
            let mut encoded = Map::new();
            for (parameter, value) in params {
                encoded.insert(parameter.clone(), value.to_json());
            }
            sections.insert(section.clone(), Value::Object(encoded));
        }
        Value::Object(sections)
    }
}
