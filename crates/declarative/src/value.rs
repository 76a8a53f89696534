//! Typed attribute values and the attribute table a resource is described by
//!
//! Remote module options are always strings; the conversions between the
//! typed [`Value`] and its option text live here so every resource kind
//! stringifies and parses the same way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A nested record (client secret, permission, raw option...)
pub type Block = BTreeMap<String, String>;

/// Semantic type of a declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Integer,
    Boolean,
    StringList,
    Blocks,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::StringList => "list of strings",
            Self::Blocks => "list of blocks",
        };
        f.write_str(name)
    }
}

/// How a list attribute is flattened into a single option string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListJoin {
    /// One item per line
    #[default]
    Newline,
    /// Comma separated, surrounding spaces ignored on read
    Comma,
    /// Whitespace separated
    Space,
}

impl ListJoin {
    /// Separator written between items
    pub fn separator(self) -> &'static str {
        match self {
            Self::Newline => "\n",
            Self::Comma => ",",
            Self::Space => " ",
        }
    }

    /// Join items into option text
    pub fn join(self, items: &[String]) -> String {
        items.join(self.separator())
    }

    /// Split option text back into items
    ///
    /// Empty segments are dropped, so a trailing separator (which the server
    /// sometimes keeps) and the empty string both read back cleanly.
    pub fn split(self, raw: &str) -> Vec<String> {
        match self {
            Self::Newline => raw
                .split('\n')
                .map(|s| s.trim_end_matches('\r'))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Comma => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Space => raw.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// A typed attribute value
///
/// Deserializes untagged so TOML tables and JSON state can be read straight
/// into values; [`crate::Schema`] then coerces them to the declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Blocks(Vec<Block>),
}

impl Value {
    /// The semantic type this value carries
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Boolean,
            Self::Int(_) => ValueType::Integer,
            Self::Str(_) => ValueType::String,
            Self::List(_) => ValueType::StringList,
            Self::Blocks(_) => ValueType::Blocks,
        }
    }

    /// Render as remote option text
    pub fn to_option_string(&self, name: &str, join: ListJoin) -> Result<String, ValueError> {
        match self {
            Self::Str(s) => Ok(s.clone()),
            Self::Int(i) => Ok(i.to_string()),
            Self::Bool(b) => Ok(b.to_string()),
            Self::List(items) => Ok(join.join(items)),
            Self::Blocks(_) => Err(ValueError::NotScalar {
                name: name.to_string(),
            }),
        }
    }

    /// Parse remote option text as the given type
    pub fn parse_option(
        key: &str,
        raw: &str,
        kind: ValueType,
        join: ListJoin,
    ) -> Result<Self, ValueError> {
        let conversion = || ValueError::Conversion {
            key: key.to_string(),
            value: raw.to_string(),
            expected: kind,
        };

        match kind {
            ValueType::String => Ok(Self::Str(raw.to_string())),
            ValueType::Integer => raw.trim().parse::<i64>().map(Self::Int).map_err(|_| conversion()),
            ValueType::Boolean => match raw.trim() {
                "true" | "TRUE" | "True" => Ok(Self::Bool(true)),
                "false" | "FALSE" | "False" => Ok(Self::Bool(false)),
                _ => Err(conversion()),
            },
            ValueType::StringList => Ok(Self::List(join.split(raw))),
            ValueType::Blocks => Err(conversion()),
        }
    }

    /// Coerce a loosely-typed value to the declared type
    ///
    /// Only lossless coercions are made: an empty list may stand in for an
    /// empty block list, and a single string for a one-item list.
    pub fn coerce(self, name: &str, kind: ValueType) -> Result<Self, ValueError> {
        match (self, kind) {
            (v, k) if v.value_type() == k => Ok(v),
            (Self::List(items), ValueType::Blocks) if items.is_empty() => Ok(Self::Blocks(Vec::new())),
            (Self::Blocks(blocks), ValueType::StringList) if blocks.is_empty() => {
                Ok(Self::List(Vec::new()))
            }
            (Self::Str(s), ValueType::StringList) => Ok(Self::List(vec![s])),
            (v, k) => Err(ValueError::TypeMismatch {
                name: name.to_string(),
                expected: k,
                found: v.value_type(),
            }),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_blocks(&self) -> Option<&[Block]> {
        match self {
            Self::Blocks(blocks) => Some(blocks),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
            Self::Blocks(blocks) => {
                let rendered: Vec<String> = blocks
                    .iter()
                    .map(|b| {
                        let fields: Vec<String> =
                            b.iter().map(|(k, v)| format!("{k} = {v:?}")).collect();
                        format!("{{ {} }}", fields.join(", "))
                    })
                    .collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<Block>> for Value {
    fn from(blocks: Vec<Block>) -> Self {
        Self::Blocks(blocks)
    }
}

/// Where an attribute's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Written explicitly in the declarative config
    Config,
    /// Filled from the attribute's declared default
    Default,
    /// Read back from the server
    Remote,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    source: Source,
}

/// Attribute-name keyed state of one resource
///
/// An attribute is either absent (no entry), present from a default, or
/// present with an explicit value. Equality compares values only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct Attributes {
    entries: BTreeMap<String, Entry>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.insert(name, value.into(), Source::Config);
    }

    /// Set a value filled from a declared default
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.insert(name, value.into(), Source::Default);
    }

    /// Set a value read back from the server
    pub fn set_remote(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.insert(name, value.into(), Source::Remote);
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value, source: Source) {
        self.entries.insert(name.into(), Entry { value, source });
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name).map(|e| e.value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    /// Presence check that does not look at the value
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        self.entries.get(name).map(|e| e.source)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn blocks(&self, name: &str) -> Option<&[Block]> {
        self.get(name).and_then(Value::as_blocks)
    }

    /// String attribute, empty when absent
    pub fn str_or_empty(&self, name: &str) -> String {
        self.str(name).unwrap_or_default().to_string()
    }

    /// List attribute, empty when absent
    pub fn list_or_empty(&self, name: &str) -> Vec<String> {
        self.list(name).map(<[String]>::to_vec).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, e)| other.get(k) == Some(&e.value))
    }
}

impl From<BTreeMap<String, Value>> for Attributes {
    fn from(values: BTreeMap<String, Value>) -> Self {
        let entries = values
            .into_iter()
            .map(|(k, value)| {
                (
                    k,
                    Entry {
                        value,
                        source: Source::Remote,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl From<Attributes> for BTreeMap<String, Value> {
    fn from(attrs: Attributes) -> Self {
        attrs
            .entries
            .into_iter()
            .map(|(k, e)| (k, e.value))
            .collect()
    }
}

/// Errors raised while binding or converting attribute values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Option text could not be parsed as the declared type
    #[error("option {key}: cannot read {value:?} as {expected}")]
    Conversion {
        key: String,
        value: String,
        expected: ValueType,
    },

    /// A configured value has the wrong shape
    #[error("attribute {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    /// Nested blocks cannot be flattened into one option
    #[error("attribute {name}: nested blocks cannot be written as a module option")]
    NotScalar { name: String },

    #[error("unknown attribute {name}")]
    Unknown { name: String },

    #[error("missing required attribute {name}")]
    Missing { name: String },

    /// Server-assigned attributes cannot be configured
    #[error("attribute {name} is computed by the server and cannot be set")]
    Computed { name: String },
}
