//! Attribute schemas
//!
//! Each resource kind describes its attributes once, as a static table of
//! [`AttributeSpec`]. The table drives config binding, validation, diffing,
//! and the option mapping done by the module-backed kinds.

use crate::diagnostics::Diagnostic;
use crate::value::{Attributes, Block, ListJoin, Source, Value, ValueError, ValueType};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/?#]+[^\s]*$").expect("url regex must compile"));

/// How an attribute is carried to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A field of the entity body
    Field,
    /// A module option, stored under the attribute's remote key
    Option,
    /// A module dependency; the attribute value is the target module id
    Dependency { dep_type: &'static str },
    /// Raw dependency blocks (`module_id`, `type`)
    DependencyList,
    /// Raw option blocks (`key`, `value`)
    OptionList,
    /// Assigned by the server, never configured
    Computed,
}

/// Declared default, applied when the config omits the attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    Bool(bool),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            Self::Str(s) => Value::Str(s.to_string()),
            Self::Int(i) => Value::Int(i),
            Self::Bool(b) => Value::Bool(b),
        }
    }
}

/// Validation rule attached to an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    None,
    NoWhitespace,
    Url,
    Rfc3339,
    OneOf(&'static [&'static str]),
    EachOneOf(&'static [&'static str]),
    LenBetween(usize, usize),
    Range(i64, i64),
}

/// One declared attribute of a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: ValueType,
    pub default: Option<DefaultValue>,
    /// Remote key or field name when it differs from `name`
    pub key: Option<&'static str>,
    pub role: Role,
    pub required: bool,
    /// Masked in output and kept from prior state on refresh
    pub sensitive: bool,
    /// A change forces destroy-then-create
    pub immutable: bool,
    pub join: ListJoin,
    pub check: Check,
    /// Leaving it unset means it must be absent remotely
    pub clears_when_unset: bool,
}

impl AttributeSpec {
    pub const fn new(name: &'static str, kind: ValueType) -> Self {
        Self {
            name,
            kind,
            default: None,
            key: None,
            role: Role::Field,
            required: false,
            sensitive: false,
            immutable: false,
            join: ListJoin::Newline,
            check: Check::None,
            clears_when_unset: false,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, ValueType::String)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ValueType::Integer)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ValueType::Boolean)
    }

    pub const fn list(name: &'static str) -> Self {
        Self::new(name, ValueType::StringList)
    }

    pub const fn blocks(name: &'static str) -> Self {
        Self::new(name, ValueType::Blocks)
    }

    /// Module option stored under `key`
    pub const fn option(mut self, key: &'static str) -> Self {
        self.role = Role::Option;
        self.key = Some(key);
        self
    }

    /// Entity field whose wire name is `key`
    pub const fn key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    /// Module dependency of the given type
    pub const fn dependency(mut self, dep_type: &'static str) -> Self {
        self.role = Role::Dependency { dep_type };
        self
    }

    pub const fn dependency_list(mut self) -> Self {
        self.role = Role::DependencyList;
        self
    }

    pub const fn option_list(mut self) -> Self {
        self.role = Role::OptionList;
        self
    }

    pub const fn computed(mut self) -> Self {
        self.role = Role::Computed;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// A remote value is drift unless the config sets it too
    pub const fn clears_when_unset(mut self) -> Self {
        self.clears_when_unset = true;
        self
    }

    pub const fn join(mut self, join: ListJoin) -> Self {
        self.join = join;
        self
    }

    pub const fn check(mut self, check: Check) -> Self {
        self.check = check;
        self
    }

    pub const fn default_str(mut self, value: &'static str) -> Self {
        self.default = Some(DefaultValue::Str(value));
        self
    }

    pub const fn default_int(mut self, value: i64) -> Self {
        self.default = Some(DefaultValue::Int(value));
        self
    }

    pub const fn default_bool(mut self, value: bool) -> Self {
        self.default = Some(DefaultValue::Bool(value));
        self
    }

    /// Name used on the wire
    pub fn remote_key(&self) -> &'static str {
        match self.key {
            Some(key) => key,
            None => self.name,
        }
    }

    /// Declared default as a value of this spec's type
    ///
    /// A string default on a list attribute is split with the list's join.
    pub fn default_value(&self) -> Option<Value> {
        match (self.default?, self.kind) {
            (DefaultValue::Str(s), ValueType::StringList) => Some(Value::List(self.join.split(s))),
            (default, _) => Some(default.to_value()),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.role == Role::Computed
    }

    /// Check a present value against this spec's rule
    pub fn validate(&self, value: &Value) -> Option<String> {
        self.list_item_problem(value).or_else(|| self.check_problem(value))
    }

    /// Option list items must come back unchanged from join then split
    fn list_item_problem(&self, value: &Value) -> Option<String> {
        let (Role::Option, Value::List(items)) = (self.role, value) else {
            return None;
        };
        items
            .iter()
            .find(|item| self.join.split(item).as_slice() != std::slice::from_ref(*item))
            .map(|item| {
                format!(
                    "{} entries must be non-empty and must not contain the {:?} separator, got {item:?}",
                    self.name,
                    self.join.separator()
                )
            })
    }

    fn check_problem(&self, value: &Value) -> Option<String> {
        match (self.check, value) {
            (Check::None, _) => None,
            (Check::NoWhitespace, Value::Str(s)) => s
                .chars()
                .any(char::is_whitespace)
                .then(|| format!("{} must not contain whitespace", self.name)),
            (Check::Url, Value::Str(s)) => {
                (!URL_RE.is_match(s)).then(|| format!("{} must be an http(s) URL, got {s:?}", self.name))
            }
            (Check::Url, Value::List(items)) => items
                .iter()
                .find(|s| !URL_RE.is_match(s))
                .map(|s| format!("{} entries must be http(s) URLs, got {s:?}", self.name)),
            (Check::Rfc3339, Value::Str(s)) => chrono::DateTime::parse_from_rfc3339(s)
                .err()
                .map(|_| format!("{} must be an RFC 3339 timestamp, got {s:?}", self.name)),
            (Check::OneOf(allowed), Value::Str(s)) => (!allowed.contains(&s.as_str()))
                .then(|| format!("{} must be one of {}, got {s:?}", self.name, allowed.join(", "))),
            (Check::EachOneOf(allowed), Value::List(items)) => items
                .iter()
                .find(|s| !allowed.contains(&s.as_str()))
                .map(|s| format!("{} entries must be one of {}, got {s:?}", self.name, allowed.join(", "))),
            (Check::LenBetween(min, max), Value::Str(s)) => {
                let len = s.chars().count();
                (len < min || len > max)
                    .then(|| format!("{} must be between {min} and {max} characters", self.name))
            }
            (Check::Range(min, max), Value::Int(i)) => (*i < min || *i > max)
                .then(|| format!("{} must be between {min} and {max}, got {i}", self.name)),
            _ => None,
        }
    }
}

/// The attribute table of one resource kind
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    kind: &'static str,
    specs: &'static [AttributeSpec],
}

impl Schema {
    pub const fn new(kind: &'static str, specs: &'static [AttributeSpec]) -> Self {
        Self { kind, specs }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Specs in declaration order
    pub fn specs(&self) -> &'static [AttributeSpec] {
        self.specs
    }

    pub fn get(&self, name: &str) -> Option<&'static AttributeSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Bind a raw attribute table from the config file
    ///
    /// Values are coerced to their declared types; absent attributes with a
    /// default are filled in with [`Source::Default`].
    pub fn bind(&self, raw: BTreeMap<String, Value>) -> Result<Attributes, ValueError> {
        let mut attrs = Attributes::new();

        for (name, value) in raw {
            let spec = self.get(&name).ok_or_else(|| ValueError::Unknown { name: name.clone() })?;
            if spec.is_computed() {
                return Err(ValueError::Computed { name });
            }
            let value = value.coerce(&name, spec.kind)?;
            attrs.insert(name, value, Source::Config);
        }

        for spec in self.specs {
            if attrs.contains(spec.name) {
                continue;
            }
            if let Some(default) = spec.default_value() {
                attrs.set_default(spec.name, default);
            } else if spec.required {
                return Err(ValueError::Missing {
                    name: spec.name.to_string(),
                });
            }
        }

        Ok(attrs)
    }

    /// Re-type attributes loaded from the state file
    ///
    /// Unknown names and values that no longer fit are dropped; the next
    /// refresh fills them in again.
    pub fn bind_state(&self, stored: Attributes) -> Attributes {
        let mut attrs = Attributes::new();
        for (name, value) in stored.iter() {
            let Some(spec) = self.get(name) else {
                log::debug!("{}: dropping unknown state attribute {name}", self.kind);
                continue;
            };
            match value.clone().coerce(name, spec.kind) {
                Ok(value) => attrs.insert(name, value, Source::Remote),
                Err(e) => log::debug!("{}: {e}", self.kind),
            }
        }
        attrs
    }

    /// Run every attribute's validation rule
    pub fn validate(&self, attrs: &Attributes) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for spec in self.specs {
            match attrs.get(spec.name) {
                Some(value) => {
                    if let Some(problem) = spec.validate(value) {
                        diagnostics.push(Diagnostic::error(problem).with_attribute(spec.name));
                    }
                    if spec.sensitive && attrs.source(spec.name) == Some(Source::Config) {
                        diagnostics.push(
                            Diagnostic::warning(format!("{} is written inline", spec.name))
                                .with_attribute(spec.name)
                                .with_detail("secrets in the config file end up in version control"),
                        );
                    }
                }
                None if spec.required => {
                    diagnostics.push(
                        Diagnostic::error(format!("missing required attribute {}", spec.name))
                            .with_attribute(spec.name),
                    );
                }
                None => {}
            }
        }
        diagnostics
    }

    /// Merge a fresh remote read into prior state
    ///
    /// The remote copy wins, except that sensitive attributes keep their
    /// prior value since the server masks them.
    pub fn merge_remote(&self, prior: &Attributes, mut remote: Attributes) -> Attributes {
        for spec in self.specs.iter().filter(|s| s.sensitive) {
            if let Some(value) = prior.get(spec.name) {
                let source = prior.source(spec.name).unwrap_or(Source::Remote);
                remote.insert(spec.name, value.clone(), source);
            }
        }
        remote
    }

    /// Narrow raw option blocks in `attrs` to the keys `reference` lists
    ///
    /// Option lists `reference` does not carry are left whole.
    pub fn scope_option_lists(&self, attrs: &mut Attributes, reference: &Attributes) {
        for spec in self.specs.iter().filter(|s| s.role == Role::OptionList) {
            let (Some(managed), Some(stored)) = (reference.blocks(spec.name), attrs.blocks(spec.name)) else {
                continue;
            };
            let keys: Vec<&str> = managed.iter().filter_map(|b| b.get("key")).map(String::as_str).collect();
            let scoped: Vec<Block> = stored
                .iter()
                .filter(|b| b.get("key").is_some_and(|k| keys.contains(&k.as_str())))
                .cloned()
                .collect();
            let source = attrs.source(spec.name).unwrap_or(Source::Remote);
            attrs.insert(spec.name, Value::Blocks(scoped), source);
        }
    }

    /// Render a value for display, masking sensitive attributes
    pub fn display_value(&self, name: &str, value: &Value) -> String {
        match self.get(name) {
            Some(spec) if spec.sensitive => "(sensitive)".to_string(),
            _ => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[AttributeSpec] = &[
        AttributeSpec::string("module_id").required().immutable(),
        AttributeSpec::integer("cache_seconds")
            .option("cache_authentication.seconds")
            .check(Check::Range(0, 86400)),
        AttributeSpec::boolean("debug_enabled").option("debug.debug_enabled").default_bool(false),
        AttributeSpec::list("origins").option("cors.origins").check(Check::Url),
        AttributeSpec::list("scopes").option("scopes_supported").join(ListJoin::Space),
        AttributeSpec::string("password").sensitive(),
        AttributeSpec::integer("pid").computed(),
        AttributeSpec::blocks("options").option_list(),
    ];

    const SCHEMA: Schema = Schema::new("test", SPECS);

    fn raw(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_remote_key_falls_back_to_name() {
        assert_eq!(SPECS[0].remote_key(), "module_id");
        assert_eq!(SPECS[1].remote_key(), "cache_authentication.seconds");
    }

    #[test]
    fn test_bind_fills_defaults() {
        let attrs = SCHEMA.bind(raw(&[("module_id", "smart".into())])).unwrap();
        assert_eq!(attrs.bool("debug_enabled"), Some(false));
        assert_eq!(attrs.source("debug_enabled"), Some(Source::Default));
        assert_eq!(attrs.source("module_id"), Some(Source::Config));
        assert!(!attrs.contains("cache_seconds"));
    }

    #[test]
    fn test_bind_rejects_unknown() {
        let err = SCHEMA
            .bind(raw(&[("module_id", "m".into()), ("colour", "red".into())]))
            .unwrap_err();
        assert_eq!(err, ValueError::Unknown { name: "colour".into() });
    }

    #[test]
    fn test_bind_rejects_type_mismatch() {
        let err = SCHEMA
            .bind(raw(&[("module_id", "m".into()), ("cache_seconds", "soon".into())]))
            .unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { .. }));
    }

    #[test]
    fn test_bind_requires_and_rejects_computed() {
        assert!(matches!(SCHEMA.bind(BTreeMap::new()), Err(ValueError::Missing { .. })));
        let err = SCHEMA
            .bind(raw(&[("module_id", "m".into()), ("pid", Value::Int(3))]))
            .unwrap_err();
        assert!(matches!(err, ValueError::Computed { .. }));
    }

    #[test]
    fn test_validate_rules() {
        let attrs = SCHEMA
            .bind(raw(&[
                ("module_id", "m".into()),
                ("cache_seconds", Value::Int(-1)),
                ("origins", Value::List(vec!["ftp://x".into()])),
            ]))
            .unwrap();
        let diags = SCHEMA.validate(&attrs);
        assert_eq!(diags.iter().filter(|d| d.is_error()).count(), 2);
    }

    #[test]
    fn test_validate_rejects_unjoinable_list_items() {
        let ok = SCHEMA
            .bind(raw(&[("module_id", "smart".into()), ("scopes", Value::List(vec!["openid".into(), "fhirUser".into()]))]))
            .unwrap();
        assert!(SCHEMA.validate(&ok).is_empty());

        for item in ["", "launch patient"] {
            let attrs = SCHEMA
                .bind(raw(&[("module_id", "smart".into()), ("scopes", Value::List(vec!["openid".into(), item.into()]))]))
                .unwrap();
            let diags = SCHEMA.validate(&attrs);
            assert_eq!(diags.len(), 1, "{item:?}");
            assert_eq!(diags[0].attribute.as_deref(), Some("scopes"));
        }
    }

    #[test]
    fn test_validate_warns_on_inline_secret() {
        let attrs = SCHEMA
            .bind(raw(&[("module_id", "m".into()), ("password", "hunter2".into())]))
            .unwrap();
        let diags = SCHEMA.validate(&attrs);
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
    }

    #[test]
    fn test_merge_remote_keeps_sensitive() {
        let mut prior = Attributes::new();
        prior.set("password", "hunter2");
        prior.set("module_id", "old");
        let mut remote = Attributes::new();
        remote.set_remote("module_id", "new");
        remote.set_remote("password", "******");

        let merged = SCHEMA.merge_remote(&prior, remote);
        assert_eq!(merged.str("password"), Some("hunter2"));
        assert_eq!(merged.str("module_id"), Some("new"));
    }

    #[test]
    fn test_bind_state_drops_unknown() {
        let mut stored = Attributes::new();
        stored.set_remote("module_id", "m");
        stored.set_remote("retired", "x");
        let attrs = SCHEMA.bind_state(stored);
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_list_default_is_split() {
        let spec = AttributeSpec::list("scopes").join(ListJoin::Space).default_str("openid profile");
        assert_eq!(
            spec.default_value(),
            Some(Value::List(vec!["openid".into(), "profile".into()]))
        );
    }

    fn option_blocks(pairs: &[(&str, &str)]) -> Value {
        Value::Blocks(
            pairs
                .iter()
                .map(|(k, v)| Block::from([("key".to_string(), (*k).to_string()), ("value".to_string(), (*v).to_string())]))
                .collect(),
        )
    }

    #[test]
    fn test_scope_option_lists() {
        let mut remote = Attributes::new();
        remote.set_remote("options", option_blocks(&[("a", "1"), ("b", "2"), ("c", "3")]));

        let untouched = remote.clone();
        let mut same = remote.clone();
        SCHEMA.scope_option_lists(&mut same, &Attributes::new());
        assert_eq!(same, untouched);

        let mut reference = Attributes::new();
        reference.set("options", option_blocks(&[("c", "9"), ("z", "0")]));
        SCHEMA.scope_option_lists(&mut remote, &reference);
        assert_eq!(remote.get("options"), Some(&option_blocks(&[("c", "3")])));
        assert_eq!(remote.source("options"), Some(Source::Remote));
    }

    #[test]
    fn test_display_masks_sensitive() {
        assert_eq!(SCHEMA.display_value("password", &"x".into()), "(sensitive)");
        assert_eq!(SCHEMA.display_value("module_id", &"x".into()), "\"x\"");
    }
}
