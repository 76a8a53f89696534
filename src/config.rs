//! Declarative config file
//!
//! A TOML file with an optional `[provider]` table and one table per
//! declared resource:
//!
//! ```toml
//! [provider]
//! base_url = "http://localhost:9000"
//!
//! [resource.user.jane]
//! username = "jane"
//! password = "correct-horse-battery"
//! authorities = [{ permission = "ROLE_FHIR_CLIENT_SUPERUSER" }]
//! ```

use crate::settings::ProviderTable;
use anyhow::{Context, Result, bail};
use declarative::Value;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_FILE: &str = "smilecdr.toml";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("resource name regex must compile"));

type RawAttributes = BTreeMap<String, Value>;

/// Parsed config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredConfig {
    #[serde(default)]
    pub provider: ProviderTable,
    /// kind -> name -> attributes
    #[serde(default)]
    resource: BTreeMap<String, BTreeMap<String, RawAttributes>>,
}

/// One declared resource block
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: String,
    pub name: String,
    pub raw: RawAttributes,
}

impl Declaration {
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }
}

/// Per-user config file (`~/.config/smilecdr/config.toml`)
pub fn user_config_file() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("smilecdr").join("config.toml"))
}

/// Pick the config file: explicit path, then the working directory, then
/// the per-user file
pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(shellexpand::tilde(path).as_ref()));
    }

    let local = PathBuf::from(DEFAULT_FILE);
    if local.exists() {
        return Ok(local);
    }

    match user_config_file() {
        Ok(user) if user.exists() => Ok(user),
        _ => Ok(local),
    }
}

impl DesiredConfig {
    /// Load and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded {} resources from {}", config.len(), path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        for (kind, resources) in &config.resource {
            for name in resources.keys() {
                if !NAME_RE.is_match(name) {
                    bail!("resource name {kind}.{name:?} may only use letters, digits, '_' and '-'");
                }
            }
        }
        Ok(config)
    }

    /// Declared resources, ordered by kind then name
    pub fn declarations(&self) -> Vec<Declaration> {
        self.resource
            .iter()
            .flat_map(|(kind, resources)| {
                resources.iter().map(|(name, raw)| Declaration {
                    kind: kind.clone(),
                    name: name.clone(),
                    raw: raw.clone(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resource.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
