//! Connection settings for the admin API
//!
//! Each setting is taken from the first place that has it: command-line
//! flag, environment variable, the `[provider]` table of the config file,
//! then the built-in default.

use anyhow::{Result, bail};
use serde::Deserialize;
use smilecdr::{Client, DEFAULT_BASE_URL, normalize_base_url};

pub const ENV_BASE_URL: &str = "SMILECDR_BASE_URL";
pub const ENV_USERNAME: &str = "SMILECDR_USERNAME";
pub const ENV_PASSWORD: &str = "SMILECDR_PASSWORD";

/// The `[provider]` table of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderTable {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Resolved connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "(sensitive)"))
            .finish()
    }
}

impl Settings {
    /// Resolve settings from every source
    ///
    /// `env` looks up an environment variable; pass `|k| std::env::var(k).ok()`
    /// outside tests.
    pub fn resolve<F>(cli: &Overrides, file: &ProviderTable, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |flag: &Option<String>, var: &str, table: &Option<String>| {
            flag.clone()
                .or_else(|| env(var).filter(|v| !v.is_empty()))
                .or_else(|| table.clone())
        };

        let base_url = pick(&cli.base_url, ENV_BASE_URL, &file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = normalize_base_url(&base_url)?;

        Ok(Self {
            base_url,
            username: pick(&cli.username, ENV_USERNAME, &file.username),
            password: pick(&cli.password, ENV_PASSWORD, &file.password),
        })
    }

    /// Build an admin API client, requiring credentials
    pub fn connect(&self) -> Result<Client> {
        let Some(username) = self.username.as_deref() else {
            bail!("username is not set (use --username, {ENV_USERNAME}, or [provider].username)");
        };
        let Some(password) = self.password.as_deref() else {
            bail!("password is not set (use --password, {ENV_PASSWORD}, or [provider].password)");
        };
        log::debug!("Connecting to {} as {username}", self.base_url);
        Ok(Client::http(&self.base_url, username, password)?)
    }
}
