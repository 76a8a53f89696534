//! Command implementations
//!
//! Every command works from a [`Workspace`]: the config file, the state
//! file next to it, and the resolved connection settings.

pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod show;
pub mod state;
pub mod validate;

use crate::Context;
use crate::config::{self, DesiredConfig};
use crate::engine::{self, Mode, Planned};
use crate::progress;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::state::StateFile;
use anyhow::{Result, bail};
use std::path::PathBuf;

/// Config, state, and settings for one invocation
pub struct Workspace {
    pub config_path: PathBuf,
    pub config: DesiredConfig,
    pub state: StateFile,
    pub settings: Settings,
}

impl Workspace {
    /// Load everything a command needs
    ///
    /// With `require_config` unset a missing config file reads as empty, so
    /// state and lookup commands work without one.
    pub fn load(ctx: &Context, require_config: bool) -> Result<Self> {
        let config_path = config::resolve_path(ctx.config.as_deref())?;
        let config = if require_config || config_path.exists() {
            DesiredConfig::load(&config_path)?
        } else {
            log::debug!("No config file at {}", config_path.display());
            DesiredConfig::default()
        };

        let state_path = StateFile::path_for(&config_path, ctx.state.as_deref());
        let state = StateFile::load(&state_path)?;
        let settings = Settings::resolve(&ctx.overrides, &config.provider, |k| std::env::var(k).ok())?;

        Ok(Self {
            config_path,
            config,
            state,
            settings,
        })
    }

    /// Connect and build the reconcilers
    pub fn registry(&self) -> Result<Registry> {
        Ok(Registry::new(self.settings.connect()?))
    }

    /// Refresh state and build a plan, failing on any error diagnostic
    pub fn plan(&self, ctx: &Context, registry: &Registry, mode: Mode, target: Option<&str>) -> Result<Planned> {
        let spinner = if ctx.quiet {
            progress::hidden()
        } else {
            progress::spinner(&format!("Refreshing state from {}", self.settings.base_url))
        };
        let planned = engine::plan(registry, &self.config, &self.state, mode, target);
        spinner.finish_and_clear();
        let planned = planned?;

        engine::display_diagnostics(&planned.diagnostics);
        if planned.has_errors() {
            let errors = planned.diagnostics.iter().filter(|d| d.is_error()).count();
            bail!("planning failed with {errors} error(s)");
        }
        Ok(planned)
    }
}
