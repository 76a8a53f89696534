//! `validate` - check the config file offline

use super::Workspace;
use crate::Context;
use crate::engine;
use crate::ui;
use anyhow::{Result, bail};

pub fn run(ctx: &Context) -> Result<()> {
    let ws = Workspace::load(ctx, true)?;
    if ws.config.is_empty() {
        ui::warn(&format!("{} declares no resources", ws.config_path.display()));
    }
    let diagnostics = engine::validate(&ws.config);
    engine::display_diagnostics(&diagnostics);

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        bail!("{} has {errors} error(s)", ws.config_path.display());
    }

    if !ctx.quiet {
        ui::success(&format!(
            "{} is valid ({} resources)",
            ws.config_path.display(),
            ws.config.len()
        ));
    }
    Ok(())
}
