//! `apply` - converge the server on the config file

use super::Workspace;
use crate::Context;
use crate::engine::{self, Mode, PromptConfirm, TerminalProgress};
use crate::ui;
use anyhow::{Result, bail};
use declarative::{ExecuteOptions, execute};

pub fn run(ctx: &Context, target: Option<&str>, yes: bool, jobs: usize) -> Result<()> {
    converge(ctx, Mode::Apply, target, yes, jobs)
}

/// Plan, confirm, apply, and save state
///
/// State is saved even when some changes fail, so the resources that did
/// change are not lost.
pub fn converge(ctx: &Context, mode: Mode, target: Option<&str>, yes: bool, jobs: usize) -> Result<()> {
    let mut ws = Workspace::load(ctx, mode == Mode::Apply)?;
    let registry = ws.registry()?;
    let planned = ws.plan(ctx, &registry, mode, target)?;

    for address in &planned.gone {
        if ws.state.remove(address) {
            log::info!("Dropped {address} from state");
        }
    }
    engine::record_unchanged(&mut ws.state, &planned.plan);
    engine::display_plan(&planned.plan);

    if !planned.plan.has_changes() {
        ws.state.save()?;
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: jobs.max(1),
        verbose: ctx.verbose > 0,
    };
    println!();
    let execution = execute(
        planned.plan,
        opts,
        &mut TerminalProgress::new(ctx.quiet),
        &mut PromptConfirm::new(yes),
    )?;

    engine::record_outcomes(&mut ws.state, &registry, &execution.outcomes)?;
    ws.state.save()?;

    let summary = &execution.summary;
    if execution.outcomes.is_empty() {
        return Ok(());
    }
    engine::print_summary(summary);
    if !summary.is_success() {
        bail!("{} resource(s) failed", summary.failed);
    }
    if !ctx.quiet {
        ui::dim(&format!("State saved to {}", ws.state.path().display()));
    }
    Ok(())
}
