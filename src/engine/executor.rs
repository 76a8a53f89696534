//! Terminal side of apply: progress, confirmation, summary, and state upkeep

use crate::progress;
use crate::registry::Registry;
use crate::state::StateFile;
use anyhow::Result;
use colored::Colorize;
use declarative::{
    Action, ApplyResult, ChangeOutcome, ConfirmCallback, ExecuteSummary, ExecutionPlan,
    ProgressCallback,
};
use indicatif::ProgressBar;

/// Progress bar over the resources being applied
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_batch_start(&mut self, count: usize) {
        let bar = if self.quiet {
            progress::hidden()
        } else {
            println!();
            println!("  {} Applying {count} changes...", "→".cyan());
            progress::bar(count as u64, "Applying")
        };
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, address: &str, description: &str) {
        log::info!("{description}");
        if let Some(bar) = &self.bar {
            bar.set_message(address.to_string());
        }
    }

    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult) {
        let Some(bar) = &self.bar else {
            return;
        };
        let symbol = match result {
            ApplyResult::NoChange => "○",
            ApplyResult::Created
            | ApplyResult::Updated
            | ApplyResult::Replaced
            | ApplyResult::Destroyed => "✓",
            ApplyResult::Failed { .. } => "✗",
            ApplyResult::Skipped { .. } => "⊘",
        };
        if let ApplyResult::Failed { error } = result {
            bar.println(format!("  {} {address}: {error}", "✗".red()));
        }
        bar.set_message(format!("{symbol} {address}"));
        bar.inc(1);
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Asks before applying, unless `--yes` was given
pub struct PromptConfirm {
    yes: bool,
}

impl PromptConfirm {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        if !confirmed {
            println!();
            println!("  {} Aborted", "✗".red());
        }
        Ok(confirmed)
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Configuration applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Configuration applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.destroyed > 0 {
        println!("    • {} resources destroyed", summary.destroyed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

/// Store refreshed state of resources the plan leaves alone
pub fn record_unchanged(state: &mut StateFile, plan: &ExecutionPlan) {
    for change in plan.changes.iter().filter(|c| c.action() == Action::NoOp) {
        if let Some(prior) = &change.prior {
            let id = change.reconciler.import_id(prior);
            state.record(&change.address, change.resource_type(), id, prior.clone());
        }
    }
}

/// Store what each applied change left behind
pub fn record_outcomes(
    state: &mut StateFile,
    registry: &Registry,
    outcomes: &[ChangeOutcome],
) -> Result<()> {
    for outcome in outcomes {
        match &outcome.state {
            Some(attrs) => {
                let id = registry.get(outcome.resource_type)?.import_id(attrs);
                state.record(&outcome.address, outcome.resource_type, id, attrs.clone());
            }
            None => {
                if state.remove(&outcome.address) {
                    log::debug!("Removed {} from state", outcome.address);
                }
            }
        }
    }
    Ok(())
}
