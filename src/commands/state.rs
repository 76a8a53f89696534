//! `state` - inspect and edit the state file

use super::Workspace;
use crate::Context;
use crate::cli::StateCommand;
use crate::state::StateFile;
use crate::ui;
use anyhow::{Result, bail};
use colored::Colorize;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    let mut ws = Workspace::load(ctx, false)?;
    match cmd {
        StateCommand::List => {
            list(&ws.state);
            Ok(())
        }
        StateCommand::Rm { address } => {
            remove(&mut ws.state, &address)?;
            ws.state.save()?;
            ui::success(&format!("Removed {address} from state; it is left on the server"));
            Ok(())
        }
    }
}

fn list(state: &StateFile) {
    if state.is_empty() {
        ui::info(&format!("No resources tracked in {}", state.path().display()));
        return;
    }
    for line in lines(state) {
        println!("{line}");
    }
    println!();
    ui::dim(&format!("{} resources in {}", state.len(), state.path().display()));
}

fn lines(state: &StateFile) -> Vec<String> {
    state
        .resources
        .iter()
        .map(|(address, entry)| {
            format!(
                "{:<50} {:<40} {}",
                address,
                entry.id,
                entry.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
            )
        })
        .collect()
}

fn remove(state: &mut StateFile, address: &str) -> Result<()> {
    if !state.remove(address) {
        bail!("{address} is not in state");
    }
    Ok(())
}
