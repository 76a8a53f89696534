//! `plan` - show what apply would do

use super::Workspace;
use crate::Context;
use crate::engine::{self, Mode};
use anyhow::Result;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let ws = Workspace::load(ctx, true)?;
    let registry = ws.registry()?;
    let planned = ws.plan(ctx, &registry, Mode::Apply, target)?;

    engine::display_plan(&planned.plan);
    if !planned.gone.is_empty() {
        println!();
        println!(
            "  {} resources will be dropped from state on the next apply",
            planned.gone.len()
        );
    }
    Ok(())
}
