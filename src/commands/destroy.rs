//! `destroy` - remove every tracked resource

use super::apply::converge;
use crate::Context;
use crate::engine::Mode;
use anyhow::Result;

/// Destroys run one at a time
const DESTROY_JOBS: usize = 1;

pub fn run(ctx: &Context, target: Option<&str>, yes: bool) -> Result<()> {
    converge(ctx, Mode::Destroy, target, yes, DESTROY_JOBS)
}
