//! Execution engine - applies planned changes with bounded parallelism

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::planner::{ExecutionPlan, PlannedChange};
use crate::types::{Action, ApplyResult, ExecuteOptions, ExecuteSummary};
use crate::value::Attributes;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// What happened to one resource, and the state to record for it
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub address: String,
    pub resource_type: &'static str,
    pub result: ApplyResult,
    /// State to keep; `None` removes the resource from state
    pub state: Option<Attributes>,
}

/// Outcome of running a plan
#[derive(Debug, Default)]
pub struct Execution {
    pub summary: ExecuteSummary,
    /// Outcomes in plan order
    pub outcomes: Vec<ChangeOutcome>,
}

/// Execute a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results plus the state each resource ended in
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<Execution>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let pending: Vec<PlannedChange> = plan
        .changes
        .into_iter()
        .filter(|c| c.action().is_change())
        .collect();

    if pending.is_empty() {
        return Ok(Execution::default());
    }

    // Confirm before proceeding (unless dry_run)
    if !opts.dry_run && !confirm.confirm("Apply changes?")? {
        return Ok(Execution {
            summary: ExecuteSummary {
                skipped: pending.len(),
                ..Default::default()
            },
            outcomes: Vec::new(),
        });
    }

    if opts.dry_run {
        return Ok(Execution::default());
    }

    let sequential = opts.jobs <= 1
        || pending.len() == 1
        || pending.iter().any(|c| !c.reconciler.can_parallelize());

    progress.on_batch_start(pending.len());
    let outcomes = if sequential {
        execute_sequential(&pending, progress)
    } else {
        execute_parallel(&pending, opts.jobs, progress)?
    };
    progress.on_batch_complete();

    let mut summary = ExecuteSummary::default();
    for outcome in &outcomes {
        summary.add_result(&outcome.result);
    }

    Ok(Execution { summary, outcomes })
}

fn execute_sequential<P: ProgressCallback>(
    changes: &[PlannedChange],
    progress: &mut P,
) -> Vec<ChangeOutcome> {
    let mut outcomes = Vec::with_capacity(changes.len());
    for change in changes {
        progress.on_resource_start(&change.address, &change.description());
        let outcome = apply_change(change);
        progress.on_resource_complete(&outcome.address, &outcome.result);
        outcomes.push(outcome);
    }
    outcomes
}

/// Execute changes in parallel using rayon
fn execute_parallel<P: ProgressCallback>(
    changes: &[PlannedChange],
    jobs: usize,
    progress: &mut P,
) -> Result<Vec<ChangeOutcome>> {
    // The progress callback is not shared across threads; results are
    // reported once the pool drains.
    let results: Arc<Mutex<Vec<(usize, ChangeOutcome)>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        changes.par_iter().enumerate().for_each(|(index, change)| {
            let outcome = apply_change(change);
            push_outcome(&results, index, outcome);
        });
    });

    let mut collected = into_outcomes(results)?;
    collected.sort_by_key(|(index, _)| *index);

    for (_, outcome) in &collected {
        progress.on_resource_complete(&outcome.address, &outcome.result);
    }

    Ok(collected.into_iter().map(|(_, o)| o).collect())
}

fn push_outcome(results: &Arc<Mutex<Vec<(usize, ChangeOutcome)>>>, index: usize, outcome: ChangeOutcome) {
    match results.lock() {
        Ok(mut locked) => locked.push((index, outcome)),
        Err(poisoned) => poisoned.into_inner().push((index, outcome)),
    }
}

fn into_outcomes(
    results: Arc<Mutex<Vec<(usize, ChangeOutcome)>>>,
) -> Result<Vec<(usize, ChangeOutcome)>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Apply a single change through its reconciler
fn apply_change(change: &PlannedChange) -> ChangeOutcome {
    let reconciler = change.reconciler.as_ref();
    let prior = change.prior.as_ref();
    let desired = change.desired.as_ref();

    log::debug!("{} {}", change.action(), change.address);

    let applied: Result<(ApplyResult, Option<Attributes>)> = match (change.action(), prior, desired) {
        (Action::NoOp, _, _) => Ok((ApplyResult::NoChange, change.prior.clone())),
        (Action::Create, _, Some(desired)) => reconciler
            .create(desired)
            .map(|state| (ApplyResult::Created, Some(state))),
        (Action::Update, Some(prior), Some(desired)) => reconciler
            .update(desired, prior)
            .map(|state| (ApplyResult::Updated, Some(state))),
        (Action::Replace, Some(prior), Some(desired)) => match reconciler.destroy(prior) {
            Ok(()) => {
                return match reconciler.create(desired) {
                    Ok(state) => outcome(change, ApplyResult::Replaced, Some(state)),
                    Err(e) => outcome(change, failed(&e), None),
                };
            }
            Err(e) => Err(e),
        },
        (Action::Destroy, Some(prior), _) => reconciler
            .destroy(prior)
            .map(|()| (ApplyResult::Destroyed, None)),
        (action, _, _) => Err(anyhow::anyhow!(
            "{action} planned for {} without the state it needs",
            change.address
        )),
    };

    match applied {
        Ok((result, state)) => outcome(change, result, state),
        Err(e) => outcome(change, failed(&e), change.prior.clone()),
    }
}

fn failed(e: &anyhow::Error) -> ApplyResult {
    ApplyResult::Failed {
        error: format!("{e:#}"),
    }
}

fn outcome(change: &PlannedChange, result: ApplyResult, state: Option<Attributes>) -> ChangeOutcome {
    ChangeOutcome {
        address: change.address.clone(),
        resource_type: change.reconciler.kind(),
        result,
        state,
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<Execution> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}
