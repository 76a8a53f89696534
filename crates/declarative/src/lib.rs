//! # Declarative
//!
//! A framework for reconciling remote resources against declared state.
//!
//! This crate provides the core abstractions for describing resources as
//! typed attribute tables, diffing what the server holds against what was
//! declared, and converging the two through per-kind reconcilers.
//!
//! ## Core Concepts
//!
//! - **Schema**: a static table of [`AttributeSpec`] per resource kind
//! - **Attributes**: typed values that remember whether they were configured,
//!   defaulted, or read back from the server
//! - **Reconciler**: create/read/update/destroy/import for one kind
//! - **ExecutionPlan**: diffed changes, one per resource address
//! - **Executor**: applies the plan with bounded parallelism
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecutionPlan, ExecuteOptions, execute_simple};
//!
//! let desired = schema.bind(raw_table)?;
//! let mut plan = ExecutionPlan::new();
//! plan.add("user.admin", reconciler.clone(), None, Some(desired));
//!
//! let execution = execute_simple(plan, ExecuteOptions::default())?;
//! for outcome in execution.outcomes {
//!     state.record(&outcome.address, outcome.state);
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`Reconciler`]: Talks to the server for one resource kind
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks or HTTP clients.

pub mod context;
pub mod diagnostics;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod schema;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use diagnostics::{Diagnostic, Severity, has_errors};
pub use diff::{AttributeChange, DiffSummary, ResourceDiff, group_by_type};
pub use executor::{ChangeOutcome, Execution, execute, execute_simple};
pub use planner::{ExecutionPlan, PlannedChange, parse_target};
pub use resource::{Reconciler, SharedReconciler};
pub use schema::{AttributeSpec, Check, DefaultValue, Role, Schema};
pub use types::{Action, ApplyResult, ExecuteOptions, ExecuteSummary};
pub use value::{Attributes, Block, ListJoin, Source, Value, ValueError, ValueType};
