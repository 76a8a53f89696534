//! Plan and apply engine
//!
//! 1. Planning - bind declarations, refresh tracked state, pair them up
//! 2. Diffing - show what the plan will do
//! 3. Executing - apply through `declarative::execute` and keep state current

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::{display_diagnostics, display_plan};
pub use executor::{PromptConfirm, TerminalProgress, print_summary, record_outcomes, record_unchanged};
pub use planner::{Mode, Planned, plan, validate};
