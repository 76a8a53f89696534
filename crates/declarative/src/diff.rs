//! Diff computation between refreshed state and desired attributes

use crate::schema::Schema;
use crate::types::Action;
use crate::value::{Attributes, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One attribute that differs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    /// Current value, `None` when absent
    pub from: Option<Value>,
    /// Desired value, `None` when it will be unset
    pub to: Option<Value>,
    pub sensitive: bool,
    /// Changing this attribute forces a replacement
    pub forces_replacement: bool,
}

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Address of the resource (`kind.name`)
    pub address: String,
    /// Kind of the resource
    pub resource_type: String,
    pub action: Action,
    /// Attribute level changes, in schema order
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    /// Compare current (refreshed) state with desired attributes
    ///
    /// `None` on either side means the resource is absent there.
    pub fn compute(
        address: impl Into<String>,
        schema: &Schema,
        current: Option<&Attributes>,
        desired: Option<&Attributes>,
    ) -> Self {
        let changes = match (current, desired) {
            (None, None) => Vec::new(),
            _ => compute_attribute_changes(schema, current, desired),
        };

        let action = match (current, desired) {
            (None, None) => Action::NoOp,
            (None, Some(_)) => Action::Create,
            (Some(_), None) => Action::Destroy,
            (Some(_), Some(_)) if changes.is_empty() => Action::NoOp,
            (Some(_), Some(_)) if changes.iter().any(|c| c.forces_replacement) => Action::Replace,
            (Some(_), Some(_)) => Action::Update,
        };

        Self {
            address: address.into(),
            resource_type: schema.kind().to_string(),
            action,
            changes,
        }
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        self.action == Action::Create
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        self.action == Action::Destroy
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        matches!(self.action, Action::Update | Action::Replace)
    }

    pub fn has_changes(&self) -> bool {
        self.action.is_change()
    }
}

/// Per-attribute differences, skipping server-computed attributes
///
/// An attribute the desired side leaves unset is unmanaged: whatever the
/// server holds for it is not reported as a change. Attributes marked
/// `clears_when_unset` are the exception and diff against absence.
pub fn compute_attribute_changes(
    schema: &Schema,
    current: Option<&Attributes>,
    desired: Option<&Attributes>,
) -> Vec<AttributeChange> {
    let mut changes = Vec::new();

    for spec in schema.specs().iter().filter(|s| !s.is_computed()) {
        let from = current.and_then(|a| a.get(spec.name));
        let to = desired.and_then(|a| a.get(spec.name));
        if desired.is_some() && to.is_none() && !spec.clears_when_unset {
            continue;
        }
        if from == to {
            continue;
        }
        changes.push(AttributeChange {
            name: spec.name.to_string(),
            from: from.cloned(),
            to: to.cloned(),
            sensitive: spec.sensitive,
            forces_replacement: spec.immutable && current.is_some() && desired.is_some(),
        });
    }

    changes
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to update in place
    pub modifications: usize,
    /// Number of resources to destroy and recreate
    pub replacements: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs<'a>(diffs: impl IntoIterator<Item = &'a ResourceDiff>) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                Action::Create => summary.additions += 1,
                Action::Destroy => summary.removals += 1,
                Action::Update => summary.modifications += 1,
                Action::Replace => summary.replacements += 1,
                Action::NoOp => {}
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.replacements
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type<'a>(
    diffs: impl IntoIterator<Item = &'a ResourceDiff>,
) -> HashMap<String, Vec<&'a ResourceDiff>> {
    let mut groups: HashMap<String, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}
