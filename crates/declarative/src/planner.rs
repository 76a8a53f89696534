//! Execution planner - pairs refreshed state with desired attributes

use crate::diff::ResourceDiff;
use crate::resource::SharedReconciler;
use crate::types::Action;
use crate::value::Attributes;

/// One resource's pending change
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Address of the resource (`kind.name`)
    pub address: String,
    pub reconciler: SharedReconciler,
    pub diff: ResourceDiff,
    /// Refreshed state, `None` when the resource does not exist yet
    pub prior: Option<Attributes>,
    /// Desired attributes, `None` when the resource should go away
    pub desired: Option<Attributes>,
}

impl PlannedChange {
    pub fn action(&self) -> Action {
        self.diff.action
    }

    /// Kind of the resource
    pub fn resource_type(&self) -> &'static str {
        self.reconciler.kind()
    }

    /// Human-readable description used in progress output
    pub fn description(&self) -> String {
        let key = self
            .prior
            .as_ref()
            .or(self.desired.as_ref())
            .map(|attrs| self.reconciler.import_id(attrs))
            .unwrap_or_default();
        format!("{} {} ({key})", self.action(), self.address)
    }
}

/// An ordered set of planned changes
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a resource and add it to the plan
    pub fn add(
        &mut self,
        address: impl Into<String>,
        reconciler: SharedReconciler,
        prior: Option<Attributes>,
        desired: Option<Attributes>,
    ) {
        let address = address.into();
        let diff = ResourceDiff::compute(
            address.clone(),
            &reconciler.schema(),
            prior.as_ref(),
            desired.as_ref(),
        );
        self.changes.push(PlannedChange {
            address,
            reconciler,
            diff,
            prior,
            desired,
        });
    }

    /// Filter plan to only include changes matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedChange) -> bool,
    {
        Self {
            changes: self.changes.into_iter().filter(|c| predicate(c)).collect(),
        }
    }

    /// Filter plan to only include changes matching a target pattern
    ///
    /// Target format: "kind" or "kind.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|c| matches_filter(c, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Changes that touch the server
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action().is_change())
    }

    /// Diffs of every planned resource, including no-ops
    pub fn diffs(&self) -> impl Iterator<Item = &ResourceDiff> {
        self.changes.iter().map(|c| &c.diff)
    }

    /// Number of changes that touch the server
    pub fn total_changes(&self) -> usize {
        self.pending().count()
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.changes.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }
}

/// Parse a target string like "kind.name" into (kind, name)
pub fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a change matches the filter criteria
fn matches_filter(change: &PlannedChange, resource_type: Option<&str>, name: Option<&str>) -> bool {
    let kind = change.resource_type();

    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "openid" | "oidc" => kind.starts_with("openid_"),
            "smart" => kind.starts_with("smart_"),
            "modules" => kind == "module_config" || kind.starts_with("smart_"),
            "users" => kind == "user",
            _ => kind == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name {
        let own_name = change
            .address
            .split_once('.')
            .map_or(change.address.as_str(), |(_, n)| n);
        if own_name != n {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Reconciler;
    use crate::schema::{AttributeSpec, Schema};
    use anyhow::Result;
    use std::sync::Arc;

    const SPECS: &[AttributeSpec] = &[AttributeSpec::string("module_id")];

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl Reconciler for Fixed {
        fn kind(&self) -> &'static str {
            self.0
        }
        fn schema(&self) -> Schema {
            Schema::new(self.0, SPECS)
        }
        fn import_id(&self, state: &Attributes) -> String {
            state.str_or_empty("module_id")
        }
        fn create(&self, desired: &Attributes) -> Result<Attributes> {
            Ok(desired.clone())
        }
        fn read(&self, prior: &Attributes) -> Result<Option<Attributes>> {
            Ok(Some(prior.clone()))
        }
        fn update(&self, desired: &Attributes, _prior: &Attributes) -> Result<Attributes> {
            Ok(desired.clone())
        }
        fn destroy(&self, _prior: &Attributes) -> Result<()> {
            Ok(())
        }
        fn import(&self, id: &str) -> Result<Attributes> {
            let mut a = Attributes::new();
            a.set_remote("module_id", id);
            Ok(a)
        }
    }

    fn module(id: &str) -> Attributes {
        let mut a = Attributes::new();
        a.set("module_id", id);
        a
    }

    fn sample_plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        plan.add("smart_inbound_security.in", Arc::new(Fixed("smart_inbound_security")), None, Some(module("in")));
        plan.add("openid_client.web", Arc::new(Fixed("openid_client")), Some(module("web")), Some(module("web")));
        plan.add("user.admin", Arc::new(Fixed("user")), Some(module("admin")), None);
        plan
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("user"), (Some("user".to_string()), None));
        assert_eq!(
            parse_target("user.admin"),
            (Some("user".to_string()), Some("admin".to_string()))
        );
        assert_eq!(parse_target("a.b.c"), (None, Some("a.b.c".to_string())));
    }

    #[test]
    fn test_pending_skips_noop() {
        let plan = sample_plan();
        assert_eq!(plan.total_resources(), 3);
        assert_eq!(plan.total_changes(), 2);
    }

    #[test]
    fn test_filter_by_target() {
        let plan = sample_plan().filter_by_target(Some("user.admin"));
        assert_eq!(plan.total_resources(), 1);

        let plan = sample_plan().filter_by_target(Some("smart"));
        assert_eq!(plan.changes[0].address, "smart_inbound_security.in");

        let plan = sample_plan().filter_by_target(Some("user.adm"));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_description_uses_natural_key() {
        let plan = sample_plan();
        assert_eq!(plan.changes[2].description(), "destroy user.admin (admin)");
    }
}
