//! Build an execution plan from the config file and the state file
//!
//! Declared resources are bound against their kind's schema, tracked
//! resources are refreshed from the server, and the two are paired up.
//! Tracked resources that are no longer declared are planned for removal.

use crate::config::{Declaration, DesiredConfig};
use crate::registry::{self, Registry};
use crate::state::StateFile;
use anyhow::Result;
use declarative::{
    Attributes, Diagnostic, ExecutionPlan, Schema, SharedReconciler, has_errors, parse_target,
};
use std::collections::BTreeSet;

/// What the plan is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Converge the server on the config file
    Apply,
    /// Remove every tracked resource
    Destroy,
}

/// A plan plus everything found while building it
#[derive(Debug, Default)]
pub struct Planned {
    pub plan: ExecutionPlan,
    pub diagnostics: Vec<Diagnostic>,
    /// Tracked addresses whose resource is gone from the server
    pub gone: Vec<String>,
}

impl Planned {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// Result of refreshing one tracked resource
enum Refreshed {
    Untracked,
    Gone,
    Present(Attributes),
}

/// Whether an address falls under a `kind` or `kind.name` target
pub fn in_target(address: &str, target: Option<&str>) -> bool {
    let Some(target) = target else {
        return true;
    };
    let (kind, name) = parse_target(target);
    let (address_kind, address_name) = address.split_once('.').unwrap_or((address, ""));
    kind.as_deref() == Some(address_kind) && name.as_deref().is_none_or(|n| n == address_name)
}

/// Bind and validate one declaration
///
/// Returns the attributes only when there are no errors.
pub fn bind(decl: &Declaration, schema: &Schema) -> (Option<Attributes>, Vec<Diagnostic>) {
    let address = decl.address();
    match schema.bind(decl.raw.clone()) {
        Ok(attrs) => {
            let diagnostics: Vec<Diagnostic> = schema
                .validate(&attrs)
                .into_iter()
                .map(|d| d.with_address(address.clone()))
                .collect();
            let attrs = (!has_errors(&diagnostics)).then_some(attrs);
            (attrs, diagnostics)
        }
        Err(e) => (None, vec![Diagnostic::error(e.to_string()).with_address(address)]),
    }
}

/// Check every declaration without contacting the server
pub fn validate(config: &DesiredConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for decl in config.declarations() {
        match registry::schema_for(&decl.kind) {
            Ok(schema) => diagnostics.extend(bind(&decl, &schema).1),
            Err(e) => diagnostics.push(Diagnostic::error(e.to_string()).with_address(decl.address())),
        }
    }
    diagnostics
}

/// Build the plan for `mode`, limited to `target`
pub fn plan(
    registry: &Registry,
    config: &DesiredConfig,
    state: &StateFile,
    mode: Mode,
    target: Option<&str>,
) -> Result<Planned> {
    let mut planned = Planned::default();
    let declarations = config.declarations();
    let declared: BTreeSet<String> = declarations.iter().map(Declaration::address).collect();

    if mode == Mode::Apply {
        for decl in &declarations {
            let address = decl.address();
            if !in_target(&address, target) {
                continue;
            }
            let reconciler = match registry.get(&decl.kind) {
                Ok(r) => r,
                Err(e) => {
                    planned
                        .diagnostics
                        .push(Diagnostic::error(e.to_string()).with_address(address));
                    continue;
                }
            };

            let (desired, diagnostics) = bind(decl, &reconciler.schema());
            planned.diagnostics.extend(diagnostics);
            let Some(desired) = desired else {
                continue;
            };

            match refresh(&reconciler, &address, state, &mut planned) {
                Some(Refreshed::Present(prior)) => {
                    planned.plan.add(address, reconciler, Some(prior), Some(desired));
                }
                Some(Refreshed::Untracked | Refreshed::Gone) => {
                    planned.plan.add(address, reconciler, None, Some(desired));
                }
                None => {}
            }
        }
    }

    for (address, entry) in &state.resources {
        let undeclared = mode == Mode::Destroy || !declared.contains(address);
        if !undeclared || !in_target(address, target) {
            continue;
        }
        let reconciler = match registry.get(&entry.kind) {
            Ok(r) => r,
            Err(e) => {
                planned
                    .diagnostics
                    .push(Diagnostic::error(e.to_string()).with_address(address.clone()));
                continue;
            }
        };
        if let Some(Refreshed::Present(prior)) = refresh(&reconciler, address, state, &mut planned)
        {
            planned.plan.add(address.clone(), reconciler, Some(prior), None);
        }
    }

    log::debug!(
        "Planned {} resources, {} changes",
        planned.plan.total_resources(),
        planned.plan.total_changes()
    );
    Ok(planned)
}

/// Read a tracked resource back from the server
///
/// `None` means the read failed; the error is recorded as a diagnostic.
fn refresh(
    reconciler: &SharedReconciler,
    address: &str,
    state: &StateFile,
    planned: &mut Planned,
) -> Option<Refreshed> {
    let Some(entry) = state.get(address) else {
        return Some(Refreshed::Untracked);
    };

    let stored = reconciler.schema().bind_state(entry.attributes.clone());
    log::debug!("Refreshing {address} ({})", entry.id);
    match reconciler.read(&stored) {
        Ok(Some(current)) => Some(Refreshed::Present(current)),
        Ok(None) => {
            planned.diagnostics.push(
                Diagnostic::warning(format!("{} no longer exists on the server", entry.id))
                    .with_address(address)
                    .with_detail("it will be dropped from state"),
            );
            planned.gone.push(address.to_string());
            Some(Refreshed::Gone)
        }
        Err(e) => {
            planned.diagnostics.push(
                Diagnostic::error(format!("could not read {}", entry.id))
                    .with_address(address)
                    .with_detail(format!("{e:#}")),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Action;
    use smilecdr::{Client, MockTransport};
    use std::sync::Arc;

    const CONFIG: &str = r#"
[resource.smart_inbound_security.smart_in]
module_id = "smart_in"

[resource.user.jane]
username = "jane"
password = "correct-horse"
"#;

    fn setup() -> (MockTransport, Registry) {
        let mock = MockTransport::new();
        let registry = Registry::new(Client::new(Arc::new(mock.clone())));
        (mock, registry)
    }

    fn config(content: &str) -> DesiredConfig {
        DesiredConfig::parse(content).unwrap()
    }

    /// Create `address` directly and track it in `state`
    fn track(registry: &Registry, state: &mut StateFile, address: &str, raw: &str) {
        let (kind, _) = address.split_once('.').unwrap();
        let reconciler = registry.get(kind).unwrap();
        let decl = config(raw).declarations().remove(0);
        let desired = bind(&decl, &reconciler.schema()).0.unwrap();
        let attrs = reconciler.create(&desired).unwrap();
        state.record(address, kind, reconciler.import_id(&attrs), attrs);
    }

    fn actions(planned: &Planned) -> Vec<(String, Action)> {
        planned
            .plan
            .changes
            .iter()
            .map(|c| (c.address.clone(), c.action()))
            .collect()
    }

    #[test]
    fn test_in_target() {
        assert!(in_target("user.jane", None));
        assert!(in_target("user.jane", Some("user")));
        assert!(in_target("user.jane", Some("user.jane")));
        assert!(!in_target("user.jane", Some("user.john")));
        assert!(!in_target("user.jane", Some("openid_client")));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = config(
            r#"
[resource.user.short]
username = "short"
password = "abc"

[resource.widget.x]
name = "x"

[resource.smart_inbound_security.bad]
module_id = "bad"
colour = "blue"
"#,
        );
        let diagnostics = validate(&config);
        let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|d| d.address.as_deref() == Some("widget.x")));
        assert!(errors.iter().any(|d| d.summary.contains("colour")));
        assert!(diagnostics.iter().any(|d| !d.is_error()));
    }

    #[test]
    fn test_plan_creates_untracked_resources() {
        let (_, registry) = setup();
        let state = StateFile::empty("state.json");
        let planned = plan(&registry, &config(CONFIG), &state, Mode::Apply, None).unwrap();
        assert!(!planned.has_errors());
        assert_eq!(
            actions(&planned),
            vec![
                ("smart_inbound_security.smart_in".to_string(), Action::Create),
                ("user.jane".to_string(), Action::Create),
            ]
        );
    }

    #[test]
    fn test_plan_respects_target() {
        let (_, registry) = setup();
        let state = StateFile::empty("state.json");
        let planned = plan(&registry, &config(CONFIG), &state, Mode::Apply, Some("user")).unwrap();
        assert_eq!(actions(&planned), vec![("user.jane".to_string(), Action::Create)]);
    }

    #[test]
    fn test_tracked_and_unchanged_is_noop() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        track(
            &registry,
            &mut state,
            "smart_inbound_security.smart_in",
            "[resource.smart_inbound_security.smart_in]\nmodule_id = \"smart_in\"",
        );

        let planned = plan(&registry, &config(CONFIG), &state, Mode::Apply, None).unwrap();
        let planned_actions = actions(&planned);
        assert_eq!(planned_actions[0].1, Action::NoOp);
        assert_eq!(planned.plan.total_changes(), 1);
    }

    #[test]
    fn test_undeclared_resource_is_destroyed() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        track(
            &registry,
            &mut state,
            "smart_inbound_security.old",
            "[resource.smart_inbound_security.old]\nmodule_id = \"old\"",
        );

        let planned = plan(&registry, &config(CONFIG), &state, Mode::Apply, None).unwrap();
        assert!(
            actions(&planned).contains(&("smart_inbound_security.old".to_string(), Action::Destroy))
        );
    }

    #[test]
    fn test_gone_resource_is_recreated_with_warning() {
        let (mock, registry) = setup();
        let mut state = StateFile::empty("state.json");
        track(
            &registry,
            &mut state,
            "smart_inbound_security.smart_in",
            "[resource.smart_inbound_security.smart_in]\nmodule_id = \"smart_in\"",
        );
        mock.remove("/module-config/Master/smart_in");

        let planned = plan(&registry, &config(CONFIG), &state, Mode::Apply, None).unwrap();
        assert_eq!(planned.gone, vec!["smart_inbound_security.smart_in".to_string()]);
        assert!(planned.diagnostics.iter().any(|d| !d.is_error()));
        assert_eq!(actions(&planned)[0].1, Action::Create);
    }

    #[test]
    fn test_destroy_mode_covers_tracked_only() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        track(
            &registry,
            &mut state,
            "user.jane",
            "[resource.user.jane]\nusername = \"jane\"\npassword = \"correct-horse\"",
        );

        let planned = plan(&registry, &config(CONFIG), &state, Mode::Destroy, None).unwrap();
        assert_eq!(actions(&planned), vec![("user.jane".to_string(), Action::Destroy)]);
    }

    #[test]
    fn test_immutable_change_plans_replacement() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        track(
            &registry,
            &mut state,
            "user.jane",
            "[resource.user.jane]\nusername = \"jane\"\npassword = \"correct-horse\"",
        );

        let renamed = "[resource.user.jane]\nusername = \"janet\"\npassword = \"correct-horse\"";
        let planned = plan(&registry, &config(renamed), &state, Mode::Apply, None).unwrap();
        assert_eq!(actions(&planned), vec![("user.jane".to_string(), Action::Replace)]);
    }

    #[test]
    fn test_invalid_declaration_is_not_planned() {
        let (_, registry) = setup();
        let state = StateFile::empty("state.json");
        let broken = "[resource.user.jane]\nusername = \"jane\"\npassword = 12";
        let planned = plan(&registry, &config(broken), &state, Mode::Apply, None).unwrap();
        assert!(planned.has_errors());
        assert!(planned.plan.is_empty());
    }
}
