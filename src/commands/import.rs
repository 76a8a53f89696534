//! `import` - start tracking an existing resource

use super::Workspace;
use crate::Context;
use crate::engine::planner::bind;
use crate::registry::Registry;
use crate::state::StateFile;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use declarative::Attributes;

pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let mut ws = Workspace::load(ctx, false)?;
    let registry = ws.registry()?;
    let declaration = ws.config.declarations().into_iter().find(|d| d.address() == address);
    let declared = match &declaration {
        Some(decl) => bind(decl, &registry.get(&decl.kind)?.schema()).0,
        None => None,
    };
    let key = import_into(&mut ws.state, &registry, address, id, declared.as_ref())?;
    ws.state.save()?;

    ui::success(&format!("Imported {address} ({key})"));
    if declaration.is_none() {
        ui::warn(&format!(
            "{address} is not declared in {}; the next apply will destroy it",
            ws.config_path.display()
        ));
    }
    Ok(())
}

/// Read `id` from the server and record it under `address`
///
/// Raw option lists are narrowed to the keys `declared` manages, so options
/// the config never mentions don't show up as drift. Returns the natural key
/// the resource is tracked by.
fn import_into(
    state: &mut StateFile,
    registry: &Registry,
    address: &str,
    id: &str,
    declared: Option<&Attributes>,
) -> Result<String> {
    let Some((kind, name)) = address.split_once('.') else {
        bail!("address {address:?} must look like kind.name");
    };
    if name.is_empty() || name.contains('.') {
        bail!("address {address:?} must look like kind.name");
    }
    if let Some(existing) = state.get(address) {
        bail!("{address} is already tracked as {}", existing.id);
    }

    let reconciler = registry.get(kind)?;
    let mut attrs = reconciler
        .import(id)
        .with_context(|| format!("importing {kind} {id}"))?;
    if let Some(declared) = declared {
        reconciler.schema().scope_option_lists(&mut attrs, declared);
    }
    let key = reconciler.import_id(&attrs);
    state.record(address, kind, key.clone(), attrs);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesiredConfig;
    use crate::engine::{Mode, plan};
    use smilecdr::{Client, MockTransport};
    use std::sync::Arc;

    fn setup() -> (MockTransport, Registry) {
        let mock = MockTransport::new();
        mock.insert(
            "/module-config/Master/smart_in",
            serde_json::json!({
                "moduleId": "smart_in",
                "moduleType": "SECURITY_IN_SMART",
                "options": [{"key": "cache_authentication.seconds", "value": "120"}]
            }),
        );
        let registry = Registry::new(Client::new(Arc::new(mock.clone())));
        (mock, registry)
    }

    #[test]
    fn test_import_records_state() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        let key = import_into(&mut state, &registry, "smart_inbound_security.smart_in", "Master/smart_in", None).unwrap();
        assert_eq!(key, "Master/smart_in");

        let entry = state.get("smart_inbound_security.smart_in").unwrap();
        assert_eq!(entry.kind, "smart_inbound_security");
        assert_eq!(entry.attributes.int("cache_authentication_seconds"), Some(120));
    }

    #[test]
    fn test_import_scopes_options_to_declaration() {
        let (mock, registry) = setup();
        mock.insert(
            "/module-config/Master/fhir_endpoint",
            serde_json::json!({
                "moduleId": "fhir_endpoint",
                "moduleType": "ENDPOINT_FHIR_REST_R4",
                "options": [{"key": "port", "value": "8000"}, {"key": "threadpool.max", "value": "10"}]
            }),
        );
        let config = DesiredConfig::parse(
            r#"
[resource.module_config.fhir]
module_id = "fhir_endpoint"
module_type = "ENDPOINT_FHIR_REST_R4"
options = [{ key = "port", value = "8000" }]
"#,
        )
        .unwrap();
        let decl = config.declarations().into_iter().next().unwrap();
        let declared = bind(&decl, &registry.get("module_config").unwrap().schema()).0.unwrap();

        let mut state = StateFile::empty("state.json");
        import_into(&mut state, &registry, "module_config.fhir", "Master/fhir_endpoint", Some(&declared)).unwrap();
        let options = state.get("module_config.fhir").unwrap().attributes.blocks("options").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0]["key"], "port");

        let planned = plan(&registry, &config, &state, Mode::Apply, None).unwrap();
        assert!(!planned.plan.has_changes());
    }

    #[test]
    fn test_import_rejects_tracked_address() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        import_into(&mut state, &registry, "smart_inbound_security.smart_in", "Master/smart_in", None).unwrap();
        let err = import_into(&mut state, &registry, "smart_inbound_security.smart_in", "Master/smart_in", None)
            .unwrap_err();
        assert!(err.to_string().contains("already tracked"));
    }

    #[test]
    fn test_import_errors() {
        let (_, registry) = setup();
        let mut state = StateFile::empty("state.json");
        assert!(import_into(&mut state, &registry, "smart_in", "Master/smart_in", None).is_err());
        assert!(import_into(&mut state, &registry, "widget.x", "Master/x", None).is_err());
        assert!(import_into(&mut state, &registry, "smart_inbound_security.other", "Master/other", None).is_err());
        assert!(state.is_empty());
    }
}
