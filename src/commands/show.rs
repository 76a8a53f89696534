//! `show` - look up one resource on the server

use super::Workspace;
use crate::Context;
use crate::registry::Registry;
use crate::ui;
use anyhow::{Context as _, Result};

pub fn run(ctx: &Context, kind: &str, id: &str) -> Result<()> {
    let ws = Workspace::load(ctx, false)?;
    let registry = ws.registry()?;
    let rows = describe(&registry, kind, id)?;

    ui::header(&format!("{kind} {id}"));
    for (name, value) in &rows {
        ui::kv(name, value);
    }
    Ok(())
}

/// Attribute name and display value pairs, in schema order
fn describe(registry: &Registry, kind: &str, id: &str) -> Result<Vec<(String, String)>> {
    let reconciler = registry.get(kind)?;
    let attrs = reconciler
        .import(id)
        .with_context(|| format!("looking up {kind} {id}"))?;
    let schema = reconciler.schema();

    Ok(schema
        .specs()
        .iter()
        .filter_map(|spec| {
            attrs
                .get(spec.name)
                .map(|value| (spec.name.to_string(), schema.display_value(spec.name, value)))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smilecdr::{Client, MockTransport};
    use std::sync::Arc;

    #[test]
    fn test_describe_masks_secrets() {
        let mock = MockTransport::new();
        mock.insert(
            "/openid-connect-clients/Master/smart_auth/growth-chart",
            serde_json::json!({
                "pid": 4,
                "clientId": "growth-chart",
                "clientName": "Growth Chart",
                "clientSecrets": [{"secret": "s3cr3t-value"}]
            }),
        );
        let registry = Registry::new(Client::new(Arc::new(mock)));

        let rows = describe(&registry, "openid_client", "Master/smart_auth/growth-chart").unwrap();
        let value = |name: &str| rows.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone());
        assert_eq!(value("client_name").as_deref(), Some("\"Growth Chart\""));
        assert_eq!(value("client_secrets").as_deref(), Some("(sensitive)"));
        assert!(rows.iter().all(|(_, v)| !v.contains("s3cr3t")));
    }

    #[test]
    fn test_describe_missing() {
        let registry = Registry::new(Client::new(Arc::new(MockTransport::new())));
        assert!(describe(&registry, "user", "Master/local_security/9").is_err());
    }
}
