//! Kind name to reconciler lookup

use crate::resource::{
    IdentityProviderReconciler, OpenIdClientReconciler, UserReconciler, identity_provider,
    module_config, openid_client, smart_inbound, smart_outbound, user,
};
use anyhow::{Result, bail};
use declarative::{Schema, SharedReconciler};
use smilecdr::Client;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Schemas of every supported kind; usable without a connection
pub const SCHEMAS: &[Schema] = &[
    module_config::SCHEMA,
    openid_client::SCHEMA,
    identity_provider::SCHEMA,
    smart_inbound::SCHEMA,
    smart_outbound::SCHEMA,
    user::SCHEMA,
];

/// Look up a kind's schema
pub fn schema_for(kind: &str) -> Result<Schema> {
    match SCHEMAS.iter().find(|s| s.kind() == kind) {
        Some(schema) => Ok(*schema),
        None => bail!("unknown resource kind {kind:?} (known: {})", known_kinds()),
    }
}

fn known_kinds() -> String {
    SCHEMAS.iter().map(Schema::kind).collect::<Vec<_>>().join(", ")
}

/// Reconcilers for every kind, sharing one client
#[derive(Debug, Clone)]
pub struct Registry {
    reconcilers: BTreeMap<&'static str, SharedReconciler>,
}

impl Registry {
    pub fn new(client: Client) -> Self {
        let all: [SharedReconciler; 6] = [
            Arc::new(IdentityProviderReconciler::new(client.clone())),
            Arc::new(module_config::reconciler(client.clone())),
            Arc::new(OpenIdClientReconciler::new(client.clone())),
            Arc::new(smart_inbound::reconciler(client.clone())),
            Arc::new(smart_outbound::reconciler(client.clone())),
            Arc::new(UserReconciler::new(client)),
        ];
        Self {
            reconcilers: all.into_iter().map(|r| (r.kind(), r)).collect(),
        }
    }

    pub fn get(&self, kind: &str) -> Result<SharedReconciler> {
        match self.reconcilers.get(kind) {
            Some(reconciler) => Ok(Arc::clone(reconciler)),
            None => bail!("unknown resource kind {kind:?} (known: {})", known_kinds()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smilecdr::MockTransport;

    fn registry() -> Registry {
        Registry::new(Client::new(Arc::new(MockTransport::new())))
    }

    #[test]
    fn test_every_schema_has_a_reconciler() {
        let registry = registry();
        assert_eq!(registry.reconcilers.len(), SCHEMAS.len());
        for schema in SCHEMAS {
            assert_eq!(registry.get(schema.kind()).unwrap().schema().kind(), schema.kind());
        }
    }

    #[test]
    fn test_unknown_kind_lists_known_ones() {
        let err = registry().get("smart_thing").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("smart_thing"));
        assert!(message.contains("openid_client"));
        assert!(schema_for("nope").is_err());
        assert_eq!(schema_for("user").unwrap().kind(), "user");
    }
}
