//! SMART inbound security module (`SECURITY_IN_SMART`)

use super::module::{ModuleReconciler, ModuleType};
use declarative::{AttributeSpec, Check, ListJoin, Schema};
use smilecdr::Client;

pub const KIND: &str = "smart_inbound_security";
pub const MODULE_TYPE: &str = "SECURITY_IN_SMART";

const SPECS: &[AttributeSpec] = &[
    AttributeSpec::string("node_id").default_str("Master").immutable(),
    AttributeSpec::string("module_id")
        .required()
        .immutable()
        .check(Check::NoWhitespace),
    AttributeSpec::boolean("enforce_approved_scopes_to_restrict_permissions")
        .option("enforce_approved_scopes_to_restrict_permissions")
        .default_bool(true),
    AttributeSpec::string("trust_intra_cluster_tokens_modules").option("trust_intra_cluster_tokens.modules"),
    AttributeSpec::integer("cache_authentication_seconds")
        .option("cache_authentication.seconds")
        .default_int(300),
    AttributeSpec::boolean("key_validation_prevent_token_key_reuse")
        .option("key_validation.prevent_token_key_reuse")
        .default_bool(false),
    AttributeSpec::boolean("key_validation_require_key_expiry")
        .option("key_validation.require_key_expiry")
        .default_bool(false),
    AttributeSpec::list("smart_configuration_scopes_supported")
        .option("smart_configuration.scopes_supported")
        .join(ListJoin::Space)
        .default_str("openid profile email"),
    AttributeSpec::string("token_endpoint").option("token_endpoint").check(Check::Url),
    AttributeSpec::string("authorization_endpoint")
        .option("authorization_endpoint")
        .check(Check::Url),
    AttributeSpec::string("management_endpoint").option("management_endpoint").check(Check::Url),
    AttributeSpec::string("introspection_endpoint")
        .option("introspection_endpoint")
        .check(Check::Url),
    AttributeSpec::string("revocation_endpoint").option("revocation_endpoint").check(Check::Url),
    AttributeSpec::integer("introspection_client_jwks_cache_mins")
        .option("introspection_client.jwks_cache.mins")
        .default_int(60),
    AttributeSpec::string("introspection_client_truststore_file").option("introspection_client.truststore.file"),
    AttributeSpec::string("callback_script_text").option("callback_script.text"),
    AttributeSpec::string("tfa_totp_issuer_name").option("tfa.totp.issuer_name"),
    AttributeSpec::integer("tfa_totp_lock_after_failed_attempts").option("tfa.totp.lock_after_failed_attempts"),
    AttributeSpec::string("seed_servers_file").option("seed_servers.file"),
    AttributeSpec::boolean("debug_enabled").option("debug.debug_enabled").default_bool(false),
    AttributeSpec::boolean("debug_secure").option("debug.secure").default_bool(false),
    AttributeSpec::boolean("debug_suspend").option("debug.suspend").default_bool(false),
    AttributeSpec::string("debug_host_address").option("debug.host_address"),
    AttributeSpec::integer("debug_port")
        .option("debug.port")
        .check(Check::Range(1, 65535)),
    AttributeSpec::string("debug_path").option("debug.path"),
    AttributeSpec::blocks("dependencies").dependency_list(),
];

pub const SCHEMA: Schema = Schema::new(KIND, SPECS);

pub fn reconciler(client: Client) -> ModuleReconciler {
    ModuleReconciler::new(SCHEMA, ModuleType::Fixed(MODULE_TYPE), client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Reconciler, Value};
    use smilecdr::{Method, MockTransport};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn setup() -> (MockTransport, ModuleReconciler) {
        let mock = MockTransport::new();
        (mock.clone(), reconciler(Client::new(Arc::new(mock))))
    }

    fn desired(pairs: &[(&str, Value)]) -> declarative::Attributes {
        let raw: BTreeMap<String, Value> = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
        SCHEMA.bind(raw).unwrap()
    }

    #[test]
    fn test_scopes_default_is_split_on_spaces() {
        let attrs = desired(&[("module_id", "smart_in".into())]);
        assert_eq!(
            attrs.list("smart_configuration_scopes_supported"),
            Some(&["openid".to_string(), "profile".to_string(), "email".to_string()][..])
        );
    }

    #[test]
    fn test_create_sends_typed_options() {
        let (mock, reconciler) = setup();
        let attrs = desired(&[("module_id", "smart_in".into()), ("debug_port", Value::Int(8000))]);

        let state = reconciler.create(&attrs).unwrap();
        for (name, value) in attrs.iter() {
            assert_eq!(state.get(name), Some(value), "{name}");
        }
        assert_eq!(state.blocks("dependencies"), Some(&[][..]));

        let stored = mock.entity("/module-config/Master/smart_in").unwrap();
        assert_eq!(stored["moduleType"], "SECURITY_IN_SMART");
        let options = stored["options"].as_array().unwrap();
        assert_eq!(options[0]["key"], "enforce_approved_scopes_to_restrict_permissions");
        assert!(options
            .iter()
            .any(|o| o["key"] == "smart_configuration.scopes_supported" && o["value"] == "openid profile email"));
        assert!(options.iter().any(|o| o["key"] == "debug.port" && o["value"] == "8000"));
    }

    #[test]
    fn test_second_create_conflicts() {
        let (_, reconciler) = setup();
        let attrs = desired(&[("module_id", "smart_in".into())]);
        reconciler.create(&attrs).unwrap();
        let err = reconciler.create(&attrs).unwrap_err();
        assert!(format!("{err:#}").contains("409"));
    }

    #[test]
    fn test_read_gone_is_none() {
        let (mock, reconciler) = setup();
        let attrs = desired(&[("module_id", "smart_in".into())]);
        let state = reconciler.create(&attrs).unwrap();
        mock.remove("/module-config/Master/smart_in");
        assert!(reconciler.read(&state).unwrap().is_none());
    }

    #[test]
    fn test_update_then_destroy_deletes() {
        let (mock, reconciler) = setup();
        let attrs = desired(&[("module_id", "smart_in".into())]);
        let state = reconciler.create(&attrs).unwrap();

        let changed = desired(&[("module_id", "smart_in".into()), ("debug_enabled", true.into())]);
        let state = reconciler.update(&changed, &state).unwrap();
        assert_eq!(state.bool("debug_enabled"), Some(true));

        reconciler.destroy(&state).unwrap();
        assert_eq!(mock.calls_with(Method::Delete).len(), 1);
        assert_eq!(mock.calls_with(Method::Delete)[0].path, "/module-config/Master/smart_in/archive");
        assert!(mock.entity("/module-config/Master/smart_in").is_none());
    }

    #[test]
    fn test_import_reads_without_defaults() {
        let (mock, reconciler) = setup();
        mock.insert(
            "/module-config/Master/smart_in",
            serde_json::json!({
                "moduleId": "smart_in",
                "moduleType": "SECURITY_IN_SMART",
                "options": [{"key": "cache_authentication.seconds", "value": "120"}]
            }),
        );

        let state = reconciler.import("Master/smart_in").unwrap();
        assert_eq!(state.int("cache_authentication_seconds"), Some(120));
        assert!(!state.contains("debug_enabled"));
        assert_eq!(reconciler.import_id(&state), "Master/smart_in");

        assert!(reconciler.import("smart_in").is_err());
        assert!(reconciler.import("Master/missing").is_err());
    }
}
