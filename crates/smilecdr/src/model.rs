//! JSON shapes of the admin API entities.
//!
//! Optional fields are skipped when unset so a create or replace never
//! sends a value the user did not declare.

use serde::{Deserialize, Serialize};

/// One `key`/`value` pair of a module configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOption {
    pub key: String,
    pub value: String,
}

/// A dependency edge from one module to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    /// Target module id.
    #[serde(rename = "moduleId")]
    pub module_id: String,
    /// Dependency role, e.g. `SECURITY_IN_UP`.
    #[serde(rename = "type")]
    pub dep_type: String,
}

/// A module's configuration as stored by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub module_id: String,
    #[serde(default)]
    pub module_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ModuleOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ModuleDependency>,
}

impl ModuleConfig {
    /// Create an empty configuration for a module.
    pub fn new(module_id: impl Into<String>, module_type: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            module_type: module_type.into(),
            options: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Value of the first option with the given key.
    #[must_use]
    pub fn lookup_option_ok(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }

    /// Append an option.
    pub fn push_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.push(ModuleOption {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Target of the first dependency with the given type.
    #[must_use]
    pub fn dependency(&self, dep_type: &str) -> Option<&str> {
        self.dependencies
            .iter()
            .find(|d| d.dep_type == dep_type)
            .map(|d| d.module_id.as_str())
    }
}

/// A permission granted to a client or user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub permission: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

/// A client secret with its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecret {
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

/// An OpenID Connect client registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIdClient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub module_id: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_validity_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_validity_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_grant_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_require_approval: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_accepted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approve_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_grant_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_introspect_any_tokens: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_introspect_own_tokens: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_reissue_tokens: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secrets: Option<Vec<ClientSecret>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_app_sphere: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_scope: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_jwks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_approved_scopes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_client_can_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_required: Option<bool>,
    /// Set when the client is soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
}

/// A federated OpenID Connect identity provider.
///
/// The server mixes naming styles here: the first fields are camelCase,
/// the rest snake_case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdIdentityProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub issuer: String,
    #[serde(
        rename = "tokenIntrospectionClientId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_introspection_client_id: Option<String>,
    #[serde(
        rename = "tokenIntrospectionClientSecret",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_introspection_client_secret: Option<String>,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub module_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_jwk_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_jwk_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_registration_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_request_scopes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_user_info_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_jwk_set_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_auth_script_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_auth_script_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_user_mapping_script_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fhir_endpoint_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_well_known_config_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_token_params: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
}

/// A user account in a security module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub module_id: String,
    pub username: String,
    /// Write-only; the server never returns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor_auth_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorities: Option<Vec<Permission>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_config_wire_shape() {
        let mut config = ModuleConfig::new("smart_auth", "SECURITY_OUT_SMART");
        config.push_option("port", "9200");
        config.dependencies.push(ModuleDependency {
            module_id: "local_security".into(),
            dep_type: "SECURITY_IN_UP".into(),
        });

        let wire = serde_json::to_value(&config).unwrap();
        assert_eq!(
            wire,
            json!({
                "moduleId": "smart_auth",
                "moduleType": "SECURITY_OUT_SMART",
                "options": [{"key": "port", "value": "9200"}],
                "dependencies": [{"moduleId": "local_security", "type": "SECURITY_IN_UP"}],
            })
        );
    }

    #[test]
    fn test_module_config_empty_lists_omitted() {
        let wire = serde_json::to_value(ModuleConfig::new("m", "LICENSE")).unwrap();
        assert_eq!(wire, json!({"moduleId": "m", "moduleType": "LICENSE"}));
        let back: ModuleConfig = serde_json::from_value(wire).unwrap();
        assert!(back.options.is_empty());
    }

    #[test]
    fn test_module_config_lookups() {
        let mut config = ModuleConfig::new("m", "SECURITY_IN_SMART");
        config.push_option("debug.port", "8000");
        config.push_option("debug.port", "9000");
        assert_eq!(config.lookup_option_ok("debug.port"), Some("8000"));
        assert_eq!(config.lookup_option_ok("missing"), None);
        assert_eq!(config.dependency("SECURITY_IN_UP"), None);
    }

    #[test]
    fn test_identity_provider_mixed_field_names() {
        let idp = OpenIdIdentityProvider {
            issuer: "https://idp.example.com".into(),
            token_introspection_client_id: Some("introspector".into()),
            node_id: "Master".into(),
            module_id: "smart_auth".into(),
            federation_token_url: Some("https://idp.example.com/token".into()),
            ..Default::default()
        };
        let wire = serde_json::to_value(&idp).unwrap();
        assert_eq!(wire["tokenIntrospectionClientId"], json!("introspector"));
        assert_eq!(wire["node_id"], json!("Master"));
        assert_eq!(wire["federation_token_url"], json!("https://idp.example.com/token"));
        assert!(wire.get("pid").is_none());
    }

    #[test]
    fn test_client_false_booleans_are_sent() {
        let client = OpenIdClient {
            client_id: "app".into(),
            enabled: Some(false),
            ..Default::default()
        };
        let wire = serde_json::to_value(&client).unwrap();
        assert_eq!(wire["enabled"], json!(false));
        assert!(wire.get("scopes").is_none());
    }

    #[test]
    fn test_user_decodes_without_password() {
        let user: User = serde_json::from_value(json!({
            "pid": 7,
            "nodeId": "Master",
            "moduleId": "local_security",
            "username": "jane",
            "authorities": [{"permission": "ROLE_FHIR_CLIENT_SUPERUSER"}],
            "lastActive": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.pid, Some(7));
        assert!(user.password.is_none());
        assert_eq!(user.authorities.unwrap()[0].argument, None);
    }
}
