//! OpenID Connect client registrations
//!
//! Clients are never deleted: destroy stamps `archived_at` and writes the
//! client back. Creating a client whose id belongs to an archived client
//! revives it in place.

use super::{
    DEFAULT_NODE_ID, field, found, now_rfc3339, opt_list, opt_str, permissions_from_blocks,
    permissions_to_blocks, require_str, set_some, split_id,
};
use anyhow::{Context, Result};
use declarative::{AttributeSpec, Attributes, Block, Check, Reconciler, Schema};
use smilecdr::{ClientSecret, Client, OpenIdClient};

pub const KIND: &str = "openid_client";

const DEFAULT_MODULE_ID: &str = "smart_auth";
const IMPORT_FORMAT: &str = "{nodeId}/{moduleId}/{clientId}";

const GRANT_TYPES: &[&str] = &[
    "AUTHORIZATION_CODE",
    "IMPLICIT",
    "REFRESH_TOKEN",
    "CLIENT_CREDENTIALS",
    "PASSWORD",
    "JWT_BEARER",
];

const SPECS: &[AttributeSpec] = &[
    AttributeSpec::integer("pid").computed(),
    AttributeSpec::string("node_id").default_str(DEFAULT_NODE_ID).immutable(),
    AttributeSpec::string("module_id").default_str(DEFAULT_MODULE_ID).immutable(),
    AttributeSpec::string("client_id")
        .required()
        .immutable()
        .check(Check::NoWhitespace),
    AttributeSpec::string("client_name").required(),
    AttributeSpec::boolean("enabled").default_bool(true),
    AttributeSpec::integer("access_token_validity_seconds").default_int(300),
    AttributeSpec::integer("refresh_token_validity_seconds").default_int(86400),
    AttributeSpec::list("allowed_grant_types")
        .required()
        .check(Check::EachOneOf(GRANT_TYPES)),
    AttributeSpec::boolean("always_require_approval").default_bool(false),
    AttributeSpec::boolean("attestation_accepted").default_bool(false),
    AttributeSpec::list("auto_approve_scopes"),
    AttributeSpec::list("auto_grant_scopes"),
    AttributeSpec::boolean("can_introspect_any_tokens").default_bool(false),
    AttributeSpec::boolean("can_introspect_own_tokens"),
    AttributeSpec::boolean("can_reissue_tokens").default_bool(false),
    AttributeSpec::blocks("client_secrets").sensitive(),
    AttributeSpec::boolean("created_by_app_sphere").computed(),
    AttributeSpec::boolean("fixed_scope"),
    AttributeSpec::string("jwks_url").check(Check::Url),
    AttributeSpec::blocks("permissions"),
    AttributeSpec::string("public_jwks"),
    AttributeSpec::list("registered_redirect_uris").check(Check::Url),
    AttributeSpec::boolean("remember_approved_scopes"),
    AttributeSpec::list("scopes"),
    AttributeSpec::boolean("secret_client_can_change"),
    AttributeSpec::boolean("secret_required"),
    AttributeSpec::string("archived_at").check(Check::Rfc3339).clears_when_unset(),
];

pub const SCHEMA: Schema = Schema::new(KIND, SPECS);

fn secrets_from_blocks(blocks: &[Block]) -> Vec<ClientSecret> {
    blocks
        .iter()
        .map(|b| ClientSecret {
            secret: field(b, "secret").unwrap_or_default(),
            description: field(b, "description"),
            activation: field(b, "activation"),
            expiration: field(b, "expiration"),
        })
        .collect()
}

fn secrets_to_blocks(secrets: &[ClientSecret]) -> Vec<Block> {
    secrets
        .iter()
        .map(|s| {
            let mut block = Block::from([("secret".to_string(), s.secret.clone())]);
            for (key, value) in [
                ("description", &s.description),
                ("activation", &s.activation),
                ("expiration", &s.expiration),
            ] {
                if let Some(value) = value {
                    block.insert(key.to_string(), value.clone());
                }
            }
            block
        })
        .collect()
}

/// Build the wire entity from attributes
///
/// `pid` is taken from `prior` when the attributes don't carry it.
fn to_entity(attrs: &Attributes, prior: Option<&Attributes>) -> Result<OpenIdClient> {
    Ok(OpenIdClient {
        pid: attrs.int("pid").or_else(|| prior.and_then(|p| p.int("pid"))),
        node_id: attrs.str("node_id").unwrap_or(DEFAULT_NODE_ID).to_string(),
        module_id: attrs.str("module_id").unwrap_or(DEFAULT_MODULE_ID).to_string(),
        client_id: require_str(attrs, "client_id")?.to_string(),
        client_name: opt_str(attrs, "client_name"),
        enabled: attrs.bool("enabled"),
        access_token_validity_seconds: attrs.int("access_token_validity_seconds"),
        refresh_token_validity_seconds: attrs.int("refresh_token_validity_seconds"),
        allowed_grant_types: opt_list(attrs, "allowed_grant_types"),
        always_require_approval: attrs.bool("always_require_approval"),
        attestation_accepted: attrs.bool("attestation_accepted"),
        auto_approve_scopes: opt_list(attrs, "auto_approve_scopes"),
        auto_grant_scopes: opt_list(attrs, "auto_grant_scopes"),
        can_introspect_any_tokens: attrs.bool("can_introspect_any_tokens"),
        can_introspect_own_tokens: attrs.bool("can_introspect_own_tokens"),
        can_reissue_tokens: attrs.bool("can_reissue_tokens"),
        client_secrets: attrs.blocks("client_secrets").map(secrets_from_blocks),
        created_by_app_sphere: attrs.bool("created_by_app_sphere"),
        fixed_scope: attrs.bool("fixed_scope"),
        jwks_url: opt_str(attrs, "jwks_url"),
        permissions: attrs.blocks("permissions").map(permissions_from_blocks),
        public_jwks: opt_str(attrs, "public_jwks"),
        registered_redirect_uris: opt_list(attrs, "registered_redirect_uris"),
        remember_approved_scopes: attrs.bool("remember_approved_scopes"),
        scopes: opt_list(attrs, "scopes"),
        secret_client_can_change: attrs.bool("secret_client_can_change"),
        secret_required: attrs.bool("secret_required"),
        archived_at: opt_str(attrs, "archived_at"),
    })
}

/// Map a stored client back to attributes; absent lists read as empty
fn from_entity(client: &OpenIdClient, node_id: &str, module_id: &str) -> Attributes {
    let mut attrs = Attributes::new();
    set_some(&mut attrs, "pid", client.pid);
    attrs.set_remote("node_id", node_id);
    attrs.set_remote("module_id", module_id);
    attrs.set_remote("client_id", client.client_id.as_str());
    set_some(&mut attrs, "client_name", client.client_name.clone());
    set_some(&mut attrs, "enabled", client.enabled);
    set_some(&mut attrs, "access_token_validity_seconds", client.access_token_validity_seconds);
    set_some(&mut attrs, "refresh_token_validity_seconds", client.refresh_token_validity_seconds);
    attrs.set_remote("allowed_grant_types", client.allowed_grant_types.clone().unwrap_or_default());
    set_some(&mut attrs, "always_require_approval", client.always_require_approval);
    set_some(&mut attrs, "attestation_accepted", client.attestation_accepted);
    attrs.set_remote("auto_approve_scopes", client.auto_approve_scopes.clone().unwrap_or_default());
    attrs.set_remote("auto_grant_scopes", client.auto_grant_scopes.clone().unwrap_or_default());
    set_some(&mut attrs, "can_introspect_any_tokens", client.can_introspect_any_tokens);
    set_some(&mut attrs, "can_introspect_own_tokens", client.can_introspect_own_tokens);
    set_some(&mut attrs, "can_reissue_tokens", client.can_reissue_tokens);
    attrs.set_remote(
        "client_secrets",
        secrets_to_blocks(client.client_secrets.as_deref().unwrap_or_default()),
    );
    set_some(&mut attrs, "created_by_app_sphere", client.created_by_app_sphere);
    set_some(&mut attrs, "fixed_scope", client.fixed_scope);
    set_some(&mut attrs, "jwks_url", client.jwks_url.clone());
    attrs.set_remote(
        "permissions",
        permissions_to_blocks(client.permissions.as_deref().unwrap_or_default()),
    );
    set_some(&mut attrs, "public_jwks", client.public_jwks.clone());
    attrs.set_remote(
        "registered_redirect_uris",
        client.registered_redirect_uris.clone().unwrap_or_default(),
    );
    set_some(&mut attrs, "remember_approved_scopes", client.remember_approved_scopes);
    attrs.set_remote("scopes", client.scopes.clone().unwrap_or_default());
    set_some(&mut attrs, "secret_client_can_change", client.secret_client_can_change);
    set_some(&mut attrs, "secret_required", client.secret_required);
    set_some(&mut attrs, "archived_at", client.archived_at.clone());
    attrs
}

#[derive(Debug, Clone)]
pub struct OpenIdClientReconciler {
    client: Client,
}

impl OpenIdClientReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn lookup(&self, node_id: &str, module_id: &str, client_id: &str) -> Result<Option<OpenIdClient>> {
        found(self.client.get_openid_client(node_id, module_id, client_id))
            .with_context(|| format!("reading client {client_id}"))
    }

    fn fetch(&self, node_id: &str, module_id: &str, client_id: &str) -> Result<Option<Attributes>> {
        Ok(self
            .lookup(node_id, module_id, client_id)?
            .map(|c| from_entity(&c, node_id, module_id)))
    }

    fn refresh(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        let entity = to_entity(prior, None)?;
        let remote = self.fetch(&entity.node_id, &entity.module_id, &entity.client_id)?;
        Ok(remote.map(|r| SCHEMA.merge_remote(prior, r)))
    }

    fn read_back(&self, desired: &Attributes) -> Result<Attributes> {
        self.refresh(desired)?.with_context(|| {
            format!("client {} not found after write", desired.str_or_empty("client_id"))
        })
    }
}

impl Reconciler for OpenIdClientReconciler {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn schema(&self) -> Schema {
        SCHEMA
    }

    fn import_id(&self, state: &Attributes) -> String {
        format!(
            "{}/{}/{}",
            state.str("node_id").unwrap_or(DEFAULT_NODE_ID),
            state.str("module_id").unwrap_or(DEFAULT_MODULE_ID),
            state.str_or_empty("client_id")
        )
    }

    fn create(&self, desired: &Attributes) -> Result<Attributes> {
        let mut entity = to_entity(desired, None)?;

        let archived = self
            .lookup(&entity.node_id, &entity.module_id, &entity.client_id)?
            .filter(|c| c.archived_at.is_some());
        if let Some(existing) = archived {
            log::info!("Reviving archived client {}", entity.client_id);
            entity.pid = existing.pid;
            self.client
                .update_openid_client(&entity)
                .with_context(|| format!("reviving client {}", entity.client_id))?;
        } else {
            entity.created_by_app_sphere = Some(false);
            self.client
                .create_openid_client(&entity)
                .with_context(|| format!("creating client {}", entity.client_id))?;
        }

        self.read_back(desired)
    }

    fn read(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        self.refresh(prior)
    }

    fn update(&self, desired: &Attributes, prior: &Attributes) -> Result<Attributes> {
        let entity = to_entity(desired, Some(prior))?;
        self.client
            .update_openid_client(&entity)
            .with_context(|| format!("updating client {}", entity.client_id))?;
        self.read_back(desired)
    }

    fn destroy(&self, prior: &Attributes) -> Result<()> {
        let mut entity = to_entity(prior, None)?;
        entity.archived_at = Some(now_rfc3339());
        self.client
            .update_openid_client(&entity)
            .with_context(|| format!("archiving client {}", entity.client_id))?;
        Ok(())
    }

    fn import(&self, id: &str) -> Result<Attributes> {
        let parts = split_id(KIND, id, 3, IMPORT_FORMAT)?;
        self.fetch(parts[0], parts[1], parts[2])?
            .with_context(|| format!("client {id} not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Action, ResourceDiff, Value};
    use smilecdr::{Method, MockTransport};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const PATH: &str = "/openid-connect-clients/Master/smart_auth/growth-chart";

    fn desired(extra: &[(&str, Value)]) -> Attributes {
        let mut raw = BTreeMap::from([
            ("client_id".to_string(), Value::from("growth-chart")),
            ("client_name".to_string(), Value::from("Growth Chart")),
            (
                "allowed_grant_types".to_string(),
                Value::List(vec!["AUTHORIZATION_CODE".into(), "REFRESH_TOKEN".into()]),
            ),
        ]);
        raw.extend(extra.iter().map(|(k, v)| ((*k).to_string(), v.clone())));
        SCHEMA.bind(raw).unwrap()
    }

    fn secret(value: &str) -> Value {
        Value::Blocks(vec![Block::from([("secret".to_string(), value.to_string())])])
    }

    fn setup() -> (MockTransport, OpenIdClientReconciler) {
        let mock = MockTransport::new();
        (mock.clone(), OpenIdClientReconciler::new(Client::new(Arc::new(mock))))
    }

    #[test]
    fn test_grant_types_are_checked() {
        let attrs = desired(&[("allowed_grant_types", Value::List(vec!["MAGIC".into()]))]);
        assert!(SCHEMA.validate(&attrs).iter().any(|d| d.is_error()));
        assert!(SCHEMA.validate(&desired(&[])).is_empty());
    }

    #[test]
    fn test_create_posts_and_reads_pid() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&desired(&[])).unwrap();

        let posts = mock.calls_with(Method::Post);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].path, "/openid-connect-clients/Master/smart_auth");
        let body = posts[0].body.as_ref().unwrap();
        assert_eq!(body["clientId"], "growth-chart");
        assert_eq!(body["accessTokenValiditySeconds"], 300);
        assert_eq!(body["createdByAppSphere"], false);

        assert_eq!(state.int("pid"), Some(1));
        assert_eq!(state.str("client_name"), Some("Growth Chart"));
        assert_eq!(state.list("scopes"), Some(&[][..]));
    }

    #[test]
    fn test_second_create_conflicts() {
        let (_, reconciler) = setup();
        reconciler.create(&desired(&[])).unwrap();
        let err = reconciler.create(&desired(&[])).unwrap_err();
        assert!(format!("{err:#}").contains("409"));
    }

    #[test]
    fn test_destroy_archives_with_put() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&desired(&[])).unwrap();
        reconciler.destroy(&state).unwrap();

        assert!(mock.calls_with(Method::Delete).is_empty());
        let puts = mock.calls_with(Method::Put);
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].path, PATH);
        let archived_at = puts[0].body.as_ref().unwrap()["archivedAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(archived_at).is_ok());
        assert_eq!(mock.entity(PATH).unwrap()["pid"], 1);
    }

    #[test]
    fn test_create_revives_archived_client() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&desired(&[])).unwrap();
        reconciler.destroy(&state).unwrap();

        let revived = reconciler.create(&desired(&[])).unwrap();
        assert_eq!(revived.int("pid"), Some(1));
        assert!(!revived.contains("archived_at"));
        assert_eq!(mock.calls_with(Method::Post).len(), 1);
    }

    #[test]
    fn test_declared_archived_client_is_revived_by_update() {
        let (mock, reconciler) = setup();
        let mut stored = serde_json::json!({
            "pid": 7,
            "nodeId": "Master",
            "moduleId": "smart_auth",
            "clientId": "growth-chart",
            "clientName": "Growth Chart",
            "allowedGrantTypes": ["AUTHORIZATION_CODE", "REFRESH_TOKEN"],
        });
        stored["archivedAt"] = "2024-01-01T00:00:00Z".into();
        mock.insert(PATH, stored);

        let imported = reconciler.import("Master/smart_auth/growth-chart").unwrap();
        let current = reconciler.read(&imported).unwrap().unwrap();
        let wanted = desired(&[]);
        let diff = ResourceDiff::compute("openid_client.growth_chart", &SCHEMA, Some(&current), Some(&wanted));
        assert_eq!(diff.action, Action::Update);
        assert!(diff.changes.iter().any(|c| c.name == "archived_at" && c.to.is_none()));

        let revived = reconciler.update(&wanted, &current).unwrap();
        assert_eq!(revived.int("pid"), Some(7));
        assert!(!revived.contains("archived_at"));
        assert!(mock.entity(PATH).unwrap().get("archivedAt").is_none());
    }

    #[test]
    fn test_update_keeps_pid_and_secret() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&desired(&[("client_secrets", secret("s3cr3t-value"))])).unwrap();

        let mut stored = mock.entity(PATH).unwrap();
        stored["clientSecrets"][0]["secret"] = "$2a$12$hashed".into();
        mock.insert(PATH, stored);

        let changed = desired(&[("client_secrets", secret("s3cr3t-value")), ("enabled", false.into())]);
        let updated = reconciler.update(&changed, &state).unwrap();
        let put = &mock.calls_with(Method::Put)[0];
        assert_eq!(put.body.as_ref().unwrap()["pid"], 1);
        assert_eq!(updated.bool("enabled"), Some(false));
        assert_eq!(updated.get("client_secrets"), Some(&secret("s3cr3t-value")));
    }

    #[test]
    fn test_read_missing_is_none() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&desired(&[])).unwrap();
        mock.remove(PATH);
        assert!(reconciler.read(&state).unwrap().is_none());
    }

    #[test]
    fn test_import() {
        let (mock, reconciler) = setup();
        mock.insert(
            PATH,
            serde_json::json!({
                "pid": 7,
                "clientId": "growth-chart",
                "clientName": "Growth Chart",
                "permissions": [{"permission": "ROLE_FHIR_CLIENT_SUPERUSER"}]
            }),
        );
        let state = reconciler.import("Master/smart_auth/growth-chart").unwrap();
        assert_eq!(state.int("pid"), Some(7));
        assert_eq!(state.str("module_id"), Some("smart_auth"));
        assert_eq!(state.blocks("permissions").map(<[Block]>::len), Some(1));
        assert_eq!(reconciler.import_id(&state), "Master/smart_auth/growth-chart");

        assert!(reconciler.import("Master/growth-chart").is_err());
    }
}
