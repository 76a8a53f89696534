//! Federated OpenID Connect identity providers
//!
//! The server keys providers by `pid`, but the issuer URL is what a
//! config names, so reads list the module's providers and match on
//! issuer. Destroy archives, like clients.

use super::{DEFAULT_NODE_ID, found, now_rfc3339, opt_str, require_str, set_some, split_id};
use anyhow::{Context, Result};
use declarative::{AttributeSpec, Attributes, Check, Reconciler, Schema};
use smilecdr::{Client, OpenIdIdentityProvider};

pub const KIND: &str = "openid_identity_provider";

const DEFAULT_MODULE_ID: &str = "smart_auth";
const IMPORT_FORMAT: &str = "{nodeId}/{moduleId}/{issuerUrl} or {nodeId}/{moduleId}?issuer_url={issuerUrl}";
const ISSUER_QUERY: &str = "?issuer_url=";

const SPECS: &[AttributeSpec] = &[
    AttributeSpec::integer("pid").computed(),
    AttributeSpec::string("node_id").default_str(DEFAULT_NODE_ID).immutable(),
    AttributeSpec::string("module_id").default_str(DEFAULT_MODULE_ID).immutable(),
    AttributeSpec::string("name").default_str("An OpenID Identity Provider"),
    AttributeSpec::string("issuer").required().immutable().check(Check::Url),
    AttributeSpec::string("token_introspection_client_id").check(Check::NoWhitespace),
    AttributeSpec::string("token_introspection_client_secret")
        .sensitive()
        .check(Check::LenBetween(9, 512)),
    AttributeSpec::string("validation_jwk_text"),
    AttributeSpec::string("validation_jwk_file"),
    AttributeSpec::string("federation_registration_id").computed(),
    AttributeSpec::string("federation_request_scopes").default_str("openid profile"),
    AttributeSpec::string("federation_authorization_url").required().check(Check::Url),
    AttributeSpec::string("federation_token_url").required().check(Check::Url),
    AttributeSpec::string("federation_user_info_url").check(Check::Url),
    AttributeSpec::string("federation_jwk_set_url").check(Check::Url),
    AttributeSpec::string("federation_auth_script_text"),
    AttributeSpec::string("federation_auth_script_file"),
    AttributeSpec::string("federation_user_mapping_script_text"),
    AttributeSpec::string("fhir_endpoint_url").check(Check::Url),
    AttributeSpec::string("auth_well_known_config_url").check(Check::Url),
    AttributeSpec::string("notes"),
    AttributeSpec::string("custom_token_params"),
    AttributeSpec::string("response_type"),
    AttributeSpec::string("organization_id"),
    AttributeSpec::string("audience"),
    AttributeSpec::string("archived_at").check(Check::Rfc3339).clears_when_unset(),
];

pub const SCHEMA: Schema = Schema::new(KIND, SPECS);

fn to_entity(attrs: &Attributes, prior: Option<&Attributes>) -> Result<OpenIdIdentityProvider> {
    Ok(OpenIdIdentityProvider {
        pid: attrs.int("pid").or_else(|| prior.and_then(|p| p.int("pid"))),
        name: opt_str(attrs, "name"),
        issuer: require_str(attrs, "issuer")?.to_string(),
        token_introspection_client_id: opt_str(attrs, "token_introspection_client_id"),
        token_introspection_client_secret: opt_str(attrs, "token_introspection_client_secret"),
        node_id: attrs.str("node_id").unwrap_or(DEFAULT_NODE_ID).to_string(),
        module_id: attrs.str("module_id").unwrap_or(DEFAULT_MODULE_ID).to_string(),
        validation_jwk_text: opt_str(attrs, "validation_jwk_text"),
        validation_jwk_file: opt_str(attrs, "validation_jwk_file"),
        federation_registration_id: opt_str(attrs, "federation_registration_id")
            .or_else(|| prior.and_then(|p| opt_str(p, "federation_registration_id"))),
        federation_request_scopes: opt_str(attrs, "federation_request_scopes"),
        federation_authorization_url: opt_str(attrs, "federation_authorization_url"),
        federation_token_url: opt_str(attrs, "federation_token_url"),
        federation_user_info_url: opt_str(attrs, "federation_user_info_url"),
        federation_jwk_set_url: opt_str(attrs, "federation_jwk_set_url"),
        federation_auth_script_text: opt_str(attrs, "federation_auth_script_text"),
        federation_auth_script_file: opt_str(attrs, "federation_auth_script_file"),
        federation_user_mapping_script_text: opt_str(attrs, "federation_user_mapping_script_text"),
        fhir_endpoint_url: opt_str(attrs, "fhir_endpoint_url"),
        auth_well_known_config_url: opt_str(attrs, "auth_well_known_config_url"),
        notes: opt_str(attrs, "notes"),
        custom_token_params: opt_str(attrs, "custom_token_params"),
        response_type: opt_str(attrs, "response_type"),
        organization_id: opt_str(attrs, "organization_id"),
        audience: opt_str(attrs, "audience"),
        archived_at: opt_str(attrs, "archived_at"),
    })
}

fn from_entity(provider: &OpenIdIdentityProvider, node_id: &str, module_id: &str) -> Attributes {
    let mut attrs = Attributes::new();
    set_some(&mut attrs, "pid", provider.pid);
    attrs.set_remote("node_id", node_id);
    attrs.set_remote("module_id", module_id);
    attrs.set_remote("issuer", provider.issuer.as_str());

    let strings = [
        ("name", &provider.name),
        ("token_introspection_client_id", &provider.token_introspection_client_id),
        ("token_introspection_client_secret", &provider.token_introspection_client_secret),
        ("validation_jwk_text", &provider.validation_jwk_text),
        ("validation_jwk_file", &provider.validation_jwk_file),
        ("federation_registration_id", &provider.federation_registration_id),
        ("federation_request_scopes", &provider.federation_request_scopes),
        ("federation_authorization_url", &provider.federation_authorization_url),
        ("federation_token_url", &provider.federation_token_url),
        ("federation_user_info_url", &provider.federation_user_info_url),
        ("federation_jwk_set_url", &provider.federation_jwk_set_url),
        ("federation_auth_script_text", &provider.federation_auth_script_text),
        ("federation_auth_script_file", &provider.federation_auth_script_file),
        ("federation_user_mapping_script_text", &provider.federation_user_mapping_script_text),
        ("fhir_endpoint_url", &provider.fhir_endpoint_url),
        ("auth_well_known_config_url", &provider.auth_well_known_config_url),
        ("notes", &provider.notes),
        ("custom_token_params", &provider.custom_token_params),
        ("response_type", &provider.response_type),
        ("organization_id", &provider.organization_id),
        ("audience", &provider.audience),
        ("archived_at", &provider.archived_at),
    ];
    for (name, value) in strings {
        set_some(&mut attrs, name, value.clone());
    }
    attrs
}

/// Split an import id into node, module and issuer
fn parse_import_id(id: &str) -> Result<(&str, &str, &str)> {
    if let Some((module_path, issuer)) = id.split_once(ISSUER_QUERY) {
        let parts = split_id(KIND, module_path, 2, IMPORT_FORMAT)?;
        if issuer.is_empty() || parts[1].contains('/') {
            return Err(smilecdr::Error::invalid_import_id(KIND, id, IMPORT_FORMAT).into());
        }
        return Ok((parts[0], parts[1], issuer));
    }
    let parts = split_id(KIND, id, 3, IMPORT_FORMAT)?;
    Ok((parts[0], parts[1], parts[2]))
}

#[derive(Debug, Clone)]
pub struct IdentityProviderReconciler {
    client: Client,
}

impl IdentityProviderReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn lookup(&self, node_id: &str, module_id: &str, issuer: &str) -> Result<Option<OpenIdIdentityProvider>> {
        let listed = found(self.client.find_identity_provider(node_id, module_id, issuer))
            .with_context(|| format!("looking up identity provider {issuer}"))?;
        Ok(listed.flatten())
    }

    fn fetch(&self, node_id: &str, module_id: &str, issuer: &str) -> Result<Option<Attributes>> {
        Ok(self
            .lookup(node_id, module_id, issuer)?
            .map(|p| from_entity(&p, node_id, module_id)))
    }

    fn refresh(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        let entity = to_entity(prior, None)?;
        let remote = self.fetch(&entity.node_id, &entity.module_id, &entity.issuer)?;
        Ok(remote.map(|r| SCHEMA.merge_remote(prior, r)))
    }

    fn read_back(&self, desired: &Attributes) -> Result<Attributes> {
        self.refresh(desired)?.with_context(|| {
            format!(
                "identity provider {} not found after write",
                desired.str_or_empty("issuer")
            )
        })
    }
}

impl Reconciler for IdentityProviderReconciler {
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
            state.str_or_empty("issuer")
        )
    }

    fn create(&self, desired: &Attributes) -> Result<Attributes> {
        let mut entity = to_entity(desired, None)?;

        let archived = self
            .lookup(&entity.node_id, &entity.module_id, &entity.issuer)?
            .filter(|p| p.archived_at.is_some());
        if let Some(existing) = archived {
            log::info!("Reviving archived identity provider {}", entity.issuer);
            entity.pid = existing.pid;
            entity.federation_registration_id = existing.federation_registration_id;
            self.client
                .update_identity_provider(&entity)
                .with_context(|| format!("reviving identity provider {}", entity.issuer))?;
        } else {
            let stored = self
                .client
                .create_identity_provider(&entity)
                .with_context(|| format!("creating identity provider {}", entity.issuer))?;
            log::debug!("Identity provider {} stored with pid {:?}", stored.issuer, stored.pid);
        }

        self.read_back(desired)
    }

    fn read(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        self.refresh(prior)
    }

    fn update(&self, desired: &Attributes, prior: &Attributes) -> Result<Attributes> {
        let entity = to_entity(desired, Some(prior))?;
        self.client
            .update_identity_provider(&entity)
            .with_context(|| format!("updating identity provider {}", entity.issuer))?;
        self.read_back(desired)
    }

    fn destroy(&self, prior: &Attributes) -> Result<()> {
        let mut entity = to_entity(prior, None)?;
        entity.archived_at = Some(now_rfc3339());
        self.client
            .update_identity_provider(&entity)
            .with_context(|| format!("archiving identity provider {}", entity.issuer))?;
        Ok(())
    }

    fn import(&self, id: &str) -> Result<Attributes> {
        let (node_id, module_id, issuer) = parse_import_id(id)?;
        self.fetch(node_id, module_id, issuer)?
            .with_context(|| format!("identity provider {issuer} not found in {node_id}/{module_id}"))
    }
}
