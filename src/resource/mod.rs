//! Resource kinds managed through the admin API
//!
//! Every kind is a [`declarative::Reconciler`] over a static attribute
//! table. The module-backed kinds share one generic reconciler; the entity
//! kinds (clients, identity providers, users) each map their attributes
//! onto a JSON entity.

pub mod identity_provider;
pub mod module;
pub mod module_config;
pub mod openid_client;
pub mod smart_inbound;
pub mod smart_outbound;
pub mod user;

pub use identity_provider::IdentityProviderReconciler;
pub use openid_client::OpenIdClientReconciler;
pub use user::UserReconciler;

use anyhow::{Context, Result};
use declarative::{Attributes, Block, Value};
use smilecdr::Permission;

/// Node every kind defaults to
pub const DEFAULT_NODE_ID: &str = "Master";

/// Split an import id into `parts` non-empty segments
///
/// The last segment keeps any further slashes, so ids such as issuer URLs
/// survive intact.
pub fn split_id<'a>(kind: &str, id: &'a str, parts: usize, expected: &str) -> Result<Vec<&'a str>> {
    let segments: Vec<&str> = id.splitn(parts, '/').collect();
    if segments.len() != parts || segments.iter().any(|s| s.is_empty()) {
        return Err(smilecdr::Error::invalid_import_id(kind, id, expected).into());
    }
    Ok(segments)
}

/// Turn a 404 into `None`
pub fn found<T>(result: smilecdr::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A string attribute that must be present
pub fn require_str<'a>(attrs: &'a Attributes, name: &str) -> Result<&'a str> {
    attrs
        .str(name)
        .with_context(|| format!("attribute {name} is not set"))
}

pub fn opt_str(attrs: &Attributes, name: &str) -> Option<String> {
    attrs.str(name).map(str::to_string)
}

pub fn opt_list(attrs: &Attributes, name: &str) -> Option<Vec<String>> {
    attrs.list(name).map(<[String]>::to_vec)
}

/// Set a remote value when the server returned one
pub fn set_some<V: Into<Value>>(attrs: &mut Attributes, name: &str, value: Option<V>) {
    if let Some(value) = value {
        attrs.set_remote(name, value);
    }
}

/// Current time as an RFC 3339 archival stamp
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn field(block: &Block, key: &str) -> Option<String> {
    block.get(key).filter(|v| !v.is_empty()).cloned()
}

pub fn permissions_from_blocks(blocks: &[Block]) -> Vec<Permission> {
    blocks
        .iter()
        .map(|b| Permission {
            permission: field(b, "permission").unwrap_or_default(),
            argument: field(b, "argument"),
        })
        .collect()
}

pub fn permissions_to_blocks(permissions: &[Permission]) -> Vec<Block> {
    permissions
        .iter()
        .map(|p| {
            let mut block = Block::from([("permission".to_string(), p.permission.clone())]);
            if let Some(argument) = &p.argument {
                block.insert("argument".to_string(), argument.clone());
            }
            block
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_id_keeps_tail() {
        let parts = split_id("openid_identity_provider", "Master/smart_auth/https://idp/x", 3, "n/m/i").unwrap();
        assert_eq!(parts, vec!["Master", "smart_auth", "https://idp/x"]);
    }

    #[test]
    fn test_split_id_rejects_short_or_empty() {
        assert!(split_id("user", "Master/local_security", 3, "n/m/pid").is_err());
        assert!(split_id("user", "Master//7", 3, "n/m/pid").is_err());
        let err = split_id("module_config", "Master", 2, "{nodeId}/{moduleId}").unwrap_err();
        assert!(err.to_string().contains("{nodeId}/{moduleId}"));
    }

    #[test]
    fn test_found_maps_404() {
        let missing: smilecdr::Result<i32> = Err(smilecdr::Error::status("GET", "/x", 404));
        assert_eq!(found(missing).unwrap(), None);
        let denied: smilecdr::Result<i32> = Err(smilecdr::Error::status("GET", "/x", 401));
        assert!(found(denied).is_err());
    }

    #[test]
    fn test_permission_blocks() {
        let blocks = vec![
            Block::from([("permission".to_string(), "ROLE_SUPERUSER".to_string())]),
            Block::from([
                ("permission".to_string(), "FHIR_READ_ALL_IN_COMPARTMENT".to_string()),
                ("argument".to_string(), "Patient/1".to_string()),
            ]),
        ];
        let permissions = permissions_from_blocks(&blocks);
        assert_eq!(permissions[0].argument, None);
        assert_eq!(permissions_to_blocks(&permissions), blocks);
    }

    #[test]
    fn test_now_is_rfc3339() {
        assert!(chrono::DateTime::parse_from_rfc3339(&now_rfc3339()).is_ok());
    }
}
