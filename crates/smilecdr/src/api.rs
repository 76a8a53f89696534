//! Typed calls against the admin JSON API.

use crate::error::{Error, Result};
use crate::model::{ModuleConfig, OpenIdClient, OpenIdIdentityProvider, User};
use crate::transport::{HttpTransport, Method, Transport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Admin API client shared by every reconciler.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client over any transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a client that talks HTTP to a live server.
    pub fn http(base_url: &str, username: &str, password: &str) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url, username, password)?)))
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.transport.send(Method::Get, path, None)?;
        serde_json::from_slice(&body).map_err(|e| Error::decode(format!("GET {path}"), e))
    }

    fn write<B: Serialize>(&self, method: Method, path: &str, entity: &B) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(entity).map_err(|e| Error::decode(format!("{method} {path}"), e))?;
        self.transport.send(method, path, Some(&body))
    }

    fn write_returning<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        entity: &B,
    ) -> Result<T> {
        let body = self.write(method, path, entity)?;
        if body.is_empty() {
            return Err(Error::Body {
                uri: path.to_string(),
                message: "empty response, expected the stored entity".to_string(),
            });
        }
        serde_json::from_slice(&body).map_err(|e| Error::decode(format!("{method} {path}"), e))
    }

    // Module configuration

    pub fn get_module_config(&self, node_id: &str, module_id: &str) -> Result<ModuleConfig> {
        self.get(&format!("/module-config/{node_id}/{module_id}"))
    }

    pub fn create_module_config(&self, node_id: &str, config: &ModuleConfig) -> Result<()> {
        let path = format!("/module-config/{node_id}/{}/create", config.module_id);
        self.write(Method::Post, &path, config).map(drop)
    }

    pub fn update_module_config(&self, node_id: &str, config: &ModuleConfig) -> Result<()> {
        let path = format!("/module-config/{node_id}/{}/set", config.module_id);
        self.write(Method::Put, &path, config).map(drop)
    }

    pub fn delete_module_config(&self, node_id: &str, module_id: &str) -> Result<()> {
        let path = format!("/module-config/{node_id}/{module_id}/archive");
        self.transport.send(Method::Delete, &path, None).map(drop)
    }

    // OpenID clients

    pub fn get_openid_client(&self, node_id: &str, module_id: &str, client_id: &str) -> Result<OpenIdClient> {
        self.get(&format!("/openid-connect-clients/{node_id}/{module_id}/{client_id}"))
    }

    pub fn create_openid_client(&self, client: &OpenIdClient) -> Result<()> {
        let path = format!("/openid-connect-clients/{}/{}", client.node_id, client.module_id);
        self.write(Method::Post, &path, client).map(drop)
    }

    pub fn update_openid_client(&self, client: &OpenIdClient) -> Result<()> {
        let path = format!(
            "/openid-connect-clients/{}/{}/{}",
            client.node_id, client.module_id, client.client_id
        );
        self.write(Method::Put, &path, client).map(drop)
    }

    // OpenID identity providers

    pub fn list_identity_providers(&self, node_id: &str, module_id: &str) -> Result<Vec<OpenIdIdentityProvider>> {
        self.get(&format!("/openid-connect-servers/{node_id}/{module_id}"))
    }

    /// Find a provider by issuer URL, preferring one that is not archived.
    pub fn find_identity_provider(
        &self,
        node_id: &str,
        module_id: &str,
        issuer: &str,
    ) -> Result<Option<OpenIdIdentityProvider>> {
        let mut matches: Vec<_> = self
            .list_identity_providers(node_id, module_id)?
            .into_iter()
            .filter(|p| p.issuer == issuer)
            .collect();
        matches.sort_by_key(|p| p.archived_at.is_some());
        Ok(matches.into_iter().next())
    }

    pub fn create_identity_provider(&self, provider: &OpenIdIdentityProvider) -> Result<OpenIdIdentityProvider> {
        let path = format!("/openid-connect-servers/{}/{}", provider.node_id, provider.module_id);
        self.write_returning(Method::Post, &path, provider)
    }

    pub fn update_identity_provider(&self, provider: &OpenIdIdentityProvider) -> Result<()> {
        let pid = provider
            .pid
            .ok_or_else(|| Error::Config(format!("identity provider {} has no pid", provider.issuer)))?;
        let path = format!("/openid-connect-servers/{}/{}/{pid}", provider.node_id, provider.module_id);
        self.write(Method::Put, &path, provider).map(drop)
    }

    // Users

    pub fn get_user(&self, node_id: &str, module_id: &str, pid: i64) -> Result<User> {
        self.get(&format!("/user-management/{node_id}/{module_id}/{pid}"))
    }

    pub fn create_user(&self, user: &User) -> Result<User> {
        let path = format!("/user-management/{}/{}", user.node_id, user.module_id);
        self.write_returning(Method::Post, &path, user)
    }

    pub fn update_user(&self, user: &User) -> Result<()> {
        let pid = user
            .pid
            .ok_or_else(|| Error::Config(format!("user {} has no pid", user.username)))?;
        let path = format!("/user-management/{}/{}/{pid}", user.node_id, user.module_id);
        self.write(Method::Put, &path, user).map(drop)
    }

    pub fn delete_user(&self, node_id: &str, module_id: &str, pid: i64) -> Result<()> {
        let path = format!("/user-management/{node_id}/{module_id}/{pid}");
        self.transport.send(Method::Delete, &path, None).map(drop)
    }
}
