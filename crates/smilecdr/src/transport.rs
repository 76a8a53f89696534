//! HTTP transport for the admin JSON API.
//!
//! Every call is authenticated with HTTP Basic credentials and exchanges
//! JSON. [`Transport`] is the seam the entity client is written against, so
//! tests can swap in [`MockTransport`] instead of a live server.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default admin API endpoint of a local Smile CDR node.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9000";

/// HTTP methods used by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read an entity or a listing.
    Get,
    /// Create an entity.
    Post,
    /// Replace an entity.
    Put,
    /// Remove an entity.
    Delete,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Status codes that count as success for this method.
    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            Method::Get => status == 200,
            Method::Post | Method::Put => matches!(status, 200 | 201 | 204),
            Method::Delete => matches!(status, 200 | 204),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends one request to the admin API.
///
/// `path` is relative to the base URL and starts with `/`. The returned
/// bytes are the raw response body, possibly empty.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send a request and return the response body on an accepted status.
    fn send(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<Vec<u8>>;
}

/// Build the value of the `Authorization` header.
#[must_use]
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Check that a base URL is an absolute http(s) URL and drop trailing slashes.
pub fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => {
            Ok(trimmed.to_string())
        }
        _ => Err(Error::Config(format!(
            "base URL {base_url:?} must be an absolute http:// or https:// URL"
        ))),
    }
}

/// Live transport over `ureq`.
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for the given endpoint and credentials.
    ///
    /// Timeouts and body limits are left at the `ureq` defaults.
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();

        Ok(Self {
            agent: config.into(),
            base_url,
            authorization: basic_auth(username, password),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn uri(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<Vec<u8>> {
        let uri = self.uri(path);
        log::debug!("{method} {uri}");

        let auth = self.authorization.as_str();
        let result = match method {
            Method::Get => self
                .agent
                .get(&uri)
                .header("Authorization", auth)
                .header("Accept", "application/json")
                .call(),
            Method::Delete => self
                .agent
                .delete(&uri)
                .header("Authorization", auth)
                .header("Accept", "application/json")
                .call(),
            Method::Post | Method::Put => {
                let request = if method == Method::Post {
                    self.agent.post(&uri)
                } else {
                    self.agent.put(&uri)
                };
                request
                    .header("Authorization", auth)
                    .header("Accept", "application/json")
                    .header("Content-Type", "application/json")
                    .send(body.unwrap_or_default())
            }
        };

        let mut response = result.map_err(|e| Error::Network {
            method: method.to_string(),
            uri: uri.clone(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if !method.accepts(status) {
            log::debug!("{method} {uri} -> {status}");
            return Err(Error::status(method.as_str(), uri, status));
        }

        response
            .body_mut()
            .read_to_vec()
            .map_err(|e| Error::Body {
                uri,
                message: e.to_string(),
            })
    }
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Decoded JSON body, if any.
    pub body: Option<Json>,
}

#[derive(Debug, Default)]
struct MockServer {
    entities: BTreeMap<String, Json>,
    calls: Vec<Call>,
    next_pid: i64,
}

/// In-memory stand-in for the admin API.
///
/// Behaves like the server for the endpoints this crate uses: entities are
/// stored by path, unknown paths answer 404, and creating an entity that
/// already exists answers 409. Server-assigned `pid`s are handed out on
/// create and user passwords are never echoed back.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    server: Arc<Mutex<MockServer>>,
}

impl MockTransport {
    /// Create an empty mock server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn server(&self) -> MutexGuard<'_, MockServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an entity at a path, as if created out of band.
    pub fn insert(&self, path: impl Into<String>, entity: Json) {
        self.server().entities.insert(path.into(), entity);
    }

    /// Entity currently stored at a path.
    #[must_use]
    pub fn entity(&self, path: &str) -> Option<Json> {
        self.server().entities.get(path).cloned()
    }

    /// Remove an entity, as if deleted out of band.
    pub fn remove(&self, path: &str) -> Option<Json> {
        self.server().entities.remove(path)
    }

    /// Every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.server().calls.clone()
    }

    /// Requests received with the given method.
    #[must_use]
    pub fn calls_with(&self, method: Method) -> Vec<Call> {
        self.server()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }
}

impl MockServer {
    fn assign_pid(&mut self, entity: &mut Json) -> i64 {
        self.next_pid += 1;
        entity["pid"] = Json::from(self.next_pid);
        self.next_pid
    }

    fn create(&mut self, key: String, entity: Json) -> std::result::Result<Json, u16> {
        if self.entities.contains_key(&key) {
            return Err(409);
        }
        self.entities.insert(key, entity.clone());
        Ok(entity)
    }

    fn replace(&mut self, key: &str, mut entity: Json) -> std::result::Result<Json, u16> {
        let Some(existing) = self.entities.get(key) else {
            return Err(404);
        };
        if entity.get("pid").is_none() {
            if let Some(pid) = existing.get("pid") {
                entity["pid"] = pid.clone();
            }
        }
        self.entities.insert(key.to_string(), entity.clone());
        Ok(entity)
    }

    fn collection(&self, prefix: &str) -> Vec<Json> {
        let prefix = format!("{prefix}/");
        self.entities
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix) && !k[prefix.len()..].contains('/'))
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn any_with(&self, prefix: &str, field: &str, value: Option<&Json>) -> bool {
        value.is_some() && self.collection(prefix).iter().any(|e| e.get(field) == value)
    }

    fn handle(&mut self, method: Method, path: &str, body: Option<Json>) -> std::result::Result<Json, u16> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let mut body = body.unwrap_or(Json::Null);

        match (method, segments.as_slice()) {
            (Method::Get, ["openid-connect-servers", node, module]) => Ok(Json::Array(
                self.collection(&format!("/openid-connect-servers/{node}/{module}")),
            )),
            (Method::Get, _) => self.entities.get(path).cloned().ok_or(404),

            (Method::Post, ["module-config", node, module, "create"]) => {
                self.create(format!("/module-config/{node}/{module}"), body)
            }
            (Method::Put, ["module-config", node, module, "set"]) => {
                self.replace(&format!("/module-config/{node}/{module}"), body)
            }
            (Method::Delete, ["module-config", node, module, "archive"]) => self
                .entities
                .remove(&format!("/module-config/{node}/{module}"))
                .ok_or(404),

            (Method::Post, ["openid-connect-clients", ..]) => {
                let client_id = body.get("clientId").and_then(Json::as_str).ok_or(400_u16)?;
                let key = format!("{path}/{client_id}");
                if self.entities.contains_key(&key) {
                    return Err(409);
                }
                self.assign_pid(&mut body);
                self.create(key, body)
            }
            (Method::Post, ["openid-connect-servers", ..]) => {
                if self.any_with(path, "issuer", body.get("issuer")) {
                    return Err(409);
                }
                let pid = self.assign_pid(&mut body);
                self.create(format!("{path}/{pid}"), body)
            }
            (Method::Post, ["user-management", ..]) => {
                if self.any_with(path, "username", body.get("username")) {
                    return Err(409);
                }
                let pid = self.assign_pid(&mut body);
                strip_password(&mut body);
                self.create(format!("{path}/{pid}"), body)
            }
            (Method::Put, ["user-management", ..]) => {
                strip_password(&mut body);
                self.replace(path, body)
            }

            (Method::Put, _) => self.replace(path, body),
            (Method::Delete, _) => self.entities.remove(path).ok_or(404),
            (Method::Post, _) => Err(404),
        }
    }
}

fn strip_password(entity: &mut Json) {
    if let Some(fields) = entity.as_object_mut() {
        fields.remove("password");
    }
}

impl Transport for MockTransport {
    fn send(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<Vec<u8>> {
        let body = body
            .map(serde_json::from_slice::<Json>)
            .transpose()
            .map_err(|e| Error::decode(format!("request body for {path}"), e))?;

        let mut server = self.server();
        server.calls.push(Call {
            method,
            path: path.to_string(),
            body: body.clone(),
        });

        match server.handle(method, path, body) {
            Ok(Json::Null) => Ok(Vec::new()),
            Ok(entity) => serde_json::to_vec(&entity).map_err(|e| Error::decode(path, e)),
            Err(status) => Err(Error::status(method.as_str(), path, status)),
        }
    }
}
