//! User accounts in a local security module
//!
//! Users are addressed by the `pid` the server assigns on create. The
//! password is write-only: reads never return it, so state keeps the
//! configured value.

use super::{
    DEFAULT_NODE_ID, found, opt_str, permissions_from_blocks, permissions_to_blocks, require_str, set_some,
    split_id,
};
use anyhow::{Context, Result, anyhow};
use declarative::{AttributeSpec, Attributes, Check, Reconciler, Schema};
use smilecdr::{Client, User};

pub const KIND: &str = "user";

const DEFAULT_MODULE_ID: &str = "local_security";
const IMPORT_FORMAT: &str = "{nodeId}/{moduleId}/{pid}";

const SPECS: &[AttributeSpec] = &[
    AttributeSpec::integer("pid").computed(),
    AttributeSpec::string("node_id").default_str(DEFAULT_NODE_ID).immutable(),
    AttributeSpec::string("module_id").default_str(DEFAULT_MODULE_ID).immutable(),
    AttributeSpec::string("username")
        .required()
        .immutable()
        .check(Check::NoWhitespace),
    AttributeSpec::string("password")
        .required()
        .sensitive()
        .check(Check::LenBetween(8, 512)),
    AttributeSpec::string("family_name"),
    AttributeSpec::string("given_name"),
    AttributeSpec::boolean("account_locked"),
    AttributeSpec::boolean("account_disabled"),
    AttributeSpec::boolean("system_user"),
    AttributeSpec::boolean("external"),
    AttributeSpec::boolean("service_account"),
    AttributeSpec::string("two_factor_auth_status").computed(),
    AttributeSpec::blocks("authorities"),
    AttributeSpec::string("last_active").computed(),
    AttributeSpec::string("last_connected").computed(),
];

pub const SCHEMA: Schema = Schema::new(KIND, SPECS);

fn node_id(attrs: &Attributes) -> &str {
    attrs.str("node_id").unwrap_or(DEFAULT_NODE_ID)
}

fn module_id(attrs: &Attributes) -> &str {
    attrs.str("module_id").unwrap_or(DEFAULT_MODULE_ID)
}

fn to_entity(attrs: &Attributes, pid: Option<i64>) -> Result<User> {
    Ok(User {
        pid,
        node_id: node_id(attrs).to_string(),
        module_id: module_id(attrs).to_string(),
        username: require_str(attrs, "username")?.to_string(),
        password: opt_str(attrs, "password"),
        family_name: opt_str(attrs, "family_name"),
        given_name: opt_str(attrs, "given_name"),
        account_locked: attrs.bool("account_locked"),
        account_disabled: attrs.bool("account_disabled"),
        system_user: attrs.bool("system_user"),
        external: attrs.bool("external"),
        service_account: attrs.bool("service_account"),
        two_factor_auth_status: None,
        authorities: attrs.blocks("authorities").map(permissions_from_blocks),
        last_connected: None,
        last_active: None,
    })
}

fn from_entity(user: &User, node_id: &str, module_id: &str) -> Attributes {
    let mut attrs = Attributes::new();
    set_some(&mut attrs, "pid", user.pid);
    attrs.set_remote("node_id", node_id);
    attrs.set_remote("module_id", module_id);
    attrs.set_remote("username", user.username.as_str());
    set_some(&mut attrs, "family_name", user.family_name.clone());
    set_some(&mut attrs, "given_name", user.given_name.clone());
    set_some(&mut attrs, "account_locked", user.account_locked);
    set_some(&mut attrs, "account_disabled", user.account_disabled);
    set_some(&mut attrs, "system_user", user.system_user);
    set_some(&mut attrs, "external", user.external);
    set_some(&mut attrs, "service_account", user.service_account);
    set_some(&mut attrs, "two_factor_auth_status", user.two_factor_auth_status.clone());
    attrs.set_remote(
        "authorities",
        permissions_to_blocks(user.authorities.as_deref().unwrap_or_default()),
    );
    set_some(&mut attrs, "last_active", user.last_active.clone());
    set_some(&mut attrs, "last_connected", user.last_connected.clone());
    attrs
}

fn require_pid(attrs: &Attributes) -> Result<i64> {
    attrs
        .int("pid")
        .ok_or_else(|| anyhow!("user {} has no pid in state", attrs.str_or_empty("username")))
}

#[derive(Debug, Clone)]
pub struct UserReconciler {
    client: Client,
}

impl UserReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn fetch(&self, node_id: &str, module_id: &str, pid: i64) -> Result<Option<Attributes>> {
        let user = found(self.client.get_user(node_id, module_id, pid))
            .with_context(|| format!("reading user {pid}"))?;
        Ok(user.map(|u| from_entity(&u, node_id, module_id)))
    }

    /// Read `pid` back, merged over `base`
    fn refresh(&self, base: &Attributes, pid: i64) -> Result<Option<Attributes>> {
        let remote = self.fetch(node_id(base), module_id(base), pid)?;
        Ok(remote.map(|r| SCHEMA.merge_remote(base, r)))
    }

    fn read_back(&self, desired: &Attributes, pid: i64) -> Result<Attributes> {
        self.refresh(desired, pid)?.with_context(|| {
            format!("user {} not found after write", desired.str_or_empty("username"))
        })
    }
}

impl Reconciler for UserReconciler {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn schema(&self) -> Schema {
        SCHEMA
    }

    fn import_id(&self, state: &Attributes) -> String {
        let pid = state.int("pid").map(|p| p.to_string()).unwrap_or_default();
        format!("{}/{}/{pid}", node_id(state), module_id(state))
    }

    fn create(&self, desired: &Attributes) -> Result<Attributes> {
        let user = to_entity(desired, None)?;
        let stored = self
            .client
            .create_user(&user)
            .with_context(|| format!("creating user {}", user.username))?;
        let pid = stored
            .pid
            .with_context(|| format!("server returned no pid for user {}", user.username))?;

        // the user exists now; losing the pid would leave it untracked
        match self.read_back(desired, pid) {
            Ok(attrs) => Ok(attrs),
            Err(e) => {
                log::warn!("User {} created with pid {pid} but could not be read back: {e:#}", user.username);
                let mut attrs = desired.clone();
                for (name, value) in from_entity(&stored, node_id(desired), module_id(desired)).iter() {
                    attrs.set_remote(name, value.clone());
                }
                attrs.set_remote("pid", pid);
                Ok(attrs)
            }
        }
    }

    fn read(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        self.refresh(prior, require_pid(prior)?)
    }

    fn update(&self, desired: &Attributes, prior: &Attributes) -> Result<Attributes> {
        let pid = require_pid(prior)?;
        let user = to_entity(desired, Some(pid))?;
        self.client
            .update_user(&user)
            .with_context(|| format!("updating user {}", user.username))?;
        self.read_back(desired, pid)
    }

    fn destroy(&self, prior: &Attributes) -> Result<()> {
        let pid = require_pid(prior)?;
        self.client
            .delete_user(node_id(prior), module_id(prior), pid)
            .with_context(|| format!("deleting user {}", prior.str_or_empty("username")))?;
        Ok(())
    }

    fn import(&self, id: &str) -> Result<Attributes> {
        let parts = split_id(KIND, id, 3, IMPORT_FORMAT)?;
        let pid: i64 = parts[2]
            .parse()
            .map_err(|_| smilecdr::Error::invalid_import_id(KIND, id, IMPORT_FORMAT))?;
        self.fetch(parts[0], parts[1], pid)?
            .with_context(|| format!("user {id} not found"))
    }
}
