//! Generic reconciler for module-configuration-backed kinds
//!
//! A kind is a schema plus a module type. Creates and updates rebuild the
//! whole module configuration from attributes; reads map the stored
//! options back without applying defaults.

use super::{DEFAULT_NODE_ID, found, require_str, split_id};
use anyhow::{Context, Result};
use declarative::{Attributes, Reconciler, Schema};
use smilecdr::{Client, ModuleConfig, from_module_config, to_module_config};

/// Where a kind's module type comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    /// Fixed for the kind
    Fixed(&'static str),
    /// Taken from the `module_type` attribute
    Attribute,
}

const IMPORT_FORMAT: &str = "{nodeId}/{moduleId}";

#[derive(Debug, Clone)]
pub struct ModuleReconciler {
    schema: Schema,
    module_type: ModuleType,
    client: Client,
}

impl ModuleReconciler {
    pub fn new(schema: Schema, module_type: ModuleType, client: Client) -> Self {
        Self {
            schema,
            module_type,
            client,
        }
    }

    fn node_id(attrs: &Attributes) -> &str {
        attrs.str("node_id").unwrap_or(DEFAULT_NODE_ID)
    }

    fn module_type<'a>(&self, attrs: &'a Attributes) -> Result<&'a str> {
        match self.module_type {
            ModuleType::Fixed(module_type) => Ok(module_type),
            ModuleType::Attribute => require_str(attrs, "module_type"),
        }
    }

    fn build(&self, attrs: &Attributes) -> Result<ModuleConfig> {
        let module_id = require_str(attrs, "module_id")?;
        let config = to_module_config(attrs, &self.schema, module_id, self.module_type(attrs)?)
            .with_context(|| format!("building module configuration for {module_id}"))?;
        Ok(config)
    }

    /// Fetch a module and map it back to attributes
    fn fetch(&self, node_id: &str, module_id: &str) -> Result<Option<Attributes>> {
        let Some(config) = found(self.client.get_module_config(node_id, module_id))? else {
            return Ok(None);
        };

        if let ModuleType::Fixed(expected) = self.module_type {
            if config.module_type != expected {
                log::warn!(
                    "{node_id}/{module_id} is a {} module, expected {expected}",
                    config.module_type
                );
            }
        }

        let mut attrs = from_module_config(&config, &self.schema)
            .with_context(|| format!("reading module {node_id}/{module_id}"))?;
        attrs.set_remote("node_id", node_id);
        attrs.set_remote("module_id", config.module_id.as_str());
        if self.module_type == ModuleType::Attribute {
            attrs.set_remote("module_type", config.module_type.as_str());
        }
        Ok(Some(attrs))
    }

    fn refresh(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        let module_id = require_str(prior, "module_id")?;
        let Some(mut remote) = self.fetch(Self::node_id(prior), module_id)? else {
            return Ok(None);
        };
        self.schema.scope_option_lists(&mut remote, prior);
        Ok(Some(self.schema.merge_remote(prior, remote)))
    }

    fn read_back(&self, desired: &Attributes) -> Result<Attributes> {
        self.refresh(desired)?.with_context(|| {
            format!(
                "module {}/{} not found after write",
                Self::node_id(desired),
                desired.str_or_empty("module_id")
            )
        })
    }
}

impl Reconciler for ModuleReconciler {
    fn kind(&self) -> &'static str {
        self.schema.kind()
    }

    fn schema(&self) -> Schema {
        self.schema
    }

    fn import_id(&self, state: &Attributes) -> String {
        format!("{}/{}", Self::node_id(state), state.str_or_empty("module_id"))
    }

    fn create(&self, desired: &Attributes) -> Result<Attributes> {
        let config = self.build(desired)?;
        self.client
            .create_module_config(Self::node_id(desired), &config)
            .with_context(|| format!("creating module {}", config.module_id))?;
        self.read_back(desired)
    }

    fn read(&self, prior: &Attributes) -> Result<Option<Attributes>> {
        self.refresh(prior)
    }

    fn update(&self, desired: &Attributes, _prior: &Attributes) -> Result<Attributes> {
        let config = self.build(desired)?;
        self.client
            .update_module_config(Self::node_id(desired), &config)
            .with_context(|| format!("updating module {}", config.module_id))?;
        self.read_back(desired)
    }

    fn destroy(&self, prior: &Attributes) -> Result<()> {
        let module_id = require_str(prior, "module_id")?;
        self.client
            .delete_module_config(Self::node_id(prior), module_id)
            .with_context(|| format!("deleting module {module_id}"))?;
        Ok(())
    }

    fn import(&self, id: &str) -> Result<Attributes> {
        let parts = split_id(self.kind(), id, 2, IMPORT_FORMAT)?;
        self.fetch(parts[0], parts[1])?
            .with_context(|| format!("module {id} not found"))
    }
}
