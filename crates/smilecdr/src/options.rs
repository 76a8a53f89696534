//! Mapping between typed attributes and a module's option list.
//!
//! Module-backed resource kinds are flat attribute tables. Each attribute
//! with an option role lands in the module configuration as one string
//! `{key, value}` pair under its remote key; dependency roles become
//! dependency edges. The reverse direction parses the strings back into
//! the declared types and never applies defaults, so an option the server
//! does not hold stays absent.

use crate::model::{ModuleConfig, ModuleDependency, ModuleOption};
use declarative::{Attributes, Block, Role, Schema, Source, Value, ValueError};

const BLOCK_KEY: &str = "key";
const BLOCK_VALUE: &str = "value";
const BLOCK_MODULE_ID: &str = "module_id";
const BLOCK_TYPE: &str = "type";

/// Build the module configuration for a set of attributes.
///
/// Options are emitted in schema declaration order, one per present
/// attribute, whatever the attribute's source.
pub fn to_module_config(
    attrs: &Attributes,
    schema: &Schema,
    module_id: &str,
    module_type: &str,
) -> Result<ModuleConfig, ValueError> {
    let mut config = ModuleConfig::new(module_id, module_type);

    for spec in schema.specs() {
        let Some(value) = attrs.get(spec.name) else {
            continue;
        };
        match spec.role {
            Role::Option => {
                let text = value.to_option_string(spec.name, spec.join)?;
                config.push_option(spec.remote_key(), text);
            }
            Role::OptionList => {
                for block in blocks_of(spec.name, value)? {
                    config.push_option(field(block, BLOCK_KEY), field(block, BLOCK_VALUE));
                }
            }
            Role::Dependency { dep_type } => {
                let target = value.to_option_string(spec.name, spec.join)?;
                if !target.is_empty() {
                    config.dependencies.push(ModuleDependency {
                        module_id: target,
                        dep_type: dep_type.to_string(),
                    });
                }
            }
            Role::DependencyList => {
                for block in blocks_of(spec.name, value)? {
                    config.dependencies.push(ModuleDependency {
                        module_id: field(block, BLOCK_MODULE_ID),
                        dep_type: field(block, BLOCK_TYPE),
                    });
                }
            }
            Role::Field | Role::Computed => {}
        }
    }

    Ok(config)
}

/// Read typed attributes back out of a module configuration.
///
/// Every value found is marked [`Source::Remote`]. Attributes whose key is
/// missing are left unset.
pub fn from_module_config(config: &ModuleConfig, schema: &Schema) -> Result<Attributes, ValueError> {
    let mut attrs = Attributes::new();

    for spec in schema.specs() {
        match spec.role {
            Role::Option => {
                if let Some(raw) = config.lookup_option_ok(spec.remote_key()) {
                    let value = Value::parse_option(spec.remote_key(), raw, spec.kind, spec.join)?;
                    attrs.insert(spec.name, value, Source::Remote);
                }
            }
            Role::OptionList => {
                let blocks = config.options.iter().map(option_block).collect::<Vec<_>>();
                attrs.set_remote(spec.name, blocks);
            }
            Role::Dependency { dep_type } => {
                if let Some(target) = config.dependency(dep_type) {
                    attrs.set_remote(spec.name, target);
                }
            }
            Role::DependencyList => {
                let blocks = config.dependencies.iter().map(dependency_block).collect::<Vec<_>>();
                attrs.set_remote(spec.name, blocks);
            }
            Role::Field | Role::Computed => {}
        }
    }

    Ok(attrs)
}

fn blocks_of<'a>(name: &str, value: &'a Value) -> Result<&'a [Block], ValueError> {
    value.as_blocks().ok_or_else(|| ValueError::TypeMismatch {
        name: name.to_string(),
        expected: declarative::ValueType::Blocks,
        found: value.value_type(),
    })
}

fn field(block: &Block, key: &str) -> String {
    block.get(key).cloned().unwrap_or_default()
}

fn option_block(option: &ModuleOption) -> Block {
    Block::from([
        (BLOCK_KEY.to_string(), option.key.clone()),
        (BLOCK_VALUE.to_string(), option.value.clone()),
    ])
}

fn dependency_block(dependency: &ModuleDependency) -> Block {
    Block::from([
        (BLOCK_MODULE_ID.to_string(), dependency.module_id.clone()),
        (BLOCK_TYPE.to_string(), dependency.dep_type.clone()),
    ])
}
