//! Generic module configuration
//!
//! Any module type, configured through raw `{ key, value }` option blocks
//! and `{ module_id, type }` dependency blocks. Only the option keys the
//! config declares are tracked; other options the server holds are left
//! alone.

use super::module::{ModuleReconciler, ModuleType};
use declarative::{AttributeSpec, Check, Schema};
use smilecdr::Client;

pub const KIND: &str = "module_config";

const SPECS: &[AttributeSpec] = &[
    AttributeSpec::string("node_id").default_str("Master").immutable(),
    AttributeSpec::string("module_id")
        .required()
        .immutable()
        .check(Check::NoWhitespace),
    AttributeSpec::string("module_type")
        .required()
        .immutable()
        .check(Check::NoWhitespace),
    AttributeSpec::blocks("options").option_list(),
    AttributeSpec::blocks("dependencies").dependency_list(),
];

pub const SCHEMA: Schema = Schema::new(KIND, SPECS);

pub fn reconciler(client: Client) -> ModuleReconciler {
    ModuleReconciler::new(SCHEMA, ModuleType::Attribute, client)
}
