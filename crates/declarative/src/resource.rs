//! Reconciler trait for remote resource kinds
//!
//! A Reconciler drives one kind of remote entity through its lifecycle:
//! absent, created, read back, updated in place, and finally destroyed.
//! The engine never talks to a server itself; it only calls these methods.

use crate::schema::Schema;
use crate::value::Attributes;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Create/read/update/delete driver for one resource kind
///
/// Implementations are stateless apart from a shared client, so one
/// instance serves every declared resource of its kind.
///
/// # Example
///
/// ```ignore
/// use declarative::{Attributes, Reconciler, Schema};
///
/// #[derive(Debug)]
/// struct NoteReconciler { store: Arc<NoteStore> }
///
/// impl Reconciler for NoteReconciler {
///     fn kind(&self) -> &'static str { "note" }
///     fn schema(&self) -> Schema { Schema::new("note", NOTE_SPECS) }
///     fn import_id(&self, state: &Attributes) -> String { state.str_or_empty("title") }
///
///     fn create(&self, desired: &Attributes) -> Result<Attributes> {
///         self.store.insert(desired)?;
///         self.read(desired)?.ok_or_else(|| anyhow::anyhow!("note vanished"))
///     }
///     // read, update, destroy, import ...
/// }
/// ```
pub trait Reconciler: Send + Sync + fmt::Debug {
    /// Resource kind name, the first half of an address
    fn kind(&self) -> &'static str;

    /// Attribute table for this kind
    fn schema(&self) -> Schema;

    /// Natural key of a stored resource, in the form `import` accepts
    fn import_id(&self, state: &Attributes) -> String;

    /// Create the remote entity and return its state as read back
    fn create(&self, desired: &Attributes) -> Result<Attributes>;

    /// Read the remote entity addressed by prior state
    ///
    /// Returns `Ok(None)` when the server no longer has it.
    fn read(&self, prior: &Attributes) -> Result<Option<Attributes>>;

    /// Update the remote entity in place and return the refreshed state
    fn update(&self, desired: &Attributes, prior: &Attributes) -> Result<Attributes>;

    /// Remove (or archive) the remote entity
    fn destroy(&self, prior: &Attributes) -> Result<()>;

    /// Adopt an existing remote entity by natural key
    fn import(&self, id: &str) -> Result<Attributes>;

    /// Whether resources of this kind can be applied in parallel
    ///
    /// Override to return false for kinds whose server-side writes
    /// must not interleave.
    fn can_parallelize(&self) -> bool {
        true
    }
}

/// A shared reconciler for type-erased storage
pub type SharedReconciler = Arc<dyn Reconciler>;
