//! Catalog contract and store descriptors

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::TxError;
use crate::event::EventTarget;
use crate::store::StoreHandle;
use crate::transaction::Transaction;

/// Schema metadata for one named store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDescriptor {
    /// The store's current name
    pub name: String,
    /// Key path used to derive record keys, if any
    pub key_path: Option<String>,
    /// Whether the store generates keys itself
    pub auto_increment: bool,
    /// Names of the store's indexes
    pub index_names: Vec<String>,
}

/// The schema owner a transaction operates against.
///
/// The catalog resolves store names, manufactures per-transaction store
/// handles, restores schema snapshots when a schema-change transaction
/// aborts, and absorbs faults that surface after a transaction has
/// already finished and can no longer carry them through its own events.
pub trait Catalog {
    /// Look up the descriptor for a store name, if it exists
    fn lookup(&self, name: &str) -> Option<StoreDescriptor>;

    /// Manufacture the per-transaction handle for a store
    fn clone_for_transaction(
        &self,
        descriptor: &StoreDescriptor,
        transaction: &Rc<Transaction>,
    ) -> Rc<StoreHandle>;

    /// Restore schema metadata to its pre-transaction snapshot. Called
    /// only when a schema-change transaction aborts.
    fn restore_schema_snapshot(&self);

    /// Parent target for the bubble phase of transaction events
    fn event_target(&self) -> Option<Rc<EventTarget>> {
        None
    }

    /// Receive a fault that can no longer be routed through a live
    /// transaction (e.g. a handler fault after commit)
    fn unrecoverable_fault(&self, error: TxError);
}
