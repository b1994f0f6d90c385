//! Per-transaction store handles

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::catalog::StoreDescriptor;

/// A transaction-scoped view of one store.
///
/// The handle's identity is stable for the transaction's lifetime: asking
/// the transaction for the same store twice yields the same `Rc`, unless
/// the store was deleted and recreated in between. Original names are
/// kept alongside current ones so an aborted schema-change transaction
/// can undo renames.
pub struct StoreHandle {
    name: RefCell<String>,
    original_name: String,
    index_names: RefCell<Vec<String>>,
    original_index_names: Vec<String>,
    deleted: Cell<bool>,
}

impl StoreHandle {
    /// Build a handle from the catalog's descriptor
    pub fn from_descriptor(descriptor: &StoreDescriptor) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(descriptor.name.clone()),
            original_name: descriptor.name.clone(),
            index_names: RefCell::new(descriptor.index_names.clone()),
            original_index_names: descriptor.index_names.clone(),
            deleted: Cell::new(false),
        })
    }

    /// The store's current name
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// The name the store had when this transaction began
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Rename the store within this transaction's view
    pub fn rename(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    /// Current index names
    pub fn index_names(&self) -> Vec<String> {
        self.index_names.borrow().clone()
    }

    /// Replace the index name list
    pub fn set_index_names(&self, names: Vec<String>) {
        *self.index_names.borrow_mut() = names;
    }

    /// Mark the handle as referring to a deleted store. The transaction
    /// will manufacture a fresh handle if the name is requested again.
    pub fn mark_deleted(&self) {
        self.deleted.set(true);
    }

    /// Whether the underlying store was deleted through this handle
    pub fn is_deleted(&self) -> bool {
        self.deleted.get()
    }

    /// Undo renames made during the transaction. Used on schema-change
    /// abort, alongside the catalog's snapshot restore.
    pub(crate) fn restore_original_names(&self) {
        *self.name.borrow_mut() = self.original_name.clone();
        *self.index_names.borrow_mut() = self.original_index_names.clone();
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("name", &*self.name.borrow())
            .field("original_name", &self.original_name)
            .field("index_names", &*self.index_names.borrow())
            .field("deleted", &self.deleted.get())
            .finish()
    }
}
