//! Store collaborator contracts for bridgedb
//!
//! The engine does not own a catalog or a storage backend; it consumes
//! both through the traits defined here:
//!
//! - `BackingEngine` / `BackingSession`: the synchronous, session-oriented
//!   storage engine, driven entirely through continuations
//! - `Catalog`: the schema layer that looks up store descriptors, clones
//!   per-transaction handles, and absorbs faults the event chain can no
//!   longer carry
//!
//! `StoreHandle` is the one piece the engine does own: the per-transaction
//! clone whose identity stays stable for the transaction's lifetime and
//! whose name bookkeeping makes schema-change rollback possible.

mod catalog;
mod engine;
mod handle;

pub use catalog::{Catalog, StoreDescriptor};
pub use engine::{
    BackingEngine, BackingSession, FinishControls, FinishTask, SessionCallbacks, SessionHandle,
};
pub use handle::StoreHandle;
