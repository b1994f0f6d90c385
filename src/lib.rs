//! # bridgedb
//!
//! An ordered, all-or-nothing transaction queue over synchronous storage
//! backends.
//!
//! A `Transaction` collects operations into a FIFO queue, starts lazily
//! on the run loop, drains the queue one settled request at a time
//! against a backing session, and then either commits or rolls the whole
//! session back. Callers observe progress through per-request and
//! per-transaction events; a request failure aborts the transaction by
//! default unless a handler prevents it.
//!
//! The engine is single-threaded and cooperative: everything shares one
//! `RunLoop` and nothing here is `Send`. Storage backends plug in through
//! `BackingEngine` and schema owners through `Catalog`.

pub mod error;
pub mod event;
pub mod executor;
pub mod request;
pub mod runloop;
pub mod store;
pub mod transaction;

pub use error::{TxError, TxResult};
pub use event::{Event, EventKind, EventTarget};
pub use request::{ReadyState, Request};
pub use runloop::RunLoop;
pub use store::{
    BackingEngine, BackingSession, Catalog, FinishControls, FinishTask, SessionCallbacks,
    SessionHandle, StoreDescriptor, StoreHandle,
};
pub use transaction::{Lifecycle, Mode, OpArgs, OpContinuations, Operation, Transaction};
