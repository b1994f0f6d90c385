//! Transaction subsystem for bridgedb
//!
//! The controller owns one transaction's lifecycle from deferred start
//! through completion or abort; `Mode` and `Lifecycle` describe it, and
//! the queue types define the operation contract callers enqueue against.

mod controller;
mod mode;
mod queue;

pub use controller::Transaction;
pub use mode::{Lifecycle, Mode};
pub use queue::{OpArgs, OpContinuations, Operation};
