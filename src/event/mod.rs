//! Event subsystem for bridgedb
//!
//! A minimal observer bus with the three capabilities the engine needs:
//!
//! - A bubble phase to a declared parent target
//! - Cancelable events whose default action callers may prevent
//! - An internal-dispatch flag so a fault raised by a caller-supplied
//!   handler during an engine-initiated dispatch can be surfaced to the
//!   engine, while faults during external dispatches only hit the log
//!
//! Handlers signal a fault by returning `Err`; the dispatcher never lets
//! one corrupt engine state or go silently missing.

mod event;
mod target;

pub use event::{Event, EventKind};
pub use target::{DispatchOutcome, EventTarget};
