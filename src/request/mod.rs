//! Request subsystem for bridgedb
//!
//! A `Request` is the caller-visible result holder for one queued
//! operation: a ready state, a result or an error (mutually exclusive),
//! and an event target whose parent is the owning transaction.
//!
//! The `Pending -> Done` transition happens exactly once. Once `Done`, a
//! request is never re-executed or re-dispatched; late callbacks from
//! already-aborted operations are discarded against this guard.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::error::{TxError, TxResult};
use crate::event::{Event, EventKind, EventTarget};
use crate::store::StoreHandle;
use crate::transaction::Transaction;

/// Observable lifecycle of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Queued or in flight
    Pending,
    /// Terminal: carries either a result or an error
    Done,
}

/// The observable result holder for one queued operation
pub struct Request {
    ready_state: Cell<ReadyState>,
    result: RefCell<Option<Value>>,
    error: RefCell<Option<TxError>>,
    transaction: RefCell<Weak<Transaction>>,
    source: RefCell<Option<Rc<StoreHandle>>>,
    target: Rc<EventTarget>,
}

impl Request {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            ready_state: Cell::new(ReadyState::Pending),
            result: RefCell::new(None),
            error: RefCell::new(None),
            transaction: RefCell::new(Weak::new()),
            source: RefCell::new(None),
            target: Rc::new(EventTarget::new()),
        })
    }

    /// Wire the request into its owning transaction: back-reference,
    /// bubble parent, and the shared internal-dispatch flag.
    pub(crate) fn attach(&self, transaction: &Rc<Transaction>, source: Option<Rc<StoreHandle>>) {
        *self.transaction.borrow_mut() = Rc::downgrade(transaction);
        *self.source.borrow_mut() = source;
        self.target.set_parent(transaction.target());
        self.target.bind_internal_flag(transaction.internal_flag());
    }

    /// The request's ready state
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    /// Whether the request has reached its terminal state
    pub fn is_done(&self) -> bool {
        self.ready_state.get() == ReadyState::Done
    }

    /// The result, once `Done` and successful
    pub fn result(&self) -> Option<Value> {
        self.result.borrow().clone()
    }

    /// The error, once `Done` and failed
    pub fn error(&self) -> Option<TxError> {
        self.error.borrow().clone()
    }

    /// The transaction this request belongs to, if still alive
    pub fn transaction(&self) -> Option<Rc<Transaction>> {
        self.transaction.borrow().upgrade()
    }

    /// The store handle this request was issued against, if any
    pub fn source(&self) -> Option<Rc<StoreHandle>> {
        self.source.borrow().clone()
    }

    /// The request's event target
    pub fn target(&self) -> &Rc<EventTarget> {
        &self.target
    }

    /// Register a `success` handler
    pub fn on_success(&self, handler: impl FnMut(&mut Event) -> TxResult<()> + 'static) {
        self.target.on(EventKind::Success, handler);
    }

    /// Register an `error` handler. Preventing the event's default action
    /// tells the engine to continue the transaction despite the failure.
    pub fn on_error(&self, handler: impl FnMut(&mut Event) -> TxResult<()> + 'static) {
        self.target.on(EventKind::Error, handler);
    }

    /// Mark done with a result
    pub(crate) fn resolve(&self, result: Value) {
        self.ready_state.set(ReadyState::Done);
        *self.result.borrow_mut() = Some(result);
        *self.error.borrow_mut() = None;
    }

    /// Mark done with an error
    pub(crate) fn reject(&self, error: TxError) {
        self.ready_state.set(ReadyState::Done);
        *self.result.borrow_mut() = None;
        *self.error.borrow_mut() = Some(error);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("ready_state", &self.ready_state.get())
            .field("result", &*self.result.borrow())
            .field("error", &*self.error.borrow())
            .finish()
    }
}
