//! Request queue executor
//!
//! Drains a transaction's queue strictly in order against an open backing
//! session. Each entry runs to a settled outcome (success or error event
//! fully dispatched) before the cursor moves; handlers running during
//! those dispatches may append new entries, which the cursor picks up
//! because the queue is re-measured on every step.
//!
//! Late callbacks are a fact of life with continuation-driven backends:
//! every path in here re-checks the transaction's settled state and the
//! current request's `Done` guard before acting, and stale callbacks fall
//! through to nothing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;
use tracing::error;

use crate::error::TxError;
use crate::event::{Event, EventKind};
use crate::request::Request;
use crate::store::SessionHandle;
use crate::transaction::{OpContinuations, Transaction};

/// Drives one transaction's queue over one open session
pub struct QueueExecutor {
    transaction: Rc<Transaction>,
    session: SessionHandle,
    cursor: Cell<Option<usize>>,
    current: RefCell<Option<Rc<Request>>>,
}

impl QueueExecutor {
    /// Start draining the transaction's queue
    pub(crate) fn run(transaction: Rc<Transaction>, session: SessionHandle) {
        let executor = Rc::new(Self {
            transaction,
            session,
            cursor: Cell::new(None),
            current: RefCell::new(None),
        });
        executor.advance();
    }

    /// Move the cursor to the next entry and execute it
    fn advance(self: &Rc<Self>) {
        if self.transaction.is_settled_for_queue() {
            return;
        }
        let next = self.cursor.get().map_or(0, |i| i + 1);
        self.cursor.set(Some(next));

        if next >= self.transaction.queue_len() {
            self.transaction.clear_queue();
            if self.transaction.is_active() {
                self.transaction.on_queue_drained();
            }
            return;
        }

        let Some((op, args, request)) = self.transaction.take_entry(next) else {
            return;
        };
        *self.current.borrow_mut() = request.clone();
        if let Some(request) = &request {
            // Already settled by an earlier abort; the slot is inert
            if request.is_done() {
                return;
            }
        }
        let Some(op) = op else {
            return;
        };

        let continuations = self.continuations(request.is_some());
        if let Err(err) = op(&self.session, &args, continuations) {
            self.on_error(err);
        }
    }

    fn continuations(self: &Rc<Self>, has_request: bool) -> OpContinuations {
        let success: Box<dyn FnOnce(Value, Option<Rc<Request>>)> = if has_request {
            let executor = Rc::clone(self);
            Box::new(move |result, request_override| {
                executor.on_success(result, request_override);
            })
        } else {
            // Fire-and-forget: nothing to settle, just keep draining
            let executor = Rc::clone(self);
            Box::new(move |_, _| executor.advance())
        };
        let error: Box<dyn FnOnce(TxError)> = {
            let executor = Rc::clone(self);
            Box::new(move |err| executor.on_error(err))
        };
        let advance: Box<dyn FnOnce()> = {
            let executor = Rc::clone(self);
            Box::new(move || executor.advance())
        };
        OpContinuations {
            success,
            error,
            advance: Some(advance),
        }
    }

    fn on_success(self: &Rc<Self>, result: Value, request_override: Option<Rc<Request>>) {
        if self.transaction.is_settled_for_queue() {
            return;
        }
        if let Some(request) = request_override {
            *self.current.borrow_mut() = Some(request);
        }
        let Some(request) = self.current.borrow().clone() else {
            return;
        };
        if request.is_done() {
            return;
        }
        request.resolve(result);

        let mut event = Event::new(EventKind::Success);
        let outcome = self
            .transaction
            .dispatch_internal(request.target(), &mut event, true);
        if let Some(fault) = outcome.fault {
            error!(error = %fault, "success handler fault");
            self.transaction
                .abort_with(Some(TxError::abort("a request was aborted")));
            return;
        }
        self.advance();
    }

    fn on_error(self: &Rc<Self>, err: TxError) {
        if self.transaction.is_settled_for_queue() {
            return;
        }
        let Some(request) = self.current.borrow().clone() else {
            // No request observes this entry; the failure goes straight to
            // the transaction.
            self.transaction.abort_with(Some(err));
            return;
        };
        if request.is_done() {
            return;
        }
        request.reject(err.clone());

        // The default action aborts the transaction with the request's
        // error. A handler that prevents the default keeps the queue
        // moving instead; the late listener sees the final verdict after
        // the full bubble phase.
        {
            let executor = Rc::clone(self);
            request
                .target()
                .add_late_listener(EventKind::Error, move |event| {
                    if event.cancelable() && event.default_prevented() {
                        executor.advance();
                    }
                });
        }
        {
            let transaction = Rc::clone(&self.transaction);
            let observed = Rc::clone(&request);
            request
                .target()
                .add_default_listener(EventKind::Error, move |_| {
                    transaction.abort_with(observed.error());
                });
        }

        let mut event = Event::error_event(err);
        let outcome = self
            .transaction
            .dispatch_internal(request.target(), &mut event, true);
        if let Some(fault) = outcome.fault {
            error!(error = %fault, "error handler fault");
            self.transaction
                .abort_with(Some(TxError::abort("a request was aborted")));
        }
    }
}
