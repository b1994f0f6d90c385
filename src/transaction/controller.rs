//! Transaction controller
//!
//! Owns the lifecycle of one transaction: deferred start, the request
//! queue, store handle memoization, completion sequencing against the
//! backing session, and the abort path with its ordered error synthesis.
//!
//! State is split between a coarse `Lifecycle` for observers and a set
//! of independent flags the sequencing logic actually runs on. The
//! `active` flag is the request placement window: raised at creation and
//! again around each internal event dispatch, lowered for good once the
//! queue drains or the transaction fails.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error};

use crate::error::{TxError, TxResult};
use crate::event::{DispatchOutcome, Event, EventKind, EventTarget};
use crate::executor::QueueExecutor;
use crate::request::Request;
use crate::runloop::RunLoop;
use crate::store::{
    BackingEngine, Catalog, FinishControls, SessionCallbacks, SessionHandle, StoreHandle,
};
use crate::transaction::mode::{Lifecycle, Mode};
use crate::transaction::queue::{OpArgs, Operation, QueueEntry};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An ordered, all-or-nothing unit of work against the backing store
pub struct Transaction {
    id: u64,
    mode: Mode,
    scope: Vec<String>,
    owner: Rc<dyn Catalog>,
    engine: Rc<dyn BackingEngine>,
    run_loop: Rc<RunLoop>,

    lifecycle: Cell<Lifecycle>,
    active: Cell<bool>,
    running: Cell<bool>,
    errored: Cell<bool>,
    requests_finished: Cell<bool>,
    completed: Cell<bool>,
    backing_finished: Cell<bool>,
    internal: Rc<Cell<bool>>,

    error: RefCell<Option<TxError>>,
    queue: RefCell<Vec<QueueEntry>>,
    handles: RefCell<HashMap<String, Rc<StoreHandle>>>,
    session: RefCell<Option<SessionHandle>>,
    finish_controls: RefCell<Option<FinishControls>>,
    pending_completion: RefCell<Option<Box<dyn FnOnce()>>>,
    target: Rc<EventTarget>,
}

impl Transaction {
    /// Create a transaction and schedule its start on the run loop.
    ///
    /// The transaction is immediately active: requests placed before the
    /// deferred start runs are queued and executed once the session opens.
    pub fn begin(
        owner: Rc<dyn Catalog>,
        engine: Rc<dyn BackingEngine>,
        run_loop: Rc<RunLoop>,
        scope: Vec<String>,
        mode: Mode,
    ) -> Rc<Self> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let internal = Rc::new(Cell::new(false));
        let target = Rc::new(EventTarget::new());
        target.bind_internal_flag(Rc::clone(&internal));
        if let Some(parent) = owner.event_target() {
            target.set_parent(&parent);
        }

        let transaction = Rc::new(Self {
            id,
            mode,
            scope,
            owner,
            engine,
            run_loop: Rc::clone(&run_loop),
            lifecycle: Cell::new(Lifecycle::Active),
            active: Cell::new(true),
            running: Cell::new(false),
            errored: Cell::new(false),
            requests_finished: Cell::new(false),
            completed: Cell::new(false),
            backing_finished: Cell::new(false),
            internal,
            error: RefCell::new(None),
            queue: RefCell::new(Vec::new()),
            handles: RefCell::new(HashMap::new()),
            session: RefCell::new(None),
            finish_controls: RefCell::new(None),
            pending_completion: RefCell::new(None),
            target,
        });
        debug!(id, mode = %mode, "transaction created");

        let weak = Rc::downgrade(&transaction);
        run_loop.defer(move || {
            if let Some(transaction) = weak.upgrade() {
                transaction.start();
            }
        });
        transaction
    }

    // ------------------------------------------------------------------
    // Caller surface
    // ------------------------------------------------------------------

    /// Queue an operation and return the request observing its outcome
    pub fn enqueue(
        self: &Rc<Self>,
        op: Operation,
        args: OpArgs,
        source: Option<Rc<StoreHandle>>,
    ) -> TxResult<Rc<Request>> {
        self.assert_active()?;
        let request = Request::new();
        request.attach(self, source);
        self.queue.borrow_mut().push(QueueEntry {
            op: Some(op),
            args,
            request: Some(Rc::clone(&request)),
        });
        Ok(request)
    }

    /// Queue a fire-and-forget operation with no observable request.
    /// Its failure still aborts the transaction.
    pub fn enqueue_without_result(self: &Rc<Self>, op: Operation, args: OpArgs) -> TxResult<()> {
        self.assert_active()?;
        self.queue.borrow_mut().push(QueueEntry {
            op: Some(op),
            args,
            request: None,
        });
        Ok(())
    }

    /// The per-transaction handle for a store in this transaction's scope.
    ///
    /// Handles are memoized: the same name yields the same handle for the
    /// transaction's lifetime, unless the store was deleted through it.
    pub fn handle(self: &Rc<Self>, name: &str) -> TxResult<Rc<StoreHandle>> {
        if !self.active.get() {
            return Err(TxError::invalid_state(
                "a request was placed against a transaction which is currently not active, \
                 or which is finished",
            ));
        }
        if self.mode != Mode::SchemaChange && !self.scope.iter().any(|s| s == name) {
            return Err(TxError::not_found(format!(
                "{name} is not participating in this transaction"
            )));
        }
        let cached = self.handles.borrow().get(name).cloned();
        if let Some(handle) = cached {
            if !handle.is_deleted() {
                return Ok(handle);
            }
        }
        let descriptor = self
            .owner
            .lookup(name)
            .ok_or_else(|| TxError::not_found(format!("{name} does not exist")))?;
        let handle = self.owner.clone_for_transaction(&descriptor, self);
        self.handles
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&handle));
        Ok(handle)
    }

    /// Abort the transaction at the caller's request
    pub fn abort(self: &Rc<Self>) -> TxResult<()> {
        if !self.active.get() {
            return Err(TxError::invalid_state(
                "the transaction is not active and cannot be aborted",
            ));
        }
        self.abort_with(None);
        Ok(())
    }

    /// Register a `complete` handler
    pub fn on_complete(&self, handler: impl FnMut(&mut Event) -> TxResult<()> + 'static) {
        self.target.on(EventKind::Complete, handler);
    }

    /// Register an `abort` handler
    pub fn on_abort(&self, handler: impl FnMut(&mut Event) -> TxResult<()> + 'static) {
        self.target.on(EventKind::Abort, handler);
    }

    /// Register an `error` handler; request errors bubble here
    pub fn on_error(&self, handler: impl FnMut(&mut Event) -> TxResult<()> + 'static) {
        self.target.on(EventKind::Error, handler);
    }

    // ------------------------------------------------------------------
    // Accessors and guards
    // ------------------------------------------------------------------

    /// The transaction's engine-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The transaction's mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The declared store scope
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// The recorded failure, once errored or aborted
    pub fn error(&self) -> Option<TxError> {
        self.error.borrow().clone()
    }

    /// The coarse lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    /// Whether requests may currently be placed
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// The catalog this transaction operates against
    pub fn owner(&self) -> &Rc<dyn Catalog> {
        &self.owner
    }

    /// The transaction's event target
    pub fn target(&self) -> &Rc<EventTarget> {
        &self.target
    }

    /// Fail unless the placement window is open
    pub fn assert_active(&self) -> TxResult<()> {
        if self.active.get() {
            Ok(())
        } else {
            Err(TxError::inactive(
                "a request was placed against a transaction which is currently not active, \
                 or which is finished",
            ))
        }
    }

    /// Fail unless the mode permits writes
    pub fn assert_writable(&self) -> TxResult<()> {
        if self.mode.is_write() {
            Ok(())
        } else {
            Err(TxError::read_only("the transaction is read only"))
        }
    }

    /// Fail unless this is a schema-change transaction
    pub fn assert_schema_change(&self) -> TxResult<()> {
        if self.mode == Mode::SchemaChange {
            Ok(())
        } else {
            Err(TxError::invalid_state(
                "schema operations require a schema-change transaction",
            ))
        }
    }

    /// Fail if this is a schema-change transaction
    pub fn assert_not_schema_change(&self) -> TxResult<()> {
        if self.mode == Mode::SchemaChange {
            Err(TxError::invalid_state(
                "the operation is not available inside a schema-change transaction",
            ))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Start and session plumbing
    // ------------------------------------------------------------------

    fn start(self: &Rc<Self>) {
        if self.running.get() {
            debug!(id = self.id, "request queue is already running");
            return;
        }
        if self.errored.get() {
            return;
        }
        self.running.set(true);
        self.lifecycle.set(Lifecycle::Running);
        debug!(id = self.id, "opening backing session");

        let on_open = {
            let transaction = Rc::clone(self);
            Box::new(move |session: SessionHandle| {
                *transaction.session.borrow_mut() = Some(Rc::clone(&session));
                QueueExecutor::run(Rc::clone(&transaction), session);
            })
        };
        let on_failure = {
            let transaction = Rc::clone(self);
            Box::new(move |err: TxError| {
                transaction.abort_with(Some(err));
            })
        };
        let on_finished = {
            let transaction = Rc::clone(self);
            Box::new(move || transaction.backing_session_finished())
        };
        let prepare_finish = {
            let weak = Rc::downgrade(self);
            Box::new(move |task: crate::store::FinishTask, controls: FinishControls| {
                if task.read_only || task.errored {
                    return false;
                }
                let Some(transaction) = weak.upgrade() else {
                    return false;
                };
                *transaction.finish_controls.borrow_mut() = Some(controls);
                transaction.flush_pending_completion();
                true
            })
        };

        self.engine.begin(
            self.mode,
            SessionCallbacks {
                on_open,
                on_failure,
                on_finished,
                prepare_finish,
            },
        );
    }

    /// The backend finished the session on its own (read-only finish, or
    /// rollback of an errored session it still controlled)
    fn backing_session_finished(self: &Rc<Self>) {
        if self.finish_controls.borrow().is_some() {
            return;
        }
        self.backing_finished.set(true);
        if !self.completed.get() {
            let parked = self.pending_completion.borrow_mut().take();
            if let Some(run) = parked {
                run();
            }
        }
    }

    // ------------------------------------------------------------------
    // Executor interface
    // ------------------------------------------------------------------

    pub(crate) fn internal_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.internal)
    }

    /// Whether the queue must stop draining
    pub(crate) fn is_settled_for_queue(&self) -> bool {
        self.errored.get() || self.requests_finished.get()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Take the operation out of a queue slot, leaving the slot in place
    /// so indices stay stable while the queue drains
    pub(crate) fn take_entry(
        &self,
        index: usize,
    ) -> Option<(Option<Operation>, OpArgs, Option<Rc<Request>>)> {
        let mut queue = self.queue.borrow_mut();
        let entry = queue.get_mut(index)?;
        Some((entry.op.take(), entry.args.clone(), entry.request.clone()))
    }

    pub(crate) fn clear_queue(&self) {
        self.queue.borrow_mut().clear();
    }

    /// Dispatch an event with the internal flag raised, optionally
    /// reopening the placement window for the handlers' duration
    pub(crate) fn dispatch_internal(
        &self,
        target: &EventTarget,
        event: &mut Event,
        reactivate: bool,
    ) -> DispatchOutcome {
        if reactivate {
            self.active.set(true);
        }
        self.internal.set(true);
        let outcome = target.dispatch(event);
        self.internal.set(false);
        outcome
    }

    /// Every queued request has settled; run the mode's completion path
    pub(crate) fn on_queue_drained(self: &Rc<Self>) {
        self.active.set(false);
        self.requests_finished.set(true);
        self.lifecycle.set(Lifecycle::RequestsFinished);
        debug!(id = self.id, "request queue drained");

        match self.mode {
            Mode::ReadOnly => self.complete(),
            Mode::ReadWrite => {
                let transaction = Rc::clone(self);
                self.schedule_completion(Box::new(move || transaction.complete()));
            }
            Mode::SchemaChange => {
                let weak = Rc::downgrade(self);
                let finish: Rc<dyn Fn()> = Rc::new(move || {
                    if let Some(transaction) = weak.upgrade() {
                        let inner = Rc::clone(&transaction);
                        transaction.schedule_completion(Box::new(move || inner.complete()));
                    }
                });
                if !self.target.has_listeners(EventKind::BeforeComplete) {
                    finish();
                    return;
                }
                let mut event =
                    Event::new(EventKind::BeforeComplete).with_finish(Rc::clone(&finish));
                self.dispatch_internal(&Rc::clone(&self.target), &mut event, false);
            }
        }
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Run `on_confirmed` once the backing session's outcome is durable.
    /// If the backend has not yet offered finalization controls and has
    /// not finished on its own, the continuation parks until it does.
    fn schedule_completion(&self, on_confirmed: Box<dyn FnOnce()>) {
        if self.completed.get() {
            return;
        }
        if self.backing_finished.get() {
            on_confirmed();
            return;
        }
        let controls = self.finish_controls.borrow_mut().take();
        if let Some(controls) = controls {
            if self.errored.get() {
                (controls.rollback)(on_confirmed);
            } else {
                (controls.commit)(on_confirmed);
            }
        } else {
            *self.pending_completion.borrow_mut() = Some(on_confirmed);
        }
    }

    /// Controls just arrived from the backend; resume a parked completion
    fn flush_pending_completion(&self) {
        if self.completed.get() {
            return;
        }
        let parked = self.pending_completion.borrow_mut().take();
        if let Some(on_confirmed) = parked {
            self.schedule_completion(on_confirmed);
        }
    }

    fn complete(self: &Rc<Self>) {
        self.completed.set(true);
        self.lifecycle.set(Lifecycle::Completed);
        debug!(id = self.id, "transaction completed");

        let mut event = Event::new(EventKind::Complete);
        let outcome = self.dispatch_internal(&Rc::clone(&self.target), &mut event, false);
        let fault = outcome.fault.or_else(|| {
            let mut after = Event::new(EventKind::AfterComplete);
            self.dispatch_internal(&Rc::clone(&self.target), &mut after, false)
                .fault
        });
        self.handles.borrow_mut().clear();
        if let Some(fault) = fault {
            self.errored.set(true);
            error!(
                id = self.id,
                error = %fault,
                "completion handler raised after commit"
            );
            self.owner.unrecoverable_fault(fault);
        }
    }

    // ------------------------------------------------------------------
    // Abort
    // ------------------------------------------------------------------

    /// Fail the transaction. Idempotent: the first failure wins and later
    /// calls are ignored.
    pub(crate) fn abort_with(self: &Rc<Self>, reason: Option<TxError>) {
        if self.errored.get() {
            return;
        }
        match &reason {
            Some(err) => error!(id = self.id, error = %err, "aborting transaction"),
            None => debug!(id = self.id, "aborting transaction at caller request"),
        }
        self.errored.set(true);
        self.lifecycle.set(Lifecycle::Errored);

        if self.mode == Mode::SchemaChange {
            self.owner.restore_schema_snapshot();
            for handle in self.handles.borrow().values() {
                handle.restore_original_names();
            }
        }
        self.active.set(false);
        *self.error.borrow_mut() = reason.clone();

        if self.requests_finished.get() {
            // Too late for the abort path proper; hand the failure to the
            // owner out of band.
            let owner = Rc::clone(&self.owner);
            let fault = reason
                .unwrap_or_else(|| TxError::abort("the transaction was aborted after completion"));
            self.run_loop.defer(move || owner.unrecoverable_fault(fault));
            return;
        }

        let finish: Box<dyn FnOnce()> = {
            let transaction = Rc::clone(self);
            Box::new(move || transaction.finish_abort())
        };

        let controls = self.finish_controls.borrow_mut().take();
        if let Some(controls) = controls {
            (controls.rollback)(finish);
            return;
        }

        let session = self.session.borrow().clone();
        match (session, self.mode) {
            // Session never opened, or a read-only session with nothing to
            // undo: the backend finishes it on its own.
            (None, _) | (Some(_), Mode::ReadOnly) => finish(),
            (Some(_), Mode::ReadWrite) => {
                if self.backing_finished.get() {
                    finish();
                } else {
                    *self.pending_completion.borrow_mut() = Some(finish);
                }
            }
            (Some(session), Mode::SchemaChange) => session.rollback(finish),
        }
    }

    /// The rollback is durable: reject unsettled requests in queue order,
    /// then announce the abort
    fn finish_abort(self: &Rc<Self>) {
        let unsettled: Vec<Rc<Request>> = self
            .queue
            .borrow()
            .iter()
            .filter_map(|entry| entry.request.clone())
            .filter(|request| !request.is_done())
            .collect();

        for request in unsettled {
            let transaction = Rc::clone(self);
            self.run_loop.defer(move || {
                request.reject(TxError::abort("a request was aborted"));
                let mut event = Event::error_event(TxError::abort("a request was aborted"));
                transaction.internal.set(false);
                request.target().dispatch(&mut event);
            });
        }

        let transaction = Rc::clone(self);
        self.run_loop.defer(move || {
            transaction.lifecycle.set(Lifecycle::Aborted);
            debug!(id = transaction.id, "transaction aborted");
            let mut event = Event::abort_event(transaction.error());
            transaction.internal.set(false);
            transaction.target.dispatch(&mut event);

            transaction.clear_queue();
            transaction.handles.borrow_mut().clear();

            let mut after = Event::new(EventKind::AfterAbort);
            transaction.dispatch_internal(
                &Rc::clone(&transaction.target),
                &mut after,
                false,
            );
        });
    }
}
