//! Shared test doubles: a scripted backing engine, an in-memory catalog,
//! and canned operations

#![allow(dead_code)]

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use bridgedb::{
    BackingEngine, BackingSession, Catalog, EventTarget, FinishControls, FinishTask, Mode,
    Operation, Request, RunLoop, SessionCallbacks, SessionHandle, StoreDescriptor, StoreHandle,
    Transaction, TxError,
};

// ==================
// Backing Engine
// ==================

/// A session whose rollback just bumps the shared counter
pub struct FakeSession {
    rollbacks: Rc<Cell<u32>>,
}

impl BackingSession for FakeSession {
    fn rollback(&self, on_done: Box<dyn FnOnce()>) {
        self.rollbacks.set(self.rollbacks.get() + 1);
        on_done();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A scripted backing engine.
///
/// By default it offers finalization controls for write sessions, so the
/// transaction decides between commit and rollback. With `manual_finish`
/// set it withholds the controls and only reports the session finished
/// when the test calls `confirm_finished`, modelling a backend that
/// finalizes on its own schedule.
pub struct FakeEngine {
    pub manual_finish: Cell<bool>,
    pub fail_begin: Cell<bool>,
    pub commits: Rc<Cell<u32>>,
    pub rollbacks: Rc<Cell<u32>>,
    finished: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl FakeEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            manual_finish: Cell::new(false),
            fail_begin: Cell::new(false),
            commits: Rc::new(Cell::new(0)),
            rollbacks: Rc::new(Cell::new(0)),
            finished: RefCell::new(None),
        })
    }

    /// Report the session finished, as a self-finalizing backend would
    pub fn confirm_finished(&self) {
        if let Some(on_finished) = self.finished.borrow_mut().take() {
            on_finished();
        }
    }
}

impl BackingEngine for FakeEngine {
    fn begin(&self, mode: Mode, callbacks: SessionCallbacks) {
        if self.fail_begin.get() {
            (callbacks.on_failure)(TxError::backing("could not open session"));
            return;
        }
        let session = Rc::new(FakeSession {
            rollbacks: Rc::clone(&self.rollbacks),
        });
        if mode.is_write() && !self.manual_finish.get() {
            let commits = Rc::clone(&self.commits);
            let rollbacks = Rc::clone(&self.rollbacks);
            let controls = FinishControls {
                commit: Box::new(move |on_done| {
                    commits.set(commits.get() + 1);
                    on_done();
                }),
                rollback: Box::new(move |on_done| {
                    rollbacks.set(rollbacks.get() + 1);
                    on_done();
                }),
            };
            (callbacks.prepare_finish)(
                FinishTask {
                    read_only: false,
                    errored: false,
                },
                controls,
            );
        } else {
            *self.finished.borrow_mut() = Some(callbacks.on_finished);
        }
        let handle: SessionHandle = session;
        (callbacks.on_open)(handle);
    }
}

// ==================
// Catalog
// ==================

/// An in-memory catalog with fault and snapshot-restore accounting
pub struct FakeCatalog {
    stores: RefCell<HashMap<String, StoreDescriptor>>,
    pub snapshot_restores: Cell<u32>,
    pub faults: RefCell<Vec<TxError>>,
    target: Rc<EventTarget>,
}

impl FakeCatalog {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            stores: RefCell::new(HashMap::new()),
            snapshot_restores: Cell::new(0),
            faults: RefCell::new(Vec::new()),
            target: Rc::new(EventTarget::new()),
        })
    }

    pub fn add_store(&self, name: &str) {
        self.stores.borrow_mut().insert(
            name.to_string(),
            StoreDescriptor {
                name: name.to_string(),
                key_path: Some("id".into()),
                auto_increment: false,
                index_names: Vec::new(),
            },
        );
    }
}

impl Catalog for FakeCatalog {
    fn lookup(&self, name: &str) -> Option<StoreDescriptor> {
        self.stores.borrow().get(name).cloned()
    }

    fn clone_for_transaction(
        &self,
        descriptor: &StoreDescriptor,
        _transaction: &Rc<Transaction>,
    ) -> Rc<StoreHandle> {
        StoreHandle::from_descriptor(descriptor)
    }

    fn restore_schema_snapshot(&self) {
        self.snapshot_restores.set(self.snapshot_restores.get() + 1);
    }

    fn event_target(&self) -> Option<Rc<EventTarget>> {
        Some(Rc::clone(&self.target))
    }

    fn unrecoverable_fault(&self, error: TxError) {
        self.faults.borrow_mut().push(error);
    }
}

// ==================
// Harness
// ==================

/// One run loop, one catalog, one engine
pub struct Harness {
    pub run_loop: Rc<RunLoop>,
    pub catalog: Rc<FakeCatalog>,
    pub engine: Rc<FakeEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            run_loop: RunLoop::new(),
            catalog: FakeCatalog::new(),
            engine: FakeEngine::new(),
        }
    }

    pub fn begin(&self, scope: &[&str], mode: Mode) -> Rc<Transaction> {
        Transaction::begin(
            Rc::clone(&self.catalog) as Rc<dyn Catalog>,
            Rc::clone(&self.engine) as Rc<dyn BackingEngine>,
            Rc::clone(&self.run_loop),
            scope.iter().map(|s| s.to_string()).collect(),
            mode,
        )
    }
}

// ==================
// Canned Operations
// ==================

/// Settles successfully with the given result
pub fn ok_op(result: Value) -> Operation {
    Box::new(move |_, _, cont| {
        (cont.success)(result, None);
        Ok(())
    })
}

/// Appends a label to the log, then settles successfully
pub fn recording_op(log: Rc<RefCell<Vec<String>>>, label: &str, result: Value) -> Operation {
    let label = label.to_string();
    Box::new(move |_, _, cont| {
        log.borrow_mut().push(label);
        (cont.success)(result, None);
        Ok(())
    })
}

/// Settles with the given failure through the error continuation
pub fn err_op(error: TxError) -> Operation {
    Box::new(move |_, _, cont| {
        (cont.error)(error);
        Ok(())
    })
}

/// Fails synchronously by returning `Err`
pub fn sync_fail_op(error: TxError) -> Operation {
    Box::new(move |_, _, _| Err(error))
}

/// Slot for a success continuation captured by `stalling_op`
pub type SavedSuccess = Rc<RefCell<Option<Box<dyn FnOnce(Value, Option<Rc<Request>>)>>>>;

/// Captures its success continuation without settling, so the test can
/// fire it late
pub fn stalling_op(slot: SavedSuccess) -> Operation {
    Box::new(move |_, _, cont| {
        *slot.borrow_mut() = Some(cont.success);
        Ok(())
    })
}
