//! Run loop subsystem for bridgedb
//!
//! A single-threaded, cooperative task queue. The engine uses it for every
//! zero-delay deferral: starting a transaction once the caller's synchronous
//! block has finished enqueuing, and replaying synthesized error events in
//! program order during an abort.
//!
//! # Design Principles
//!
//! - Strict FIFO: tasks run in submission order, including tasks deferred
//!   from inside a running task
//! - No timers, no threads, no parallelism
//! - Re-entrant pumping is a no-op (the outer pump drains everything)

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Single-threaded FIFO task queue
pub struct RunLoop {
    tasks: RefCell<VecDeque<Task>>,
    pumping: Cell<bool>,
}

impl RunLoop {
    /// Create a new, empty run loop
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            tasks: RefCell::new(VecDeque::new()),
            pumping: Cell::new(false),
        })
    }

    /// Schedule a task to run on the next pump, after all tasks already queued
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Number of tasks currently queued
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run queued tasks until the queue is empty.
    ///
    /// Tasks deferred while pumping are appended and drained in the same
    /// call. Calling this from inside a task returns immediately; the outer
    /// pump picks up whatever was queued.
    pub fn run_until_idle(&self) {
        if self.pumping.get() {
            return;
        }
        self.pumping.set(true);
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.pumping.set(false);
    }
}
