//! Backing engine contract
//!
//! The engine drives a synchronous, session-oriented storage backend
//! through continuations: `begin` opens a session and hands back control
//! paths for open, failure, natural finish, and finalization takeover.

use std::any::Any;
use std::rc::Rc;

use crate::error::TxError;
use crate::transaction::Mode;

/// An open backing session. Operations downcast through `as_any` to the
/// concrete session type they were written for.
pub trait BackingSession {
    /// Roll back the session's work, then invoke `on_done`
    fn rollback(&self, on_done: Box<dyn FnOnce()>);

    /// Downcast support for operation closures
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an open session
pub type SessionHandle = Rc<dyn BackingSession>;

/// What the backend is being asked to finalize
#[derive(Debug, Clone, Copy)]
pub struct FinishTask {
    /// The session never wrote; the backend may finish it unilaterally
    pub read_only: bool,
    /// The session already failed; the backend may finish it unilaterally
    pub errored: bool,
}

/// Explicit finalization controls handed over when the transaction takes
/// responsibility for the session's outcome
pub struct FinishControls {
    /// Commit the session, then invoke the given continuation
    pub commit: Box<dyn Fn(Box<dyn FnOnce()>)>,
    /// Roll the session back, then invoke the given continuation
    pub rollback: Box<dyn Fn(Box<dyn FnOnce()>)>,
}

/// The continuation bundle a transaction passes to `BackingEngine::begin`
pub struct SessionCallbacks {
    /// Invoked once the session is open and ready for operations
    pub on_open: Box<dyn FnOnce(SessionHandle)>,
    /// Invoked if the session could not be opened or fails irrecoverably
    pub on_failure: Box<dyn FnOnce(TxError)>,
    /// Invoked when the backend finishes the session on its own
    pub on_finished: Box<dyn FnOnce()>,
    /// Asked before the backend finalizes on its own. Returning `true`
    /// means the transaction takes over finalization through the supplied
    /// controls; the backend must then wait for an explicit commit or
    /// rollback instead of finishing the session itself.
    pub prepare_finish: Box<dyn FnOnce(FinishTask, FinishControls) -> bool>,
}

/// A storage backend capable of opening sessions
pub trait BackingEngine {
    /// Open a session in the given mode and drive it through `callbacks`
    fn begin(&self, mode: Mode, callbacks: SessionCallbacks);
}
