//! Event values dispatched through the bus

use std::fmt;
use std::rc::Rc;

use crate::error::TxError;

/// The event vocabulary of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A request finished successfully (per request, non-bubbling)
    Success,
    /// A request failed (per request, bubbling, cancelable)
    Error,
    /// The transaction committed (on the transaction)
    Complete,
    /// The transaction aborted (on the transaction, bubbling)
    Abort,
    /// Engine-internal: a schema-change owner may inject one last step
    /// before completion by holding the event's finish continuation
    BeforeComplete,
    /// Engine-internal post-completion notification for the owner
    AfterComplete,
    /// Engine-internal post-abort notification for the owner
    AfterAbort,
}

impl EventKind {
    /// Returns the event name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Success => "success",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
            EventKind::Abort => "abort",
            EventKind::BeforeComplete => "beforecomplete",
            EventKind::AfterComplete => "aftercomplete",
            EventKind::AfterAbort => "afterabort",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One dispatched event
pub struct Event {
    kind: EventKind,
    error: Option<TxError>,
    bubbles: bool,
    cancelable: bool,
    default_prevented: bool,
    finish: Option<Rc<dyn Fn()>>,
}

impl Event {
    /// Create a plain, non-bubbling, non-cancelable event
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            error: None,
            bubbles: false,
            cancelable: false,
            default_prevented: false,
            finish: None,
        }
    }

    /// Create a request `error` event: bubbling and cancelable, carrying
    /// the failure that produced it
    pub fn error_event(error: TxError) -> Self {
        Self {
            kind: EventKind::Error,
            error: Some(error),
            bubbles: true,
            cancelable: true,
            default_prevented: false,
            finish: None,
        }
    }

    /// Create a transaction `abort` event: bubbling, never cancelable
    pub fn abort_event(error: Option<TxError>) -> Self {
        Self {
            kind: EventKind::Abort,
            error,
            bubbles: true,
            cancelable: false,
            default_prevented: false,
            finish: None,
        }
    }

    /// Attach a finish continuation (used by `BeforeComplete`)
    pub fn with_finish(mut self, finish: Rc<dyn Fn()>) -> Self {
        self.finish = Some(finish);
        self
    }

    /// The event's kind
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The error carried by `error`/`abort` events
    pub fn error(&self) -> Option<&TxError> {
        self.error.as_ref()
    }

    /// Whether the event bubbles to the target's parent
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Whether a handler may prevent the default action
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Whether a handler prevented the default action
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Prevent the default action. Ignored for non-cancelable events.
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// The finish continuation, if this event carries one
    pub fn finish(&self) -> Option<Rc<dyn Fn()>> {
        self.finish.clone()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("error", &self.error)
            .field("bubbles", &self.bubbles)
            .field("cancelable", &self.cancelable)
            .field("default_prevented", &self.default_prevented)
            .finish()
    }
}
