//! Event targets: handler registry, bubble chain, and dispatch

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::error;

use super::event::{Event, EventKind};
use crate::error::{TxError, TxResult};

type Handler = Box<dyn FnMut(&mut Event) -> TxResult<()>>;
type OneShot = Box<dyn FnOnce(&Event)>;

/// What a dispatch produced, for the caller to act on
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Whether a handler prevented the event's default action
    pub default_prevented: bool,
    /// A fault raised by a caller-supplied handler during an internal
    /// dispatch. External-dispatch faults are reported to the log instead
    /// and never appear here.
    pub fault: Option<TxError>,
}

impl DispatchOutcome {
    /// Whether a handler fault interrupted the dispatch
    pub fn faulted(&self) -> bool {
        self.fault.is_some()
    }
}

/// A node events can be dispatched on.
///
/// Owners embed one per observable object (request, transaction, owner
/// collaborator) and wire `parent` links for the bubble phase. The
/// `internal` flag is shared with the owning transaction, which raises it
/// around engine-initiated dispatches.
pub struct EventTarget {
    handlers: RefCell<Vec<(EventKind, Rc<RefCell<Handler>>)>>,
    late: RefCell<Vec<(EventKind, OneShot)>>,
    defaults: RefCell<Vec<(EventKind, OneShot)>>,
    parent: RefCell<Option<Weak<EventTarget>>>,
    internal: RefCell<Option<Rc<Cell<bool>>>>,
}

impl EventTarget {
    /// Create a target with no handlers, no parent, and no internal flag
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            late: RefCell::new(Vec::new()),
            defaults: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            internal: RefCell::new(None),
        }
    }

    /// Register a handler for an event kind. Handlers run in registration
    /// order; an `Err` return is a handler fault.
    pub fn on(&self, kind: EventKind, handler: impl FnMut(&mut Event) -> TxResult<()> + 'static) {
        self.handlers
            .borrow_mut()
            .push((kind, Rc::new(RefCell::new(Box::new(handler)))));
    }

    /// Register a one-shot listener that runs after all handlers (including
    /// the bubble phase), whether or not the default was prevented
    pub fn add_late_listener(&self, kind: EventKind, listener: impl FnOnce(&Event) + 'static) {
        self.late.borrow_mut().push((kind, Box::new(listener)));
    }

    /// Register a one-shot default action, run only when no handler
    /// prevented the default
    pub fn add_default_listener(&self, kind: EventKind, listener: impl FnOnce(&Event) + 'static) {
        self.defaults.borrow_mut().push((kind, Box::new(listener)));
    }

    /// Declare the parent target for the bubble phase
    pub fn set_parent(&self, parent: &Rc<EventTarget>) {
        *self.parent.borrow_mut() = Some(Rc::downgrade(parent));
    }

    /// Share the owning transaction's internal-dispatch flag with this target
    pub fn bind_internal_flag(&self, flag: Rc<Cell<bool>>) {
        *self.internal.borrow_mut() = Some(flag);
    }

    /// Whether any handler is registered for the kind
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.handlers.borrow().iter().any(|(k, _)| *k == kind)
    }

    /// Whether the owning transaction is currently mid-dispatch
    fn is_internal_dispatch(&self) -> bool {
        self.internal
            .borrow()
            .as_ref()
            .map(|flag| flag.get())
            .unwrap_or(false)
    }

    fn parent(&self) -> Option<Rc<EventTarget>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Dispatch an event on this target.
    ///
    /// Phases: at-target handlers, bubble to parents while `event.bubbles()`,
    /// then this target's late listeners, then its default actions unless
    /// prevented. A handler fault during an internal dispatch stops the
    /// dispatch immediately and is returned in the outcome; during an
    /// external dispatch it is logged and dispatch continues.
    pub fn dispatch(&self, event: &mut Event) -> DispatchOutcome {
        let internal = self.is_internal_dispatch();

        if let Some(fault) = self.invoke_handlers(event, internal) {
            return DispatchOutcome {
                default_prevented: event.default_prevented(),
                fault: Some(fault),
            };
        }
        if event.bubbles() {
            let mut node = self.parent();
            while let Some(target) = node {
                if let Some(fault) = target.invoke_handlers(event, internal) {
                    return DispatchOutcome {
                        default_prevented: event.default_prevented(),
                        fault: Some(fault),
                    };
                }
                node = target.parent();
            }
        }

        for listener in Self::drain_matching(&self.late, event.kind()) {
            listener(event);
        }
        let defaults = Self::drain_matching(&self.defaults, event.kind());
        if !event.default_prevented() {
            for listener in defaults {
                listener(event);
            }
        }

        DispatchOutcome {
            default_prevented: event.default_prevented(),
            fault: None,
        }
    }

    fn invoke_handlers(&self, event: &mut Event, internal: bool) -> Option<TxError> {
        // Snapshot so handlers may register or deregister without aliasing
        let snapshot: Vec<Rc<RefCell<Handler>>> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(kind, _)| *kind == event.kind())
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in snapshot {
            let mut entry = handler.borrow_mut();
            if let Err(fault) = (&mut **entry)(event) {
                if internal {
                    return Some(fault);
                }
                error!(
                    kind = event.kind().as_str(),
                    error = %fault,
                    "handler fault during external dispatch"
                );
            }
        }
        None
    }

    fn drain_matching(slot: &RefCell<Vec<(EventKind, OneShot)>>, kind: EventKind) -> Vec<OneShot> {
        let mut all = slot.borrow_mut();
        let mut kept = Vec::new();
        let mut matched = Vec::new();
        for (k, listener) in all.drain(..) {
            if k == kind {
                matched.push(listener);
            } else {
                kept.push((k, listener));
            }
        }
        *all = kept;
        matched
    }
}

impl Default for EventTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged_target(value: bool) -> (Rc<EventTarget>, Rc<Cell<bool>>) {
        let target = Rc::new(EventTarget::new());
        let flag = Rc::new(Cell::new(value));
        target.bind_internal_flag(Rc::clone(&flag));
        (target, flag)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let target = EventTarget::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            target.on(EventKind::Success, move |_| {
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        target.dispatch(&mut Event::new(EventKind::Success));
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_bubbling_reaches_parent_chain() {
        let grandparent = Rc::new(EventTarget::new());
        let parent = Rc::new(EventTarget::new());
        let child = Rc::new(EventTarget::new());
        parent.set_parent(&grandparent);
        child.set_parent(&parent);

        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, target) in [("child", &child), ("parent", &parent), ("gp", &grandparent)] {
            let log = Rc::clone(&log);
            target.on(EventKind::Error, move |_| {
                log.borrow_mut().push(name);
                Ok(())
            });
        }
        child.dispatch(&mut Event::error_event(TxError::backing("boom")));
        assert_eq!(*log.borrow(), vec!["child", "parent", "gp"]);
    }

    #[test]
    fn test_non_bubbling_event_stays_at_target() {
        let parent = Rc::new(EventTarget::new());
        let child = Rc::new(EventTarget::new());
        child.set_parent(&parent);

        let reached = Rc::new(Cell::new(false));
        {
            let reached = Rc::clone(&reached);
            parent.on(EventKind::Success, move |_| {
                reached.set(true);
                Ok(())
            });
        }
        child.dispatch(&mut Event::new(EventKind::Success));
        assert!(!reached.get());
    }

    #[test]
    fn test_default_listener_skipped_when_prevented() {
        let target = EventTarget::new();
        target.on(EventKind::Error, |event| {
            event.prevent_default();
            Ok(())
        });

        let late_ran = Rc::new(Cell::new(false));
        let default_ran = Rc::new(Cell::new(false));
        {
            let late_ran = Rc::clone(&late_ran);
            target.add_late_listener(EventKind::Error, move |_| late_ran.set(true));
        }
        {
            let default_ran = Rc::clone(&default_ran);
            target.add_default_listener(EventKind::Error, move |_| default_ran.set(true));
        }

        let outcome = target.dispatch(&mut Event::error_event(TxError::backing("boom")));
        assert!(outcome.default_prevented);
        assert!(late_ran.get());
        assert!(!default_ran.get());
    }

    #[test]
    fn test_default_listener_runs_when_not_prevented() {
        let target = EventTarget::new();
        let default_ran = Rc::new(Cell::new(false));
        {
            let default_ran = Rc::clone(&default_ran);
            target.add_default_listener(EventKind::Error, move |_| default_ran.set(true));
        }
        let outcome = target.dispatch(&mut Event::error_event(TxError::backing("boom")));
        assert!(!outcome.default_prevented);
        assert!(default_ran.get());
    }

    #[test]
    fn test_internal_dispatch_surfaces_handler_fault() {
        let (target, _flag) = flagged_target(true);
        target.on(EventKind::Success, |_| Err(TxError::backing("handler blew up")));

        let ran_after = Rc::new(Cell::new(false));
        {
            let ran_after = Rc::clone(&ran_after);
            target.on(EventKind::Success, move |_| {
                ran_after.set(true);
                Ok(())
            });
        }

        let outcome = target.dispatch(&mut Event::new(EventKind::Success));
        assert!(outcome.faulted());
        // Dispatch stops at the faulting handler
        assert!(!ran_after.get());
    }

    #[test]
    fn test_external_dispatch_swallows_handler_fault() {
        let (target, _flag) = flagged_target(false);
        target.on(EventKind::Success, |_| Err(TxError::backing("handler blew up")));

        let ran_after = Rc::new(Cell::new(false));
        {
            let ran_after = Rc::clone(&ran_after);
            target.on(EventKind::Success, move |_| {
                ran_after.set(true);
                Ok(())
            });
        }

        let outcome = target.dispatch(&mut Event::new(EventKind::Success));
        assert!(!outcome.faulted());
        assert!(ran_after.get());
    }

    #[test]
    fn test_one_shot_listeners_do_not_refire() {
        let target = EventTarget::new();
        let count = Rc::new(Cell::new(0u32));
        {
            let count = Rc::clone(&count);
            target.add_default_listener(EventKind::Error, move |_| count.set(count.get() + 1));
        }
        target.dispatch(&mut Event::error_event(TxError::backing("one")));
        target.dispatch(&mut Event::error_event(TxError::backing("two")));
        assert_eq!(count.get(), 1);
    }
}
