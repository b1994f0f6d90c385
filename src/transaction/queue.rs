//! Queue entries and the operation contract

use std::rc::Rc;

use serde_json::Value;

use crate::error::{TxError, TxResult};
use crate::request::Request;
use crate::store::SessionHandle;

/// Arguments handed to an operation when it runs
pub type OpArgs = Value;

/// The continuations an operation must settle through.
///
/// An operation calls exactly one of `success` or `error` per execution,
/// or returns `Err` for a synchronous failure (routed to `error` by the
/// executor). `advance` lets fan-out operations that place follow-up
/// requests hand queue control back explicitly.
pub struct OpContinuations {
    /// Settle successfully with a result. The optional request redirects
    /// settlement to a request other than the entry's own (used by
    /// operations that manufacture follow-up requests).
    pub success: Box<dyn FnOnce(Value, Option<Rc<Request>>)>,
    /// Settle with a failure
    pub error: Box<dyn FnOnce(TxError)>,
    /// Continue the queue without settling this entry's request
    pub advance: Option<Box<dyn FnOnce()>>,
}

/// One queued unit of work
pub type Operation = Box<dyn FnOnce(&SessionHandle, &OpArgs, OpContinuations) -> TxResult<()>>;

/// A queue slot: the operation, its arguments, and the request (if any)
/// observing its outcome
pub(crate) struct QueueEntry {
    pub(crate) op: Option<Operation>,
    pub(crate) args: OpArgs,
    pub(crate) request: Option<Rc<Request>>,
}
