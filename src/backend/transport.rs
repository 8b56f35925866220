//! The seam between the dispatcher and the wire.

use std::fmt::Debug;
use std::time::Duration;

use serde_json::Value;

use crate::backend::error::BackendError;
use crate::http::pipeline::BoxFuture;

/// One unary call.
#[derive(Debug, Clone)]
pub struct BackendCall<'a> {
    /// Fully-qualified operation path, e.g. `/user.v1.UserService/GetProfile`.
    pub operation: &'a str,
    pub payload: Value,
    pub request_id: &'a str,
    /// Time left before the inbound deadline.
    pub timeout: Option<Duration>,
}

/// A long-lived connection to one backend service.
///
/// Implementations must tolerate many concurrent calls and must not open a
/// connection per call.
pub trait BackendTransport: Send + Sync + Debug + 'static {
    fn call<'a>(&'a self, call: BackendCall<'a>) -> BoxFuture<'a, Result<Value, BackendError>>;
}
