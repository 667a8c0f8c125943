//! Handler surface exposed to handler authors.
//!
//! Handlers are trait objects with one capability each:
//!
//! - [`MethodHandler`]: given the call id and params, produce a result or an [`Errata`]
//! - [`NotificationHandler`]: given the params, do something; nothing is returned
//!
//! Closures with the matching signature implement the traits, so most
//! callers never name them.

use serde_json::Value;

use super::errata::Errata;
use super::message::RequestId;

/// What a method handler hands back to the engine.
pub type HandlerResult = Result<Value, Errata>;

/// A callback bound to a method name.
pub trait MethodHandler: Send + Sync {
    /// Runs the method.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics describing why the call failed.
    fn call(&self, id: &RequestId, params: &Value) -> HandlerResult;
}

impl<F> MethodHandler for F
where
    F: Fn(&RequestId, &Value) -> HandlerResult + Send + Sync,
{
    fn call(&self, id: &RequestId, params: &Value) -> HandlerResult {
        self(id, params)
    }
}

/// A callback bound to a notification name.
pub trait NotificationHandler: Send + Sync {
    /// Handles the notification.
    fn notify(&self, params: &Value);
}

impl<F> NotificationHandler for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn notify(&self, params: &Value) {
        self(params);
    }
}

/// Access policy attached to a handler at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Whether permission checkers gate the invocation.
    pub restricted: bool,
}

impl HandlerOptions {
    /// Policy for handlers gated by permission checks.
    pub const RESTRICTED: Self = Self { restricted: true };
    /// Policy for handlers anyone connected may call.
    pub const UNRESTRICTED: Self = Self { restricted: false };
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self::RESTRICTED
    }
}
