//! Handler registry and single-message dispatch.
//!
//! Two independent tables map names to handlers: one for methods, one for
//! notifications. A single mutex guards both. The lock is held only while a
//! table is read or written; handlers always run after it is released, so a
//! slow handler never blocks registration or introspection.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::errata::Errata;
use super::error::{RpcError, RpcErrorCode};
use super::handler::{HandlerOptions, MethodHandler, NotificationHandler};
use super::message::{Request, Response};

/// A registered handler together with its access policy.
struct Entry<H: ?Sized> {
    handler: Arc<H>,
    options: HandlerOptions,
}

impl<H: ?Sized> Clone for Entry<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            options: self.options,
        }
    }
}

#[derive(Default)]
struct Tables {
    methods: IndexMap<String, Entry<dyn MethodHandler>>,
    notifications: IndexMap<String, Entry<dyn NotificationHandler>>,
}

/// Snapshot of the registered handler names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisteredHandlers {
    /// Method names in registration order.
    pub methods: Vec<String>,
    /// Notification names in registration order.
    pub notifications: Vec<String>,
}

/// Outcome of dispatching one message.
///
/// `Ok(None)` is the normal outcome for notifications.
pub type DispatchResult = Result<Option<Response>, RpcError>;

/// Thread-safe handler registry.
#[derive(Default)]
pub struct Dispatcher {
    tables: Mutex<Tables>,
}

impl Dispatcher {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Handlers never run under the lock, so a poisoned guard still holds
        // consistent tables.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a restricted method handler.
    ///
    /// Returns `false`, leaving the existing handler in place, if `name` is
    /// already registered as a method.
    pub fn add_method_handler<H>(&self, name: impl Into<String>, handler: H) -> bool
    where
        H: MethodHandler + 'static,
    {
        self.add_method_handler_with_options(name, HandlerOptions::default(), handler)
    }

    /// Registers a method handler with an explicit access policy.
    pub fn add_method_handler_with_options<H>(
        &self,
        name: impl Into<String>,
        options: HandlerOptions,
        handler: H,
    ) -> bool
    where
        H: MethodHandler + 'static,
    {
        self.register_method(name, options, Arc::new(handler))
    }

    /// Registers an already shared method handler.
    pub fn register_method(
        &self,
        name: impl Into<String>,
        options: HandlerOptions,
        handler: Arc<dyn MethodHandler>,
    ) -> bool {
        let mut tables = self.lock();
        let name = name.into();
        if tables.methods.contains_key(&name) {
            return false;
        }
        tables.methods.insert(name, Entry { handler, options });
        true
    }

    /// Registers a restricted notification handler.
    ///
    /// Returns `false`, leaving the existing handler in place, if `name` is
    /// already registered as a notification.
    pub fn add_notification_handler<H>(&self, name: impl Into<String>, handler: H) -> bool
    where
        H: NotificationHandler + 'static,
    {
        self.add_notification_handler_with_options(name, HandlerOptions::default(), handler)
    }

    /// Registers a notification handler with an explicit access policy.
    pub fn add_notification_handler_with_options<H>(
        &self,
        name: impl Into<String>,
        options: HandlerOptions,
        handler: H,
    ) -> bool
    where
        H: NotificationHandler + 'static,
    {
        self.register_notification(name, options, Arc::new(handler))
    }

    /// Registers an already shared notification handler.
    pub fn register_notification(
        &self,
        name: impl Into<String>,
        options: HandlerOptions,
        handler: Arc<dyn NotificationHandler>,
    ) -> bool {
        let mut tables = self.lock();
        let name = name.into();
        if tables.notifications.contains_key(&name) {
            return false;
        }
        tables.notifications.insert(name, Entry { handler, options });
        true
    }

    /// Removes a method handler. Returns whether one was removed.
    pub fn remove_method_handler(&self, name: &str) -> bool {
        self.lock().methods.shift_remove(name).is_some()
    }

    /// Removes a notification handler. Returns whether one was removed.
    pub fn remove_notification_handler(&self, name: &str) -> bool {
        self.lock().notifications.shift_remove(name).is_some()
    }

    /// Looks up a method handler. The returned handle stays valid after the
    /// handler is removed from the table.
    #[must_use]
    pub fn find_method_handler(
        &self,
        name: &str,
    ) -> Option<(Arc<dyn MethodHandler>, HandlerOptions)> {
        self.lock()
            .methods
            .get(name)
            .map(|entry| (Arc::clone(&entry.handler), entry.options))
    }

    /// Looks up a notification handler.
    #[must_use]
    pub fn find_notification_handler(
        &self,
        name: &str,
    ) -> Option<(Arc<dyn NotificationHandler>, HandlerOptions)> {
        self.lock()
            .notifications
            .get(name)
            .map(|entry| (Arc::clone(&entry.handler), entry.options))
    }

    /// Returns the current table contents.
    #[must_use]
    pub fn registered_handlers(&self) -> RegisteredHandlers {
        let tables = self.lock();
        RegisteredHandlers {
            methods: tables.methods.keys().cloned().collect(),
            notifications: tables.notifications.keys().cloned().collect(),
        }
    }

    /// Dispatches one message without any access gate.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch_with`].
    pub fn dispatch(&self, request: &Request) -> DispatchResult {
        self.dispatch_with(request, |_| Ok(()))
    }

    /// Dispatches one message after asking `gate` whether the handler's
    /// policy allows it to run.
    ///
    /// For calls, a successful handler yields `Ok(Some(response))`. For
    /// notifications the outcome is `Ok(None)` whatever the handler does.
    ///
    /// # Errors
    ///
    /// - `MethodNotFound` if no handler of the right kind is registered
    /// - `Unauthorized` if `gate` rejects a call; `data` holds the diagnostics
    /// - `ExecutionError` if a method handler reports a failure; `data` holds its errata
    /// - `InternalError` if a method handler panics
    pub fn dispatch_with<G>(&self, request: &Request, gate: G) -> DispatchResult
    where
        G: FnOnce(&HandlerOptions) -> Result<(), Errata>,
    {
        match &request.id {
            None => self.invoke_notification_handler(request, gate),
            Some(id) => {
                let Some((handler, options)) = self.find_method_handler(&request.method) else {
                    return Err(RpcError::new(RpcErrorCode::MethodNotFound));
                };

                if let Err(errata) = gate(&options) {
                    debug!(method = %request.method, %id, %errata, "Call rejected by permission check");
                    return Err(
                        RpcError::new(RpcErrorCode::Unauthorized).with_data(errata.to_value())
                    );
                }

                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| handler.call(id, &request.params)));

                match outcome {
                    Ok(Ok(result)) => Ok(Some(Response::success(id.clone(), result))),
                    Ok(Err(errata)) => Err(
                        RpcError::new(RpcErrorCode::ExecutionError).with_data(errata.to_value())
                    ),
                    Err(payload) => {
                        warn!(
                            method = %request.method,
                            %id,
                            panic = panic_message(payload.as_ref()),
                            "Method handler panicked"
                        );
                        Err(RpcError::new(RpcErrorCode::InternalError))
                    }
                }
            }
        }
    }

    fn invoke_notification_handler<G>(&self, request: &Request, gate: G) -> DispatchResult
    where
        G: FnOnce(&HandlerOptions) -> Result<(), Errata>,
    {
        let Some((handler, options)) = self.find_notification_handler(&request.method) else {
            return Err(RpcError::new(RpcErrorCode::MethodNotFound));
        };

        if let Err(errata) = gate(&options) {
            debug!(method = %request.method, %errata, "Notification rejected by permission check");
            return Ok(None);
        }

        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| handler.notify(&request.params)))
        {
            // Nobody to report to: a notification has no id.
            warn!(
                method = %request.method,
                panic = panic_message(payload.as_ref()),
                "Notification handler panicked"
            );
        }
        Ok(None)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.registered_handlers();
        f.debug_struct("Dispatcher")
            .field("methods", &handlers.methods)
            .field("notifications", &handlers.notifications)
            .finish()
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Renders the registry snapshot as the `show_registered_handlers` result.
pub(crate) fn registered_handlers_value(handlers: &RegisteredHandlers) -> Value {
    serde_json::json!({
        "methods": handlers.methods,
        "notifications": handlers.notifications,
    })
}
