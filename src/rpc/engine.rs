//! The public facade: raw request text in, optional response text out.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::{debug, error, warn};

use super::codec::{Decoder, Encoder};
use super::context::Context;
use super::dispatcher::{panic_message, registered_handlers_value, Dispatcher, RegisteredHandlers};
use super::errata::Errata;
use super::error::{RpcError, RpcErrorCode};
use super::handler::{HandlerOptions, HandlerResult, MethodHandler, NotificationHandler};
use super::message::{MalformedMessage, RequestId, Response, ResponseBatch};

/// Name of the built-in introspection method.
pub const SHOW_REGISTERED_HANDLERS: &str = "show_registered_handlers";

/// Sent when nothing better can be produced: encoding failed or the engine
/// itself panicked.
const INTERNAL_ERROR_RESPONSE: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"}}"#;

/// JSON-RPC dispatch engine.
///
/// One instance is built at startup and shared (behind an [`Arc`]) with every
/// transport. All methods take `&self` and may be called from any thread.
#[derive(Debug, Default)]
pub struct Engine {
    dispatcher: Arc<Dispatcher>,
    decoder: Decoder,
}

impl Engine {
    /// Creates an engine with empty handler tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects messages lacking `"jsonrpc": "2.0"` when `required` is set.
    #[must_use]
    pub fn with_required_version(mut self, required: bool) -> Self {
        self.decoder = self.decoder.with_required_version(required);
        self
    }

    /// The underlying handler registry.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Registers a restricted method handler. See [`Dispatcher::add_method_handler`].
    pub fn add_method_handler<H>(&self, name: impl Into<String>, handler: H) -> bool
    where
        H: MethodHandler + 'static,
    {
        self.dispatcher.add_method_handler(name, handler)
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
        self.dispatcher
            .add_method_handler_with_options(name, options, handler)
    }

    /// Registers a restricted notification handler.
    pub fn add_notification_handler<H>(&self, name: impl Into<String>, handler: H) -> bool
    where
        H: NotificationHandler + 'static,
    {
        self.dispatcher.add_notification_handler(name, handler)
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
        self.dispatcher
            .add_notification_handler_with_options(name, options, handler)
    }

    /// Removes a method handler.
    pub fn remove_method_handler(&self, name: &str) -> bool {
        self.dispatcher.remove_method_handler(name)
    }

    /// Removes a notification handler.
    pub fn remove_notification_handler(&self, name: &str) -> bool {
        self.dispatcher.remove_notification_handler(name)
    }

    /// Snapshot of the registered names.
    #[must_use]
    pub fn show_registered_handlers(&self) -> RegisteredHandlers {
        self.dispatcher.registered_handlers()
    }

    /// Installs the built-in `show_registered_handlers` method.
    ///
    /// A name collision is logged and reported as `false`; it is not fatal.
    pub fn register_internal_api(&self) -> bool {
        let registry: Weak<Dispatcher> = Arc::downgrade(&self.dispatcher);
        let handler = move |_id: &RequestId, _params: &Value| -> HandlerResult {
            registry.upgrade().map_or_else(
                || Err(Errata::single(1, "Handler registry is no longer available")),
                |dispatcher| Ok(registered_handlers_value(&dispatcher.registered_handlers())),
            )
        };

        let added = self.dispatcher.add_method_handler_with_options(
            SHOW_REGISTERED_HANDLERS,
            HandlerOptions::UNRESTRICTED,
            handler,
        );
        if !added {
            warn!(
                method = SHOW_REGISTERED_HANDLERS,
                "Internal API not registered, name already in use"
            );
        }
        added
    }

    /// Processes one raw request text without permission checks.
    ///
    /// Returns `None` when nothing must be sent back, which only happens when
    /// every message was a well-formed notification.
    #[must_use]
    pub fn handle_call(&self, raw: &str) -> Option<String> {
        self.handle_call_with_context(&Context::new(), raw)
    }

    /// Processes one raw request text, gating restricted handlers on the
    /// permission checkers of `ctx`.
    #[must_use]
    pub fn handle_call_with_context(&self, ctx: &Context, raw: &str) -> Option<String> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(ctx, raw))) {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to encode response");
                Some(INTERNAL_ERROR_RESPONSE.to_string())
            }
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "Request processing panicked");
                Some(INTERNAL_ERROR_RESPONSE.to_string())
            }
        }
    }

    /// Processes one raw request as received from a transport.
    ///
    /// Bytes that are not UTF-8 get a parse error response, exactly as
    /// malformed JSON does.
    #[must_use]
    pub fn handle_bytes(&self, raw: &[u8]) -> Option<String> {
        self.handle_bytes_with_context(&Context::new(), raw)
    }

    /// [`Engine::handle_bytes`] with the permission checkers of `ctx`.
    #[must_use]
    pub fn handle_bytes_with_context(&self, ctx: &Context, raw: &[u8]) -> Option<String> {
        match std::str::from_utf8(raw) {
            Ok(text) => self.handle_call_with_context(ctx, text),
            Err(e) => {
                debug!(error = %e, "Request is not valid UTF-8");
                let encoded = envelope_error(RpcError::new(RpcErrorCode::ParseError))
                    .unwrap_or_else(|e| {
                        error!(error = %e, "Failed to encode response");
                        INTERNAL_ERROR_RESPONSE.to_string()
                    });
                Some(encoded)
            }
        }
    }

    fn process(&self, ctx: &Context, raw: &str) -> Result<Option<String>, serde_json::Error> {
        let batch = match self.decoder.extract(raw) {
            Ok(batch) => batch,
            Err(e) => {
                debug!(error = %e, "Rejected request envelope");
                return envelope_error(e).map(Some);
            }
        };

        let mut responses = ResponseBatch::new(batch.is_batch);
        for message in batch.messages {
            let request = match message {
                Ok(request) => request,
                Err(MalformedMessage { id, error }) => {
                    debug!(error = %error, "Rejected malformed message");
                    responses.push(Response::error(id, error));
                    continue;
                }
            };

            debug!(method = %request.method, id = ?request.id, "Dispatching");
            let outcome = self
                .dispatcher
                .dispatch_with(&request, |options| ctx.authorize(options));

            match (outcome, request.id) {
                (Ok(Some(response)), _) => responses.push(response),
                (Ok(None), _) => {}
                (Err(e), Some(id)) => responses.push(Response::error(Some(id), e)),
                (Err(e), None) => notification_failed(&request.method, &e),
            }
        }

        if responses.is_empty() {
            return Ok(None);
        }
        Encoder::encode(&responses).map(Some)
    }
}

/// Encodes an error that concerns the whole request, so it carries no id.
fn envelope_error(error: RpcError) -> Result<String, serde_json::Error> {
    Encoder::encode(&ResponseBatch::single(Response::error(None, error)))
}

fn notification_failed(method: &str, error: &RpcError) {
    debug!(method, error = %error, "Notification not delivered");
}
