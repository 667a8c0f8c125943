//! JSON-RPC 2.0 dispatch core.
//!
//! Raw request text enters through [`Engine::handle_call`], is decoded by the
//! [`codec`], routed by the [`Dispatcher`] to a registered handler and the
//! result is encoded back to text. Failures never escape as panics or
//! `Err` values: every problem that concerns a call becomes an error response,
//! and every problem that concerns a notification is logged and dropped.
//!
//! # Wire Shape
//!
//! ```text
//! request   {"jsonrpc":"2.0","method":"m","params":[...]|{...},"id":1|"1"}
//! success   {"jsonrpc":"2.0","result":...,"id":1}
//! error     {"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}
//! ```

pub mod codec;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod errata;
pub mod error;
pub mod handler;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use context::Context;
pub use dispatcher::{Dispatcher, RegisteredHandlers};
pub use engine::{Engine, SHOW_REGISTERED_HANDLERS};
pub use errata::{Annotation, Errata};
pub use error::{RpcError, RpcErrorCode};
pub use handler::{HandlerOptions, HandlerResult, MethodHandler, NotificationHandler};
pub use message::{MalformedMessage, Request, RequestBatch, RequestId, Response, ResponseBatch};

/// The only protocol version the engine speaks.
pub const JSONRPC_VERSION: &str = "2.0";
