//! In-memory message model.
//!
//! # Message Types
//!
//! - **Call**: a [`Request`] carrying an id, answered by exactly one [`Response`]
//! - **Notification**: a [`Request`] without an id, never answered
//! - **Batch**: an ordered group of messages; a single message is a batch of one
//!
//! Request IDs are strings or integers in the full `i64` and `u64` ranges. A
//! `null` id is rejected by the decoder.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::error::RpcError;
use super::JSONRPC_VERSION;

/// A JSON-RPC request ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer request ID, echoed back exactly as received.
    Number(serde_json::Number),
    /// String request ID.
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// One decoded, well-formed request message.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Present for calls, absent for notifications.
    pub id: Option<RequestId>,
    /// The method or notification name.
    pub method: String,
    /// Parameters; `null` when the wire form carried none.
    pub params: Value,
}

impl Request {
    /// Creates a call.
    #[must_use]
    pub fn call(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Creates a notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Returns `true` if the wire form carried no id.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A batch slot that was well-formed JSON but not a valid request.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedMessage {
    /// The id, if it could be recovered before validation failed.
    pub id: Option<RequestId>,
    /// Why the message was rejected.
    pub error: RpcError,
}

/// The decoded form of one raw request text.
#[derive(Debug, Clone, Default)]
pub struct RequestBatch {
    /// Whether the wire form was an array.
    pub is_batch: bool,
    /// Messages in input order.
    pub messages: Vec<Result<Request, MalformedMessage>>,
}

impl RequestBatch {
    /// Wraps a single message.
    #[must_use]
    pub fn single(message: Result<Request, MalformedMessage>) -> Self {
        Self {
            is_batch: false,
            messages: vec![message],
        }
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there are no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A response to a call. Exactly one of result or error is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The request ID this response corresponds to (if known).
    pub id: Option<RequestId>,
    /// The result of the call, or why it failed.
    pub outcome: Result<Value, RpcError>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(id),
            outcome: Ok(result),
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    /// Returns `true` if this is an error response.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// Returns the result value, if any.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    /// Returns the error, if any.
    #[must_use]
    pub fn error_value(&self) -> Option<&RpcError> {
        self.outcome.as_ref().err()
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.id.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        match &self.outcome {
            Ok(result) => map.serialize_entry("result", result)?,
            Err(error) => map.serialize_entry("error", error)?,
        }
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        map.end()
    }
}

/// Responses collected while processing a [`RequestBatch`].
#[derive(Debug, Clone, Default)]
pub struct ResponseBatch {
    /// Whether the originating request was an array.
    pub is_batch: bool,
    /// Responses in the input order of their calls.
    pub responses: Vec<Response>,
}

impl ResponseBatch {
    /// Creates an empty collection shaped like the request.
    #[must_use]
    pub const fn new(is_batch: bool) -> Self {
        Self {
            is_batch,
            responses: Vec::new(),
        }
    }

    /// Creates a non-batch collection holding one response.
    #[must_use]
    pub fn single(response: Response) -> Self {
        Self {
            is_batch: false,
            responses: vec![response],
        }
    }

    /// Appends a response.
    pub fn push(&mut self, response: Response) {
        self.responses.push(response);
    }

    /// Returns `true` when nothing must be sent back (notifications only).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::error::RpcErrorCode;

    #[test]
    fn notification_has_no_id() {
        let notif = Request::notification("update", Value::Null);
        assert!(notif.is_notification());
        let call = Request::call(1_i64, "update", Value::Null);
        assert!(!call.is_notification());
    }

    #[test]
    fn serialise_success_response() {
        let response = Response::success(RequestId::from("13"), serde_json::json!({"ran": "ok"}));
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","result":{"ran":"ok"},"id":"13"}"#);
    }

    #[test]
    fn serialise_error_response_without_id() {
        let response = Response::error(None, RpcError::new(RpcErrorCode::ParseError));
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error"}}"#
        );
    }

    #[test]
    fn request_id_display() {
        assert_eq!(format!("{}", RequestId::from(42_i64)), "42");
        assert_eq!(format!("{}", RequestId::String("abc".to_string())), "abc");
    }

    #[test]
    fn response_accessors() {
        let ok = Response::success(RequestId::from(1_i64), Value::Bool(true));
        assert!(!ok.is_error());
        assert_eq!(ok.result(), Some(&Value::Bool(true)));
        assert!(ok.error_value().is_none());

        let err = Response::error(Some(RequestId::from(2_i64)), RpcErrorCode::InternalError.into());
        assert!(err.is_error());
        assert_eq!(err.error_value().map(|e| e.code), Some(RpcErrorCode::InternalError));
    }
}
