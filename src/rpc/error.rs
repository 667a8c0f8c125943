//! Error taxonomy for the dispatch engine.
//!
//! Codes are split in two ranges:
//!
//! - **Protocol codes** defined by JSON-RPC 2.0 (`-32700`, `-32600..=-32603`)
//! - **Engine codes** (positive) refining request validation and execution
//!
//! Errors are values. They are created where a failure is detected, carried
//! through the call stack and converted into a response `error` member by the
//! engine. Equality only looks at the code.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Closed set of error codes understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The JSON sent is not a valid request object.
    InvalidRequest,
    /// No handler registered under that name for the message kind.
    MethodNotFound,
    /// Handler-detected bad arguments.
    InvalidParams,
    /// Unexpected failure inside a handler or the engine.
    InternalError,
    /// `jsonrpc` member present but not `"2.0"`.
    InvalidVersion,
    /// `jsonrpc` member present but not a string.
    InvalidVersionType,
    /// `jsonrpc` member absent while the engine requires it.
    MissingVersion,
    /// `method` member is not a string.
    InvalidMethodType,
    /// `method` member absent.
    MissingMethod,
    /// `params` member is neither an object nor an array.
    InvalidParamType,
    /// `id` member is neither a string nor an integer.
    InvalidIdType,
    /// `id` member is `null`.
    NullId,
    /// The handler ran and reported a failure through its errata.
    ExecutionError,
    /// A permission checker rejected the call.
    Unauthorized,
}

impl RpcErrorCode {
    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::InvalidVersion => 1,
            Self::InvalidVersionType => 2,
            Self::MissingVersion => 3,
            Self::InvalidMethodType => 4,
            Self::MissingMethod => 5,
            Self::InvalidParamType => 6,
            Self::InvalidIdType => 7,
            Self::NullId => 8,
            Self::ExecutionError => 9,
            Self::Unauthorized => 10,
        }
    }

    /// Returns the default message for this code.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::InvalidVersion => "Invalid version, 2.0 only",
            Self::InvalidVersionType => "Invalid version type, should be a string",
            Self::MissingVersion => "Missing version field",
            Self::InvalidMethodType => "Invalid method type, should be a string",
            Self::MissingMethod => "Missing method field",
            Self::InvalidParamType => "Invalid params type, should be a structure",
            Self::InvalidIdType => "Invalid id type",
            Self::NullId => "Use of null as id is discouraged",
            Self::ExecutionError => "Error during execution",
            Self::Unauthorized => "Unauthorized action",
        }
    }

    /// Returns `true` for codes reserved by the JSON-RPC 2.0 protocol.
    #[must_use]
    pub const fn is_protocol(self) -> bool {
        self.code() < 0
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// An error value carried by a response.
#[derive(Debug, Clone)]
pub struct RpcError {
    /// The error code.
    pub code: RpcErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Additional structured information.
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an error carrying the default message of `code`.
    #[must_use]
    pub fn new(code: RpcErrorCode) -> Self {
        Self {
            code,
            message: code.message().to_string(),
            data: None,
        }
    }

    /// Creates an error with a custom message.
    #[must_use]
    pub fn with_message(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<RpcErrorCode> for RpcError {
    fn from(code: RpcErrorCode) -> Self {
        Self::new(code)
    }
}

impl PartialEq for RpcError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for RpcError {}

impl PartialEq<RpcErrorCode> for RpcError {
    fn eq(&self, other: &RpcErrorCode) -> bool {
        self.code == *other
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code.code())
    }
}

impl std::error::Error for RpcError {}

impl Serialize for RpcError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.data.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("RpcError", len)?;
        state.serialize_field("code", &self.code.code())?;
        state.serialize_field("message", &self.message)?;
        if let Some(data) = &self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_codes() {
        assert_eq!(RpcErrorCode::ParseError.code(), -32700);
        assert_eq!(RpcErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(RpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(RpcErrorCode::InvalidParams.code(), -32602);
        assert_eq!(RpcErrorCode::InternalError.code(), -32603);
        assert!(RpcErrorCode::InternalError.is_protocol());
        assert!(!RpcErrorCode::NullId.is_protocol());
    }

    #[test]
    fn codes_are_unique() {
        let all = [
            RpcErrorCode::ParseError,
            RpcErrorCode::InvalidRequest,
            RpcErrorCode::MethodNotFound,
            RpcErrorCode::InvalidParams,
            RpcErrorCode::InternalError,
            RpcErrorCode::InvalidVersion,
            RpcErrorCode::InvalidVersionType,
            RpcErrorCode::MissingVersion,
            RpcErrorCode::InvalidMethodType,
            RpcErrorCode::MissingMethod,
            RpcErrorCode::InvalidParamType,
            RpcErrorCode::InvalidIdType,
            RpcErrorCode::NullId,
            RpcErrorCode::ExecutionError,
            RpcErrorCode::Unauthorized,
        ];
        let codes: std::collections::HashSet<i32> = all.into_iter().map(RpcErrorCode::code).collect();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn equality_ignores_message() {
        let a = RpcError::with_message(RpcErrorCode::MethodNotFound, "one");
        let b = RpcError::with_message(RpcErrorCode::MethodNotFound, "two");
        assert_eq!(a, b);
        assert_ne!(a, RpcError::new(RpcErrorCode::InternalError));
        assert_eq!(a, RpcErrorCode::MethodNotFound);
    }

    #[test]
    fn serialise_without_data() {
        let json = serde_json::to_string(&RpcError::new(RpcErrorCode::InvalidRequest)).unwrap();
        assert_eq!(json, r#"{"code":-32600,"message":"Invalid Request"}"#);
    }

    #[test]
    fn serialise_with_data() {
        let error = RpcError::new(RpcErrorCode::ExecutionError)
            .with_data(serde_json::json!([{"code": 100, "message": "Record not found."}]));
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains(r#""code":9"#));
        assert!(json.contains(r#""data":[{"code":100"#));
    }
}
