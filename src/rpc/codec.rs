//! Wire codec: raw text to [`RequestBatch`] and [`ResponseBatch`] to text.
//!
//! The decoder never fails past its boundary. A malformed envelope (invalid
//! JSON, empty array, scalar at the top level) is reported as a top-level
//! error; a batch slot that is valid JSON but not a valid request is kept in
//! place as a [`MalformedMessage`] so that the rest of the batch still runs.

use serde_json::{Map, Value};

use super::error::{RpcError, RpcErrorCode};
use super::message::{MalformedMessage, Request, RequestBatch, RequestId, ResponseBatch};
use super::JSONRPC_VERSION;

/// Decodes raw request text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    require_version: bool,
}

impl Decoder {
    /// Creates a decoder that accepts messages without a `jsonrpc` member.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            require_version: false,
        }
    }

    /// Rejects messages lacking the `jsonrpc` member when `required` is set.
    #[must_use]
    pub const fn with_required_version(mut self, required: bool) -> Self {
        self.require_version = required;
        self
    }

    /// Decodes `raw` into a batch of messages.
    ///
    /// # Errors
    ///
    /// Returns a top-level error if the text is not valid JSON, is an empty
    /// array, or is neither an object nor an array.
    pub fn extract(&self, raw: &str) -> Result<RequestBatch, RpcError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|_| RpcError::new(RpcErrorCode::ParseError))?;

        match value {
            Value::Array(elements) => {
                if elements.is_empty() {
                    return Err(RpcError::new(RpcErrorCode::InvalidRequest));
                }
                Ok(RequestBatch {
                    is_batch: true,
                    messages: elements
                        .into_iter()
                        .map(|element| self.decode_message(element))
                        .collect(),
                })
            }
            Value::Object(_) => Ok(RequestBatch::single(self.decode_message(value))),
            _ => Err(RpcError::new(RpcErrorCode::InvalidRequest)),
        }
    }

    /// Validates one batch slot.
    fn decode_message(&self, value: Value) -> Result<Request, MalformedMessage> {
        let Value::Object(mut obj) = value else {
            return Err(malformed(None, RpcErrorCode::InvalidRequest));
        };
        if obj.is_empty() {
            return Err(malformed(None, RpcErrorCode::InvalidRequest));
        }

        let id = decode_id(&obj)?;

        self.check_version(&obj)
            .map_err(|code| malformed(id.clone(), code))?;

        let method = match obj.remove("method") {
            None => return Err(malformed(id, RpcErrorCode::MissingMethod)),
            Some(Value::String(method)) => method,
            Some(_) => return Err(malformed(id, RpcErrorCode::InvalidMethodType)),
        };

        let params = match obj.remove("params") {
            None => Value::Null,
            Some(params @ (Value::Object(_) | Value::Array(_))) => params,
            Some(_) => return Err(malformed(id, RpcErrorCode::InvalidParamType)),
        };

        Ok(Request { id, method, params })
    }

    fn check_version(&self, obj: &Map<String, Value>) -> Result<(), RpcErrorCode> {
        match obj.get("jsonrpc") {
            None if self.require_version => Err(RpcErrorCode::MissingVersion),
            None => Ok(()),
            Some(Value::String(v)) if v == JSONRPC_VERSION => Ok(()),
            Some(Value::String(_)) => Err(RpcErrorCode::InvalidVersion),
            Some(_) => Err(RpcErrorCode::InvalidVersionType),
        }
    }
}

/// Recovers the id. Absence marks a notification.
fn decode_id(obj: &Map<String, Value>) -> Result<Option<RequestId>, MalformedMessage> {
    match obj.get("id") {
        None => Ok(None),
        Some(Value::Null) => Err(malformed(None, RpcErrorCode::NullId)),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s.clone()))),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => {
            Ok(Some(RequestId::Number(n.clone())))
        }
        Some(Value::Number(_)) => Err(malformed(None, RpcErrorCode::InvalidIdType)),
        Some(_) => Err(malformed(None, RpcErrorCode::InvalidIdType)),
    }
}

fn malformed(id: Option<RequestId>, code: RpcErrorCode) -> MalformedMessage {
    MalformedMessage {
        id,
        error: RpcError::new(code),
    }
}

/// Encodes responses back to text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder;

impl Encoder {
    /// Renders a batch as an array and a single response as a bare object.
    ///
    /// # Errors
    ///
    /// Returns an error if a result value cannot be serialised.
    pub fn encode(batch: &ResponseBatch) -> Result<String, serde_json::Error> {
        match (batch.is_batch, batch.responses.as_slice()) {
            (false, [single]) => serde_json::to_string(single),
            (_, responses) => serde_json::to_string(responses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::message::Response;
    use serde_json::json;

    fn decode_one(raw: &str) -> Result<Request, MalformedMessage> {
        let mut batch = Decoder::new().extract(raw).unwrap();
        assert!(!batch.is_batch);
        batch.messages.remove(0)
    }

    fn error_code(result: Result<Request, MalformedMessage>) -> RpcErrorCode {
        result.unwrap_err().error.code
    }

    #[test]
    fn decode_call() {
        let req = decode_one(r#"{"jsonrpc": "2.0", "id": "13", "method": "m", "params": {"a": 1}}"#)
            .unwrap();
        assert_eq!(req.id, Some(RequestId::from("13")));
        assert_eq!(req.method, "m");
        assert_eq!(req.params, json!({"a": 1}));
    }

    #[test]
    fn decode_notification_without_params() {
        let req = decode_one(r#"{"jsonrpc": "2.0", "method": "foobar"}"#).unwrap();
        assert!(req.is_notification());
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn version_is_optional_by_default() {
        let req = decode_one(r#"{"method": "show_registered_handlers", "id": "1"}"#).unwrap();
        assert_eq!(req.id, Some(RequestId::from("1")));
    }

    #[test]
    fn missing_version_when_required() {
        let mut batch = Decoder::new()
            .with_required_version(true)
            .extract(r#"{"method": "m", "id": 7}"#)
            .unwrap();
        let err = batch.messages.remove(0).unwrap_err();
        assert_eq!(err.error.code, RpcErrorCode::MissingVersion);
        assert_eq!(err.id, Some(RequestId::from(7_i64)));
    }

    #[test]
    fn wrong_version() {
        let raw = r#"{"jsonrpc": "2.8", "method": "m", "id": "15"}"#;
        let err = decode_one(raw).unwrap_err();
        assert_eq!(err.error.code, RpcErrorCode::InvalidVersion);
        assert_eq!(err.id, Some(RequestId::from("15")));

        let raw = r#"{"jsonrpc": 2.0, "method": "m", "id": "13"}"#;
        assert_eq!(error_code(decode_one(raw)), RpcErrorCode::InvalidVersionType);
    }

    #[test]
    fn method_validation() {
        assert_eq!(
            error_code(decode_one(r#"{"jsonrpc": "2.0", "method": 123, "id": "14"}"#)),
            RpcErrorCode::InvalidMethodType
        );
        assert_eq!(
            error_code(decode_one(r#"{"jsonrpc": "2.0", "id": "14"}"#)),
            RpcErrorCode::MissingMethod
        );
    }

    #[test]
    fn params_must_be_structured() {
        let raw = r#"{"jsonrpc": "2.0", "method": "m", "params": 13, "id": "13"}"#;
        assert_eq!(error_code(decode_one(raw)), RpcErrorCode::InvalidParamType);
    }

    #[test]
    fn id_validation() {
        let err = decode_one(r#"{"jsonrpc": "2.0", "method": "m", "id": null}"#).unwrap_err();
        assert_eq!(err.error.code, RpcErrorCode::NullId);
        assert!(err.id.is_none());

        assert_eq!(
            error_code(decode_one(r#"{"jsonrpc": "2.0", "method": "m", "id": [1]}"#)),
            RpcErrorCode::InvalidIdType
        );
        assert_eq!(
            error_code(decode_one(r#"{"jsonrpc": "2.0", "method": "m", "id": 1.5}"#)),
            RpcErrorCode::InvalidIdType
        );
    }

    #[test]
    fn integer_ids_cover_both_signed_and_unsigned_ranges() {
        let req = decode_one(r#"{"method": "m", "id": 18446744073709551615}"#).unwrap();
        assert_eq!(req.id, Some(RequestId::from(u64::MAX)));

        let req = decode_one(r#"{"method": "m", "id": -9223372036854775808}"#).unwrap();
        assert_eq!(req.id, Some(RequestId::from(i64::MIN)));
    }

    #[test]
    fn empty_object_is_invalid_request() {
        assert_eq!(error_code(decode_one("{}")), RpcErrorCode::InvalidRequest);
    }

    #[test]
    fn top_level_errors() {
        let decoder = Decoder::new();
        assert_eq!(
            decoder.extract("not json").unwrap_err().code,
            RpcErrorCode::ParseError
        );
        assert_eq!(decoder.extract("[]").unwrap_err().code, RpcErrorCode::InvalidRequest);
        assert_eq!(decoder.extract("42").unwrap_err().code, RpcErrorCode::InvalidRequest);
    }

    #[test]
    fn batch_keeps_malformed_slots_in_place() {
        let batch = Decoder::new()
            .extract(r#"[1, {"method": "m", "id": 2}, {}]"#)
            .unwrap();
        assert!(batch.is_batch);
        assert_eq!(batch.len(), 3);
        assert!(batch.messages[0].is_err());
        assert!(batch.messages[1].is_ok());
        assert!(batch.messages[2].is_err());
    }

    #[test]
    fn encode_single_and_batch() {
        let response = Response::success(RequestId::from(1_i64), json!(19));

        let single = ResponseBatch::single(response.clone());
        assert_eq!(
            Encoder::encode(&single).unwrap(),
            r#"{"jsonrpc":"2.0","result":19,"id":1}"#
        );

        let mut batch = ResponseBatch::new(true);
        batch.push(response);
        assert_eq!(
            Encoder::encode(&batch).unwrap(),
            r#"[{"jsonrpc":"2.0","result":19,"id":1}]"#
        );
    }
}
