//! JSON-RPC envelope model
//!
//! Every message on the wire is one of four envelopes. They carry no tag; the
//! kind is recovered from which fields are present, so decoding is done by
//! hand from a `serde_json::Value` instead of through an untagged derive.

use std::fmt;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{ Deserialize, Deserializer, Serialize, Serializer };
use serde_json::{ Map, Value };
use thiserror::Error;

use crate::errors::{ Error, ErrorData };
use crate::protocol::types::ProgressToken;

/// JSON-RPC version string written on every outbound message
pub const JSONRPC_VERSION: &str = "2.0";

/// A uniquely identifying ID for a request in JSON-RPC.
///
/// `1` and `"1"` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id
    Number(i64),
    /// String id
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Reasons an inbound message could not be turned into an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message carries both `result` and `error`")]
    AmbiguousResponse,

    #[error("`id` must be an integer or a string")]
    InvalidIdType,

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),

    #[error("invalid error object: {0}")]
    InvalidErrorObject(String),

    #[error("message is not a request, notification or response")]
    MalformedEnvelope,
}

/// A request that expects a response
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Progress token the sender attached under `params._meta.progressToken`
    pub fn progress_token(&self) -> Option<ProgressToken> {
        progress_token_of(self.params.as_ref())
    }
}

/// A one-way message that never receives a reply
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub struct Notification {
    pub method: String,
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A successful (non-error) response to a request
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub struct Response {
    pub id: RequestId,
    pub result: Value,
}

/// A response to a request that indicates an error occurred
#[derive(Debug, Clone, PartialEq, JsonSchema)]
pub struct ErrorResponse {
    pub id: RequestId,
    pub error: ErrorData,
}

/// Any message that can travel over the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
}

impl Envelope {
    pub fn request(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Envelope::Request(Request::new(id, method, params))
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Envelope::Notification(Notification::new(method, params))
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        Envelope::Response(Response { id, result })
    }

    pub fn error(id: RequestId, error: ErrorData) -> Self {
        Envelope::Error(ErrorResponse { id, error })
    }

    /// Get the ID of the message if it has one
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Envelope::Request(r) => Some(&r.id),
            Envelope::Response(r) => Some(&r.id),
            Envelope::Error(e) => Some(&e.id),
            Envelope::Notification(_) => None,
        }
    }

    /// Get the method of the message if it has one
    pub fn method(&self) -> Option<&str> {
        match self {
            Envelope::Request(r) => Some(&r.method),
            Envelope::Notification(n) => Some(&n.method),
            _ => None,
        }
    }
}

/// Decode one complete JSON document into an envelope
pub fn parse(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| DecodeError::Json(e.to_string()))?;
    parse_value(value)
}

/// Classify an already-parsed JSON value as an envelope
pub fn parse_value(value: Value) -> Result<Envelope, DecodeError> {
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::NotAnObject);
    };

    if obj.contains_key("result") && obj.contains_key("error") {
        return Err(DecodeError::AmbiguousResponse);
    }

    let id = match obj.remove("id") {
        None => None,
        Some(Value::String(s)) => Some(RequestId::String(s)),
        Some(Value::Number(n)) => Some(RequestId::Number(n.as_i64().ok_or(DecodeError::InvalidIdType)?)),
        Some(_) => return Err(DecodeError::InvalidIdType),
    };

    let method = match obj.remove("method") {
        None => None,
        Some(Value::String(m)) => Some(m),
        Some(_) => return Err(DecodeError::MissingField("method")),
    };

    // `"params": null` is treated the same as an absent field
    let params = obj.remove("params").filter(|p| !p.is_null());

    match (id, method) {
        (Some(id), Some(method)) => Ok(Envelope::Request(Request { id, method, params })),
        (Some(id), None) => {
            if let Some(result) = obj.remove("result") {
                Ok(Envelope::Response(Response { id, result }))
            } else if let Some(error) = obj.remove("error") {
                let error = serde_json::from_value(error)
                    .map_err(|e| DecodeError::InvalidErrorObject(e.to_string()))?;
                Ok(Envelope::Error(ErrorResponse { id, error }))
            } else if params.is_some() {
                Err(DecodeError::MissingField("method"))
            } else {
                Err(DecodeError::MalformedEnvelope)
            }
        }
        (None, Some(method)) => Ok(Envelope::Notification(Notification { method, params })),
        (None, None) if params.is_some() => Err(DecodeError::MissingField("method")),
        (None, None) => Err(DecodeError::MalformedEnvelope),
    }
}

/// Encode an envelope as one compact JSON document
pub fn serialize(envelope: &Envelope) -> Result<Bytes, Error> {
    Ok(Bytes::from(serde_json::to_vec(envelope)?))
}

/// Flat wire view; unset fields are skipped rather than written as `null`
#[derive(Serialize)]
struct Wire<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorData>,
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut wire = Wire {
            jsonrpc: JSONRPC_VERSION,
            id: self.id(),
            method: self.method(),
            params: None,
            result: None,
            error: None,
        };
        match self {
            Envelope::Request(r) => wire.params = r.params.as_ref().filter(|p| !p.is_null()),
            Envelope::Notification(n) => wire.params = n.params.as_ref().filter(|p| !p.is_null()),
            Envelope::Response(r) => wire.result = Some(&r.result),
            Envelope::Error(e) => wire.error = Some(&e.error),
        }
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_value(value).map_err(D::Error::custom)
    }
}

/// Read `_meta.progressToken` out of a params object
pub(crate) fn progress_token_of(params: Option<&Value>) -> Option<ProgressToken> {
    params?
        .get("_meta")?
        .get("progressToken")
        .and_then(|token| serde_json::from_value(token.clone()).ok())
}

/// Write `_meta.progressToken` into a params object, creating it if needed
pub(crate) fn attach_progress_token(params: Option<Value>, token: &ProgressToken) -> Result<Value, Error> {
    let mut params = match params {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(Error::InvalidParams("params must be an object to carry a progress token".into()));
        }
    };
    let meta = params.entry("_meta").or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(meta) = meta else {
        return Err(Error::InvalidParams("`_meta` must be an object".into()));
    };
    meta.insert("progressToken".to_string(), serde_json::to_value(token)?);
    Ok(Value::Object(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_json(value: Value) -> Result<Envelope, DecodeError> {
        parse(value.to_string().as_bytes())
    }

    #[test]
    fn request_ids_keep_their_kind() {
        for id in [json!(7), json!("7"), json!(-3), json!("")] {
            let envelope = parse_json(json!({ "jsonrpc": "2.0", "id": id, "method": "ping" })).unwrap();
            let bytes = serialize(&envelope).unwrap();
            let back: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(back["id"], id);
        }

        assert_ne!(RequestId::from(1), RequestId::from("1"));
    }

    #[test]
    fn classifies_by_field_presence() {
        assert!(matches!(
            parse_json(json!({ "id": 1, "method": "tools/list" })),
            Ok(Envelope::Request(_))
        ));
        assert!(matches!(
            parse_json(json!({ "method": "notifications/initialized" })),
            Ok(Envelope::Notification(_))
        ));
        assert!(matches!(
            parse_json(json!({ "id": 1, "result": {} })),
            Ok(Envelope::Response(_))
        ));
        assert!(matches!(
            parse_json(json!({ "id": "a", "error": { "code": -32601, "message": "no" } })),
            Ok(Envelope::Error(ErrorResponse { id: RequestId::String(_), .. }))
        ));
    }

    #[test]
    fn null_result_is_still_a_response() {
        let envelope = parse_json(json!({ "id": 3, "result": null })).unwrap();
        assert_eq!(envelope, Envelope::response(RequestId::Number(3), Value::Null));
    }

    #[test]
    fn decode_errors_follow_rule_order() {
        assert_eq!(parse(b"{not json"), Err(DecodeError::Json(
            serde_json::from_slice::<Value>(b"{not json").unwrap_err().to_string()
        )));
        assert_eq!(parse_json(json!([1, 2])), Err(DecodeError::NotAnObject));
        assert_eq!(
            parse_json(json!({ "id": 1.5, "result": {}, "error": {} })),
            Err(DecodeError::AmbiguousResponse)
        );
        assert_eq!(parse_json(json!({ "id": 1.5, "method": "ping" })), Err(DecodeError::InvalidIdType));
        assert_eq!(parse_json(json!({ "id": null, "result": {} })), Err(DecodeError::InvalidIdType));
        assert_eq!(parse_json(json!({ "id": true, "method": "ping" })), Err(DecodeError::InvalidIdType));
        assert_eq!(parse_json(json!({ "method": 12 })), Err(DecodeError::MissingField("method")));
        assert_eq!(parse_json(json!({ "params": {} })), Err(DecodeError::MissingField("method")));
        assert_eq!(parse_json(json!({ "id": 1 })), Err(DecodeError::MalformedEnvelope));
        assert_eq!(parse_json(json!({ "result": {} })), Err(DecodeError::MalformedEnvelope));
        assert!(matches!(
            parse_json(json!({ "id": 1, "error": { "message": "no code" } })),
            Err(DecodeError::InvalidErrorObject(_))
        ));
    }

    #[test]
    fn unset_params_are_omitted() {
        let envelope = Envelope::request(4, "ping", Some(Value::Null));
        let bytes = serialize(&envelope).unwrap();
        assert_eq!(&bytes[..], br#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#);
    }

    #[test]
    fn wire_format_snapshots() {
        let request = Envelope::request(7, "tools/list", Some(json!({ "cursor": "abc" })));
        insta::assert_snapshot!(
            String::from_utf8(serialize(&request).unwrap().to_vec()).unwrap(),
            @r#"{"jsonrpc":"2.0","id":7,"method":"tools/list","params":{"cursor":"abc"}}"#
        );

        let error = Envelope::error(RequestId::from("x"), ErrorData::new(-32601, "Method not found: foo"));
        insta::assert_snapshot!(
            String::from_utf8(serialize(&error).unwrap().to_vec()).unwrap(),
            @r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32601,"message":"Method not found: foo"}}"#
        );
    }

    #[test]
    fn envelope_deserializes_through_serde() {
        let envelope: Envelope = serde_json::from_value(json!({ "method": "notifications/progress" })).unwrap();
        assert_eq!(envelope.method(), Some("notifications/progress"));
        assert!(envelope.id().is_none());

        let err = serde_json::from_value::<Envelope>(json!("nope")).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn progress_token_is_attached_under_meta() {
        let token = ProgressToken::String("tok".into());
        let params = attach_progress_token(Some(json!({ "name": "x", "_meta": { "k": 1 } })), &token).unwrap();
        assert_eq!(params, json!({ "name": "x", "_meta": { "k": 1, "progressToken": "tok" } }));

        let request = Request::new(1, "tools/call", Some(params));
        assert_eq!(request.progress_token(), Some(token));

        assert!(attach_progress_token(Some(json!([1])), &ProgressToken::Number(1)).is_err());
        assert_eq!(
            attach_progress_token(None, &ProgressToken::Number(9)).unwrap(),
            json!({ "_meta": { "progressToken": 9 } })
        );
    }
}
