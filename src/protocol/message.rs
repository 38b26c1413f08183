//! JSON-RPC 2.0 message model.
//!
//! Outgoing messages are concrete structs so that field order on the wire is
//! deterministic: `id`, `method`, `params`, with the protocol-version tag
//! last, matching the agent's own framing. Inbound payloads arrive as
//! untyped [`serde_json::Value`]s and are classified by shape.

use serde::Serialize;
use serde_json::Value;

/// Fixed protocol-version tag merged into every outgoing message.
pub const JSONRPC_VERSION: &str = "2.0";

/// An outgoing request. Carries an `id` and expects a correlated response.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
    pub jsonrpc: &'static str,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            id,
            method,
            params,
            jsonrpc: JSONRPC_VERSION,
        }
    }
}

/// An outgoing notification. No `id`, no reply expected.
#[derive(Debug, Serialize)]
pub struct Notification<'a> {
    pub method: &'a str,
    pub params: Value,
    pub jsonrpc: &'static str,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Value) -> Self {
        Self {
            method,
            params,
            jsonrpc: JSONRPC_VERSION,
        }
    }
}

/// A classified inbound payload.
#[derive(Debug)]
pub enum Incoming {
    /// Successful response to one of our requests.
    Response { id: u64, result: Value },
    /// Error response to one of our requests; `error` is the server payload.
    Error { id: u64, error: Value },
    /// Server-initiated push with no id.
    Notification { method: String, params: Value },
    /// Anything else (id without result/error, or no id and no method).
    /// Dropped by the dispatcher, never routed as a notification.
    Unroutable(Value),
}

impl Incoming {
    /// Classify a decoded payload by the keys it carries.
    ///
    /// A payload with an `id` is only ever a response (success or error);
    /// id-less payloads with a `method` are notifications.
    pub fn classify(mut payload: Value) -> Self {
        let id = payload.get("id").and_then(Value::as_u64);

        if let Some(id) = id {
            if let Some(obj) = payload.as_object_mut() {
                if let Some(result) = obj.remove("result") {
                    return Incoming::Response { id, result };
                }
                if let Some(error) = obj.remove("error") {
                    return Incoming::Error { id, error };
                }
            }
            return Incoming::Unroutable(payload);
        }

        // An id of any other shape (string, null) still marks the payload
        // as response-like; it must not reach the notification handler.
        if payload.get("id").is_some() {
            return Incoming::Unroutable(payload);
        }

        if payload.get("method").map_or(false, Value::is_string) {
            if let Some(obj) = payload.as_object_mut() {
                let method = obj
                    .remove("method")
                    .and_then(|m| m.as_str().map(str::to_owned))
                    .unwrap_or_default();
                let params = obj.remove("params").unwrap_or(Value::Null);
                return Incoming::Notification { method, params };
            }
        }

        Incoming::Unroutable(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_field_order() {
        let req = Request::new(1, "checkStatus", json!({}));
        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(
            text,
            r#"{"id":1,"method":"checkStatus","params":{},"jsonrpc":"2.0"}"#
        );
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = Notification::new("initialized", json!({}));
        let text = serde_json::to_string(&note).unwrap();
        assert_eq!(text, r#"{"method":"initialized","params":{},"jsonrpc":"2.0"}"#);
    }

    #[test]
    fn test_classify_response() {
        let incoming = Incoming::classify(json!({"jsonrpc": "2.0", "id": 3, "result": {"ok": true}}));
        match incoming {
            Incoming::Response { id, result } => {
                assert_eq!(id, 3);
                assert_eq!(result, json!({"ok": true}));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let incoming = Incoming::classify(json!({"id": 7, "error": {"code": -32600, "message": "bad"}}));
        match incoming {
            Incoming::Error { id, error } => {
                assert_eq!(id, 7);
                assert_eq!(error["code"], -32600);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_notification() {
        let incoming = Incoming::classify(json!({
            "method": "statusNotification",
            "params": {"status": "Normal"}
        }));
        match incoming {
            Incoming::Notification { method, params } => {
                assert_eq!(method, "statusNotification");
                assert_eq!(params["status"], "Normal");
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_notification_without_params() {
        let incoming = Incoming::classify(json!({"method": "ping"}));
        match incoming {
            Incoming::Notification { method, params } => {
                assert_eq!(method, "ping");
                assert_eq!(params, Value::Null);
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_id_without_result_or_error_is_unroutable() {
        // A server-to-client request; this crate is client-only, so it is
        // never delivered as a notification.
        let incoming = Incoming::classify(json!({"id": 9, "method": "window/showMessageRequest"}));
        assert!(matches!(incoming, Incoming::Unroutable(_)));
    }

    #[test]
    fn test_classify_non_numeric_id_is_never_a_notification() {
        // A string id marks a response-like payload even though it can never
        // match a pending entry; the method key must not promote it.
        let incoming = Incoming::classify(json!({
            "id": "conv-1",
            "method": "conversation/context",
            "params": {}
        }));
        assert!(matches!(incoming, Incoming::Unroutable(_)));

        let incoming = Incoming::classify(json!({"id": null, "method": "ping"}));
        assert!(matches!(incoming, Incoming::Unroutable(_)));
    }

    #[test]
    fn test_classify_garbage_is_unroutable() {
        assert!(matches!(
            Incoming::classify(json!({"neither": "fish"})),
            Incoming::Unroutable(_)
        ));
        assert!(matches!(
            Incoming::classify(json!([1, 2, 3])),
            Incoming::Unroutable(_)
        ));
    }
}
