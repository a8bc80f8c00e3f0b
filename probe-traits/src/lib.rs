/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shared wire types for the `probe` runtime and anything that talks to it
//! over the socket. Kept independent of the runtime crate so the wire
//! contract can be versioned separately from the actor implementation, the
//! same split `devtools_traits` draws against `devtools`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications sent *to* the probe (none defined today,
    /// but the field is optional per the JSON-RPC 2.0 spec).
    #[serde(default)]
    pub id: Option<Value>,
}

/// The envelope every successful RPC result is wrapped in: spec.md §6.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub result: Value,
    pub meta: EnvelopeMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    pub timestamp: i64,
}

impl ResultEnvelope {
    pub fn new(result: Value, timestamp_ms: i64) -> Self {
        ResultEnvelope {
            result,
            meta: EnvelopeMeta {
                timestamp: timestamp_ms,
            },
        }
    }
}

/// A full JSON-RPC 2.0 response, success or error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Success {
        jsonrpc: &'static str,
        result: Value,
        id: Value,
    },
    Error {
        jsonrpc: &'static str,
        error: RpcErrorBody,
        id: Value,
    },
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        RpcResponse::Success {
            jsonrpc: "2.0",
            result,
            id,
        }
    }

    pub fn error(id: Value, error: RpcErrorBody) -> Self {
        RpcResponse::Error {
            jsonrpc: "2.0",
            error,
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 notification pushed by the probe outside of any
/// request/response pair (spec.md §4.10, §6).
#[derive(Debug, Clone, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl RpcNotification {
    pub fn new(method: &'static str, params: Value) -> Self {
        RpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Standard JSON-RPC 2.0 codes, reused verbatim.
pub mod jsonrpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Domain error code taxonomy, spec.md §7. Codes descend from -32000 so
/// they never collide with the standard JSON-RPC range above.
pub mod domain_codes {
    // Object layer
    pub const OBJECT_NOT_FOUND: i64 = -32000;
    pub const WIDGET_NOT_VISIBLE: i64 = -32001;
    pub const PROPERTY_NOT_FOUND: i64 = -32002;
    pub const NOT_READABLE: i64 = -32003;
    pub const READ_ONLY: i64 = -32004;
    pub const CONVERSION_FAILED: i64 = -32005;
    pub const METHOD_NOT_FOUND_DOMAIN: i64 = -32006;
    pub const INVOCATION_FAILED: i64 = -32007;
    pub const SIGNAL_NOT_FOUND: i64 = -32008;
    pub const SUBSCRIPTION_NOT_FOUND: i64 = -32009;

    // Coordinate layer
    pub const NO_ACTIVE_WINDOW: i64 = -32010;
    pub const COORDINATE_OUT_OF_BOUNDS: i64 = -32011;
    pub const NO_FOCUSED_WIDGET: i64 = -32012;
    pub const KEY_PARSE_ERROR: i64 = -32013;

    // Accessibility layer
    pub const REF_NOT_FOUND: i64 = -32020;
    pub const REF_STALE: i64 = -32021;
    pub const FORM_INPUT_UNSUPPORTED: i64 = -32022;
    pub const TREE_TOO_LARGE: i64 = -32023;
    pub const FIND_TOO_MANY_RESULTS: i64 = -32024;
    pub const NAVIGATE_INVALID: i64 = -32025;
    pub const CONSOLE_NOT_AVAILABLE: i64 = -32026;

    // QML/model layer
    pub const QML_NOT_AVAILABLE: i64 = -32030;
    pub const QML_CONTEXT_NOT_FOUND: i64 = -32031;
    pub const NOT_QML_ITEM: i64 = -32032;
    pub const MODEL_NOT_FOUND: i64 = -32033;
    pub const MODEL_INDEX_OUT_OF_BOUNDS: i64 = -32034;
    pub const ROLE_NOT_FOUND: i64 = -32035;
    pub const NOT_A_MODEL: i64 = -32036;
}

/// Notification method names pushed by the probe, spec.md §4.10.
pub mod notification_methods {
    pub const SIGNAL_EMITTED: &str = "qtmcp.signalEmitted";
    pub const OBJECT_CREATED: &str = "qtmcp.objectCreated";
    pub const OBJECT_DESTROYED: &str = "qtmcp.objectDestroyed";
    pub const EVENT_CAPTURED: &str = "qtmcp.eventCaptured";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_serializes_flat_fields() {
        let resp = RpcResponse::success(Value::from(1), Value::from("ok"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["result"], "ok");
        assert_eq!(json["id"], 1);
    }

    #[test]
    fn error_envelope_carries_data() {
        let resp = RpcResponse::error(
            Value::Null,
            RpcErrorBody {
                code: domain_codes::OBJECT_NOT_FOUND,
                message: "object not found".into(),
                data: Some(serde_json::json!({"id": "foo/bar"})),
            },
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"]["code"], domain_codes::OBJECT_NOT_FOUND);
        assert_eq!(json["error"]["data"]["id"], "foo/bar");
    }
}
