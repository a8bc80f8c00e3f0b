/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The domain error taxonomy from spec.md §7, plus the conversion into the
//! wire-level `RpcErrorBody` the surfaces hand back to clients.

use probe_traits::domain_codes as dc;
use probe_traits::RpcErrorBody;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    // Object layer
    #[error("object not found: {id}")]
    ObjectNotFound { id: String },
    #[error("widget not visible: {id}")]
    WidgetNotVisible { id: String },
    #[error("property not found: {name} on {id}")]
    PropertyNotFound { id: String, name: String },
    #[error("property not readable: {name} on {id}")]
    NotReadable { id: String, name: String },
    #[error("property is read-only: {name} on {id}")]
    ReadOnly { id: String, name: String },
    #[error("could not convert value for {name}: {reason}")]
    ConversionFailed { name: String, reason: String },
    #[error("method not found: {name}/{arity} on {id}")]
    MethodNotFoundDomain {
        id: String,
        name: String,
        arity: usize,
    },
    #[error("invocation failed: {name} on {id}: {reason}")]
    InvocationFailed {
        id: String,
        name: String,
        reason: String,
    },
    #[error("signal not found: {name} on {id}")]
    SignalNotFound { id: String, name: String },
    #[error("subscription not found: {id}")]
    SubscriptionNotFound { id: u64 },

    // Coordinate layer
    #[error("no active window")]
    NoActiveWindow,
    #[error("coordinate out of bounds: ({x}, {y})")]
    CoordinateOutOfBounds {
        x: f64,
        y: f64,
        window_width: f64,
        window_height: f64,
    },
    #[error("no focused widget")]
    NoFocusedWidget,
    #[error("could not parse key combo: {combo}")]
    KeyParseError { combo: String },

    // Accessibility layer
    #[error("accessibility ref not found: {reference}")]
    RefNotFound { reference: String },
    #[error("accessibility ref is stale: {reference}")]
    RefStale { reference: String },
    #[error("form input unsupported for ref {reference}: {reason}")]
    FormInputUnsupported { reference: String, reason: String },
    #[error("accessibility tree too large: {total_nodes} nodes, {max_chars} char budget")]
    TreeTooLarge {
        total_nodes: usize,
        max_chars: usize,
    },
    #[error("find produced too many results: {count} (limit {limit})")]
    FindTooManyResults { count: usize, limit: usize },
    #[error("navigate target invalid: {reference}")]
    NavigateInvalid { reference: String },
    #[error("console not available")]
    ConsoleNotAvailable,

    // QML/model layer
    #[error("QML support not available")]
    QmlNotAvailable,
    #[error("QML context not found: {id}")]
    QmlContextNotFound { id: String },
    #[error("object is not a QML item: {id}")]
    NotQmlItem { id: String },
    #[error("model not found: {id}")]
    ModelNotFound { id: String },
    #[error("model index out of bounds: row {row}, column {column}")]
    ModelIndexOutOfBounds { row: i64, column: i64 },
    #[error("role not found: {role}")]
    RoleNotFound {
        role: String,
        available: Vec<String>,
    },
    #[error("object is not a model: {id}")]
    NotAModel { id: String },

    // Wire-level
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    pub fn code(&self) -> i64 {
        use ProbeError::*;
        match self {
            ObjectNotFound { .. } => dc::OBJECT_NOT_FOUND,
            WidgetNotVisible { .. } => dc::WIDGET_NOT_VISIBLE,
            PropertyNotFound { .. } => dc::PROPERTY_NOT_FOUND,
            NotReadable { .. } => dc::NOT_READABLE,
            ReadOnly { .. } => dc::READ_ONLY,
            ConversionFailed { .. } => dc::CONVERSION_FAILED,
            MethodNotFoundDomain { .. } => dc::METHOD_NOT_FOUND_DOMAIN,
            InvocationFailed { .. } => dc::INVOCATION_FAILED,
            SignalNotFound { .. } => dc::SIGNAL_NOT_FOUND,
            SubscriptionNotFound { .. } => dc::SUBSCRIPTION_NOT_FOUND,
            NoActiveWindow => dc::NO_ACTIVE_WINDOW,
            CoordinateOutOfBounds { .. } => dc::COORDINATE_OUT_OF_BOUNDS,
            NoFocusedWidget => dc::NO_FOCUSED_WIDGET,
            KeyParseError { .. } => dc::KEY_PARSE_ERROR,
            RefNotFound { .. } => dc::REF_NOT_FOUND,
            RefStale { .. } => dc::REF_STALE,
            FormInputUnsupported { .. } => dc::FORM_INPUT_UNSUPPORTED,
            TreeTooLarge { .. } => dc::TREE_TOO_LARGE,
            FindTooManyResults { .. } => dc::FIND_TOO_MANY_RESULTS,
            NavigateInvalid { .. } => dc::NAVIGATE_INVALID,
            ConsoleNotAvailable => dc::CONSOLE_NOT_AVAILABLE,
            QmlNotAvailable => dc::QML_NOT_AVAILABLE,
            QmlContextNotFound { .. } => dc::QML_CONTEXT_NOT_FOUND,
            NotQmlItem { .. } => dc::NOT_QML_ITEM,
            ModelNotFound { .. } => dc::MODEL_NOT_FOUND,
            ModelIndexOutOfBounds { .. } => dc::MODEL_INDEX_OUT_OF_BOUNDS,
            RoleNotFound { .. } => dc::ROLE_NOT_FOUND,
            NotAModel { .. } => dc::NOT_A_MODEL,
            InvalidParams(_) => probe_traits::jsonrpc_codes::INVALID_PARAMS,
            Internal(_) => probe_traits::jsonrpc_codes::INTERNAL_ERROR,
        }
    }

    /// Structured `data` payload: spec.md §7 "include data with helpful
    /// context (missing key, available options)".
    pub fn data(&self) -> Option<Value> {
        use ProbeError::*;
        match self {
            ObjectNotFound { id } | WidgetNotVisible { id } => {
                Some(serde_json::json!({ "id": id }))
            }
            PropertyNotFound { id, name }
            | NotReadable { id, name }
            | ReadOnly { id, name }
            | SignalNotFound { id, name } => {
                Some(serde_json::json!({ "id": id, "name": name }))
            }
            MethodNotFoundDomain { id, name, arity } => {
                Some(serde_json::json!({ "id": id, "name": name, "arity": arity }))
            }
            InvocationFailed { id, name, reason } => {
                Some(serde_json::json!({ "id": id, "name": name, "reason": reason }))
            }
            ConversionFailed { name, reason } => {
                Some(serde_json::json!({ "name": name, "reason": reason }))
            }
            SubscriptionNotFound { id } => Some(serde_json::json!({ "subscriptionId": id })),
            CoordinateOutOfBounds {
                x,
                y,
                window_width,
                window_height,
            } => Some(serde_json::json!({
                "x": x, "y": y, "windowWidth": window_width, "windowHeight": window_height,
            })),
            KeyParseError { combo } => Some(serde_json::json!({ "combo": combo })),
            RefNotFound { reference } | RefStale { reference } | NavigateInvalid { reference } => {
                Some(serde_json::json!({ "ref": reference }))
            }
            FormInputUnsupported { reference, reason } => {
                Some(serde_json::json!({ "ref": reference, "reason": reason }))
            }
            TreeTooLarge {
                total_nodes,
                max_chars,
            } => Some(serde_json::json!({ "totalNodes": total_nodes, "maxChars": max_chars })),
            FindTooManyResults { count, limit } => {
                Some(serde_json::json!({ "count": count, "limit": limit }))
            }
            QmlContextNotFound { id } | NotQmlItem { id } | ModelNotFound { id } | NotAModel { id } => {
                Some(serde_json::json!({ "id": id }))
            }
            ModelIndexOutOfBounds { row, column } => {
                Some(serde_json::json!({ "row": row, "column": column }))
            }
            RoleNotFound { role, available } => {
                Some(serde_json::json!({ "role": role, "available": available }))
            }
            _ => None,
        }
    }

    pub fn into_rpc_error(self) -> RpcErrorBody {
        let code = self.code();
        let data = self.data();
        RpcErrorBody {
            code,
            message: self.to_string(),
            data,
        }
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
