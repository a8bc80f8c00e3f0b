/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Method-name-indexed JSON-RPC dispatch, generalizing the teacher's
//! name-indexed actor registry to a flat `HashMap<&'static str, Handler>`
//! built once at surface-registration time (spec.md §4.10).

use std::collections::HashMap;
use std::sync::Arc;

use probe_core::errors::{ProbeError, ProbeResult};
use probe_core::{Framework, ObjectRegistry, SessionState};
use probe_traits::{jsonrpc_codes, ResultEnvelope, RpcRequest, RpcResponse};
use serde_json::Value;

use crate::config::Config;
use crate::state::AppState;

pub type Handler = Box<dyn Fn(&AppState, Value) -> ProbeResult<Value> + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher { handlers: HashMap::new() }
    }

    pub fn register(&mut self, method: &'static str, handler: Handler) {
        self.handlers.insert(method, handler);
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn handle(&self, state: &AppState, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        let Some(handler) = self.handlers.get(request.method.as_str()) else {
            return RpcResponse::error(
                id,
                probe_traits::RpcErrorBody {
                    code: jsonrpc_codes::METHOD_NOT_FOUND,
                    message: format!("method not found: {}", request.method),
                    data: None,
                },
            );
        };
        match handler(state, request.params) {
            Ok(result) => {
                let envelope = ResultEnvelope::new(result, chrono::Utc::now().timestamp_millis());
                RpcResponse::success(id, serde_json::to_value(envelope).expect("envelope always serializes"))
            }
            Err(err) => RpcResponse::error(id, err.into_rpc_error()),
        }
    }
}

/// Reads `id` or, failing that, the legacy `objectId` parameter name (spec.md
/// §4.8 "dual-name tolerance"), then resolves it through the registry.
pub fn required_object_id(params: &Value) -> ProbeResult<String> {
    params
        .get("id")
        .or_else(|| params.get("objectId"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProbeError::InvalidParams("missing \"id\"/\"objectId\" parameter".to_string()))
}

pub fn required_str(params: &Value, key: &str) -> ProbeResult<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProbeError::InvalidParams(format!("missing \"{key}\" parameter")))
}

pub fn required_f64(params: &Value, key: &str) -> ProbeResult<f64> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ProbeError::InvalidParams(format!("missing \"{key}\" parameter")))
}

pub fn optional_bool(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub fn resolve_required(state: &AppState, params: &Value) -> ProbeResult<Arc<dyn probe_core::FrameworkObject>> {
    let id = required_object_id(params)?;
    resolve(state, &id).ok_or(ProbeError::ObjectNotFound { id })
}

pub fn resolve(state: &AppState, mixed: &str) -> Option<Arc<dyn probe_core::FrameworkObject>> {
    probe_core::registry::resolve_mixed(&state.registry, &state.session.numeric_ids, mixed)
}

pub fn registry(state: &AppState) -> &Arc<ObjectRegistry> {
    &state.registry
}

pub fn framework(state: &AppState) -> &Arc<dyn Framework> {
    &state.framework
}

pub fn config(state: &AppState) -> &Config {
    &state.config
}

pub fn session(state: &AppState) -> &SessionState {
    &state.session
}
