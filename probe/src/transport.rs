/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The WebSocket endpoint: one JSON-RPC 2.0 connection at a time, with
//! out-of-band notifications pushed alongside request/response traffic
//! (spec.md §4.10, §5 "Concurrency model"). Runs on its own
//! `tokio` runtime so the host application's own event loop never blocks on
//! socket I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_tungstenite::tokio::accept_async;
use async_tungstenite::tungstenite::Message;
use futures_util::{SinkExt, StreamExt};
use probe_traits::{notification_methods, RpcNotification, RpcRequest};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::rpc::Dispatcher;
use crate::state::AppState;

/// How often the connection handler checks for signal/lifecycle
/// notifications to push between client requests.
const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns the server on a dedicated background thread with its own `tokio`
/// runtime. Returns immediately; `bootstrap::on_application_ready` never
/// blocks on this call.
pub fn spawn(port: u16, state: Arc<AppState>, dispatcher: Arc<Dispatcher>) {
    std::thread::Builder::new()
        .name("probe-transport".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(err) => {
                    error!(%err, "failed to start probe transport runtime");
                    return;
                }
            };
            runtime.block_on(run(port, state, dispatcher));
        })
        .expect("failed to spawn probe-transport thread");
}

/// Only one client may be connected at a time (spec.md §4.10): a second
/// connection attempt is accepted and then immediately closed with a
/// policy-violation close frame.
async fn run(port: u16, state: Arc<AppState>, dispatcher: Arc<Dispatcher>) {
    let listener = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, port, "probe transport failed to bind");
            return;
        }
    };
    info!(port, "probe transport listening");

    let busy = Arc::new(AtomicBool::new(false));
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "probe transport accept failed");
                continue;
            }
        };

        if busy.swap(true, Ordering::SeqCst) {
            warn!(%peer, "rejecting second concurrent probe connection");
            tokio::spawn(reject(stream));
            continue;
        }

        let state = state.clone();
        let dispatcher = dispatcher.clone();
        let busy = busy.clone();
        tokio::spawn(async move {
            debug!(%peer, "probe client connected");
            handle_connection(stream, state.clone(), dispatcher).await;
            state.reset_session();
            busy.store(false, Ordering::SeqCst);
            debug!(%peer, "probe client disconnected");
        });
    }
}

async fn reject(stream: TcpStream) {
    if let Ok(mut ws) = accept_async(stream).await {
        let _ = ws
            .close(Some(async_tungstenite::tungstenite::protocol::CloseFrame {
                code: async_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Policy,
                reason: "probe already has an active connection".into(),
            }))
            .await;
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<AppState>, dispatcher: Arc<Dispatcher>) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%err, "probe websocket handshake failed");
            return;
        }
    };

    let mut ticker = tokio::time::interval(NOTIFICATION_POLL_INTERVAL);
    loop {
        tokio::select! {
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let response = dispatch_text(&state, &dispatcher, &text);
                        if ws.send(Message::Text(response)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "probe websocket read error");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                for note in pending_notifications(&state) {
                    if ws.send(Message::Text(serde_json::to_string(&note).expect("notification always serializes"))).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Parses one line of client input and runs it through the dispatcher,
/// producing the response text. A request that fails to parse as JSON-RPC
/// gets a standard parse-error response rather than dropping the
/// connection (spec.md §7).
fn dispatch_text(state: &AppState, dispatcher: &Dispatcher, text: &str) -> String {
    let request: RpcRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(err) => {
            let error = json!({
                "jsonrpc": "2.0",
                "error": { "code": probe_traits::jsonrpc_codes::PARSE_ERROR, "message": err.to_string() },
                "id": null,
            });
            return error.to_string();
        }
    };
    let response = dispatcher.handle(state, request);
    serde_json::to_string(&response).expect("response always serializes")
}

/// Collects everything queued since the last poll into wire notifications:
/// signal emissions, object lifecycle events, and (reserved for the
/// coordinate surface) captured input events.
fn pending_notifications(state: &AppState) -> Vec<RpcNotification> {
    let mut notes = Vec::new();

    for signal in state.monitor.drain_notifications() {
        notes.push(RpcNotification::new(
            notification_methods::SIGNAL_EMITTED,
            json!({ "subscriptionId": signal.subscription_id, "id": signal.object_id, "signal": signal.signal }),
        ));
    }

    if state.monitor.lifecycle_enabled() {
        for event in state.registry.drain_events() {
            match event {
                probe_core::registry::RegistryEvent::Added { id, .. } => {
                    notes.push(RpcNotification::new(notification_methods::OBJECT_CREATED, json!({ "id": id })));
                }
                probe_core::registry::RegistryEvent::Removed { id, .. } => {
                    notes.push(RpcNotification::new(notification_methods::OBJECT_DESTROYED, json!({ "id": id })));
                }
            }
        }
    } else {
        // Still drain so the queue doesn't grow unbounded while disabled.
        let _ = state.registry.drain_events();
    }

    notes
}
