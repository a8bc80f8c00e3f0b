/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Everything a surface handler needs, threaded through one connection's
//! lifetime. One `AppState` is built at bootstrap and shared across every
//! client connection; the per-connection bits live on `SessionState` and are
//! reset via [`AppState::reset_session`] on disconnect (spec.md §3, §4.10).

use std::sync::Arc;

use parking_lot::Mutex;
use probe_core::logsink::LogSink;
use probe_core::signals::SignalMonitor;
use probe_core::{Framework, ObjectRegistry, SessionState};

use crate::config::Config;

/// Tracks the coordinate surface's synthetic pointer position (spec.md §4.5
/// "Virtual cursor"), independent of whatever the real input device reports.
#[derive(Default)]
pub struct VirtualCursor {
    position: Mutex<Option<(f64, f64)>>,
}

impl VirtualCursor {
    pub fn set(&self, x: f64, y: f64) {
        *self.position.lock() = Some((x, y));
    }

    pub fn get(&self) -> Option<(f64, f64)> {
        *self.position.lock()
    }
}

pub struct AppState {
    pub framework: Arc<dyn Framework>,
    pub registry: Arc<ObjectRegistry>,
    pub monitor: Arc<SignalMonitor>,
    pub log_sink: Arc<LogSink>,
    pub session: SessionState,
    pub cursor: VirtualCursor,
    pub config: Config,
}

impl AppState {
    pub fn new(framework: Arc<dyn Framework>, config: Config) -> Arc<Self> {
        let registry = ObjectRegistry::new(framework.clone());
        registry.install_hooks();
        AppState {
            framework,
            registry,
            monitor: SignalMonitor::new(),
            log_sink: Arc::new(LogSink::new()),
            session: SessionState::new(),
            cursor: VirtualCursor::default(),
            config,
        }
        .into()
    }

    /// Clears the numeric id shorthands and accessibility refs scoped to one
    /// client connection. Signal subscriptions are *not* torn down here —
    /// spec.md §4.10 leaves that a host-level policy decision, and this
    /// workspace's default is to preserve them across a reconnect.
    pub fn reset_session(&self) {
        self.session.clear();
    }
}
