/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! One-shot initialization, independent of how the library entered the host
//! process (spec.md §4.1). The entry point itself must do only constant-time
//! work — no framework call is safe from inside a dynamic-loader callback —
//! so real setup is deferred onto the framework's own event loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use probe_core::Framework;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::rpc::Dispatcher;
use crate::state::AppState;
use crate::surfaces;
use crate::transport;

/// Set once, true for the process's lifetime. Not thread-local: an injected
/// library cannot rely on TLS being safe to touch (spec.md §4.1).
static LIBRARY_PRESENT: AtomicBool = AtomicBool::new(false);
static INIT: OnceLock<()> = OnceLock::new();

/// The library-entry-point path: build-time-linked or pre-load-of-binary
/// injection. Does only constant-time work and returns immediately; a real
/// toolkit binding calls [`attach_now`] once its application singleton
/// exists, from the framework-startup callback it registers here.
#[no_mangle]
pub extern "C" fn probe_on_load() {
    LIBRARY_PRESENT.store(true, Ordering::SeqCst);
    if Config::from_env().enabled {
        info!("probe library present, awaiting framework startup");
    }
}

/// Post-creation injection path (or the framework-startup callback's own
/// continuation): called once the application singleton is known to exist,
/// with a handle to it. Marshals the real init work onto the event loop and
/// returns immediately, never touching the framework directly here.
pub fn attach_now(framework: Arc<dyn Framework>) {
    let config = Config::from_env();
    if !config.enabled {
        warn!("probe disabled via ENABLED=0, skipping attach");
        return;
    }
    framework.post_to_event_loop(Box::new(move || {
        on_application_ready(framework, config);
    }));
}

/// Runs on the event loop's first tick. Guarded so a second call (e.g. both
/// injection paths firing in the same process) is a silent no-op.
fn on_application_ready(framework: Arc<dyn Framework>, config: Config) -> Option<Arc<AppState>> {
    if INIT.get().is_some() {
        warn!("probe already initialized, ignoring duplicate startup callback");
        return None;
    }
    let _ = INIT.set(());

    let state = AppState::new(framework, config.clone());
    state.log_sink.install(None);

    let mut dispatcher = Dispatcher::new();
    register_surface("native", config.mode.wants_native(), || surfaces::native::register(&mut dispatcher));
    register_surface("coordinate", config.mode.wants_computer_use(), || {
        surfaces::coordinate::register(&mut dispatcher)
    });
    register_surface("accessibility", config.mode.wants_chrome(), || {
        surfaces::accessibility::register(&mut dispatcher)
    });

    let dispatcher = Arc::new(dispatcher);
    transport::spawn(config.port, Arc::clone(&state), Arc::clone(&dispatcher));
    info!(port = config.port, "probe attached");
    Some(state)
}

/// Registers one surface inside its own failure boundary: a panic while
/// constructing it is caught, logged to stderr (safe before framework
/// logging exists), and does not prevent the remaining surfaces from
/// registering (spec.md §4.1, §4.8 — "learned from injection-time
/// construction failures in one of the surfaces").
fn register_surface(name: &str, wanted: bool, install: impl FnOnce()) {
    if !wanted {
        return;
    }
    if let Err(payload) = catch_unwind(AssertUnwindSafe(install)) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        eprintln!("probe: surface \"{name}\" failed to register: {reason}");
        error!(surface = name, reason, "surface registration failed");
    }
}

pub fn is_library_present() -> bool {
    LIBRARY_PRESENT.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::refbackend::ReferenceFramework;

    #[test]
    fn on_application_ready_is_idempotent_within_a_process() {
        let fw: Arc<dyn Framework> = ReferenceFramework::new();
        let config = Config::from_env();
        let first = on_application_ready(fw.clone(), config.clone());
        let second = on_application_ready(fw, config);
        assert!(first.is_some());
        assert!(second.is_none());
    }
}
