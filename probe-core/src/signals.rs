/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Dynamic subscription to framework signals with relayed notifications
//! (spec.md §4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{ProbeError, ProbeResult};
use crate::framework::{ConnectionHandle, FrameworkObject, ObjectAddress};
use crate::registry::ObjectRegistry;

#[derive(Debug, Clone)]
pub struct SignalNotification {
    pub subscription_id: u64,
    pub object_id: String,
    pub signal: String,
}

struct SubscriptionRecord {
    object_id: String,
    signal_name: String,
    #[allow(dead_code)]
    object_address: ObjectAddress,
    connection: ConnectionHandle,
    destroyed_connection: ConnectionHandle,
}

/// Per-subscription state plus the lifecycle-notification toggle. One relay
/// handler per subscription translates a zero-arity signal emission into a
/// queued [`SignalNotification`] (spec.md §4.4 "relay object").
pub struct SignalMonitor {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, SubscriptionRecord>>,
    notifications: Mutex<Vec<SignalNotification>>,
    lifecycle_enabled: AtomicBool,
}

impl SignalMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(SignalMonitor {
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            lifecycle_enabled: AtomicBool::new(false),
        })
    }

    pub fn subscribe(
        self: &Arc<Self>,
        registry: &ObjectRegistry,
        object_id: &str,
        signal_name: &str,
    ) -> ProbeResult<u64> {
        let obj = registry.find_by_id(object_id).ok_or_else(|| ProbeError::ObjectNotFound {
            id: object_id.to_string(),
        })?;

        let subscription_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let this = self.clone();
        let relay_object_id = object_id.to_string();
        let relay_signal = signal_name.to_string();
        let connection = obj
            .connect_signal(
                signal_name,
                Arc::new(move || {
                    this.notifications.lock().push(SignalNotification {
                        subscription_id,
                        object_id: relay_object_id.clone(),
                        signal: relay_signal.clone(),
                    });
                }),
            )
            .ok_or_else(|| ProbeError::SignalNotFound {
                id: object_id.to_string(),
                name: signal_name.to_string(),
            })?;

        // Auto-unsubscribe: a synchronous handler on the subject's own
        // destruction tears this subscription down immediately, so a later
        // `unsubscribe` call is a no-op and no further emissions can occur
        // (spec.md §4.4 "Auto-unsubscribe").
        let this = self.clone();
        let destroyed_connection = obj.connect_destroyed(Arc::new(move || {
            this.subscriptions.lock().remove(&subscription_id);
        }));

        self.subscriptions.lock().insert(
            subscription_id,
            SubscriptionRecord {
                object_id: object_id.to_string(),
                signal_name: signal_name.to_string(),
                object_address: obj.address(),
                connection,
                destroyed_connection,
            },
        );
        Ok(subscription_id)
    }

    /// No-op if the subscription is already gone (unsubscribed, or the
    /// subject died and auto-unsubscribe already ran).
    pub fn unsubscribe(&self, registry: &ObjectRegistry, subscription_id: u64) {
        let Some(record) = self.subscriptions.lock().remove(&subscription_id) else {
            return;
        };
        if let Some(obj) = registry.find_by_id(&record.object_id) {
            obj.disconnect(record.connection);
            obj.disconnect(record.destroyed_connection);
        }
    }

    pub fn unsubscribe_all(&self, registry: &ObjectRegistry, object_id: &str) {
        let ids: Vec<u64> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(_, r)| r.object_id == object_id)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.unsubscribe(registry, id);
        }
    }

    pub fn set_lifecycle_enabled(&self, enabled: bool) {
        self.lifecycle_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn lifecycle_enabled(&self) -> bool {
        self.lifecycle_enabled.load(Ordering::SeqCst)
    }

    /// Drains notifications queued since the last call, for the transport
    /// to push as `qtmcp.signalEmitted`.
    pub fn drain_notifications(&self) -> Vec<SignalNotification> {
        std::mem::take(&mut self.notifications.lock())
    }

    pub fn active_signal_for(&self, subscription_id: u64) -> Option<String> {
        self.subscriptions.lock().get(&subscription_id).map(|r| r.signal_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{Framework, SignalDescriptor};
    use crate::refbackend::{ReferenceFramework, WidgetSpec};

    fn button_with_click_signal() -> (Arc<ReferenceFramework>, Arc<ObjectRegistry>, Arc<dyn FrameworkObject>) {
        let fw = ReferenceFramework::new();
        let registry = ObjectRegistry::new(fw.clone());
        registry.install_hooks();
        let app = fw.application_object().unwrap();
        let button = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QPushButton".into(),
                object_name: Some("saveButton".into()),
                signals: vec![SignalDescriptor {
                    name: "clicked".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );
        (fw, registry, button)
    }

    #[test]
    fn subscribe_then_emit_produces_one_notification() {
        let (fw, registry, button) = button_with_click_signal();
        let monitor = SignalMonitor::new();

        let sub_id = monitor.subscribe(&registry, "QApplication/saveButton", "clicked").unwrap();
        fw.concrete(button.address()).unwrap().emit_signal("clicked");

        let notifications = monitor.drain_notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].subscription_id, sub_id);
        assert_eq!(notifications[0].signal, "clicked");
    }

    #[test]
    fn destroying_subject_makes_unsubscribe_a_silent_no_op() {
        let (fw, registry, button) = button_with_click_signal();
        let monitor = SignalMonitor::new();
        let sub_id = monitor.subscribe(&registry, "QApplication/saveButton", "clicked").unwrap();
        let address = button.address();
        fw.destroy_widget(address);
        // No panic, no error: already cleaned up by the destroyed hook.
        monitor.unsubscribe(&registry, sub_id);
        assert!(monitor.drain_notifications().is_empty());
    }
}
