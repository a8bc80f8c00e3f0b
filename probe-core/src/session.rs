/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Session-scoped state: numeric ID shorthands and accessibility refs.
//! Both are cleared on client disconnect (spec.md §3, §4.10).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::accessibility::AccessibleHandle;
use crate::framework::{FrameworkObject, ObjectAddress};

/// Monotonic positive integer assigned on first reference in a session
/// (spec.md §3 NumericId).
#[derive(Default)]
pub struct NumericIdMap {
    next: AtomicU64,
    by_address: Mutex<HashMap<ObjectAddress, u64>>,
    by_numeric: Mutex<HashMap<u64, Weak<dyn FrameworkObject>>>,
}

impl NumericIdMap {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            by_address: Mutex::new(HashMap::new()),
            by_numeric: Mutex::new(HashMap::new()),
        }
    }

    pub fn id_for(&self, obj: &Arc<dyn FrameworkObject>) -> u64 {
        let mut by_address = self.by_address.lock();
        if let Some(existing) = by_address.get(&obj.address()) {
            return *existing;
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        by_address.insert(obj.address(), n);
        self.by_numeric.lock().insert(n, Arc::downgrade(obj));
        n
    }

    pub fn resolve(&self, n: u64) -> Option<Arc<dyn FrameworkObject>> {
        self.by_numeric.lock().get(&n).and_then(Weak::upgrade)
    }

    /// Cleared on client disconnect.
    pub fn clear(&self) {
        self.by_address.lock().clear();
        self.by_numeric.lock().clear();
    }
}

/// Ephemeral `ref_<N>` map for the accessibility surface (spec.md §3
/// AccessibilityRef, §4.6, §8 "After `chr.readPage`... After `chr.find`...").
#[derive(Default)]
pub struct AccessibilityRefMap {
    next: AtomicU64,
    refs: Mutex<HashMap<String, AccessibleHandle>>,
}

impl AccessibilityRefMap {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            refs: Mutex::new(HashMap::new()),
        }
    }

    /// `readPage` resets the counter and the map (fresh session of refs).
    pub fn reset(&self) {
        self.next.store(1, Ordering::SeqCst);
        self.refs.lock().clear();
    }

    /// Allocate the next `ref_<N>` for `handle`. Used by both `readPage`
    /// (after a prior `reset`) and `find` (append-only, no reset).
    pub fn allocate(&self, handle: AccessibleHandle) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let key = format!("ref_{n}");
        self.refs.lock().insert(key.clone(), handle);
        key
    }

    pub fn resolve(&self, reference: &str) -> Option<AccessibleHandle> {
        self.refs.lock().get(reference).cloned()
    }

    pub fn clear(&self) {
        self.next.store(1, Ordering::SeqCst);
        self.refs.lock().clear();
    }
}

/// Everything that resets when a client disconnects.
pub struct SessionState {
    pub numeric_ids: NumericIdMap,
    pub accessibility_refs: AccessibilityRefMap,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            numeric_ids: NumericIdMap::new(),
            accessibility_refs: AccessibilityRefMap::new(),
        }
    }

    pub fn clear(&self) {
        self.numeric_ids.clear();
        self.accessibility_refs.clear();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refbackend::{ReferenceFramework, WidgetSpec};

    #[test]
    fn numeric_ids_are_stable_and_clear_on_disconnect() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let w = fw.spawn_widget(&app, WidgetSpec::default());
        let session = SessionState::new();
        let a = session.numeric_ids.id_for(&w);
        let b = session.numeric_ids.id_for(&w);
        assert_eq!(a, b);
        assert_eq!(session.numeric_ids.resolve(a).unwrap().address(), w.address());
        session.clear();
        assert!(session.numeric_ids.resolve(a).is_none());
    }
}
