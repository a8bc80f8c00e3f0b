/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Lifecycle-tracked index of every framework object (spec.md §4.2).
//! Installs into the framework's global creation/destruction hooks,
//! daisy-chaining any previously-installed occupant, and issues/caches
//! hierarchical IDs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use rustc_hash::FxHashMap;

use crate::framework::{CreateHook, DestroyHook, Framework, FrameworkObject, ObjectAddress};
use crate::id;

/// Outcome of `track`/`untrack`, delivered on the main thread via a queued
/// dispatch (spec.md §4.2 signals).
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Added { id: String, address: ObjectAddress },
    Removed { id: String, address: ObjectAddress },
}

struct RegistryState {
    /// Canonical id -> object, the fast path for `findById`.
    by_id: FxHashMap<String, Weak<dyn FrameworkObject>>,
    /// address -> canonical id, so `untrack` can find what to remove and
    /// so the deferred "removed" notification can carry the id after the
    /// object itself is gone (spec.md §3 lifecycle).
    by_address: FxHashMap<ObjectAddress, String>,
    /// Client-registered aliases, additive, persists for registry lifetime.
    symbolic: HashMap<String, String>,
    events: Vec<RegistryEvent>,
}

impl RegistryState {
    fn new() -> Self {
        RegistryState {
            by_id: FxHashMap::default(),
            by_address: FxHashMap::default(),
            symbolic: HashMap::new(),
            events: Vec::new(),
        }
    }
}

/// Tracks every framework object via global creation/destruction
/// interception; issues and caches hierarchical IDs; offers lookup.
pub struct ObjectRegistry {
    framework: Arc<dyn Framework>,
    state: ReentrantMutex<RefCell<RegistryState>>,
    /// Guards against hook re-entrancy during the registry's own
    /// construction (spec.md §4.2 "Re-entry guard").
    installing: AtomicBool,
    prior_create: parking_lot::Mutex<Option<CreateHook>>,
    prior_destroy: parking_lot::Mutex<Option<DestroyHook>>,
}

impl ObjectRegistry {
    pub fn new(framework: Arc<dyn Framework>) -> Arc<Self> {
        Arc::new(ObjectRegistry {
            framework,
            state: ReentrantMutex::new(RefCell::new(RegistryState::new())),
            installing: AtomicBool::new(false),
            prior_create: parking_lot::Mutex::new(None),
            prior_destroy: parking_lot::Mutex::new(None),
        })
    }

    /// Install into the framework's global add/remove callback slots,
    /// chaining any previously-installed hook. Guards the install window
    /// itself against re-entrancy (spec.md §4.2).
    pub fn install_hooks(self: &Arc<Self>) {
        self.installing.store(true, Ordering::SeqCst);

        let this = self.clone();
        let prior_create = this.framework.set_create_hook(Box::new(move |obj| {
            if this.installing.load(Ordering::SeqCst) {
                if let Some(prior) = this.prior_create.lock().as_ref() {
                    prior(obj);
                }
                return;
            }
            this.track(obj.clone());
            if let Some(prior) = this.prior_create.lock().as_ref() {
                prior(obj);
            }
        }));
        *self.prior_create.lock() = prior_create;

        let this = self.clone();
        let prior_destroy = this.framework.set_destroy_hook(Box::new(move |address| {
            if this.installing.load(Ordering::SeqCst) {
                if let Some(prior) = this.prior_destroy.lock().as_ref() {
                    prior(address);
                }
                return;
            }
            this.untrack(address);
            if let Some(prior) = this.prior_destroy.lock().as_ref() {
                prior(address);
            }
        }));
        *self.prior_destroy.lock() = prior_destroy;

        self.installing.store(false, Ordering::SeqCst);
    }

    /// Restore the prior hooks before destroying any registry state, per
    /// spec.md §5 teardown ordering ("uninstall object hooks before
    /// destroying registry").
    pub fn uninstall_hooks(self: &Arc<Self>) {
        if let Some(prior) = self.prior_create.lock().take() {
            self.framework.set_create_hook(prior);
        }
        if let Some(prior) = self.prior_destroy.lock().take() {
            self.framework.set_destroy_hook(prior);
        }
    }

    /// Called only by the creation hook. Computes the object's ID at this
    /// instant — before any subclass body has run further — per spec.md
    /// §3's "early IDs reflect the minimal known state" invariant.
    pub fn track(&self, obj: Arc<dyn FrameworkObject>) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let base_id = id::compute_path(&obj);
        let mut candidate = base_id.clone();
        let mut suffix = 0u32;
        loop {
            match state.by_id.get(&candidate).and_then(Weak::upgrade) {
                Some(existing) if existing.address() != obj.address() => {
                    suffix += 1;
                    candidate = format!("{base_id}~{suffix}");
                }
                _ => break,
            }
        }
        state.by_address.insert(obj.address(), candidate.clone());
        state.by_id.insert(candidate.clone(), Arc::downgrade(&obj));
        state.events.push(RegistryEvent::Added {
            id: candidate,
            address: obj.address(),
        });
    }

    /// Called only by the destruction hook.
    pub fn untrack(&self, address: ObjectAddress) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(id) = state.by_address.remove(&address) {
            state.by_id.remove(&id);
            state.events.push(RegistryEvent::Removed { id, address });
        }
    }

    /// Drains and returns events queued since the last call (spec.md §4.2
    /// "delivered on the main thread via a queued dispatch").
    pub fn drain_events(&self) -> Vec<RegistryEvent> {
        let guard = self.state.lock();
        std::mem::take(&mut guard.borrow_mut().events)
    }

    pub fn contains_address(&self, address: ObjectAddress) -> bool {
        let guard = self.state.lock();
        guard.borrow().by_address.contains_key(&address)
    }

    pub fn count(&self) -> usize {
        let guard = self.state.lock();
        guard.borrow().by_id.len()
    }

    pub fn all_objects(&self) -> Vec<(String, Arc<dyn FrameworkObject>)> {
        let guard = self.state.lock();
        guard
            .borrow()
            .by_id
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|o| (id.clone(), o)))
            .collect()
    }

    /// The canonical id currently cached for `address`, if the object is
    /// still tracked. Used by tree serialization to label nodes without
    /// recomputing a path that may not match the collision-suffixed id the
    /// object was actually tracked under.
    pub fn id_for_address(&self, address: ObjectAddress) -> Option<String> {
        let guard = self.state.lock();
        guard.borrow().by_address.get(&address).cloned()
    }

    pub fn find_by_id(&self, id: &str) -> Option<Arc<dyn FrameworkObject>> {
        let cached = {
            let guard = self.state.lock();
            guard.borrow().by_id.get(id).and_then(Weak::upgrade)
        };
        if cached.is_some() {
            return cached;
        }
        // Fall through to a tree walk: the cached map may have been built
        // against a path that has since been superseded by a fresh object,
        // or the id was never cached (e.g. resolved purely structurally).
        let roots = self.framework.top_level_objects();
        id::walk_path(&roots, id)
    }

    pub fn find_by_name(&self, name: &str, root: Option<&str>) -> Option<Arc<dyn FrameworkObject>> {
        let start: Vec<Arc<dyn FrameworkObject>> = match root {
            Some(r) => self.find_by_id(r).into_iter().collect(),
            None => self.framework.top_level_objects(),
        };
        for r in &start {
            if let Some(found) = find_in_subtree(r, &|o| o.object_name().as_deref() == Some(name)) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_all_by_class(&self, class_name: &str, root: Option<&str>) -> Vec<Arc<dyn FrameworkObject>> {
        let start: Vec<Arc<dyn FrameworkObject>> = match root {
            Some(r) => self.find_by_id(r).into_iter().collect(),
            None => self.framework.top_level_objects(),
        };
        let mut out = Vec::new();
        for r in &start {
            collect_in_subtree(r, &|o| o.class_name() == class_name, &mut out);
        }
        out
    }

    pub fn contains(&self, obj: &Arc<dyn FrameworkObject>) -> bool {
        self.contains_address(obj.address())
    }

    pub fn register_name(&self, name: String, target_id: String) {
        let guard = self.state.lock();
        guard.borrow_mut().symbolic.insert(name, target_id);
    }

    pub fn unregister_name(&self, name: &str) -> bool {
        let guard = self.state.lock();
        guard.borrow_mut().symbolic.remove(name).is_some()
    }

    pub fn list_names(&self) -> Vec<(String, String)> {
        let guard = self.state.lock();
        guard
            .borrow()
            .symbolic
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn resolve_symbolic(&self, name: &str) -> Option<String> {
        let guard = self.state.lock();
        guard.borrow().symbolic.get(name).cloned()
    }

    pub fn framework(&self) -> &Arc<dyn Framework> {
        &self.framework
    }
}

fn find_in_subtree(
    obj: &Arc<dyn FrameworkObject>,
    pred: &dyn Fn(&Arc<dyn FrameworkObject>) -> bool,
) -> Option<Arc<dyn FrameworkObject>> {
    if pred(obj) {
        return Some(obj.clone());
    }
    for child in obj.children() {
        if let Some(found) = find_in_subtree(&child, pred) {
            return Some(found);
        }
    }
    None
}

fn collect_in_subtree(
    obj: &Arc<dyn FrameworkObject>,
    pred: &dyn Fn(&Arc<dyn FrameworkObject>) -> bool,
    out: &mut Vec<Arc<dyn FrameworkObject>>,
) {
    if pred(obj) {
        out.push(obj.clone());
    }
    for child in obj.children() {
        collect_in_subtree(&child, pred, out);
    }
}

/// Resolve a mixed identifier: numeric (`#N` or digits), symbolic alias, or
/// hierarchical path, tried in that order (spec.md §4.2 "Resolution").
pub fn resolve_mixed(
    registry: &ObjectRegistry,
    numeric_map: &crate::session::NumericIdMap,
    mixed: &str,
) -> Option<Arc<dyn FrameworkObject>> {
    let numeric_part = mixed.strip_prefix('#').unwrap_or(mixed);
    if let Ok(n) = numeric_part.parse::<u64>() {
        if let Some(obj) = numeric_map.resolve(n) {
            return Some(obj);
        }
    }
    if let Some(target) = registry.resolve_symbolic(mixed) {
        if let Some(obj) = registry.find_by_id(&target) {
            return Some(obj);
        }
    }
    registry.find_by_id(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refbackend::{ReferenceFramework, WidgetSpec};

    #[test]
    fn tracked_objects_are_contained_until_destroyed() {
        let fw = ReferenceFramework::new();
        let registry = ObjectRegistry::new(fw.clone());
        registry.install_hooks();

        let app = fw.application_object().unwrap();
        let widget = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QWidget".into(),
                object_name: Some("thing".into()),
                ..Default::default()
            },
        );
        assert!(registry.contains(&widget));
        let address = widget.address();
        fw.destroy_widget(address);
        assert!(!registry.contains_address(address));
    }

    #[test]
    fn find_by_id_matches_tracked_id() {
        let fw = ReferenceFramework::new();
        let registry = ObjectRegistry::new(fw.clone());
        registry.install_hooks();

        let app = fw.application_object().unwrap();
        let widget = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QWidget".into(),
                object_name: Some("saveButton".into()),
                ..Default::default()
            },
        );
        let found = registry.find_by_id("QApplication/saveButton").unwrap();
        assert_eq!(found.address(), widget.address());
    }

    #[test]
    fn collisions_are_suffixed() {
        let fw = ReferenceFramework::new();
        let registry = ObjectRegistry::new(fw.clone());
        registry.install_hooks();
        let app = fw.application_object().unwrap();

        // Two distinct sibling widgets sharing the same object_name collide
        // on the same base path; the second must be suffixed.
        let _w1 = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QWidget".into(),
                object_name: Some("dup".into()),
                ..Default::default()
            },
        );
        let w2 = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QLabel".into(),
                object_name: Some("dup".into()),
                ..Default::default()
            },
        );
        let all = registry.all_objects();
        assert!(all.iter().any(|(id, _)| id == "QApplication/dup"));
        assert!(all
            .iter()
            .any(|(id, o)| id == "QApplication/dup~1" && o.address() == w2.address()));
    }
}
