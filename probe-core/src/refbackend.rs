/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! In-process implementation of [`crate::framework::Framework`] /
//! [`crate::framework::FrameworkObject`]. No production build ships this
//! module's object tree; it exists so the rest of the workspace can be
//! built, wired, and tested end-to-end without a real toolkit binding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::accessibility::{AccessibleSnapshot, AccessibleStates};
use crate::framework::{
    CaptureImage, CaptureTarget, ConnectionHandle, CreateHook, DestroyHook, Framework,
    FrameworkObject, Geometry, InputEvent, MethodDescriptor, ObjectAddress, PropertyDescriptor,
    SignalDescriptor, SignalHandler,
};
use crate::models::DataModel;
use crate::variant::Variant;

/// Everything needed to spawn a [`ReferenceObject`]. `Default` produces a
/// plain, unnamed `QWidget` with no declared properties, methods, or
/// signals.
#[derive(Clone)]
pub struct WidgetSpec {
    pub class_name: String,
    pub object_name: Option<String>,
    pub qml_id: Option<String>,
    pub is_qml_item: bool,
    pub qml_file: Option<String>,
    pub qml_type_name: Option<String>,
    pub text: Option<String>,
    pub geometry: Option<Geometry>,
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
    pub tooltip: Option<String>,
    pub properties: Vec<(String, Variant)>,
    pub declared_properties: Vec<PropertyDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub signals: Vec<SignalDescriptor>,
    pub accessible_role: Option<String>,
    pub accessible_name: Option<String>,
    pub accessible_states: AccessibleStates,
    /// Binds this object to a data model, so `as_data_model` (and therefore
    /// `qt.models.*`) resolves it the way a real `QAbstractItemView`-backed
    /// widget would resolve its model.
    pub model: Option<Arc<dyn DataModel>>,
}

impl Default for WidgetSpec {
    fn default() -> Self {
        WidgetSpec {
            class_name: "QWidget".to_string(),
            object_name: None,
            qml_id: None,
            is_qml_item: false,
            qml_file: None,
            qml_type_name: None,
            text: None,
            geometry: None,
            visible: None,
            enabled: None,
            tooltip: None,
            properties: Vec::new(),
            declared_properties: Vec::new(),
            methods: Vec::new(),
            signals: Vec::new(),
            accessible_role: None,
            accessible_name: None,
            accessible_states: AccessibleStates::default(),
            model: None,
        }
    }
}

pub struct ReferenceObject {
    framework: Weak<ReferenceFramework>,
    address: ObjectAddress,
    parent_address: Option<ObjectAddress>,
    class_name: String,
    object_name: Option<String>,
    qml_id: Option<String>,
    is_qml_item: bool,
    qml_file: Option<String>,
    qml_type_name: Option<String>,
    text: Option<String>,
    geometry: Option<Geometry>,
    visible: Option<bool>,
    enabled: Option<bool>,
    tooltip: Option<String>,
    properties: Mutex<HashMap<String, Variant>>,
    declared_properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
    signals: Vec<SignalDescriptor>,
    connections: Mutex<Vec<(ConnectionHandle, String, SignalHandler)>>,
    destroyed_handlers: Mutex<Vec<(ConnectionHandle, SignalHandler)>>,
    next_handle: AtomicU64,
    accessible_role: Option<String>,
    accessible_name: Option<String>,
    accessible_states: AccessibleStates,
    model: Option<Arc<dyn DataModel>>,
    /// Names of methods actually invoked, for tests that assert a call
    /// really happened rather than merely type-checked.
    call_log: Mutex<Vec<String>>,
}

impl ReferenceObject {
    fn root(framework: Weak<ReferenceFramework>) -> Self {
        ReferenceObject {
            framework,
            address: 0,
            parent_address: None,
            class_name: "QApplication".to_string(),
            object_name: None,
            qml_id: None,
            is_qml_item: false,
            qml_file: None,
            qml_type_name: None,
            text: None,
            geometry: None,
            visible: Some(true),
            enabled: Some(true),
            tooltip: None,
            properties: Mutex::new(HashMap::new()),
            declared_properties: Vec::new(),
            methods: Vec::new(),
            signals: Vec::new(),
            connections: Mutex::new(Vec::new()),
            destroyed_handlers: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            accessible_role: Some("Application".to_string()),
            accessible_name: None,
            accessible_states: AccessibleStates::default(),
            model: None,
            call_log: Mutex::new(Vec::new()),
        }
    }

    fn from_spec(framework: Weak<ReferenceFramework>, address: ObjectAddress, parent_address: ObjectAddress, spec: WidgetSpec) -> Self {
        let mut properties = HashMap::new();
        for (name, value) in &spec.properties {
            properties.insert(name.clone(), value.clone());
        }
        ReferenceObject {
            framework,
            address,
            parent_address: Some(parent_address),
            class_name: spec.class_name,
            object_name: spec.object_name,
            qml_id: spec.qml_id,
            is_qml_item: spec.is_qml_item,
            qml_file: spec.qml_file,
            qml_type_name: spec.qml_type_name,
            text: spec.text,
            geometry: spec.geometry,
            visible: spec.visible,
            enabled: spec.enabled,
            tooltip: spec.tooltip,
            properties: Mutex::new(properties),
            declared_properties: spec.declared_properties,
            methods: spec.methods,
            signals: spec.signals,
            connections: Mutex::new(Vec::new()),
            destroyed_handlers: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            accessible_role: spec.accessible_role,
            accessible_name: spec.accessible_name,
            accessible_states: spec.accessible_states,
            model: spec.model,
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Test/scenario support: simulate the framework emitting `signal_name`
    /// on this object, invoking every connected handler.
    pub fn emit_signal(&self, signal_name: &str) {
        let handlers: Vec<SignalHandler> = self
            .connections
            .lock()
            .iter()
            .filter(|(_, name, _)| name == signal_name)
            .map(|(_, _, h)| h.clone())
            .collect();
        for handler in handlers {
            handler();
        }
    }

    fn fire_destroyed(&self) {
        let handlers: Vec<SignalHandler> = self
            .destroyed_handlers
            .lock()
            .drain(..)
            .map(|(_, h)| h)
            .collect();
        for handler in handlers {
            handler();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().clone()
    }
}

impl FrameworkObject for ReferenceObject {
    fn address(&self) -> ObjectAddress {
        self.address
    }

    fn class_name(&self) -> String {
        self.class_name.clone()
    }

    fn object_name(&self) -> Option<String> {
        self.object_name.clone()
    }

    fn qml_id(&self) -> Option<String> {
        self.qml_id.clone()
    }

    fn is_qml_item(&self) -> bool {
        self.is_qml_item
    }

    fn qml_file(&self) -> Option<String> {
        self.qml_file.clone()
    }

    fn qml_type_name(&self) -> Option<String> {
        self.qml_type_name.clone()
    }

    fn text(&self) -> Option<String> {
        self.properties
            .lock()
            .get("text")
            .and_then(|v| if let Variant::Str(s) = v { Some(s.clone()) } else { None })
            .or_else(|| self.text.clone())
    }

    fn parent(&self) -> Option<Arc<dyn FrameworkObject>> {
        let fw = self.framework.upgrade()?;
        let addr = self.parent_address?;
        fw.objects
            .lock()
            .get(&addr)
            .cloned()
            .map(|o| o as Arc<dyn FrameworkObject>)
    }

    fn children(&self) -> Vec<Arc<dyn FrameworkObject>> {
        let Some(fw) = self.framework.upgrade() else {
            return Vec::new();
        };
        let child_ids = fw.children.lock().get(&self.address).cloned().unwrap_or_default();
        let objects = fw.objects.lock();
        child_ids
            .into_iter()
            .filter_map(|id| objects.get(&id).cloned().map(|o| o as Arc<dyn FrameworkObject>))
            .collect()
    }

    fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    fn visible(&self) -> Option<bool> {
        self.visible
    }

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn tooltip(&self) -> Option<String> {
        self.tooltip.clone()
    }

    fn list_properties(&self) -> Vec<PropertyDescriptor> {
        self.declared_properties.clone()
    }

    fn get_property(&self, name: &str) -> Option<Variant> {
        self.properties.lock().get(name).cloned()
    }

    fn set_property(&self, name: &str, value: Variant) -> Result<(), String> {
        match self.declared_properties.iter().find(|p| p.name == name) {
            Some(desc) if !desc.writable => Err(format!("property {name} is read-only")),
            Some(_) => {
                self.properties.lock().insert(name.to_string(), value);
                Ok(())
            }
            None => Err(format!("no such declared property: {name}")),
        }
    }

    fn set_dynamic_property(&self, name: &str, value: Variant) {
        self.properties.lock().insert(name.to_string(), value);
    }

    fn list_methods(&self) -> Vec<MethodDescriptor> {
        self.methods.clone()
    }

    fn invoke_method(&self, name: &str, args: &[Variant]) -> Result<Option<Variant>, String> {
        let method = self
            .methods
            .iter()
            .find(|m| m.name == name && m.parameter_types.len() == args.len())
            .ok_or_else(|| format!("no method {name}/{}", args.len()))?;
        self.call_log.lock().push(name.to_string());
        if method.return_type == "void" {
            Ok(None)
        } else {
            Ok(Some(Variant::Bool(true)))
        }
    }

    fn list_signals(&self) -> Vec<SignalDescriptor> {
        self.signals.clone()
    }

    fn connect_signal(&self, signal_name: &str, handler: SignalHandler) -> Option<ConnectionHandle> {
        if !self.signals.iter().any(|s| s.name == signal_name) {
            return None;
        }
        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.connections.lock().push((handle, signal_name.to_string(), handler));
        Some(handle)
    }

    fn disconnect(&self, handle: ConnectionHandle) {
        self.connections.lock().retain(|(h, _, _)| *h != handle);
        self.destroyed_handlers.lock().retain(|(h, _)| *h != handle);
    }

    fn connect_destroyed(&self, handler: SignalHandler) -> ConnectionHandle {
        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.destroyed_handlers.lock().push((handle, handler));
        handle
    }

    fn accessible(&self) -> Option<AccessibleSnapshot> {
        let role = self.accessible_role.clone()?;
        Some(AccessibleSnapshot {
            role,
            name: self.accessible_name.clone().or_else(|| self.text()),
            states: self.accessible_states,
            bounds: self.geometry.unwrap_or_default(),
        })
    }

    fn as_data_model(self: Arc<Self>) -> Option<Arc<dyn DataModel>> {
        self.model.clone()
    }
}

/// In-process reference implementation of [`Framework`]. One
/// `QApplication`-shaped root object is created in [`ReferenceFramework::new`];
/// everything else is spawned via [`ReferenceFramework::spawn_widget`].
pub struct ReferenceFramework {
    self_weak: Weak<ReferenceFramework>,
    app: Arc<ReferenceObject>,
    objects: Mutex<FxHashMap<ObjectAddress, Arc<ReferenceObject>>>,
    children: Mutex<FxHashMap<ObjectAddress, Vec<ObjectAddress>>>,
    next_address: AtomicUsize,
    create_hook: Mutex<Option<CreateHook>>,
    destroy_hook: Mutex<Option<DestroyHook>>,
    focused: Mutex<Option<ObjectAddress>>,
    input_log: Mutex<Vec<InputEvent>>,
    accessibility_active: AtomicBool,
    device_pixel_ratio: f64,
}

impl ReferenceFramework {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let app = Arc::new(ReferenceObject::root(weak.clone()));
            let mut objects = FxHashMap::default();
            objects.insert(0, app.clone());
            ReferenceFramework {
                self_weak: weak.clone(),
                app,
                objects: Mutex::new(objects),
                children: Mutex::new(FxHashMap::default()),
                next_address: AtomicUsize::new(1),
                create_hook: Mutex::new(None),
                destroy_hook: Mutex::new(None),
                focused: Mutex::new(None),
                input_log: Mutex::new(Vec::new()),
                accessibility_active: AtomicBool::new(false),
                device_pixel_ratio: 1.0,
            }
        })
    }

    pub fn spawn_widget(&self, parent: &Arc<dyn FrameworkObject>, spec: WidgetSpec) -> Arc<dyn FrameworkObject> {
        let address = self.next_address.fetch_add(1, Ordering::SeqCst);
        let obj = Arc::new(ReferenceObject::from_spec(
            self.self_weak.clone(),
            address,
            parent.address(),
            spec,
        ));
        self.objects.lock().insert(address, obj.clone());
        self.children.lock().entry(parent.address()).or_default().push(address);
        let as_trait: Arc<dyn FrameworkObject> = obj;
        if let Some(hook) = self.create_hook.lock().as_ref() {
            hook(as_trait.clone());
        }
        as_trait
    }

    pub fn destroy_widget(&self, address: ObjectAddress) {
        let removed = self.objects.lock().remove(&address);
        let Some(obj) = removed else { return };
        obj.fire_destroyed();
        if let Some(parent_addr) = obj.parent_address {
            if let Some(siblings) = self.children.lock().get_mut(&parent_addr) {
                siblings.retain(|a| *a != address);
            }
        }
        self.children.lock().remove(&address);
        if let Some(hook) = self.destroy_hook.lock().as_ref() {
            hook(address);
        }
    }

    pub fn set_focused(&self, address: ObjectAddress) {
        *self.focused.lock() = Some(address);
    }

    pub fn recorded_input(&self) -> Vec<InputEvent> {
        self.input_log.lock().clone()
    }

    pub fn accessibility_activated(&self) -> bool {
        self.accessibility_active.load(Ordering::SeqCst)
    }

    /// Test/scenario support: look up the concrete object backing a
    /// `dyn FrameworkObject` address, to reach reference-backend-only
    /// methods like `emit_signal`.
    pub fn concrete(&self, address: ObjectAddress) -> Option<Arc<ReferenceObject>> {
        self.objects.lock().get(&address).cloned()
    }
}

impl Framework for ReferenceFramework {
    fn application_object(&self) -> Option<Arc<dyn FrameworkObject>> {
        Some(self.app.clone() as Arc<dyn FrameworkObject>)
    }

    fn top_level_objects(&self) -> Vec<Arc<dyn FrameworkObject>> {
        vec![self.app.clone() as Arc<dyn FrameworkObject>]
    }

    fn set_create_hook(&self, hook: CreateHook) -> Option<CreateHook> {
        self.create_hook.lock().replace(hook)
    }

    fn set_destroy_hook(&self, hook: DestroyHook) -> Option<DestroyHook> {
        self.destroy_hook.lock().replace(hook)
    }

    fn post_to_event_loop(&self, job: Box<dyn FnOnce() + Send>) {
        // The reference backend has no separate GUI thread; run inline.
        job();
    }

    fn widget_at(&self, global_x: f64, global_y: f64) -> Option<Arc<dyn FrameworkObject>> {
        fn contains(g: &Geometry, x: f64, y: f64) -> bool {
            x >= g.x && x < g.x + g.width && y >= g.y && y < g.y + g.height
        }
        fn search(obj: &Arc<dyn FrameworkObject>, x: f64, y: f64) -> Option<Arc<dyn FrameworkObject>> {
            let mut best = obj.geometry().filter(|g| contains(g, x, y)).map(|_| obj.clone());
            for child in obj.children() {
                if let Some(found) = search(&child, x, y) {
                    best = Some(found);
                }
            }
            best
        }
        search(&(self.app.clone() as Arc<dyn FrameworkObject>), global_x, global_y)
    }

    fn focused_widget(&self) -> Option<Arc<dyn FrameworkObject>> {
        let address = (*self.focused.lock())?;
        self.objects.lock().get(&address).cloned().map(|o| o as Arc<dyn FrameworkObject>)
    }

    fn capture(&self, target: CaptureTarget, physical_pixels: bool) -> Result<CaptureImage, String> {
        let (width, height) = match &target {
            CaptureTarget::Widget(obj) | CaptureTarget::Window(obj) => {
                let g = obj.geometry().ok_or_else(|| "object has no geometry".to_string())?;
                (g.width.max(1.0) as u32, g.height.max(1.0) as u32)
            }
            CaptureTarget::Region { width, height, .. } => (*width as u32, *height as u32),
            CaptureTarget::FullScreen => (1920, 1080),
        };
        let dpr = if physical_pixels { self.device_pixel_ratio } else { 1.0 };
        let pw = ((width as f64 * dpr) as u32).max(1);
        let ph = ((height as f64 * dpr) as u32).max(1);

        let mut png_bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_bytes, pw, ph);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
            let data = vec![0xffu8; (pw * ph) as usize * 4];
            writer.write_image_data(&data).map_err(|e| e.to_string())?;
        }
        Ok(CaptureImage {
            png_bytes,
            width: pw,
            height: ph,
            device_pixel_ratio: dpr,
        })
    }

    fn synthesize_input(&self, event: InputEvent) {
        self.input_log.lock().push(event);
    }

    fn activate_accessibility(&self) {
        self.accessibility_active.store(true, Ordering::SeqCst);
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }
}

/// Minimal fixed-size list model used to exercise [`crate::models`] without
/// a real item-view binding.
pub struct ListModel {
    rows: i64,
}

impl ListModel {
    pub fn with_rows(rows: i64) -> Self {
        ListModel { rows }
    }
}

impl DataModel for ListModel {
    fn class_name(&self) -> String {
        "ReferenceListModel".to_string()
    }

    fn row_count(&self, _parent_row: Option<i64>, _parent_col: Option<i64>) -> i64 {
        self.rows
    }

    fn column_count(&self, _parent_row: Option<i64>, _parent_col: Option<i64>) -> i64 {
        1
    }

    fn role_names(&self) -> std::collections::BTreeMap<i64, String> {
        std::collections::BTreeMap::from([(0, "display".to_string())])
    }

    fn has_children(&self, _row: Option<i64>, _col: Option<i64>) -> bool {
        false
    }

    fn data(&self, row: i64, _col: i64, role: i64) -> Option<Variant> {
        if role == 0 {
            Some(Variant::Str(format!("row {row}")))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_widget_is_child_of_parent() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let child = fw.spawn_widget(&app, WidgetSpec::default());
        assert_eq!(child.parent().unwrap().address(), app.address());
        assert_eq!(app.children().len(), 1);
    }

    #[test]
    fn destroy_widget_removes_from_parent_and_fires_destroyed() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let child = fw.spawn_widget(&app, WidgetSpec::default());
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired2 = fired.clone();
        child.connect_destroyed(Arc::new(move || {
            fired2.store(true, Ordering::SeqCst);
        }));
        fw.destroy_widget(child.address());
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(app.children().len(), 0);
    }

    #[test]
    fn connect_signal_rejects_unknown_name() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let button = fw.spawn_widget(
            &app,
            WidgetSpec {
                signals: vec![SignalDescriptor {
                    name: "clicked".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );
        assert!(button.connect_signal("bogus", Arc::new(|| {})).is_none());
        assert!(button.connect_signal("clicked", Arc::new(|| {})).is_some());
    }

    #[test]
    fn widget_at_finds_deepest_match() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let outer = fw.spawn_widget(
            &app,
            WidgetSpec {
                geometry: Some(Geometry { x: 0.0, y: 0.0, width: 100.0, height: 100.0 }),
                ..Default::default()
            },
        );
        let inner = fw.spawn_widget(
            &outer,
            WidgetSpec {
                geometry: Some(Geometry { x: 10.0, y: 10.0, width: 20.0, height: 20.0 }),
                ..Default::default()
            },
        );
        let hit = fw.widget_at(15.0, 15.0).unwrap();
        assert_eq!(hit.address(), inner.address());
    }
}
