/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The observability contract a host GUI toolkit must provide, per spec.md
//! §9 "Hooks as interface abstraction": two hook slots with
//! chain-of-responsibility semantics, and a reflective property/method/
//! signal facility. A production build implements [`Framework`] and
//! [`FrameworkObject`] against a real toolkit's meta-object system (e.g. via
//! FFI bindings); this workspace ships [`crate::refbackend`], an in-process
//! reference implementation, so the rest of the runtime can be fully built
//! and tested against the trait boundary.

use std::fmt;
use std::sync::Arc;

use crate::variant::Variant;

/// Stable identity for a [`FrameworkObject`] while it is alive: the
/// conceptual memory address (spec.md §3 "Identity is the object's memory
/// address while alive").
pub type ObjectAddress = usize;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub type_name: String,
    pub readable: bool,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodDescriptor {
    pub name: String,
    pub signature: String,
    pub return_type: String,
    pub parameter_types: Vec<String>,
    pub parameter_names: Vec<String>,
    pub access: &'static str,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalDescriptor {
    pub name: String,
    pub signature: String,
    pub parameter_types: Vec<String>,
    pub parameter_names: Vec<String>,
}

/// Opaque handle to a signal/destroyed connection, used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u64);

/// A handler invoked with no reproduced arguments (spec.md §4.4: "Arguments
/// beyond arity zero are not reproduced in MVP").
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// A single object in the framework's object graph: a widget, a QML item,
/// or a plain introspectable object.
pub trait FrameworkObject: Send + Sync {
    fn address(&self) -> ObjectAddress;
    fn class_name(&self) -> String;
    fn object_name(&self) -> Option<String>;
    fn qml_id(&self) -> Option<String>;
    fn is_qml_item(&self) -> bool {
        false
    }
    fn qml_file(&self) -> Option<String> {
        None
    }
    fn qml_type_name(&self) -> Option<String> {
        None
    }
    /// The type-specific "text" attribute used by ID-generation priority 3
    /// (spec.md §4.2) — e.g. a label's text, a button's text.
    fn text(&self) -> Option<String>;
    fn parent(&self) -> Option<Arc<dyn FrameworkObject>>;
    fn children(&self) -> Vec<Arc<dyn FrameworkObject>>;
    /// `None` for plain (non-widget) objects.
    fn geometry(&self) -> Option<Geometry> {
        None
    }
    fn visible(&self) -> Option<bool> {
        None
    }
    fn enabled(&self) -> Option<bool> {
        None
    }
    /// Secondary name-lookup source for `chr.find` (spec.md §4.6, §9 Open
    /// Questions: tooltip participates in `find` matching but not in the
    /// name-fallback chain itself).
    fn tooltip(&self) -> Option<String> {
        None
    }
    /// Most-derived-first chain of meta-object class names (spec.md §4.3
    /// `objectInfo`). The reference backend has no multi-level class
    /// hierarchy, so it reports a single-element chain.
    fn inheritance_chain(&self) -> Vec<String> {
        vec![self.class_name()]
    }

    fn list_properties(&self) -> Vec<PropertyDescriptor>;
    fn get_property(&self, name: &str) -> Option<Variant>;
    /// `Ok(())` on success. `Err` distinguishes read-only from
    /// conversion failure via the caller's own type-check before calling in.
    fn set_property(&self, name: &str, value: Variant) -> Result<(), String>;
    /// Declared property names only; used to distinguish a declared
    /// read-only write from a brand-new dynamic attribute (spec.md §4.3).
    fn is_declared_property(&self, name: &str) -> bool {
        self.list_properties().iter().any(|p| p.name == name)
    }
    fn set_dynamic_property(&self, name: &str, value: Variant);

    fn list_methods(&self) -> Vec<MethodDescriptor>;
    fn invoke_method(&self, name: &str, args: &[Variant]) -> Result<Option<Variant>, String>;

    fn list_signals(&self) -> Vec<SignalDescriptor>;
    /// Connect `handler` to `signal_name`. Returns `None` if no such signal.
    fn connect_signal(&self, signal_name: &str, handler: SignalHandler) -> Option<ConnectionHandle>;
    fn disconnect(&self, handle: ConnectionHandle);
    /// Connect `handler` to the object's destruction with synchronous
    /// (direct) delivery, per spec.md §4.4's auto-unsubscribe design.
    fn connect_destroyed(&self, handler: SignalHandler) -> ConnectionHandle;

    fn accessible(&self) -> Option<crate::accessibility::AccessibleSnapshot> {
        None
    }
    fn as_data_model(self: Arc<Self>) -> Option<Arc<dyn crate::models::DataModel>> {
        None
    }
}

impl fmt::Debug for dyn FrameworkObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameworkObject")
            .field("address", &self.address())
            .field("class_name", &self.class_name())
            .field("object_name", &self.object_name())
            .finish()
    }
}

/// What the probe wants to capture (spec.md §4.5 ScreenCapturer).
#[derive(Debug, Clone)]
pub enum CaptureTarget {
    Widget(Arc<dyn FrameworkObject>),
    Window(Arc<dyn FrameworkObject>),
    Region { x: i32, y: i32, width: i32, height: i32 },
    FullScreen,
}

#[derive(Debug, Clone)]
pub struct CaptureImage {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

/// Mouse/keyboard/wheel input as InputSynthesizer constructs it (spec.md §4.5).
#[derive(Debug, Clone)]
pub enum InputEvent {
    MouseMove { global_x: f64, global_y: f64 },
    MouseButton {
        global_x: f64,
        global_y: f64,
        button: MouseButton,
        pressed: bool,
    },
    Click {
        global_x: f64,
        global_y: f64,
        button: MouseButton,
        double: bool,
    },
    Wheel {
        global_x: f64,
        global_y: f64,
        delta_x: i32,
        delta_y: i32,
    },
    Text { text: String },
    Key { key_code: String, modifiers: Vec<String>, pressed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// The hook pair spec.md §4.2 calls the "Hook protocol": installing into the
/// global add/remove callback slots, preserving and daisy-chaining any
/// previous occupant.
pub type CreateHook = Box<dyn Fn(Arc<dyn FrameworkObject>) + Send + Sync>;
pub type DestroyHook = Box<dyn Fn(ObjectAddress) + Send + Sync>;

/// A toolkit binding. One implementor per supported host toolkit; this
/// workspace ships [`crate::refbackend::ReferenceFramework`].
pub trait Framework: Send + Sync {
    fn application_object(&self) -> Option<Arc<dyn FrameworkObject>>;
    fn top_level_objects(&self) -> Vec<Arc<dyn FrameworkObject>>;

    /// Install the registry's creation hook, returning whatever hook was
    /// previously installed (if any) so the caller can chain to it.
    fn set_create_hook(&self, hook: CreateHook) -> Option<CreateHook>;
    fn set_destroy_hook(&self, hook: DestroyHook) -> Option<DestroyHook>;

    /// Marshal `job` onto the framework's single GUI thread (spec.md §5).
    fn post_to_event_loop(&self, job: Box<dyn FnOnce() + Send>);

    fn widget_at(&self, global_x: f64, global_y: f64) -> Option<Arc<dyn FrameworkObject>>;
    fn focused_widget(&self) -> Option<Arc<dyn FrameworkObject>>;
    fn capture(&self, target: CaptureTarget, physical_pixels: bool) -> Result<CaptureImage, String>;
    fn synthesize_input(&self, event: InputEvent);

    /// Force the accessibility subsystem active (spec.md §4.6 "Activation").
    fn activate_accessibility(&self);

    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }
}
