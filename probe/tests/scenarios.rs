/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end walkthroughs driven straight through [`probe::rpc::Dispatcher`]
//! against the in-process reference backend, one per workflow in spec.md §8.

use std::sync::Arc;

use probe::config::Config;
use probe::rpc::Dispatcher;
use probe::state::AppState;
use probe::surfaces::{accessibility, coordinate, native};
use probe_core::framework::{PropertyDescriptor, SignalDescriptor};
use probe_core::refbackend::{ListModel, ReferenceFramework, WidgetSpec};
use probe_core::variant::Variant;
use probe_core::Framework as _;
use probe_traits::{RpcRequest, RpcResponse};
use serde_json::{json, Value};

fn dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    native::register(&mut dispatcher);
    coordinate::register(&mut dispatcher);
    accessibility::register(&mut dispatcher);
    dispatcher
}

/// Unwraps the envelope's `result` field so call sites see the handler's
/// own return value directly, the way a client reading over the wire would
/// after stripping spec.md §6's envelope.
fn call(dispatcher: &Dispatcher, state: &AppState, method: &'static str, params: Value) -> Value {
    let request = RpcRequest { jsonrpc: "2.0".to_string(), method: method.to_string(), params, id: Some(json!(1)) };
    match dispatcher.handle(state, request) {
        RpcResponse::Success { result, .. } => result["result"].clone(),
        RpcResponse::Error { error, .. } => panic!("{method} failed: {error:?}"),
    }
}

fn call_err(dispatcher: &Dispatcher, state: &AppState, method: &'static str, params: Value) -> probe_traits::RpcErrorBody {
    let request = RpcRequest { jsonrpc: "2.0".to_string(), method: method.to_string(), params, id: Some(json!(1)) };
    match dispatcher.handle(state, request) {
        RpcResponse::Success { result, .. } => panic!("{method} unexpectedly succeeded: {result:?}"),
        RpcResponse::Error { error, .. } => error,
    }
}

/// spec.md §8 scenario 1: find a button by name, then read its `text`
/// property back through the id the find returned.
#[test]
fn find_by_name_then_read_property() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw.clone(), Config::from_env());
    let app = fw.application_object().unwrap();
    fw.spawn_widget(
        &app,
        WidgetSpec {
            class_name: "QPushButton".into(),
            object_name: Some("saveButton".into()),
            text: Some("Save".into()),
            ..Default::default()
        },
    );

    let dispatcher = dispatcher();
    let found = call(&dispatcher, &state, "qt.objects.find", json!({ "name": "saveButton" }));
    let id = found["id"].as_str().unwrap().to_string();

    let result = call(&dispatcher, &state, "qt.properties.get", json!({ "objectId": id, "name": "text" }));
    assert_eq!(result, json!("Save"));
}

/// spec.md §8 scenario 2: set a property, then read it back and see the new
/// value, not the spawn-time one.
#[test]
fn set_property_then_get_round_trips() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw.clone(), Config::from_env());
    let app = fw.application_object().unwrap();
    let field = fw.spawn_widget(
        &app,
        WidgetSpec {
            class_name: "QLineEdit".into(),
            object_name: Some("nameField".into()),
            properties: vec![("text".into(), Variant::Str(String::new()))],
            declared_properties: vec![PropertyDescriptor {
                name: "text".into(),
                type_name: "QString".into(),
                readable: true,
                writable: true,
            }],
            ..Default::default()
        },
    );
    let dispatcher = dispatcher();
    let id = state.registry.id_for_address(field.address()).unwrap();

    call(&dispatcher, &state, "qt.properties.set", json!({ "id": id, "name": "text", "value": "hello" }));
    let result = call(&dispatcher, &state, "qt.properties.get", json!({ "id": id, "name": "text" }));
    assert_eq!(result, json!("hello"));
}

/// spec.md §8 scenario 3: subscribe to a signal, then see a single
/// notification once that signal fires. The reference backend's input
/// synthesizer only logs events — it has no wiring from a synthesized click
/// to a widget's `clicked` signal — so the emission itself is simulated
/// directly on the concrete object, the same way `signals.rs`'s own unit
/// tests do it; `qt.ui.click` is still exercised here to prove the call
/// itself succeeds against the same object.
#[test]
fn subscribe_then_emit_produces_one_notification() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw.clone(), Config::from_env());
    let app = fw.application_object().unwrap();
    let button = fw.spawn_widget(
        &app,
        WidgetSpec {
            class_name: "QPushButton".into(),
            object_name: Some("saveButton".into()),
            geometry: Some(probe_core::framework::Geometry { x: 0.0, y: 0.0, width: 80.0, height: 20.0 }),
            visible: Some(true),
            signals: vec![SignalDescriptor { name: "clicked".into(), ..Default::default() }],
            ..Default::default()
        },
    );
    let dispatcher = dispatcher();
    let id = state.registry.id_for_address(button.address()).unwrap();

    let subscribed = call(&dispatcher, &state, "qt.signals.subscribe", json!({ "id": id, "signal": "clicked" }));
    let subscription_id = subscribed["subscriptionId"].as_u64().unwrap();

    call(&dispatcher, &state, "qt.ui.click", json!({ "id": id }));
    fw.concrete(button.address()).unwrap().emit_signal("clicked");

    let notifications = state.monitor.drain_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].subscription_id, subscription_id);
    assert_eq!(notifications[0].object_id, id);
    assert_eq!(notifications[0].signal, "clicked");
}

/// spec.md §8 scenario 4: a two-node accessibility tree yields two refs;
/// filling the text field and clicking the button both succeed through
/// those refs, and a subsequent `chr.readPage` shows the filled-in text in
/// the field's resolved name.
#[test]
fn accessibility_round_trip() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw.clone(), Config::from_env());
    let app = fw.application_object().unwrap();
    let form = fw.spawn_widget(
        &app,
        WidgetSpec { class_name: "QWidget".into(), accessible_role: Some("Pane".into()), ..Default::default() },
    );
    fw.spawn_widget(
        &form,
        WidgetSpec {
            class_name: "QLineEdit".into(),
            object_name: Some("nameField".into()),
            properties: vec![("text".into(), Variant::Str(String::new()))],
            declared_properties: vec![PropertyDescriptor {
                name: "text".into(),
                type_name: "QString".into(),
                readable: true,
                writable: true,
            }],
            accessible_role: Some("EditableText".into()),
            ..Default::default()
        },
    );
    fw.spawn_widget(
        &form,
        WidgetSpec {
            class_name: "QPushButton".into(),
            object_name: Some("submitButton".into()),
            geometry: Some(probe_core::framework::Geometry { x: 0.0, y: 30.0, width: 80.0, height: 20.0 }),
            visible: Some(true),
            methods: vec![probe_core::framework::MethodDescriptor {
                name: "click".into(),
                signature: "click()".into(),
                return_type: "void".into(),
                parameter_types: vec![],
                parameter_names: vec![],
                access: "public",
            }],
            accessible_role: Some("Button".into()),
            accessible_name: Some("Submit".into()),
            ..Default::default()
        },
    );

    let dispatcher = dispatcher();
    let page = call(&dispatcher, &state, "chr.readPage", json!({}));
    let field_ref = page["tree"]["children"][0]["children"][0]["ref"].as_str().unwrap().to_string();
    let button_ref = page["tree"]["children"][0]["children"][1]["ref"].as_str().unwrap().to_string();

    call(&dispatcher, &state, "chr.formInput", json!({ "ref": field_ref, "value": "x" }));
    call(&dispatcher, &state, "chr.click", json!({ "ref": button_ref }));

    let page2 = call(&dispatcher, &state, "chr.readPage", json!({}));
    let field_name = page2["tree"]["children"][0]["children"][0]["name"].as_str().unwrap();
    assert!(field_name.contains('x'));
}

/// spec.md §8 scenario 5: a screen-coordinate click through `cu.click`
/// succeeds, and the widget under that point still fires its `clicked`
/// signal when simulated (same caveat as scenario 3: the reference
/// backend's input synthesizer does not itself wire a click to a signal).
#[test]
fn coordinate_click_reaches_the_widget_and_signal_fires() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw.clone(), Config::from_env());
    let app = fw.application_object().unwrap();
    let button = fw.spawn_widget(
        &app,
        WidgetSpec {
            class_name: "QPushButton".into(),
            object_name: Some("okButton".into()),
            geometry: Some(probe_core::framework::Geometry { x: 10.0, y: 10.0, width: 40.0, height: 20.0 }),
            visible: Some(true),
            signals: vec![SignalDescriptor { name: "clicked".into(), ..Default::default() }],
            ..Default::default()
        },
    );
    let dispatcher = dispatcher();
    let id = state.registry.id_for_address(button.address()).unwrap();
    let subscribed = call(&dispatcher, &state, "qt.signals.subscribe", json!({ "id": id, "signal": "clicked" }));
    let subscription_id = subscribed["subscriptionId"].as_u64().unwrap();

    let clicked = call(&dispatcher, &state, "cu.click", json!({ "x": 30.0, "y": 20.0 }));
    assert_eq!(clicked["success"], json!(true));
    assert_eq!(state.cursor.get(), Some((30.0, 20.0)));

    fw.concrete(button.address()).unwrap().emit_signal("clicked");
    let notifications = state.monitor.drain_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].subscription_id, subscription_id);
}

/// spec.md §8 scenario 6: a 150-row model pages at the default 100-row
/// limit, then returns the remaining 50 rows on the second page.
#[test]
fn model_pagination_across_two_pages() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw.clone(), Config::from_env());
    let app = fw.application_object().unwrap();
    let view = fw.spawn_widget(
        &app,
        WidgetSpec {
            class_name: "QListView".into(),
            object_name: Some("resultsView".into()),
            model: Some(Arc::new(ListModel::with_rows(150))),
            ..Default::default()
        },
    );
    let dispatcher = dispatcher();
    let id = state.registry.id_for_address(view.address()).unwrap();

    let first = call(&dispatcher, &state, "qt.models.data", json!({ "id": id }));
    assert_eq!(first["rows"].as_array().unwrap().len(), 100);
    assert_eq!(first["totalRows"], json!(150));
    assert_eq!(first["hasMore"], json!(true));

    let second = call(&dispatcher, &state, "qt.models.data", json!({ "id": id, "offset": 100, "limit": 100 }));
    assert_eq!(second["rows"].as_array().unwrap().len(), 50);
    assert_eq!(second["hasMore"], json!(false));
}

#[test]
fn unknown_method_is_reported_as_method_not_found() {
    let fw = ReferenceFramework::new();
    let state = AppState::new(fw, Config::from_env());
    let dispatcher = dispatcher();
    let error = call_err(&dispatcher, &state, "qt.doesNotExist", json!({}));
    assert_eq!(error.code, probe_traits::jsonrpc_codes::METHOD_NOT_FOUND);
}
