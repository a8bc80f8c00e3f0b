/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `qt.*`: direct object-keyed introspection and automation (spec.md §4.8).
//! Accepts `id` or the legacy `objectId` parameter name on every method.

use std::sync::Arc;

use probe_core::capture::ScreenCapturer;
use probe_core::errors::{ProbeError, ProbeResult};
use probe_core::framework::{CaptureTarget, FrameworkObject, MouseButton};
use probe_core::hittest::HitTester;
use probe_core::input::InputSynthesizer;
use probe_core::meta::MetaInspector;
use probe_core::models::{ModelNavigator, ModelQuery, RoleRef};
use serde_json::{json, Value};

use crate::rpc::{
    framework, optional_bool, registry, required_f64, required_object_id, required_str, resolve,
    resolve_required, Dispatcher,
};
use crate::state::AppState;
use crate::surfaces::geometry_json;

pub fn register(dispatcher: &mut Dispatcher) {
    let start = std::time::Instant::now();
    dispatcher.register(
        "qt.ping",
        Box::new(move |_state, _params| Ok(json!({ "pong": true, "uptimeMs": start.elapsed().as_millis() as u64 }))),
    );
    dispatcher.register(
        "qt.version",
        Box::new(|_state, _params| {
            Ok(json!({
                "protocolVersion": "1.0",
                "crate": "probe",
                "version": env!("CARGO_PKG_VERSION"),
            }))
        }),
    );
    dispatcher.register(
        "qt.modes",
        Box::new(|state, _params| {
            let mut modes = Vec::new();
            if state.config.mode.wants_native() {
                modes.push("qt");
            }
            if state.config.mode.wants_computer_use() {
                modes.push("cu");
            }
            if state.config.mode.wants_chrome() {
                modes.push("chr");
            }
            Ok(json!(modes))
        }),
    );

    dispatcher.register("qt.objects.find", Box::new(find_object));
    dispatcher.register("qt.objects.findByClass", Box::new(find_by_class));
    dispatcher.register("qt.objects.tree", Box::new(object_tree));
    dispatcher.register("qt.objects.info", Box::new(object_info));
    dispatcher.register("qt.objects.inspect", Box::new(object_inspect));
    dispatcher.register("qt.objects.query", Box::new(object_query));

    dispatcher.register("qt.properties.list", Box::new(properties_list));
    dispatcher.register("qt.properties.get", Box::new(properties_get));
    dispatcher.register("qt.properties.set", Box::new(properties_set));

    dispatcher.register("qt.methods.list", Box::new(methods_list));
    dispatcher.register("qt.methods.invoke", Box::new(methods_invoke));

    dispatcher.register("qt.signals.list", Box::new(signals_list));
    dispatcher.register("qt.signals.subscribe", Box::new(signals_subscribe));
    dispatcher.register("qt.signals.unsubscribe", Box::new(signals_unsubscribe));
    dispatcher.register("qt.signals.setLifecycle", Box::new(signals_set_lifecycle));

    dispatcher.register("qt.ui.click", Box::new(ui_click));
    dispatcher.register("qt.ui.sendKeys", Box::new(ui_send_keys));
    dispatcher.register("qt.ui.screenshot", Box::new(ui_screenshot));
    dispatcher.register("qt.ui.geometry", Box::new(ui_geometry));
    dispatcher.register("qt.ui.hitTest", Box::new(ui_hit_test));

    dispatcher.register("qt.names.register", Box::new(names_register));
    dispatcher.register("qt.names.unregister", Box::new(names_unregister));
    dispatcher.register("qt.names.list", Box::new(names_list));
    dispatcher.register("qt.names.validate", Box::new(names_validate));
    dispatcher.register("qt.names.load", Box::new(names_load));

    dispatcher.register("qt.qml.inspect", Box::new(qml_inspect));

    dispatcher.register("qt.models.list", Box::new(models_list));
    dispatcher.register("qt.models.info", Box::new(models_info));
    dispatcher.register("qt.models.data", Box::new(models_data));
}

fn object_to_json(registry: &probe_core::ObjectRegistry, obj: &Arc<dyn FrameworkObject>) -> Value {
    let id = registry.id_for_address(obj.address()).unwrap_or_else(|| obj.class_name());
    json!({ "id": id, "className": obj.class_name(), "objectName": obj.object_name() })
}

fn find_object(state: &AppState, params: Value) -> ProbeResult<Value> {
    if let Some(name) = params.get("name").and_then(Value::as_str) {
        let root = params.get("root").and_then(Value::as_str);
        let found = registry(state)
            .find_by_name(name, root)
            .ok_or_else(|| ProbeError::ObjectNotFound { id: name.to_string() })?;
        return Ok(object_to_json(registry(state), &found));
    }
    let id = required_str(&params, "id").or_else(|_| required_object_id(&params))?;
    let obj = resolve(state, &id).ok_or(ProbeError::ObjectNotFound { id })?;
    Ok(object_to_json(registry(state), &obj))
}

fn find_by_class(state: &AppState, params: Value) -> ProbeResult<Value> {
    let class_name = required_str(&params, "className")?;
    let root = params.get("root").and_then(Value::as_str);
    let matches = registry(state).find_all_by_class(&class_name, root);
    Ok(Value::Array(matches.iter().map(|o| object_to_json(registry(state), o)).collect()))
}

/// spec.md §4.2 `serializeObjectTree`: nested node with depth -1 meaning
/// unlimited.
fn serialize_tree(registry: &probe_core::ObjectRegistry, obj: &Arc<dyn FrameworkObject>, max_depth: i64, depth: i64) -> Value {
    let mut node = serde_json::Map::new();
    node.insert("id".into(), json!(registry.id_for_address(obj.address()).unwrap_or_else(|| obj.class_name())));
    node.insert("className".into(), json!(obj.class_name()));
    if let Some(name) = obj.object_name() {
        node.insert("objectName".into(), json!(name));
    }
    if let Some(visible) = obj.visible() {
        node.insert("visible".into(), json!(visible));
    }
    if let Some(g) = obj.geometry() {
        node.insert("geometry".into(), geometry_json(g));
    }
    if let Some(text) = obj.text() {
        node.insert("text".into(), json!(text));
    }
    if obj.is_qml_item() {
        node.insert("isQmlItem".into(), json!(true));
        if let Some(qml_id) = obj.qml_id() {
            node.insert("qmlId".into(), json!(qml_id));
        }
        if let Some(qml_file) = obj.qml_file() {
            node.insert("qmlFile".into(), json!(qml_file));
        }
        if let Some(qml_type_name) = obj.qml_type_name() {
            node.insert("qmlTypeName".into(), json!(qml_type_name));
        }
    }
    if max_depth < 0 || depth < max_depth {
        let children = obj.children();
        if !children.is_empty() {
            node.insert(
                "children".into(),
                Value::Array(children.iter().map(|c| serialize_tree(registry, c, max_depth, depth + 1)).collect()),
            );
        }
    }
    Value::Object(node)
}

fn object_tree(state: &AppState, params: Value) -> ProbeResult<Value> {
    let max_depth = params.get("maxDepth").and_then(Value::as_i64).unwrap_or(-1);
    let root = match params.get("id").or_else(|| params.get("objectId")).and_then(Value::as_str) {
        Some(id) => resolve(state, id).ok_or_else(|| ProbeError::ObjectNotFound { id: id.to_string() })?,
        None => framework(state)
            .application_object()
            .ok_or_else(|| ProbeError::ObjectNotFound { id: "QApplication".to_string() })?,
    };
    Ok(serialize_tree(registry(state), &root, max_depth, 0))
}

fn object_info(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    Ok(MetaInspector::object_info(&obj).to_json())
}

fn object_inspect(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    Ok(json!({
        "info": MetaInspector::object_info(&obj).to_json(),
        "properties": MetaInspector::list_properties(&obj).into_iter().map(|p| json!({
            "name": p.name, "typeName": p.type_name, "readable": p.readable, "writable": p.writable, "value": p.value,
        })).collect::<Vec<_>>(),
        "methods": MetaInspector::list_methods(&obj).into_iter().map(|m| json!({
            "name": m.name, "signature": m.signature, "returnType": m.return_type,
            "parameterTypes": m.parameter_types, "parameterNames": m.parameter_names, "access": m.access,
        })).collect::<Vec<_>>(),
        "signals": MetaInspector::list_signals(&obj).into_iter().map(|s| json!({
            "name": s.name, "signature": s.signature,
            "parameterTypes": s.parameter_types, "parameterNames": s.parameter_names,
        })).collect::<Vec<_>>(),
    }))
}

/// Simple property-predicate query: `{className?, objectName?, root?}`.
fn object_query(state: &AppState, params: Value) -> ProbeResult<Value> {
    let class_name = params.get("className").and_then(Value::as_str);
    let object_name = params.get("objectName").and_then(Value::as_str);
    let root = params.get("root").and_then(Value::as_str);

    let candidates = match class_name {
        Some(c) => registry(state).find_all_by_class(c, root),
        None => registry(state).all_objects().into_iter().map(|(_, o)| o).collect(),
    };
    let matches: Vec<_> = candidates
        .into_iter()
        .filter(|o| object_name.map(|n| o.object_name().as_deref() == Some(n)).unwrap_or(true))
        .collect();
    Ok(Value::Array(matches.iter().map(|o| object_to_json(registry(state), o)).collect()))
}

fn properties_list(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    Ok(Value::Array(
        MetaInspector::list_properties(&obj)
            .into_iter()
            .map(|p| json!({ "name": p.name, "typeName": p.type_name, "readable": p.readable, "writable": p.writable, "value": p.value }))
            .collect(),
    ))
}

fn properties_get(state: &AppState, params: Value) -> ProbeResult<Value> {
    let id = required_object_id(&params)?;
    let obj = resolve(state, &id).ok_or_else(|| ProbeError::ObjectNotFound { id: id.clone() })?;
    let name = required_str(&params, "name")?;
    MetaInspector::get_property(&obj, &id, &name)
}

fn properties_set(state: &AppState, params: Value) -> ProbeResult<Value> {
    let id = required_object_id(&params)?;
    let obj = resolve(state, &id).ok_or_else(|| ProbeError::ObjectNotFound { id: id.clone() })?;
    let name = required_str(&params, "name")?;
    let value = params.get("value").cloned().unwrap_or(Value::Null);
    MetaInspector::set_property(&obj, &id, &name, &value)?;
    Ok(json!({ "success": true }))
}

fn methods_list(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    Ok(Value::Array(
        MetaInspector::list_methods(&obj)
            .into_iter()
            .map(|m| {
                json!({
                    "name": m.name, "signature": m.signature, "returnType": m.return_type,
                    "parameterTypes": m.parameter_types, "parameterNames": m.parameter_names, "access": m.access,
                })
            })
            .collect(),
    ))
}

fn methods_invoke(state: &AppState, params: Value) -> ProbeResult<Value> {
    let id = required_object_id(&params)?;
    let obj = resolve(state, &id).ok_or_else(|| ProbeError::ObjectNotFound { id: id.clone() })?;
    let name = required_str(&params, "name")?;
    let args: Vec<Value> = params
        .get("args")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    MetaInspector::invoke_method(&obj, &id, &name, &args)
}

fn signals_list(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    Ok(Value::Array(
        MetaInspector::list_signals(&obj)
            .into_iter()
            .map(|s| json!({ "name": s.name, "signature": s.signature, "parameterTypes": s.parameter_types, "parameterNames": s.parameter_names }))
            .collect(),
    ))
}

fn signals_subscribe(state: &AppState, params: Value) -> ProbeResult<Value> {
    let id = required_object_id(&params)?;
    let signal = required_str(&params, "signal").or_else(|_| required_str(&params, "name"))?;
    let subscription_id = state.monitor.subscribe(registry(state), &id, &signal)?;
    Ok(json!({ "subscriptionId": subscription_id }))
}

fn signals_unsubscribe(state: &AppState, params: Value) -> ProbeResult<Value> {
    let subscription_id = params
        .get("subscriptionId")
        .and_then(Value::as_u64)
        .ok_or_else(|| ProbeError::InvalidParams("missing \"subscriptionId\"".to_string()))?;
    state.monitor.unsubscribe(registry(state), subscription_id);
    Ok(json!({ "success": true }))
}

fn signals_set_lifecycle(state: &AppState, params: Value) -> ProbeResult<Value> {
    let enabled = optional_bool(&params, "enabled", true);
    state.monitor.set_lifecycle_enabled(enabled);
    Ok(json!({ "success": true }))
}

fn ui_click(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    let report = HitTester::widget_geometry(framework(state).as_ref(), &obj)?;
    let cx = report.global.x + report.global.width / 2.0;
    let cy = report.global.y + report.global.height / 2.0;
    InputSynthesizer::click(framework(state).as_ref(), cx, cy, MouseButton::Left, false);
    Ok(json!({ "success": true }))
}

fn ui_send_keys(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    let text = required_str(&params, "text")?;
    InputSynthesizer::send_keys(framework(state).as_ref(), &obj, &text)?;
    Ok(json!({ "success": true }))
}

fn ui_screenshot(state: &AppState, params: Value) -> ProbeResult<Value> {
    let physical = optional_bool(&params, "physicalPixels", false);
    let obj = resolve_required(state, &params)?;
    let target = if optional_bool(&params, "window", false) {
        CaptureTarget::Window(obj)
    } else {
        CaptureTarget::Widget(obj)
    };
    let result = ScreenCapturer::capture(framework(state).as_ref(), target, physical)?;
    Ok(json!({
        "png": result.png_base64,
        "width": result.width,
        "height": result.height,
        "devicePixelRatio": result.device_pixel_ratio,
    }))
}

fn ui_geometry(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    let report = HitTester::widget_geometry(framework(state).as_ref(), &obj)?;
    Ok(json!({
        "local": geometry_json(report.local),
        "global": geometry_json(report.global),
        "devicePixelRatio": report.device_pixel_ratio,
    }))
}

fn ui_hit_test(state: &AppState, params: Value) -> ProbeResult<Value> {
    let x = required_f64(&params, "x")?;
    let y = required_f64(&params, "y")?;
    let found = HitTester::widget_at(framework(state).as_ref(), x, y)?;
    Ok(object_to_json(registry(state), &found))
}

fn names_register(state: &AppState, params: Value) -> ProbeResult<Value> {
    let name = required_str(&params, "name")?;
    let target_id = required_str(&params, "targetId").or_else(|_| required_object_id(&params))?;
    registry(state).register_name(name, target_id);
    Ok(json!({ "success": true }))
}

fn names_unregister(state: &AppState, params: Value) -> ProbeResult<Value> {
    let name = required_str(&params, "name")?;
    let removed = registry(state).unregister_name(&name);
    Ok(json!({ "success": removed }))
}

fn names_list(state: &AppState, _params: Value) -> ProbeResult<Value> {
    let names = registry(state).list_names();
    Ok(Value::Array(names.into_iter().map(|(name, target)| json!({ "name": name, "targetId": target })).collect()))
}

fn names_validate(state: &AppState, params: Value) -> ProbeResult<Value> {
    let name = required_str(&params, "name")?;
    let target = registry(state).resolve_symbolic(&name);
    let valid = target.as_deref().map(|t| registry(state).find_by_id(t).is_some()).unwrap_or(false);
    Ok(json!({ "valid": valid, "targetId": target }))
}

/// Merges `{name: hierarchicalId}` pairs, later entries overriding earlier
/// ones; reports how many were accepted vs. rejected for pointing at an id
/// that does not currently resolve.
fn names_load(state: &AppState, params: Value) -> ProbeResult<Value> {
    let entries = params
        .get("entries")
        .and_then(Value::as_object)
        .ok_or_else(|| ProbeError::InvalidParams("missing \"entries\" object".to_string()))?;
    let mut accepted = 0u64;
    let mut rejected = 0u64;
    for (name, target) in entries {
        let Some(target_id) = target.as_str() else {
            rejected += 1;
            continue;
        };
        if registry(state).find_by_id(target_id).is_none() {
            rejected += 1;
            continue;
        }
        registry(state).register_name(name.clone(), target_id.to_string());
        accepted += 1;
    }
    Ok(json!({ "accepted": accepted, "rejected": rejected }))
}

fn qml_inspect(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    if !obj.is_qml_item() {
        return Err(ProbeError::NotQmlItem { id: required_object_id(&params)? });
    }
    Ok(json!({
        "qmlId": obj.qml_id(),
        "qmlFile": obj.qml_file(),
        "qmlTypeName": obj.qml_type_name(),
    }))
}

fn models_list(state: &AppState, _params: Value) -> ProbeResult<Value> {
    let models = ModelNavigator::list_models(registry(state));
    Ok(Value::Array(
        models
            .into_iter()
            .map(|m| {
                json!({
                    "objectId": m.object_id, "className": m.class_name,
                    "rowCount": m.row_count, "columnCount": m.column_count,
                    "roleNames": m.role_names,
                })
            })
            .collect(),
    ))
}

fn models_info(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    let id = required_object_id(&params)?;
    let model = ModelNavigator::resolve_model(&obj).ok_or(ProbeError::NotAModel { id })?;
    let info = ModelNavigator::get_model_info(&model);
    Ok(json!({
        "rowCount": info.row_count, "columnCount": info.column_count,
        "roleNames": info.role_names, "hasChildren": info.has_children, "className": info.class_name,
    }))
}

fn models_data(state: &AppState, params: Value) -> ProbeResult<Value> {
    let obj = resolve_required(state, &params)?;
    let id = required_object_id(&params)?;
    let model = ModelNavigator::resolve_model(&obj).ok_or(ProbeError::NotAModel { id })?;

    let roles = params.get("roles").and_then(Value::as_array).map(|list| {
        list.iter()
            .map(|v| match v {
                Value::Number(n) => RoleRef::Id(n.as_i64().unwrap_or_default()),
                _ => RoleRef::Name(v.as_str().unwrap_or_default().to_string()),
            })
            .collect()
    });
    let page = ModelNavigator::get_model_data(
        &model,
        ModelQuery {
            offset: params.get("offset").and_then(Value::as_u64).map(|v| v as usize),
            limit: params.get("limit").and_then(Value::as_u64).map(|v| v as usize),
            roles,
            parent_row: params.get("parentRow").and_then(Value::as_i64),
            parent_col: params.get("parentCol").and_then(Value::as_i64),
        },
    )?;

    Ok(json!({
        "rows": page.rows.iter().map(|row| {
            let columns = row.iter().map(|(col, roles)| {
                let role_values = roles.iter().map(|(name, v)| (name.clone(), v.to_json())).collect::<serde_json::Map<_, _>>();
                (col.to_string(), Value::Object(role_values))
            }).collect::<serde_json::Map<_, _>>();
            Value::Object(columns)
        }).collect::<Vec<_>>(),
        "totalRows": page.total_rows,
        "totalColumns": page.total_columns,
        "offset": page.offset,
        "limit": page.limit,
        "hasMore": page.has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::refbackend::{ReferenceFramework, WidgetSpec};
    use probe_core::Framework as _;

    fn state_with_button() -> (Arc<AppState>, Arc<dyn FrameworkObject>) {
        let fw = ReferenceFramework::new();
        // AppState::new installs the registry's creation hook; widgets must
        // be spawned after that so the registry actually learns their id.
        let state = AppState::new(fw.clone(), crate::config::Config::from_env());
        let app = fw.application_object().unwrap();
        let button = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QPushButton".into(),
                object_name: Some("saveButton".into()),
                text: Some("Save".into()),
                ..Default::default()
            },
        );
        (state, button)
    }

    #[test]
    fn find_by_name_then_get_text_round_trips() {
        let (state, _button) = state_with_button();
        let found = find_object(&state, json!({ "name": "saveButton" })).unwrap();
        let id = found["id"].as_str().unwrap().to_string();
        let text = properties_get(&state, json!({ "objectId": id, "name": "text" })).unwrap();
        assert_eq!(text, json!("Save"));
    }

    #[test]
    fn object_id_param_is_accepted_as_well_as_id() {
        let (state, _button) = state_with_button();
        let found = find_object(&state, json!({ "name": "saveButton" })).unwrap();
        let id = found["id"].as_str().unwrap().to_string();
        let v1 = properties_get(&state, json!({ "id": id.clone(), "name": "text" })).unwrap();
        let v2 = properties_get(&state, json!({ "objectId": id, "name": "text" })).unwrap();
        assert_eq!(v1, v2);
    }
}
