/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `chr.*`: accessibility-tree-driven automation keyed by ephemeral
//! `ref_<N>` handles (spec.md §4.6, §4.8).

use std::sync::Arc;

use probe_core::accessibility::{map_role, resolve_name, AccessibilityWalker, AccessibleHandle, Filter, WalkOptions};
use probe_core::errors::{ProbeError, ProbeResult};
use probe_core::framework::FrameworkObject;
use probe_core::hittest::HitTester;
use probe_core::input::InputSynthesizer;
use probe_core::meta::MetaInspector;
use serde_json::{json, Value};

use crate::rpc::{framework, optional_bool, registry, required_str, Dispatcher};
use crate::state::AppState;

const FIND_RESULT_LIMIT: usize = 20;

pub fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register("chr.readPage", Box::new(read_page));
    dispatcher.register("chr.click", Box::new(click));
    dispatcher.register("chr.formInput", Box::new(form_input));
    dispatcher.register("chr.getPageText", Box::new(get_page_text));
    dispatcher.register("chr.find", Box::new(find));
    dispatcher.register("chr.navigate", Box::new(navigate));
    dispatcher.register("chr.tabsContext", Box::new(tabs_context));
    dispatcher.register("chr.readConsoleMessages", Box::new(read_console_messages));
}

fn root_object(state: &AppState) -> ProbeResult<Arc<dyn FrameworkObject>> {
    framework(state).application_object().ok_or(ProbeError::NoActiveWindow)
}

fn resolve_ref(state: &AppState, reference: &str) -> ProbeResult<Arc<dyn FrameworkObject>> {
    state
        .session
        .accessibility_refs
        .resolve(reference)
        .ok_or_else(|| ProbeError::RefNotFound { reference: reference.to_string() })?
        .upgrade()
        .ok_or_else(|| ProbeError::RefStale { reference: reference.to_string() })
}

fn parse_filter(params: &Value) -> Filter {
    match params.get("filter").and_then(Value::as_str) {
        Some("interactive") => Filter::Interactive,
        _ => Filter::All,
    }
}

fn walk_options(params: &Value) -> WalkOptions {
    let defaults = WalkOptions::default();
    WalkOptions {
        filter: parse_filter(params),
        max_depth: params.get("maxDepth").and_then(Value::as_u64).map(|v| v as usize).unwrap_or(defaults.max_depth),
        max_chars: params.get("maxChars").and_then(Value::as_u64).map(|v| v as usize).unwrap_or(defaults.max_chars),
        scope_ref: params.get("scopeRef").and_then(Value::as_str).map(str::to_string),
    }
}

/// Resolves `scopeRef` to a starting object, falling back to the
/// application root when absent (spec.md §4.6).
fn walk_root(state: &AppState, options: &WalkOptions) -> ProbeResult<Arc<dyn FrameworkObject>> {
    match &options.scope_ref {
        Some(reference) => resolve_ref(state, reference),
        None => root_object(state),
    }
}

fn read_page(state: &AppState, params: Value) -> ProbeResult<Value> {
    framework(state).activate_accessibility();
    let options = walk_options(&params);
    let root = walk_root(state, &options)?;
    let result = AccessibilityWalker::walk(&root, &options, &state.session.accessibility_refs, true);
    if result.truncated {
        let serialized_size = serde_json::to_string(&result.tree).map(|s| s.len()).unwrap_or(0);
        if serialized_size > options.max_chars {
            return Err(ProbeError::TreeTooLarge { total_nodes: result.total_nodes, max_chars: options.max_chars });
        }
    }
    Ok(json!({ "tree": result.tree, "totalNodes": result.total_nodes, "truncated": result.truncated }))
}

/// spec.md §4.8: "ref → accessible action 'press', falls back to coordinate
/// click at widget center."
fn click(state: &AppState, params: Value) -> ProbeResult<Value> {
    let reference = required_str(&params, "ref")?;
    let obj = resolve_ref(state, &reference)?;
    if invoke_action(&obj, "click").is_ok() || invoke_action(&obj, "press").is_ok() {
        return Ok(json!({ "success": true, "strategy": "action" }));
    }
    let report = HitTester::widget_geometry(framework(state).as_ref(), &obj)?;
    let cx = report.global.x + report.global.width / 2.0;
    let cy = report.global.y + report.global.height / 2.0;
    InputSynthesizer::click(
        framework(state).as_ref(),
        cx,
        cy,
        probe_core::framework::MouseButton::Left,
        false,
    );
    Ok(json!({ "success": true, "strategy": "coordinate" }))
}

fn invoke_action(obj: &Arc<dyn FrameworkObject>, name: &str) -> Result<(), ()> {
    obj.list_methods()
        .iter()
        .find(|m| m.name == name && m.parameter_types.is_empty())
        .ok_or(())?;
    obj.invoke_method(name, &[]).map(|_| ()).map_err(|_| ())
}

/// Multi-strategy value assignment (spec.md §4.8): combobox by text,
/// toggle via a boolean `checked`, numeric `value`, or plain editable text,
/// tried in that order against the object's declared properties.
fn form_input(state: &AppState, params: Value) -> ProbeResult<Value> {
    let reference = required_str(&params, "ref")?;
    let obj = resolve_ref(state, &reference)?;
    let value = params.get("value").cloned().ok_or_else(|| ProbeError::InvalidParams("missing \"value\"".to_string()))?;

    let declared: Vec<String> = obj.list_properties().into_iter().filter(|p| p.writable).map(|p| p.name).collect();
    let id = reference.clone();
    for candidate in ["currentText", "checked", "value", "text"] {
        if declared.iter().any(|p| p == candidate) {
            MetaInspector::set_property(&obj, &id, candidate, &value)?;
            return Ok(json!({ "success": true, "property": candidate }));
        }
    }
    Err(ProbeError::FormInputUnsupported {
        reference,
        reason: "no combobox/toggle/numeric/editable-text property found".to_string(),
    })
}

fn collect_text(obj: &Arc<dyn FrameworkObject>, out: &mut Vec<String>) {
    if let Some(text) = obj.text() {
        if !text.is_empty() {
            out.push(text);
        }
    }
    for child in obj.children() {
        collect_text(&child, out);
    }
}

fn get_page_text(state: &AppState, _params: Value) -> ProbeResult<Value> {
    let root = root_object(state)?;
    let mut out = Vec::new();
    collect_text(&root, &mut out);
    Ok(json!({ "text": out.join("\n") }))
}

/// Substring match over name/role/tooltip (spec.md §4.8); refs are appended
/// to the session's map, not reset, so a prior `readPage`'s refs keep
/// resolving (spec.md §8).
fn find(state: &AppState, params: Value) -> ProbeResult<Value> {
    let query = required_str(&params, "query")?.to_ascii_lowercase();
    let root = root_object(state)?;
    let mut matches = Vec::new();
    collect_find_matches(&root, &query, &state.session.accessibility_refs, &mut matches);
    if matches.len() > FIND_RESULT_LIMIT {
        return Err(ProbeError::FindTooManyResults { count: matches.len(), limit: FIND_RESULT_LIMIT });
    }
    Ok(json!({ "matches": matches }))
}

fn collect_find_matches(
    obj: &Arc<dyn FrameworkObject>,
    query: &str,
    refs: &probe_core::session::AccessibilityRefMap,
    out: &mut Vec<Value>,
) {
    if let Some(snapshot) = obj.accessible() {
        let web_role = map_role(&snapshot.role);
        let name = resolve_name(obj, &snapshot);
        let tooltip = obj.tooltip().unwrap_or_default();
        if name.to_ascii_lowercase().contains(query)
            || web_role.to_ascii_lowercase().contains(query)
            || tooltip.to_ascii_lowercase().contains(query)
        {
            let reference = refs.allocate(AccessibleHandle(Arc::downgrade(obj)));
            out.push(json!({
                "ref": reference,
                "role": web_role,
                "name": name,
                "bounds": { "x": snapshot.bounds.x, "y": snapshot.bounds.y, "w": snapshot.bounds.width, "h": snapshot.bounds.height },
            }));
        }
    }
    for child in obj.children() {
        collect_find_matches(&child, query, refs, out);
    }
}

/// spec.md §9 Open Questions: no back/forward semantics in this workspace,
/// only ref-based activation of the target tab/menu item.
fn navigate(state: &AppState, params: Value) -> ProbeResult<Value> {
    let reference = required_str(&params, "ref")?;
    let obj = resolve_ref(state, &reference)?;
    if invoke_action(&obj, "trigger").is_ok() || invoke_action(&obj, "activate").is_ok() || invoke_action(&obj, "click").is_ok() {
        return Ok(json!({ "success": true }));
    }
    Err(ProbeError::NavigateInvalid { reference })
}

fn tabs_context(state: &AppState, _params: Value) -> ProbeResult<Value> {
    let focused_ancestor = framework(state).focused_widget().map(|w| top_level_ancestor_address(&w));
    let tabs: Vec<Value> = framework(state)
        .top_level_objects()
        .into_iter()
        .map(|obj| {
            let active = focused_ancestor == Some(obj.address());
            json!({
                "id": registry(state).id_for_address(obj.address()).unwrap_or_else(|| obj.class_name()),
                "className": obj.class_name(),
                "objectName": obj.object_name(),
                "role": obj.accessible().map(|s| map_role(&s.role)),
                "active": active,
            })
        })
        .collect();
    Ok(json!(tabs))
}

fn top_level_ancestor_address(obj: &Arc<dyn FrameworkObject>) -> probe_core::framework::ObjectAddress {
    let mut current = obj.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current.address()
}

fn read_console_messages(state: &AppState, params: Value) -> ProbeResult<Value> {
    let pattern = params.get("pattern").and_then(Value::as_str);
    let errors_only = optional_bool(&params, "errorsOnly", false);
    let clear = optional_bool(&params, "clear", false);
    let mut entries = state.log_sink.query(pattern, errors_only, clear)?;
    if let Some(limit) = params.get("limit").and_then(Value::as_u64) {
        entries.truncate(limit as usize);
    }
    Ok(json!(entries
        .into_iter()
        .map(|e| json!({ "level": e.level.as_str(), "message": e.message, "timestamp": e.timestamp.to_rfc3339() }))
        .collect::<Vec<_>>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::framework::PropertyDescriptor;
    use probe_core::refbackend::{ReferenceFramework, WidgetSpec};
    use probe_core::variant::Variant;
    use probe_core::Framework as _;

    fn state_with_field_and_button() -> Arc<AppState> {
        let fw = ReferenceFramework::new();
        let state = AppState::new(fw.clone(), crate::config::Config::from_env());
        let app = fw.application_object().unwrap();
        let window = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QWidget".into(),
                accessible_role: Some("Pane".into()),
                ..Default::default()
            },
        );
        fw.spawn_widget(
            &window,
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
        state
    }

    #[test]
    fn read_page_assigns_sequential_refs() {
        let state = state_with_field_and_button();
        let page = read_page(&state, json!({})).unwrap();
        assert!(page["totalNodes"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn form_input_sets_the_editable_text_property() {
        let state = state_with_field_and_button();
        let page = read_page(&state, json!({})).unwrap();
        let field_ref = page["tree"]["children"][0]["children"][0]["ref"].as_str().unwrap().to_string();
        form_input(&state, json!({ "ref": field_ref, "value": "hello" })).unwrap();
        let field = resolve_ref(&state, &field_ref).unwrap();
        assert_eq!(field.get_property("text").unwrap().to_json(), json!("hello"));

        let page2 = read_page(&state, json!({})).unwrap();
        assert!(page2["tree"]["children"][0]["children"][0]["name"].as_str().unwrap().contains("hello"));
    }

    #[test]
    fn interactive_filter_keeps_only_the_textbox_leaf() {
        let state = state_with_field_and_button();
        let page = read_page(&state, json!({ "filter": "interactive" })).unwrap();
        assert_eq!(page["tree"]["children"][0]["children"][0]["role"], json!("textbox"));
        assert!(page["tree"]["children"][0].get("ref").is_none());
    }

    #[test]
    fn scope_ref_walks_from_the_given_node_only() {
        let state = state_with_field_and_button();
        let page = read_page(&state, json!({})).unwrap();
        let field_ref = page["tree"]["children"][0]["children"][0]["ref"].as_str().unwrap().to_string();
        let scoped = read_page(&state, json!({ "scopeRef": field_ref })).unwrap();
        assert_eq!(scoped["tree"]["role"], json!("textbox"));
        assert!(scoped["tree"].get("children").is_none());
    }

    #[test]
    fn stale_ref_after_reset_is_an_error() {
        let state = state_with_field_and_button();
        let page = read_page(&state, json!({})).unwrap();
        let field_ref = page["tree"]["children"][0]["children"][0]["ref"].as_str().unwrap().to_string();
        read_page(&state, json!({})).unwrap();
        let err = form_input(&state, json!({ "ref": field_ref, "value": "x" })).unwrap_err();
        assert!(matches!(err, ProbeError::RefNotFound { .. }));
    }
}
