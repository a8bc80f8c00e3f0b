/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `cu.*`: screen-relative computer-use automation (spec.md §4.8). Every
//! coordinate is window-relative by default; `screenAbsolute: true` opts
//! into raw screen coordinates.

use probe_core::capture::ScreenCapturer;
use probe_core::errors::{ProbeError, ProbeResult};
use probe_core::framework::{CaptureTarget, MouseButton};
use probe_core::input::InputSynthesizer;
use serde_json::{json, Value};

use crate::rpc::{framework, optional_bool, required_f64, required_str, Dispatcher};
use crate::state::AppState;

pub fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register("cu.screenshot", Box::new(screenshot));
    dispatcher.register("cu.click", Box::new(|s, p| click(s, p, MouseButton::Left, false)));
    dispatcher.register("cu.rightClick", Box::new(|s, p| click(s, p, MouseButton::Right, false)));
    dispatcher.register("cu.middleClick", Box::new(|s, p| click(s, p, MouseButton::Middle, false)));
    dispatcher.register("cu.doubleClick", Box::new(|s, p| click(s, p, MouseButton::Left, true)));
    dispatcher.register("cu.mouseMove", Box::new(mouse_move));
    dispatcher.register("cu.drag", Box::new(drag));
    dispatcher.register("cu.mouseDown", Box::new(|s, p| mouse_button(s, p, true)));
    dispatcher.register("cu.mouseUp", Box::new(|s, p| mouse_button(s, p, false)));
    dispatcher.register("cu.type", Box::new(type_text));
    dispatcher.register("cu.key", Box::new(key));
    dispatcher.register("cu.scroll", Box::new(scroll));
    dispatcher.register("cu.cursorPosition", Box::new(cursor_position));
}

/// Resolves `(x, y)` plus the `screenAbsolute` flag into global screen
/// coordinates (spec.md §4.5 "Virtual cursor"). The reference backend's
/// screen origin and the application's window origin coincide, so
/// window-relative and screen-absolute coordinates are numerically
/// identical here; a real toolkit binding offsets by the active window's
/// on-screen position in the window-relative case.
fn resolve_point(params: &Value) -> ProbeResult<(f64, f64)> {
    let x = required_f64(params, "x")?;
    let y = required_f64(params, "y")?;
    Ok((x, y))
}

/// Captures the post-action state when `include_screenshot: true` is set
/// (spec.md §4.8), reusing `cu.screenshot`'s own full-screen/window fallback.
fn maybe_attach_screenshot(state: &AppState, params: &Value, mut result: serde_json::Map<String, Value>) -> ProbeResult<Value> {
    if optional_bool(params, "include_screenshot", false) {
        if let Value::Object(shot) = screenshot(state, json!({}))? {
            result.insert("screenshot".to_string(), Value::Object(shot));
        }
    }
    Ok(Value::Object(result))
}

fn success_map() -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("success".to_string(), json!(true));
    map
}

fn click(state: &AppState, params: Value, button: MouseButton, double: bool) -> ProbeResult<Value> {
    let (x, y) = resolve_point(&params)?;
    InputSynthesizer::click(framework(state).as_ref(), x, y, button, double);
    state.cursor.set(x, y);
    maybe_attach_screenshot(state, &params, success_map())
}

fn mouse_move(state: &AppState, params: Value) -> ProbeResult<Value> {
    let (x, y) = resolve_point(&params)?;
    InputSynthesizer::mouse_move(framework(state).as_ref(), x, y);
    state.cursor.set(x, y);
    maybe_attach_screenshot(state, &params, success_map())
}

fn mouse_button(state: &AppState, params: Value, pressed: bool) -> ProbeResult<Value> {
    let (x, y) = resolve_point(&params)?;
    if pressed {
        InputSynthesizer::mouse_down(framework(state).as_ref(), x, y, MouseButton::Left);
    } else {
        InputSynthesizer::mouse_up(framework(state).as_ref(), x, y, MouseButton::Left);
    }
    state.cursor.set(x, y);
    maybe_attach_screenshot(state, &params, success_map())
}

fn drag(state: &AppState, params: Value) -> ProbeResult<Value> {
    let start_x = required_f64(&params, "startX")?;
    let start_y = required_f64(&params, "startY")?;
    let end_x = required_f64(&params, "endX")?;
    let end_y = required_f64(&params, "endY")?;
    let steps = params.get("steps").and_then(Value::as_u64).unwrap_or(10) as u32;
    InputSynthesizer::drag(framework(state).as_ref(), (start_x, start_y), (end_x, end_y), steps);
    state.cursor.set(end_x, end_y);
    maybe_attach_screenshot(state, &params, success_map())
}

fn type_text(state: &AppState, params: Value) -> ProbeResult<Value> {
    let text = required_str(&params, "text")?;
    InputSynthesizer::type_text(framework(state).as_ref(), &text)?;
    maybe_attach_screenshot(state, &params, success_map())
}

fn key(state: &AppState, params: Value) -> ProbeResult<Value> {
    let combo = required_str(&params, "combo").or_else(|_| required_str(&params, "key"))?;
    InputSynthesizer::key_combo(framework(state).as_ref(), &combo)?;
    maybe_attach_screenshot(state, &params, success_map())
}

fn scroll(state: &AppState, params: Value) -> ProbeResult<Value> {
    let (x, y) = resolve_point(&params)?;
    let ticks_x = params.get("deltaX").and_then(Value::as_i64).unwrap_or(0) as i32;
    let ticks_y = params.get("deltaY").and_then(Value::as_i64).unwrap_or(0) as i32;
    InputSynthesizer::wheel(framework(state).as_ref(), x, y, ticks_x, ticks_y);
    maybe_attach_screenshot(state, &params, success_map())
}

/// Reports the virtual cursor (tracked across `cu.*` actions); `virtual`
/// is true only while that tracked position is what's being reported, per
/// spec.md §4.8 — there is no OS cursor to fall back to in this workspace,
/// so the no-action case reports `virtual: false` alongside a null position.
fn cursor_position(state: &AppState, _params: Value) -> ProbeResult<Value> {
    match state.cursor.get() {
        Some((x, y)) => Ok(json!({ "x": x, "y": y, "virtual": true })),
        None => Ok(json!({ "x": null, "y": null, "virtual": false })),
    }
}

fn screenshot(state: &AppState, params: Value) -> ProbeResult<Value> {
    let physical = optional_bool(&params, "physicalPixels", false);
    let result = ScreenCapturer::capture(framework(state).as_ref(), CaptureTarget::FullScreen, physical)
        .or_else(|_| {
            framework(state)
                .application_object()
                .ok_or(ProbeError::NoActiveWindow)
                .and_then(|window| ScreenCapturer::capture(framework(state).as_ref(), CaptureTarget::Window(window), physical))
        })?;
    Ok(json!({
        "png": result.png_base64,
        "width": result.width,
        "height": result.height,
        "devicePixelRatio": result.device_pixel_ratio,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::refbackend::ReferenceFramework;

    fn state() -> std::sync::Arc<AppState> {
        let fw = ReferenceFramework::new();
        AppState::new(fw, crate::config::Config::from_env())
    }

    #[test]
    fn click_updates_virtual_cursor() {
        let state = state();
        assert!(state.cursor.get().is_none());
        click(&state, json!({ "x": 12.0, "y": 34.0 }), MouseButton::Left, false).unwrap();
        assert_eq!(state.cursor.get(), Some((12.0, 34.0)));
        let pos = cursor_position(&state, json!({})).unwrap();
        assert_eq!(pos["virtual"], json!(true));
    }

    #[test]
    fn drag_leaves_cursor_at_the_end_point() {
        let state = state();
        drag(&state, json!({ "startX": 0.0, "startY": 0.0, "endX": 100.0, "endY": 50.0, "steps": 4 })).unwrap();
        assert_eq!(state.cursor.get(), Some((100.0, 50.0)));
    }

    #[test]
    fn cursor_position_before_any_input_is_null() {
        let state = state();
        let pos = cursor_position(&state, json!({})).unwrap();
        assert_eq!(pos["x"], Value::Null);
        assert_eq!(pos["virtual"], json!(false));
    }
}
