/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Mouse/keyboard/wheel input synthesis and key-combo parsing (spec.md §4.5).

use std::sync::Arc;

use crate::errors::{ProbeError, ProbeResult};
use crate::framework::{Framework, FrameworkObject, InputEvent, MouseButton};

/// One wheel "click" (spec.md §4.5: "Wheel delta is 120 units per discrete
/// tick").
pub const WHEEL_TICK: i32 = 120;

/// Browser-style and toolkit-native key-name aliases (spec.md §4.5, ~60
/// entries). Matching is case-insensitive; the canonical (right-hand) form
/// is what gets sent to the framework.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("enter", "Return"),
    ("return", "Return"),
    ("esc", "Escape"),
    ("escape", "Escape"),
    ("arrowup", "Up"),
    ("up", "Up"),
    ("arrowdown", "Down"),
    ("down", "Down"),
    ("arrowleft", "Left"),
    ("left", "Left"),
    ("arrowright", "Right"),
    ("right", "Right"),
    ("backspace", "Backspace"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("tab", "Tab"),
    ("space", "Space"),
    ("spacebar", "Space"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "PageUp"),
    ("pagedown", "PageDown"),
    ("insert", "Insert"),
    ("capslock", "CapsLock"),
    ("numlock", "NumLock"),
    ("scrolllock", "ScrollLock"),
    ("printscreen", "Print"),
    ("pause", "Pause"),
    ("contextmenu", "Menu"),
    ("f1", "F1"),
    ("f2", "F2"),
    ("f3", "F3"),
    ("f4", "F4"),
    ("f5", "F5"),
    ("f6", "F6"),
    ("f7", "F7"),
    ("f8", "F8"),
    ("f9", "F9"),
    ("f10", "F10"),
    ("f11", "F11"),
    ("f12", "F12"),
    ("comma", "Comma"),
    ("period", "Period"),
    ("slash", "Slash"),
    ("semicolon", "Semicolon"),
    ("quote", "Apostrophe"),
    ("backquote", "QuoteLeft"),
    ("minus", "Minus"),
    ("equal", "Equal"),
    ("bracketleft", "BracketLeft"),
    ("bracketright", "BracketRight"),
    ("backslash", "Backslash"),
    ("numpadenter", "Enter"),
    ("numpadadd", "Plus"),
    ("numpadsubtract", "Minus"),
    ("numpadmultiply", "Asterisk"),
    ("numpaddivide", "Slash"),
    ("numpaddecimal", "Period"),
    ("meta", "Meta"),
    ("cmd", "Meta"),
    ("super", "Meta"),
    ("win", "Meta"),
];

const MODIFIER_NAMES: &[&str] = &["ctrl", "control", "alt", "shift", "meta", "cmd", "super", "win"];

fn normalize_modifier(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some("Ctrl"),
        "alt" => Some("Alt"),
        "shift" => Some("Shift"),
        "meta" | "cmd" | "super" | "win" => Some("Meta"),
        _ => None,
    }
}

fn resolve_key_name(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Parses `"mod1+mod2+Key"` (spec.md §4.5 "Key combo"). The last segment not
/// recognized as a modifier is the key; everything before it is a modifier.
pub fn parse_key_combo(combo: &str) -> ProbeResult<(String, Vec<String>)> {
    let parts: Vec<&str> = combo.split('+').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return Err(ProbeError::KeyParseError { combo: combo.to_string() });
    }
    let mut modifiers = Vec::new();
    let mut key = None;
    for part in &parts {
        if MODIFIER_NAMES.contains(&part.to_ascii_lowercase().as_str()) {
            if let Some(m) = normalize_modifier(part) {
                if !modifiers.contains(&m.to_string()) {
                    modifiers.push(m.to_string());
                }
            }
        } else {
            key = Some(resolve_key_name(part));
        }
    }
    let key = key.ok_or_else(|| ProbeError::KeyParseError { combo: combo.to_string() })?;
    Ok((key, modifiers))
}

pub struct InputSynthesizer;

impl InputSynthesizer {
    pub fn click(framework: &dyn Framework, global_x: f64, global_y: f64, button: MouseButton, double: bool) {
        framework.synthesize_input(InputEvent::Click { global_x, global_y, button, double });
    }

    pub fn mouse_down(framework: &dyn Framework, global_x: f64, global_y: f64, button: MouseButton) {
        framework.synthesize_input(InputEvent::MouseButton { global_x, global_y, button, pressed: true });
    }

    pub fn mouse_up(framework: &dyn Framework, global_x: f64, global_y: f64, button: MouseButton) {
        framework.synthesize_input(InputEvent::MouseButton { global_x, global_y, button, pressed: false });
    }

    pub fn mouse_move(framework: &dyn Framework, global_x: f64, global_y: f64) {
        framework.synthesize_input(InputEvent::MouseMove { global_x, global_y });
    }

    /// Press at `(start_x, start_y)`, intermediate moves, release at
    /// `(end_x, end_y)` (spec.md §4.5 "Drag").
    pub fn drag(framework: &dyn Framework, start: (f64, f64), end: (f64, f64), steps: u32) {
        Self::mouse_down(framework, start.0, start.1, MouseButton::Left);
        let steps = steps.max(1);
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            let x = start.0 + (end.0 - start.0) * t;
            let y = start.1 + (end.1 - start.1) * t;
            Self::mouse_move(framework, x, y);
        }
        Self::mouse_up(framework, end.0, end.1, MouseButton::Left);
    }

    pub fn wheel(framework: &dyn Framework, global_x: f64, global_y: f64, ticks_x: i32, ticks_y: i32) {
        framework.synthesize_input(InputEvent::Wheel {
            global_x,
            global_y,
            delta_x: ticks_x * WHEEL_TICK,
            delta_y: ticks_y * WHEEL_TICK,
        });
    }

    pub fn type_text(framework: &dyn Framework, text: &str) -> ProbeResult<()> {
        if framework.focused_widget().is_none() {
            return Err(ProbeError::NoFocusedWidget);
        }
        framework.synthesize_input(InputEvent::Text { text: text.to_string() });
        Ok(())
    }

    pub fn key_combo(framework: &dyn Framework, combo: &str) -> ProbeResult<()> {
        let (key_code, modifiers) = parse_key_combo(combo)?;
        framework.synthesize_input(InputEvent::Key { key_code: key_code.clone(), modifiers: modifiers.clone(), pressed: true });
        framework.synthesize_input(InputEvent::Key { key_code, modifiers, pressed: false });
        Ok(())
    }

    pub fn send_keys(framework: &dyn Framework, widget: &Arc<dyn FrameworkObject>, text: &str) -> ProbeResult<()> {
        let _ = widget;
        Self::type_text(framework, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_key() {
        let (key, mods) = parse_key_combo("Ctrl+enter").unwrap();
        assert_eq!(key, "Return");
        assert_eq!(mods, vec!["Ctrl".to_string()]);
    }

    #[test]
    fn arrow_aliases_match_browser_style() {
        let (key, _) = parse_key_combo("ArrowUp").unwrap();
        assert_eq!(key, "Up");
    }

    #[test]
    fn multiple_modifiers_are_case_insensitive() {
        let (key, mods) = parse_key_combo("SHIFT+alt+a").unwrap();
        assert_eq!(key, "a");
        assert_eq!(mods, vec!["Shift".to_string(), "Alt".to_string()]);
    }

    #[test]
    fn empty_combo_is_a_parse_error() {
        assert!(parse_key_combo("").is_err());
    }

    #[test]
    fn modifier_only_combo_is_a_parse_error() {
        assert!(parse_key_combo("Ctrl+Shift").is_err());
    }
}
