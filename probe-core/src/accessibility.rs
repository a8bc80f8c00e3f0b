/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Builds accessibility tree JSON with numeric refs; role/state
//! normalization (spec.md §4.6).

use std::sync::{Arc, Weak};

use serde_json::{json, Value};

use crate::framework::{FrameworkObject, Geometry};
use crate::session::AccessibilityRefMap;

/// A handle stored in the session's ref map, resolved back to a live
/// object by `chr.click` / `chr.formInput` / `chr.navigate`.
#[derive(Clone)]
pub struct AccessibleHandle(pub Weak<dyn FrameworkObject>);

impl AccessibleHandle {
    pub fn upgrade(&self) -> Option<Arc<dyn FrameworkObject>> {
        self.0.upgrade()
    }
}

/// What an object reports about itself to the walker. Framework-native role
/// strings are mapped to the web-accessibility vocabulary by [`map_role`].
#[derive(Debug, Clone, Default)]
pub struct AccessibleSnapshot {
    pub role: String,
    pub name: Option<String>,
    pub states: AccessibleStates,
    pub bounds: Geometry,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessibleStates {
    pub focused: bool,
    pub disabled: bool,
    pub checked: bool,
    pub expanded: Option<bool>,
    pub selected: bool,
    pub readonly: bool,
    pub pressed: bool,
    pub has_popup: bool,
    pub modal: bool,
    pub editable: bool,
    pub multiline: bool,
    pub password: bool,
}

impl AccessibleStates {
    fn to_json(self) -> Option<Value> {
        let mut obj = serde_json::Map::new();
        macro_rules! put_bool {
            ($field:ident) => {
                if self.$field {
                    obj.insert(stringify!($field).to_string(), json!(true));
                }
            };
        }
        put_bool!(focused);
        put_bool!(disabled);
        put_bool!(checked);
        put_bool!(selected);
        put_bool!(readonly);
        put_bool!(pressed);
        put_bool!(modal);
        put_bool!(editable);
        put_bool!(multiline);
        put_bool!(password);
        if self.has_popup {
            obj.insert("hasPopup".into(), json!(true));
        }
        match self.expanded {
            Some(true) => {
                obj.insert("expanded".into(), json!(true));
            }
            Some(false) => {
                obj.insert("collapsed".into(), json!(true));
            }
            None => {}
        }
        if obj.is_empty() {
            None
        } else {
            Some(Value::Object(obj))
        }
    }
}

/// Static table mapping ~55 framework-native accessibility roles to the web
/// role vocabulary (spec.md §4.6 "Role mapping"). Unknown roles map to
/// `generic`.
const ROLE_TABLE: &[(&str, &str)] = &[
    ("Button", "button"),
    ("CheckBox", "checkbox"),
    ("RadioButton", "radio"),
    ("ComboBox", "combobox"),
    ("SpinBox", "spinbutton"),
    ("Slider", "slider"),
    ("ScrollBar", "scrollbar"),
    ("EditableText", "textbox"),
    ("Link", "link"),
    ("MenuItem", "menuitem"),
    ("MenuBar", "menubar"),
    ("Menu", "menu"),
    ("PageTab", "tab"),
    ("PageTabList", "tablist"),
    ("Cell", "cell"),
    ("Row", "row"),
    ("Table", "table"),
    ("TreeItem", "treeitem"),
    ("Tree", "tree"),
    ("List", "list"),
    ("ListItem", "listitem"),
    ("Heading", "heading"),
    ("Paragraph", "paragraph"),
    ("StaticText", "text"),
    ("ToolBar", "toolbar"),
    ("ToolTip", "tooltip"),
    ("Dialog", "dialog"),
    ("AlertDialog", "alertdialog"),
    ("Alert", "alert"),
    ("Application", "application"),
    ("Window", "window"),
    ("Pane", "group"),
    ("Group", "group"),
    ("Separator", "separator"),
    ("ProgressBar", "progressbar"),
    ("StatusBar", "status"),
    ("Image", "img"),
    ("Graphic", "img"),
    ("Form", "form"),
    ("Document", "document"),
    ("Grid", "grid"),
    ("GridCell", "gridcell"),
    ("ColumnHeader", "columnheader"),
    ("RowHeader", "rowheader"),
    ("Banner", "banner"),
    ("ComplementaryContent", "complementary"),
    ("ContentInfo", "contentinfo"),
    ("Navigation", "navigation"),
    ("Main", "main"),
    ("Search", "search"),
    ("Switch", "switch"),
    ("Meter", "meter"),
    ("Caret", "caret"),
    ("Cursor", "none"),
    ("Client", "region"),
    ("Panel", "group"),
    ("Label", "text"),
    ("HotkeyField", "textbox"),
];

const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "checkbox",
    "radio",
    "combobox",
    "spinbutton",
    "slider",
    "textbox",
    "link",
    "menuitem",
    "tab",
    "listitem",
    "treeitem",
    "cell",
    "scrollbar",
    "switch",
];

pub fn map_role(native_role: &str) -> &'static str {
    ROLE_TABLE
        .iter()
        .find(|(native, _)| *native == native_role)
        .map(|(_, web)| *web)
        .unwrap_or("generic")
}

fn is_interactive(web_role: &str) -> bool {
    INTERACTIVE_ROLES.contains(&web_role)
}

/// Name fallback chain shared between `readPage` and `find`: accessible
/// name -> object-name -> class-name (spec.md §4.6).
pub fn resolve_name(obj: &Arc<dyn FrameworkObject>, snapshot: &AccessibleSnapshot) -> String {
    snapshot
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| obj.object_name().filter(|n| !n.is_empty()))
        .unwrap_or_else(|| obj.class_name())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Interactive,
}

pub struct WalkOptions {
    pub filter: Filter,
    pub max_depth: usize,
    pub max_chars: usize,
    pub scope_ref: Option<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            filter: Filter::All,
            max_depth: 15,
            max_chars: 50_000,
            scope_ref: None,
        }
    }
}

pub struct WalkResult {
    pub tree: Value,
    pub total_nodes: usize,
    pub truncated: bool,
}

/// Walks the framework's accessibility tree rooted at `window`, assigning
/// `ref_<N>` to every node in `all` mode or only to interactive nodes in
/// `interactive` mode (structural ancestors of interactive nodes are kept
/// for context, without refs).
pub struct AccessibilityWalker;

impl AccessibilityWalker {
    /// `reset_refs` controls whether the ref counter/map is reset first:
    /// `readPage` resets, `find` appends (spec.md §3, §4.6).
    pub fn walk(
        root: &Arc<dyn FrameworkObject>,
        options: &WalkOptions,
        refs: &AccessibilityRefMap,
        reset_refs: bool,
    ) -> WalkResult {
        if reset_refs {
            refs.reset();
        }
        let mut total_nodes = 0usize;
        let mut truncated = false;
        let mut chars_used = 0usize;
        let tree = Self::walk_node(root, options, refs, 0, &mut total_nodes, &mut truncated, &mut chars_used);
        WalkResult {
            tree: tree.unwrap_or(Value::Null),
            total_nodes,
            truncated,
        }
    }

    fn walk_node(
        obj: &Arc<dyn FrameworkObject>,
        options: &WalkOptions,
        refs: &AccessibilityRefMap,
        depth: usize,
        total_nodes: &mut usize,
        truncated: &mut bool,
        chars_used: &mut usize,
    ) -> Option<Value> {
        let Some(snapshot) = obj.accessible() else {
            return None;
        };
        let web_role = map_role(&snapshot.role);
        let name = resolve_name(obj, &snapshot);

        let budget_spent = *chars_used >= options.max_chars;
        let children: Vec<Value> = if depth + 1 >= options.max_depth || budget_spent {
            if !obj.children().is_empty() {
                *truncated = true;
            }
            Vec::new()
        } else {
            obj.children()
                .iter()
                .filter_map(|c| Self::walk_node(c, options, refs, depth + 1, total_nodes, truncated, chars_used))
                .collect()
        };

        let is_interesting = options.filter == Filter::All
            || is_interactive(web_role)
            || !children.is_empty();
        if !is_interesting {
            return None;
        }

        let assign_ref = options.filter == Filter::All || is_interactive(web_role);
        let reference = if assign_ref {
            Some(refs.allocate(AccessibleHandle(Arc::downgrade(obj))))
        } else {
            None
        };

        *total_nodes += 1;
        let mut node = serde_json::Map::new();
        if let Some(r) = &reference {
            node.insert("ref".into(), json!(r));
        }
        node.insert("role".into(), json!(web_role));
        node.insert("name".into(), json!(name));
        if let Some(states) = snapshot.states.to_json() {
            node.insert("states".into(), states);
        }
        node.insert(
            "bounds".into(),
            json!({
                "x": snapshot.bounds.x,
                "y": snapshot.bounds.y,
                "w": snapshot.bounds.width,
                "h": snapshot.bounds.height,
            }),
        );
        if let Some(object_name) = obj.object_name() {
            node.insert("objectName".into(), json!(object_name));
        }
        node.insert("className".into(), json!(obj.class_name()));
        let own_size = serde_json::to_string(&Value::Object(node.clone())).map(|s| s.len()).unwrap_or(0);
        *chars_used += own_size;

        if !children.is_empty() {
            node.insert("children".into(), Value::Array(children));
        }
        Some(Value::Object(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refbackend::{ReferenceFramework, WidgetSpec};
    use crate::session::AccessibilityRefMap;
    use crate::Framework as _;

    #[test]
    fn unmapped_role_becomes_generic() {
        assert_eq!(map_role("SomeExoticFutureRole"), "generic");
    }

    #[test]
    fn known_roles_map_to_published_names() {
        assert_eq!(map_role("Button"), "button");
        assert_eq!(map_role("ComboBox"), "combobox");
        assert_eq!(map_role("TreeItem"), "treeitem");
    }

    #[test]
    fn a_tiny_char_budget_truncates_before_a_large_fanout() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        for i in 0..40 {
            fw.spawn_widget(
                &app,
                WidgetSpec {
                    class_name: "QLabel".into(),
                    object_name: Some(format!("label{i}")),
                    accessible_role: Some("Label".into()),
                    ..Default::default()
                },
            );
        }
        let refs = AccessibilityRefMap::default();
        let generous = AccessibilityWalker::walk(&app, &WalkOptions::default(), &refs, true);
        assert!(!generous.truncated);
        assert_eq!(generous.total_nodes, 41);

        let tight = AccessibilityWalker::walk(&app, &WalkOptions { max_chars: 200, ..Default::default() }, &refs, true);
        assert!(tight.truncated);
        assert!(tight.total_nodes < generous.total_nodes);
    }
}
