/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Generates path-form hierarchical IDs from framework objects and resolves
//! IDs back to objects, per spec.md §4.2 "ID generation" / "Resolution".

use std::sync::Arc;

use crate::framework::FrameworkObject;

/// Characters allowed in a generated ID, per spec.md §8 invariant:
/// `[A-Za-z0-9_#/~]`.
fn sanitize(raw: &str, max_len: usize) -> String {
    let mut out = String::new();
    for c in raw.chars() {
        if out.len() >= max_len {
            break;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// One path segment for `obj`, given its index (1-based) among siblings
/// sharing its class name and the total count of such siblings.
pub fn segment_for(obj: &Arc<dyn FrameworkObject>, class_index: usize, class_count: usize) -> String {
    if obj.is_qml_item() {
        if let Some(qml_id) = obj.qml_id() {
            if !qml_id.is_empty() {
                return qml_id;
            }
        }
    }
    if let Some(name) = obj.object_name() {
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(text) = obj.text() {
        if !text.is_empty() {
            return format!("text_{}", sanitize(&text, 20));
        }
    }
    let class = obj.class_name();
    if class_count > 1 {
        format!("{class}#{class_index}")
    } else {
        class
    }
}

/// Index (1-based) and total count of `obj` among its parent's children
/// that share its class name.
fn class_index_and_count(obj: &Arc<dyn FrameworkObject>) -> (usize, usize) {
    let Some(parent) = obj.parent() else {
        return (1, 1);
    };
    let class = obj.class_name();
    let siblings = parent.children();
    let same_class: Vec<_> = siblings
        .iter()
        .filter(|s| s.class_name() == class)
        .collect();
    let index = same_class
        .iter()
        .position(|s| s.address() == obj.address())
        .map(|i| i + 1)
        .unwrap_or(1);
    (index, same_class.len())
}

/// Full root-to-target path, one segment per ancestor, joined by `/`.
/// Does not apply collision suffixing — that is the registry's job since it
/// alone knows about other live IDs.
pub fn compute_path(obj: &Arc<dyn FrameworkObject>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(obj.clone());
    while let Some(node) = current {
        let (index, count) = class_index_and_count(&node);
        segments.push(segment_for(&node, index, count));
        current = node.parent();
    }
    segments.reverse();
    segments.join("/")
}

/// Resolve a slash-joined path against a tree of top-level roots by
/// matching segment-by-segment, honoring the `ClassName#N` sibling-index
/// form even when the path was generated against a now-mutated tree
/// (spec.md §4.2 "Resolution").
pub fn walk_path(
    roots: &[Arc<dyn FrameworkObject>],
    path: &str,
) -> Option<Arc<dyn FrameworkObject>> {
    let mut segments = path.split('/');
    let first = segments.next()?;
    let strip_collision = |s: &str| s.split('~').next().unwrap_or(s).to_string();
    let first = strip_collision(first);

    let mut candidates: Vec<Arc<dyn FrameworkObject>> = roots
        .iter()
        .filter(|r| segment_matches(r, &first))
        .cloned()
        .collect();
    let mut current = candidates.pop()?;

    for seg in segments {
        let seg = strip_collision(seg);
        let children = current.children();
        current = children.into_iter().find(|c| segment_matches(c, &seg))?;
    }
    Some(current)
}

fn segment_matches(obj: &Arc<dyn FrameworkObject>, segment: &str) -> bool {
    let (index, count) = class_index_and_count(obj);
    segment_for(obj, index, count) == segment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refbackend::{ReferenceFramework, WidgetSpec};

    #[test]
    fn sanitizes_non_alphanumeric_and_truncates() {
        assert_eq!(sanitize("Save As...!!", 20), "Save_As______");
        assert_eq!(sanitize(&"a".repeat(30), 20), "a".repeat(20));
    }

    #[test]
    fn generates_expected_path_for_named_button() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let window = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "Window".into(),
                object_name: Some("mainWindow".into()),
                ..Default::default()
            },
        );
        let button = fw.spawn_widget(
            &window,
            WidgetSpec {
                class_name: "QPushButton".into(),
                object_name: Some("saveButton".into()),
                text: Some("Save".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            compute_path(&button),
            "QApplication/mainWindow/saveButton"
        );
    }

    #[test]
    fn falls_back_through_text_then_class_index() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let b1 = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QPushButton".into(),
                text: Some("OK!".into()),
                ..Default::default()
            },
        );
        let b2 = fw.spawn_widget(
            &app,
            WidgetSpec {
                class_name: "QPushButton".into(),
                ..Default::default()
            },
        );
        assert_eq!(compute_path(&b1), "QApplication/text_OK_");
        assert_eq!(compute_path(&b2), "QApplication/QPushButton#2");
    }
}
