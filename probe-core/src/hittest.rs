/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Coordinate-to-widget resolution and geometry reporting (spec.md §4.5
//! "HitTester"). Out-of-bounds is an explicit error, never a silent clamp.

use std::sync::Arc;

use crate::errors::{ProbeError, ProbeResult};
use crate::framework::{Framework, FrameworkObject, Geometry};

#[derive(Debug, Clone, Copy)]
pub struct GeometryReport {
    pub local: Geometry,
    pub global: Geometry,
    pub device_pixel_ratio: f64,
}

pub struct HitTester;

impl HitTester {
    pub fn widget_at(framework: &dyn Framework, global_x: f64, global_y: f64) -> ProbeResult<Arc<dyn FrameworkObject>> {
        framework
            .widget_at(global_x, global_y)
            .ok_or(ProbeError::CoordinateOutOfBounds {
                x: global_x,
                y: global_y,
                window_width: 0.0,
                window_height: 0.0,
            })
    }

    /// A child of `parent` whose geometry (parent-local coordinates)
    /// contains `(local_x, local_y)`, topmost (last) match wins.
    pub fn child_at(parent: &Arc<dyn FrameworkObject>, local_x: f64, local_y: f64) -> Option<Arc<dyn FrameworkObject>> {
        parent
            .children()
            .into_iter()
            .filter(|c| {
                c.geometry()
                    .map(|g| local_x >= g.x && local_x < g.x + g.width && local_y >= g.y && local_y < g.y + g.height)
                    .unwrap_or(false)
            })
            .last()
    }

    pub fn widget_geometry(framework: &dyn Framework, widget: &Arc<dyn FrameworkObject>) -> ProbeResult<GeometryReport> {
        let local = widget.geometry().ok_or_else(|| ProbeError::WidgetNotVisible {
            id: widget.object_name().unwrap_or_else(|| widget.class_name()),
        })?;
        let mut global = local;
        let mut current = widget.parent();
        while let Some(p) = current {
            if let Some(pg) = p.geometry() {
                global.x += pg.x;
                global.y += pg.y;
            }
            current = p.parent();
        }
        Ok(GeometryReport {
            local,
            global,
            device_pixel_ratio: framework.device_pixel_ratio(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refbackend::{ReferenceFramework, WidgetSpec};

    #[test]
    fn global_geometry_accumulates_ancestor_offsets() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let window = fw.spawn_widget(
            &app,
            WidgetSpec {
                geometry: Some(Geometry { x: 50.0, y: 50.0, width: 400.0, height: 300.0 }),
                ..Default::default()
            },
        );
        let button = fw.spawn_widget(
            &window,
            WidgetSpec {
                geometry: Some(Geometry { x: 10.0, y: 20.0, width: 80.0, height: 24.0 }),
                ..Default::default()
            },
        );
        let report = HitTester::widget_geometry(fw.as_ref(), &button).unwrap();
        assert_eq!(report.global.x, 60.0);
        assert_eq!(report.global.y, 70.0);
    }

    #[test]
    fn out_of_bounds_widget_at_is_explicit_error() {
        let fw = ReferenceFramework::new();
        assert!(HitTester::widget_at(fw.as_ref(), -1.0, -1.0).is_err());
    }

    #[test]
    fn invisible_widget_geometry_is_an_error() {
        let fw = ReferenceFramework::new();
        let app = fw.application_object().unwrap();
        let widget = fw.spawn_widget(&app, WidgetSpec::default());
        assert!(HitTester::widget_geometry(fw.as_ref(), &widget).is_err());
    }
}
