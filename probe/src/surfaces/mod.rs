/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The three interaction surfaces (spec.md §4.8). Each is an independent
//! registrar binding RPC method names to closures over §4.1–4.7; a panic
//! during one registrar's construction is caught by
//! [`crate::bootstrap::register_surface`] and never prevents the others
//! from registering.

pub mod accessibility;
pub mod coordinate;
pub mod native;

use probe_core::framework::Geometry;
use serde_json::{json, Value};

pub(crate) fn geometry_json(g: Geometry) -> Value {
    json!({ "x": g.x, "y": g.y, "w": g.width, "h": g.height })
}
