/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The probe's runtime: object registry, introspection kernel, the three
//! interaction surfaces' supporting logic, and the in-process reference
//! framework binding used to test all of it end-to-end.

pub mod accessibility;
pub mod capture;
pub mod errors;
pub mod framework;
pub mod hittest;
pub mod id;
pub mod input;
pub mod logsink;
pub mod meta;
pub mod models;
pub mod refbackend;
pub mod registry;
pub mod session;
pub mod signals;
pub mod variant;

pub use errors::{ProbeError, ProbeResult};
pub use framework::{Framework, FrameworkObject};
pub use registry::ObjectRegistry;
pub use session::SessionState;
pub use variant::Variant;
