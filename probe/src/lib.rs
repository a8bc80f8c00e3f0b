/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The injectable probe library (spec.md §1, §4.1): loaded into a host GUI
//! process, it attaches to the host's [`probe_core::framework::Framework`]
//! implementation and exposes the `qt.*`/`cu.*`/`chr.*` RPC surfaces over a
//! local WebSocket.

pub mod bootstrap;
pub mod childproc;
pub mod config;
pub mod rpc;
pub mod state;
pub mod surfaces;
pub mod transport;

pub use bootstrap::{attach_now, is_library_present, probe_on_load};
pub use config::Config;
