/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Child-process propagation (optional hook, spec.md §4.1, §6
//! `INJECT_CHILDREN`). A host that spawns helper processes (renderer
//! processes, worker subprocesses) and wants each of them probed as well
//! calls [`prepare_environment`] on the [`std::process::Command`] before
//! spawning it. There is no process-wide interception here — doing that
//! portably would mean an `LD_PRELOAD`/`DYLD_INSERT_LIBRARIES`-style
//! mechanism outside what a pure Rust crate can install on its own, so this
//! module only prepares the child's environment for the case where the same
//! library is already linked into (or injected into) the child binary.

use std::process::Command;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::config::Config;

/// Each propagated child gets the next port in sequence so it doesn't
/// collide with the parent's listener or a sibling's.
static NEXT_CHILD_OFFSET: AtomicU16 = AtomicU16::new(1);

/// Stamps `ENABLED`/`PORT`/`MODE` onto `command`'s environment so that, if
/// the child process also links this library, its own [`crate::bootstrap`]
/// picks up a working, non-conflicting configuration. No-op unless
/// `config.inject_children` is set.
pub fn prepare_environment(command: &mut Command, config: &Config) {
    if !config.inject_children {
        return;
    }
    let offset = NEXT_CHILD_OFFSET.fetch_add(1, Ordering::SeqCst);
    command
        .env("ENABLED", "1")
        .env("PORT", config.port.wrapping_add(offset).to_string())
        .env("MODE", mode_env(config))
        .env("INJECT_CHILDREN", "1");
}

fn mode_env(config: &Config) -> &'static str {
    use crate::config::Mode;
    match config.mode {
        Mode::Native => "native",
        Mode::ComputerUse => "computer_use",
        Mode::Chrome => "chrome",
        Mode::All => "all",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_leaves_command_env_untouched() {
        let config = Config { enabled: true, port: 9222, mode: crate::config::Mode::All, inject_children: false };
        let mut command = Command::new("true");
        prepare_environment(&mut command, &config);
        assert!(!format!("{command:?}").contains("INJECT_CHILDREN"));
    }

    #[test]
    fn enabled_stamps_a_distinct_port() {
        let config = Config { enabled: true, port: 9300, mode: crate::config::Mode::All, inject_children: true };
        let mut command = Command::new("true");
        prepare_environment(&mut command, &config);
        let debug = format!("{command:?}");
        assert!(debug.contains("PORT"));
        assert!(!debug.contains("PORT=\"9300\""));
    }
}
