/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Environment-variable configuration, spec.md §6 "Environment
//! configuration". Read once at bootstrap; there is no live-reload.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Native,
    ComputerUse,
    Chrome,
    All,
}

impl Mode {
    fn parse(raw: &str) -> Mode {
        match raw.to_ascii_lowercase().as_str() {
            "native" => Mode::Native,
            "computer_use" | "computeruse" => Mode::ComputerUse,
            "chrome" => Mode::Chrome,
            _ => Mode::All,
        }
    }

    pub fn wants_native(self) -> bool {
        matches!(self, Mode::Native | Mode::All)
    }

    pub fn wants_computer_use(self) -> bool {
        matches!(self, Mode::ComputerUse | Mode::All)
    }

    pub fn wants_chrome(self) -> bool {
        matches!(self, Mode::Chrome | Mode::All)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub enabled: bool,
    pub port: u16,
    pub mode: Mode,
    pub inject_children: bool,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            enabled: env::var("ENABLED").map(|v| v != "0").unwrap_or(true),
            port: env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(9222),
            mode: env::var("MODE").map(|v| Mode::parse(&v)).unwrap_or(Mode::All),
            inject_children: env::var("INJECT_CHILDREN").is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_all_surfaces() {
        assert_eq!(Mode::parse("bogus"), Mode::All);
        assert!(Mode::All.wants_native());
        assert!(Mode::All.wants_computer_use());
        assert!(Mode::All.wants_chrome());
    }

    #[test]
    fn mode_restricts_to_one_surface() {
        let m = Mode::parse("chrome");
        assert!(m.wants_chrome());
        assert!(!m.wants_native());
        assert!(!m.wants_computer_use());
    }
}
