// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::time::Duration;

use serde::Deserialize;

use super::{error::ConfigError, parse_duration};

/// Longer than the usual auto-repeat delay, so a held key keeps sounding.
const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_millis(600);

/// Terminal keyboard settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Keyboard {
    /// On terminals that cannot report key releases, a key counts as released
    /// once this long has passed without another press of it.
    hold_timeout: Option<String>,
}

impl Keyboard {
    pub fn hold_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("hold_timeout", &self.hold_timeout, DEFAULT_HOLD_TIMEOUT)
    }
}
