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
use crate::samples::PlaybackSettings;

/// Nominal voice gain, as a fraction of full scale.
pub const DEFAULT_GAIN: f32 = 0.5;

/// How far into each sample playback starts, skipping leading silence.
pub const DEFAULT_START_OFFSET: Duration = Duration::from_millis(100);

/// Length of the note-off fade.
pub const DEFAULT_RELEASE: Duration = Duration::from_millis(100);

/// Target of the exponential release ramp. Must stay above zero.
pub const DEFAULT_RELEASE_FLOOR: f32 = 0.001;

/// A YAML representation of the voice playback settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Playback {
    /// Voice gain, 0 < gain <= 1 (default: 0.5).
    gain: Option<f32>,

    /// Offset into each sample where playback starts (default: 100ms).
    start_offset: Option<String>,

    /// Release fade duration (default: 100ms).
    release: Option<String>,

    /// Level the release fade ramps toward (default: 0.001).
    release_floor: Option<f32>,
}

impl Playback {
    /// Resolves and validates the playback settings.
    pub fn settings(&self) -> Result<PlaybackSettings, ConfigError> {
        let gain = self.gain.unwrap_or(DEFAULT_GAIN);
        if !(gain > 0.0 && gain <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "gain",
                reason: format!("{} is not in (0, 1]", gain),
            });
        }

        let release_floor = self.release_floor.unwrap_or(DEFAULT_RELEASE_FLOOR);
        if !(release_floor > 0.0 && release_floor < gain) {
            return Err(ConfigError::Invalid {
                field: "release_floor",
                reason: format!(
                    "{} must be above zero and below the gain ({})",
                    release_floor, gain
                ),
            });
        }

        let release = parse_duration("release", &self.release, DEFAULT_RELEASE)?;
        if release.is_zero() {
            return Err(ConfigError::Invalid {
                field: "release",
                reason: "must be longer than zero".to_string(),
            });
        }

        Ok(PlaybackSettings {
            gain,
            start_offset: parse_duration("start_offset", &self.start_offset, DEFAULT_START_OFFSET)?,
            release,
            release_floor,
        })
    }
}
