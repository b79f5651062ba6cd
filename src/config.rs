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

//! YAML configuration for keytone. Every field has a default, so an absent
//! file section simply means "use the defaults".

use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

pub mod audio;
pub mod error;
pub mod keyboard;
pub mod playback;
pub mod samples;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::keyboard::Keyboard;
pub use self::playback::Playback;
pub use self::samples::Samples;

/// The top level keytone configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct KeytoneConfig {
    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,
    /// Where and how samples are fetched.
    #[serde(default)]
    samples: Samples,
    /// Voice gain and envelope settings.
    #[serde(default)]
    playback: Playback,
    /// Terminal keyboard settings.
    #[serde(default)]
    keyboard: Keyboard,
}

impl KeytoneConfig {
    /// Parses the configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<KeytoneConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<KeytoneConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses the configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<KeytoneConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<KeytoneConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.samples.fetch_timeout()?;
        self.playback.settings()?;
        self.keyboard.hold_timeout()?;
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// Overrides the audio device, e.g. from the command line.
    pub fn with_device(mut self, device: String) -> KeytoneConfig {
        self.audio = Audio::new(&device);
        self
    }

    /// Overrides the sample location template.
    pub fn with_url_template(mut self, template: String) -> KeytoneConfig {
        self.samples = self.samples.with_url_template(template);
        self
    }
}

/// Parses an optional human readable duration ("100ms", "2s"), falling back to
/// the given default when unset.
fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|e| ConfigError::Duration {
                field,
                value: value.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KeytoneConfig::from_yaml("{}").unwrap();

        assert_eq!(config.audio().device(), audio::DEFAULT_DEVICE);
        assert_eq!(config.samples().url_template(), samples::DEFAULT_URL_TEMPLATE);

        let settings = config.playback().settings().unwrap();
        assert_eq!(settings.gain, 0.5);
        assert_eq!(settings.start_offset, Duration::from_millis(100));
        assert_eq!(settings.release, Duration::from_millis(100));
        assert_eq!(settings.release_floor, 0.001);
    }

    #[test]
    fn test_full_config() {
        let config = KeytoneConfig::from_yaml(
            r#"
audio:
  device: mock-device
samples:
  url_template: /srv/piano/{note}{octave}.wav
  fetch_timeout: 5s
playback:
  gain: 0.8
  start_offset: 50ms
  release: 250ms
  release_floor: 0.0001
keyboard:
  hold_timeout: 400ms
"#,
        )
        .unwrap();

        assert_eq!(config.audio().device(), "mock-device");
        assert_eq!(
            config.samples().url_template(),
            "/srv/piano/{note}{octave}.wav"
        );
        assert_eq!(
            config.samples().fetch_timeout().unwrap(),
            Duration::from_secs(5)
        );

        let settings = config.playback().settings().unwrap();
        assert_eq!(settings.gain, 0.8);
        assert_eq!(settings.start_offset, Duration::from_millis(50));
        assert_eq!(settings.release, Duration::from_millis(250));
        assert_eq!(settings.release_floor, 0.0001);

        assert_eq!(
            config.keyboard().hold_timeout().unwrap(),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(KeytoneConfig::from_yaml("playback:\n  release_floor: 0.0\n").is_err());
        assert!(KeytoneConfig::from_yaml("playback:\n  gain: 1.5\n").is_err());
        assert!(KeytoneConfig::from_yaml("playback:\n  release: soon\n").is_err());
        assert!(KeytoneConfig::from_yaml("playback:\n  gain: 0.001\n").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = KeytoneConfig::default()
            .with_device("mock".to_string())
            .with_url_template("https://example.com/{note}{octave}.mp3".to_string());
        assert_eq!(config.audio().device(), "mock");
        assert_eq!(
            config.samples().url_template(),
            "https://example.com/{note}{octave}.mp3"
        );
    }
}
