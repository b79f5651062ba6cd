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

/// Where samples are fetched from when nothing is configured. `{note}` and
/// `{octave}` are replaced per note.
pub const DEFAULT_URL_TEMPLATE: &str = "http://localhost:8000/samples/{note}{octave}.mp3";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A YAML representation of the sample source configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Samples {
    /// Location template. http(s) URLs are fetched over the network, anything
    /// else is read from the filesystem.
    url_template: Option<String>,

    /// Per request timeout for network fetches.
    fetch_timeout: Option<String>,
}

impl Samples {
    pub fn url_template(&self) -> &str {
        self.url_template.as_deref().unwrap_or(DEFAULT_URL_TEMPLATE)
    }

    /// Returns the network fetch timeout (default: 30s).
    pub fn fetch_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("fetch_timeout", &self.fetch_timeout, DEFAULT_FETCH_TIMEOUT)
    }

    pub(super) fn with_url_template(mut self, template: String) -> Samples {
        self.url_template = Some(template);
        self
    }
}
