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

//! Per-note samples: loading, the voice registry and the engine that plays
//! them.

mod buffer;
mod decode;
mod engine;
mod fetch;
mod loader;
mod voice;

pub use buffer::{SampleBuffer, SampleSet};
pub use decode::{decode, DecodeError};
pub use engine::{PlaybackSettings, SampleEngine};
pub use fetch::{Fetch, FetchError, Fetcher, FileFetcher, HttpFetcher};
pub use loader::{LoadError, SampleLoader};
pub use voice::{Voice, VoiceId, VoiceRegistry, VoiceState};
