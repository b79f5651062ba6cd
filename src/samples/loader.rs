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

//! Concurrent loading of every note's sample.
//!
//! Each note is fetched and decoded in its own task. A note that fails is
//! logged and left out of the set; the batch always completes.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use super::decode::{decode, DecodeError};
use super::fetch::{Fetch, FetchError};
use super::{SampleBuffer, SampleSet};
use crate::notes::{NoteDescriptor, NoteMap};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unable to decode {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: DecodeError,
    },

    #[error("decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Loads samples for a note map from locations built from a template.
pub struct SampleLoader<F: Fetch> {
    fetcher: Arc<F>,
    /// Location with `{note}` and `{octave}` placeholders.
    template: String,
    /// Output rate the samples are resampled to, if known.
    target_sample_rate: Option<u32>,
}

impl<F: Fetch> SampleLoader<F> {
    pub fn new(fetcher: F, template: &str, target_sample_rate: Option<u32>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            template: template.to_string(),
            target_sample_rate,
        }
    }

    /// The location of a note's sample.
    pub fn location(&self, note: &NoteDescriptor) -> String {
        self.template
            .replace("{note}", &note.file_name())
            .replace("{octave}", &note.octave().to_string())
    }

    /// Fetches and decodes every note concurrently, returning once all have
    /// settled. Notes that fail are absent from the result.
    pub async fn load_all(&self, notes: &NoteMap) -> SampleSet {
        let mut tasks = JoinSet::new();
        for (key, note) in notes.iter() {
            let key = *key;
            let location = self.location(note);
            let fetcher = self.fetcher.clone();
            let target_sample_rate = self.target_sample_rate;
            let span = info_span!("load sample", key = %key, note = %note);
            tasks.spawn(
                async move {
                    let result = load_sample(fetcher.as_ref(), &location, target_sample_rate).await;
                    (key, location, result)
                }
                .instrument(span),
            );
        }

        let mut samples = SampleSet::new();
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, location, Ok(buffer))) => {
                    debug!(
                        key = %key,
                        location = %location,
                        frames = buffer.frames(),
                        "Sample ready"
                    );
                    samples.insert(key, buffer);
                }
                Ok((key, location, Err(e))) => {
                    warn!(key = %key, location = %location, err = %e, "Failed to load sample");
                    failed.push(key);
                }
                Err(e) => warn!(err = %e, "Sample task failed"),
            }
        }

        failed.sort();
        info!(
            loaded = samples.len(),
            failed = ?failed,
            memory_kb = samples.memory_size() / 1024,
            "Samples loaded"
        );
        samples
    }
}

impl<F: Fetch> std::fmt::Debug for SampleLoader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("template", &self.template)
            .field("target_sample_rate", &self.target_sample_rate)
            .finish()
    }
}

async fn load_sample<F: Fetch>(
    fetcher: &F,
    location: &str,
    target_sample_rate: Option<u32>,
) -> Result<SampleBuffer, LoadError> {
    let bytes = fetcher.fetch(location).await?;
    let extension = Path::new(location)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string);

    tokio::task::spawn_blocking(move || decode(bytes, extension.as_deref(), target_sample_rate))
        .await?
        .map_err(|source| LoadError::Decode {
            location: location.to_string(),
            source,
        })
}
