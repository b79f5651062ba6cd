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

//! Helpers shared by the unit tests.

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Sender, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::controller::{Driver, Event};
use crate::notes::NoteMap;
use crate::samples::{Fetch, FetchError, SampleBuffer, SampleSet};

/// Encodes interleaved samples as a 16-bit WAV file in memory.
pub fn wav_bytes(samples: &[f32], channels: u16, sample_rate: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(
        &mut cursor,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )
    .expect("failed to create wav writer");
    for sample in samples {
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .expect("failed to write sample");
    }
    writer.finalize().expect("failed to finalize wav");
    cursor.into_inner()
}

/// One second of full-scale mono audio for every note except those in `skip`.
pub fn sample_set(notes: &NoteMap, skip: &[&str], sample_rate: u32) -> SampleSet {
    let mut samples = SampleSet::new();
    for (key, note) in notes.iter() {
        if !skip.contains(&note.to_string().as_str()) {
            samples.insert(
                *key,
                SampleBuffer::new(vec![1.0; sample_rate as usize], 1, sample_rate),
            );
        }
    }
    samples
}

/// Wait for the given async predicate to return true or fail.
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed().expect("system time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Serves fixed bytes per location; anything else is not found.
#[derive(Clone, Debug, Default)]
pub struct StaticFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn insert(&mut self, location: &str, bytes: Vec<u8>) {
        self.files.insert(location.to_string(), bytes);
    }
}

impl Fetch for StaticFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::Io {
                location: location.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such sample"),
            })
    }
}

/// A driver fed by the test through a channel. Stops when the test drops its
/// sender.
pub struct ChannelDriver {
    events: Mutex<Option<UnboundedReceiver<Event>>>,
}

impl ChannelDriver {
    pub fn new() -> (Arc<ChannelDriver>, UnboundedSender<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(ChannelDriver {
                events: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

impl Driver for ChannelDriver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let events = self.events.lock().take();
        tokio::spawn(async move {
            let Some(mut events) = events else {
                return Ok(());
            };
            while let Some(event) = events.recv().await {
                if events_tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(())
        })
    }
}
