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

//! A playing session: the audio context, the sample load running in the
//! background, the input driver and the controller task tying them together.

use std::error::Error;
use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, info_span, Instrument};

use crate::audio::{self, AudioContext, EndedReceiver};
use crate::config::KeytoneConfig;
use crate::controller::{Controller, Driver, EngineStatus, Event};
use crate::notes::NoteMap;
use crate::samples::{Fetch, Fetcher, PlaybackSettings, SampleEngine, SampleLoader};

/// Host events buffered between the driver and the controller.
const EVENT_BUFFER: usize = 64;

/// Handle to a running session.
pub struct Session {
    notes: NoteMap,
    events_tx: mpsc::Sender<Event>,
    status: watch::Receiver<EngineStatus>,
    controller: Option<JoinHandle<()>>,
    driver: Option<JoinHandle<Result<(), io::Error>>>,
}

impl Session {
    /// Opens the configured audio device, starts loading samples and starts
    /// taking input from the driver.
    pub fn start(config: &KeytoneConfig, driver: Arc<dyn Driver>) -> Result<Session, Box<dyn Error>> {
        let (context, ended_rx) = audio::open(config.audio())?;
        let template = config.samples().url_template();
        let fetcher = Fetcher::for_template(template, config.samples().fetch_timeout()?)?;
        let loader = SampleLoader::new(fetcher, template, Some(context.sample_rate()));
        let settings = config.playback().settings()?;

        info!(
            device = context.name(),
            samples = template,
            "Starting session."
        );
        Ok(Session::with_parts(context, ended_rx, loader, settings, driver))
    }

    /// Starts a session from already built parts.
    pub fn with_parts<F: Fetch>(
        context: Arc<AudioContext>,
        ended_rx: EndedReceiver,
        loader: SampleLoader<F>,
        settings: PlaybackSettings,
        driver: Arc<dyn Driver>,
    ) -> Session {
        let notes = NoteMap::standard();
        let (status_tx, status) = watch::channel(EngineStatus::default());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (loaded_tx, loaded_rx) = oneshot::channel();

        tokio::spawn(
            async move {
                let samples = loader.load_all(&notes).await;
                // The controller may already be gone.
                let _ = loaded_tx.send(samples);
            }
            .instrument(info_span!("sample loader")),
        );

        let controller = Controller::new(SampleEngine::new(context, settings), notes, status_tx);
        let controller = tokio::spawn(
            controller
                .run(events_rx, ended_rx, loaded_rx)
                .instrument(info_span!("controller")),
        );
        let driver = driver.monitor_events(events_tx.clone());

        Session {
            notes,
            events_tx,
            status,
            controller: Some(controller),
            driver: Some(driver),
        }
    }

    /// The key to note mapping in use.
    pub fn notes(&self) -> NoteMap {
        self.notes
    }

    /// The latest engine status.
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified whenever the status changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Waits for the controller to finish (the driver asked to quit), then for
    /// the driver. Returns immediately once the session has been joined.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        if let Some(controller) = self.controller.take() {
            controller.await?;
        }

        if let Some(driver) = self.driver.take() {
            match driver.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(err = %e, "Input driver failed"),
                Err(e) => error!(err = %e, "Error waiting for input driver to stop"),
            }
        }
        Ok(())
    }

    /// Asks the controller to stop, which stops every voice, removes the
    /// listeners and closes the audio context, and waits for it.
    pub async fn shutdown(mut self) -> Result<(), JoinError> {
        // A closed channel means the controller already stopped.
        let _ = self.events_tx.send(Event::Quit).await;
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::time::Duration;

    use serial_test::serial;

    use super::*;
    use crate::audio::{mock, ContextState};
    use crate::notes::KeyId;
    use crate::testutil::{eventually_async, wav_bytes, ChannelDriver, StaticFetcher};

    const TEMPLATE: &str = "https://samples.test/{note}{octave}.wav";

    fn key(k: &str) -> KeyId {
        KeyId::from_key(k).unwrap()
    }

    /// Serves one second of full-scale audio for every note except `skip`.
    fn fetcher(context: &AudioContext, skip: &[&str]) -> StaticFetcher {
        let layout = SampleLoader::new(StaticFetcher::default(), TEMPLATE, None);
        let mut fetcher = StaticFetcher::default();
        let rate = context.sample_rate();
        for (_, note) in NoteMap::standard().iter() {
            if !skip.contains(&note.to_string().as_str()) {
                fetcher.insert(
                    &layout.location(note),
                    wav_bytes(&vec![0.9; rate as usize], 1, rate),
                );
            }
        }
        fetcher
    }

    async fn wait_for<F>(session: &Session, predicate: F, error_msg: &str)
    where
        F: Fn(&EngineStatus) -> bool,
    {
        eventually_async(
            || {
                let done = predicate(&session.status());
                async move { done }
            },
            error_msg,
        )
        .await;
    }

    fn key_down(key: &str) -> Event {
        Event::KeyDown {
            key: key.to_string(),
            repeat: false,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_play_and_release() -> Result<(), Box<dyn Error>> {
        let (context, ended_rx) = mock::open("mock")?;
        let loader = SampleLoader::new(fetcher(&context, &[]), TEMPLATE, Some(context.sample_rate()));
        let (driver, input) = ChannelDriver::new();
        let session = Session::with_parts(
            context.clone(),
            ended_rx,
            loader,
            PlaybackSettings::default(),
            driver,
        );
        assert_eq!(session.notes().len(), 20);

        wait_for(&session, |status| status.ready, "Samples never loaded").await;
        assert_eq!(session.status().samples, 20);
        assert_eq!(context.state(), ContextState::Running);

        input.send(key_down("q"))?;
        wait_for(
            &session,
            |status| status.pressed == vec![key("q")] && status.voices == 1,
            "Key q never sounded",
        )
        .await;

        // Nominal gain on a full scale sample that plays from its start offset.
        let output = context.render_offline(64)?;
        assert!((output[0] - 0.45).abs() < 1e-3);

        input.send(Event::KeyUp {
            key: "q".to_string(),
        })?;
        wait_for(&session, |status| status.pressed.is_empty(), "Key q never released").await;

        let release_frames = context.frames_for(Duration::from_millis(100)) as usize;
        let output = context.render_offline(release_frames + 64)?;
        let tail = &output[2 * release_frames..];
        assert!(tail.iter().all(|sample| *sample == 0.0));
        wait_for(&session, |status| status.voices == 0, "Voice never ended").await;

        drop(input);
        session.shutdown().await?;
        assert_eq!(context.state(), ContextState::Closed);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_missing_sample_is_silent() -> Result<(), Box<dyn Error>> {
        let (context, ended_rx) = mock::open("mock")?;
        let loader = SampleLoader::new(fetcher(&context, &["D4"]), TEMPLATE, None);
        let (driver, input) = ChannelDriver::new();
        let session = Session::with_parts(
            context.clone(),
            ended_rx,
            loader,
            PlaybackSettings::default(),
            driver,
        );
        wait_for(&session, |status| status.ready, "Samples never loaded").await;
        assert_eq!(session.status().samples, 19);

        input.send(key_down("w"))?;
        input.send(key_down("q"))?;
        wait_for(
            &session,
            |status| status.pressed == vec![key("q"), key("w")],
            "Keys never pressed",
        )
        .await;
        // Only q has a sample.
        assert_eq!(session.status().voices, 1);

        drop(input);
        session.shutdown().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_quit_from_driver_ends_session() -> Result<(), Box<dyn Error>> {
        let (context, ended_rx) = mock::open("mock")?;
        let loader = SampleLoader::new(StaticFetcher::default(), TEMPLATE, None);
        let (driver, input) = ChannelDriver::new();
        let mut session = Session::with_parts(
            context.clone(),
            ended_rx,
            loader,
            PlaybackSettings::default(),
            driver,
        );

        input.send(Event::Quit)?;
        drop(input);
        session.join().await?;
        assert_eq!(context.state(), ContextState::Closed);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn test_shutdown_after_join() -> Result<(), Box<dyn Error>> {
        let (context, ended_rx) = mock::open("mock")?;
        let loader = SampleLoader::new(StaticFetcher::default(), TEMPLATE, None);
        let (driver, input) = ChannelDriver::new();
        let mut session = Session::with_parts(
            context.clone(),
            ended_rx,
            loader,
            PlaybackSettings::default(),
            driver,
        );

        input.send(Event::Quit)?;
        drop(input);
        session.join().await?;
        session.join().await?;
        session.shutdown().await?;
        assert_eq!(context.state(), ContextState::Closed);
        Ok(())
    }
}
