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

//! Routes host input to the engine.
//!
//! The controller owns the key state machine, the sample engine and the
//! activation gate, and runs as a single task: host events, voice end reports
//! and the finished sample load are all handled in arrival order on it.

use std::io;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{ActivationGate, EndedReceiver};
use crate::notes::{KeyId, NoteMap};
use crate::samples::{SampleEngine, SampleSet, VoiceId};

use self::keys::KeyStateMachine;
use self::listeners::{Listener, ListenerGuard, Listeners};

pub mod keys;
pub mod listeners;
pub mod terminal;

/// Input from the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A key went down. `repeat` is set for auto-repeat.
    KeyDown { key: String, repeat: bool },
    /// A key came up.
    KeyUp { key: String },
    Click,
    TouchStart,
    /// The input surface lost focus; no key-up will follow for held keys.
    FocusLost,
    /// The user asked to leave.
    Quit,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::KeyDown { .. } => EventKind::KeyDown,
            Event::KeyUp { .. } => EventKind::KeyUp,
            Event::Click => EventKind::Click,
            Event::TouchStart => EventKind::TouchStart,
            Event::FocusLost => EventKind::FocusLost,
            Event::Quit => EventKind::Quit,
        }
    }
}

/// The kind of an [`Event`], used to register listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    Click,
    TouchStart,
    FocusLost,
    Quit,
}

/// A source of host events.
pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: mpsc::Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// What a presentation layer needs to draw the keyboard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStatus {
    /// Samples have finished loading.
    pub ready: bool,
    /// Keys with a loaded sample.
    pub samples: usize,
    /// Keys currently held, in key order.
    pub pressed: Vec<KeyId>,
    /// Voices still sounding.
    pub voices: usize,
}

const KEY_INPUT_EVENTS: [EventKind; 3] = [EventKind::KeyDown, EventKind::KeyUp, EventKind::FocusLost];

/// The engine task's state.
pub struct Controller {
    keys: KeyStateMachine,
    engine: SampleEngine,
    gate: ActivationGate,
    listeners: Listeners,
    key_input: Option<ListenerGuard>,
    ready: bool,
    status: watch::Sender<EngineStatus>,
}

impl Controller {
    /// Creates a controller and installs the key input listener. Keys are
    /// tracked right away but stay silent until samples are loaded.
    pub fn new(engine: SampleEngine, notes: NoteMap, status: watch::Sender<EngineStatus>) -> Self {
        let listeners = Listeners::new();
        let key_input = listeners.install(Listener::KeyInput, &KEY_INPUT_EVENTS);
        let gate = ActivationGate::new(engine.context().clone());

        Self {
            keys: KeyStateMachine::new(notes),
            engine,
            gate,
            listeners,
            key_input: Some(key_input),
            ready: false,
            status,
        }
    }

    /// Dispatches one host event to the listeners registered for it. Returns
    /// false when the event asks the controller to stop.
    pub fn handle_event(&mut self, event: &Event) -> bool {
        if event.kind() == EventKind::Quit {
            info!("Quit requested.");
            return false;
        }

        for listener in self.listeners.targets(event.kind()) {
            match listener {
                Listener::Activation => self.gate.on_gesture(),
                Listener::KeyInput => self.handle_key_input(event),
            }
        }
        self.publish();
        true
    }

    fn handle_key_input(&mut self, event: &Event) {
        match event {
            Event::KeyDown { key, repeat } => {
                self.keys.key_down(key, *repeat, &mut self.engine);
            }
            Event::KeyUp { key } => {
                self.keys.key_up(key, &mut self.engine);
            }
            Event::FocusLost => {
                let released = self.keys.release_all(&mut self.engine);
                if !released.is_empty() {
                    debug!(keys = ?released, "Released held keys on focus loss");
                }
            }
            _ => {}
        }
    }

    /// Installs the loaded samples, marks the controller ready and unlocks
    /// audio output.
    pub fn samples_loaded(&mut self, samples: SampleSet) {
        let missing = samples.missing(self.keys.notes());
        if !missing.is_empty() {
            warn!(keys = ?missing, "Some keys have no sample and will be silent");
        }

        self.engine.set_samples(samples);
        self.ready = true;
        self.gate.arm(&self.listeners);
        self.publish();
        info!(samples = self.engine.samples().len(), "Ready to play.");
    }

    /// Hands a voice end report from the render side to the engine.
    pub fn voice_ended(&mut self, id: VoiceId) {
        self.engine.voice_ended(id);
        self.publish();
    }

    /// Removes all listeners, stops every voice and closes the audio context.
    pub fn shutdown(&mut self) {
        self.key_input = None;
        self.gate.disarm();
        self.keys.release_all(&mut self.engine);
        self.engine.stop_all();
        self.engine.context().close();
        self.publish();
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            ready: self.ready,
            samples: self.engine.samples().len(),
            pressed: self.keys.pressed().collect(),
            voices: self.engine.active_voice_count(),
        }
    }

    pub fn engine(&self) -> &SampleEngine {
        &self.engine
    }

    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    fn publish(&self) {
        self.status.send_replace(self.status());
    }

    /// Runs until a quit event arrives or every event sender is gone, then
    /// shuts down.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<Event>,
        mut ended_rx: EndedReceiver,
        mut loaded: oneshot::Receiver<SampleSet>,
    ) {
        info!("Controller started.");
        self.publish();

        let mut loading = true;
        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => {
                        if !self.handle_event(&event) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(id) = ended_rx.recv() => self.voice_ended(id),
                samples = &mut loaded, if loading => {
                    loading = false;
                    match samples {
                        Ok(samples) => self.samples_loaded(samples),
                        Err(_) => warn!("Sample loader stopped before finishing"),
                    }
                }
            }
        }

        self.shutdown();
        info!("Controller closing.");
    }
}
