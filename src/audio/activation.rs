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

//! Unlocking audio output.
//!
//! Output starts suspended. Once samples are ready the gate primes the output
//! (a silent one-frame voice, then resume) and also listens once for a user
//! gesture, priming again when it arrives.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::mixer::VoiceSource;
use super::{AudioContext, AudioError, ContextState};
use crate::controller::listeners::{Listener, ListenerGuard, Listeners};
use crate::controller::EventKind;
use crate::samples::{SampleBuffer, VoiceId};

/// Events that count as a user gesture.
pub const GESTURES: [EventKind; 3] = [EventKind::Click, EventKind::TouchStart, EventKind::KeyDown];

/// Primes and resumes an audio context, once eagerly and once on the first
/// user gesture.
pub struct ActivationGate {
    context: Arc<AudioContext>,
    guard: Option<ListenerGuard>,
    fired: bool,
}

impl ActivationGate {
    pub fn new(context: Arc<AudioContext>) -> Self {
        Self {
            context,
            guard: None,
            fired: false,
        }
    }

    /// Plays a silent one-frame voice and resumes the context. Does nothing
    /// unless the context is suspended.
    pub fn prime(&self) -> Result<(), AudioError> {
        if self.context.state() != ContextState::Suspended {
            return Ok(());
        }

        let at = self.context.current_frame();
        let silence = SampleBuffer::silence(1, 1, self.context.sample_rate());
        self.context
            .start(VoiceSource::new(VoiceId::default(), Arc::new(silence), at, 0, 0.0))?;
        self.context.stop(VoiceId::default(), at + 1)?;
        self.context.resume()?;
        info!("Audio output unlocked");
        Ok(())
    }

    /// Primes immediately and, unless a gesture already fired, installs the
    /// one-shot gesture listener. Errors are logged; the gesture retries.
    pub fn arm(&mut self, listeners: &Listeners) {
        if let Err(e) = self.prime() {
            warn!(err = %e, "Unable to start audio output, waiting for a user gesture");
        }
        if !self.fired && self.guard.is_none() {
            self.guard = Some(listeners.install(Listener::Activation, &GESTURES));
        }
    }

    /// Handles the first user gesture: primes again and removes the listener.
    /// Later calls do nothing.
    pub fn on_gesture(&mut self) {
        if self.fired {
            return;
        }
        self.fired = true;
        self.guard = None;
        debug!("User gesture received");

        if let Err(e) = self.prime() {
            warn!(err = %e, "Unable to start audio output");
        }
    }

    /// Removes the gesture listener without firing.
    pub fn disarm(&mut self) {
        self.guard = None;
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn is_armed(&self) -> bool {
        self.guard.is_some()
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::audio::mock;

    #[test]
    #[serial]
    fn test_prime_resumes_with_silent_voice() {
        let (context, mut ended) = mock::open("mock").unwrap();
        let gate = ActivationGate::new(context.clone());

        gate.prime().unwrap();
        assert_eq!(context.state(), ContextState::Running);

        let output = context.render_offline(16).unwrap();
        assert!(output.iter().all(|sample| *sample == 0.0));
        assert_eq!(ended.try_recv().unwrap(), VoiceId::default());
    }

    #[test]
    #[serial]
    fn test_prime_while_running_is_noop() {
        let (context, mut ended) = mock::open("mock").unwrap();
        context.resume().unwrap();
        let gate = ActivationGate::new(context.clone());

        gate.prime().unwrap();
        context.render_offline(16).unwrap();
        // No priming voice was started.
        assert!(ended.try_recv().is_err());
    }

    #[test]
    #[serial]
    fn test_prime_after_close_is_noop() {
        let (context, _ended) = mock::open("mock").unwrap();
        context.close();
        let gate = ActivationGate::new(context.clone());

        assert!(gate.prime().is_ok());
        assert_eq!(context.state(), ContextState::Closed);
    }

    #[test]
    #[serial]
    fn test_gesture_listener_fires_once() {
        let (context, _ended) = mock::open("mock").unwrap();
        let listeners = Listeners::new();
        let mut gate = ActivationGate::new(context.clone());

        gate.arm(&listeners);
        assert!(gate.is_armed());
        assert_eq!(listeners.targets(EventKind::Click), vec![Listener::Activation]);
        assert_eq!(listeners.targets(EventKind::TouchStart), vec![Listener::Activation]);

        context.suspend().unwrap();
        gate.on_gesture();
        assert!(gate.has_fired());
        assert!(!gate.is_armed());
        assert!(listeners.is_empty());
        assert_eq!(context.state(), ContextState::Running);

        // A fired gate never reinstalls its listener.
        gate.arm(&listeners);
        assert!(listeners.is_empty());
    }
}
