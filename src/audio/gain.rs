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

//! Gain automation on the context clock.
//!
//! A timeline of value changes keyed by frame, evaluated the way Web Audio
//! evaluates an `AudioParam`: set-value events hold their value from their
//! frame on, and an exponential ramp event interpolates from the previous
//! event's value to its own value, reaching it exactly at its frame.

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AutomationError {
    #[error("exponential ramp target must be finite and non-zero, got {0}")]
    InvalidRampTarget(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Event {
    SetValue { frame: u64, value: f32 },
    ExponentialRamp { frame: u64, value: f32 },
}

impl Event {
    fn frame(&self) -> u64 {
        match self {
            Event::SetValue { frame, .. } | Event::ExponentialRamp { frame, .. } => *frame,
        }
    }

    fn value(&self) -> f32 {
        match self {
            Event::SetValue { value, .. } | Event::ExponentialRamp { value, .. } => *value,
        }
    }
}

/// The automated gain of one voice.
#[derive(Clone, Debug)]
pub struct GainAutomation {
    /// Value before the first event.
    initial: f32,
    /// Events sorted by frame; events on the same frame keep insertion order.
    events: Vec<Event>,
}

impl GainAutomation {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    /// Holds `value` from `frame` on.
    pub fn set_value_at(&mut self, frame: u64, value: f32) {
        self.insert(Event::SetValue { frame, value });
    }

    /// Ramps exponentially from the preceding value so that `value` is reached
    /// at `frame`. Exponential curves cannot reach zero, so zero is rejected.
    pub fn exponential_ramp_to(&mut self, frame: u64, value: f32) -> Result<(), AutomationError> {
        if value == 0.0 || !value.is_finite() {
            return Err(AutomationError::InvalidRampTarget(value));
        }
        self.insert(Event::ExponentialRamp { frame, value });
        Ok(())
    }

    /// Drops every event at or after `frame`.
    pub fn cancel_from(&mut self, frame: u64) {
        self.events.retain(|event| event.frame() < frame);
    }

    /// The gain at the given frame.
    pub fn value_at(&self, frame: u64) -> f32 {
        let next = self.events.partition_point(|event| event.frame() <= frame);
        let (start_frame, start_value) = match next.checked_sub(1) {
            Some(prev) => (self.events[prev].frame(), self.events[prev].value()),
            None => (0, self.initial),
        };

        match self.events.get(next) {
            Some(Event::ExponentialRamp {
                frame: end_frame,
                value: end_value,
            }) => exponential(start_frame, start_value, *end_frame, *end_value, frame),
            _ => start_value,
        }
    }

    fn insert(&mut self, event: Event) {
        let index = self
            .events
            .partition_point(|existing| existing.frame() <= event.frame());
        self.events.insert(index, event);
    }
}

/// Exponential interpolation between two points. A zero start or a sign change
/// cannot be interpolated exponentially; the start value holds until the end.
fn exponential(start_frame: u64, start: f32, end_frame: u64, end: f32, frame: u64) -> f32 {
    if start == 0.0 || start.signum() != end.signum() || end_frame <= start_frame {
        return start;
    }

    let progress = (frame - start_frame) as f64 / (end_frame - start_frame) as f64;
    (start as f64 * (end as f64 / start as f64).powf(progress)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {} to be close to {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_initial_value_holds() {
        let gain = GainAutomation::new(0.5);
        assert_eq!(gain.value_at(0), 0.5);
        assert_eq!(gain.value_at(1_000_000), 0.5);
    }

    #[test]
    fn test_set_value_at() {
        let mut gain = GainAutomation::new(1.0);
        gain.set_value_at(100, 0.25);

        assert_eq!(gain.value_at(99), 1.0);
        assert_eq!(gain.value_at(100), 0.25);
        assert_eq!(gain.value_at(500), 0.25);
    }

    #[test]
    fn test_exponential_ramp() {
        let mut gain = GainAutomation::new(0.5);
        gain.set_value_at(1000, 0.5);
        gain.exponential_ramp_to(2000, 0.001).unwrap();

        assert_close(gain.value_at(1000), 0.5);
        // Halfway through an exponential ramp is the geometric mean.
        assert_close(gain.value_at(1500), (0.5f32 * 0.001).sqrt());
        assert_close(gain.value_at(2000), 0.001);
        assert_close(gain.value_at(3000), 0.001);

        // Decays monotonically.
        let values: Vec<f32> = (1000..=2000).step_by(50).map(|f| gain.value_at(f)).collect();
        assert!(values.windows(2).all(|pair| pair[1] < pair[0]));
    }

    #[test]
    fn test_ramp_rejects_zero() {
        let mut gain = GainAutomation::new(0.5);
        assert_eq!(
            gain.exponential_ramp_to(100, 0.0),
            Err(AutomationError::InvalidRampTarget(0.0))
        );
        assert!(gain.exponential_ramp_to(100, f32::NAN).is_err());
        assert_eq!(gain.value_at(100), 0.5);
    }

    #[test]
    fn test_ramp_from_zero_holds() {
        let mut gain = GainAutomation::new(0.0);
        gain.exponential_ramp_to(100, 0.5).unwrap();
        assert_eq!(gain.value_at(50), 0.0);
        assert_eq!(gain.value_at(100), 0.5);
    }

    #[test]
    fn test_cancel_then_ramp_from_snapshot() {
        let mut gain = GainAutomation::new(0.5);
        gain.set_value_at(0, 0.5);
        gain.exponential_ramp_to(1000, 0.001).unwrap();

        // Release again halfway through the first fade.
        let snapshot = gain.value_at(500);
        gain.cancel_from(500);
        gain.set_value_at(500, snapshot);
        gain.exponential_ramp_to(700, 0.001).unwrap();

        assert_close(gain.value_at(500), snapshot);
        assert_close(gain.value_at(700), 0.001);
        assert!(gain.value_at(600) < snapshot);
    }
}
