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

//! Keyboard and mouse input from a raw-mode terminal.
//!
//! Terminals that support the kitty keyboard protocol report key presses,
//! repeats and releases. Elsewhere only presses arrive, so a key is held while
//! presses keep coming (auto-repeat) and released once none has arrived for
//! the hold timeout.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
    KeyCode, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags, MouseEventKind,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info, span, Level};

use super::Event;

/// Longest wait for terminal input before checking hold timeouts and whether
/// the controller is still listening.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reads input from the controlling terminal.
pub struct Driver {
    hold_timeout: Duration,
}

impl Driver {
    pub fn new(hold_timeout: Duration) -> Driver {
        Driver { hold_timeout }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let hold_timeout = self.hold_timeout;
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "terminal driver");
            let _enter = span.enter();

            let terminal = RawTerminal::enable()?;
            let mut holds = (!terminal.enhanced()).then(|| HoldTracker::new(hold_timeout));
            info!(enhanced = terminal.enhanced(), "Terminal driver started.");

            loop {
                let wait = holds
                    .as_ref()
                    .and_then(|holds| holds.next_deadline())
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                    .map_or(POLL_INTERVAL, |wait| wait.min(POLL_INTERVAL));

                let mut events = Vec::new();
                if event::poll(wait)? {
                    if let Some(event) = translate(&event::read()?) {
                        match holds.as_mut() {
                            Some(holds) => events.extend(holds.observe(event, Instant::now())),
                            None => events.push(event),
                        }
                    }
                }
                if let Some(holds) = holds.as_mut() {
                    events.extend(holds.expire(Instant::now()));
                }

                for event in events {
                    let quit = event == Event::Quit;
                    if events_tx.blocking_send(event).is_err() || quit {
                        return Ok(());
                    }
                }
                if events_tx.is_closed() {
                    return Ok(());
                }
            }
        })
    }
}

/// Maps a terminal event to a host event. Escape and Ctrl-C quit.
pub fn translate(event: &event::Event) -> Option<Event> {
    match event {
        event::Event::Key(key) => {
            if key.code == KeyCode::Esc
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
            {
                return (key.kind == KeyEventKind::Press).then_some(Event::Quit);
            }

            let KeyCode::Char(c) = key.code else {
                return None;
            };
            let key_name = c.to_string();
            Some(match key.kind {
                KeyEventKind::Press => Event::KeyDown {
                    key: key_name,
                    repeat: false,
                },
                KeyEventKind::Repeat => Event::KeyDown {
                    key: key_name,
                    repeat: true,
                },
                KeyEventKind::Release => Event::KeyUp { key: key_name },
            })
        }
        event::Event::Mouse(mouse) if matches!(mouse.kind, MouseEventKind::Down(_)) => {
            Some(Event::Click)
        }
        event::Event::FocusLost => Some(Event::FocusLost),
        _ => None,
    }
}

/// Synthesizes repeats and key-ups for terminals that only report presses.
#[derive(Debug)]
pub struct HoldTracker {
    timeout: Duration,
    /// Last press of each held key.
    last_press: HashMap<String, Instant>,
}

impl HoldTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_press: HashMap::new(),
        }
    }

    /// Passes an event through, marking presses of held keys as repeats.
    pub fn observe(&mut self, event: Event, now: Instant) -> Vec<Event> {
        match event {
            Event::KeyDown { key, .. } => {
                let key = key.to_lowercase();
                let repeat = self.last_press.insert(key.clone(), now).is_some();
                vec![Event::KeyDown { key, repeat }]
            }
            Event::KeyUp { key } => {
                let key = key.to_lowercase();
                self.last_press.remove(&key);
                vec![Event::KeyUp { key }]
            }
            Event::FocusLost => {
                self.last_press.clear();
                vec![Event::FocusLost]
            }
            other => vec![other],
        }
    }

    /// Releases every key not pressed within the timeout, in key order.
    pub fn expire(&mut self, now: Instant) -> Vec<Event> {
        let mut expired: Vec<String> = self
            .last_press
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= self.timeout)
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();

        for key in expired.iter() {
            self.last_press.remove(key);
        }
        expired.into_iter().map(|key| Event::KeyUp { key }).collect()
    }

    /// When the next key will expire, if any are held.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_press.values().min().map(|last| *last + self.timeout)
    }
}

/// Raw mode with mouse, focus and (when supported) key release reporting.
/// Restores the terminal when dropped.
struct RawTerminal {
    enhanced: bool,
}

impl RawTerminal {
    fn enable() -> Result<RawTerminal, io::Error> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnableMouseCapture, EnableFocusChange)?;

        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )?;
        }
        Ok(RawTerminal { enhanced })
    }

    fn enhanced(&self) -> bool {
        self.enhanced
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        if self.enhanced {
            let _ = execute!(stdout, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(stdout, DisableFocusChange, DisableMouseCapture);
        let _ = stdout.flush();
        if let Err(e) = terminal::disable_raw_mode() {
            debug!(err = %e, "Unable to leave raw mode");
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyEvent, MouseButton, MouseEvent};

    use super::*;

    fn key_event(code: KeyCode, modifiers: KeyModifiers, kind: KeyEventKind) -> event::Event {
        event::Event::Key(KeyEvent::new_with_kind(code, modifiers, kind))
    }

    fn key_down(key: &str, repeat: bool) -> Event {
        Event::KeyDown {
            key: key.to_string(),
            repeat,
        }
    }

    #[test]
    fn test_translate_keys() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            translate(&key_event(KeyCode::Char('q'), none, KeyEventKind::Press)),
            Some(key_down("q", false))
        );
        assert_eq!(
            translate(&key_event(KeyCode::Char('q'), none, KeyEventKind::Repeat)),
            Some(key_down("q", true))
        );
        assert_eq!(
            translate(&key_event(KeyCode::Char('q'), none, KeyEventKind::Release)),
            Some(Event::KeyUp {
                key: "q".to_string()
            })
        );
        assert_eq!(
            translate(&key_event(KeyCode::Enter, none, KeyEventKind::Press)),
            None
        );
    }

    #[test]
    fn test_translate_quit() {
        assert_eq!(
            translate(&key_event(KeyCode::Esc, KeyModifiers::NONE, KeyEventKind::Press)),
            Some(Event::Quit)
        );
        assert_eq!(
            translate(&key_event(KeyCode::Esc, KeyModifiers::NONE, KeyEventKind::Release)),
            None
        );
        assert_eq!(
            translate(&key_event(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL,
                KeyEventKind::Press
            )),
            Some(Event::Quit)
        );
    }

    #[test]
    fn test_translate_mouse_and_focus() {
        let click = event::Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        });
        let moved = event::Event::Mouse(MouseEvent {
            kind: MouseEventKind::Moved,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        });

        assert_eq!(translate(&click), Some(Event::Click));
        assert_eq!(translate(&moved), None);
        assert_eq!(translate(&event::Event::FocusLost), Some(Event::FocusLost));
    }

    #[test]
    fn test_hold_tracker_marks_auto_repeat() {
        let start = Instant::now();
        let mut holds = HoldTracker::new(Duration::from_millis(600));

        assert_eq!(
            holds.observe(key_down("q", false), start),
            vec![key_down("q", false)]
        );
        assert_eq!(
            holds.observe(key_down("Q", false), start + Duration::from_millis(500)),
            vec![key_down("q", true)]
        );
        assert_eq!(
            holds.next_deadline(),
            Some(start + Duration::from_millis(1100))
        );
    }

    #[test]
    fn test_hold_tracker_releases_after_timeout() {
        let start = Instant::now();
        let mut holds = HoldTracker::new(Duration::from_millis(600));
        holds.observe(key_down("w", false), start);
        holds.observe(key_down("q", false), start + Duration::from_millis(100));

        assert!(holds.expire(start + Duration::from_millis(599)).is_empty());
        assert_eq!(
            holds.expire(start + Duration::from_millis(650)),
            vec![Event::KeyUp {
                key: "w".to_string()
            }]
        );
        assert_eq!(
            holds.expire(start + Duration::from_millis(700)),
            vec![Event::KeyUp {
                key: "q".to_string()
            }]
        );
        assert_eq!(holds.next_deadline(), None);

        // Pressing again after the release starts a fresh note.
        assert_eq!(
            holds.observe(key_down("q", false), start + Duration::from_millis(800)),
            vec![key_down("q", false)]
        );
    }
}
