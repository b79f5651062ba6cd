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

//! Registrations of the components that want host input events.
//!
//! Installing a listener returns a guard; the listener stays registered until
//! the guard is dropped.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::EventKind;

/// A component that can receive host events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listener {
    /// The key-event state machine.
    KeyInput,
    /// The activation gate's one-shot gesture listener.
    Activation,
}

struct Registration {
    id: u64,
    listener: Listener,
    kinds: Vec<EventKind>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    registrations: Vec<Registration>,
}

/// The set of installed listeners.
#[derive(Clone, Default)]
pub struct Listeners {
    registry: Arc<Mutex<Registry>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for the given kinds of event.
    #[must_use = "the listener is removed when the guard is dropped"]
    pub fn install(&self, listener: Listener, kinds: &[EventKind]) -> ListenerGuard {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.registrations.push(Registration {
            id,
            listener,
            kinds: kinds.to_vec(),
        });
        debug!(listener = ?listener, kinds = ?kinds, "Listener installed");

        ListenerGuard {
            id,
            listener,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// The listeners registered for `kind`, in installation order.
    pub fn targets(&self, kind: EventKind) -> Vec<Listener> {
        self.registry
            .lock()
            .registrations
            .iter()
            .filter(|registration| registration.kinds.contains(&kind))
            .map(|registration| registration.listener)
            .collect()
    }

    pub fn is_installed(&self, listener: Listener) -> bool {
        self.registry
            .lock()
            .registrations
            .iter()
            .any(|registration| registration.listener == listener)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its listener when dropped.
pub struct ListenerGuard {
    id: u64,
    listener: Listener,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .registrations
                .retain(|registration| registration.id != self.id);
            debug!(listener = ?self.listener, "Listener removed");
        }
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("id", &self.id)
            .field("listener", &self.listener)
            .finish()
    }
}
