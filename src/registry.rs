//! Window registry.
//!
//! Tracks every live window replica in registration order, owns the
//! per-replica message channels, and implements primary promotion as an
//! explicit operation rather than a side effect of a close handler.

use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::commands::SyncEvent;

/// Opaque window identity, stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(u64);

/// Last known window placement. Mutated only by the lifecycle manager
/// when a window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Messages delivered to a window replica's shell.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowMessage {
    /// Navigate to a deep-link target (scheme already stripped).
    OpenUrl(String),
    /// Restore the window if minimized.
    Restore,
    /// Give the window input focus.
    Focus,
    /// A mutation committed in another window.
    Sync(SyncEvent),
}

/// One live window of the application.
pub struct WindowReplica {
    pub id: WindowId,
    pub is_primary: bool,
    pub bounds: WindowBounds,
    pub maximized: bool,
    sender: Sender<WindowMessage>,
}

impl WindowReplica {
    /// Best-effort send; a replica whose receiver is gone is skipped.
    pub fn send(&self, message: WindowMessage) {
        if self.sender.send(message).is_err() {
            tracing::debug!(window = self.id.0, "dropping message for closed window");
        }
    }
}

/// All live replicas, oldest first.
#[derive(Default)]
pub struct WindowRegistry {
    windows: Vec<WindowReplica>,
    next_id: u64,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new replica. The first replica is always primary; a
    /// later `primary` registration takes the role over from the current
    /// holder.
    pub fn register(
        &mut self,
        primary: bool,
        bounds: WindowBounds,
        maximized: bool,
    ) -> (WindowId, Receiver<WindowMessage>) {
        let id = WindowId(self.next_id);
        self.next_id += 1;

        let primary = primary || self.windows.is_empty();
        if primary {
            for window in &mut self.windows {
                window.is_primary = false;
            }
        }

        let (sender, receiver) = unbounded();
        self.windows.push(WindowReplica {
            id,
            is_primary: primary,
            bounds,
            maximized,
            sender,
        });
        (id, receiver)
    }

    /// Remove a replica. If the removed replica was primary and others
    /// remain, the oldest remaining replica is promoted, keeping exactly
    /// one primary among live replicas.
    pub fn remove(&mut self, id: WindowId) -> Option<WindowReplica> {
        let index = self.windows.iter().position(|window| window.id == id)?;
        let removed = self.windows.remove(index);

        if removed.is_primary {
            if let Some(oldest) = self.windows.first_mut() {
                oldest.is_primary = true;
                tracing::info!(window = oldest.id.0, "primary transferred");
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowReplica> {
        self.windows.iter().find(|window| window.id == id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowReplica> {
        self.windows.iter_mut().find(|window| window.id == id)
    }

    pub fn primary(&self) -> Option<&WindowReplica> {
        self.windows.iter().find(|window| window.is_primary)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Send a sync event to every replica except the originator.
    pub fn broadcast_except(&self, origin: WindowId, event: &SyncEvent) {
        for window in self.windows.iter().filter(|window| window.id != origin) {
            window.send(WindowMessage::Sync(event.clone()));
        }
    }

    pub fn send_to(&self, id: WindowId, message: WindowMessage) {
        if let Some(window) = self.get(id) {
            window.send(message);
        }
    }
}
