//! Window lifecycle management.
//!
//! Creates and destroys window replicas, restores persisted placement for
//! the first window of the process lifetime, persists placement when the
//! last window closes, and rebuilds the application menu whenever a new
//! window takes over as primary.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::menu::{self, AppMenu};
use crate::registry::{WindowBounds, WindowId, WindowMessage, WindowRegistry};
use crate::store::StoreAdapter;
use crate::Platform;

use crossbeam::channel::Receiver;

pub const DEFAULT_WINDOW_WIDTH: u32 = 1200;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 800;

/// Connected display probe, supplied by the UI shell.
pub trait DisplayTopology: Send + Sync {
    fn display_widths(&self) -> Vec<u32>;
}

/// Fixed display widths; the fallback when no shell-provided probe exists.
pub struct StaticDisplays(pub Vec<u32>);

impl DisplayTopology for StaticDisplays {
    fn display_widths(&self) -> Vec<u32> {
        self.0.clone()
    }
}

/// Persisted window placement, stored alongside the settings collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PersistedBounds {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    #[serde(default)]
    maximized: bool,
}

pub struct WindowManager {
    store: Arc<dyn StoreAdapter>,
    registry: Arc<Mutex<WindowRegistry>>,
    displays: Box<dyn DisplayTopology>,
    platform: Platform,
    menu: Option<AppMenu>,
    restored_initial_bounds: bool,
}

impl WindowManager {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        registry: Arc<Mutex<WindowRegistry>>,
        displays: Box<dyn DisplayTopology>,
        platform: Platform,
    ) -> Self {
        Self {
            store,
            registry,
            displays,
            platform,
            menu: None,
            restored_initial_bounds: false,
        }
    }

    /// Create a window replica. Only the first window of the process
    /// lifetime attempts to restore persisted placement; a persisted
    /// position is accepted only when the summed width of all connected
    /// displays still reaches its x offset, so a window never reappears on
    /// a display that has since been disconnected.
    pub fn create_window(
        &mut self,
        replace_primary: bool,
    ) -> Result<(WindowId, Receiver<WindowMessage>), StoreError> {
        let mut bounds = WindowBounds {
            x: 0,
            y: 0,
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
        };
        let mut maximized = false;

        if !self.restored_initial_bounds {
            self.restored_initial_bounds = true;
            if let Some(value) = self.store.window_bounds()? {
                match serde_json::from_value::<PersistedBounds>(value) {
                    Ok(persisted) => {
                        let summed_width: i64 = self
                            .displays
                            .display_widths()
                            .iter()
                            .map(|width| i64::from(*width))
                            .sum();
                        if summed_width >= i64::from(persisted.x) {
                            bounds = WindowBounds {
                                x: persisted.x,
                                y: persisted.y,
                                width: persisted.width,
                                height: persisted.height,
                            };
                        } else {
                            tracing::info!(
                                x = persisted.x,
                                summed_width,
                                "persisted position off-screen, using default bounds"
                            );
                        }
                        // Maximized overrides whatever bounds were chosen.
                        maximized = persisted.maximized;
                    }
                    Err(error) => {
                        tracing::warn!(%error, "ignoring unreadable bounds document");
                    }
                }
            }
        }

        let (id, receiver) = self
            .registry
            .lock()
            .register(replace_primary, bounds, maximized);

        if replace_primary {
            // Full replacement, never an append: building twice yields the
            // same structure.
            self.menu = Some(menu::build_menu(self.platform));
        }

        tracing::info!(window = ?id, replace_primary, "window created");
        Ok((id, receiver))
    }

    /// Record the closing window's placement. Only the last live replica
    /// persists its geometry as the baseline for the next process start.
    pub fn on_window_close(
        &self,
        id: WindowId,
        bounds: WindowBounds,
        maximized: bool,
    ) -> Result<(), StoreError> {
        let mut registry = self.registry.lock();
        if let Some(window) = registry.get_mut(id) {
            window.bounds = bounds;
            window.maximized = maximized;
        }
        if registry.len() != 1 {
            return Ok(());
        }
        drop(registry);

        let value = serde_json::to_value(PersistedBounds {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            maximized,
        })?;
        self.store.save_window_bounds(value)
    }

    /// Drop a destroyed window from the registry. Primary promotion, when
    /// needed, happens inside the registry. Returns the number of
    /// replicas still alive.
    pub fn on_window_destroyed(&self, id: WindowId) -> usize {
        let mut registry = self.registry.lock();
        registry.remove(id);
        registry.len()
    }

    pub fn menu(&self) -> Option<&AppMenu> {
        self.menu.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use serde_json::json;

    fn manager_with(
        store: Arc<dyn StoreAdapter>,
        displays: Vec<u32>,
    ) -> (WindowManager, Arc<Mutex<WindowRegistry>>) {
        let registry = Arc::new(Mutex::new(WindowRegistry::new()));
        let manager = WindowManager::new(
            store,
            registry.clone(),
            Box::new(StaticDisplays(displays)),
            Platform::Linux,
        );
        (manager, registry)
    }

    fn store_with_bounds(value: serde_json::Value) -> (tempfile::TempDir, Arc<JsonFileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        store.save_window_bounds(value).unwrap();
        (dir, store)
    }

    #[test]
    fn test_persisted_bounds_applied_when_on_screen() {
        let (_dir, store) = store_with_bounds(json!({
            "x": 1500, "y": 20, "width": 900, "height": 700, "maximized": false
        }));
        let (mut manager, registry) = manager_with(store, vec![1920, 1920]);

        let (id, _rx) = manager.create_window(true).unwrap();
        let registry = registry.lock();
        let window = registry.get(id).unwrap();
        assert_eq!(
            window.bounds,
            WindowBounds {
                x: 1500,
                y: 20,
                width: 900,
                height: 700
            }
        );
    }

    #[test]
    fn test_offscreen_bounds_fall_back_to_default() {
        let (_dir, store) = store_with_bounds(json!({
            "x": 4000, "y": 20, "width": 900, "height": 700
        }));
        let (mut manager, registry) = manager_with(store, vec![1920]);

        let (id, _rx) = manager.create_window(true).unwrap();
        let registry = registry.lock();
        let window = registry.get(id).unwrap();
        assert_eq!(window.bounds.width, DEFAULT_WINDOW_WIDTH);
        assert_eq!(window.bounds.height, DEFAULT_WINDOW_HEIGHT);
        assert_eq!(window.bounds.x, 0);
    }

    #[test]
    fn test_persisted_maximized_overrides_bounds() {
        let (_dir, store) = store_with_bounds(json!({
            "x": 100, "y": 20, "width": 900, "height": 700, "maximized": true
        }));
        let (mut manager, registry) = manager_with(store, vec![1920]);

        let (id, _rx) = manager.create_window(true).unwrap();
        assert!(registry.lock().get(id).unwrap().maximized);
    }

    #[test]
    fn test_only_first_window_restores_bounds() {
        let (_dir, store) = store_with_bounds(json!({
            "x": 100, "y": 20, "width": 900, "height": 700
        }));
        let (mut manager, registry) = manager_with(store, vec![1920]);

        let (_first, _rx1) = manager.create_window(true).unwrap();
        let (second, _rx2) = manager.create_window(false).unwrap();
        let registry = registry.lock();
        assert_eq!(
            registry.get(second).unwrap().bounds.width,
            DEFAULT_WINDOW_WIDTH
        );
    }

    #[test]
    fn test_menu_rebuild_does_not_duplicate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let (mut manager, _registry) = manager_with(store, vec![1920]);

        manager.create_window(true).unwrap();
        let first = manager.menu().unwrap().clone();
        manager.create_window(true).unwrap();
        assert_eq!(manager.menu().unwrap(), &first);
    }

    #[test]
    fn test_secondary_window_does_not_rebuild_menu() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let (mut manager, _registry) = manager_with(store, vec![1920]);

        manager.create_window(false).unwrap();
        assert!(manager.menu().is_none());
    }

    #[test]
    fn test_only_last_window_persists_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let (mut manager, _registry) = manager_with(store.clone(), vec![1920]);

        let (first, _rx1) = manager.create_window(true).unwrap();
        let (second, _rx2) = manager.create_window(false).unwrap();

        let closed = WindowBounds {
            x: 5,
            y: 6,
            width: 700,
            height: 500,
        };
        // Two windows alive: closing one must not persist.
        manager.on_window_close(first, closed, false).unwrap();
        assert!(store.window_bounds().unwrap().is_none());
        manager.on_window_destroyed(first);

        // Now it is the last one.
        manager.on_window_close(second, closed, true).unwrap();
        let value = store.window_bounds().unwrap().unwrap();
        assert_eq!(value["x"], json!(5));
        assert_eq!(value["maximized"], json!(true));
    }
}
