//! Process-scoped orchestration.
//!
//! Owns the state the original design kept in ambient globals: the
//! pending navigation target, the instance lock, the resolved startup
//! configuration, and the wiring between the registry, lifecycle manager,
//! sync bus, and session. Startup order: instance lock, then startup
//! settings (fatal on failure), then the first window, then delivery of
//! any buffered deep link once that window signals ready.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use crate::bus::{DispatchResponse, SyncBus};
use crate::commands::{StoreCommand, WireRequest};
use crate::deeplink::{self, LaunchRequest, LaunchSource};
use crate::error::{DispatchError, StartupError, StoreError};
use crate::lifecycle::{DisplayTopology, WindowManager};
use crate::menu::AppMenu;
use crate::registry::{WindowBounds, WindowId, WindowMessage, WindowRegistry};
use crate::relaunch::{self, RelaunchPlan};
use crate::session::{NetworkSession, CLEARED_STORAGE_KINDS};
use crate::single_instance::InstanceLock;
use crate::startup::{self, StartupSettings};
use crate::store::StoreAdapter;
use crate::Platform;

/// What the process should do after the last window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownAction {
    Quit,
    /// macOS convention: stay resident with zero windows.
    StayResident,
}

pub struct OrchestratorConfig {
    pub dev_mode: bool,
    pub platform: Platform,
    pub data_dir: PathBuf,
    /// Original launch arguments, executable path first.
    pub argv: Vec<String>,
}

pub struct Orchestrator {
    dev_mode: bool,
    platform: Platform,
    argv: Vec<String>,
    settings: StartupSettings,
    registry: Arc<Mutex<WindowRegistry>>,
    manager: WindowManager,
    bus: SyncBus,
    session: Box<dyn NetworkSession>,
    pending_target: Option<String>,
    _instance_lock: Option<InstanceLock>,
}

impl Orchestrator {
    /// Run the fatal part of startup. Any error here means the process
    /// exits without a window: lock conflicts and unreadable startup
    /// settings are not recoverable mid-flight.
    pub fn bootstrap(
        config: OrchestratorConfig,
        store: Arc<dyn StoreAdapter>,
        mut session: Box<dyn NetworkSession>,
        displays: Box<dyn DisplayTopology>,
    ) -> Result<Self, StartupError> {
        // Dev builds skip single-instance coordination entirely.
        let instance_lock = if config.dev_mode {
            None
        } else {
            Some(InstanceLock::acquire(&config.data_dir)?)
        };

        let settings = startup::resolve(store.as_ref())?;
        startup::apply(&settings, session.as_mut());

        let pending_target = deeplink::derive_target(&LaunchRequest::from_args(
            config.argv.clone(),
            LaunchSource::ColdStart,
        ));
        if let Some(target) = &pending_target {
            tracing::info!(target, "buffered startup deep link");
        }

        let registry = Arc::new(Mutex::new(WindowRegistry::new()));
        let manager = WindowManager::new(
            store.clone(),
            registry.clone(),
            displays,
            config.platform,
        );
        let bus = SyncBus::new(store, registry.clone());

        Ok(Self {
            dev_mode: config.dev_mode,
            platform: config.platform,
            argv: config.argv,
            settings,
            registry,
            manager,
            bus,
            session,
            pending_target,
            _instance_lock: instance_lock,
        })
    }

    pub fn settings(&self) -> &StartupSettings {
        &self.settings
    }

    pub fn menu(&self) -> Option<&AppMenu> {
        self.manager.menu()
    }

    pub fn window_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn create_window(
        &mut self,
        replace_primary: bool,
    ) -> Result<(WindowId, Receiver<WindowMessage>), StoreError> {
        self.manager.create_window(replace_primary)
    }

    /// A window finished loading. The first ready signal consumes the
    /// pending navigation target; later signals find the slot empty.
    pub fn on_window_ready(&mut self, id: WindowId) {
        if let Some(target) = self.pending_target.take() {
            tracing::info!(target, window = ?id, "delivering buffered deep link");
            self.registry
                .lock()
                .send_to(id, WindowMessage::OpenUrl(target));
        }
    }

    /// A later launch attempt was detected while this process holds the
    /// instance lock: restore and focus the primary window and forward
    /// the attempt's navigation target, if it carried one.
    pub fn on_second_instance(&mut self, request: LaunchRequest) {
        if self.dev_mode {
            return;
        }
        let target = deeplink::derive_target(&request);
        {
            let registry = self.registry.lock();
            if let Some(primary) = registry.primary() {
                primary.send(WindowMessage::Restore);
                primary.send(WindowMessage::Focus);
                if let Some(target) = target {
                    primary.send(WindowMessage::OpenUrl(target));
                }
                return;
            }
        }
        // No window yet: buffer, last request wins.
        if target.is_some() {
            self.pending_target = target;
        }
    }

    /// OS activation carrying a scheme-prefixed link (macOS `open-url`).
    pub fn on_os_activation(&mut self, url: &str) {
        let request = LaunchRequest::from_activation_url(url);
        let Some(target) = deeplink::derive_target(&request) else {
            return;
        };
        {
            let registry = self.registry.lock();
            if let Some(primary) = registry.primary() {
                primary.send(WindowMessage::OpenUrl(target));
                return;
            }
        }
        self.pending_target = Some(target);
    }

    /// macOS dock activation with zero windows recreates one.
    pub fn on_activate(
        &mut self,
    ) -> Result<Option<(WindowId, Receiver<WindowMessage>)>, StoreError> {
        if self.registry.lock().is_empty() {
            return self.create_window(true).map(Some);
        }
        Ok(None)
    }

    pub fn on_window_close(
        &self,
        id: WindowId,
        bounds: WindowBounds,
        maximized: bool,
    ) -> Result<(), StoreError> {
        self.manager.on_window_close(id, bounds, maximized)
    }

    /// Returns the teardown decision once no replicas remain.
    pub fn on_window_destroyed(&mut self, id: WindowId) -> Option<TeardownAction> {
        let remaining = self.manager.on_window_destroyed(id);
        if remaining == 0 {
            Some(self.on_all_windows_closed())
        } else {
            None
        }
    }

    /// Clear cached network and storage state before exiting; on macOS
    /// the process stays resident instead of quitting.
    fn on_all_windows_closed(&mut self) -> TeardownAction {
        self.session.clear_cache();
        self.session.clear_storage(&CLEARED_STORAGE_KINDS);

        if self.platform == Platform::MacOs {
            TeardownAction::StayResident
        } else {
            TeardownAction::Quit
        }
    }

    pub fn dispatch(
        &self,
        origin: WindowId,
        command: StoreCommand,
    ) -> Result<DispatchResponse, DispatchError> {
        self.bus.dispatch(origin, command)
    }

    pub fn dispatch_wire(
        &self,
        origin: WindowId,
        request: WireRequest,
    ) -> Result<DispatchResponse, DispatchError> {
        self.bus.dispatch_wire(origin, request)
    }

    pub fn enable_proxy(&mut self, rules: &str) {
        self.session.set_proxy(rules);
    }

    pub fn disable_proxy(&mut self) {
        self.session.disable_proxy();
    }

    /// Best-effort: a failure to open the user's browser is logged and
    /// swallowed, never surfaced to the command bus or window lifecycle.
    pub fn open_external_link(&self, url: &str) {
        if let Err(error) = open::that_detached(url) {
            tracing::warn!(%error, url, "failed to open external link");
        }
    }

    /// Decide how to restart this process, honoring the packaging forms
    /// whose real executable path lives in the environment.
    pub fn relaunch_plan(&self) -> RelaunchPlan {
        let current_exe = std::env::current_exe().unwrap_or_else(|_| {
            self.argv
                .first()
                .map(PathBuf::from)
                .unwrap_or_default()
        });
        relaunch::plan(
            |name| std::env::var(name).ok(),
            &current_exe,
            &self.argv,
            self.dev_mode,
        )
    }
}
