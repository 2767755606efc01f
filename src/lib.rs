//! FreeTube desktop orchestration core
//!
//! Coordination layer shared by every window of the application:
//! - Single-instance lock and second-launch forwarding (single_instance)
//! - Deep-link derivation and buffering (deeplink)
//! - Window lifecycle, persisted placement, menu rebuild (lifecycle)
//! - Store command dispatch and cross-window synchronization (bus)
//! - Startup configuration resolution (startup)
//!
//! The rendering shell, the store engine, and the real browser session
//! live outside this crate; they plug in through the `StoreAdapter`,
//! `NetworkSession`, and `DisplayTopology` traits.

pub mod bus;
pub mod commands;
pub mod deeplink;
pub mod error;
pub mod lifecycle;
pub mod menu;
pub mod orchestrator;
pub mod registry;
pub mod relaunch;
pub mod session;
pub mod single_instance;
pub mod startup;
pub mod store;

/// Platform conventions that change orchestration behavior: menu layout
/// and whether the process stays resident after the last window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}
