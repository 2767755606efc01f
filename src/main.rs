//! FreeTube desktop - headless orchestration entry point
//!
//! Wires the orchestration core to the JSON-file store and a logging
//! session: acquires the instance lock, resolves startup configuration,
//! creates the first window replica, and drains its message channel. A
//! UI shell replaces the logging session and static display probe with
//! real implementations.

use std::sync::Arc;

use anyhow::{Context, Result};

use freetube_desktop::lifecycle::StaticDisplays;
use freetube_desktop::orchestrator::{Orchestrator, OrchestratorConfig};
use freetube_desktop::registry::WindowMessage;
use freetube_desktop::session::LoggingSession;
use freetube_desktop::store::{self, JsonFileStore};
use freetube_desktop::Platform;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let argv: Vec<String> = std::env::args().collect();
    let dev_mode = cfg!(debug_assertions) || argv.iter().any(|arg| arg == "--debug");

    tracing::info!("FreeTube desktop core starting...");

    let data_dir = store::default_data_directory()?;
    let store = Arc::new(
        JsonFileStore::open(&data_dir).context("Failed to open the data store")?,
    );

    let mut orchestrator = match Orchestrator::bootstrap(
        OrchestratorConfig {
            dev_mode,
            platform: Platform::current(),
            data_dir,
            argv,
        },
        store,
        Box::new(LoggingSession),
        Box::new(StaticDisplays(vec![1920])),
    ) {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            // Fatal-startup class: exit without creating any window.
            tracing::error!(%error, "startup aborted");
            std::process::exit(1);
        }
    };

    let (window, receiver) = orchestrator
        .create_window(true)
        .context("Failed to create the first window")?;
    orchestrator.on_window_ready(window);

    for message in receiver.try_iter() {
        match message {
            WindowMessage::OpenUrl(url) => tracing::info!(url, "navigation target"),
            other => tracing::debug!(?other, "window message"),
        }
    }

    tracing::info!("FreeTube desktop core ready");
    Ok(())
}
