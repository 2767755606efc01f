//! Single-instance coordination.
//!
//! One OS-level process owns the application's stores at a time. The lock
//! is a file created exclusively in the data directory, holding the owning
//! pid. Acquisition is binary: a live owner means this process must exit
//! without creating a window or touching the stores. A lock left behind
//! by a dead process is reclaimed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sysinfo::{Pid, System};

use crate::error::StartupError;

const LOCK_FILE_NAME: &str = "instance.lock";

/// Held for the process lifetime of the primary instance. Released on
/// drop.
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Try to become the primary instance.
    pub fn acquire(data_dir: &Path) -> Result<InstanceLock, StartupError> {
        let path = data_dir.join(LOCK_FILE_NAME);
        match try_create(&path) {
            Ok(()) => Ok(InstanceLock { path }),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                if lock_owner_alive(&path) {
                    Err(StartupError::AlreadyRunning)
                } else {
                    // Stale lock from a crashed process; reclaim it.
                    tracing::info!(path = %path.display(), "reclaiming stale instance lock");
                    fs::remove_file(&path)?;
                    try_create(&path)?;
                    Ok(InstanceLock { path })
                }
            }
            Err(error) => Err(StartupError::Io(error)),
        }
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(std::process::id().to_string().as_bytes())
}

fn lock_owner_alive(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        return false;
    };
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).is_some()
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
