//! Deep-link routing.
//!
//! A launch attempt carries either a raw argument list (cold start,
//! second instance) or an OS activation URL (macOS `open-url`). Both
//! paths derive at most one navigation target with the same scheme
//! stripping, so `freetube://watch?v=abc` means the same thing no matter
//! how it arrived.

use serde::{Deserialize, Serialize};

/// Custom URL scheme the application registers with the OS.
pub const LINK_SCHEME: &str = "freetube://";

/// How a launch attempt reached this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchSource {
    ColdStart,
    SecondInstance,
    OsActivation,
}

/// One launch attempt. Consumed exactly once by target derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub args: Vec<String>,
    pub source: LaunchSource,
}

impl LaunchRequest {
    pub fn from_args(args: Vec<String>, source: LaunchSource) -> Self {
        Self { args, source }
    }

    /// An OS activation event delivers the URL directly, without an
    /// executable path in front of it.
    pub fn from_activation_url(url: impl Into<String>) -> Self {
        Self {
            args: vec![url.into()],
            source: LaunchSource::OsActivation,
        }
    }
}

/// Remove the custom scheme prefix if present.
pub fn strip_scheme(link: &str) -> String {
    link.strip_prefix(LINK_SCHEME).unwrap_or(link).to_string()
}

/// Derive the navigation target of a launch attempt, if it carries one.
/// Argument lists only count when something follows the executable path;
/// an activation URL always counts.
pub fn derive_target(request: &LaunchRequest) -> Option<String> {
    match request.source {
        LaunchSource::OsActivation => request.args.last().map(|url| strip_scheme(url)),
        LaunchSource::ColdStart | LaunchSource::SecondInstance => {
            if request.args.len() > 1 {
                request.args.last().map(|arg| strip_scheme(arg))
            } else {
                None
            }
        }
    }
}
