//! Network session boundary.
//!
//! Proxying, cookies, and cache/storage clearing are effects on the
//! embedded browser session, which lives outside this core. The trait is
//! the seam; `LoggingSession` is the headless implementation the binary
//! uses.

/// Storage kinds cleared on final teardown.
pub const CLEARED_STORAGE_KINDS: [&str; 8] = [
    "appcache",
    "cookies",
    "filesystem",
    "indexdb",
    "shadercache",
    "websql",
    "serviceworkers",
    "cachestorage",
];

/// Effects this core applies to the browser session.
pub trait NetworkSession: Send {
    fn set_smooth_scrolling(&mut self, enabled: bool);
    /// Route traffic through `rules`, e.g. `socks5://127.0.0.1:9050`.
    fn set_proxy(&mut self, rules: &str);
    fn disable_proxy(&mut self);
    fn set_cookie(&mut self, url: &str, name: &str, value: &str);
    fn clear_cache(&mut self);
    fn clear_storage(&mut self, storages: &[&str]);
}

/// Session implementation that only records its effects in the log.
#[derive(Default)]
pub struct LoggingSession;

impl NetworkSession for LoggingSession {
    fn set_smooth_scrolling(&mut self, enabled: bool) {
        tracing::info!(enabled, "smooth scrolling");
    }

    fn set_proxy(&mut self, rules: &str) {
        tracing::info!(rules, "proxy enabled");
    }

    fn disable_proxy(&mut self) {
        tracing::info!("proxy disabled");
    }

    fn set_cookie(&mut self, url: &str, name: &str, _value: &str) {
        tracing::debug!(url, name, "cookie set");
    }

    fn clear_cache(&mut self) {
        tracing::info!("session cache cleared");
    }

    fn clear_storage(&mut self, storages: &[&str]) {
        tracing::info!(?storages, "session storage cleared");
    }
}

/// Effects recorded by [`RecordingSession`].
#[cfg(test)]
#[derive(Default)]
pub struct RecordedEffects {
    pub smooth_scrolling: Option<bool>,
    pub proxy: Option<String>,
    pub cookies: Vec<(String, String, String)>,
    pub cache_cleared: bool,
    pub cleared_storages: Vec<String>,
}

/// Records every effect for assertions. Cloning shares the recorded
/// state, so a test keeps a handle after handing the session over.
#[cfg(test)]
#[derive(Default, Clone)]
pub struct RecordingSession {
    pub effects: std::sync::Arc<parking_lot::Mutex<RecordedEffects>>,
}

#[cfg(test)]
impl NetworkSession for RecordingSession {
    fn set_smooth_scrolling(&mut self, enabled: bool) {
        self.effects.lock().smooth_scrolling = Some(enabled);
    }

    fn set_proxy(&mut self, rules: &str) {
        self.effects.lock().proxy = Some(rules.to_string());
    }

    fn disable_proxy(&mut self) {
        self.effects.lock().proxy = None;
    }

    fn set_cookie(&mut self, url: &str, name: &str, value: &str) {
        self.effects
            .lock()
            .cookies
            .push((url.to_string(), name.to_string(), value.to_string()));
    }

    fn clear_cache(&mut self) {
        self.effects.lock().cache_cleared = true;
    }

    fn clear_storage(&mut self, storages: &[&str]) {
        self.effects
            .lock()
            .cleared_storages
            .extend(storages.iter().map(|kind| kind.to_string()));
    }
}
