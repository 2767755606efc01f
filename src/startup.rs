//! Startup configuration resolution.
//!
//! A bounded set of settings documents is read once, before the first
//! window exists, because proxying and scrolling behavior must be decided
//! up front. A failed read aborts startup entirely; silently defaulting
//! would make the session behave differently from what the user
//! configured. Absent documents fall back to documented defaults.

use serde_json::Value;

use crate::error::StartupError;
use crate::session::NetworkSession;
use crate::store::StoreAdapter;

pub const DEFAULT_PROXY_PROTOCOL: &str = "socks5";
pub const DEFAULT_PROXY_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_PROXY_PORT: &str = "9050";

/// Domains that receive the consent cookie, independent of any stored
/// setting.
pub const CONSENT_COOKIE_DOMAINS: [&str; 4] = [
    "http://www.youtube.com",
    "https://www.youtube.com",
    "http://youtube.com",
    "https://youtube.com",
];

const CONSENT_COOKIE_NAME: &str = "CONSENT";
const CONSENT_COOKIE_VALUE: &str = "YES+";

/// Effective runtime configuration derived before first window creation.
/// Read once; later changes flow through the sync bus like any other
/// setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupSettings {
    pub disable_smooth_scrolling: bool,
    pub use_proxy: bool,
    pub proxy_protocol: String,
    pub proxy_hostname: String,
    pub proxy_port: String,
}

impl Default for StartupSettings {
    fn default() -> Self {
        StartupSettings {
            disable_smooth_scrolling: false,
            use_proxy: false,
            proxy_protocol: DEFAULT_PROXY_PROTOCOL.to_string(),
            proxy_hostname: DEFAULT_PROXY_HOSTNAME.to_string(),
            proxy_port: DEFAULT_PROXY_PORT.to_string(),
        }
    }
}

impl StartupSettings {
    pub fn proxy_rules(&self) -> String {
        format!(
            "{}://{}:{}",
            self.proxy_protocol, self.proxy_hostname, self.proxy_port
        )
    }
}

/// Read the startup settings documents. A store failure here is fatal to
/// the whole startup sequence.
pub fn resolve(store: &dyn StoreAdapter) -> Result<StartupSettings, StartupError> {
    let docs = store.startup_settings().map_err(StartupError::Settings)?;

    let mut settings = StartupSettings::default();
    for doc in docs {
        match doc.id.as_str() {
            "disableSmoothScrolling" => {
                settings.disable_smooth_scrolling = as_bool(&doc.value)
                    .unwrap_or(settings.disable_smooth_scrolling);
            }
            "useProxy" => {
                settings.use_proxy = as_bool(&doc.value).unwrap_or(settings.use_proxy);
            }
            "proxyProtocol" => {
                if let Some(value) = as_string(&doc.value) {
                    settings.proxy_protocol = value;
                }
            }
            "proxyHostname" => {
                if let Some(value) = as_string(&doc.value) {
                    settings.proxy_hostname = value;
                }
            }
            "proxyPort" => {
                if let Some(value) = as_string(&doc.value) {
                    settings.proxy_port = value;
                }
            }
            _ => {}
        }
    }
    Ok(settings)
}

/// Apply the resolved configuration to the session, plus the
/// unconditional consent cookie on the fixed domain list.
pub fn apply(settings: &StartupSettings, session: &mut dyn NetworkSession) {
    session.set_smooth_scrolling(!settings.disable_smooth_scrolling);

    if settings.use_proxy {
        session.set_proxy(&settings.proxy_rules());
    }

    for domain in CONSENT_COOKIE_DOMAINS {
        session.set_cookie(domain, CONSENT_COOKIE_NAME, CONSENT_COOKIE_VALUE);
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    value.as_bool()
}

/// Ports may be stored as strings or numbers depending on who wrote them.
fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}
