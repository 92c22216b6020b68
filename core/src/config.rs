//! Client configuration read from the environment.

pub const API_BASE_VAR: &str = "GROCERY_API_BASE";
pub const BEARER_FALLBACK_VAR: &str = "GROCERY_BEARER_FALLBACK";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash.
    pub api_base: String,
    /// Store a login token and send it as a bearer header, for environments
    /// where the session cookie is blocked.
    pub bearer_fallback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            bearer_fallback: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparseable values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base) = lookup(API_BASE_VAR).filter(|v| !v.trim().is_empty()) {
            config.api_base = base.trim().trim_end_matches('/').to_string();
        }
        match lookup(BEARER_FALLBACK_VAR).as_deref().map(str::trim) {
            Some("1" | "true" | "yes") => config.bearer_fallback = true,
            Some("0" | "false" | "no") => config.bearer_fallback = false,
            Some(other) => {
                tracing::warn!("ignoring {BEARER_FALLBACK_VAR}={other:?}, expected true or false");
            }
            None => {}
        }
        config
    }
}
