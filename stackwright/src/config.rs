//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::tail::BackoffConfig;

/// Profile used when none is given.
pub const DEFAULT_PROFILE: &str = "default";

/// Largest template body the provider accepts inline.
pub const DEFAULT_INLINE_TEMPLATE_LIMIT: usize = 51_200;

/// Configuration shared by every engine component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Credential profile name.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Provider region. `None` leaves the choice to the provider SDK.
    #[serde(default)]
    pub region: Option<String>,
    /// Path of the credentials file.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    /// Directory holding cached role sessions.
    #[serde(default = "default_session_cache_dir")]
    pub session_cache_dir: PathBuf,
    /// Bodies larger than this many bytes are uploaded before use.
    #[serde(default = "default_inline_template_limit")]
    pub inline_template_limit: usize,
    /// Event poll schedule.
    #[serde(default)]
    pub poll: BackoffConfig,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_credentials_file() -> PathBuf {
    home().join(".aws").join("credentials")
}

fn default_session_cache_dir() -> PathBuf {
    home().join(".stackwright").join("sessions")
}

fn default_inline_template_limit() -> usize {
    DEFAULT_INLINE_TEMPLATE_LIMIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            region: None,
            credentials_file: default_credentials_file(),
            session_cache_dir: default_session_cache_dir(),
            inline_template_limit: default_inline_template_limit(),
            poll: BackoffConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers the process environment over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Layers variables from `lookup` over the defaults.
    ///
    /// Reads `AWS_PROFILE`, `AWS_REGION` (falling back to
    /// `AWS_DEFAULT_REGION`), `AWS_SHARED_CREDENTIALS_FILE` and
    /// `STACKWRIGHT_SESSION_CACHE`. Empty values are ignored.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(profile) = get("AWS_PROFILE") {
            config.profile = profile;
        }
        config.region = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION"));
        if let Some(path) = get("AWS_SHARED_CREDENTIALS_FILE") {
            config.credentials_file = PathBuf::from(path);
        }
        if let Some(path) = get("STACKWRIGHT_SESSION_CACHE") {
            config.session_cache_dir = PathBuf::from(path);
        }
        config
    }

    /// Sets the profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the credentials file.
    #[must_use]
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = path.into();
        self
    }

    /// Sets the session cache directory.
    #[must_use]
    pub fn with_session_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_cache_dir = path.into();
        self
    }

    /// Sets the inline template limit.
    #[must_use]
    pub fn with_inline_template_limit(mut self, bytes: usize) -> Self {
        self.inline_template_limit = bytes;
        self
    }

    /// Sets the poll schedule.
    #[must_use]
    pub fn with_poll(mut self, poll: BackoffConfig) -> Self {
        self.poll = poll;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.profile, "default");
        assert_eq!(config.inline_template_limit, 51_200);
        assert!(config.credentials_file.ends_with(".aws/credentials"));
        assert!(config.session_cache_dir.ends_with(".stackwright/sessions"));
        assert_eq!(config.poll.max_wait_ms, 30_000);
    }

    #[test]
    fn test_environment_layering() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("AWS_PROFILE", "ops"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
            ("AWS_SHARED_CREDENTIALS_FILE", "/etc/aws/credentials"),
        ]));
        assert_eq!(config.profile, "ops");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.credentials_file, PathBuf::from("/etc/aws/credentials"));
    }

    #[test]
    fn test_region_prefers_aws_region() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("AWS_REGION", "us-west-2"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
            ("AWS_PROFILE", ""),
        ]));
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.profile, "default");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"profile": "ci", "poll": {"backoff_factor": 1.5}}"#).unwrap();
        assert_eq!(config.profile, "ci");
        assert_eq!(config.inline_template_limit, 51_200);
        assert_eq!(config.poll.base_interval_ms, 1000);
    }
}
