//! Credential sessions and their on-disk cache.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::Result;

/// A cached session is reused only while it has more than this many seconds left.
pub const SESSION_EXPIRY_SKEW_SECS: i64 = 5 * 60;

/// A set of credentials usable for provider calls.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSession {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// Expiry of temporary credentials; `None` for static keys.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialSession {
    /// Returns true if the session can still be used at `now`.
    ///
    /// Sessions without an expiry never go stale.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map_or(true, |expires| expires - now > Duration::seconds(SESSION_EXPIRY_SKEW_SECS))
    }

    /// Returns true if the session can still be used now.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

impl std::fmt::Debug for CredentialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSession")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"*****")
            .field("session_token", &self.session_token.as_ref().map(|_| "*****"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The role a cached session was assumed for.
///
/// A cached entry is only handed back when its binding matches the profile's
/// current one, so editing `role_arn` or `mfa_serial` invalidates it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionBinding {
    /// Role the session was assumed into.
    pub role_arn: String,
    /// MFA device used for the assumption, if any.
    pub mfa_serial: Option<String>,
}

impl SessionBinding {
    /// Creates a binding for `role_arn` without MFA.
    #[must_use]
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            mfa_serial: None,
        }
    }

    /// Sets the MFA device serial.
    #[must_use]
    pub fn with_mfa_serial(mut self, mfa_serial: Option<impl Into<String>>) -> Self {
        self.mfa_serial = mfa_serial.map(Into::into);
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(default)]
    profile: String,
    #[serde(default)]
    binding: SessionBinding,
    expiration: Option<DateTime<Utc>>,
    credentials: CredentialSession,
}

/// Assumed-role sessions persisted per profile.
///
/// Each profile gets its own file, `<dir>/<encoded profile>.json`, so
/// refreshing one profile never rewrites another's entry. The encoding is
/// reversible, so distinct profile names never share a file. Entries are
/// written owner-only.
#[derive(Debug, Clone)]
pub struct SessionCache {
    dir: PathBuf,
}

impl SessionCache {
    /// Creates a cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, profile: &str) -> PathBuf {
        let file: String = url::form_urlencoded::byte_serialize(profile.as_bytes()).collect();
        self.dir.join(format!("{file}.json"))
    }

    /// Loads the cached session for `profile`, if it was assumed for `binding`.
    ///
    /// Unreadable or corrupt entries, and entries recorded for another
    /// profile or role, are treated as absent.
    pub fn load(&self, profile: &str, binding: &SessionBinding) -> Result<Option<CredentialSession>> {
        let path = self.path_for(profile);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry = match serde_json::from_str::<CacheEntry>(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(profile = %profile, path = %path.display(), error = %e, "Ignoring corrupt session cache entry");
                return Ok(None);
            }
        };
        if entry.profile != profile || entry.binding != *binding {
            debug!(profile = %profile, cached_role = %entry.binding.role_arn, "Cached session belongs to another role");
            return Ok(None);
        }

        let mut session = entry.credentials;
        session.expires_at = entry.expiration.or(session.expires_at);
        Ok(Some(session))
    }

    /// Persists `session` for `profile`, replacing any previous entry.
    pub fn store(&self, profile: &str, binding: &SessionBinding, session: &CredentialSession) -> Result<()> {
        create_private_dir(&self.dir)?;
        let path = self.path_for(profile);
        let entry = CacheEntry {
            profile: profile.to_string(),
            binding: binding.clone(),
            expiration: session.expires_at,
            credentials: session.clone(),
        };

        let tmp = path.with_extension("json.tmp");
        write_private(&tmp, &serde_json::to_vec_pretty(&entry)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // A leftover temp file keeps its old mode; `mode` only applies on create.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
