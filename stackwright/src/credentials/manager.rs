//! Resolution of a profile name into a usable credential session.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;

use super::profile::CredentialsFile;
use super::session::{CredentialSession, SessionBinding, SessionCache};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::errors::Result;

/// Parameters of a role assumption call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    /// Role to assume.
    pub role_arn: String,
    /// Session name recorded by the provider.
    pub session_name: String,
    /// MFA device serial, if the role requires MFA.
    pub mfa_serial: Option<String>,
    /// Current MFA code.
    pub token_code: Option<String>,
}

/// Exchanges base credentials for a temporary role session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    /// Assumes `request.role_arn` using `base`.
    async fn assume_role(
        &self,
        base: &CredentialSession,
        request: &AssumeRoleRequest,
    ) -> Result<CredentialSession>;
}

/// Supplies MFA codes, typically by asking the user.
#[cfg_attr(test, mockall::automock)]
pub trait MfaPrompt: Send + Sync {
    /// Returns the current code for `mfa_serial`.
    fn token_code(&self, mfa_serial: &str) -> Result<String>;
}

fn random_session_name() -> String {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect()
}

/// Hands out credentials for named profiles.
///
/// Profiles without `role_arn` yield their static keys. Profiles with one
/// yield an assumed-role session, reused from the [`SessionCache`] until it
/// is within the expiry skew. Refreshes are serialized per profile: a caller
/// that waited for another caller's refresh re-reads the cache before
/// assuming the role itself.
pub struct CredentialManager {
    credentials_path: PathBuf,
    cache: SessionCache,
    assumer: Arc<dyn RoleAssumer>,
    mfa: Arc<dyn MfaPrompt>,
    sink: Arc<dyn DiagnosticSink>,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl CredentialManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        cache: SessionCache,
        assumer: Arc<dyn RoleAssumer>,
        mfa: Arc<dyn MfaPrompt>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            cache,
            assumer,
            mfa,
            sink,
            refresh_locks: DashMap::new(),
        }
    }

    /// Returns credentials for `profile_name`.
    pub async fn credentials_for(&self, profile_name: &str) -> Result<CredentialSession> {
        let file = CredentialsFile::load(&self.credentials_path)?;
        let profile = file.profile(profile_name)?;
        let base = profile.static_session()?;

        let Some(role_arn) = profile.role_arn() else {
            return Ok(base);
        };

        let binding = SessionBinding::new(role_arn).with_mfa_serial(profile.mfa_serial());
        if let Some(session) = self.cached_fresh(profile_name, &binding)? {
            return Ok(session);
        }

        let lock = self
            .refresh_locks
            .entry(profile_name.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(session) = self.cached_fresh(profile_name, &binding)? {
            return Ok(session);
        }

        let token_code = profile
            .mfa_serial()
            .map(|serial| self.mfa.token_code(serial))
            .transpose()?;
        let request = AssumeRoleRequest {
            role_arn: role_arn.to_string(),
            session_name: random_session_name(),
            mfa_serial: profile.mfa_serial().map(str::to_string),
            token_code,
        };

        self.sink.emit(DiagnosticEvent::info(
            "credentials.assume_role",
            format!("Assuming role {role_arn} for profile {profile_name}"),
        ));
        let session = self.assumer.assume_role(&base, &request).await?;
        self.cache.store(profile_name, &binding, &session)?;
        Ok(session)
    }

    fn cached_fresh(&self, profile_name: &str, binding: &SessionBinding) -> Result<Option<CredentialSession>> {
        match self.cache.load(profile_name, binding)? {
            Some(session) if session.is_fresh() => {
                self.sink.emit(DiagnosticEvent::debug(
                    "credentials.cached",
                    format!("Reusing cached session for profile {profile_name}"),
                ));
                Ok(Some(session))
            }
            _ => Ok(None),
        }
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("credentials_path", &self.credentials_path)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoOpSink;
    use crate::errors::StackwrightError;
    use chrono::{Duration, Utc};

    const CREDENTIALS: &str = "\
[base]
aws_access_key_id = AKIABASE
aws_secret_access_key = base-secret

[ops]
source_profile = base
role_arn = arn:aws:iam::123456789012:role/ops

[mfa]
source_profile = base
role_arn = arn:aws:iam::123456789012:role/admin
mfa_serial = arn:aws:iam::123456789012:mfa/alice

[team/ops]
source_profile = base
role_arn = arn:aws:iam::111111111111:role/ops

[team_ops]
source_profile = base
role_arn = arn:aws:iam::222222222222:role/prod-admin
";

    fn ops_binding() -> SessionBinding {
        SessionBinding::new("arn:aws:iam::123456789012:role/ops")
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        credentials: PathBuf,
        cache: SessionCache,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials");
        std::fs::write(&credentials, CREDENTIALS).unwrap();
        let cache = SessionCache::new(dir.path().join("sessions"));
        Fixture {
            _dir: dir,
            credentials,
            cache,
        }
    }

    fn assumed(expires_in: Duration) -> CredentialSession {
        CredentialSession {
            access_key_id: "ASIAROLE".into(),
            secret_access_key: "role-secret".into(),
            session_token: Some("role-token".into()),
            expires_at: Some(Utc::now() + expires_in),
        }
    }

    fn manager(f: &Fixture, assumer: MockRoleAssumer, mfa: MockMfaPrompt) -> CredentialManager {
        CredentialManager::new(
            &f.credentials,
            f.cache.clone(),
            Arc::new(assumer),
            Arc::new(mfa),
            Arc::new(NoOpSink),
        )
    }

    #[tokio::test]
    async fn test_static_profile_never_assumes() {
        let f = fixture();
        let mut assumer = MockRoleAssumer::new();
        assumer.expect_assume_role().never();

        let session = manager(&f, assumer, MockMfaPrompt::new())
            .credentials_for("base")
            .await
            .unwrap();
        assert_eq!(session.access_key_id, "AKIABASE");
    }

    #[tokio::test]
    async fn test_session_near_expiry_is_refreshed() {
        let f = fixture();
        f.cache.store("ops", &ops_binding(), &assumed(Duration::minutes(2))).unwrap();

        let mut assumer = MockRoleAssumer::new();
        assumer
            .expect_assume_role()
            .times(1)
            .withf(|base, req| {
                base.access_key_id == "AKIABASE"
                    && req.role_arn == "arn:aws:iam::123456789012:role/ops"
                    && req.session_name.len() == 16
                    && req.token_code.is_none()
            })
            .returning(|_, _| Ok(assumed(Duration::hours(1))));

        let session = manager(&f, assumer, MockMfaPrompt::new())
            .credentials_for("ops")
            .await
            .unwrap();

        assert_eq!(session.access_key_id, "ASIAROLE");
        let stored = f.cache.load("ops", &ops_binding()).unwrap().unwrap();
        assert!(stored.expires_at.unwrap() > Utc::now() + Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_fresh_session_is_reused() {
        let f = fixture();
        let cached = assumed(Duration::minutes(10));
        f.cache.store("ops", &ops_binding(), &cached).unwrap();

        let mut assumer = MockRoleAssumer::new();
        assumer.expect_assume_role().never();

        let session = manager(&f, assumer, MockMfaPrompt::new())
            .credentials_for("ops")
            .await
            .unwrap();
        assert_eq!(session, cached);
    }

    #[tokio::test]
    async fn test_mfa_code_is_requested() {
        let f = fixture();
        let mut mfa = MockMfaPrompt::new();
        mfa.expect_token_code()
            .withf(|serial| serial == "arn:aws:iam::123456789012:mfa/alice")
            .times(1)
            .returning(|_| Ok("123456".to_string()));

        let mut assumer = MockRoleAssumer::new();
        assumer
            .expect_assume_role()
            .times(1)
            .withf(|_, req| req.token_code.as_deref() == Some("123456") && req.mfa_serial.is_some())
            .returning(|_, _| Ok(assumed(Duration::hours(1))));

        manager(&f, assumer, mfa).credentials_for("mfa").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_refresh_assumes_once() {
        let f = fixture();
        let mut assumer = MockRoleAssumer::new();
        assumer
            .expect_assume_role()
            .times(1)
            .returning(|_, _| Ok(assumed(Duration::hours(1))));

        let manager = Arc::new(manager(&f, assumer, MockMfaPrompt::new()));
        let calls = (0..4).map(|_| {
            let manager = manager.clone();
            async move { manager.credentials_for("ops").await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_similar_profile_names_get_their_own_roles() {
        let f = fixture();
        let mut assumer = MockRoleAssumer::new();
        assumer
            .expect_assume_role()
            .times(2)
            .returning(|_, req| {
                Ok(CredentialSession {
                    access_key_id: format!("KEY-FOR-{}", req.role_arn),
                    ..assumed(Duration::hours(1))
                })
            });
        let manager = manager(&f, assumer, MockMfaPrompt::new());

        let slash = manager.credentials_for("team/ops").await.unwrap();
        let underscore = manager.credentials_for("team_ops").await.unwrap();

        assert_eq!(slash.access_key_id, "KEY-FOR-arn:aws:iam::111111111111:role/ops");
        assert_eq!(underscore.access_key_id, "KEY-FOR-arn:aws:iam::222222222222:role/prod-admin");
    }

    #[tokio::test]
    async fn test_session_for_previous_role_is_not_reused() {
        let f = fixture();
        let stale_role = SessionBinding::new("arn:aws:iam::123456789012:role/old-ops");
        f.cache.store("ops", &stale_role, &assumed(Duration::hours(1))).unwrap();

        let mut assumer = MockRoleAssumer::new();
        assumer
            .expect_assume_role()
            .times(1)
            .returning(|_, _| Ok(assumed(Duration::hours(1))));

        manager(&f, assumer, MockMfaPrompt::new())
            .credentials_for("ops")
            .await
            .unwrap();
        assert!(f.cache.load("ops", &ops_binding()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_profile_is_fatal() {
        let f = fixture();
        let err = manager(&f, MockRoleAssumer::new(), MockMfaPrompt::new())
            .credentials_for("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, StackwrightError::NoSuchProfile(_)));
    }
}
