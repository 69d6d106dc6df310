//! Credential profiles, role assumption and session caching.
//!
//! This module provides:
//! - [`CredentialsFile`] / [`Profile`] for the profile-keyed credentials file
//! - [`SessionCache`] for persisted assumed-role sessions
//! - [`CredentialManager`], which hands out a usable [`CredentialSession`]
//!   for a profile, assuming its role when required

mod manager;
mod profile;
mod session;

pub use manager::{AssumeRoleRequest, CredentialManager, MfaPrompt, RoleAssumer};
pub use profile::{CredentialsFile, Profile};
pub use session::{CredentialSession, SessionBinding, SessionCache, SESSION_EXPIRY_SKEW_SECS};

#[cfg(test)]
pub use manager::{MockMfaPrompt, MockRoleAssumer};
