//! The profile-keyed credentials file.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::session::CredentialSession;
use crate::errors::{CredentialError, NoSuchProfileError, Result};

const SECTION_PATTERN: &str = r"^\[\s*(?:profile\s+)?([^\]]+?)\s*\]$";

/// A named credential profile.
#[derive(Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    fields: BTreeMap<String, String>,
}

impl Profile {
    /// Creates a profile from raw fields.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a raw field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// `role_arn`, if the profile assumes a role.
    #[must_use]
    pub fn role_arn(&self) -> Option<&str> {
        self.get("role_arn")
    }

    /// `mfa_serial`, if role assumption needs an MFA code.
    #[must_use]
    pub fn mfa_serial(&self) -> Option<&str> {
        self.get("mfa_serial")
    }

    /// `source_profile`, if fields are inherited.
    #[must_use]
    pub fn source_profile(&self) -> Option<&str> {
        self.get("source_profile")
    }

    /// The profile's static keys as a session.
    pub fn static_session(&self) -> Result<CredentialSession> {
        let access_key_id = self
            .get("aws_access_key_id")
            .ok_or_else(|| CredentialError::new(&self.name, "missing aws_access_key_id"))?;
        let secret_access_key = self
            .get("aws_secret_access_key")
            .ok_or_else(|| CredentialError::new(&self.name, "missing aws_secret_access_key"))?;

        Ok(CredentialSession {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: self.get("aws_session_token").map(str::to_string),
            expires_at: None,
        })
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A parsed credentials file.
#[derive(Debug, Clone, Default)]
pub struct CredentialsFile {
    path: PathBuf,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl CredentialsFile {
    /// Loads `path`. A missing file behaves as an empty one.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(path, &contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self {
                path: path.to_path_buf(),
                sections: BTreeMap::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses credentials file contents.
    ///
    /// Accepts `[name]` and `[profile name]` headers, `key = value` lines and
    /// `#` / `;` comments. Later duplicates win.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let header = Regex::new(SECTION_PATTERN)
            .map_err(|e| CredentialError::new("-", format!("invalid section pattern: {e}")))?;

        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(caps) = header.captures(line) {
                let name = caps[1].to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
                continue;
            };
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    /// The file the profiles were read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all profiles.
    #[must_use]
    pub fn profile_names(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }

    /// Returns `name` with its `source_profile` fields merged underneath.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        let own = self
            .sections
            .get(name)
            .ok_or_else(|| NoSuchProfileError::new(name, &self.path))?;

        let mut fields = match own.get("source_profile").filter(|s| !s.is_empty()) {
            Some(source) => self
                .sections
                .get(source)
                .cloned()
                .ok_or_else(|| NoSuchProfileError::new(source, &self.path))?,
            None => BTreeMap::new(),
        };
        fields.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(Profile::new(name, fields))
    }
}
