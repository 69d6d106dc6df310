//! Interactive MFA prompt.

use stackwright::credentials::MfaPrompt;
use stackwright::errors::{CredentialError, Result};

/// Asks for MFA codes on the terminal.
#[derive(Debug, Clone)]
pub struct TerminalMfaPrompt {
    profile: String,
}

impl TerminalMfaPrompt {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }
}

impl MfaPrompt for TerminalMfaPrompt {
    fn token_code(&self, mfa_serial: &str) -> Result<String> {
        let code = inquire::Text::new(&format!("MFA code for {mfa_serial}:"))
            .with_help_message("Six digits from your authenticator")
            .prompt()
            .map_err(|e| CredentialError::new(&self.profile, format!("MFA prompt failed: {e}")))?;

        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(CredentialError::new(&self.profile, "No MFA code entered").into());
        }
        Ok(code)
    }
}
