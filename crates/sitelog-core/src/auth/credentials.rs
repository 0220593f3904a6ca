use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::APP_NAME;

/// Remembered passwords in the OS keychain, one entry per username under
/// the `sitelog` service.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(username: &str) -> Result<Entry> {
        Entry::new(APP_NAME, username)
            .with_context(|| format!("Failed to open keychain entry for {}", username))
    }

    pub fn store(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    pub fn get_password(username: &str) -> Result<String> {
        Self::entry(username)?
            .get_password()
            .context("Failed to read password from keychain")
    }

    /// Forget the stored password. A missing entry counts as success.
    pub fn delete(username: &str) -> Result<()> {
        match Self::entry(username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to remove password from keychain"),
        }
    }

    pub fn has_credentials(username: &str) -> bool {
        Self::entry(username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}
