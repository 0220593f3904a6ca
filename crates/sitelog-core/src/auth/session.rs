use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::User;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Token expiry time in hours.
/// The backend issues access tokens valid for 24 hours.
const TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: String, user: User) -> Self {
        Self {
            token,
            user,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        let expiry = self.created_at + Duration::hours(TOKEN_EXPIRY_HOURS);
        Utc::now() > expiry
    }

    pub fn time_until_expiry(&self) -> Duration {
        let expiry = self.created_at + Duration::hours(TOKEN_EXPIRY_HOURS);
        expiry - Utc::now()
    }
}

/// Token and user profile, optionally persisted to disk.
pub struct Session {
    cache_dir: Option<PathBuf>,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir: Some(cache_dir),
            data: None,
        }
    }

    /// A session that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            data: None,
        }
    }

    /// Load session from disk
    pub fn load(&mut self) -> Result<bool> {
        let Some(path) = self.session_path() else {
            return Ok(false);
        };
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            let data: SessionData = serde_json::from_str(&contents)
                .context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
            debug!("Stored session expired");
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let (Some(data), Some(path)) = (&self.data, self.session_path()) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents).context("Failed to write session file")?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        if let Some(path) = self.session_path() {
            if path.exists() {
                std::fs::remove_file(path).context("Failed to remove session file")?;
            }
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if session is valid
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.token.as_str())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(SESSION_FILE))
    }
}

/// Shared handle to the current session.
///
/// The API client reads the token through this on every request, so a
/// login or logout elsewhere takes effect on the next call.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Session>>,
}

impl SessionStore {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Session::in_memory())
    }

    pub fn token(&self) -> Option<String> {
        let session = self.inner.read().unwrap_or_else(|e| e.into_inner());
        session.token().map(str::to_owned)
    }

    pub fn user(&self) -> Option<User> {
        let session = self.inner.read().unwrap_or_else(|e| e.into_inner());
        session
            .data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.user.clone())
    }

    /// Time left on the current token, `None` when signed out or expired.
    pub fn expires_in(&self) -> Option<Duration> {
        let session = self.inner.read().unwrap_or_else(|e| e.into_inner());
        session
            .data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(SessionData::time_until_expiry)
    }

    pub fn is_authenticated(&self) -> bool {
        let session = self.inner.read().unwrap_or_else(|e| e.into_inner());
        session.is_valid()
    }

    /// Store new session data and persist it.
    pub fn set(&self, data: SessionData) -> Result<()> {
        let mut session = self.inner.write().unwrap_or_else(|e| e.into_inner());
        session.update(data);
        session.save()
    }

    /// Replace the stored user profile, keeping the token.
    pub fn set_user(&self, user: User) -> Result<()> {
        let mut session = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = session.data.as_mut() {
            data.user = user;
        }
        session.save()
    }

    /// Drop the token and profile, in memory and on disk.
    pub fn clear(&self) {
        let mut session = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = session.clear() {
            warn!(error = %e, "Failed to remove stored session");
        }
    }
}
