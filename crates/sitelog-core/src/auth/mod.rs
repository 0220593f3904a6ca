//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: token and user profile, persisted to disk
//! - `SessionStore`: shared handle the API client reads on every request
//! - `CredentialStore`: remembered passwords via the OS keyring
//!
//! A session is cleared on logout or when the backend answers 401.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData, SessionStore};
