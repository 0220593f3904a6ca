//! REST API client module for the labor-tracking backend.
//!
//! This module provides the `ApiClient` for reading projects, summaries
//! and admin data, and for saving daily worker entries.
//!
//! Requests carry a bearer token read from the shared `SessionStore`.
//! A 401 clears that store and surfaces as `ApiError::SessionInvalid`.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
