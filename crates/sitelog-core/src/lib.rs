//! sitelog core - client library for a daily labor-tracking service.
//!
//! Administrators manage construction projects, work types, users and
//! labor unit costs; field users log worker counts per shift for each
//! work type and date. This crate holds everything below the front end:
//!
//! - `api`: typed REST client and its error type
//! - `auth`: session persistence and remembered credentials
//! - `cache`: keyed query cache with request de-duplication
//! - `flow`: optimistic save of daily entries with rollback
//! - `service`: `SiteLog`, the facade a front end talks to

pub mod api;
pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod flow;
pub mod models;
pub mod service;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use backend::LaborBackend;
pub use cache::{CacheError, QueryCache, QueryKey};
pub use config::Config;
pub use flow::{EditedEntries, SaveError, SaveFlow, SaveReceipt, SaveState};
pub use service::SiteLog;
