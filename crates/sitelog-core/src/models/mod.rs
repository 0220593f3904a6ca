//! Data models for labor-tracking entities.
//!
//! This module contains the data structures exchanged with the backend:
//!
//! - `Project`, `DailyEntry`: projects and their per-date worker logs
//! - `Summary`: backend-computed totals and health for a project/date
//! - `User`, `Role`: accounts and access
//! - `LaborCost`: per-shift unit costs for a work type
//! - Admin types: `DashboardRow`, `WorkTypeReportRow`

pub mod labor;
pub mod project;
pub mod report;
pub mod summary;
pub mod user;

pub use labor::{
    LaborCost, LaborCostInput, LaborCostsResponse, SimilarityResult, WorkTypesResponse,
};
pub use project::{
    DailyData, DailyEntry, DatesResponse, Project, ProjectInput, ProjectResponse, ProjectStatus,
    ProjectsResponse,
};
pub use report::{Ack, DashboardResponse, DashboardRow, HealthCheck, WorkSummaryResponse, WorkTypeReportRow};
pub use summary::{Health, HealthMeta, HealthTier, Summary, Totals};
pub use user::{LoginRequest, LoginResponse, Role, User, UserInput, UserRecord, UsersResponse};
