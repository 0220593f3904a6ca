//! Backend seam used by the query cache, the save flow and the service.
//!
//! `ApiClient` is the real implementation; tests plug in an in-memory fake.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::api::{ApiClient, ApiError};
use crate::models::{
    Ack, DailyEntry, DashboardRow, LaborCost, Project, ProjectInput, Summary, User, UserInput,
    UserRecord, WorkTypeReportRow,
};

/// Operations of the labor-tracking backend, minus login.
#[async_trait]
pub trait LaborBackend: Send + Sync {
    async fn current_user(&self) -> Result<User, ApiError>;

    async fn projects(&self) -> Result<BTreeMap<String, Project>, ApiError>;

    async fn project(&self, name: &str) -> Result<Project, ApiError>;

    async fn project_summary(&self, name: &str, date: Option<&str>) -> Result<Summary, ApiError>;

    /// Replace the entries for `date`, one per work type.
    async fn save_daily_data(
        &self,
        name: &str,
        date: &str,
        entries: &BTreeMap<String, DailyEntry>,
    ) -> Result<Ack, ApiError>;

    async fn dates_with_data(&self, name: &str, month: Option<&str>) -> Result<Vec<String>, ApiError>;

    async fn add_work_type(&self, name: &str, work_type: &str) -> Result<Ack, ApiError>;

    async fn admin_dashboard(&self) -> Result<Vec<DashboardRow>, ApiError>;

    async fn create_project(&self, input: &ProjectInput) -> Result<Ack, ApiError>;

    async fn update_project(&self, name: &str, input: &ProjectInput) -> Result<Ack, ApiError>;

    async fn delete_project(&self, name: &str) -> Result<Ack, ApiError>;

    async fn users(&self) -> Result<BTreeMap<String, UserRecord>, ApiError>;

    async fn create_user(&self, input: &UserInput) -> Result<Ack, ApiError>;

    async fn update_user(&self, username: &str, input: &UserInput) -> Result<Ack, ApiError>;

    async fn delete_user(&self, username: &str) -> Result<Ack, ApiError>;

    async fn labor_costs(&self) -> Result<BTreeMap<String, LaborCost>, ApiError>;

    async fn save_labor_cost(
        &self,
        work_type: &str,
        day_cost: i64,
        night_cost: i64,
        midnight_cost: i64,
    ) -> Result<Ack, ApiError>;

    async fn available_work_types(&self) -> Result<Vec<String>, ApiError>;

    async fn project_work_summary(&self, name: &str) -> Result<Vec<WorkTypeReportRow>, ApiError>;
}

#[async_trait]
impl LaborBackend for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        ApiClient::current_user(self).await
    }

    async fn projects(&self) -> Result<BTreeMap<String, Project>, ApiError> {
        ApiClient::projects(self).await
    }

    async fn project(&self, name: &str) -> Result<Project, ApiError> {
        ApiClient::project(self, name).await
    }

    async fn project_summary(&self, name: &str, date: Option<&str>) -> Result<Summary, ApiError> {
        ApiClient::project_summary(self, name, date).await
    }

    async fn save_daily_data(
        &self,
        name: &str,
        date: &str,
        entries: &BTreeMap<String, DailyEntry>,
    ) -> Result<Ack, ApiError> {
        ApiClient::save_daily_data(self, name, date, entries).await
    }

    async fn dates_with_data(&self, name: &str, month: Option<&str>) -> Result<Vec<String>, ApiError> {
        ApiClient::dates_with_data(self, name, month).await
    }

    async fn add_work_type(&self, name: &str, work_type: &str) -> Result<Ack, ApiError> {
        ApiClient::add_work_type(self, name, work_type).await
    }

    async fn admin_dashboard(&self) -> Result<Vec<DashboardRow>, ApiError> {
        ApiClient::admin_dashboard(self).await
    }

    async fn create_project(&self, input: &ProjectInput) -> Result<Ack, ApiError> {
        ApiClient::create_project(self, input).await
    }

    async fn update_project(&self, name: &str, input: &ProjectInput) -> Result<Ack, ApiError> {
        ApiClient::update_project(self, name, input).await
    }

    async fn delete_project(&self, name: &str) -> Result<Ack, ApiError> {
        ApiClient::delete_project(self, name).await
    }

    async fn users(&self) -> Result<BTreeMap<String, UserRecord>, ApiError> {
        ApiClient::users(self).await
    }

    async fn create_user(&self, input: &UserInput) -> Result<Ack, ApiError> {
        ApiClient::create_user(self, input).await
    }

    async fn update_user(&self, username: &str, input: &UserInput) -> Result<Ack, ApiError> {
        ApiClient::update_user(self, username, input).await
    }

    async fn delete_user(&self, username: &str) -> Result<Ack, ApiError> {
        ApiClient::delete_user(self, username).await
    }

    async fn labor_costs(&self) -> Result<BTreeMap<String, LaborCost>, ApiError> {
        ApiClient::labor_costs(self).await
    }

    async fn save_labor_cost(
        &self,
        work_type: &str,
        day_cost: i64,
        night_cost: i64,
        midnight_cost: i64,
    ) -> Result<Ack, ApiError> {
        ApiClient::save_labor_cost(self, work_type, day_cost, night_cost, midnight_cost).await
    }

    async fn available_work_types(&self) -> Result<Vec<String>, ApiError> {
        ApiClient::available_work_types(self).await
    }

    async fn project_work_summary(&self, name: &str) -> Result<Vec<WorkTypeReportRow>, ApiError> {
        ApiClient::project_work_summary(self, name).await
    }
}
