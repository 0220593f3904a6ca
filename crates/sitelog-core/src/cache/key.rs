use std::fmt;

/// Entity names used in query keys.
pub mod entity {
    pub const CURRENT_USER: &str = "current-user";
    pub const PROJECTS: &str = "projects";
    pub const PROJECT: &str = "project";
    pub const PROJECT_SUMMARY: &str = "project-summary";
    pub const DATES_WITH_DATA: &str = "dates-with-data";
    pub const ADMIN_DASHBOARD: &str = "admin-dashboard";
    pub const USERS: &str = "users";
    pub const LABOR_COSTS: &str = "labor-costs";
    pub const AVAILABLE_WORK_TYPES: &str = "available-work-types";
    pub const WORK_SUMMARY: &str = "work-summary";
}

/// Date parameter used when the backend chooses the date.
pub const LATEST: &str = "latest";

/// Identifies one cached query: an entity plus its parameters.
///
/// Two keys are equal exactly when their serialized forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    entity: String,
    params: Vec<String>,
}

impl QueryKey {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            params: Vec::new(),
        }
    }

    pub fn with(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn current_user() -> Self {
        Self::new(entity::CURRENT_USER)
    }

    pub fn projects() -> Self {
        Self::new(entity::PROJECTS)
    }

    pub fn project(name: &str) -> Self {
        Self::new(entity::PROJECT).with(name)
    }

    pub fn summary(project: &str, date: &str) -> Self {
        Self::new(entity::PROJECT_SUMMARY).with(project).with(date)
    }

    /// Summary for whatever date the backend picks when none is given.
    pub fn latest_summary(project: &str) -> Self {
        Self::summary(project, LATEST)
    }

    /// `month` is `YYYY-MM`; `None` covers every date.
    pub fn dates_with_data(project: &str, month: Option<&str>) -> Self {
        Self::new(entity::DATES_WITH_DATA)
            .with(project)
            .with(month.unwrap_or("*"))
    }

    pub fn admin_dashboard() -> Self {
        Self::new(entity::ADMIN_DASHBOARD)
    }

    pub fn users() -> Self {
        Self::new(entity::USERS)
    }

    pub fn labor_costs() -> Self {
        Self::new(entity::LABOR_COSTS)
    }

    pub fn available_work_types() -> Self {
        Self::new(entity::AVAILABLE_WORK_TYPES)
    }

    pub fn work_summary(project: &str) -> Self {
        Self::new(entity::WORK_SUMMARY).with(project)
    }

    /// Deterministic serialization: a JSON array of entity then params.
    pub fn serialized(&self) -> String {
        let parts: Vec<&str> = std::iter::once(self.entity.as_str())
            .chain(self.params.iter().map(String::as_str))
            .collect();
        serde_json::to_string(&parts).unwrap_or_default()
    }

    /// True when this key belongs to `project` (first parameter).
    pub fn is_for_project(&self, project: &str) -> bool {
        self.params.first().map(String::as_str) == Some(project)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized())
    }
}
