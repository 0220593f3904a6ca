use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Worker counts for one work type on one date, split by shift.
///
/// A saved entry always supersedes the previous one for the same
/// work type and date; the backend never merges fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub night: u32,
    #[serde(default)]
    pub midnight: u32,
    /// Progress percentage, 0-100, fractional.
    #[serde(default)]
    pub progress: f64,
    /// Computed by the backend; never sent on save.
    #[serde(default, skip_serializing)]
    pub total: Option<u32>,
}

impl DailyEntry {
    pub fn new(day: u32, night: u32, midnight: u32, progress: f64) -> Self {
        Self {
            day,
            night,
            midnight,
            progress,
            total: None,
        }
    }

    /// Sum of the three shifts. Ignores the server `total` field.
    pub fn workers(&self) -> u64 {
        u64::from(self.day) + u64::from(self.night) + u64::from(self.midnight)
    }

    /// Server total when present, otherwise the shift sum.
    pub fn total_or_sum(&self) -> u64 {
        self.total.map(u64::from).unwrap_or_else(|| self.workers())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Inactive,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Inactive => write!(f, "inactive"),
            ProjectStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Date (`YYYY-MM-DD`) -> work type -> entry.
pub type DailyData = BTreeMap<String, BTreeMap<String, DailyEntry>>;

/// A construction project as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    /// Ordered; the order is the display order of the input form.
    #[serde(default)]
    pub work_types: Vec<String>,
    #[serde(default)]
    pub daily_data: DailyData,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub created_date: Option<String>,
    /// Contracted labor amount per work type.
    #[serde(default)]
    pub contracts: BTreeMap<String, i64>,
    /// Subcontractor company per work type.
    #[serde(default)]
    pub companies: BTreeMap<String, String>,
}

impl Project {
    pub fn entry(&self, date: &str, work_type: &str) -> Option<&DailyEntry> {
        self.daily_data.get(date).and_then(|d| d.get(work_type))
    }

    pub fn has_work_type(&self, work_type: &str) -> bool {
        self.work_types.iter().any(|w| w == work_type)
    }

    /// Dates carrying data, sorted ascending. `month` is a `YYYY-MM` prefix.
    pub fn dates_with_data(&self, month: Option<&str>) -> Vec<&str> {
        self.daily_data
            .keys()
            .map(String::as_str)
            .filter(|d| month.map_or(true, |m| d.starts_with(m)))
            .collect()
    }

    pub fn most_recent_date(&self) -> Option<&str> {
        self.daily_data.keys().next_back().map(String::as_str)
    }

    pub fn contract_total(&self) -> i64 {
        self.work_types
            .iter()
            .filter_map(|w| self.contracts.get(w))
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectsResponse {
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectResponse {
    pub project: Project,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatesResponse {
    #[serde(default)]
    pub dates: Vec<String>,
}

/// Request body for creating or updating a project (admin only).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub work_types: Vec<String>,
    pub contracts: BTreeMap<String, i64>,
    pub companies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_entry_partial_fields_default_to_zero() {
        let entry: DailyEntry = serde_json::from_str(r#"{"day": 3}"#).unwrap();
        assert_eq!(entry, DailyEntry::new(3, 0, 0, 0.0));
        assert_eq!(entry.workers(), 3);
    }

    #[test]
    fn test_daily_entry_total_not_serialized() {
        let entry: DailyEntry =
            serde_json::from_str(r#"{"day": 1, "night": 2, "midnight": 3, "progress": 12.5, "total": 7}"#)
                .unwrap();
        assert_eq!(entry.total_or_sum(), 7);
        assert_eq!(entry.workers(), 6);

        let json = serde_json::to_value(entry).unwrap();
        assert!(json.get("total").is_none());
        assert_eq!(json["progress"], 12.5);
    }

    #[test]
    fn test_project_parses_backend_shape() {
        let json = r#"{
            "id": "Site-1",
            "name": "Site-1",
            "work_types": ["Concrete", "Rebar"],
            "daily_data": {
                "2024-05-02": {"Concrete": {"day": 4, "night": 0, "midnight": 0, "progress": 10, "total": 4}},
                "2024-04-30": {"Rebar": {"day": 2, "night": 1, "midnight": 0, "progress": 5, "total": 3}}
            },
            "status": "active",
            "contracts": {"Concrete": 200000, "Rebar": 150000},
            "companies": {"Concrete": "Acme"}
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.name, "Site-1");
        assert_eq!(project.work_types, vec!["Concrete", "Rebar"]);
        assert!(project.has_work_type("Rebar"));
        assert_eq!(project.entry("2024-05-02", "Concrete").map(|e| e.day), Some(4));
        assert_eq!(project.most_recent_date(), Some("2024-05-02"));
        assert_eq!(project.dates_with_data(Some("2024-05")), vec!["2024-05-02"]);
        assert_eq!(project.dates_with_data(None).len(), 2);
        assert_eq!(project.contract_total(), 350000);
    }

    #[test]
    fn test_unknown_project_status() {
        let project: Project = serde_json::from_str(r#"{"status": "archived"}"#).unwrap();
        assert_eq!(project.status, ProjectStatus::Unknown);
        assert!(project.name.is_empty());
    }
}
