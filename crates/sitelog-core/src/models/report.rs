//! Admin dashboard and report rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::HealthTier;

/// One project row on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    pub project_name: String,
    #[serde(default)]
    pub recent_date: Option<String>,
    #[serde(default)]
    pub today_workers: u64,
    #[serde(default)]
    pub cumulative_workers: u64,
    #[serde(default)]
    pub avg_progress: f64,
    #[serde(default)]
    pub schedule_rate: f64,
    #[serde(default)]
    pub work_count: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_color: HealthTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_meta: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardResponse {
    #[serde(default)]
    pub dashboard: Vec<DashboardRow>,
}

/// Per work-type cost position of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkTypeReportRow {
    pub work_type: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub contract_amount: i64,
    #[serde(default)]
    pub total_workers: u64,
    #[serde(default)]
    pub labor_rate: i64,
    #[serde(default)]
    pub total_labor_cost: i64,
    /// Contract amount minus labor cost so far; negative when over budget.
    #[serde(default)]
    pub balance: i64,
}

impl WorkTypeReportRow {
    pub fn is_over_budget(&self) -> bool {
        self.balance < 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkSummaryResponse {
    #[serde(default)]
    pub summary: Vec<WorkTypeReportRow>,
}

/// Generic `{message}` acknowledgement from write endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub saved_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthCheck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_row_parse() {
        let json = r#"{"dashboard": [{
            "project_name": "Site-1", "recent_date": "2024-05-01",
            "today_workers": 12, "cumulative_workers": 120,
            "schedule_rate": 33.3, "avg_progress": 33.3, "work_count": 3,
            "status": "warning", "status_color": "warning",
            "health_meta": {"flags": {"cost": "warn"}}
        }]}"#;
        let parsed: DashboardResponse = serde_json::from_str(json).unwrap();
        let row = &parsed.dashboard[0];
        assert_eq!(row.today_workers, 12);
        assert_eq!(row.status_color, HealthTier::Warning);
        assert!(row.health_meta.is_some());
    }

    #[test]
    fn test_report_over_budget() {
        let row = WorkTypeReportRow {
            work_type: "Paint".to_string(),
            contract_amount: 200_000,
            total_labor_cost: 240_000,
            balance: -40_000,
            ..Default::default()
        };
        assert!(row.is_over_budget());
    }
}
