use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::DailyEntry;

/// Unit cost of one worker per shift for a work type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaborCost {
    #[serde(default)]
    pub day: i64,
    #[serde(default)]
    pub night: i64,
    #[serde(default)]
    pub midnight: i64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
}

impl LaborCost {
    /// Cost of one day's entry at these rates.
    pub fn cost_of(&self, entry: &DailyEntry) -> i64 {
        i64::from(entry.day) * self.day
            + i64::from(entry.night) * self.night
            + i64::from(entry.midnight) * self.midnight
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaborCostsResponse {
    #[serde(default)]
    pub labor_costs: BTreeMap<String, LaborCost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LaborCostInput<'a> {
    pub work_type: &'a str,
    pub day_cost: i64,
    pub night_cost: i64,
    pub midnight_cost: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkTypesResponse {
    #[serde(default)]
    pub work_types: Vec<String>,
}

/// Existing work types whose names overlap a proposed one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimilarityResult {
    #[serde(default)]
    pub similar_types: Vec<String>,
    #[serde(default)]
    pub has_similarity: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_of_entry() {
        let rates = LaborCost {
            day: 120_000,
            night: 150_000,
            midnight: 180_000,
            ..Default::default()
        };
        let entry = DailyEntry::new(2, 1, 1, 0.0);
        assert_eq!(rates.cost_of(&entry), 570_000);
    }

    #[test]
    fn test_labor_costs_parse() {
        let json = r#"{"labor_costs": {"Paint": {"day": 120000, "night": 150000, "midnight": 180000, "locked": false}}}"#;
        let parsed: LaborCostsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.labor_costs["Paint"].night, 150_000);
    }
}
