//! Backend-computed project summaries.
//!
//! The client never recomputes these authoritatively. Fields the client
//! does not model are kept in `extra` so that a decoded summary can be
//! re-encoded without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Color tier of a health classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    #[default]
    Success,
    Warning,
    Danger,
    Info,
    Secondary,
    #[serde(other)]
    Unknown,
}

impl HealthTier {
    pub fn label(&self) -> &'static str {
        match self {
            HealthTier::Success => "on track",
            HealthTier::Warning => "warning",
            HealthTier::Danger => "at risk",
            HealthTier::Info => "started",
            HealthTier::Secondary => "waiting",
            HealthTier::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default)]
    pub today: u64,
    #[serde(default)]
    pub cumulative: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_progress: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Some backend versions send the health as a bare status label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HealthRepr")]
pub struct Health {
    pub status: String,
    pub color: HealthTier,
    pub meta: HealthMeta,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HealthRepr {
    Label(String),
    Full {
        #[serde(default)]
        status: String,
        #[serde(default)]
        color: HealthTier,
        #[serde(default)]
        meta: HealthMeta,
    },
}

impl From<HealthRepr> for Health {
    fn from(repr: HealthRepr) -> Self {
        match repr {
            HealthRepr::Label(status) => Health {
                status,
                ..Default::default()
            },
            HealthRepr::Full {
                status,
                color,
                meta,
            } => Health {
                status,
                color,
                meta,
            },
        }
    }
}

/// Aggregate totals and health for one project on one date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub totals: Totals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Summary {
    pub fn progress_rate(&self) -> f64 {
        self.health
            .as_ref()
            .and_then(|h| h.meta.progress_rate.or(h.meta.avg_progress))
            .unwrap_or(0.0)
    }

    pub fn status_label(&self) -> &str {
        self.health
            .as_ref()
            .map(|h| h.status.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("-")
    }

    pub fn tier(&self) -> HealthTier {
        self.health.as_ref().map(|h| h.color).unwrap_or_default()
    }
}
