use std::collections::BTreeMap;

use crate::models::{DailyEntry, Summary};

use super::SaveError;

/// Work-type entries edited for one project and date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditedEntries {
    entries: BTreeMap<String, DailyEntry>,
}

impl EditedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `work_type`.
    pub fn insert(&mut self, work_type: impl Into<String>, entry: DailyEntry) -> &mut Self {
        self.entries.insert(work_type.into(), entry);
        self
    }

    pub fn with(mut self, work_type: impl Into<String>, entry: DailyEntry) -> Self {
        self.insert(work_type, entry);
        self
    }

    pub fn get(&self, work_type: &str) -> Option<&DailyEntry> {
        self.entries.get(work_type)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DailyEntry)> {
        self.entries.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<String, DailyEntry> {
        &self.entries
    }

    /// Day plus night plus midnight workers across every edited work type.
    pub fn total_workers(&self) -> u64 {
        self.entries.values().map(DailyEntry::workers).sum()
    }

    pub fn validate(&self) -> Result<(), SaveError> {
        if self.entries.is_empty() {
            return Err(SaveError::Validation("No entries to save".to_string()));
        }
        for (work_type, entry) in &self.entries {
            if work_type.trim().is_empty() {
                return Err(SaveError::Validation("Work type name is empty".to_string()));
            }
            if !entry.progress.is_finite() || !(0.0..=100.0).contains(&entry.progress) {
                return Err(SaveError::Validation(format!(
                    "Progress for {} must be between 0 and 100, got {}",
                    work_type, entry.progress
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, DailyEntry)> for EditedEntries {
    fn from_iter<I: IntoIterator<Item = (String, DailyEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Summary to show while a save is in flight.
///
/// `today` becomes the edited worker total and `cumulative` grows by the
/// same amount. Health and unknown fields are kept from `previous`.
pub fn provisional_summary(previous: &Summary, edited: &EditedEntries) -> Summary {
    let today = edited.total_workers();
    let mut summary = previous.clone();
    summary.totals.today = today;
    summary.totals.cumulative = previous.totals.cumulative.saturating_add(today);
    summary
}
