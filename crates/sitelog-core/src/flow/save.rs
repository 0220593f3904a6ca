use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::backend::LaborBackend;
use crate::cache::{entity, CacheEntry, QueryCache, QueryKey};
use crate::models::Summary;

use super::entries::{provisional_summary, EditedEntries};
use super::SaveError;

/// Where a save for one project and date stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveState {
    #[default]
    Idle,
    /// Optimistic value written, network write outstanding.
    Pending,
    Committed,
    RolledBack,
}

/// Result of a committed save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReceipt {
    pub project: String,
    pub date: String,
    pub saved_count: u32,
    pub message: Option<String>,
    /// What was shown while the write was in flight, if a summary was cached.
    pub provisional: Option<Summary>,
}

type Target = (String, String);

/// Optimistic save of daily entries.
///
/// The cached summary for the project and date is replaced with a
/// provisional one before the network write. On success the summary is
/// invalidated so the next read shows the backend's numbers; on failure
/// the cached entry is restored exactly as it was.
#[derive(Clone)]
pub struct SaveFlow {
    backend: Arc<dyn LaborBackend>,
    cache: QueryCache,
    states: Arc<Mutex<HashMap<Target, SaveState>>>,
}

impl SaveFlow {
    pub fn new(backend: Arc<dyn LaborBackend>, cache: QueryCache) -> Self {
        Self {
            backend,
            cache,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn state(&self, project: &str, date: &str) -> SaveState {
        self.lock()
            .get(&(project.to_string(), date.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Forget a finished outcome. A pending save is left alone.
    pub fn reset(&self, project: &str, date: &str) {
        let mut states = self.lock();
        let target = (project.to_string(), date.to_string());
        if states.get(&target) != Some(&SaveState::Pending) {
            states.remove(&target);
        }
    }

    pub async fn save(
        &self,
        project: &str,
        date: &str,
        edited: &EditedEntries,
    ) -> Result<SaveReceipt, SaveError> {
        edited.validate()?;

        let key = QueryKey::summary(project, date);
        let mut pending = self.begin(project, date, key.clone())?;

        // A fetch finishing after the optimistic write would clobber it
        self.cache.cancel(&key);
        let snapshot = self.cache.snapshot(&key);

        let provisional = match self.cache.read::<Summary>(&key) {
            Some(previous) => {
                let provisional = provisional_summary(&previous, edited);
                match self.cache.write(&key, &provisional) {
                    Ok(()) => Some(provisional),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Optimistic write failed");
                        None
                    }
                }
            }
            None => {
                debug!(key = %key, "No cached summary, skipping optimistic write");
                None
            }
        };
        pending.snapshot = Some(snapshot);

        debug!(project, date, entries = edited.len(), "Saving daily entries");
        match self
            .backend
            .save_daily_data(project, date, edited.as_map())
            .await
        {
            Ok(ack) => {
                pending.commit();
                self.invalidate_after_save(project);
                info!(project, date, saved = ?ack.saved_count, "Daily entries saved");
                Ok(SaveReceipt {
                    project: project.to_string(),
                    date: date.to_string(),
                    saved_count: ack.saved_count.unwrap_or(edited.len() as u32),
                    message: ack.message,
                    provisional,
                })
            }
            Err(source) => {
                pending.roll_back();
                warn!(project, date, error = %source, "Save failed, rolled back");
                Err(SaveError::Rollback { source })
            }
        }
    }

    fn begin(&self, project: &str, date: &str, key: QueryKey) -> Result<Pending, SaveError> {
        let target = (project.to_string(), date.to_string());
        let mut states = self.lock();
        if states.get(&target) == Some(&SaveState::Pending) {
            return Err(SaveError::InProgress {
                project: project.to_string(),
                date: date.to_string(),
            });
        }
        states.insert(target.clone(), SaveState::Pending);
        Ok(Pending {
            states: Arc::clone(&self.states),
            cache: self.cache.clone(),
            target,
            key,
            snapshot: None,
            outcome: None,
        })
    }

    /// Every summary of the project is dropped, not just the saved date's:
    /// cumulative totals of later dates include it.
    fn invalidate_after_save(&self, project: &str) {
        self.cache.invalidate(&QueryKey::project(project));
        self.cache.invalidate_if(|k| {
            k.is_for_project(project)
                && matches!(
                    k.entity(),
                    entity::PROJECT_SUMMARY | entity::DATES_WITH_DATA | entity::WORK_SUMMARY
                )
        });
        self.cache.invalidate_entity(entity::ADMIN_DASHBOARD);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Target, SaveState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Marks a target as pending for its lifetime.
///
/// Dropped without an outcome (the save future was cancelled) it restores
/// the snapshot and returns the target to idle.
struct Pending {
    states: Arc<Mutex<HashMap<Target, SaveState>>>,
    cache: QueryCache,
    target: Target,
    key: QueryKey,
    snapshot: Option<Option<CacheEntry>>,
    outcome: Option<SaveState>,
}

impl Pending {
    fn commit(&mut self) {
        self.snapshot = None;
        self.outcome = Some(SaveState::Committed);
    }

    fn roll_back(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.cache.restore(&self.key, snapshot);
        }
        self.outcome = Some(SaveState::RolledBack);
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        match self.outcome {
            Some(outcome) => {
                // Only the latest outcome per project is kept
                let project = &self.target.0;
                states.retain(|(p, _), state| p != project || *state == SaveState::Pending);
                states.insert(self.target.clone(), outcome);
            }
            None => {
                if let Some(snapshot) = self.snapshot.take() {
                    warn!(key = %self.key, "Save abandoned, restoring cached summary");
                    self.cache.restore(&self.key, snapshot);
                }
                states.remove(&self.target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::ApiError;
    use crate::backend::fake::FakeBackend;
    use crate::cache::ValueOrigin;
    use crate::models::DailyEntry;

    const PROJECT: &str = "Site-1";
    const DATE: &str = "2024-05-01";

    fn setup() -> (Arc<FakeBackend>, QueryCache, SaveFlow) {
        let backend = Arc::new(FakeBackend::with_project(PROJECT, &["Concrete", "Rebar", "Formwork"]));
        backend.seed(PROJECT, "2024-04-30", "Concrete", DailyEntry::new(4, 0, 0, 20.0));
        backend.seed(PROJECT, DATE, "Formwork", DailyEntry::new(2, 0, 0, 5.0));
        let cache = QueryCache::default();
        let flow = SaveFlow::new(backend.clone(), cache.clone());
        (backend, cache, flow)
    }

    fn example() -> EditedEntries {
        EditedEntries::new()
            .with("Concrete", DailyEntry::new(5, 2, 0, 40.0))
            .with("Rebar", DailyEntry::new(3, 0, 0, 10.0))
    }

    async fn fetch_summary(backend: &Arc<FakeBackend>, cache: &QueryCache) -> Summary {
        fetch_summary_on(backend, cache, DATE).await
    }

    async fn fetch_summary_on(backend: &Arc<FakeBackend>, cache: &QueryCache, date: &str) -> Summary {
        let backend = backend.clone();
        let day = date.to_string();
        cache
            .fetch(&QueryKey::summary(PROJECT, date), move || async move {
                backend.project_summary(PROJECT, Some(&day)).await
            })
            .await
            .unwrap()
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..1000 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    fn spawn_save(flow: &SaveFlow, edited: EditedEntries) -> tokio::task::JoinHandle<Result<SaveReceipt, SaveError>> {
        let flow = flow.clone();
        tokio::spawn(async move { flow.save(PROJECT, DATE, &edited).await })
    }

    #[tokio::test]
    async fn test_optimistic_then_backend_total() {
        let (backend, cache, flow) = setup();
        let before = fetch_summary(&backend, &cache).await;
        assert_eq!(before.totals.today, 2);
        assert_eq!(before.totals.cumulative, 6);

        let gate = backend.gate_save();
        let save = spawn_save(&flow, example());
        wait_until(|| FakeBackend::calls(&backend.save_calls) == 1).await;

        let key = QueryKey::summary(PROJECT, DATE);
        let shown: Summary = cache.read(&key).unwrap();
        assert_eq!(shown.totals.today, 10);
        assert_eq!(shown.totals.cumulative, 16);
        assert!(cache.entry(&key).unwrap().is_provisional());
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Pending);

        gate.send(()).unwrap();
        let receipt = save.await.unwrap().unwrap();
        assert_eq!(receipt.saved_count, 2);
        assert_eq!(receipt.provisional.map(|s| s.totals.today), Some(10));
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Committed);
        assert!(cache.entry(&key).unwrap().invalidated);

        // Backend also counts the Formwork entry saved earlier
        let after = fetch_summary(&backend, &cache).await;
        assert_eq!(after.totals.today, 12);
        assert_eq!(FakeBackend::calls(&backend.summary_calls), 2);
        assert_eq!(cache.entry(&key).unwrap().origin, Some(ValueOrigin::Server));
    }

    #[tokio::test]
    async fn test_failed_save_restores_snapshot_exactly() {
        let (backend, cache, flow) = setup();
        fetch_summary(&backend, &cache).await;
        let key = QueryKey::summary(PROJECT, DATE);
        let snapshot = cache.entry(&key);

        backend.fail_next_save(ApiError::Request {
            status: 500,
            message: "Database unavailable".to_string(),
        });
        let err = flow.save(PROJECT, DATE, &example()).await.unwrap_err();

        assert!(matches!(err, SaveError::Rollback { .. }));
        assert!(!err.is_session_invalid());
        assert_eq!(cache.entry(&key), snapshot);
        assert_eq!(flow.state(PROJECT, DATE), SaveState::RolledBack);
    }

    #[tokio::test]
    async fn test_failed_save_without_cached_summary_leaves_no_entry() {
        let (backend, cache, flow) = setup();
        backend.fail_next_save(ApiError::Timeout);

        let err = flow.save(PROJECT, DATE, &example()).await.unwrap_err();
        assert_eq!(err, SaveError::Rollback { source: ApiError::Timeout });
        assert!(cache.entry(&QueryKey::summary(PROJECT, DATE)).is_none());
    }

    #[tokio::test]
    async fn test_session_expiry_during_save_rolls_back() {
        let (backend, cache, flow) = setup();
        fetch_summary(&backend, &cache).await;
        let key = QueryKey::summary(PROJECT, DATE);
        let snapshot = cache.entry(&key);

        backend.fail_next_save(ApiError::SessionInvalid);
        let err = flow.save(PROJECT, DATE, &example()).await.unwrap_err();
        assert!(err.is_session_invalid());
        assert_eq!(cache.entry(&key), snapshot);
    }

    #[tokio::test]
    async fn test_empty_submission_makes_no_request() {
        let (backend, cache, flow) = setup();
        fetch_summary(&backend, &cache).await;
        let key = QueryKey::summary(PROJECT, DATE);
        let snapshot = cache.entry(&key);

        let err = flow.save(PROJECT, DATE, &EditedEntries::new()).await.unwrap_err();
        assert!(matches!(err, SaveError::Validation(_)));
        assert_eq!(FakeBackend::calls(&backend.save_calls), 0);
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Idle);
        assert_eq!(cache.entry(&key), snapshot);
    }

    #[tokio::test]
    async fn test_out_of_range_progress_rejected() {
        let (backend, _cache, flow) = setup();
        let edited = EditedEntries::new().with("Concrete", DailyEntry::new(1, 0, 0, 101.0));
        assert!(matches!(
            flow.save(PROJECT, DATE, &edited).await,
            Err(SaveError::Validation(_))
        ));
        assert_eq!(FakeBackend::calls(&backend.save_calls), 0);
    }

    #[tokio::test]
    async fn test_second_save_for_same_target_rejected() {
        let (backend, _cache, flow) = setup();
        let gate = backend.gate_save();
        let first = spawn_save(&flow, example());
        wait_until(|| FakeBackend::calls(&backend.save_calls) == 1).await;

        let err = flow.save(PROJECT, DATE, &example()).await.unwrap_err();
        assert_eq!(
            err,
            SaveError::InProgress {
                project: PROJECT.to_string(),
                date: DATE.to_string(),
            }
        );

        // Other dates are independent
        let other = flow.save(PROJECT, "2024-05-02", &example()).await.unwrap();
        assert_eq!(other.date, "2024-05-02");

        gate.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(FakeBackend::calls(&backend.save_calls), 2);

        // Allowed again once the first finished
        flow.save(PROJECT, DATE, &example()).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_discards_outstanding_summary_fetch() {
        let (backend, _, _) = setup();
        let cache = QueryCache::new(Duration::ZERO);
        let flow = SaveFlow::new(backend.clone(), cache.clone());
        fetch_summary(&backend, &cache).await;
        let key = QueryKey::summary(PROJECT, DATE);

        let summary_gate = backend.gate_summary();
        let refetch = {
            let backend = backend.clone();
            let cache = cache.clone();
            tokio::spawn(async move { fetch_summary(&backend, &cache).await })
        };
        wait_until(|| FakeBackend::calls(&backend.summary_calls) == 2).await;

        let save_gate = backend.gate_save();
        let save = spawn_save(&flow, example());
        wait_until(|| FakeBackend::calls(&backend.save_calls) == 1).await;

        // The refetch resolves with pre-save numbers; it must not replace
        // the provisional summary
        summary_gate.send(()).unwrap();
        assert_eq!(refetch.await.unwrap().totals.today, 2);
        let shown: Summary = cache.read(&key).unwrap();
        assert_eq!(shown.totals.today, 10);

        save_gate.send(()).unwrap();
        save.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_save_restores_and_clears_pending() {
        let (backend, cache, flow) = setup();
        fetch_summary(&backend, &cache).await;
        let key = QueryKey::summary(PROJECT, DATE);
        let snapshot = cache.entry(&key);

        let _gate = backend.gate_save();
        let save = spawn_save(&flow, example());
        wait_until(|| FakeBackend::calls(&backend.save_calls) == 1).await;
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Pending);

        save.abort();
        assert!(save.await.unwrap_err().is_cancelled());
        assert_eq!(cache.entry(&key), snapshot);
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Idle);
    }

    #[tokio::test]
    async fn test_reset_clears_outcome() {
        let (_backend, _cache, flow) = setup();
        flow.save(PROJECT, DATE, &example()).await.unwrap();
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Committed);
        flow.reset(PROJECT, DATE);
        assert_eq!(flow.state(PROJECT, DATE), SaveState::Idle);
    }

    #[tokio::test]
    async fn test_save_refreshes_later_cumulative_totals() {
        let (backend, cache, flow) = setup();
        let later = "2024-05-02";
        let before = fetch_summary_on(&backend, &cache, later).await;
        assert_eq!(before.totals.today, 0);
        assert_eq!(before.totals.cumulative, 6);

        flow.save(PROJECT, DATE, &example()).await.unwrap();
        assert!(cache.entry(&QueryKey::summary(PROJECT, later)).unwrap().invalidated);

        let after = fetch_summary_on(&backend, &cache, later).await;
        assert_eq!(after.totals.cumulative, 16);
        assert_eq!(FakeBackend::calls(&backend.summary_calls), 2);
    }

    #[tokio::test]
    async fn test_save_leaves_other_projects_cached() {
        let (backend, cache, flow) = setup();
        let other = QueryKey::summary("Site-2", DATE);
        cache.write(&other, &Summary::default()).unwrap();

        flow.save(PROJECT, DATE, &example()).await.unwrap();
        assert!(!cache.entry(&other).unwrap().invalidated);
        assert_eq!(FakeBackend::calls(&backend.save_calls), 1);
    }

    #[tokio::test]
    async fn test_only_latest_outcome_per_project_is_kept() {
        let (_backend, _cache, flow) = setup();
        for day in 1..=5 {
            let date = format!("2024-06-{:02}", day);
            flow.save(PROJECT, &date, &example()).await.unwrap();
        }
        assert_eq!(flow.lock().len(), 1);
        assert_eq!(flow.state(PROJECT, "2024-06-05"), SaveState::Committed);
        assert_eq!(flow.state(PROJECT, "2024-06-01"), SaveState::Idle);
    }
}
