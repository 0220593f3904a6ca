//! Application facade over the backend, the query cache and the save flow.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::SessionStore;
use crate::backend::LaborBackend;
use crate::cache::{entity, CacheError, QueryCache, QueryKey, LATEST};
use crate::flow::{EditedEntries, SaveError, SaveFlow, SaveReceipt};
use crate::models::{
    Ack, DashboardRow, LaborCost, Project, ProjectInput, Summary, User, UserInput, UserRecord,
    WorkTypeReportRow,
};

/// One signed-in session against the backend.
///
/// Reads go through the cache; mutations go straight to the backend and
/// then invalidate every key whose data they change.
#[derive(Clone)]
pub struct SiteLog {
    backend: Arc<dyn LaborBackend>,
    session: SessionStore,
    cache: QueryCache,
    flow: SaveFlow,
}

impl SiteLog {
    pub fn new(backend: Arc<dyn LaborBackend>, session: SessionStore, cache: QueryCache) -> Self {
        let flow = SaveFlow::new(Arc::clone(&backend), cache.clone());
        Self {
            backend,
            session,
            cache,
            flow,
        }
    }

    pub fn from_client(client: ApiClient, cache: QueryCache) -> Self {
        let session = client.session().clone();
        Self::new(Arc::new(client), session, cache)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn flow(&self) -> &SaveFlow {
        &self.flow
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Drop the session and everything cached under it.
    pub fn logout(&self) {
        self.session.clear();
        self.cache.clear();
        info!("Logged out, cache cleared");
    }

    async fn cached<T, F, Fut>(&self, key: QueryKey, loader: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(Arc<dyn LaborBackend>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let result = self.cache.fetch(&key, move || loader(backend)).await;
        if let Err(e) = &result {
            if e.is_session_invalid() {
                warn!(key = %key, "Session rejected, dropping cached data");
                self.cache.clear();
            }
        }
        result
    }

    // ===== Reads =====

    pub async fn current_user(&self) -> Result<User, CacheError> {
        self.cached(QueryKey::current_user(), |b| async move { b.current_user().await })
            .await
    }

    pub async fn projects(&self) -> Result<BTreeMap<String, Project>, CacheError> {
        self.cached(QueryKey::projects(), |b| async move { b.projects().await })
            .await
    }

    /// Projects the signed-in user may open. Admins see every project.
    pub async fn visible_projects(&self) -> Result<BTreeMap<String, Project>, CacheError> {
        let mut projects = self.projects().await?;
        if let Some(user) = self.session.user() {
            projects.retain(|name, _| user.can_access(name));
        }
        Ok(projects)
    }

    pub async fn project(&self, name: &str) -> Result<Project, CacheError> {
        let name = name.to_string();
        self.cached(QueryKey::project(&name), move |b| async move {
            b.project(&name).await
        })
        .await
    }

    /// Summary for `date`, or for the backend's default date when `None`.
    pub async fn summary(&self, name: &str, date: Option<&str>) -> Result<Summary, CacheError> {
        let key = QueryKey::summary(name, date.unwrap_or(LATEST));
        let name = name.to_string();
        let date = date.map(str::to_owned);
        self.cached(key, move |b| async move {
            b.project_summary(&name, date.as_deref()).await
        })
        .await
    }

    pub async fn dates_with_data(&self, name: &str, month: Option<&str>) -> Result<Vec<String>, CacheError> {
        let key = QueryKey::dates_with_data(name, month);
        let name = name.to_string();
        let month = month.map(str::to_owned);
        self.cached(key, move |b| async move {
            b.dates_with_data(&name, month.as_deref()).await
        })
        .await
    }

    pub async fn admin_dashboard(&self) -> Result<Vec<DashboardRow>, CacheError> {
        self.cached(QueryKey::admin_dashboard(), |b| async move {
            b.admin_dashboard().await
        })
        .await
    }

    pub async fn users(&self) -> Result<BTreeMap<String, UserRecord>, CacheError> {
        self.cached(QueryKey::users(), |b| async move { b.users().await })
            .await
    }

    pub async fn labor_costs(&self) -> Result<BTreeMap<String, LaborCost>, CacheError> {
        self.cached(QueryKey::labor_costs(), |b| async move { b.labor_costs().await })
            .await
    }

    pub async fn available_work_types(&self) -> Result<Vec<String>, CacheError> {
        self.cached(QueryKey::available_work_types(), |b| async move {
            b.available_work_types().await
        })
        .await
    }

    pub async fn work_summary(&self, name: &str) -> Result<Vec<WorkTypeReportRow>, CacheError> {
        let name = name.to_string();
        self.cached(QueryKey::work_summary(&name), move |b| async move {
            b.project_work_summary(&name).await
        })
        .await
    }

    // ===== Daily entries =====

    pub async fn save_daily(
        &self,
        name: &str,
        date: &str,
        edited: &EditedEntries,
    ) -> Result<SaveReceipt, SaveError> {
        let result = self.flow.save(name, date, edited).await;
        if let Err(e) = &result {
            if e.is_session_invalid() {
                self.cache.clear();
            }
        }
        result
    }

    pub async fn add_work_type(&self, name: &str, work_type: &str) -> Result<Ack, ApiError> {
        let ack = self.backend.add_work_type(name, work_type).await?;
        self.cache.invalidate(&QueryKey::project(name));
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate(&QueryKey::available_work_types());
        Ok(ack)
    }

    // ===== Admin mutations =====

    pub async fn create_project(&self, input: &ProjectInput) -> Result<Ack, ApiError> {
        let ack = self.backend.create_project(input).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate(&QueryKey::admin_dashboard());
        self.cache.invalidate(&QueryKey::available_work_types());
        Ok(ack)
    }

    pub async fn update_project(&self, name: &str, input: &ProjectInput) -> Result<Ack, ApiError> {
        let ack = self.backend.update_project(name, input).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate_project(name);
        self.cache.invalidate(&QueryKey::admin_dashboard());
        if let Some(renamed) = input.project_name.as_deref().filter(|n| *n != name) {
            self.cache.invalidate_project(renamed);
        }
        Ok(ack)
    }

    pub async fn delete_project(&self, name: &str) -> Result<Ack, ApiError> {
        let ack = self.backend.delete_project(name).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate_project(name);
        self.cache.invalidate(&QueryKey::admin_dashboard());
        Ok(ack)
    }

    pub async fn create_user(&self, input: &UserInput) -> Result<Ack, ApiError> {
        let ack = self.backend.create_user(input).await?;
        self.cache.invalidate(&QueryKey::users());
        Ok(ack)
    }

    pub async fn update_user(&self, username: &str, input: &UserInput) -> Result<Ack, ApiError> {
        let ack = self.backend.update_user(username, input).await?;
        self.cache.invalidate(&QueryKey::users());
        if self.session.user().map(|u| u.username == username).unwrap_or(false) {
            self.cache.invalidate(&QueryKey::current_user());
        }
        Ok(ack)
    }

    pub async fn delete_user(&self, username: &str) -> Result<Ack, ApiError> {
        let ack = self.backend.delete_user(username).await?;
        self.cache.invalidate(&QueryKey::users());
        Ok(ack)
    }

    pub async fn save_labor_cost(
        &self,
        work_type: &str,
        day_cost: i64,
        night_cost: i64,
        midnight_cost: i64,
    ) -> Result<Ack, ApiError> {
        let ack = self
            .backend
            .save_labor_cost(work_type, day_cost, night_cost, midnight_cost)
            .await?;
        self.cache.invalidate(&QueryKey::labor_costs());
        // Reports price worker-days with the labor costs
        self.cache.invalidate_entity(entity::WORK_SUMMARY);
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionData;
    use crate::backend::fake::FakeBackend;
    use crate::models::{DailyEntry, Role};

    fn setup() -> (Arc<FakeBackend>, SiteLog) {
        let backend = Arc::new(FakeBackend::with_project("Site-1", &["Concrete"]));
        backend.projects.lock().unwrap().insert(
            "Site-2".to_string(),
            Project {
                name: "Site-2".to_string(),
                ..Default::default()
            },
        );
        let session = SessionStore::in_memory();
        let site = SiteLog::new(backend.clone(), session, QueryCache::default());
        (backend, site)
    }

    fn sign_in(site: &SiteLog, role: Role, projects: &[&str]) {
        let user = User {
            username: "kim".to_string(),
            role,
            projects: projects.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        site.session()
            .set(SessionData::new("token".to_string(), user))
            .unwrap();
    }

    #[tokio::test]
    async fn test_reads_are_cached() {
        let (backend, site) = setup();
        site.projects().await.unwrap();
        site.projects().await.unwrap();
        assert_eq!(FakeBackend::calls(&backend.projects_calls), 1);

        site.project("Site-1").await.unwrap();
        site.project("Site-1").await.unwrap();
        assert_eq!(FakeBackend::calls(&backend.project_calls), 1);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_reads() {
        let (backend, site) = setup();
        assert_eq!(site.projects().await.unwrap().len(), 2);

        site.delete_project("Site-2").await.unwrap();
        assert!(site.cache().entry(&QueryKey::projects()).unwrap().invalidated);
        assert_eq!(site.projects().await.unwrap().len(), 1);
        assert_eq!(FakeBackend::calls(&backend.projects_calls), 2);
        assert_eq!(*backend.mutations.lock().unwrap(), vec!["delete_project".to_string()]);
    }

    #[tokio::test]
    async fn test_add_work_type_refreshes_project() {
        let (_backend, site) = setup();
        assert_eq!(site.project("Site-1").await.unwrap().work_types, vec!["Concrete"]);

        site.add_work_type("Site-1", "Rebar").await.unwrap();
        let project = site.project("Site-1").await.unwrap();
        assert!(project.has_work_type("Rebar"));
    }

    #[tokio::test]
    async fn test_save_invalidates_project_and_dates() {
        let (backend, site) = setup();
        assert!(site.dates_with_data("Site-1", None).await.unwrap().is_empty());
        site.project("Site-1").await.unwrap();

        let edited = EditedEntries::new().with("Concrete", DailyEntry::new(3, 1, 0, 15.0));
        site.save_daily("Site-1", "2024-05-01", &edited).await.unwrap();

        assert_eq!(
            site.dates_with_data("Site-1", None).await.unwrap(),
            vec!["2024-05-01".to_string()]
        );
        let project = site.project("Site-1").await.unwrap();
        assert_eq!(project.entry("2024-05-01", "Concrete").map(|e| e.day), Some(3));
        assert_eq!(FakeBackend::calls(&backend.project_calls), 2);

        let latest = site.summary("Site-1", None).await.unwrap();
        assert_eq!(latest.totals.today, 4);
    }

    #[tokio::test]
    async fn test_visible_projects_filters_by_assignment() {
        let (_backend, site) = setup();
        sign_in(&site, Role::User, &["Site-2"]);
        let visible = site.visible_projects().await.unwrap();
        assert_eq!(visible.keys().collect::<Vec<_>>(), vec!["Site-2"]);

        sign_in(&site, Role::Admin, &[]);
        assert_eq!(site.visible_projects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_cache() {
        let (_backend, site) = setup();
        sign_in(&site, Role::User, &["Site-1"]);
        site.projects().await.unwrap();
        assert!(!site.cache().is_empty());

        site.logout();
        assert!(site.cache().is_empty());
        assert!(!site.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_session_rejection_clears_cache() {
        let (backend, site) = setup();
        site.projects().await.unwrap();
        backend.fail_next_save(ApiError::SessionInvalid);

        let edited = EditedEntries::new().with("Concrete", DailyEntry::new(1, 0, 0, 0.0));
        let err = site.save_daily("Site-1", "2024-05-01", &edited).await.unwrap_err();
        assert!(err.is_session_invalid());
        assert!(site.cache().is_empty());
    }
}
