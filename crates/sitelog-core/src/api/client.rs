//! API client for the labor-tracking REST service.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests to read projects and summaries, save daily entries, and run
//! the admin endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::{SessionData, SessionStore};
use crate::models::{
    Ack, DailyEntry, DashboardResponse, DashboardRow, DatesResponse, HealthCheck, LaborCost,
    LaborCostInput, LaborCostsResponse, LoginRequest, LoginResponse, Project, ProjectInput,
    ProjectResponse, ProjectsResponse, SimilarityResult, Summary, User, UserInput, UserRecord,
    UsersResponse, WorkSummaryResponse, WorkTypeReportRow, WorkTypesResponse,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) GET requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// API client for the labor-tracking backend.
/// Clone is cheap - reqwest::Client and SessionStore are both Arc inside.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:5000`).
    pub fn new(base_url: &str, session: SessionStore) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            session,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        session: SessionStore,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    #[cfg(test)]
    fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn segment(value: &str) -> String {
        utf8_percent_encode(value, PATH_SEGMENT).to_string()
    }

    /// Headers for an authenticated request. The token is read from the
    /// session store each time, never cached on the client.
    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.session.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Map a non-2xx response to an error. A 401 clears the stored session.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected the session token, clearing stored session");
            self.session.clear();
        }
        Err(ApiError::from_status(status, &body))
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            debug!(url = url, error = %e, "Failed to decode response body");
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .query(query)
                .send()
                .await?;

            match self.check_response(response).await {
                Ok(response) => return Self::decode(response, &url).await,
                Err(ApiError::RateLimited) if retries < MAX_RATE_LIMIT_RETRIES => {
                    retries += 1;
                    warn!(url = %url, retry = retries, ?backoff, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.auth_headers()?);
        if let Some(body) = body {
            request = request.json(body);
        }
        debug!(method = %method, url = %url, "Sending request");
        let response = request.send().await?;
        let response = self.check_response(response).await?;
        Self::decode(response, &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::DELETE, path, None).await
    }

    // ===== Auth =====

    /// Log in and store the returned token and profile in the session.
    ///
    /// A 401 here means bad credentials, so it is reported as a request
    /// error rather than `SessionInvalid`.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let url = self.url("/auth/login");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Request {
                status: status.as_u16(),
                message: ApiError::message_from_body(&body),
            });
        }

        let login: LoginResponse = Self::decode(response, &url).await?;
        if let Err(e) = self
            .session
            .set(SessionData::new(login.access_token, login.user.clone()))
        {
            warn!(error = %e, "Failed to save session");
        }
        info!(username = %login.user.username, role = %login.user.role, "Login successful");
        Ok(login.user)
    }

    pub fn logout(&self) {
        self.session.clear();
        info!("Logged out");
    }

    /// Fetch the current user and refresh the stored profile.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let user: User = self.get("/auth/me", &[]).await?;
        if let Err(e) = self.session.set_user(user.clone()) {
            warn!(error = %e, "Failed to save refreshed profile");
        }
        Ok(user)
    }

    // ===== Projects =====

    pub async fn projects(&self) -> Result<BTreeMap<String, Project>, ApiError> {
        let response: ProjectsResponse = self.get("/projects", &[]).await?;
        Ok(response.projects)
    }

    pub async fn project(&self, name: &str) -> Result<Project, ApiError> {
        let path = format!("/projects/{}", Self::segment(name));
        let response: ProjectResponse = self.get(&path, &[]).await?;
        Ok(response.project)
    }

    /// Summary for a project, for `date` when given or the backend's default.
    pub async fn project_summary(&self, name: &str, date: Option<&str>) -> Result<Summary, ApiError> {
        let path = format!("/projects/{}/summary", Self::segment(name));
        match date {
            Some(date) => self.get(&path, &[("date", date)]).await,
            None => self.get(&path, &[]).await,
        }
    }

    /// Save the entries for one date. Each entry replaces any stored one.
    pub async fn save_daily_data(
        &self,
        name: &str,
        date: &str,
        entries: &BTreeMap<String, DailyEntry>,
    ) -> Result<Ack, ApiError> {
        let path = format!("/projects/{}/daily-data", Self::segment(name));
        let body = json!({ "date": date, "work_data": entries });
        self.post(&path, &body).await
    }

    /// Dates carrying data; `month` is `YYYY-MM`.
    pub async fn dates_with_data(&self, name: &str, month: Option<&str>) -> Result<Vec<String>, ApiError> {
        let path = format!("/projects/{}/dates-with-data", Self::segment(name));
        let response: DatesResponse = match month {
            Some(month) => self.get(&path, &[("month", month)]).await?,
            None => self.get(&path, &[]).await?,
        };
        Ok(response.dates)
    }

    pub async fn add_work_type(&self, name: &str, work_type: &str) -> Result<Ack, ApiError> {
        let path = format!("/projects/{}/work-types", Self::segment(name));
        self.post(&path, &json!({ "work_type": work_type })).await
    }

    // ===== Admin =====

    pub async fn admin_dashboard(&self) -> Result<Vec<DashboardRow>, ApiError> {
        let response: DashboardResponse = self.get("/admin/dashboard", &[]).await?;
        Ok(response.dashboard)
    }

    pub async fn create_project(&self, input: &ProjectInput) -> Result<Ack, ApiError> {
        self.post("/admin/projects", input).await
    }

    pub async fn update_project(&self, name: &str, input: &ProjectInput) -> Result<Ack, ApiError> {
        let path = format!("/admin/projects/{}", Self::segment(name));
        self.put(&path, input).await
    }

    pub async fn delete_project(&self, name: &str) -> Result<Ack, ApiError> {
        let path = format!("/admin/projects/{}", Self::segment(name));
        self.delete(&path).await
    }

    pub async fn users(&self) -> Result<BTreeMap<String, UserRecord>, ApiError> {
        let response: UsersResponse = self.get("/admin/users", &[]).await?;
        Ok(response.users)
    }

    pub async fn create_user(&self, input: &UserInput) -> Result<Ack, ApiError> {
        self.post("/admin/users", input).await
    }

    pub async fn update_user(&self, username: &str, input: &UserInput) -> Result<Ack, ApiError> {
        let path = format!("/admin/users/{}", Self::segment(username));
        self.put(&path, input).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<Ack, ApiError> {
        let path = format!("/admin/users/{}", Self::segment(username));
        self.delete(&path).await
    }

    pub async fn labor_costs(&self) -> Result<BTreeMap<String, LaborCost>, ApiError> {
        let response: LaborCostsResponse = self.get("/labor-costs", &[]).await?;
        Ok(response.labor_costs)
    }

    pub async fn save_labor_cost(
        &self,
        work_type: &str,
        day_cost: i64,
        night_cost: i64,
        midnight_cost: i64,
    ) -> Result<Ack, ApiError> {
        let body = LaborCostInput {
            work_type,
            day_cost,
            night_cost,
            midnight_cost,
        };
        self.post("/admin/labor-costs", &body).await
    }

    pub async fn project_work_summary(&self, name: &str) -> Result<Vec<WorkTypeReportRow>, ApiError> {
        let response: WorkSummaryResponse = self
            .get("/admin/reports/project-summary", &[("project", name)])
            .await?;
        Ok(response.summary)
    }

    // ===== Utilities =====

    pub async fn available_work_types(&self) -> Result<Vec<String>, ApiError> {
        let response: WorkTypesResponse = self.get("/available-work-types", &[]).await?;
        Ok(response.work_types)
    }

    pub async fn work_type_similarity(&self, work_type: &str) -> Result<SimilarityResult, ApiError> {
        self.post("/work-type-similarity", &json!({ "work_type": work_type }))
            .await
    }

    pub async fn health(&self) -> Result<HealthCheck, ApiError> {
        self.get("/health", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    type Recorded = Arc<Mutex<Vec<String>>>;

    /// Serve one canned response per connection, recording each raw request.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Recorded) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
        let log = recorded.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);
                let reply = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), recorded)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(head_end) = find_head_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn find_head_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    fn logged_in_store(token: &str) -> SessionStore {
        let store = SessionStore::in_memory();
        store
            .set(SessionData::new(
                token.to_string(),
                User {
                    username: "user1".to_string(),
                    ..Default::default()
                },
            ))
            .unwrap();
        store
    }

    #[test]
    fn test_segment_escapes_names() {
        assert_eq!(ApiClient::segment("Site-1"), "Site-1");
        assert_eq!(ApiClient::segment("Tower A/B"), "Tower%20A%2FB");
        assert_eq!(ApiClient::segment("현장"), "%ED%98%84%EC%9E%A5");
    }

    #[tokio::test]
    async fn test_token_is_read_fresh_per_request() {
        let (base, recorded) = serve(vec![
            (200, r#"{"status": "healthy", "service": "LaborApp API", "version": "1.0.0"}"#),
            (200, r#"{"status": "healthy", "service": "LaborApp API", "version": "1.0.0"}"#),
        ])
        .await;
        let store = logged_in_store("first-token");
        let client = ApiClient::new(&base, store.clone()).unwrap();

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");

        store
            .set(SessionData::new("second-token".to_string(), User::default()))
            .unwrap();
        client.health().await.unwrap();

        let requests = recorded.lock().unwrap();
        assert!(requests[0].contains("Bearer first-token"));
        assert!(requests[1].contains("Bearer second-token"));
        assert!(requests[0].starts_with("GET /api/health"));
    }

    #[tokio::test]
    async fn test_401_clears_session_and_signals_invalid() {
        let (base, _) = serve(vec![(401, r#"{"error": "token expired"}"#)]).await;
        let store = logged_in_store("stale");
        let client = ApiClient::new(&base, store.clone()).unwrap();

        let err = client.project("Site-1").await.unwrap_err();
        assert_eq!(err, ApiError::SessionInvalid);
        assert!(store.token().is_none());
    }

    #[tokio::test]
    async fn test_request_error_carries_status_and_message() {
        let (base, _) = serve(vec![(404, r#"{"error": "project not found"}"#)]).await;
        let client = ApiClient::new(&base, logged_in_store("t")).unwrap();

        let err = client.project_summary("Nope", Some("2024-05-01")).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Request {
                status: 404,
                message: "project not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_save_daily_data_body_and_ack() {
        let (base, recorded) = serve(vec![(200, r#"{"message": "saved", "saved_count": 2}"#)]).await;
        let client = ApiClient::new(&base, logged_in_store("t")).unwrap();

        let mut entries = BTreeMap::new();
        entries.insert("Concrete".to_string(), DailyEntry::new(5, 2, 0, 10.0));
        entries.insert("Rebar".to_string(), DailyEntry::new(3, 0, 0, 0.0));
        let ack = client
            .save_daily_data("Site-1", "2024-05-01", &entries)
            .await
            .unwrap();
        assert_eq!(ack.saved_count, Some(2));

        let request = recorded.lock().unwrap()[0].clone();
        assert!(request.starts_with("POST /api/projects/Site-1/daily-data"));
        let body = request.split("\r\n\r\n").nth(1).unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["date"], "2024-05-01");
        assert_eq!(body["work_data"]["Concrete"]["night"], 2);
        assert!(body["work_data"]["Concrete"].get("total").is_none());
    }

    #[tokio::test]
    async fn test_login_stores_session_and_bad_password_is_request_error() {
        let (base, _) = serve(vec![
            (401, r#"{"error": "wrong username or password"}"#),
            (
                200,
                r#"{"access_token": "jwt", "user": {"username": "admin", "role": "admin", "projects": []}}"#,
            ),
        ])
        .await;
        let store = SessionStore::in_memory();
        let client = ApiClient::new(&base, store.clone()).unwrap();

        let err = client.login("admin", "bad").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_session_invalid());
        assert!(store.token().is_none());

        let user = client.login("admin", "1234").await.unwrap();
        assert!(user.is_admin());
        assert_eq!(store.token().as_deref(), Some("jwt"));
        assert_eq!(store.user().map(|u| u.username), Some("admin".to_string()));

        client.logout();
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let (base, _) = serve(vec![(200, "not json")]).await;
        let client = ApiClient::new(&base, logged_in_store("t")).unwrap();
        let err = client.dates_with_data("Site-1", Some("2024-05")).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{}", addr), SessionStore::in_memory()).unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    const HEALTHY: &str = r#"{"status": "healthy", "service": "LaborApp API", "version": "1.0.0"}"#;

    #[tokio::test]
    async fn test_rate_limited_get_retries_then_succeeds() {
        let (base, recorded) = serve(vec![(429, r#"{"error": "slow down"}"#), (200, HEALTHY)]).await;
        let client = ApiClient::new(&base, SessionStore::in_memory())
            .unwrap()
            .with_initial_backoff(Duration::from_millis(5));

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(recorded.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let responses = vec![(429, r#"{"error": "slow down"}"#); MAX_RATE_LIMIT_RETRIES as usize + 1];
        let (base, recorded) = serve(responses).await;
        let client = ApiClient::new(&base, SessionStore::in_memory())
            .unwrap()
            .with_initial_backoff(Duration::from_millis(1));

        let err = client.health().await.unwrap_err();
        assert_eq!(err, ApiError::RateLimited);
        assert_eq!(recorded.lock().unwrap().len(), MAX_RATE_LIMIT_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // Bound but never accepted: the connect succeeds and no reply comes
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = ApiClient::with_timeout(
            &format!("http://{}", addr),
            SessionStore::in_memory(),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.health().await.unwrap_err();
        assert_eq!(err, ApiError::Timeout);
        drop(listener);
    }
}
