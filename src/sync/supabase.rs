use std::time::Duration;

use chrono::NaiveDate;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use super::store::{Identity, RemoteStore, StoreError};
use crate::config::DaybookConfig;
use crate::core::goal::{Goal, NewGoal};
use crate::core::plan::{NewPlan, Plan, ScheduleItem};
use crate::core::routine::{Activities, NewRoutineEntry, RoutineEntry};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NO_ROWS_CODE: &str = "PGRST116";

/// Table names for the three collections.
#[derive(Debug, Clone)]
pub struct Tables {
    pub goals: String,
    pub plans: String,
    pub routine: String,
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: Identity,
}

/// Outcome of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    SignedIn(Identity),
    /// The project requires email confirmation before the first sign-in.
    ConfirmationRequired,
}

/// Error payloads from PostgREST (`code`/`message`) and GoTrue
/// (`msg`, `error`/`error_description`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn api_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.map(|c| match c {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });

    if code.as_deref() == Some(NO_ROWS_CODE) {
        return StoreError::NoRows;
    }

    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.trim().to_string()
            }
        });

    StoreError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    log::debug!("Supabase error {}: {}", status, body);
    Err(api_error(status, &body))
}

/// Supabase client: GoTrue for identity, PostgREST for rows.
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    tables: Tables,
    http: Client,
    session: RwLock<Option<Session>>,
    identity: watch::Sender<Option<Identity>>,
}

impl SupabaseClient {
    pub fn new(config: &DaybookConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let (identity, _) = watch::channel(None);
        Ok(Self {
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            tables: config.tables(),
            http,
            session: RwLock::new(None),
            identity,
        })
    }

    /// Identity changes: sign-in, sign-out and token refresh each publish a value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|s| s.refresh_token.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, StoreError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self
            .auth_request(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await?;
        let tokens: TokenResponse = check(resp).await?.json().await?;
        log::info!("Signed in as {}", tokens.user.id);
        Ok(self.install(tokens).await)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, StoreError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let resp = self
            .auth_request(Method::POST, "signup")
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = check(resp).await?.json().await?;

        // With autoconfirm on, GoTrue answers with a full session; otherwise only the user.
        if value.get("access_token").is_some() {
            let tokens: TokenResponse = serde_json::from_value(value)?;
            return Ok(SignUp::SignedIn(self.install(tokens).await));
        }
        log::info!("Sign-up pending email confirmation");
        Ok(SignUp::ConfirmationRequired)
    }

    /// Exchange a stored refresh token for a new session.
    pub async fn restore(&self, refresh_token: &str) -> Result<Identity, StoreError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let resp = self
            .auth_request(Method::POST, "token")
            .query(&[("grant_type", "refresh_token")])
            .json(&body)
            .send()
            .await?;
        let tokens: TokenResponse = check(resp).await?.json().await?;
        log::info!("Session restored for {}", tokens.user.id);
        Ok(self.install(tokens).await)
    }

    /// Revoke the session server-side (best effort) and clear it locally.
    pub async fn sign_out(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            let result = self
                .auth_request(Method::POST, "logout")
                .bearer_auth(&session.access_token)
                .send()
                .await;
            match result {
                Ok(resp) if !resp.status().is_success() => {
                    log::warn!("Logout returned {}", resp.status());
                }
                Err(e) => log::warn!("Logout request failed: {}", e),
                _ => {}
            }
        }
        self.identity.send_replace(None);
        log::info!("Signed out");
    }

    async fn install(&self, tokens: TokenResponse) -> Identity {
        *self.session.write().await = Some(Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        });
        self.identity.send_replace(Some(tokens.user.clone()));
        tokens.user
    }

    // --- Private helpers ---

    fn auth_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(StoreError::SignedOut)
    }

    async fn rest(&self, method: Method, table: &str) -> Result<RequestBuilder, StoreError> {
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }

    /// Exchange the held refresh token for a new session. When that fails the
    /// session is dropped and the sign-out is published.
    async fn refresh_session(&self) -> bool {
        let Some(refresh) = self.refresh_token().await else {
            return false;
        };
        match self.restore(&refresh).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Session refresh failed: {}", e);
                self.session.write().await.take();
                self.identity.send_replace(None);
                false
            }
        }
    }

    /// Send a PostgREST request. An expired access token (401) is refreshed
    /// once and the request rebuilt with the new token.
    async fn send_rest<F>(&self, method: Method, table: &str, build: F) -> Result<Response, StoreError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let resp = build(self.rest(method.clone(), table).await?).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check(resp).await;
        }
        log::info!("Access token rejected on {}, refreshing", table);
        if !self.refresh_session().await {
            return Err(StoreError::SignedOut);
        }
        let resp = build(self.rest(method, table).await?).send().await?;
        check(resp).await
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        log::debug!("SELECT {} {:?}", table, query);
        let resp = self
            .send_rest(Method::GET, table, |req| req.query(&[("select", "*")]).query(query))
            .await?;
        Ok(resp.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<T, StoreError> {
        log::debug!("SELECT ONE {} {:?}", table, query);
        let resp = self
            .send_rest(Method::GET, table, |req| {
                req.header(ACCEPT, SINGLE_OBJECT)
                    .query(&[("select", "*")])
                    .query(query)
            })
            .await?;
        Ok(resp.json().await?)
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, StoreError> {
        log::debug!("INSERT {}", table);
        let resp = self
            .send_rest(Method::POST, table, |req| {
                req.header(ACCEPT, SINGLE_OBJECT)
                    .header(CONTENT_TYPE, "application/json")
                    .header("Prefer", "return=representation")
                    .json(row)
            })
            .await?;
        Ok(resp.json().await?)
    }

    async fn update<B: Serialize>(&self, table: &str, id: Uuid, fields: &B) -> Result<(), StoreError> {
        log::debug!("UPDATE {} {}", table, id);
        self.send_rest(Method::PATCH, table, |req| {
            req.query(&[("id", format!("eq.{}", id))]).json(fields)
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), StoreError> {
        log::debug!("DELETE {} {}", table, id);
        self.send_rest(Method::DELETE, table, |req| {
            req.query(&[("id", format!("eq.{}", id))])
        })
        .await?;
        Ok(())
    }
}

impl RemoteStore for SupabaseClient {
    async fn current_user(&self) -> Result<Option<Identity>, StoreError> {
        let token = match self.access_token().await {
            Ok(token) => token,
            Err(StoreError::SignedOut) => return Ok(None),
            Err(e) => return Err(e),
        };

        let resp = self
            .auth_request(Method::GET, "user")
            .bearer_auth(token)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            // Access token expired: one refresh, as the hosted client library does.
            if !self.refresh_session().await {
                return Ok(None);
            }
            return Ok(self.identity.borrow().clone());
        }

        Ok(Some(check(resp).await?.json().await?))
    }

    async fn list_goals(&self, owner: Uuid) -> Result<Vec<Goal>, StoreError> {
        self.select(
            &self.tables.goals,
            &[
                ("user_id", format!("eq.{}", owner)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_goal(&self, goal: &NewGoal) -> Result<Goal, StoreError> {
        self.insert(&self.tables.goals, goal).await
    }

    async fn set_goal_completed(&self, id: Uuid, completed: bool) -> Result<(), StoreError> {
        self.update(&self.tables.goals, id, &serde_json::json!({ "completed": completed }))
            .await
    }

    async fn delete_goal(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete(&self.tables.goals, id).await
    }

    async fn list_plans(&self, owner: Uuid) -> Result<Vec<Plan>, StoreError> {
        self.select(
            &self.tables.plans,
            &[
                ("user_id", format!("eq.{}", owner)),
                ("order", "date.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_plan(&self, plan: &NewPlan) -> Result<Plan, StoreError> {
        self.insert(&self.tables.plans, plan).await
    }

    async fn replace_plan_items(&self, id: Uuid, items: &[ScheduleItem]) -> Result<(), StoreError> {
        self.update(&self.tables.plans, id, &serde_json::json!({ "items": items }))
            .await
    }

    async fn delete_plan(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete(&self.tables.plans, id).await
    }

    async fn routine_for(&self, owner: Uuid, date: NaiveDate) -> Result<RoutineEntry, StoreError> {
        self.select_one(
            &self.tables.routine,
            &[
                ("user_id", format!("eq.{}", owner)),
                ("date", format!("eq.{}", date.format("%Y-%m-%d"))),
            ],
        )
        .await
    }

    async fn insert_routine(&self, entry: &NewRoutineEntry) -> Result<RoutineEntry, StoreError> {
        self.insert(&self.tables.routine, entry).await
    }

    async fn update_routine_activities(
        &self,
        id: Uuid,
        activities: &Activities,
    ) -> Result<(), StoreError> {
        self.update(
            &self.tables.routine,
            id,
            &serde_json::json!({ "activities": activities }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn postgrest_single_row_miss_is_no_rows() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        assert!(matches!(
            api_error(StatusCode::NOT_ACCEPTABLE, body),
            StoreError::NoRows
        ));
    }

    #[test]
    fn postgrest_message_is_kept() {
        let body = r#"{"code":"42501","details":null,"hint":null,"message":"new row violates row-level security policy"}"#;
        match api_error(StatusCode::FORBIDDEN, body) {
            StoreError::Api { status, code, message } => {
                assert_eq!(status, 403);
                assert_eq!(code.as_deref(), Some("42501"));
                assert_eq!(message, "new row violates row-level security policy");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn gotrue_error_shapes() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "Invalid login credentials (HTTP 400)");

        let body = r#"{"code":422,"msg":"Password should be at least 6 characters"}"#;
        match api_error(StatusCode::UNPROCESSABLE_ENTITY, body) {
            StoreError::Api { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("422"));
                assert_eq!(message, "Password should be at least 6 characters");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_body_falls_back_to_reason() {
        let err = api_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.to_string(), "Bad Gateway (HTTP 502)");
    }

    #[tokio::test]
    async fn rows_require_a_session() {
        let client = SupabaseClient::new(&DaybookConfig::default()).unwrap();
        assert!(matches!(
            client.list_goals(Uuid::nil()).await,
            Err(StoreError::SignedOut)
        ));
        assert_eq!(client.current_user().await.unwrap(), None);
        assert!(client.subscribe().borrow().is_none());
    }

    /// One request as received by the local test server.
    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        target: String,
        headers: HashMap<String, String>,
        body: String,
    }

    impl Seen {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).map(String::as_str)
        }

        fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> Option<Seen> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next()?.split(' ');
        let method = request_line.next()?.to_string();
        let target = request_line.next()?.to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        let len: usize = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
        while buf.len() < head_end + len {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let end = buf.len().min(head_end + len);
        let body = String::from_utf8_lossy(&buf[head_end..end]).to_string();
        Some(Seen {
            method,
            target,
            headers,
            body,
        })
    }

    /// Local HTTP server answering each request with `respond`.
    struct TestServer {
        url: String,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl TestServer {
        async fn start(respond: impl Fn(&Seen) -> (u16, String) + Send + Sync + 'static) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = seen.clone();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let Some(request) = read_request(&mut socket).await else {
                        continue;
                    };
                    let (status, body) = respond(&request);
                    log.lock().unwrap().push(request);
                    let reply = format!(
                        "HTTP/1.1 {} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });
            Self { url, seen }
        }

        fn client(&self) -> SupabaseClient {
            let config = DaybookConfig {
                supabase_url: self.url.clone(),
                supabase_anon_key: "anon".into(),
                ..DaybookConfig::default()
            };
            SupabaseClient::new(&config).unwrap()
        }

        fn requests(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }

        fn rest_requests(&self) -> Vec<Seen> {
            self.requests().into_iter().filter(|r| r.target.starts_with("/rest/v1/")).collect()
        }
    }

    fn owner() -> Uuid {
        Uuid::from_u128(0x5eed)
    }

    fn tokens(access: &str, refresh: &str) -> String {
        serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
            "user": { "id": owner(), "email": "a@example.com" }
        })
        .to_string()
    }

    fn is_password_grant(r: &Seen) -> bool {
        r.target.starts_with("/auth/v1/token") && r.target.contains("grant_type=password")
    }

    fn is_refresh_grant(r: &Seen) -> bool {
        r.target.starts_with("/auth/v1/token") && r.target.contains("grant_type=refresh_token")
    }

    #[tokio::test]
    async fn goals_are_filtered_by_owner_newest_first() {
        let server = TestServer::start(|r| {
            if is_password_grant(r) {
                return (200, tokens("access-1", "refresh-1"));
            }
            let row = serde_json::json!([{
                "id": Uuid::from_u128(1),
                "user_id": owner(),
                "title": "Fix the gate",
                "description": null,
                "deadline": "2026-10-20",
                "area": "Casa",
                "completed": false,
                "created_at": "2026-10-18T09:00:00Z"
            }]);
            (200, row.to_string())
        })
        .await;
        let client = server.client();
        client.sign_in("a@example.com", "secret").await.unwrap();

        let goals = client.list_goals(owner()).await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].title, "Fix the gate");

        let sent = &server.rest_requests()[0];
        assert_eq!(sent.method, "GET");
        assert!(sent.target.starts_with("/rest/v1/marido_tasks?"));
        assert!(sent.target.contains(&format!("user_id=eq.{}", owner())));
        assert!(sent.target.contains("order=created_at.desc"));
        assert_eq!(sent.header("apikey"), Some("anon"));
        assert_eq!(sent.header("authorization"), Some("Bearer access-1"));

        let login = &server.requests()[0];
        assert_eq!(login.json()["email"], "a@example.com");
    }

    #[tokio::test]
    async fn missing_routine_row_is_no_rows() {
        let server = TestServer::start(|r| {
            if is_password_grant(r) {
                return (200, tokens("access-1", "refresh-1"));
            }
            let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
            (406, body.to_string())
        })
        .await;
        let client = server.client();
        client.sign_in("a@example.com", "secret").await.unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(matches!(client.routine_for(owner(), date).await, Err(StoreError::NoRows)));

        let sent = &server.rest_requests()[0];
        assert!(sent.target.starts_with("/rest/v1/marido_routine?"));
        assert!(sent.target.contains("date=eq.2026-10-18"));
        assert_eq!(sent.header("accept"), Some(SINGLE_OBJECT));
    }

    #[tokio::test]
    async fn updates_patch_only_the_changed_column() {
        let server = TestServer::start(|r| {
            if is_password_grant(r) {
                return (200, tokens("access-1", "refresh-1"));
            }
            (204, String::new())
        })
        .await;
        let client = server.client();
        client.sign_in("a@example.com", "secret").await.unwrap();

        let plan_id = Uuid::from_u128(2);
        let items = vec![ScheduleItem::new("08:00", "Pray")];
        client.replace_plan_items(plan_id, &items).await.unwrap();

        let entry_id = Uuid::from_u128(3);
        let activities = Activities {
            spouse_time: true,
            ..Activities::default()
        };
        client.update_routine_activities(entry_id, &activities).await.unwrap();

        let sent = server.rest_requests();
        assert_eq!(sent[0].method, "PATCH");
        assert_eq!(sent[0].target, format!("/rest/v1/marido_planning?id=eq.{}", plan_id));
        assert_eq!(sent[0].json(), serde_json::json!({ "items": items }));

        assert_eq!(sent[1].target, format!("/rest/v1/marido_routine?id=eq.{}", entry_id));
        let body = sent[1].json();
        assert_eq!(body["activities"]["spouseTime"], true);
        assert_eq!(body["activities"]["prayer"], false);
        assert_eq!(body.as_object().map(|o| o.len()), Some(1));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_request_resent() {
        let refreshed = Arc::new(AtomicBool::new(false));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let (flag, count) = (refreshed.clone(), refreshes.clone());
        let server = TestServer::start(move |r| {
            if is_password_grant(r) {
                return (200, tokens("stale", "refresh-1"));
            }
            if is_refresh_grant(r) {
                count.fetch_add(1, Ordering::SeqCst);
                flag.store(true, Ordering::SeqCst);
                return (200, tokens("fresh", "refresh-2"));
            }
            if flag.load(Ordering::SeqCst) {
                (204, String::new())
            } else {
                (401, r#"{"code":"PGRST301","message":"JWT expired"}"#.to_string())
            }
        })
        .await;
        let client = server.client();
        let mut identity = client.subscribe();
        client.sign_in("a@example.com", "secret").await.unwrap();
        identity.borrow_and_update();

        client.set_goal_completed(Uuid::nil(), true).await.unwrap();
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(client.refresh_token().await.as_deref(), Some("refresh-2"));
        assert!(identity.has_changed().unwrap());

        let requests = server.requests();
        let refresh = requests.iter().find(|r| is_refresh_grant(r)).unwrap();
        assert_eq!(refresh.json()["refresh_token"], "refresh-1");
        let patches: Vec<Option<&str>> = requests
            .iter()
            .filter(|r| r.method == "PATCH")
            .map(|r| r.header("authorization"))
            .collect();
        assert_eq!(patches, vec![Some("Bearer stale"), Some("Bearer fresh")]);

        client.set_goal_completed(Uuid::nil(), false).await.unwrap();
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out() {
        let server = TestServer::start(|r| {
            if is_password_grant(r) {
                return (200, tokens("stale", "refresh-1"));
            }
            if is_refresh_grant(r) {
                return (400, r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#.to_string());
            }
            (401, r#"{"code":"PGRST301","message":"JWT expired"}"#.to_string())
        })
        .await;
        let client = server.client();
        client.sign_in("a@example.com", "secret").await.unwrap();

        assert!(matches!(
            client.delete_plan(Uuid::nil()).await,
            Err(StoreError::SignedOut)
        ));
        assert!(client.subscribe().borrow().is_none());
        assert_eq!(client.refresh_token().await, None);
        assert_eq!(client.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn current_user_refresh_rotates_token() {
        let server = TestServer::start(|r| {
            if is_password_grant(r) {
                return (200, tokens("stale", "refresh-1"));
            }
            if is_refresh_grant(r) {
                return (200, tokens("fresh", "refresh-2"));
            }
            // GET /auth/v1/user
            match r.header("authorization") {
                Some("Bearer fresh") => (200, serde_json::json!({ "id": owner() }).to_string()),
                _ => (401, r#"{"msg":"JWT expired"}"#.to_string()),
            }
        })
        .await;
        let client = server.client();
        client.sign_in("a@example.com", "secret").await.unwrap();

        let user = client.current_user().await.unwrap();
        assert_eq!(user.map(|u| u.id), Some(owner()));
        assert_eq!(client.refresh_token().await.as_deref(), Some("refresh-2"));
    }
}
