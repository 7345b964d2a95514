use crate::models::{AgentSummary, MentionDelivery, Message, OpenSessionResponse, WaitResponse};
use reqwest::Method;
use std::sync::Mutex;
use std::time::Duration;

use super::config::RuntimeConfig;
use super::error::{ApiErrorKind, ClientError};

/// Budget for control requests (everything except waits and streams).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
/// Slack added to a wait request's own timeout before the HTTP layer gives up.
const WAIT_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);
/// Transport-failure retries for retry-safe operations.
const MAX_TRANSPORT_RETRIES: u32 = 3;

struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
    timeout: Duration,
    /// Retry on transport failure. Safe because non-idempotent operations
    /// carry a correlation id the hub dedups on.
    retry: bool,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: CONTROL_TIMEOUT,
            retry: true,
        }
    }
}

/// Typed client for the hub's tool surface.
///
/// Holds the current session id; all routing is by `agent_id`, so the session
/// id changing across reconnects is invisible to callers. A 401 triggers one
/// transparent session reopen before the error surfaces.
pub struct HubClient {
    http: reqwest::Client,
    config: RuntimeConfig,
    session: Mutex<Option<String>>,
}

impl HubClient {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_session(&self, session_id: Option<String>) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = session_id;
    }

    // --- Session lifecycle ---

    /// Open (or reopen) the session for this agent identity. The returned
    /// session id is opaque and may differ across calls.
    pub async fn open_session(&self) -> Result<String, ClientError> {
        let mut query: Vec<(&str, String)> = vec![
            ("agent_id", self.config.agent_id.clone()),
            ("agent_description", self.config.description.clone()),
            ("application_id", self.config.application_id.clone()),
            ("wait_for_agents", self.config.wait_for_agents.to_string()),
        ];
        if !self.config.capabilities.is_empty() {
            query.push(("capabilities", self.config.capabilities.join(",")));
        }
        if let Some(key) = &self.config.privacy_key {
            query.push(("privacy_key", key.clone()));
        }

        let resp = self
            .http
            .post(format!("{}/api/v1/session/open", self.config.hub_url))
            .query(&query)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        let opened: OpenSessionResponse = decode(check(resp).await?).await?;
        self.set_session(Some(opened.session_id.clone()));
        Ok(opened.session_id)
    }

    /// Idempotent close. Best-effort; the hub evicts us eventually anyway.
    pub async fn close_session(&self) -> Result<(), ClientError> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };
        self.set_session(None);
        let resp = self
            .http
            .post(format!("{}/api/v1/session/close", self.config.hub_url))
            .header("X-Session-Id", session_id)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    // --- Tool surface ---

    pub async fn list_agents(&self, details: bool) -> Result<Vec<AgentSummary>, ClientError> {
        let mut req = ApiRequest::new(Method::GET, "/api/v1/agents");
        if details {
            req.query.push(("details", "true".to_string()));
        }
        decode(self.execute(req).await?).await
    }

    pub async fn create_thread(
        &self,
        name: &str,
        participants: &[String],
    ) -> Result<String, ClientError> {
        let mut req = ApiRequest::new(Method::POST, "/api/v1/threads");
        req.body = Some(serde_json::json!({
            "name": name,
            "participants": participants,
            "correlation_id": uuid::Uuid::new_v4().to_string(),
        }));
        let value: serde_json::Value = decode(self.execute(req).await?).await?;
        value["thread_id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| ClientError::Protocol("create_thread response missing thread_id".into()))
    }

    pub async fn add_participant(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<(), ClientError> {
        let mut req = ApiRequest::new(
            Method::POST,
            format!("/api/v1/threads/{thread_id}/participants"),
        );
        req.body = Some(serde_json::json!({"agent_id": agent_id}));
        self.execute(req).await?;
        Ok(())
    }

    pub async fn remove_participant(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<(), ClientError> {
        let req = ApiRequest::new(
            Method::DELETE,
            format!("/api/v1/threads/{thread_id}/participants/{agent_id}"),
        );
        self.execute(req).await?;
        Ok(())
    }

    pub async fn close_thread(&self, thread_id: &str) -> Result<(), ClientError> {
        let req = ApiRequest::new(Method::POST, format!("/api/v1/threads/{thread_id}/close"));
        self.execute(req).await?;
        Ok(())
    }

    pub async fn send_message(
        &self,
        thread_id: &str,
        body: &str,
        mentions: &[String],
    ) -> Result<Message, ClientError> {
        let mut req = ApiRequest::new(
            Method::POST,
            format!("/api/v1/threads/{thread_id}/messages"),
        );
        req.body = Some(serde_json::json!({
            "body": body,
            "mentions": mentions,
            "correlation_id": uuid::Uuid::new_v4().to_string(),
        }));
        decode(self.execute(req).await?).await
    }

    /// Long-poll for addressed work. An empty batch is a normal outcome and
    /// is never retried; a transport failure surfaces to the caller, whose
    /// loop decides how to proceed.
    pub async fn wait_for_mentions(
        &self,
        timeout_ms: u64,
    ) -> Result<Vec<MentionDelivery>, ClientError> {
        let mut req = ApiRequest::new(Method::POST, "/api/v1/mentions/wait");
        req.body = Some(serde_json::json!({"timeout_ms": timeout_ms}));
        req.timeout = Duration::from_millis(timeout_ms) + WAIT_TIMEOUT_MARGIN;
        req.retry = false;
        let resp: WaitResponse = decode(self.execute(req).await?).await?;
        Ok(resp.deliveries)
    }

    /// Poll the registry until at least `min` agents (including this one) are
    /// live, or the deadline passes. Advisory: used to hold off real work
    /// until expected peers have joined.
    pub async fn await_peers(&self, min: usize, deadline: Duration) -> Result<bool, ClientError> {
        let started = std::time::Instant::now();
        loop {
            let agents = self.list_agents(false).await?;
            if agents.len() >= min {
                return Ok(true);
            }
            if started.elapsed() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    // --- Raw stream access for the connection manager ---

    pub(crate) async fn open_stream(
        &self,
        session_id: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let resp = self
            .http
            .get(format!(
                "{}/api/v1/session/{session_id}/stream",
                self.config.hub_url
            ))
            .send()
            .await?;
        check(resp).await
    }

    // --- Plumbing ---

    async fn execute(&self, req: ApiRequest) -> Result<reqwest::Response, ClientError> {
        let mut transport_retries = 0u32;
        let mut backoff = Duration::from_secs(1);
        let mut reopened = false;

        loop {
            let Some(session_id) = self.session_id() else {
                return Err(ClientError::SessionClosed);
            };

            let mut builder = self
                .http
                .request(req.method.clone(), format!("{}{}", self.config.hub_url, req.path))
                .header("X-Session-Id", session_id)
                .timeout(req.timeout);
            if !req.query.is_empty() {
                builder = builder.query(&req.query);
            }
            if let Some(body) = &req.body {
                builder = builder.json(body);
            }

            let result = match builder.send().await {
                Ok(resp) => check(resp).await,
                Err(e) => Err(ClientError::Transport(e)),
            };

            match result {
                Err(ClientError::Transport(e))
                    if req.retry && transport_retries < MAX_TRANSPORT_RETRIES =>
                {
                    transport_retries += 1;
                    eprintln!(
                        "⚠️  {} {} transport failure (attempt {transport_retries}): {e}",
                        req.method, req.path
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(4));
                }
                // The hub no longer knows our session (eviction, restart).
                // Reopen once under the same agent id and replay the request.
                Err(ClientError::Api {
                    kind: ApiErrorKind::Unauthorized,
                    ..
                }) if !reopened => {
                    reopened = true;
                    self.open_session().await?;
                }
                other => return other,
            }
        }
    }
}

/// Map an HTTP response to `Ok` or a typed API error.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    Err(ClientError::Api {
        kind: body["kind"]
            .as_str()
            .map(ApiErrorKind::from_wire)
            .unwrap_or(ApiErrorKind::Other),
        message: body["error"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| format!("HTTP {status}")),
        max_wait_ms: body["max_wait_ms"].as_u64(),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::Protocol(format!("undecodable response body: {e}")))
}
