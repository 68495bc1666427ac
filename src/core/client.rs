use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::api::threads::{self, ThreadPayload, ThreadSummary};
use crate::api::{ChatRequest, ChatResponse, Message};
use crate::core::config::Config;
use crate::error::{ClientError, Result};
use crate::utils::url::{join_endpoint, normalize_base_url};

/// HTTP client for one agent deployment.
///
/// Thin wrapper over `reqwest` that owns the base URL and the optional
/// bearer token; everything else is per-request. Cloning is cheap and
/// shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl AgentClient {
    pub fn new(deployment_url: &str, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base_url(deployment_url),
            access_token,
        }
    }

    /// Builds a client only when the config names a deployment and carries
    /// a non-empty token. Callers treat `None` as "offline": no requests
    /// are ever issued, reads come back empty.
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.deployment_url.trim().is_empty() {
            return None;
        }
        let token = config.bearer_token()?;
        Some(Self::new(&config.deployment_url, Some(token.to_string())))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        join_endpoint(&self.base_url, path)
    }

    fn apply_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        match &self.access_token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        Err(ClientError::http(status.as_u16(), body))
    }

    /// Sends one user turn and waits for the agent's finished response.
    pub async fn send_message(
        &self,
        message: &str,
        thread_id: Option<&str>,
    ) -> Result<ChatResponse> {
        let request = ChatRequest {
            message: message.to_string(),
            thread_id: thread_id.map(str::to_string),
        };
        debug!(thread = ?thread_id, "POST /chat");
        let response = self
            .apply_headers(self.http.post(self.endpoint("chat")))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<ChatResponse>().await?)
    }

    /// Opens the server-sent-events variant of the chat endpoint. The
    /// returned response body carries one JSON frame per `data:` line;
    /// the stream layer owns decoding it.
    pub async fn open_stream(
        &self,
        message: &str,
        thread_id: Option<&str>,
    ) -> Result<Response> {
        let request = ChatRequest {
            message: message.to_string(),
            thread_id: thread_id.map(str::to_string),
        };
        debug!(thread = ?thread_id, "POST /chat/stream");
        let response = self
            .apply_headers(self.http.post(self.endpoint("chat/stream")))
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .json(&request)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Fetches the full, ordered message history of a thread.
    pub async fn get_thread_history(&self, thread_id: &str) -> Result<Vec<Message>> {
        debug!(thread = thread_id, "GET /threads/{{id}}/history");
        let response = self
            .apply_headers(
                self.http
                    .get(self.endpoint(&format!("threads/{thread_id}/history"))),
            )
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<Vec<Message>>().await?)
    }

    /// Lists known threads, newest activity first, with display titles
    /// derived from each thread's first message.
    pub async fn search_threads(&self) -> Result<Vec<ThreadSummary>> {
        debug!("GET /threads/search");
        let response = self
            .apply_headers(self.http.get(self.endpoint("threads/search")))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let payloads = response.json::<Vec<ThreadPayload>>().await?;
        let mut summaries: Vec<ThreadSummary> =
            payloads.into_iter().map(threads::summarize).collect();
        threads::sort_summaries(&mut summaries);
        Ok(summaries)
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Value> {
        debug!(thread = thread_id, "GET /threads/{{id}}");
        let response = self
            .apply_headers(self.http.get(self.endpoint(&format!("threads/{thread_id}"))))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<Value>().await?)
    }

    pub async fn get_thread_state(&self, thread_id: &str) -> Result<Value> {
        debug!(thread = thread_id, "GET /threads/{{id}}/state");
        let response = self
            .apply_headers(
                self.http
                    .get(self.endpoint(&format!("threads/{thread_id}/state"))),
            )
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<Value>().await?)
    }
}
