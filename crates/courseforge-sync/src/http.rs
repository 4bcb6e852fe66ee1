//! HTTP adapters for the push channel and the status endpoint.
//!
//! Routes, relative to the configured base URL:
//!
//! - `GET tasks/{id}/events?last_event_id={n}` - server-sent events
//! - `GET tasks/{id}/status` - JSON [`TaskStatusReport`]

use async_trait::async_trait;
use courseforge_core::{
    EventSourcePort, MessageStream, StatusError, SyncError, TaskId, TaskStatusPort,
    TaskStatusReport,
};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;
use url::Url;

use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::sse::decode_messages;

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Base URL plus credentials, shared by both adapters.
#[derive(Debug, Clone)]
struct Endpoint {
    base: Url,
    token: Option<String>,
}

impl Endpoint {
    fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(config.base_url.clone()));
        }
        Ok(Self {
            base,
            token: config.token.clone(),
        })
    }

    fn task_url(&self, task_id: &TaskId, leaf: &str) -> Url {
        let mut url = self.base.clone();
        // Only fails for cannot-be-a-base URLs, rejected in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("tasks")
                .push(task_id.as_str())
                .push(leaf);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn status_error(response: &reqwest::Response, url: &Url) -> Option<TransportError> {
    let status = response.status();
    (!status.is_success()).then(|| TransportError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    })
}

/// Push channel over server-sent events.
pub struct HttpEventSource {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpEventSource {
    /// The connection stays open indefinitely, so only connection setup is
    /// bounded by the configured timeout.
    pub fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: Endpoint::new(config)?,
        })
    }

    pub(crate) fn events_url(&self, task_id: &TaskId, last_offset: Option<u64>) -> Url {
        let mut url = self.endpoint.task_url(task_id, "events");
        if let Some(offset) = last_offset {
            url.query_pairs_mut()
                .append_pair("last_event_id", &offset.to_string());
        }
        url
    }
}

#[async_trait]
impl EventSourcePort for HttpEventSource {
    async fn connect(
        &self,
        task_id: &TaskId,
        last_offset: Option<u64>,
    ) -> Result<MessageStream, SyncError> {
        let url = self.events_url(task_id, last_offset);

        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(offset) = last_offset {
            request = request.header(LAST_EVENT_ID, offset.to_string());
        }

        let response = self
            .endpoint
            .authorize(request)
            .send()
            .await
            .map_err(|e| TransportError::from(e).into_sync_error())?;
        if let Some(err) = status_error(&response, &url) {
            return Err(err.into_sync_error());
        }

        debug!(task_id = %task_id, ?last_offset, "Push channel connected");
        Ok(Box::pin(decode_messages(response.bytes_stream())))
    }
}

/// Pull transport for the status endpoint.
pub struct HttpStatusClient {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpStatusClient {
    pub fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            endpoint: Endpoint::new(config)?,
        })
    }

    async fn fetch(&self, task_id: &TaskId) -> Result<TaskStatusReport, TransportError> {
        let url = self.endpoint.task_url(task_id, "status");
        let response = self
            .endpoint
            .authorize(self.client.get(url.clone()).header(ACCEPT, "application/json"))
            .send()
            .await?;
        if let Some(err) = status_error(&response, &url) {
            return Err(err);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TaskStatusPort for HttpStatusClient {
    async fn fetch_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, StatusError> {
        self.fetch(task_id)
            .await
            .map_err(|e| e.into_status_error(task_id))
    }
}
