//! Fire-and-forget webhook notifications
//!
//! Every `notify` call spawns one independent tokio task that POSTs
//! `{"payload": ...}` to the configured URL. Nothing is retried, queued or
//! reported back; failures end up in the log and the `failed_total` counter.

use crate::error::NotifyError;
use crate::metrics::MetricsRegistry;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Trait for dispatching notification payloads
pub trait Notifier: Send + Sync {
    /// Dispatch a payload without waiting for the outcome.
    ///
    /// Returns the handle of the spawned send task, or `None` when nothing
    /// was spawned. The handle never carries a delivery result.
    fn notify(&self, payload: Value) -> Option<JoinHandle<()>>;
}

/// Notifier that drops every payload
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _payload: Value) -> Option<JoinHandle<()>> {
        None
    }
}

/// Notifier that POSTs payloads to a webhook URL
pub struct WebhookNotifier {
    url: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    client: OnceCell<Client>,
    metrics: MetricsRegistry,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, token: Option<String>) -> Self {
        Self {
            url,
            token,
            timeout: None,
            client: OnceCell::new(),
            metrics: MetricsRegistry::default(),
        }
    }

    /// Report outcomes into an existing metrics registry
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    /// Apply a request timeout to the client instead of reqwest's default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Configured URL, if it is non-empty
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Shared client, built on first use
    fn client(&self) -> Result<&Client, NotifyError> {
        self.client
            .get_or_try_init(|| build_client(self.token.as_deref(), self.timeout))
    }

    /// Serialize a value and dispatch it like [`Notifier::notify`]
    pub fn notify_serializable<T: Serialize>(&self, payload: &T) -> Option<JoinHandle<()>> {
        match serde_json::to_value(payload) {
            Ok(value) => self.notify(value),
            Err(e) => {
                error!("Failed to serialize notify payload: {}", e);
                None
            }
        }
    }

    /// POST one payload, logging and discarding any failure
    pub async fn send(&self, payload: Value) {
        let Some(url) = self.url() else {
            return;
        };
        match self.client() {
            Ok(client) => deliver(client, url, &payload, &self.metrics).await,
            Err(e) => {
                error!("{}", e.chain());
                self.metrics.failed_total.inc();
            }
        }
    }

    /// POST one payload and report the categorized outcome
    pub async fn try_send(&self, payload: &Value) -> Result<(), NotifyError> {
        let Some(url) = self.url() else {
            return Ok(());
        };
        post(self.client()?, url, payload).await
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, payload: Value) -> Option<JoinHandle<()>> {
        let Some(url) = self.url() else {
            self.metrics.skipped_total.inc();
            return None;
        };

        let client = match self.client() {
            Ok(client) => client.clone(),
            Err(e) => {
                error!("{}", e.chain());
                self.metrics.failed_total.inc();
                return None;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Cannot dispatch notification outside a tokio runtime: {}", e);
                self.metrics.failed_total.inc();
                return None;
            }
        };

        let url = url.to_string();
        let metrics = self.metrics.clone();
        Some(runtime.spawn(async move {
            deliver(&client, &url, &payload, &metrics).await;
        }))
    }
}

fn build_client(token: Option<&str>, timeout: Option<Duration>) -> Result<Client, NotifyError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token.filter(|token| !token.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(NotifyError::InvalidToken)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let mut builder = Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(NotifyError::Client)
}

async fn post(client: &Client, url: &str, payload: &Value) -> Result<(), NotifyError> {
    client
        .post(url)
        .json(&json!({ "payload": payload }))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

async fn deliver(client: &Client, url: &str, payload: &Value, metrics: &MetricsRegistry) {
    match post(client, url, payload).await {
        Ok(()) => {
            debug!("Notification delivered to {}", url);
            metrics.sent_total.inc();
        }
        Err(e) => {
            error!("{}", e.chain());
            metrics.failed_total.inc();
        }
    }
}
