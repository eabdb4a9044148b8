//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Out-of-band delivery of event payloads to connections that registered a URL callback.
//
// | Component          | Description                                                 |
// |--------------------|-------------------------------------------------------------|
// | WebhookDispatcher  | POSTs a payload to a set of callbacks concurrently          |
// | WebhookReport      | Per-dispatch counts of delivered and failed requests        |
// | WebhookError       | Failure of one request; logged, never returned to producers |
//--------------------------------------------------------------------------------------------------

use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::models::types::UrlCallback;

/// Failure of a single webhook request.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebhookReport {
    pub delivered: usize,
    pub failed: usize,
}

/// POSTs JSON payloads to URL callbacks.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookDispatcher {
    /// Creates a dispatcher whose requests are each bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `payload` to every callback concurrently.
    ///
    /// # Arguments
    /// * `payload` - Serialized event, sent as the request body
    /// * `callbacks` - Targets; basic auth is used when a username is set
    ///
    /// # Returns
    /// Delivered and failed counts. Failures are logged here.
    pub async fn dispatch(&self, payload: Bytes, callbacks: Vec<UrlCallback>) -> WebhookReport {
        let requests = callbacks
            .iter()
            .map(|callback| self.send(payload.clone(), callback));

        let mut report = WebhookReport::default();
        for result in join_all(requests).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Webhook delivery failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        debug!(delivered = report.delivered, failed = report.failed, "Webhook dispatch finished");
        report
    }

    async fn send(&self, payload: Bytes, callback: &UrlCallback) -> Result<(), WebhookError> {
        let mut request = self
            .client
            .post(&callback.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(username) = &callback.username {
            request = request.basic_auth(username, callback.password.as_ref());
        }

        let to_request_error = |source: reqwest::Error| WebhookError::Request {
            url: callback.url.clone(),
            source,
        };
        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(to_request_error)?;
        Ok(())
    }
}
