//! SSE Transport
//!
//! Streams chat responses over Server-Sent Events. The request is a JSON
//! `POST`; the response body is parsed into SSE messages and each message's
//! `data` field is forwarded verbatim.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;

use super::traits::{ChatRequest, ChatTransport, TransportStream};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::events::TransportEvent;

const EVENT_STREAM: &str = "text/event-stream";

/// SSE chat transport
#[derive(Clone, Debug)]
pub struct SseTransport {
    /// Full endpoint URL
    url: Url,
    /// HTTP client
    http_client: reqwest::Client,
    /// Capacity of each stream's event channel
    channel_capacity: usize,
}

impl SseTransport {
    /// Create a transport for the endpoint described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TransportSetup`] if the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        let url = config
            .chat_url()
            .map_err(|e| ChatError::TransportSetup(e.to_string()))?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChatError::TransportSetup(e.to_string()))?;

        Ok(Self {
            url,
            http_client,
            channel_capacity: config.channel_capacity,
        })
    }

    /// Endpoint this transport posts to
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for SseTransport {
    fn name(&self) -> &str {
        "sse"
    }

    async fn open(&self, request: &ChatRequest) -> Result<TransportStream, ChatError> {
        tracing::debug!(url = %self.url, thread_id = %request.thread_id, "Opening chat stream");

        let response = self
            .http_client
            .post(self.url.clone())
            .header(ACCEPT, EVENT_STREAM)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::TransportSetup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::TransportSetup(format!(
                "server returned {status}: {}",
                body.trim()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains(EVENT_STREAM) {
            return Err(ChatError::TransportSetup(format!(
                "expected content-type {EVENT_STREAM}, got {content_type:?}"
            )));
        }

        let (tx, stream) = TransportStream::channel(self.channel_capacity);
        let mut events = Box::pin(response.bytes_stream().eventsource());

        // Pump SSE messages until the body ends or the receiver goes away
        let task = tokio::spawn(async move {
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        if event.data.is_empty() {
                            continue;
                        }
                        if tx.send(TransportEvent::Message(event.data)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Chat stream failed");
                        let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                }
            }
            let _ = tx.send(TransportEvent::Closed).await;
        });

        Ok(stream.with_task(task.abort_handle()))
    }
}
