//! HTTP transport implementation using reqwest

use crate::config::ConnectionConfig;
use crate::error::{ChatError, TransportError};
use crate::http::error::map_http_error;
use crate::http::{ByteStream, RequestOptions, Transport};
use crate::protocol::RequestSpec;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default user agent
const USER_AGENT: &str = concat!("murmur/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP transport with connection pooling
#[derive(Clone)]
pub struct HttpTransport {
    /// The underlying reqwest client
    client: Arc<Client>,
}

impl HttpTransport {
    /// Create a new transport with default connection settings
    pub fn new() -> Result<Self, ChatError> {
        Self::with_config(&ConnectionConfig::default())
    }

    /// Create a new transport from connection configuration.
    ///
    /// No overall request timeout is set here; per-request timeouts come
    /// from [`RequestOptions`].
    pub fn with_config(connection: &ConnectionConfig) -> Result<Self, ChatError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(connection.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_millis(connection.connect_timeout_ms))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        request: RequestSpec,
        options: RequestOptions,
    ) -> Result<ByteStream, ChatError> {
        let request_id = options.request_id;

        info!(
            "Opening stream to {} [request_id: {}]",
            request.endpoint, request_id
        );
        debug!("Request: {:?}", request);

        let mut req_builder = self
            .client
            .post(request.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/x-ndjson, text/event-stream")
            .header("X-Request-ID", request_id.to_string())
            .body(request.body);

        if let Some(timeout) = options.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        for (name, value) in &request.headers {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }

        let response = req_builder.send().await.map_err(|e| {
            let err = TransportError::from(e);
            match &err {
                TransportError::Timeout => {
                    warn!("Request timeout [request_id: {}]", request_id)
                }
                other => error!("Request failed [request_id: {}]: {}", request_id, other),
            }
            err
        })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request_id);

        if !status.is_success() {
            // Try to get response body for error details
            let body = response.text().await.ok();

            warn!(
                "Request failed with status {} [request_id: {}]",
                status, request_id
            );

            return Err(map_http_error(status, body, request_id).into());
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ChatError::from));

        Ok(Box::pin(stream))
    }
}
