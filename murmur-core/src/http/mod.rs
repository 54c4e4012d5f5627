//! Transport layer for streaming requests
//!
//! This module implements the network side of a chat call:
//! - The [`Transport`] seam the client streams through
//! - A reqwest-backed implementation with connection pooling
//! - Mapping of HTTP failures to [`TransportError`](crate::error::TransportError)
//! - Request ID generation for log correlation

pub mod client;
pub mod error;

use crate::error::ChatError;
use crate::protocol::RequestSpec;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

pub use client::HttpTransport;

/// Byte chunks of one response.
///
/// Each `Ok` item is a chunk, an `Err` item ends the stream with an error
/// and the end of the stream is a clean completion.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Options for a single streaming request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Whole-request timeout. `None` leaves liveness to the connection.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Performs the network I/O of a chat call.
///
/// Dropping the returned stream cancels the request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and start receiving the response body
    async fn open(&self, request: RequestSpec, options: RequestOptions)
        -> Result<ByteStream, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options() {
        let options = RequestOptions::new();
        assert!(options.timeout.is_none());

        let other = RequestOptions::new().with_timeout(Duration::from_secs(60));
        assert_eq!(other.timeout, Some(Duration::from_secs(60)));
        assert_ne!(options.request_id, other.request_id);
    }
}
