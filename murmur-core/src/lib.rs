//! Murmur Core Library
//!
//! Streaming chat client for LLM backends. A [`ChatStreamClient`] keeps a
//! bounded conversation history, builds requests through a backend-specific
//! [`ProtocolAdapter`], and delivers the streamed reply incrementally to a
//! [`StreamObserver`].
//!
//! ```no_run
//! use murmur_core::{ChatConfig, ChatStreamClient, FnObserver};
//!
//! # async fn run() -> Result<(), murmur_core::ChatError> {
//! let config = ChatConfig::generate("http://localhost:11434/api/generate", "deepseek-r1:32b");
//! let client = ChatStreamClient::from_config(&config)?;
//!
//! let session = client.send_message_stream(
//!     "Something light for dinner?",
//!     FnObserver::new(|text: &str| print!("{}", text), |result| println!("\n{:?}", result)),
//! );
//! session.finished().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod recommend;
pub mod streaming;

pub use client::{CallState, ChatSession, ChatStreamClient, FnObserver, StreamObserver};
pub use config::ChatConfig;
pub use error::{ChatError, ChatResult, LineParseError, TransportError};
pub use history::ConversationHistory;
pub use http::{HttpTransport, Transport};
pub use protocol::{Channel, ConversationTurn, Delta, RequestSpec, Role, StreamEvent};
pub use providers::{create_adapter, BackendKind, ProtocolAdapter};
pub use recommend::{Dish, DishCatalog, Preference};
pub use streaming::FrameParser;

/// Returns the version of the Murmur Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
