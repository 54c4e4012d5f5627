//! Protocol adapters
//!
//! This module implements the backend abstraction that lets one streaming
//! client talk to incompatible LLM wire formats. An adapter builds the
//! outbound request and interprets each inbound response line.

pub mod adapter;
pub mod agent;
pub mod generate;

pub use adapter::{create_adapter, parse_endpoint, BackendKind, ProtocolAdapter};

// Re-export concrete adapters
pub use agent::AgentMessageAdapter;
pub use generate::{flatten_prompt, GenerateAdapter};
