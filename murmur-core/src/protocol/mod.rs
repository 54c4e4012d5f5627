//! Protocol module for chat streaming structures
//!
//! This module defines the backend-neutral data model shared by the client,
//! the frame parser and the protocol adapters. The types are:
//! - Backend-agnostic
//! - Cheap to clone per call
//! - Safe to log (secrets are redacted in `Debug`)

pub mod types;

pub use types::{Channel, ConversationTurn, Delta, RequestSpec, Role, StreamEvent};
