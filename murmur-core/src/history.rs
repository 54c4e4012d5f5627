//! Bounded conversation history
//!
//! Keeps the most recent turns of a conversation for inclusion in the next
//! request. When the capacity is exceeded the oldest non-system turn is
//! dropped, so system turns survive eviction.

use crate::protocol::{ConversationTurn, Role};

/// Default number of turns kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Ordered, bounded log of conversation turns
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a turn, evicting the earliest non-system turn if over capacity
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ConversationTurn::new(role, content));

        if self.turns.len() > self.capacity {
            if let Some(index) = self.turns.iter().position(|t| t.role() != Role::System) {
                // Vec::remove shifts the tail left, keeping relative order
                self.turns.remove(index);
            }
        }
    }

    /// Remove every turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Read-only view of the turns, oldest first
    pub fn snapshot(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The most recent turn
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
