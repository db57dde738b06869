//! Sliding window of recent conversation turns.

use std::collections::VecDeque;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the customer asked.
    pub user_text: String,
    /// What the agent answered.
    pub assistant_text: String,
}

impl ConversationTurn {
    /// Creates a turn.
    #[must_use]
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
        }
    }
}

/// Fixed-capacity FIFO of turns; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    /// Creates an empty history holding at most `capacity` turns (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a turn, evicting the oldest when full.
    pub fn append(&mut self, turn: ConversationTurn) {
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The last `n` turns, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Drops every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of retained turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of retained turns.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Renders retained turns as `Customer:`/`Agent:` lines.
    ///
    /// Returns `None` when empty so callers omit the section entirely.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        if self.turns.is_empty() {
            return None;
        }
        let mut out = String::new();
        for (i, turn) in self.turns.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(
                out,
                "Customer: {}\nAgent: {}",
                turn.user_text, turn.assistant_text
            );
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_oldest() {
        let mut history = ConversationHistory::new(3);
        for i in 0..5 {
            history.append(ConversationTurn::new(format!("q{i}"), format!("a{i}")));
        }
        assert_eq!(history.len(), 3);
        let users: Vec<_> = history
            .recent(3)
            .into_iter()
            .map(|t| t.user_text)
            .collect();
        assert_eq!(users, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_recent_larger_than_len() {
        let mut history = ConversationHistory::new(3);
        history.append(ConversationTurn::new("q", "a"));
        assert_eq!(history.recent(10).len(), 1);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn test_render() {
        let mut history = ConversationHistory::new(3);
        assert_eq!(history.render(), None);

        history.append(ConversationTurn::new("My screen is frozen", "Hold power for 10s."));
        history.append(ConversationTurn::new("Still frozen", "Try a factory reset."));
        assert_eq!(
            history.render().as_deref(),
            Some(
                "Customer: My screen is frozen\nAgent: Hold power for 10s.\n\
                 Customer: Still frozen\nAgent: Try a factory reset."
            )
        );

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.render(), None);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = ConversationHistory::new(0);
        history.append(ConversationTurn::new("a", "b"));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_bounded_and_order_preserving(
            capacity in 1usize..6,
            count in 0usize..20,
        ) {
            let mut history = ConversationHistory::new(capacity);
            for i in 0..count {
                history.append(ConversationTurn::new(i.to_string(), String::new()));
            }
            prop_assert!(history.len() <= capacity);

            let kept: Vec<usize> = history
                .recent(capacity)
                .iter()
                .filter_map(|t| t.user_text.parse().ok())
                .collect();
            let expected: Vec<usize> = (count.saturating_sub(capacity)..count).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
