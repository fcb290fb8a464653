//! Token-budgeted rolling conversation history
//!
//! The context window is a token-denominated resource shared between the
//! prompt and the in-flight response, so eviction is by token budget, not
//! message count. Interactions are evicted whole, oldest first; no
//! reordering and no partial truncation.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::render::{Theme, format_text};
use crate::tokens::TokenCounter;

/// One user-prompt/model-response pair. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user_text: String,
    pub model_text: String,
}

/// Ordered log of interactions bounded by a token budget.
///
/// Invariant: after any mutation the total token count over all stored
/// interactions is at most `token_limit`, or the history is empty (a
/// single oversized interaction is evicted rather than kept).
pub struct ConversationHistory {
    interactions: VecDeque<Interaction>,
    /// Cached per-interaction token counts, parallel to `interactions`
    token_counts: VecDeque<usize>,
    /// Running sum of `token_counts`, kept in step on every push and pop
    total: usize,
    token_limit: usize,
    counter: Arc<dyn TokenCounter>,
}

impl ConversationHistory {
    /// Create an empty history with the given token budget
    pub fn new(token_limit: usize, counter: Arc<dyn TokenCounter>) -> Self {
        debug_assert!(token_limit > 0);
        Self {
            interactions: VecDeque::new(),
            token_counts: VecDeque::new(),
            total: 0,
            token_limit,
            counter,
        }
    }

    /// The configured token budget
    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Number of stored interactions
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the history holds no interactions
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Total token count over all stored interactions
    pub fn total_tokens(&self) -> usize {
        self.total
    }

    /// Append an interaction, then evict oldest-first until the budget
    /// holds. Terminates even if the new interaction alone exceeds the
    /// budget, in which case the history ends up empty.
    pub fn add_interaction(&mut self, user_text: impl Into<String>, model_text: impl Into<String>) {
        let interaction = Interaction {
            user_text: user_text.into(),
            model_text: model_text.into(),
        };
        let tokens =
            self.counter.count(&interaction.user_text) + self.counter.count(&interaction.model_text);
        self.interactions.push_back(interaction);
        self.token_counts.push_back(tokens);
        self.total += tokens;

        while self.total > self.token_limit && !self.interactions.is_empty() {
            self.interactions.pop_front();
            let evicted = self.token_counts.pop_front().unwrap_or(0);
            self.total -= evicted;
            tracing::debug!(
                evicted_tokens = evicted,
                remaining = self.interactions.len(),
                "evicted oldest interaction over token budget"
            );
        }
    }

    /// Remove all interactions
    pub fn clear(&mut self) {
        self.interactions.clear();
        self.token_counts.clear();
        self.total = 0;
    }

    /// The stored conversation as alternating "User:"/"Model:" lines, in
    /// chronological order. Empty history yields an empty string.
    ///
    /// This string is injected as the context message of the next request;
    /// it is how the assistant remembers prior turns within the budget.
    pub fn context(&self) -> String {
        let mut out = String::new();
        for interaction in &self.interactions {
            out.push_str("User: ");
            out.push_str(&interaction.user_text);
            out.push_str("\nModel: ");
            out.push_str(&interaction.model_text);
            out.push('\n');
        }
        out
    }

    /// Like [`context`](Self::context) but with each text styled through
    /// the code-span formatter, for human review.
    pub fn format_for_display(&self, theme: Theme) -> String {
        let mut out = String::new();
        for interaction in &self.interactions {
            out.push_str("User: ");
            out.push_str(&format_text(&interaction.user_text, theme));
            out.push_str("\nModel: ");
            out.push_str(&format_text(&interaction.model_text, theme));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test double: one token per whitespace-separated word
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn history(limit: usize) -> ConversationHistory {
        ConversationHistory::new(limit, Arc::new(WordCounter))
    }

    #[test]
    fn test_empty_context_is_empty_string() {
        assert_eq!(history(10).context(), "");
    }

    #[test]
    fn test_single_interaction_context_format() {
        let mut h = history(100);
        h.add_interaction("u", "m");
        assert_eq!(h.context(), "User: u\nModel: m\n");
    }

    #[test]
    fn test_budget_holds_after_every_add() {
        let mut h = history(10);
        for i in 0..20 {
            h.add_interaction(format!("question {}", i), format!("answer {}", i));
            assert!(h.total_tokens() <= 10 || h.is_empty());
        }
    }

    #[test]
    fn test_eviction_is_fifo_suffix() {
        // 20 tokens per interaction (10 words user + 10 words model),
        // limit 50: after the third add only the two newest survive
        let mut h = history(50);
        let ten_words = "a b c d e f g h i j";
        h.add_interaction(format!("first {}", &ten_words[2..]), ten_words);
        h.add_interaction(format!("second {}", &ten_words[2..]), ten_words);
        h.add_interaction(format!("third {}", &ten_words[2..]), ten_words);

        assert_eq!(h.len(), 2);
        assert!(h.total_tokens() <= 50);
        let ctx = h.context();
        assert!(!ctx.contains("first"));
        assert!(ctx.contains("second"));
        assert!(ctx.contains("third"));
        // chronological order preserved
        assert!(ctx.find("second").unwrap() < ctx.find("third").unwrap());
    }

    #[test]
    fn test_oversized_interaction_empties_history() {
        let mut h = history(3);
        h.add_interaction("one two", "three four");
        assert!(h.is_empty());
        assert_eq!(h.context(), "");
    }

    #[test]
    fn test_running_total_stays_consistent() {
        // the cached total must match a fresh recount after adds that
        // evict several interactions at once, and after clear
        let mut h = history(8);
        h.add_interaction("one two", "three four");
        h.add_interaction("five six", "seven eight");
        assert_eq!(h.total_tokens(), 8);

        // 6-token interaction forces two evictions in a single add
        h.add_interaction("a b c", "d e f");
        assert_eq!(h.len(), 1);
        assert_eq!(h.total_tokens(), 6);

        h.clear();
        assert_eq!(h.total_tokens(), 0);
        h.add_interaction("x", "y");
        assert_eq!(h.total_tokens(), 2);
    }

    #[test]
    fn test_clear_then_context_is_empty() {
        let mut h = history(100);
        h.add_interaction("hello there", "hi");
        h.add_interaction("more text", "reply");
        h.clear();
        assert_eq!(h.context(), "");
        assert_eq!(h.total_tokens(), 0);
    }

    #[test]
    fn test_context_does_not_mutate() {
        let mut h = history(100);
        h.add_interaction("a", "b");
        let first = h.context();
        let second = h.context();
        assert_eq!(first, second);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_format_for_display_strips_backticks() {
        let mut h = history(100);
        h.add_interaction("show me code", "here: ```let x = 1;```");
        let display = h.format_for_display(Theme::default());
        assert!(!display.contains('`'));
        assert!(display.contains("let x = 1;"));
        // raw context keeps the markers for the next request
        assert!(h.context().contains("```"));
    }
}
