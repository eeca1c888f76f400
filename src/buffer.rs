use crate::vocab::Label;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    pub word: Label,
    pub confidence: f32,
    /// Monotonic within one buffer; never reused after undo or flush.
    pub insertion_order: u64,
}

/// Accepted tokens of the current utterance, in recognition order.
#[derive(Debug, Clone, Default)]
pub struct WordBuffer {
    tokens: Vec<WordToken>,
    next_order: u64,
}

impl WordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, word: impl Into<Label>, confidence: f32) -> &WordToken {
        let order = self.next_order;
        self.next_order += 1;
        self.tokens.push(WordToken {
            word: word.into(),
            confidence,
            insertion_order: order,
        });
        &self.tokens[self.tokens.len() - 1]
    }

    /// Undo. `None` on an empty buffer.
    pub fn pop_last(&mut self) -> Option<WordToken> {
        self.tokens.pop()
    }

    pub fn flush(&mut self) {
        self.tokens.clear();
    }

    /// Empties the buffer and hands the tokens to the caller.
    pub fn take(&mut self) -> Vec<WordToken> {
        std::mem::take(&mut self.tokens)
    }

    pub fn peek(&self) -> &[WordToken] {
        &self.tokens
    }

    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.word.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
