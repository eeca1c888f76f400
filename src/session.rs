//! The per-stream frame loop: classify, accept, debounce, buffer, compose.
//!
//! A session is driven by one input stream and processes frames strictly in
//! the order they are handed in. Several sessions may share one
//! [`Predictor`].

use crate::aggregator::{AcceptancePolicy, Debouncer, PredictionResult, Predictor, Recognition};
use crate::buffer::{WordBuffer, WordToken};
use crate::config::{RecognitionParams, SentenceTrigger};
use crate::error::SignForgeError;
use crate::landmarks::LandmarkFrame;
use crate::sentence::{is_action, synthesize};
use crate::vocab::{Label, IDLE_LABEL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug)]
pub enum FrameOutcome {
    NoHand,
    /// The frame could not be classified. The session keeps running.
    Rejected(SignForgeError),
    /// Below the acceptance threshold, or the idle label.
    Unrecognized(PredictionResult),
    /// Accepted but suppressed by the debounce window.
    Held(PredictionResult),
    Emitted {
        token: WordToken,
        prediction: PredictionResult,
        /// Set when the trigger policy composed a sentence on this frame.
        sentence: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames: u64,
    pub hands: u64,
    pub rejected: u64,
    pub accepted: u64,
    pub emitted: u64,
    pub sentences: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub words: Vec<Label>,
    pub sentence: String,
    pub timestamp: DateTime<Utc>,
}

pub struct RecognitionSession {
    predictor: Arc<Predictor>,
    policy: AcceptancePolicy,
    debouncer: Debouncer,
    trigger: SentenceTrigger,
    buffer: WordBuffer,
    history: Vec<ConversationEntry>,
    stats: SessionStats,
}

impl RecognitionSession {
    pub fn new(
        predictor: Arc<Predictor>,
        policy: AcceptancePolicy,
        debouncer: Debouncer,
        trigger: SentenceTrigger,
    ) -> Self {
        Self {
            predictor,
            policy,
            debouncer,
            trigger,
            buffer: WordBuffer::new(),
            history: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn from_params(predictor: Arc<Predictor>, params: &RecognitionParams) -> Self {
        Self::new(
            predictor,
            AcceptancePolicy::new(params.acceptance_threshold),
            Debouncer::new(Duration::from_millis(params.debounce_ms)),
            params.sentence_trigger,
        )
    }

    /// Classifies the first hand of `frame`.
    pub fn process_frame(&mut self, frame: &LandmarkFrame, now: Instant) -> FrameOutcome {
        self.stats.frames += 1;
        let Some(hand) = frame.hands.first() else {
            return FrameOutcome::NoHand;
        };
        self.stats.hands += 1;

        let prediction = match self.predictor.predict(hand) {
            Ok(p) => p,
            Err(e) => {
                debug!("Frame rejected: {}", e);
                self.stats.rejected += 1;
                return FrameOutcome::Rejected(e);
            }
        };

        let prediction = match self.policy.judge(prediction) {
            Recognition::Accepted(p) if p.top_label != IDLE_LABEL => p,
            Recognition::Accepted(p) | Recognition::LowConfidence(p) => {
                return FrameOutcome::Unrecognized(p)
            }
        };
        self.stats.accepted += 1;

        if !self.debouncer.observe(&prediction.top_label, now) {
            return FrameOutcome::Held(prediction);
        }

        let token = self
            .buffer
            .append(prediction.top_label.clone(), prediction.top_probability)
            .clone();
        self.stats.emitted += 1;
        debug!(
            "Emitted '{}' ({:.3}) from {}",
            token.word, token.confidence, prediction.model
        );

        let sentence = match self.trigger {
            SentenceTrigger::OnAction if is_action(&token.word) && self.buffer.len() >= 2 => {
                self.compose()
            }
            _ => None,
        };

        FrameOutcome::Emitted {
            token,
            prediction,
            sentence,
        }
    }

    /// Synthesizes and consumes the buffer. `None` if it is empty.
    pub fn compose(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tokens = self.buffer.take();
        let sentence = synthesize(&tokens);
        info!("Sentence: {}", sentence);
        self.history.push(ConversationEntry {
            words: tokens.into_iter().map(|t| t.word).collect(),
            sentence: sentence.clone(),
            timestamp: Utc::now(),
        });
        self.stats.sentences += 1;
        Some(sentence)
    }

    pub fn undo(&mut self) -> Option<WordToken> {
        self.buffer.pop_last()
    }

    /// Drops the buffered words and forgets the last emission.
    pub fn clear(&mut self) {
        self.buffer.flush();
        self.debouncer.reset();
    }

    pub fn buffer(&self) -> &WordBuffer {
        &self.buffer
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn trigger(&self) -> SentenceTrigger {
        self.trigger
    }
}
