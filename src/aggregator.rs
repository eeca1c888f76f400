//! Turns one hand into a ranked prediction, and decides which predictions
//! become recognition events.

use crate::classifier::{Classifier, ClassifierInput, ClassifierKind};
use crate::config::{FallbackPolicy, RecognitionParams};
use crate::error::{SfResult, SignForgeError};
use crate::landmarks::{normalize, Landmark};
use crate::rules::RuleClassifier;
use crate::vocab::Label;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub label: Label,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub top_label: Label,
    pub top_probability: f32,
    /// Descending by probability, at most `top_k` entries.
    pub ranked: Vec<RankedPrediction>,
    pub source: ClassifierKind,
    pub model: String,
}

/// Sorts a probability vector against its labels. Ties keep label order.
pub fn rank(
    labels: &[Label],
    probabilities: &[f32],
    top_k: usize,
) -> SfResult<Vec<RankedPrediction>> {
    if labels.len() != probabilities.len() {
        return Err(SignForgeError::LabelMismatch {
            expected: labels.len(),
            found: probabilities.len(),
        });
    }
    let mut ranked: Vec<RankedPrediction> = labels
        .iter()
        .zip(probabilities)
        .map(|(l, &p)| RankedPrediction {
            label: l.clone(),
            probability: p,
        })
        .collect();
    ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    ranked.truncate(top_k.max(1));
    Ok(ranked)
}

/// Runs a single classifier over one hand.
pub fn predict_with(
    classifier: &dyn Classifier,
    hand: &[Landmark],
    top_k: usize,
) -> SfResult<PredictionResult> {
    let normalized = normalize(hand)?;
    let input = ClassifierInput {
        raw: hand,
        normalized: &normalized,
    };
    let probabilities = classifier.predict(&input)?;
    let ranked = rank(classifier.vocabulary().labels(), &probabilities, top_k)?;
    let top = &ranked[0];
    Ok(PredictionResult {
        top_label: top.label.clone(),
        top_probability: top.probability,
        source: classifier.kind(),
        model: classifier.name().to_string(),
        ranked,
    })
}

/// Holds the active classifier. Swapping is a pointer replacement, so a
/// prediction that already cloned the handle finishes on the old model.
pub struct Predictor {
    active: RwLock<Option<Arc<dyn Classifier>>>,
    rules: Arc<RuleClassifier>,
    fallback: FallbackPolicy,
    top_k: usize,
}

impl Predictor {
    pub fn new(rules: RuleClassifier, fallback: FallbackPolicy, top_k: usize) -> Self {
        Self {
            active: RwLock::new(None),
            rules: Arc::new(rules),
            fallback,
            top_k,
        }
    }

    pub fn from_params(rules: RuleClassifier, params: &RecognitionParams) -> Self {
        Self::new(rules, params.fallback, params.top_k)
    }

    pub fn rules(&self) -> &RuleClassifier {
        &self.rules
    }

    /// Installs `classifier` and returns the one it replaced.
    pub fn activate(&self, classifier: Arc<dyn Classifier>) -> Option<Arc<dyn Classifier>> {
        match self.active.write() {
            Ok(mut slot) => slot.replace(classifier),
            Err(poisoned) => poisoned.into_inner().replace(classifier),
        }
    }

    pub fn deactivate(&self) -> Option<Arc<dyn Classifier>> {
        match self.active.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// The loaded model, if any. Does not consider the fallback.
    pub fn active(&self) -> Option<Arc<dyn Classifier>> {
        match self.active.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The classifier a prediction would use right now.
    pub fn current(&self) -> SfResult<Arc<dyn Classifier>> {
        if let Some(c) = self.active() {
            return Ok(c);
        }
        match self.fallback {
            FallbackPolicy::Rules => {
                let rules: Arc<dyn Classifier> = self.rules.clone();
                Ok(rules)
            }
            FallbackPolicy::None => Err(SignForgeError::ModelNotLoaded),
        }
    }

    pub fn predict(&self, hand: &[Landmark]) -> SfResult<PredictionResult> {
        let classifier = self.current()?;
        predict_with(classifier.as_ref(), hand, self.top_k)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Accepted(PredictionResult),
    /// Below threshold. A normal outcome, distinct from an error.
    LowConfidence(PredictionResult),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptancePolicy {
    pub threshold: f32,
}

impl AcceptancePolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Strictly greater than the threshold.
    pub fn accepts(&self, probability: f32) -> bool {
        probability > self.threshold
    }

    pub fn judge(&self, result: PredictionResult) -> Recognition {
        if self.accepts(result.top_probability) {
            Recognition::Accepted(result)
        } else {
            Recognition::LowConfidence(result)
        }
    }
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self::new(crate::consts::DEFAULT_ACCEPTANCE_THRESHOLD)
    }
}

/// Suppresses repeats of the same label inside the window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<(Label, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns whether `label` should be emitted at `now`, recording it if so.
    pub fn observe(&mut self, label: &str, now: Instant) -> bool {
        let emit = match &self.last {
            Some((prev, at)) if prev == label => now.saturating_duration_since(*at) >= self.window,
            _ => true,
        };
        if emit {
            self.last = Some((label.to_string(), now));
        }
        emit
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::consts::DEFAULT_DEBOUNCE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_is_descending_and_truncated() {
        let labels: Vec<Label> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ranked = rank(&labels, &[0.1, 0.4, 0.4, 0.1], 3).unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].label, "b");
        assert_eq!(ranked[1].label, "c");
        assert_eq!(ranked[2].label, "a");
    }

    #[test]
    fn rank_rejects_width_mismatch() {
        let labels: Vec<Label> = vec!["a".into()];
        assert!(matches!(
            rank(&labels, &[0.5, 0.5], 5),
            Err(SignForgeError::LabelMismatch { .. })
        ));
    }

    #[test]
    fn threshold_is_strict() {
        let p = AcceptancePolicy::default();
        assert!(!p.accepts(0.93));
        assert!(p.accepts(0.931));
    }
}
