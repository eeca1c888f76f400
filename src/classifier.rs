use crate::error::{SfResult, SignForgeError};
use crate::landmarks::{Landmark, NormalizedHand};
use crate::network::Network;
use crate::rules::RuleClassifier;
use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// One hand as both classifiers need it: raw points for the geometric rules,
/// the normalized tensor for the network.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub raw: &'a [Landmark],
    pub normalized: &'a NormalizedHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Rules,
    Statistical,
}

/// A probability (or confidence) vector over `vocabulary()`, index-aligned.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ClassifierKind;
    fn vocabulary(&self) -> &Vocabulary;
    fn predict(&self, input: &ClassifierInput<'_>) -> SfResult<Vec<f32>>;
}

impl Classifier for RuleClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Rules
    }

    fn vocabulary(&self) -> &Vocabulary {
        RuleClassifier::vocabulary(self)
    }

    fn predict(&self, input: &ClassifierInput<'_>) -> SfResult<Vec<f32>> {
        self.confidence_vector(input.raw)
    }
}

/// A trained network together with the label order it was trained against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalClassifier {
    name: String,
    vocabulary: Vocabulary,
    network: Network,
}

impl StatisticalClassifier {
    pub fn new(name: impl Into<String>, vocabulary: Vocabulary, network: Network) -> SfResult<Self> {
        network.validate()?;
        if network.classes() != vocabulary.len() {
            return Err(SignForgeError::LabelMismatch {
                expected: vocabulary.len(),
                found: network.classes(),
            });
        }
        Ok(Self {
            name: name.into(),
            vocabulary,
            network,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Same weights under a different registry name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn predict_normalized(&self, hand: &NormalizedHand) -> Vec<f32> {
        self.network.predict(&hand.to_input())
    }
}

impl Classifier for StatisticalClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Statistical
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn predict(&self, input: &ClassifierInput<'_>) -> SfResult<Vec<f32>> {
        let probs = self.predict_normalized(input.normalized);
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(SignForgeError::Validation(format!(
                "Model '{}' produced a non-finite probability",
                self.name
            )));
        }
        Ok(probs)
    }
}
