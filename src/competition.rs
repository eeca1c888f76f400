use crate::aggregator::{predict_with, PredictionResult};
use crate::classifier::Classifier;
use crate::consts::DEFAULT_TOP_K;
use crate::error::{SfResult, SignForgeError};
use crate::landmarks::Landmark;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Competitor {
    pub name: String,
    pub classifier: Arc<dyn Classifier>,
}

impl Competitor {
    pub fn new(name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            name: name.into(),
            classifier,
        }
    }
}

#[derive(Debug)]
pub struct CompetitorResult {
    pub name: String,
    pub result: SfResult<PredictionResult>,
    pub latency: Duration,
}

impl CompetitorResult {
    fn score(&self) -> Option<f32> {
        self.result.as_ref().ok().map(|p| p.top_probability)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Standing {
    pub name: String,
    pub rounds: u64,
    pub wins: u64,
    pub failures: u64,
    confidence_sum: f64,
    latency_sum_ms: f64,
}

impl Standing {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Mean top probability over successful rounds.
    pub fn mean_confidence(&self) -> f32 {
        let ok = self.rounds - self.failures;
        if ok == 0 {
            0.0
        } else {
            (self.confidence_sum / ok as f64) as f32
        }
    }

    pub fn mean_latency_ms(&self) -> f32 {
        if self.rounds == 0 {
            0.0
        } else {
            (self.latency_sum_ms / self.rounds as f64) as f32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Standings {
    pub entries: Vec<Standing>,
}

impl Standings {
    pub fn get(&self, name: &str) -> Option<&Standing> {
        self.entries.iter().find(|s| s.name == name)
    }

    /// `results` must be winner-first.
    fn record(&mut self, results: &[CompetitorResult]) {
        let winner = results
            .first()
            .filter(|r| r.result.is_ok())
            .map(|r| r.name.as_str());
        for r in results {
            let Some(s) = self.entries.iter_mut().find(|s| s.name == r.name) else {
                continue;
            };
            s.rounds += 1;
            s.latency_sum_ms += r.latency.as_secs_f64() * 1000.0;
            match r.score() {
                Some(p) => s.confidence_sum += p as f64,
                None => s.failures += 1,
            }
            if winner == Some(r.name.as_str()) {
                s.wins += 1;
            }
        }
    }
}

/// Several classifiers judged on the same frames.
pub struct Competition {
    competitors: Vec<Competitor>,
    top_k: usize,
    standings: Standings,
}

impl Competition {
    pub fn new(competitors: Vec<Competitor>) -> SfResult<Self> {
        if competitors.len() < 2 {
            return Err(SignForgeError::Validation(
                "A competition needs at least two classifiers".to_string(),
            ));
        }
        for (i, c) in competitors.iter().enumerate() {
            if competitors[..i].iter().any(|o| o.name == c.name) {
                return Err(SignForgeError::Validation(format!(
                    "Duplicate competitor '{}'",
                    c.name
                )));
            }
        }
        let standings = Standings {
            entries: competitors.iter().map(|c| Standing::new(&c.name)).collect(),
        };
        Ok(Self {
            competitors,
            top_k: DEFAULT_TOP_K,
            standings,
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Classifies `hand` with every competitor. Successful results come first,
    /// highest top probability leading; failures follow in entry order.
    pub fn evaluate(&self, hand: &[Landmark]) -> Vec<CompetitorResult> {
        let mut results: Vec<CompetitorResult> = self
            .competitors
            .par_iter()
            .map(|c| {
                let start = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| {
                    predict_with(c.classifier.as_ref(), hand, self.top_k)
                }))
                .unwrap_or_else(|_| {
                    Err(SignForgeError::Validation(format!(
                        "Classifier '{}' panicked",
                        c.name
                    )))
                });
                CompetitorResult {
                    name: c.name.clone(),
                    result,
                    latency: start.elapsed(),
                }
            })
            .collect();

        results.sort_by(|a, b| match (a.score(), b.score()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        results
    }

    /// `evaluate` plus bookkeeping.
    pub fn round(&mut self, hand: &[Landmark]) -> Vec<CompetitorResult> {
        let results = self.evaluate(hand);
        self.standings.record(&results);
        results
    }

    pub fn standings(&self) -> &Standings {
        &self.standings
    }
}
