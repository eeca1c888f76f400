//! Supervised training of the gesture network.
//!
//! Training runs on the caller's thread ([`Trainer::train`]) or on a
//! dedicated one ([`TrainingJob::spawn`]). Progress is pushed to a
//! [`TrainingObserver`]; cancellation is cooperative and checked at every
//! epoch boundary. The network under training never leaves this module
//! unless the run completes.

use crate::classifier::StatisticalClassifier;
use crate::config::{Hyperparameters, TrainingParams};
use crate::consts::{INPUT_WIDTH, MIN_TRAINING_LABELS, RECOMMENDED_LABELS, RECOMMENDED_SAMPLES};
use crate::dataset::{DatasetStats, Sample};
use crate::error::{SfResult, SignForgeError};
use crate::network::{argmax, cross_entropy, Adam, Network};
use crate::registry::{ModelMetadata, RunMetrics, TrainedModel};
use crate::vocab::Vocabulary;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Predictions timed after a run to fill in `RunMetrics::inference_ms`.
pub const LATENCY_ROUNDS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetWarning {
    /// Fewer samples than recommended.
    FewSamples,
    /// Fewer distinct labels than recommended.
    FewLabels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReadiness {
    pub sample_count: usize,
    pub label_count: usize,
    pub warnings: Vec<DatasetWarning>,
}

impl DatasetReadiness {
    pub fn can_train(&self) -> bool {
        self.label_count >= MIN_TRAINING_LABELS
    }
}

/// Soft readiness check. Only `can_train() == false` blocks training.
pub fn assess_dataset(samples: &[Sample]) -> DatasetReadiness {
    let stats = DatasetStats::from_samples(samples);
    let mut warnings = Vec::new();
    if stats.total_samples < RECOMMENDED_SAMPLES {
        warnings.push(DatasetWarning::FewSamples);
    }
    if stats.label_count() < RECOMMENDED_LABELS {
        warnings.push(DatasetWarning::FewLabels);
    }
    DatasetReadiness {
        sample_count: stats.total_samples,
        label_count: stats.label_count(),
        warnings,
    }
}

/// `model_YYYYMMDD_HHMMSS`
pub fn default_model_name(now: DateTime<Utc>) -> String {
    now.format("model_%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based.
    pub epoch: usize,
    pub train_accuracy: f32,
    pub validation_accuracy: f32,
    pub train_loss: f32,
    pub validation_loss: f32,
}

/// The ordered metric stream: one `Epoch` per completed epoch, then exactly
/// one `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrainingEvent {
    Epoch(EpochMetrics),
    Completed { final_accuracy: f32, elapsed_ms: u64 },
    Failed { message: String },
}

/// Receives training events. Returning `false` requests cancellation.
pub trait TrainingObserver: Send + Sync {
    fn on_event(&self, event: &TrainingEvent) -> bool;
}

impl<F> TrainingObserver for F
where
    F: Fn(&TrainingEvent) -> bool + Send + Sync,
{
    fn on_event(&self, event: &TrainingEvent) -> bool {
        self(event)
    }
}

pub struct NullObserver;

impl TrainingObserver for NullObserver {
    fn on_event(&self, _event: &TrainingEvent) -> bool {
        true
    }
}

/// Forwards events to another thread. A dropped receiver does not stop training.
pub struct ChannelObserver {
    tx: Mutex<Sender<TrainingEvent>>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<TrainingEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl TrainingObserver for ChannelObserver {
    fn on_event(&self, event: &TrainingEvent) -> bool {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event.clone());
        }
        true
    }
}

#[derive(Serialize)]
struct MetricsRow<'a> {
    event: &'a str,
    epoch: Option<usize>,
    train_accuracy: Option<f32>,
    validation_accuracy: Option<f32>,
    train_loss: Option<f32>,
    validation_loss: Option<f32>,
    final_accuracy: Option<f32>,
    elapsed_ms: Option<u64>,
    message: Option<&'a str>,
}

/// Persists the metric stream as CSV, one row per event.
pub struct MetricsCsvObserver {
    writer: Mutex<csv::Writer<File>>,
}

impl MetricsCsvObserver {
    pub fn create<P: AsRef<Path>>(path: P) -> SfResult<Self> {
        let writer = csv::Writer::from_path(path)?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    fn write(&self, event: &TrainingEvent) -> SfResult<()> {
        let empty = MetricsRow {
            event: "",
            epoch: None,
            train_accuracy: None,
            validation_accuracy: None,
            train_loss: None,
            validation_loss: None,
            final_accuracy: None,
            elapsed_ms: None,
            message: None,
        };
        let row = match event {
            TrainingEvent::Epoch(m) => MetricsRow {
                event: "epoch",
                epoch: Some(m.epoch),
                train_accuracy: Some(m.train_accuracy),
                validation_accuracy: Some(m.validation_accuracy),
                train_loss: Some(m.train_loss),
                validation_loss: Some(m.validation_loss),
                ..empty
            },
            TrainingEvent::Completed {
                final_accuracy,
                elapsed_ms,
            } => MetricsRow {
                event: "completed",
                final_accuracy: Some(*final_accuracy),
                elapsed_ms: Some(*elapsed_ms),
                ..empty
            },
            TrainingEvent::Failed { message } => MetricsRow {
                event: "failed",
                message: Some(message),
                ..empty
            },
        };

        let mut w = self
            .writer
            .lock()
            .map_err(|e| SignForgeError::Validation(format!("Metrics writer poisoned: {}", e)))?;
        w.serialize(row)?;
        w.flush()?;
        Ok(())
    }
}

impl TrainingObserver for MetricsCsvObserver {
    fn on_event(&self, event: &TrainingEvent) -> bool {
        if let Err(e) = self.write(event) {
            warn!("Failed to persist training metrics: {}", e);
        }
        true
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A completed run: the artifact plus its per-epoch history.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub history: Vec<EpochMetrics>,
    pub elapsed_ms: u64,
}

impl TrainingOutcome {
    pub fn final_accuracy(&self) -> f32 {
        self.model.metadata.accuracy
    }
}

#[derive(Debug, Clone)]
pub struct Trainer {
    vocabulary: Vocabulary,
    hyperparameters: Hyperparameters,
    seed: Option<u64>,
}

impl Trainer {
    pub fn new(vocabulary: Vocabulary, hyperparameters: Hyperparameters, seed: Option<u64>) -> Self {
        Self {
            vocabulary,
            hyperparameters,
            seed,
        }
    }

    pub fn from_params(vocabulary: Vocabulary, params: &TrainingParams) -> SfResult<Self> {
        Ok(Self::new(vocabulary, params.resolve()?, params.seed))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Runs to completion, cancellation or failure. Exactly one terminal
    /// event is emitted in every case.
    pub fn train(
        &self,
        name: &str,
        samples: &[Sample],
        observer: &dyn TrainingObserver,
        cancel: &CancelToken,
    ) -> SfResult<TrainingOutcome> {
        let result = self.run(name, samples, observer, cancel);
        if let Err(e) = &result {
            warn!("Training '{}' failed: {}", name, e);
            observer.on_event(&TrainingEvent::Failed {
                message: e.to_string(),
            });
        }
        result
    }

    fn encode(&self, samples: &[Sample]) -> SfResult<(Vec<[f32; INPUT_WIDTH]>, Vec<usize>)> {
        let mut inputs = Vec::with_capacity(samples.len());
        let mut targets = Vec::with_capacity(samples.len());
        let mut skipped = 0;
        for s in samples {
            match self.vocabulary.index_of(&s.label) {
                Some(t) => {
                    inputs.push(s.landmarks.to_input());
                    targets.push(t);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Dropped {} samples with labels outside the vocabulary", skipped);
        }

        let mut distinct = targets.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < MIN_TRAINING_LABELS {
            return Err(SignForgeError::InsufficientTrainingData {
                distinct_labels: distinct.len(),
            });
        }
        Ok((inputs, targets))
    }

    fn run(
        &self,
        name: &str,
        samples: &[Sample],
        observer: &dyn TrainingObserver,
        cancel: &CancelToken,
    ) -> SfResult<TrainingOutcome> {
        let (inputs, targets) = self.encode(samples)?;
        let hp = self.hyperparameters;
        let start = Instant::now();

        let mut rng = match self.seed {
            Some(s) => fastrand::Rng::with_seed(s),
            None => fastrand::Rng::new(),
        };

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        rng.shuffle(&mut order);
        let split_at = ((inputs.len() as f32 * (1.0 - hp.validation_split)).floor() as usize)
            .clamp(1, inputs.len());
        let (train_idx, val_idx) = order.split_at(split_at);
        let mut train_idx = train_idx.to_vec();

        info!(
            "Training '{}': {} train / {} validation samples, {} epochs, batch {}",
            name,
            train_idx.len(),
            val_idx.len(),
            hp.epochs,
            hp.batch_size
        );

        let mut net = Network::new(self.vocabulary.len(), &mut rng);
        let mut adam = Adam::new(hp.learning_rate);
        let mut history = Vec::with_capacity(hp.epochs);
        let mut batch_inputs = Vec::with_capacity(hp.batch_size * INPUT_WIDTH);
        let mut batch_targets = Vec::with_capacity(hp.batch_size);
        let mut epoch_ms_sum = 0.0f64;

        for epoch in 0..hp.epochs {
            if cancel.is_cancelled() {
                return Err(SignForgeError::TrainingAborted(format!(
                    "cancelled before epoch {}",
                    epoch
                )));
            }

            let epoch_start = Instant::now();
            rng.shuffle(&mut train_idx);
            let mut loss_sum = 0.0;
            let mut correct = 0;
            for chunk in train_idx.chunks(hp.batch_size) {
                batch_inputs.clear();
                batch_targets.clear();
                for &i in chunk {
                    batch_inputs.extend_from_slice(&inputs[i]);
                    batch_targets.push(targets[i]);
                }
                let (stats, grads) = net.train_batch(&batch_inputs, &batch_targets, &mut rng);
                if !stats.loss.is_finite() {
                    return Err(SignForgeError::TrainingAborted(format!(
                        "non-finite loss in epoch {}",
                        epoch
                    )));
                }
                adam.apply(&mut net, &grads);
                loss_sum += stats.loss * chunk.len() as f32;
                correct += stats.correct;
            }

            let n = train_idx.len() as f32;
            let (train_loss, train_accuracy) = (loss_sum / n, correct as f32 / n);
            let (validation_loss, validation_accuracy) = if val_idx.is_empty() {
                (train_loss, train_accuracy)
            } else {
                evaluate(&net, &inputs, &targets, val_idx)
            };

            epoch_ms_sum += epoch_start.elapsed().as_secs_f64() * 1000.0;

            let metrics = EpochMetrics {
                epoch,
                train_accuracy,
                validation_accuracy,
                train_loss,
                validation_loss,
            };
            debug!("{:?}", metrics);
            history.push(metrics);

            if !observer.on_event(&TrainingEvent::Epoch(metrics)) {
                cancel.cancel();
                return Err(SignForgeError::TrainingAborted(format!(
                    "cancelled by observer after epoch {}",
                    epoch
                )));
            }
        }

        let final_accuracy = history.last().map_or(0.0, |m| m.validation_accuracy);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let mut distinct = targets.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let timing_pool: Vec<[f32; INPUT_WIDTH]> = if val_idx.is_empty() {
            train_idx.iter().map(|&i| inputs[i]).collect()
        } else {
            val_idx.iter().map(|&i| inputs[i]).collect()
        };
        let run = RunMetrics {
            train_accuracy: history.last().map_or(0.0, |m| m.train_accuracy),
            train_time_ms: elapsed_ms,
            avg_epoch_ms: (epoch_ms_sum / hp.epochs.max(1) as f64) as f32,
            inference_ms: inference_latency_ms(&net, &timing_pool, LATENCY_ROUNDS, &mut rng),
            parameters: net.parameter_count(),
            batch_size: hp.batch_size,
            learning_rate: hp.learning_rate,
        };

        let classifier = StatisticalClassifier::new(name, self.vocabulary.clone(), net)?;
        let model = TrainedModel {
            metadata: ModelMetadata {
                name: name.to_string(),
                accuracy: final_accuracy,
                sample_count: inputs.len(),
                gesture_count: distinct.len(),
                epochs: hp.epochs,
                timestamp: Utc::now(),
                run,
            },
            classifier,
        };

        info!(
            "Training '{}' finished: accuracy {:.4} in {} ms",
            name, final_accuracy, elapsed_ms
        );
        observer.on_event(&TrainingEvent::Completed {
            final_accuracy,
            elapsed_ms,
        });

        Ok(TrainingOutcome {
            model,
            history,
            elapsed_ms,
        })
    }
}

/// Mean wall time in milliseconds of one single-hand prediction, over
/// `rounds` inputs drawn at random from `pool`. Zero if either is empty.
pub fn inference_latency_ms(
    net: &Network,
    pool: &[[f32; INPUT_WIDTH]],
    rounds: usize,
    rng: &mut fastrand::Rng,
) -> f32 {
    if pool.is_empty() || rounds == 0 {
        return 0.0;
    }
    let mut total = 0.0f64;
    for _ in 0..rounds {
        let input = &pool[rng.usize(..pool.len())];
        let start = Instant::now();
        std::hint::black_box(net.predict(input));
        total += start.elapsed().as_secs_f64();
    }
    (total * 1000.0 / rounds as f64) as f32
}

/// Inference-mode loss and accuracy over `idx`.
fn evaluate(
    net: &Network,
    inputs: &[[f32; INPUT_WIDTH]],
    targets: &[usize],
    idx: &[usize],
) -> (f32, f32) {
    let (loss, correct) = idx
        .par_iter()
        .map(|&i| {
            let p = net.predict(&inputs[i]);
            let hit = usize::from(argmax(&p) == targets[i]);
            (cross_entropy(&p, targets[i]), hit)
        })
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
    let n = idx.len() as f32;
    (loss / n, correct as f32 / n)
}

/// A training run on its own thread.
pub struct TrainingJob {
    cancel: CancelToken,
    handle: JoinHandle<SfResult<TrainingOutcome>>,
}

impl TrainingJob {
    pub fn spawn(
        trainer: Trainer,
        name: String,
        samples: Vec<Sample>,
        observer: Arc<dyn TrainingObserver>,
    ) -> Self {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = std::thread::spawn(move || {
            trainer.train(&name, &samples, observer.as_ref(), &token)
        });
        Self { cancel, handle }
    }

    /// Honored at the next epoch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> SfResult<TrainingOutcome> {
        self.handle
            .join()
            .map_err(|_| SignForgeError::TrainingAborted("training thread panicked".into()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_name_uses_utc_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(default_model_name(t), "model_20240309_070501");
    }

    #[test]
    fn cancel_token_is_shared() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
