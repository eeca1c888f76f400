use crate::aggregator::Predictor;
use crate::classifier::Classifier;
use crate::competition::{Competition, Competitor};
use crate::config::Config;
use crate::dataset::{DatasetStore, FileDatasetStore, MemoryDatasetStore};
use crate::error::{SfResult, SignForgeError};
use crate::registry::{ModelMetadata, ModelRegistry};
use crate::rules::RuleClassifier;
use crate::session::RecognitionSession;
use crate::training::{
    assess_dataset, default_model_name, CancelToken, DatasetReadiness, Trainer, TrainingJob,
    TrainingObserver, TrainingOutcome,
};
use crate::vocab::Vocabulary;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Name under which the geometric classifier can be referenced.
pub const RULES_MODEL: &str = "rules";

/// Everything a host needs to recognize, collect and train.
pub struct SignForgeState {
    pub config: Config,
    pub vocabulary: Vocabulary,
    pub predictor: Arc<Predictor>,
    pub registry: ModelRegistry,
    pub dataset: Box<dyn DatasetStore>,
    training: Mutex<Option<TrainingJob>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActiveModel {
    pub name: String,
    pub kind: String,
    pub label_count: usize,
}

impl SignForgeState {
    fn build(
        config: Config,
        registry: ModelRegistry,
        dataset: Box<dyn DatasetStore>,
    ) -> SfResult<Self> {
        let vocabulary = Vocabulary::reference();
        let rules = RuleClassifier::new(config.rules, vocabulary.clone())?;
        let predictor = Arc::new(Predictor::from_params(rules, &config.recognition));
        Ok(Self {
            config,
            vocabulary,
            predictor,
            registry,
            dataset,
            training: Mutex::new(None),
        })
    }

    /// Filesystem-backed registry and dataset at the configured paths.
    pub fn open(config: Config) -> SfResult<Self> {
        let registry = ModelRegistry::open_dir(&config.storage.model_dir)?;
        let dataset = Box::new(FileDatasetStore::new(&config.storage.dataset_file));
        Self::build(config, registry, dataset)
    }

    pub fn in_memory(config: Config) -> SfResult<Self> {
        Self::build(
            config,
            ModelRegistry::in_memory(),
            Box::new(MemoryDatasetStore::new()),
        )
    }

    pub fn trainer(&self) -> SfResult<Trainer> {
        Trainer::from_params(self.vocabulary.clone(), &self.config.training)
    }
}

/// Service: Load a registry model and make it the active classifier.
pub fn load_model(state: &SignForgeState, name: &str) -> SfResult<ModelMetadata> {
    let model = state.registry.load(name)?;
    state.predictor.activate(Arc::new(model.classifier));
    info!("Active model: {}", name);
    Ok(model.metadata)
}

/// Service: Drop the active model; predictions follow the fallback policy.
pub fn unload_model(state: &SignForgeState) -> Option<String> {
    state
        .predictor
        .deactivate()
        .map(|c| c.name().to_string())
}

pub fn active_model(state: &SignForgeState) -> SfResult<ActiveModel> {
    let c = state.predictor.current()?;
    Ok(ActiveModel {
        name: c.name().to_string(),
        kind: c.kind().to_string(),
        label_count: c.vocabulary().len(),
    })
}

pub fn dataset_readiness(state: &SignForgeState) -> SfResult<DatasetReadiness> {
    Ok(assess_dataset(&state.dataset.samples()?))
}

fn resolve_name(name: Option<String>) -> String {
    name.unwrap_or_else(|| default_model_name(Utc::now()))
}

fn check_readiness(readiness: &DatasetReadiness) -> SfResult<()> {
    if !readiness.can_train() {
        return Err(SignForgeError::InsufficientTrainingData {
            distinct_labels: readiness.label_count,
        });
    }
    for w in &readiness.warnings {
        warn!(
            "Dataset below recommendation ({}): {} samples, {} labels",
            w, readiness.sample_count, readiness.label_count
        );
    }
    Ok(())
}

/// Service: Train on the caller's thread and save the result.
/// Nothing is written to the registry unless training completes.
pub fn train_and_save(
    state: &SignForgeState,
    name: Option<String>,
    observer: &dyn TrainingObserver,
    cancel: &CancelToken,
) -> SfResult<TrainingOutcome> {
    let name = resolve_name(name);
    if state.registry.exists(&name)? {
        return Err(SignForgeError::RegistryConflict(name));
    }
    let samples = state.dataset.samples()?;
    check_readiness(&assess_dataset(&samples))?;

    let outcome = state.trainer()?.train(&name, &samples, observer, cancel)?;
    state.registry.save(&outcome.model)?;
    Ok(outcome)
}

fn lock_job(state: &SignForgeState) -> SfResult<std::sync::MutexGuard<'_, Option<TrainingJob>>> {
    state
        .training
        .lock()
        .map_err(|e| SignForgeError::Validation(format!("Training slot poisoned: {}", e)))
}

/// Service: Start training in the background. One run at a time.
pub fn start_training(
    state: &SignForgeState,
    name: Option<String>,
    observer: Arc<dyn TrainingObserver>,
) -> SfResult<String> {
    let mut slot = lock_job(state)?;
    if slot.as_ref().is_some_and(|j| !j.is_finished()) {
        return Err(SignForgeError::Validation(
            "A training run is already in progress".to_string(),
        ));
    }

    let name = resolve_name(name);
    if state.registry.exists(&name)? {
        return Err(SignForgeError::RegistryConflict(name));
    }
    let samples = state.dataset.samples()?;
    check_readiness(&assess_dataset(&samples))?;

    *slot = Some(TrainingJob::spawn(
        state.trainer()?,
        name.clone(),
        samples,
        observer,
    ));
    Ok(name)
}

/// Service: Request cancellation. Returns false if nothing is running.
pub fn cancel_training(state: &SignForgeState) -> SfResult<bool> {
    let slot = lock_job(state)?;
    match slot.as_ref() {
        Some(job) if !job.is_finished() => {
            job.cancel();
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Service: Wait for the background run, save it, and optionally swap it in.
pub fn finish_training(state: &SignForgeState, activate: bool) -> SfResult<ModelMetadata> {
    let job = lock_job(state)?
        .take()
        .ok_or_else(|| SignForgeError::Validation("No training run to finish".to_string()))?;
    let outcome = job.join()?;
    state.registry.save(&outcome.model)?;

    let metadata = outcome.model.metadata.clone();
    if activate {
        state.predictor.activate(Arc::new(outcome.model.classifier));
        info!("Active model: {}", metadata.name);
    }
    Ok(metadata)
}

pub fn new_session(state: &SignForgeState) -> RecognitionSession {
    RecognitionSession::from_params(state.predictor.clone(), &state.config.recognition)
}

/// Service: Build a competition from registry names; `rules` selects the
/// geometric classifier.
pub fn competition(state: &SignForgeState, names: &[String]) -> SfResult<Competition> {
    let competitors = names
        .iter()
        .map(|name| {
            let classifier: Arc<dyn Classifier> = if name == RULES_MODEL {
                Arc::new(state.predictor.rules().clone())
            } else {
                Arc::new(state.registry.load(name)?.classifier)
            };
            Ok(Competitor::new(name.clone(), classifier))
        })
        .collect::<SfResult<Vec<_>>>()?;
    Ok(Competition::new(competitors)?.with_top_k(state.config.recognition.top_k))
}
