use crate::classifier::{Classifier, StatisticalClassifier};
use crate::error::{SfResult, SignForgeError};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

pub const INDEX_FILE: &str = "models_metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    /// Final validation accuracy.
    pub accuracy: f32,
    pub sample_count: usize,
    pub gesture_count: usize,
    pub epochs: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub run: RunMetrics,
}

/// Measurements taken while training a model. Zero in artifacts that
/// predate them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMetrics {
    pub train_accuracy: f32,
    /// Wall time of the epoch loop.
    pub train_time_ms: u64,
    pub avg_epoch_ms: f32,
    /// Mean single-hand prediction time, measured after training.
    pub inference_ms: f32,
    pub parameters: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
}

/// The persisted artifact: weights, label order and summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub metadata: ModelMetadata,
    pub classifier: StatisticalClassifier,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelSort {
    Name,
    /// Validation accuracy.
    Accuracy,
    TrainAccuracy,
    TrainTime,
    InferenceTime,
    Parameters,
    #[default]
    Timestamp,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Raw storage. Conflict and existence rules live in [`ModelRegistry`].
pub trait ModelStore: Send + Sync {
    fn list(&self) -> SfResult<Vec<ModelMetadata>>;
    fn contains(&self, name: &str) -> SfResult<bool>;
    fn read(&self, name: &str) -> SfResult<TrainedModel>;
    fn write(&self, model: &TrainedModel) -> SfResult<()>;
    fn remove(&self, name: &str) -> SfResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryModelStore {
    models: Mutex<BTreeMap<String, TrainedModel>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> SfResult<std::sync::MutexGuard<'_, BTreeMap<String, TrainedModel>>> {
        self.models
            .lock()
            .map_err(|e| SignForgeError::Validation(format!("Model store poisoned: {}", e)))
    }
}

impl ModelStore for MemoryModelStore {
    fn list(&self) -> SfResult<Vec<ModelMetadata>> {
        Ok(self.guard()?.values().map(|m| m.metadata.clone()).collect())
    }

    fn contains(&self, name: &str) -> SfResult<bool> {
        Ok(self.guard()?.contains_key(name))
    }

    fn read(&self, name: &str) -> SfResult<TrainedModel> {
        self.guard()?
            .get(name)
            .cloned()
            .ok_or_else(|| SignForgeError::ModelNotFound(name.to_string()))
    }

    fn write(&self, model: &TrainedModel) -> SfResult<()> {
        self.guard()?
            .insert(model.metadata.name.clone(), model.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> SfResult<()> {
        self.guard()?.remove(name);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    models: Vec<ModelMetadata>,
}

/// Older indexes were a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIndex {
    Document(IndexDocument),
    List(Vec<ModelMetadata>),
}

/// One `<name>.json` per model plus a `models_metadata.json` index of the
/// form `{ "models": [...] }`.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    dir: PathBuf,
}

fn write_atomic(path: &Path, bytes: &[u8]) -> SfResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl FsModelStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> SfResult<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn read_index(&self) -> SfResult<Vec<ModelMetadata>> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let stored: StoredIndex =
            serde_json::from_str(&content).map_err(|e| SignForgeError::CorruptEntry {
                name: INDEX_FILE.to_string(),
                reason: e.to_string(),
            })?;
        Ok(match stored {
            StoredIndex::Document(doc) => doc.models,
            StoredIndex::List(models) => models,
        })
    }

    fn write_index(&self, index: Vec<ModelMetadata>) -> SfResult<()> {
        let doc = IndexDocument { models: index };
        write_atomic(&self.dir.join(INDEX_FILE), &serde_json::to_vec_pretty(&doc)?)
    }
}

impl ModelStore for FsModelStore {
    fn list(&self) -> SfResult<Vec<ModelMetadata>> {
        self.read_index()
    }

    fn contains(&self, name: &str) -> SfResult<bool> {
        Ok(self.read_index()?.iter().any(|m| m.name == name)
            || self.artifact_path(name).exists())
    }

    fn read(&self, name: &str) -> SfResult<TrainedModel> {
        let path = self.artifact_path(name);
        if !path.exists() {
            return Err(SignForgeError::ModelNotFound(name.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| SignForgeError::CorruptEntry {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn write(&self, model: &TrainedModel) -> SfResult<()> {
        let name = &model.metadata.name;
        write_atomic(&self.artifact_path(name), &serde_json::to_vec(model)?)?;

        let mut index = self.read_index()?;
        index.retain(|m| &m.name != name);
        index.push(model.metadata.clone());
        self.write_index(index)?;
        debug!("Wrote model artifact {:?}", self.artifact_path(name));
        Ok(())
    }

    fn remove(&self, name: &str) -> SfResult<()> {
        let mut index = self.read_index()?;
        index.retain(|m| m.name != name);
        self.write_index(index)?;

        let path = self.artifact_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> SfResult<()> {
    let stem = INDEX_FILE.trim_end_matches(".json");
    if name.trim().is_empty()
        || name != name.trim()
        || name == stem
        || name.starts_with('.')
        || name.contains(['/', '\\', ':'])
    {
        return Err(SignForgeError::Validation(format!(
            "Invalid model name '{}'",
            name
        )));
    }
    Ok(())
}

/// Restores shape invariants that a bare deserialize cannot check.
fn verify(model: TrainedModel) -> SfResult<TrainedModel> {
    let name = model.metadata.name.clone();
    let corrupt = |reason: String| SignForgeError::CorruptEntry {
        name: name.clone(),
        reason,
    };
    let classes = model.classifier.network().classes();
    let labels = model.classifier.vocabulary().len();
    if classes != labels {
        return Err(corrupt(format!(
            "network has {} outputs but {} labels are stored",
            classes, labels
        )));
    }
    model
        .classifier
        .network()
        .validate()
        .map_err(|e| corrupt(e.to_string()))?;
    Ok(model)
}

/// Named trained models. Mutations (save, rename, delete) are serialized.
pub struct ModelRegistry {
    store: Box<dyn ModelStore>,
    writes: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(store: Box<dyn ModelStore>) -> Self {
        Self {
            store,
            writes: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryModelStore::new()))
    }

    pub fn open_dir<P: AsRef<Path>>(dir: P) -> SfResult<Self> {
        Ok(Self::new(Box::new(FsModelStore::open(dir)?)))
    }

    fn lock_writes(&self) -> SfResult<std::sync::MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|e| SignForgeError::Validation(format!("Registry lock poisoned: {}", e)))
    }

    /// Fails with `RegistryConflict` if the name is taken.
    pub fn save(&self, model: &TrainedModel) -> SfResult<()> {
        let name = &model.metadata.name;
        validate_name(name)?;
        let _guard = self.lock_writes()?;
        if self.store.contains(name)? {
            return Err(SignForgeError::RegistryConflict(name.clone()));
        }
        self.store.write(model)?;
        info!("Saved model '{}' (accuracy {:.4})", name, model.metadata.accuracy);
        Ok(())
    }

    pub fn load(&self, name: &str) -> SfResult<TrainedModel> {
        verify(self.store.read(name)?)
    }

    pub fn exists(&self, name: &str) -> SfResult<bool> {
        self.store.contains(name)
    }

    pub fn list(&self, sort: ModelSort, order: SortOrder) -> SfResult<Vec<ModelMetadata>> {
        let mut models = self.store.list()?;
        models.sort_by(|a, b| match sort {
            ModelSort::Name => a.name.cmp(&b.name),
            ModelSort::Accuracy => a.accuracy.total_cmp(&b.accuracy),
            ModelSort::TrainAccuracy => a.run.train_accuracy.total_cmp(&b.run.train_accuracy),
            ModelSort::TrainTime => a.run.train_time_ms.cmp(&b.run.train_time_ms),
            ModelSort::InferenceTime => a.run.inference_ms.total_cmp(&b.run.inference_ms),
            ModelSort::Parameters => a.run.parameters.cmp(&b.run.parameters),
            ModelSort::Timestamp => a.timestamp.cmp(&b.timestamp),
        });
        if order == SortOrder::Desc {
            models.reverse();
        }
        Ok(models)
    }

    pub fn rename(&self, old: &str, new: &str) -> SfResult<()> {
        validate_name(new)?;
        let _guard = self.lock_writes()?;
        if !self.store.contains(old)? {
            return Err(SignForgeError::ModelNotFound(old.to_string()));
        }
        if self.store.contains(new)? {
            return Err(SignForgeError::RegistryConflict(new.to_string()));
        }

        let mut model = self.store.read(old)?;
        model.metadata.name = new.to_string();
        model.classifier = model.classifier.renamed(new);
        self.store.write(&model)?;
        self.store.remove(old)?;
        info!("Renamed model '{}' -> '{}'", old, new);
        Ok(())
    }

    pub fn delete(&self, name: &str) -> SfResult<()> {
        let _guard = self.lock_writes()?;
        if !self.store.contains(name)? {
            return Err(SignForgeError::ModelNotFound(name.to_string()));
        }
        self.store.remove(name)?;
        info!("Deleted model '{}'", name);
        Ok(())
    }

    /// Deletes every model. Returns how many were removed.
    pub fn clear(&self) -> SfResult<usize> {
        let _guard = self.lock_writes()?;
        let models = self.store.list()?;
        for m in &models {
            self.store.remove(&m.name)?;
        }
        info!("Cleared {} models", models.len());
        Ok(models.len())
    }
}
