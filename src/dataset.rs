use crate::error::{SfResult, SignForgeError};
use crate::landmarks::{normalize, LandmarkFrame, NormalizedHand};
use crate::vocab::Label;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// One labeled, normalized hand. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: Label,
    pub landmarks: NormalizedHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendSummary {
    pub added_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub label: Label,
    pub count: usize,
    /// A random stored sample, for previewing the gesture.
    pub representative: Option<Sample>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    /// Per-label counts in first-recorded order.
    pub labels: Vec<(Label, usize)>,
}

impl DatasetStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut labels: Vec<(Label, usize)> = Vec::new();
        for s in samples {
            match labels.iter_mut().find(|(l, _)| *l == s.label) {
                Some((_, c)) => *c += 1,
                None => labels.push((s.label.clone(), 1)),
            }
        }
        Self {
            total_samples: samples.len(),
            labels,
        }
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

/// Persistence for labeled samples.
pub trait DatasetStore: Send + Sync {
    fn append_samples(&self, batch: Vec<Sample>) -> SfResult<AppendSummary>;
    fn list_by_label(&self, label: &str) -> SfResult<LabelSummary>;
    fn purge_label(&self, label: &str) -> SfResult<usize>;
    fn purge_all(&self) -> SfResult<()>;
    fn samples(&self) -> SfResult<Vec<Sample>>;

    fn stats(&self) -> SfResult<DatasetStats> {
        Ok(DatasetStats::from_samples(&self.samples()?))
    }
}

fn summarize(samples: &[Sample], label: &str) -> LabelSummary {
    let matching: Vec<&Sample> = samples.iter().filter(|s| s.label == label).collect();
    let representative = if matching.is_empty() {
        None
    } else {
        Some(matching[fastrand::usize(..matching.len())].clone())
    };
    LabelSummary {
        label: label.to_string(),
        count: matching.len(),
        representative,
    }
}

fn purge(samples: &mut Vec<Sample>, label: &str) -> usize {
    let before = samples.len();
    samples.retain(|s| s.label != label);
    before - samples.len()
}

#[derive(Debug, Default)]
pub struct MemoryDatasetStore {
    samples: Mutex<Vec<Sample>>,
}

impl MemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> SfResult<std::sync::MutexGuard<'_, Vec<Sample>>> {
        self.samples
            .lock()
            .map_err(|e| SignForgeError::Validation(format!("Dataset lock poisoned: {}", e)))
    }
}

impl DatasetStore for MemoryDatasetStore {
    fn append_samples(&self, batch: Vec<Sample>) -> SfResult<AppendSummary> {
        let mut samples = self.guard()?;
        let added_count = batch.len();
        samples.extend(batch);
        Ok(AppendSummary {
            added_count,
            total_count: samples.len(),
        })
    }

    fn list_by_label(&self, label: &str) -> SfResult<LabelSummary> {
        Ok(summarize(&self.guard()?, label))
    }

    fn purge_label(&self, label: &str) -> SfResult<usize> {
        Ok(purge(&mut *self.guard()?, label))
    }

    fn purge_all(&self) -> SfResult<()> {
        self.guard()?.clear();
        Ok(())
    }

    fn samples(&self) -> SfResult<Vec<Sample>> {
        Ok(self.guard()?.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatasetDocument {
    #[serde(default)]
    dataset: Vec<Sample>,
}

/// A single JSON document `{ "dataset": [...] }`, rewritten atomically.
#[derive(Debug)]
pub struct FileDatasetStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileDatasetStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SfResult<Vec<Sample>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let doc: DatasetDocument = serde_json::from_str(&content)?;
        Ok(doc.dataset)
    }

    fn store(&self, samples: Vec<Sample>) -> SfResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let doc = DatasetDocument { dataset: samples };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&doc)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Runs `f` over the stored samples while holding the file lock.
    fn with_samples<T>(&self, f: impl FnOnce(&mut Vec<Sample>) -> T, write: bool) -> SfResult<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| SignForgeError::Validation(format!("Dataset lock poisoned: {}", e)))?;
        let mut samples = self.load()?;
        let out = f(&mut samples);
        if write {
            self.store(samples)?;
        }
        Ok(out)
    }
}

impl DatasetStore for FileDatasetStore {
    fn append_samples(&self, batch: Vec<Sample>) -> SfResult<AppendSummary> {
        let added_count = batch.len();
        let total_count = self.with_samples(
            |s| {
                s.extend(batch);
                s.len()
            },
            true,
        )?;
        debug!("Appended {} samples to {:?}", added_count, self.path);
        Ok(AppendSummary {
            added_count,
            total_count,
        })
    }

    fn list_by_label(&self, label: &str) -> SfResult<LabelSummary> {
        self.with_samples(|s| summarize(s, label), false)
    }

    fn purge_label(&self, label: &str) -> SfResult<usize> {
        let removed = self.with_samples(|s| purge(s, label), true)?;
        info!("Removed {} samples of '{}'", removed, label);
        Ok(removed)
    }

    fn purge_all(&self) -> SfResult<()> {
        self.with_samples(|s| s.clear(), true)?;
        info!("Dataset reset: {:?}", self.path);
        Ok(())
    }

    fn samples(&self) -> SfResult<Vec<Sample>> {
        self.with_samples(|s| std::mem::take(s), false)
    }
}

/// Collects samples for one label while recording is active and flushes
/// them to a store in batches.
#[derive(Debug)]
pub struct Recorder {
    label: Label,
    batch_size: usize,
    recording: bool,
    pending: Vec<Sample>,
    recorded: usize,
}

impl Recorder {
    pub fn new(label: impl Into<Label>, batch_size: usize) -> Self {
        Self {
            label: label.into(),
            batch_size: batch_size.max(1),
            recording: false,
            pending: Vec::new(),
            recorded: 0,
        }
    }

    pub fn start(&mut self) {
        self.recording = true;
    }

    pub fn stop(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Records the first hand of the frame. Returns whether a sample was taken.
    /// A full batch is written through to `store`.
    pub fn record(&mut self, frame: &LandmarkFrame, store: &dyn DatasetStore) -> SfResult<bool> {
        if !self.recording {
            return Ok(false);
        }
        let Some(hand) = frame.hands.first() else {
            return Ok(false);
        };
        let landmarks = normalize(hand)?;
        self.pending.push(Sample {
            label: self.label.clone(),
            landmarks,
        });
        self.recorded += 1;

        if self.pending.len() >= self.batch_size {
            self.flush(store)?;
        }
        Ok(true)
    }

    /// Writes pending samples. `None` if there was nothing to write; the
    /// store is not touched in that case.
    pub fn flush(&mut self, store: &dyn DatasetStore) -> SfResult<Option<AppendSummary>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let batch = std::mem::take(&mut self.pending);
        store.append_samples(batch).map(Some)
    }
}
