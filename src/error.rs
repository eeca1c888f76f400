use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    /// Wrong landmark count. The caller skips the frame.
    #[error("Invalid hand shape: expected {expected} landmarks, found {found}")]
    InvalidHandShape { expected: usize, found: usize },

    #[error("No classifier is active")]
    ModelNotLoaded,

    #[error("Insufficient training data: {distinct_labels} distinct label(s), at least 2 required")]
    InsufficientTrainingData { distinct_labels: usize },

    #[error("Training aborted: {0}")]
    TrainingAborted(String),

    #[error("Registry conflict: model '{0}' already exists")]
    RegistryConflict(String),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    #[error("Corrupt registry entry '{name}': {reason}")]
    CorruptEntry { name: String, reason: String },

    #[error("Label order mismatch: classifier has {found} outputs, vocabulary has {expected}")]
    LabelMismatch { expected: usize, found: usize },
}

pub type SfResult<T> = Result<T, SignForgeError>;
