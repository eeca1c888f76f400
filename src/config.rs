use crate::consts::{
    DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_DEBOUNCE_MS, DEFAULT_FINGERS_PRESSED,
    DEFAULT_FINGER_EXTENDED, DEFAULT_OK_PINCH, DEFAULT_THUMB_EXTENDED, DEFAULT_TOP_K,
};
use crate::error::{SfResult, SignForgeError};
use clap::{parser::ValueSource, ArgMatches, Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub recognition: RecognitionParams,
    #[command(flatten)]
    pub rules: RuleThresholds,
    #[command(flatten)]
    pub training: TrainingParams,
    #[command(flatten)]
    pub storage: StorageParams,
}

/// What the aggregator does when no statistical model is loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Use the geometric rule classifier.
    Rules,
    /// Surface `ModelNotLoaded`.
    None,
}

/// When a conversation session composes a sentence on its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SentenceTrigger {
    Manual,
    /// After an action word is emitted into a buffer holding two or more tokens.
    OnAction,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionParams {
    #[arg(long, default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD)]
    pub acceptance_threshold: f32,
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,
    #[arg(long, value_enum, default_value_t = FallbackPolicy::Rules)]
    pub fallback: FallbackPolicy,
    #[arg(long, value_enum, default_value_t = SentenceTrigger::Manual)]
    pub sentence_trigger: SentenceTrigger,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            top_k: DEFAULT_TOP_K,
            fallback: FallbackPolicy::Rules,
            sentence_trigger: SentenceTrigger::Manual,
        }
    }
}

/// Distances in detector-normalized units. These were tuned by hand against
/// one camera setup and are the first thing to recalibrate.
#[derive(Args, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    #[arg(long, default_value_t = DEFAULT_FINGER_EXTENDED)]
    pub finger_extended: f32,
    #[arg(long, default_value_t = DEFAULT_THUMB_EXTENDED)]
    pub thumb_extended: f32,
    #[arg(long, default_value_t = DEFAULT_FINGERS_PRESSED)]
    pub fingers_pressed: f32,
    #[arg(long, default_value_t = DEFAULT_OK_PINCH)]
    pub ok_pinch: f32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            finger_extended: DEFAULT_FINGER_EXTENDED,
            thumb_extended: DEFAULT_THUMB_EXTENDED,
            fingers_pressed: DEFAULT_FINGERS_PRESSED,
            ok_pinch: DEFAULT_OK_PINCH,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrainingPreset {
    Fast,
    Balanced,
    Accurate,
    Professional,
    Custom,
}

/// Epochs, batch size, learning rate and validation split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub validation_split: f32,
}

impl TrainingPreset {
    /// `None` for `Custom`, whose values come from the explicit arguments.
    pub fn hyperparameters(&self) -> Option<Hyperparameters> {
        let (epochs, batch_size, learning_rate, validation_split) = match self {
            Self::Fast => (20, 64, 0.003, 0.15),
            Self::Balanced => (50, 32, 0.001, 0.2),
            Self::Accurate => (100, 16, 0.0005, 0.25),
            Self::Professional => (150, 8, 0.0003, 0.25),
            Self::Custom => return None,
        };
        Some(Hyperparameters {
            epochs,
            batch_size,
            learning_rate,
            validation_split,
        })
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    #[arg(long, value_enum, default_value_t = TrainingPreset::Custom)]
    pub preset: TrainingPreset,
    #[arg(long, default_value_t = 50)]
    pub epochs: usize,
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f32,
    #[arg(long, default_value_t = 0.2)]
    pub validation_split: f32,
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            preset: TrainingPreset::Custom,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            validation_split: 0.2,
            seed: None,
        }
    }
}

impl TrainingParams {
    /// Preset values win over the explicit fields unless the preset is `Custom`.
    pub fn resolve(&self) -> SfResult<Hyperparameters> {
        let hp = self.preset.hyperparameters().unwrap_or(Hyperparameters {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            validation_split: self.validation_split,
        });

        if hp.epochs == 0 {
            return Err(SignForgeError::Config("epochs must be at least 1".into()));
        }
        if hp.batch_size == 0 {
            return Err(SignForgeError::Config("batch_size must be at least 1".into()));
        }
        if !(hp.learning_rate > 0.0 && hp.learning_rate.is_finite()) {
            return Err(SignForgeError::Config(
                "learning_rate must be a positive number".into(),
            ));
        }
        if !(0.0..1.0).contains(&hp.validation_split) {
            return Err(SignForgeError::Config(
                "validation_split must be in [0, 1)".into(),
            ));
        }
        Ok(hp)
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageParams {
    #[arg(long, default_value = "data/models")]
    pub model_dir: PathBuf,
    #[arg(long, default_value = "data/collected_data.json")]
    pub dataset_file: PathBuf,
}

impl Default for StorageParams {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("data/models"),
            dataset_file: PathBuf::from("data/collected_data.json"),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SfResult<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            SignForgeError::Config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let cfg = serde_json::from_str(&content)?;
        Ok(cfg)
    }

    /// Overlays only the arguments the user actually typed.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($section:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$section.$field = cli.$section.$field.clone();
                }
            };
        }

        update_if_present!(recognition.acceptance_threshold);
        update_if_present!(recognition.debounce_ms);
        update_if_present!(recognition.top_k);
        update_if_present!(recognition.fallback);
        update_if_present!(recognition.sentence_trigger);

        update_if_present!(rules.finger_extended);
        update_if_present!(rules.thumb_extended);
        update_if_present!(rules.fingers_pressed);
        update_if_present!(rules.ok_pinch);

        update_if_present!(training.preset);
        update_if_present!(training.epochs);
        update_if_present!(training.batch_size);
        update_if_present!(training.learning_rate);
        update_if_present!(training.validation_split);
        update_if_present!(training.seed);

        update_if_present!(storage.model_dir);
        update_if_present!(storage.dataset_file);
    }
}
