use crate::reports;
use clap::{Args, Subcommand};
use signforge::api;
use signforge::config::Config;
use signforge::consts::DEFAULT_FRAME_INTERVAL_MS;
use signforge::dataset::Recorder;
use signforge::error::{SfResult, SignForgeError};
use signforge::landmarks::load_recording;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub action: DatasetAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DatasetAction {
    /// Per-label counts and training readiness.
    Stats,
    /// Count and a random sample for one label.
    Show { label: String },
    /// Label every hand in a recording and append it.
    Record {
        #[arg(long)]
        label: String,
        #[arg(short, long)]
        frames: PathBuf,
        #[arg(long, default_value_t = 30)]
        batch_size: usize,
    },
    /// Remove one label, or everything with `--all`.
    Purge {
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

pub fn run(args: DatasetArgs, config: Config) -> SfResult<()> {
    let state = super::open_state(config)?;
    match args.action {
        DatasetAction::Stats => {
            let stats = state.dataset.stats()?;
            reports::print_dataset_stats(&stats, &api::dataset_readiness(&state)?);
        }
        DatasetAction::Show { label } => {
            let summary = state.dataset.list_by_label(&label)?;
            println!("📦 '{}': {} samples", summary.label, summary.count);
            if let Some(sample) = summary.representative {
                reports::print_hand(&sample.landmarks);
            }
        }
        DatasetAction::Record {
            label,
            frames,
            batch_size,
        } => {
            if !state.vocabulary.contains(&label) {
                return Err(SignForgeError::Validation(format!(
                    "'{}' is not in the vocabulary",
                    label
                )));
            }
            let frames = load_recording(&frames, DEFAULT_FRAME_INTERVAL_MS)?;
            let mut recorder = Recorder::new(label.clone(), batch_size);
            recorder.start();
            for (ts, frame) in &frames {
                match recorder.record(frame, state.dataset.as_ref()) {
                    Err(e @ SignForgeError::InvalidHandShape { .. }) => {
                        tracing::warn!("Skipping frame at {} ms: {}", ts, e)
                    }
                    other => {
                        other?;
                    }
                }
            }
            recorder.stop();
            let total = match recorder.flush(state.dataset.as_ref())? {
                Some(summary) => summary.total_count,
                None => state.dataset.stats()?.total_samples,
            };
            println!(
                "🎥 Recorded {} samples of '{}' (dataset now {})",
                recorder.recorded(),
                label,
                total
            );
        }
        DatasetAction::Purge { label, all } => match (label, all) {
            (_, true) => {
                state.dataset.purge_all()?;
                println!("🧹 Dataset cleared");
            }
            (Some(label), false) => {
                let removed = state.dataset.purge_label(&label)?;
                println!("🧹 Removed {} samples of '{}'", removed, label);
            }
            (None, false) => {
                return Err(SignForgeError::Config(
                    "purge needs --label or --all".to_string(),
                ))
            }
        },
    }
    Ok(())
}
