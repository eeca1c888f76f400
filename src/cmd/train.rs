use crate::reports;
use clap::Args;
use signforge::api;
use signforge::config::Config;
use signforge::error::SfResult;
use signforge::training::{CancelToken, MetricsCsvObserver, TrainingEvent, TrainingObserver};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub config: Config,

    /// Registry name; defaults to `model_YYYYMMDD_HHMMSS`.
    #[arg(long)]
    pub name: Option<String>,

    /// Also write the per-epoch metrics to this CSV file.
    #[arg(long)]
    pub metrics_csv: Option<PathBuf>,
}

pub fn run(args: TrainArgs, config: Config) -> SfResult<()> {
    let state = super::open_state(config)?;

    let stats = state.dataset.stats()?;
    let readiness = api::dataset_readiness(&state)?;
    reports::print_dataset_stats(&stats, &readiness);

    let hp = *state.trainer()?.hyperparameters();
    println!(
        "\n🏋️  Training: {} epochs, batch {}, lr {}, validation {:.0}%",
        hp.epochs,
        hp.batch_size,
        hp.learning_rate,
        hp.validation_split * 100.0
    );

    let csv = match &args.metrics_csv {
        Some(path) => Some(MetricsCsvObserver::create(path)?),
        None => None,
    };
    let total = hp.epochs;
    let observer = move |event: &TrainingEvent| {
        if let Some(csv) = &csv {
            csv.on_event(event);
        }
        if let TrainingEvent::Epoch(m) = event {
            println!(
                "   Epoch {:>4}/{} | loss {:.4} acc {:.3} | val_loss {:.4} val_acc {:.3}",
                m.epoch + 1,
                total,
                m.train_loss,
                m.train_accuracy,
                m.validation_loss,
                m.validation_accuracy
            );
        }
        true
    };

    let outcome = api::train_and_save(&state, args.name, &observer, &CancelToken::new())?;

    reports::print_training_history(&outcome.history);
    println!(
        "\n✅ Saved '{}': accuracy {:.1}% over {} samples in {:.1}s",
        outcome.model.metadata.name,
        outcome.final_accuracy() * 100.0,
        outcome.model.metadata.sample_count,
        outcome.elapsed_ms as f64 / 1000.0
    );
    let run = &outcome.model.metadata.run;
    println!(
        "   {:.1} ms/epoch, {:.3} ms/prediction, {} parameters",
        run.avg_epoch_ms, run.inference_ms, run.parameters
    );
    Ok(())
}
