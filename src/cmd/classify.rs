use crate::reports::{self, FrameLine};
use clap::Args;
use signforge::aggregator::AcceptancePolicy;
use signforge::config::Config;
use signforge::consts::DEFAULT_FRAME_INTERVAL_MS;
use signforge::error::SfResult;
use signforge::landmarks::load_recording;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub config: Config,

    /// Recording: a JSON array of `{ "timestamp_ms"?, "hands": [[{x,y,z}; 21]] }`.
    #[arg(short, long)]
    pub frames: PathBuf,

    /// Registry model to use instead of the fallback.
    #[arg(short, long)]
    pub model: Option<String>,
}

pub fn run(args: ClassifyArgs, config: Config) -> SfResult<()> {
    let state = super::open_state(config)?;
    super::activate(&state, &args.model)?;

    let frames = load_recording(&args.frames, DEFAULT_FRAME_INTERVAL_MS)?;
    let policy = AcceptancePolicy::new(state.config.recognition.acceptance_threshold);

    let rows: Vec<(u64, FrameLine)> = frames
        .iter()
        .map(|(ts, frame)| {
            let line = match frame.hands.first() {
                None => FrameLine::NoHand,
                Some(hand) => match state.predictor.predict(hand) {
                    Ok(result) => FrameLine::Predicted {
                        accepted: policy.accepts(result.top_probability),
                        result,
                    },
                    Err(e) => FrameLine::Failed(e.to_string()),
                },
            };
            (*ts, line)
        })
        .collect();

    reports::print_classifications(&rows);
    Ok(())
}
