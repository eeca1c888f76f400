use crate::reports;
use clap::Args;
use signforge::api;
use signforge::config::Config;
use signforge::consts::DEFAULT_FRAME_INTERVAL_MS;
use signforge::error::SfResult;
use signforge::landmarks::load_recording;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CompeteArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(short, long)]
    pub frames: PathBuf,

    /// Comma-separated registry names; `rules` is the geometric classifier.
    #[arg(long, value_delimiter = ',', required = true)]
    pub models: Vec<String>,
}

pub fn run(args: CompeteArgs, config: Config) -> SfResult<()> {
    let state = super::open_state(config)?;
    let mut competition = api::competition(&state, &args.models)?;
    let frames = load_recording(&args.frames, DEFAULT_FRAME_INTERVAL_MS)?;

    println!("\n⚔️  {} competitors over {} frames", args.models.len(), frames.len());
    for (ts, frame) in &frames {
        let Some(hand) = frame.hands.first() else {
            continue;
        };
        let results = competition.round(hand);
        let cells: Vec<String> = results
            .iter()
            .map(|r| match &r.result {
                Ok(p) => format!("{}={}({:.2})", r.name, p.top_label, p.top_probability),
                Err(e) => format!("{}=error({})", r.name, e),
            })
            .collect();
        println!("  [{:>7} ms] {}", ts, cells.join("  "));
    }

    reports::print_standings(competition.standings());
    Ok(())
}
