use crate::reports;
use clap::Args;
use signforge::api;
use signforge::config::Config;
use signforge::error::SfResult;
use signforge::landmarks::load_recording;
use signforge::session::FrameOutcome;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Args, Debug, Clone)]
pub struct ConverseArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(short, long)]
    pub frames: PathBuf,

    #[arg(short, long)]
    pub model: Option<String>,

    /// Spacing for frames without a timestamp.
    #[arg(long, default_value_t = signforge::consts::DEFAULT_FRAME_INTERVAL_MS)]
    pub interval_ms: u64,
}

pub fn run(args: ConverseArgs, config: Config) -> SfResult<()> {
    let state = super::open_state(config)?;
    super::activate(&state, &args.model)?;

    let frames = load_recording(&args.frames, args.interval_ms)?;
    let mut session = api::new_session(&state);
    let start = Instant::now();

    println!("\n🎬 Replaying {} frames", frames.len());
    for (ts, frame) in &frames {
        let now = start + Duration::from_millis(*ts);
        match session.process_frame(frame, now) {
            FrameOutcome::Emitted {
                token, sentence, ..
            } => {
                println!(
                    "  [{:>7} ms] + {} ({:.1}%)",
                    ts,
                    token.word,
                    token.confidence * 100.0
                );
                if let Some(s) = sentence {
                    println!("  💬 {}", s);
                }
            }
            FrameOutcome::Rejected(e) => tracing::debug!("[{} ms] {}", ts, e),
            _ => {}
        }
    }

    // Whatever is left in the buffer ends the conversation.
    if let Some(s) = session.compose() {
        println!("  💬 {}", s);
    }

    reports::print_conversation(session.history(), &session.stats());
    Ok(())
}
