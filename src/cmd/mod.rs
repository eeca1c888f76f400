use signforge::api::{self, SignForgeState};
use signforge::config::Config;
use signforge::error::SfResult;

pub mod classify;
pub mod compete;
pub mod converse;
pub mod dataset;
pub mod models;
pub mod sentence;
pub mod train;

pub fn open_state(config: Config) -> SfResult<SignForgeState> {
    SignForgeState::open(config)
}

/// Loads `model` if given; otherwise the fallback policy decides.
pub fn activate(state: &SignForgeState, model: &Option<String>) -> SfResult<()> {
    if let Some(name) = model {
        let meta = api::load_model(state, name)?;
        println!(
            "🧠 Model '{}' ({} gestures, accuracy {:.1}%)",
            meta.name,
            meta.gesture_count,
            meta.accuracy * 100.0
        );
    } else {
        let active = api::active_model(state)?;
        println!("📐 Using the {} classifier", active.name);
    }
    Ok(())
}
