mod common;

use signforge::api::{self, SignForgeState, RULES_MODEL};
use signforge::config::{Config, FallbackPolicy};
use signforge::error::SignForgeError;
use signforge::training::{CancelToken, ChannelObserver, NullObserver, TrainingEvent};
use std::sync::{mpsc, Arc};

fn config() -> Config {
    let mut c = Config::default();
    c.training.epochs = 3;
    c.training.batch_size = 4;
    c.training.seed = Some(17);
    c
}

fn state_with_data() -> SignForgeState {
    let state = SignForgeState::in_memory(config()).unwrap();
    state
        .dataset
        .append_samples(common::samples("멈춰", &common::stop(), 10, 1))
        .unwrap();
    state
        .dataset
        .append_samples(common::samples("주먹", &common::fist(), 10, 2))
        .unwrap();
    state
}

#[test]
fn rules_are_active_until_a_model_loads() {
    let state = state_with_data();
    let active = api::active_model(&state).unwrap();
    assert_eq!(active.name, RULES_MODEL);
    assert_eq!(active.kind, "rules");
    assert_eq!(active.label_count, 74);
}

#[test]
fn no_fallback_means_no_active_model() {
    let mut c = config();
    c.recognition.fallback = FallbackPolicy::None;
    let state = SignForgeState::in_memory(c).unwrap();
    assert!(matches!(
        api::active_model(&state),
        Err(SignForgeError::ModelNotLoaded)
    ));
}

#[test]
fn train_save_load_and_unload() {
    let state = state_with_data();
    let outcome = api::train_and_save(
        &state,
        Some("first".into()),
        &NullObserver,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(outcome.history.len(), 3);
    assert!(state.registry.exists("first").unwrap());

    let meta = api::load_model(&state, "first").unwrap();
    assert_eq!(meta.gesture_count, 2);
    let active = api::active_model(&state).unwrap();
    assert_eq!((active.name.as_str(), active.kind.as_str()), ("first", "statistical"));

    assert_eq!(api::unload_model(&state).as_deref(), Some("first"));
    assert_eq!(api::active_model(&state).unwrap().name, RULES_MODEL);
}

#[test]
fn conflicting_name_is_refused_before_training() {
    let state = state_with_data();
    state
        .registry
        .save(&common::untrained_model("taken", 0.5, 1))
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let observer = ChannelObserver::new(tx);
    let err = api::train_and_save(&state, Some("taken".into()), &observer, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, SignForgeError::RegistryConflict(_)));
    drop(observer);
    assert_eq!(rx.iter().count(), 0);
}

#[test]
fn cancelled_training_saves_nothing() {
    let state = state_with_data();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = api::train_and_save(&state, Some("never".into()), &NullObserver, &cancel)
        .unwrap_err();
    assert!(matches!(err, SignForgeError::TrainingAborted(_)));
    assert!(!state.registry.exists("never").unwrap());
}

#[test]
fn single_label_dataset_cannot_train() {
    let state = SignForgeState::in_memory(config()).unwrap();
    state
        .dataset
        .append_samples(common::samples("멈춰", &common::stop(), 30, 1))
        .unwrap();
    assert!(!api::dataset_readiness(&state).unwrap().can_train());
    assert!(matches!(
        api::train_and_save(&state, None, &NullObserver, &CancelToken::new()),
        Err(SignForgeError::InsufficientTrainingData { distinct_labels: 1 })
    ));
}

#[test]
fn background_training_activates_on_finish() {
    let state = state_with_data();
    let (tx, rx) = mpsc::channel();
    let name = api::start_training(&state, None, Arc::new(ChannelObserver::new(tx))).unwrap();
    assert!(name.starts_with("model_"));

    let meta = api::finish_training(&state, true).unwrap();
    assert_eq!(meta.name, name);
    assert_eq!(api::active_model(&state).unwrap().name, name);

    let events: Vec<TrainingEvent> = rx.iter().collect();
    assert_eq!(events.len(), 4);
    assert!(matches!(events.last(), Some(TrainingEvent::Completed { .. })));

    assert!(!api::cancel_training(&state).unwrap());
    assert!(matches!(
        api::finish_training(&state, false),
        Err(SignForgeError::Validation(_))
    ));
}

#[test]
fn one_background_run_at_a_time() {
    let mut c = config();
    c.training.epochs = 100_000;
    let state = SignForgeState::in_memory(c).unwrap();
    state
        .dataset
        .append_samples(common::samples("멈춰", &common::stop(), 4, 1))
        .unwrap();
    state
        .dataset
        .append_samples(common::samples("주먹", &common::fist(), 4, 2))
        .unwrap();

    api::start_training(&state, Some("long".into()), Arc::new(NullObserver)).unwrap();
    assert!(matches!(
        api::start_training(&state, Some("other".into()), Arc::new(NullObserver)),
        Err(SignForgeError::Validation(_))
    ));

    assert!(api::cancel_training(&state).unwrap());
    assert!(matches!(
        api::finish_training(&state, true),
        Err(SignForgeError::TrainingAborted(_))
    ));
    assert!(!state.registry.exists("long").unwrap());
}

#[test]
fn competition_mixes_rules_and_registry_models() {
    let state = state_with_data();
    state
        .registry
        .save(&common::untrained_model("rookie", 0.1, 3))
        .unwrap();

    let mut comp =
        api::competition(&state, &["rules".to_string(), "rookie".to_string()]).unwrap();
    let results = comp.round(&common::stop());
    assert_eq!(results.len(), 2);
    assert_eq!(comp.standings().get("rules").unwrap().rounds, 1);

    assert!(matches!(
        api::competition(&state, &["rules".to_string(), "ghost".to_string()]),
        Err(SignForgeError::ModelNotFound(_))
    ));
}

#[test]
fn sessions_share_the_active_model() {
    let state = state_with_data();
    let mut session = api::new_session(&state);
    let outcome = session.process_frame(&common::frame(common::stop()), std::time::Instant::now());
    assert!(matches!(
        outcome,
        signforge::session::FrameOutcome::Emitted { .. }
    ));
}
