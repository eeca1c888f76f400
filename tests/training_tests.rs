mod common;

use common::{hand, Pose, Thumb};
use signforge::config::{Hyperparameters, TrainingParams, TrainingPreset};
use signforge::dataset::Sample;
use signforge::error::SignForgeError;
use signforge::network::Network;
use signforge::training::{
    assess_dataset, inference_latency_ms, CancelToken, ChannelObserver, DatasetWarning, MetricsCsvObserver,
    NullObserver, Trainer, TrainingEvent, TrainingJob, TrainingObserver,
};
use signforge::vocab::Vocabulary;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

fn hp(epochs: usize) -> Hyperparameters {
    Hyperparameters {
        epochs,
        batch_size: 4,
        learning_rate: 0.003,
        validation_split: 0.2,
    }
}

fn three_gestures(per_label: usize) -> Vec<Sample> {
    let mut out = common::samples("멈춰", &common::stop(), per_label, 1);
    out.extend(common::samples("주먹", &common::fist(), per_label, 2));
    out.extend(common::samples(
        "평화",
        &hand(&Pose::new(Thumb::Curled, [true, true, false, false])),
        per_label,
        3,
    ));
    out
}

#[derive(Default)]
struct Recorder(Mutex<Vec<TrainingEvent>>);

impl TrainingObserver for Recorder {
    fn on_event(&self, event: &TrainingEvent) -> bool {
        self.0.lock().unwrap().push(event.clone());
        true
    }
}

impl Recorder {
    fn events(&self) -> Vec<TrainingEvent> {
        self.0.lock().unwrap().clone()
    }
}

#[test]
fn single_label_fails_before_any_epoch() {
    let trainer = Trainer::new(Vocabulary::reference(), hp(5), Some(1));
    let samples = common::samples("멈춰", &common::stop(), 20, 1);
    let rec = Recorder::default();

    let err = trainer
        .train("m", &samples, &rec, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        SignForgeError::InsufficientTrainingData { distinct_labels: 1 }
    ));

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], TrainingEvent::Failed { .. }));
}

#[test]
fn labels_outside_vocabulary_do_not_count() {
    let trainer = Trainer::new(Vocabulary::reference(), hp(1), Some(1));
    let mut samples = common::samples("멈춰", &common::stop(), 5, 1);
    samples.extend(common::samples("unknown-sign", &common::fist(), 5, 2));
    assert!(matches!(
        trainer.train("m", &samples, &NullObserver, &CancelToken::new()),
        Err(SignForgeError::InsufficientTrainingData { distinct_labels: 1 })
    ));
}

#[test]
fn emits_one_event_per_epoch_then_completion() {
    let trainer = Trainer::new(Vocabulary::reference(), hp(3), Some(7));
    let rec = Recorder::default();
    let outcome = trainer
        .train("m", &three_gestures(6), &rec, &CancelToken::new())
        .unwrap();

    let events = rec.events();
    assert_eq!(events.len(), 4);
    for (i, e) in events[..3].iter().enumerate() {
        match e {
            TrainingEvent::Epoch(m) => assert_eq!(m.epoch, i),
            other => panic!("unexpected {:?}", other),
        }
    }
    match &events[3] {
        TrainingEvent::Completed { final_accuracy, .. } => {
            assert_eq!(*final_accuracy, outcome.final_accuracy())
        }
        other => panic!("unexpected {:?}", other),
    }

    let meta = &outcome.model.metadata;
    assert_eq!(meta.name, "m");
    assert_eq!(meta.sample_count, 18);
    assert_eq!(meta.gesture_count, 3);
    assert_eq!(meta.epochs, 3);
    assert_eq!(outcome.history.len(), 3);

    let run = &meta.run;
    assert_eq!(run.train_accuracy, outcome.history[2].train_accuracy);
    assert_eq!(run.train_time_ms, outcome.elapsed_ms);
    assert!(run.avg_epoch_ms * 3.0 <= run.train_time_ms as f32 + 1.0);
    assert!(run.inference_ms.is_finite() && run.inference_ms >= 0.0);
    assert_eq!(run.parameters, outcome.model.classifier.network().parameter_count());
    assert_eq!((run.batch_size, run.learning_rate), (4, 0.003));
}

#[test]
fn latency_of_an_empty_pool_is_zero() {
    let mut rng = fastrand::Rng::with_seed(3);
    let net = Network::new(4, &mut rng);
    assert_eq!(inference_latency_ms(&net, &[], 100, &mut rng), 0.0);
    assert_eq!(inference_latency_ms(&net, &[[0.1; 63]], 0, &mut rng), 0.0);
    assert!(inference_latency_ms(&net, &[[0.1; 63]], 5, &mut rng) >= 0.0);
}

#[test]
fn learns_separable_gestures() {
    let trainer = Trainer::new(Vocabulary::reference(), hp(30), Some(42));
    let outcome = trainer
        .train("m", &three_gestures(20), &NullObserver, &CancelToken::new())
        .unwrap();

    let first = outcome.history.first().unwrap();
    let last = outcome.history.last().unwrap();
    assert!(last.train_loss < first.train_loss);
    assert!(
        last.validation_accuracy >= 0.75,
        "validation accuracy {}",
        last.validation_accuracy
    );
}

#[test]
fn same_seed_same_training_curve() {
    let samples = three_gestures(5);
    let run = || {
        Trainer::new(Vocabulary::reference(), hp(3), Some(99))
            .train("m", &samples, &NullObserver, &CancelToken::new())
            .unwrap()
    };
    let (a, b) = (run(), run());
    let losses = |o: &signforge::training::TrainingOutcome| -> Vec<f32> {
        o.history.iter().map(|m| m.train_loss).collect()
    };
    assert_eq!(losses(&a), losses(&b));
}

#[test]
fn pre_cancelled_run_never_starts_an_epoch() {
    let trainer = Trainer::new(Vocabulary::reference(), hp(5), Some(1));
    let cancel = CancelToken::new();
    cancel.cancel();
    let rec = Recorder::default();

    let err = trainer
        .train("m", &three_gestures(4), &rec, &cancel)
        .unwrap_err();
    assert!(matches!(err, SignForgeError::TrainingAborted(_)));
    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], TrainingEvent::Failed { .. }));
}

#[test]
fn observer_can_stop_training() {
    let trainer = Trainer::new(Vocabulary::reference(), hp(10), Some(1));
    let epochs = AtomicUsize::new(0);
    let observer = |e: &TrainingEvent| {
        if matches!(e, TrainingEvent::Epoch(_)) {
            epochs.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    };

    let err = trainer
        .train("m", &three_gestures(4), &observer, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, SignForgeError::TrainingAborted(_)));
    assert_eq!(epochs.load(Ordering::SeqCst), 1);
}

#[test]
fn background_job_streams_events_and_can_be_cancelled() {
    let (tx, rx) = mpsc::channel();
    let trainer = Trainer::new(Vocabulary::reference(), hp(10_000), Some(3));
    let job = TrainingJob::spawn(
        trainer,
        "bg".to_string(),
        three_gestures(4),
        Arc::new(ChannelObserver::new(tx)),
    );

    // Wait for the first epoch, then cancel.
    match rx.recv().unwrap() {
        TrainingEvent::Epoch(m) => assert_eq!(m.epoch, 0),
        other => panic!("unexpected {:?}", other),
    }
    job.cancel();

    assert!(matches!(
        job.join(),
        Err(SignForgeError::TrainingAborted(_))
    ));
    let rest: Vec<TrainingEvent> = rx.iter().collect();
    assert!(matches!(rest.last(), Some(TrainingEvent::Failed { .. })));
    assert!(rest.len() < 10_000);
}

#[test]
fn metrics_csv_has_one_row_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.csv");
    let csv = MetricsCsvObserver::create(&path).unwrap();

    Trainer::new(Vocabulary::reference(), hp(2), Some(5))
        .train("m", &three_gestures(4), &csv, &CancelToken::new())
        .unwrap();
    drop(csv);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4); // header + 2 epochs + completion
    assert!(lines[0].starts_with("event,epoch,train_accuracy"));
    assert!(lines[1].starts_with("epoch,0,"));
    assert!(lines[3].starts_with("completed,"));
}

#[test]
fn readiness_warnings_are_soft() {
    let r = assess_dataset(&three_gestures(5));
    assert_eq!(r.sample_count, 15);
    assert_eq!(r.label_count, 3);
    assert!(r.can_train());
    assert_eq!(
        r.warnings,
        vec![DatasetWarning::FewSamples, DatasetWarning::FewLabels]
    );

    let one = assess_dataset(&common::samples("멈춰", &common::stop(), 200, 1));
    assert!(!one.can_train());
    assert_eq!(one.warnings, vec![DatasetWarning::FewLabels]);
}

#[test]
fn presets_override_explicit_values() {
    let params = TrainingParams {
        preset: TrainingPreset::Accurate,
        epochs: 3,
        ..TrainingParams::default()
    };
    let hp = params.resolve().unwrap();
    assert_eq!(hp.epochs, 100);
    assert_eq!(hp.batch_size, 16);
    assert_eq!(hp.learning_rate, 0.0005);
    assert_eq!(hp.validation_split, 0.25);

    let custom = TrainingParams {
        epochs: 3,
        ..TrainingParams::default()
    };
    assert_eq!(custom.resolve().unwrap().epochs, 3);
}
