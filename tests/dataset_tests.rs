mod common;

use signforge::dataset::{DatasetStore, FileDatasetStore, MemoryDatasetStore, Recorder};
use signforge::error::SignForgeError;
use signforge::landmarks::{load_recording, LandmarkFrame};

#[test]
fn file_store_round_trips_under_dataset_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("collected.json");
    let store = FileDatasetStore::new(&path);

    let first = store
        .append_samples(common::samples("멈춰", &common::stop(), 3, 1))
        .unwrap();
    assert_eq!((first.added_count, first.total_count), (3, 3));
    let second = store
        .append_samples(common::samples("주먹", &common::fist(), 2, 2))
        .unwrap();
    assert_eq!((second.added_count, second.total_count), (2, 5));

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entries = doc["dataset"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0]["label"], "멈춰");
    assert_eq!(entries[0]["landmarks"].as_array().unwrap().len(), 21);

    // A fresh handle reads back the same samples.
    let reopened = FileDatasetStore::new(&path);
    assert_eq!(reopened.samples().unwrap(), store.samples().unwrap());
}

#[test]
fn missing_file_is_an_empty_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileDatasetStore::new(dir.path().join("none.json"));
    assert!(store.samples().unwrap().is_empty());
    assert_eq!(store.stats().unwrap().total_samples, 0);
    assert_eq!(store.list_by_label("멈춰").unwrap().count, 0);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "[1, 2").unwrap();
    assert!(matches!(
        FileDatasetStore::new(&path).samples(),
        Err(SignForgeError::Json(_))
    ));
}

fn exercise_purge(store: &dyn DatasetStore) {
    store
        .append_samples(common::samples("멈춰", &common::stop(), 4, 1))
        .unwrap();
    store
        .append_samples(common::samples("주먹", &common::fist(), 2, 2))
        .unwrap();

    let summary = store.list_by_label("멈춰").unwrap();
    assert_eq!(summary.count, 4);
    assert_eq!(summary.representative.unwrap().label, "멈춰");

    assert_eq!(store.purge_label("멈춰").unwrap(), 4);
    assert_eq!(store.purge_label("멈춰").unwrap(), 0);
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_samples, 2);
    assert_eq!(stats.labels, vec![("주먹".to_string(), 2)]);

    store.purge_all().unwrap();
    assert!(store.samples().unwrap().is_empty());
}

#[test]
fn purge_in_memory() {
    exercise_purge(&MemoryDatasetStore::new());
}

#[test]
fn purge_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    exercise_purge(&FileDatasetStore::new(dir.path().join("d.json")));
}

#[test]
fn stats_keep_first_recorded_order() {
    let store = MemoryDatasetStore::new();
    store
        .append_samples(common::samples("하나", &common::stop(), 1, 1))
        .unwrap();
    store
        .append_samples(common::samples("둘", &common::stop(), 2, 1))
        .unwrap();
    store
        .append_samples(common::samples("하나", &common::stop(), 1, 1))
        .unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(
        stats.labels,
        vec![("하나".to_string(), 2), ("둘".to_string(), 2)]
    );
    assert_eq!(stats.label_count(), 2);
}

#[test]
fn recorder_only_records_while_active() {
    let store = MemoryDatasetStore::new();
    let mut rec = Recorder::new("멈춰", 3);
    let frame = common::frame(common::stop());

    assert!(!rec.record(&frame, &store).unwrap());
    rec.start();
    assert!(!rec.record(&LandmarkFrame::default(), &store).unwrap());
    assert!(rec.record(&frame, &store).unwrap());
    assert!(rec.record(&frame, &store).unwrap());
    assert_eq!(rec.pending(), 2);
    assert!(store.samples().unwrap().is_empty());

    // The third sample completes a batch and is written through.
    assert!(rec.record(&frame, &store).unwrap());
    assert_eq!(rec.pending(), 0);
    assert_eq!(store.samples().unwrap().len(), 3);

    assert!(rec.record(&frame, &store).unwrap());
    rec.stop();
    assert!(!rec.record(&frame, &store).unwrap());
    let summary = rec.flush(&store).unwrap().unwrap();
    assert_eq!((summary.added_count, summary.total_count), (1, 4));
    assert_eq!(rec.recorded(), 4);
}

#[test]
fn empty_flush_leaves_the_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.json");
    let store = FileDatasetStore::new(&path);
    let mut rec = Recorder::new("멈춰", 2);

    assert_eq!(rec.flush(&store).unwrap(), None);
    assert!(!path.exists());

    rec.start();
    rec.record(&common::frame(common::stop()), &store).unwrap();
    rec.record(&common::frame(common::stop()), &store).unwrap();
    assert_eq!(rec.pending(), 0);
    let written = std::fs::metadata(&path).unwrap().modified().unwrap();

    // The batch already went through; nothing is left to write.
    assert_eq!(rec.flush(&store).unwrap(), None);
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), written);
}

#[test]
fn recorder_rejects_malformed_hands() {
    let store = MemoryDatasetStore::new();
    let mut rec = Recorder::new("멈춰", 10);
    rec.start();
    let broken = common::frame(common::stop()[..5].to_vec());
    assert!(matches!(
        rec.record(&broken, &store),
        Err(SignForgeError::InvalidHandShape { .. })
    ));
    assert_eq!(rec.recorded(), 0);
}

#[test]
fn recordings_fill_in_missing_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frames.json");
    let hand = serde_json::to_value(common::stop()).unwrap();
    let frames = serde_json::json!([
        { "hands": [hand] },
        { "hands": [] },
        { "timestamp_ms": 500, "hands": [hand] },
        { "hands": [hand] }
    ]);
    std::fs::write(&path, frames.to_string()).unwrap();

    let loaded = load_recording(&path, 40).unwrap();
    let times: Vec<u64> = loaded.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![0, 40, 500, 540]);
    assert!(loaded[1].1.hands.is_empty());
}

#[test]
fn recordings_must_not_go_back_in_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frames.json");
    std::fs::write(
        &path,
        r#"[{"timestamp_ms": 100, "hands": []}, {"timestamp_ms": 50, "hands": []}]"#,
    )
    .unwrap();
    assert!(matches!(
        load_recording(&path, 33),
        Err(SignForgeError::Validation(_))
    ));
}
