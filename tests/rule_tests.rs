mod common;

use common::{hand, Pose, Thumb};
use rstest::rstest;
use signforge::classifier::{Classifier, ClassifierInput};
use signforge::config::RuleThresholds;
use signforge::landmarks::normalize;
use signforge::rules::{evaluate, PoseFacts, RuleClassifier, RuleKind, IDLE_CONFIDENCE, RULES};
use signforge::vocab::{Vocabulary, IDLE_LABEL};
use strum::IntoEnumIterator;

#[rstest]
#[case::stop(Pose::new(Thumb::Up, [true; 4]), RuleKind::Stop, "멈춰", 0.95)]
#[case::hello(Pose::new(Thumb::Up, [true; 4]).pointing_down(), RuleKind::Hello, "안녕하세요", 0.98)]
#[case::thank_you(Pose::new(Thumb::Curled, [true; 4]).converged(), RuleKind::ThankYou, "감사합니다", 0.95)]
#[case::good(Pose::new(Thumb::Up, [false; 4]), RuleKind::Good, "좋아요", 0.97)]
#[case::bad(Pose::new(Thumb::Down, [false; 4]), RuleKind::Bad, "싫어요", 0.96)]
#[case::ok(Pose::new(Thumb::Pinch, [false, true, true, true]), RuleKind::Ok, "확인", 0.94)]
#[case::peace(Pose::new(Thumb::Curled, [true, true, false, false]), RuleKind::Peace, "평화", 0.96)]
#[case::love(Pose::new(Thumb::Up, [true, false, false, true]), RuleKind::Love, "사랑해요", 0.93)]
#[case::one(Pose::new(Thumb::Curled, [true, false, false, false]), RuleKind::One, "하나", 0.95)]
#[case::two(Pose::new(Thumb::Up, [true, true, false, false]), RuleKind::Two, "둘", 0.94)]
#[case::three(Pose::new(Thumb::Curled, [true, true, true, false]), RuleKind::Three, "셋", 0.93)]
#[case::four(Pose::new(Thumb::Curled, [true; 4]), RuleKind::Four, "넷", 0.92)]
#[case::fist(Pose::new(Thumb::Curled, [false; 4]), RuleKind::Fist, "주먹", 0.96)]
#[case::rock(Pose::new(Thumb::Curled, [true, false, false, true]), RuleKind::Rock, "락", 0.91)]
#[case::idle(Pose::new(Thumb::Curled, [false, true, false, false]), RuleKind::Idle, IDLE_LABEL, IDLE_CONFIDENCE)]
fn classifies_pose(
    #[case] pose: Pose,
    #[case] kind: RuleKind,
    #[case] label: &str,
    #[case] confidence: f32,
) {
    let m = RuleClassifier::default().classify(&hand(&pose)).unwrap();
    assert_eq!(m.kind, kind);
    assert_eq!(m.label, label);
    assert_eq!(m.confidence, confidence);
}

#[test]
fn stop_takes_precedence_over_hello() {
    let facts = PoseFacts::from_hand(&common::stop(), &RuleThresholds::default()).unwrap();
    // Both rules match these facts; the earlier one wins.
    let hello = RULES.iter().find(|r| r.kind == RuleKind::Hello).unwrap();
    assert!((hello.matches)(&facts));
    assert_eq!(evaluate(&facts).kind, RuleKind::Stop);
}

fn all_facts() -> impl Iterator<Item = PoseFacts> {
    (0u32..1 << 10).map(|bits| {
        let b = |i: u32| bits & (1 << i) != 0;
        let (index, middle, ring, pinky) = (b(1), b(2), b(3), b(4));
        PoseFacts {
            thumb: b(0),
            index,
            middle,
            ring,
            pinky,
            ext_count: [index, middle, ring, pinky].iter().filter(|&&e| e).count(),
            tips_above_wrist: b(5),
            fingers_pressed: b(6),
            thumb_tip_above_base: b(7),
            thumb_tip_below_base: b(8) && !b(7),
            ok_pinch: b(9),
        }
    })
}

#[test]
fn cascade_is_total_and_five_is_shadowed() {
    for facts in all_facts() {
        let m = evaluate(&facts);
        assert!(m.confidence > 0.0);
        assert_ne!(m.kind, RuleKind::Five, "{:?}", facts);
    }
}

#[test]
fn every_kind_except_idle_is_listed_once() {
    for kind in RuleKind::iter().filter(|k| *k != RuleKind::Idle) {
        assert_eq!(RULES.iter().filter(|r| r.kind == kind).count(), 1, "{}", kind);
    }
}

#[test]
fn confidence_vector_is_one_hot_in_vocabulary_order() {
    let rules = RuleClassifier::default();
    let raw = common::rock();
    let normalized = normalize(&raw).unwrap();
    let v = rules
        .predict(&ClassifierInput {
            raw: &raw,
            normalized: &normalized,
        })
        .unwrap();

    let vocab = Vocabulary::reference();
    assert_eq!(v.len(), vocab.len());
    assert_eq!(v[vocab.index_of("락").unwrap()], 0.91);
    assert_eq!(v.iter().filter(|&&p| p > 0.0).count(), 1);
}

#[test]
fn idle_maps_to_the_idle_slot() {
    let v = RuleClassifier::default()
        .confidence_vector(&common::idle())
        .unwrap();
    assert_eq!(v[73], IDLE_CONFIDENCE);
}

#[test]
fn classifier_requires_rule_labels_in_vocabulary() {
    let small = Vocabulary::new(vec!["하나".to_string(), "둘".to_string()]).unwrap();
    assert!(RuleClassifier::new(RuleThresholds::default(), small).is_err());
}

#[test]
fn thresholds_change_outcome() {
    // With a huge extension threshold no finger counts as extended.
    let strict = RuleThresholds {
        finger_extended: 10.0,
        thumb_extended: 10.0,
        ..RuleThresholds::default()
    };
    let rules = RuleClassifier::new(strict, Vocabulary::reference()).unwrap();
    assert_eq!(rules.classify(&common::stop()).unwrap().kind, RuleKind::Fist);
}
