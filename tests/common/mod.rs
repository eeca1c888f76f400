#![allow(dead_code)]

use signforge::classifier::{Classifier, ClassifierInput, ClassifierKind, StatisticalClassifier};
use signforge::dataset::Sample;
use signforge::error::{SfResult, SignForgeError};
use signforge::landmarks::{normalize, Landmark, LandmarkFrame};
use signforge::network::Network;
use signforge::registry::{ModelMetadata, RunMetrics, TrainedModel};
use signforge::vocab::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Thumb {
    Up,
    Down,
    Curled,
    /// Tip touching the curled index tip.
    Pinch,
}

/// A synthetic hand in image coordinates (y grows downward).
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub thumb: Thumb,
    /// index, middle, ring, pinky
    pub fingers: [bool; 4],
    /// Extended fingertips squeezed together.
    pub converge: bool,
    /// Extended fingers point below the wrist.
    pub downward: bool,
}

impl Pose {
    pub fn new(thumb: Thumb, fingers: [bool; 4]) -> Self {
        Self {
            thumb,
            fingers,
            converge: false,
            downward: false,
        }
    }

    pub fn converged(mut self) -> Self {
        self.converge = true;
        self
    }

    pub fn pointing_down(mut self) -> Self {
        self.downward = true;
        self
    }
}

const WRIST: (f32, f32) = (0.5, 0.8);
const FINGER_BASES: [(f32, f32); 4] = [(0.45, 0.6), (0.5, 0.58), (0.55, 0.6), (0.6, 0.62)];
const SPREAD_TIPS_X: [f32; 4] = [0.45, 0.5, 0.55, 0.6];
const CONVERGED_TIPS_X: [f32; 4] = [0.49, 0.5, 0.51, 0.52];

fn lm(x: f32, y: f32) -> Landmark {
    Landmark::new(x, y, 0.0)
}

pub fn hand(pose: &Pose) -> Vec<Landmark> {
    let mut pts = Vec::with_capacity(21);
    pts.push(lm(WRIST.0, WRIST.1));

    pts.push(lm(0.42, 0.75));
    pts.push(lm(0.38, 0.70));
    match pose.thumb {
        Thumb::Up => {
            pts.push(lm(0.34, 0.62));
            pts.push(lm(0.30, 0.55));
        }
        Thumb::Down => {
            pts.push(lm(0.34, 0.78));
            pts.push(lm(0.30, 0.85));
        }
        Thumb::Curled => {
            pts.push(lm(0.39, 0.71));
            pts.push(lm(0.40, 0.72));
        }
        Thumb::Pinch => {
            pts.push(lm(0.40, 0.66));
            pts.push(lm(0.44, 0.65));
        }
    }

    for (f, &(bx, by)) in FINGER_BASES.iter().enumerate() {
        pts.push(lm(bx, by));
        if pose.fingers[f] {
            let tx = if pose.converge {
                CONVERGED_TIPS_X[f]
            } else {
                SPREAD_TIPS_X[f]
            };
            let ty = if pose.downward { by + 0.25 } else { by - 0.25 };
            for t in [1.0 / 3.0, 2.0 / 3.0, 1.0] {
                pts.push(lm(bx + (tx - bx) * t, by + (ty - by) * t));
            }
        } else {
            pts.push(lm(bx, by - 0.03));
            pts.push(lm(bx, by + 0.02));
            pts.push(lm(bx, by + 0.05));
        }
    }
    pts
}

/// Shifts and scales a hand; the normalized form barely changes.
pub fn jitter(points: &[Landmark], rng: &mut fastrand::Rng, amount: f32) -> Vec<Landmark> {
    let (dx, dy) = (rng.f32() * 0.2 - 0.1, rng.f32() * 0.2 - 0.1);
    let scale = 0.8 + rng.f32() * 0.4;
    points
        .iter()
        .map(|p| {
            Landmark::new(
                (p.x - WRIST.0) * scale + WRIST.0 + dx + (rng.f32() - 0.5) * amount,
                (p.y - WRIST.1) * scale + WRIST.1 + dy + (rng.f32() - 0.5) * amount,
                p.z + (rng.f32() - 0.5) * amount,
            )
        })
        .collect()
}

pub fn stop() -> Vec<Landmark> {
    hand(&Pose::new(Thumb::Up, [true; 4]))
}

pub fn hello() -> Vec<Landmark> {
    hand(&Pose::new(Thumb::Up, [true; 4]).pointing_down())
}

pub fn thumbs_up() -> Vec<Landmark> {
    hand(&Pose::new(Thumb::Up, [false; 4]))
}

pub fn rock() -> Vec<Landmark> {
    hand(&Pose::new(Thumb::Curled, [true, false, false, true]))
}

pub fn fist() -> Vec<Landmark> {
    hand(&Pose::new(Thumb::Curled, [false; 4]))
}

pub fn idle() -> Vec<Landmark> {
    hand(&Pose::new(Thumb::Curled, [false, true, false, false]))
}

pub fn frame(points: Vec<Landmark>) -> LandmarkFrame {
    LandmarkFrame {
        hands: vec![points],
    }
}

pub fn samples(label: &str, points: &[Landmark], count: usize, seed: u64) -> Vec<Sample> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|_| Sample {
            label: label.to_string(),
            landmarks: normalize(&jitter(points, &mut rng, 0.01)).unwrap(),
        })
        .collect()
}

pub fn untrained_model(name: &str, accuracy: f32, seed: u64) -> TrainedModel {
    let vocabulary = Vocabulary::reference();
    let mut rng = fastrand::Rng::with_seed(seed);
    let network = Network::new(vocabulary.len(), &mut rng);
    TrainedModel {
        metadata: ModelMetadata {
            name: name.to_string(),
            accuracy,
            sample_count: 100,
            gesture_count: 5,
            epochs: 10,
            timestamp: chrono::Utc::now(),
            run: RunMetrics {
                parameters: network.parameter_count(),
                batch_size: 32,
                learning_rate: 0.001,
                ..RunMetrics::default()
            },
        },
        classifier: StatisticalClassifier::new(name, vocabulary, network).unwrap(),
    }
}

/// Returns the same distribution for every hand.
pub struct FixedClassifier {
    pub name: String,
    pub vocabulary: Vocabulary,
    pub probabilities: Vec<f32>,
}

impl FixedClassifier {
    /// All mass on `label`, the rest spread evenly.
    pub fn peaked(name: &str, label: &str, p: f32) -> Self {
        let vocabulary = Vocabulary::reference();
        let rest = (1.0 - p) / (vocabulary.len() - 1) as f32;
        let mut probabilities = vec![rest; vocabulary.len()];
        probabilities[vocabulary.index_of(label).unwrap()] = p;
        Self {
            name: name.to_string(),
            vocabulary,
            probabilities,
        }
    }
}

impl Classifier for FixedClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Statistical
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn predict(&self, _input: &ClassifierInput<'_>) -> SfResult<Vec<f32>> {
        Ok(self.probabilities.clone())
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "broken"
    }

    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Statistical
    }

    fn vocabulary(&self) -> &Vocabulary {
        static VOCAB: std::sync::OnceLock<Vocabulary> = std::sync::OnceLock::new();
        VOCAB.get_or_init(Vocabulary::reference)
    }

    fn predict(&self, _input: &ClassifierInput<'_>) -> SfResult<Vec<f32>> {
        Err(SignForgeError::Validation("inference backend unavailable".into()))
    }
}
