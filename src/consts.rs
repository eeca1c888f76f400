/// Landmarks per hand, fixed by the detector's anatomical convention.
pub const LANDMARK_COUNT: usize = 21;

/// Flattened input width of the statistical classifier ([21, 3]).
pub const INPUT_WIDTH: usize = LANDMARK_COUNT * 3;

pub const WRIST: usize = 0;

pub const THUMB_BASE: usize = 2;
pub const THUMB_TIP: usize = 4;
pub const INDEX_BASE: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_BASE: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_BASE: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_BASE: usize = 17;
pub const PINKY_TIP: usize = 20;

pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Joint chains used for the per-finger bend angles.
pub const ANGLE_CHAINS: [[usize; 4]; 5] = [
    [1, 2, 3, 4],
    [5, 6, 7, 8],
    [9, 10, 11, 12],
    [13, 14, 15, 16],
    [17, 18, 19, 20],
];

/// (base, tip) pairs used for finger extension. The thumb measures from its MCP joint.
pub const EXTENSION_SPANS: [(usize, usize); 5] = [(2, 4), (5, 8), (9, 12), (13, 16), (17, 20)];

/// Minimum top probability (strict) for a prediction to count as recognized.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.93;

/// Minimum gap before the same label may be emitted again.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

pub const DEFAULT_TOP_K: usize = 5;

/// Spacing assumed for recorded frames that carry no timestamp (~30 fps).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

// Empirical rule thresholds in detector-normalized image units.
pub const DEFAULT_FINGER_EXTENDED: f32 = 0.15;
pub const DEFAULT_THUMB_EXTENDED: f32 = 0.12;
pub const DEFAULT_FINGERS_PRESSED: f32 = 0.03;
pub const DEFAULT_OK_PINCH: f32 = 0.05;

/// Soft readiness thresholds for training.
pub const RECOMMENDED_SAMPLES: usize = 100;
pub const RECOMMENDED_LABELS: usize = 5;
pub const MIN_TRAINING_LABELS: usize = 2;
