use crate::consts::{ANGLE_CHAINS, EXTENSION_SPANS, FINGERTIPS, INPUT_WIDTH, LANDMARK_COUNT, WRIST};
use crate::error::{SfResult, SignForgeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A detector point in normalized image space (not wrist-relative).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const ORIGIN: Landmark = Landmark {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn sub(&self, other: &Landmark) -> Landmark {
        Landmark::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Full 3D Euclidean distance.
    #[inline]
    pub fn distance(&self, other: &Landmark) -> f32 {
        let d = self.sub(other);
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }
}

/// One frame from the landmark detector. Hands are in detection order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
}

/// A recorded frame. Missing timestamps are filled in by [`load_recording`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimedFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    #[serde(flatten)]
    pub frame: LandmarkFrame,
}

/// Reads a JSON array of frames. Frames without a timestamp are placed
/// `interval_ms` after their predecessor; timestamps may not go backwards.
pub fn load_recording<P: AsRef<Path>>(
    path: P,
    interval_ms: u64,
) -> SfResult<Vec<(u64, LandmarkFrame)>> {
    let content = fs::read_to_string(&path)?;
    let frames: Vec<TimedFrame> = serde_json::from_str(&content)?;

    let mut out = Vec::with_capacity(frames.len());
    let mut prev: Option<u64> = None;
    for (i, f) in frames.into_iter().enumerate() {
        let ts = match (f.timestamp_ms, prev) {
            (Some(t), Some(p)) if t < p => {
                return Err(SignForgeError::Validation(format!(
                    "Frame {} is timestamped before its predecessor",
                    i
                )))
            }
            (Some(t), _) => t,
            (None, Some(p)) => p + interval_ms,
            (None, None) => 0,
        };
        prev = Some(ts);
        out.push((ts, f.frame));
    }
    Ok(out)
}

/// Wrist-relative, scale-normalized hand.
///
/// Landmark 0 is exactly the origin and the largest absolute coordinate is
/// exactly 1.0, except for a degenerate hand where every point coincides
/// with the wrist (all zeros).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct NormalizedHand {
    points: [Landmark; LANDMARK_COUNT],
}

impl NormalizedHand {
    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }

    /// Row-major [21, 3] tensor flattened to 63 scalars.
    pub fn to_input(&self) -> [f32; INPUT_WIDTH] {
        let mut out = [0.0; INPUT_WIDTH];
        for (i, p) in self.points.iter().enumerate() {
            out[i * 3] = p.x;
            out[i * 3 + 1] = p.y;
            out[i * 3 + 2] = p.z;
        }
        out
    }

    pub fn max_abs(&self) -> f32 {
        self.points
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .fold(0.0f32, |m, v| m.max(v.abs()))
    }
}

impl TryFrom<Vec<Landmark>> for NormalizedHand {
    type Error = SignForgeError;

    /// Accepts stored samples as-is; they were normalized when recorded.
    fn try_from(points: Vec<Landmark>) -> SfResult<Self> {
        let points: [Landmark; LANDMARK_COUNT] =
            points
                .try_into()
                .map_err(|v: Vec<Landmark>| SignForgeError::InvalidHandShape {
                    expected: LANDMARK_COUNT,
                    found: v.len(),
                })?;
        Ok(Self { points })
    }
}

impl From<NormalizedHand> for Vec<Landmark> {
    fn from(h: NormalizedHand) -> Self {
        h.points.to_vec()
    }
}

fn check_shape(hand: &[Landmark]) -> SfResult<()> {
    if hand.len() != LANDMARK_COUNT {
        return Err(SignForgeError::InvalidHandShape {
            expected: LANDMARK_COUNT,
            found: hand.len(),
        });
    }
    Ok(())
}

/// Translate to the wrist, then scale by the largest absolute coordinate.
pub fn normalize(hand: &[Landmark]) -> SfResult<NormalizedHand> {
    check_shape(hand)?;

    let wrist = hand[WRIST];
    let mut points = [Landmark::ORIGIN; LANDMARK_COUNT];
    for (dst, src) in points.iter_mut().zip(hand) {
        *dst = src.sub(&wrist);
    }

    let max = points
        .iter()
        .flat_map(|p| [p.x, p.y, p.z])
        .fold(0.0f32, |m, v| m.max(v.abs()));

    if max > 0.0 {
        for p in points.iter_mut() {
            p.x /= max;
            p.y /= max;
            p.z /= max;
        }
    }

    Ok(NormalizedHand { points })
}

/// Geometric descriptors computed from raw (non-normalized) landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Degrees, two interior joints per finger, thumb first.
    pub finger_angles: [f32; 10],
    /// Pairwise fingertip distances in (i, j) order with i < j.
    pub finger_distances: [f32; 10],
    /// Base-to-tip distance per finger.
    pub finger_extension: [f32; 5],
}

/// Angle at `p2` between `p2->p1` and `p2->p3`, in the image (x, y) plane.
pub fn joint_angle(p1: &Landmark, p2: &Landmark, p3: &Landmark) -> f32 {
    let (v1x, v1y) = (p1.x - p2.x, p1.y - p2.y);
    let (v2x, v2y) = (p3.x - p2.x, p3.y - p2.y);

    let mag1 = (v1x * v1x + v1y * v1y).sqrt();
    let mag2 = (v2x * v2x + v2y * v2y).sqrt();
    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let cos = ((v1x * v2x + v1y * v2y) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

pub fn extract_features(hand: &[Landmark]) -> SfResult<FeatureSet> {
    check_shape(hand)?;

    let mut finger_angles = [0.0; 10];
    for (f, chain) in ANGLE_CHAINS.iter().enumerate() {
        for i in 0..2 {
            finger_angles[f * 2 + i] =
                joint_angle(&hand[chain[i]], &hand[chain[i + 1]], &hand[chain[i + 2]]);
        }
    }

    let mut finger_distances = [0.0; 10];
    let mut k = 0;
    for i in 0..FINGERTIPS.len() {
        for j in (i + 1)..FINGERTIPS.len() {
            finger_distances[k] = hand[FINGERTIPS[i]].distance(&hand[FINGERTIPS[j]]);
            k += 1;
        }
    }

    let mut finger_extension = [0.0; 5];
    for (f, &(base, tip)) in EXTENSION_SPANS.iter().enumerate() {
        finger_extension[f] = hand[base].distance(&hand[tip]);
    }

    Ok(FeatureSet {
        finger_angles,
        finger_distances,
        finger_extension,
    })
}
