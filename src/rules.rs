//! Deterministic hand-shape classifier.
//!
//! The cascade is an ordered table of tagged rules evaluated first-match-wins.
//! It needs no training data and is the baseline whenever no statistical
//! model is loaded.

use crate::config::RuleThresholds;
use crate::consts::{INDEX_TIP, MIDDLE_TIP, THUMB_BASE, THUMB_TIP, WRIST};
use crate::error::{SfResult, SignForgeError};
use crate::landmarks::{extract_features, Landmark};
use crate::vocab::{Vocabulary, IDLE_LABEL};
use strum_macros::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum RuleKind {
    Stop,
    Hello,
    ThankYou,
    Good,
    Bad,
    Ok,
    Peace,
    Love,
    One,
    Two,
    Three,
    Four,
    Five,
    Fist,
    Rock,
    Idle,
}

/// Boolean facts about one hand, computed once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoseFacts {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
    /// Extended count over index, middle, ring and pinky.
    pub ext_count: usize,
    /// Index and middle tips above the wrist (image y grows downward).
    pub tips_above_wrist: bool,
    pub fingers_pressed: bool,
    pub thumb_tip_above_base: bool,
    pub thumb_tip_below_base: bool,
    pub ok_pinch: bool,
}

impl PoseFacts {
    pub fn from_hand(hand: &[Landmark], t: &RuleThresholds) -> SfResult<Self> {
        let f = extract_features(hand)?;
        let ext = f.finger_extension;
        let d = f.finger_distances;

        let thumb = ext[0] > t.thumb_extended;
        let index = ext[1] > t.finger_extended;
        let middle = ext[2] > t.finger_extended;
        let ring = ext[3] > t.finger_extended;
        let pinky = ext[4] > t.finger_extended;

        let ext_count = [index, middle, ring, pinky].iter().filter(|&&e| e).count();

        // d: (thumb,index)=0, (index,middle)=4, (middle,ring)=7, (ring,pinky)=9
        Ok(Self {
            thumb,
            index,
            middle,
            ring,
            pinky,
            ext_count,
            tips_above_wrist: hand[INDEX_TIP].y < hand[WRIST].y
                && hand[MIDDLE_TIP].y < hand[WRIST].y,
            fingers_pressed: d[4] < t.fingers_pressed
                && d[7] < t.fingers_pressed
                && d[9] < t.fingers_pressed,
            thumb_tip_above_base: hand[THUMB_TIP].y < hand[THUMB_BASE].y,
            thumb_tip_below_base: hand[THUMB_TIP].y > hand[THUMB_BASE].y,
            ok_pinch: d[0] < t.ok_pinch,
        })
    }

    fn all_five(&self) -> bool {
        self.thumb && self.index && self.middle && self.ring && self.pinky
    }

    fn only_thumb(&self) -> bool {
        self.thumb && !self.index && !self.middle && !self.ring && !self.pinky
    }
}

pub struct Rule {
    pub kind: RuleKind,
    pub label: &'static str,
    pub confidence: f32,
    pub matches: fn(&PoseFacts) -> bool,
}

/// The cascade, in evaluation order. Idle is the terminal fallback and is not listed.
pub const RULES: [Rule; 15] = [
    Rule {
        kind: RuleKind::Stop,
        label: "멈춰",
        confidence: 0.95,
        matches: |p| p.all_five() && p.tips_above_wrist,
    },
    Rule {
        kind: RuleKind::Hello,
        label: "안녕하세요",
        confidence: 0.98,
        matches: |p| p.all_five(),
    },
    Rule {
        kind: RuleKind::ThankYou,
        label: "감사합니다",
        confidence: 0.95,
        matches: |p| !p.thumb && p.index && p.middle && p.ring && p.pinky && p.fingers_pressed,
    },
    Rule {
        kind: RuleKind::Good,
        label: "좋아요",
        confidence: 0.97,
        matches: |p| p.only_thumb() && p.thumb_tip_above_base,
    },
    Rule {
        kind: RuleKind::Bad,
        label: "싫어요",
        confidence: 0.96,
        matches: |p| p.only_thumb() && p.thumb_tip_below_base,
    },
    Rule {
        kind: RuleKind::Ok,
        label: "확인",
        confidence: 0.94,
        matches: |p| p.middle && p.ring && p.pinky && !p.index && p.ok_pinch,
    },
    Rule {
        kind: RuleKind::Peace,
        label: "평화",
        confidence: 0.96,
        matches: |p| !p.thumb && p.index && p.middle && !p.ring && !p.pinky,
    },
    Rule {
        kind: RuleKind::Love,
        label: "사랑해요",
        confidence: 0.93,
        matches: |p| p.thumb && p.index && !p.middle && !p.ring && p.pinky,
    },
    Rule {
        kind: RuleKind::One,
        label: "하나",
        confidence: 0.95,
        matches: |p| !p.thumb && p.index && !p.middle && !p.ring && !p.pinky,
    },
    Rule {
        kind: RuleKind::Two,
        label: "둘",
        confidence: 0.94,
        matches: |p| p.ext_count == 2 && p.index && p.middle,
    },
    Rule {
        kind: RuleKind::Three,
        label: "셋",
        confidence: 0.93,
        matches: |p| p.ext_count == 3,
    },
    Rule {
        kind: RuleKind::Four,
        label: "넷",
        confidence: 0.92,
        matches: |p| p.ext_count == 4,
    },
    // Shadowed by Four; kept so the cascade stays compatible with recorded data.
    Rule {
        kind: RuleKind::Five,
        label: "다섯",
        confidence: 0.95,
        matches: |p| p.thumb && p.ext_count == 4,
    },
    Rule {
        kind: RuleKind::Fist,
        label: "주먹",
        confidence: 0.96,
        matches: |p| !p.thumb && !p.index && !p.middle && !p.ring && !p.pinky,
    },
    Rule {
        kind: RuleKind::Rock,
        label: "락",
        confidence: 0.91,
        matches: |p| !p.thumb && p.index && !p.middle && !p.ring && p.pinky,
    },
];

pub const IDLE_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch {
    pub kind: RuleKind,
    pub label: &'static str,
    pub confidence: f32,
}

/// Walks the cascade. Total over any set of facts.
pub fn evaluate(facts: &PoseFacts) -> RuleMatch {
    RULES
        .iter()
        .find(|r| (r.matches)(facts))
        .map(|r| RuleMatch {
            kind: r.kind,
            label: r.label,
            confidence: r.confidence,
        })
        .unwrap_or(RuleMatch {
            kind: RuleKind::Idle,
            label: IDLE_LABEL,
            confidence: IDLE_CONFIDENCE,
        })
}

#[derive(Debug, Clone)]
pub struct RuleClassifier {
    thresholds: RuleThresholds,
    vocabulary: Vocabulary,
    /// Vocabulary slot of each rule in `RULES`, then idle.
    slots: Vec<usize>,
}

impl RuleClassifier {
    pub fn new(thresholds: RuleThresholds, vocabulary: Vocabulary) -> SfResult<Self> {
        let slots = RULES
            .iter()
            .map(|r| r.label)
            .chain(std::iter::once(IDLE_LABEL))
            .map(|label| {
                vocabulary.index_of(label).ok_or_else(|| {
                    SignForgeError::Validation(format!(
                        "Rule label '{}' is missing from the vocabulary",
                        label
                    ))
                })
            })
            .collect::<SfResult<Vec<_>>>()?;

        Ok(Self {
            thresholds,
            vocabulary,
            slots,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    pub fn classify(&self, hand: &[Landmark]) -> SfResult<RuleMatch> {
        let facts = PoseFacts::from_hand(hand, &self.thresholds)?;
        Ok(evaluate(&facts))
    }

    /// Vocabulary-sized vector, zero everywhere except the winning slot.
    pub fn confidence_vector(&self, hand: &[Landmark]) -> SfResult<Vec<f32>> {
        let m = self.classify(hand)?;
        let slot = match RULES.iter().position(|r| r.kind == m.kind) {
            Some(i) => self.slots[i],
            None => self.slots[RULES.len()],
        };
        let mut out = vec![0.0; self.vocabulary.len()];
        out[slot] = m.confidence;
        Ok(out)
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        let vocabulary = Vocabulary::reference();
        let slots = RULES
            .iter()
            .map(|r| r.label)
            .chain(std::iter::once(IDLE_LABEL))
            .filter_map(|l| vocabulary.index_of(l))
            .collect();
        Self {
            thresholds: RuleThresholds::default(),
            vocabulary,
            slots,
        }
    }
}
