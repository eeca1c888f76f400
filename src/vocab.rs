use crate::error::{SfResult, SignForgeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A gesture name. Its position inside a [`Vocabulary`] is the class id.
pub type Label = String;

/// The reference sign vocabulary. Index order is the output order of every
/// classifier trained against it.
pub const REFERENCE_LABELS: [&str; 74] = [
    "안녕하세요", // 0: open palm
    "감사합니다", // 1: prayer
    "좋아요",     // 2: thumbs up
    "싫어요",     // 3: thumbs down
    "확인",       // 4: ok
    "평화",       // 5: peace
    "사랑해요",   // 6: love
    "하나",       // 7
    "둘",         // 8
    "셋",         // 9
    "넷",         // 10
    "다섯",       // 11
    "여섯",       // 12
    "일곱",       // 13
    "여덟",       // 14
    "아홉",       // 15
    "열",         // 16
    "주먹",       // 17: fist
    "가리키기",   // 18: pointing
    "멈춰",       // 19: stop
    "와",         // 20: come here
    "가",         // 21: go
    "예",         // 22
    "아니오",     // 23
    "물",         // 24
    "밥",         // 25
    "도와주세요", // 26
    "미안합니다", // 27
    "잘가",       // 28
    "전화",       // 29
    "락",         // 30: rock
    // Subjects
    "나",
    "너",
    "우리",
    "그",
    "그녀",
    "누구",
    // Verbs
    "먹다",
    "마시다",
    "자다",
    "보다",
    "듣다",
    "말하다",
    "걷다",
    "뛰다",
    "앉다",
    "서다",
    "읽다",
    "쓰다",
    // Places
    "집",
    "학교",
    "회사",
    "병원",
    "공원",
    "식당",
    // Nouns
    "책",
    "컴퓨터",
    "친구",
    "가족",
    "엄마",
    "아빠",
    "형",
    "누나",
    "동생",
    "시간",
    "돈",
    "사람",
    // Adjectives
    "크다",
    "작다",
    "많다",
    "적다",
    "예쁘다",
    "아프다",
    "대기", // 73: idle
];

/// The explicit no-gesture label.
pub const IDLE_LABEL: &str = "대기";

/// Ordered, immutable label list. Trained models persist theirs verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Label>", into = "Vec<Label>")]
pub struct Vocabulary {
    labels: Vec<Label>,
    #[serde(skip)]
    index: HashMap<Label, usize>,
}

impl Vocabulary {
    pub fn new(labels: Vec<Label>) -> SfResult<Self> {
        let vocab = Self::from(labels);
        if vocab.index.len() != vocab.labels.len() {
            return Err(SignForgeError::Validation(
                "Vocabulary contains duplicate labels".to_string(),
            ));
        }
        if vocab.labels.is_empty() {
            return Err(SignForgeError::Validation("Vocabulary is empty".to_string()));
        }
        Ok(vocab)
    }

    pub fn reference() -> Self {
        Self::from(
            REFERENCE_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }
}

impl From<Vec<Label>> for Vocabulary {
    fn from(labels: Vec<Label>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }
}

impl From<Vocabulary> for Vec<Label> {
    fn from(v: Vocabulary) -> Self {
        v.labels
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_indices_are_stable() {
        let v = Vocabulary::reference();
        assert_eq!(v.len(), 74);
        assert_eq!(v.index_of("안녕하세요"), Some(0));
        assert_eq!(v.index_of("멈춰"), Some(19));
        assert_eq!(v.index_of("락"), Some(30));
        assert_eq!(v.index_of(IDLE_LABEL), Some(73));
    }

    #[test]
    fn duplicate_labels_rejected() {
        let res = Vocabulary::new(vec!["a".into(), "b".into(), "a".into()]);
        assert!(res.is_err());
    }
}
