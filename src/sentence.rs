//! Rule-based sentence assembly from an ordered token sequence.
//!
//! Each token is assigned a role by closed-set lookup, then gets the
//! particle or ending that its position and role call for.

use crate::buffer::WordToken;
use crate::hangul::{conjugate_present_plain, particle, stem};
use strum_macros::Display;

pub const SUBJECT_WORDS: [&str; 15] = [
    "나", "너", "우리", "저", "그", "그녀", "누구", "엄마", "아빠", "형", "누나", "동생", "친구",
    "가족", "사람",
];

pub const OBJECT_WORDS: [&str; 7] = ["밥", "물", "책", "전화", "컴퓨터", "시간", "돈"];

pub const LOCATION_WORDS: [&str; 6] = ["집", "학교", "회사", "병원", "공원", "식당"];

pub const ACTION_WORDS: [&str; 18] = [
    "먹다", "마시다", "자다", "보다", "듣다", "말하다", "걷다", "뛰다", "앉다", "서다", "읽다",
    "쓰다", "가다", "오다", "하다", "도와주세요", "와", "멈춰",
];

pub const ADJECTIVE_WORDS: [&str; 8] = [
    "좋다", "싫다", "크다", "작다", "많다", "적다", "예쁘다", "아프다",
];

const COPULA: &str = "입니다";

/// Polite present endings a conjugated word may carry after its stem.
const POLITE_ENDINGS: [&str; 3] = ["아요", "어요", "여요"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WordRole {
    Subject,
    Object,
    Location,
    Action,
    Adjective,
    /// Any other word; treated as an object when it is not first or last.
    Noun,
}

/// The entry itself, its stem, or the stem plus a polite ending
/// (`좋` + `아요`, `말하` as `말해요`). A bare shared prefix is not a match.
fn matches_entry(word: &str, entry: &str) -> bool {
    let entry_stem = stem(entry);
    if word == entry || stem(word) == entry_stem {
        return true;
    }
    if entry_stem.is_empty() {
        return false;
    }
    if word
        .strip_prefix(entry_stem)
        .is_some_and(|rest| POLITE_ENDINGS.contains(&rest))
    {
        return true;
    }
    entry_stem
        .strip_suffix('하')
        .is_some_and(|head| word.strip_prefix(head) == Some("해요"))
}

fn matches_stem(word: &str, set: &[&str]) -> bool {
    set.iter().any(|&entry| matches_entry(word, entry))
}

pub fn is_action(word: &str) -> bool {
    matches_stem(word, &ACTION_WORDS)
}

pub fn is_adjective(word: &str) -> bool {
    matches_stem(word, &ADJECTIVE_WORDS)
}

pub fn classify_word(word: &str) -> WordRole {
    if SUBJECT_WORDS.contains(&word) {
        WordRole::Subject
    } else if OBJECT_WORDS.contains(&word) {
        WordRole::Object
    } else if LOCATION_WORDS.contains(&word) {
        WordRole::Location
    } else if is_action(word) {
        WordRole::Action
    } else if is_adjective(word) {
        WordRole::Adjective
    } else {
        WordRole::Noun
    }
}

fn as_subject(word: &str) -> String {
    match word {
        "나" => "내가".to_string(),
        "저" => "제가".to_string(),
        _ => format!("{}{}", word, particle(word, "이", "가")),
    }
}

fn first(word: &str) -> String {
    match classify_word(word) {
        WordRole::Subject => as_subject(word),
        WordRole::Location => format!("{}{}", word, particle(word, "에서", "에")),
        _ => format!("{}{}", word, particle(word, "은", "는")),
    }
}

fn interior(word: &str) -> String {
    match classify_word(word) {
        WordRole::Location => format!("{}{}", word, particle(word, "에서", "에")),
        WordRole::Action | WordRole::Adjective => word.to_string(),
        _ => format!("{}{}", word, particle(word, "을", "를")),
    }
}

fn last(word: &str) -> String {
    match classify_word(word) {
        WordRole::Action => conjugate_present_plain(word),
        WordRole::Adjective => word.to_string(),
        _ => format!("{}{}", word, COPULA),
    }
}

/// Empty input yields an empty string; a single word is returned as-is.
pub fn synthesize_words(words: &[&str]) -> String {
    match words {
        [] => String::new(),
        [only] => only.to_string(),
        [head, middle @ .., tail] => std::iter::once(first(head))
            .chain(middle.iter().map(|w| interior(w)))
            .chain(std::iter::once(last(tail)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Subject, objects and verb as one plain declarative, e.g.
/// `내가 밥과 물을 먹는다`. Objects are joined with 과/와; from three on,
/// the leading ones are comma-separated. Roles are taken as given.
pub fn naturalize(subject: &str, objects: &[&str], verb: &str) -> String {
    let object_phrase = match objects {
        [] => None,
        [only] => Some(format!("{}{}", only, particle(only, "을", "를"))),
        [init @ .., before_last, last] => {
            let lead = init
                .iter()
                .chain(std::iter::once(before_last))
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!(
                "{}{} {}{}",
                lead,
                particle(before_last, "과", "와"),
                last,
                particle(last, "을", "를")
            ))
        }
    };
    std::iter::once(as_subject(subject))
        .chain(object_phrase)
        .chain(std::iter::once(conjugate_present_plain(verb)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn synthesize(tokens: &[WordToken]) -> String {
    let words: Vec<&str> = tokens.iter().map(|t| t.word.as_str()).collect();
    synthesize_words(&words)
}
