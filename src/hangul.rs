//! Syllable-block arithmetic for precomposed Hangul.
//!
//! A block is `0xAC00 + initial * 588 + medial * 28 + final`, with
//! `final == 0` meaning no trailing consonant.

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const INITIAL_STRIDE: u32 = 588;
const MEDIAL_STRIDE: u32 = 28;
/// Final-consonant index of ㄴ.
const FINAL_NIEUN: u32 = 4;

fn syllable_offset(c: char) -> Option<u32> {
    let code = c as u32;
    (SYLLABLE_BASE..=SYLLABLE_LAST)
        .contains(&code)
        .then(|| code - SYLLABLE_BASE)
}

/// Whether the last character is a syllable block with a trailing consonant.
/// Anything that is not a precomposed syllable counts as open.
pub fn has_final_consonant(word: &str) -> bool {
    word.chars()
        .last()
        .and_then(syllable_offset)
        .is_some_and(|off| off % MEDIAL_STRIDE != 0)
}

/// Picks the particle form for the word's final syllable.
pub fn particle<'a>(word: &str, closed: &'a str, open: &'a str) -> &'a str {
    if has_final_consonant(word) {
        closed
    } else {
        open
    }
}

/// Replaces the final consonant of the last syllable with ㄴ.
/// Returns the word unchanged if it does not end in a syllable block.
pub fn add_final_n(word: &str) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    let Some(off) = chars.last().copied().and_then(syllable_offset) else {
        return word.to_string();
    };
    let initial = off / INITIAL_STRIDE;
    let medial = (off % INITIAL_STRIDE) / MEDIAL_STRIDE;
    let code = SYLLABLE_BASE + initial * INITIAL_STRIDE + medial * MEDIAL_STRIDE + FINAL_NIEUN;
    if let (Some(last), Some(c)) = (chars.last_mut(), char::from_u32(code)) {
        *last = c;
    }
    chars.into_iter().collect()
}

/// Dictionary stem: the word without its trailing `다`, if any.
pub fn stem(word: &str) -> &str {
    word.strip_suffix('다').unwrap_or(word)
}

/// Present-tense plain declarative. Only words ending in `다` are conjugated.
pub fn conjugate_present_plain(verb: &str) -> String {
    let Some(stem) = verb.strip_suffix('다') else {
        return verb.to_string();
    };
    if stem.is_empty() {
        return verb.to_string();
    }
    if has_final_consonant(stem) {
        format!("{}는다", stem)
    } else {
        format!("{}다", add_final_n(stem))
    }
}
