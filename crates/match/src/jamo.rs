//! Hangul syllable decomposition.
//!
//! A precomposed syllable in U+AC00..=U+D7A3 is `0xAC00 + (lead * 21 + vowel) * 28 + tail`,
//! where `tail == 0` means no trailing consonant. Sub-glyphs are emitted as
//! compatibility jamo so OCR confusions between similar syllables turn into
//! single-character edits.

const SYLLABLE_FIRST: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const VOWEL_COUNT: u32 = 21;
const TAIL_COUNT: u32 = 28;

const LEADING: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ',
    'ㅍ', 'ㅎ',
];

const VOWELS: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ', 'ㅟ',
    'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

// Index 0 is "no trailing consonant".
const TRAILING: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

pub fn is_syllable(c: char) -> bool {
    (SYLLABLE_FIRST..=SYLLABLE_LAST).contains(&(c as u32))
}

/// Whether `text` contains at least one precomposed Hangul syllable.
pub fn contains_syllable(text: &str) -> bool {
    text.chars().any(is_syllable)
}

/// Split one syllable into (leading, vowel, trailing). `None` for any other character.
pub fn decompose_char(c: char) -> Option<(char, char, Option<char>)> {
    if !is_syllable(c) {
        return None;
    }
    let offset = c as u32 - SYLLABLE_FIRST;
    let lead = offset / (VOWEL_COUNT * TAIL_COUNT);
    let vowel = (offset % (VOWEL_COUNT * TAIL_COUNT)) / TAIL_COUNT;
    let tail = offset % TAIL_COUNT;
    Some((
        LEADING[lead as usize],
        VOWELS[vowel as usize],
        TRAILING[tail as usize],
    ))
}

/// Replace every syllable with its sub-glyphs; other characters pass through.
pub fn decompose(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match decompose_char(c) {
            Some((lead, vowel, tail)) => {
                out.push(lead);
                out.push(vowel);
                if let Some(t) = tail {
                    out.push(t);
                }
            }
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decomposes_open_and_closed_syllables() {
        assert_eq!(decompose("가"), "ㄱㅏ");
        assert_eq!(decompose("각"), "ㄱㅏㄱ");
        assert_eq!(decompose("힣"), "ㅎㅣㅎ");
        assert_eq!(decompose("라떼"), "ㄹㅏㄸㅔ");
    }

    #[test]
    fn passes_other_characters_through() {
        assert_eq!(decompose("A1 커피!"), "A1 ㅋㅓㅍㅣ!");
        assert_eq!(decompose("ㄱ"), "ㄱ");
        assert_eq!(decompose(""), "");
    }

    #[test]
    fn detects_syllables() {
        assert!(contains_syllable("TEL 스타벅스"));
        assert!(!contains_syllable("4,500"));
        assert!(!contains_syllable("ㅋㅋ"));
    }

    proptest! {
        #[test]
        fn every_syllable_yields_at_least_two_jamo(s in "[가-힣]{1,12}") {
            let chars = s.chars().count();
            let jamo = decompose(&s).chars().count();
            prop_assert!(jamo >= 2 * chars);
            prop_assert!(jamo <= 3 * chars);
        }
    }
}
