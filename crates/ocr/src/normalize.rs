use nbbang_match::{contains_syllable, FuzzyMatcher, Vocabulary};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;
use tracing::debug;

use crate::config::SpacedThousands;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_colon, r"\s*:\s*");
re!(re_between_digits, r"(\d)[lIE](\d)");
re!(re_one_between_digits, r"(\d)[lI](\d)");
re!(re_numeric_run, r"[0-9OU,.]+");
re!(re_separator_space, r"(\d)\s*([,.])\s*(\d)");
re!(re_dot_thousands, r"(\d{1,3})\.(\d{3})(\D|$)");
re!(re_spaced_thousands, r"(^|\D)(\d{1,3})\s+(\d{3})(\D|$)");
re!(re_numeric_line, r"^[\d,.\sOlI]+$");

/// Apply `step` until the text stops changing.
fn until_stable(text: String, step: impl Fn(&str) -> String) -> String {
    let mut current = text;
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn replace_all_owned(re: &Regex, text: &str, rep: &str) -> String {
    match re.replace_all(text, rep) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop `(` and `)` that touch a digit.
fn strip_digit_parens(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let is_digit = |i: Option<usize>| i.and_then(|i| chars.get(i)).is_some_and(char::is_ascii_digit);
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| {
            !(matches!(c, '(' | ')') && (is_digit(i.checked_sub(1)) || is_digit(Some(i + 1))))
        })
        .map(|(_, c)| *c)
        .collect()
}

/// `O`/`U` inside a numeral become `0`; `l`, `I` and `E` squeezed between
/// digits become `1`, `1` and `0`.
fn repair_confusables(text: &str) -> String {
    let runs = re_numeric_run().replace_all(text, |caps: &Captures| {
        let run = &caps[0];
        if run.chars().any(|c| c.is_ascii_digit()) {
            run.replace(['O', 'U'], "0")
        } else {
            run.to_string()
        }
    });
    until_stable(runs.into_owned(), |s| {
        re_between_digits()
            .replace_all(s, |caps: &Captures| {
                let glyph = if caps[0].contains('E') { '0' } else { '1' };
                format!("{}{glyph}{}", &caps[1], &caps[2])
            })
            .into_owned()
    })
}

/// Rewrites OCR text line by line: character repairs, dictionary spelling
/// correction, numeral cleanup and re-joining of price fragments.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    vocabulary: Vocabulary,
    matcher: FuzzyMatcher,
    spaced_thousands: SpacedThousands,
}

impl TextNormalizer {
    pub fn new(vocabulary: Vocabulary, matcher: FuzzyMatcher, spaced_thousands: SpacedThousands) -> Self {
        Self { vocabulary, matcher, spaced_thousands }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Whitespace, `l`/`I` between digits, colon spacing, then word correction
    /// of multi-character Hangul tokens without digits.
    pub fn clean_text(&self, text: &str) -> String {
        let text = text.replace(';', ":");
        let text = collapse_whitespace(&replace_all_owned(re_colon(), &text, " : "));
        let text = until_stable(text, |s| replace_all_owned(re_one_between_digits(), s, "${1}1${2}"));

        text.split(' ')
            .map(|word| {
                let eligible = !word.chars().any(|c| c.is_ascii_digit())
                    && contains_syllable(word)
                    && word.chars().count() > 1;
                if eligible {
                    if let Some(corrected) = self.matcher.correct(word, &self.vocabulary) {
                        return corrected.to_string();
                    }
                }
                word.to_string()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Numeral repair for a whole line.
    pub fn normalize_number(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        let text = until_stable(text.to_string(), |s| repair_confusables(&strip_digit_parens(s)));
        let text = until_stable(text, |s| replace_all_owned(re_separator_space(), s, "${1}${2}${3}"));
        let text = until_stable(text, |s| replace_all_owned(re_dot_thousands(), s, "${1},${2}${3}"));
        let text = until_stable(text, |s| {
            re_spaced_thousands()
                .replace_all(s, |caps: &Captures| self.join_spaced_group(caps))
                .into_owned()
        });
        collapse_whitespace(&text)
    }

    fn join_spaced_group(&self, caps: &Captures) -> String {
        let (lead, left, right, tail) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        let merge = left.len() < 3
            || right == "000"
            || self.spaced_thousands == SpacedThousands::AlwaysMerge;
        if merge {
            format!("{lead}{left},{right}{tail}")
        } else {
            caps[0].to_string()
        }
    }

    pub fn process_line(&self, line: &str) -> String {
        if line.trim().is_empty() {
            return String::new();
        }
        self.normalize_number(&self.clean_text(line))
    }

    /// Fold lines that hold only numeral material onto the preceding
    /// non-empty line.
    ///
    /// A merged line can itself become numeral-only (`l` + `4,500`), so it is
    /// checked again against its own predecessor before moving on.
    pub fn merge_number_lines(&self, mut lines: Vec<String>) -> Vec<String> {
        let mut i = 1;
        while i < lines.len() {
            let current = lines[i].trim();
            let numeric = re_numeric_line().is_match(current) && current.chars().any(|c| c.is_ascii_digit());
            if numeric && !lines[i - 1].trim().is_empty() {
                let fragment = glue_single_digits(&current.replace('O', "0").replace(['l', 'I'], "1"));
                let merged = self.normalize_number(&format!("{} {fragment}", lines[i - 1].trim_end()));
                debug!(previous = %lines[i - 1], fragment = %current, merged = %merged, "Merged numeral line");
                lines[i - 1] = merged;
                lines.remove(i);
                i = (i - 1).max(1);
            } else {
                i += 1;
            }
        }
        lines
    }

    pub fn process_lines<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        let processed = lines.iter().map(|l| self.process_line(l.as_ref())).collect();
        self.merge_number_lines(processed)
    }

    /// Newline-separated convenience wrapper over [`Self::process_lines`].
    pub fn normalize_text(&self, text: &str) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        self.process_lines(&lines).join("\n")
    }
}

/// `5 0 0` → `500`: OCR sometimes spaces out every digit of a price.
fn glue_single_digits(fragment: &str) -> String {
    fn flush(run: &mut Vec<&str>, out: &mut Vec<String>) {
        if run.len() >= 3 {
            out.push(run.concat());
        } else {
            out.extend(run.iter().map(|s| s.to_string()));
        }
        run.clear();
    }

    let mut out: Vec<String> = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    for token in fragment.split_whitespace() {
        if token.len() == 1 && token.chars().all(|c| c.is_ascii_digit()) {
            run.push(token);
        } else {
            flush(&mut run, &mut out);
            out.push(token.to_string());
        }
    }
    flush(&mut run, &mut out);
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plain() -> TextNormalizer {
        TextNormalizer::default()
    }

    fn with_vocabulary(terms: &[&str]) -> TextNormalizer {
        TextNormalizer::new(Vocabulary::new(terms), FuzzyMatcher::default(), SpacedThousands::default())
    }

    #[test]
    fn clean_text_collapses_whitespace_and_repairs_ones() {
        assert_eq!(plain().clean_text("  합계   2l0I0  "), "합계 21010");
    }

    #[test]
    fn clean_text_formats_colons() {
        assert_eq!(plain().clean_text("시간;12:30"), "시간 : 12 : 30");
        assert_eq!(plain().clean_text("시간 :  12"), "시간 : 12");
    }

    #[test]
    fn clean_text_corrects_hangul_words() {
        let n = with_vocabulary(&["아메리카노", "카드"]);
        assert_eq!(n.clean_text("아메리카누 4,500"), "아메리카노 4,500");
    }

    #[test]
    fn clean_text_skips_tokens_with_digits_or_single_chars() {
        let n = with_vocabulary(&["아메리카노", "개"]);
        assert_eq!(n.clean_text("아메리카누2 게"), "아메리카누2 게");
    }

    #[test]
    fn confusable_letters_inside_numerals() {
        let n = plain();
        assert_eq!(n.normalize_number("4,5OO"), "4,500");
        assert_eq!(n.normalize_number("O1"), "01");
        assert_eq!(n.normalize_number("1U0"), "100");
        assert_eq!(n.normalize_number("3E5"), "305");
    }

    #[test]
    fn letters_outside_numerals_are_kept() {
        let n = plain();
        assert_eq!(n.normalize_number("COUPON 1"), "COUPON 1");
        assert_eq!(n.normalize_number("ICE 2"), "ICE 2");
    }

    #[test]
    fn parentheses_next_to_digits_are_removed() {
        let n = plain();
        assert_eq!(n.normalize_number("할인(1,000)"), "할인1,000");
        assert_eq!(n.normalize_number("(세트)"), "(세트)");
    }

    #[test]
    fn separator_spacing_is_removed() {
        assert_eq!(plain().normalize_number("4 , 500"), "4,500");
        assert_eq!(plain().normalize_number("12 . 5"), "12.5");
    }

    #[test]
    fn dot_thousands_become_commas() {
        let n = plain();
        assert_eq!(n.normalize_number("4.500"), "4,500");
        assert_eq!(n.normalize_number("1.234.567"), "1,234,567");
        assert_eq!(n.normalize_number("4.5"), "4.5");
    }

    #[test]
    fn spaced_thousands_merge() {
        let n = plain();
        assert_eq!(n.normalize_number("라떼 4 500"), "라떼 4,500");
        assert_eq!(n.normalize_number("12 000원"), "12,000원");
        assert_eq!(n.normalize_number("300 000"), "300,000");
    }

    #[test]
    fn ambiguous_spaced_groups_follow_policy() {
        assert_eq!(plain().normalize_number("300 450"), "300 450");
        assert_eq!(plain().normalize_number("12 345 678"), "12,345 678");
        let merging = TextNormalizer::new(
            Vocabulary::default(),
            FuzzyMatcher::default(),
            SpacedThousands::AlwaysMerge,
        );
        assert_eq!(merging.normalize_number("300 450"), "300,450");
    }

    #[test]
    fn split_price_line_is_merged() {
        let lines = plain().process_lines(&["아메리카노 4", "5 0 0"]);
        assert_eq!(lines, vec!["아메리카노 4,500"]);
        let numeral: i64 = lines[0]
            .split_whitespace()
            .last()
            .unwrap()
            .replace(',', "")
            .parse()
            .unwrap();
        assert_eq!(numeral, 4500);
    }

    #[test]
    fn four_spaced_digits_read_as_one_group() {
        // `5 0 0 0` glues to `5000`, which is not a thousands group for the `4`.
        let n = plain();
        let once = n.process_lines(&["아메리카노 4", "5 0 0 0"]);
        assert_eq!(once, vec!["아메리카노 4 5000"]);
        assert_eq!(n.process_lines(&once), once);
    }

    #[test]
    fn stray_letter_line_does_not_strand_a_price() {
        let n = with_vocabulary(&["아메리카노"]);
        let once = n.process_lines(&["아메리카노", "l", "4,500"]);
        assert_eq!(once, vec!["아메리카노 1 4,500"]);
        assert_eq!(n.process_lines(&once), once);
    }

    #[test]
    fn merged_line_is_rechecked_against_its_predecessor() {
        let n = with_vocabulary(&["가나다", "나다"]);
        let once = n.normalize_text("나\n.\n0");
        assert_eq!(once, "나 . 0");
        assert_eq!(n.normalize_text(&once), once);
    }

    #[test]
    fn numeral_line_with_confusables_is_merged() {
        assert_eq!(plain().process_lines(&["카페라떼", "5,OOO"]), vec!["카페라떼 5,000"]);
    }

    #[test]
    fn numeral_line_after_blank_is_kept() {
        assert_eq!(plain().process_lines(&["", "1,000"]), vec!["", "1,000"]);
        assert_eq!(plain().process_lines(&["1,000"]), vec!["1,000"]);
    }

    #[test]
    fn consecutive_numeral_lines_collapse_into_one() {
        assert_eq!(
            plain().process_lines(&["라떼", "2", "9,000"]),
            vec!["라떼 2 9,000"]
        );
    }

    #[test]
    fn glue_only_long_single_digit_runs() {
        assert_eq!(glue_single_digits("5 0 0"), "500");
        assert_eq!(glue_single_digits("2 9,000"), "2 9,000");
        assert_eq!(glue_single_digits("1 2 3 4 , 5"), "1234 , 5");
    }

    #[test]
    fn normalize_text_round_trips_lines() {
        let n = with_vocabulary(&["스타벅스", "아메리카노"]);
        assert_eq!(
            n.normalize_text("스타벅스\n아메리카누 2\n9.000"),
            "스타벅스\n아메리카노 2 9,000"
        );
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let n = with_vocabulary(&["아메리카노", "카페라떼", "합계"]);
        let input = ["스타벅스 강남점", "아메리카누 2 (4.500)", "9 O O O", "합게;  9OOO", "카페라떼 3 000 450"];
        let once = n.process_lines(&input);
        assert_eq!(n.process_lines(&once), once);
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(text in "[0-9OUElI,.() :;가나다\n]{0,40}") {
            let n = with_vocabulary(&["가나다", "나다"]);
            let once = n.normalize_text(&text);
            prop_assert_eq!(n.normalize_text(&once), once);
        }
    }
}
