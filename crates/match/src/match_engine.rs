use tracing::debug;

use crate::dictionary::{StoreMenu, Vocabulary};
use crate::jamo::decompose;
use crate::util::indel_ratio;

/// A dictionary candidate with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored<'a> {
    pub candidate: &'a str,
    pub score: f64,
}

/// Jamo-aware similarity of `candidate` to the observed `query`, in [0.0, 1.0].
///
/// Strings of one or two syllables are compared with Jaro-Winkler, longer ones
/// with the indel ratio. A candidate shorter than the query loses 0.1 per
/// missing character so short entries don't swallow longer phrases.
pub fn similarity(query: &str, candidate: &str) -> f64 {
    let query_len = query.chars().count();
    let candidate_len = candidate.chars().count();

    let a = decompose(query);
    let b = decompose(candidate);
    let mut score = if query_len <= 2 || candidate_len <= 2 {
        strsim::jaro_winkler(&a, &b)
    } else {
        indel_ratio(&a, &b)
    };

    if candidate_len < query_len {
        score -= 0.1 * (query_len - candidate_len) as f64;
    }
    score.clamp(0.0, 1.0)
}

/// Best-scoring candidate for `query`.
///
/// Candidates whose length differs from the query by more than half the
/// query's length are skipped. Equal scores prefer the longer candidate,
/// then the earlier one.
pub fn best_match<'a, I>(query: &str, candidates: I) -> Option<Scored<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let query_len = query.chars().count() as f64;
    let mut best: Option<(Scored<'a>, usize)> = None;

    for candidate in candidates {
        let candidate_len = candidate.chars().count();
        if (query_len - candidate_len as f64).abs() > query_len / 2.0 {
            continue;
        }
        let score = similarity(query, candidate);
        let better = match &best {
            None => true,
            Some((current, current_len)) => {
                score > current.score || (score == current.score && candidate_len > *current_len)
            }
        };
        if better {
            best = Some((Scored { candidate, score }, candidate_len));
        }
    }

    best.map(|(scored, _)| scored)
}

/// Threshold-gated lookups against the two dictionary shapes.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    pub correction_threshold: f64,
    pub store_threshold: f64,
    pub item_threshold: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            correction_threshold: 0.70,
            store_threshold: 0.4,
            item_threshold: 0.4,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(correction_threshold: f64, store_threshold: f64, item_threshold: f64) -> Self {
        Self {
            correction_threshold,
            store_threshold,
            item_threshold,
        }
    }

    /// Spelling correction for `word`. An exact match is not a correction, so
    /// only scores in `[correction_threshold, 1)` return a replacement.
    pub fn correct<'a>(&self, word: &str, vocabulary: &'a Vocabulary) -> Option<&'a str> {
        let best = best_match(word, vocabulary.terms())?;
        if best.score >= self.correction_threshold && best.score < 1.0 {
            debug!(word, corrected = best.candidate, score = best.score, "Corrected word");
            Some(best.candidate)
        } else {
            None
        }
    }

    /// Match `text` against the store names of `menu`.
    pub fn match_store<'a>(&self, text: &str, menu: &'a StoreMenu) -> Option<Scored<'a>> {
        best_match(text, menu.store_names()).filter(|s| s.score >= self.store_threshold)
    }

    /// Match `phrase` against the items of one store. `None` for an unknown store.
    pub fn match_item<'a>(
        &self,
        phrase: &str,
        menu: &'a StoreMenu,
        store: &str,
    ) -> Option<Scored<'a>> {
        let items = menu.items(store)?;
        best_match(phrase, items.iter().map(String::as_str))
            .filter(|s| s.score >= self.item_threshold)
    }
}
