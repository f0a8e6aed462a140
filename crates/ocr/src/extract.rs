use nbbang_core::{ExtractionResult, MenuItem};
use nbbang_match::{FuzzyMatcher, StoreMenu};
use tracing::{debug, info};

/// Finds the store, then walks the lines for menu items and their prices.
#[derive(Debug, Clone)]
pub struct ItemExtractor {
    matcher: FuzzyMatcher,
    /// Scanning stops once a line is this far past the last matched item.
    max_item_line_gap: usize,
}

impl Default for ItemExtractor {
    fn default() -> Self {
        Self { matcher: FuzzyMatcher::default(), max_item_line_gap: 2 }
    }
}

impl ItemExtractor {
    pub fn new(matcher: FuzzyMatcher, max_item_line_gap: usize) -> Self {
        Self { matcher, max_item_line_gap }
    }

    pub fn extract<S: AsRef<str>>(&self, lines: &[S], menu: &StoreMenu) -> ExtractionResult {
        let Some(store) = self.find_store(lines, menu) else {
            info!("No store name recognised; skipping item extraction");
            return ExtractionResult::default();
        };
        let items = self.find_items(lines, menu, store);
        info!(store, items = items.len(), "Extraction complete");
        ExtractionResult { store_name: Some(store.to_string()), items }
    }

    // ── Pass 1: store name ────────────────────────────────────────────────────

    /// First line (or, failing that, first word of a line) resembling a known store.
    pub fn find_store<'m, S: AsRef<str>>(&self, lines: &[S], menu: &'m StoreMenu) -> Option<&'m str> {
        for line in lines.iter().map(|l| l.as_ref().trim()).filter(|l| !l.is_empty()) {
            let hit = self
                .matcher
                .match_store(line, menu)
                .or_else(|| line.split_whitespace().find_map(|w| self.matcher.match_store(w, menu)));
            if let Some(hit) = hit {
                debug!(line, store = hit.candidate, score = hit.score, "Store matched");
                return Some(hit.candidate);
            }
        }
        None
    }

    // ── Pass 2: items ─────────────────────────────────────────────────────────

    fn find_items<S: AsRef<str>>(&self, lines: &[S], menu: &StoreMenu, store: &str) -> Vec<MenuItem> {
        let mut items = Vec::new();
        let mut last_hit: Option<usize> = None;

        for (index, line) in lines.iter().enumerate() {
            let words: Vec<&str> = line.as_ref().split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            if last_hit.is_some_and(|last| index > last + self.max_item_line_gap) {
                break;
            }

            let Some((name, end)) = self.best_phrase(&words, menu, store) else {
                continue;
            };
            let numerals: Vec<i64> = words[end + 1..].iter().filter_map(|w| parse_numeral(w)).collect();
            if let Some(item) = MenuItem::from_numerals(name, &numerals) {
                debug!(
                    line = index,
                    item = %item.item_name,
                    unit_price = item.unit_price,
                    quantity = item.quantity,
                    total = item.total_amount,
                    "Item matched"
                );
                items.push(item);
                last_hit = Some(index);
            }
        }
        items
    }

    /// Grow the phrase `words[0..=k]` one word at a time and keep the best
    /// menu match. Growth stops before a numeral. Returns the matched item
    /// name and the index of the last word it covers.
    fn best_phrase<'m>(&self, words: &[&str], menu: &'m StoreMenu, store: &str) -> Option<(&'m str, usize)> {
        let mut best: Option<(&'m str, f64, usize)> = None;
        for k in 0..words.len() {
            let phrase = words[..=k].join(" ");
            if let Some(hit) = self.matcher.match_item(&phrase, menu, store) {
                if best.map_or(true, |(_, score, _)| hit.score > score) {
                    best = Some((hit.candidate, hit.score, k));
                }
            }
            if words.get(k + 1).is_some_and(|w| is_numeral(w)) {
                break;
            }
        }
        best.map(|(name, _, end)| (name, end))
    }
}

// ── Numeral helpers ───────────────────────────────────────────────────────────

/// Strip separators and whitespace, read `O` as `0`.
fn numeral_digits(word: &str) -> String {
    word.chars()
        .filter(|&c| !matches!(c, ',' | '.') && !c.is_whitespace())
        .map(|c| if c == 'O' { '0' } else { c })
        .collect()
}

fn is_numeral(word: &str) -> bool {
    let digits = numeral_digits(word);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Word as an amount. Anything that does not parse is dropped.
fn parse_numeral(word: &str) -> Option<i64> {
    if !is_numeral(word) {
        return None;
    }
    match numeral_digits(word).parse() {
        Ok(n) => Some(n),
        Err(e) => {
            debug!(word, "Ignoring unparseable numeral: {e}");
            None
        }
    }
}
