use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("Failed to read dictionary {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid store menu JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat reference vocabulary used for general spelling correction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    /// Trims every term, drops blanks and keeps the first occurrence of duplicates.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Self { terms }
    }

    /// Newline-delimited, one term per line.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines())
    }

    /// Load from disk. A missing file yields an empty vocabulary.
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        match read_optional(path)? {
            Some(text) => {
                let vocabulary = Self::from_text(&text);
                info!(path = %path.display(), terms = vocabulary.len(), "Loaded vocabulary");
                Ok(vocabulary)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct MenuEntry {
    #[serde(default)]
    items: Vec<String>,
}

/// Store name → that store's menu item names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMenu {
    stores: BTreeMap<String, Vec<String>>,
}

impl StoreMenu {
    pub fn new(stores: BTreeMap<String, Vec<String>>) -> Self {
        Self { stores }
    }

    /// Parse `{ "<store>": { "items": ["…", …] }, … }`.
    pub fn from_json_str(json: &str) -> Result<Self, DictionaryError> {
        let raw: BTreeMap<String, MenuEntry> = serde_json::from_str(json)?;
        let stores = raw
            .into_iter()
            .map(|(store, entry)| {
                let items = Vocabulary::new(entry.items).terms;
                (store.trim().to_string(), items)
            })
            .filter(|(store, _)| !store.is_empty())
            .collect();
        Ok(Self { stores })
    }

    /// Load from disk. A missing file yields an empty menu.
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        match read_optional(path)? {
            Some(text) => {
                let menu = Self::from_json_str(&text)?;
                info!(
                    path = %path.display(),
                    stores = menu.store_count(),
                    items = menu.item_count(),
                    "Loaded store menu"
                );
                Ok(menu)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn items(&self, store: &str) -> Option<&[String]> {
        self.stores.get(store).map(Vec::as_slice)
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn item_count(&self) -> usize {
        self.stores.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Either dictionary shape, as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dictionary {
    Vocabulary(Vocabulary),
    StoreMenu(StoreMenu),
}

impl Dictionary {
    /// `.json` files are store menus; anything else is a flat vocabulary.
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            StoreMenu::load(path).map(Dictionary::StoreMenu)
        } else {
            Vocabulary::load(path).map(Dictionary::Vocabulary)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Dictionary::Vocabulary(v) => v.is_empty(),
            Dictionary::StoreMenu(m) => m.is_empty(),
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, DictionaryError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Dictionary file not found; using an empty dictionary");
            Ok(None)
        }
        Err(source) => Err(DictionaryError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn vocabulary_skips_blank_lines_and_duplicates() {
        let v = Vocabulary::from_text("아메리카노\n\n  카드 \n아메리카노\n");
        assert_eq!(v.terms().collect::<Vec<_>>(), vec!["아메리카노", "카드"]);
    }

    #[test]
    fn vocabulary_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "합계\n부가세").unwrap();
        let v = Vocabulary::load(file.path()).unwrap();
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn missing_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Vocabulary::load(&dir.path().join("none.txt")).unwrap().is_empty());
        assert!(StoreMenu::load(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn store_menu_parses_items() {
        let menu = StoreMenu::from_json_str(
            r#"{ "스타벅스": { "items": ["아메리카노", "카페라떼", "아메리카노"] }, "빈가게": {} }"#,
        )
        .unwrap();
        assert_eq!(menu.store_count(), 2);
        assert_eq!(menu.items("스타벅스").unwrap().len(), 2);
        assert!(menu.items("빈가게").unwrap().is_empty());
        assert!(menu.items("없음").is_none());
    }

    #[test]
    fn store_menu_rejects_malformed_json() {
        assert!(matches!(
            StoreMenu::from_json_str("[1, 2]"),
            Err(DictionaryError::Json(_))
        ));
    }

    #[test]
    fn dictionary_load_picks_shape_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("menu.json");
        std::fs::write(&json, r#"{ "스타벅스": { "items": ["라떼"] } }"#).unwrap();
        let txt = dir.path().join("words.txt");
        std::fs::write(&txt, "라떼\n").unwrap();

        assert!(matches!(Dictionary::load(&json).unwrap(), Dictionary::StoreMenu(_)));
        assert!(matches!(Dictionary::load(&txt).unwrap(), Dictionary::Vocabulary(_)));
    }
}
