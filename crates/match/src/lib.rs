pub mod dictionary;
pub mod jamo;
pub mod match_engine;
pub(crate) mod util;

pub use dictionary::{Dictionary, DictionaryError, StoreMenu, Vocabulary};
pub use jamo::{contains_syllable, decompose};
pub use match_engine::{best_match, similarity, FuzzyMatcher, Scored};
