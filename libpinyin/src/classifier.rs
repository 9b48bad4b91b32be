// pinyin-staged/src/classifier.rs
//
// Decides which retrieval mode an input gets. Pure apart from the
// segmenter's cache and the store counts used for the 3-letter tie-break.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use candidate_core::{Config, DictionaryStore, Partition, Predicate, StoreQuery};

use crate::segmenter::{normalize_v, Segmenter};
use crate::syllables::is_valid_syllable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    SingleLetter,
    ExactSyllable,
    SegmentableMultiSyllable,
    AcronymLike,
    Unclassifiable,
}

impl InputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::SingleLetter => "single_letter",
            InputMode::ExactSyllable => "exact_syllable",
            InputMode::SegmentableMultiSyllable => "segmentable_multi_syllable",
            InputMode::AcronymLike => "acronym_like",
            InputMode::Unclassifiable => "unclassifiable",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output: the mode plus the syllables it was decided on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Compacted input with `v` rewritten.
    pub input: String,
    pub mode: InputMode,
    /// Non-empty only for the two pinyin modes.
    pub syllables: Vec<String>,
}

impl Classified {
    pub fn acronym(input: String) -> Self {
        Self {
            input,
            mode: InputMode::AcronymLike,
            syllables: Vec::new(),
        }
    }
}

pub struct InputClassifier {
    segmenter: Arc<Segmenter>,
    config: Arc<Config>,
}

impl InputClassifier {
    pub fn new(segmenter: Arc<Segmenter>, config: Arc<Config>) -> Self {
        Self { segmenter, config }
    }

    /// Classify an already compacted (trimmed, lower-cased, spaceless) input.
    ///
    /// `store` is only consulted for the acronym heuristics.
    pub fn classify(&self, compact: &str, store: &dyn DictionaryStore) -> Classified {
        let input = normalize_v(compact);
        let len = input.chars().count();
        let all_letters = !input.is_empty() && input.chars().all(|c| c.is_ascii_alphabetic() || c == 'ü');
        let classified = |mode, syllables| Classified {
            input: input.clone(),
            mode,
            syllables,
        };

        if len == 1 && all_letters {
            return classified(InputMode::SingleLetter, Vec::new());
        }
        if is_valid_syllable(&input) {
            return classified(InputMode::ExactSyllable, vec![input.clone()]);
        }

        let syllables = self.segmenter.segment(&input);
        if !syllables.is_empty() {
            if len == 3
                && syllables.len() > 1
                && !self.config.is_three_letter_exception(&input)
                && self.acronym_wins(store, &input, &syllables)
            {
                debug!(input = %input, "three-letter input resolved as acronym");
                return classified(InputMode::AcronymLike, Vec::new());
            }
            return classified(InputMode::SegmentableMultiSyllable, syllables);
        }

        let mode = match len {
            0 => InputMode::Unclassifiable,
            2 | 3 if all_letters => InputMode::AcronymLike,
            n if n > 3 => {
                if self.initials_count(store, &input) > 0
                    || (all_letters && n <= self.config.max_acronym_len)
                {
                    InputMode::AcronymLike
                } else {
                    InputMode::Unclassifiable
                }
            }
            _ => InputMode::Unclassifiable,
        };
        classified(mode, Vec::new())
    }

    /// Acronym wins ties: the initials reading must match at least as many
    /// entries as the segmented-prefix reading.
    fn acronym_wins(&self, store: &dyn DictionaryStore, input: &str, syllables: &[String]) -> bool {
        let initials = self.initials_count(store, input);
        let spaced = syllables.join(" ");
        let pinyin = count_indexed(store, Predicate::RomanizationPrefix(spaced));
        initials > 0 && initials >= pinyin
    }

    fn initials_count(&self, store: &dyn DictionaryStore, input: &str) -> usize {
        count_indexed(store, Predicate::InitialsExact(input.to_string()))
    }
}

fn count_indexed(store: &dyn DictionaryStore, predicate: Predicate) -> usize {
    Partition::INDEXED
        .iter()
        .map(|&p| {
            let q = StoreQuery::new(p, predicate.clone(), usize::MAX);
            store.count(&q).unwrap_or_else(|e| {
                warn!(partition = %p, "count failed during classification: {}", e);
                0
            })
        })
        .sum()
}
