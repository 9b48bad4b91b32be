//! Candidate types for staged retrieval.
//!
//! This module provides:
//! - `Candidate`: the `(word, frequency)` pair handed back to the keyboard
//! - `MatchKind`: how a record was retrieved
//! - `CandidateRecord`: a dictionary entry enriched with retrieval provenance

use serde::{Deserialize, Serialize};

use crate::entry::{DictionaryEntry, Partition};

/// A single text candidate as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub frequency: u32,
}

impl Candidate {
    pub fn new<T: Into<String>>(text: T, frequency: u32) -> Self {
        Candidate {
            text: text.into(),
            frequency,
        }
    }
}

/// Retrieval method that produced a candidate. Declaration order is rank
/// order: exact beats prefix beats initials beats fuzzy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Prefix,
    Initials,
    Fuzzy,
}

impl MatchKind {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Word-length tier of the length bonus.
fn length_tier(word_len: usize) -> i32 {
    match word_len {
        0 | 1 => 0,
        2 | 3 => 5,
        4 | 5 => 10,
        _ => 15,
    }
}

/// Tie-breaking bonus from word length and partition weighting.
///
/// Fuzzy matches never get a bonus.
pub fn length_bonus(word_len: usize, partition: Partition, kind: MatchKind) -> i32 {
    if kind == MatchKind::Fuzzy {
        return 0;
    }
    length_tier(word_len) + partition.bonus()
}

/// An entry plus the stage, match kind and bonus it was retrieved with.
///
/// Created per query and discarded after ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub entry: DictionaryEntry,
    pub stage: u8,
    pub match_kind: MatchKind,
    pub length_bonus: i32,
    /// Insertion order within the query; final tie-breaker.
    #[serde(skip)]
    pub seq: usize,
}

impl CandidateRecord {
    pub fn new(entry: DictionaryEntry, stage: u8, match_kind: MatchKind) -> Self {
        let length_bonus = length_bonus(entry.word_len(), entry.partition, match_kind);
        Self {
            entry,
            stage,
            match_kind,
            length_bonus,
            seq: 0,
        }
    }

    pub fn word(&self) -> &str {
        &self.entry.word
    }

    /// `frequency + length_bonus`, the last comparator key.
    pub fn weight(&self) -> i64 {
        i64::from(self.entry.frequency) + i64::from(self.length_bonus)
    }

    pub fn to_candidate(&self) -> Candidate {
        Candidate::new(self.entry.word.clone(), self.entry.frequency)
    }
}
