//! Dictionary entries and the partitions they live in.
//!
//! A `DictionaryEntry` is the immutable unit every lookup returns, whether it
//! came out of a store, out of the prefix index, or was synthesized on the fly
//! for a configured acronym shortcut.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named subset of the dictionary grouping entries by vocabulary class.
///
/// The string names double as table file stems (`chars.txt`, `base.txt`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Single characters.
    Chars,
    /// Base vocabulary.
    Base,
    /// Correlated phrases.
    Correlation,
    /// Associative long phrases.
    Associational,
    /// Place names.
    Place,
    /// Person names.
    People,
    /// Poetry lines.
    Poetry,
    /// Corrections for common misspellings.
    Corrections,
    /// Multi-reading compatible entries.
    Compatible,
}

impl Partition {
    pub const ALL: [Partition; 9] = [
        Partition::Chars,
        Partition::Base,
        Partition::Correlation,
        Partition::Associational,
        Partition::Place,
        Partition::People,
        Partition::Poetry,
        Partition::Corrections,
        Partition::Compatible,
    ];

    /// Partitions bulk-loaded into the prefix index.
    pub const INDEXED: [Partition; 2] = [Partition::Chars, Partition::Base];

    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Chars => "chars",
            Partition::Base => "base",
            Partition::Correlation => "correlation",
            Partition::Associational => "associational",
            Partition::Place => "place",
            Partition::People => "people",
            Partition::Poetry => "poetry",
            Partition::Corrections => "corrections",
            Partition::Compatible => "compatible",
        }
    }

    /// Fixed ranking bonus: high-traffic partitions get the most, the
    /// corrections/compatible fallbacks nothing.
    pub fn bonus(self) -> i32 {
        match self {
            Partition::Chars => 10,
            Partition::Base => 8,
            Partition::Correlation => 6,
            Partition::Associational => 4,
            Partition::Place | Partition::People => 2,
            Partition::Poetry => 1,
            Partition::Corrections | Partition::Compatible => 0,
        }
    }

    pub fn is_indexed(self) -> bool {
        Self::INDEXED.contains(&self)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Partition::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown partition '{}'", s))
    }
}

/// Derive initial letters from a space-delimited romanization.
///
/// `"bei jing"` -> `"bj"`, `"lü se"` -> `"ls"`. Empty romanization yields an
/// empty string.
pub fn initial_letters(romanization: &str) -> String {
    romanization
        .split_whitespace()
        .filter_map(|syl| syl.chars().next())
        .collect()
}

/// Romanization with the syllable separators removed, used as prefix-index key.
pub fn spaceless(romanization: &str) -> String {
    romanization.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The atomic unit returned by any dictionary lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Display text, one or more Han characters.
    pub word: String,
    /// Space-delimited syllables; empty for synthetic entries.
    pub romanization: String,
    /// Higher is more common.
    pub frequency: u32,
    pub partition: Partition,
    /// First letter of each syllable.
    pub initials: String,
    /// Created on the fly rather than read from a store.
    #[serde(default)]
    pub synthetic: bool,
}

impl DictionaryEntry {
    pub fn new<W: Into<String>, R: Into<String>>(
        word: W,
        romanization: R,
        frequency: u32,
        partition: Partition,
    ) -> Self {
        let romanization = romanization.into();
        let initials = initial_letters(&romanization);
        Self {
            word: word.into(),
            romanization,
            frequency,
            partition,
            initials,
            synthetic: false,
        }
    }

    /// Build an entry for a hard-coded acronym. Its initials are the acronym
    /// itself since there is no romanization to derive them from.
    pub fn synthetic<W: Into<String>>(word: W, initials: &str, frequency: u32, partition: Partition) -> Self {
        Self {
            word: word.into(),
            romanization: String::new(),
            frequency,
            partition,
            initials: initials.to_string(),
            synthetic: true,
        }
    }

    /// Word length in characters (not bytes).
    pub fn word_len(&self) -> usize {
        self.word.chars().count()
    }

    pub fn key(&self) -> String {
        spaceless(&self.romanization)
    }
}
