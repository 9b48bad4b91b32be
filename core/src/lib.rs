//! candidate-core
//!
//! Language-agnostic building blocks for staged candidate retrieval:
//! dictionary entries and partitions, the dictionary-store seam, the
//! frequency-ordered prefix index, ranking/deduplication and configuration.
//!
//! Public API:
//! - `DictionaryEntry` / `Partition` - the unit every lookup returns
//! - `CandidateRecord` / `MatchKind` / `Candidate` - retrieval provenance and output
//! - `DictionaryStore` / `MemoryStore` - queryable partitions
//! - `PrefixTrie` / `SharedTrie` - prefix index with swap-on-rebuild
//! - `Ranker` / `LengthPolicy` - merge, dedup and order
//! - `QueryDebugInfo` - explain output
//! - `Config` - tunable thresholds and budgets
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod entry;
pub use entry::{initial_letters, spaceless, DictionaryEntry, Partition};

pub mod candidate;
pub use candidate::{length_bonus, Candidate, CandidateRecord, MatchKind};

pub mod store;
pub use store::{BulkSource, DictionaryStore, MemoryStore, Predicate, StoreError, StoreQuery};

pub mod trie;
pub use trie::{PrefixTrie, SharedTrie, SnapshotError, TrieEntry, TrieNode};

pub mod rank;
pub use rank::{compare, LengthPolicy, Ranked, Ranker};

pub mod debug;
pub use debug::{Conflict, QueryDebugInfo, StageTrace, WeightTuple};

/// A built-in word for an acronym shortcut.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShortcutWord {
    pub word: String,
    pub frequency: u32,
}

impl ShortcutWord {
    pub fn new(word: &str, frequency: u32) -> Self {
        Self {
            word: word.to_string(),
            frequency,
        }
    }
}

/// Tunable retrieval configuration.
///
/// Thresholds and budget divisors are quality/latency knobs; none of the
/// defaults is load-bearing for correctness.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // Stage escalation
    /// Pinyin Stage 2 runs when Stage 1 produced fewer results than this.
    pub pinyin_extension_min: usize,
    /// Stages 3 and 4 run while the accumulated total is below this.
    pub escalation_min: usize,
    /// Terminal fuzzy initials match runs while the total is below this.
    pub fuzzy_starved_min: usize,
    /// Inputs at or below this many characters count as short.
    pub short_input_len: usize,

    // Budgets: `limit / divisor`, at least 1
    pub primary_budget_divisor: usize,
    pub secondary_budget_divisor: usize,

    // Input shape
    /// Pinyin inputs with more syllables than this skip Stage 4.
    pub long_input_syllables: usize,
    /// Inputs with at least this many syllables (or acronym letters) rank
    /// longer words first.
    pub prefer_longer_from_syllables: usize,
    pub max_acronym_len: usize,
    /// Three-letter syllables never treated as acronyms.
    pub three_letter_pinyin_exceptions: Vec<String>,
    /// Stage 3 keeps only words at least this long.
    pub domain_min_word_len: usize,
    /// Acronym-mode Stage 3 looks at this many trailing letters.
    pub tail_window: usize,

    // Segmenter cache
    pub short_cache_capacity: usize,
    pub long_cache_capacity: usize,
    pub short_input_max_len: usize,

    // Prefix index
    pub trie_batch_size: usize,
    /// The index collects `budget * trie_overscan` terminals before sorting.
    pub trie_overscan: usize,

    // Runtime
    pub worker_threads: usize,
    /// Per-request deadline; 0 disables it.
    pub deadline_ms: u64,

    /// Marker forcing acronym handling, stripped before classification.
    pub force_acronym_prefix: String,
    /// Weight tuples kept in explain output.
    pub debug_top_n: usize,
    /// Built-in words synthesized for common acronyms.
    pub acronym_shortcuts: BTreeMap<String, Vec<ShortcutWord>>,
}

impl Default for Config {
    fn default() -> Self {
        let mut acronym_shortcuts = BTreeMap::new();
        acronym_shortcuts.insert(
            "bj".to_string(),
            vec![
                ShortcutWord::new("北京", 1000),
                ShortcutWord::new("宝鸡", 500),
                ShortcutWord::new("边界", 300),
            ],
        );
        acronym_shortcuts.insert(
            "sh".to_string(),
            vec![
                ShortcutWord::new("上海", 1000),
                ShortcutWord::new("深圳", 800),
                ShortcutWord::new("社会", 500),
            ],
        );
        acronym_shortcuts.insert(
            "zg".to_string(),
            vec![ShortcutWord::new("中国", 1000), ShortcutWord::new("总共", 500)],
        );
        acronym_shortcuts.insert(
            "gj".to_string(),
            vec![ShortcutWord::new("国家", 1000), ShortcutWord::new("工具", 600)],
        );

        Self {
            pinyin_extension_min: 10,
            escalation_min: 5,
            fuzzy_starved_min: 3,
            short_input_len: 2,
            primary_budget_divisor: 2,
            secondary_budget_divisor: 4,
            long_input_syllables: 3,
            prefer_longer_from_syllables: 4,
            max_acronym_len: 8,
            three_letter_pinyin_exceptions: ["shi", "zhi", "chi", "ang", "eng", "ing", "ong"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            domain_min_word_len: 3,
            tail_window: 3,
            short_cache_capacity: 200,
            long_cache_capacity: 100,
            short_input_max_len: 3,
            trie_batch_size: 2000,
            trie_overscan: 4,
            worker_threads: 4,
            deadline_ms: 40,
            force_acronym_prefix: "abbr:".to_string(),
            debug_top_n: 10,
            acronym_shortcuts,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// `limit / divisor`, never below 1.
    pub fn budget(limit: usize, divisor: usize) -> usize {
        (limit / divisor.max(1)).max(1)
    }

    pub fn primary_budget(&self, limit: usize) -> usize {
        Self::budget(limit, self.primary_budget_divisor)
    }

    pub fn secondary_budget(&self, limit: usize) -> usize {
        Self::budget(limit, self.secondary_budget_divisor)
    }

    pub fn is_three_letter_exception(&self, input: &str) -> bool {
        self.three_letter_pinyin_exceptions.iter().any(|s| s == input)
    }

    pub fn shortcuts_for(&self, initials: &str) -> &[ShortcutWord] {
        self.acronym_shortcuts
            .get(initials)
            .map_or(&[][..], Vec::as_slice)
    }
}

pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }

    /// Normalized, lower-cased input with embedded whitespace removed.
    pub fn compact_input(s: &str) -> String {
        normalize(s)
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }
}
