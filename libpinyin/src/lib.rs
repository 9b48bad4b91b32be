//! pinyin-staged crate root
//!
//! Pinyin candidate generation on top of `candidate-core`: the syllable
//! table, the cached segmenter, the input classifier, the staged query
//! orchestrator and the `Engine` that owns them.
//!
//! Public API exported here:
//! - `Engine` / `EngineError` / `Explanation` from `engine`
//! - `Segmenter` / `SegmenterStats` from `segmenter`
//! - `InputClassifier` / `InputMode` from `classifier`
//! - `Orchestrator` / `QueryOutcome` from `orchestrator`
//! - `CancelToken` / `CancelSource` from `cancel`
//! - `PinyinConfig` from `config`

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod segmenter;
pub mod syllables;

pub use cancel::{CancelSource, CancelToken};
pub use classifier::{Classified, InputClassifier, InputMode};
pub use config::PinyinConfig;
pub use engine::{Engine, EngineError, Explanation};
pub use orchestrator::{Orchestrator, QueryOutcome};
pub use segmenter::{Segmenter, SegmenterStats};
pub use syllables::{is_valid_romanization, is_valid_syllable, MAX_SYLLABLE_LEN, MIN_SYLLABLE_LEN, PINYIN_SYLLABLES};

// Core types callers need alongside the engine.
pub use candidate_core::{
    Candidate, CandidateRecord, Config, DictionaryEntry, DictionaryStore, MatchKind, MemoryStore,
    Partition, PrefixTrie, QueryDebugInfo, SharedTrie,
};
