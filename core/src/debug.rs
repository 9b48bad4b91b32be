//! Per-request diagnostics for the explain surface.
use serde::Serialize;

use crate::candidate::{CandidateRecord, MatchKind};
use crate::entry::Partition;

/// Two records sharing `(word, romanization)`; only `kept` survived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub word: String,
    pub romanization: String,
    pub kept: Partition,
    pub discarded: Partition,
}

/// Comparator inputs of one ranked record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightTuple {
    pub word: String,
    pub partition: Partition,
    pub stage: u8,
    pub match_kind: MatchKind,
    pub word_len: usize,
    pub frequency: u32,
    pub length_bonus: i32,
    pub weight: i64,
}

impl From<&CandidateRecord> for WeightTuple {
    fn from(r: &CandidateRecord) -> Self {
        Self {
            word: r.entry.word.clone(),
            partition: r.entry.partition,
            stage: r.stage,
            match_kind: r.match_kind,
            word_len: r.entry.word_len(),
            frequency: r.entry.frequency,
            length_bonus: r.length_bonus,
            weight: r.weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTrace {
    pub stage: u8,
    pub words: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryDebugInfo {
    pub input: String,
    pub mode: String,
    pub segmentation: Vec<String>,
    pub stages: Vec<StageTrace>,
    pub conflicts: Vec<Conflict>,
    pub top: Vec<WeightTuple>,
    pub elapsed_us: u64,
    pub cancelled: bool,
    pub deadline_hit: bool,
}

impl QueryDebugInfo {
    pub fn new<S: Into<String>>(input: S) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Append the words a stage contributed, in retrieval order.
    pub fn record_stage(&mut self, stage: u8, records: &[CandidateRecord]) {
        let words = records.iter().map(|r| r.entry.word.clone()).collect();
        match self.stages.iter_mut().find(|s| s.stage == stage) {
            Some(trace) => trace.words.extend(words),
            None => self.stages.push(StageTrace { stage, words }),
        }
    }

    pub fn set_top(&mut self, ranked: &[CandidateRecord], n: usize) {
        self.top = ranked.iter().take(n).map(WeightTuple::from).collect();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
