//! Merging, deduplication and ordering of retrieved records.
use ahash::AHashMap;
use std::cmp::Ordering;

use crate::candidate::CandidateRecord;
use crate::debug::Conflict;

/// Direction of the word-length comparator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthPolicy {
    #[default]
    PreferShorter,
    /// Long inputs: compounds beat their own sub-spans.
    PreferLonger,
}

/// Total order over records; `Less` means ranked higher.
///
/// Keys: stage, match kind, word length (per policy), weight descending,
/// insertion order.
pub fn compare(a: &CandidateRecord, b: &CandidateRecord, policy: LengthPolicy) -> Ordering {
    a.stage
        .cmp(&b.stage)
        .then_with(|| a.match_kind.cmp(&b.match_kind))
        .then_with(|| {
            let (la, lb) = (a.entry.word_len(), b.entry.word_len());
            match policy {
                LengthPolicy::PreferShorter => la.cmp(&lb),
                LengthPolicy::PreferLonger => lb.cmp(&la),
            }
        })
        .then_with(|| b.weight().cmp(&a.weight()))
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Output of a ranking pass.
#[derive(Debug, Clone, Default)]
pub struct Ranked {
    pub records: Vec<CandidateRecord>,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker {
    policy: LengthPolicy,
}

impl Ranker {
    pub fn new(policy: LengthPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LengthPolicy {
        self.policy
    }

    /// Deduplicate on `(word, romanization)`, sort, then truncate to `limit`.
    ///
    /// Synthetic records carry no romanization, so they are also dropped
    /// when any dictionary record for the same word survived.
    pub fn rank(&self, records: Vec<CandidateRecord>, limit: usize) -> Ranked {
        let mut kept: Vec<CandidateRecord> = Vec::with_capacity(records.len());
        let mut index: AHashMap<(String, String), usize> = AHashMap::with_capacity(records.len());
        let mut conflicts = Vec::new();

        for record in records {
            let key = (record.entry.word.clone(), record.entry.romanization.clone());
            match index.get(&key) {
                Some(&at) => {
                    let existing = &mut kept[at];
                    let replace = compare(&record, existing, self.policy) == Ordering::Less;
                    let (winner, loser) = if replace {
                        (record.entry.partition, existing.entry.partition)
                    } else {
                        (existing.entry.partition, record.entry.partition)
                    };
                    conflicts.push(Conflict {
                        word: key.0,
                        romanization: key.1,
                        kept: winner,
                        discarded: loser,
                    });
                    if replace {
                        *existing = record;
                    }
                }
                None => {
                    index.insert(key, kept.len());
                    kept.push(record);
                }
            }
        }

        let mut real: AHashMap<String, _> = AHashMap::new();
        for r in kept.iter().filter(|r| !r.entry.synthetic) {
            real.entry(r.entry.word.clone()).or_insert(r.entry.partition);
        }
        kept.retain(|r| {
            let shadowed = r.entry.synthetic.then(|| real.get(&r.entry.word)).flatten();
            match shadowed {
                Some(&partition) => {
                    conflicts.push(Conflict {
                        word: r.entry.word.clone(),
                        romanization: r.entry.romanization.clone(),
                        kept: partition,
                        discarded: r.entry.partition,
                    });
                    false
                }
                None => true,
            }
        });

        kept.sort_by(|a, b| compare(a, b, self.policy));
        kept.truncate(limit);
        Ranked {
            records: kept,
            conflicts,
        }
    }
}
