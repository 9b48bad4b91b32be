// pinyin-staged/src/orchestrator.rs
//
// Staged candidate retrieval.
// - Stage 1 (primary): chars + base, via the prefix index when it is loaded
// - Stage 2 (extension): correlation + associational
// - Stage 3 (domain): place + people + poetry, long words only
// - Stage 4 (fallback): corrections + compatible, then fuzzy initials
//
// Each stage fans its sub-queries out over the worker pool and joins them
// before deciding whether to escalate. Later stages only add records.

use rayon::prelude::*;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use candidate_core::utils::compact_input;
use candidate_core::{
    spaceless, CandidateRecord, Config, DictionaryEntry, DictionaryStore, LengthPolicy, MatchKind,
    Partition, Predicate, QueryDebugInfo, Ranker, SharedTrie, StoreError, StoreQuery,
};

use crate::cancel::CancelToken;
use crate::classifier::{Classified, InputClassifier, InputMode};
use crate::segmenter::{normalize_v, Segmenter};

const STAGE_PRIMARY: u8 = 1;
const STAGE_EXTENSION: u8 = 2;
const STAGE_DOMAIN: u8 = 3;
const STAGE_FALLBACK: u8 = 4;

const EXTENSION_PARTITIONS: [Partition; 2] = [Partition::Correlation, Partition::Associational];
const DOMAIN_PARTITIONS: [Partition; 3] = [Partition::Place, Partition::People, Partition::Poetry];
const FALLBACK_PARTITIONS: [Partition; 2] = [Partition::Corrections, Partition::Compatible];

/// One per-partition sub-query.
#[derive(Debug, Clone)]
enum Lookup {
    /// Exact romanization, then prefix fill up to `budget`.
    Romanization {
        partition: Partition,
        exact: String,
        prefix: String,
        budget: usize,
        min_word_len: usize,
    },
    /// Exact initials, then prefix fill up to `budget`.
    Initials {
        partition: Partition,
        initials: String,
        budget: usize,
        min_word_len: usize,
    },
    /// Initials containing the input anywhere.
    FuzzyInitials {
        partition: Partition,
        initials: String,
        budget: usize,
    },
    /// Spaceless-key prefix search against the prefix index.
    Trie {
        partition: Option<Partition>,
        key: String,
        budget: usize,
    },
}

#[derive(Debug, Clone)]
struct SubTask {
    stage: u8,
    lookup: Lookup,
}

impl SubTask {
    fn new(stage: u8, lookup: Lookup) -> Self {
        Self { stage, lookup }
    }
}

/// Cancellation and deadline, checked between stages and before sub-tasks.
struct StopCheck<'a> {
    cancel: &'a CancelToken,
    deadline: Option<Instant>,
}

impl StopCheck<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn deadline_hit(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn should_stop(&self) -> bool {
        self.cancelled() || self.deadline_hit()
    }
}

/// Records gathered so far; stage counts are pre-dedup.
struct Accumulator {
    records: Vec<CandidateRecord>,
    debug: Option<QueryDebugInfo>,
}

impl Accumulator {
    fn push_stage(&mut self, stage: u8, batch: Vec<CandidateRecord>) -> usize {
        if let Some(info) = self.debug.as_mut() {
            info.record_stage(stage, &batch);
        }
        let added = batch.len();
        for mut r in batch {
            r.seq = self.records.len();
            self.records.push(r);
        }
        added
    }

    fn total(&self) -> usize {
        self.records.len()
    }
}

/// Result of one orchestration.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub records: Vec<CandidateRecord>,
    pub mode: Option<InputMode>,
    pub cancelled: bool,
    pub deadline_hit: bool,
    pub debug: Option<QueryDebugInfo>,
}

pub struct Orchestrator {
    store: RwLock<Arc<dyn DictionaryStore>>,
    trie: SharedTrie,
    segmenter: Arc<Segmenter>,
    classifier: InputClassifier,
    config: Arc<Config>,
    pool: rayon::ThreadPool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DictionaryStore>,
        trie: SharedTrie,
        config: Arc<Config>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads.max(1))
            .thread_name(|i| format!("candidate-worker-{}", i))
            .build()?;
        let segmenter = Arc::new(Segmenter::from_config(&config));
        let classifier = InputClassifier::new(Arc::clone(&segmenter), Arc::clone(&config));
        Ok(Self {
            store: RwLock::new(store),
            trie,
            segmenter,
            classifier,
            config,
            pool,
        })
    }

    pub fn store(&self) -> Arc<dyn DictionaryStore> {
        match self.store.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn set_store(&self, store: Arc<dyn DictionaryStore>) {
        match self.store.write() {
            Ok(mut guard) => *guard = store,
            Err(poisoned) => *poisoned.into_inner() = store,
        }
    }

    pub fn trie(&self) -> &SharedTrie {
        &self.trie
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Strip the force-acronym marker, then classify.
    pub fn classify(&self, raw: &str) -> Classified {
        let compact = compact_input(raw);
        let marker = self.config.force_acronym_prefix.to_lowercase();
        if !marker.is_empty() {
            if let Some(rest) = compact.strip_prefix(marker.as_str()) {
                return Classified::acronym(normalize_v(rest));
            }
        }
        let store = self.store();
        self.classifier.classify(&compact, &*store)
    }

    /// Ranked, deduplicated records for `raw`, at most `limit`.
    pub fn query_candidates(&self, raw: &str, limit: usize, cancel: &CancelToken) -> Vec<CandidateRecord> {
        self.run(raw, limit, cancel, false).records
    }

    /// Like `query_candidates`, also collecting `QueryDebugInfo`.
    pub fn query_with_debug(&self, raw: &str, limit: usize, cancel: &CancelToken) -> QueryOutcome {
        self.run(raw, limit, cancel, true)
    }

    fn run(&self, raw: &str, limit: usize, cancel: &CancelToken, trace: bool) -> QueryOutcome {
        let started = Instant::now();
        let stop = StopCheck {
            cancel,
            deadline: (self.config.deadline_ms > 0)
                .then(|| started + Duration::from_millis(self.config.deadline_ms)),
        };
        let mut acc = Accumulator {
            records: Vec::new(),
            debug: trace.then(|| QueryDebugInfo::new(raw)),
        };

        if limit == 0 || compact_input(raw).is_empty() {
            return QueryOutcome {
                debug: acc.debug,
                ..QueryOutcome::default()
            };
        }

        let classified = self.classify(raw);
        if classified.input.is_empty() {
            return QueryOutcome {
                debug: acc.debug,
                ..QueryOutcome::default()
            };
        }
        if let Some(info) = acc.debug.as_mut() {
            info.mode = classified.mode.to_string();
            info.segmentation = classified.syllables.clone();
        }

        let store = self.store();
        let policy = match classified.mode {
            InputMode::SegmentableMultiSyllable => {
                self.run_pinyin(&classified, limit, &*store, &stop, &mut acc);
                self.length_policy(classified.syllables.len())
            }
            InputMode::AcronymLike => {
                self.run_acronym(&classified.input, limit, &*store, &stop, &mut acc);
                self.length_policy(classified.input.chars().count())
            }
            InputMode::SingleLetter => {
                let lookup = Lookup::Romanization {
                    partition: Partition::Chars,
                    exact: String::new(),
                    prefix: classified.input.clone(),
                    budget: limit,
                    min_word_len: 0,
                };
                self.run_stage(STAGE_PRIMARY, vec![lookup], &*store, &stop, &mut acc);
                LengthPolicy::PreferShorter
            }
            InputMode::ExactSyllable => {
                let syllable = classified.input.clone();
                let lookups = vec![
                    Lookup::Romanization {
                        partition: Partition::Chars,
                        exact: syllable.clone(),
                        prefix: String::new(),
                        budget: limit,
                        min_word_len: 0,
                    },
                    Lookup::Romanization {
                        partition: Partition::Base,
                        exact: syllable.clone(),
                        prefix: format!("{} ", syllable),
                        budget: self.config.primary_budget(limit),
                        min_word_len: 0,
                    },
                ];
                self.run_stage(STAGE_PRIMARY, lookups, &*store, &stop, &mut acc);
                LengthPolicy::PreferShorter
            }
            InputMode::Unclassifiable => {
                let lookup = Lookup::Trie {
                    partition: None,
                    key: spaceless(&classified.input),
                    budget: limit,
                };
                self.run_stage(STAGE_PRIMARY, vec![lookup], &*store, &stop, &mut acc);
                LengthPolicy::PreferShorter
            }
        };

        let ranked = Ranker::new(policy).rank(acc.records, limit);
        let cancelled = stop.cancelled();
        let deadline_hit = !cancelled && stop.deadline_hit();
        debug!(
            input = %classified.input,
            mode = %classified.mode,
            returned = ranked.records.len(),
            conflicts = ranked.conflicts.len(),
            cancelled,
            deadline_hit,
            "query finished"
        );

        let debug = acc.debug.map(|mut info| {
            info.conflicts = ranked.conflicts;
            info.set_top(&ranked.records, self.config.debug_top_n);
            info.elapsed_us = started.elapsed().as_micros() as u64;
            info.cancelled = cancelled;
            info.deadline_hit = deadline_hit;
            info
        });
        QueryOutcome {
            records: ranked.records,
            mode: Some(classified.mode),
            cancelled,
            deadline_hit,
            debug,
        }
    }

    fn length_policy(&self, units: usize) -> LengthPolicy {
        if units >= self.config.prefer_longer_from_syllables {
            LengthPolicy::PreferLonger
        } else {
            LengthPolicy::PreferShorter
        }
    }

    fn run_pinyin(
        &self,
        classified: &Classified,
        limit: usize,
        store: &dyn DictionaryStore,
        stop: &StopCheck<'_>,
        acc: &mut Accumulator,
    ) {
        let cfg = &self.config;
        let spaced = classified.syllables.join(" ");
        let key = spaceless(&spaced);
        let trie_ready = self.trie.is_loaded();

        // Stage 1
        let primary = cfg.primary_budget(limit);
        let lookups = Partition::INDEXED
            .iter()
            .map(|&partition| {
                if trie_ready {
                    Lookup::Trie {
                        partition: Some(partition),
                        key: key.clone(),
                        budget: primary,
                    }
                } else {
                    Lookup::Romanization {
                        partition,
                        exact: spaced.clone(),
                        prefix: spaced.clone(),
                        budget: primary,
                        min_word_len: 0,
                    }
                }
            })
            .collect();
        let stage1 = self.run_stage(STAGE_PRIMARY, lookups, store, stop, acc);

        // Stage 2
        if stage1 >= cfg.pinyin_extension_min || stop.should_stop() {
            return;
        }
        let secondary = cfg.secondary_budget(limit);
        let lookups = EXTENSION_PARTITIONS
            .iter()
            .map(|&partition| Lookup::Romanization {
                partition,
                exact: spaced.clone(),
                prefix: spaced.clone(),
                budget: secondary,
                min_word_len: 0,
            })
            .collect();
        self.run_stage(STAGE_EXTENSION, lookups, store, stop, acc);

        // Stage 3
        if acc.total() >= cfg.escalation_min || stop.should_stop() {
            return;
        }
        let lookups = DOMAIN_PARTITIONS
            .iter()
            .map(|&partition| Lookup::Romanization {
                partition,
                exact: spaced.clone(),
                prefix: spaced.clone(),
                budget: secondary,
                min_word_len: cfg.domain_min_word_len,
            })
            .collect();
        self.run_stage(STAGE_DOMAIN, lookups, store, stop, acc);

        // Stage 4
        if classified.syllables.len() > cfg.long_input_syllables {
            return;
        }
        if acc.total() < cfg.escalation_min && !stop.should_stop() {
            let lookups = FALLBACK_PARTITIONS
                .iter()
                .map(|&partition| Lookup::Romanization {
                    partition,
                    exact: spaced.clone(),
                    prefix: spaced.clone(),
                    budget: secondary,
                    min_word_len: 0,
                })
                .collect();
            self.run_stage(STAGE_FALLBACK, lookups, store, stop, acc);
        }
        self.run_fuzzy(&classified.input, limit, store, stop, acc);
    }

    fn run_acronym(
        &self,
        input: &str,
        limit: usize,
        store: &dyn DictionaryStore,
        stop: &StopCheck<'_>,
        acc: &mut Accumulator,
    ) {
        let cfg = &self.config;
        let letters: Vec<char> = input.chars().collect();
        let len = letters.len();
        let secondary = cfg.secondary_budget(limit);

        // Stage 1
        let primary = cfg.primary_budget(limit);
        let lookups = Partition::INDEXED
            .iter()
            .map(|&partition| Lookup::Initials {
                partition,
                initials: input.to_string(),
                budget: primary,
                min_word_len: 0,
            })
            .collect();
        let before = acc.total();
        self.run_stage(STAGE_PRIMARY, lookups, store, stop, acc);
        let shortcuts: Vec<CandidateRecord> = cfg
            .shortcuts_for(input)
            .iter()
            .filter(|s| !acc.records[before..].iter().any(|r| r.entry.word == s.word))
            .map(|s| {
                let entry = DictionaryEntry::synthetic(s.word.as_str(), input, s.frequency, Partition::Base);
                CandidateRecord::new(entry, STAGE_PRIMARY, MatchKind::Initials)
            })
            .collect();
        acc.push_stage(STAGE_PRIMARY, shortcuts);

        // Stage 2: always, over two-letter windows
        if stop.should_stop() {
            return;
        }
        if len >= 2 {
            let budget = Config::budget(limit, len - 1);
            let lookups = letters
                .windows(2)
                .flat_map(|w| {
                    let window: String = w.iter().collect();
                    EXTENSION_PARTITIONS.into_iter().map(move |partition| Lookup::Initials {
                        partition,
                        initials: window.clone(),
                        budget,
                        min_word_len: 0,
                    })
                })
                .collect();
            self.run_stage(STAGE_EXTENSION, lookups, store, stop, acc);
        }

        // Stage 3: tail window
        if acc.total() >= cfg.escalation_min || stop.should_stop() {
            return;
        }
        if len >= cfg.tail_window {
            let tail: String = letters[len - cfg.tail_window..].iter().collect();
            let lookups = DOMAIN_PARTITIONS
                .iter()
                .map(|&partition| Lookup::Initials {
                    partition,
                    initials: tail.clone(),
                    budget: secondary,
                    min_word_len: cfg.domain_min_word_len,
                })
                .collect();
            self.run_stage(STAGE_DOMAIN, lookups, store, stop, acc);
        }

        // Stage 4
        if acc.total() < cfg.escalation_min && len >= 2 && !stop.should_stop() {
            let lookups = FALLBACK_PARTITIONS
                .iter()
                .map(|&partition| Lookup::Initials {
                    partition,
                    initials: input.to_string(),
                    budget: secondary,
                    min_word_len: 0,
                })
                .collect();
            self.run_stage(STAGE_FALLBACK, lookups, store, stop, acc);
        }
        self.run_fuzzy(input, limit, store, stop, acc);
    }

    /// Terminal fallback for short, starved inputs.
    fn run_fuzzy(
        &self,
        input: &str,
        limit: usize,
        store: &dyn DictionaryStore,
        stop: &StopCheck<'_>,
        acc: &mut Accumulator,
    ) {
        let cfg = &self.config;
        if acc.total() >= cfg.fuzzy_starved_min
            || input.chars().count() > cfg.short_input_len
            || stop.should_stop()
        {
            return;
        }
        let budget = cfg.primary_budget(limit);
        let lookups = Partition::INDEXED
            .iter()
            .map(|&partition| Lookup::FuzzyInitials {
                partition,
                initials: input.to_string(),
                budget,
            })
            .collect();
        self.run_stage(STAGE_FALLBACK, lookups, store, stop, acc);
    }

    /// Run every lookup of one stage concurrently and join. Returns the
    /// number of records the stage added.
    fn run_stage(
        &self,
        stage: u8,
        lookups: Vec<Lookup>,
        store: &dyn DictionaryStore,
        stop: &StopCheck<'_>,
        acc: &mut Accumulator,
    ) -> usize {
        if lookups.is_empty() || stop.should_stop() {
            return 0;
        }
        let tasks: Vec<SubTask> = lookups.into_iter().map(|l| SubTask::new(stage, l)).collect();
        let batches: Vec<Vec<CandidateRecord>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    if stop.should_stop() {
                        return Vec::new();
                    }
                    self.execute(task, store).unwrap_or_else(|e| {
                        warn!(stage, "partition query failed: {}", e);
                        Vec::new()
                    })
                })
                .collect()
        });
        let added = acc.push_stage(stage, batches.into_iter().flatten().collect());
        debug!(stage, added, total = acc.total(), "stage complete");
        added
    }

    fn execute(&self, task: &SubTask, store: &dyn DictionaryStore) -> Result<Vec<CandidateRecord>, StoreError> {
        let stage = task.stage;
        let tag = |entries: Vec<DictionaryEntry>, kind: MatchKind| {
            entries
                .into_iter()
                .map(move |e| CandidateRecord::new(e, stage, kind))
        };

        match &task.lookup {
            Lookup::Romanization {
                partition,
                exact,
                prefix,
                budget,
                min_word_len,
            } => {
                let mut out: Vec<CandidateRecord> = Vec::new();
                if !exact.is_empty() {
                    let q = StoreQuery::new(*partition, Predicate::RomanizationExact(exact.clone()), *budget)
                        .min_word_len(*min_word_len);
                    out.extend(tag(store.query(&q)?, MatchKind::Exact));
                }
                let remaining = budget.saturating_sub(out.len());
                if remaining > 0 && !prefix.is_empty() {
                    let q = StoreQuery::new(
                        *partition,
                        Predicate::RomanizationPrefix(prefix.clone()),
                        remaining + out.len(),
                    )
                    .min_word_len(*min_word_len);
                    let fill: Vec<DictionaryEntry> = store
                        .query(&q)?
                        .into_iter()
                        .filter(|e| e.romanization != *exact)
                        .take(remaining)
                        .collect();
                    out.extend(tag(fill, MatchKind::Prefix));
                }
                Ok(out)
            }
            Lookup::Initials {
                partition,
                initials,
                budget,
                min_word_len,
            } => {
                let q = StoreQuery::new(*partition, Predicate::InitialsExact(initials.clone()), *budget)
                    .min_word_len(*min_word_len);
                let mut out: Vec<CandidateRecord> = tag(store.query(&q)?, MatchKind::Initials).collect();
                let remaining = budget.saturating_sub(out.len());
                if remaining > 0 {
                    let q = StoreQuery::new(
                        *partition,
                        Predicate::InitialsPrefix(initials.clone()),
                        remaining + out.len(),
                    )
                    .min_word_len(*min_word_len);
                    let fill: Vec<DictionaryEntry> = store
                        .query(&q)?
                        .into_iter()
                        .filter(|e| e.initials != *initials)
                        .take(remaining)
                        .collect();
                    out.extend(tag(fill, MatchKind::Initials));
                }
                Ok(out)
            }
            Lookup::FuzzyInitials {
                partition,
                initials,
                budget,
            } => {
                let q = StoreQuery::new(*partition, Predicate::InitialsContains(initials.clone()), *budget);
                Ok(tag(store.query(&q)?, MatchKind::Fuzzy).collect())
            }
            Lookup::Trie {
                partition,
                key,
                budget,
            } => Ok(self.trie_lookup(*partition, key, *budget, stage)),
        }
    }

    /// Exact-key hits first, then frequency; overscanned before truncation
    /// since collection order is not frequency order.
    fn trie_lookup(&self, partition: Option<Partition>, key: &str, budget: usize, stage: u8) -> Vec<CandidateRecord> {
        let trie = self.trie.snapshot();
        let cap = budget.saturating_mul(self.config.trie_overscan.max(1));
        let mut hits = trie.search_filtered(key, cap, |e| partition.map_or(true, |p| e.partition == p));
        hits.sort_by(|a, b| {
            let ea = spaceless(&a.romanization) == key;
            let eb = spaceless(&b.romanization) == key;
            eb.cmp(&ea).then_with(|| b.frequency.cmp(&a.frequency))
        });
        hits.truncate(budget);
        hits.into_iter()
            .map(|hit| {
                let kind = if spaceless(&hit.romanization) == key {
                    MatchKind::Exact
                } else {
                    MatchKind::Prefix
                };
                CandidateRecord::new(hit.to_dictionary_entry(), stage, kind)
            })
            .collect()
    }
}
