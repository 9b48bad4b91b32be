// pinyin-staged/src/engine.rs
//
// Process-wide application context: owns the store, the prefix index, the
// orchestrator and the background index builder.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use candidate_core::{
    Candidate, CandidateRecord, Config, DictionaryStore, MemoryStore, PrefixTrie, QueryDebugInfo,
    SharedTrie, SnapshotError, StoreError,
};

use crate::cancel::{CancelSource, CancelToken};
use crate::config::PinyinConfig;
use crate::orchestrator::{Orchestrator, QueryOutcome};
use crate::segmenter::SegmenterStats;
use crate::syllables::is_valid_romanization;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("spawning index builder: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Build generations: `requested` is the newest build started, `finished`
/// the newest one done (swapped in or failed).
#[derive(Debug, Default)]
struct BuildState {
    requested: u64,
    finished: u64,
}

#[derive(Debug, Default)]
struct IndexStatus {
    state: Mutex<BuildState>,
    done: Condvar,
}

impl IndexStatus {
    fn lock(&self) -> MutexGuard<'_, BuildState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Explain output: what `generate_candidates` would return plus diagnostics.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub records: Vec<CandidateRecord>,
    pub debug: QueryDebugInfo,
}

/// Public query surface.
///
/// `Engine::new` returns immediately; the prefix index is built on a named
/// background thread and swapped in when complete. Until then Stage 1 reads
/// straight from the store.
pub struct Engine {
    orchestrator: Arc<Orchestrator>,
    cancel: CancelSource,
    status: Arc<IndexStatus>,
    builders: Mutex<Vec<JoinHandle<()>>>,
    /// Set on drop; builders check it between batches.
    shutdown: Arc<AtomicBool>,
    default_limit: usize,
}

impl Engine {
    /// Start an engine over `store`, building the prefix index in the background.
    pub fn new(store: Arc<dyn DictionaryStore>, config: Config) -> Result<Self, EngineError> {
        let engine = Self::assemble(store, config, SharedTrie::new())?;
        engine.spawn_build()?;
        Ok(engine)
    }

    /// Start an engine with a prebuilt prefix index; no background build.
    pub fn with_trie(store: Arc<dyn DictionaryStore>, config: Config, trie: PrefixTrie) -> Result<Self, EngineError> {
        let shared = SharedTrie::new();
        shared.swap(trie);
        Self::assemble(store, config, shared)
    }

    /// Load tables from `data_dir`, then either the snapshot or a background build.
    ///
    /// Entries whose romanization has a token outside the syllable table
    /// are dropped at load time.
    pub fn from_config(config: &PinyinConfig) -> Result<Self, EngineError> {
        let store = MemoryStore::load_dir_with(&config.data_dir, |e| is_valid_romanization(&e.romanization))?;
        let store: Arc<dyn DictionaryStore> = Arc::new(store);
        let mut engine = match &config.trie_snapshot {
            Some(path) if path.exists() => {
                let trie = PrefixTrie::load_snapshot(path)?;
                info!(path = %path.display(), words = trie.estimated_word_count(), "prefix index loaded from snapshot");
                Self::with_trie(store, config.base.clone(), trie)?
            }
            Some(path) => {
                warn!(path = %path.display(), "snapshot missing; building prefix index from tables");
                Self::new(store, config.base.clone())?
            }
            None => Self::new(store, config.base.clone())?,
        };
        engine.default_limit = config.default_limit;
        Ok(engine)
    }

    /// Convenience for a data directory with default configuration.
    pub fn from_data_dir<P: AsRef<Path>>(data_dir: P) -> Result<Self, EngineError> {
        let config = PinyinConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..PinyinConfig::default()
        };
        Self::from_config(&config)
    }

    fn assemble(store: Arc<dyn DictionaryStore>, config: Config, trie: SharedTrie) -> Result<Self, EngineError> {
        let orchestrator = Orchestrator::new(store, trie, Arc::new(config))?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            cancel: CancelSource::new(),
            status: Arc::new(IndexStatus::default()),
            builders: Mutex::new(Vec::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            default_limit: PinyinConfig::default().default_limit,
        })
    }

    fn spawn_build(&self) -> Result<(), EngineError> {
        let generation = {
            let mut state = self.status.lock();
            state.requested += 1;
            state.requested
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let status = Arc::clone(&self.status);
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name(format!("prefix-index-{}", generation))
            .spawn(move || {
                let store = orchestrator.store();
                let batch = orchestrator.config().trie_batch_size;
                let stop = || shutdown.load(Ordering::Relaxed) || status.lock().requested != generation;
                let built = PrefixTrie::build_from_store_until(&*store, batch, stop);
                let mut state = status.lock();
                match built {
                    Ok(trie) if !trie.is_loaded() => info!(generation, "prefix index build abandoned"),
                    Ok(trie) if generation == state.requested => {
                        orchestrator.trie().swap(trie);
                        info!(generation, "prefix index swapped in");
                    }
                    Ok(_) => info!(generation, "discarding superseded prefix index"),
                    Err(e) => warn!(generation, "prefix index build failed: {}", e),
                }
                state.finished = state.finished.max(generation);
                status.done.notify_all();
            })
            .map_err(EngineError::Spawn)?;

        let mut builders = self.builders.lock().unwrap_or_else(|p| p.into_inner());
        builders.retain(|h| !h.is_finished());
        builders.push(handle);
        Ok(())
    }

    /// Replace the store and rebuild the prefix index from it. The old index
    /// keeps serving until the new one is swapped in.
    pub fn reimport(&self, store: Arc<dyn DictionaryStore>) -> Result<(), EngineError> {
        self.cancel.cancel_all();
        self.orchestrator.set_store(store);
        self.orchestrator.segmenter().clear_cache();
        self.spawn_build()
    }

    /// Block until the most recently requested index build has finished.
    /// Returns whether an index is loaded.
    pub fn wait_for_index(&self) -> bool {
        let mut state = self.status.lock();
        while state.finished < state.requested {
            state = self
                .status
                .done
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        drop(state);
        self.is_index_loaded()
    }

    pub fn is_index_loaded(&self) -> bool {
        self.orchestrator.trie().is_loaded()
    }

    /// Ranked `(word, frequency)` candidates for `raw`. Supersedes any query
    /// still in flight on this engine.
    pub fn generate_candidates(&self, raw: &str, limit: usize) -> Vec<Candidate> {
        let token = self.cancel.next_token();
        self.generate_with_token(raw, limit, &token)
    }

    /// `generate_candidates` with the default limit.
    pub fn candidates(&self, raw: &str) -> Vec<Candidate> {
        self.generate_candidates(raw, self.default_limit)
    }

    /// Query under a caller-managed token.
    pub fn generate_with_token(&self, raw: &str, limit: usize, token: &CancelToken) -> Vec<Candidate> {
        self.orchestrator
            .query_candidates(raw, limit, token)
            .iter()
            .map(CandidateRecord::to_candidate)
            .collect()
    }

    /// Ranked records plus the per-stage trace, conflicts and weights.
    pub fn explain(&self, raw: &str, limit: usize) -> Explanation {
        let token = self.cancel.next_token();
        let QueryOutcome { records, debug, .. } = self.orchestrator.query_with_debug(raw, limit, &token);
        Explanation {
            records,
            debug: debug.unwrap_or_else(|| QueryDebugInfo::new(raw)),
        }
    }

    /// Full outcome under a caller-managed token.
    pub fn query(&self, raw: &str, limit: usize, token: &CancelToken) -> QueryOutcome {
        self.orchestrator.query_with_debug(raw, limit, token)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn segmenter_stats(&self) -> SegmenterStats {
        self.orchestrator.segmenter().stats()
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.cancel.cancel_all();
        let builders = match self.builders.get_mut() {
            Ok(b) => std::mem::take(b),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        for handle in builders {
            let _ = handle.join();
        }
    }
}
