// pinyin-staged/src/segmenter.rs
//
// Unspaced pinyin -> syllable sequence.
// - fast path for inputs that already are one table syllable
// - `v` keyboard spelling rewritten to `ü` / `u`
// - DP over char positions, longest syllable first at every end position
// - greedy longest-match fallback
// - two LRU tiers (short / long inputs) shared across query threads

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::trace;

use candidate_core::utils::compact_input;
use candidate_core::Config;

use crate::syllables::{is_valid_syllable, MAX_SYLLABLE_LEN};

/// Rewrite the `v` spelling of `ü`.
///
/// `lv`/`nv` become `lü`/`nü`; after `j`, `q`, `x`, `y` the vowel is written
/// `u` in standard pinyin, so `jv` becomes `ju`. Other `v`s are left alone.
pub fn normalize_v(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    let mut prev: Option<char> = None;
    for ch in input.chars() {
        let mapped = match (prev, ch) {
            (Some('l') | Some('n'), 'v') => 'ü',
            (Some('j') | Some('q') | Some('x') | Some('y'), 'v') => 'u',
            _ => ch,
        };
        out.push(mapped);
        prev = Some(ch);
    }
    out
}

/// Longest-match-first DP. Empty when no full cover exists.
pub fn segment_dp(chars: &[char]) -> Vec<String> {
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }
    let mut reachable = vec![false; n + 1];
    let mut prev = vec![0usize; n + 1];
    reachable[0] = true;

    let mut buf = String::with_capacity(MAX_SYLLABLE_LEN * 2);
    for i in 1..=n {
        let max_len = MAX_SYLLABLE_LEN.min(i);
        for len in (1..=max_len).rev() {
            let j = i - len;
            if !reachable[j] {
                continue;
            }
            buf.clear();
            buf.extend(&chars[j..i]);
            if is_valid_syllable(&buf) {
                reachable[i] = true;
                prev[i] = j;
                break;
            }
        }
    }

    if !reachable[n] {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut i = n;
    while i > 0 {
        let j = prev[i];
        out.push(chars[j..i].iter().collect::<String>());
        i = j;
    }
    out.reverse();
    out
}

/// Greedy longest match from the left. Empty when any position is stuck.
pub fn segment_greedy(chars: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut buf = String::with_capacity(MAX_SYLLABLE_LEN * 2);
    while pos < chars.len() {
        let max_len = MAX_SYLLABLE_LEN.min(chars.len() - pos);
        let mut matched = 0;
        for len in (1..=max_len).rev() {
            buf.clear();
            buf.extend(&chars[pos..pos + len]);
            if is_valid_syllable(&buf) {
                matched = len;
                break;
            }
        }
        if matched == 0 {
            return Vec::new();
        }
        out.push(chars[pos..pos + matched].iter().collect());
        pos += matched;
    }
    out
}

/// Point-in-time copy of the segmenter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmenterStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fast_path_hits: u64,
    pub total_nanos: u64,
}

impl SegmenterStats {
    pub fn average_nanos(&self) -> Option<u64> {
        (self.total_requests > 0).then(|| self.total_nanos / self.total_requests)
    }

    /// Cache hit rate as a percentage of cache lookups.
    pub fn cache_hit_rate(&self) -> Option<f32> {
        let lookups = self.cache_hits + self.cache_misses;
        (lookups > 0).then(|| self.cache_hits as f32 / lookups as f32 * 100.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fast_path_hits: AtomicU64,
    total_nanos: AtomicU64,
}

type Tier = Mutex<LruCache<String, Arc<[String]>>>;

fn tier(capacity: usize) -> Tier {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
    ))
}

/// Thread-safe cached segmenter.
#[derive(Debug)]
pub struct Segmenter {
    short_cache: Tier,
    long_cache: Tier,
    short_input_max_len: usize,
    counters: Counters,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Segmenter {
    pub fn new(short_capacity: usize, long_capacity: usize, short_input_max_len: usize) -> Self {
        Self {
            short_cache: tier(short_capacity),
            long_cache: tier(long_capacity),
            short_input_max_len,
            counters: Counters::default(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.short_cache_capacity,
            cfg.long_cache_capacity,
            cfg.short_input_max_len,
        )
    }

    /// Segment raw input into syllables. Empty means the input is not
    /// continuous pinyin.
    pub fn segment(&self, input: &str) -> Vec<String> {
        let start = Instant::now();
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        let result = self.segment_inner(input);
        self.counters
            .total_nanos
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);
        result
    }

    fn segment_inner(&self, input: &str) -> Vec<String> {
        let compact = compact_input(input);
        if compact.is_empty() {
            return Vec::new();
        }
        if is_valid_syllable(&compact) {
            self.counters.fast_path_hits.fetch_add(1, Ordering::Relaxed);
            return vec![compact];
        }

        let normalized = normalize_v(&compact);
        let chars: Vec<char> = normalized.chars().collect();
        let cache = if chars.len() <= self.short_input_max_len {
            &self.short_cache
        } else {
            &self.long_cache
        };

        if let Some(hit) = lock(cache).get(&normalized).cloned() {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return hit.to_vec();
        }
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);

        let mut result = segment_dp(&chars);
        if result.is_empty() {
            result = segment_greedy(&chars);
        }
        trace!(input = %normalized, syllables = result.len(), "segmented");

        lock(cache).put(normalized, Arc::from(result.as_slice()));
        result
    }

    /// Segmentation joined with single spaces, the romanization form stored
    /// in dictionaries.
    pub fn segment_spaced(&self, input: &str) -> Option<String> {
        let syllables = self.segment(input);
        (!syllables.is_empty()).then(|| syllables.join(" "))
    }

    pub fn stats(&self) -> SegmenterStats {
        let c = &self.counters;
        SegmenterStats {
            total_requests: c.total_requests.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            fast_path_hits: c.fast_path_hits.load(Ordering::Relaxed),
            total_nanos: c.total_nanos.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        let c = &self.counters;
        for counter in [
            &c.total_requests,
            &c.cache_hits,
            &c.cache_misses,
            &c.fast_path_hits,
            &c.total_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn clear_cache(&self) {
        lock(&self.short_cache).clear();
        lock(&self.long_cache).clear();
    }

    /// `(short, long)` tier sizes.
    pub fn cache_len(&self) -> (usize, usize) {
        (lock(&self.short_cache).len(), lock(&self.long_cache).len())
    }
}

// A panic while holding a cache lock leaves a cache, not an invariant, behind.
fn lock(tier: &Tier) -> std::sync::MutexGuard<'_, LruCache<String, Arc<[String]>>> {
    tier.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
