//! Dictionary store seam.
//!
//! The orchestrator only ever talks to a `DictionaryStore`. `MemoryStore` is
//! the in-process implementation backed by per-partition tables; other
//! backends plug in by implementing the trait.
use ahash::AHashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::entry::{DictionaryEntry, Partition};

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown partition '{0}'")]
    UnknownPartition(String),
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("store backend: {0}")]
    Backend(String),
}

/// What a query matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `romanization == value`
    RomanizationExact(String),
    /// `romanization BEGINSWITH value`
    RomanizationPrefix(String),
    /// `initials == value`
    InitialsExact(String),
    /// `initials BEGINSWITH value`
    InitialsPrefix(String),
    /// `initials CONTAINS value`
    InitialsContains(String),
}

impl Predicate {
    pub fn matches(&self, entry: &DictionaryEntry) -> bool {
        match self {
            Predicate::RomanizationExact(v) => entry.romanization == *v,
            Predicate::RomanizationPrefix(v) => entry.romanization.starts_with(v.as_str()),
            Predicate::InitialsExact(v) => entry.initials == *v,
            Predicate::InitialsPrefix(v) => entry.initials.starts_with(v.as_str()),
            Predicate::InitialsContains(v) => entry.initials.contains(v.as_str()),
        }
    }
}

/// A single-partition lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub partition: Partition,
    pub predicate: Predicate,
    /// Minimum word length in characters; 0 disables the filter.
    pub min_word_len: usize,
    pub limit: usize,
}

impl StoreQuery {
    pub fn new(partition: Partition, predicate: Predicate, limit: usize) -> Self {
        Self {
            partition,
            predicate,
            min_word_len: 0,
            limit,
        }
    }

    pub fn min_word_len(mut self, len: usize) -> Self {
        self.min_word_len = len;
        self
    }

    pub fn accepts(&self, entry: &DictionaryEntry) -> bool {
        entry.word_len() >= self.min_word_len && self.predicate.matches(entry)
    }
}

/// Stream of entries for bulk loading one partition.
pub type BulkSource<'a> = Box<dyn Iterator<Item = DictionaryEntry> + Send + 'a>;

/// A queryable collection of dictionary entries.
///
/// Implementations must be safe to call from several worker threads at once.
/// A partition with no data yields empty results, never an error.
pub trait DictionaryStore: Send + Sync {
    /// Entries matching `query`, at most `query.limit`.
    fn query(&self, query: &StoreQuery) -> Result<Vec<DictionaryEntry>, StoreError>;

    /// Number of entries matching `query`, ignoring its limit.
    fn count(&self, query: &StoreQuery) -> Result<usize, StoreError> {
        let mut unbounded = query.clone();
        unbounded.limit = usize::MAX;
        Ok(self.query(&unbounded)?.len())
    }

    /// Every entry of `partition`, for building the prefix index.
    fn bulk(&self, partition: Partition) -> Result<BulkSource<'_>, StoreError>;
}

/// In-memory store keeping each partition sorted by frequency descending.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    partitions: AHashMap<Partition, Vec<DictionaryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = DictionaryEntry>>(entries: I) -> Self {
        let mut store = Self::new();
        store.extend(entries);
        store
    }

    /// Insert keeping frequency order; equal frequencies keep insertion order.
    ///
    /// Shifts the tail of the partition, so bulk loads go through `extend`.
    pub fn insert(&mut self, entry: DictionaryEntry) {
        let list = self.partitions.entry(entry.partition).or_default();
        let at = list.partition_point(|e| e.frequency >= entry.frequency);
        list.insert(at, entry);
    }

    /// Append many entries, then re-sort each touched partition once.
    ///
    /// The sort is stable, so the order matches repeated `insert` calls.
    pub fn extend<I: IntoIterator<Item = DictionaryEntry>>(&mut self, entries: I) {
        let mut touched: Vec<Partition> = Vec::new();
        for entry in entries {
            if !touched.contains(&entry.partition) {
                touched.push(entry.partition);
            }
            self.partitions.entry(entry.partition).or_default().push(entry);
        }
        for partition in touched {
            if let Some(list) = self.partitions.get_mut(&partition) {
                list.sort_by(|a, b| b.frequency.cmp(&a.frequency));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn partition_len(&self, partition: Partition) -> usize {
        self.partitions.get(&partition).map_or(0, Vec::len)
    }

    /// Load every `<partition>.txt` table found in `dir`.
    ///
    /// Missing tables are empty partitions. Malformed lines are logged and
    /// skipped.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        Self::load_dir_with(dir, |_: &DictionaryEntry| true)
    }

    /// Like `load_dir`, dropping parsed entries that `keep` rejects.
    pub fn load_dir_with<P, F>(dir: P, keep: F) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
        F: Fn(&DictionaryEntry) -> bool,
    {
        let dir = dir.as_ref();
        let mut store = Self::new();
        for partition in Partition::ALL {
            let path = dir.join(format!("{}.txt", partition.as_str()));
            if !path.exists() {
                debug!(partition = %partition, "no table at {}", path.display());
                continue;
            }
            let loaded = store.load_table_with(&path, partition, &keep)?;
            debug!(partition = %partition, loaded, "table loaded");
        }
        Ok(store)
    }

    /// Load one table file into `partition`, returning the number of entries read.
    pub fn load_table(&mut self, path: &Path, partition: Partition) -> Result<usize, StoreError> {
        self.load_table_with(path, partition, &|_: &DictionaryEntry| true)
    }

    /// Load one table file, keeping only entries accepted by `keep`.
    ///
    /// Returns the number of entries kept.
    pub fn load_table_with<F>(&mut self, path: &Path, partition: Partition, keep: &F) -> Result<usize, StoreError>
    where
        F: Fn(&DictionaryEntry) -> bool,
    {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = fs::File::open(path).map_err(io_err)?;
        let mut parsed = Vec::new();
        let mut rejected = 0usize;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_err)?;
            match parse_line(&line, idx + 1, partition) {
                Ok(Some(entry)) if keep(&entry) => parsed.push(entry),
                Ok(Some(entry)) => {
                    debug!(word = %entry.word, romanization = %entry.romanization, "entry rejected");
                    rejected += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }
        if rejected > 0 {
            warn!(partition = %partition, rejected, "dropped entries from {}", path.display());
        }
        let loaded = parsed.len();
        self.extend(parsed);
        Ok(loaded)
    }
}

/// Parse `word<TAB>romanization<TAB>frequency`.
///
/// Returns `Ok(None)` for blank and `#` comment lines. Negative or
/// unparsable frequencies clamp to 0.
pub fn parse_line(
    line: &str,
    line_no: usize,
    partition: Partition,
) -> Result<Option<DictionaryEntry>, StoreError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let mut cols = trimmed.split('\t');
    let word = cols.next().map(str::trim).unwrap_or_default();
    let romanization = cols.next().map(str::trim).unwrap_or_default();
    if word.is_empty() || romanization.is_empty() {
        return Err(StoreError::Malformed {
            line: line_no,
            reason: "expected word<TAB>romanization<TAB>frequency".to_string(),
        });
    }
    let frequency = cols
        .next()
        .and_then(|f| f.trim().parse::<i64>().ok())
        .map_or(0, |f| f.clamp(0, i64::from(u32::MAX)) as u32);
    let romanization = romanization
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Some(DictionaryEntry::new(word, romanization, frequency, partition)))
}

impl DictionaryStore for MemoryStore {
    fn query(&self, query: &StoreQuery) -> Result<Vec<DictionaryEntry>, StoreError> {
        let Some(list) = self.partitions.get(&query.partition) else {
            return Ok(Vec::new());
        };
        Ok(list
            .iter()
            .filter(|e| query.accepts(e))
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn count(&self, query: &StoreQuery) -> Result<usize, StoreError> {
        Ok(self
            .partitions
            .get(&query.partition)
            .map_or(0, |list| list.iter().filter(|e| query.accepts(e)).count()))
    }

    fn bulk(&self, partition: Partition) -> Result<BulkSource<'_>, StoreError> {
        match self.partitions.get(&partition) {
            Some(list) => Ok(Box::new(list.iter().cloned())),
            None => Ok(Box::new(std::iter::empty())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::from_entries(vec![
            DictionaryEntry::new("北京", "bei jing", 900, Partition::Base),
            DictionaryEntry::new("背景", "bei jing", 400, Partition::Base),
            DictionaryEntry::new("北京大学", "bei jing da xue", 300, Partition::Base),
            DictionaryEntry::new("不久", "bu jiu", 500, Partition::Base),
            DictionaryEntry::new("我", "wo", 1000, Partition::Chars),
            DictionaryEntry::new("为", "wei", 800, Partition::Chars),
        ])
    }

    #[test]
    fn partitions_keep_frequency_order() {
        let s = store();
        let q = StoreQuery::new(Partition::Base, Predicate::InitialsPrefix("b".into()), 10);
        let freqs: Vec<u32> = s.query(&q).unwrap().iter().map(|e| e.frequency).collect();
        assert_eq!(freqs, vec![900, 500, 400, 300]);
    }

    #[test]
    fn predicates_match() {
        let s = store();
        let exact = StoreQuery::new(Partition::Base, Predicate::InitialsExact("bj".into()), 10);
        assert_eq!(s.query(&exact).unwrap().len(), 3);
        let rom = StoreQuery::new(Partition::Base, Predicate::RomanizationExact("bei jing".into()), 10);
        assert_eq!(s.query(&rom).unwrap().len(), 2);
        let pre = StoreQuery::new(Partition::Chars, Predicate::RomanizationPrefix("w".into()), 10);
        assert_eq!(s.query(&pre).unwrap().len(), 2);
        let contains = StoreQuery::new(Partition::Base, Predicate::InitialsContains("dx".into()), 10);
        assert_eq!(s.query(&contains).unwrap()[0].word, "北京大学");
    }

    #[test]
    fn limit_and_min_len() {
        let s = store();
        let q = StoreQuery::new(Partition::Base, Predicate::InitialsPrefix("bj".into()), 1);
        assert_eq!(s.query(&q).unwrap().len(), 1);
        assert_eq!(s.count(&q).unwrap(), 3);
        let long = q.clone().min_word_len(3);
        assert_eq!(s.count(&long).unwrap(), 1);
    }

    #[test]
    fn missing_partition_is_empty() {
        let s = store();
        let q = StoreQuery::new(Partition::Poetry, Predicate::InitialsPrefix("b".into()), 10);
        assert!(s.query(&q).unwrap().is_empty());
        assert_eq!(s.bulk(Partition::Poetry).unwrap().count(), 0);
        assert_eq!(s.bulk(Partition::Chars).unwrap().count(), 2);
    }

    #[test]
    fn parse_table_lines() {
        let e = parse_line("你好\tNi  Hao\t12", 1, Partition::Base).unwrap().unwrap();
        assert_eq!(e.romanization, "ni hao");
        assert_eq!(e.initials, "nh");
        assert_eq!(e.frequency, 12);

        assert!(parse_line("# comment", 2, Partition::Base).unwrap().is_none());
        assert!(parse_line("   ", 3, Partition::Base).unwrap().is_none());
        let neg = parse_line("好\thao\t-5", 4, Partition::Chars).unwrap().unwrap();
        assert_eq!(neg.frequency, 0);
        let junk = parse_line("好\thao\tabc", 5, Partition::Chars).unwrap().unwrap();
        assert_eq!(junk.frequency, 0);
        assert!(matches!(
            parse_line("好", 6, Partition::Chars),
            Err(StoreError::Malformed { line: 6, .. })
        ));
    }

    #[test]
    fn load_dir_reads_present_tables() {
        let dir = std::env::temp_dir().join(format!("memory_store_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("chars.txt"), "我\two\t10\n# skip\n\n坏行\n").unwrap();
        fs::write(dir.join("base.txt"), "我们\two men\t7\n").unwrap();
        let s = MemoryStore::load_dir(&dir).unwrap();
        assert_eq!(s.partition_len(Partition::Chars), 1);
        assert_eq!(s.partition_len(Partition::Base), 1);
        assert_eq!(s.partition_len(Partition::Poetry), 0);
        let _ = fs::remove_dir_all(dir);
    }

    // Tables are rarely pre-sorted; a reversed table must come out in the
    // same order repeated inserts would give.
    #[test]
    fn extend_matches_insert_order() {
        let entries: Vec<DictionaryEntry> = (0..2000u32)
            .map(|i| DictionaryEntry::new(format!("w{}", i), "wo", i / 3, Partition::Base))
            .collect();
        let bulk = MemoryStore::from_entries(entries.clone());
        let mut one_by_one = MemoryStore::new();
        for e in entries {
            one_by_one.insert(e);
        }
        let all = StoreQuery::new(Partition::Base, Predicate::RomanizationPrefix("w".into()), usize::MAX);
        let bulk_words: Vec<String> = bulk.query(&all).unwrap().into_iter().map(|e| e.word).collect();
        let single_words: Vec<String> = one_by_one.query(&all).unwrap().into_iter().map(|e| e.word).collect();
        assert_eq!(bulk_words, single_words);
        assert_eq!(&bulk_words[..3], &["w1998", "w1999", "w1995"]);
    }

    #[test]
    fn table_loads_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("memory_store_filtered_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("base.txt"), "你	ni	1
您	nin	5
坏	ni hx	9
泥	ni	3
").unwrap();
        let s = MemoryStore::load_dir_with(&dir, |e| !e.romanization.contains("hx")).unwrap();
        let q = StoreQuery::new(Partition::Base, Predicate::RomanizationPrefix("ni".into()), 10);
        let words: Vec<String> = s.query(&q).unwrap().into_iter().map(|e| e.word).collect();
        assert_eq!(words, vec!["您", "泥", "你"]);

        let unfiltered = MemoryStore::load_dir(&dir).unwrap();
        assert_eq!(unfiltered.partition_len(Partition::Base), 4);
        let _ = fs::remove_dir_all(dir);
    }
}
