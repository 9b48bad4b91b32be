//! Frequency-ordered prefix index over spaceless romanization keys.
//!
//! Built once from the highest-traffic partitions and read-only afterwards.
//! Rebuilds never patch a live tree: a new `PrefixTrie` is built off to the
//! side and swapped into a `SharedTrie`, so readers only ever see a complete
//! tree.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::entry::{spaceless, DictionaryEntry, Partition};
use crate::store::{DictionaryStore, StoreError};

/// A word stored at a terminal node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieEntry {
    pub word: String,
    pub romanization: String,
    pub frequency: u32,
    pub partition: Partition,
}

impl TrieEntry {
    pub fn to_dictionary_entry(&self) -> DictionaryEntry {
        DictionaryEntry::new(
            self.word.clone(),
            self.romanization.clone(),
            self.frequency,
            self.partition,
        )
    }
}

/// A node of the prefix tree.
///
/// Words are kept only at terminal nodes so a hit never has to rebuild the
/// word from the root-to-node path. Homophones share a terminal node.
/// Children are ordered by key character, so a capped traversal visits the
/// same terminals for every tree built from the same entries.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TrieNode {
    children: BTreeMap<char, Box<TrieNode>>,
    is_end: bool,
    /// Highest frequency among `entries`.
    frequency: u32,
    entries: Vec<TrieEntry>,
}

impl TrieNode {
    fn new() -> Self {
        Self::default()
    }

    /// Depth-first collection of terminal descendants, stopping once `limit`
    /// accepted entries are gathered.
    fn collect<'a, F>(&'a self, out: &mut Vec<&'a TrieEntry>, limit: usize, accept: &F)
    where
        F: Fn(&TrieEntry) -> bool,
    {
        if out.len() >= limit {
            return;
        }
        if self.is_end {
            for e in &self.entries {
                if out.len() >= limit {
                    return;
                }
                if accept(e) {
                    out.push(e);
                }
            }
        }
        for child in self.children.values() {
            if out.len() >= limit {
                return;
            }
            child.collect(out, limit, accept);
        }
    }

    fn count_nodes(&self) -> usize {
        1 + self.children.values().map(|c| c.count_nodes()).sum::<usize>()
    }
}

/// Prefix index with load-state tracking.
///
/// # Example
/// ```
/// use candidate_core::trie::PrefixTrie;
///
/// let mut trie = PrefixTrie::new();
/// trie.insert_word("nihao", 10);
/// trie.insert_word("nihaoma", 3);
/// trie.mark_loaded();
///
/// let hits = trie.search("nih", 10);
/// assert_eq!(hits, vec![("nihao".to_string(), 10), ("nihaoma".to_string(), 3)]);
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PrefixTrie {
    root: TrieNode,
    loaded: bool,
    word_count: usize,
}

impl PrefixTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            loaded: false,
            word_count: 0,
        }
    }

    /// Insert a word keyed by itself.
    pub fn insert_word(&mut self, word: &str, frequency: u32) {
        self.insert_entry(TrieEntry {
            word: word.to_string(),
            romanization: word.to_string(),
            frequency,
            partition: Partition::Base,
        });
    }

    /// Insert a dictionary entry keyed by its spaceless romanization.
    pub fn insert(&mut self, entry: &DictionaryEntry) {
        self.insert_entry(TrieEntry {
            word: entry.word.clone(),
            romanization: entry.romanization.clone(),
            frequency: entry.frequency,
            partition: entry.partition,
        });
    }

    fn insert_entry(&mut self, entry: TrieEntry) {
        let key = spaceless(&entry.romanization);
        if key.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for ch in key.chars() {
            node = node
                .children
                .entry(ch)
                .or_insert_with(|| Box::new(TrieNode::new()));
        }
        node.is_end = true;
        node.frequency = node.frequency.max(entry.frequency);
        if let Some(existing) = node
            .entries
            .iter_mut()
            .find(|e| e.word == entry.word && e.partition == entry.partition)
        {
            existing.frequency = existing.frequency.max(entry.frequency);
            return;
        }
        node.entries.push(entry);
        self.word_count += 1;
    }

    fn find_node(&self, prefix: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for ch in prefix.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    /// Entries under `prefix`, frequency descending, at most `limit`.
    ///
    /// Collection is capped before sorting, so when more than `limit` words
    /// share the prefix the result is a capped sample, not the global top.
    pub fn search_entries(&self, prefix: &str, limit: usize) -> Vec<TrieEntry> {
        self.search_filtered(prefix, limit, |_| true)
    }

    /// Like `search_entries`, counting only entries accepted by `accept`
    /// toward the cap.
    pub fn search_filtered<F>(&self, prefix: &str, limit: usize, accept: F) -> Vec<TrieEntry>
    where
        F: Fn(&TrieEntry) -> bool,
    {
        if !self.loaded || limit == 0 || prefix.is_empty() {
            return Vec::new();
        }
        let Some(node) = self.find_node(prefix) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        node.collect(&mut found, limit, &accept);
        let mut out: Vec<TrieEntry> = found.into_iter().cloned().collect();
        out.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        out
    }

    /// `(word, frequency)` pairs under `prefix`, frequency descending.
    pub fn search(&self, prefix: &str, limit: usize) -> Vec<(String, u32)> {
        self.search_entries(prefix, limit)
            .into_iter()
            .map(|e| (e.word, e.frequency))
            .collect()
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::new();
        self.loaded = false;
        self.word_count = 0;
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn estimated_word_count(&self) -> usize {
        self.word_count
    }

    pub fn node_count(&self) -> usize {
        self.root.count_nodes()
    }

    /// Bulk-load the indexed partitions of `store` in batches of
    /// `batch_size` and mark the result loaded.
    pub fn build_from_store(store: &dyn DictionaryStore, batch_size: usize) -> Result<Self, StoreError> {
        Self::build_from_store_until(store, batch_size, || false)
    }

    /// Like `build_from_store`, checking `stop` before every batch.
    ///
    /// A stopped build comes back unloaded, so callers can tell it apart
    /// from a finished one with `is_loaded`.
    pub fn build_from_store_until<F>(
        store: &dyn DictionaryStore,
        batch_size: usize,
        stop: F,
    ) -> Result<Self, StoreError>
    where
        F: Fn() -> bool,
    {
        let batch_size = batch_size.max(1);
        let mut trie = Self::new();
        for partition in Partition::INDEXED {
            let mut source = store.bulk(partition)?;
            let mut batches = 0usize;
            loop {
                if stop() {
                    debug!(partition = %partition, batches, "prefix index build stopped");
                    return Ok(trie);
                }
                let batch: Vec<DictionaryEntry> = source.by_ref().take(batch_size).collect();
                if batch.is_empty() {
                    break;
                }
                for entry in &batch {
                    trie.insert(entry);
                }
                batches += 1;
            }
            debug!(partition = %partition, batches, "partition indexed");
        }
        trie.mark_loaded();
        info!(
            words = trie.estimated_word_count(),
            nodes = trie.node_count(),
            "prefix index built"
        );
        Ok(trie)
    }

    /// Save the tree as a bincode snapshot.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a snapshot written by `save_snapshot`.
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        let trie: Self = bincode::deserialize_from(BufReader::new(file))?;
        Ok(trie)
    }
}

/// Errors while reading or writing trie snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Swap-on-rebuild handle shared between the query path and the builder.
///
/// Readers take a cheap `Arc` clone and search without holding the lock.
#[derive(Debug, Clone, Default)]
pub struct SharedTrie {
    current: Arc<RwLock<Arc<PrefixTrie>>>,
}

impl SharedTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<PrefixTrie> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the whole tree at once.
    pub fn swap(&self, trie: PrefixTrie) {
        let next = Arc::new(trie);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PrefixTrie {
        let mut trie = PrefixTrie::new();
        trie.insert(&DictionaryEntry::new("你", "ni", 900, Partition::Chars));
        trie.insert(&DictionaryEntry::new("泥", "ni", 300, Partition::Chars));
        trie.insert(&DictionaryEntry::new("你好", "ni hao", 800, Partition::Base));
        trie.insert(&DictionaryEntry::new("你们", "ni men", 850, Partition::Base));
        trie.insert(&DictionaryEntry::new("西安", "xi an", 400, Partition::Base));
        trie.insert(&DictionaryEntry::new("先", "xian", 700, Partition::Chars));
        trie.mark_loaded();
        trie
    }

    #[test]
    fn unloaded_trie_returns_nothing() {
        let mut trie = PrefixTrie::new();
        trie.insert_word("nihao", 1);
        assert!(trie.search("ni", 10).is_empty());
        trie.mark_loaded();
        assert_eq!(trie.search("ni", 10).len(), 1);
    }

    #[test]
    fn results_are_frequency_descending() {
        let trie = sample();
        let hits = trie.search("ni", 10);
        assert_eq!(hits.len(), 4);
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert_eq!(hits[0].0, "你");
    }

    #[test]
    fn missing_link_is_empty() {
        let trie = sample();
        assert!(trie.search("nx", 10).is_empty());
        assert!(trie.search("", 10).is_empty());
    }

    #[test]
    fn limit_caps_collection() {
        let trie = sample();
        assert_eq!(trie.search("ni", 2).len(), 2);
        assert!(trie.search("ni", 0).is_empty());
    }

    #[test]
    fn homophones_share_a_key() {
        let trie = sample();
        let words: Vec<String> = trie.search("xian", 10).into_iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec!["先".to_string(), "西安".to_string()]);
        assert_eq!(trie.estimated_word_count(), 6);
    }

    #[test]
    fn filtered_search_counts_only_accepted() {
        let trie = sample();
        let chars = trie.search_filtered("ni", 2, |e| e.partition == Partition::Chars);
        assert_eq!(chars.len(), 2);
        assert!(chars.iter().all(|e| e.partition == Partition::Chars));
    }

    #[test]
    fn duplicate_insert_keeps_one_entry() {
        let mut trie = PrefixTrie::new();
        trie.insert(&DictionaryEntry::new("你", "ni", 5, Partition::Chars));
        trie.insert(&DictionaryEntry::new("你", "ni", 9, Partition::Chars));
        trie.mark_loaded();
        assert_eq!(trie.search("ni", 10), vec![("你".to_string(), 9)]);
        assert_eq!(trie.estimated_word_count(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let mut trie = sample();
        trie.clear();
        assert!(!trie.is_loaded());
        assert_eq!(trie.estimated_word_count(), 0);
        assert_eq!(trie.node_count(), 1);
    }

    #[test]
    fn builds_from_indexed_partitions_only() {
        use crate::store::MemoryStore;
        let store = MemoryStore::from_entries(vec![
            DictionaryEntry::new("你", "ni", 900, Partition::Chars),
            DictionaryEntry::new("你好", "ni hao", 800, Partition::Base),
            DictionaryEntry::new("倪瓒", "ni zan", 50, Partition::People),
        ]);
        let trie = PrefixTrie::build_from_store(&store, 1).unwrap();
        assert!(trie.is_loaded());
        assert_eq!(trie.estimated_word_count(), 2);
        assert!(trie.search("niz", 10).is_empty());
    }

    // Many words under one prefix with equal frequency: the capped sample
    // must be the same for every build and for a snapshot of it.
    #[test]
    fn capped_search_is_stable_across_builds() {
        use crate::store::MemoryStore;
        let entries: Vec<DictionaryEntry> = (0..40)
            .map(|i| {
                let rom = ["ni hao", "ni men", "ni", "nian", "niu"][i % 5];
                DictionaryEntry::new(format!("词{}", i), rom, 100, Partition::Base)
            })
            .collect();
        let store = MemoryStore::from_entries(entries);
        let first = PrefixTrie::build_from_store(&store, 7).unwrap();
        let expected = first.search("ni", 5);
        assert_eq!(expected.len(), 5);
        for batch in [1, 3, 40] {
            let again = PrefixTrie::build_from_store(&store, batch).unwrap();
            assert_eq!(again.search("ni", 5), expected);
        }

        let tmp = std::env::temp_dir().join(format!("prefix_trie_stable_{}.bin", std::process::id()));
        first.save_snapshot(&tmp).unwrap();
        let loaded = PrefixTrie::load_snapshot(&tmp).unwrap();
        assert_eq!(loaded.search("ni", 5), expected);
        let _ = std::fs::remove_file(tmp);

        // Key order: "ni" sorts before "nian", "nihao", "nimen", "niu".
        assert!(expected.iter().all(|(w, _)| ["词2", "词7", "词12", "词17", "词22"].contains(&w.as_str())));
    }

    #[test]
    fn stopped_build_comes_back_unloaded() {
        use crate::store::MemoryStore;
        use std::cell::Cell;
        let store = MemoryStore::from_entries(vec![
            DictionaryEntry::new("你", "ni", 900, Partition::Chars),
            DictionaryEntry::new("泥", "ni", 300, Partition::Chars),
            DictionaryEntry::new("你好", "ni hao", 800, Partition::Base),
        ]);
        let trie = PrefixTrie::build_from_store_until(&store, 1, || true).unwrap();
        assert!(!trie.is_loaded());
        assert!(trie.search("ni", 10).is_empty());

        // Stop after the first batch.
        let checks = Cell::new(0);
        let trie = PrefixTrie::build_from_store_until(&store, 1, || {
            checks.set(checks.get() + 1);
            checks.get() > 1
        })
        .unwrap();
        assert!(!trie.is_loaded());
        assert_eq!(trie.estimated_word_count(), 1);
    }

    #[test]
    fn snapshot_roundtrip() {
        let tmp = std::env::temp_dir().join(format!("prefix_trie_{}.bin", std::process::id()));
        let trie = sample();
        trie.save_snapshot(&tmp).unwrap();
        let loaded = PrefixTrie::load_snapshot(&tmp).unwrap();
        assert!(loaded.is_loaded());
        assert_eq!(loaded.search("ni", 10), trie.search("ni", 10));
        let _ = std::fs::remove_file(tmp);
    }

    #[test]
    fn shared_trie_swaps_whole_tree() {
        let shared = SharedTrie::new();
        assert!(!shared.is_loaded());
        let before = shared.snapshot();
        shared.swap(sample());
        assert!(shared.is_loaded());
        assert!(!before.is_loaded());
        assert_eq!(shared.snapshot().search("ni", 1).len(), 1);
    }
}
