use anyhow::{Context, Result, bail};
use candidate_core::{MemoryStore, Partition, PrefixTrie, spaceless};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct IndexSummary {
    pub words: usize,
    pub nodes: usize,
}

/// Build the prefix index from the tables in `data_dir` and snapshot it.
pub fn build(data_dir: &Path, out: &Path, batch_size: usize) -> Result<IndexSummary> {
    let store = MemoryStore::load_dir(data_dir)
        .with_context(|| format!("loading tables from {}", data_dir.display()))?;
    if Partition::INDEXED.iter().all(|p| store.partition_len(*p) == 0) {
        bail!("no chars or base table in {}", data_dir.display());
    }
    let trie = PrefixTrie::build_from_store(&store, batch_size)?;
    trie.save_snapshot(out)
        .with_context(|| format!("writing snapshot {}", out.display()))?;
    Ok(IndexSummary {
        words: trie.estimated_word_count(),
        nodes: trie.node_count(),
    })
}

#[derive(Debug, Serialize)]
pub struct Hit {
    pub word: String,
    pub romanization: String,
    pub frequency: u32,
    pub partition: Partition,
}

/// Prefix search against a snapshot. `key` may contain syllable spaces.
pub fn inspect(snapshot: &Path, key: &str, limit: usize) -> Result<Vec<Hit>> {
    let trie = PrefixTrie::load_snapshot(snapshot)
        .with_context(|| format!("reading snapshot {}", snapshot.display()))?;
    let key = spaceless(&key.to_lowercase());
    Ok(trie
        .search_entries(&key, limit)
        .into_iter()
        .map(|e| Hit {
            word: e.word,
            romanization: e.romanization,
            frequency: e.frequency,
            partition: e.partition,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct TableStats {
    pub partition: Partition,
    pub entries: usize,
}

pub fn stats(data_dir: &Path) -> Result<Vec<TableStats>> {
    let store = MemoryStore::load_dir(data_dir)
        .with_context(|| format!("loading tables from {}", data_dir.display()))?;
    Ok(Partition::ALL
        .iter()
        .map(|&partition| TableStats {
            partition,
            entries: store.partition_len(partition),
        })
        .collect())
}
