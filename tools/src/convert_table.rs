use anyhow::{Context, Result, bail};
use candidate_core::{DictionaryEntry, Partition};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read a raw phrase table and write it as `<partition>.txt` under `out_dir`.
///
/// Raw lines are `romanization word [...] frequency`, tab or whitespace
/// separated. Syllables in the romanization may be joined with `'` (`ni'hao`).
/// A word listed twice under the same romanization keeps its highest count.
pub fn run(inputs: &[PathBuf], partition: Partition, out_dir: &Path) -> Result<usize> {
    let mut merged: HashMap<(String, String), u32> = HashMap::new();
    for input in inputs {
        let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
        let mut skipped = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line?;
            match parse_raw(&line) {
                Some((word, romanization, freq)) => {
                    let slot = merged.entry((word, romanization)).or_insert(0);
                    *slot = (*slot).max(freq);
                }
                None if line.trim().is_empty() || line.starts_with('#') => {}
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(input = %input.display(), skipped, "unparsable lines skipped");
        }
    }
    if merged.is_empty() {
        bail!("no entries found in {} input file(s)", inputs.len());
    }

    let mut entries: Vec<DictionaryEntry> = merged
        .into_iter()
        .map(|((word, romanization), freq)| DictionaryEntry::new(word, romanization, freq, partition))
        .collect();
    entries.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.word.cmp(&b.word)));

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{}.txt", partition.as_str()));
    let mut out = BufWriter::new(File::create(&path).with_context(|| format!("creating {}", path.display()))?);
    writeln!(out, "# {} table: word<TAB>romanization<TAB>frequency", partition)?;
    for e in &entries {
        writeln!(out, "{}\t{}\t{}", e.word, e.romanization, e.frequency)?;
    }
    out.flush()?;
    Ok(entries.len())
}

fn parse_raw(line: &str) -> Option<(String, String, u32)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let parts: Vec<&str> = if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    };
    if parts.len() < 2 {
        return None;
    }
    let romanization = parts[0]
        .split(['\'', ' '])
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    let word = parts[1].to_string();
    if romanization.is_empty() || word.is_empty() {
        return None;
    }
    let freq = if parts.len() > 2 {
        parts.last().and_then(|s| s.parse::<u32>().ok()).unwrap_or(1)
    } else {
        1
    };
    Some((word, romanization, freq))
}
