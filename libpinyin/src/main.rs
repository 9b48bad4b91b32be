use anyhow::{Context, Result};
use clap::Parser;
use pinyin_staged::{Engine, PinyinConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Interactive candidate generation: one input per stdin line.
#[derive(Parser)]
#[command(name = "pinyin-staged", version)]
struct Args {
    /// Directory with `<partition>.txt` tables
    #[arg(long, default_value = "data")]
    data: PathBuf,

    /// TOML configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prebuilt prefix-index snapshot
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Candidates per input
    #[arg(long)]
    limit: Option<usize>,

    /// Print the debug trace as JSON instead of the candidate list
    #[arg(long)]
    explain: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PinyinConfig::load_toml(path)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PinyinConfig::default(),
    };
    config.data_dir = args.data.clone();
    if args.snapshot.is_some() {
        config.trie_snapshot = args.snapshot.clone();
    }
    let limit = args.limit.unwrap_or(config.default_limit);

    let engine = Engine::from_config(&config)
        .with_context(|| format!("opening dictionary at {}", config.data_dir.display()))?;
    let loaded = engine.wait_for_index();
    info!(loaded, "ready");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if args.explain {
            let explanation = engine.explain(input, limit);
            let json = explanation.debug.to_json().context("encoding debug info")?;
            writeln!(out, "{}", json)?;
            continue;
        }
        let candidates = engine.generate_candidates(input, limit);
        if candidates.is_empty() {
            writeln!(out, "{}: (no candidates)", input)?;
            continue;
        }
        let rendered: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}.{}({})", i + 1, c.text, c.frequency))
            .collect();
        writeln!(out, "{}: {}", input, rendered.join(" "))?;
    }
    Ok(())
}
