use anyhow::{Result, anyhow};
use candidate_core::Partition;
use clap::{Parser, Subcommand};
use dict_tools::{convert_table, index};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dict-tools", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert raw phrase tables into a `<partition>.txt` table
    Convert {
        #[arg(long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,
        /// Target partition, e.g. `base` or `place`
        #[arg(long)]
        partition: String,
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },
    /// Build the prefix index from a data directory and write a snapshot
    BuildIndex {
        #[arg(long, default_value = "data")]
        data: PathBuf,
        #[arg(long, default_value = "prefix.index")]
        out: PathBuf,
        #[arg(long, default_value_t = 2000)]
        batch_size: usize,
    },
    /// Prefix search against a snapshot
    InspectIndex {
        #[arg(long, default_value = "prefix.index")]
        snapshot: PathBuf,
        key: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Entry counts per partition
    Stats {
        #[arg(long, default_value = "data")]
        data: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Convert {
            inputs,
            partition,
            out_dir,
        } => {
            let partition: Partition = partition.parse().map_err(|e: String| anyhow!(e))?;
            let written = convert_table::run(&inputs, partition, &out_dir)?;
            println!("Wrote {} entries to {}/{}.txt", written, out_dir.display(), partition);
        }
        Command::BuildIndex { data, out, batch_size } => {
            let summary = index::build(&data, &out, batch_size)?;
            println!(
                "Wrote {} ({} words, {} nodes)",
                out.display(),
                summary.words,
                summary.nodes
            );
        }
        Command::InspectIndex {
            snapshot,
            key,
            limit,
            json,
        } => {
            let hits = index::inspect(&snapshot, &key, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("{}: no entries", key);
            } else {
                for h in hits {
                    println!("{}\t{}\t{}\t{}", h.word, h.romanization, h.frequency, h.partition);
                }
            }
        }
        Command::Stats { data } => {
            let stats = index::stats(&data)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
