use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use nortek::{decode_file, DataStore, DecodeOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a log and print its configuration and a data summary as JSON
    Info {
        /// Input Vector/AWAC log file
        input: String,

        /// Skip checksum verification (salvage mode)
        #[arg(long)]
        no_checksums: bool,

        /// Stop after this many samples
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
struct Info {
    config: nortek::Config,
    samples: usize,
    truncated: bool,
    resyncs: usize,
    start: Option<String>,
    end: Option<String>,
}

fn timestamp(secs: f64) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    chrono::DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.naive_utc().to_string())
}

fn time_span(data: &DataStore) -> (Option<String>, Option<String>) {
    let time = match data {
        DataStore::Vector(s) => &s.time,
        DataStore::Awac(s) => &s.time,
    };
    let mut valid = time.iter().copied().filter(|t| t.is_finite());
    let start = valid.next();
    let end = valid.last().or(start);
    (
        start.and_then(timestamp),
        end.and_then(timestamp),
    )
}

fn do_info(input: &str, no_checksums: bool, limit: Option<usize>) -> anyhow::Result<()> {
    let opts = DecodeOptions::builder()
        .enforce_checksums(!no_checksums)
        .record_limit(limit)
        .build();
    let decoded = decode_file(input, &opts).with_context(|| format!("decoding {input}"))?;
    let (start, end) = time_span(&decoded.data);
    let info = Info {
        samples: decoded.data.len(),
        truncated: decoded.truncated,
        resyncs: decoded.resyncs,
        start,
        end,
        config: decoded.config,
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Info {
            input,
            no_checksums,
            limit,
        } => do_info(input, *no_checksums, *limit),
    }
}
