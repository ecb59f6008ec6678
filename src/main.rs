use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use room_tracker_rs::io::{read_master_index, write_timeline_file};
use room_tracker_rs::pipeline::{load_dataset, locate_all, RunSummary};
use room_tracker_rs::{CorrectionPattern, LocatorConfig, Timestamp};

#[derive(Parser, Debug)]
#[command(name = "room_tracker")]
#[command(about = "Infer per-person room timelines from mote proximity logs", long_about = None)]
struct Args {
    /// CSV index of `receiver_id,log_file` rows
    #[arg(long, default_value = "./data/p2pmasterfile.csv")]
    master: PathBuf,

    /// Output path prefix; the receiver id is appended per file
    #[arg(long, default_value = "./location_A12/location_node-")]
    output_stub: String,

    /// JSON config file (kernel, patterns, thresholds)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detection threshold in mW
    #[arg(long)]
    threshold: Option<f64>,

    /// First processed timestamp
    #[arg(long)]
    start: Option<Timestamp>,

    /// End of processed range (exclusive)
    #[arg(long)]
    end: Option<Timestamp>,

    /// Flicker pattern in A/B notation, e.g. ABAA (repeatable, replaces config patterns)
    #[arg(long = "pattern")]
    patterns: Vec<CorrectionPattern>,

    /// Worker threads (0 = one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Write the run summary JSON here instead of stdout
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl Args {
    fn resolve_config(&self) -> Result<LocatorConfig> {
        let mut config = match self.config.as_ref() {
            Some(path) => LocatorConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => LocatorConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.threshold_mw = threshold;
        }
        if let Some(start) = self.start {
            config.time_range.start = start;
        }
        if let Some(end) = self.end {
            config.time_range.end = end;
        }
        if !self.patterns.is_empty() {
            config.patterns = self.patterns.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.resolve_config()?;

    info!(
        "Room tracker starting: t={}..{}, threshold {:e} mW, {} patterns",
        config.time_range.start,
        config.time_range.end,
        config.threshold_mw,
        config.patterns.len()
    );

    let index = read_master_index(&args.master)
        .with_context(|| format!("reading master index {}", args.master.display()))?;
    let (dataset, reports) = load_dataset(&index, config.mobile_id_cutoff)?;
    info!("Loaded {} receivers", dataset.len());

    let results = locate_all(&dataset, &config, &reports)?;
    for result in &results {
        let path = write_timeline_file(&args.output_stub, result.receiver, &result.sequence)
            .with_context(|| format!("writing timeline for mote {}", result.receiver))?;
        info!("Wrote {}", path.display());
    }

    let summary = serde_json::to_string_pretty(&RunSummary::new(&config, &results))?;
    match args.summary.as_ref() {
        Some(path) => std::fs::write(path, summary)?,
        None => println!("{}", summary),
    }
    Ok(())
}
