//! driftscan: stream a detector hit file through the incremental DBSCAN
//! engine, optionally checking the result against the batch reference and
//! exporting finalized clusters as JSON Lines.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use driftscan_core::{batch, CompletedCluster, DbscanConfig, IncrementalDbscan, CLUSTER_NOISE};

mod input;
use input::{read_points, Point};

/// Sampling clock of the raw timestamps (Hz). Tick counts are divided by
/// 100 on input, so one engine time unit spans 100 ticks.
const CLOCK_HZ: f64 = 50e6;
const TICKS_PER_TIME_UNIT: f64 = 100.0;

#[derive(Parser, Debug)]
#[command(name = "driftscan")]
#[command(version)]
#[command(about = "Incremental DBSCAN over time-ordered detector hits", long_about = None)]
struct Args {
    /// Input file of hits (`channel time_ticks` per line)
    #[arg(short, long)]
    file: PathBuf,

    /// Number of hits at the start of the file to skip
    #[arg(short = 's', long, default_value_t = 0)]
    nskip: usize,

    /// Maximum number of hits to read from the file
    #[arg(short = 'n', long)]
    nhits: Option<usize>,

    /// Minimum number of hits to form a cluster
    #[arg(short = 'm', long, default_value_t = driftscan_core::DEFAULT_MIN_PTS)]
    minpts: usize,

    /// Distance threshold for hits to be neighbours
    #[arg(short = 'd', long, default_value_t = driftscan_core::DEFAULT_EPS)]
    distance: f64,

    /// Compare the streamed result against the batch reference
    #[arg(short, long)]
    test: bool,

    /// Write finalized clusters as JSON Lines to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a throughput profile of the streaming pass
    #[arg(short, long)]
    profile: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let config = DbscanConfig::new(args.distance, args.minpts);
    config.validate().context("invalid clustering parameters")?;

    log::info!("reading hits from {}", args.file.display());
    let mut points = read_points(&args.file, args.nskip, args.nhits)?;
    if points.is_empty() {
        bail!("no hits read from {}", args.file.display());
    }
    // The engine requires time order; sorting here also aligns the stream
    // with the batch reference for comparison.
    points.sort_by(|a, b| a.time.total_cmp(&b.time));
    log::info!("streaming {} hits", points.len());

    let oracle_labels = if args.test {
        let raw: Vec<(f64, i32)> = points.iter().map(|p| (p.time, p.chan)).collect();
        log::info!("running batch reference over {} hits", raw.len());
        Some(batch::dbscan_batch(&raw, args.distance, args.minpts))
    } else {
        None
    };

    let mut engine = IncrementalDbscan::new(config);
    let mut clusters: Vec<CompletedCluster> = Vec::new();
    let started = Instant::now();
    let mut window_started = started;
    for (i, point) in points.iter().enumerate() {
        engine.ingest_point(point.time, point.chan)?;
        engine.trim();
        clusters.extend(engine.drain());
        if (i + 1) % 100_000 == 0 {
            let now = Instant::now();
            log::info!(
                "100k hits took {:.3}s",
                (now - window_started).as_secs_f64()
            );
            window_started = now;
        }
    }
    engine.flush();
    clusters.extend(engine.drain());
    let elapsed = started.elapsed().as_secs_f64();

    println!("found {} clusters from {} hits", clusters.len(), points.len());

    if args.profile {
        let span_units = points[points.len() - 1].time - points[0].time;
        let data_time = span_units * TICKS_PER_TIME_UNIT / CLOCK_HZ;
        println!(
            "processed {:.3}s of data in {:.3}s (ratio {:.1})",
            data_time,
            elapsed,
            data_time / elapsed
        );
        println!("{}", engine.stats());
    }

    if let Some(path) = &args.output {
        write_clusters(path, &clusters)?;
        log::info!("wrote {} clusters to {}", clusters.len(), path.display());
    }

    if let Some(labels) = oracle_labels {
        if partitions_match(&points, &labels, &clusters) {
            println!("incremental and batch results matched");
        } else {
            bail!("incremental and batch results differed");
        }
    }

    Ok(())
}

fn write_clusters(path: &Path, clusters: &[CompletedCluster]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for cluster in clusters {
        serde_json::to_writer(&mut writer, cluster)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Compare the engine's partition with the oracle labels up to cluster
/// renumbering. Oracle noise must correspond to hits absent from every
/// emitted cluster.
fn partitions_match(points: &[Point], labels: &[i32], clusters: &[CompletedCluster]) -> bool {
    let mut engine_label: HashMap<(u64, i32), i32> = HashMap::new();
    for cluster in clusters {
        for hit in &cluster.hits {
            engine_label.insert((hit.time.to_bits(), hit.chan), cluster.index);
        }
    }

    let mut oracle_to_engine: HashMap<i32, i32> = HashMap::new();
    let mut engine_to_oracle: HashMap<i32, i32> = HashMap::new();
    let mut matched = true;
    for (point, &oracle) in points.iter().zip(labels) {
        let engine = engine_label
            .get(&(point.time.to_bits(), point.chan))
            .copied();
        let ok = match (oracle, engine) {
            (CLUSTER_NOISE, None) => true,
            (CLUSTER_NOISE, Some(_)) | (_, None) => false,
            (o, Some(e)) => {
                *oracle_to_engine.entry(o).or_insert(e) == e
                    && *engine_to_oracle.entry(e).or_insert(o) == o
            }
        };
        if !ok {
            log::warn!(
                "hit ({}, {}) disagrees: oracle {:?}, engine {:?}",
                point.time,
                point.chan,
                oracle,
                engine
            );
            matched = false;
        }
    }
    matched
}
