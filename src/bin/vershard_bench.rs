//! Benchmark harness: spawn coordinators over shared partitions, run a
//! random workload for a fixed duration, and dump the counters as CSV.
//!
//! ```bash
//! vershard-bench --partitions 2 --coordinators 4 --objects 10000 \
//!     --txn-size 0.001 --write-ratio 0.1 --duration-ms 10000
//! ```

use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vershard::{
    Coordinator, CoordinatorConfig, CoordinatorSnapshot, Directory, Partition, PartitionSnapshot,
    Result, WorkloadConfig, WorkloadGenerator,
};

/// Simulation harness for the vershard admission engine.
#[derive(Debug, Parser)]
#[command(name = "vershard-bench", version, about)]
struct Args {
    /// Number of partitions.
    #[arg(long, default_value_t = 2)]
    partitions: u32,

    /// Number of coordinators (one worker thread each).
    #[arg(long, default_value_t = 1)]
    coordinators: u32,

    /// Objects seeded per partition.
    #[arg(long, default_value_t = 10_000)]
    objects: usize,

    /// Fraction of known objects each transaction touches.
    #[arg(long, default_value_t = 0.001)]
    txn_size: f64,

    /// Fraction of touched objects upgraded to writes.
    #[arg(long, default_value_t = 0.1)]
    write_ratio: f64,

    /// Submit prepares to touched partitions concurrently.
    #[arg(long, default_value_t = false)]
    concurrent: bool,

    /// Workload RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// How long to run the simulation, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    duration_ms: u64,

    /// Output file for partition counters.
    #[arg(long, default_value = "partitions.csv")]
    partition_csv: PathBuf,

    /// Output file for coordinator counters.
    #[arg(long, default_value = "coordinators.csv")]
    coordinator_csv: PathBuf,

    /// Also print the counters to stdout.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let (partition_snaps, coordinator_snaps) = run(&args)?;

    write_csv(
        &args.partition_csv,
        PartitionSnapshot::csv_header(),
        partition_snaps.iter().map(|s| s.csv_row()),
    )?;
    write_csv(
        &args.coordinator_csv,
        CoordinatorSnapshot::csv_header(),
        coordinator_snaps.iter().map(|s| s.csv_row()),
    )?;

    if args.verbose {
        for snap in &partition_snaps {
            println!("{}", serde_json::to_string(snap).unwrap_or_default());
        }
        for snap in &coordinator_snaps {
            println!("{}", serde_json::to_string(snap).unwrap_or_default());
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<(Vec<PartitionSnapshot>, Vec<CoordinatorSnapshot>)> {
    let workload = WorkloadConfig {
        txn_size: args.txn_size,
        write_ratio: args.write_ratio,
        seed: args.seed,
    };
    workload.validate()?;
    if args.partitions == 0 || args.coordinators == 0 {
        return Err(vershard::Error::Config(
            "need at least one partition and one coordinator".into(),
        ));
    }

    let partitions: Vec<Arc<Partition>> = (0..args.partitions)
        .map(|i| Arc::new(Partition::new(i)))
        .collect();
    let directory = Arc::new(Directory::new());
    let policy = if args.concurrent {
        CoordinatorConfig::concurrent()
    } else {
        CoordinatorConfig::sequential()
    };

    let stop = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::new();
    let mut coordinators = Vec::new();

    for wid in 0..args.coordinators {
        let coordinator = Arc::new(Coordinator::new(wid, policy));
        let mut generator = WorkloadGenerator::new(
            wid as u64,
            partitions.clone(),
            Arc::clone(&directory),
            Arc::clone(coordinator.cache()),
            workload,
        )?;
        coordinators.push(Arc::clone(&coordinator));

        let seed_txn = generator.seed_txn(args.objects);
        coordinator.execute(&seed_txn);

        let stop = Arc::clone(&stop);
        workers.push(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let txn = generator.next_txn();
                coordinator.execute(&txn);
            }
        }));
    }

    tracing::info!(
        partitions = args.partitions,
        coordinators = args.coordinators,
        duration_ms = args.duration_ms,
        "simulation running"
    );
    thread::sleep(Duration::from_millis(args.duration_ms));
    stop.store(true, Ordering::Relaxed);
    for worker in workers {
        let _ = worker.join();
    }

    Ok((
        partitions.iter().map(|p| p.snapshot()).collect(),
        coordinators.iter().map(|c| c.snapshot()).collect(),
    ))
}

fn write_csv(
    path: &PathBuf,
    header: &str,
    rows: impl Iterator<Item = String>,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{header}")?;
    for row in rows {
        writeln!(out, "{row}")?;
    }
    Ok(())
}
