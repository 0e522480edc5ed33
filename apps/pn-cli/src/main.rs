use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use pn_engine::ReactorProbe;
use pn_mixer::MixingEngine;
use pn_network::{NetworkError, NetworkResult, PlumeModel, RunConfig, reactor_name};
use pn_store::TimeSeriesStore;
use pn_topology::{AdjacencyMatrix, grid, linear_expansion, simple};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pn-cli")]
#[command(about = "plumenet CLI - exhaust plume reactor-network driver", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Topology {
    Simple,
    Grid,
    Linear,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a network and integrate it
    Run {
        #[arg(long, value_enum, default_value = "simple")]
        topology: Topology,
        /// Exhaust reactor count for the linear topology (triangular number)
        #[arg(long, default_value_t = 10)]
        n: usize,
        #[arg(long, default_value_t = 2)]
        rows: usize,
        #[arg(long, default_value_t = 3)]
        cols: usize,
        /// Path to the run configuration YAML
        #[arg(long)]
        config: PathBuf,
        /// Start time in seconds
        #[arg(long, default_value_t = 0.0)]
        t0: f64,
        /// End time in seconds
        #[arg(long, default_value_t = 1.0)]
        t1: f64,
        /// Sample interval in seconds
        #[arg(long, default_value_t = 0.01)]
        dt: f64,
        /// Integrate to steady state instead of the time range
        #[arg(long)]
        steady: bool,
        /// Continue an existing store instead of replacing it
        #[arg(long)]
        resume: bool,
    },
    /// Print one stored series as CSV
    Series {
        /// Path to the store file
        store: PathBuf,
        /// Reactor group, e.g. combustor or exhaust_3
        group: String,
        /// Component inside the group, e.g. temperature or CO2
        element: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarize a store file
    Info {
        /// Path to the store file
        store: PathBuf,
    },
}

fn main() -> NetworkResult<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            topology,
            n,
            rows,
            cols,
            config,
            t0,
            t1,
            dt,
            steady,
            resume,
        } => {
            let matrix = match topology {
                Topology::Simple => simple(),
                Topology::Grid => grid(rows, cols)?,
                Topology::Linear => linear_expansion(n)?,
            };
            cmd_run(matrix, &config, TimeSpan { t0, t1, dt }, steady, resume)
        }
        Commands::Series {
            store,
            group,
            element,
            output,
        } => cmd_series(&store, &group, &element, output.as_deref()),
        Commands::Info { store } => cmd_info(&store),
    }
}

struct TimeSpan {
    t0: f64,
    t1: f64,
    dt: f64,
}

impl TimeSpan {
    /// Times to advance to from `now`: `t0` when it lies ahead, then every
    /// `dt` up to `t1`, the last step clipped to `t1`.
    fn sample_times(&self, now: f64) -> Vec<f64> {
        let mut times = Vec::new();
        if self.t0 > now && self.t0 <= self.t1 {
            times.push(self.t0);
        }
        let from = self.t0.max(now);
        let steps = ((self.t1 - from) / self.dt).ceil().max(0.0) as usize;
        times.extend((1..=steps).map(|i| (from + i as f64 * self.dt).min(self.t1)));
        times
    }
}

fn cmd_run(
    matrix: AdjacencyMatrix,
    config_path: &Path,
    span: TimeSpan,
    steady: bool,
    resume: bool,
) -> NetworkResult<()> {
    let config = RunConfig::load(config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let reactors = matrix.reactor_count();

    let engine = MixingEngine::new(config.engine.clone());
    let mut model = PlumeModel::new(engine, matrix, config.schedules()?)?;
    model.build_network(&config.mechanisms, &config.resolver(base_dir))?;

    if let Some(store) = &config.store {
        let path = if store.path.is_relative() {
            base_dir.join(&store.path)
        } else {
            store.path.clone()
        };
        if resume && path.is_file() {
            model.resume_store(&path)?;
        } else {
            model.attach_store(&path, store.chunk, store.record_initial)?;
        }
    }

    let start = Instant::now();
    if steady {
        println!("Integrating to steady state...");
        model.advance_to_steady_state()?;
    } else {
        if !(span.dt.is_finite() && span.dt > 0.0) {
            return Err(NetworkError::Config {
                what: format!("--dt must be positive, got {}", span.dt),
            });
        }
        let samples = span.sample_times(model.time());
        println!(
            "Integrating {} reactors from t={} to t={} ({} samples)...",
            reactors,
            model.time(),
            span.t1,
            samples.len()
        );
        for t in samples {
            model.advance(t)?;
        }
    }
    info!(elapsed_s = start.elapsed().as_secs_f64(), t = model.time(), "run finished");

    println!("\n=== State at t = {:.6} s ===", model.time());
    println!("{:<14} {:>14} {:>14}", "reactor", "mass [kg]", "T [K]");
    for index in 0..reactors {
        let Some(id) = model.builder().matrix_reactor(index) else {
            continue;
        };
        if let Some(snap) = model.engine().snapshot(id) {
            println!(
                "{:<14} {:>14.6e} {:>14.3}",
                reactor_name(index),
                snap.mass,
                snap.temperature
            );
        }
    }
    if let Some(store) = model.store() {
        println!(
            "\n✓ {} samples in {}",
            store.series_len(),
            store.path().display()
        );
    }
    Ok(())
}

fn cmd_series(store: &Path, group: &str, element: &str, output: Option<&Path>) -> NetworkResult<()> {
    let store = TimeSeriesStore::open_read_only(store)?;
    let (times, values) = store.retrieve_by_name(group, element)?;

    let mut csv = String::from("time_s,value\n");
    for (t, v) in times.iter().zip(&values) {
        csv.push_str(&format!("{},{}\n", t, v));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!("✓ Exported {} data points to {}", times.len(), path.display());
    } else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(csv.as_bytes())?;
    }
    Ok(())
}

fn cmd_info(path: &Path) -> NetworkResult<()> {
    let store = TimeSeriesStore::open_read_only(path)?;
    println!("Store: {}", path.display());
    println!("  samples:  {}", store.series_len());
    println!("  capacity: {} (chunk {})", store.capacity(), store.chunk());
    if let Some(t) = store.last_time()? {
        println!("  last t:   {}", t);
    }
    println!("  groups:");
    for (group, slice) in store.groups().iter().zip(store.schema().slices()) {
        println!("    {:<14} {} components", group, slice.len());
    }
    Ok(())
}
