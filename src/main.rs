//! POPNET - CLI entry point
//!
//! Population-coded neural network simulator with runtime plasticity.

use clap::{Parser, Subcommand};
use popnet::checkpoint::Checkpoint;
use popnet::control::InputUnit;
use popnet::stats::StatsHistory;
use popnet::{benchmark, Config, EngineCommand, EngineHandle, PlasticityEngine, Topology};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "popnet")]
#[command(version)]
#[command(about = "Population-coded neural network simulator with runtime plasticity")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from topology files
    Run {
        /// Connectivity matrix file (CSV, entries in {-1, 0, 1})
        connectivity: PathBuf,

        /// Weight matrix file (CSV)
        weights: PathBuf,

        /// Threshold vector file (one value per line)
        thresholds: PathBuf,

        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of cycles to run
        #[arg(long, default_value = "10000")]
        cycles: u64,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,

        /// Enable the configured plasticity rule from the start
        #[arg(long)]
        learning: bool,

        /// Enable output clamping from the start
        #[arg(long)]
        clamp: bool,

        /// Enable the homeostatic rule from the start
        #[arg(long)]
        homeostasis: bool,

        /// Enable periodic input randomization from the start
        #[arg(long)]
        random_input: bool,

        /// Initial value for the first input unit
        #[arg(long)]
        input_one: Option<f32>,

        /// Initial value for the second input unit
        #[arg(long)]
        input_two: Option<f32>,
    },

    /// Resume a simulation from a checkpoint
    Resume {
        /// Checkpoint file to resume from
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Number of additional cycles
        #[arg(long, default_value = "10000")]
        cycles: u64,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Generate a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Generate random topology input files
    GenTopology {
        /// Number of neurons
        #[arg(short, long, default_value = "276")]
        neurons: usize,

        /// Connection probability
        #[arg(short, long, default_value = "0.3")]
        density: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output directory
        #[arg(short, long, default_value = "topology")]
        output: PathBuf,
    },

    /// Report the structure of topology input files
    Inspect {
        /// Connectivity matrix file
        connectivity: PathBuf,

        /// Weight matrix file
        weights: PathBuf,

        /// Threshold vector file
        thresholds: PathBuf,

        /// Number of neurons the files must describe
        #[arg(short, long, default_value = "276")]
        neurons: usize,
    },

    /// Run a performance benchmark
    Benchmark {
        /// Number of cycles
        #[arg(long, default_value = "1000")]
        cycles: u64,

        /// Number of neurons
        #[arg(short, long, default_value = "276")]
        neurons: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            connectivity,
            weights,
            thresholds,
            config,
            cycles,
            seed,
            output,
            quiet,
            learning,
            clamp,
            homeostasis,
            random_input,
            input_one,
            input_two,
        } => {
            let initial = InitialControls {
                learning,
                clamp,
                homeostasis,
                random_input,
                input_one,
                input_two,
            };
            run_simulation(
                connectivity,
                weights,
                thresholds,
                config,
                cycles,
                seed,
                output,
                quiet,
                initial,
            )
        }

        Commands::Resume {
            checkpoint,
            cycles,
            output,
            quiet,
        } => resume_simulation(checkpoint, cycles, output, quiet),

        Commands::Init { output } => generate_config(output),

        Commands::GenTopology {
            neurons,
            density,
            seed,
            output,
        } => generate_topology(neurons, density, seed, output),

        Commands::Inspect {
            connectivity,
            weights,
            thresholds,
            neurons,
        } => inspect_topology(connectivity, weights, thresholds, neurons),

        Commands::Benchmark { cycles, neurons } => run_benchmark(cycles, neurons),
    }
}

/// Initial flag and input values applied right after spawn
struct InitialControls {
    learning: bool,
    clamp: bool,
    homeostasis: bool,
    random_input: bool,
    input_one: Option<f32>,
    input_two: Option<f32>,
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init()
        .ok();
}

#[allow(clippy::too_many_arguments)]
fn run_simulation(
    connectivity: PathBuf,
    weights: PathBuf,
    thresholds: PathBuf,
    config_path: PathBuf,
    cycles: u64,
    seed: Option<u64>,
    output: PathBuf,
    quiet: bool,
    initial: InitialControls,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let mut config = if config_path.exists() {
        println!("Loading config from: {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        println!("Using default configuration");
        Config::default()
    };
    init_logging(&config.logging.log_level);

    let seed = seed.unwrap_or_else(rand::random);
    println!("Using seed: {}", seed);

    let topology = Topology::load(
        &connectivity,
        &weights,
        &thresholds,
        config.network.n_neurons,
    )?;
    let (excitatory, inhibitory) = topology.connection_counts();

    std::fs::create_dir_all(&output)?;
    config.logging.checkpoint_dir = output.join("checkpoints").to_string_lossy().to_string();

    println!("Starting simulation");
    println!("  Neurons: {}", topology.len());
    println!(
        "  Connections: {} excitatory, {} inhibitory",
        excitatory, inhibitory
    );
    println!("  Rule: {:?}", config.learning.rule);
    println!("  Cycles: {}", cycles);
    println!();

    let mut handle = EngineHandle::spawn(config.clone(), topology, seed);
    apply_initial_controls(&mut handle, &initial);

    let start = Instant::now();
    let (final_time, history) = drive_engine(&mut handle, cycles, &config, quiet)?;
    let elapsed = start.elapsed();

    handle.shutdown();
    finish_run(&config, &output, final_time, elapsed, &history)
}

fn resume_simulation(
    checkpoint_path: PathBuf,
    cycles: u64,
    output: PathBuf,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading checkpoint: {:?}", checkpoint_path);

    let mut checkpoint = Checkpoint::load(&checkpoint_path)?;
    init_logging(&checkpoint.config.logging.log_level);

    std::fs::create_dir_all(&output)?;
    checkpoint.config.logging.checkpoint_dir =
        output.join("checkpoints").to_string_lossy().to_string();
    let config = checkpoint.config.clone();

    let resumed_at = checkpoint.time;
    let target = resumed_at + cycles;
    println!("Resumed at cycle {}", resumed_at);
    println!("Running {} additional cycles", cycles);
    println!();

    let mut handle = EngineHandle::resume(checkpoint);

    let start = Instant::now();
    let (final_time, history) = drive_engine(&mut handle, target, &config, quiet)?;
    let elapsed = start.elapsed();

    handle.shutdown();
    finish_run(&config, &output, final_time, elapsed, &history)
}

fn apply_initial_controls(handle: &mut EngineHandle, initial: &InitialControls) {
    if initial.learning {
        handle.send(EngineCommand::ToggleLearning);
    }
    if initial.clamp {
        handle.send(EngineCommand::ToggleClamp);
    }
    if initial.homeostasis {
        handle.send(EngineCommand::ToggleHomeostasis);
    }
    if initial.random_input {
        handle.send(EngineCommand::ToggleRandomInput);
    }
    if let Some(v) = initial.input_one {
        handle.send(EngineCommand::SetInput(InputUnit::One, v));
    }
    if let Some(v) = initial.input_two {
        handle.send(EngineCommand::SetInput(InputUnit::Two, v));
    }
}

/// Watch snapshots until the engine reaches `target` cycles.
/// Returns the last observed cycle count and the recorded stats history.
fn drive_engine(
    handle: &mut EngineHandle,
    target: u64,
    config: &Config,
    quiet: bool,
) -> Result<(u64, StatsHistory), Box<dyn std::error::Error>> {
    let mut history = StatsHistory::new(config.logging.stats_interval);
    let mut last_printed: u64 = 0;
    let mut last_seen: u64 = 0;
    let mut idle_polls = 0u32;

    loop {
        match handle.recv_snapshot_timeout(Duration::from_millis(250)) {
            Some(snapshot) => {
                idle_polls = 0;
                last_seen = snapshot.time;
                history.maybe_record(&snapshot.stats);

                let interval = config.logging.stats_interval;
                if !quiet
                    && interval > 0
                    && snapshot.time >= last_printed + interval
                {
                    println!("{}", snapshot.stats.summary());
                    last_printed = snapshot.time;
                }

                if snapshot.time >= target {
                    break;
                }
            }
            None => {
                idle_polls += 1;
                // Engine gone or wedged; 30s without a snapshot is fatal
                if idle_polls >= 120 {
                    return Err("engine stopped producing snapshots".into());
                }
            }
        }
    }

    Ok((last_seen, history))
}

/// Recover the final engine state and write the run artifacts
fn finish_run(
    config: &Config,
    output: &PathBuf,
    final_time: u64,
    elapsed: Duration,
    history: &StatsHistory,
) -> Result<(), Box<dyn std::error::Error>> {
    let final_path = PathBuf::from(&config.logging.checkpoint_dir).join("checkpoint_final.bin");
    let checkpoint = Checkpoint::load(&final_path)?;

    let weights_path = output.join("weights_final.csv");
    checkpoint.network.to_topology().save_weights(&weights_path)?;

    let plasticity =
        PlasticityEngine::from_counters(&checkpoint.config.learning, checkpoint.plasticity.clone());
    let mut stats = popnet::Stats::new();
    stats.update(&checkpoint.network, &checkpoint.control, &plasticity);
    let stats_path = output.join("stats_final.json");
    stats.save_json(stats_path.to_str().unwrap_or("stats_final.json"))?;

    let history_path = output.join("stats_history.json");
    history.save(history_path.to_str().unwrap_or("stats_history.json"))?;

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Cycles: {}", final_time);
    println!(
        "Speed: {:.1} cycles/s",
        final_time as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("Output activation: {:.4}", stats.output_activation);
    println!("Weight updates: {}", stats.learning_updates);
    println!("Final weights: {:?}", weights_path);
    println!("Final checkpoint: {:?}", final_path);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn generate_topology(
    neurons: usize,
    density: f64,
    seed: u64,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::sized(neurons);
    config.validate()?;

    std::fs::create_dir_all(&output)?;
    let topology = Topology::generate(neurons, density, seed);

    let conn_path = output.join("connectivity.csv");
    let weights_path = output.join("weights.csv");
    let thresholds_path = output.join("thresholds.csv");
    topology.save_connectivity(&conn_path)?;
    topology.save_weights(&weights_path)?;
    topology.save_thresholds(&thresholds_path)?;

    let config_path = output.join("config.yaml");
    config.save(&config_path)?;

    let (excitatory, inhibitory) = topology.connection_counts();
    println!("Generated {}-neuron topology (seed {})", neurons, seed);
    println!(
        "  Connections: {} excitatory, {} inhibitory",
        excitatory, inhibitory
    );
    println!("  {:?}", conn_path);
    println!("  {:?}", weights_path);
    println!("  {:?}", thresholds_path);
    println!("  {:?}", config_path);
    Ok(())
}

fn inspect_topology(
    connectivity: PathBuf,
    weights: PathBuf,
    thresholds: PathBuf,
    neurons: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Topology Report ===");

    let topology = Topology::load(&connectivity, &weights, &thresholds, neurons)?;
    let n = topology.len();
    let (excitatory, inhibitory) = topology.connection_counts();
    let present = excitatory + inhibitory;
    let density = present as f64 / (n * n) as f64;

    println!("Neurons: {}", n);
    println!(
        "Connections: {} ({} excitatory, {} inhibitory)",
        present, excitatory, inhibitory
    );
    println!("Density: {:.3}", density);

    let mut w_min = f32::INFINITY;
    let mut w_max = f32::NEG_INFINITY;
    let mut w_sum = 0.0f64;
    for ((i, j), &c) in topology.connectivity.indexed_iter() {
        if c != 0 {
            let w = topology.weights[[i, j]];
            w_min = w_min.min(w);
            w_max = w_max.max(w);
            w_sum += w as f64;
        }
    }
    if present > 0 {
        println!(
            "Weights: min {:.4}, max {:.4}, mean {:.4}",
            w_min,
            w_max,
            w_sum / present as f64
        );
    }

    let th_min = topology.thresholds.iter().cloned().fold(f32::INFINITY, f32::min);
    let th_max = topology
        .thresholds
        .iter()
        .cloned()
        .fold(f32::NEG_INFINITY, f32::max);
    println!("Thresholds: min {:.4}, max {:.4}", th_min, th_max);

    Ok(())
}

fn run_benchmark(cycles: u64, neurons: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== POPNET Benchmark ===");
    println!("Cycles: {}", cycles);
    println!("Neurons: {}", neurons);
    println!();

    let result = benchmark(cycles, neurons);
    println!("{}", result);

    Ok(())
}
