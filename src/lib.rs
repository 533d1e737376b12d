//! # POPNET
//!
//! Population-coded neural network simulator with runtime plasticity.
//!
//! A fixed-topology network of leaky sigmoid neurons is loaded from CSV
//! matrices (connectivity, weights, thresholds) and cycled at a steady
//! pace on a dedicated engine thread. Two externally driven input units
//! feed the network; one configurable plasticity rule reshapes the
//! weights while the run is live.
//!
//! ## Features
//!
//! - **Three plasticity rules**: BCM-style feedforward decay, supervised
//!   error correction, and homeostatic relay scaling
//! - **Live control**: inputs, learning gates and clamping are driven
//!   over a command channel while the engine cycles
//! - **Parallel**: weighted summation uses all cores via Rayon
//! - **Reproducible**: seeded random number generation
//! - **Checkpoints**: full engine state saved and resumed from disk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use popnet::{Config, ControlState, NetworkState, PlasticityEngine, Topology};
//!
//! let config = Config::default();
//! let n = config.network.n_neurons;
//! let topology = Topology::load("conn.csv", "weights.csv", "thresholds.csv", n).unwrap();
//!
//! let mut net = NetworkState::new(topology, &config);
//! let mut plasticity = PlasticityEngine::new(&config.learning);
//! let mut ctl = ControlState::default();
//! ctl.learning = true;
//!
//! for _ in 0..1000 {
//!     net.cycle(&ctl, &mut plasticity);
//! }
//! println!("Output: {}", net.output_activation());
//! ```
//!
//! ## Engine thread
//!
//! ```rust,no_run
//! use popnet::{Config, EngineCommand, EngineHandle, Topology};
//!
//! let config = Config::default();
//! let topology = Topology::generate(config.network.n_neurons, 0.3, 42);
//! let mut handle = EngineHandle::spawn(config, topology, 42);
//!
//! handle.send(EngineCommand::ToggleLearning);
//! if let Some(snapshot) = handle.try_recv_snapshot() {
//!     println!("T = {}", snapshot.time);
//! }
//! handle.shutdown();
//! ```

pub mod checkpoint;
pub mod config;
pub mod control;
pub mod network;
pub mod plasticity;
pub mod shared;
pub mod stats;
pub mod topology;

// Re-export main types
pub use config::Config;
pub use control::ControlState;
pub use network::NetworkState;
pub use plasticity::{PlasticityEngine, PlasticityRule};
pub use shared::{EngineCommand, EngineHandle, EngineState, NetSnapshot};
pub use stats::Stats;
pub use topology::Topology;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark on a generated topology
pub fn benchmark(cycles: u64, n_neurons: usize) -> BenchmarkResult {
    use std::time::Instant;

    let config = Config::sized(n_neurons);
    let topology = Topology::generate(n_neurons, 0.3, 42);

    let mut net = NetworkState::new(topology, &config);
    let mut plasticity = PlasticityEngine::new(&config.learning);
    let mut ctl = ControlState::default();
    ctl.learning = true;
    ctl.clamp = true;

    let start = Instant::now();
    for _ in 0..cycles {
        net.cycle(&ctl, &mut plasticity);
    }
    let elapsed = start.elapsed();

    BenchmarkResult {
        cycles,
        n_neurons,
        elapsed_secs: elapsed.as_secs_f64(),
        cycles_per_second: cycles as f64 / elapsed.as_secs_f64(),
        learning_updates: plasticity.updates(),
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub cycles: u64,
    pub n_neurons: usize,
    pub elapsed_secs: f64,
    pub cycles_per_second: f64,
    pub learning_updates: u64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Neurons: {}", self.n_neurons)?;
        writeln!(f, "Cycles: {}", self.cycles)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} cycles/s", self.cycles_per_second)?;
        writeln!(f, "Weight updates: {}", self.learning_updates)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quick_simulation() {
        let config = Config::sized(40);
        let topology = Topology::generate(40, 0.3, 1);
        let mut net = NetworkState::new(topology, &config);
        let mut plasticity = PlasticityEngine::new(&config.learning);
        let ctl = ControlState::default();

        for _ in 0..100 {
            net.cycle(&ctl, &mut plasticity);
        }
        assert_eq!(net.time, 100);
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(100, 50);

        assert_eq!(result.cycles, 100);
        assert!(result.cycles_per_second > 0.0);
    }
}
