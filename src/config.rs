//! Configuration system for the POPNET simulator.
//!
//! Supports YAML configuration files with sensible defaults. All numeric
//! constants of the update rule and the plasticity rules live here, as does
//! the mapping from raw neuron indices to named topology regions.

use crate::plasticity::PlasticityRule;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Half-open index range into the neuron vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, i: usize) -> bool {
        i >= self.start && i < self.end
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub regions: RegionConfig,
    pub learning: LearningConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Activation update parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of neurons (rows/columns of the loaded matrices)
    pub n_neurons: usize,
    /// Gain applied inside the sigmoid
    pub sigmoid_gain: f32,
    /// Fraction of the previous activation retained by the decay step
    pub retention: f32,
    /// Initial value of the per-neuron sliding threshold
    pub initial_sliding_threshold: f32,
}

/// Named topology regions.
///
/// The hand-wired topology drives each learning rule over fixed index
/// ranges; naming them here keeps the engine free of magic numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// The two externally driven input units
    pub input_units: [usize; 2],
    /// The clamp/readout target neuron
    pub output_neuron: usize,
    /// Population layer (pre-synaptic range of the supervised rule)
    pub population: Span,
    /// First relay range feeding the population layer
    pub relay_upper: Span,
    /// Second relay range feeding the population layer
    pub relay_lower: Span,
    /// Rows of the weight sub-block written by a dump request
    pub dump_rows: Span,
    /// Columns of the weight sub-block written by a dump request
    pub dump_cols: Span,
}

/// Plasticity rule selection and rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Which rule is active (rules are mutually exclusive alternatives)
    pub rule: PlasticityRule,
    /// Base learning rate for weight deltas
    pub learning_rate: f32,
    /// Weight decay epsilon
    pub decay_epsilon: f32,
    /// Slope of the BCM curve
    pub bcm_slope: f32,
    /// Cap on the positive BCM regime
    pub bcm_max: f32,
    /// Ratio maintained between feedback and feedforward weights
    pub feedback_ratio: f32,
    /// Divisor for periodic row normalization
    pub normalization_factor: f32,
    /// Feedforward-rule firings between row normalizations
    pub normalize_period: u32,
    /// Countdown gate for the supervised rule (cycles)
    pub supervised_period: u32,
    /// Countdown gate for the homeostatic rule (cycles)
    pub homeostatic_period: u32,
    /// Target summed activation over the population layer
    pub homeostatic_target: f32,
    /// Rate at which the shared relay weight tracks the activation gap
    pub homeostatic_rate: f32,
    /// Initial value of the shared relay weight
    pub initial_shared_weight: f32,
}

/// Engine thread pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum microseconds between cycles
    pub cycle_interval_us: u64,
    /// Cycles between published snapshots
    pub snapshot_interval: u32,
    /// Cycles between input randomizations while the random-input flag is set
    pub random_input_period: u32,
}

/// Logging and checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Cycles between stats records, 0 disables periodic stats
    pub stats_interval: u64,
    /// Cycles between checkpoints
    pub checkpoint_interval: u64,
    /// Directory for automatic checkpoints
    pub checkpoint_dir: String,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            regions: RegionConfig::default(),
            learning: LearningConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            n_neurons: 276,
            sigmoid_gain: 0.98,
            retention: 0.1,
            initial_sliding_threshold: 0.65,
        }
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        // Layout of the reference topology: two gaussian input layers of
        // 53 units each, a 169-unit population layer, one output neuron.
        Self {
            input_units: [0, 53],
            output_neuron: 275,
            population: Span::new(106, 275),
            relay_upper: Span::new(80, 106),
            relay_lower: Span::new(27, 53),
            dump_rows: Span::new(106, 275),
            dump_cols: Span::new(250, 275),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            rule: PlasticityRule::SupervisedError,
            learning_rate: 0.02,
            decay_epsilon: 0.0,
            bcm_slope: 1.0,
            bcm_max: 1.0,
            feedback_ratio: 0.2,
            normalization_factor: 11.0,
            normalize_period: 10,
            supervised_period: 30,
            homeostatic_period: 10,
            homeostatic_target: 15.0,
            homeostatic_rate: 0.01,
            initial_shared_weight: 2.0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_interval_us: 100,
            snapshot_interval: 3,
            random_input_period: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 50,
            checkpoint_interval: 500,
            checkpoint_dir: "checkpoints".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Config for a network of `n` neurons with regions scaled to the same
    /// proportions as the reference topology. Useful for generated networks;
    /// hand-wired topologies should set regions explicitly.
    pub fn sized(n_neurons: usize) -> Self {
        let mut config = Config::default();
        if n_neurons == config.network.n_neurons {
            return config;
        }
        let n = n_neurons;
        let at = |num: usize, den: usize| (n * num) / den;
        config.network.n_neurons = n;
        config.regions = RegionConfig {
            input_units: [0, at(53, 276)],
            output_neuron: n - 1,
            population: Span::new(at(106, 276), n - 1),
            relay_upper: Span::new(at(80, 276), at(106, 276)),
            relay_lower: Span::new(at(27, 276), at(53, 276)),
            dump_rows: Span::new(at(106, 276), n - 1),
            dump_cols: Span::new(at(250, 276), n - 1),
        };
        config
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let n = self.network.n_neurons;
        if n == 0 {
            return Err("n_neurons must be > 0".to_string());
        }
        if self.network.retention < 0.0 || self.network.retention >= 1.0 {
            return Err("retention must be in [0, 1)".to_string());
        }
        if self.network.sigmoid_gain <= 0.0 {
            return Err("sigmoid_gain must be > 0".to_string());
        }

        let r = &self.regions;
        for &unit in &r.input_units {
            if unit >= n {
                return Err(format!("input unit {} out of range (n = {})", unit, n));
            }
        }
        if r.output_neuron >= n {
            return Err(format!(
                "output neuron {} out of range (n = {})",
                r.output_neuron, n
            ));
        }
        for (name, span) in [
            ("population", r.population),
            ("relay_upper", r.relay_upper),
            ("relay_lower", r.relay_lower),
            ("dump_rows", r.dump_rows),
            ("dump_cols", r.dump_cols),
        ] {
            if span.is_empty() {
                return Err(format!("region {} is empty", name));
            }
            if span.end > n {
                return Err(format!(
                    "region {} ({}..{}) exceeds n_neurons = {}",
                    name, span.start, span.end, n
                ));
            }
        }

        if self.learning.learning_rate <= 0.0 {
            return Err("learning_rate must be > 0".to_string());
        }
        if self.learning.normalization_factor <= 0.0 {
            return Err("normalization_factor must be > 0".to_string());
        }
        if self.learning.supervised_period == 0
            || self.learning.homeostatic_period == 0
            || self.learning.normalize_period == 0
        {
            return Err("plasticity periods must be > 0".to_string());
        }
        if self.engine.snapshot_interval == 0 {
            return Err("snapshot_interval must be > 0".to_string());
        }
        if self.logging.checkpoint_interval == 0 {
            return Err("checkpoint_interval must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.network.n_neurons, loaded.network.n_neurons);
        assert_eq!(config.regions.population, loaded.regions.population);
        assert_eq!(config.learning.rule, loaded.learning.rule);
    }

    #[test]
    fn test_region_out_of_range_rejected() {
        let mut config = Config::default();
        config.regions.output_neuron = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_span_rejected() {
        let mut config = Config::default();
        config.regions.population = Span::new(100, 100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sized_config_valid() {
        for n in [30, 100, 276, 1000] {
            let config = Config::sized(n);
            assert!(config.validate().is_ok(), "sized({}) invalid", n);
            assert_eq!(config.regions.output_neuron, n - 1);
        }
    }

    #[test]
    fn test_span_helpers() {
        let s = Span::new(10, 20);
        assert_eq!(s.len(), 10);
        assert!(s.contains(10));
        assert!(!s.contains(20));
        assert_eq!(s.range().count(), 10);
    }
}
