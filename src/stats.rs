//! Statistics tracking for the simulation.

use crate::control::ControlState;
use crate::network::NetworkState;
use crate::plasticity::PlasticityEngine;
use serde::{Deserialize, Serialize};

/// Statistics snapshot for a simulation cycle
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Current cycle count
    pub time: u64,
    /// Mean activation over all neurons
    pub activation_mean: f32,
    /// Maximum activation
    pub activation_max: f32,
    /// Mean activation over the population layer
    pub population_mean: f32,
    /// Activation of the output neuron
    pub output_activation: f32,
    /// Clamp error (target minus output), zero while clamp is off
    pub clamp_error: f32,
    /// Sum of structural weights into the output neuron from the population
    pub trained_weight_sum: f32,
    /// Homeostatic shared relay weight
    pub shared_weight: f32,
    /// Weight-update firings so far
    pub learning_updates: u64,
    /// Cycles per second (performance)
    pub cycles_per_second: f32,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats from current engine state
    pub fn update(
        &mut self,
        net: &NetworkState,
        ctl: &ControlState,
        plasticity: &PlasticityEngine,
    ) {
        let n = net.len();
        self.time = net.time;

        let published = net.published();
        let mut sum = 0.0f32;
        let mut max = 0.0f32;
        for &u in published.iter() {
            sum += u;
            if u > max {
                max = u;
            }
        }
        self.activation_mean = if n > 0 { sum / n as f32 } else { 0.0 };
        self.activation_max = max;

        let population = net.regions().population;
        let pop_sum: f32 = population.range().map(|i| published[i]).sum();
        self.population_mean = if population.len() > 0 {
            pop_sum / population.len() as f32
        } else {
            0.0
        };

        let out = net.regions().output_neuron;
        self.output_activation = published[out];
        self.clamp_error = if ctl.clamp {
            ctl.clamp_target() - net.output_activation()
        } else {
            0.0
        };

        self.trained_weight_sum = population
            .range()
            .filter(|&j| net.connectivity[[out, j]] == 1)
            .map(|j| net.weights[[out, j]])
            .sum();

        self.shared_weight = plasticity.shared_weight();
        self.learning_updates = plasticity.updates();
    }

    /// Save stats to JSON file
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        if self.learning_updates > 0 {
            format!(
                "T:{:7} | Act:{:.3} | Pop:{:.3} | Out:{:.3} | Err:{:+.3} | Wsum:{:.2} | Upd:{}",
                self.time,
                self.activation_mean,
                self.population_mean,
                self.output_activation,
                self.clamp_error,
                self.trained_weight_sum,
                self.learning_updates,
            )
        } else {
            format!(
                "T:{:7} | Act:{:.3} | Pop:{:.3} | Out:{:.3}",
                self.time, self.activation_mean, self.population_mean, self.output_activation,
            )
        }
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<Stats>,
    /// Recording interval in cycles
    pub interval: u64,
}

impl StatsHistory {
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval,
        }
    }

    /// Record a snapshot if the interval has elapsed
    pub fn maybe_record(&mut self, stats: &Stats) {
        if self.interval > 0 && stats.time % self.interval == 0 {
            self.snapshots.push(stats.clone());
        }
    }

    /// Save history to JSON file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from JSON file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
