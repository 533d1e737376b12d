//! Snapshot structures bridging the engine thread and its consumers.
//!
//! A snapshot is a consistent post-cycle copy of the shared view: the
//! published activation vector, the externally driven inputs, the flag
//! states and the output neuron's trained weight row. The engine produces
//! one per snapshot interval; consumers never touch live state.

use crate::control::ControlState;
use crate::network::NetworkState;
use crate::stats::Stats;

/// Consistent view of one completed cycle
#[derive(Clone, Debug)]
pub struct NetSnapshot {
    /// Cycle count at capture time
    pub time: u64,
    /// Published activation vector (one entry per neuron)
    pub activations: Vec<f32>,
    /// Current value of the first input unit
    pub input_one: f32,
    /// Current value of the second input unit
    pub input_two: f32,
    /// Activation of the output neuron
    pub output_activation: f32,
    /// Weights from the population layer into the output neuron
    pub output_weights: Vec<f32>,
    /// Flag states at capture time
    pub learning: bool,
    pub clamp: bool,
    pub homeostasis: bool,
    pub random_input: bool,
    /// Derived statistics
    pub stats: Stats,
}

impl NetSnapshot {
    /// Capture a snapshot of the current engine state
    pub fn capture(net: &NetworkState, ctl: &ControlState, stats: &Stats) -> Self {
        let out = net.regions().output_neuron;
        let output_weights = net
            .regions()
            .population
            .range()
            .map(|j| net.weights[[out, j]])
            .collect();

        Self {
            time: net.time,
            activations: net.published().to_vec(),
            input_one: ctl.input_one,
            input_two: ctl.input_two,
            output_activation: net.published()[out],
            output_weights,
            learning: ctl.learning,
            clamp: ctl.clamp,
            homeostasis: ctl.homeostasis,
            random_input: ctl.random_input,
            stats: stats.clone(),
        }
    }

    /// Activation of a single neuron
    pub fn activation(&self, i: usize) -> f32 {
        self.activations.get(i).copied().unwrap_or(0.0)
    }
}
