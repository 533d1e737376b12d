//! Plasticity rules: the three mutually exclusive weight-update variants.
//!
//! Exactly one rule is selected at configuration time. The feedforward and
//! supervised rules are gated at runtime by the learning flag, the
//! homeostatic rule by the homeostasis flag. All rules touch only weight
//! entries backed by a structural connection.

use crate::config::LearningConfig;
use crate::control::ControlState;
use crate::network::NetworkState;
use serde::{Deserialize, Serialize};

/// Selectable weight-update rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlasticityRule {
    /// BCM-style two-regime update over all feedforward pairs, with weight
    /// decay, a maintained feedback ratio and periodic row normalization
    FeedforwardDecay,
    /// Cerebellar error-correction restricted to the output neuron and the
    /// population layer, gated by a cycle countdown
    SupervisedError,
    /// Single shared relay weight driven by the gap between target and
    /// observed population activation
    Homeostatic,
}

/// Mutable counters of the plasticity engine, persisted in checkpoints
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlasticityCounters {
    pub countdown: u32,
    pub normalize_countdown: u32,
    pub shared_weight: f32,
    pub updates: u64,
}

/// Applies the configured rule to a network, keeping the countdown gates
/// and the homeostatic shared scalar between cycles.
#[derive(Debug, Clone)]
pub struct PlasticityEngine {
    params: LearningConfig,
    countdown: u32,
    normalize_countdown: u32,
    shared_weight: f32,
    updates: u64,
}

impl PlasticityEngine {
    pub fn new(params: &LearningConfig) -> Self {
        Self {
            params: params.clone(),
            countdown: 0,
            normalize_countdown: 0,
            shared_weight: params.initial_shared_weight,
            updates: 0,
        }
    }

    /// Rebuild an engine from checkpointed counters
    pub fn from_counters(params: &LearningConfig, counters: PlasticityCounters) -> Self {
        Self {
            params: params.clone(),
            countdown: counters.countdown,
            normalize_countdown: counters.normalize_countdown,
            shared_weight: counters.shared_weight,
            updates: counters.updates,
        }
    }

    pub fn counters(&self) -> PlasticityCounters {
        PlasticityCounters {
            countdown: self.countdown,
            normalize_countdown: self.normalize_countdown,
            shared_weight: self.shared_weight,
            updates: self.updates,
        }
    }

    pub fn rule(&self) -> PlasticityRule {
        self.params.rule
    }

    /// Number of weight-update firings so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Current homeostatic shared weight
    pub fn shared_weight(&self) -> f32 {
        self.shared_weight
    }

    /// Apply the configured rule for the current cycle, if its gate allows
    pub fn apply(&mut self, net: &mut NetworkState, ctl: &ControlState) {
        match self.params.rule {
            PlasticityRule::FeedforwardDecay => {
                if ctl.learning {
                    self.apply_feedforward(net);
                }
            }
            PlasticityRule::SupervisedError => {
                if ctl.learning && self.gate_fires(self.params.supervised_period) {
                    self.apply_supervised(net, ctl);
                }
            }
            PlasticityRule::Homeostatic => {
                if ctl.homeostasis && self.gate_fires(self.params.homeostatic_period) {
                    self.apply_homeostatic(net);
                }
            }
        }
    }

    // Countdown gate: fires on the period-th gated cycle, then resets
    fn gate_fires(&mut self, period: u32) -> bool {
        self.countdown += 1;
        if self.countdown >= period {
            self.countdown = 0;
            true
        } else {
            false
        }
    }

    fn apply_feedforward(&mut self, net: &mut NetworkState) {
        let p = &self.params;
        let n = net.len();

        for i in 0..n {
            let y = net.y[i];
            let om = net.sliding_threshold[i];
            // Two-regime BCM curve around the sliding threshold
            let theta = if y > om / 2.0 {
                ((y - om) * p.bcm_slope).min(p.bcm_max)
            } else {
                -y * p.bcm_slope
            };

            for j in 0..i {
                if net.connectivity[[i, j]] != 1 {
                    continue;
                }
                let mut w = net.weights[[i, j]];
                w += (theta * net.u[j] - p.decay_epsilon * w) * p.learning_rate;
                if w < 0.0 {
                    w = 0.0;
                }
                net.weights[[i, j]] = w;

                // The feedback weight tracks the feedforward one at a fixed
                // ratio, but only where the reverse connection exists
                if net.connectivity[[j, i]] != 0 {
                    net.weights[[j, i]] = w * p.feedback_ratio;
                }
            }
        }
        self.updates += 1;

        self.normalize_countdown += 1;
        if self.normalize_countdown >= p.normalize_period {
            self.normalize_countdown = 0;
            self.normalize_rows(net);
        }
    }

    // Divide each row's feedforward weights by rowsum / normalization_factor
    fn normalize_rows(&mut self, net: &mut NetworkState) {
        let p = &self.params;
        let n = net.len();

        for i in 0..n {
            let mut sum = 0.0f32;
            for j in 0..i {
                if net.connectivity[[i, j]] == 1 {
                    sum += net.weights[[i, j]];
                }
            }
            let factor = sum / p.normalization_factor;
            if factor <= 0.0 {
                continue;
            }
            for j in 0..i {
                if net.connectivity[[i, j]] == 1 {
                    let w = net.weights[[i, j]] / factor;
                    net.weights[[i, j]] = w;
                    if net.connectivity[[j, i]] != 0 {
                        net.weights[[j, i]] = w * p.feedback_ratio;
                    }
                }
            }
        }
    }

    fn apply_supervised(&mut self, net: &mut NetworkState, ctl: &ControlState) {
        let p = &self.params;
        let out = net.regions().output_neuron;
        let population = net.regions().population;

        // Error between the desired output (average of the two inputs, the
        // clamp target) and the actual post-sigmoid output
        let theta = ctl.clamp_target() - net.y[out];

        for j in population.range() {
            if net.connectivity[[out, j]] != 1 {
                continue;
            }
            let mut w = net.weights[[out, j]];
            w += theta * net.u[j] * p.learning_rate - p.decay_epsilon * w;
            if w < 0.0 {
                w = 0.0;
            }
            net.weights[[out, j]] = w;
        }
        self.updates += 1;
    }

    fn apply_homeostatic(&mut self, net: &mut NetworkState) {
        let p = &self.params;
        let population = net.regions().population;
        let relay_upper = net.regions().relay_upper;
        let relay_lower = net.regions().relay_lower;

        // Summed population activation against the configured target
        let observed: f32 = population.range().map(|i| net.y[i]).sum();
        self.shared_weight += (p.homeostatic_target - observed) * p.homeostatic_rate;

        for i in population.range() {
            for j in relay_upper.range().chain(relay_lower.range()) {
                if net.connectivity[[i, j]] == 1 {
                    net.weights[[i, j]] = self.shared_weight;
                }
            }
        }
        self.updates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Span};
    use crate::topology::Topology;
    use ndarray::{Array1, Array2};

    fn small_config(rule: PlasticityRule) -> Config {
        let mut config = Config::default();
        config.network.n_neurons = 6;
        config.regions.input_units = [0, 1];
        config.regions.output_neuron = 5;
        config.regions.population = Span::new(2, 5);
        config.regions.relay_upper = Span::new(0, 1);
        config.regions.relay_lower = Span::new(1, 2);
        config.regions.dump_rows = Span::new(0, 6);
        config.regions.dump_cols = Span::new(0, 6);
        config.learning.rule = rule;
        config
    }

    /// Dense-forward topology: every i > j pair connected excitatorily
    fn forward_network(config: &Config) -> NetworkState {
        let n = config.network.n_neurons;
        let connectivity = Array2::from_shape_fn((n, n), |(i, j)| if i > j { 1 } else { 0 });
        let weights = Array2::from_shape_fn((n, n), |(i, j)| if i > j { 0.5 } else { 0.0 });
        let topology = Topology {
            connectivity,
            weights,
            thresholds: Array1::zeros(n),
        };
        NetworkState::new(topology, config)
    }

    fn active_control() -> ControlState {
        let mut ctl = ControlState::default();
        ctl.learning = true;
        ctl.clamp = true;
        ctl.homeostasis = true;
        ctl.input_one = 0.9;
        ctl.input_two = 0.9;
        ctl
    }

    #[test]
    fn test_supervised_gating_exact() {
        let config = small_config(PlasticityRule::SupervisedError);
        let period = config.learning.supervised_period;
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        for cycle in 1..=(2 * period) {
            let before = net.weights.clone();
            net.cycle(&ctl, &mut engine);
            let changed = net.weights != before;
            if cycle % period == 0 {
                assert!(changed, "expected weight change on gated cycle {}", cycle);
            } else {
                assert!(!changed, "unexpected weight change on cycle {}", cycle);
            }
        }
        assert_eq!(engine.updates(), 2);
    }

    #[test]
    fn test_supervised_only_touches_output_row() {
        let config = small_config(PlasticityRule::SupervisedError);
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        let before = net.weights.clone();
        for _ in 0..config.learning.supervised_period {
            net.cycle(&ctl, &mut engine);
        }

        let out = config.regions.output_neuron;
        for ((i, j), &w) in net.weights.indexed_iter() {
            if i != out || !config.regions.population.contains(j) {
                assert_eq!(w, before[[i, j]], "weight [{}, {}] moved", i, j);
            }
        }
    }

    #[test]
    fn test_supervised_floors_at_zero() {
        let mut config = small_config(PlasticityRule::SupervisedError);
        config.learning.learning_rate = 50.0;
        config.learning.supervised_period = 1;
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);

        // Large negative error: desired (0.05) far below actual output
        let mut ctl = active_control();
        ctl.input_one = 0.05;
        ctl.input_two = 0.05;

        for _ in 0..20 {
            net.cycle(&ctl, &mut engine);
        }
        let out = config.regions.output_neuron;
        for j in config.regions.population.range() {
            assert!(net.weights[[out, j]] >= 0.0);
        }
    }

    #[test]
    fn test_feedforward_updates_and_feedback_ratio() {
        let mut config = small_config(PlasticityRule::FeedforwardDecay);
        config.learning.normalize_period = 1000; // keep normalization out of the way
        let n = config.network.n_neurons;

        // Symmetric connectivity so feedback entries are structural
        let connectivity = Array2::from_shape_fn((n, n), |(i, j)| if i != j { 1 } else { 0 });
        let weights = Array2::from_shape_fn((n, n), |(i, j)| if i != j { 0.5 } else { 0.0 });
        let topology = Topology {
            connectivity,
            weights,
            thresholds: Array1::zeros(n),
        };
        let mut net = NetworkState::new(topology, &config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        net.cycle(&ctl, &mut engine);
        assert_eq!(engine.updates(), 1);

        let ratio = config.learning.feedback_ratio;
        for i in 0..n {
            for j in 0..i {
                let expected = net.weights[[i, j]] * ratio;
                assert!(
                    (net.weights[[j, i]] - expected).abs() < 1e-6,
                    "feedback weight [{}, {}] does not track the ratio",
                    j,
                    i
                );
            }
        }
    }

    #[test]
    fn test_feedforward_normalization_bounds_rowsum() {
        let mut config = small_config(PlasticityRule::FeedforwardDecay);
        config.learning.normalize_period = 5;
        config.learning.normalization_factor = 2.0;
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        for _ in 0..config.learning.normalize_period {
            net.cycle(&ctl, &mut engine);
        }

        // Immediately after normalization each nonzero row sums to the factor
        for i in 1..net.len() {
            let sum: f32 = (0..i)
                .filter(|&j| net.connectivity[[i, j]] == 1)
                .map(|j| net.weights[[i, j]])
                .sum();
            if sum > 0.0 {
                assert!(
                    (sum - config.learning.normalization_factor).abs() < 1e-3,
                    "row {} sums to {}",
                    i,
                    sum
                );
            }
        }
    }

    #[test]
    fn test_homeostatic_shared_weight_assignment() {
        let config = small_config(PlasticityRule::Homeostatic);
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        let initial = engine.shared_weight();
        for _ in 0..config.learning.homeostatic_period {
            net.cycle(&ctl, &mut engine);
        }
        assert_eq!(engine.updates(), 1);
        assert!(engine.shared_weight() != initial);

        // Every structural relay connection into the population layer now
        // carries exactly the shared scalar
        for i in config.regions.population.range() {
            for j in config
                .regions
                .relay_upper
                .range()
                .chain(config.regions.relay_lower.range())
            {
                if net.connectivity[[i, j]] == 1 {
                    assert!((net.weights[[i, j]] - engine.shared_weight()).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_homeostatic_gap_direction() {
        let config = small_config(PlasticityRule::Homeostatic);
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        // Population sum of a 3-neuron range cannot reach the default
        // target of 15, so the shared weight must grow
        let initial = engine.shared_weight();
        for _ in 0..config.learning.homeostatic_period {
            net.cycle(&ctl, &mut engine);
        }
        assert!(engine.shared_weight() > initial);
    }

    #[test]
    fn test_disabled_flags_freeze_weights() {
        let config = small_config(PlasticityRule::FeedforwardDecay);
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let mut ctl = active_control();
        ctl.learning = false;
        ctl.homeostasis = false;

        let before = net.weights.clone();
        for _ in 0..50 {
            net.cycle(&ctl, &mut engine);
        }
        assert_eq!(net.weights, before);
        assert_eq!(engine.updates(), 0);
    }

    #[test]
    fn test_counters_roundtrip() {
        let config = small_config(PlasticityRule::Homeostatic);
        let mut net = forward_network(&config);
        let mut engine = PlasticityEngine::new(&config.learning);
        let ctl = active_control();

        for _ in 0..25 {
            net.cycle(&ctl, &mut engine);
        }
        let counters = engine.counters();
        let restored = PlasticityEngine::from_counters(&config.learning, counters);
        assert_eq!(restored.updates(), engine.updates());
        assert!((restored.shared_weight() - engine.shared_weight()).abs() < 1e-6);
    }
}
