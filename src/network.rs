//! Network state and the per-cycle activation update.
//!
//! One `cycle()` call advances the network by exactly one discrete time
//! step: inject external inputs, integrate weighted sums over present
//! connections, squash through the sigmoid, recompute the clamp error
//! signal, apply the configured plasticity rule, decay activations and
//! publish a consistent snapshot vector.

use crate::config::{Config, NetworkConfig, RegionConfig};
use crate::control::ControlState;
use crate::plasticity::PlasticityEngine;
use crate::topology::Topology;
use ndarray::{Array1, Array2, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Complete mutable state of the activation network
#[derive(Clone, Debug)]
pub struct NetworkState {
    n: usize,
    /// Structural connectivity (immutable after load)
    pub connectivity: Array2<i8>,
    /// Synaptic weights, mutated in place by the active plasticity rule
    pub weights: Array2<f32>,
    /// Per-neuron sigmoid thresholds (immutable after load)
    pub thresholds: Array1<f32>,
    /// Leaky-integrated activation fed back each cycle
    pub u: Array1<f32>,
    /// Instantaneous post-sigmoid output
    pub y: Array1<f32>,
    /// Per-neuron sliding threshold used by the BCM-style rules
    pub sliding_threshold: Array1<f32>,
    // Pre-activation buffer, recomputed every cycle
    v: Array1<f32>,
    // Post-cycle copy of u, read by snapshot consumers
    published: Array1<f32>,
    /// Completed cycles
    pub time: u64,
    blank_pending: bool,
    params: NetworkConfig,
    regions: RegionConfig,
}

impl NetworkState {
    /// Build the initial state from a loaded topology.
    ///
    /// The topology size must match `config.network.n_neurons`; regions are
    /// assumed validated by `Config::validate`.
    pub fn new(topology: Topology, config: &Config) -> Self {
        let n = topology.len();
        debug_assert_eq!(n, config.network.n_neurons);

        Self {
            n,
            connectivity: topology.connectivity,
            weights: topology.weights,
            thresholds: topology.thresholds,
            u: Array1::zeros(n),
            y: Array1::zeros(n),
            sliding_threshold: Array1::from_elem(n, config.network.initial_sliding_threshold),
            v: Array1::zeros(n),
            published: Array1::zeros(n),
            time: 0,
            blank_pending: false,
            params: config.network.clone(),
            regions: config.regions.clone(),
        }
    }

    /// Number of neurons
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Named regions this network was configured with
    pub fn regions(&self) -> &RegionConfig {
        &self.regions
    }

    /// Post-cycle activation snapshot (the view consumers read)
    pub fn published(&self) -> &Array1<f32> {
        &self.published
    }

    /// Activation of the configured output neuron
    pub fn output_activation(&self) -> f32 {
        self.y[self.regions.output_neuron]
    }

    /// Request that the next cycle zeroes all activations
    pub fn request_blank_input(&mut self) {
        self.blank_pending = true;
    }

    /// Advance the network by one time step
    pub fn cycle(&mut self, ctl: &ControlState, plasticity: &mut PlasticityEngine) {
        // 1. Input injection
        let [a, b] = self.regions.input_units;
        self.u[a] = ctl.input_one;
        self.u[b] = ctl.input_two;

        // 2. Weighted summation over present connections
        self.integrate();

        // 3. Sigmoid squashing with per-neuron thresholds
        self.squash();

        // 4. Clamp handling: sliding threshold of the output neuron becomes
        //    an error-like signal against the desired value
        if ctl.clamp {
            let out = self.regions.output_neuron;
            self.sliding_threshold[out] =
                (2.0 * self.y[out] - ctl.clamp_target()).clamp(0.0, 1.0);
        }

        // 5. Weight update (rule gating handled by the plasticity engine)
        plasticity.apply(self, ctl);

        // 6. Activation decay, or a requested blank
        if self.blank_pending {
            self.u.fill(0.0);
            self.y.fill(0.0);
            self.blank_pending = false;
        } else {
            let retention = self.params.retention;
            Zip::from(&mut self.u).and(&self.y).for_each(|u, &y| {
                *u = (1.0 - retention) * y + retention * *u;
            });
        }

        // 7. Publish
        self.publish(ctl);

        self.time += 1;
    }

    /// Copy `u` into the published vector, then re-assert the external
    /// driver's freshest input values so they survive the decay step.
    /// Idempotent while the control state is unchanged.
    pub fn publish(&mut self, ctl: &ControlState) {
        self.published.assign(&self.u);
        let [a, b] = self.regions.input_units;
        self.u[a] = ctl.input_one;
        self.u[b] = ctl.input_two;
        self.published[a] = ctl.input_one;
        self.published[b] = ctl.input_two;
    }

    fn integrate(&mut self) {
        let n = self.n;
        let u = &self.u;
        let conn = &self.connectivity;
        let w = &self.weights;

        let v: Vec<f32> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut sum = 0.0f32;
                for j in 0..n {
                    // Skip structurally absent connections
                    if conn[[i, j]] != 0 {
                        sum += u[j] * w[[i, j]];
                    }
                }
                sum
            })
            .collect();

        self.v = Array1::from_vec(v);
    }

    fn squash(&mut self) {
        let gain = self.params.sigmoid_gain;
        Zip::from(&mut self.y)
            .and(&self.v)
            .and(&self.thresholds)
            .for_each(|y, &v, &th| {
                *y = 1.0 / (1.0 + (-gain * (v - th)).exp());
            });
    }

    /// Write the configured weight sub-block to a text sink,
    /// one labelled row per post-synaptic neuron.
    pub fn dump_weight_block<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for i in self.regions.dump_rows.range() {
            writeln!(writer, "post neuron = {}", i)?;
            for j in self.regions.dump_cols.range() {
                write!(writer, "{:.6} ", self.weights[[i, j]])?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Extract the current weights as a topology for saving
    pub fn to_topology(&self) -> Topology {
        Topology {
            connectivity: self.connectivity.clone(),
            weights: self.weights.clone(),
            thresholds: self.thresholds.clone(),
        }
    }
}

// Checkpoints flatten the arrays by hand rather than relying on ndarray's
// serde support, keeping the binary layout explicit and versionable.
impl Serialize for NetworkState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("NetworkState", 11)?;
        state.serialize_field("n", &self.n)?;
        state.serialize_field("connectivity", &self.connectivity.iter().copied().collect::<Vec<i8>>())?;
        state.serialize_field("weights", &self.weights.iter().copied().collect::<Vec<f32>>())?;
        state.serialize_field("thresholds", &self.thresholds.to_vec())?;
        state.serialize_field("u", &self.u.to_vec())?;
        state.serialize_field("y", &self.y.to_vec())?;
        state.serialize_field("sliding_threshold", &self.sliding_threshold.to_vec())?;
        state.serialize_field("time", &self.time)?;
        state.serialize_field("blank_pending", &self.blank_pending)?;
        state.serialize_field("params", &self.params)?;
        state.serialize_field("regions", &self.regions)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for NetworkState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct NetworkData {
            n: usize,
            connectivity: Vec<i8>,
            weights: Vec<f32>,
            thresholds: Vec<f32>,
            u: Vec<f32>,
            y: Vec<f32>,
            sliding_threshold: Vec<f32>,
            time: u64,
            blank_pending: bool,
            params: NetworkConfig,
            regions: RegionConfig,
        }

        let data = NetworkData::deserialize(deserializer)?;
        let n = data.n;
        let connectivity = Array2::from_shape_vec((n, n), data.connectivity)
            .map_err(serde::de::Error::custom)?;
        let weights =
            Array2::from_shape_vec((n, n), data.weights).map_err(serde::de::Error::custom)?;

        if data.thresholds.len() != n || data.u.len() != n || data.y.len() != n {
            return Err(serde::de::Error::custom("vector length mismatch"));
        }

        let u = Array1::from_vec(data.u);

        Ok(NetworkState {
            n,
            connectivity,
            weights,
            thresholds: Array1::from_vec(data.thresholds),
            published: u.clone(),
            u,
            y: Array1::from_vec(data.y),
            sliding_threshold: Array1::from_vec(data.sliding_threshold),
            v: Array1::zeros(n),
            time: data.time,
            blank_pending: data.blank_pending,
            params: data.params,
            regions: data.regions,
        })
    }
}
