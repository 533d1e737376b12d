//! Engine thread that runs the cycle loop independently from its consumers.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::checkpoint::{Checkpoint, CheckpointManager};
use crate::config::Config;
use crate::control::ControlState;
use crate::network::NetworkState;
use crate::plasticity::PlasticityEngine;
use crate::stats::Stats;
use crate::topology::Topology;

use super::commands::{EngineCommand, EngineState};
use super::snapshot::NetSnapshot;

/// Handle for controlling the engine thread
pub struct EngineHandle {
    /// Thread handle
    thread: Option<JoinHandle<()>>,
    /// Channel to send commands to the engine
    command_tx: Sender<EngineCommand>,
    /// Channel to receive snapshots from the engine
    snapshot_rx: Receiver<NetSnapshot>,
    /// Current state
    pub state: EngineState,
}

impl EngineHandle {
    /// Spawn a fresh engine thread from a loaded topology
    pub fn spawn(config: Config, topology: Topology, seed: u64) -> Self {
        let net = NetworkState::new(topology, &config);
        let ctl = ControlState::default();
        let plasticity = PlasticityEngine::new(&config.learning);
        Self::launch(config, net, ctl, plasticity, seed)
    }

    /// Spawn an engine thread continuing from a checkpoint
    pub fn resume(checkpoint: Checkpoint) -> Self {
        let Checkpoint {
            config,
            network,
            control,
            plasticity,
            seed,
            ..
        } = checkpoint;
        let plasticity = PlasticityEngine::from_counters(&config.learning, plasticity);
        Self::launch(config, network, control, plasticity, seed)
    }

    fn launch(
        config: Config,
        net: NetworkState,
        ctl: ControlState,
        plasticity: PlasticityEngine,
        seed: u64,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (snapshot_tx, snapshot_rx) = mpsc::channel();

        let thread = thread::spawn(move || {
            run_engine(config, net, ctl, plasticity, seed, command_rx, snapshot_tx);
        });

        Self {
            thread: Some(thread),
            command_tx,
            snapshot_rx,
            state: EngineState::Running,
        }
    }

    /// Send a command to the engine
    pub fn send(&mut self, command: EngineCommand) {
        match &command {
            EngineCommand::Pause => self.state = EngineState::Paused,
            EngineCommand::Resume => self.state = EngineState::Running,
            EngineCommand::Shutdown => self.state = EngineState::Stopped,
            _ => {}
        }
        let _ = self.command_tx.send(command);
    }

    /// Try to receive the latest snapshot (non-blocking)
    pub fn try_recv_snapshot(&self) -> Option<NetSnapshot> {
        let mut latest = None;
        // Drain all available snapshots, keep only the latest
        loop {
            match self.snapshot_rx.try_recv() {
                Ok(snapshot) => latest = Some(snapshot),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        latest
    }

    /// Block until the next snapshot arrives, or the engine disconnects
    pub fn recv_snapshot_timeout(&self, timeout: Duration) -> Option<NetSnapshot> {
        self.snapshot_rx.recv_timeout(timeout).ok()
    }

    /// Check if the engine is running
    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Shut down the engine thread and wait for it to finish
    pub fn shutdown(&mut self) {
        self.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Main cycle loop running in a separate thread
fn run_engine(
    config: Config,
    mut net: NetworkState,
    mut ctl: ControlState,
    mut plasticity: PlasticityEngine,
    seed: u64,
    command_rx: Receiver<EngineCommand>,
    snapshot_tx: Sender<NetSnapshot>,
) {
    let mut state = EngineState::Running;
    let mut speed = 1.0f32;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut stats = Stats::new();

    let mut checkpoint_mgr = CheckpointManager::new(
        config.logging.checkpoint_dir.clone(),
        config.logging.checkpoint_interval,
        5, // Keep last 5 checkpoints
    );
    log::info!(
        "Engine started: {} neurons, rule {:?}, seed {}",
        net.len(),
        plasticity.rule(),
        seed
    );

    // Timing control
    let base_cycle_duration = Duration::from_micros(config.engine.cycle_interval_us);
    let mut last_cycle = Instant::now();
    let mut cycles_since_snapshot = 0u32;
    let mut cycles_since_random = 0u32;
    let mut rate_window_start = Instant::now();
    let mut rate_window_cycles = 0u64;

    // Send initial snapshot
    stats.update(&net, &ctl, &plasticity);
    let _ = snapshot_tx.send(NetSnapshot::capture(&net, &ctl, &stats));

    loop {
        // Process commands (non-blocking)
        match command_rx.try_recv() {
            Ok(cmd) => match cmd {
                EngineCommand::Pause => state = EngineState::Paused,
                EngineCommand::Resume => {
                    state = EngineState::Running;
                    last_cycle = Instant::now();
                }
                EngineCommand::Step => {
                    net.cycle(&ctl, &mut plasticity);
                    stats.update(&net, &ctl, &plasticity);
                    let _ = snapshot_tx.send(NetSnapshot::capture(&net, &ctl, &stats));
                }
                EngineCommand::SetSpeed(s) => speed = s.clamp(0.1, 10.0),
                EngineCommand::SetInput(unit, value) => {
                    ctl.set_input(unit, value);
                    net.publish(&ctl);
                }
                EngineCommand::NudgeInput(unit, direction) => {
                    ctl.nudge_input(unit, direction);
                    net.publish(&ctl);
                }
                EngineCommand::ToggleLearning => {
                    ctl.learning = !ctl.learning;
                    log::info!("Learning {}", if ctl.learning { "on" } else { "off" });
                }
                EngineCommand::ToggleClamp => {
                    ctl.clamp = !ctl.clamp;
                    log::info!("Clamp {}", if ctl.clamp { "on" } else { "off" });
                }
                EngineCommand::ToggleHomeostasis => {
                    ctl.homeostasis = !ctl.homeostasis;
                    log::info!("Homeostasis {}", if ctl.homeostasis { "on" } else { "off" });
                }
                EngineCommand::ToggleRandomInput => {
                    ctl.random_input = !ctl.random_input;
                    cycles_since_random = 0;
                    log::info!(
                        "Random input {}",
                        if ctl.random_input { "on" } else { "off" }
                    );
                }
                EngineCommand::BlankInput => net.request_blank_input(),
                EngineCommand::DumpWeights(path) => {
                    let result = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .and_then(|mut file| net.dump_weight_block(&mut file));
                    match result {
                        Ok(()) => log::info!("Weight block appended to {}", path),
                        Err(e) => log::error!("Weight dump failed: {}", e),
                    }
                }
                EngineCommand::SaveCheckpoint => {
                    let checkpoint = Checkpoint::new(
                        config.clone(),
                        net.clone(),
                        ctl.clone(),
                        plasticity.counters(),
                        seed,
                    );
                    match checkpoint_mgr.save(&checkpoint) {
                        Ok(path) => log::info!("Checkpoint saved: {}", path),
                        Err(e) => log::error!("Checkpoint save failed: {}", e),
                    }
                }
                EngineCommand::Shutdown => {
                    // Save final state so consumers can recover the learned
                    // weights after the join
                    let checkpoint = Checkpoint::new(
                        config.clone(),
                        net.clone(),
                        ctl.clone(),
                        plasticity.counters(),
                        seed,
                    );
                    let final_path =
                        format!("{}/checkpoint_final.bin", checkpoint_mgr.base_dir);
                    if let Err(e) = checkpoint.save(&final_path) {
                        log::error!("Final checkpoint save failed: {}", e);
                    }
                    log::info!("Engine stopped at cycle {}", net.time);
                    return;
                }
            },
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                return;
            }
        }

        // Run a cycle if not paused
        if state == EngineState::Running {
            let cycle_duration =
                Duration::from_micros((base_cycle_duration.as_micros() as f32 / speed) as u64);

            if last_cycle.elapsed() >= cycle_duration {
                // Periodic input randomization, with an activation blank so
                // the network restarts from the new inputs alone
                if ctl.random_input {
                    cycles_since_random += 1;
                    if cycles_since_random >= config.engine.random_input_period {
                        ctl.randomize_inputs(&mut rng);
                        net.request_blank_input();
                        cycles_since_random = 0;
                    }
                }

                net.cycle(&ctl, &mut plasticity);
                last_cycle = Instant::now();
                cycles_since_snapshot += 1;
                rate_window_cycles += 1;

                // Periodic stats log
                if config.logging.stats_interval > 0
                    && net.time % config.logging.stats_interval == 0
                {
                    let elapsed = rate_window_start.elapsed().as_secs_f32();
                    stats.update(&net, &ctl, &plasticity);
                    if elapsed > 0.0 {
                        stats.cycles_per_second = rate_window_cycles as f32 / elapsed;
                    }
                    rate_window_start = Instant::now();
                    rate_window_cycles = 0;
                    log::info!("{}", stats.summary());
                }

                // Auto-save checkpoint periodically
                if checkpoint_mgr.should_save(net.time) {
                    let checkpoint = Checkpoint::new(
                        config.clone(),
                        net.clone(),
                        ctl.clone(),
                        plasticity.counters(),
                        seed,
                    );
                    match checkpoint_mgr.save(&checkpoint) {
                        Ok(path) => log::debug!("Auto-checkpoint saved: {}", path),
                        Err(e) => log::warn!("Auto-checkpoint failed: {}", e),
                    }
                }

                // Send snapshot periodically
                if cycles_since_snapshot >= config.engine.snapshot_interval {
                    stats.update(&net, &ctl, &plasticity);
                    let _ = snapshot_tx.send(NetSnapshot::capture(&net, &ctl, &stats));
                    cycles_since_snapshot = 0;
                }
            }
        }

        // Small sleep to avoid busy-waiting when paused
        if state == EngineState::Paused {
            thread::sleep(Duration::from_millis(16));
        } else {
            thread::yield_now();
        }
    }
}
