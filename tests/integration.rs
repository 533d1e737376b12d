//! Integration tests for POPNET

use popnet::checkpoint::Checkpoint;
use popnet::control::InputUnit;
use popnet::{
    Config, ControlState, EngineCommand, EngineHandle, EngineState, NetworkState,
    PlasticityEngine, PlasticityRule, Topology,
};
use std::time::{Duration, Instant};

fn test_config(n: usize) -> Config {
    let mut config = Config::sized(n);
    config.engine.cycle_interval_us = 10;
    config.logging.checkpoint_interval = 1_000_000;
    config.logging.checkpoint_dir = std::env::temp_dir()
        .join("popnet_integration")
        .to_string_lossy()
        .to_string();
    config.logging.stats_interval = 0;
    config
}

#[test]
fn test_full_simulation_cycle() {
    let config = test_config(60);
    let topology = Topology::generate(60, 0.3, 12345);

    let mut net = NetworkState::new(topology, &config);
    let mut plasticity = PlasticityEngine::new(&config.learning);
    let mut ctl = ControlState::default();
    ctl.learning = true;
    ctl.clamp = true;

    for _ in 0..500 {
        net.cycle(&ctl, &mut plasticity);
    }

    assert_eq!(net.time, 500);
    assert!(plasticity.updates() > 0);

    // Activations stay in the sigmoid's open interval
    for &y in net.y.iter() {
        assert!(y > 0.0 && y < 1.0);
    }
    // Structurally absent weights are untouched zeros
    for ((i, j), &c) in net.connectivity.indexed_iter() {
        if c == 0 {
            assert_eq!(net.weights[[i, j]], 0.0);
        }
    }
}

#[test]
fn test_checkpoint_persistence() {
    let config = test_config(40);
    let topology = Topology::generate(40, 0.3, 54321);

    let mut net = NetworkState::new(topology, &config);
    let mut plasticity = PlasticityEngine::new(&config.learning);
    let mut ctl = ControlState::default();
    ctl.learning = true;
    ctl.clamp = true;

    for _ in 0..100 {
        net.cycle(&ctl, &mut plasticity);
    }

    let checkpoint = Checkpoint::new(
        config.clone(),
        net.clone(),
        ctl.clone(),
        plasticity.counters(),
        54321,
    );
    let temp_path = std::env::temp_dir().join(format!("popnet_it_ckpt_{}.bin", std::process::id()));
    checkpoint.save(&temp_path).expect("Failed to save checkpoint");

    let loaded = Checkpoint::load(&temp_path).expect("Failed to load checkpoint");
    assert_eq!(loaded.time, net.time);
    assert_eq!(loaded.seed, 54321);
    assert_eq!(loaded.network.weights, net.weights);

    // Restored state continues exactly where the original does
    let mut restored_net = loaded.network;
    let mut restored_plasticity =
        PlasticityEngine::from_counters(&loaded.config.learning, loaded.plasticity);
    let restored_ctl = loaded.control;

    for _ in 0..50 {
        net.cycle(&ctl, &mut plasticity);
        restored_net.cycle(&restored_ctl, &mut restored_plasticity);
    }
    assert_eq!(restored_net.time, net.time);
    assert_eq!(restored_net.weights, net.weights);
    assert_eq!(restored_net.u, net.u);

    std::fs::remove_file(temp_path).ok();
}

#[test]
fn test_reproducibility() {
    let config = test_config(50);

    let run = || {
        let topology = Topology::generate(50, 0.3, 99999);
        let mut net = NetworkState::new(topology, &config);
        let mut plasticity = PlasticityEngine::new(&config.learning);
        let mut ctl = ControlState::default();
        ctl.learning = true;
        ctl.clamp = true;
        for _ in 0..200 {
            net.cycle(&ctl, &mut plasticity);
        }
        net
    };

    let net1 = run();
    let net2 = run();
    assert_eq!(net1.weights, net2.weights);
    assert_eq!(net1.u, net2.u);
}

#[test]
fn test_all_rules_run() {
    for rule in [
        PlasticityRule::FeedforwardDecay,
        PlasticityRule::SupervisedError,
        PlasticityRule::Homeostatic,
    ] {
        let mut config = test_config(40);
        config.learning.rule = rule;
        let topology = Topology::generate(40, 0.3, 8);

        let mut net = NetworkState::new(topology, &config);
        let mut plasticity = PlasticityEngine::new(&config.learning);
        let mut ctl = ControlState::default();
        ctl.learning = true;
        ctl.clamp = true;
        ctl.homeostasis = true;

        for _ in 0..100 {
            net.cycle(&ctl, &mut plasticity);
        }
        assert!(plasticity.updates() > 0, "rule {:?} never fired", rule);
    }
}

#[test]
fn test_engine_thread_lifecycle() {
    let config = test_config(30);
    let topology = Topology::generate(30, 0.3, 21);
    let mut handle = EngineHandle::spawn(config, topology, 21);
    assert!(handle.is_running());

    // Engine produces advancing snapshots
    let first = handle
        .recv_snapshot_timeout(Duration::from_secs(5))
        .expect("no snapshot");
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut advanced = false;
    while Instant::now() < deadline {
        if let Some(snapshot) = handle.recv_snapshot_timeout(Duration::from_millis(100)) {
            if snapshot.time > first.time {
                advanced = true;
                break;
            }
        }
    }
    assert!(advanced, "engine never advanced past the first snapshot");

    // Commands reach the engine
    handle.send(EngineCommand::SetInput(InputUnit::Two, 0.8));
    handle.send(EngineCommand::ToggleClamp);
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut reflected = false;
    while Instant::now() < deadline {
        if let Some(snapshot) = handle.recv_snapshot_timeout(Duration::from_millis(100)) {
            if snapshot.clamp && (snapshot.input_two - 0.8).abs() < 1e-6 {
                reflected = true;
                break;
            }
        }
    }
    assert!(reflected, "commands never reflected in a snapshot");

    // Shutdown joins the thread
    handle.shutdown();
    assert_eq!(handle.state, EngineState::Stopped);
}

#[test]
fn test_engine_resume_from_checkpoint() {
    let config = test_config(30);
    let topology = Topology::generate(30, 0.3, 31);

    let mut net = NetworkState::new(topology, &config);
    let mut plasticity = PlasticityEngine::new(&config.learning);
    let mut ctl = ControlState::default();
    ctl.learning = true;
    for _ in 0..80 {
        net.cycle(&ctl, &mut plasticity);
    }
    let resumed_at = net.time;
    let checkpoint = Checkpoint::new(config, net, ctl, plasticity.counters(), 31);

    let mut handle = EngineHandle::resume(checkpoint);
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut continued = false;
    while Instant::now() < deadline {
        if let Some(snapshot) = handle.recv_snapshot_timeout(Duration::from_millis(100)) {
            assert!(snapshot.time >= resumed_at, "engine restarted from zero");
            if snapshot.time > resumed_at {
                assert!(snapshot.learning, "control state lost on resume");
                continued = true;
                break;
            }
        }
    }
    assert!(continued, "resumed engine never advanced");

    handle.shutdown();
}

#[test]
fn test_weight_dump_over_command_channel() {
    let config = test_config(30);
    let topology = Topology::generate(30, 0.3, 41);
    let mut handle = EngineHandle::spawn(config, topology, 41);

    let dump_path = std::env::temp_dir().join(format!("popnet_dump_{}.txt", std::process::id()));
    std::fs::remove_file(&dump_path).ok();
    handle.send(EngineCommand::DumpWeights(
        dump_path.to_string_lossy().to_string(),
    ));

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut written = false;
    while Instant::now() < deadline {
        if let Ok(text) = std::fs::read_to_string(&dump_path) {
            if text.contains("post neuron = ") {
                written = true;
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(written, "weight dump never appeared");

    handle.shutdown();
    std::fs::remove_file(dump_path).ok();
}
