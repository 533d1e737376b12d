//! Commands for controlling the engine thread.

use crate::control::{InputUnit, Nudge};
use serde::{Deserialize, Serialize};

/// Commands sent from the control surface to the engine thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineCommand {
    /// Pause cycling
    Pause,
    /// Resume cycling
    Resume,
    /// Execute a single cycle while paused
    Step,
    /// Set the cycle speed multiplier (0.1 - 10.0)
    SetSpeed(f32),
    /// Drive an input unit to a value (clamped to the allowed range)
    SetInput(InputUnit, f32),
    /// Nudge an input unit by one step
    NudgeInput(InputUnit, Nudge),
    /// Toggle the plasticity rule gate
    ToggleLearning,
    /// Toggle output clamping
    ToggleClamp,
    /// Toggle the homeostatic rule gate
    ToggleHomeostasis,
    /// Toggle periodic input randomization
    ToggleRandomInput,
    /// Zero all activations on the next cycle
    BlankInput,
    /// Append the configured weight sub-block to a text file
    DumpWeights(String),
    /// Save a checkpoint now
    SaveCheckpoint,
    /// Stop the engine thread
    Shutdown,
}

/// Current engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Cycling
    Running,
    /// Paused, still serving commands
    Paused,
    /// Shut down
    Stopped,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::Running
    }
}
