//! Runtime control state: the two externally driven input scalars and the
//! four toggle flags owned by the control surface.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Step applied by a single input nudge
pub const INPUT_STEP: f32 = 0.025;
/// Lower bound for the externally driven inputs
pub const INPUT_MIN: f32 = 0.05;
/// Upper bound for the externally driven inputs
pub const INPUT_MAX: f32 = 0.95;

/// Which of the two input units a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputUnit {
    One,
    Two,
}

/// Direction of an input nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nudge {
    Up,
    Down,
}

/// Externally driven parameters read by the engine each cycle.
///
/// The engine is the sole owner; the control surface mutates it only
/// through engine commands, so every cycle sees a consistent view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlState {
    /// Value driven into the first input unit
    pub input_one: f32,
    /// Value driven into the second input unit
    pub input_two: f32,
    /// Enables the configured plasticity rule (feedforward/supervised)
    pub learning: bool,
    /// Enables output clamping and the sliding-threshold error signal
    pub clamp: bool,
    /// Enables the homeostatic rule
    pub homeostasis: bool,
    /// Enables periodic input randomization
    pub random_input: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            input_one: 0.5,
            input_two: 0.5,
            learning: false,
            clamp: false,
            homeostasis: false,
            random_input: false,
        }
    }
}

impl ControlState {
    /// Desired output value under clamp mode: the average of the two inputs
    pub fn clamp_target(&self) -> f32 {
        (self.input_one + self.input_two) / 2.0
    }

    /// Set an input directly, clamped to the allowed range
    pub fn set_input(&mut self, unit: InputUnit, value: f32) {
        let v = value.clamp(INPUT_MIN, INPUT_MAX);
        match unit {
            InputUnit::One => self.input_one = v,
            InputUnit::Two => self.input_two = v,
        }
    }

    /// Nudge an input by one step, staying inside [INPUT_MIN, INPUT_MAX]
    pub fn nudge_input(&mut self, unit: InputUnit, direction: Nudge) {
        let value = match unit {
            InputUnit::One => &mut self.input_one,
            InputUnit::Two => &mut self.input_two,
        };
        match direction {
            Nudge::Up => {
                if *value < INPUT_MAX {
                    *value += INPUT_STEP;
                }
            }
            Nudge::Down => {
                if *value > INPUT_MIN {
                    *value -= INPUT_STEP;
                }
            }
        }
    }

    /// Replace both inputs with random values in the band the original
    /// random-input mode used (0.4 to 0.75).
    pub fn randomize_inputs<R: Rng>(&mut self, rng: &mut R) {
        self.input_one = 0.4 + rng.gen::<f32>() * 0.35;
        self.input_two = 0.4 + rng.gen::<f32>() * 0.35;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_clamp_target_is_input_average() {
        let mut ctl = ControlState::default();
        ctl.input_one = 0.2;
        ctl.input_two = 0.8;
        assert!((ctl.clamp_target() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_nudge_respects_bounds() {
        let mut ctl = ControlState::default();
        ctl.input_one = INPUT_MAX;
        ctl.nudge_input(InputUnit::One, Nudge::Up);
        assert!(ctl.input_one <= INPUT_MAX + 1e-6);

        ctl.input_two = INPUT_MIN;
        ctl.nudge_input(InputUnit::Two, Nudge::Down);
        assert!(ctl.input_two >= INPUT_MIN - 1e-6);
    }

    #[test]
    fn test_nudge_moves_by_step() {
        let mut ctl = ControlState::default();
        ctl.nudge_input(InputUnit::One, Nudge::Up);
        assert!((ctl.input_one - (0.5 + INPUT_STEP)).abs() < 1e-6);
        ctl.nudge_input(InputUnit::One, Nudge::Down);
        assert!((ctl.input_one - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_randomize_stays_in_band() {
        let mut ctl = ControlState::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            ctl.randomize_inputs(&mut rng);
            assert!(ctl.input_one >= 0.4 && ctl.input_one <= 0.75);
            assert!(ctl.input_two >= 0.4 && ctl.input_two <= 0.75);
        }
    }

    #[test]
    fn test_set_input_clamps() {
        let mut ctl = ControlState::default();
        ctl.set_input(InputUnit::One, 2.0);
        assert!((ctl.input_one - INPUT_MAX).abs() < 1e-6);
        ctl.set_input(InputUnit::Two, -1.0);
        assert!((ctl.input_two - INPUT_MIN).abs() < 1e-6);
    }
}
