//! Environment snapshot protocol shared by the ranked-reward wrapper and the search tree.
//!
//! Implementations must make `set_state(&snapshot)` followed by `step(a)` reproduce the exact
//! `(obs, reward, terminated, truncated)` of the first `step(a)` taken from that snapshot,
//! including any internal RNG state.

use std::collections::BTreeMap;
use std::fmt::Debug;

use thiserror::Error;

/// Index into a discrete action space.
pub type Action = usize;

/// Free-form diagnostic values returned alongside a step.
pub type Info = BTreeMap<String, f32>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvError {
    #[error("action {action} out of range for action space of size {size}")]
    ActionOutOfRange { action: Action, size: usize },
    #[error("action {action} is not valid in the current state")]
    IllegalAction { action: Action },
    #[error("episode is over; call reset() before stepping")]
    EpisodeOver,
    #[error("reward normalization failed: {msg}")]
    Normalization { msg: String },
}

/// Observation plus the boolean action-validity mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub features: Vec<f32>,
    pub action_mask: Vec<bool>,
}

impl Observation {
    pub fn new(features: Vec<f32>, action_mask: Vec<bool>) -> Self {
        Self {
            features,
            action_mask,
        }
    }

    pub fn valid_actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.action_mask
            .iter()
            .enumerate()
            .filter_map(|(a, &ok)| ok.then_some(a))
    }

    pub fn num_valid(&self) -> usize {
        self.action_mask.iter().filter(|&&ok| ok).count()
    }

    pub fn is_valid(&self, action: Action) -> bool {
        self.action_mask.get(action).copied().unwrap_or(false)
    }
}

/// Outputs of a single `Environment::step`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub obs: Observation,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl Step {
    /// True if the episode ended, either naturally or by a time limit.
    pub fn is_last(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Resettable, snapshot-able simulator with a discrete action space.
pub trait Environment {
    /// Opaque snapshot sufficient to restore the simulator exactly.
    type State: Clone + PartialEq + Debug;

    fn action_space_size(&self) -> usize;

    /// Length of `Observation::features`.
    fn observation_size(&self) -> usize;

    fn reset(&mut self) -> Result<(Observation, Info), EnvError>;

    fn step(&mut self, action: Action) -> Result<Step, EnvError>;

    fn get_state(&self) -> Self::State;

    /// Restore a snapshot and return the observation consistent with it.
    fn set_state(&mut self, state: &Self::State) -> Result<Observation, EnvError>;
}
