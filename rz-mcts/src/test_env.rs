//! Deterministic environments and models used by the search tests.

use std::cell::Cell;

use rz_core::{Action, EnvError, Environment, Info, Observation, Step};

use crate::infer::{Model, ModelError};

/// Four actions with a fixed validity mask. Each step adds `0.1 * action` to a running score;
/// after `depth` steps the episode terminates and pays the score. With `truncate_at` set, the
/// episode is cut off at that step instead (never terminated).
#[derive(Debug, Clone)]
pub struct LineEnv {
    pub mask: [bool; 4],
    pub depth: u32,
    pub truncate_at: Option<u32>,
    pub t: u32,
    pub score: f32,
    pub steps_taken: Cell<u32>,
}

impl LineEnv {
    pub fn new(mask: [bool; 4], depth: u32) -> Self {
        Self {
            mask,
            depth,
            truncate_at: None,
            t: 0,
            score: 0.0,
            steps_taken: Cell::new(0),
        }
    }

    fn over(&self) -> bool {
        self.t >= self.depth || self.truncate_at.is_some_and(|k| self.t >= k)
    }

    fn obs(&self) -> Observation {
        let mask = if self.over() {
            vec![false; 4]
        } else {
            self.mask.to_vec()
        };
        Observation::new(vec![self.t as f32, self.score], mask)
    }
}

impl Environment for LineEnv {
    type State = (u32, f32);

    fn action_space_size(&self) -> usize {
        4
    }

    fn observation_size(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<(Observation, Info), EnvError> {
        self.t = 0;
        self.score = 0.0;
        Ok((self.obs(), Info::new()))
    }

    fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        if self.over() {
            return Err(EnvError::EpisodeOver);
        }
        if action >= 4 {
            return Err(EnvError::ActionOutOfRange { action, size: 4 });
        }
        if !self.mask[action] {
            return Err(EnvError::IllegalAction { action });
        }
        self.steps_taken.set(self.steps_taken.get() + 1);
        self.t += 1;
        self.score += 0.1 * action as f32;

        let truncated = self.truncate_at.is_some_and(|k| self.t >= k) && self.t < self.depth;
        let terminated = !truncated && self.t >= self.depth;
        Ok(Step {
            obs: self.obs(),
            reward: if terminated { self.score } else { 0.0 },
            terminated,
            truncated,
            info: Info::new(),
        })
    }

    fn get_state(&self) -> (u32, f32) {
        (self.t, self.score)
    }

    fn set_state(&mut self, state: &(u32, f32)) -> Result<Observation, EnvError> {
        (self.t, self.score) = *state;
        Ok(self.obs())
    }
}

/// Uniform priors over valid actions, constant value, counts calls.
pub struct CountingModel {
    pub value: f32,
    pub calls: Cell<u32>,
}

impl CountingModel {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            calls: Cell::new(0),
        }
    }
}

impl Model for CountingModel {
    fn compute_priors_and_value(&self, obs: &Observation) -> Result<(Vec<f32>, f32), ModelError> {
        self.calls.set(self.calls.get() + 1);
        let n = obs.num_valid().max(1) as f32;
        let priors = obs
            .action_mask
            .iter()
            .map(|&ok| if ok { 1.0 / n } else { 0.0 })
            .collect();
        Ok((priors, self.value))
    }
}

/// Returns a fixed prior vector regardless of the observation.
pub struct FixedModel(pub Vec<f32>);

impl Model for FixedModel {
    fn compute_priors_and_value(&self, _obs: &Observation) -> Result<(Vec<f32>, f32), ModelError> {
        Ok((self.0.clone(), 0.0))
    }
}

pub struct FailingModel;

impl Model for FailingModel {
    fn compute_priors_and_value(&self, _obs: &Observation) -> Result<(Vec<f32>, f32), ModelError> {
        Err(ModelError::Inference("backend unavailable".to_string()))
    }
}
