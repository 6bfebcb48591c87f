//! DiceRace: a small single-player stochastic environment.
//!
//! The runner starts at 0 and tries to reach `goal`. Each turn it may walk one square, roll one
//! die, gamble on two dice (a double sends it back to 0), or bank the progress made so far.
//! Reaching the goal pays `+1.0`, banking pays `position / goal`, and every turn costs
//! `step_cost`. Episodes are truncated after `max_steps` turns.
//!
//! The dice stream is a `ChaCha8Rng` captured in every snapshot, so restoring a snapshot
//! replays the exact same rolls.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::EnvConfig;
use crate::env::{Action, EnvError, Environment, Info, Observation, Step};

/// Number of discrete actions.
pub const A: usize = 4;

/// Length of the observation feature vector.
pub const F: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceRaceAction {
    Walk,
    Roll,
    Gamble,
    Bank,
}

impl DiceRaceAction {
    pub const ALL: [DiceRaceAction; A] = [
        DiceRaceAction::Walk,
        DiceRaceAction::Roll,
        DiceRaceAction::Gamble,
        DiceRaceAction::Bank,
    ];

    pub fn from_index(a: Action) -> Option<Self> {
        Self::ALL.get(a).copied()
    }

    pub fn index(self) -> Action {
        self as Action
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiceRaceParams {
    pub goal: u32,
    pub max_steps: u32,
    pub step_cost: f32,
}

impl Default for DiceRaceParams {
    fn default() -> Self {
        Self::from(&EnvConfig::default())
    }
}

impl From<&EnvConfig> for DiceRaceParams {
    fn from(cfg: &EnvConfig) -> Self {
        Self {
            goal: cfg.goal.max(1),
            max_steps: cfg.max_steps.max(1),
            step_cost: cfg.step_cost,
        }
    }
}

/// Full simulator snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DiceRaceState {
    pub position: u32,
    pub steps: u32,
    pub done: bool,
    pub rng: ChaCha8Rng,
}

pub struct DiceRace {
    params: DiceRaceParams,
    state: DiceRaceState,
}

impl DiceRace {
    pub fn new(params: DiceRaceParams, seed: u64) -> Self {
        Self {
            params,
            state: DiceRaceState {
                position: 0,
                steps: 0,
                done: false,
                rng: ChaCha8Rng::seed_from_u64(seed),
            },
        }
    }

    pub fn from_config(cfg: &EnvConfig) -> Self {
        Self::new(DiceRaceParams::from(cfg), cfg.seed)
    }

    pub fn params(&self) -> &DiceRaceParams {
        &self.params
    }

    pub fn position(&self) -> u32 {
        self.state.position
    }

    fn action_mask(&self) -> Vec<bool> {
        if self.state.done {
            return vec![false; A];
        }
        let mut mask = vec![true; A];
        mask[DiceRaceAction::Bank.index()] = self.state.position > 0;
        mask
    }

    fn observation(&self) -> Observation {
        let s = &self.state;
        Observation::new(
            vec![
                s.position as f32 / self.params.goal as f32,
                s.steps as f32 / self.params.max_steps as f32,
            ],
            self.action_mask(),
        )
    }

    fn info(&self) -> Info {
        let mut info = Info::new();
        info.insert("position".to_string(), self.state.position as f32);
        info.insert("steps".to_string(), self.state.steps as f32);
        info
    }
}

impl Environment for DiceRace {
    type State = DiceRaceState;

    fn action_space_size(&self) -> usize {
        A
    }

    fn observation_size(&self) -> usize {
        F
    }

    fn reset(&mut self) -> Result<(Observation, Info), EnvError> {
        // The dice stream keeps running across episodes.
        self.state.position = 0;
        self.state.steps = 0;
        self.state.done = false;
        Ok((self.observation(), self.info()))
    }

    fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        if self.state.done {
            return Err(EnvError::EpisodeOver);
        }
        let kind = DiceRaceAction::from_index(action)
            .ok_or(EnvError::ActionOutOfRange { action, size: A })?;
        if !self.action_mask()[action] {
            return Err(EnvError::IllegalAction { action });
        }

        let goal = self.params.goal;
        let s = &mut self.state;
        let mut reward = -self.params.step_cost;
        let mut terminated = false;

        match kind {
            DiceRaceAction::Walk => s.position += 1,
            DiceRaceAction::Roll => s.position += s.rng.gen_range(1..=6),
            DiceRaceAction::Gamble => {
                let d1: u32 = s.rng.gen_range(1..=6);
                let d2: u32 = s.rng.gen_range(1..=6);
                if d1 == d2 {
                    s.position = 0;
                } else {
                    s.position += d1 + d2;
                }
            }
            DiceRaceAction::Bank => {
                reward += s.position as f32 / goal as f32;
                terminated = true;
            }
        }
        s.steps += 1;

        if !terminated && s.position >= goal {
            s.position = goal;
            reward += 1.0;
            terminated = true;
        }
        let truncated = !terminated && s.steps >= self.params.max_steps;
        s.done = terminated || truncated;

        Ok(Step {
            obs: self.observation(),
            reward,
            terminated,
            truncated,
            info: self.info(),
        })
    }

    fn get_state(&self) -> DiceRaceState {
        self.state.clone()
    }

    fn set_state(&mut self, state: &DiceRaceState) -> Result<Observation, EnvError> {
        self.state = state.clone();
        Ok(self.observation())
    }
}
