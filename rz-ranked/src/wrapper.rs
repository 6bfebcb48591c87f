//! Environment decorator that replaces terminal returns with ranked rewards.

use rand::seq::SliceRandom;
use rand::Rng;
use rz_core::config::RankedRewardsConfig;
use rz_core::{Action, EmptyBufferPolicy, EnvError, Environment, Info, Observation, Step};

use crate::buffer::{RankedError, RankedRewardsBuffer};

/// Snapshot of the wrapped environment, the buffer and the running return, taken together.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedState<S> {
    pub env_state: S,
    pub buffer_state: Vec<f32>,
    pub total_current_reward: f32,
}

pub struct RankedRewardsEnv<E: Environment> {
    inner: E,
    buffer: RankedRewardsBuffer,
    total_current_reward: f32,
    empty_policy: EmptyBufferPolicy,
}

impl<E: Environment> RankedRewardsEnv<E> {
    pub fn new(inner: E, buffer: RankedRewardsBuffer, empty_policy: EmptyBufferPolicy) -> Self {
        Self {
            inner,
            buffer,
            total_current_reward: 0.0,
            empty_policy,
        }
    }

    /// Build the wrapper from config, running the warm start if it is enabled.
    pub fn from_config(
        inner: E,
        cfg: &RankedRewardsConfig,
        rng: &mut impl Rng,
    ) -> Result<Self, RankedError> {
        let buffer = RankedRewardsBuffer::new(cfg.buffer_max_length, cfg.percentile)?;
        let mut env = Self::new(inner, buffer, cfg.empty_buffer_policy);
        if cfg.initialize_buffer {
            env.initialize_buffer(cfg.num_init_rewards, rng)?;
        }
        Ok(env)
    }

    pub fn buffer(&self) -> &RankedRewardsBuffer {
        &self.buffer
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn total_current_reward(&self) -> f32 {
        self.total_current_reward
    }

    /// Seed the buffer with the terminal-step reward of uniform-random episodes over valid
    /// actions. Earlier step rewards of each episode are not counted.
    ///
    /// Drives the inner environment directly; leaves it at the end of the last episode.
    pub fn initialize_buffer(
        &mut self,
        num_episodes: u32,
        rng: &mut impl Rng,
    ) -> Result<(), RankedError> {
        for _ in 0..num_episodes {
            let (mut obs, _) = self.inner.reset()?;
            let last_reward = loop {
                let valid: Vec<Action> = obs.valid_actions().collect();
                let &action = valid.choose(rng).ok_or(RankedError::NoValidActions)?;
                let step = self.inner.step(action)?;
                if step.is_last() {
                    break step.reward;
                }
                obs = step.obs;
            };
            self.buffer.add_reward(last_reward);
        }
        self.total_current_reward = 0.0;
        rz_logging::debug_event(
            "rz-ranked/wrapper.rs:initialize_buffer",
            "warm start finished",
            serde_json::json!({
                "episodes": num_episodes,
                "buffer_len": self.buffer.len(),
                "threshold": self.buffer.threshold(),
            }),
        );
        Ok(())
    }

    fn shaped_terminal_reward(&self, total: f32) -> Result<f32, EnvError> {
        match self.buffer.normalize(total) {
            Ok(r) => Ok(r),
            Err(RankedError::EmptyBuffer) => match self.empty_policy {
                EmptyBufferPolicy::BelowThreshold => {
                    rz_logging::debug_event(
                        "rz-ranked/wrapper.rs:step",
                        "empty buffer, shaping as below threshold",
                        serde_json::json!({ "total": total }),
                    );
                    Ok(-1.0)
                }
                EmptyBufferPolicy::Error => Err(EnvError::Normalization {
                    msg: RankedError::EmptyBuffer.to_string(),
                }),
            },
            Err(e) => Err(EnvError::Normalization { msg: e.to_string() }),
        }
    }
}

impl<E: Environment> Environment for RankedRewardsEnv<E> {
    type State = RankedState<E::State>;

    fn action_space_size(&self) -> usize {
        self.inner.action_space_size()
    }

    fn observation_size(&self) -> usize {
        self.inner.observation_size()
    }

    fn reset(&mut self) -> Result<(Observation, Info), EnvError> {
        self.total_current_reward = 0.0;
        self.inner.reset()
    }

    fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        let mut step = self.inner.step(action)?;
        self.total_current_reward += step.reward;

        if step.is_last() {
            let total = self.total_current_reward;
            step.reward = self.shaped_terminal_reward(total)?;
            self.buffer.add_reward(total);
        } else {
            step.reward = 0.0;
        }
        Ok(step)
    }

    fn get_state(&self) -> Self::State {
        RankedState {
            env_state: self.inner.get_state(),
            buffer_state: self.buffer.get_state(),
            total_current_reward: self.total_current_reward,
        }
    }

    fn set_state(&mut self, state: &Self::State) -> Result<Observation, EnvError> {
        let obs = self.inner.set_state(&state.env_state)?;
        self.buffer.set_state(&state.buffer_state);
        self.total_current_reward = state.total_current_reward;
        Ok(obs)
    }
}
