//! Sliding window of recent episode returns with percentile thresholding.

use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RankedError {
    #[error("invalid ranked-rewards settings: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("cannot normalize against an empty ranked-rewards buffer")]
    EmptyBuffer,
    #[error("warm start reached a non-terminal state with no valid actions")]
    NoValidActions,
    #[error("environment error during warm start: {0}")]
    Env(#[from] rz_core::EnvError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRewardsBuffer {
    max_len: usize,
    percentile: f32,
    buffer: VecDeque<f32>,
}

impl RankedRewardsBuffer {
    pub fn new(max_len: usize, percentile: f32) -> Result<Self, RankedError> {
        if max_len == 0 {
            return Err(RankedError::InvalidConfig {
                msg: "buffer_max_length must be >= 1",
            });
        }
        if !(0.0..=100.0).contains(&percentile) {
            return Err(RankedError::InvalidConfig {
                msg: "percentile must be in [0, 100]",
            });
        }
        Ok(Self {
            max_len,
            percentile,
            buffer: VecDeque::with_capacity(max_len),
        })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn percentile(&self) -> f32 {
        self.percentile
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append a return, dropping the oldest one when full.
    pub fn add_reward(&mut self, reward: f32) {
        if self.buffer.len() == self.max_len {
            self.buffer.pop_front();
        }
        self.buffer.push_back(reward);
    }

    /// Percentile of the current window, linearly interpolated between closest ranks.
    pub fn threshold(&self) -> Option<f32> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut sorted: Vec<f32> = self.buffer.iter().copied().collect();
        sorted.sort_by(f32::total_cmp);

        let rank = (self.percentile as f64 / 100.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        let (a, b) = (sorted[lo] as f64, sorted[hi] as f64);
        Some((a + (b - a) * frac) as f32)
    }

    /// `-1.0` if `reward` is strictly below the threshold, else `+1.0`.
    pub fn normalize(&self, reward: f32) -> Result<f32, RankedError> {
        let threshold = self.threshold().ok_or(RankedError::EmptyBuffer)?;
        Ok(if reward < threshold { -1.0 } else { 1.0 })
    }

    /// Buffer contents, oldest first.
    pub fn get_state(&self) -> Vec<f32> {
        self.buffer.iter().copied().collect()
    }

    /// Replace the contents. Only the newest `max_len` values are kept.
    pub fn set_state(&mut self, state: &[f32]) {
        let skip = state.len().saturating_sub(self.max_len);
        self.buffer.clear();
        self.buffer.extend(state[skip..].iter().copied());
    }
}
