//! Configuration schema for r2zero.
//!
//! One YAML file configures the planner, the ranked-rewards wrapper, the reference
//! environment and self-play runs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Tree search settings.
    pub mcts: MctsConfig,

    /// Ranked-rewards reshaping of terminal rewards.
    #[serde(default)]
    pub ranked_rewards: RankedRewardsConfig,

    /// DiceRace reference environment.
    #[serde(default)]
    pub env: EnvConfig,

    /// Self-play run settings.
    #[serde(default)]
    pub selfplay: SelfplayConfig,
}

/// MCTS algorithm configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MctsConfig {
    /// Simulations per decision. Required, must be >= 1.
    pub num_simulations: u32,
    /// PUCT exploration constant.
    #[serde(default = "default_puct_coefficient")]
    pub puct_coefficient: f32,
    /// Exponent applied to the normalized visit distribution.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Take the argmax of the tree policy instead of sampling from it.
    #[serde(default)]
    pub argmax_tree_policy: bool,
    /// Mix Dirichlet noise into priors at every expansion.
    #[serde(default)]
    pub add_dirichlet_noise: bool,
    /// Fraction of noise mixed in.
    #[serde(default = "default_dirichlet_epsilon")]
    pub dirichlet_epsilon: f32,
    /// Dirichlet concentration.
    #[serde(default = "default_dirichlet_noise")]
    pub dirichlet_noise: f32,
}

fn default_puct_coefficient() -> f32 {
    1.0
}

fn default_temperature() -> f32 {
    1.0
}

fn default_dirichlet_epsilon() -> f32 {
    0.25
}

fn default_dirichlet_noise() -> f32 {
    0.03
}

/// What `normalize` does before any outcome has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBufferPolicy {
    /// Treat the outcome as below threshold (shaped reward -1.0).
    #[default]
    BelowThreshold,
    /// Fail the step.
    Error,
}

/// Ranked-rewards configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankedRewardsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_buffer_max_length")]
    pub buffer_max_length: usize,
    #[serde(default = "default_percentile")]
    pub percentile: f32,
    /// Seed the buffer with uniform-random episodes before search starts.
    #[serde(default)]
    pub initialize_buffer: bool,
    #[serde(default = "default_num_init_rewards")]
    pub num_init_rewards: u32,
    #[serde(default)]
    pub empty_buffer_policy: EmptyBufferPolicy,
}

fn default_true() -> bool {
    true
}

fn default_buffer_max_length() -> usize {
    100
}

fn default_percentile() -> f32 {
    70.0
}

fn default_num_init_rewards() -> u32 {
    100
}

impl Default for RankedRewardsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            buffer_max_length: default_buffer_max_length(),
            percentile: default_percentile(),
            initialize_buffer: false,
            num_init_rewards: default_num_init_rewards(),
            empty_buffer_policy: EmptyBufferPolicy::default(),
        }
    }
}

/// DiceRace environment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvConfig {
    #[serde(default = "default_goal")]
    pub goal: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_step_cost")]
    pub step_cost: f32,
    /// Seed of the environment's dice stream.
    #[serde(default)]
    pub seed: u64,
}

fn default_goal() -> u32 {
    20
}

fn default_max_steps() -> u32 {
    30
}

fn default_step_cost() -> f32 {
    0.01
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            goal: default_goal(),
            max_steps: default_max_steps(),
            step_cost: default_step_cost(),
            seed: 0,
        }
    }
}

/// Self-play configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelfplayConfig {
    /// Episodes to play per run.
    #[serde(default = "default_episodes")]
    pub episodes: u32,
    /// Seed for search noise, action sampling and the warm start.
    #[serde(default)]
    pub seed: u64,
    /// Hard cap on decisions per episode (guards environments without truncation).
    #[serde(default = "default_max_decisions")]
    pub max_decisions: u32,
}

fn default_episodes() -> u32 {
    10
}

fn default_max_decisions() -> u32 {
    1_000
}

impl Default for SelfplayConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            seed: 0,
            max_decisions: default_max_decisions(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.mcts;
        if m.num_simulations == 0 {
            return Err(ConfigError::Invalid("mcts.num_simulations must be >= 1".into()));
        }
        if !(m.puct_coefficient.is_finite() && m.puct_coefficient > 0.0) {
            return Err(ConfigError::Invalid("mcts.puct_coefficient must be > 0".into()));
        }
        if !(m.temperature.is_finite() && m.temperature > 0.0) {
            return Err(ConfigError::Invalid("mcts.temperature must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&m.dirichlet_epsilon) {
            return Err(ConfigError::Invalid(
                "mcts.dirichlet_epsilon must be in [0, 1]".into(),
            ));
        }
        if !(m.dirichlet_noise.is_finite() && m.dirichlet_noise > 0.0) {
            return Err(ConfigError::Invalid("mcts.dirichlet_noise must be > 0".into()));
        }

        let r = &self.ranked_rewards;
        if r.buffer_max_length == 0 {
            return Err(ConfigError::Invalid(
                "ranked_rewards.buffer_max_length must be >= 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&r.percentile) {
            return Err(ConfigError::Invalid(
                "ranked_rewards.percentile must be in [0, 100]".into(),
            ));
        }

        if self.env.goal == 0 || self.env.max_steps == 0 {
            return Err(ConfigError::Invalid("env.goal and env.max_steps must be >= 1".into()));
        }
        if self.selfplay.max_decisions == 0 {
            return Err(ConfigError::Invalid("selfplay.max_decisions must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_local_yaml() {
        let config =
            Config::load("../configs/local.yaml").expect("Failed to load configs/local.yaml");

        assert_eq!(config.mcts.num_simulations, 50);
        assert_eq!(config.mcts.puct_coefficient, 1.0);
        assert!(config.ranked_rewards.enabled);
        assert!(config.ranked_rewards.initialize_buffer);
        assert_eq!(config.ranked_rewards.buffer_max_length, 100);
        assert_eq!(config.env.goal, 20);
        assert_eq!(config.selfplay.episodes, 20);
    }

    #[test]
    fn test_parse_yaml_string_applies_defaults() {
        let yaml = r#"
mcts:
  num_simulations: 25
  temperature: 0.5

ranked_rewards:
  percentile: 75
  empty_buffer_policy: error
"#;

        let config = Config::from_yaml(yaml).expect("Failed to parse YAML");
        assert_eq!(config.mcts.num_simulations, 25);
        assert_eq!(config.mcts.temperature, 0.5);
        assert_eq!(config.mcts.puct_coefficient, 1.0);
        assert_eq!(config.mcts.dirichlet_epsilon, 0.25);
        assert_eq!(config.mcts.dirichlet_noise, 0.03);
        assert!(!config.mcts.argmax_tree_policy);
        assert!(!config.mcts.add_dirichlet_noise);

        assert!(config.ranked_rewards.enabled);
        assert_eq!(config.ranked_rewards.percentile, 75.0);
        assert_eq!(config.ranked_rewards.buffer_max_length, 100);
        assert_eq!(
            config.ranked_rewards.empty_buffer_policy,
            EmptyBufferPolicy::Error
        );
        assert_eq!(config.env.max_steps, 30);
    }

    #[test]
    fn test_missing_num_simulations_fails() {
        let yaml = "mcts:\n  puct_coefficient: 2.0\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_non_positive_values_rejected() {
        for yaml in [
            "mcts:\n  num_simulations: 0\n",
            "mcts:\n  num_simulations: 4\n  puct_coefficient: 0.0\n",
            "mcts:\n  num_simulations: 4\n  temperature: -1.0\n",
            "mcts:\n  num_simulations: 4\nranked_rewards:\n  buffer_max_length: 0\n",
            "mcts:\n  num_simulations: 4\nranked_rewards:\n  percentile: 101\n",
        ] {
            assert!(
                matches!(Config::from_yaml(yaml), Err(ConfigError::Invalid(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let invalid_yaml = "this is not: valid: yaml: {{{}}}";
        let result = Config::from_yaml(invalid_yaml);
        assert!(result.is_err());
    }
}
