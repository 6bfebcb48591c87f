//! PUCT controller (single-threaded): simulation loop, tree policy and action choice.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Gamma;
use rz_core::{Action, EnvError, Environment, Observation};
use thiserror::Error;

use crate::infer::{Model, ModelError};
use crate::node::{Node, NodeId};
use crate::tree::SearchTree;

#[derive(Debug, Clone, Copy)]
pub struct MctsConfig {
    pub num_simulations: u32,
    pub puct_coefficient: f32,
    /// Exponent applied to the max-normalized visit distribution.
    pub temperature: f32,
    /// Argmax of the tree policy instead of sampling.
    pub argmax_tree_policy: bool,
    pub add_dirichlet_noise: bool,
    /// Dirichlet epsilon mix-in fraction.
    pub dirichlet_epsilon: f32,
    /// Dirichlet concentration.
    pub dirichlet_noise: f32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 50,
            puct_coefficient: 1.0,
            temperature: 1.0,
            argmax_tree_policy: false,
            add_dirichlet_noise: false,
            dirichlet_epsilon: 0.25,
            dirichlet_noise: 0.03,
        }
    }
}

impl From<&rz_core::config::MctsConfig> for MctsConfig {
    fn from(c: &rz_core::config::MctsConfig) -> Self {
        Self {
            num_simulations: c.num_simulations,
            puct_coefficient: c.puct_coefficient,
            temperature: c.temperature,
            argmax_tree_policy: c.argmax_tree_policy,
            add_dirichlet_noise: c.add_dirichlet_noise,
            dirichlet_epsilon: c.dirichlet_epsilon,
            dirichlet_noise: c.dirichlet_noise,
        }
    }
}

impl MctsConfig {
    pub fn validate(&self) -> Result<(), MctsError> {
        if self.num_simulations == 0 {
            return Err(MctsError::InvalidConfig {
                msg: "num_simulations must be > 0",
            });
        }
        if !(self.puct_coefficient.is_finite() && self.puct_coefficient > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "puct_coefficient must be finite and > 0",
            });
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "temperature must be finite and > 0",
            });
        }
        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_epsilon must be in [0, 1]",
            });
        }
        if !(self.dirichlet_noise.is_finite() && self.dirichlet_noise > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_noise must be finite and > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MctsError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("action history lookup resolved to {found:?}, requested {requested:?}")]
    HistoryMismatch {
        requested: Vec<Action>,
        found: Vec<Action>,
    },
    #[error("action {action} out of range for action space of size {size}")]
    ActionOutOfRange { action: Action, size: usize },
    #[error("action mask has length {got}, expected {expected}")]
    MaskLength { expected: usize, got: usize },
    #[error("model returned {got} priors, expected {expected}")]
    PriorLength { expected: usize, got: usize },
    #[error("node {node} has no valid actions")]
    NoValidActions { node: NodeId },
    #[error("node {node} is already expanded")]
    AlreadyExpanded { node: NodeId },
    #[error("node {node} ends the episode; there is no action to choose")]
    TerminalNode { node: NodeId },
    #[error("node {node} has zero visits; cannot build a tree policy")]
    ZeroVisits { node: NodeId },
    #[error("tree policy at node {node} is not a valid distribution")]
    DegeneratePolicy { node: NodeId },
    #[error("environment error: {0}")]
    Env(#[from] EnvError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Result of one decision.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    /// Distribution over the full action space (training target for the policy head).
    pub tree_policy: Vec<f32>,
    /// Nodes created while producing this decision.
    pub nodes_expanded: u64,
    /// Visit count of the decision node after the search.
    pub root_visits: u32,
}

pub struct Mcts<E: Environment, M: Model> {
    cfg: MctsConfig,
    env: E,
    model: M,
    tree: SearchTree<E::State>,
    rng: ChaCha8Rng,
    // Nodes created by trees discarded in `new_episode`.
    retired_nodes: u64,
}

impl<E: Environment, M: Model> Mcts<E, M> {
    /// Validate the config, reset `env` and build the true root from its first observation.
    ///
    /// The env is owned exclusively by the tree from here on: every expansion overwrites its
    /// live state.
    pub fn new(mut env: E, model: M, cfg: MctsConfig, seed: u64) -> Result<Self, MctsError> {
        cfg.validate()?;
        let tree = Self::fresh_tree(&mut env)?;
        Ok(Self {
            cfg,
            env,
            model,
            tree,
            rng: ChaCha8Rng::seed_from_u64(seed),
            retired_nodes: 0,
        })
    }

    fn fresh_tree(env: &mut E) -> Result<SearchTree<E::State>, MctsError> {
        let (obs, _info) = env.reset()?;
        let state = env.get_state();
        SearchTree::new(state, obs, env.action_space_size())
    }

    /// Discard the whole tree and start from a fresh `reset()`.
    pub fn new_episode(&mut self) -> Result<(), MctsError> {
        let tree = Self::fresh_tree(&mut self.env)?;
        self.retired_nodes += self.tree.nodes_created();
        self.tree = tree;
        Ok(())
    }

    pub fn config(&self) -> &MctsConfig {
        &self.cfg
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn tree(&self) -> &SearchTree<E::State> {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn node(&self, id: NodeId) -> &Node<E::State> {
        self.tree.node(id)
    }

    /// Running count of nodes created across all episodes.
    pub fn nodes_expanded(&self) -> u64 {
        self.retired_nodes + self.tree.nodes_created()
    }

    /// Restore the env to the snapshot of `id`.
    pub fn restore(&mut self, id: NodeId) -> Result<Observation, MctsError> {
        Ok(self.env.set_state(&self.tree.node(id).state)?)
    }

    /// Node reached by replaying `actions` from the true root, creating children as needed.
    pub fn get_node(&mut self, actions: &[Action]) -> Result<NodeId, MctsError> {
        let mut id = self.tree.root();
        for &a in actions {
            id = self.tree.get_child(&mut self.env, id, a)?;
        }
        let found = &self.tree.node(id).action_history;
        if found.as_slice() != actions {
            return Err(MctsError::HistoryMismatch {
                requested: actions.to_vec(),
                found: found.clone(),
            });
        }
        Ok(id)
    }

    /// `get_node(history)` followed by `compute_action`, counting nodes created by both.
    pub fn compute_action_for_history(&mut self, history: &[Action]) -> Result<Decision, MctsError> {
        let before = self.nodes_expanded();
        let node = self.get_node(history)?;
        let mut decision = self.compute_action(node)?;
        decision.nodes_expanded = self.nodes_expanded() - before;
        Ok(decision)
    }

    /// Run `num_simulations` simulations from `node`, then pick an action from the tree policy.
    pub fn compute_action(&mut self, node: NodeId) -> Result<Decision, MctsError> {
        if self.tree.node(node).is_episode_end() {
            return Err(MctsError::TerminalNode { node });
        }
        let before = self.nodes_expanded();

        for _ in 0..self.cfg.num_simulations {
            self.simulate(node)?;
        }

        let tree_policy = self.tree_policy(node)?;
        let action = if self.cfg.argmax_tree_policy {
            argmax(&tree_policy)
        } else {
            WeightedIndex::new(&tree_policy)
                .map_err(|_| MctsError::DegeneratePolicy { node })?
                .sample(&mut self.rng)
        };

        let decision = Decision {
            action,
            tree_policy,
            nodes_expanded: self.nodes_expanded() - before,
            root_visits: self.tree.number_visits(node),
        };
        rz_logging::debug_event(
            "rz-mcts/mcts.rs:compute_action",
            "decision",
            serde_json::json!({
                "node": node,
                "history_len": self.tree.node(node).action_history.len(),
                "action": decision.action,
                "root_visits": decision.root_visits,
                "nodes_expanded": decision.nodes_expanded,
            }),
        );
        Ok(decision)
    }

    fn simulate(&mut self, node: NodeId) -> Result<(), MctsError> {
        let leaf = self.tree.select(&mut self.env, node, self.cfg.puct_coefficient)?;
        let n = self.tree.node(leaf);

        let value = if n.done {
            n.reward
        } else {
            let (priors, value) = self.model.compute_priors_and_value(&n.obs)?;
            // Truncated leaves are evaluated on every visit but never expanded: no child exists.
            if !n.truncated {
                let priors = if self.cfg.add_dirichlet_noise {
                    mix_dirichlet_noise(
                        &priors,
                        self.cfg.dirichlet_noise,
                        self.cfg.dirichlet_epsilon,
                        &mut self.rng,
                    )?
                } else {
                    priors
                };
                self.tree.expand(leaf, priors)?;
            }
            value
        };

        self.tree.backup(leaf, value);
        Ok(())
    }

    fn tree_policy(&self, node: NodeId) -> Result<Vec<f32>, MctsError> {
        let own = self.tree.number_visits(node);
        if own == 0 {
            return Err(MctsError::ZeroVisits { node });
        }
        let n = self.tree.node(node);
        let policy =
            tree_policy_from_visits(&n.stats.visits, own, &n.valid_actions, self.cfg.temperature);
        if policy.iter().all(|&p| p == 0.0) {
            return Err(MctsError::NoValidActions { node });
        }
        Ok(policy)
    }
}

/// Tree policy from child visit counts.
///
/// `visits / own_visits`, divided by its max, raised to `temperature`, renormalized. When no
/// child has been visited yet (a single simulation that only expanded the node), falls back to
/// uniform over `valid`.
pub fn tree_policy_from_visits(
    visits: &[u32],
    own_visits: u32,
    valid: &[bool],
    temperature: f32,
) -> Vec<f32> {
    let own = own_visits.max(1) as f32;
    let mut out: Vec<f32> = visits.iter().map(|&n| n as f32 / own).collect();
    let max = out.iter().copied().fold(0.0f32, f32::max);

    if max <= 0.0 {
        return uniform_over_valid(valid, visits.len());
    }

    let mut sum = 0.0f32;
    for p in &mut out {
        *p = (*p / max).powf(temperature);
        sum += *p;
    }
    for p in &mut out {
        *p /= sum;
    }
    out
}

fn uniform_over_valid(valid: &[bool], len: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; len];
    let cnt = valid.iter().take(len).filter(|&&ok| ok).count();
    if cnt == 0 {
        return out;
    }
    let u = 1.0 / cnt as f32;
    for (p, &ok) in out.iter_mut().zip(valid) {
        if ok {
            *p = u;
        }
    }
    out
}

/// First index of the maximum.
fn argmax(xs: &[f32]) -> usize {
    let mut best_i = 0usize;
    let mut best_v = f32::NEG_INFINITY;
    for (i, &v) in xs.iter().enumerate() {
        if v > best_v {
            best_v = v;
            best_i = i;
        }
    }
    best_i
}

/// `(1 - eps) * priors + eps * Dirichlet(alpha)` over the whole action space.
fn mix_dirichlet_noise(
    priors: &[f32],
    alpha: f32,
    eps: f32,
    rng: &mut impl Rng,
) -> Result<Vec<f32>, MctsError> {
    // Sample gamma(alpha, 1) per action, then normalize -> Dirichlet.
    let gamma = Gamma::new(alpha as f64, 1.0).map_err(|_| MctsError::InvalidConfig {
        msg: "dirichlet_noise must be finite and > 0",
    })?;
    let eta: Vec<f64> = (0..priors.len()).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = eta.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        rz_logging::debug_event(
            "rz-mcts/mcts.rs:mix_dirichlet_noise",
            "degenerate gamma draw, noise skipped",
            serde_json::json!({
                "alpha": alpha,
                "eps": eps,
                "gamma_sum": sum,
                "num_actions": priors.len(),
            }),
        );
        return Ok(priors.to_vec());
    }

    Ok(priors
        .iter()
        .zip(&eta)
        .map(|(&p, &x)| (1.0 - eps) * p + eps * (x / sum) as f32)
        .collect())
}
