//! Search tree: selection, lazy child creation, expansion and backup.
//!
//! Nodes live in an arena. A node's own visit count and total value are stored in its parent's
//! `EdgeStats` at the node's action slot; the true root writes into an explicit virtual-root
//! `EdgeStats` that is never selected into.

use rz_core::{Action, Environment, Observation};

use crate::mcts::MctsError;
use crate::node::{EdgeStats, Node, NodeArena, NodeId};

pub struct SearchTree<S> {
    arena: NodeArena<S>,
    virtual_root: EdgeStats,
    root: NodeId,
    action_space: usize,
    nodes_created: u64,
}

impl<S: Clone> SearchTree<S> {
    /// New tree whose true root is the given snapshot/observation.
    pub fn new(state: S, obs: Observation, action_space: usize) -> Result<Self, MctsError> {
        check_mask(&obs, action_space)?;
        let arena = NodeArena::with_root(Node::new_root(state, obs, action_space));
        Ok(Self {
            root: arena.root(),
            arena,
            virtual_root: EdgeStats::new(action_space),
            action_space,
            nodes_created: 1,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn action_space(&self) -> usize {
        self.action_space
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Nodes created so far, the root included.
    pub fn nodes_created(&self) -> u64 {
        self.nodes_created
    }

    pub fn node(&self, id: NodeId) -> &Node<S> {
        &self.arena[id]
    }

    fn parent_stats(&self, id: NodeId) -> &EdgeStats {
        match self.arena[id].parent {
            Some(p) => &self.arena[p].stats,
            None => &self.virtual_root,
        }
    }

    fn parent_stats_mut(&mut self, id: NodeId) -> &mut EdgeStats {
        match self.arena[id].parent {
            Some(p) => &mut self.arena[p].stats,
            None => &mut self.virtual_root,
        }
    }

    pub fn number_visits(&self, id: NodeId) -> u32 {
        self.parent_stats(id).visits[self.arena[id].slot()]
    }

    pub fn total_value(&self, id: NodeId) -> f32 {
        self.parent_stats(id).total_value[self.arena[id].slot()]
    }

    pub fn child_q(&self, id: NodeId) -> Vec<f32> {
        self.arena[id].stats.child_q()
    }

    pub fn child_u(&self, id: NodeId) -> Vec<f32> {
        self.arena[id].stats.child_u(self.number_visits(id))
    }

    pub fn best_action(&self, id: NodeId, c_puct: f32) -> Result<Action, MctsError> {
        let n = &self.arena[id];
        n.stats
            .best_action(&n.valid_actions, self.number_visits(id), c_puct)
            .ok_or(MctsError::NoValidActions { node: id })
    }

    /// Descend by PUCT from `id` until the first unexpanded node. Statistics are not touched.
    pub fn select<E>(&mut self, env: &mut E, id: NodeId, c_puct: f32) -> Result<NodeId, MctsError>
    where
        E: Environment<State = S>,
    {
        let mut cur = id;
        while self.arena[cur].is_expanded {
            let a = self.best_action(cur, c_puct)?;
            cur = self.get_child(env, cur, a)?;
        }
        Ok(cur)
    }

    /// Return the child for `action`, creating it by restoring this node's snapshot and stepping.
    pub fn get_child<E>(&mut self, env: &mut E, id: NodeId, action: Action) -> Result<NodeId, MctsError>
    where
        E: Environment<State = S>,
    {
        if action >= self.action_space {
            return Err(MctsError::ActionOutOfRange {
                action,
                size: self.action_space,
            });
        }
        if let Some(&child) = self.arena[id].children.get(&action) {
            return Ok(child);
        }

        env.set_state(&self.arena[id].state)?;
        let step = env.step(action)?;
        check_mask(&step.obs, self.action_space)?;
        let state = env.get_state();

        let parent = &self.arena[id];
        let mut action_history = Vec::with_capacity(parent.action_history.len() + 1);
        action_history.extend_from_slice(&parent.action_history);
        action_history.push(action);

        let child = Node {
            action: Some(action),
            parent: Some(id),
            action_history,
            is_expanded: false,
            children: Default::default(),
            stats: EdgeStats::new(self.action_space),
            valid_actions: step.obs.action_mask.clone(),
            reward: step.reward + parent.reward,
            done: step.terminated,
            truncated: step.truncated,
            state,
            obs: step.obs,
        };
        let child_id = self.arena.alloc(child);
        self.arena[id].children.insert(action, child_id);
        self.nodes_created += 1;
        Ok(child_id)
    }

    /// Store the model priors and mark the node expanded. Expanding twice is an error.
    pub fn expand(&mut self, id: NodeId, priors: Vec<f32>) -> Result<(), MctsError> {
        if priors.len() != self.action_space {
            return Err(MctsError::PriorLength {
                expected: self.action_space,
                got: priors.len(),
            });
        }
        let n = &mut self.arena[id];
        if n.is_expanded {
            return Err(MctsError::AlreadyExpanded { node: id });
        }
        n.is_expanded = true;
        n.stats.priors = priors;
        Ok(())
    }

    /// Add one visit and `value` to every node from `id` up to and including the true root.
    pub fn backup(&mut self, id: NodeId, value: f32) {
        let mut cur = Some(id);
        while let Some(nid) = cur {
            let slot = self.arena[nid].slot();
            let parent = self.arena[nid].parent;
            let stats = self.parent_stats_mut(nid);
            stats.visits[slot] += 1;
            stats.total_value[slot] += value;
            cur = parent;
        }
    }
}

fn check_mask(obs: &Observation, action_space: usize) -> Result<(), MctsError> {
    if obs.action_mask.len() != action_space {
        return Err(MctsError::MaskLength {
            expected: action_space,
            got: obs.action_mask.len(),
        });
    }
    Ok(())
}
