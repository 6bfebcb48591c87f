//! Node and edge statistics for PUCT.

use std::ops::{Index, IndexMut};

use rustc_hash::FxHashMap;
use rz_core::{Action, Observation};

pub type NodeId = u32;

/// Per-action statistics of a node's children, indexed by child action.
///
/// A child's own visit count and total value are the entries at its action slot here.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStats {
    pub total_value: Vec<f32>,
    pub priors: Vec<f32>,
    pub visits: Vec<u32>,
}

impl EdgeStats {
    pub fn new(action_space: usize) -> Self {
        Self {
            total_value: vec![0.0; action_space],
            priors: vec![0.0; action_space],
            visits: vec![0; action_space],
        }
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Mean value, smoothed by one so unvisited actions read as 0.
    pub fn q(&self, a: Action) -> f32 {
        self.total_value[a] / (1.0 + self.visits[a] as f32)
    }

    /// Exploration bonus given the owning node's visit count.
    pub fn u(&self, a: Action, own_visits: u32) -> f32 {
        (own_visits as f32).sqrt() * self.priors[a] / (1.0 + self.visits[a] as f32)
    }

    pub fn child_q(&self) -> Vec<f32> {
        (0..self.len()).map(|a| self.q(a)).collect()
    }

    pub fn child_u(&self, own_visits: u32) -> Vec<f32> {
        (0..self.len()).map(|a| self.u(a, own_visits)).collect()
    }

    /// Argmax of `Q + c_puct * U` over valid actions; the lowest index wins ties.
    ///
    /// Returns `None` when no action is valid.
    pub fn best_action(&self, valid: &[bool], own_visits: u32, c_puct: f32) -> Option<Action> {
        let mut best: Option<(Action, f32)> = None;
        for (a, &ok) in valid.iter().enumerate().take(self.len()) {
            if !ok {
                continue;
            }
            let score = self.q(a) + c_puct * self.u(a, own_visits);
            let better = match best {
                None => true,
                Some((_, bs)) => score > bs,
            };
            if better {
                best = Some((a, score));
            }
        }
        best.map(|(a, _)| a)
    }
}

/// One state in the search tree.
#[derive(Debug, Clone)]
pub struct Node<S> {
    /// Action that led here from the parent; `None` for the true root.
    pub action: Option<Action>,
    pub parent: Option<NodeId>,
    /// Full action sequence from the true root.
    pub action_history: Vec<Action>,

    pub is_expanded: bool,
    pub children: FxHashMap<Action, NodeId>,
    /// Statistics of this node's children.
    pub stats: EdgeStats,
    pub valid_actions: Vec<bool>,

    /// Cumulative real reward from the true root.
    pub reward: f32,
    /// Terminated (not truncated) episode end.
    pub done: bool,
    /// Truncated episode end. The model evaluates such a leaf on every visit; it is never
    /// expanded, since stepping past the cutoff has no defined successor.
    pub truncated: bool,

    pub state: S,
    pub obs: Observation,
}

impl<S> Node<S> {
    pub fn new_root(state: S, obs: Observation, action_space: usize) -> Self {
        Self {
            action: None,
            parent: None,
            action_history: Vec::new(),
            is_expanded: false,
            children: FxHashMap::default(),
            stats: EdgeStats::new(action_space),
            valid_actions: obs.action_mask.clone(),
            reward: 0.0,
            done: false,
            truncated: false,
            state,
            obs,
        }
    }

    /// Slot of this node inside its parent's `EdgeStats` (slot 0 of the virtual root for the
    /// true root).
    pub fn slot(&self) -> usize {
        self.action.unwrap_or(0)
    }

    /// No further transitions exist from this node.
    pub fn is_episode_end(&self) -> bool {
        self.done || self.truncated
    }
}

/// Flat node storage for one search tree. Ids are handed out in creation order and stay
/// valid until the tree is dropped.
#[derive(Debug)]
pub struct NodeArena<S> {
    nodes: Vec<Node<S>>,
}

impl<S> NodeArena<S> {
    pub fn with_root(root: Node<S>) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, node: Node<S>) -> NodeId {
        self.nodes.push(node);
        (self.nodes.len() - 1) as NodeId
    }
}

impl<S> Index<NodeId> for NodeArena<S> {
    type Output = Node<S>;

    fn index(&self, id: NodeId) -> &Node<S> {
        &self.nodes[id as usize]
    }
}

impl<S> IndexMut<NodeId> for NodeArena<S> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<S> {
        &mut self.nodes[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(values: &[f32], priors: &[f32], visits: &[u32]) -> EdgeStats {
        EdgeStats {
            total_value: values.to_vec(),
            priors: priors.to_vec(),
            visits: visits.to_vec(),
        }
    }

    #[test]
    fn q_and_u_are_laplace_smoothed() {
        let s = stats(&[3.0, 0.0], &[0.5, 0.5], &[2, 0]);
        assert!((s.q(0) - 1.0).abs() < 1e-6);
        assert_eq!(s.q(1), 0.0);
        assert!((s.u(0, 4) - 2.0 * 0.5 / 3.0).abs() < 1e-6);
        assert!((s.u(1, 4) - 1.0).abs() < 1e-6);
        assert_eq!(s.child_q().len(), 2);
        assert_eq!(s.child_u(0), vec![0.0, 0.0]);
    }

    #[test]
    fn best_action_skips_invalid_even_if_best_scoring() {
        let s = stats(&[0.0, 0.0, 100.0], &[0.1, 0.2, 0.7], &[0, 0, 0]);
        assert_eq!(s.best_action(&[true, true, false], 1, 1.0), Some(1));
    }

    #[test]
    fn best_action_breaks_ties_by_lowest_index() {
        let s = EdgeStats::new(4);
        assert_eq!(s.best_action(&[false, true, true, true], 0, 1.0), Some(1));
    }

    #[test]
    fn arena_hands_out_ids_in_creation_order() {
        let obs = Observation::new(vec![0.0], vec![true, true]);
        let mut arena = NodeArena::with_root(Node::new_root(10u32, obs.clone(), 2));
        assert_eq!(arena.root(), 0);
        assert_eq!(arena.len(), 1);

        let a = arena.alloc(Node::new_root(11, obs.clone(), 2));
        let b = arena.alloc(Node::new_root(12, obs, 2));
        assert_eq!((a, b), (1, 2));
        assert_eq!(arena.len(), 3);
        assert!(!arena.is_empty());

        arena[b].truncated = true;
        assert_eq!(arena[a].state, 11);
        assert!(arena[b].is_episode_end());
        assert!(!arena[arena.root()].is_episode_end());
    }

    #[test]
    fn best_action_none_without_valid_actions() {
        let s = EdgeStats::new(3);
        assert_eq!(s.best_action(&[false, false, false], 5, 1.0), None);
    }
}
