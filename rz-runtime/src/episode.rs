use rz_core::{Action, Environment, Observation};
use rz_logging::{
    now_ms, DecisionEventV1, EpisodeEventV1, NdjsonError, NdjsonWriter, PolicySummaryV1,
};
use rz_mcts::{Mcts, MctsError, Model, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Mcts(#[from] MctsError),
    #[error("event log: {0}")]
    Log(#[from] NdjsonError),
}

/// One real step of an episode.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Observation the decision was made from.
    pub obs: Observation,
    pub action: Action,
    pub tree_policy: Vec<f32>,
    /// Reward of this step alone (the tree stores cumulative rewards).
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct Episode {
    pub transitions: Vec<Transition>,
    pub total_reward: f32,
    /// Nodes created by the planner during this episode.
    pub nodes_expanded: u64,
    pub terminated: bool,
    /// Truncated by the env, or cut off at `max_decisions`.
    pub truncated: bool,
}

impl Episode {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// NDJSON sinks for decision and episode events.
pub struct EpisodeLogs {
    pub run_id: String,
    pub decisions: NdjsonWriter,
    pub episodes: NdjsonWriter,
}

impl EpisodeLogs {
    fn flush(&mut self) -> Result<(), NdjsonError> {
        self.decisions.flush()?;
        self.episodes.flush()
    }
}

pub struct EpisodeRunner<E: Environment, M: Model> {
    mcts: Mcts<E, M>,
    max_decisions: u32,
    logs: Option<EpisodeLogs>,
    threshold: fn(&E) -> Option<f32>,
    episodes_completed: u64,
}

impl<E: Environment, M: Model> EpisodeRunner<E, M> {
    pub fn new(mcts: Mcts<E, M>, max_decisions: u32) -> Self {
        Self {
            mcts,
            max_decisions,
            logs: None,
            threshold: |_| None,
            episodes_completed: 0,
        }
    }

    pub fn with_logs(mut self, logs: EpisodeLogs) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Reported as `rr_threshold` in episode events, read after the real outcome is recorded.
    pub fn with_threshold(mut self, threshold: fn(&E) -> Option<f32>) -> Self {
        self.threshold = threshold;
        self
    }

    /// Continue the episode numbering of a resumed run.
    pub fn with_first_episode_id(mut self, id: u64) -> Self {
        self.episodes_completed = id;
        self
    }

    pub fn mcts(&self) -> &Mcts<E, M> {
        &self.mcts
    }

    /// Includes the episodes of a resumed run; also the id of the next episode.
    pub fn episodes_completed(&self) -> u64 {
        self.episodes_completed
    }

    pub fn into_mcts(self) -> Mcts<E, M> {
        self.mcts
    }

    /// Play one episode from the current root, then restore the env to the final real node and
    /// start a fresh tree.
    pub fn play_episode(&mut self) -> Result<Episode, RunnerError> {
        let episode_id = self.episodes_completed;
        let nodes_before = self.mcts.nodes_expanded();
        let mut history: Vec<Action> = Vec::new();
        let mut transitions = Vec::new();
        let mut node: NodeId = self.mcts.root();

        while !self.mcts.node(node).is_episode_end()
            && transitions.len() < self.max_decisions as usize
        {
            let obs = self.mcts.node(node).obs.clone();
            let prev_reward = self.mcts.node(node).reward;
            let decision = self.mcts.compute_action_for_history(&history)?;
            history.push(decision.action);

            // Exact replay makes the chosen child's transition the real one.
            node = self.mcts.get_node(&history)?;
            let child = self.mcts.node(node);
            let t = Transition {
                obs,
                action: decision.action,
                reward: child.reward - prev_reward,
                terminated: child.done,
                truncated: child.truncated,
                tree_policy: decision.tree_policy,
            };

            if let Some(logs) = self.logs.as_mut() {
                logs.decisions.write_event(&DecisionEventV1 {
                    event: "decision",
                    ts_ms: now_ms(),
                    run_id: logs.run_id.clone(),
                    episode_id,
                    ply: transitions.len() as u32,
                    chosen_action: t.action as u32,
                    root_visits: decision.root_visits,
                    nodes_expanded: decision.nodes_expanded,
                    step_reward: t.reward,
                    policy: PolicySummaryV1::from_policy(&t.tree_policy),
                })?;
            }
            transitions.push(t);
        }

        let end = self.mcts.node(node);
        let terminated = end.done;
        // Short of termination the episode was cut off, by the env or by the decision cap.
        let truncated = !terminated;
        let total_reward = end.reward;
        let nodes_expanded = self.mcts.nodes_expanded() - nodes_before;

        self.mcts.restore(node)?;
        let rr_threshold = (self.threshold)(self.mcts.env());
        self.mcts.new_episode()?;
        self.episodes_completed += 1;

        rz_logging::debug_event(
            "rz-runtime/episode.rs:play_episode",
            "episode finished",
            serde_json::json!({
                "episode_id": episode_id,
                "steps": transitions.len(),
                "total_reward": total_reward,
                "terminated": terminated,
                "truncated": truncated,
                "nodes_expanded": nodes_expanded,
            }),
        );
        if let Some(logs) = self.logs.as_mut() {
            logs.episodes.write_event(&EpisodeEventV1 {
                event: "episode",
                ts_ms: now_ms(),
                run_id: logs.run_id.clone(),
                episode_id,
                steps: transitions.len() as u32,
                total_reward,
                terminated,
                truncated,
                nodes_expanded,
                rr_threshold,
            })?;
            logs.flush()?;
        }

        Ok(Episode {
            transitions,
            total_reward,
            nodes_expanded,
            terminated,
            truncated,
        })
    }

    pub fn play_episodes(&mut self, n: u64) -> Result<Vec<Episode>, RunnerError> {
        (0..n).map(|_| self.play_episode()).collect()
    }
}
