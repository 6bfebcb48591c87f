//! MCTS implementation (PUCT) for AlphaZero-style planning in a resettable environment.
//!
//! The design uses:
//! - Arena-backed node storage; per-action statistics live in the parent node
//! - Exact replay: every expansion restores the parent snapshot before stepping the env
//! - Undiscounted single-agent backups (the same value is added to every ancestor)

pub mod infer;
pub mod mcts;
pub mod node;
pub mod tree;

pub use infer::{Model, ModelError, UniformModel};
pub use mcts::{tree_policy_from_visits, Decision, Mcts, MctsConfig, MctsError};
pub use node::{EdgeStats, Node, NodeArena, NodeId};
pub use tree::SearchTree;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}

#[cfg(test)]
mod test_env;
