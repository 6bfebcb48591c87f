//! Episode runtime: drives the planner along the real trajectory, one decision per step.

pub mod episode;

pub use episode::{Episode, EpisodeLogs, EpisodeRunner, RunnerError, Transition};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
