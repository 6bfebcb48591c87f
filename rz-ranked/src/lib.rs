//! rz-ranked: ranked-rewards (R2) reshaping of terminal rewards.
//!
//! A terminal return is replaced by `+1.0` if it reaches the configured percentile of recent
//! returns and `-1.0` otherwise. The wrapper keeps the buffer inside its snapshot so a replayed
//! search state normalizes exactly as it did the first time.

pub mod buffer;
pub mod wrapper;

pub use buffer::{RankedError, RankedRewardsBuffer};
pub use wrapper::{RankedRewardsEnv, RankedState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
