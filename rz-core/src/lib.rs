//! rz-core: environment protocol, configuration schema and the DiceRace reference environment.

pub mod config;
pub mod dice_race;
pub mod env;

pub use config::{Config, ConfigError, EmptyBufferPolicy};
pub use dice_race::{DiceRace, DiceRaceAction, DiceRaceParams, DiceRaceState};
pub use env::{Action, EnvError, Environment, Info, Observation, Step};

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
