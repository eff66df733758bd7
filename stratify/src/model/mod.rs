//! Usage models.
//!
//! A usage model decides, step by step, which operation happens next on
//! the simulated file system. Models only read [`SimulatedState`] and
//! draw randomness from the simulation RNG; they never touch the real
//! file system, which keeps every decision reproducible under a seed.

use crate::config::UsageModelConfig;
use crate::error::SimulationResult;
use crate::operation::Operation;
use crate::playbook::Playbook;
use crate::state::SimulatedState;

mod kad;
mod probabilistic;
mod replay;

pub use kad::{KadModel, ThrottleMode};
pub use probabilistic::ProbabilisticModel;
pub use replay::ReplayModel;

/// Upper bound on rejected candidate operations per step.
///
/// The stochastic models generate and discard candidates that do not fit
/// the current state (full volume, no suitable file). Hitting this bound
/// means the state supports none of the model's operations; the model
/// then reports itself exhausted rather than spinning forever.
pub const MAX_GENERATION_ATTEMPTS: u32 = 100;

/// A source of simulated file system operations.
pub trait UsageModel {
    /// Short human-readable model name for logs.
    fn name(&self) -> &'static str;

    /// Number of steps the model intends to produce.
    fn steps(&self) -> u64;

    /// Produce the next operation, or `Ok(None)` when the model is
    /// exhausted.
    ///
    /// Exhaustion is a normal end of the run, not an error: a replay
    /// runs out of playbook lines, a stochastic model completes its
    /// configured steps or finds no operation that fits the state.
    fn next_op(&mut self, state: &SimulatedState) -> SimulationResult<Option<Operation>>;
}

/// Build the usage model described by a validated configuration.
///
/// For playbook replay this loads and validates the playbook file
/// eagerly, so a malformed playbook fails here and not mid-run.
pub fn build_model(config: &UsageModelConfig) -> SimulationResult<Box<dyn UsageModel>> {
    config.validate()?;
    match config {
        UsageModelConfig::Probabilistic(params) => {
            Ok(Box::new(ProbabilisticModel::new(params.clone())))
        }
        UsageModelConfig::Kad(params) => Ok(Box::new(KadModel::new(params.clone()))),
        UsageModelConfig::Playbook(params) => {
            let playbook = Playbook::load(&params.path)?;
            Ok(Box::new(ReplayModel::new(playbook)))
        }
    }
}
