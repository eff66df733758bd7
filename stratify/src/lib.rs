//! Simulation core for generating realistically aged file systems.
//!
//! A simulation run pairs a [`SimulatedState`] (the in-memory model of
//! the target volume) with a [`UsageModel`] that decides, step by step,
//! which operation happens next. The [`Simulation`] engine applies each
//! operation to the model, delegates physical execution to an
//! [`Executor`], captures the result through an [`Observer`] and keeps
//! an append-only [`History`] of the run.
//!
//! Three usage models are provided: a [`ProbabilisticModel`] drawing
//! uniformly among the operations the current occupancy allows, a
//! [`KadModel`] with weighted operation families and hysteresis
//! throttling over the usage ratio, and a [`ReplayModel`] that replays a
//! recorded [`Playbook`] verbatim.
//!
//! Every stochastic decision goes through the seeded thread-local
//! simulation RNG, so a run is fully reproducible: the same seed and
//! configuration yield the same operation sequence, and recording a run
//! as a playbook and replaying it produces an identical history.
//!
//! ```
//! use stratify::{
//!     NullExecutor, NullObserver, ProbabilisticConfig, SimulatedState, Simulation,
//!     SimulationConfig, UsageModelConfig,
//! };
//!
//! let config = SimulationConfig {
//!     seed: 42,
//!     write_playbook: None,
//!     usage_model: UsageModelConfig::Probabilistic(ProbabilisticConfig {
//!         steps: 100,
//!         file_size_min: 4096,
//!         file_size_max: 1_048_576,
//!     }),
//! };
//! let state = SimulatedState::new(256 * 1024 * 1024);
//! let mut simulation =
//!     Simulation::from_config(&config, state, NullExecutor, NullObserver).unwrap();
//! let report = simulation.run().unwrap();
//! assert_eq!(report.seed, 42);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod operation;
pub mod playbook;
pub mod rng;
pub mod state;

pub use config::{
    KadConfig, Limit, OperationFactors, PlaybookConfig, ProbabilisticConfig, RandomRange,
    SimulationConfig, SizeFactor, UsageModelConfig,
};
pub use engine::{
    CancelToken, Executor, NullExecutor, NullObserver, Observer, Simulation, SimulationReport,
};
pub use error::{SimulationError, SimulationResult};
pub use history::{History, LogEntry};
pub use model::{
    build_model, KadModel, ProbabilisticModel, ReplayModel, ThrottleMode, UsageModel,
    MAX_GENERATION_ATTEMPTS,
};
pub use operation::{parse_size, Operation, DEFAULT_CHUNK_SIZE};
pub use playbook::{Playbook, PlaybookWriter};
pub use rng::{get_current_sim_seed, reset_sim_rng, set_sim_seed};
pub use state::{
    Occupancy, PathFilter, PathKind, PrepopulationEntry, SimulatedPath, SimulatedState,
};
