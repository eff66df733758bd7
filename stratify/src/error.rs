//! Error taxonomy of the simulation core.

use thiserror::Error;

/// Errors that can occur while preparing or running a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// An operation referenced a path that does not exist in the model.
    #[error("source path does not exist: {0}")]
    SourceNotFound(String),
    /// An operation would place an entry of one kind on top of an
    /// incompatible existing entry (e.g. a directory onto a file).
    #[error("target kind mismatch: {0}")]
    TargetKindMismatch(String),
    /// An operation would push the modeled usage beyond the volume capacity.
    ///
    /// Usage models must never emit such an operation; seeing this error
    /// at runtime indicates a bug in a model implementation.
    #[error("capacity exceeded: operation needs {requested} bytes but only {free} are free")]
    CapacityExceeded {
        /// Bytes the operation would add to the modeled usage.
        requested: u64,
        /// Bytes still free on the modeled volume.
        free: u64,
    },
    /// An operation violated a structural precondition of the state model.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    /// A persisted playbook line could not be parsed into an operation.
    ///
    /// Raised once, eagerly, during playbook validation; the line number
    /// is 1-based and counts raw file lines including comments.
    #[error("invalid playbook line {line}: {reason}")]
    InvalidPlaybookLine {
        /// 1-based line number of the first offending line.
        line: usize,
        /// Why the line was rejected.
        reason: String,
    },
    /// A usage-model or simulation parameter failed validation.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The external executor or observer reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),
    /// An I/O error occurred while reading or writing a playbook.
    #[error("I/O error: {0}")]
    Io(String),
    /// A simulation step failed; carries enough context to reproduce.
    #[error("step {step} ({operation}) failed: {reason}")]
    StepFailed {
        /// 1-based index of the failing step.
        step: u64,
        /// Playbook-line rendering of the failing operation.
        operation: String,
        /// The underlying error.
        reason: Box<SimulationError>,
    },
}

/// A type alias for `Result<T, SimulationError>`.
pub type SimulationResult<T> = Result<T, SimulationError>;

impl From<std::io::Error> for SimulationError {
    fn from(err: std::io::Error) -> Self {
        SimulationError::Io(err.to_string())
    }
}
