//! The simulation engine.
//!
//! [`Simulation`] drives one run: it seeds the RNG, then repeatedly asks
//! the usage model for the next operation, applies it to the simulated
//! state, hands it to the executor for physical execution, captures the
//! result through the observer and logs the step. The loop ends when the
//! model is exhausted, the cancel token fires, or a step fails.
//!
//! The engine itself is synchronous and single threaded; only the cancel
//! token is shared across threads, so a signal handler or supervising
//! thread can stop a run between steps.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::history::History;
use crate::model::{build_model, UsageModel};
use crate::operation::Operation;
use crate::playbook::PlaybookWriter;
use crate::rng::set_sim_seed;
use crate::state::SimulatedState;

/// Executes operations against the real target, e.g. a mounted volume.
///
/// The engine applies every operation to the simulated state before
/// calling this, so an executor may assume the operation is valid.
pub trait Executor {
    /// Execute one operation.
    fn execute(&mut self, operation: &Operation) -> SimulationResult<()>;
}

/// Captures the target after each executed operation.
///
/// The capture lands verbatim in the log entry of the step; what it
/// contains (block allocations, fragmentation metrics) is up to the
/// observer.
pub trait Observer {
    /// Take one capture of the target.
    fn capture(&mut self) -> SimulationResult<serde_json::Value>;
}

/// Executor that performs no physical work.
///
/// Used for dry runs that only produce a playbook and a history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExecutor;

impl Executor for NullExecutor {
    fn execute(&mut self, _operation: &Operation) -> SimulationResult<()> {
        Ok(())
    }
}

/// Observer that captures nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn capture(&mut self) -> SimulationResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

/// Cooperative cancellation handle for a running simulation.
///
/// Cloned tokens share one flag; cancelling any clone stops the run
/// before its next step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Summary of a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SimulationReport {
    /// Seed the run was started with.
    pub seed: u64,
    /// Number of successfully executed steps.
    pub steps_completed: u64,
    /// Whether the run ended through the cancel token.
    pub cancelled: bool,
    /// Modeled usage in bytes at the end of the run.
    pub used: u64,
    /// Capacity of the modeled volume in bytes.
    pub capacity: u64,
}

/// One simulation run over a state, a model and external collaborators.
pub struct Simulation<E: Executor, O: Observer> {
    seed: u64,
    state: SimulatedState,
    model: Box<dyn UsageModel>,
    executor: E,
    observer: O,
    history: History,
    recorder: Option<PlaybookWriter<BufWriter<File>>>,
    cancel: CancelToken,
}

impl<E: Executor, O: Observer> Simulation<E, O> {
    /// Assemble a simulation from its parts.
    pub fn new(
        seed: u64,
        state: SimulatedState,
        model: Box<dyn UsageModel>,
        executor: E,
        observer: O,
    ) -> Self {
        Self {
            seed,
            state,
            model,
            executor,
            observer,
            history: History::new(),
            recorder: None,
            cancel: CancelToken::new(),
        }
    }

    /// Assemble a simulation from a validated configuration.
    ///
    /// Builds the usage model and, if configured, opens the playbook
    /// recording file.
    pub fn from_config(
        config: &SimulationConfig,
        state: SimulatedState,
        executor: E,
        observer: O,
    ) -> SimulationResult<Self> {
        config.validate()?;
        let model = build_model(&config.usage_model)?;
        let mut simulation = Self::new(config.seed, state, model, executor, observer);
        if let Some(path) = &config.write_playbook {
            simulation.record_to(path)?;
        }
        Ok(simulation)
    }

    /// Record every executed operation to a playbook file at `path`.
    pub fn record_to(&mut self, path: &Path) -> SimulationResult<()> {
        self.recorder = Some(PlaybookWriter::create(path)?);
        Ok(())
    }

    /// Use an externally created cancel token for this run.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// A token that cancels this run when fired.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The simulated state as of the last executed step.
    pub fn state(&self) -> &SimulatedState {
        &self.state
    }

    /// The log of executed steps.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run until the model is exhausted, the token cancels, or a step
    /// fails.
    ///
    /// A step failure aborts the run with [`SimulationError::StepFailed`];
    /// the history and state keep everything up to the last successful
    /// step, so the failure is reproducible from the seed and the log.
    pub fn run(&mut self) -> SimulationResult<SimulationReport> {
        set_sim_seed(self.seed);
        info!(
            seed = self.seed,
            model = self.model.name(),
            steps = self.model.steps(),
            capacity = self.state.capacity(),
            "starting simulation"
        );

        let mut cancelled = false;
        loop {
            if self.cancel.is_cancelled() {
                info!(steps = self.history.len(), "simulation cancelled");
                cancelled = true;
                break;
            }
            let Some(operation) = self.model.next_op(&self.state)? else {
                break;
            };
            let step = self.history.len() as u64 + 1;
            self.execute_step(&operation)
                .map_err(|err| SimulationError::StepFailed {
                    step,
                    operation: operation.to_string(),
                    reason: Box::new(err),
                })?;
            debug!(step, operation = %operation, used = self.state.used(), "executed step");
        }

        let report = SimulationReport {
            seed: self.seed,
            steps_completed: self.history.len() as u64,
            cancelled,
            used: self.state.used(),
            capacity: self.state.capacity(),
        };
        info!(
            steps = report.steps_completed,
            used = report.used,
            "simulation finished"
        );
        Ok(report)
    }

    fn execute_step(&mut self, operation: &Operation) -> SimulationResult<()> {
        self.state.apply(operation)?;
        self.executor.execute(operation)?;
        let capture = self.observer.capture()?;
        if let Some(recorder) = &mut self.recorder {
            recorder.append(operation)?;
        }
        self.history.append(operation.clone(), capture);
        Ok(())
    }
}
