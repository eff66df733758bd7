//! The KAD usage model.
//!
//! A stochastic model after Karresand, Axelsson and Dyrkolbotn: every
//! step is one of four operation families (write a new file, delete a
//! file, extend a file, shrink a file) drawn with configured weights,
//! with all sizes expressed in multiples of a chunk size.
//!
//! On top of the weighted draw sits a hysteresis throttle over the usage
//! ratio. Dropping below the write band forces writes until usage
//! recovers past the band's stop threshold; climbing above the delete
//! band forces deletions until usage falls back below its stop
//! threshold. This keeps long runs oscillating inside a target fill
//! range instead of drifting to an empty or saturated volume.

use tracing::{debug, warn};

use crate::config::KadConfig;
use crate::error::SimulationResult;
use crate::operation::Operation;
use crate::rng::{sim_random_range, sim_weighted_index};
use crate::state::{PathFilter, SimulatedState};

use super::{UsageModel, MAX_GENERATION_ATTEMPTS};

/// Throttle state of the KAD hysteresis bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleMode {
    /// No band is active; operations follow the configured weights.
    Normal,
    /// Usage fell below the write band; only writes are produced until
    /// usage reaches the band's stop threshold.
    ForceWrite,
    /// Usage climbed above the delete band; only deletions are produced
    /// until usage falls to the band's stop threshold.
    ForceDelete,
}

/// The four operation families the model chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Write,
    Delete,
    Increase,
    Decrease,
}

const OP_KINDS: [OpKind; 4] = [
    OpKind::Write,
    OpKind::Delete,
    OpKind::Increase,
    OpKind::Decrease,
];

/// Stochastic usage model with hysteresis throttling.
pub struct KadModel {
    config: KadConfig,
    mode: ThrottleMode,
    emitted: u64,
    exhausted: bool,
}

impl KadModel {
    /// Create a model from validated parameters.
    pub fn new(config: KadConfig) -> Self {
        Self {
            config,
            mode: ThrottleMode::Normal,
            emitted: 0,
            exhausted: false,
        }
    }

    /// The currently active throttle mode.
    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    /// Advance the hysteresis state machine for the current usage ratio.
    ///
    /// An active band only deactivates through its own stop threshold;
    /// from the normal state the delete band takes precedence. Entering
    /// the write band additionally requires a non-empty volume, so a
    /// fresh simulation starts under the configured weights rather than
    /// in a forced-write burst. A band whose start threshold sits at the
    /// edge of the usage scale can never activate.
    fn update_mode(&mut self, state: &SimulatedState) {
        let usage = state.usage_ratio();
        let previous = self.mode;
        self.mode = match self.mode {
            ThrottleMode::ForceDelete if usage <= self.config.delete_limit.stop => {
                ThrottleMode::Normal
            }
            ThrottleMode::ForceDelete => ThrottleMode::ForceDelete,
            ThrottleMode::ForceWrite if usage >= self.config.write_limit.stop => {
                ThrottleMode::Normal
            }
            ThrottleMode::ForceWrite => ThrottleMode::ForceWrite,
            ThrottleMode::Normal if usage > self.config.delete_limit.start => {
                ThrottleMode::ForceDelete
            }
            ThrottleMode::Normal if usage > 0.0 && usage < self.config.write_limit.start => {
                ThrottleMode::ForceWrite
            }
            ThrottleMode::Normal => ThrottleMode::Normal,
        };
        if self.mode != previous {
            debug!(
                usage,
                from = ?previous,
                to = ?self.mode,
                "throttle mode changed"
            );
        }
    }

    fn is_eligible(&self, kind: OpKind, state: &SimulatedState) -> bool {
        let chunk = self.config.chunk_size;
        match kind {
            OpKind::Write => state.free_space() >= chunk,
            OpKind::Delete => state.any_matching(&PathFilter::files()),
            OpKind::Increase => {
                state.free_space() >= chunk && state.any_matching(&PathFilter::files())
            }
            OpKind::Decrease => state.any_matching(&PathFilter::files().min_size(2 * chunk)),
        }
    }

    /// Pick the next operation family, honoring an active throttle band.
    fn choose_kind(&self, state: &SimulatedState) -> SimulationResult<Option<OpKind>> {
        let eligible: Vec<OpKind> = OP_KINDS
            .into_iter()
            .filter(|kind| self.is_eligible(*kind, state))
            .collect();
        if eligible.is_empty() {
            return Ok(None);
        }
        if self.mode == ThrottleMode::ForceDelete && eligible.contains(&OpKind::Delete) {
            return Ok(Some(OpKind::Delete));
        }
        if self.mode == ThrottleMode::ForceWrite && eligible.contains(&OpKind::Write) {
            return Ok(Some(OpKind::Write));
        }

        let factors = self.config.operation_factors.as_weights();
        let mut weights: Vec<u64> = eligible
            .iter()
            .map(|kind| factors[*kind as usize])
            .collect();
        if weights.iter().all(|weight| *weight == 0) {
            // All eligible families are configured away; fall back to a
            // uniform draw so the run can still make progress.
            weights = vec![1; eligible.len()];
        }
        let index = sim_weighted_index(&weights)?;
        Ok(Some(eligible[index]))
    }

    /// Draw an operation size and clamp it into `[chunk_size, budget]`.
    ///
    /// The raw size is `factor * r * chunk_size` with `factor` drawn from
    /// the weighted size factors and `r` uniform over the configured
    /// range. Oversized draws round down to the largest chunk multiple
    /// within the budget, undersized draws round up to one chunk.
    fn generate_size(&self, budget: u64) -> SimulationResult<u64> {
        let weights: Vec<u64> = self
            .config
            .size_factors
            .iter()
            .map(|factor| factor.weight)
            .collect();
        let factor = self.config.size_factors[sim_weighted_index(&weights)?].size;
        let r = sim_random_range(self.config.random_range.as_range());
        let chunk = self.config.chunk_size;

        let mut size = factor.saturating_mul(r).saturating_mul(chunk);
        if size > budget {
            size = budget / chunk * chunk;
        }
        if size < chunk {
            size = chunk;
        }
        Ok(size)
    }

    /// Turn a chosen family into a concrete operation, or `None` when the
    /// state offers no fitting target (the caller retries).
    fn materialize(
        &self,
        kind: OpKind,
        state: &SimulatedState,
    ) -> SimulationResult<Option<Operation>> {
        let chunk = self.config.chunk_size;
        let op = match kind {
            OpKind::Write => state.nonexistent_path(None).map(|path| Operation::Write {
                path,
                size: 0,
                chunked: true,
                chunk_size: chunk,
            }),
            OpKind::Delete => state
                .random_entry(&PathFilter::files())
                .map(|entry| Operation::Remove {
                    path: entry.path.clone(),
                }),
            OpKind::Increase => {
                state
                    .random_entry(&PathFilter::files())
                    .map(|entry| Operation::Extend {
                        path: entry.path.clone(),
                        delta: 0,
                        chunked: true,
                        chunk_size: chunk,
                    })
            }
            OpKind::Decrease => state
                .random_entry(&PathFilter::files().min_size(2 * chunk))
                .map(|entry| Operation::Shrink {
                    path: entry.path.clone(),
                    delta: entry.size,
                }),
        };
        let Some(op) = op else {
            return Ok(None);
        };
        // Fill in the size once a target is fixed, so the budget is known.
        let op = match op {
            Operation::Write {
                path,
                chunked,
                chunk_size,
                ..
            } => Operation::Write {
                path,
                size: self.generate_size(state.free_space())?,
                chunked,
                chunk_size,
            },
            Operation::Extend {
                path,
                chunked,
                chunk_size,
                ..
            } => Operation::Extend {
                path,
                delta: self.generate_size(state.free_space())?,
                chunked,
                chunk_size,
            },
            Operation::Shrink { path, delta: size } => Operation::Shrink {
                path,
                // The file keeps at least one chunk.
                delta: self.generate_size(size - chunk)?,
            },
            other => other,
        };
        Ok(Some(op))
    }
}

impl UsageModel for KadModel {
    fn name(&self) -> &'static str {
        "KAD"
    }

    fn steps(&self) -> u64 {
        self.config.steps
    }

    fn next_op(&mut self, state: &SimulatedState) -> SimulationResult<Option<Operation>> {
        if self.exhausted || self.emitted >= self.config.steps {
            return Ok(None);
        }
        self.update_mode(state);

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let Some(kind) = self.choose_kind(state)? else {
                break;
            };
            if let Some(op) = self.materialize(kind, state)? {
                self.emitted += 1;
                return Ok(Some(op));
            }
        }
        warn!(
            used = state.used(),
            capacity = state.capacity(),
            "no operation fits the current state; ending the run early"
        );
        self.exhausted = true;
        Ok(None)
    }
}
