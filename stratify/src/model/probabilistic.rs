//! The probabilistic usage model.
//!
//! Each step picks uniformly among the operation kinds that make sense
//! for the current occupancy of the volume (an empty tree can only gain
//! entries, a tree without files cannot be extended) and then fills in
//! random but valid targets and sizes. Candidates that do not fit the
//! state, such as a copy that would overflow the volume, are discarded
//! and redrawn up to the shared attempt bound.

use tracing::warn;

use crate::config::ProbabilisticConfig;
use crate::error::SimulationResult;
use crate::operation::{Operation, DEFAULT_CHUNK_SIZE};
use crate::rng::{sim_choose, sim_random_f64, sim_random_range};
use crate::state::{Occupancy, PathFilter, PathKind, SimulatedState};

use super::{UsageModel, MAX_GENERATION_ATTEMPTS};

/// Probability of overwriting an existing file instead of creating a new
/// one, and of reusing an existing path as a copy or move target.
const REUSE_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Mkdir,
    Write,
    Extend,
    Copy,
    Move,
    Remove,
}

/// Occupancy-driven random usage model.
pub struct ProbabilisticModel {
    config: ProbabilisticConfig,
    emitted: u64,
    exhausted: bool,
}

impl ProbabilisticModel {
    /// Create a model from validated parameters.
    pub fn new(config: ProbabilisticConfig) -> Self {
        Self {
            config,
            emitted: 0,
            exhausted: false,
        }
    }

    fn valid_kinds(occupancy: Occupancy) -> &'static [OpKind] {
        match occupancy {
            Occupancy::Empty => &[OpKind::Mkdir, OpKind::Write],
            Occupancy::DirectoriesOnly => &[
                OpKind::Mkdir,
                OpKind::Write,
                OpKind::Copy,
                OpKind::Move,
                OpKind::Remove,
            ],
            Occupancy::FilesOnly | Occupancy::Mixed => &[
                OpKind::Mkdir,
                OpKind::Write,
                OpKind::Extend,
                OpKind::Copy,
                OpKind::Move,
                OpKind::Remove,
            ],
        }
    }

    /// Build one candidate operation, or `None` when the drawn kind does
    /// not fit the current state and another attempt is needed.
    fn generate(&self, state: &SimulatedState) -> SimulationResult<Option<Operation>> {
        let kinds = Self::valid_kinds(state.occupancy());
        let Some(kind) = sim_choose(kinds).copied() else {
            return Ok(None);
        };
        let candidate = match kind {
            OpKind::Mkdir => state
                .nonexistent_path(None)
                .map(|path| Operation::Mkdir { path }),
            OpKind::Write => self.generate_write(state),
            OpKind::Extend => self.generate_extend(state),
            OpKind::Copy | OpKind::Move => self.generate_transfer(state, kind == OpKind::Move),
            OpKind::Remove => state
                .random_entry(&PathFilter::any())
                .map(|entry| Operation::Remove {
                    path: entry.path.clone(),
                }),
        };
        Ok(candidate)
    }

    /// Write a new file or overwrite an existing one.
    ///
    /// With less free space than the minimum file size only an overwrite
    /// can fit (the overwritten bytes are reclaimed); without any file
    /// only a new path works. Otherwise the choice is an even coin flip.
    fn generate_write(&self, state: &SimulatedState) -> Option<Operation> {
        let has_files = state.any_matching(&PathFilter::files());
        let must_overwrite = state.free_space() < self.config.file_size_min;
        let overwrite = if must_overwrite {
            true
        } else if !has_files {
            false
        } else {
            sim_random_f64() < REUSE_PROBABILITY
        };
        if overwrite && !has_files {
            return None;
        }

        let (path, reclaimed) = if overwrite {
            let entry = state.random_entry(&PathFilter::files())?;
            (entry.path.clone(), entry.size)
        } else {
            (state.nonexistent_path(None)?, 0)
        };

        let budget = state.free_space() + reclaimed;
        let upper = self.config.file_size_max.min(budget);
        if upper < 1 {
            return None;
        }
        let lower = self.config.file_size_min.min(upper);
        Some(Operation::Write {
            path,
            size: sim_random_range(lower..=upper),
            chunked: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    fn generate_extend(&self, state: &SimulatedState) -> Option<Operation> {
        let entry = state.random_entry(
            &PathFilter::files().size_below(self.config.file_size_max),
        )?;
        let headroom = (self.config.file_size_max - entry.size).min(state.free_space());
        if headroom < 1 {
            return None;
        }
        Some(Operation::Extend {
            path: entry.path.clone(),
            delta: sim_random_range(1..=headroom),
            chunked: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Build a copy or move candidate.
    ///
    /// The target is either a fresh path or, with even odds, an existing
    /// entry of the source's kind (overwriting a file, or placing the
    /// source inside a directory). The candidate is validated against a
    /// scratch copy of the state; a candidate the state rejects, for
    /// example a copy that would overflow the volume or a merge hitting
    /// a kind conflict, is discarded.
    fn generate_transfer(&self, state: &SimulatedState, is_move: bool) -> Option<Operation> {
        let source = state.random_entry(&PathFilter::any())?.clone();

        let mut existing_filter = match source.kind {
            PathKind::File => PathFilter::files(),
            PathKind::Directory => PathFilter::directories(),
        };
        existing_filter = existing_filter.exclude(&source.path);
        if source.kind == PathKind::Directory {
            existing_filter = existing_filter.skip_subtree_of(&source.path);
        }

        let reuse_existing =
            sim_random_f64() < REUSE_PROBABILITY && state.any_matching(&existing_filter);
        let target = if reuse_existing {
            state.random_entry(&existing_filter)?.path.clone()
        } else {
            let skip = match source.kind {
                PathKind::Directory => Some(source.path.as_str()),
                PathKind::File => None,
            };
            state.nonexistent_path(skip)?
        };

        let op = if is_move {
            Operation::Move {
                source: source.path,
                target,
            }
        } else {
            Operation::Copy {
                source: source.path,
                target,
            }
        };
        let mut scratch = state.clone();
        scratch.apply(&op).ok()?;
        Some(op)
    }
}

impl UsageModel for ProbabilisticModel {
    fn name(&self) -> &'static str {
        "Probabilistic"
    }

    fn steps(&self) -> u64 {
        self.config.steps
    }

    fn next_op(&mut self, state: &SimulatedState) -> SimulationResult<Option<Operation>> {
        if self.exhausted || self.emitted >= self.config.steps {
            return Ok(None);
        }
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            if let Some(op) = self.generate(state)? {
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
