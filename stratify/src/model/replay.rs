//! Deterministic replay of a recorded playbook.

use crate::error::SimulationResult;
use crate::operation::Operation;
use crate::playbook::Playbook;
use crate::state::SimulatedState;

use super::UsageModel;

/// Usage model that replays a pre-validated playbook verbatim.
#[derive(Debug)]
pub struct ReplayModel {
    operations: Vec<Operation>,
    cursor: usize,
}

impl ReplayModel {
    /// Replay the operations of a loaded playbook.
    pub fn new(playbook: Playbook) -> Self {
        Self {
            operations: playbook.into_operations(),
            cursor: 0,
        }
    }
}

impl UsageModel for ReplayModel {
    fn name(&self) -> &'static str {
        "Playbook"
    }

    fn steps(&self) -> u64 {
        self.operations.len() as u64
    }

    fn next_op(&mut self, _state: &SimulatedState) -> SimulationResult<Option<Operation>> {
        let next = self.operations.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }
}
