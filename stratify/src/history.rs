//! The simulation log.
//!
//! Every successfully executed step appends one [`LogEntry`] pairing the
//! operation with the observer's capture of the resulting file system.
//! Entry ids start at 1 and grow monotonically, so a prefix of the log
//! (a "stratum") identifies the file system as it was after step `n`.

use serde::Serialize;

use crate::operation::Operation;

/// One executed step of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// 1-based step number.
    pub id: u64,
    /// The operation that was executed.
    pub operation: Operation,
    /// The observer's snapshot taken after execution.
    pub capture: serde_json::Value,
}

/// Append-only log of executed operations and their captures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    entries: Vec<LogEntry>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an executed operation and its capture, assigning the next id.
    pub fn append(&mut self, operation: Operation, capture: serde_json::Value) -> &LogEntry {
        let id = self.entries.len() as u64 + 1;
        self.entries.push(LogEntry {
            id,
            operation,
            capture,
        });
        // Just pushed, so the list is non-empty.
        &self.entries[self.entries.len() - 1]
    }

    /// All entries in execution order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The prefix of the log up to and including step `n`.
    pub fn stratum(&self, n: u64) -> &[LogEntry] {
        let end = (n as usize).min(self.entries.len());
        &self.entries[..end]
    }

    /// Number of executed steps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no step has executed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
