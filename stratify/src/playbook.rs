//! Playbook persistence.
//!
//! A playbook is a plain-text file with one operation per line, in the
//! exact format produced by [`Operation`]'s `Display` implementation.
//! Blank lines and lines starting with `#` are ignored. Loading is
//! strict: the first malformed line aborts with its 1-based raw line
//! number, and a playbook without a single operation is rejected, so a
//! replay never starts from a half-valid file.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{SimulationError, SimulationResult};
use crate::operation::Operation;

/// A fully validated sequence of operations loaded from a playbook file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playbook {
    operations: Vec<Operation>,
}

impl Playbook {
    /// Load and validate a playbook from a file.
    pub fn load(path: &Path) -> SimulationResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load and validate a playbook from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> SimulationResult<Self> {
        let mut operations = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let operation = Operation::parse_line(trimmed).map_err(|reason| {
                SimulationError::InvalidPlaybookLine {
                    line: index + 1,
                    reason,
                }
            })?;
            operations.push(operation);
        }
        if operations.is_empty() {
            return Err(SimulationError::Configuration(
                "the playbook contains no operations".to_string(),
            ));
        }
        Ok(Self { operations })
    }

    /// The validated operations in playbook order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of operations in the playbook.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the playbook holds no operations (never true for a loaded
    /// playbook).
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Consume the playbook, yielding its operations.
    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }
}

/// Incremental playbook writer used to record a simulation as it runs.
///
/// Each appended operation becomes one line; the writer flushes after
/// every line so a crashed run still leaves a replayable prefix behind.
#[derive(Debug)]
pub struct PlaybookWriter<W: Write> {
    sink: W,
}

impl PlaybookWriter<BufWriter<File>> {
    /// Create (or truncate) a playbook file at `path`.
    pub fn create(path: &Path) -> SimulationResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PlaybookWriter<W> {
    /// Record operations into an arbitrary sink.
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Append one operation as a playbook line.
    pub fn append(&mut self, operation: &Operation) -> SimulationResult<()> {
        writeln!(self.sink, "{operation}")?;
        self.sink.flush()?;
        Ok(())
    }

    /// Finish writing and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
