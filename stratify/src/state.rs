//! In-memory model of the simulated file system.
//!
//! [`SimulatedState`] is the authoritative view the usage models decide
//! against: the tree of paths, their sizes, and the aggregate capacity
//! usage. It never touches disk; the engine applies every operation here
//! *before* delegating physical execution, so decisions are always based
//! on a consistent, up-to-date view.
//!
//! Entries live in a `BTreeMap` keyed by normalized absolute path. The
//! deterministic iteration order matters: seeded random selection over the
//! entries must be reproducible across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};
use crate::operation::{normalize_path, Operation};
use crate::rng::{sim_choose, sim_random_range};

/// Number of attempts to find an unused random path before giving up.
const MAX_TRIES_FOR_NONEXISTENT_PATH: usize = 100_000;

/// Length of randomly generated file and directory names.
const RANDOM_NAME_LENGTH: usize = 8;

/// The kind of a simulated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// Classification of the current occupancy of the simulated file system.
///
/// Only mutable entries count; prepopulated immutable entries are invisible
/// to the usage models and therefore to this classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// No mutable files or directories exist.
    Empty,
    /// Only directories exist.
    DirectoriesOnly,
    /// Only regular files exist.
    FilesOnly,
    /// Both files and directories exist.
    Mixed,
}

/// One file or directory in the simulated state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedPath {
    /// Normalized absolute path within the simulated root.
    pub path: String,
    /// Whether this is a file or a directory.
    pub kind: PathKind,
    /// Size in bytes; always 0 for directories.
    pub size: u64,
    /// Whether simulation-driven operations may select this entry.
    ///
    /// Prepopulated entries are immutable: they occupy capacity but are
    /// never chosen as a source or target by a usage model.
    pub mutable: bool,
}

/// One entry of a prepopulation dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepopulationEntry {
    /// Path of the entry, relative to or absolute within the simulated root.
    pub path: String,
    /// Whether the entry is a file or a directory.
    pub kind: PathKind,
    /// File size in bytes (ignored for directories).
    pub size: u64,
}

/// Filter criteria for selecting entries from the simulated state.
///
/// Only mutable entries ever match. Size bounds apply to files; a filter
/// with size bounds never matches a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFilter<'a> {
    kind: Option<PathKind>,
    min_size: u64,
    size_below: Option<u64>,
    exclude: Option<&'a str>,
    skip_subtree_of: Option<&'a str>,
}

impl<'a> PathFilter<'a> {
    /// Match any mutable file or directory.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match mutable regular files.
    pub fn files() -> Self {
        Self {
            kind: Some(PathKind::File),
            ..Self::default()
        }
    }

    /// Match mutable directories.
    pub fn directories() -> Self {
        Self {
            kind: Some(PathKind::Directory),
            ..Self::default()
        }
    }

    /// Require a minimum file size in bytes.
    pub fn min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Require the file size to be strictly below the given bound.
    pub fn size_below(mut self, bound: u64) -> Self {
        self.size_below = Some(bound);
        self
    }

    /// Exclude a single path from the matches.
    pub fn exclude(mut self, path: &'a str) -> Self {
        self.exclude = Some(path);
        self
    }

    /// Exclude a directory and everything below it from the matches.
    pub fn skip_subtree_of(mut self, path: &'a str) -> Self {
        self.skip_subtree_of = Some(path);
        self
    }

    fn matches(&self, entry: &SimulatedPath) -> bool {
        if !entry.mutable {
            return false;
        }
        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }
        match entry.kind {
            PathKind::File => {
                if entry.size < self.min_size {
                    return false;
                }
                if let Some(bound) = self.size_below {
                    if entry.size >= bound {
                        return false;
                    }
                }
            }
            PathKind::Directory => {
                if self.min_size > 0 || self.size_below.is_some() {
                    return false;
                }
            }
        }
        if let Some(excluded) = self.exclude {
            if entry.path == excluded {
                return false;
            }
        }
        if let Some(root) = self.skip_subtree_of {
            if entry.path == root || is_within(&entry.path, root) {
                return false;
            }
        }
        true
    }
}

/// The complete simulated file system state.
#[derive(Debug, Clone)]
pub struct SimulatedState {
    capacity: u64,
    used: u64,
    paths: BTreeMap<String, SimulatedPath>,
}

impl SimulatedState {
    /// Create an empty state for a volume of the given capacity in bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            used: 0,
            paths: BTreeMap::new(),
        }
    }

    /// Seed the state from a prepopulation dataset.
    ///
    /// All inserted entries (including implicitly created ancestor
    /// directories) are marked immutable: they occupy capacity but are
    /// never selected by a usage model. Fails if an entry collides with an
    /// existing path of a different kind or the dataset exceeds capacity.
    pub fn prepopulate(&mut self, entries: &[PrepopulationEntry]) -> SimulationResult<()> {
        for entry in entries {
            let path = normalize_path(&entry.path);
            if path == "/" {
                continue;
            }
            self.insert_immutable_ancestors(&path)?;
            match (self.paths.get(&path), entry.kind) {
                (Some(existing), kind) if existing.kind != kind => {
                    return Err(SimulationError::TargetKindMismatch(format!(
                        "prepopulation entry \"{path}\" collides with an existing {:?}",
                        existing.kind
                    )));
                }
                (Some(_), _) => {}
                (None, kind) => {
                    let size = match kind {
                        PathKind::File => entry.size,
                        PathKind::Directory => 0,
                    };
                    if self.used + size > self.capacity {
                        return Err(SimulationError::CapacityExceeded {
                            requested: size,
                            free: self.capacity - self.used,
                        });
                    }
                    self.used += size;
                    self.paths.insert(
                        path.clone(),
                        SimulatedPath {
                            path,
                            kind,
                            size,
                            mutable: false,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Total capacity of the modeled volume in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Sum of all file sizes currently in the model.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Free space in bytes.
    pub fn free_space(&self) -> u64 {
        self.capacity - self.used
    }

    /// Current usage ratio `used / capacity` in `[0.0, 1.0]`.
    pub fn usage_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        self.used as f64 / self.capacity as f64
    }

    /// Whether the given path exists in the model (the root always does).
    pub fn contains(&self, path: &str) -> bool {
        path == "/" || self.paths.contains_key(path)
    }

    /// The kind of the entry at `path`, if it exists.
    pub fn kind_of(&self, path: &str) -> Option<PathKind> {
        if path == "/" {
            return Some(PathKind::Directory);
        }
        self.paths.get(path).map(|entry| entry.kind)
    }

    /// The size in bytes of the entry at `path`, if it exists.
    pub fn size_of(&self, path: &str) -> Option<u64> {
        self.paths.get(path).map(|entry| entry.size)
    }

    /// Total size of all files at or below `path`.
    pub fn subtree_size(&self, path: &str) -> u64 {
        self.subtree(path)
            .map(|entry| match entry.kind {
                PathKind::File => entry.size,
                PathKind::Directory => 0,
            })
            .sum()
    }

    /// Number of mutable entries of the given kind.
    pub fn count_of(&self, kind: PathKind) -> usize {
        self.paths
            .values()
            .filter(|entry| entry.mutable && entry.kind == kind)
            .count()
    }

    /// Total number of entries, immutable ones included.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the model holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &SimulatedPath> {
        self.paths.values()
    }

    /// Classify the current occupancy over mutable entries.
    pub fn occupancy(&self) -> Occupancy {
        let mut has_file = false;
        let mut has_dir = false;
        for entry in self.paths.values().filter(|entry| entry.mutable) {
            match entry.kind {
                PathKind::File => has_file = true,
                PathKind::Directory => has_dir = true,
            }
            if has_file && has_dir {
                break;
            }
        }
        match (has_file, has_dir) {
            (false, false) => Occupancy::Empty,
            (false, true) => Occupancy::DirectoriesOnly,
            (true, false) => Occupancy::FilesOnly,
            (true, true) => Occupancy::Mixed,
        }
    }

    /// Whether any mutable entry matches the filter.
    pub fn any_matching(&self, filter: &PathFilter<'_>) -> bool {
        self.paths.values().any(|entry| filter.matches(entry))
    }

    /// Select a uniformly random entry matching the filter.
    ///
    /// Draws from the simulation RNG; returns `None` when nothing matches.
    pub fn random_entry(&self, filter: &PathFilter<'_>) -> Option<&SimulatedPath> {
        let candidates: Vec<&SimulatedPath> = self
            .paths
            .values()
            .filter(|entry| filter.matches(entry))
            .collect();
        sim_choose(&candidates).copied()
    }

    /// Return a valid but nonexistent path somewhere in the tree.
    ///
    /// The parent is a uniformly random mutable directory (the root when
    /// none exists, or when `skip_subtree_of` excludes them all) and the
    /// final component is a random lowercase name. Returns `None` if no
    /// unused name is found within the retry bound.
    pub fn nonexistent_path(&self, skip_subtree_of: Option<&str>) -> Option<String> {
        for _ in 0..MAX_TRIES_FOR_NONEXISTENT_PATH {
            let mut filter = PathFilter::directories();
            if let Some(root) = skip_subtree_of {
                filter = filter.skip_subtree_of(root);
            }
            let parent = self
                .random_entry(&filter)
                .map(|entry| entry.path.as_str())
                .unwrap_or("/");
            let candidate = join(parent, &random_name(RANDOM_NAME_LENGTH));
            if !self.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Apply an operation, mutating the tree and the usage counters.
    ///
    /// Fails without modifying anything if the operation's preconditions
    /// are violated. Usage models must only emit valid operations, so in a
    /// healthy simulation this never fails; the engine still calls it
    /// defensively before every physical execution.
    pub fn apply(&mut self, op: &Operation) -> SimulationResult<()> {
        match op {
            Operation::Mkdir { path } => self.apply_mkdir(path),
            Operation::Write { path, size, .. } => self.apply_write(path, *size),
            Operation::Extend { path, delta, .. } => self.apply_extend(path, *delta),
            Operation::Shrink { path, delta } => self.apply_shrink(path, *delta),
            Operation::Copy { source, target } => self.apply_transfer(source, target, false),
            Operation::Move { source, target } => self.apply_transfer(source, target, true),
            Operation::Remove { path } => self.apply_remove(path),
            Operation::Time { .. } => Ok(()),
        }
    }

    fn apply_mkdir(&mut self, path: &str) -> SimulationResult<()> {
        if path == "/" || self.paths.contains_key(path) {
            return Err(SimulationError::InvalidTransition(format!(
                "mkdir target \"{path}\" already exists"
            )));
        }
        self.insert_mutable_dirs(path)
    }

    fn apply_write(&mut self, path: &str, size: u64) -> SimulationResult<()> {
        if size == 0 {
            return Err(SimulationError::InvalidTransition(
                "write size must be > 0".to_string(),
            ));
        }
        match self.kind_of(path) {
            Some(PathKind::Directory) => Err(SimulationError::TargetKindMismatch(format!(
                "cannot write file over directory \"{path}\""
            ))),
            Some(PathKind::File) => {
                let freed = self.paths[path].size;
                self.check_capacity(size, freed)?;
                self.used = self.used - freed + size;
                if let Some(entry) = self.paths.get_mut(path) {
                    entry.size = size;
                }
                Ok(())
            }
            None => {
                self.check_parent_directory(path)?;
                self.check_capacity(size, 0)?;
                self.used += size;
                self.paths.insert(
                    path.to_string(),
                    SimulatedPath {
                        path: path.to_string(),
                        kind: PathKind::File,
                        size,
                        mutable: true,
                    },
                );
                Ok(())
            }
        }
    }

    fn apply_extend(&mut self, path: &str, delta: u64) -> SimulationResult<()> {
        self.expect_file(path, "extend")?;
        self.check_capacity(delta, 0)?;
        self.used += delta;
        if let Some(entry) = self.paths.get_mut(path) {
            entry.size += delta;
        }
        Ok(())
    }

    fn apply_shrink(&mut self, path: &str, delta: u64) -> SimulationResult<()> {
        let size = self.expect_file(path, "shrink")?;
        if delta > size {
            return Err(SimulationError::InvalidTransition(format!(
                "shrink_size {delta} is greater than the size of \"{path}\" ({size})"
            )));
        }
        self.used -= delta;
        if let Some(entry) = self.paths.get_mut(path) {
            entry.size -= delta;
        }
        Ok(())
    }

    fn apply_remove(&mut self, path: &str) -> SimulationResult<()> {
        if !self.paths.contains_key(path) {
            return Err(SimulationError::SourceNotFound(path.to_string()));
        }
        let doomed: Vec<String> = self.subtree(path).map(|entry| entry.path.clone()).collect();
        for key in doomed {
            if let Some(entry) = self.paths.remove(&key) {
                if entry.kind == PathKind::File {
                    self.used -= entry.size;
                }
            }
        }
        Ok(())
    }

    /// Shared implementation of Copy and Move.
    ///
    /// Mirrors recursive `cp`/`mv` semantics: a source placed onto an
    /// existing directory lands *inside* it under the source's final name;
    /// file-over-file overwrites; directory trees merge into existing
    /// directories; a directory onto an existing file is a kind mismatch.
    fn apply_transfer(&mut self, source: &str, target: &str, is_move: bool) -> SimulationResult<()> {
        let source_kind = self
            .paths
            .get(source)
            .map(|entry| entry.kind)
            .ok_or_else(|| SimulationError::SourceNotFound(source.to_string()))?;

        // cp/mv into an existing directory places the source inside it.
        let destination = match self.kind_of(target) {
            Some(PathKind::Directory) => join(target, basename(source)),
            _ => target.to_string(),
        };

        if destination == source {
            return Err(SimulationError::InvalidTransition(format!(
                "source and target are the same path: \"{source}\""
            )));
        }
        if source_kind == PathKind::Directory && is_within(&destination, source) {
            return Err(SimulationError::InvalidTransition(format!(
                "cannot place \"{source}\" inside its own subtree at \"{destination}\""
            )));
        }
        self.check_parent_directory(&destination)?;

        // Relative subtree snapshot: ("" for the source itself).
        let subtree: Vec<(String, PathKind, u64)> = self
            .subtree(source)
            .map(|entry| {
                let rel = entry.path[source.len()..].to_string();
                (rel, entry.kind, entry.size)
            })
            .collect();

        // Pre-validate every destination path and compute the net usage
        // delta, so the transfer either applies fully or not at all.
        let mut added = 0u64;
        let mut freed = 0u64;
        for (rel, kind, size) in &subtree {
            let dest = format!("{destination}{rel}");
            match (self.paths.get(&dest).map(|e| e.kind), kind) {
                (Some(PathKind::File), PathKind::Directory) => {
                    return Err(SimulationError::TargetKindMismatch(format!(
                        "cannot place directory over existing file \"{dest}\""
                    )));
                }
                (Some(PathKind::Directory), PathKind::File) => {
                    return Err(SimulationError::TargetKindMismatch(format!(
                        "cannot place file over existing directory \"{dest}\""
                    )));
                }
                (Some(PathKind::File), PathKind::File) => {
                    freed += self.paths[&dest].size;
                    added += size;
                }
                (Some(PathKind::Directory), PathKind::Directory) => {}
                (None, PathKind::File) => added += size,
                (None, PathKind::Directory) => {}
            }
        }
        if !is_move {
            self.check_capacity(added, freed)?;
        }

        if is_move {
            let sources: Vec<String> = self.subtree(source).map(|e| e.path.clone()).collect();
            for key in sources {
                if let Some(entry) = self.paths.remove(&key) {
                    if entry.kind == PathKind::File {
                        self.used -= entry.size;
                    }
                }
            }
        }
        for (rel, kind, size) in subtree {
            let dest = format!("{destination}{rel}");
            match kind {
                PathKind::File => {
                    if let Some(existing) = self.paths.get(&dest) {
                        self.used -= existing.size;
                    }
                    self.used += size;
                    self.paths.insert(
                        dest.clone(),
                        SimulatedPath {
                            path: dest,
                            kind,
                            size,
                            mutable: true,
                        },
                    );
                }
                PathKind::Directory => {
                    self.paths.entry(dest.clone()).or_insert(SimulatedPath {
                        path: dest,
                        kind,
                        size: 0,
                        mutable: true,
                    });
                }
            }
        }
        Ok(())
    }

    /// All entries at or below `path`, in path order.
    ///
    /// Lexicographic map order interleaves siblings like `/data.old`
    /// between `/data` and `/data/...`, so descendants are not contiguous
    /// after the root entry and must be filtered, not taken as a run.
    fn subtree<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a SimulatedPath> {
        self.paths
            .range(path.to_string()..)
            .filter(move |(key, _)| key.as_str() == path || is_within(key, path))
            .map(|(_, entry)| entry)
    }

    fn expect_file(&self, path: &str, what: &str) -> SimulationResult<u64> {
        match self.paths.get(path) {
            None => Err(SimulationError::SourceNotFound(path.to_string())),
            Some(entry) if entry.kind == PathKind::Directory => {
                Err(SimulationError::TargetKindMismatch(format!(
                    "{what} is unsupported for directories (path: \"{path}\")"
                )))
            }
            Some(entry) => Ok(entry.size),
        }
    }

    fn check_parent_directory(&self, path: &str) -> SimulationResult<()> {
        let parent = parent_of(path);
        match self.kind_of(parent) {
            Some(PathKind::Directory) => Ok(()),
            Some(PathKind::File) => Err(SimulationError::TargetKindMismatch(format!(
                "parent of \"{path}\" is a file"
            ))),
            None => Err(SimulationError::InvalidTransition(format!(
                "parent directory of \"{path}\" does not exist"
            ))),
        }
    }

    fn check_capacity(&self, added: u64, freed: u64) -> SimulationResult<()> {
        let budget = self.capacity - self.used + freed;
        if added > budget {
            return Err(SimulationError::CapacityExceeded {
                requested: added,
                free: budget,
            });
        }
        Ok(())
    }

    fn insert_mutable_dirs(&mut self, path: &str) -> SimulationResult<()> {
        for ancestor in ancestors_of(path) {
            match self.kind_of(&ancestor) {
                Some(PathKind::Directory) => {}
                Some(PathKind::File) => {
                    return Err(SimulationError::TargetKindMismatch(format!(
                        "\"{ancestor}\" exists as a file"
                    )));
                }
                None => {
                    self.paths.insert(
                        ancestor.clone(),
                        SimulatedPath {
                            path: ancestor,
                            kind: PathKind::Directory,
                            size: 0,
                            mutable: true,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn insert_immutable_ancestors(&mut self, path: &str) -> SimulationResult<()> {
        for ancestor in ancestors_of(parent_of(path)) {
            match self.kind_of(&ancestor) {
                Some(PathKind::Directory) => {}
                Some(PathKind::File) => {
                    return Err(SimulationError::TargetKindMismatch(format!(
                        "\"{ancestor}\" exists as a file"
                    )));
                }
                None => {
                    self.paths.insert(
                        ancestor.clone(),
                        SimulatedPath {
                            path: ancestor,
                            kind: PathKind::Directory,
                            size: 0,
                            mutable: false,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

/// The parent path of `path` ("/" for top-level entries and the root).
pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// The final component of `path`.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether `path` lies strictly below `ancestor`.
pub(crate) fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Join a directory path and a child name.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// All ancestors of `path` from the top down, including `path` itself,
/// excluding the root.
fn ancestors_of(path: &str) -> Vec<String> {
    if path == "/" {
        return Vec::new();
    }
    let mut result = Vec::new();
    for (idx, byte) in path.bytes().enumerate().skip(1) {
        if byte == b'/' {
            result.push(path[..idx].to_string());
        }
    }
    result.push(path.to_string());
    result
}

/// Generate a random lowercase ASCII name of the given length.
fn random_name(length: usize) -> String {
    (0..length)
        .map(|_| sim_random_range(b'a'..=b'z') as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::set_sim_seed;

    fn write(path: &str, size: u64) -> Operation {
        Operation::Write {
            path: path.to_string(),
            size,
            chunked: false,
            chunk_size: 512,
        }
    }

    fn mkdir(path: &str) -> Operation {
        Operation::Mkdir {
            path: path.to_string(),
        }
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_of("/a/b/c"), "/a/b");
        assert_eq!(parent_of("/a"), "/");
        assert_eq!(basename("/a/b/c"), "c");
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a/b", "/"));
        assert!(!is_within("/ab", "/a"));
        assert!(!is_within("/a", "/a"));
        assert_eq!(join("/", "x"), "/x");
        assert_eq!(join("/a", "x"), "/a/x");
    }

    #[test]
    fn test_mkdir_creates_ancestors() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/a/b/c")).expect("mkdir");
        assert_eq!(state.kind_of("/a"), Some(PathKind::Directory));
        assert_eq!(state.kind_of("/a/b"), Some(PathKind::Directory));
        assert_eq!(state.kind_of("/a/b/c"), Some(PathKind::Directory));
        assert_eq!(state.used(), 0);

        // Existing target is rejected.
        assert!(state.apply(&mkdir("/a/b")).is_err());
    }

    #[test]
    fn test_write_create_and_overwrite() {
        let mut state = SimulatedState::new(1000);
        state.apply(&write("/f", 400)).expect("create");
        assert_eq!(state.used(), 400);
        assert_eq!(state.size_of("/f"), Some(400));

        // Overwrite reclaims the old bytes first.
        state.apply(&write("/f", 900)).expect("overwrite");
        assert_eq!(state.used(), 900);

        // Over capacity is rejected and leaves the state untouched.
        let err = state.apply(&write("/g", 200)).unwrap_err();
        assert!(matches!(err, SimulationError::CapacityExceeded { .. }));
        assert_eq!(state.used(), 900);
    }

    #[test]
    fn test_write_requires_existing_parent() {
        let mut state = SimulatedState::new(1000);
        assert!(state.apply(&write("/missing/f", 10)).is_err());
        state.apply(&mkdir("/d")).expect("mkdir");
        state.apply(&write("/d/f", 10)).expect("write");
    }

    #[test]
    fn test_write_over_directory_is_kind_mismatch() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/d")).expect("mkdir");
        let err = state.apply(&write("/d", 10)).unwrap_err();
        assert!(matches!(err, SimulationError::TargetKindMismatch(_)));
    }

    #[test]
    fn test_extend_and_shrink() {
        let mut state = SimulatedState::new(1000);
        state.apply(&write("/f", 100)).expect("write");
        state
            .apply(&Operation::Extend {
                path: "/f".into(),
                delta: 50,
                chunked: false,
                chunk_size: 512,
            })
            .expect("extend");
        assert_eq!(state.size_of("/f"), Some(150));
        assert_eq!(state.used(), 150);

        state
            .apply(&Operation::Shrink {
                path: "/f".into(),
                delta: 150,
            })
            .expect("shrink to zero");
        assert_eq!(state.size_of("/f"), Some(0));
        assert_eq!(state.used(), 0);

        let err = state
            .apply(&Operation::Shrink {
                path: "/f".into(),
                delta: 1,
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidTransition(_)));

        let err = state
            .apply(&Operation::Extend {
                path: "/missing".into(),
                delta: 1,
                chunked: false,
                chunk_size: 512,
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::SourceNotFound(_)));
    }

    #[test]
    fn test_remove_subtree() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/d/sub")).expect("mkdir");
        state.apply(&write("/d/f1", 100)).expect("write");
        state.apply(&write("/d/sub/f2", 200)).expect("write");
        state.apply(&write("/keep", 50)).expect("write");

        state
            .apply(&Operation::Remove { path: "/d".into() })
            .expect("remove");
        assert!(!state.contains("/d"));
        assert!(!state.contains("/d/sub/f2"));
        assert!(state.contains("/keep"));
        assert_eq!(state.used(), 50);
    }

    #[test]
    fn test_subtree_skips_lexical_siblings() {
        // "." sorts below "/", so "/data.old" sits between "/data" and
        // "/data/f" in map order but is no descendant of "/data".
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/data")).expect("mkdir");
        state.apply(&write("/data/f", 100)).expect("write");
        state.apply(&write("/data.old", 50)).expect("write");

        assert_eq!(state.subtree_size("/data"), 100);

        state
            .apply(&Operation::Remove {
                path: "/data".into(),
            })
            .expect("remove");
        assert!(!state.contains("/data"));
        assert!(!state.contains("/data/f"));
        assert!(state.contains("/data.old"));
        assert_eq!(state.used(), 50);
    }

    #[test]
    fn test_move_skips_lexical_siblings() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/data")).expect("mkdir");
        state.apply(&write("/data/f", 100)).expect("write");
        state.apply(&write("/data.old", 50)).expect("write");

        state
            .apply(&Operation::Move {
                source: "/data".into(),
                target: "/archive".into(),
            })
            .expect("move");
        assert!(!state.contains("/data/f"));
        assert_eq!(state.size_of("/archive/f"), Some(100));
        assert_eq!(state.size_of("/data.old"), Some(50));
        assert_eq!(state.used(), 150);
    }

    #[test]
    fn test_copy_file_and_overwrite() {
        let mut state = SimulatedState::new(1000);
        state.apply(&write("/a", 300)).expect("write");
        state.apply(&write("/b", 100)).expect("write");

        // Copy onto an existing file overwrites it.
        state
            .apply(&Operation::Copy {
                source: "/a".into(),
                target: "/b".into(),
            })
            .expect("copy");
        assert_eq!(state.size_of("/b"), Some(300));
        assert_eq!(state.used(), 600);

        // Copy to a fresh path duplicates.
        state
            .apply(&Operation::Copy {
                source: "/a".into(),
                target: "/c".into(),
            })
            .expect("copy");
        assert_eq!(state.used(), 900);

        // A fourth copy would exceed capacity.
        let err = state
            .apply(&Operation::Copy {
                source: "/a".into(),
                target: "/d".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::CapacityExceeded { .. }));
    }

    #[test]
    fn test_copy_into_existing_directory() {
        let mut state = SimulatedState::new(1000);
        state.apply(&write("/f", 100)).expect("write");
        state.apply(&mkdir("/d")).expect("mkdir");

        state
            .apply(&Operation::Copy {
                source: "/f".into(),
                target: "/d".into(),
            })
            .expect("copy into dir");
        assert_eq!(state.size_of("/d/f"), Some(100));
        assert_eq!(state.used(), 200);
    }

    #[test]
    fn test_copy_directory_subtree() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/src/sub")).expect("mkdir");
        state.apply(&write("/src/f1", 100)).expect("write");
        state.apply(&write("/src/sub/f2", 50)).expect("write");

        state
            .apply(&Operation::Copy {
                source: "/src".into(),
                target: "/dst".into(),
            })
            .expect("copy tree");
        assert_eq!(state.size_of("/dst/f1"), Some(100));
        assert_eq!(state.size_of("/dst/sub/f2"), Some(50));
        assert_eq!(state.used(), 300);
        assert_eq!(state.subtree_size("/dst"), 150);
    }

    #[test]
    fn test_directory_over_file_is_kind_mismatch() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/d")).expect("mkdir");
        state.apply(&write("/f", 10)).expect("write");
        let err = state
            .apply(&Operation::Copy {
                source: "/d".into(),
                target: "/f".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::TargetKindMismatch(_)));
    }

    #[test]
    fn test_copy_into_own_subtree_is_rejected() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/d/sub")).expect("mkdir");
        let err = state
            .apply(&Operation::Copy {
                source: "/d".into(),
                target: "/d/sub/copy".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidTransition(_)));
    }

    #[test]
    fn test_move_relocates_subtree() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/src")).expect("mkdir");
        state.apply(&write("/src/f", 100)).expect("write");

        state
            .apply(&Operation::Move {
                source: "/src".into(),
                target: "/dst".into(),
            })
            .expect("move");
        assert!(!state.contains("/src"));
        assert_eq!(state.size_of("/dst/f"), Some(100));
        assert_eq!(state.used(), 100);
    }

    #[test]
    fn test_move_never_needs_capacity() {
        let mut state = SimulatedState::new(100);
        state.apply(&write("/a", 100)).expect("write");
        // Volume is full; a move must still succeed.
        state
            .apply(&Operation::Move {
                source: "/a".into(),
                target: "/b".into(),
            })
            .expect("move at full capacity");
        assert_eq!(state.used(), 100);
    }

    #[test]
    fn test_move_source_not_found() {
        let mut state = SimulatedState::new(1000);
        let err = state
            .apply(&Operation::Move {
                source: "/missing".into(),
                target: "/x".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::SourceNotFound(_)));
    }

    #[test]
    fn test_occupancy_classification() {
        let mut state = SimulatedState::new(1000);
        assert_eq!(state.occupancy(), Occupancy::Empty);
        state.apply(&mkdir("/d")).expect("mkdir");
        assert_eq!(state.occupancy(), Occupancy::DirectoriesOnly);
        state.apply(&write("/f", 1)).expect("write");
        assert_eq!(state.occupancy(), Occupancy::Mixed);
        state
            .apply(&Operation::Remove { path: "/d".into() })
            .expect("rm");
        assert_eq!(state.occupancy(), Occupancy::FilesOnly);
    }

    #[test]
    fn test_prepopulated_entries_are_invisible_to_selection() {
        let mut state = SimulatedState::new(1000);
        state
            .prepopulate(&[
                PrepopulationEntry {
                    path: "sys/kernel.bin".into(),
                    kind: PathKind::File,
                    size: 300,
                },
                PrepopulationEntry {
                    path: "sys/modules".into(),
                    kind: PathKind::Directory,
                    size: 0,
                },
            ])
            .expect("prepopulate");

        assert_eq!(state.used(), 300);
        assert_eq!(state.occupancy(), Occupancy::Empty);
        set_sim_seed(42);
        assert!(state.random_entry(&PathFilter::any()).is_none());

        // Mutable entries become selectable alongside the hidden ones.
        state.apply(&write("/visible", 10)).expect("write");
        assert_eq!(state.occupancy(), Occupancy::FilesOnly);
        let picked = state.random_entry(&PathFilter::any()).expect("entry");
        assert_eq!(picked.path, "/visible");
    }

    #[test]
    fn test_path_filters() {
        let mut state = SimulatedState::new(10_000);
        state.apply(&mkdir("/d")).expect("mkdir");
        state.apply(&write("/small", 100)).expect("write");
        state.apply(&write("/big", 5000)).expect("write");

        set_sim_seed(7);
        let entry = state
            .random_entry(&PathFilter::files().min_size(1000))
            .expect("big file");
        assert_eq!(entry.path, "/big");

        let entry = state
            .random_entry(&PathFilter::files().size_below(1000))
            .expect("small file");
        assert_eq!(entry.path, "/small");

        assert!(state
            .random_entry(&PathFilter::files().min_size(1000).exclude("/big"))
            .is_none());

        let entry = state.random_entry(&PathFilter::directories()).expect("dir");
        assert_eq!(entry.path, "/d");
    }

    #[test]
    fn test_nonexistent_path_has_existing_parent() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/a/b")).expect("mkdir");
        set_sim_seed(42);
        for _ in 0..20 {
            let path = state.nonexistent_path(None).expect("path");
            assert!(!state.contains(&path));
            assert_eq!(state.kind_of(parent_of(&path)), Some(PathKind::Directory));
        }
    }

    #[test]
    fn test_nonexistent_path_respects_skip_subtree() {
        let mut state = SimulatedState::new(1000);
        state.apply(&mkdir("/keep")).expect("mkdir");
        state.apply(&mkdir("/skip/inner")).expect("mkdir");
        set_sim_seed(42);
        for _ in 0..50 {
            let path = state.nonexistent_path(Some("/skip")).expect("path");
            assert!(!is_within(&path, "/skip"));
        }
    }
}
