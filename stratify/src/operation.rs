//! File system operations and their playbook line codec.
//!
//! An [`Operation`] is the unit exchanged between a usage model and the
//! simulation engine, and the unit persisted in a playbook. Operations are
//! self-contained and immutable once created: they carry everything needed
//! both to execute them against a real file system and to update the
//! in-memory [`SimulatedState`](crate::SimulatedState).
//!
//! The persistence format is one operation per line, each line
//! independently parseable:
//!
//! ```text
//! mkdir /docs
//! write /docs/report size=4096 chunked=false chunk_size=512
//! extend /docs/report extend_size=1024 chunked=true chunk_size=512
//! shrink /docs/report shrink_size=512
//! cp /docs/report /docs/report.bak
//! mv /docs/report.bak /archive
//! rm /docs/report
//! time 2024-05-01T13:37:00
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Default chunk size, in bytes, for chunked writes and extends.
pub const DEFAULT_CHUNK_SIZE: u64 = 512;

/// A single file system operation.
///
/// The set of operation kinds is closed; every variant maps to exactly one
/// playbook command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a new, empty directory (missing ancestors included).
    Mkdir {
        /// Absolute path of the directory to create.
        path: String,
    },
    /// Write a file, creating it or overwriting an existing one.
    Write {
        /// Absolute path of the file to write.
        path: String,
        /// Total number of bytes to write.
        size: u64,
        /// Whether the executor must write in `chunk_size`-sized chunks.
        chunked: bool,
        /// Chunk size in bytes for chunked writes.
        chunk_size: u64,
    },
    /// Append bytes to an existing file.
    Extend {
        /// Absolute path of the file to extend.
        path: String,
        /// Number of bytes to append.
        delta: u64,
        /// Whether the executor must append in `chunk_size`-sized chunks.
        chunked: bool,
        /// Chunk size in bytes for chunked appends.
        chunk_size: u64,
    },
    /// Truncate bytes off the end of an existing file.
    Shrink {
        /// Absolute path of the file to shrink.
        path: String,
        /// Number of bytes to remove.
        delta: u64,
    },
    /// Copy a file or directory subtree.
    Copy {
        /// Absolute path of the entry to copy.
        source: String,
        /// Absolute destination path.
        target: String,
    },
    /// Move a file or directory subtree.
    Move {
        /// Absolute path of the entry to move.
        source: String,
        /// Absolute destination path.
        target: String,
    },
    /// Delete a file or a directory subtree.
    Remove {
        /// Absolute path of the entry to remove.
        path: String,
    },
    /// Set the (simulated) system time.
    Time {
        /// The timestamp to set.
        timestamp: NaiveDateTime,
    },
}

impl Operation {
    /// The playbook command name of this operation.
    pub fn command(&self) -> &'static str {
        match self {
            Operation::Mkdir { .. } => "mkdir",
            Operation::Write { .. } => "write",
            Operation::Extend { .. } => "extend",
            Operation::Shrink { .. } => "shrink",
            Operation::Copy { .. } => "cp",
            Operation::Move { .. } => "mv",
            Operation::Remove { .. } => "rm",
            Operation::Time { .. } => "time",
        }
    }

    /// Parse a single playbook line into an operation.
    ///
    /// The line must already be stripped of comments and surrounding
    /// whitespace; the error is a human-readable reason without line
    /// context (the playbook loader adds that).
    pub fn parse_line(line: &str) -> Result<Operation, String> {
        let mut tokens = line.split_whitespace();
        let command = tokens.next().ok_or_else(|| "empty line".to_string())?;
        let args: Vec<&str> = tokens.collect();
        match command {
            "mkdir" => {
                let [path] = args[..] else {
                    return Err(format!("mkdir expects exactly one path, got {}", args.len()));
                };
                Ok(Operation::Mkdir {
                    path: normalize_path(path),
                })
            }
            "write" => {
                let (path, params) = split_path_and_params(&args, "write")?;
                let mut size = None;
                let mut chunked = false;
                let mut chunk_size = DEFAULT_CHUNK_SIZE;
                for param in params {
                    match split_key_value(param)? {
                        ("size", value) => size = Some(parse_positive_size("size", value)?),
                        ("chunked", value) => chunked = parse_bool(value)?,
                        ("chunk_size", value) => {
                            chunk_size = parse_positive_size("chunk_size", value)?;
                        }
                        (key, _) => return Err(format!("unknown parameter \"{key}\"")),
                    }
                }
                Ok(Operation::Write {
                    path: normalize_path(path),
                    size: size.ok_or("write requires a size= parameter")?,
                    chunked,
                    chunk_size,
                })
            }
            "extend" => {
                let (path, params) = split_path_and_params(&args, "extend")?;
                let mut delta = None;
                let mut chunked = false;
                let mut chunk_size = DEFAULT_CHUNK_SIZE;
                for param in params {
                    match split_key_value(param)? {
                        ("extend_size", value) => {
                            delta = Some(parse_positive_size("extend_size", value)?);
                        }
                        ("chunked", value) => chunked = parse_bool(value)?,
                        ("chunk_size", value) => {
                            chunk_size = parse_positive_size("chunk_size", value)?;
                        }
                        (key, _) => return Err(format!("unknown parameter \"{key}\"")),
                    }
                }
                Ok(Operation::Extend {
                    path: normalize_path(path),
                    delta: delta.ok_or("extend requires an extend_size= parameter")?,
                    chunked,
                    chunk_size,
                })
            }
            "shrink" => {
                let (path, params) = split_path_and_params(&args, "shrink")?;
                let mut delta = None;
                for param in params {
                    match split_key_value(param)? {
                        ("shrink_size", value) => {
                            delta = Some(parse_positive_size("shrink_size", value)?);
                        }
                        (key, _) => return Err(format!("unknown parameter \"{key}\"")),
                    }
                }
                Ok(Operation::Shrink {
                    path: normalize_path(path),
                    delta: delta.ok_or("shrink requires a shrink_size= parameter")?,
                })
            }
            "cp" | "mv" => {
                let [source, target] = args[..] else {
                    return Err(format!("{command} expects exactly two paths, got {}", args.len()));
                };
                let source = normalize_path(source);
                let target = normalize_path(target);
                if command == "cp" {
                    Ok(Operation::Copy { source, target })
                } else {
                    Ok(Operation::Move { source, target })
                }
            }
            "rm" => {
                let [path] = args[..] else {
                    return Err(format!("rm expects exactly one path, got {}", args.len()));
                };
                Ok(Operation::Remove {
                    path: normalize_path(path),
                })
            }
            "time" => {
                let [value] = args[..] else {
                    return Err(format!("time expects exactly one timestamp, got {}", args.len()));
                };
                let timestamp = NaiveDateTime::from_str(value)
                    .map_err(|err| format!("invalid timestamp \"{value}\": {err}"))?;
                Ok(Operation::Time { timestamp })
            }
            other => Err(format!("unknown operation \"{other}\"")),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Mkdir { path } => write!(f, "mkdir {path}"),
            Operation::Write {
                path,
                size,
                chunked,
                chunk_size,
            } => write!(
                f,
                "write {path} size={size} chunked={chunked} chunk_size={chunk_size}"
            ),
            Operation::Extend {
                path,
                delta,
                chunked,
                chunk_size,
            } => write!(
                f,
                "extend {path} extend_size={delta} chunked={chunked} chunk_size={chunk_size}"
            ),
            Operation::Shrink { path, delta } => {
                write!(f, "shrink {path} shrink_size={delta}")
            }
            Operation::Copy { source, target } => write!(f, "cp {source} {target}"),
            Operation::Move { source, target } => write!(f, "mv {source} {target}"),
            Operation::Remove { path } => write!(f, "rm {path}"),
            Operation::Time { timestamp } => {
                write!(f, "time {}", timestamp.format("%Y-%m-%dT%H:%M:%S%.f"))
            }
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::parse_line(s)
    }
}

/// Normalize a simulation path to an absolute path within the simulated
/// root, without a trailing slash (except for the root itself).
pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Parse a size definition string and return the number of bytes.
///
/// Supports plain byte counts plus decimal (`k`/`kB`, `M`/`MB`, `G`/`GB`,
/// `T`/`TB`) and binary (`Ki`/`KiB`, `Mi`/`MiB`, `Gi`/`GiB`, `Ti`/`TiB`)
/// suffixes, with optional whitespace between value and unit.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let digits_end = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return Err(format!("invalid size definition: \"{input}\""));
    }
    let value: u64 = trimmed[..digits_end]
        .parse()
        .map_err(|_| format!("invalid size definition: \"{input}\""))?;
    let unit = trimmed[digits_end..].trim();
    let factor: u64 = match unit {
        "" => 1,
        "k" | "kB" => 1000,
        "M" | "MB" => 1000_u64.pow(2),
        "G" | "GB" => 1000_u64.pow(3),
        "T" | "TB" => 1000_u64.pow(4),
        "Ki" | "KiB" => 1024,
        "Mi" | "MiB" => 1024_u64.pow(2),
        "Gi" | "GiB" => 1024_u64.pow(3),
        "Ti" | "TiB" => 1024_u64.pow(4),
        other => return Err(format!("invalid unit for size definition: \"{other}\"")),
    };
    value
        .checked_mul(factor)
        .ok_or_else(|| format!("size definition overflows: \"{input}\""))
}

fn parse_positive_size(key: &str, value: &str) -> Result<u64, String> {
    let size = parse_size(value)?;
    if size == 0 {
        return Err(format!("{key} has to be > 0"));
    }
    Ok(size)
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" => Ok(true),
        "false" | "no" | "n" => Ok(false),
        other => Err(format!("\"{other}\" is neither true nor false")),
    }
}

fn split_key_value(param: &str) -> Result<(&str, &str), String> {
    param
        .split_once('=')
        .ok_or_else(|| format!("expected key=value parameter, got \"{param}\""))
}

fn split_path_and_params<'a>(
    args: &'a [&'a str],
    command: &str,
) -> Result<(&'a str, &'a [&'a str]), String> {
    match args.split_first() {
        Some((path, params)) => Ok((path, params)),
        None => Err(format!("{command} requires a path")),
    }
}
