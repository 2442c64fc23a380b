//! Error types for the atomic-value runtime.
//!
//! Two families live here:
//!
//! - [`SystemError`]: unrecoverable programmer errors and resource exhaustion.
//!   These are never returned; they are raised through [`fatal`], which logs the
//!   diagnostic and panics. An embedding built with `panic = "abort"` gets
//!   immediate process termination.
//! - [`ConfigError`]: recoverable configuration failures, returned as `Result`.
//!
//! Scanner errors live next to the scanner (`crate::scanner::ScanError`).

use std::fmt;
use std::path::PathBuf;

use tracing::error;

/// Unrecoverable runtime faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// `release` called on an atom whose count is already zero.
    ReleaseUnderflow { kind: &'static str },
    /// An atom handle refers to an entry that has been freed.
    StaleAtom { kind: &'static str, index: u32 },
    /// A freed entry was not present in its home bucket.
    MissingHashNode { kind: &'static str, bucket: usize },
    /// The table was mutated while bucket fields held traversal indices.
    TableReindexed { kind: &'static str },
    /// The allocator was asked for zero bytes.
    ZeroSizeAllocation,
    /// The allocator was asked to release zero bytes.
    ZeroSizeRelease,
    /// The size passed to `release` differs from the cell's recorded size.
    CellSizeMismatch { recorded: usize, requested: usize },
    /// A cell refers to storage that has already been returned.
    StaleCell,
    /// The allocator could not satisfy a request, even after reclaiming.
    OutOfMemory { requested: usize },
    /// Stored symbol bytes were not valid UTF-8.
    CorruptSymbol,
    /// `exit_evaluation` called at depth zero.
    EvaluationDepthUnderflow,
    /// A stored fact had no entry in the fact hash table.
    UnindexedFact { id: u64 },
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::ReleaseUnderflow { kind } => {
                write!(f, "{} released with a reference count of zero", kind)
            }
            SystemError::StaleAtom { kind, index } => {
                write!(f, "stale {} handle (slot {})", kind, index)
            }
            SystemError::MissingHashNode { kind, bucket } => {
                write!(f, "{} entry missing from hash bucket {}", kind, bucket)
            }
            SystemError::TableReindexed { kind } => {
                write!(f, "{} table mutated while reindexed", kind)
            }
            SystemError::UnindexedFact { id } => {
                write!(f, "fact f-{} missing from the fact hash table", id)
            }
            SystemError::ZeroSizeAllocation => write!(f, "allocation of zero bytes"),
            SystemError::ZeroSizeRelease => write!(f, "release of zero bytes"),
            SystemError::CellSizeMismatch { recorded, requested } => write!(
                f,
                "release size {} does not match cell size {}",
                requested, recorded
            ),
            SystemError::StaleCell => write!(f, "cell released twice or never allocated"),
            SystemError::OutOfMemory { requested } => {
                write!(f, "out of memory allocating {} bytes", requested)
            }
            SystemError::CorruptSymbol => write!(f, "symbol contents are not valid UTF-8"),
            SystemError::EvaluationDepthUnderflow => {
                write!(f, "evaluation depth decremented below zero")
            }
        }
    }
}

impl std::error::Error for SystemError {}

/// Report an unrecoverable error and stop.
#[cold]
#[track_caller]
pub fn fatal(err: SystemError) -> ! {
    error!(target: "atomtron::system", error = %err, "Unrecoverable system error");
    panic!("{}", err)
}

/// Errors raised while loading or validating a [`RuntimeConfig`].
///
/// [`RuntimeConfig`]: super::config::RuntimeConfig
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(PathBuf, String),
    /// The configuration text is not valid TOML for this schema.
    Parse(String),
    /// A value is outside its allowed range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => {
                write!(f, "Failed to read '{}': {}", path.display(), err)
            }
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
