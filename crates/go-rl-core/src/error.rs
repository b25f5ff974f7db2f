//! Error types for the reinforcement-learning core.
//!
//! Each subsystem gets its own plain enum implementing [`std::error::Error`],
//! matching the host crate's manual error style rather than a derive-macro
//! error crate.

use std::fmt;

/// Errors raised while building a feature-set / tracker graph from
/// construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two feature sets were registered under the same identifier.
    DuplicateId(String),
    /// A referenced feature-set id was never registered.
    UnknownId(String),
    /// A required setting was not supplied.
    MissingSetting(&'static str),
    /// A setting had the wrong type or an out-of-range value.
    InvalidValue { setting: &'static str, reason: String },
    /// Two feature sets that should have matching sizes did not.
    IncompatibleSizes { expected: usize, found: usize },
    /// An on-disk cache/table file carries an unsupported format version.
    UnsupportedVersion { found: u32, supported: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateId(id) => write!(f, "duplicate feature-set id: {id}"),
            ConfigError::UnknownId(id) => write!(f, "unknown feature-set id: {id}"),
            ConfigError::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            ConfigError::InvalidValue { setting, reason } => {
                write!(f, "invalid value for {setting}: {reason}")
            }
            ConfigError::IncompatibleSizes { expected, found } => write!(
                f,
                "incompatible feature-set sizes: expected {expected}, found {found}"
            ),
            ConfigError::UnsupportedVersion { found, supported } => write!(
                f,
                "unsupported format version {found} (supported: {supported})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by file I/O for weight/cache/record persistence.
#[derive(Debug)]
pub enum PersistenceError {
    /// The underlying file could not be read or written.
    Io(std::io::Error),
    /// The file's magic/version header did not match what was expected.
    BadHeader(String),
    /// The feature-set name recorded in the file does not match, in strict mode.
    NameMismatch { expected: String, found: String },
    /// The stored array is a different length than the in-memory one, in strict mode.
    SizeMismatch { expected: usize, found: usize },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "io error: {e}"),
            PersistenceError::BadHeader(reason) => write!(f, "bad file header: {reason}"),
            PersistenceError::NameMismatch { expected, found } => {
                write!(f, "feature-set name mismatch: expected {expected}, found {found}")
            }
            PersistenceError::SizeMismatch { expected, found } => {
                write!(f, "size mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}

/// Errors raised by operations that depend on runtime state rather than
/// static configuration (e.g. undo/legality at the board/tracker boundary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// `undo()` was called on a tracker/evaluator with an empty undo stack.
    NothingToUndo,
    /// No legal move was available and pass is disabled for the caller.
    NoLegalMove,
    /// A caller attempted to play a specific move that is not legal.
    IllegalMove,
    /// The requested timestep does not exist in the episode.
    TimestepOutOfRange { timestep: usize, length: usize },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NothingToUndo => write!(f, "undo called with an empty undo stack"),
            RuntimeError::NoLegalMove => write!(f, "no legal move available and pass is disabled"),
            RuntimeError::IllegalMove => write!(f, "attempted to play an illegal move"),
            RuntimeError::TimestepOutOfRange { timestep, length } => write!(
                f,
                "timestep {timestep} out of range for episode of length {length}"
            ),
        }
    }
}

impl std::error::Error for RuntimeError {}
