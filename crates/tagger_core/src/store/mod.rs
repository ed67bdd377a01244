//! Filesystem-backed relation store.
//!
//! # Responsibility
//! - Derive stable record addresses from entity names.
//! - Read and write per-entity relation records.
//! - Implement soft delete and recovery of records.
//!
//! # Invariants
//! - The store directory is the sole durable owner of entity state; no
//!   cache survives one operation.
//! - Each single-record write is atomic (temp file + rename). A symmetric
//!   relation spans two such writes and is NOT atomic as a whole.
//!
//! # See also
//! - `model::elem` for the record text layout.

use crate::model::elem::ElemKind;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod fingerprint;
pub mod layout;
pub mod relation_store;
pub mod resolver;

pub use layout::{LayoutStatus, StoreLayout, TRASH_SUFFIX};
pub use relation_store::{
    Asymmetry, ConsistencyWarning, InitOutcome, LineUpdate, MatchScope, RecoverOutcome,
    RelateOutcome, RelationStore,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer error for I/O failures and invalid store requests.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem operation failed on the given path.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Store root or kind directory does not exist.
    MissingDirectory(PathBuf),
    /// Name cannot be represented as one record line.
    InvalidName(String),
    /// Both sides of a relation have the same kind.
    SameKindRelation {
        kind: ElemKind,
        left: String,
        right: String,
    },
    /// Record exists but has no identity line.
    CorruptRecord { path: PathBuf, reason: String },
    /// Wildcard pattern cannot be compiled.
    InvalidPattern { pattern: String, message: String },
    /// A live record already occupies the slot a trashed record would return to.
    RecoverConflict { name: String, path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on `{}`: {source}", path.display()),
            Self::MissingDirectory(path) => {
                write!(f, "store directory not found: `{}`", path.display())
            }
            Self::InvalidName(name) => write!(f, "invalid entity name: `{}`", name.escape_debug()),
            Self::SameKindRelation { kind, left, right } => write!(
                f,
                "cannot relate two {kind} elements: `{left}` and `{right}`"
            ),
            Self::CorruptRecord { path, reason } => {
                write!(f, "corrupt record `{}`: {reason}", path.display())
            }
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid wildcard `{pattern}`: {message}")
            }
            Self::RecoverConflict { name, path } => write!(
                f,
                "cannot recover `{name}`: a live record already exists at `{}`",
                path.display()
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
