//! Store directory layout and bootstrap.
//!
//! # Responsibility
//! - Map a store root to its per-kind record directories.
//! - Create missing directories on explicit `init` only.
//!
//! # Invariants
//! - Record directories are `<root>/tags` and `<root>/files`.
//! - Trashed records carry the `.trash` suffix and live next to live ones.

use super::{StoreError, StoreResult};
use crate::model::elem::ElemKind;
use log::{error, info};
use std::fs::DirBuilder;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Reserved suffix marking a soft-deleted record.
pub const TRASH_SUFFIX: &str = ".trash";

const LOG_DIR_NAME: &str = "logs";

/// Result of [`StoreLayout::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStatus {
    /// At least one directory had to be created.
    Created,
    /// Every directory already existed.
    AlreadyReady,
}

/// Paths of one store rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding records of `kind`.
    pub fn kind_dir(&self, kind: ElemKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Directory receiving rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }

    /// Returns whether the root and both kind directories exist.
    pub fn is_ready(&self) -> bool {
        self.root.is_dir()
            && self.kind_dir(ElemKind::Tag).is_dir()
            && self.kind_dir(ElemKind::File).is_dir()
    }

    /// Creates the root and kind directories when missing.
    ///
    /// # Side effects
    /// - Emits `store_init` logging events with duration and status.
    pub fn ensure(&self) -> StoreResult<LayoutStatus> {
        let started_at = Instant::now();
        if self.is_ready() {
            return Ok(LayoutStatus::AlreadyReady);
        }

        for dir in [
            self.root.clone(),
            self.kind_dir(ElemKind::Tag),
            self.kind_dir(ElemKind::File),
        ] {
            if dir.is_dir() {
                continue;
            }
            if let Err(err) = create_private_dir(&dir) {
                error!(
                    "event=store_init module=store status=error duration_ms={} path={} error={}",
                    started_at.elapsed().as_millis(),
                    dir.display(),
                    err
                );
                return Err(StoreError::io(dir, err));
            }
        }

        info!(
            "event=store_init module=store status=ok duration_ms={} root={}",
            started_at.elapsed().as_millis(),
            self.root.display()
        );
        Ok(LayoutStatus::Created)
    }

    /// Fails with `MissingDirectory` unless the kind directory exists.
    pub(crate) fn require_kind_dir(&self, kind: ElemKind) -> StoreResult<PathBuf> {
        let dir = self.kind_dir(kind);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::MissingDirectory(dir))
        }
    }
}

/// Returns the trashed-record path for a live record path.
pub fn trash_path(record_path: &Path) -> PathBuf {
    let mut raw = record_path.as_os_str().to_os_string();
    raw.push(TRASH_SUFFIX);
    PathBuf::from(raw)
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
