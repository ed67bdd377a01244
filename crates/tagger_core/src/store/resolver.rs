//! Name-to-address resolution with collision probing.
//!
//! # Responsibility
//! - Map `(kind, name)` to a stable record path.
//! - Resolve fingerprint collisions by probing `base.01`, `base.02`, ...
//!
//! # Invariants
//! - Resolution never creates or modifies files.
//! - Once a name owns a slot, resolving it again yields the same slot.
//! - A slot is owned by the identity line of its live record, or of its
//!   trashed record when no live record exists. Trashed slots therefore
//!   stay reserved for their name and are never handed to another one.
//! - Concurrent creators of the same slot are not coordinated.

use super::fingerprint::digest;
use super::layout::{trash_path, StoreLayout};
use super::{StoreError, StoreResult};
use crate::model::elem::{is_valid_name, ElemKind};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// Digest function deriving the base address of a name.
pub type Fingerprint = fn(&str) -> String;

/// Who currently holds a resolved slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// Nothing is stored at this slot yet.
    Free,
    /// A live record for the name exists.
    Live,
    /// Only a trashed record for the name exists.
    Trashed,
}

/// Resolved record address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub path: PathBuf,
    pub occupancy: Occupancy,
}

/// Computes record addresses under one store layout.
#[derive(Debug, Clone)]
pub struct NameResolver {
    layout: StoreLayout,
    fingerprint: Fingerprint,
}

impl NameResolver {
    /// Creates a resolver using the store's MD5 fingerprint.
    pub fn new(layout: StoreLayout) -> Self {
        Self::with_fingerprint(layout, digest)
    }

    /// Creates a resolver with a caller-provided fingerprint.
    ///
    /// Changing the fingerprint of an existing store orphans its records.
    pub fn with_fingerprint(layout: StoreLayout, fingerprint: Fingerprint) -> Self {
        Self {
            layout,
            fingerprint,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Returns the record path for `name`, whether or not it exists yet.
    pub fn resolve(&self, kind: ElemKind, name: &str) -> StoreResult<PathBuf> {
        self.resolve_slot(kind, name).map(|slot| slot.path)
    }

    /// Returns the record path for `name` together with its occupancy.
    pub fn resolve_slot(&self, kind: ElemKind, name: &str) -> StoreResult<Slot> {
        if !is_valid_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        let base = self.layout.kind_dir(kind).join((self.fingerprint)(name));
        let mut probe = 0u32;
        loop {
            let path = probe_path(&base, probe);
            match inspect_slot(&path, name)? {
                SlotOwner::Foreign => {
                    probe += 1;
                    debug!(
                        "event=resolve_collision module=store kind={} probe={}",
                        kind.label(),
                        probe
                    );
                }
                SlotOwner::Free => {
                    return Ok(Slot {
                        path,
                        occupancy: Occupancy::Free,
                    })
                }
                SlotOwner::Name(occupancy) => return Ok(Slot { path, occupancy }),
            }
        }
    }
}

enum SlotOwner {
    Free,
    Foreign,
    Name(Occupancy),
}

fn probe_path(base: &Path, probe: u32) -> PathBuf {
    if probe == 0 {
        return base.to_path_buf();
    }
    let mut raw = base.as_os_str().to_os_string();
    raw.push(format!(".{probe:02}"));
    PathBuf::from(raw)
}

fn inspect_slot(path: &Path, name: &str) -> StoreResult<SlotOwner> {
    if let Some(identity) = read_identity(path)? {
        return Ok(if identity == name {
            SlotOwner::Name(Occupancy::Live)
        } else {
            SlotOwner::Foreign
        });
    }

    match read_identity(&trash_path(path))? {
        Some(identity) if identity == name => Ok(SlotOwner::Name(Occupancy::Trashed)),
        Some(_) => Ok(SlotOwner::Foreign),
        None => Ok(SlotOwner::Free),
    }
}

/// Reads the identity line of a record.
///
/// Returns `Ok(None)` when the file does not exist. An empty file yields an
/// empty identity, which never matches a valid name.
pub(crate) fn read_identity(path: &Path) -> StoreResult<Option<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(path, err)),
    };

    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|err| StoreError::io(path, err))?;
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Some(trimmed.to_string()))
}
