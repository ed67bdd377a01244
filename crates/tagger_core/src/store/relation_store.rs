//! Relation record reads/writes, soft delete and recovery.
//!
//! # Responsibility
//! - Create and look up entity records through [`NameResolver`].
//! - Maintain symmetric relation lines between a tag and a file.
//! - Enumerate and pattern-match entity names.
//! - Trash and restore records together with their counterpart lines.
//!
//! # Invariants
//! - At most one line per related name within one record; status flips
//!   rewrite the line in place, they never append a duplicate.
//! - Same-kind relations are rejected before any write.
//! - `relate` performs two independent single-record writes. A failure
//!   between them leaves an asymmetric relation; it is reported as a
//!   [`ConsistencyWarning`] and never repaired automatically.
//! - A trashed record keeps its content verbatim; only counterpart records
//!   are tombstoned on delete.

use super::layout::{trash_path, StoreLayout, TRASH_SUFFIX};
use super::resolver::{read_identity, NameResolver, Occupancy};
use super::{StoreError, StoreResult};
use crate::boundary::{FsCanonicalizer, PathCanonicalizer};
use crate::model::elem::{
    is_valid_name, Elem, ElemKind, RelateAction, Record, RelationLine, RelationStatus,
};
use crate::model::set_list::SetList;
use glob::{MatchOptions, Pattern};
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Wildcard semantics: no escaping, `*` crosses `/`, leading dots match.
const WILDCARD_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Result of [`RelationStore::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// No record exists and creation was not requested.
    NotFound,
    /// A record for the name already exists.
    Exists(Elem),
    /// A fresh record holding only the identity line was written.
    Created(Elem),
}

impl InitOutcome {
    pub fn elem(&self) -> Option<&Elem> {
        match self {
            Self::NotFound => None,
            Self::Exists(elem) | Self::Created(elem) => Some(elem),
        }
    }

    pub fn into_elem(self) -> Option<Elem> {
        match self {
            Self::NotFound => None,
            Self::Exists(elem) | Self::Created(elem) => Some(elem),
        }
    }
}

/// Result of [`RelationStore::set_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineUpdate {
    /// An existing line for the name got the requested marker.
    Updated,
    /// A new active line was appended.
    Appended,
    /// Inactive status requested for a name with no line; nothing written.
    Absent,
}

/// Outcome of [`RelationStore::relate`], as seen from the first element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelateOutcome {
    NoOp,
    Updated,
    Created,
}

impl From<LineUpdate> for RelateOutcome {
    fn from(value: LineUpdate) -> Self {
        match value {
            LineUpdate::Updated => Self::Updated,
            LineUpdate::Appended => Self::Created,
            LineUpdate::Absent => Self::NoOp,
        }
    }
}

/// Result of [`RelationStore::recover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverOutcome {
    Recovered(Elem),
    NotFound,
}

/// Name source used by [`RelationStore::list_matching`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScope {
    /// Identity names of live records.
    Database,
    /// Paths on disk, returned canonicalized.
    Filesystem,
    /// Identity names of trashed records.
    Trash,
}

/// Why a relation was found asymmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asymmetry {
    /// The counterpart entity has no live record.
    CounterpartMissing,
    /// The counterpart record has no active line back.
    ReverseInactive,
}

/// A relation active on one side only. Recoverable; never auto-repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub kind: ElemKind,
    pub name: String,
    pub counterpart: String,
    pub asymmetry: Asymmetry,
}

impl Display for ConsistencyWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let other = self.kind.other();
        match self.asymmetry {
            Asymmetry::CounterpartMissing => write!(
                f,
                "{} `{}` relates to missing {} `{}`",
                self.kind, self.name, other, self.counterpart
            ),
            Asymmetry::ReverseInactive => write!(
                f,
                "{} `{}` relates to {} `{}` but not the other way round",
                self.kind, self.name, other, self.counterpart
            ),
        }
    }
}

/// Record store rooted at one [`StoreLayout`].
pub struct RelationStore {
    resolver: NameResolver,
    canonicalizer: Box<dyn PathCanonicalizer>,
}

impl RelationStore {
    /// Opens a store using MD5 addressing and OS path canonicalization.
    pub fn new(layout: StoreLayout) -> Self {
        Self::with_parts(NameResolver::new(layout), Box::new(FsCanonicalizer))
    }

    pub fn with_parts(resolver: NameResolver, canonicalizer: Box<dyn PathCanonicalizer>) -> Self {
        Self {
            resolver,
            canonicalizer,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        self.resolver.layout()
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// Canonicalizes a user path with the store's collaborator.
    pub fn canonicalize(&self, raw: &str) -> std::io::Result<String> {
        self.canonicalizer.canonicalize(raw)
    }

    /// Looks up `name` and optionally creates its record.
    ///
    /// A trashed-only slot counts as missing: creating writes a fresh live
    /// record there, and the trashed copy can then no longer be recovered.
    pub fn init(&self, kind: ElemKind, name: &str, create: bool) -> StoreResult<InitOutcome> {
        let slot = self.resolver.resolve_slot(kind, name)?;
        let elem = Elem {
            kind,
            name: name.to_string(),
            path: slot.path,
        };

        if slot.occupancy == Occupancy::Live {
            return Ok(InitOutcome::Exists(elem));
        }
        if !create {
            return Ok(InitOutcome::NotFound);
        }

        self.layout().require_kind_dir(kind)?;
        write_record(&elem.path, &Record::new(name))?;
        info!(
            "event=elem_create module=store status=ok kind={} name={}",
            kind.label(),
            name
        );
        Ok(InitOutcome::Created(elem))
    }

    /// Returns the live element for `name`, if any.
    pub fn find(&self, kind: ElemKind, name: &str) -> StoreResult<Option<Elem>> {
        self.init(kind, name, false).map(InitOutcome::into_elem)
    }

    /// Looks up the entity a relation line points at.
    ///
    /// A hand-edited line whose name can never address a record yields
    /// `None` instead of `InvalidName`.
    pub fn find_counterpart(&self, kind: ElemKind, name: &str) -> StoreResult<Option<Elem>> {
        if !is_valid_name(name) {
            return Ok(None);
        }
        self.find(kind, name)
    }

    /// Reads and verifies the record of `elem`.
    pub fn read_record(&self, elem: &Elem) -> StoreResult<Record> {
        read_record_at(&elem.path, &elem.name)
    }

    /// Sets the marker of the line naming `other` in `elem`'s record.
    pub fn set_line(
        &self,
        status: RelationStatus,
        elem: &Elem,
        other: &str,
    ) -> StoreResult<LineUpdate> {
        let mut record = self.read_record(elem)?;
        let update = match record.line_mut(other) {
            Some(line) => {
                if line.status == status {
                    return Ok(LineUpdate::Updated);
                }
                line.status = status;
                LineUpdate::Updated
            }
            None if status == RelationStatus::Active => {
                record.push_relation(RelationLine::active(other));
                LineUpdate::Appended
            }
            None => return Ok(LineUpdate::Absent),
        };
        write_record(&elem.path, &record)?;
        Ok(update)
    }

    /// Adds or removes the symmetric relation between `left` and `right`.
    ///
    /// Returns the outcome on `left`'s side.
    pub fn relate(
        &self,
        action: RelateAction,
        left: &Elem,
        right: &Elem,
    ) -> StoreResult<RelateOutcome> {
        if left.kind == right.kind {
            return Err(StoreError::SameKindRelation {
                kind: left.kind,
                left: left.name.clone(),
                right: right.name.clone(),
            });
        }

        let status = action.status();
        let left_update = self.set_line(status, left, &right.name)?;
        let right_update = self.set_line(status, right, &left.name)?;
        if left_update != right_update {
            warn!(
                "event=relation_asymmetric module=store status=warn kind={} name={} other={} left={:?} right={:?}",
                left.kind.label(),
                left.name,
                right.name,
                left_update,
                right_update
            );
        }

        let outcome = RelateOutcome::from(left_update);
        info!(
            "event=relate module=store status=ok action={:?} kind={} name={} other={} outcome={:?}",
            action,
            left.kind.label(),
            left.name,
            right.name,
            outcome
        );
        Ok(outcome)
    }

    /// Returns names of entities actively related to `elem`.
    pub fn list_related(&self, elem: &Elem) -> StoreResult<SetList> {
        let record = self.read_record(elem)?;
        Ok(record.active_names().collect())
    }

    /// Returns identity names of every live record of `kind`.
    pub fn list_all(&self, kind: ElemKind) -> StoreResult<SetList> {
        self.scan_kind_dir(kind, false)
    }

    /// Returns identity names of every trashed record of `kind`.
    pub fn list_trashed(&self, kind: ElemKind) -> StoreResult<SetList> {
        self.scan_kind_dir(kind, true)
    }

    /// Returns names of `kind` matching a shell wildcard in `scope`.
    ///
    /// `Database` and `Trash` scopes match like `fnmatch` without escaping:
    /// `**` is a plain `*` and an unclosed `[` is literal. `Filesystem` scope
    /// globs the pattern on disk and yields canonical paths; entries that
    /// cannot be canonicalized are skipped.
    pub fn list_matching(
        &self,
        scope: MatchScope,
        kind: ElemKind,
        pattern: &str,
    ) -> StoreResult<SetList> {
        let invalid = |err: glob::PatternError| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        };

        let candidates = match scope {
            MatchScope::Database => self.list_all(kind)?,
            MatchScope::Trash => self.list_trashed(kind)?,
            MatchScope::Filesystem => {
                let mut matches = SetList::new();
                for entry in glob::glob_with(pattern, WILDCARD_OPTIONS).map_err(invalid)? {
                    let Ok(path) = entry else {
                        continue;
                    };
                    let Some(raw) = path.to_str() else {
                        continue;
                    };
                    match self.canonicalize(raw) {
                        Ok(canonical) => {
                            matches.insert(canonical);
                        }
                        Err(err) => debug!(
                            "event=glob_skip module=store path={} error={}",
                            path.display(),
                            err
                        ),
                    }
                }
                return Ok(matches);
            }
        };

        let compiled = Pattern::new(&shell_pattern(pattern)).map_err(invalid)?;
        Ok(candidates
            .into_iter()
            .filter(|name| compiled.matches_with(name, WILDCARD_OPTIONS))
            .collect())
    }

    /// Tombstones every counterpart line pointing at `elem`, then trashes
    /// `elem`'s record with its content untouched.
    pub fn soft_delete(&self, elem: &Elem) -> StoreResult<()> {
        let record = self.read_record(elem)?;
        let other_kind = elem.kind.other();
        for name in record.active_names() {
            match self.find_counterpart(other_kind, name)? {
                Some(counterpart) => {
                    self.set_line(RelationStatus::Inactive, &counterpart, &elem.name)?;
                }
                None => warn_missing_counterpart(elem, name),
            }
        }

        let trashed = trash_path(&elem.path);
        std::fs::rename(&elem.path, &trashed).map_err(|err| StoreError::io(&elem.path, err))?;
        info!(
            "event=elem_delete module=store status=ok kind={} name={}",
            elem.kind.label(),
            elem.name
        );
        Ok(())
    }

    /// Restores the trashed record of `name` and re-adds every relation
    /// that was active in it. Counterparts deleted meanwhile are skipped.
    pub fn recover(&self, kind: ElemKind, name: &str) -> StoreResult<RecoverOutcome> {
        let slot = self.resolver.resolve_slot(kind, name)?;
        let trashed = trash_path(&slot.path);
        match slot.occupancy {
            Occupancy::Free => return Ok(RecoverOutcome::NotFound),
            Occupancy::Live => {
                return match read_identity(&trashed)? {
                    Some(identity) if identity == name => Err(StoreError::RecoverConflict {
                        name: name.to_string(),
                        path: slot.path,
                    }),
                    _ => Ok(RecoverOutcome::NotFound),
                };
            }
            Occupancy::Trashed => {}
        }

        std::fs::rename(&trashed, &slot.path).map_err(|err| StoreError::io(&trashed, err))?;
        let elem = Elem {
            kind,
            name: name.to_string(),
            path: slot.path,
        };

        let record = self.read_record(&elem)?;
        for related in record.active_names() {
            match self.find_counterpart(kind.other(), related)? {
                Some(counterpart) => {
                    self.relate(RelateAction::Add, &counterpart, &elem)?;
                }
                None => warn_missing_counterpart(&elem, related),
            }
        }

        info!(
            "event=elem_recover module=store status=ok kind={} name={}",
            kind.label(),
            name
        );
        Ok(RecoverOutcome::Recovered(elem))
    }

    /// Scans both kinds for relations that are active on one side only.
    pub fn check_consistency(&self) -> StoreResult<Vec<ConsistencyWarning>> {
        let mut warnings = Vec::new();
        for kind in [ElemKind::Tag, ElemKind::File] {
            for name in self.list_all(kind)? {
                let Some(elem) = self.find(kind, &name)? else {
                    continue;
                };
                let record = self.read_record(&elem)?;
                for related in record.active_names() {
                    let asymmetry = match self.find_counterpart(kind.other(), related)? {
                        None => Some(Asymmetry::CounterpartMissing),
                        Some(counterpart) => {
                            let reverse = self.read_record(&counterpart)?;
                            match reverse.line(&name) {
                                Some(line) if line.is_active() => None,
                                _ => Some(Asymmetry::ReverseInactive),
                            }
                        }
                    };
                    if let Some(asymmetry) = asymmetry {
                        let warning = ConsistencyWarning {
                            kind,
                            name: name.clone(),
                            counterpart: related.to_string(),
                            asymmetry,
                        };
                        warn!("event=consistency_check module=store status=warn detail={warning}");
                        warnings.push(warning);
                    }
                }
            }
        }
        Ok(warnings)
    }

    fn scan_kind_dir(&self, kind: ElemKind, trashed: bool) -> StoreResult<SetList> {
        let dir = self.layout().require_kind_dir(kind)?;
        let entries = std::fs::read_dir(&dir).map_err(|err| StoreError::io(&dir, err))?;

        let mut names = SetList::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(&dir, err))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') || file_name.ends_with(TRASH_SUFFIX) != trashed {
                continue;
            }
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match read_identity(&path)? {
                Some(identity) if !identity.is_empty() => {
                    names.insert(identity);
                }
                _ => debug!(
                    "event=scan_skip module=store path={} reason=no_identity",
                    path.display()
                ),
            }
        }
        debug!(
            "event=scan module=store kind={} trashed={} count={}",
            kind.label(),
            trashed,
            names.len()
        );
        Ok(names)
    }
}

fn warn_missing_counterpart(elem: &Elem, counterpart: &str) {
    let warning = ConsistencyWarning {
        kind: elem.kind,
        name: elem.name.clone(),
        counterpart: counterpart.to_string(),
        asymmetry: Asymmetry::CounterpartMissing,
    };
    warn!("event=relation_asymmetric module=store status=warn detail={warning}");
}

/// Rewrites a shell wildcard into a form [`Pattern`] accepts with the same
/// meaning: runs of `*` collapse to one and a `[` with no closing `]`
/// becomes the literal class `[[]`.
fn shell_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 2);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match bracket_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end + 1;
                }
                None => {
                    out.push_str("[[]");
                    i += 1;
                }
            },
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

/// Index of the `]` closing the class opened at `start`. A `]` right after
/// `[` or `[!` is a member, not the terminator.
fn bracket_end(chars: &[char], start: usize) -> Option<usize> {
    let first = if chars.get(start + 1) == Some(&'!') {
        start + 3
    } else {
        start + 2
    };
    chars
        .get(first..)?
        .iter()
        .position(|&c| c == ']')
        .map(|offset| first + offset)
}

fn read_record_at(path: &Path, expected: &str) -> StoreResult<Record> {
    let text = std::fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;
    let record = Record::parse(&text).ok_or_else(|| StoreError::CorruptRecord {
        path: path.to_path_buf(),
        reason: "missing identity line".to_string(),
    })?;
    if record.identity != expected {
        return Err(StoreError::CorruptRecord {
            path: path.to_path_buf(),
            reason: format!("identity `{}` does not match `{expected}`", record.identity),
        });
    }
    Ok(record)
}

/// Replaces the record at `path` atomically with `record`.
fn write_record(path: &Path, record: &Record) -> StoreResult<()> {
    let dir = path.parent().ok_or_else(|| {
        StoreError::io(
            path,
            std::io::Error::new(ErrorKind::InvalidInput, "record path has no parent"),
        )
    })?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|err| StoreError::io(dir, err))?;
    temp.write_all(record.render().as_bytes())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| StoreError::io(temp.path(), err))?;
    temp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{shell_pattern, write_record, LineUpdate, RelationStore};
    use crate::model::elem::{ElemKind, Record, RelationStatus};
    use crate::store::layout::StoreLayout;

    fn setup() -> (tempfile::TempDir, RelationStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.ensure().unwrap();
        (dir, RelationStore::new(layout))
    }

    #[test]
    fn set_line_flips_marker_without_duplicating() {
        let (_dir, store) = setup();
        let tag = store
            .init(ElemKind::Tag, "mp3", true)
            .unwrap()
            .into_elem()
            .unwrap();

        assert_eq!(
            store.set_line(RelationStatus::Active, &tag, "a").unwrap(),
            LineUpdate::Appended
        );
        assert_eq!(
            store.set_line(RelationStatus::Inactive, &tag, "a").unwrap(),
            LineUpdate::Updated
        );
        assert_eq!(
            store.set_line(RelationStatus::Active, &tag, "a").unwrap(),
            LineUpdate::Updated
        );
        assert_eq!(std::fs::read_to_string(&tag.path).unwrap(), "mp3\n+a\n");
    }

    #[test]
    fn set_line_inactive_on_unknown_name_is_noop() {
        let (_dir, store) = setup();
        let tag = store
            .init(ElemKind::Tag, "mp3", true)
            .unwrap()
            .into_elem()
            .unwrap();

        assert_eq!(
            store.set_line(RelationStatus::Inactive, &tag, "b").unwrap(),
            LineUpdate::Absent
        );
        assert_eq!(std::fs::read_to_string(&tag.path).unwrap(), "mp3\n");
    }

    #[test]
    fn write_record_leaves_no_temp_files_behind() {
        let (_dir, store) = setup();
        let tag_dir = store.layout().kind_dir(ElemKind::Tag);
        let path = tag_dir.join("record");
        write_record(&path, &Record::new("x")).unwrap();
        write_record(&path, &Record::new("x")).unwrap();

        let entries = std::fs::read_dir(&tag_dir).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn read_record_rejects_identity_mismatch() {
        let (_dir, store) = setup();
        let tag = store
            .init(ElemKind::Tag, "mp3", true)
            .unwrap()
            .into_elem()
            .unwrap();
        std::fs::write(&tag.path, "other\n").unwrap();

        assert!(store.read_record(&tag).is_err());
    }

    #[test]
    fn shell_pattern_normalizes_stars_and_stray_brackets() {
        assert_eq!(shell_pattern("ro**"), "ro*");
        assert_eq!(shell_pattern("r[o"), "r[[]o");
        assert_eq!(shell_pattern("r[a-z]*"), "r[a-z]*");
        assert_eq!(shell_pattern("[]x]"), "[]x]");
        assert_eq!(shell_pattern("[!]"), "[[]!]");
        assert_eq!(shell_pattern("a[**"), "a[[]*");
    }
}
