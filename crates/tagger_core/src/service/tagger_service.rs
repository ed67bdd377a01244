//! Tagging use-case service.
//!
//! # Responsibility
//! - Expose the user-level operations (tag, merge, clone, rename, delete,
//!   recover, list, query) over one [`RelationStore`].
//! - Expand wildcard arguments and canonicalize file arguments.
//!
//! # Invariants
//! - Every operation except `init` requires an initialized store.
//! - The entity kind is an explicit argument of each call.
//! - Query arguments combine by union; only tag criteria are parsed as
//!   boolean expressions.

use crate::config::TaggerConfig;
use crate::model::elem::{Elem, ElemKind, RelateAction};
use crate::model::set_list::SetList;
use crate::query::{evaluate_text, is_query, QueryError};
use crate::store::{
    ConsistencyWarning, InitOutcome, LayoutStatus, MatchScope, RecoverOutcome, RelateOutcome,
    RelationStore, StoreError,
};
use log::{debug, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const WILDCARD: char = '*';

/// Service error for tagging use-cases.
#[derive(Debug)]
pub enum TaggerServiceError {
    /// Missing or contradictory arguments.
    Usage(String),
    /// A required entity does not exist.
    NotFound { kind: ElemKind, name: String },
    /// An entity that must be fresh already exists.
    AlreadyExists { kind: ElemKind, name: String },
    Store(StoreError),
    Query(QueryError),
}

impl Display for TaggerServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::NotFound { kind, name } => write!(f, "{kind} `{name}` does not exist"),
            Self::AlreadyExists { kind, name } => write!(f, "{kind} `{name}` already exists"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaggerServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TaggerServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<QueryError> for TaggerServiceError {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::Store(err) => Self::Store(err),
            other => Self::Query(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, TaggerServiceError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreateReport {
    pub created: usize,
    /// Names that already existed.
    pub ignored: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    pub files: usize,
    /// Add relations applied.
    pub added: usize,
    /// Remove relations that hit an existing line.
    pub removed: usize,
    pub tags_created: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub elements: usize,
    /// Relations that did not exist before on the receiving side.
    pub relations_added: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub ignored: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoverReport {
    pub recovered: usize,
    pub ignored: usize,
}

/// Tagging facade over one relation store.
pub struct TaggerService {
    store: RelationStore,
}

impl TaggerService {
    pub fn new(store: RelationStore) -> Self {
        Self { store }
    }

    /// Opens the store described by `config` with default collaborators.
    pub fn open(config: &TaggerConfig) -> Self {
        Self::new(RelationStore::new(config.layout()))
    }

    pub fn store(&self) -> &RelationStore {
        &self.store
    }

    /// Creates the store directories when missing.
    pub fn init(&self) -> ServiceResult<LayoutStatus> {
        Ok(self.store.layout().ensure()?)
    }

    /// Creates tags; existing ones are counted as ignored.
    pub fn create_tags(&self, names: &[String]) -> ServiceResult<CreateReport> {
        self.require_ready()?;
        let mut report = CreateReport::default();
        for name in names {
            match self.store.init(ElemKind::Tag, name, true)? {
                InitOutcome::Created(_) => report.created += 1,
                InitOutcome::Exists(_) | InitOutcome::NotFound => report.ignored += 1,
            }
        }
        Ok(report)
    }

    /// Adds and removes tags on files.
    ///
    /// Files and added tags are created on demand. Removing a tag that does
    /// not exist is skipped.
    pub fn tag(&self, files: &[String], add: &[String], remove: &[String]) -> ServiceResult<TagReport> {
        if files.is_empty() {
            return Err(TaggerServiceError::Usage("no file given".to_string()));
        }
        if add.is_empty() && remove.is_empty() {
            return Err(TaggerServiceError::Usage(
                "no tag to add or remove".to_string(),
            ));
        }
        self.require_ready()?;
        let started_at = Instant::now();

        let mut report = TagReport::default();
        let mut added_tags = Vec::with_capacity(add.len());
        for name in add {
            let outcome = self.store.init(ElemKind::Tag, name, true)?;
            if matches!(outcome, InitOutcome::Created(_)) {
                report.tags_created += 1;
            }
            if let Some(tag) = outcome.into_elem() {
                added_tags.push(tag);
            }
        }
        let mut removed_tags = Vec::with_capacity(remove.len());
        for name in remove {
            match self.store.find(ElemKind::Tag, name)? {
                Some(tag) => removed_tags.push(tag),
                None => debug!("event=tag_skip module=service reason=unknown_tag name={name}"),
            }
        }

        for raw in files {
            let name = self.entity_name(ElemKind::File, raw);
            let Some(file) = self.store.init(ElemKind::File, &name, true)?.into_elem() else {
                continue;
            };
            report.files += 1;
            for tag in &added_tags {
                self.store.relate(RelateAction::Add, &file, tag)?;
                report.added += 1;
            }
            for tag in &removed_tags {
                if self.store.relate(RelateAction::Remove, &file, tag)? != RelateOutcome::NoOp {
                    report.removed += 1;
                }
            }
        }

        info!(
            "event=tag module=service status=ok duration_ms={} files={} added={} removed={} tags_created={}",
            started_at.elapsed().as_millis(),
            report.files,
            report.added,
            report.removed,
            report.tags_created
        );
        Ok(report)
    }

    /// Gives every named entity the union of all their relations.
    pub fn merge(&self, kind: ElemKind, names: &[String]) -> ServiceResult<MergeReport> {
        self.require_ready()?;
        let elems = names
            .iter()
            .map(|raw| self.require(kind, raw))
            .collect::<ServiceResult<Vec<_>>>()?;
        self.merge_elems(&elems)
    }

    /// Creates `target` and copies every relation of `source` to it.
    ///
    /// A file target must exist on disk.
    pub fn clone_elem(&self, kind: ElemKind, source: &str, target: &str) -> ServiceResult<MergeReport> {
        self.require_ready()?;
        let source = self.require(kind, source)?;
        let target_name = match kind {
            ElemKind::Tag => target.to_string(),
            ElemKind::File => self.store.canonicalize(target).map_err(|err| {
                TaggerServiceError::Usage(format!("target file `{target}` is not accessible: {err}"))
            })?,
        };

        let target = match self.store.init(kind, &target_name, true)? {
            InitOutcome::Created(elem) => elem,
            InitOutcome::Exists(_) | InitOutcome::NotFound => {
                return Err(TaggerServiceError::AlreadyExists {
                    kind,
                    name: target_name,
                })
            }
        };
        self.merge_elems(&[source, target])
    }

    /// Clones `old` into `new`, then soft-deletes `old`.
    pub fn rename(&self, kind: ElemKind, old: &str, new: &str) -> ServiceResult<MergeReport> {
        let report = self.clone_elem(kind, old, new)?;
        let old = self.require(kind, old)?;
        self.store.soft_delete(&old)?;
        info!(
            "event=rename module=service status=ok kind={} old={} relations={}",
            kind.label(),
            old.name,
            report.relations_added
        );
        Ok(report)
    }

    /// Soft-deletes entities; `*` arguments match live names.
    pub fn delete(&self, kind: ElemKind, names: &[String]) -> ServiceResult<DeleteReport> {
        self.require_ready()?;
        let mut report = DeleteReport::default();
        for name in self.expand(kind, names, MatchScope::Database)? {
            match self.store.find(kind, &name)? {
                Some(elem) => {
                    self.store.soft_delete(&elem)?;
                    report.deleted += 1;
                }
                None => report.ignored += 1,
            }
        }
        Ok(report)
    }

    /// Restores trashed entities; `*` arguments match trashed names.
    pub fn recover(&self, kind: ElemKind, names: &[String]) -> ServiceResult<RecoverReport> {
        self.require_ready()?;
        let mut report = RecoverReport::default();
        for name in self.expand(kind, names, MatchScope::Trash)? {
            match self.store.recover(kind, &name)? {
                RecoverOutcome::Recovered(_) => report.recovered += 1,
                RecoverOutcome::NotFound => report.ignored += 1,
            }
        }
        Ok(report)
    }

    /// Lists live (or trashed) names of `kind`, optionally filtered.
    ///
    /// A pattern with `*` is a wildcard; any other pattern is an exact name.
    pub fn list(&self, kind: ElemKind, pattern: Option<&str>, trash: bool) -> ServiceResult<SetList> {
        self.require_ready()?;
        let scope = if trash {
            MatchScope::Trash
        } else {
            MatchScope::Database
        };
        match pattern {
            None if trash => Ok(self.store.list_trashed(kind)?),
            None => Ok(self.store.list_all(kind)?),
            Some(pattern) if pattern.contains(WILDCARD) => {
                Ok(self.store.list_matching(scope, kind, pattern)?)
            }
            Some(raw) => {
                let name = self.entity_name(kind, raw);
                let present = if trash {
                    self.store.list_trashed(kind)?.contains(&name)
                } else {
                    self.store.find(kind, &name)?.is_some()
                };
                Ok(if present {
                    SetList::from_iter([name])
                } else {
                    SetList::new()
                })
            }
        }
    }

    /// Returns entities of `result_kind` related to any criterion.
    ///
    /// Criteria name entities of the other kind. No criteria lists every
    /// entity of `result_kind`.
    pub fn query(&self, result_kind: ElemKind, criteria: &[String]) -> ServiceResult<SetList> {
        if criteria.is_empty() {
            return self.list(result_kind, None, false);
        }
        self.require_ready()?;
        let started_at = Instant::now();
        let criteria_kind = result_kind.other();

        let mut result = SetList::new();
        for criterion in criteria {
            let matches = if criteria_kind == ElemKind::Tag && is_query(criterion) {
                evaluate_text(&self.store, criterion)?
            } else if criterion.contains(WILDCARD) {
                self.related_to_pattern(criteria_kind, criterion)?
            } else {
                let name = self.entity_name(criteria_kind, criterion);
                match self.store.find(criteria_kind, &name)? {
                    Some(elem) => self.store.list_related(&elem)?,
                    None => {
                        debug!(
                            "event=query_skip module=service reason=unknown_entity kind={} name={}",
                            criteria_kind.label(),
                            name
                        );
                        SetList::new()
                    }
                }
            };
            result.union(matches);
        }

        info!(
            "event=query module=service status=ok duration_ms={} result_kind={} criteria={} matches={}",
            started_at.elapsed().as_millis(),
            result_kind.label(),
            criteria.len(),
            result.len()
        );
        Ok(result)
    }

    /// Reports relations active on one side only.
    pub fn check_consistency(&self) -> ServiceResult<Vec<ConsistencyWarning>> {
        self.require_ready()?;
        Ok(self.store.check_consistency()?)
    }

    fn require_ready(&self) -> ServiceResult<()> {
        let layout = self.store.layout();
        if layout.is_ready() {
            Ok(())
        } else {
            Err(StoreError::MissingDirectory(layout.root().to_path_buf()).into())
        }
    }

    fn require(&self, kind: ElemKind, raw: &str) -> ServiceResult<Elem> {
        let name = self.entity_name(kind, raw);
        self.store
            .find(kind, &name)?
            .ok_or(TaggerServiceError::NotFound { kind, name })
    }

    /// Canonical entity name for a user argument.
    ///
    /// Files go through the canonicalizer; paths that no longer exist on
    /// disk keep the given text.
    fn entity_name(&self, kind: ElemKind, raw: &str) -> String {
        match kind {
            ElemKind::Tag => raw.to_string(),
            ElemKind::File => self
                .store
                .canonicalize(raw)
                .unwrap_or_else(|_| raw.to_string()),
        }
    }

    fn expand(&self, kind: ElemKind, names: &[String], scope: MatchScope) -> ServiceResult<Vec<String>> {
        let mut expanded = Vec::with_capacity(names.len());
        for raw in names {
            if raw.contains(WILDCARD) {
                expanded.extend(self.store.list_matching(scope, kind, raw)?);
            } else {
                expanded.push(self.entity_name(kind, raw));
            }
        }
        Ok(expanded)
    }

    fn related_to_pattern(&self, kind: ElemKind, pattern: &str) -> ServiceResult<SetList> {
        let scope = match kind {
            ElemKind::Tag => MatchScope::Database,
            ElemKind::File => MatchScope::Filesystem,
        };
        let mut related = SetList::new();
        for name in self.store.list_matching(scope, kind, pattern)? {
            if let Some(elem) = self.store.find(kind, &name)? {
                related.union(self.store.list_related(&elem)?);
            }
        }
        Ok(related)
    }

    fn merge_elems(&self, elems: &[Elem]) -> ServiceResult<MergeReport> {
        let mut report = MergeReport {
            elements: elems.len(),
            relations_added: 0,
        };
        if elems.len() < 2 {
            return Ok(report);
        }

        let mut current = Vec::with_capacity(elems.len());
        let mut union = SetList::new();
        for elem in elems {
            let related = self.store.list_related(elem)?;
            union.union(related.clone());
            current.push(related);
        }

        let other_kind = elems[0].kind.other();
        for name in union.iter() {
            let Some(counterpart) = self.store.find_counterpart(other_kind, name)? else {
                debug!("event=merge_skip module=service reason=missing_counterpart name={name}");
                continue;
            };
            for (elem, related) in elems.iter().zip(&current) {
                if !related.contains(name) {
                    self.store.relate(RelateAction::Add, &counterpart, elem)?;
                    report.relations_added += 1;
                }
            }
        }

        info!(
            "event=merge module=service status=ok kind={} elements={} relations_added={}",
            elems[0].kind.label(),
            report.elements,
            report.relations_added
        );
        Ok(report)
    }
}
