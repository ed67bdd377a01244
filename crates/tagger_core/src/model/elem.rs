//! Entity and record-line domain model.
//!
//! # Responsibility
//! - Define the two entity kinds and their storage directory names.
//! - Define relation status markers and the text layout of one record.
//!
//! # Invariants
//! - A relation only ever links two entities of different kinds.
//! - Record line 1 is the identity name; every later line is
//!   `<marker><name>` with marker `+` (active) or `-` (tombstone).
//!   Lines with any other first character are kept and re-emitted verbatim.
//! - Within one record at most one line exists per related name.
//!
//! # See also
//! - `store::relation_store` for the persistence side.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Entity kind tracked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElemKind {
    /// User-defined label.
    Tag,
    /// Tagged filesystem node, identified by its canonical path.
    File,
}

impl ElemKind {
    /// Returns the counterpart kind; relations are cross-kind only.
    pub fn other(self) -> Self {
        match self {
            Self::Tag => Self::File,
            Self::File => Self::Tag,
        }
    }

    /// Storage sub-directory name under the store root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::File => "files",
        }
    }

    /// Singular lowercase label for messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::File => "file",
        }
    }
}

impl Display for ElemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Status marker of one relation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationStatus {
    /// `+name`: relation currently holds.
    Active,
    /// `-name`: relation existed once; retained as a tombstone.
    Inactive,
}

impl RelationStatus {
    pub fn marker(self) -> char {
        match self {
            Self::Active => '+',
            Self::Inactive => '-',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '+' => Some(Self::Active),
            '-' => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Requested change for a symmetric relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelateAction {
    Add,
    Remove,
}

impl RelateAction {
    /// Status written to both records for this action.
    pub fn status(self) -> RelationStatus {
        match self {
            Self::Add => RelationStatus::Active,
            Self::Remove => RelationStatus::Inactive,
        }
    }
}

/// Resolved entity handle: kind, canonical name and record path.
///
/// Handles are cheap snapshots; they never outlive one operation's intent
/// and hold no open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elem {
    pub kind: ElemKind,
    pub name: String,
    pub path: PathBuf,
}

/// One body line of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationLine {
    pub status: RelationStatus,
    pub name: String,
}

impl RelationLine {
    pub fn active(name: impl Into<String>) -> Self {
        Self {
            status: RelationStatus::Active,
            name: name.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RelationStatus::Active
    }
}

/// One body line of a record, as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyLine {
    Relation(RelationLine),
    /// Line without a relation marker; written back verbatim.
    Opaque(String),
}

/// Parsed content of one record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Canonical name of the owning entity (line 1).
    pub identity: String,
    /// Body lines in file order.
    pub body: Vec<BodyLine>,
}

impl Record {
    /// Creates a record holding only the identity line.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            body: Vec::new(),
        }
    }

    /// Parses record text.
    ///
    /// Returns `None` when the identity line is missing. Body lines with an
    /// unknown marker are kept as [`BodyLine::Opaque`].
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.strip_suffix('\n').unwrap_or(text);
        let mut lines = text.split('\n');
        let identity = strip_cr(lines.next()?);
        if identity.is_empty() {
            return None;
        }

        let mut record = Self::new(identity);
        for raw in lines {
            let mut chars = strip_cr(raw).chars();
            let entry = match chars.next().and_then(RelationStatus::from_marker) {
                Some(status) => BodyLine::Relation(RelationLine {
                    status,
                    name: chars.as_str().to_string(),
                }),
                None => BodyLine::Opaque(raw.to_string()),
            };
            record.body.push(entry);
        }
        Some(record)
    }

    /// Renders the record in its on-disk layout, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.identity.len() + 1 + self.body.len() * 16);
        out.push_str(&self.identity);
        out.push('\n');
        for entry in &self.body {
            match entry {
                BodyLine::Relation(line) => {
                    out.push(line.status.marker());
                    out.push_str(&line.name);
                }
                BodyLine::Opaque(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    /// Relation lines in file order.
    pub fn relations(&self) -> impl Iterator<Item = &RelationLine> {
        self.body.iter().filter_map(|entry| match entry {
            BodyLine::Relation(line) => Some(line),
            BodyLine::Opaque(_) => None,
        })
    }

    pub fn push_relation(&mut self, line: RelationLine) {
        self.body.push(BodyLine::Relation(line));
    }

    /// Finds the line referencing `name`, ignoring its marker.
    pub fn line_mut(&mut self, name: &str) -> Option<&mut RelationLine> {
        self.body.iter_mut().find_map(|entry| match entry {
            BodyLine::Relation(line) if line.name == name => Some(line),
            _ => None,
        })
    }

    pub fn line(&self, name: &str) -> Option<&RelationLine> {
        self.relations().find(|line| line.name == name)
    }

    /// Names of active lines in file order.
    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.relations()
            .filter(|line| line.is_active())
            .map(|line| line.name.as_str())
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Returns whether `name` can be stored as an identity or relation line.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['\n', '\r'])
}
