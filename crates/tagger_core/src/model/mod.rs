//! Domain model for tags, files and their relation records.
//!
//! # Responsibility
//! - Define entity kinds, relation markers and the record text layout.
//! - Provide the ordered name set used as query algebra substrate.
//!
//! # Invariants
//! - Relations are cross-kind only (tag <-> file).
//! - Deletion is a soft delete: records are trashed, never removed.

pub mod elem;
pub mod set_list;
