//! Explicit per-invocation configuration.
//!
//! # Responsibility
//! - Carry the store root and output mode into every operation.
//!
//! # Invariants
//! - No process-global mode flags; callers pass this value around.
//! - Entity kind is chosen per call, never stored here.

use crate::logging::default_log_level;
use crate::store::StoreLayout;
use std::path::PathBuf;

/// Name of the store directory under the home or working directory.
pub const STORE_DIR_NAME: &str = ".tagger";

/// Amount of human-facing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Result lines only, no summaries.
    Quiet,
    #[default]
    Normal,
    /// Summaries plus debug-level logs.
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggerConfig {
    pub root: PathBuf,
    pub verbosity: Verbosity,
    /// Operate on trashed records where an operation supports it.
    pub trash: bool,
}

impl TaggerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            verbosity: Verbosity::default(),
            trash: false,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_trash(mut self, trash: bool) -> Self {
        self.trash = trash;
        self
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(self.root.clone())
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// Log level for this configuration.
    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            Verbosity::Debug => "debug",
            Verbosity::Quiet | Verbosity::Normal => default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TaggerConfig, Verbosity};
    use crate::model::elem::ElemKind;

    #[test]
    fn layout_follows_root() {
        let config = TaggerConfig::new("/tmp/store");
        assert_eq!(
            config.layout().kind_dir(ElemKind::Tag),
            std::path::Path::new("/tmp/store/tags")
        );
        assert!(!config.trash);
        assert!(!config.is_quiet());
    }

    #[test]
    fn debug_verbosity_forces_debug_logs() {
        let config = TaggerConfig::new("/s").with_verbosity(Verbosity::Debug);
        assert_eq!(config.log_level(), "debug");
        let quiet = TaggerConfig::new("/s").with_verbosity(Verbosity::Quiet);
        assert!(quiet.is_quiet());
    }
}
