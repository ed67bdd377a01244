//! Core of the tagger: a filesystem-backed tag/file relation store with
//! boolean tag queries.
//! The CLI is a thin shell over [`TaggerService`].

pub mod boundary;
pub mod config;
pub mod logging;
pub mod model;
pub mod query;
pub mod service;
pub mod store;

pub use boundary::{FsCanonicalizer, LineSink, PathCanonicalizer, TextCodec, Utf8Codec, WriterSink};
pub use config::{TaggerConfig, Verbosity, STORE_DIR_NAME};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::elem::{Elem, ElemKind, RelateAction, RelationStatus};
pub use model::set_list::SetList;
pub use query::{ParseError, QueryError};
pub use service::tagger_service::{
    CreateReport, DeleteReport, MergeReport, RecoverReport, TagReport, TaggerService,
    TaggerServiceError,
};
pub use store::{
    ConsistencyWarning, LayoutStatus, RelationStore, StoreError, StoreLayout, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
