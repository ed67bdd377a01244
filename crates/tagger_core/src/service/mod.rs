//! Use-case services.
//!
//! # Responsibility
//! - Turn user-level requests into relation store calls.
//! - Keep the CLI free of store details.

pub mod tagger_service;
