//! Keeping the index in step with the authoritative store.
//!
//! An edit produces an [`AffectedNodes`](crate::model::AffectedNodes)
//! descriptor. [`engine::SyncEngine`] asks [`decision::decide`] how much to
//! rebuild, then either
//!
//! - rebuilds everything with [`full::FullReindexer`],
//! - rebuilds whole collections, or
//! - widens the touched concepts to their one-hop [`closure`] and rewrites
//!   exactly those documents.
//!
//! All writes go through [`writer::IndexWriter`], which turns store-level
//! failures into entries of a [`report::SyncReport`] instead of errors.

pub mod closure;
pub mod decision;
pub mod engine;
pub mod full;
pub mod report;
pub mod writer;

pub use closure::{Closure, ClosureExpander};
pub use decision::{ReindexPlan, decide};
pub use engine::{BootstrapReport, SyncEngine};
pub use full::FullReindexer;
pub use report::{FailedOperation, Strategy, SyncReport};
