//! Records of the authoritative store and their index documents.
//!
//! - [`CollectionSummary`]: identity and label of a collection
//! - [`Collection`]: a full collection record, indexed on its own
//! - [`Concept`]: one entry of a collection, indexed under [`form_document_id`]
//! - [`AffectedNodes`]: what a single edit touched

use std::collections::BTreeMap;

pub mod affected;
pub mod collection;
pub mod concept;

pub use affected::AffectedNodes;
pub use collection::{Collection, CollectionSummary};
pub use concept::{Concept, form_document_id};

/// Language tag to values, e.g. `{"fi": ["käsite"], "en": ["concept"]}`.
pub type Localized = BTreeMap<String, Vec<String>>;
