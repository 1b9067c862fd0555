//! Reconciliation of extracted records with the existing catalog.

pub mod catalog;
pub mod matcher;
pub mod review;
pub mod semantic;
pub mod similarity;

pub use catalog::{Catalog, InMemoryCatalog};
pub use matcher::TieredMatcher;
pub use review::{ReviewBatch, ReviewEntry, ReviewSummary};
pub use semantic::SemanticMatcher;
