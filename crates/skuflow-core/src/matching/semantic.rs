//! Semantic-match collaborator interface.

use async_trait::async_trait;

use crate::error::SemanticError;
use crate::models::matching::CatalogEntry;
use crate::models::record::ExtractedRecord;

/// External capability judging whether a record and a catalog entry are
/// the same product.
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    /// Equivalence confidence in [0, 1].
    async fn evaluate(&self, extracted: &ExtractedRecord, candidate: &CatalogEntry) -> Result<f64, SemanticError>;
}
