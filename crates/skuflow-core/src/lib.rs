//! Core library for supplier price-list ingestion.
//!
//! This crate provides:
//! - Document routing (spreadsheet, text-bearing document, image)
//! - Record extraction from cell grids, free text and vision model output
//! - Price/currency normalization and header-to-field recognition
//! - Confidence scoring of extracted records
//! - Tiered (exact / fuzzy / semantic) matching against an existing catalog

pub mod confidence;
pub mod error;
pub mod extract;
pub mod llm;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod pdf;

pub use error::{Result, SkuflowError};
pub use extract::{Document, DocumentKind, ExtractionRouter, TabularExtractor, TextPatternExtractor, VisionExtractor};
pub use matching::{Catalog, InMemoryCatalog, ReviewBatch, SemanticMatcher, TieredMatcher};
pub use models::config::SkuflowConfig;
pub use models::matching::{CatalogEntry, DecisionState, MatchCandidate, MatchDecision, MatchTier};
pub use models::record::{Currency, ExtractedRecord, ExtractionMetadata, ExtractionResult};
pub use normalize::{FieldRecognizer, PriceNormalizer};
