//! Error types for the skuflow-core library.

use thiserror::Error;

use crate::models::matching::DecisionState;

/// Main error type for the skuflow library.
#[derive(Error, Debug)]
pub enum SkuflowError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Spreadsheet or delimited-text loading error.
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Vision model error.
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),

    /// Semantic matching error.
    #[error("semantic matching error: {0}")]
    Semantic(#[from] SemanticError),

    /// Match decision error.
    #[error("decision error: {0}")]
    Decision(#[from] DecisionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to loading a cell grid.
#[derive(Error, Debug)]
pub enum GridError {
    /// Delimited text could not be read.
    #[error("failed to read delimited text: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be opened or read.
    #[error("failed to read workbook: {0}")]
    Workbook(String),

    /// The workbook has no sheet with data.
    #[error("workbook contains no non-empty sheet")]
    NoSheet,

    /// The grid has no rows.
    #[error("document contains no rows")]
    Empty,
}

/// Errors from the external vision model.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The image payload could not be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Network or API communication error.
    #[error("communication error: {0}")]
    Communication(String),

    /// The model answered with something outside the extraction contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not finish before the deadline.
    #[error("vision call timed out after {0} ms")]
    Timeout(u64),
}

/// Errors from the external semantic-matching capability.
#[derive(Error, Debug)]
pub enum SemanticError {
    /// Network or API communication error.
    #[error("communication error: {0}")]
    Communication(String),

    /// The model answered with something that is not a confidence.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call did not finish before the deadline.
    #[error("semantic call timed out")]
    Timeout,
}

/// Errors raised when a caller drives a match decision.
#[derive(Error, Debug, PartialEq)]
pub enum DecisionError {
    /// The decision was already resolved by the caller.
    #[error("decision already resolved as {0:?}")]
    AlreadyResolved(DecisionState),

    /// The candidate is not part of the decision's candidate list.
    #[error("unknown candidate: {0}")]
    UnknownCandidate(String),

    /// No record exists at this position (never extracted or withdrawn).
    #[error("no record at position {0}")]
    UnknownRecord(usize),
}

impl From<serde_json::Error> for VisionError {
    fn from(e: serde_json::Error) -> Self {
        VisionError::InvalidResponse(e.to_string())
    }
}

impl From<serde_json::Error> for SemanticError {
    fn from(e: serde_json::Error) -> Self {
        SemanticError::InvalidResponse(e.to_string())
    }
}

/// Result type for the skuflow library.
pub type Result<T> = std::result::Result<T, SkuflowError>;
