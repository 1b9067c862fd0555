//! Extraction router.
//!
//! Resolves a document to exactly one [`DocumentKind`] and dispatches to the
//! matching extractor. Resolution order: declared content type, then file
//! extension, then the leading bytes of the payload.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{TabularExtractor, TextPatternExtractor, VisionExtractor};
use crate::models::config::ExtractionConfig;
use crate::models::record::{DocumentKind, ExtractionMetadata, ExtractionResult};

const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv", "tab", "xlsx", "xlsm", "xls", "ods"];
const TEXT_EXTENSIONS: &[&str] = &["pdf", "txt", "text"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

const TABULAR_CONTENT_TYPES: &[&str] = &[
    "text/csv",
    "text/tab-separated-values",
    "application/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel.sheet.macroenabled.12",
    "application/vnd.oasis.opendocument.spreadsheet",
];
const TEXT_CONTENT_TYPES: &[&str] = &["application/pdf", "text/plain"];

const MB: u64 = 1024 * 1024;

/// A payload together with its declared metadata.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    pub bytes: &'a [u8],
    /// MIME-type-like string, as declared by whoever supplied the bytes.
    pub content_type: Option<&'a str>,
    pub filename: Option<&'a str>,
}

impl<'a> Document<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            content_type: None,
            filename: None,
        }
    }

    pub fn with_content_type(mut self, content_type: &'a str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }

    /// Resolve the extractor for this document.
    pub fn kind(&self) -> DocumentKind {
        classify(self)
    }
}

/// Resolve a document to one extractor kind.
pub fn classify(doc: &Document<'_>) -> DocumentKind {
    if let Some(kind) = doc.content_type.and_then(kind_from_content_type) {
        log_route("content type", kind);
        return kind;
    }
    if let Some(kind) = doc.filename.and_then(kind_from_extension) {
        log_route("extension", kind);
        return kind;
    }
    if let Some(kind) = kind_from_signature(doc.bytes) {
        log_route("signature", kind);
        return kind;
    }
    DocumentKind::Unrecognized
}

fn log_route(source: &str, kind: DocumentKind) {
    debug!("Routed by {} to {}", source, extractor_name(kind));
}

fn kind_from_content_type(content_type: &str) -> Option<DocumentKind> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if TABULAR_CONTENT_TYPES.contains(&essence.as_str()) {
        Some(DocumentKind::Tabular)
    } else if TEXT_CONTENT_TYPES.contains(&essence.as_str()) {
        Some(DocumentKind::TextPattern)
    } else if essence.starts_with("image/") {
        Some(DocumentKind::Vision)
    } else {
        None
    }
}

fn kind_from_extension(filename: &str) -> Option<DocumentKind> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();

    if TABULAR_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Tabular)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::TextPattern)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Vision)
    } else {
        None
    }
}

fn kind_from_signature(bytes: &[u8]) -> Option<DocumentKind> {
    const SIGNATURES: &[(&[u8], DocumentKind)] = &[
        (b"%PDF", DocumentKind::TextPattern),
        (b"\x89PNG", DocumentKind::Vision),
        (b"\xFF\xD8\xFF", DocumentKind::Vision),
        (b"GIF8", DocumentKind::Vision),
        (b"II*\0", DocumentKind::Vision),
        (b"MM\0*", DocumentKind::Vision),
        (b"PK\x03\x04", DocumentKind::Tabular),
        (b"\xD0\xCF\x11\xE0", DocumentKind::Tabular),
    ];

    SIGNATURES
        .iter()
        .find(|(magic, _)| bytes.starts_with(magic))
        .map(|(_, kind)| *kind)
}

/// Rough processing-time estimate for progress feedback.
///
/// Tabular: 0.5 s + 0.2 s/MB, at most 5 s. Text: 2 s + 1 s/MB, at most 20 s.
/// Vision: a flat 10 s.
pub fn estimate_processing_time(kind: DocumentKind, size_bytes: usize) -> Duration {
    let scaled = |base_ms: u64, per_mb_ms: u64, cap_ms: u64| {
        let ms = base_ms + per_mb_ms * size_bytes as u64 / MB;
        Duration::from_millis(ms.min(cap_ms))
    };

    match kind {
        DocumentKind::Tabular => scaled(500, 200, 5_000),
        DocumentKind::TextPattern => scaled(2_000, 1_000, 20_000),
        DocumentKind::Vision => Duration::from_secs(10),
        DocumentKind::Unrecognized => Duration::ZERO,
    }
}

/// Display name of the extractor behind a kind.
pub fn extractor_name(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Tabular => "Spreadsheet",
        DocumentKind::TextPattern => "Document text",
        DocumentKind::Vision => "Image (vision model)",
        DocumentKind::Unrecognized => "Unsupported",
    }
}

/// Single entry point from raw documents to extraction results.
#[derive(Clone, Default)]
pub struct ExtractionRouter {
    tabular: TabularExtractor,
    text: TextPatternExtractor,
    vision: Option<VisionExtractor>,
}

impl ExtractionRouter {
    /// Router without a vision model; images fail with a configuration message.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            tabular: TabularExtractor::from_config(config),
            text: TextPatternExtractor::from_config(config),
            vision: None,
        }
    }

    pub fn with_vision(mut self, vision: VisionExtractor) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn has_vision(&self) -> bool {
        self.vision.is_some()
    }

    /// Extract with the vision extractor's configured timeout.
    pub async fn extract(&self, doc: &Document<'_>) -> ExtractionResult {
        self.dispatch(doc, None).await
    }

    /// Extract, aborting an external model call once `deadline` elapses.
    ///
    /// Tabular and text extraction never leave the process and ignore it.
    pub async fn extract_with_deadline(&self, doc: &Document<'_>, deadline: Duration) -> ExtractionResult {
        self.dispatch(doc, Some(deadline)).await
    }

    async fn dispatch(&self, doc: &Document<'_>, deadline: Option<Duration>) -> ExtractionResult {
        let kind = classify(doc);
        info!(
            "Routing {} ({} bytes) to {}",
            doc.filename.unwrap_or("<unnamed>"),
            doc.bytes.len(),
            extractor_name(kind)
        );

        if doc.bytes.is_empty() {
            return failure(kind, doc, "document is empty");
        }

        match kind {
            DocumentKind::Tabular => self.tabular.extract(doc.bytes, doc.filename),
            DocumentKind::TextPattern => self.text.extract(doc.bytes, doc.filename),
            DocumentKind::Vision => match (&self.vision, deadline) {
                (Some(vision), Some(deadline)) => {
                    vision.extract_with_deadline(doc.bytes, doc.filename, deadline).await
                }
                (Some(vision), None) => vision.extract(doc.bytes, doc.filename).await,
                (None, _) => {
                    warn!("Image received but no vision model is configured");
                    failure(kind, doc, "image input requires a vision model, which is not configured")
                }
            },
            DocumentKind::Unrecognized => {
                let declared = doc.content_type.or(doc.filename).unwrap_or("unknown");
                failure(kind, doc, format!("unsupported document type: {}", declared))
            }
        }
    }
}

fn failure(kind: DocumentKind, doc: &Document<'_>, message: impl Into<String>) -> ExtractionResult {
    let metadata = ExtractionMetadata::new(kind).with_file_name(doc.filename.unwrap_or_default());
    ExtractionResult::failure(metadata, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::vision::{VisionModel, VisionRequest};
    use crate::error::VisionError;
    use crate::models::config::VisionConfig;
    use async_trait::async_trait;
    use image::{ImageBuffer, Rgb};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::Arc;

    struct OneItemModel;

    #[async_trait]
    impl VisionModel for OneItemModel {
        async fn extract(&self, _request: &VisionRequest) -> Result<String, VisionError> {
            Ok(r#"{"items": [{"name": "Widget", "price": "12.50 EUR"}]}"#.to_string())
        }

        fn model_name(&self) -> &str {
            "one-item"
        }
    }

    fn png() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(8, 8, Rgb([0u8, 0, 0]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_content_type_wins_over_extension() {
        let doc = Document::new(b"a,b")
            .with_content_type("image/png")
            .with_filename("prices.csv");
        assert_eq!(classify(&doc), DocumentKind::Vision);

        let doc = Document::new(b"a,b")
            .with_content_type("text/csv; charset=utf-8")
            .with_filename("prices.png");
        assert_eq!(classify(&doc), DocumentKind::Tabular);
    }

    #[test]
    fn test_generic_content_type_falls_back_to_extension() {
        let doc = Document::new(b"x")
            .with_content_type("application/octet-stream")
            .with_filename("Angebot.PDF");
        assert_eq!(classify(&doc), DocumentKind::TextPattern);

        assert_eq!(classify(&Document::new(b"x").with_filename("list.xlsx")), DocumentKind::Tabular);
        assert_eq!(classify(&Document::new(b"x").with_filename("scan.jpeg")), DocumentKind::Vision);
        assert_eq!(classify(&Document::new(b"x").with_filename("notes.txt")), DocumentKind::TextPattern);
    }

    #[test]
    fn test_signature_is_last_resort() {
        assert_eq!(classify(&Document::new(b"%PDF-1.7")), DocumentKind::TextPattern);
        assert_eq!(classify(&Document::new(&png())), DocumentKind::Vision);
        assert_eq!(classify(&Document::new(b"PK\x03\x04rest")), DocumentKind::Tabular);
        assert_eq!(
            classify(&Document::new(b"hello").with_filename("archive.zip")),
            DocumentKind::Unrecognized
        );
    }

    #[test]
    fn test_processing_time_estimates() {
        assert_eq!(estimate_processing_time(DocumentKind::Tabular, 0), Duration::from_millis(500));
        assert_eq!(
            estimate_processing_time(DocumentKind::Tabular, 5 * MB as usize),
            Duration::from_millis(1_500)
        );
        assert_eq!(
            estimate_processing_time(DocumentKind::Tabular, 500 * MB as usize),
            Duration::from_secs(5)
        );
        assert_eq!(
            estimate_processing_time(DocumentKind::TextPattern, 3 * MB as usize),
            Duration::from_secs(5)
        );
        assert_eq!(
            estimate_processing_time(DocumentKind::TextPattern, 100 * MB as usize),
            Duration::from_secs(20)
        );
        assert_eq!(estimate_processing_time(DocumentKind::Vision, 1), Duration::from_secs(10));
        assert_eq!(estimate_processing_time(DocumentKind::Unrecognized, 1), Duration::ZERO);
    }

    #[test]
    fn test_extractor_names() {
        assert_eq!(extractor_name(DocumentKind::Tabular), "Spreadsheet");
        assert_eq!(extractor_name(DocumentKind::Unrecognized), "Unsupported");
    }

    #[tokio::test]
    async fn test_unrecognized_input_is_failed_result() {
        let router = ExtractionRouter::default();
        let result = router
            .extract(&Document::new(b"\x00\x01binary").with_filename("blob.bin"))
            .await;

        assert!(!result.success);
        assert!(result.records.is_empty());
        assert_eq!(result.metadata.extractor, DocumentKind::Unrecognized);
        assert_eq!(result.message.as_deref(), Some("unsupported document type: blob.bin"));
    }

    #[tokio::test]
    async fn test_empty_document_fails() {
        let result = ExtractionRouter::default()
            .extract(&Document::new(b"").with_filename("empty.csv"))
            .await;
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("document is empty"));
    }

    #[tokio::test]
    async fn test_routes_csv_to_tabular() {
        let csv = "Product Name,Brand,P/N,Price\nWidget,Acme,ABC-123,\"$1,234.56\"\n";
        let result = ExtractionRouter::default()
            .extract(&Document::new(csv.as_bytes()).with_filename("quote.csv"))
            .await;

        assert!(result.success);
        assert_eq!(result.metadata.extractor, DocumentKind::Tabular);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].part_number.as_deref(), Some("ABC-123"));
    }

    #[tokio::test]
    async fn test_image_without_vision_model_fails() {
        let router = ExtractionRouter::from_config(&ExtractionConfig::default());
        assert!(!router.has_vision());

        let result = router.extract(&Document::new(&png()).with_filename("scan.png")).await;
        assert!(!result.success);
        assert_eq!(result.metadata.extractor, DocumentKind::Vision);
    }

    #[tokio::test]
    async fn test_image_routed_to_vision_model() {
        let config = ExtractionConfig::default();
        let vision = VisionExtractor::new(Arc::new(OneItemModel), &config, &VisionConfig::default());
        let router = ExtractionRouter::from_config(&config).with_vision(vision);

        let bytes = png();
        let result = router
            .extract_with_deadline(
                &Document::new(&bytes).with_content_type("image/png"),
                Duration::from_secs(5),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.metadata.model.as_deref(), Some("one-item"));
        assert_eq!(result.records[0].name, "Widget");
    }
}
