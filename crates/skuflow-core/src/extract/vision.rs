//! Vision extractor adapter.
//!
//! Prepares an image payload, hands it to an external multimodal model with
//! the fixed extraction contract and maps the structured reply onto
//! extracted records.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use image::imageops::FilterType;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::confidence::{self, ConfidenceScorer};
use crate::error::VisionError;
use crate::llm::{extract_json, prompt::VISION_EXTRACTION_PROMPT};
use crate::models::cell::CellValue;
use crate::models::config::{ExtractionConfig, VisionConfig};
use crate::models::record::{Currency, DocumentKind, ExtractedRecord, ExtractionMetadata, ExtractionResult};
use crate::normalize::{clean_text, RecordNormalizer};

/// One call to the vision model.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    /// Instruction text carrying the output contract.
    pub prompt: String,
    /// Base64-encoded PNG.
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
}

/// External multimodal model answering extraction requests.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Return the raw model reply for the request.
    async fn extract(&self, request: &VisionRequest) -> Result<String, VisionError>;

    /// Model identifier for result metadata.
    fn model_name(&self) -> &str;
}

/// Reply shape required by the extraction contract.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VisionReply {
    Wrapped {
        #[serde(default)]
        items: Vec<VisionItem>,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Items(Vec<VisionItem>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisionItem {
    name: Option<String>,
    manufacturer: Option<String>,
    #[serde(alias = "mpn", alias = "partNumber")]
    part_number: Option<String>,
    category: Option<String>,
    supplier: Option<String>,
    quantity: Option<Value>,
    price: Option<Value>,
    currency: Option<String>,
    #[serde(alias = "description")]
    notes: Option<String>,
    confidence: Option<f64>,
}

/// Parsed model reply.
#[derive(Debug, Default)]
struct ParsedReply {
    records: Vec<ExtractedRecord>,
    items: usize,
    confidence: Option<f64>,
}

/// Extracts records from raster images through a vision model.
#[derive(Clone)]
pub struct VisionExtractor {
    model: Arc<dyn VisionModel>,
    normalizer: RecordNormalizer,
    scorer: ConfidenceScorer,
    max_image_size: u32,
    timeout: Duration,
}

impl VisionExtractor {
    pub fn new(model: Arc<dyn VisionModel>, extraction: &ExtractionConfig, vision: &VisionConfig) -> Self {
        Self {
            model,
            normalizer: RecordNormalizer::from_config(extraction),
            scorer: ConfidenceScorer::default(),
            max_image_size: vision.max_image_size,
            timeout: vision.timeout(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Extract with the configured timeout.
    pub async fn extract(&self, bytes: &[u8], file_name: Option<&str>) -> ExtractionResult {
        self.extract_with_deadline(bytes, file_name, self.timeout).await
    }

    /// Extract, aborting the model call after the shorter of `deadline` and
    /// the configured timeout. Every failure is a failed result.
    pub async fn extract_with_deadline(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
        deadline: Duration,
    ) -> ExtractionResult {
        let start = Instant::now();
        let mut metadata = ExtractionMetadata::new(DocumentKind::Vision)
            .with_file_name(file_name.unwrap_or_default());
        metadata.model = Some(self.model.model_name().to_string());

        let mut result = match self.run(bytes, deadline.min(self.timeout)).await {
            Ok(reply) => {
                metadata.total_rows = reply.items;
                metadata.skipped_rows = reply.items - reply.records.len();

                let mut aggregate = confidence::aggregate(&reply.records);
                if let Some(reported) = reply.confidence.filter(|c| c.is_finite()) {
                    aggregate = aggregate.min(reported.clamp(0.0, 1.0));
                }

                info!(
                    "Vision extraction: {} records from {} items",
                    reply.records.len(),
                    reply.items
                );
                ExtractionResult::success(reply.records, metadata, aggregate)
            }
            Err(e) => {
                warn!("Vision extraction failed: {}", e);
                ExtractionResult::failure(metadata, e.to_string())
            }
        };

        result.metadata.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn run(&self, bytes: &[u8], deadline: Duration) -> Result<ParsedReply, VisionError> {
        let (image_base64, width, height) = prepare_image(bytes, self.max_image_size)?;
        let request = VisionRequest {
            prompt: VISION_EXTRACTION_PROMPT.to_string(),
            image_base64,
            width,
            height,
        };

        debug!("Calling vision model {} ({}x{})", self.model.model_name(), width, height);
        let raw = tokio::time::timeout(deadline, self.model.extract(&request))
            .await
            .map_err(|_| VisionError::Timeout(deadline.as_millis() as u64))??;

        self.parse_reply(&raw)
    }

    fn parse_reply(&self, raw: &str) -> Result<ParsedReply, VisionError> {
        let reply: VisionReply = serde_json::from_str(extract_json(raw))?;
        let (items, confidence) = match reply {
            VisionReply::Wrapped { items, confidence } => (items, confidence),
            VisionReply::Items(items) => (items, None),
        };

        let records: Vec<ExtractedRecord> = items
            .iter()
            .filter_map(|item| self.record_from_item(item))
            .collect();

        Ok(ParsedReply {
            records,
            items: items.len(),
            confidence,
        })
    }

    fn record_from_item(&self, item: &VisionItem) -> Option<ExtractedRecord> {
        let text = |value: &Option<String>| value.as_deref().and_then(clean_text);

        let mut record = ExtractedRecord::new(text(&item.name)?);
        record.manufacturer = text(&item.manufacturer);
        record.part_number = text(&item.part_number);
        record.supplier = text(&item.supplier);
        record.notes = text(&item.notes);
        record.quantity = item
            .quantity
            .as_ref()
            .and_then(|q| self.normalizer.parse_quantity(&value_cell(q)));

        self.normalizer
            .apply_category(&mut record, item.category.as_deref());

        if let Some(price) = &item.price {
            let hint = item.currency.as_deref().and_then(Currency::from_code);
            self.normalizer.apply_price(&mut record, &value_cell(price), hint);
        }
        self.normalizer.finish(&mut record);

        record.confidence = self.scorer.score_reported(&record, item.confidence);
        Some(record)
    }
}

fn value_cell(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) => CellValue::text(s.as_str()),
        _ => CellValue::Empty,
    }
}

/// Decode, bound the longer side to `max_side` and re-encode as base64 PNG.
pub fn prepare_image(bytes: &[u8], max_side: u32) -> Result<(String, u32, u32), VisionError> {
    let mut img = image::load_from_memory(bytes).map_err(|e| VisionError::InvalidImage(e.to_string()))?;

    if max_side > 0 && img.width().max(img.height()) > max_side {
        debug!(
            "Downscaling {}x{} to fit {}px",
            img.width(),
            img.height(),
            max_side
        );
        img = img.resize(max_side, max_side, FilterType::Triangle);
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| VisionError::InvalidImage(e.to_string()))?;

    Ok((
        base64::engine::general_purpose::STANDARD.encode(&png),
        img.width(),
        img.height(),
    ))
}
