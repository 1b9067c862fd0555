//! Tabular extractor: spreadsheets and delimited text.

use std::time::Instant;

use tracing::{debug, info, trace};

use super::grid::{self, Grid};
use crate::confidence::{self, ConfidenceScorer};
use crate::models::cell::CellValue;
use crate::models::config::ExtractionConfig;
use crate::models::record::{Currency, DocumentKind, ExtractedRecord, ExtractionMetadata, ExtractionResult};
use crate::normalize::{clean_text, CanonicalField, ColumnMap, FieldRecognizer, RecordNormalizer};

/// Lowercased row labels that mark summary lines rather than items.
const SUMMARY_LABELS: &[&str] = &["total", "subtotal", "sub-total", "summe", "gesamt", "合计", "总计"];

/// Records built from a block of data rows.
#[derive(Debug, Default)]
pub(crate) struct RowOutcome {
    pub records: Vec<ExtractedRecord>,
    pub total_rows: usize,
    pub skipped_rows: usize,
}

/// Extracts records from a grid of cells.
#[derive(Debug, Clone)]
pub struct TabularExtractor {
    recognizer: FieldRecognizer,
    normalizer: RecordNormalizer,
    scorer: ConfidenceScorer,
    header_scan_rows: usize,
}

impl Default for TabularExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl TabularExtractor {
    pub fn new(recognizer: FieldRecognizer, normalizer: RecordNormalizer, header_scan_rows: usize) -> Self {
        Self {
            recognizer,
            normalizer,
            scorer: ConfidenceScorer::default(),
            header_scan_rows,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            FieldRecognizer::default(),
            RecordNormalizer::from_config(config),
            config.header_scan_rows,
        )
    }

    pub(crate) fn normalizer(&self) -> &RecordNormalizer {
        &self.normalizer
    }

    pub(crate) fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// Extract records from a CSV/TSV or workbook payload.
    pub fn extract(&self, bytes: &[u8], file_name: Option<&str>) -> ExtractionResult {
        let start = Instant::now();
        let mut metadata = ExtractionMetadata::new(DocumentKind::Tabular)
            .with_file_name(file_name.unwrap_or_default());

        let mut result = match grid::load(bytes) {
            Ok(grid) => self.extract_grid(&grid, metadata),
            Err(e) => {
                debug!("Could not load grid: {}", e);
                metadata.processing_time_ms = start.elapsed().as_millis() as u64;
                return ExtractionResult::failure(metadata, e.to_string());
            }
        };

        result.metadata.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Extract records from an already loaded grid.
    pub fn extract_grid(&self, grid: &Grid, mut metadata: ExtractionMetadata) -> ExtractionResult {
        metadata.sheet_name = grid.sheet_name.clone();

        let Some((header_row, map)) = self.find_header(&grid.rows) else {
            let scanned = self.header_scan_rows.min(grid.rows.len());
            return ExtractionResult::failure(
                metadata,
                format!("no header row recognized in the first {} rows", scanned),
            );
        };

        debug!("Header row {} maps {:?}", header_row, map.to_named());
        metadata.header_row = Some(header_row);
        metadata.column_map = map.to_named();
        metadata.has_table_structure = true;

        let header = &grid.rows[header_row];
        let outcome = self.records_from_rows(&grid.rows[header_row + 1..], &map, Some(header), None);

        metadata.total_rows = outcome.total_rows;
        metadata.skipped_rows = outcome.skipped_rows;

        info!(
            "Tabular extraction: {} records from {} rows ({} skipped)",
            outcome.records.len(),
            outcome.total_rows,
            outcome.skipped_rows
        );

        let aggregate = confidence::aggregate(&outcome.records);
        ExtractionResult::success(outcome.records, metadata, aggregate)
    }

    /// First row within the scan depth that looks like a header.
    pub(crate) fn find_header(&self, rows: &[Vec<CellValue>]) -> Option<(usize, ColumnMap)> {
        rows.iter()
            .take(self.header_scan_rows)
            .enumerate()
            .find_map(|(index, row)| {
                let headers: Vec<String> = row.iter().map(|c| c.as_text().unwrap_or_default()).collect();
                let map = self.recognizer.recognize(&headers);
                trace!("Row {} recognized {} fields", index, map.len());
                map.is_header().then_some((index, map))
            })
    }

    /// Map data rows to records. Rows without a usable name are skipped.
    ///
    /// `header` lets repeated header rows (common in paged exports) be
    /// dropped; `cap` bounds each record's confidence.
    pub(crate) fn records_from_rows(
        &self,
        rows: &[Vec<CellValue>],
        map: &ColumnMap,
        header: Option<&[CellValue]>,
        cap: Option<f64>,
    ) -> RowOutcome {
        let mut outcome = RowOutcome::default();

        for (offset, row) in rows.iter().enumerate() {
            if row.iter().all(CellValue::is_empty) {
                continue;
            }
            outcome.total_rows += 1;

            if header.is_some_and(|h| is_repeated_header(row, h)) {
                trace!("Row {} repeats the header", offset);
                outcome.skipped_rows += 1;
                continue;
            }

            match self.record_from_row(row, map) {
                Some(mut record) => {
                    let score = self.scorer.score(&record);
                    record.confidence = cap.map_or(score, |c| score.min(c));
                    outcome.records.push(record);
                }
                None => {
                    trace!("Row {} has no usable name", offset);
                    outcome.skipped_rows += 1;
                }
            }
        }

        outcome
    }

    fn record_from_row(&self, row: &[CellValue], map: &ColumnMap) -> Option<ExtractedRecord> {
        let cell = |field: CanonicalField| map.get(field).and_then(|i| row.get(i));
        let text = |field: CanonicalField| {
            cell(field)
                .and_then(CellValue::as_text)
                .and_then(|s| clean_text(&s))
        };

        // Without a name column the description doubles as the name
        let (name, notes) = if map.contains(CanonicalField::Name) {
            (text(CanonicalField::Name)?, text(CanonicalField::Notes))
        } else {
            (text(CanonicalField::Notes)?, None)
        };

        if SUMMARY_LABELS.contains(&name.to_lowercase().trim_end_matches(':')) {
            return None;
        }

        let mut record = ExtractedRecord::new(name);
        record.manufacturer = text(CanonicalField::Manufacturer);
        record.part_number = text(CanonicalField::PartNumber);
        record.supplier = text(CanonicalField::Supplier);
        record.notes = notes;
        record.quantity = cell(CanonicalField::Quantity).and_then(|c| self.normalizer.parse_quantity(c));

        self.normalizer
            .apply_category(&mut record, text(CanonicalField::Category).as_deref());

        if let Some(price_col) = map.get(CanonicalField::Price) {
            let hint: Option<Currency> = text(CanonicalField::Currency)
                .and_then(|c| Currency::from_code(&c))
                .or_else(|| map.currency_hint(price_col));
            if let Some(price) = row.get(price_col) {
                self.normalizer.apply_price(&mut record, price, hint);
            }
        }

        self.normalizer.finish(&mut record);
        Some(record)
    }
}

fn is_repeated_header(row: &[CellValue], header: &[CellValue]) -> bool {
    let matching = row
        .iter()
        .zip(header)
        .filter(|(a, b)| match (a.as_text(), b.as_text()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
            _ => false,
        })
        .count();
    matching >= 2
}
