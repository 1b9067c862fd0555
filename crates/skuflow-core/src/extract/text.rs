//! Text-pattern extractor: PDFs with a text layer and plain text.
//!
//! Line groups that look like a table are handed to the tabular path when
//! their header is recognized; every other line goes through the regex
//! fallback, which only emits a record for lines carrying a price.

use std::time::Instant;

use regex::Regex;
use tracing::{debug, info, trace, warn};

use super::tabular::TabularExtractor;
use crate::confidence::{self, TEXT_PATTERN_CAP};
use crate::models::cell::CellValue;
use crate::models::config::ExtractionConfig;
use crate::models::record::{DocumentKind, ExtractedRecord, ExtractionMetadata, ExtractionResult};
use crate::normalize::{clean_text, ColumnMap};
use crate::normalize::patterns::{
    MANUFACTURER_LABELED, PART_NUMBER_LABELED, PART_NUMBER_STANDALONE, PRICE_IN_TEXT,
    QUANTITY_LABELED, QUANTITY_WITH_UNIT, SEPARATOR_LINE, SUPPLIER_LABELED, WIDE_GAP,
};
use crate::pdf::{PdfExtractor, PdfProcessor};

/// Lines of one table-looking block, with their line numbers.
type LineGroup = Vec<(usize, Vec<CellValue>)>;

/// Extracts records from text-bearing documents.
#[derive(Debug, Clone, Default)]
pub struct TextPatternExtractor {
    tabular: TabularExtractor,
}

impl TextPatternExtractor {
    pub fn new(tabular: TabularExtractor) -> Self {
        Self { tabular }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(TabularExtractor::from_config(config))
    }

    /// Extract from a PDF or UTF-8 text payload.
    pub fn extract(&self, bytes: &[u8], file_name: Option<&str>) -> ExtractionResult {
        let start = Instant::now();
        let mut metadata = ExtractionMetadata::new(DocumentKind::TextPattern)
            .with_file_name(file_name.unwrap_or_default());

        let text = if bytes.starts_with(b"%PDF") {
            match self.pdf_text(bytes, &mut metadata) {
                Ok(text) => text,
                Err(message) => {
                    metadata.processing_time_ms = start.elapsed().as_millis() as u64;
                    return ExtractionResult::failure(metadata, message);
                }
            }
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        };

        let mut result = self.extract_text(&text, metadata);
        result.metadata.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    fn pdf_text(&self, bytes: &[u8], metadata: &mut ExtractionMetadata) -> Result<String, String> {
        let mut pdf = PdfExtractor::new();
        pdf.load(bytes).map_err(|e| e.to_string())?;
        metadata.page_count = Some(pdf.page_count());

        if !pdf.analyze().has_text() {
            warn!("PDF has no text layer");
            return Err("no extractable text: the PDF looks scanned, submit it as an image".to_string());
        }

        pdf.extract_text().map_err(|e| e.to_string())
    }

    /// Extract records from already decoded text.
    pub fn extract_text(&self, text: &str, mut metadata: ExtractionMetadata) -> ExtractionResult {
        let lines: Vec<&str> = text.lines().collect();
        let mut records = Vec::new();
        let mut index = 0;

        while index < lines.len() {
            let group = collect_group(&lines, index);
            let consumed = group.last().map(|(line, _)| line + 1).unwrap_or(index + 1);

            if group.len() >= 2 {
                if let Some((header_pos, map)) = self.table_header(&group, &mut metadata) {
                    // Title lines above the header still get the fallback
                    for (line, _) in &group[..header_pos] {
                        self.fallback_line(lines[*line], &mut records, &mut metadata);
                    }

                    let rows: Vec<Vec<CellValue>> = group[header_pos..]
                        .iter()
                        .map(|(_, cells)| cells.clone())
                        .collect();
                    let outcome = self.tabular.records_from_rows(
                        &rows[1..],
                        &map,
                        Some(&rows[0]),
                        Some(TEXT_PATTERN_CAP),
                    );

                    debug!(
                        "Table at line {}: {} records",
                        group[header_pos].0,
                        outcome.records.len()
                    );
                    metadata.total_rows += outcome.total_rows;
                    metadata.skipped_rows += outcome.skipped_rows;
                    records.extend(outcome.records);
                    index = consumed;
                    continue;
                }

                for (line, _) in &group {
                    self.fallback_line(lines[*line], &mut records, &mut metadata);
                }
                index = consumed;
                continue;
            }

            self.fallback_line(lines[index], &mut records, &mut metadata);
            index += 1;
        }

        info!(
            "Text extraction: {} records from {} lines (table: {})",
            records.len(),
            metadata.total_rows,
            metadata.has_table_structure
        );

        let aggregate = confidence::aggregate(&records).min(TEXT_PATTERN_CAP);
        ExtractionResult::success(records, metadata, aggregate)
    }

    /// Position of the header row within a group, recording the first
    /// recognized table in the metadata.
    fn table_header(
        &self,
        group: &LineGroup,
        metadata: &mut ExtractionMetadata,
    ) -> Option<(usize, ColumnMap)> {
        let rows: Vec<Vec<CellValue>> = group.iter().map(|(_, cells)| cells.clone()).collect();
        let (pos, map) = self.tabular.find_header(&rows)?;

        if !metadata.has_table_structure {
            metadata.has_table_structure = true;
            metadata.header_row = Some(group[pos].0);
            metadata.column_map = map.to_named();
        }
        Some((pos, map))
    }

    fn fallback_line(&self, line: &str, records: &mut Vec<ExtractedRecord>, metadata: &mut ExtractionMetadata) {
        let trimmed = line.trim();
        if trimmed.is_empty() || SEPARATOR_LINE.is_match(trimmed) {
            return;
        }
        metadata.total_rows += 1;

        match self.record_from_line(trimmed) {
            Some(record) => records.push(record),
            None => metadata.skipped_rows += 1,
        }
    }

    /// Regex extraction from one free-text line. Requires a price and a name.
    pub fn record_from_line(&self, line: &str) -> Option<ExtractedRecord> {
        let price = find_price(line)?;
        let mut rest = cut(line, price.0, price.1);
        let price_text = line[price.0..price.1].trim();

        let part_number = take_capture(&PART_NUMBER_LABELED, &mut rest).or_else(|| take_part_number(&mut rest));
        let quantity = take_capture(&QUANTITY_LABELED, &mut rest)
            .or_else(|| take_capture(&QUANTITY_WITH_UNIT, &mut rest))
            .and_then(|q| q.parse::<u32>().ok())
            .filter(|q| *q > 0);
        let manufacturer = take_capture(&MANUFACTURER_LABELED, &mut rest);
        let supplier = take_capture(&SUPPLIER_LABELED, &mut rest);

        let name = clean_name(&rest)?;
        trace!("Line '{}' -> name '{}', price '{}'", line, name, price_text);

        let mut record = ExtractedRecord::new(name);
        record.part_number = part_number;
        record.quantity = quantity;
        record.manufacturer = manufacturer.and_then(|m| clean_text(&m));
        record.supplier = supplier.and_then(|s| clean_text(&s));

        let normalizer = self.tabular.normalizer();
        normalizer.apply_price(&mut record, &CellValue::text(price_text), None);
        normalizer.finish(&mut record);

        record.confidence = self
            .tabular
            .scorer()
            .score_capped(&record, TEXT_PATTERN_CAP);
        Some(record)
    }
}

/// Split a line into cells if it looks like a table row.
fn split_row(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (cells, min): (Vec<&str>, usize) = if trimmed.contains('|') {
        (trimmed.trim_matches('|').split('|').collect(), 2)
    } else if trimmed.contains('\t') {
        (trimmed.split('\t').collect(), 2)
    } else {
        (WIDE_GAP.split(trimmed).collect(), 3)
    };

    let cells: Vec<String> = cells.into_iter().map(|c| c.trim().to_string()).collect();
    (cells.len() >= min).then_some(cells)
}

/// Consecutive table-looking lines starting at `start`; separator lines
/// are skipped without ending the group.
fn collect_group(lines: &[&str], start: usize) -> LineGroup {
    let mut group = Vec::new();
    for (offset, line) in lines[start..].iter().enumerate() {
        let trimmed = line.trim();
        if !group.is_empty() && !trimmed.is_empty() && SEPARATOR_LINE.is_match(trimmed) {
            continue;
        }
        match split_row(line) {
            Some(cells) => group.push((start + offset, cells.into_iter().map(CellValue::text).collect())),
            None => break,
        }
    }
    group
}

/// Byte range of the last price-looking token: one with a currency marker
/// or a two-digit decimal part.
fn find_price(line: &str) -> Option<(usize, usize)> {
    PRICE_IN_TEXT
        .captures_iter(line)
        .filter(|caps| {
            let has_currency = caps.get(1).is_some() || caps.get(3).is_some();
            let number = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let has_cents = number
                .rfind(['.', ','])
                .is_some_and(|pos| number.len() - pos == 3);
            has_currency || has_cents
        })
        .last()
        .and_then(|caps| caps.get(0))
        .map(|m| (m.start(), m.end()))
}

fn cut(s: &str, start: usize, end: usize) -> String {
    format!("{} {}", &s[..start], &s[end..])
}

/// Remove the first match of `re` from `rest`, returning capture 1.
fn take_capture(re: &Regex, rest: &mut String) -> Option<String> {
    let caps = re.captures(rest)?;
    let whole = caps.get(0)?;
    let value = caps.get(1)?.as_str().trim().to_string();
    *rest = cut(rest, whole.start(), whole.end());
    Some(value)
}

/// Remove the first standalone token with both letters and digits.
fn take_part_number(rest: &mut String) -> Option<String> {
    let found = PART_NUMBER_STANDALONE.find_iter(rest).find(|m| {
        let s = m.as_str();
        s.chars().any(|c| c.is_ascii_alphabetic()) && s.chars().any(|c| c.is_ascii_digit())
    })?;
    let value = found.as_str().to_string();
    *rest = cut(rest, found.start(), found.end());
    Some(value)
}

fn clean_name(rest: &str) -> Option<String> {
    let name = clean_text(rest)?;
    let name = name
        .trim_start_matches(|c: char| c.is_ascii_digit() || "-*•.)#".contains(c) || c.is_whitespace())
        .trim_end_matches(|c: char| ":-,;|@=".contains(c) || c.is_whitespace());
    let name = clean_text(name)?;
    (name.chars().filter(|c| c.is_alphabetic()).count() >= 2).then_some(name)
}
