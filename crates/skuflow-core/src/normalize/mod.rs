//! Value normalization shared by all extractors.

pub mod category;
pub mod fields;
pub mod patterns;
pub mod price;

pub use category::CategorySet;
pub use fields::{CanonicalField, ColumnMap, FieldRecognizer, HeaderVocabulary};
pub use price::{CurrencyTable, ParsedPrice, PriceNormalizer};

use crate::models::cell::CellValue;
use crate::models::config::ExtractionConfig;
use crate::models::record::{Currency, ExchangeRates, ExtractedRecord};
use patterns::QUANTITY_IN_CELL;

/// Applies price, category and quantity rules to records under construction.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    prices: PriceNormalizer,
    categories: CategorySet,
    default_currency: Currency,
    rates: ExchangeRates,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl RecordNormalizer {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            prices: PriceNormalizer::default(),
            categories: CategorySet::from_config(config),
            default_currency: config.default_currency,
            rates: config.exchange_rates.clone(),
        }
    }

    pub fn prices(&self) -> &PriceNormalizer {
        &self.prices
    }

    pub fn default_currency(&self) -> Currency {
        self.default_currency
    }

    /// Set the record's source price from a cell.
    ///
    /// Currency precedence: the cell's own marker, then `hint` (a currency
    /// column or header), then the configured default. Returns whether a
    /// price was stored.
    pub fn apply_price(
        &self,
        record: &mut ExtractedRecord,
        cell: &CellValue,
        hint: Option<Currency>,
    ) -> bool {
        let Some(parsed) = self.prices.normalize_cell(cell) else {
            return false;
        };
        let currency = parsed
            .currency
            .or(hint)
            .unwrap_or(self.default_currency);
        record.set_source_price(parsed.amount, currency);
        true
    }

    /// Map a raw category onto the allow-list. Blank values leave it unset.
    pub fn apply_category(&self, record: &mut ExtractedRecord, raw: Option<&str>) {
        if let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) {
            record.category = Some(self.categories.resolve(raw));
        }
    }

    /// Positive whole quantity from a cell ("1,000", "12 pcs", 5.0).
    pub fn parse_quantity(&self, cell: &CellValue) -> Option<u32> {
        match cell {
            CellValue::Empty => None,
            CellValue::Number(n) => {
                (n.is_finite() && *n >= 1.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
                    .then_some(*n as u32)
            }
            CellValue::Text(s) => {
                let digits: String = QUANTITY_IN_CELL
                    .find(s)?
                    .as_str()
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect();
                digits.parse::<u32>().ok().filter(|q| *q > 0)
            }
        }
    }

    /// Fill converted secondary prices when rates are configured.
    pub fn finish(&self, record: &mut ExtractedRecord) {
        if !self.rates.is_empty() {
            record.apply_exchange_rates(&self.rates);
        }
    }
}

/// Trim and collapse inner whitespace; blank input becomes `None`.
pub fn clean_text(s: &str) -> Option<String> {
    let cleaned = s.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}
