//! Extracted inventory records and extraction results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currencies a record can carry a price in.
///
/// EUR is the local currency; USD and CNY are the two secondary price
/// columns of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Cny,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Eur, Currency::Usd, Currency::Cny];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Cny => "CNY",
        }
    }

    /// Parse an ISO-like code or common alias.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EUR" | "€" | "EURO" => Some(Currency::Eur),
            "USD" | "$" | "US$" => Some(Currency::Usd),
            "CNY" | "RMB" | "¥" | "￥" | "元" => Some(Currency::Cny),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One candidate inventory line extracted from a supplier document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Product name/description line.
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    /// Manufacturer part number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,

    /// Category from the allow-list (unknown values are remapped to the default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,

    /// Price in the local currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_eur: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cny: Option<Decimal>,

    /// Currency of the price field populated from the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_currency: Option<Currency>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Record quality score (0.0 - 1.0).
    pub confidence: f64,
}

impl ExtractedRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Price in the given currency, if present.
    pub fn price(&self, currency: Currency) -> Option<Decimal> {
        match currency {
            Currency::Eur => self.price_eur,
            Currency::Usd => self.price_usd,
            Currency::Cny => self.price_cny,
        }
    }

    fn price_slot(&mut self, currency: Currency) -> &mut Option<Decimal> {
        match currency {
            Currency::Eur => &mut self.price_eur,
            Currency::Usd => &mut self.price_usd,
            Currency::Cny => &mut self.price_cny,
        }
    }

    /// Store the price read from the source document.
    ///
    /// Clears any previously stored prices so the original currency tag
    /// always names the one field populated from the source. Non-positive
    /// amounts are ignored.
    pub fn set_source_price(&mut self, amount: Decimal, currency: Currency) {
        if amount <= Decimal::ZERO {
            return;
        }
        self.price_eur = None;
        self.price_usd = None;
        self.price_cny = None;
        *self.price_slot(currency) = Some(amount);
        self.original_currency = Some(currency);
    }

    /// Price as read from the source, with its currency.
    pub fn source_price(&self) -> Option<(Decimal, Currency)> {
        let currency = self.original_currency?;
        self.price(currency).map(|amount| (amount, currency))
    }

    pub fn has_price(&self) -> bool {
        Currency::ALL.iter().any(|c| self.price(*c).is_some())
    }

    /// Fill the secondary price fields by conversion from the source price.
    pub fn apply_exchange_rates(&mut self, rates: &ExchangeRates) {
        let Some((amount, source)) = self.source_price() else {
            return;
        };
        for target in Currency::ALL {
            if target == source {
                continue;
            }
            if let Some(converted) = rates.convert(amount, source, target) {
                *self.price_slot(target) = Some(converted);
            }
        }
    }
}

/// Exchange rates expressed as units of a currency per one EUR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRates {
    per_eur: BTreeMap<Currency, Decimal>,
}

impl ExchangeRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, currency: Currency, per_eur: Decimal) -> Self {
        self.per_eur.insert(currency, per_eur);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.per_eur.is_empty()
    }

    fn rate(&self, currency: Currency) -> Option<Decimal> {
        match currency {
            Currency::Eur => Some(Decimal::ONE),
            other => self.per_eur.get(&other).copied().filter(|r| *r > Decimal::ZERO),
        }
    }

    /// Convert an amount between currencies, rounded to cents.
    ///
    /// Returns `None` when a rate is missing or the result overflows.
    pub fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Option<Decimal> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        let converted = amount.checked_div(from_rate)?.checked_mul(to_rate)?;
        Some(converted.round_dp(2))
    }
}

/// Outcome of document routing, resolved once per input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Spreadsheet or delimited text.
    Tabular,
    /// Text-bearing document (PDF with a text layer, plain text).
    TextPattern,
    /// Raster image sent to the vision model.
    Vision,
    /// No extractor accepts this input.
    Unrecognized,
}

/// Metadata about one extractor invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Extractor that produced the result.
    pub extractor: DocumentKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Worksheet the records were read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    /// Zero-based index of the detected header row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_row: Option<usize>,

    /// Canonical field name to column index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_map: BTreeMap<String, usize>,

    /// Whether records came from a recognized table structure.
    pub has_table_structure: bool,

    /// Data rows/lines examined.
    pub total_rows: usize,

    /// Data rows/lines that produced no record.
    pub skipped_rows: usize,

    /// Vision model used, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    pub processing_time_ms: u64,

    pub extracted_at: DateTime<Utc>,
}

impl ExtractionMetadata {
    pub fn new(extractor: DocumentKind) -> Self {
        Self {
            extractor,
            file_name: None,
            sheet_name: None,
            page_count: None,
            header_row: None,
            column_map: BTreeMap::new(),
            has_table_structure: false,
            total_rows: 0,
            skipped_rows: 0,
            model: None,
            warnings: Vec::new(),
            processing_time_ms: 0,
            extracted_at: Utc::now(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        if !file_name.is_empty() {
            self.file_name = Some(file_name);
        }
        self
    }
}

/// Output of one extractor invocation.
///
/// A failed result never carries records and always carries a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,

    /// Records in source document order.
    pub records: Vec<ExtractedRecord>,

    pub metadata: ExtractionMetadata,

    /// Aggregate confidence (0.0 - 1.0).
    pub confidence: f64,

    /// Error for failed results, warning for successful ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExtractionResult {
    /// Successful result; the caller supplies the already capped aggregate.
    pub fn success(records: Vec<ExtractedRecord>, metadata: ExtractionMetadata, confidence: f64) -> Self {
        let message = records
            .is_empty()
            .then(|| "no records found".to_string());
        Self {
            success: true,
            records,
            metadata,
            confidence,
            message,
        }
    }

    pub fn failure(metadata: ExtractionMetadata, message: impl Into<String>) -> Self {
        Self {
            success: false,
            records: Vec::new(),
            metadata,
            confidence: 0.0,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
