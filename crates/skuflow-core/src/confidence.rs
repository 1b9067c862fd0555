//! Record quality scoring.
//!
//! Scores are weighted field-presence sums. Weights are kept as integer
//! percentages and divided once, so that e.g. name + price + part number
//! yields exactly 0.75.

use crate::models::record::ExtractedRecord;

/// Per-field weights in percent. They sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceWeights {
    pub name: u32,
    pub price: u32,
    pub part_number: u32,
    pub manufacturer: u32,
    pub category: u32,
    pub quantity: u32,
    pub notes: u32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            name: 30,
            price: 25,
            part_number: 20,
            manufacturer: 15,
            category: 5,
            quantity: 3,
            notes: 2,
        }
    }
}

impl ConfidenceWeights {
    fn total(&self) -> u32 {
        self.name
            + self.price
            + self.part_number
            + self.manufacturer
            + self.category
            + self.quantity
            + self.notes
    }
}

/// Confidence cap applied by the text-pattern extractor.
pub const TEXT_PATTERN_CAP: f64 = 0.9;

/// Scores records and batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    /// Weighted field-presence score in [0, 1].
    pub fn score(&self, record: &ExtractedRecord) -> f64 {
        let w = &self.weights;
        let present = |text: &Option<String>| text.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut points = 0;
        if !record.name.trim().is_empty() {
            points += w.name;
        }
        if record.has_price() {
            points += w.price;
        }
        if present(&record.part_number) {
            points += w.part_number;
        }
        if present(&record.manufacturer) {
            points += w.manufacturer;
        }
        if present(&record.category) {
            points += w.category;
        }
        if record.quantity.is_some() {
            points += w.quantity;
        }
        if present(&record.notes) {
            points += w.notes;
        }

        let total = w.total();
        if total == 0 {
            return 0.0;
        }
        f64::from(points) / f64::from(total)
    }

    /// Score capped at `cap`.
    pub fn score_capped(&self, record: &ExtractedRecord, cap: f64) -> f64 {
        self.score(record).min(cap)
    }

    /// Score bounded above by an externally reported confidence.
    pub fn score_reported(&self, record: &ExtractedRecord, reported: Option<f64>) -> f64 {
        let computed = self.score(record);
        match reported {
            Some(r) if r.is_finite() => r.clamp(0.0, 1.0).min(computed),
            _ => computed,
        }
    }
}

/// Arithmetic mean of record confidences; 0 for an empty slice.
pub fn aggregate(records: &[ExtractedRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.confidence).sum::<f64>() / records.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Currency;
    use rust_decimal::Decimal;

    fn priced(name: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::new(name);
        record.set_source_price(Decimal::new(1999, 2), Currency::Eur);
        record
    }

    #[test]
    fn test_name_price_part_number_is_three_quarters() {
        let mut record = priced("Widget");
        record.part_number = Some("ABC-123".to_string());
        assert_eq!(ConfidenceScorer::default().score(&record), 0.75);
    }

    #[test]
    fn test_full_record_scores_one() {
        let mut record = priced("Widget");
        record.part_number = Some("ABC-123".to_string());
        record.manufacturer = Some("Acme".to_string());
        record.category = Some("tools".to_string());
        record.quantity = Some(3);
        record.notes = Some("boxed".to_string());
        assert_eq!(ConfidenceScorer::default().score(&record), 1.0);
    }

    #[test]
    fn test_empty_record_scores_zero() {
        let record = ExtractedRecord::new("  ");
        assert_eq!(ConfidenceScorer::default().score(&record), 0.0);
    }

    #[test]
    fn test_blank_optional_fields_do_not_count() {
        let mut record = ExtractedRecord::new("Widget");
        record.manufacturer = Some(" ".to_string());
        assert_eq!(ConfidenceScorer::default().score(&record), 0.3);
    }

    #[test]
    fn test_cap_and_reported_bound() {
        let scorer = ConfidenceScorer::default();
        let mut record = priced("Widget");
        record.part_number = Some("ABC-123".to_string());
        record.manufacturer = Some("Acme".to_string());
        record.category = Some("tools".to_string());

        assert_eq!(scorer.score(&record), 0.95);
        assert_eq!(scorer.score_capped(&record, TEXT_PATTERN_CAP), 0.9);
        assert_eq!(scorer.score_reported(&record, Some(0.6)), 0.6);
        assert_eq!(scorer.score_reported(&record, Some(1.0)), 0.95);
        assert_eq!(scorer.score_reported(&record, None), 0.95);
    }

    #[test]
    fn test_aggregate() {
        assert_eq!(aggregate(&[]), 0.0);

        let mut a = ExtractedRecord::new("a");
        a.confidence = 0.5;
        let mut b = ExtractedRecord::new("b");
        b.confidence = 1.0;
        assert_eq!(aggregate(&[a, b]), 0.75);
    }
}
