//! Common regex patterns for price-list extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // What remains of a price after currency tokens and whitespace are stripped
    pub static ref NUMERIC_REMAINDER: Regex = Regex::new(
        r"^[+-]?[\d.,]*\d[\d.,]*$"
    ).unwrap();

    // Price inside free text, with optional leading or trailing currency marker
    pub static ref PRICE_IN_TEXT: Regex = Regex::new(
        r"(?i)(€|\$|¥|￥|\b(?:eur|usd|cny|rmb)\b)?\s*(\d{1,3}(?:[.,']\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?)(?:\s*(€|\$|¥|￥|元|\b(?:eur|euro|usd|cny|rmb|yuan)\b))?"
    ).unwrap();

    // Part numbers
    pub static ref PART_NUMBER_LABELED: Regex = Regex::new(
        r"(?i)(?:p/n|part\s*(?:no\.?|number|#)|mpn|art\.?\s*-?\s*nr\.?|order\s*code)[\s:#]*([A-Za-z0-9][A-Za-z0-9\-./]{2,})"
    ).unwrap();

    pub static ref PART_NUMBER_STANDALONE: Regex = Regex::new(
        r"\b[A-Z0-9]{2,}(?:[-/.][A-Z0-9]+)+\b|\b[A-Z]{1,4}\d{3,}[A-Z0-9]*\b"
    ).unwrap();

    // Quantities
    pub static ref QUANTITY_LABELED: Regex = Regex::new(
        r"(?i)(?:qty|quantity|menge|anzahl)[\s:.]*(\d{1,6})\b"
    ).unwrap();

    pub static ref QUANTITY_WITH_UNIT: Regex = Regex::new(
        r"(?i)\b(\d{1,6})\s*(?:pcs|pc|pieces|units?|ea|stk|stück|x)\b"
    ).unwrap();

    pub static ref QUANTITY_IN_CELL: Regex = Regex::new(
        r"\d{1,3}(?:[,.']\d{3})+|\d+"
    ).unwrap();

    // Labeled parties
    pub static ref MANUFACTURER_LABELED: Regex = Regex::new(
        r"(?i)(?:manufacturer|brand|mfr|hersteller|marke)\s*[:=]\s*([^,;|\t]+)"
    ).unwrap();

    pub static ref SUPPLIER_LABELED: Regex = Regex::new(
        r"(?i)(?:supplier|vendor|lieferant|distributor)\s*[:=]\s*([^,;|\t]+)"
    ).unwrap();

    // Table layout in extracted text
    pub static ref WIDE_GAP: Regex = Regex::new(
        r"\s{2,}"
    ).unwrap();

    pub static ref SEPARATOR_LINE: Regex = Regex::new(
        r"^[\s|:+=_-]+$"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_in_text_captures_currency() {
        let caps = PRICE_IN_TEXT.captures("Relay module EUR 1.234,50").unwrap();
        assert_eq!(caps.get(1).map(|m| m.as_str()), Some("EUR"));
        assert_eq!(&caps[2], "1.234,50");
    }

    #[test]
    fn test_part_number_patterns() {
        let caps = PART_NUMBER_LABELED.captures("P/N: 6ES7512-1DK01-0AB0").unwrap();
        assert_eq!(&caps[1], "6ES7512-1DK01-0AB0");
        assert!(PART_NUMBER_STANDALONE.is_match("CPU 6ES7512-1DK01-0AB0 new"));
        assert!(PART_NUMBER_STANDALONE.is_match("ABC123"));
    }

    #[test]
    fn test_quantity_patterns() {
        assert_eq!(&QUANTITY_WITH_UNIT.captures("10 pcs")
            .unwrap()[1], "10");
        assert_eq!(&QUANTITY_LABELED.captures("Qty: 4").unwrap()[1], "4");
    }

    #[test]
    fn test_separator_line() {
        assert!(SEPARATOR_LINE.is_match("|---|:---:|"));
        assert!(!SEPARATOR_LINE.is_match("| a | b |"));
    }
}
