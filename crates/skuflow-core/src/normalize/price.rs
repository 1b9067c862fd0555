//! Price and currency normalization.
//!
//! Turns the raw price notations found in supplier documents ("$1,234.56",
//! "1.234,50 EUR", "¥ 980", a spreadsheet number) into a positive decimal
//! amount and, when the notation names one, its currency.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use super::patterns::NUMERIC_REMAINDER;
use crate::models::cell::CellValue;
use crate::models::record::Currency;

/// Symbols and words that identify one currency.
#[derive(Debug, Clone)]
pub struct CurrencyMarkers {
    pub currency: Currency,
    /// Matched anywhere in the text.
    pub symbols: Vec<String>,
    /// Matched case-insensitively as whole words.
    pub words: Vec<String>,
}

/// Currency detection table, checked in order.
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    markers: Vec<CurrencyMarkers>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        fn strings(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            markers: vec![
                CurrencyMarkers {
                    currency: Currency::Eur,
                    symbols: strings(&["€"]),
                    words: strings(&["eur", "euro", "euros"]),
                },
                // "US$" must be stripped before the bare "$"
                CurrencyMarkers {
                    currency: Currency::Usd,
                    symbols: strings(&["US$", "$"]),
                    words: strings(&["usd", "dollar", "dollars"]),
                },
                CurrencyMarkers {
                    currency: Currency::Cny,
                    symbols: strings(&["¥", "￥", "元"]),
                    words: strings(&["cny", "rmb", "yuan"]),
                },
            ],
        }
    }
}

impl CurrencyTable {
    pub fn new(markers: Vec<CurrencyMarkers>) -> Self {
        Self { markers }
    }

    /// First currency whose symbol or word occurs in the text.
    pub fn detect(&self, text: &str) -> Option<Currency> {
        let lower = text.to_lowercase();
        self.markers
            .iter()
            .find(|m| {
                m.symbols.iter().any(|s| lower.contains(&s.to_lowercase()))
                    || m.words.iter().any(|w| find_word(&lower, w).is_some())
            })
            .map(|m| m.currency)
    }

    /// Remove every currency symbol and word from the text.
    pub fn strip(&self, text: &str) -> String {
        let mut out = text.to_lowercase();
        for marker in &self.markers {
            for symbol in &marker.symbols {
                out = out.replace(&symbol.to_lowercase(), " ");
            }
            // Longest first so "euros" is not left as "s"
            let mut words: Vec<&String> = marker.words.iter().collect();
            words.sort_by_key(|w| std::cmp::Reverse(w.len()));
            for word in words {
                while let Some(pos) = find_word(&out, word) {
                    out.replace_range(pos..pos + word.len(), " ");
                }
            }
        }
        out
    }
}

/// Byte offset of `word` in `haystack` where it is not part of a longer word.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let mut start = 0;
    while let Some(offset) = haystack[start..].find(word) {
        let pos = start + offset;
        let end = pos + word.len();
        let before = haystack[..pos].chars().next_back();
        let after = haystack[end..].chars().next();
        let bounded = |c: Option<char>| c.is_none_or(|c| !c.is_alphabetic());
        if bounded(before) && bounded(after) {
            return Some(pos);
        }
        start = end;
    }
    None
}

/// A parsed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPrice {
    pub amount: Decimal,
    /// Currency named by the notation itself.
    pub currency: Option<Currency>,
}

impl ParsedPrice {
    /// Currency of the price, falling back to the given one.
    pub fn resolve(&self, fallback: Currency) -> Currency {
        self.currency.unwrap_or(fallback)
    }
}

/// Parses price notations into amount and currency.
#[derive(Debug, Clone, Default)]
pub struct PriceNormalizer {
    currencies: CurrencyTable,
}

impl PriceNormalizer {
    pub fn new(currencies: CurrencyTable) -> Self {
        Self { currencies }
    }

    pub fn currencies(&self) -> &CurrencyTable {
        &self.currencies
    }

    /// Normalize a cell, dispatching on its type.
    pub fn normalize_cell(&self, cell: &CellValue) -> Option<ParsedPrice> {
        match cell {
            CellValue::Empty => None,
            CellValue::Number(n) => self.normalize_number(*n),
            CellValue::Text(s) => self.normalize(s),
        }
    }

    /// A numeric value is taken as-is; only positive finite amounts qualify.
    pub fn normalize_number(&self, value: f64) -> Option<ParsedPrice> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let amount = Decimal::from_f64(value)?.normalize();
        Some(ParsedPrice {
            amount,
            currency: None,
        })
    }

    /// Parse a textual price notation.
    ///
    /// Separator rules: with both ',' and '.' present the comma groups
    /// thousands; a lone comma is decimal only when exactly two digits
    /// follow the last one; repeated periods group thousands.
    pub fn normalize(&self, raw: &str) -> Option<ParsedPrice> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let currency = self.currencies.detect(raw);
        let remainder: String = self
            .currencies
            .strip(raw)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{2019}')
            .collect();

        if !NUMERIC_REMAINDER.is_match(&remainder) {
            return None;
        }

        let amount = Decimal::from_str(&unify_separators(&remainder)).ok()?;
        if amount <= Decimal::ZERO {
            return None;
        }

        Some(ParsedPrice { amount, currency })
    }
}

fn unify_separators(s: &str) -> String {
    let has_comma = s.contains(',');
    let periods = s.matches('.').count();

    if has_comma && periods > 0 {
        return s.replace(',', "");
    }

    if has_comma {
        let (head, tail) = match s.rfind(',') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => (s, ""),
        };
        if tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit()) {
            return format!("{}.{}", head.replace(',', ""), tail);
        }
        return s.replace(',', "");
    }

    if periods > 1 {
        return s.replace('.', "");
    }

    s.to_string()
}
