//! String similarity for the fuzzy tier.
//!
//! All scores are normalized Levenshtein similarity, `1 - distance / max_len`
//! over characters, computed on normalized forms:
//!
//! - part numbers: lowercase alphanumerics only ("6ES7 512-1DK01" and
//!   "6es75121dk01" are identical)
//! - names: lowercase alphanumeric tokens, sorted, so word order does not
//!   count against a match
//! - parties (manufacturer, supplier): as names, without legal-form tokens
//!   such as "GmbH" or "Ltd"
//!
//! The 0.9 / 0.7 fuzzy thresholds are calibrated against this measure.

use crate::models::matching::CatalogEntry;
use crate::models::record::ExtractedRecord;

/// Share of the part-number score when both sides carry one.
const PART_NUMBER_WEIGHT: f64 = 0.7;

/// Manufacturer similarity below which the score is penalized.
const MANUFACTURER_CONFLICT: f64 = 0.5;
const MANUFACTURER_PENALTY: f64 = 0.8;

const LEGAL_FORMS: &[&str] = &[
    "gmbh", "ag", "kg", "co", "ltd", "limited", "inc", "llc", "corp", "corporation", "sa", "sarl",
    "srl", "bv", "spa", "plc", "oy", "ab",
];

/// Levenshtein edit distance over characters.
pub fn levenshtein(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let (len1, len2) = (s1_chars.len(), s2_chars.len());

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut prev_row: Vec<usize> = (0..=len2).collect();
    let mut curr_row = vec![0; len2 + 1];

    for i in 1..=len1 {
        curr_row[0] = i;
        for j in 1..=len2 {
            let cost = usize::from(s1_chars[i - 1] != s2_chars[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[len2]
}

/// Normalized similarity in [0, 1]. Two empty strings score 0: there is
/// nothing to compare.
pub fn ratio(s1: &str, s2: &str) -> f64 {
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein(s1, s2) as f64 / max_len as f64
}

pub fn normalize_part_number(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn normalize_name(s: &str) -> String {
    let mut tokens = tokens(s);
    tokens.sort();
    tokens.join(" ")
}

pub fn normalize_party(s: &str) -> String {
    let mut tokens: Vec<String> = tokens(s)
        .into_iter()
        .filter(|t| !LEGAL_FORMS.contains(&t.as_str()))
        .collect();
    tokens.sort();
    tokens.join(" ")
}

pub fn part_number_similarity(a: &str, b: &str) -> f64 {
    ratio(&normalize_part_number(a), &normalize_part_number(b))
}

pub fn name_similarity(a: &str, b: &str) -> f64 {
    ratio(&normalize_name(a), &normalize_name(b))
}

/// Similarity of two manufacturer or supplier names.
pub fn party_similarity(a: &str, b: &str) -> f64 {
    ratio(&normalize_party(a), &normalize_party(b))
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Fuzzy score of a record against a catalog entry.
///
/// With part numbers on both sides the score is 0.7 × part-number
/// similarity + 0.3 × name similarity, otherwise name similarity alone.
/// Clearly different manufacturers scale the result by 0.8.
pub fn record_similarity(record: &ExtractedRecord, entry: &CatalogEntry) -> f64 {
    let names = name_similarity(&record.name, &entry.name);

    let mut score = match (non_blank(&record.part_number), non_blank(&entry.part_number)) {
        (Some(a), Some(b)) => {
            PART_NUMBER_WEIGHT * part_number_similarity(a, b) + (1.0 - PART_NUMBER_WEIGHT) * names
        }
        _ => names,
    };

    if let (Some(a), Some(b)) = (non_blank(&record.manufacturer), non_blank(&entry.manufacturer)) {
        if party_similarity(a, b) < MANUFACTURER_CONFLICT {
            score *= MANUFACTURER_PENALTY;
        }
    }

    score.clamp(0.0, 1.0)
}
