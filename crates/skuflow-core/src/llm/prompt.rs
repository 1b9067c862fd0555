//! Prompts carrying the model contracts.

use crate::models::matching::CatalogEntry;
use crate::models::record::ExtractedRecord;

/// Fixed contract for image extraction. The reply must be a single JSON
/// object; the extractor rejects anything else.
pub const VISION_EXTRACTION_PROMPT: &str = r#"You read supplier price lists, quotations and product photos.
List every priced line item visible in the image.

Answer with one JSON object and nothing else:
{"items": [{"name": string, "manufacturer": string|null, "part_number": string|null,
            "category": string|null, "supplier": string|null, "quantity": integer|null,
            "price": number|string|null, "currency": "EUR"|"USD"|"CNY"|null,
            "notes": string|null, "confidence": number}],
 "confidence": number}

Rules:
- Copy part numbers exactly as printed.
- "price" is the unit price; keep the notation if unsure about separators.
- "confidence" is your certainty between 0 and 1.
- Return {"items": [], "confidence": 0} when no line item is readable."#;

/// Prompt asking whether an extracted record and a catalog entry are the
/// same product.
pub fn semantic_match_prompt(record: &ExtractedRecord, candidate: &CatalogEntry) -> String {
    fn field(label: &str, value: Option<&str>) -> String {
        format!("  {}: {}\n", label, value.unwrap_or("-"))
    }

    let mut prompt = String::from(
        "Decide whether two inventory records describe the same product \
         (same item, possibly written differently).\n\n",
    );

    prompt.push_str("Record A (supplier document):\n");
    prompt.push_str(&field("name", Some(&record.name)));
    prompt.push_str(&field("manufacturer", record.manufacturer.as_deref()));
    prompt.push_str(&field("part number", record.part_number.as_deref()));
    prompt.push_str(&field("category", record.category.as_deref()));

    prompt.push_str("\nRecord B (catalog):\n");
    prompt.push_str(&field("name", Some(&candidate.name)));
    prompt.push_str(&field("manufacturer", candidate.manufacturer.as_deref()));
    prompt.push_str(&field("part number", candidate.part_number.as_deref()));
    prompt.push_str(&field("category", candidate.category.as_deref()));

    prompt.push_str(
        "\nAnswer with one JSON object and nothing else: {\"confidence\": number} \
         where confidence is between 0 (different products) and 1 (same product).",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_prompt_lists_both_records() {
        let mut record = ExtractedRecord::new("PLC CPU 1512C");
        record.manufacturer = Some("Siemens".to_string());
        let candidate = CatalogEntry {
            id: "c1".to_string(),
            name: "S7-1500 compact CPU".to_string(),
            ..CatalogEntry::default()
        };

        let prompt = semantic_match_prompt(&record, &candidate);
        assert!(prompt.contains("name: PLC CPU 1512C"));
        assert!(prompt.contains("manufacturer: Siemens"));
        assert!(prompt.contains("name: S7-1500 compact CPU"));
        assert!(prompt.contains("part number: -"));
    }
}
