//! Header-to-field recognition.

use std::collections::BTreeMap;

use crate::models::record::Currency;

/// Record fields a source column can map to.
///
/// Declaration order is the claim order used by the recognizer: the name
/// field comes last so the generic "name"/"product" variants cannot take a
/// header that a more specific field would claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    PartNumber,
    Manufacturer,
    Supplier,
    Category,
    Quantity,
    Price,
    Currency,
    Notes,
    Name,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::PartNumber,
        CanonicalField::Manufacturer,
        CanonicalField::Supplier,
        CanonicalField::Category,
        CanonicalField::Quantity,
        CanonicalField::Price,
        CanonicalField::Currency,
        CanonicalField::Notes,
        CanonicalField::Name,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::PartNumber => "part_number",
            CanonicalField::Manufacturer => "manufacturer",
            CanonicalField::Supplier => "supplier",
            CanonicalField::Category => "category",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Price => "price",
            CanonicalField::Currency => "currency",
            CanonicalField::Notes => "notes",
            CanonicalField::Name => "name",
        }
    }
}

/// Known header spellings per field, in several languages.
#[derive(Debug, Clone)]
pub struct HeaderVocabulary {
    variants: BTreeMap<CanonicalField, Vec<String>>,
}

impl Default for HeaderVocabulary {
    fn default() -> Self {
        let table: [(CanonicalField, &[&str]); 9] = [
            (
                CanonicalField::PartNumber,
                &[
                    "part number", "part no", "part #", "p/n", "mpn", "item no", "item #",
                    "item code", "product code", "article no", "art no", "art.-nr", "art. no",
                    "cat. no", "model", "artikelnummer", "teilenummer", "bestellnummer",
                    "order code", "référence", "sku", "型号", "料号",
                ],
            ),
            (
                CanonicalField::Manufacturer,
                &[
                    "manufacturer", "mfr", "mfg", "brand", "maker", "hersteller", "marke",
                    "fabricant", "marque", "制造商", "厂家", "品牌",
                ],
            ),
            (
                CanonicalField::Supplier,
                &["supplier", "vendor", "distributor", "lieferant", "fournisseur", "供应商"],
            ),
            (
                CanonicalField::Category,
                &["category", "kategorie", "catégorie", "warengruppe", "group", "类别", "分类"],
            ),
            (
                CanonicalField::Quantity,
                &["quantity", "qty", "menge", "anzahl", "quantité", "stück", "stock", "数量"],
            ),
            (
                CanonicalField::Price,
                &["price", "preis", "prix", "precio", "cost", "单价", "价格"],
            ),
            (
                CanonicalField::Currency,
                &["currency", "curr", "währung", "devise", "moneda", "币种", "货币"],
            ),
            (
                CanonicalField::Notes,
                &[
                    "notes", "note", "remarks", "remark", "comment", "description", "desc",
                    "beschreibung", "bemerkung", "备注", "说明",
                ],
            ),
            (
                CanonicalField::Name,
                &[
                    "product name", "item name", "name", "product", "item", "designation",
                    "désignation", "bezeichnung", "produkt", "title", "名称", "品名",
                ],
            ),
        ];

        let variants = table
            .into_iter()
            .map(|(field, words)| (field, words.iter().map(|w| w.to_string()).collect()))
            .collect();
        Self { variants }
    }
}

impl HeaderVocabulary {
    /// Add a spelling for a field.
    pub fn add(&mut self, field: CanonicalField, variant: impl Into<String>) {
        let variant = variant.into().to_lowercase();
        self.variants.entry(field).or_default().push(variant);
    }

    fn variants(&self, field: CanonicalField) -> &[String] {
        self.variants.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Mapping from record field to source column index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<CanonicalField, usize>,
    currency_hints: BTreeMap<usize, Currency>,
}

impl ColumnMap {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, usize)> + '_ {
        self.columns.iter().map(|(f, c)| (*f, *c))
    }

    /// Currency named in the header of a column, e.g. "Price (USD)".
    pub fn currency_hint(&self, column: usize) -> Option<Currency> {
        self.currency_hints.get(&column).copied()
    }

    /// Whether the map looks like a real header row: at least two fields,
    /// one of them usable as the record name.
    pub fn is_header(&self) -> bool {
        self.len() >= 2
            && (self.contains(CanonicalField::Name) || self.contains(CanonicalField::Notes))
    }

    /// Field names to column indices, for metadata.
    pub fn to_named(&self) -> BTreeMap<String, usize> {
        self.iter().map(|(f, c)| (f.as_str().to_string(), c)).collect()
    }
}

/// Maps source column headers to record fields.
#[derive(Debug, Clone, Default)]
pub struct FieldRecognizer {
    vocabulary: HeaderVocabulary,
}

impl FieldRecognizer {
    pub fn new(vocabulary: HeaderVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Greedily map headers to fields.
    ///
    /// Headers are visited in column order; each takes the first unclaimed
    /// field (in field order) with a variant contained in the header. Only
    /// when no field matches that way is a variant that contains the header
    /// accepted, so a bare "Item" stays a name while "Item No." is a part
    /// number. Every field maps to at most one column.
    pub fn recognize<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMap {
        let mut map = ColumnMap::default();

        for (index, header) in headers.iter().enumerate() {
            let normalized = normalize_header(header.as_ref());
            if normalized.is_empty() {
                continue;
            }

            let claimed = self
                .claim(&map, |v| normalized.contains(v))
                .or_else(|| self.claim(&map, |v| v.contains(normalized.as_str())));

            if let Some(field) = claimed {
                map.columns.insert(field, index);
            }

            if let Some(currency) = header_currency(&normalized) {
                map.currency_hints.insert(index, currency);
            }
        }

        map
    }

    fn claim(&self, map: &ColumnMap, matches: impl Fn(&str) -> bool) -> Option<CanonicalField> {
        CanonicalField::ALL.into_iter().find(|field| {
            !map.columns.contains_key(field)
                && self.vocabulary.variants(*field).iter().any(|v| matches(v.as_str()))
        })
    }
}

fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Currency code or symbol inside a header such as "Price (EUR)" or "单价 ¥".
fn header_currency(header: &str) -> Option<Currency> {
    header
        .split(|c: char| !c.is_alphanumeric() && !"€$¥￥".contains(c))
        .chain(header.matches(['€', '$', '¥', '￥']))
        .find_map(Currency::from_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recognize(headers: &[&str]) -> ColumnMap {
        FieldRecognizer::default().recognize(headers)
    }

    #[test]
    fn test_english_headers() {
        let map = recognize(&["Product Name", "Brand", "P/N", "Price"]);
        assert_eq!(map.get(CanonicalField::Name), Some(0));
        assert_eq!(map.get(CanonicalField::Manufacturer), Some(1));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(2));
        assert_eq!(map.get(CanonicalField::Price), Some(3));
        assert!(map.is_header());
    }

    #[test]
    fn test_german_headers() {
        let map = recognize(&["Bezeichnung", "Hersteller", "Artikelnummer", "Menge", "Preis"]);
        assert_eq!(map.get(CanonicalField::Name), Some(0));
        assert_eq!(map.get(CanonicalField::Manufacturer), Some(1));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(2));
        assert_eq!(map.get(CanonicalField::Quantity), Some(3));
        assert_eq!(map.get(CanonicalField::Price), Some(4));
    }

    #[test]
    fn test_chinese_headers() {
        let map = recognize(&["品名", "型号", "数量", "单价"]);
        assert_eq!(map.get(CanonicalField::Name), Some(0));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(1));
        assert_eq!(map.get(CanonicalField::Quantity), Some(2));
        assert_eq!(map.get(CanonicalField::Price), Some(3));
    }

    #[test]
    fn test_each_field_claims_one_column() {
        let map = recognize(&["Price", "List Price"]);
        assert_eq!(map.get(CanonicalField::Price), Some(0));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_specific_field_wins_over_name() {
        // "Manufacturer Part Number" belongs to the part number, not the name
        let map = recognize(&["Manufacturer Part Number", "Manufacturer", "Description"]);
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Manufacturer), Some(1));
        assert_eq!(map.get(CanonicalField::Notes), Some(2));
        assert!(map.is_header());
    }

    #[test]
    fn test_blank_and_unknown_headers_are_skipped() {
        let map = recognize(&["", "  ", "Foo", "Name"]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(CanonicalField::Name), Some(3));
        assert!(!map.is_header());
    }

    #[test]
    fn test_currency_hint_from_header() {
        let map = recognize(&["Item", "Price (USD)", "单价 ¥"]);
        assert_eq!(map.currency_hint(1), Some(Currency::Usd));
        assert_eq!(map.currency_hint(2), Some(Currency::Cny));
        assert_eq!(map.currency_hint(0), None);
    }

    #[test]
    fn test_part_number_headers_win_over_generic_name() {
        let map = recognize(&["Item No.", "Description", "Price"]);
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Notes), Some(1));
        assert_eq!(map.get(CanonicalField::Price), Some(2));
        assert_eq!(map.get(CanonicalField::Name), None);

        let map = recognize(&["Product Code", "Product Name", "Price"]);
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
        assert_eq!(map.get(CanonicalField::Name), Some(1));
        assert_eq!(map.get(CanonicalField::Price), Some(2));

        // a bare generic header is still the name
        let map = recognize(&["Item", "Model", "Price"]);
        assert_eq!(map.get(CanonicalField::Name), Some(0));
        assert_eq!(map.get(CanonicalField::PartNumber), Some(1));
    }

    #[test]
    fn test_recognize_is_idempotent() {
        let headers = [
            "Product Name",
            "Product Code",
            "Manufacturer Part Number",
            "Manufacturer",
            "Price",
            "List Price",
            "Description",
            "Notes",
        ];
        let recognizer = FieldRecognizer::default();
        let first = recognizer.recognize(&headers);
        let second = recognizer.recognize(&headers);

        assert_eq!(first, second);
        assert_eq!(first.to_named(), second.to_named());
        assert_eq!(first.get(CanonicalField::Name), Some(0));
        assert_eq!(first.get(CanonicalField::PartNumber), Some(1));
        assert_eq!(first.get(CanonicalField::Manufacturer), Some(2));
        assert_eq!(first.get(CanonicalField::Price), Some(4));
        assert_eq!(first.get(CanonicalField::Notes), Some(6));
    }

    #[test]
    fn test_added_variant() {
        let mut vocabulary = HeaderVocabulary::default();
        vocabulary.add(CanonicalField::PartNumber, "Typ-Nr");
        let map = FieldRecognizer::new(vocabulary).recognize(&["Typ-Nr", "Name"]);
        assert_eq!(map.get(CanonicalField::PartNumber), Some(0));
    }
}
