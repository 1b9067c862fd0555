//! Catalog collaborator interface and an in-memory implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SkuflowError};
use crate::models::matching::CatalogEntry;

/// Read-only query capability over the existing catalog.
///
/// Implementations are shared by concurrent matcher invocations.
pub trait Catalog: Send + Sync {
    /// Entry whose (manufacturer, part number) pair equals the given one
    /// after case and whitespace normalization.
    fn lookup_exact(&self, manufacturer: &str, part_number: &str) -> Option<CatalogEntry>;

    /// Entries to score in the fuzzy tier.
    fn candidates(&self) -> Vec<CatalogEntry>;

    /// Supplier recorded for an entry.
    fn supplier(&self, entry: &CatalogEntry) -> Option<String>;
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn lookup_exact(&self, manufacturer: &str, part_number: &str) -> Option<CatalogEntry> {
        (**self).lookup_exact(manufacturer, part_number)
    }

    fn candidates(&self) -> Vec<CatalogEntry> {
        (**self).candidates()
    }

    fn supplier(&self, entry: &CatalogEntry) -> Option<String> {
        (**self).supplier(entry)
    }
}

/// Normalized (manufacturer, part number) key used by the exact tier.
///
/// Manufacturer: lowercase, inner whitespace collapsed. Part number:
/// lowercase, whitespace removed.
pub fn exact_key(manufacturer: &str, part_number: &str) -> (String, String) {
    let manufacturer = manufacturer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let part_number = part_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    (manufacturer, part_number)
}

/// Catalog snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<(String, String), usize>,
}

impl InMemoryCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut catalog = Self::default();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    /// Load a JSON array of catalog entries.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&content)
            .map_err(|e| SkuflowError::Config(format!("catalog {}: {}", path.display(), e)))?;
        debug!("Loaded {} catalog entries from {}", entries.len(), path.display());
        Ok(Self::new(entries))
    }

    /// Add an entry; the first entry for an exact key stays indexed.
    pub fn insert(&mut self, entry: CatalogEntry) {
        if let (Some(manufacturer), Some(part_number)) = (&entry.manufacturer, &entry.part_number) {
            let key = exact_key(manufacturer, part_number);
            if !key.0.is_empty() && !key.1.is_empty() {
                self.index.entry(key).or_insert(self.entries.len());
            }
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn lookup_exact(&self, manufacturer: &str, part_number: &str) -> Option<CatalogEntry> {
        let key = exact_key(manufacturer, part_number);
        self.index.get(&key).map(|i| self.entries[*i].clone())
    }

    fn candidates(&self) -> Vec<CatalogEntry> {
        self.entries.clone()
    }

    fn supplier(&self, entry: &CatalogEntry) -> Option<String> {
        entry.supplier.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(id: &str, manufacturer: &str, part_number: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            name: format!("item {}", id),
            manufacturer: Some(manufacturer.to_string()),
            part_number: Some(part_number.to_string()),
            ..CatalogEntry::default()
        }
    }

    #[test]
    fn test_exact_lookup_normalizes_case_and_whitespace() {
        let catalog = InMemoryCatalog::new(vec![entry("c1", "Siemens", "6ES7512-1DK01-0AB0")]);

        let hit = catalog.lookup_exact("  SIEMENS ", "6es7512-1dk01-0ab0").unwrap();
        assert_eq!(hit.id, "c1");
        assert!(catalog.lookup_exact("Siemens", "6ES7 512-1DK01-0AB0").is_some());
        assert!(catalog.lookup_exact("Siemens AG", "6ES7512-1DK01-0AB0").is_none());
    }

    #[test]
    fn test_first_entry_wins_on_duplicate_keys() {
        let catalog = InMemoryCatalog::new(vec![entry("c1", "Acme", "X-1"), entry("c2", "acme", "x-1")]);
        assert_eq!(catalog.lookup_exact("Acme", "X-1").unwrap().id, "c1");
        assert_eq!(catalog.candidates().len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "c1", "name": "CPU", "manufacturer": "Siemens", "part_number": "6ES7", "supplier": "Rexel"}}]"#
        )
        .unwrap();

        let catalog = InMemoryCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        let hit = catalog.lookup_exact("siemens", "6es7").unwrap();
        assert_eq!(catalog.supplier(&hit).as_deref(), Some("Rexel"));
    }

    #[test]
    fn test_invalid_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            InMemoryCatalog::from_file(file.path()),
            Err(SkuflowError::Config(_))
        ));
    }
}
