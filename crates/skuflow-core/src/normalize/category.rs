//! Category allow-list.

use crate::models::config::ExtractionConfig;

/// Fixed set of category names with a fallback for unknown values.
#[derive(Debug, Clone)]
pub struct CategorySet {
    names: Vec<String>,
    default: String,
}

impl CategorySet {
    pub fn new(names: Vec<String>, default: impl Into<String>) -> Self {
        Self {
            names,
            default: default.into(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.categories.clone(), config.default_category.clone())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(value.trim()))
    }

    /// Canonical spelling of a known category, or the default category.
    pub fn resolve(&self, value: &str) -> String {
        let value = value.trim();
        self.names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(value))
            .unwrap_or(&self.default)
            .clone()
    }

    pub fn default_category(&self) -> &str {
        &self.default
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_category_keeps_canonical_spelling() {
        let set = CategorySet::default();
        assert_eq!(set.resolve(" Sensors "), "sensors");
        assert!(set.contains("PNEUMATICS"));
    }

    #[test]
    fn test_unknown_category_maps_to_default() {
        let set = CategorySet::default();
        assert_eq!(set.resolve("Widgets"), "other");
        assert_eq!(set.resolve(""), "other");
        assert!(!set.contains("Widgets"));
    }
}
