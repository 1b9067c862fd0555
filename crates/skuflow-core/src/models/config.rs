//! Configuration structures for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::record::{Currency, ExchangeRates};

/// Main configuration for skuflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkuflowConfig {
    /// Record extraction configuration.
    pub extraction: ExtractionConfig,

    /// Catalog matching configuration.
    pub matching: MatchingConfig,

    /// Vision model configuration.
    pub vision: VisionConfig,

    /// Semantic matching model configuration.
    pub semantic: SemanticConfig,
}

/// Record extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Currency used when neither the cell nor its header names one.
    pub default_currency: Currency,

    /// Allowed category names, in display order.
    pub categories: Vec<String>,

    /// Category used for values outside the allow-list. Must be in `categories`.
    pub default_category: String,

    /// How many leading rows are scanned for the header row.
    pub header_scan_rows: usize,

    /// Rates used to fill the secondary price fields (empty = no conversion).
    pub exchange_rates: ExchangeRates,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::Eur,
            categories: [
                "automation",
                "electrical",
                "sensors",
                "pneumatics",
                "mechanical",
                "cables",
                "tools",
                "consumables",
                "other",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_category: "other".to_string(),
            header_scan_rows: 10,
            exchange_rates: ExchangeRates::default(),
        }
    }
}

/// Catalog matching thresholds and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fuzzy score at or above which a candidate is a confident match.
    pub fuzzy_high: f64,

    /// Fuzzy score at or above which a candidate is sent to the semantic tier.
    pub fuzzy_borderline: f64,

    /// Semantic confidence at or above which a candidate is accepted.
    pub semantic_threshold: f64,

    /// Supplier similarity below which an exact match is treated as a new offering.
    pub supplier_divergence: f64,

    /// Timeout for one semantic call in milliseconds.
    pub semantic_timeout_ms: u64,

    /// Maximum semantic calls per record (borderline candidates are tried best first).
    pub max_semantic_calls: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_high: 0.9,
            fuzzy_borderline: 0.7,
            semantic_threshold: 0.85,
            supplier_divergence: 0.7,
            semantic_timeout_ms: 15_000,
            max_semantic_calls: 5,
        }
    }
}

impl MatchingConfig {
    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_millis(self.semantic_timeout_ms)
    }
}

/// Vision model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Route images to the vision model at all.
    pub enabled: bool,

    /// Ollama-compatible API endpoint.
    pub endpoint: String,

    /// Multimodal model name.
    pub model: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Longer image side in pixels; larger images are downscaled before upload.
    pub max_image_size: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2-vision".to_string(),
            timeout_secs: 60,
            max_image_size: 2048,
        }
    }
}

impl VisionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Semantic matching model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Run the semantic tier at all.
    pub enabled: bool,

    /// Ollama-compatible API endpoint.
    pub endpoint: String,

    /// Text model name.
    pub model: String,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
        }
    }
}

impl SkuflowConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let extraction = &self.extraction;

        if !extraction
            .categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&extraction.default_category))
        {
            issues.push(format!(
                "default category '{}' is not in the category list",
                extraction.default_category
            ));
        }

        let m = &self.matching;
        if !(0.0..=1.0).contains(&m.fuzzy_borderline) || !(0.0..=1.0).contains(&m.fuzzy_high) {
            issues.push("fuzzy thresholds must be within 0.0 - 1.0".to_string());
        }
        if m.fuzzy_borderline > m.fuzzy_high {
            issues.push("fuzzy_borderline must not exceed fuzzy_high".to_string());
        }
        if !(0.0..=1.0).contains(&m.semantic_threshold) {
            issues.push("semantic_threshold must be within 0.0 - 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&m.supplier_divergence) {
            issues.push("supplier_divergence must be within 0.0 - 1.0".to_string());
        }
        if m.max_semantic_calls == 0 {
            issues.push("max_semantic_calls is 0; the semantic tier will never run".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SkuflowConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.matching.fuzzy_high, 0.9);
        assert_eq!(config.matching.fuzzy_borderline, 0.7);
        assert_eq!(config.matching.semantic_threshold, 0.85);
        assert_eq!(config.extraction.default_currency, Currency::Eur);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SkuflowConfig =
            serde_json::from_str(r#"{"matching": {"fuzzy_high": 0.95}}"#).unwrap();
        assert_eq!(config.matching.fuzzy_high, 0.95);
        assert_eq!(config.matching.fuzzy_borderline, 0.7);
        assert_eq!(config.extraction.default_category, "other");
    }

    #[test]
    fn test_validate_flags_missing_default_category() {
        let mut config = SkuflowConfig::default();
        config.extraction.default_category = "misc".to_string();
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_validate_checks_matching_ranges() {
        let mut config = SkuflowConfig::default();
        config.matching.semantic_threshold = 1.5;
        config.matching.supplier_divergence = -0.1;
        config.matching.max_semantic_calls = 0;

        let issues = config.validate();
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("semantic_threshold"));
        assert!(issues[1].contains("supplier_divergence"));
        assert!(issues[2].contains("max_semantic_calls"));
    }

    #[test]
    fn test_exchange_rates_deserialize_from_numbers() {
        let config: SkuflowConfig = serde_json::from_str(
            r#"{"extraction": {"exchange_rates": {"USD": 1.1, "CNY": 7.8}}}"#,
        )
        .unwrap();
        assert!(!config.extraction.exchange_rates.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SkuflowConfig::default();
        config.vision.enabled = true;
        config.save(&path).unwrap();

        let loaded = SkuflowConfig::from_file(&path).unwrap();
        assert!(loaded.vision.enabled);
    }
}
