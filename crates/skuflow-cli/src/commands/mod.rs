//! Subcommands and the wiring they share.

pub mod batch;
pub mod config;
pub mod extract;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use skuflow_core::llm::OllamaClient;
use skuflow_core::{ExtractionRouter, InMemoryCatalog, SkuflowConfig, TieredMatcher, VisionExtractor};

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skuflow")
        .join("config.json")
}

/// Resolve the config path: explicit flag, else the platform default.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration, falling back to defaults when no file exists.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<SkuflowConfig> {
    let path = config_path(explicit);

    let config = if path.exists() {
        debug!("Loading config from {}", path.display());
        SkuflowConfig::from_file(&path)?
    } else if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    } else {
        SkuflowConfig::default()
    };

    for issue in config.validate() {
        warn!("Config: {}", issue);
    }

    Ok(config)
}

/// Router with the vision model attached when enabled.
pub fn build_router(config: &SkuflowConfig) -> anyhow::Result<ExtractionRouter> {
    let router = ExtractionRouter::from_config(&config.extraction);
    if !config.vision.enabled {
        return Ok(router);
    }

    let client = OllamaClient::for_vision(&config.vision)?;
    debug!("Vision model: {}", client.model());
    let vision = VisionExtractor::new(Arc::new(client), &config.extraction, &config.vision);
    Ok(router.with_vision(vision))
}

/// Matcher over a catalog file, with the semantic tier when enabled.
pub fn build_matcher(config: &SkuflowConfig, catalog: &Path) -> anyhow::Result<TieredMatcher<InMemoryCatalog>> {
    let catalog = InMemoryCatalog::from_file(catalog)?;
    let matcher = TieredMatcher::new(catalog, config.matching.clone());
    if !config.semantic.enabled {
        return Ok(matcher);
    }

    let client = OllamaClient::for_semantic(&config.semantic, config.matching.semantic_timeout())?;
    debug!("Semantic model: {}", client.model());
    Ok(matcher.with_semantic(Arc::new(client)))
}
