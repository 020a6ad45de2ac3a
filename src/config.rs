//! Configuration loaded from `draftmill.toml`.
//!
//! [`DraftmillConfig`] holds every configurable parameter. Values missing from
//! the file use sensible defaults. The `DRAFTMILL_API_KEY` environment
//! variable takes precedence over the file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::catalog::{ProviderCatalog, ProviderProfile};

/// Top-level configuration loaded from `draftmill.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftmillConfig {
    /// API key for the generation gateway.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the generation gateway.
    #[serde(default = "default_base_url")]
    pub api_base_url: String,

    /// Per-provider overrides or additions to the built-in cost table.
    #[serde(default)]
    pub providers: HashMap<String, ProviderProfile>,
}

fn default_base_url() -> String {
    "https://gateway.draftmill.io".to_string()
}

impl Default for DraftmillConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: default_base_url(),
            providers: HashMap::new(),
        }
    }
}

impl DraftmillConfig {
    /// Load configuration from `draftmill.toml` in the current directory.
    /// Falls back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Path::new("draftmill.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<DraftmillConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the config file for the API key.
        if let Ok(key) = std::env::var("DRAFTMILL_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        Ok(config)
    }

    /// The built-in cost table with this config's overrides applied.
    pub fn catalog(&self) -> ProviderCatalog {
        let mut catalog = ProviderCatalog::builtin();
        for (name, profile) in &self.providers {
            catalog.insert(name, profile.clone());
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = DraftmillConfig::default();
        assert_eq!(config.api_base_url, "https://gateway.draftmill.io");
        assert!(config.api_key.is_empty());
        assert!(config.providers.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "dk-test-123"
        "#;
        let config: DraftmillConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "dk-test-123");
        assert_eq!(config.api_base_url, "https://gateway.draftmill.io");
    }

    #[test]
    fn provider_overrides_merge_into_catalog() {
        let toml_str = r#"
            [providers.local-llama]
            input_per_mtok = 0.0
            output_per_mtok = 0.0
            quality_rank = 3

            [providers.anthropic]
            input_per_mtok = 2.5
            output_per_mtok = 12.0
            quality_rank = 9
        "#;
        let config: DraftmillConfig = toml::from_str(toml_str).unwrap();
        let catalog = config.catalog();
        assert!(catalog.contains("local-llama"));
        assert_eq!(catalog.get("anthropic").unwrap().output_per_mtok, 12.0);
        assert!(catalog.contains("deepseek"));
    }

    #[test]
    fn load_falls_back_to_defaults() {
        // The test working directory normally has no draftmill.toml.
        let config = DraftmillConfig::load().unwrap();
        assert_eq!(config.api_base_url, "https://gateway.draftmill.io");
    }
}
