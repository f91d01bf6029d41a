use super::CrawlConfig;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use std::path::Path;

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "sharecrawl.toml";

impl CrawlConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    /// Resolve configuration from defaults, a config file and the environment
    ///
    /// Priority (lowest first): built-in defaults, `custom_config` (format
    /// chosen by extension) or `sharecrawl.toml` in the working directory,
    /// then `SHARECRAWL_` environment variables with `__` separating sections
    /// (e.g. `SHARECRAWL_QUEUE__PATH`).
    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(CrawlConfig::default()));

        figment = match custom_config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                let extension = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.to_ascii_lowercase());
                match extension.as_deref() {
                    Some("json") => figment.merge(Json::file(path)),
                    Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                    _ => figment.merge(Toml::file(path)),
                }
            }
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };

        figment = figment.merge(Env::prefixed("SHARECRAWL_").split("__"));

        let config: CrawlConfig = figment
            .extract()
            .context("Failed to resolve configuration")?;
        tracing::debug!("Resolved configuration: {config:?}");
        Ok(config)
    }
}
