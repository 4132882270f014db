use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Full runtime configuration loaded from TOML + env vars.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub hub: HubConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Cache root. Empty means "resolve from the HF_* environment".
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    /// Service endpoint. Empty means "resolve from HF_ENDPOINT".
    pub endpoint: String,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig { dir: String::new() },
            hub: HubConfig {
                endpoint: String::new(),
                max_retries: 3,
                retry_delay_secs: 1,
            },
        }
    }
}

/// Load configuration from:
/// 1. Built-in defaults
/// 2. `config/default.toml` (if present)
/// 3. A custom config file path (if provided)
/// 4. Environment variables prefixed with `HUBCACHE_`
pub fn load_config(config_file: Option<&PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("cache.dir", "")?
        .set_default("hub.endpoint", "")?
        .set_default("hub.max_retries", 3_i64)?
        .set_default("hub.retry_delay_secs", 1_i64)?
        .add_source(File::with_name("config/default").required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("HUBCACHE")
            .separator("_")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

impl AppConfig {
    /// The cache handle this configuration selects.
    pub fn hub_cache(&self) -> hubcache::HubCache {
        if self.cache.dir.is_empty() {
            hubcache::HubCache::from_env()
        } else {
            hubcache::HubCache::at(&self.cache.dir)
        }
    }

    /// An API client honoring the configured endpoint.
    pub fn hub_api(&self) -> hubcache::HubResult<hubcache::HubApi> {
        let mut builder = hubcache::HubApi::builder();
        if !self.hub.endpoint.is_empty() {
            builder = builder.with_endpoint(&self.hub.endpoint);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_settings() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.hub.max_retries, 3);
        assert_eq!(cfg.hub.retry_delay_secs, 1);
    }

    #[test]
    fn default_cache_dir_defers_to_environment() {
        let cfg = load_config(None).unwrap();
        assert!(cfg.cache.dir.is_empty());
        assert!(cfg.hub.endpoint.is_empty());
    }

    #[test]
    fn custom_config_file_overrides_defaults() {
        let dir = std::env::temp_dir().join("hubcache_cfg_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("custom.toml");
        std::fs::write(
            &file,
            "[hub]\nendpoint = \"https://hub.internal\"\nmax_retries = 5\nretry_delay_secs = 2\n",
        )
        .unwrap();

        let cfg = load_config(Some(&file)).unwrap();
        assert_eq!(cfg.hub.endpoint, "https://hub.internal");
        assert_eq!(cfg.hub.max_retries, 5);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn explicit_cache_dir_is_used() {
        let cfg = AppConfig {
            cache: CacheConfig { dir: "/tmp/hubcache-test-root".into() },
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.hub_cache().root(),
            std::path::Path::new("/tmp/hubcache-test-root")
        );
    }
}
