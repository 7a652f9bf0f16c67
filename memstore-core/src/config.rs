//! Configuration surface. Mirrors the recognized options in the external
//! interface table: one sub-struct per concern, all defaultable, loadable
//! from a TOML document with missing fields falling back to defaults.

use serde::{Deserialize, Serialize};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MemStoreConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub vector: VectorConfig,
    pub logging: LoggingConfig,
}

impl MemStoreConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub sync_url: Option<String>,
    pub encryption_key: Option<String>,
    pub max_connections: usize,
    pub idle_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "file:memstore.db".to_string(),
            auth_token: None,
            sync_url: None,
            encryption_key: None,
            max_connections: 10,
            idle_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl_ms: u64,
    pub update_age_on_get: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_ms: 300_000,
            update_age_on_get: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub vector_dimensions: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            vector_dimensions: 1536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MemStoreConfig::default();
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.database.idle_timeout_ms, 30_000);
        assert_eq!(cfg.cache.max_size, 1000);
        assert_eq!(cfg.cache.ttl_ms, 300_000);
        assert!(cfg.cache.update_age_on_get);
        assert_eq!(cfg.vector.vector_dimensions, 1536);
        assert_eq!(cfg.logging.log_level, "info");
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg = MemStoreConfig::from_toml(
            r#"
            [cache]
            max_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cache.max_size, 50);
        assert_eq!(cfg.cache.ttl_ms, 300_000);
        assert_eq!(cfg.database.max_connections, 10);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = MemStoreConfig::from_toml("").unwrap();
        let default_cfg = MemStoreConfig::default();
        assert_eq!(cfg.database.url, default_cfg.database.url);
        assert_eq!(cfg.vector.vector_dimensions, default_cfg.vector.vector_dimensions);
    }
}
