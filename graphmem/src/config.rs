//! Process configuration for the graph memory engine
//!
//! The core library accepts a plain [`Config`] value; it never reads the
//! environment or a config file itself. The reference binary (graphmem-server)
//! is responsible for assembling one from CLI flags, a config file, and
//! environment variables.

use std::path::PathBuf;

/// Embedding dimension valid range (§3)
pub const MIN_EMBEDDING_DIMS: usize = 1;
pub const MAX_EMBEDDING_DIMS: usize = 65536;

/// Default project name used when the caller omits one
pub const DEFAULT_PROJECT: &str = "default";

/// Dimension adaptation strategy (§4.1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdaptMode {
    #[default]
    PadOrTruncate,
    Pad,
    Truncate,
}

impl std::str::FromStr for AdaptMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "pad_or_truncate" | "pad-or-truncate" => Ok(AdaptMode::PadOrTruncate),
            "pad" => Ok(AdaptMode::Pad),
            "truncate" => Ok(AdaptMode::Truncate),
            _ => Err(crate::Error::InvalidArgument(format!(
                "unknown embeddings_adapt_mode: {s}"
            ))),
        }
    }
}

impl From<AdaptMode> for graphmem_providers::AdaptMode {
    fn from(mode: AdaptMode) -> Self {
        match mode {
            AdaptMode::PadOrTruncate => graphmem_providers::AdaptMode::PadOrTruncate,
            AdaptMode::Pad => graphmem_providers::AdaptMode::Pad,
            AdaptMode::Truncate => graphmem_providers::AdaptMode::Truncate,
        }
    }
}

/// Storage location: single-tenant vs multi-tenant (§3, §6)
#[derive(Debug, Clone)]
pub enum StorageMode {
    /// One database file at a fixed path
    Single { url: String, auth_token: Option<String> },
    /// `<projects_dir>/<project>/libsql.db` per tenant
    MultiProject { projects_dir: PathBuf },
}

/// Pool tuning knobs (§4.1, §5)
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_open_conns: usize,
    pub max_idle_conns: usize,
    pub conn_max_idle: std::time::Duration,
    pub conn_max_life: std::time::Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open_conns: 10,
            max_idle_conns: 5,
            conn_max_idle: std::time::Duration::from_secs(300),
            conn_max_life: std::time::Duration::from_secs(3600),
        }
    }
}

/// Hybrid search fusion tuning (§4.5, §6)
#[derive(Debug, Clone)]
pub struct HybridConfig {
    pub enabled: bool,
    pub text_weight: f64,
    pub vector_weight: f64,
    pub rrf_k: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text_weight: 0.4,
            vector_weight: 0.6,
            rrf_k: 60.0,
        }
    }
}

/// BM25 ranking tuning (§4.5, §6)
#[derive(Debug, Clone)]
pub struct Bm25Config {
    pub enabled: bool,
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            enabled: true,
            k1: 1.2,
            b: 0.75,
        }
    }
}

/// Multi-tenant authorization policy (§4.2, §6)
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub required: bool,
    pub auto_init_token: bool,
    pub default_token: Option<String>,
}

/// Metrics sampling configuration (§4.9, §6)
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub port: Option<u16>,
    pub sample_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: None,
            sample_rate: 1.0,
        }
    }
}

/// Top-level engine configuration assembled by the caller
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageMode,
    pub embedding_dims: usize,
    pub pool: PoolConfig,
    pub hybrid: HybridConfig,
    pub bm25: Bm25Config,
    pub auth: AuthConfig,
    pub metrics: MetricsConfig,
    pub embeddings_adapt_mode: AdaptMode,
}

impl Config {
    /// Validate the configured embedding dimension (§7 `INVALID_EMBEDDING_DIMS`)
    pub fn validate(&self) -> crate::Result<()> {
        if !(MIN_EMBEDDING_DIMS..=MAX_EMBEDDING_DIMS).contains(&self.embedding_dims) {
            return Err(crate::Error::InvalidEmbeddingDims(format!(
                "{} not in {}..={}",
                self.embedding_dims, MIN_EMBEDDING_DIMS, MAX_EMBEDDING_DIMS
            )));
        }
        Ok(())
    }

    /// True if the storage mode is multi-project
    pub fn is_multi_project(&self) -> bool {
        matches!(self.storage, StorageMode::MultiProject { .. })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageMode::Single {
                url: "graphmem.db".to_string(),
                auth_token: None,
            },
            embedding_dims: 384,
            pool: PoolConfig::default(),
            hybrid: HybridConfig::default(),
            bm25: Bm25Config::default(),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
            embeddings_adapt_mode: AdaptMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero() {
        let mut cfg = Config::default();
        cfg.embedding_dims = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_too_large() {
        let mut cfg = Config::default();
        cfg.embedding_dims = 65537;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_adapt_mode_from_str() {
        assert_eq!(
            "pad".parse::<AdaptMode>().unwrap(),
            AdaptMode::Pad
        );
        assert_eq!(
            "pad_or_truncate".parse::<AdaptMode>().unwrap(),
            AdaptMode::PadOrTruncate
        );
        assert!("bogus".parse::<AdaptMode>().is_err());
    }
}
