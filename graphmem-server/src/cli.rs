//! CLI argument parsing and config assembly (§4.10, §6)
//!
//! The core library never reads the environment or a config file; this
//! module is where CLI flags, env vars, and defaults turn into a
//! [`graphmem::Config`] and an optional embedding provider.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use graphmem::config::{AdaptMode, AuthConfig, Bm25Config, Config, HybridConfig, MetricsConfig, PoolConfig, StorageMode};
use graphmem_providers::providers::ProviderConfig;
use graphmem_providers::EmbeddingProvider;

#[derive(Parser, Debug)]
#[command(name = "graphmem-server")]
#[command(author, version, about = "graphmem - persistent knowledge-graph memory service")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Enable verbose (debug) logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server
    Serve {
        /// Transport to serve on
        #[arg(long, value_enum, default_value = "stdio")]
        transport: Transport,

        /// Address to bind the HTTP event-stream transport to
        #[arg(long, default_value = "127.0.0.1:8181")]
        http_bind: std::net::SocketAddr,
    },
    /// Smoke-test the configuration and print health status
    Health,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Multi-tenant project root; presence selects multi-project storage
    #[arg(long, env = "GRAPHMEM_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,

    /// Single-tenant database URL (path or libsql URL)
    #[arg(long, env = "GRAPHMEM_URL", default_value = "graphmem.db")]
    pub url: String,

    /// Auth token for the single-tenant database, if any
    #[arg(long, env = "GRAPHMEM_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Vector embedding width
    #[arg(long, env = "GRAPHMEM_EMBEDDING_DIMS", default_value_t = 384)]
    pub embedding_dims: usize,

    #[arg(long, env = "GRAPHMEM_MAX_OPEN_CONNS", default_value_t = 10)]
    pub max_open_conns: usize,

    #[arg(long, env = "GRAPHMEM_MAX_IDLE_CONNS", default_value_t = 5)]
    pub max_idle_conns: usize,

    #[arg(long, env = "GRAPHMEM_CONN_MAX_IDLE_SEC", default_value_t = 300)]
    pub conn_max_idle_sec: u64,

    #[arg(long, env = "GRAPHMEM_CONN_MAX_LIFE_SEC", default_value_t = 3600)]
    pub conn_max_life_sec: u64,

    /// Embedding provider: openai, ollama, gemini, vertexai, localai, voyageai
    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_PROVIDER")]
    pub embeddings_provider: Option<String>,

    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_HOST")]
    pub embeddings_host: Option<String>,

    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_API_KEY")]
    pub embeddings_api_key: Option<String>,

    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_MODEL")]
    pub embeddings_model: Option<String>,

    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_PROJECT")]
    pub embeddings_project: Option<String>,

    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_LOCATION")]
    pub embeddings_location: Option<String>,

    #[arg(long, env = "GRAPHMEM_EMBEDDINGS_ADAPT_MODE", default_value = "pad_or_truncate")]
    pub embeddings_adapt_mode: String,

    #[arg(long, env = "GRAPHMEM_HYBRID_SEARCH", default_value_t = false)]
    pub hybrid_search: bool,

    #[arg(long, env = "GRAPHMEM_HYBRID_TEXT_WEIGHT", default_value_t = 0.4)]
    pub hybrid_text_weight: f64,

    #[arg(long, env = "GRAPHMEM_HYBRID_VECTOR_WEIGHT", default_value_t = 0.6)]
    pub hybrid_vector_weight: f64,

    #[arg(long, env = "GRAPHMEM_HYBRID_RRF_K", default_value_t = 60.0)]
    pub hybrid_rrf_k: f64,

    #[arg(long, env = "GRAPHMEM_BM25_ENABLE", default_value_t = true)]
    pub bm25_enable: bool,

    #[arg(long, env = "GRAPHMEM_BM25_K1", default_value_t = 1.2)]
    pub bm25_k1: f64,

    #[arg(long, env = "GRAPHMEM_BM25_B", default_value_t = 0.75)]
    pub bm25_b: f64,

    /// Port to expose Prometheus-style metrics on, if any
    #[arg(long, env = "GRAPHMEM_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[arg(long, env = "GRAPHMEM_METRICS_SAMPLE_RATE", default_value_t = 1.0)]
    pub metrics_sample_rate: f64,

    #[arg(long, env = "GRAPHMEM_MULTI_PROJECT_AUTH_REQUIRED", default_value_t = false)]
    pub multi_project_auth_required: bool,

    #[arg(long, env = "GRAPHMEM_MULTI_PROJECT_AUTO_INIT_TOKEN", default_value_t = false)]
    pub multi_project_auto_init_token: bool,

    #[arg(long, env = "GRAPHMEM_MULTI_PROJECT_DEFAULT_TOKEN")]
    pub multi_project_default_token: Option<String>,
}

impl ConfigArgs {
    /// Assemble the engine [`Config`] this process should run with
    pub fn build_config(&self) -> anyhow::Result<Config> {
        let storage = match &self.projects_dir {
            Some(dir) => StorageMode::MultiProject {
                projects_dir: dir.clone(),
            },
            None => StorageMode::Single {
                url: self.url.clone(),
                auth_token: self.auth_token.clone(),
            },
        };

        let adapt_mode: AdaptMode = self.embeddings_adapt_mode.parse()?;

        let config = Config {
            storage,
            embedding_dims: self.embedding_dims,
            pool: PoolConfig {
                max_open_conns: self.max_open_conns,
                max_idle_conns: self.max_idle_conns,
                conn_max_idle: Duration::from_secs(self.conn_max_idle_sec),
                conn_max_life: Duration::from_secs(self.conn_max_life_sec),
            },
            hybrid: HybridConfig {
                enabled: self.hybrid_search,
                text_weight: self.hybrid_text_weight,
                vector_weight: self.hybrid_vector_weight,
                rrf_k: self.hybrid_rrf_k,
            },
            bm25: Bm25Config {
                enabled: self.bm25_enable,
                k1: self.bm25_k1,
                b: self.bm25_b,
            },
            auth: AuthConfig {
                required: self.multi_project_auth_required,
                auto_init_token: self.multi_project_auto_init_token,
                default_token: self.multi_project_default_token.clone(),
            },
            metrics: MetricsConfig {
                port: self.metrics_port,
                sample_rate: self.metrics_sample_rate,
            },
            embeddings_adapt_mode: adapt_mode,
        };

        config.validate()?;
        Ok(config)
    }

    /// Build the configured embedding provider, if one was requested
    pub fn build_provider(&self) -> anyhow::Result<Option<Box<dyn EmbeddingProvider + Send + Sync>>> {
        let Some(name) = &self.embeddings_provider else {
            return Ok(None);
        };

        let timeout = match name.as_str() {
            "ollama" | "localai" => graphmem_providers::LOCAL_RUNTIME_TIMEOUT,
            _ => graphmem_providers::DEFAULT_TIMEOUT,
        };

        let provider_config = ProviderConfig {
            host: self.embeddings_host.clone(),
            api_key: self.embeddings_api_key.clone(),
            model: self.embeddings_model.clone(),
            project: self.embeddings_project.clone(),
            location: self.embeddings_location.clone(),
            timeout,
        };

        let provider = graphmem_providers::providers::build(name, provider_config)?;
        Ok(Some(provider))
    }
}
