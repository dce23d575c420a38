//! Configuration loading and validation.
//!
//! Every section of the TOML file is optional. A missing config file is not an
//! error: the binary then runs on the defaults, which reproduce the layout
//! `documents/general`, `documents/<org>`, `processed_files.json` and
//! `vector_store/` relative to the working directory.
//!
//! Two values come from the environment rather than the file: the HTTP port
//! (`PORT`) and the LLM API key (the variable named by `llm.api_key_env`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `server.port`.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Knowledge-base layout on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Root whose immediate subdirectories are organizations.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    /// Root of documents visible to every organization.
    #[serde(default = "default_global_dir")]
    pub global_dir: PathBuf,
    /// Subdirectory name under `documents_dir` that is never an organization.
    #[serde(default = "default_reserved_org_dir")]
    pub reserved_org_dir: String,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            global_dir: default_global_dir(),
            reserved_org_dir: default_reserved_org_dir(),
            manifest: default_manifest(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("documents")
}
fn default_global_dir() -> PathBuf {
    PathBuf::from("documents/general")
}
fn default_reserved_org_dir() -> String {
    "general".to_string()
}
fn default_manifest() -> PathBuf {
    PathBuf::from("processed_files.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vector_store/chunks.sqlite")
}

/// Window parameters for the character splitter.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks retrieved as context for a chat answer.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks kept per topical query in summary mode.
    #[serde(default = "default_summary_per_query")]
    pub summary_per_query: usize,
    /// Total chunks forwarded to the model in summary mode.
    #[serde(default = "default_summary_max_chunks")]
    pub summary_max_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            summary_per_query: default_summary_per_query(),
            summary_max_chunks: default_summary_max_chunks(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_summary_per_query() -> usize {
    2
}
fn default_summary_max_chunks() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the provider's API base URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            url: None,
        }
    }
}

impl LlmConfig {
    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Built front-end bundle; `index.html` inside it is the SPA fallback.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    10000
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl Config {
    /// Applies environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_port_override(std::env::var(PORT_ENV).ok())
    }

    fn apply_port_override(&mut self, value: Option<String>) -> Result<()> {
        if let Some(raw) = value {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.server.port = raw
                    .parse()
                    .with_context(|| format!("{} is not a valid port: '{}'", PORT_ENV, raw))?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.summary_max_chunks < 1 {
            bail!("retrieval.summary_max_chunks must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "local" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
                other
            ),
        }

        match self.llm.provider.as_str() {
            "disabled" | "gemini" | "openai" => {}
            other => bail!(
                "Unknown llm provider: '{}'. Must be disabled, gemini, or openai.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be in [0.0, 2.0]");
        }

        Ok(())
    }
}

/// Parses config text without touching the filesystem or environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.apply_env()?;
    config.validate()?;
    Ok(config)
}
