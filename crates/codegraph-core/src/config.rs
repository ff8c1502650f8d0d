use std::{env, path::PathBuf};

use config as cfg;
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{CodeGraphError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GraphConfig {
    /// Connection string for SurrealDB (e.g. "ws://localhost:8000" or "file://data/graph.db").
    #[serde(default = "GraphConfig::default_connection")]
    pub connection: String,
    #[serde(default = "GraphConfig::default_namespace")]
    pub namespace: String,
    #[serde(default = "GraphConfig::default_database")]
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    #[schemars(skip)]
    pub password: Option<SecretString>,
}

impl GraphConfig {
    fn default_connection() -> String {
        "ws://localhost:8000".to_string()
    }
    fn default_namespace() -> String {
        "codegraph".to_string()
    }
    fn default_database() -> String {
        "knowledge_base".to_string()
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            connection: Self::default_connection(),
            namespace: Self::default_namespace(),
            database: Self::default_database(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VectorConfig {
    #[serde(default = "VectorConfig::default_url")]
    pub url: String,
    #[serde(default, skip_serializing)]
    #[schemars(skip)]
    pub api_key: Option<SecretString>,
    #[serde(default = "VectorConfig::default_dimension")]
    pub dimension: usize,
    #[serde(default = "VectorConfig::default_base_collection")]
    pub base_collection: String,
}

impl VectorConfig {
    fn default_url() -> String {
        "http://localhost:6334".to_string()
    }
    fn default_dimension() -> usize {
        768
    }
    fn default_base_collection() -> String {
        "code_chunks".to_string()
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            api_key: None,
            dimension: Self::default_dimension(),
            base_collection: Self::default_base_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmConfig {
    #[serde(default = "LlmConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    #[schemars(skip)]
    pub api_key: Option<SecretString>,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "LlmConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "LlmConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
}

impl LlmConfig {
    fn default_endpoint() -> String {
        "https://openrouter.ai/api/v1/chat/completions".to_string()
    }
    fn default_model() -> String {
        "anthropic/claude-3-haiku".to_string()
    }
    fn default_timeout_secs() -> u64 {
        30
    }
    fn default_max_retries() -> u32 {
        3
    }
    fn default_max_tokens() -> u32 {
        1024
    }
    fn default_temperature() -> f32 {
        0.2
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            model: Self::default_model(),
            api_key: None,
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama-compatible embedding endpoint (the
    /// embedding model itself is a black-box batch encoder per spec;
    /// this is just where to reach it).
    #[serde(default = "EmbeddingConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "EmbeddingConfig::default_model")]
    pub model: String,
    #[serde(default = "EmbeddingConfig::default_dimension")]
    pub dimension: usize,
    #[serde(default = "EmbeddingConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    fn default_base_url() -> String {
        "http://localhost:11434".to_string()
    }
    fn default_model() -> String {
        "nomic-embed-text".to_string()
    }
    fn default_dimension() -> usize {
        768
    }
    fn default_timeout_secs() -> u64 {
        30
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            dimension: Self::default_dimension(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_thread_count")]
    pub thread_count: usize,
    #[serde(default = "AnalysisConfig::default_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default = "AnalysisConfig::default_max_memory_percent")]
    pub max_memory_percent: f32,
    #[serde(default = "AnalysisConfig::default_chunk_tokens")]
    pub chunk_tokens: usize,
    #[serde(default = "AnalysisConfig::default_overlap_tokens")]
    pub overlap_tokens: usize,
}

impl AnalysisConfig {
    fn default_thread_count() -> usize {
        num_cpus::get().max(1).min(8)
    }
    fn default_batch_size() -> usize {
        32
    }
    fn default_max_memory_percent() -> f32 {
        80.0
    }
    fn default_chunk_tokens() -> usize {
        512
    }
    fn default_overlap_tokens() -> usize {
        50
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            thread_count: Self::default_thread_count(),
            embedding_batch_size: Self::default_batch_size(),
            max_memory_percent: Self::default_max_memory_percent(),
            chunk_tokens: Self::default_chunk_tokens(),
            overlap_tokens: Self::default_overlap_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct Settings {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Settings {
    /// Layered load matching the workspace convention: `default.toml`,
    /// then an optional `local.toml` override, then `CODEGRAPH__*`
    /// environment variables (double underscore as the nesting separator).
    pub fn load(config_dir: &PathBuf) -> Result<Self> {
        let builder = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(cfg::Environment::with_prefix("CODEGRAPH").separator("__"));

        let settings: Settings = builder
            .build()
            .map_err(|e| CodeGraphError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CodeGraphError::Configuration(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.graph.connection.trim().is_empty() {
            return Err(CodeGraphError::Configuration(
                "graph.connection cannot be empty".into(),
            ));
        }
        if self.vector.dimension == 0 {
            return Err(CodeGraphError::Configuration(
                "vector.dimension must be > 0".into(),
            ));
        }
        if self.analysis.thread_count == 0 {
            return Err(CodeGraphError::Configuration(
                "analysis.thread_count must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// `~/.codegraph` when it exists, else `./config`, else the cwd —
    /// same precedence the workspace's config loader uses.
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let dir = home_dir.join(".codegraph");
            if dir.exists() {
                info!("using config directory: {:?}", dir);
                return dir;
            }
        }
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            return project_config;
        }
        cwd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_dimension_fails_validation() {
        let mut settings = Settings::default();
        settings.vector.dimension = 0;
        assert!(matches!(
            settings.validate(),
            Err(CodeGraphError::Configuration(_))
        ));
    }

    #[test]
    fn zero_thread_count_fails_validation() {
        let mut settings = Settings::default();
        settings.analysis.thread_count = 0;
        assert!(matches!(
            settings.validate(),
            Err(CodeGraphError::Configuration(_))
        ));
    }

    #[test]
    fn embedding_defaults_are_sane() {
        let embedding = EmbeddingConfig::default();
        assert!(embedding.dimension > 0);
        assert!(!embedding.base_url.is_empty());
    }
}
