use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tog: TogConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: Option<EmbeddingsConfig>,
    #[serde(default)]
    pub linking: LinkingConfig,
}

/// Paths and process-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct TogConfig {
    /// SQLite graph store produced by the `import` binary.
    pub graph_db: PathBuf,
    /// Append-only JSON Lines file receiving one record per question.
    pub output_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// How relation and candidate scores are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneTool {
    /// Oracle-ranked relations and oracle-weighted candidates.
    Llm,
    /// Okapi BM25 of relation names against the question.
    Bm25,
    /// Dot-product of question and relation-name embeddings.
    Embedding,
}

/// Beam search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Beam width W.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Maximum depth D.
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Candidate count above which oracle-mode expansion down-samples.
    #[serde(default = "default_fan_out_ceiling")]
    pub fan_out_ceiling: usize,
    /// Candidates kept after down-sampling.
    #[serde(default = "default_num_retain_entity")]
    pub num_retain_entity: usize,
    #[serde(default = "default_prune_tools")]
    pub prune_tools: PruneTool,
    /// Upper bound on in-flight graph/oracle calls within one depth.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Seed for fan-out sampling; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Turn relations that expand to no entity into finished branches
    /// instead of skipping them.
    #[serde(default = "default_finish_exhausted_relations")]
    pub finish_exhausted_relations: bool,
    /// Oracle-returned relation names containing any of these are ignored.
    #[serde(default = "default_rejected_relation_substrings")]
    pub rejected_relation_substrings: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            depth: default_depth(),
            fan_out_ceiling: default_fan_out_ceiling(),
            num_retain_entity: default_num_retain_entity(),
            prune_tools: default_prune_tools(),
            concurrency: default_concurrency(),
            seed: None,
            finish_exhausted_relations: default_finish_exhausted_relations(),
            rejected_relation_substrings: default_rejected_relation_substrings(),
        }
    }
}

impl SearchConfig {
    /// True when a relation name passes the lexical validity filter.
    pub fn accepts_relation(&self, relation: &str) -> bool {
        !self
            .rejected_relation_substrings
            .iter()
            .any(|needle| !needle.is_empty() && relation.contains(needle.as_str()))
    }
}

/// Chat-completion oracle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature_exploration")]
    pub temperature_exploration: f32,
    #[serde(default)]
    pub temperature_reasoning: f32,
    /// Completion token limit passed through to the provider.
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                self.api_key_env
            )
        })
    }
}

/// Embeddings configuration (only used with `prune_tools = "embedding"`)
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Topic-entity linking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LinkingConfig {
    /// Minimum fuzzy ratio (0-100) for a name match.
    #[serde(default = "default_link_threshold")]
    pub threshold: u8,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            threshold: default_link_threshold(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_width() -> usize {
    3
}

fn default_depth() -> usize {
    3
}

fn default_fan_out_ceiling() -> usize {
    20
}

fn default_num_retain_entity() -> usize {
    5
}

fn default_prune_tools() -> PruneTool {
    PruneTool::Llm
}

fn default_concurrency() -> usize {
    4
}

fn default_finish_exhausted_relations() -> bool {
    false
}

fn default_rejected_relation_substrings() -> Vec<String> {
    vec![";".to_string()]
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature_exploration() -> f32 {
    0.4
}

fn default_max_length() -> u32 {
    256
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_link_threshold() -> u8 {
    85
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in TOG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Optional: the API key may already be exported
        let _ = dotenv::dotenv();

        let config_path = std::env::var("TOG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let search = &self.search;
        if search.width == 0 {
            anyhow::bail!("search.width must be greater than 0");
        }

        if search.depth == 0 {
            anyhow::bail!("search.depth must be greater than 0");
        }

        if search.num_retain_entity == 0 {
            anyhow::bail!("search.num_retain_entity must be greater than 0");
        }

        if search.concurrency == 0 {
            anyhow::bail!("search.concurrency must be greater than 0");
        }

        if search.prune_tools == PruneTool::Embedding && self.embeddings.is_none() {
            anyhow::bail!("search.prune_tools = \"embedding\" requires an [embeddings] section");
        }

        if !(0.0..=2.0).contains(&self.llm.temperature_exploration)
            || !(0.0..=2.0).contains(&self.llm.temperature_reasoning)
        {
            anyhow::bail!("llm temperatures must be between 0.0 and 2.0");
        }

        if self.llm.max_retries == 0 {
            anyhow::bail!("llm.max_retries must be greater than 0");
        }

        if self.linking.threshold > 100 {
            anyhow::bail!("linking.threshold must be between 0 and 100");
        }

        Ok(())
    }

    /// Get graph database path
    pub fn graph_db(&self) -> &Path {
        &self.tog.graph_db
    }

    /// Get output JSONL path
    pub fn output_path(&self) -> &Path {
        &self.tog.output_path
    }
}
