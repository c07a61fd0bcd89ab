use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// TOML-backed configuration loaded from disk.
/// Secrets (API keys, DB URL) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// `"openai"` or `"claude"`.
    pub backend: String,
    pub extraction_model: String,
    pub classification_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Pipeline tuning. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// A temp taxonomy entry is promoted once its score exceeds this.
    pub promotion_threshold: i32,
    /// Maximum accepted vector distance for category resolution.
    pub vector_distance_threshold: f32,
    pub max_extraction_retries: u32,
    pub extraction_backoff_ms: u64,
    pub job_tries: u32,
    pub job_backoff_secs: u64,
    pub workers: usize,
    pub scrape_limit: u32,
    pub default_group: String,
    pub llm_timeout_secs: u64,
    pub scrape_timeout_secs: u64,
    pub pipeline_timeout_secs: u64,
    pub stale_run_after_mins: i64,
    pub reaper_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            promotion_threshold: 3,
            vector_distance_threshold: 0.30,
            max_extraction_retries: 3,
            extraction_backoff_ms: 2000,
            job_tries: 3,
            job_backoff_secs: 10,
            workers: 4,
            scrape_limit: 50,
            default_group: "tech".to_string(),
            llm_timeout_secs: 120,
            scrape_timeout_secs: 600,
            pipeline_timeout_secs: 1800,
            stale_run_after_mins: 120,
            reaper_interval_secs: 300,
        }
    }
}

impl PipelineConfig {
    pub fn extraction_backoff(&self) -> Duration {
        Duration::from_millis(self.extraction_backoff_ms)
    }

    pub fn job_backoff(&self) -> Duration {
        Duration::from_secs(self.job_backoff_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [llm]
        backend = "claude"
        extraction_model = "claude-sonnet-4-20250514"
        classification_model = "claude-haiku-4-5"

        [server]
        port = 8080
    "#;

    #[test]
    fn missing_pipeline_section_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.llm.backend, "claude");
        assert_eq!(config.llm.embedding_model, "text-embedding-3-small");
        assert_eq!(config.pipeline.promotion_threshold, 3);
        assert_eq!(config.pipeline.vector_distance_threshold, 0.30);
        assert_eq!(config.pipeline.job_tries, 3);
        assert!(config.server.allowed_origins.is_empty());
    }

    #[test]
    fn partial_pipeline_section_keeps_other_defaults() {
        let content = format!("{MINIMAL}\n[pipeline]\nworkers = 8\n");
        let config = parse_config(&content).unwrap();
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.max_extraction_retries, 3);
        assert_eq!(config.pipeline.default_group, "tech");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let content = format!("{MINIMAL}\n[pipeline]\npromotion_treshold = 5\n");
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn load_config_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }
}
