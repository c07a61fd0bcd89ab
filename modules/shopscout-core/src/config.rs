use anyhow::Result;

/// Application configuration loaded from environment variables.
/// Contains only secrets and env-specific values; models, thresholds
/// and server settings live in the TOML FileConfig.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // AI / LLM
    pub openai_api_key: String,
    pub anthropic_api_key: Option<String>,

    // Scraping
    pub apify_api_key: Option<String>,

    // Search
    pub typesense_url: Option<String>,
    pub typesense_api_key: Option<String>,

    // Media storage root; each post gets `<media_dir>/<post_id>/`.
    pub media_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")?,
            openai_api_key: std::env::var("OPENAI_API_KEY")?,
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            apify_api_key: std::env::var("APIFY_API_KEY").ok(),
            typesense_url: std::env::var("TYPESENSE_URL").ok(),
            typesense_api_key: std::env::var("TYPESENSE_API_KEY").ok(),
            media_dir: std::env::var("MEDIA_DIR").unwrap_or_else(|_| "storage/media".to_string()),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview_opt(&self.anthropic_api_key));
        tracing::info!("  APIFY_API_KEY: {}", preview_opt(&self.apify_api_key));
        tracing::info!("  TYPESENSE_URL: {}", self.typesense_url.as_deref().unwrap_or("<not set>"));
        tracing::info!("  TYPESENSE_API_KEY: {}", preview_opt(&self.typesense_api_key));
        tracing::info!("  MEDIA_DIR: {}", self.media_dir);
    }
}

fn preview(val: &str) -> String {
    let n = val
        .char_indices()
        .nth(5)
        .map(|(i, _)| i)
        .unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.len())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => preview(v),
        _ => "<not set>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_prefix_and_length_only() {
        assert_eq!(preview("sk-abcdef123"), "sk-ab...(12 chars)");
        assert_eq!(preview("abc"), "abc...(3 chars)");
        assert_eq!(preview_opt(&None), "<not set>");
        assert_eq!(preview_opt(&Some(String::new())), "<not set>");
    }
}
