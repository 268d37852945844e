use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_api_base: Option<String>,
    pub database_url: String,
    pub bind_address: String,
    pub documents_root: PathBuf,
    pub cors_origin: String,
    pub llm_timeout: Duration,
    pub retrieval_top_k: usize,
    pub retrieval_chunk_lines: usize,
    pub log_level: String,
}

impl AppConfig {
    /// Reads the configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::new(|key| std::env::var(key).ok())
    }

    // Factory over any key/value source so tests don't touch the process environment
    pub fn new<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| anyhow!("OPENAI_API_KEY not found"))?;

        let openai_api_base = get("OPENAI_API_BASE").filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").unwrap_or_else(|| "sqlite://docgpt.db?mode=rwc".to_string());

        let bind_address = get("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3000".to_string());

        let documents_root = get("DOCUMENTS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:4200".to_string());

        let llm_timeout = Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 60)?);

        let retrieval_top_k = parse_or(&get, "RETRIEVAL_TOP_K", 4)?;

        let retrieval_chunk_lines = parse_or(&get, "RETRIEVAL_CHUNK_LINES", 20)?;
        if retrieval_chunk_lines == 0 {
            return Err(anyhow!("RETRIEVAL_CHUNK_LINES must be greater than zero"));
        }

        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(AppConfig {
            openai_api_key,
            openai_api_base,
            database_url,
            bind_address,
            documents_root,
            cors_origin,
            llm_timeout,
            retrieval_top_k,
            retrieval_chunk_lines,
            log_level,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} is not a valid number: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_api_key_is_set() {
        let config = AppConfig::new(source(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_api_base, None);
        assert_eq!(config.bind_address, "127.0.0.1:3000");
        assert_eq!(config.database_url, "sqlite://docgpt.db?mode=rwc");
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.retrieval_top_k, 4);
        assert_eq!(config.retrieval_chunk_lines, 20);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = AppConfig::new(source(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::new(source(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE", "http://localhost:8080/v1"),
            ("LLM_TIMEOUT_SECS", "5"),
            ("RETRIEVAL_TOP_K", " 2 "),
            ("DOCUMENTS_ROOT", "/srv/docs"),
        ]))
        .unwrap();
        assert_eq!(config.openai_api_base.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.llm_timeout, Duration::from_secs(5));
        assert_eq!(config.retrieval_top_k, 2);
        assert_eq!(config.documents_root, PathBuf::from("/srv/docs"));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = AppConfig::new(source(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LLM_TIMEOUT_SECS"));

        let err = AppConfig::new(source(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RETRIEVAL_CHUNK_LINES", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RETRIEVAL_CHUNK_LINES"));
    }
}
