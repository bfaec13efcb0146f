use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::gemini::DEFAULT_ENDPOINT;
use crate::parser::package::DEFAULT_MAX_CONTENT_CHARS;

const ENV_PREFIX: &str = "TCA";

/// Runtime settings. Every field can be overridden with `TCA_<FIELD>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub max_content_chars: usize,
    pub rate_limit_ms: u64,
    pub daily_limit: u32,
    pub db_path: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("endpoint", DEFAULT_ENDPOINT)?
            .set_default("max_content_chars", DEFAULT_MAX_CONTENT_CHARS as i64)?
            .set_default("rate_limit_ms", 1000_i64)?
            .set_default("daily_limit", 1000_i64)?
            .set_default("db_path", "data/tc_analyzer.sqlite")?
            .set_default("temperature", 0.3_f64)?
            .set_default("max_output_tokens", 2048_i64)?
            .add_source(env.try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Configured key, ignoring blank values.
    pub fn env_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_env(Environment::with_prefix(ENV_PREFIX).source(Some(map))).unwrap()
    }

    #[test]
    fn defaults() {
        let s = settings(&[]);
        assert_eq!(s.api_key, None);
        assert_eq!(s.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(s.max_content_chars, 15_000);
        assert_eq!(s.rate_limit_ms, 1000);
        assert_eq!(s.daily_limit, 1000);
        assert_eq!(s.db_path, "data/tc_analyzer.sqlite");
        assert_eq!(s.max_output_tokens, 2048);
        assert!((s.temperature - 0.3).abs() < 1e-9);
    }

    #[test]
    fn env_overrides() {
        let s = settings(&[
            ("TCA_MAX_CONTENT_CHARS", "20000"),
            ("TCA_DAILY_LIMIT", "5"),
            ("TCA_API_KEY", "abc123"),
        ]);
        assert_eq!(s.max_content_chars, 20_000);
        assert_eq!(s.daily_limit, 5);
        assert_eq!(s.env_api_key(), Some("abc123"));
    }

    #[test]
    fn blank_key_is_no_key() {
        let s = settings(&[("TCA_API_KEY", "   ")]);
        assert_eq!(s.env_api_key(), None);
    }
}
