//! Runtime configuration
//!
//! Credentials and endpoints come from the environment (optionally via a
//! `.env` file). The chat model catalog is embedded at build time.

use crate::models::ModelSpec;
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const MODELS_JSON: &str = include_str!("../data/models.json");

pub const CHAT_KEY_VAR: &str = "CEREBRAS_API_KEY";
pub const IMAGE_KEY_VAR: &str = "TOGETHER_API_KEY";

pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.cerebras.ai";
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://api.together.xyz";
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell-Free";

/// Smallest selectable output-token bound, also the slider step.
pub const MIN_MAX_TOKENS: u32 = 512;
pub const MAX_TOKENS_STEP: u32 = 512;
const PREFERRED_MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct Config {
    pub chat_api_key: Option<String>,
    pub image_api_key: Option<String>,
    pub chat_base_url: String,
    pub image_base_url: String,
    pub image_model: String,
    pub chat_timeout: Duration,
    pub image_timeout: Duration,
    pub download_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            chat_api_key: non_empty(CHAT_KEY_VAR),
            image_api_key: non_empty(IMAGE_KEY_VAR),
            chat_base_url: non_empty("CHAT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string()),
            image_base_url: non_empty("IMAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
            image_model: non_empty("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            chat_timeout: parse_secs(non_empty("CHAT_TIMEOUT_SECS"), "CHAT_TIMEOUT_SECS", 120)?,
            image_timeout: parse_secs(non_empty("IMAGE_TIMEOUT_SECS"), "IMAGE_TIMEOUT_SECS", 120)?,
            download_dir: non_empty("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

fn parse_secs(value: Option<String>, key: &str, default: u64) -> Result<Duration> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| Error::Config(format!("{} must be a whole number of seconds, got '{}'", key, raw))),
    }
}

/// Pick the chat credential: the configured value wins, otherwise ask.
///
/// An absent or blank result from both sources is fatal.
pub fn resolve_chat_credential<F>(configured: Option<String>, ask: F) -> Result<String>
where
    F: FnOnce() -> Result<Option<String>>,
{
    if let Some(key) = configured.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
        tracing::info!("{} loaded from flag or environment", CHAT_KEY_VAR);
        return Ok(key);
    }

    match ask()? {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(Error::MissingCredential(format!(
            "{} is required. Enter it at startup or set the environment variable.",
            CHAT_KEY_VAR
        ))),
    }
}

/// Static table of selectable chat models, in display order.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl ModelCatalog {
    pub fn builtin() -> Result<Self> {
        let models: Vec<ModelSpec> = serde_json::from_str(MODELS_JSON)?;
        Self::new(models)
    }

    pub fn new(models: Vec<ModelSpec>) -> Result<Self> {
        if models.is_empty() {
            return Err(Error::Config("model catalog is empty".to_string()));
        }
        if let Some(bad) = models.iter().find(|m| m.tokens < MIN_MAX_TOKENS) {
            return Err(Error::Config(format!(
                "model '{}' allows {} tokens, below the minimum of {}",
                bad.id, bad.tokens, MIN_MAX_TOKENS
            )));
        }
        Ok(Self { models })
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn default_model(&self) -> &ModelSpec {
        &self.models[0]
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }
}

/// Initial output-token bound for a model: 2048 or the model ceiling.
pub fn default_max_tokens(ceiling: u32) -> u32 {
    PREFERRED_MAX_TOKENS.min(ceiling)
}

/// Clamp a requested bound into `[512, ceiling]` and snap it down to the step.
pub fn clamp_max_tokens(requested: u32, ceiling: u32) -> u32 {
    let bounded = requested.clamp(MIN_MAX_TOKENS, ceiling.max(MIN_MAX_TOKENS));
    let snapped = MIN_MAX_TOKENS + (bounded - MIN_MAX_TOKENS) / MAX_TOKENS_STEP * MAX_TOKENS_STEP;
    snapped.min(ceiling.max(MIN_MAX_TOKENS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.chat_api_key.is_none());
        assert!(config.image_api_key.is_none());
        assert_eq!(config.chat_base_url, DEFAULT_CHAT_BASE_URL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.chat_timeout, Duration::from_secs(120));
        assert_eq!(config.download_dir, PathBuf::from("."));
    }

    #[test]
    fn test_from_lookup_treats_blank_keys_as_missing() {
        let config = Config::from_lookup(lookup(&[
            (CHAT_KEY_VAR, "  "),
            (IMAGE_KEY_VAR, "together-key"),
        ]))
        .unwrap();
        assert!(config.chat_api_key.is_none());
        assert_eq!(config.image_api_key.as_deref(), Some("together-key"));
    }

    #[test]
    fn test_from_lookup_trims_values() {
        let config = Config::from_lookup(lookup(&[
            (CHAT_KEY_VAR, "sk-abc "),
            (IMAGE_KEY_VAR, "\ttogether-key\n"),
            ("CHAT_BASE_URL", " http://localhost:8080 "),
        ]))
        .unwrap();
        assert_eq!(config.chat_api_key.as_deref(), Some("sk-abc"));
        assert_eq!(config.image_api_key.as_deref(), Some("together-key"));
        assert_eq!(config.chat_base_url, "http://localhost:8080");
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let err = Config::from_lookup(lookup(&[("IMAGE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_resolve_prefers_configured_key() {
        let key = resolve_chat_credential(Some("env-key".to_string()), || {
            panic!("should not ask when configured")
        })
        .unwrap();
        assert_eq!(key, "env-key");

        let key = resolve_chat_credential(Some(" flag-key\n".to_string()), || {
            panic!("should not ask when configured")
        })
        .unwrap();
        assert_eq!(key, "flag-key");
    }

    #[test]
    fn test_resolve_falls_back_to_interactive() {
        let key = resolve_chat_credential(None, || Ok(Some(" typed-key ".to_string()))).unwrap();
        assert_eq!(key, "typed-key");
    }

    #[test]
    fn test_resolve_missing_is_fatal() {
        let err = resolve_chat_credential(None, || Ok(None)).unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));

        let err = resolve_chat_credential(Some(String::new()), || Ok(Some("   ".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ModelCatalog::builtin().unwrap();
        assert!(!catalog.models().is_empty());
        let default = catalog.default_model();
        assert_eq!(catalog.get(&default.id), Some(default));
        assert!(catalog.get("no-such-model").is_none());
    }

    #[test]
    fn test_catalog_rejects_empty_and_tiny_ceiling() {
        assert!(ModelCatalog::new(vec![]).is_err());
        let tiny = ModelSpec {
            id: "tiny".to_string(),
            name: "Tiny".to_string(),
            tokens: 100,
        };
        assert!(ModelCatalog::new(vec![tiny]).is_err());
    }

    #[test]
    fn test_default_max_tokens() {
        assert_eq!(default_max_tokens(8192), 2048);
        assert_eq!(default_max_tokens(1024), 1024);
    }

    #[test]
    fn test_clamp_max_tokens() {
        assert_eq!(clamp_max_tokens(100, 8192), 512);
        assert_eq!(clamp_max_tokens(1500, 8192), 1024);
        assert_eq!(clamp_max_tokens(4096, 8192), 4096);
        assert_eq!(clamp_max_tokens(100_000, 8192), 8192);
        // A ceiling off the step grid snaps to the last reachable step.
        assert_eq!(clamp_max_tokens(100_000, 16382), 15872);
    }
}
