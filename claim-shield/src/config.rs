use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::embedding::DEFAULT_EMBEDDING_DIMENSION;

pub const DEFAULT_SIMILAR_CASE_LIMIT: usize = 2;
pub const DEFAULT_EMBEDDING_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 500;

/// Tunables for the evaluation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub embedding_dimension: usize,
    /// `k` for the similar-case query.
    pub similar_case_limit: usize,
    pub embedding_timeout: Duration,
    pub classifier_timeout: Duration,
    /// JSON logistic model; scoring uses the formula when unset.
    pub model_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            similar_case_limit: DEFAULT_SIMILAR_CASE_LIMIT,
            embedding_timeout: Duration::from_millis(DEFAULT_EMBEDDING_TIMEOUT_MS),
            classifier_timeout: Duration::from_millis(DEFAULT_CLASSIFIER_TIMEOUT_MS),
            model_path: None,
        }
    }
}

impl EngineConfig {
    /// Reads `EMBEDDING_DIMENSION`, `SIMILAR_CASE_LIMIT`, `EMBEDDING_TIMEOUT_MS`,
    /// `CLASSIFIER_TIMEOUT_MS` and `FRAUD_MODEL_PATH`, keeping defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            embedding_dimension: parse_or(&lookup, "EMBEDDING_DIMENSION", defaults.embedding_dimension),
            similar_case_limit: parse_or(&lookup, "SIMILAR_CASE_LIMIT", defaults.similar_case_limit),
            embedding_timeout: Duration::from_millis(parse_or(
                &lookup,
                "EMBEDDING_TIMEOUT_MS",
                DEFAULT_EMBEDDING_TIMEOUT_MS,
            )),
            classifier_timeout: Duration::from_millis(parse_or(
                &lookup,
                "CLASSIFIER_TIMEOUT_MS",
                DEFAULT_CLASSIFIER_TIMEOUT_MS,
            )),
            model_path: lookup("FRAUD_MODEL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.embedding_dimension, 384);
        assert_eq!(config.similar_case_limit, 2);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EMBEDDING_DIMENSION", "128"),
            ("SIMILAR_CASE_LIMIT", "five"),
            ("CLASSIFIER_TIMEOUT_MS", " 250 "),
            ("FRAUD_MODEL_PATH", "/models/fraud.json"),
        ]);
        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.embedding_dimension, 128);
        assert_eq!(config.similar_case_limit, DEFAULT_SIMILAR_CASE_LIMIT);
        assert_eq!(config.classifier_timeout, Duration::from_millis(250));
        assert_eq!(config.model_path, Some(PathBuf::from("/models/fraud.json")));
    }
}
