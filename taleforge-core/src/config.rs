//! Generation settings.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A configuration value could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for {key}: '{value}'")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Settings for every model call made by a game.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// The model to use (defaults to the client's default model).
    pub model: Option<String>,

    /// Maximum tokens for a world-building stage.
    pub world_max_tokens: usize,

    /// Maximum tokens for a story turn.
    pub turn_max_tokens: usize,

    /// Temperature for world-building stages.
    pub world_temperature: Option<f32>,

    /// Temperature for story turns.
    pub turn_temperature: Option<f32>,

    /// Upper bound on any single request.
    pub request_timeout: Duration,

    /// Longest allowed gap between two streamed fragments.
    pub stream_idle_timeout: Duration,

    /// Number of story entries included in a turn prompt.
    pub history_entries: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            world_max_tokens: 8192,
            turn_max_tokens: 4096,
            world_temperature: Some(1.0),
            turn_temperature: Some(0.8),
            request_timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(60),
            history_entries: 20,
        }
    }
}

impl GeneratorConfig {
    /// Defaults overlaid with `TALEFORGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values found by `lookup` on top of `self`.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("TALEFORGE_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = Some(model.trim().to_string());
        }
        if let Some(tokens) = parse(&lookup, "TALEFORGE_MAX_TOKENS")? {
            self.world_max_tokens = tokens;
        }
        if let Some(tokens) = parse(&lookup, "TALEFORGE_TURN_MAX_TOKENS")? {
            self.turn_max_tokens = tokens;
        }
        if let Some(temperature) = parse(&lookup, "TALEFORGE_TEMPERATURE")? {
            self.world_temperature = Some(temperature);
        }
        if let Some(temperature) = parse(&lookup, "TALEFORGE_TURN_TEMPERATURE")? {
            self.turn_temperature = Some(temperature);
        }
        if let Some(secs) = parse(&lookup, "TALEFORGE_TIMEOUT_SECS")? {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "TALEFORGE_STREAM_IDLE_SECS")? {
            self.stream_idle_timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_world_temperature(mut self, temperature: f32) -> Self {
        self.world_temperature = Some(temperature);
        self
    }

    pub fn with_turn_temperature(mut self, temperature: f32) -> Self {
        self.turn_temperature = Some(temperature);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn with_history_entries(mut self, entries: usize) -> Self {
        self.history_entries = entries;
        self
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(60));
        assert!(config.model.is_none());
    }

    #[test]
    fn test_overlay_values() {
        let config = GeneratorConfig::default()
            .overlay(lookup(&[
                ("TALEFORGE_MODEL", "claude-test"),
                ("TALEFORGE_TURN_MAX_TOKENS", " 2048 "),
                ("TALEFORGE_TEMPERATURE", "0.5"),
                ("TALEFORGE_STREAM_IDLE_SECS", "15"),
            ]))
            .unwrap();

        assert_eq!(config.model.as_deref(), Some("claude-test"));
        assert_eq!(config.turn_max_tokens, 2048);
        assert_eq!(config.world_max_tokens, 8192);
        assert_eq!(config.world_temperature, Some(0.5));
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overlay_rejects_malformed() {
        let err = GeneratorConfig::default()
            .overlay(lookup(&[("TALEFORGE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(err.key, "TALEFORGE_TIMEOUT_SECS");
        assert_eq!(err.value, "soon");
    }
}
