use crate::error::Result;
use crate::error::SuggestError;
use crate::producers::ProducerKind;
use serde::Deserialize;
use serde::Serialize;
use serde_with::DurationMilliSeconds;
use serde_with::serde_as;
use std::time::Duration;

/// Timeouts and size limits for the suggestion aggregator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestConfig {
    /// Ceiling for the whole request; no producer runs longer than this
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "overall_timeout_ms", default = "default_overall_timeout")]
    pub overall_timeout: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "repository_timeout_ms", default = "default_producer_timeout")]
    pub repository_timeout: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "path_timeout_ms", default = "default_producer_timeout")]
    pub path_timeout: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "language_timeout_ms", default = "default_producer_timeout")]
    pub language_timeout: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "symbol_timeout_ms", default = "default_producer_timeout")]
    pub symbol_timeout: Duration,

    /// Full-text search is the most expensive producer and gets the tightest budget
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "text_timeout_ms", default = "default_text_timeout")]
    pub text_timeout: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "saved_context_timeout_ms", default = "default_producer_timeout")]
    pub saved_context_timeout: Duration,

    /// Suggestions returned when the caller does not ask for a count
    #[serde(default = "default_count")]
    pub default_count: usize,

    /// Upper bound on any requested count
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

fn default_overall_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_producer_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_text_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_count() -> usize {
    10
}

fn default_max_count() -> usize {
    100
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            overall_timeout: default_overall_timeout(),
            repository_timeout: default_producer_timeout(),
            path_timeout: default_producer_timeout(),
            language_timeout: default_producer_timeout(),
            symbol_timeout: default_producer_timeout(),
            text_timeout: default_text_timeout(),
            saved_context_timeout: default_producer_timeout(),
            default_count: default_count(),
            max_count: default_max_count(),
        }
    }
}

impl SuggestConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| SuggestError::Config(err.to_string()))?;
        config.validate().map_err(SuggestError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.overall_timeout.is_zero() {
            return Err("overall_timeout_ms must be > 0".to_string());
        }

        for kind in ProducerKind::ALL {
            if self.producer_timeout(kind).is_zero() {
                return Err(format!("{kind}_timeout_ms must be > 0"));
            }
        }

        if self.default_count == 0 {
            return Err("default_count must be > 0".to_string());
        }

        if self.default_count > self.max_count {
            return Err(format!(
                "default_count ({}) cannot exceed max_count ({})",
                self.default_count, self.max_count
            ));
        }

        Ok(())
    }

    /// Configured budget of one producer, without the overall ceiling.
    pub fn producer_timeout(&self, kind: ProducerKind) -> Duration {
        match kind {
            ProducerKind::Repository => self.repository_timeout,
            ProducerKind::Path => self.path_timeout,
            ProducerKind::Language => self.language_timeout,
            ProducerKind::Symbol => self.symbol_timeout,
            ProducerKind::Text => self.text_timeout,
            ProducerKind::SavedContext => self.saved_context_timeout,
        }
    }

    /// Budget a producer actually runs with. Producers start together, so
    /// capping each at the overall ceiling bounds the whole request.
    pub fn effective_timeout(&self, kind: ProducerKind) -> Duration {
        self.producer_timeout(kind).min(self.overall_timeout)
    }

    pub fn result_count(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_count).min(self.max_count)
    }
}
