use crate::deadline::parse_timeout;
use crate::error::CommitSearchError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_with::DurationMilliSeconds;
use serde_with::serde_as;
use shardscan_protocol::CommitSearchQuery;
use std::time::Duration;

/// Configuration for commit and diff search fan-out.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitSearchConfig {
    /// Request timeout used when the query does not set `timeout:`
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "default_timeout_ms", default = "default_timeout")]
    pub default_timeout: Duration,

    /// Ceiling for any request timeout, requested or implied
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_timeout_ms", default = "default_max_timeout")]
    pub max_timeout: Duration,

    /// Budget for a single shard, independent of the request clock
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "shard_timeout_ms", default)]
    pub shard_timeout: Option<Duration>,

    /// Result cap when the query sets neither `count:` nor pagination
    #[serde(default = "default_result_count")]
    pub default_result_count: usize,

    /// Hard cap on any requested result count
    #[serde(default = "default_max_result_count")]
    pub max_result_count: usize,

    /// Shards allowed for a search without `before:`/`after:`
    #[serde(default = "default_max_repos_without_time_bound")]
    pub max_repos_without_time_bound: usize,

    /// Capacity of the worker → merge loop and merge loop → caller channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Matches a worker accumulates before forwarding a batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_max_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_result_count() -> usize {
    50
}

fn default_max_result_count() -> usize {
    5_000
}

fn default_max_repos_without_time_bound() -> usize {
    50
}

fn default_channel_capacity() -> usize {
    64
}

fn default_batch_size() -> usize {
    16
}

impl Default for CommitSearchConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            max_timeout: default_max_timeout(),
            shard_timeout: None,
            default_result_count: default_result_count(),
            max_result_count: default_max_result_count(),
            max_repos_without_time_bound: default_max_repos_without_time_bound(),
            channel_capacity: default_channel_capacity(),
            batch_size: default_batch_size(),
        }
    }
}

impl CommitSearchConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| CommitSearchError::Config(err.to_string()))?;
        config.validate().map_err(CommitSearchError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.default_timeout.is_zero() {
            return Err("default_timeout_ms must be > 0".to_string());
        }

        if self.max_timeout < self.default_timeout {
            return Err(format!(
                "max_timeout_ms ({}) cannot be below default_timeout_ms ({})",
                self.max_timeout.as_millis(),
                self.default_timeout.as_millis()
            ));
        }

        if self.shard_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err("shard_timeout_ms must be > 0 when set".to_string());
        }

        if self.default_result_count == 0 {
            return Err("default_result_count must be > 0".to_string());
        }

        if self.default_result_count > self.max_result_count {
            return Err(format!(
                "default_result_count ({}) cannot exceed max_result_count ({})",
                self.default_result_count, self.max_result_count
            ));
        }

        if self.channel_capacity == 0 {
            return Err("channel_capacity must be > 0".to_string());
        }

        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }

        Ok(())
    }

    /// Request timeout for `query`: an explicit `timeout:` wins, `count:`
    /// without `timeout:` gets the ceiling, everything is clamped to
    /// `max_timeout`.
    pub fn request_timeout(&self, query: &CommitSearchQuery) -> Result<Duration> {
        let requested = match query.timeout.as_deref() {
            Some(raw) => parse_timeout(raw)?,
            None if query.count.is_some() => self.max_timeout,
            None => self.default_timeout,
        };
        Ok(requested.min(self.max_timeout))
    }

    pub fn result_limit(&self, query: &CommitSearchQuery) -> usize {
        query
            .result_limit(self.default_result_count)
            .min(self.max_result_count)
    }
}
