//! Stage configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::mailbox::DropPolicy;

/// Default capacity of each cell's mailbox
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Default maximum batch drained per upstream fetch
pub const DEFAULT_FETCH_BATCH: u32 = 500;

/// Default backoff between empty or failed upstream polls
pub const DEFAULT_FETCH_BACKOFF: Duration = Duration::from_millis(500);

/// Default maximum messages folded into one proxy call
pub const DEFAULT_PROXY_BATCH: usize = 64;

/// Default capacity of the outbound queue in front of the upstream client
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Per-stage configuration.
///
/// # Examples
///
/// ```rust
/// use stage_rt::stage::StageConfig;
///
/// let config = StageConfig::default();
/// assert_eq!(config.mailbox_capacity, 1000);
///
/// let config = StageConfig::builder()
///     .with_stage_id("s1")
///     .with_mailbox_capacity(64)
///     .build()
///     .unwrap();
/// assert_eq!(config.stage_id.as_deref(), Some("s1"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage identifier used as the pid prefix. Generated when absent;
    /// overridden by the upstream session's id when one is configured.
    pub stage_id: Option<String>,

    /// Capacity of each cell's mailbox.
    pub mailbox_capacity: usize,

    /// Overflow policy applied by mailboxes.
    pub drop_policy: DropPolicy,

    /// Maximum batch requested per upstream fetch (server may cap lower).
    pub fetch_batch: u32,

    /// Backoff between empty or failed upstream polls.
    pub fetch_backoff: Duration,

    /// Maximum messages folded into one proxy call.
    pub proxy_batch: usize,

    /// Capacity of the outbound queue in front of the upstream client.
    pub outbound_capacity: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            stage_id: None,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            drop_policy: DropPolicy::default(),
            fetch_batch: DEFAULT_FETCH_BATCH,
            fetch_backoff: DEFAULT_FETCH_BACKOFF,
            proxy_batch: DEFAULT_PROXY_BATCH,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl StageConfig {
    /// Create a configuration builder.
    pub fn builder() -> StageConfigBuilder {
        StageConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = &self.stage_id {
            if id.is_empty() {
                return Err("stage_id must not be empty when set".to_string());
            }
        }
        if self.mailbox_capacity == 0 {
            return Err("mailbox_capacity must be > 0".to_string());
        }
        if self.fetch_batch == 0 {
            return Err("fetch_batch must be > 0".to_string());
        }
        if self.fetch_backoff.is_zero() {
            return Err("fetch_backoff must be > 0".to_string());
        }
        if self.proxy_batch == 0 {
            return Err("proxy_batch must be > 0".to_string());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

/// Builder for [`StageConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct StageConfigBuilder {
    config: StageConfig,
}

impl StageConfigBuilder {
    /// Set the stage identifier used as the pid prefix.
    pub fn with_stage_id(mut self, id: impl Into<String>) -> Self {
        self.config.stage_id = Some(id.into());
        self
    }

    /// Set the capacity of each cell's mailbox.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    /// Set the overflow policy applied by mailboxes.
    pub fn with_drop_policy(mut self, policy: DropPolicy) -> Self {
        self.config.drop_policy = policy;
        self
    }

    /// Set the maximum batch requested per upstream fetch.
    pub fn with_fetch_batch(mut self, batch: u32) -> Self {
        self.config.fetch_batch = batch;
        self
    }

    /// Set the backoff between empty or failed upstream polls.
    pub fn with_fetch_backoff(mut self, backoff: Duration) -> Self {
        self.config.fetch_backoff = backoff;
        self
    }

    /// Set the maximum messages folded into one proxy call.
    pub fn with_proxy_batch(mut self, batch: usize) -> Self {
        self.config.proxy_batch = batch;
        self
    }

    /// Set the capacity of the outbound queue.
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<StageConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
