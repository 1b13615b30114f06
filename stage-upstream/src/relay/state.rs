//! Relay routing state: pid-to-stage map and per-stage inbound buffers.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::trace;

// Layer 3: Internal module imports
use crate::protocol::wire::{Call, Op, Reply};
use stage_rt::{DropPolicy, LeakyBuffer, Message};

/// Default capacity of each stage's inbound buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

/// Server-side cap on one fetch batch
pub const DEFAULT_FETCH_CAP: u32 = 500;

/// Relay configuration.
///
/// # Examples
///
/// ```rust
/// use stage_upstream::RelayConfig;
///
/// let config = RelayConfig::default();
/// assert_eq!(config.fetch_cap, 500);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Capacity of each stage's inbound buffer; overflow drops oldest.
    pub buffer_capacity: usize,

    /// Server-side cap on one fetch batch (client requests above it are
    /// clamped, a request of 0 means "use the cap").
    pub fetch_cap: u32,

    /// Garbage-collect buffers idle longer than this. Off when `None`.
    pub idle_ttl: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            fetch_cap: DEFAULT_FETCH_CAP,
            idle_ttl: None,
        }
    }
}

impl RelayConfig {
    /// Create a configuration builder.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_capacity == 0 {
            return Err("buffer_capacity must be > 0".to_string());
        }
        if self.fetch_cap == 0 {
            return Err("fetch_cap must be > 0".to_string());
        }
        if let Some(ttl) = self.idle_ttl {
            if ttl.is_zero() {
                return Err("idle_ttl must be > 0 when set".to_string());
            }
        }
        Ok(())
    }
}

/// Builder for [`RelayConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Set the capacity of each stage's inbound buffer.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Set the server-side cap on one fetch batch.
    pub fn with_fetch_cap(mut self, cap: u32) -> Self {
        self.config.fetch_cap = cap;
        self
    }

    /// Garbage-collect buffers idle longer than `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.config.idle_ttl = Some(ttl);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<RelayConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

struct StageBuffer {
    queue: LeakyBuffer<Message>,
    last_active: DateTime<Utc>,
}

impl StageBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            queue: LeakyBuffer::new(capacity, DropPolicy::Oldest),
            last_active: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

#[derive(Default)]
struct RelayState {
    /// pid → owning stage-id; re-registration overwrites.
    routes: HashMap<String, String>,
    /// stage-id → inbound buffer; present only for active stages.
    buffers: HashMap<String, StageBuffer>,
}

/// The relay's shared state. Cheap to clone.
///
/// A stage becomes *active* on its first register or fetch; messages for a
/// stage with no active buffer are dropped and counted. All state lives
/// under one mutex, held only for the map work itself.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    config: RelayConfig,
    state: Mutex<RelayState>,
    dropped: AtomicU64,
}

impl Relay {
    /// Fresh relay with no active stages.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                config,
                state: Mutex::new(RelayState::default()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// The configuration the relay was opened with.
    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Dispatch one decoded call to the matching operation.
    pub fn handle(&self, call: Call) -> Reply {
        if call.stage_id.is_empty() {
            return Reply::Error {
                message: "call is missing a stage id".to_string(),
            };
        }
        match call.op {
            Op::RegisterPids { pids } => {
                self.register_pids(&call.stage_id, pids);
                Reply::Registered
            }
            Op::Proxy { messages } => Reply::Proxied {
                total: self.proxy(messages),
            },
            Op::Fetch { max_size } => Reply::Batch {
                messages: self.fetch(&call.stage_id, max_size),
            },
        }
    }

    /// Bind each pid to `stage_id`, activating the stage.
    ///
    /// A pid already bound elsewhere moves: last writer wins. Re-binding a
    /// pid to the same stage is a no-op.
    pub fn register_pids(&self, stage_id: &str, pids: Vec<String>) {
        let mut state = self.inner.state.lock();
        state
            .buffers
            .entry(stage_id.to_string())
            .or_insert_with(|| StageBuffer::new(self.inner.config.buffer_capacity))
            .touch();
        for pid in pids {
            state.routes.insert(pid, stage_id.to_string());
        }
    }

    /// Enqueue each message into its destination stage's buffer.
    ///
    /// Returns the accepted count; unmapped or inactive destinations are
    /// dropped silently and counted.
    pub fn proxy(&self, messages: Vec<Message>) -> u32 {
        let mut state = self.inner.state.lock();
        let mut total = 0u32;
        for msg in messages {
            let Some(stage_id) = state.routes.get(msg.to.pid()).cloned() else {
                trace!(to = %msg.to, "unmapped pid; message dropped");
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let Some(buffer) = state.buffers.get_mut(&stage_id) else {
                trace!(to = %msg.to, stage = %stage_id, "inactive stage; message dropped");
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            if buffer.queue.push(msg).is_some() {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            buffer.touch();
            total += 1;
        }
        total
    }

    /// Drain up to `max_size` messages for `stage_id`, activating it.
    ///
    /// An unknown stage yields an empty batch, never an error.
    pub fn fetch(&self, stage_id: &str, max_size: u32) -> Vec<Message> {
        let cap = self.inner.config.fetch_cap;
        let max = if max_size == 0 || max_size > cap {
            cap
        } else {
            max_size
        } as usize;

        let mut state = self.inner.state.lock();
        let buffer = state
            .buffers
            .entry(stage_id.to_string())
            .or_insert_with(|| StageBuffer::new(self.inner.config.buffer_capacity));
        buffer.touch();

        let mut batch = Vec::new();
        while batch.len() < max {
            match buffer.queue.pop() {
                Some(msg) => batch.push(msg),
                None => break,
            }
        }
        batch
    }

    /// Remove buffers (and their routes) idle longer than `quiet`.
    ///
    /// Returns the number of stages swept.
    pub fn sweep_idle(&self, quiet: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(quiet).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut state = self.inner.state.lock();
        let idle: Vec<String> = state
            .buffers
            .iter()
            .filter(|(_, buffer)| now.signed_duration_since(buffer.last_active) > cutoff)
            .map(|(stage_id, _)| stage_id.clone())
            .collect();
        for stage_id in &idle {
            state.buffers.remove(stage_id);
        }
        if !idle.is_empty() {
            state.routes.retain(|_, stage_id| !idle.contains(stage_id));
        }
        idle.len()
    }

    /// Messages dropped so far (unmapped, inactive, or overflowed).
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Number of stages with an active buffer.
    pub fn active_stages(&self) -> usize {
        self.inner.state.lock().buffers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use stage_rt::Identity;

    fn msg(to: &str, n: u64) -> Message {
        Message::new(
            Identity::new("src.a.1"),
            Identity::new(to),
            "Tick",
            n.to_string().into_bytes(),
        )
    }

    #[test]
    fn register_then_proxy_then_fetch() {
        let relay = Relay::new(RelayConfig::default());
        relay.register_pids("st1", vec!["st1.a.1".to_string()]);

        assert_eq!(relay.proxy(vec![msg("st1.a.1", 1)]), 1);
        let batch = relay.fetch("st1", 0);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].to.pid(), "st1.a.1");
    }

    #[test]
    fn unmapped_pid_is_dropped_and_counted() {
        let relay = Relay::new(RelayConfig::default());
        assert_eq!(relay.proxy(vec![msg("ghost.a.1", 1)]), 0);
        assert_eq!(relay.dropped(), 1);
    }

    #[test]
    fn reregistration_overwrites_routing() {
        let relay = Relay::new(RelayConfig::default());
        relay.register_pids("st1", vec!["shared.pid".to_string()]);
        relay.register_pids("st2", vec!["shared.pid".to_string()]);

        assert_eq!(relay.proxy(vec![msg("shared.pid", 1)]), 1);
        assert!(relay.fetch("st1", 0).is_empty());
        assert_eq!(relay.fetch("st2", 0).len(), 1);
    }

    #[test]
    fn fetch_activates_an_unknown_stage() {
        let relay = Relay::new(RelayConfig::default());
        assert!(relay.fetch("newcomer", 0).is_empty());
        assert_eq!(relay.active_stages(), 1);
    }

    #[test]
    fn fetch_is_capped_by_the_server() {
        let config = RelayConfig::builder().with_fetch_cap(2).build().unwrap();
        let relay = Relay::new(config);
        relay.register_pids("st1", vec!["st1.a.1".to_string()]);
        assert_eq!(relay.proxy((0..5).map(|n| msg("st1.a.1", n)).collect()), 5);

        assert_eq!(relay.fetch("st1", 0).len(), 2);
        assert_eq!(relay.fetch("st1", 100).len(), 2);
        assert_eq!(relay.fetch("st1", 100).len(), 1);
    }

    #[test]
    fn buffer_overflow_drops_oldest() {
        let config = RelayConfig::builder().with_buffer_capacity(2).build().unwrap();
        let relay = Relay::new(config);
        relay.register_pids("st1", vec!["st1.a.1".to_string()]);

        assert_eq!(relay.proxy((0..4).map(|n| msg("st1.a.1", n)).collect()), 4);
        assert_eq!(relay.dropped(), 2);

        let batch = relay.fetch("st1", 0);
        let contents: Vec<String> = batch
            .iter()
            .map(|m| String::from_utf8_lossy(&m.content).to_string())
            .collect();
        assert_eq!(contents, vec!["2", "3"]);
    }

    #[test]
    fn proxy_batch_order_is_preserved() {
        let relay = Relay::new(RelayConfig::default());
        relay.register_pids("st1", vec!["st1.a.1".to_string()]);
        relay.proxy((0..10).map(|n| msg("st1.a.1", n)).collect());

        let batch = relay.fetch("st1", 0);
        let contents: Vec<String> = batch
            .iter()
            .map(|m| String::from_utf8_lossy(&m.content).to_string())
            .collect();
        let expected: Vec<String> = (0..10).map(|n| n.to_string()).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn missing_stage_id_is_rejected() {
        let relay = Relay::new(RelayConfig::default());
        let reply = relay.handle(Call {
            stage_id: String::new(),
            op: Op::Fetch { max_size: 0 },
        });
        assert!(matches!(reply, Reply::Error { .. }));
    }

    #[test]
    fn idle_stages_are_swept_with_their_routes() {
        let relay = Relay::new(RelayConfig::default());
        relay.register_pids("st1", vec!["st1.a.1".to_string()]);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(relay.sweep_idle(Duration::from_millis(10)), 1);
        assert_eq!(relay.active_stages(), 0);
        // The route went with the buffer: proxying now drops.
        assert_eq!(relay.proxy(vec![msg("st1.a.1", 1)]), 0);
    }

    #[test]
    fn config_defaults_and_validation() {
        let config = RelayConfig::default();
        assert_eq!(config.buffer_capacity, 500);
        assert_eq!(config.fetch_cap, 500);
        assert!(config.idle_ttl.is_none());
        assert!(config.validate().is_ok());

        assert!(RelayConfig::builder().with_buffer_capacity(0).build().is_err());
        assert!(RelayConfig::builder().with_fetch_cap(0).build().is_err());
        assert!(RelayConfig::builder()
            .with_idle_ttl(Duration::ZERO)
            .build()
            .is_err());
    }
}
