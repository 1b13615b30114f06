// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Opaque process identifier naming one message destination.
///
/// Equality is byte-equality of the pid text. The empty pid is the *zero
/// identity* and is reserved as "no destination"; every send operation
/// rejects it. Pids generated by a stage follow the grammar
/// `<stage-id>.<kind>.<counter>`, but the prefix is advisory only: routing
/// never parses it.
///
/// # Example
/// ```rust
/// use stage_rt::util::Identity;
///
/// let pid = Identity::new("s1.a.1");
/// assert!(!pid.is_zero());
/// assert_eq!(pid.to_string(), "s1.a.1");
/// assert!(Identity::default().is_zero());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

/// Kind tag embedded in generated pids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidKind {
    /// A spawned actor cell (`a`).
    Actor,
    /// A one-shot reply route allocated by a request (`r`).
    Reply,
}

impl PidKind {
    /// The single-letter tag used inside generated pids.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Actor => "a",
            Self::Reply => "r",
        }
    }
}

impl Identity {
    /// Wrap an existing pid string.
    pub fn new(pid: impl Into<String>) -> Self {
        Self(pid.into())
    }

    /// Build a generated pid: `<stage-id>.<kind>.<counter>`.
    pub fn scoped(stage_id: &str, kind: PidKind, counter: u64) -> Self {
        Self(format!("{stage_id}.{}.{counter}", kind.tag()))
    }

    /// The discard identity of a stage: `<stage-id>.discard`.
    ///
    /// Messages sent to it are swallowed silently.
    pub fn discard(stage_id: &str) -> Self {
        Self(format!("{stage_id}.discard"))
    }

    /// The raw pid text.
    pub fn pid(&self) -> &str {
        &self.0
    }

    /// True for the reserved empty identity.
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(pid: &str) -> Self {
        Self(pid.to_string())
    }
}

impl From<String> for Identity {
    fn from(pid: String) -> Self {
        Self(pid)
    }
}
