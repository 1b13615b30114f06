// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::util::Identity;

/// One message in flight between two actors.
///
/// The payload is an opaque byte string; by convention handlers decode it as
/// JSON, but nothing in the routing or transport layers looks inside it.
/// Messages are immutable once enqueued: every layer moves or clones them,
/// none rewrites them.
///
/// The same value crosses the upstream wire unchanged, which is why the
/// serde derives live here rather than in the transport crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender identity; replies go back here.
    pub from: Identity,
    /// Destination identity.
    pub to: Identity,
    /// Operation name resolved by the destination's dispatcher.
    pub method: String,
    /// Opaque payload bytes (JSON by convention).
    pub content: Vec<u8>,
}

impl Message {
    /// Assemble a message.
    pub fn new(
        from: Identity,
        to: Identity,
        method: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            from,
            to,
            method: method.into(),
            content,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn survives_a_serde_round_trip() {
        let msg = Message::new(
            Identity::new("s1.a.1"),
            Identity::new("s2.a.9"),
            "Ping",
            br#"{"n":42}"#.to_vec(),
        );
        let json = serde_json::to_vec(&msg).unwrap();
        let back: Message = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, msg);
    }
}
