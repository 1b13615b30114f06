//! Accept loop and per-session frame handling.

// Layer 1: Standard library imports
use std::io;
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// Layer 3: Internal module imports
use super::state::Relay;
use crate::protocol::codec::{self, WireStream};
use crate::protocol::wire::{Call, Reply};

/// Bind `addr` and serve until the token fires.
pub async fn listen_and_serve(
    addr: &str,
    relay: Relay,
    cancel: CancellationToken,
) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, relay, cancel).await
}

/// Serve relay sessions on an already bound listener.
///
/// Each accepted connection gets its own task; cancelling the token stops
/// the accept loop and drains the sessions. When the relay is configured
/// with an idle TTL a sweeper task garbage-collects quiet stage buffers.
pub async fn serve(listener: TcpListener, relay: Relay, cancel: CancellationToken) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "upstream relay listening");
    }
    if let Some(quiet) = relay.config().idle_ttl {
        tokio::spawn(sweep_idle_buffers(relay.clone(), quiet, cancel.child_token()));
    }
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("upstream relay stopping");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                debug!(%peer, "stage session opened");
                tokio::spawn(serve_session(
                    codec::framed(socket),
                    relay.clone(),
                    cancel.child_token(),
                ));
            }
        }
    }
}

async fn serve_session(mut framed: WireStream, relay: Relay, cancel: CancellationToken) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            next = framed.next() => match next {
                None => return,
                Some(Err(err)) => {
                    debug!(error = %err, "session read failed");
                    return;
                }
                Some(Ok(frame)) => frame,
            },
        };

        let reply = match codec::decode::<Call>(&frame) {
            Ok(call) => relay.handle(call),
            Err(err) => Reply::Error {
                message: format!("malformed frame: {err}"),
            },
        };
        let encoded = match codec::encode(&reply) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "reply encoding failed");
                return;
            }
        };
        if let Err(err) = framed.send(encoded).await {
            debug!(error = %err, "session write failed");
            return;
        }
    }
}

async fn sweep_idle_buffers(relay: Relay, quiet: Duration, cancel: CancellationToken) {
    let interval = quiet.clamp(Duration::from_millis(100), Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(interval) => {
                let swept = relay.sweep_idle(quiet);
                if swept > 0 {
                    debug!(swept, "idle stage buffers garbage-collected");
                }
            }
        }
    }
}
