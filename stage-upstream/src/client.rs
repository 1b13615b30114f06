//! TCP client side of the upstream session.

// Layer 1: Standard library imports
use std::fmt::Display;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

// Layer 3: Internal module imports
use crate::protocol::codec::{self, WireStream};
use crate::protocol::wire::{Call, Op, Reply};
use stage_rt::{Identity, Message, Upstream, UpstreamError};

/// [`Upstream`] implementation over one TCP session to a relay.
///
/// Calls are strictly request/response, one in flight at a time; the session
/// is re-dialled lazily after a transport failure, leaving retry pacing to
/// the stage's pumps.
pub struct TcpUpstream {
    stage_id: String,
    addr: String,
    conn: Mutex<Option<WireStream>>,
}

impl TcpUpstream {
    /// Dial `addr` and open a session routing as `stage_id`.
    pub async fn connect(stage_id: impl Into<String>, addr: &str) -> Result<Self, UpstreamError> {
        let stage_id = stage_id.into();
        if stage_id.is_empty() {
            return Err(UpstreamError::MissingStageId);
        }
        let stream = TcpStream::connect(addr).await.map_err(rpc_err)?;
        Ok(Self {
            stage_id,
            addr: addr.to_string(),
            conn: Mutex::new(Some(codec::framed(stream))),
        })
    }

    async fn call(&self, op: Op) -> Result<Reply, UpstreamError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            let stream = TcpStream::connect(self.addr.as_str())
                .await
                .map_err(rpc_err)?;
            *guard = Some(codec::framed(stream));
            debug!(addr = %self.addr, "upstream session re-established");
        }
        let Some(framed) = guard.as_mut() else {
            return Err(UpstreamError::Closed);
        };

        let frame = codec::encode(&Call {
            stage_id: self.stage_id.clone(),
            op,
        })
        .map_err(rpc_err)?;
        if let Err(err) = framed.send(frame).await {
            *guard = None;
            return Err(rpc_err(err));
        }
        match framed.next().await {
            None => {
                *guard = None;
                Err(UpstreamError::Closed)
            }
            Some(Err(err)) => {
                *guard = None;
                Err(rpc_err(err))
            }
            Some(Ok(frame)) => match codec::decode::<Reply>(&frame).map_err(rpc_err)? {
                Reply::Error { message } => Err(UpstreamError::Rpc(message)),
                reply => Ok(reply),
            },
        }
    }
}

#[async_trait]
impl Upstream for TcpUpstream {
    fn id(&self) -> &str {
        &self.stage_id
    }

    async fn register_pids(&self, pids: &[Identity]) -> Result<(), UpstreamError> {
        let pids = pids.iter().map(|pid| pid.pid().to_string()).collect();
        match self.call(Op::RegisterPids { pids }).await? {
            Reply::Registered => Ok(()),
            reply => Err(unexpected(&reply)),
        }
    }

    async fn proxy(&self, messages: Vec<Message>) -> Result<u32, UpstreamError> {
        match self.call(Op::Proxy { messages }).await? {
            Reply::Proxied { total } => Ok(total),
            reply => Err(unexpected(&reply)),
        }
    }

    async fn fetch(&self, max: u32) -> Result<Vec<Message>, UpstreamError> {
        match self.call(Op::Fetch { max_size: max }).await? {
            Reply::Batch { messages } => Ok(messages),
            reply => Err(unexpected(&reply)),
        }
    }

    async fn close(&self) -> Result<(), UpstreamError> {
        self.conn.lock().await.take();
        Ok(())
    }
}

fn rpc_err(err: impl Display) -> UpstreamError {
    UpstreamError::Rpc(err.to_string())
}

fn unexpected(reply: &Reply) -> UpstreamError {
    UpstreamError::Rpc(format!("unexpected reply: {reply:?}"))
}
