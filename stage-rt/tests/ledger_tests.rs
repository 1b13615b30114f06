//! The unreliable-bank fixture: a ledger coordinating account actors,
//! exercised on one stage and across two stages joined by a point-to-point
//! pipe upstream.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};

use stage_rt::{
    Actor, DispatchError, HandlerFuture, Identity, Media, Message, MethodTable, Stage,
    StageConfig, Upstream, UpstreamError,
};

// ============================================================================
// Wire values shared by the bank actors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct Transfer {
    from: String,
    to: String,
    seq: i64,
    total: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Balance {
    current: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountInfo {
    name: String,
    pid: Identity,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScheduleStatus {
    valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerStats {
    total: u64,
    pending: u64,
}

// ============================================================================
// Account actor
// ============================================================================

#[derive(Default)]
struct Account {
    balance: i64,
    seen: HashSet<Transfer>,
}

fn debit<'a>(a: &'a mut Account, from: Identity, t: Transfer, media: &'a Media) -> HandlerFuture<'a> {
    Box::pin(async move {
        // Transfers dedup by value; re-delivery must not double-apply.
        if a.seen.insert(t.clone()) {
            a.balance -= t.total;
        }
        media.send(&from, "ConfirmDebit", &t).await?;
        Ok(())
    })
}

fn credit<'a>(a: &'a mut Account, from: Identity, t: Transfer, media: &'a Media) -> HandlerFuture<'a> {
    Box::pin(async move {
        if a.seen.insert(t.clone()) {
            a.balance += t.total;
        }
        media.send(&from, "ConfirmCredit", &t).await?;
        Ok(())
    })
}

fn get_balance<'a>(
    a: &'a mut Account,
    from: Identity,
    _req: (),
    media: &'a Media,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        media
            .send(&from, "Reply", &Balance { current: a.balance })
            .await?;
        Ok(())
    })
}

static ACCOUNT_ROUTES: LazyLock<MethodTable<Account>> = LazyLock::new(|| {
    MethodTable::new()
        .operation("Debit", debit)
        .operation("Credit", credit)
        .operation("GetBalance", get_balance)
});

#[async_trait]
impl Actor for Account {
    async fn dispatch(&mut self, msg: &Message, media: &Media) -> Result<(), DispatchError> {
        ACCOUNT_ROUTES.dispatch(self, msg, media).await
    }
}

// ============================================================================
// Ledger actor
// ============================================================================

#[derive(Default)]
struct Ledger {
    accounts: HashMap<String, Identity>,
    transfers: Vec<Transfer>,
    pending_debits: HashSet<Transfer>,
    pending_credits: HashSet<Transfer>,
}

fn register_account<'a>(
    l: &'a mut Ledger,
    _from: Identity,
    info: AccountInfo,
    _media: &'a Media,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        l.accounts.insert(info.name, info.pid);
        Ok(())
    })
}

fn schedule<'a>(l: &'a mut Ledger, from: Identity, t: Transfer, media: &'a Media) -> HandlerFuture<'a> {
    Box::pin(async move {
        if l.transfers.contains(&t) {
            // Duplicate schedule of a known transfer is a no-op.
            media
                .send(&from, "Reply", &ScheduleStatus { valid: true })
                .await?;
            return Ok(());
        }
        let debitor = match (
            l.accounts.contains_key(&t.to),
            l.accounts.get(&t.from).cloned(),
        ) {
            (true, Some(debitor)) => debitor,
            _ => {
                media
                    .send(&from, "Reply", &ScheduleStatus { valid: false })
                    .await?;
                return Ok(());
            }
        };
        l.transfers.push(t.clone());
        l.pending_debits.insert(t.clone());
        media.send(&debitor, "Debit", &t).await?;
        media
            .send(&from, "Reply", &ScheduleStatus { valid: true })
            .await?;
        Ok(())
    })
}

fn confirm_debit<'a>(
    l: &'a mut Ledger,
    _from: Identity,
    t: Transfer,
    media: &'a Media,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        if !l.pending_debits.remove(&t) {
            return Ok(());
        }
        l.pending_credits.insert(t.clone());
        let creditor = l.accounts.get(&t.to).cloned();
        if let Some(creditor) = creditor {
            media.send(&creditor, "Credit", &t).await?;
        }
        Ok(())
    })
}

fn confirm_credit<'a>(
    l: &'a mut Ledger,
    _from: Identity,
    t: Transfer,
    _media: &'a Media,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        l.pending_credits.remove(&t);
        Ok(())
    })
}

fn num_pending<'a>(l: &'a mut Ledger, from: Identity, _req: (), media: &'a Media) -> HandlerFuture<'a> {
    Box::pin(async move {
        let stats = LedgerStats {
            total: l.transfers.len() as u64,
            pending: (l.pending_debits.len() + l.pending_credits.len()) as u64,
        };
        media.send(&from, "Reply", &stats).await?;
        Ok(())
    })
}

static LEDGER_ROUTES: LazyLock<MethodTable<Ledger>> = LazyLock::new(|| {
    MethodTable::new()
        .operation("RegisterAccount", register_account)
        .operation("Schedule", schedule)
        .operation("ConfirmDebit", confirm_debit)
        .operation("ConfirmCredit", confirm_credit)
        .operation("NumPendingTransaction", num_pending)
});

#[async_trait]
impl Actor for Ledger {
    async fn dispatch(&mut self, msg: &Message, media: &Media) -> Result<(), DispatchError> {
        LEDGER_ROUTES.dispatch(self, msg, media).await
    }
}

// ============================================================================
// Point-to-point pipe upstream: every remote message from one side is
// delivered to the other, no relay involved.
// ============================================================================

#[derive(Default)]
struct PipeState {
    to_left: VecDeque<Message>,
    to_right: VecDeque<Message>,
}

struct PipeUpstream {
    id: String,
    is_left: bool,
    state: Arc<Mutex<PipeState>>,
}

fn pipe(left: &str, right: &str) -> (Arc<PipeUpstream>, Arc<PipeUpstream>) {
    let state = Arc::new(Mutex::new(PipeState::default()));
    (
        Arc::new(PipeUpstream {
            id: left.to_string(),
            is_left: true,
            state: Arc::clone(&state),
        }),
        Arc::new(PipeUpstream {
            id: right.to_string(),
            is_left: false,
            state,
        }),
    )
}

#[async_trait]
impl Upstream for PipeUpstream {
    fn id(&self) -> &str {
        &self.id
    }

    async fn register_pids(&self, _pids: &[Identity]) -> Result<(), UpstreamError> {
        Ok(())
    }

    async fn proxy(&self, messages: Vec<Message>) -> Result<u32, UpstreamError> {
        let mut state = self.state.lock();
        let buf = if self.is_left {
            &mut state.to_right
        } else {
            &mut state.to_left
        };
        let accepted = messages.len() as u32;
        buf.extend(messages);
        Ok(accepted)
    }

    async fn fetch(&self, max: u32) -> Result<Vec<Message>, UpstreamError> {
        let mut state = self.state.lock();
        let buf = if self.is_left {
            &mut state.to_left
        } else {
            &mut state.to_right
        };
        let max = if max == 0 { 500 } else { max } as usize;
        let mut batch = Vec::new();
        while batch.len() < max {
            match buf.pop_front() {
                Some(msg) => batch.push(msg),
                None => break,
            }
        }
        Ok(batch)
    }

    async fn close(&self) -> Result<(), UpstreamError> {
        Ok(())
    }
}

/// Replies to `Ping` with the pid it saw as sender.
struct Responder;

#[async_trait]
impl Actor for Responder {
    async fn dispatch(&mut self, msg: &Message, media: &Media) -> Result<(), DispatchError> {
        match msg.method.as_str() {
            "Ping" => {
                media
                    .send(&msg.from, "Reply", &json!({"sender": msg.from.pid()}))
                    .await?;
                Ok(())
            }
            other => Err(DispatchError::MethodNotFound(other.to_string())),
        }
    }
}

fn federated_config() -> StageConfig {
    // Tight poll interval keeps the cross-stage tests snappy.
    StageConfig::builder()
        .with_fetch_backoff(Duration::from_millis(10))
        .build()
        .unwrap()
}

// ============================================================================
// Single-stage scenarios
// ============================================================================

#[tokio::test]
async fn simple_transaction_credits_the_account() {
    let stage = Stage::new(StageConfig::default());
    let bob = stage.spawn(Account::default()).await.unwrap();

    stage
        .inject(
            &bob,
            "Credit",
            &Transfer {
                from: String::new(),
                to: String::new(),
                seq: 0,
                total: 10,
            },
        )
        .await
        .unwrap();

    let balance: Balance = stage
        .request(Duration::from_secs(1), &bob, "GetBalance", &())
        .await
        .unwrap();
    assert_eq!(balance.current, 10);

    stage.close().await.unwrap();
}

#[tokio::test]
async fn ledger_transfer_settles() {
    let stage = Stage::new(StageConfig::default());
    let alice = stage.spawn(Account::default()).await.unwrap();
    let bob = stage.spawn(Account::default()).await.unwrap();
    let ledger = stage.spawn(Ledger::default()).await.unwrap();

    stage
        .inject(
            &ledger,
            "RegisterAccount",
            &AccountInfo {
                name: "alice".to_string(),
                pid: alice.clone(),
            },
        )
        .await
        .unwrap();
    stage
        .inject(
            &ledger,
            "RegisterAccount",
            &AccountInfo {
                name: "bob".to_string(),
                pid: bob.clone(),
            },
        )
        .await
        .unwrap();
    stage
        .inject(
            &ledger,
            "Schedule",
            &Transfer {
                from: "alice".to_string(),
                to: "bob".to_string(),
                seq: 1,
                total: 10,
            },
        )
        .await
        .unwrap();

    timeout(Duration::from_secs(5), async {
        loop {
            let stats: LedgerStats = stage
                .request(Duration::from_secs(1), &ledger, "NumPendingTransaction", &())
                .await
                .unwrap();
            if stats.total == 1 && stats.pending == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("transfer never settled");

    let bob_balance: Balance = stage
        .request(Duration::from_secs(1), &bob, "GetBalance", &())
        .await
        .unwrap();
    assert_eq!(bob_balance.current, 10);

    let alice_balance: Balance = stage
        .request(Duration::from_secs(1), &alice, "GetBalance", &())
        .await
        .unwrap();
    assert_eq!(alice_balance.current, -10);

    stage.close().await.unwrap();
}

// ============================================================================
// Cross-stage scenarios over the pipe upstream
// ============================================================================

#[tokio::test]
async fn remote_request_reaches_across_the_pipe() {
    let (left, right) = pipe("s1", "s2");
    let s1 = Stage::with_upstream(federated_config(), left);
    let s2 = Stage::with_upstream(federated_config(), right);

    let target = s1.spawn(Responder).await.unwrap();
    assert_eq!(target.pid(), "s1.a.1");

    let out: Value = s2
        .request(Duration::from_secs(1), &target, "Ping", &json!({}))
        .await
        .unwrap();
    let sender = out["sender"].as_str().unwrap();
    assert!(sender.starts_with("s2.r."), "sender was {sender}");

    s1.close().await.unwrap();
    s2.close().await.unwrap();
}

#[tokio::test]
async fn distributed_bank_settles_across_stages() {
    let (left, right) = pipe("n1", "n2");
    let s1 = Stage::with_upstream(federated_config(), left);
    let s2 = Stage::with_upstream(federated_config(), right);

    let alice = s1.spawn(Account::default()).await.unwrap();
    let ledger = s1.spawn(Ledger::default()).await.unwrap();
    let bob = s2.spawn(Account::default()).await.unwrap();

    // Register both accounts from the far side of the pipe.
    s2.inject(
        &ledger,
        "RegisterAccount",
        &AccountInfo {
            name: "alice".to_string(),
            pid: alice.clone(),
        },
    )
    .await
    .unwrap();
    s2.inject(
        &ledger,
        "RegisterAccount",
        &AccountInfo {
            name: "bob".to_string(),
            pid: bob.clone(),
        },
    )
    .await
    .unwrap();

    let transfer = Transfer {
        from: "alice".to_string(),
        to: "bob".to_string(),
        seq: 1,
        total: 10,
    };

    timeout(Duration::from_secs(10), async {
        // Registrations cross asynchronously; schedule until accepted.
        loop {
            let status: ScheduleStatus = s1
                .request(Duration::from_secs(1), &ledger, "Schedule", &transfer)
                .await
                .unwrap();
            if status.valid {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        // Debit/credit confirmations hop between stages; wait them out.
        loop {
            let stats: LedgerStats = s2
                .request(Duration::from_secs(1), &ledger, "NumPendingTransaction", &())
                .await
                .unwrap();
            if stats.total != 0 && stats.pending == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("distributed transfer never settled");

    let bob_balance: Balance = s2
        .request(Duration::from_secs(1), &bob, "GetBalance", &())
        .await
        .unwrap();
    assert_eq!(bob_balance.current, 10);

    s1.close().await.unwrap();
    s2.close().await.unwrap();
}
