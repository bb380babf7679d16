//! # velvet-txqueue
//!
//! The serialized administrative transaction queue. The admin signing
//! identity is the one genuinely shared mutable external resource in
//! the system; every write from that identity passes through this
//! queue, which owns it behind a single worker task.
//!
//! The ordering guarantee is the component's entire purpose: the
//! worker fetches the current nonce, submits, and waits for on-chain
//! confirmation before dequeuing the next operation, so concurrently
//! triggered operations never collide on transaction ordering. Failure
//! of one operation rejects only that operation's handle; the worker
//! proceeds to the next after a short inter-transaction delay.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration};
use velvet_types::{Address, TokenId, TxHash};

use velvet_chain::{wait_confirmed, AdminCall, ChainError, Confirmation, RewardsChain};

/// Gas estimate for registering one NFT for rewards.
const REGISTER_GAS: u64 = 180_000;
/// Gas estimate for an ownership update.
const UPDATE_OWNER_GAS: u64 = 90_000;
/// Base gas for a withdrawal transaction.
const WITHDRAW_BASE_GAS: u64 = 120_000;
/// Additional gas per token id included in a withdrawal.
const WITHDRAW_PER_TOKEN_GAS: u64 = 45_000;

/// An administrative operation to be submitted from the admin identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminOp {
    /// Register a freshly minted NFT with the reward pool.
    RegisterNft {
        token_id: TokenId,
        hostess_index: u8,
        owner: Address,
    },
    /// Propagate an ownership change to the reward pool.
    UpdateOwnership {
        token_id: TokenId,
        new_owner: Address,
    },
    /// Withdraw pending rewards for a set of tokens to their owner.
    WithdrawRewards {
        recipient: Address,
        token_ids: Vec<TokenId>,
    },
}

impl AdminOp {
    /// The node-side method the operation maps to.
    pub fn method(&self) -> &'static str {
        match self {
            AdminOp::RegisterNft { .. } => "rewards_registerNft",
            AdminOp::UpdateOwnership { .. } => "rewards_updateOwnership",
            AdminOp::WithdrawRewards { .. } => "rewards_withdraw",
        }
    }

    /// JSON parameters for submission.
    pub fn params(&self) -> serde_json::Value {
        match self {
            AdminOp::RegisterNft {
                token_id,
                hostess_index,
                owner,
            } => json!({
                "token_id": token_id,
                "hostess_index": hostess_index,
                "owner": owner,
            }),
            AdminOp::UpdateOwnership {
                token_id,
                new_owner,
            } => json!({
                "token_id": token_id,
                "new_owner": new_owner,
            }),
            AdminOp::WithdrawRewards {
                recipient,
                token_ids,
            } => json!({
                "recipient": recipient,
                "token_ids": token_ids,
            }),
        }
    }

    /// Caller-supplied gas estimate: base cost plus a per-item
    /// multiplier for batch operations.
    pub fn gas_limit(&self) -> u64 {
        match self {
            AdminOp::RegisterNft { .. } => REGISTER_GAS,
            AdminOp::UpdateOwnership { .. } => UPDATE_OWNER_GAS,
            AdminOp::WithdrawRewards { token_ids, .. } => {
                WITHDRAW_BASE_GAS + WITHDRAW_PER_TOKEN_GAS * token_ids.len() as u64
            }
        }
    }
}

/// Queue error types.
#[derive(Debug, thiserror::Error)]
pub enum TxQueueError {
    /// The admin signing identity is not configured. Every queued and
    /// future operation fails immediately with this error rather than
    /// hanging.
    #[error("admin signing identity not configured")]
    NotConfigured,

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// The worker stopped before the operation was processed.
    #[error("queue closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TxQueueError>;

/// A successfully submitted and confirmed operation.
#[derive(Clone, Debug)]
pub struct Submitted {
    pub tx_hash: TxHash,
    pub confirmation: Confirmation,
}

/// Queue timing configuration.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Pause between consecutive transactions to avoid RPC throttling.
    pub inter_tx_delay: Duration,
    /// Confirmation status poll interval.
    pub confirm_poll_interval: Duration,
    /// How long to wait for a confirmation before failing the op.
    pub confirm_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inter_tx_delay: Duration::from_secs(2),
            confirm_poll_interval: Duration::from_secs(3),
            confirm_timeout: Duration::from_secs(180),
        }
    }
}

struct Job {
    op: AdminOp,
    reply: oneshot::Sender<Result<Submitted>>,
}

/// One pending operation's result handle.
pub struct OpHandle {
    rx: oneshot::Receiver<Result<Submitted>>,
}

impl OpHandle {
    /// Wait for the operation to be submitted and confirmed (or fail).
    pub async fn wait(self) -> Result<Submitted> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(TxQueueError::Closed),
        }
    }
}

/// FIFO, single-worker queue for the administrative identity.
#[derive(Clone)]
pub struct AdminTxQueue {
    sender: mpsc::UnboundedSender<Job>,
    configured: bool,
}

impl AdminTxQueue {
    /// Create the queue and spawn its worker.
    ///
    /// `admin` is the administrative identity the node signs with;
    /// `None` means the identity is not configured and every operation
    /// is rejected immediately.
    pub fn new(
        chain: Arc<dyn RewardsChain>,
        admin: Option<Address>,
        config: QueueConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let configured = admin.is_some();
        if let Some(admin) = admin {
            tokio::spawn(worker(chain, admin, config, receiver));
        }
        Self { sender, configured }
    }

    /// Enqueue an operation. Operations are submitted strictly in
    /// enqueue order, one at a time.
    pub fn enqueue(&self, op: AdminOp) -> OpHandle {
        let (reply, rx) = oneshot::channel();
        if !self.configured {
            let _ = reply.send(Err(TxQueueError::NotConfigured));
            return OpHandle { rx };
        }
        let job = Job { op, reply };
        if let Err(e) = self.sender.send(job) {
            let _ = e.0.reply.send(Err(TxQueueError::Closed));
        }
        OpHandle { rx }
    }
}

async fn worker(
    chain: Arc<dyn RewardsChain>,
    admin: Address,
    config: QueueConfig,
    mut receiver: mpsc::UnboundedReceiver<Job>,
) {
    tracing::info!(admin = %admin, "admin tx queue worker started");
    while let Some(job) = receiver.recv().await {
        let method = job.op.method();
        let result = process(chain.as_ref(), &config, &job.op).await;
        match &result {
            Ok(submitted) => {
                tracing::info!(method, tx_hash = %submitted.tx_hash, "admin op confirmed");
            }
            Err(e) => {
                tracing::warn!(method, error = %e, "admin op failed");
            }
        }
        // Receiver may have been dropped; the outcome is already final.
        let _ = job.reply.send(result);
        sleep(config.inter_tx_delay).await;
    }
    tracing::info!("admin tx queue worker stopped");
}

async fn process(
    chain: &dyn RewardsChain,
    config: &QueueConfig,
    op: &AdminOp,
) -> Result<Submitted> {
    let nonce = chain.admin_nonce().await?;
    let call = AdminCall {
        method: op.method().to_string(),
        params: op.params(),
        nonce,
        gas_limit: op.gas_limit(),
    };
    let tx_hash = chain.submit_admin_op(&call).await?;
    tracing::debug!(method = %call.method, nonce, tx_hash = %tx_hash, "admin op submitted");

    let confirmation = wait_confirmed(
        chain,
        &tx_hash,
        config.confirm_poll_interval,
        config.confirm_timeout,
    )
    .await?;
    Ok(Submitted {
        tx_hash,
        confirmation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use velvet_chain::mock::MockChain;

    fn fast_config() -> QueueConfig {
        QueueConfig {
            inter_tx_delay: Duration::from_millis(1),
            confirm_poll_interval: Duration::from_millis(1),
            confirm_timeout: Duration::from_secs(2),
        }
    }

    fn register(token_id: TokenId) -> AdminOp {
        AdminOp::RegisterNft {
            token_id,
            hostess_index: 0,
            owner: Address::new("0xowner"),
        }
    }

    #[test]
    fn test_gas_limits() {
        assert_eq!(register(1).gas_limit(), 180_000);
        let withdraw = AdminOp::WithdrawRewards {
            recipient: Address::new("0xr"),
            token_ids: vec![1, 2, 3],
        };
        assert_eq!(withdraw.gas_limit(), 120_000 + 3 * 45_000);
    }

    #[tokio::test]
    async fn test_ops_confirmed_in_enqueue_order() {
        let chain = MockChain::new();
        let queue = AdminTxQueue::new(
            Arc::new(chain.clone()),
            Some(Address::new("0xadmin")),
            fast_config(),
        );

        // Two concurrent triggers in the same tick.
        let first = queue.enqueue(register(50));
        let second = queue.enqueue(AdminOp::UpdateOwnership {
            token_id: 51,
            new_owner: Address::new("0xnew"),
        });

        first.wait().await.expect("first confirmed");
        second.wait().await.expect("second confirmed");

        let subs = chain.submissions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].method, "rewards_registerNft");
        assert_eq!(subs[1].method, "rewards_updateOwnership");
        assert_eq!(subs[0].nonce + 1, subs[1].nonce);
        let first_confirmed = subs[0].confirmed_seq.expect("first confirmed seq");
        assert!(
            subs[1].submitted_seq > first_confirmed,
            "op N+1 submitted only after op N confirmed"
        );
    }

    #[tokio::test]
    async fn test_failure_rejects_only_that_op() {
        let chain = MockChain::new();
        chain.revert_method("rewards_withdraw");
        let queue = AdminTxQueue::new(
            Arc::new(chain.clone()),
            Some(Address::new("0xadmin")),
            fast_config(),
        );

        let failing = queue.enqueue(AdminOp::WithdrawRewards {
            recipient: Address::new("0xr"),
            token_ids: vec![1],
        });
        let next = queue.enqueue(register(7));

        assert!(failing.wait().await.is_err());
        next.wait().await.expect("queue continues after a revert");
        assert_eq!(chain.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_signer_rejects_immediately() {
        let chain = MockChain::new();
        let queue = AdminTxQueue::new(Arc::new(chain.clone()), None, fast_config());

        let handle = queue.enqueue(register(1));
        match handle.wait().await {
            Err(TxQueueError::NotConfigured) => {}
            other => panic!("expected NotConfigured, got {other:?}"),
        }
        assert_eq!(chain.submission_count(), 0, "nothing reaches the chain");
    }

    #[tokio::test]
    async fn test_slow_confirmation_still_serializes() {
        let chain = MockChain::new();
        chain.set_confirm_after_polls(3);
        let queue = AdminTxQueue::new(
            Arc::new(chain.clone()),
            Some(Address::new("0xadmin")),
            fast_config(),
        );

        let handles: Vec<_> = (1..=3).map(|id| queue.enqueue(register(id))).collect();
        for handle in handles {
            handle.wait().await.expect("confirmed");
        }

        let subs = chain.submissions();
        for pair in subs.windows(2) {
            let confirmed = pair[0].confirmed_seq.expect("confirmed");
            assert!(pair[1].submitted_seq > confirmed);
        }
    }
}
