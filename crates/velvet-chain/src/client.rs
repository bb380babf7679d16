//! Typed chain access traits and their HTTP implementations.
//!
//! The traits are the seams every service depends on; production wires
//! [`HttpIssuanceChain`] / [`HttpRewardsChain`], tests wire
//! [`crate::mock::MockChain`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::{sleep, Duration};
use velvet_types::{Address, BlockNumber, IssuanceEvent, RewardsEvent, TokenId, TxHash, Wei};

use crate::rpc::RpcClient;
use crate::{ChainError, Result};

/// Owner and tier as read directly from the NFT contract.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OwnerInfo {
    pub owner: Address,
    pub hostess_index: u8,
}

/// One entry of a batched owner read. `info` is `None` when that
/// individual read failed; callers log and continue with the rest.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OwnerRead {
    pub token_id: TokenId,
    pub info: Option<OwnerInfo>,
}

/// Cumulative earnings as read from the reward pool contract.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EarningsRead {
    pub token_id: TokenId,
    #[serde(with = "velvet_types::wei_string")]
    pub total_earned_wei: Wei,
    #[serde(with = "velvet_types::wei_string")]
    pub pending_wei: Wei,
}

/// An administrative operation ready for submission: the rewards-chain
/// node signs with the admin identity it holds and expects the caller
/// to supply a correct nonce.
#[derive(Clone, Debug, Serialize)]
pub struct AdminCall {
    pub method: String,
    pub params: serde_json::Value,
    pub nonce: u64,
    pub gas_limit: u64,
}

/// Status of a submitted transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Reverted,
}

/// Status plus inclusion metadata, as reported by the node.
#[derive(Clone, Debug, Deserialize)]
pub struct TxStatusInfo {
    pub status: TxStatus,
    pub block_number: Option<BlockNumber>,
    pub timestamp: Option<u64>,
}

/// Confirmed inclusion of a transaction. The block timestamp is what
/// accrual state must be keyed on, never the local clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub block_number: BlockNumber,
    pub timestamp: u64,
}

/// Read-only access to the issuance chain's NFT contract, plus the one
/// user-facing write (affiliate linking) that does not go through the
/// admin queue.
#[async_trait]
pub trait IssuanceChain: Send + Sync {
    async fn head_block(&self) -> Result<BlockNumber>;
    async fn total_supply(&self) -> Result<u64>;
    /// `None` when the token does not exist (mint not yet completed).
    async fn owner_of(&self, token_id: TokenId) -> Result<Option<Address>>;
    async fn hostess_index_of(&self, token_id: TokenId) -> Result<u8>;
    /// One batched call; individual failures are `None` entries.
    async fn batch_owners(&self, token_ids: &[TokenId]) -> Result<Vec<OwnerRead>>;
    /// Decoded events in `(from ..= to)`, ordered by block.
    async fn query_events(&self, from: BlockNumber, to: BlockNumber)
        -> Result<Vec<IssuanceEvent>>;
    async fn submit_affiliate_link(
        &self,
        user: &Address,
        affiliate: &Address,
    ) -> Result<TxHash>;
}

/// Access to the rewards chain: the reward pool contract reads, the
/// event log, and admin transaction submission.
#[async_trait]
pub trait RewardsChain: Send + Sync {
    async fn head_block(&self) -> Result<BlockNumber>;
    async fn query_events(&self, from: BlockNumber, to: BlockNumber)
        -> Result<Vec<RewardsEvent>>;
    async fn earnings_of(&self, token_id: TokenId) -> Result<EarningsRead>;
    /// One batched call covering all requested token ids.
    async fn batch_earnings(&self, token_ids: &[TokenId]) -> Result<Vec<EarningsRead>>;
    /// On-chain pending time reward, used by the recovery path.
    async fn time_reward_pending(&self, token_id: TokenId) -> Result<Wei>;
    /// Current nonce of the administrative identity.
    async fn admin_nonce(&self) -> Result<u64>;
    async fn submit_admin_op(&self, call: &AdminCall) -> Result<TxHash>;
    async fn tx_status(&self, tx_hash: &TxHash) -> Result<TxStatusInfo>;
}

/// Poll until a transaction confirms or reverts.
///
/// # Errors
///
/// - [`ChainError::Reverted`] when the chain reports a revert
/// - [`ChainError::ConfirmTimeout`] when `timeout` elapses first
pub async fn wait_confirmed(
    chain: &dyn RewardsChain,
    tx_hash: &TxHash,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Confirmation> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match chain.tx_status(tx_hash).await {
            Ok(info) => match info.status {
                TxStatus::Confirmed => {
                    return Ok(Confirmation {
                        block_number: info.block_number.unwrap_or_default(),
                        timestamp: info.timestamp.unwrap_or_default(),
                    })
                }
                TxStatus::Reverted => {
                    return Err(ChainError::Reverted(tx_hash.as_str().to_string()))
                }
                TxStatus::Pending => {}
            },
            // Transient read failures must not fail the wait; the
            // transaction may well confirm while the RPC is flaky.
            Err(e) if e.is_transient() => {
                tracing::debug!(tx_hash = %tx_hash, error = %e, "status poll failed, retrying");
            }
            Err(e) => return Err(e),
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ChainError::ConfirmTimeout(tx_hash.as_str().to_string()));
        }
        sleep(poll_interval).await;
    }
}

/// Submit an affiliate link with a bounded retry.
///
/// This is the one admin-adjacent write that does not pass through the
/// transaction queue: it is triggered by concurrent user-facing
/// requests on the issuance chain, so a short retry covers transient
/// nonce races instead of a serialized worker.
pub async fn link_affiliate_with_retry(
    chain: &dyn IssuanceChain,
    user: &Address,
    affiliate: &Address,
    attempts: u32,
    delay: Duration,
) -> Result<TxHash> {
    let mut last_err = ChainError::Rpc {
        code: 0,
        message: "no attempts made".into(),
    };
    for attempt in 1..=attempts {
        match chain.submit_affiliate_link(user, affiliate).await {
            Ok(hash) => return Ok(hash),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "affiliate link submission failed");
                last_err = e;
                if attempt < attempts {
                    sleep(delay).await;
                }
            }
        }
    }
    Err(last_err)
}

// ---------------------------------------------------------------------------
// HTTP implementations
// ---------------------------------------------------------------------------

/// Issuance chain over JSON-RPC.
pub struct HttpIssuanceChain {
    rpc: RpcClient,
}

impl HttpIssuanceChain {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl IssuanceChain for HttpIssuanceChain {
    async fn head_block(&self) -> Result<BlockNumber> {
        self.rpc.call("chain_blockNumber", json!([])).await
    }

    async fn total_supply(&self) -> Result<u64> {
        self.rpc.call("nft_totalSupply", json!([])).await
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Option<Address>> {
        self.rpc.call("nft_ownerOf", json!([token_id])).await
    }

    async fn hostess_index_of(&self, token_id: TokenId) -> Result<u8> {
        self.rpc.call("nft_hostessIndexOf", json!([token_id])).await
    }

    async fn batch_owners(&self, token_ids: &[TokenId]) -> Result<Vec<OwnerRead>> {
        self.rpc.call("nft_batchOwners", json!([token_ids])).await
    }

    async fn query_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<IssuanceEvent>> {
        self.rpc.call("nft_queryEvents", json!([from, to])).await
    }

    async fn submit_affiliate_link(
        &self,
        user: &Address,
        affiliate: &Address,
    ) -> Result<TxHash> {
        self.rpc
            .call("nft_linkAffiliate", json!([user, affiliate]))
            .await
    }
}

/// Rewards chain over JSON-RPC.
pub struct HttpRewardsChain {
    rpc: RpcClient,
}

impl HttpRewardsChain {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl RewardsChain for HttpRewardsChain {
    async fn head_block(&self) -> Result<BlockNumber> {
        self.rpc.call("chain_blockNumber", json!([])).await
    }

    async fn query_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<RewardsEvent>> {
        self.rpc.call("rewards_queryEvents", json!([from, to])).await
    }

    async fn earnings_of(&self, token_id: TokenId) -> Result<EarningsRead> {
        self.rpc.call("rewards_earningsOf", json!([token_id])).await
    }

    async fn batch_earnings(&self, token_ids: &[TokenId]) -> Result<Vec<EarningsRead>> {
        self.rpc
            .call("rewards_batchEarnings", json!([token_ids]))
            .await
    }

    async fn time_reward_pending(&self, token_id: TokenId) -> Result<Wei> {
        // Wei amounts travel as decimal strings.
        let raw: String = self
            .rpc
            .call("rewards_timeRewardPending", json!([token_id]))
            .await?;
        raw.parse()
            .map_err(|e| ChainError::Decode(format!("rewards_timeRewardPending: {e}")))
    }

    async fn admin_nonce(&self) -> Result<u64> {
        self.rpc.call("admin_nonce", json!([])).await
    }

    async fn submit_admin_op(&self, call: &AdminCall) -> Result<TxHash> {
        self.rpc.call("admin_submit", json!([call])).await
    }

    async fn tx_status(&self, tx_hash: &TxHash) -> Result<TxStatusInfo> {
        self.rpc.call("chain_txStatus", json!([tx_hash])).await
    }
}
