//! In-memory chain for tests and development.
//!
//! One [`MockChain`] stands in for both nodes: seed it with owners,
//! events and earnings, inject failures, and inspect the admin
//! submissions it received. Submission and confirmation order is
//! recorded with a global sequence counter so tests can assert the
//! queue's ordering guarantee.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use velvet_types::{Address, BlockNumber, IssuanceEvent, RewardsEvent, TokenId, TxHash, Wei};

use crate::client::{
    AdminCall, EarningsRead, IssuanceChain, OwnerInfo, OwnerRead, RewardsChain, TxStatus,
    TxStatusInfo,
};
use crate::{ChainError, Result};

/// A recorded admin submission.
#[derive(Clone, Debug)]
pub struct SubmittedOp {
    pub method: String,
    pub params: serde_json::Value,
    pub nonce: u64,
    pub gas_limit: u64,
    pub tx_hash: TxHash,
    /// Global sequence number at submission time.
    pub submitted_seq: u64,
    /// Global sequence number when first reported confirmed.
    pub confirmed_seq: Option<u64>,
    polls: u32,
    reverted: bool,
}

#[derive(Default)]
struct MockState {
    head: BlockNumber,
    supply: u64,
    block_timestamps: HashMap<BlockNumber, u64>,
    owners: HashMap<TokenId, OwnerInfo>,
    issuance_events: Vec<(BlockNumber, IssuanceEvent)>,
    rewards_events: Vec<(BlockNumber, RewardsEvent)>,
    earnings: HashMap<TokenId, (Wei, Wei)>,
    time_pending: HashMap<TokenId, Wei>,

    nonce: u64,
    seq: u64,
    submissions: Vec<SubmittedOp>,
    confirm_after_polls: u32,

    fail_owner_reads: HashSet<TokenId>,
    fail_whole_batches: u32,
    fail_affiliate_links: u32,
    revert_methods: HashSet<String>,
}

/// Shared-handle in-memory chain implementing both chain traits.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                confirm_after_polls: 1,
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // The inner mutex cannot be poisoned: no code path panics while
        // holding it.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -- seeding -----------------------------------------------------------

    pub fn set_head(&self, head: BlockNumber) {
        self.lock().head = head;
    }

    pub fn set_supply(&self, supply: u64) {
        self.lock().supply = supply;
    }

    pub fn set_block_timestamp(&self, block: BlockNumber, timestamp: u64) {
        self.lock().block_timestamps.insert(block, timestamp);
    }

    pub fn set_owner(&self, token_id: TokenId, owner: Address, hostess_index: u8) {
        self.lock().owners.insert(
            token_id,
            OwnerInfo {
                owner,
                hostess_index,
            },
        );
    }

    pub fn push_issuance_event(&self, block: BlockNumber, event: IssuanceEvent) {
        let mut state = self.lock();
        state.issuance_events.push((block, event));
        if block > state.head {
            state.head = block;
        }
    }

    pub fn push_rewards_event(&self, block: BlockNumber, event: RewardsEvent) {
        let mut state = self.lock();
        state.rewards_events.push((block, event));
        if block > state.head {
            state.head = block;
        }
    }

    pub fn set_earnings(&self, token_id: TokenId, total: Wei, pending: Wei) {
        self.lock().earnings.insert(token_id, (total, pending));
    }

    pub fn set_time_pending(&self, token_id: TokenId, pending: Wei) {
        self.lock().time_pending.insert(token_id, pending);
    }

    // -- failure injection -------------------------------------------------

    /// Make the individual owner read for `token_id` fail inside
    /// batched reads (the batch itself still succeeds).
    pub fn fail_owner_read(&self, token_id: TokenId) {
        self.lock().fail_owner_reads.insert(token_id);
    }

    /// Fail the next `n` whole batch reads with a transient error.
    pub fn fail_whole_batches(&self, n: u32) {
        self.lock().fail_whole_batches = n;
    }

    /// Fail the next `n` affiliate link submissions.
    pub fn fail_affiliate_links(&self, n: u32) {
        self.lock().fail_affiliate_links = n;
    }

    /// Every submission of `method` reverts instead of confirming.
    pub fn revert_method(&self, method: &str) {
        self.lock().revert_methods.insert(method.to_string());
    }

    /// Number of status polls before a submission confirms.
    pub fn set_confirm_after_polls(&self, polls: u32) {
        self.lock().confirm_after_polls = polls;
    }

    // -- inspection --------------------------------------------------------

    pub fn submissions(&self) -> Vec<SubmittedOp> {
        self.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }
}

#[async_trait]
impl IssuanceChain for MockChain {
    async fn head_block(&self) -> Result<BlockNumber> {
        Ok(self.lock().head)
    }

    async fn total_supply(&self) -> Result<u64> {
        Ok(self.lock().supply)
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Option<Address>> {
        Ok(self.lock().owners.get(&token_id).map(|i| i.owner.clone()))
    }

    async fn hostess_index_of(&self, token_id: TokenId) -> Result<u8> {
        self.lock()
            .owners
            .get(&token_id)
            .map(|i| i.hostess_index)
            .ok_or_else(|| ChainError::Rpc {
                code: -32000,
                message: format!("token {token_id} does not exist"),
            })
    }

    async fn batch_owners(&self, token_ids: &[TokenId]) -> Result<Vec<OwnerRead>> {
        let mut state = self.lock();
        if state.fail_whole_batches > 0 {
            state.fail_whole_batches -= 1;
            return Err(ChainError::RateLimited);
        }
        Ok(token_ids
            .iter()
            .map(|id| OwnerRead {
                token_id: *id,
                info: if state.fail_owner_reads.contains(id) {
                    None
                } else {
                    state.owners.get(id).cloned()
                },
            })
            .collect())
    }

    async fn query_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<IssuanceEvent>> {
        Ok(self
            .lock()
            .issuance_events
            .iter()
            .filter(|(block, _)| *block >= from && *block <= to)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn submit_affiliate_link(
        &self,
        _user: &Address,
        affiliate: &Address,
    ) -> Result<TxHash> {
        let mut state = self.lock();
        if state.fail_affiliate_links > 0 {
            state.fail_affiliate_links -= 1;
            return Err(ChainError::Rpc {
                code: -32001,
                message: "nonce already used".into(),
            });
        }
        state.seq += 1;
        Ok(TxHash::new(format!("0xlink{}-{}", state.seq, affiliate)))
    }
}

#[async_trait]
impl RewardsChain for MockChain {
    async fn head_block(&self) -> Result<BlockNumber> {
        Ok(self.lock().head)
    }

    async fn query_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<RewardsEvent>> {
        Ok(self
            .lock()
            .rewards_events
            .iter()
            .filter(|(block, _)| *block >= from && *block <= to)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn earnings_of(&self, token_id: TokenId) -> Result<EarningsRead> {
        let state = self.lock();
        let (total, pending) = state.earnings.get(&token_id).copied().unwrap_or((0, 0));
        Ok(EarningsRead {
            token_id,
            total_earned_wei: total,
            pending_wei: pending,
        })
    }

    async fn batch_earnings(&self, token_ids: &[TokenId]) -> Result<Vec<EarningsRead>> {
        let mut state = self.lock();
        if state.fail_whole_batches > 0 {
            state.fail_whole_batches -= 1;
            return Err(ChainError::RateLimited);
        }
        Ok(token_ids
            .iter()
            .map(|id| {
                let (total, pending) = state.earnings.get(id).copied().unwrap_or((0, 0));
                EarningsRead {
                    token_id: *id,
                    total_earned_wei: total,
                    pending_wei: pending,
                }
            })
            .collect())
    }

    async fn time_reward_pending(&self, token_id: TokenId) -> Result<Wei> {
        Ok(self.lock().time_pending.get(&token_id).copied().unwrap_or(0))
    }

    async fn admin_nonce(&self) -> Result<u64> {
        Ok(self.lock().nonce)
    }

    async fn submit_admin_op(&self, call: &AdminCall) -> Result<TxHash> {
        let mut state = self.lock();
        if call.nonce != state.nonce {
            return Err(ChainError::Rpc {
                code: -32001,
                message: format!("invalid nonce {} (expected {})", call.nonce, state.nonce),
            });
        }
        state.nonce += 1;
        state.seq += 1;
        let submitted_seq = state.seq;
        let tx_hash = TxHash::new(format!("0xadmin{submitted_seq}"));
        let reverted = state.revert_methods.contains(&call.method);
        state.submissions.push(SubmittedOp {
            method: call.method.clone(),
            params: call.params.clone(),
            nonce: call.nonce,
            gas_limit: call.gas_limit,
            tx_hash: tx_hash.clone(),
            submitted_seq,
            confirmed_seq: None,
            polls: 0,
            reverted,
        });
        Ok(tx_hash)
    }

    async fn tx_status(&self, tx_hash: &TxHash) -> Result<TxStatusInfo> {
        let mut state = self.lock();
        let head = state.head;
        let confirm_after = state.confirm_after_polls;

        let idx = state
            .submissions
            .iter()
            .position(|s| &s.tx_hash == tx_hash)
            .ok_or_else(|| ChainError::Rpc {
                code: -32002,
                message: format!("unknown transaction {tx_hash}"),
            })?;

        if state.submissions[idx].reverted {
            return Ok(TxStatusInfo {
                status: TxStatus::Reverted,
                block_number: Some(head),
                timestamp: None,
            });
        }

        state.submissions[idx].polls += 1;
        if state.submissions[idx].polls >= confirm_after {
            if state.submissions[idx].confirmed_seq.is_none() {
                state.seq += 1;
                let seq = state.seq;
                state.submissions[idx].confirmed_seq = Some(seq);
            }
            let timestamp = state.block_timestamps.get(&head).copied();
            return Ok(TxStatusInfo {
                status: TxStatus::Confirmed,
                block_number: Some(head),
                timestamp,
            });
        }

        Ok(TxStatusInfo {
            status: TxStatus::Pending,
            block_number: None,
            timestamp: None,
        })
    }
}
