//! Decoded chain events and daemon notification types.
//!
//! Chain events are decoded exactly once at the RPC boundary into the
//! tagged variants below and dispatched by exhaustive match. Daemon
//! notifications are the fire-and-forget payloads pushed to connected
//! clients over the event bus.

use serde::{Deserialize, Serialize};

use crate::{Address, BlockNumber, RequestId, TokenId, TxHash, Wei};

/// An event emitted by the issuance-chain NFT contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssuanceEvent {
    /// A mint was requested and is awaiting asynchronous fulfillment.
    MintRequested {
        request_id: RequestId,
        sender: Address,
        token_id: TokenId,
        #[serde(with = "crate::wei_string")]
        price_wei: Wei,
        tx_hash: TxHash,
        block_number: BlockNumber,
        timestamp: u64,
    },
    /// A mint completed; the token now exists and has an owner.
    MintCompleted {
        request_id: RequestId,
        token_id: TokenId,
        owner: Address,
        hostess_index: u8,
        #[serde(with = "crate::wei_string")]
        price_wei: Wei,
        affiliate_tier1: Address,
        affiliate_tier2: Address,
        tx_hash: TxHash,
        block_number: BlockNumber,
        timestamp: u64,
    },
    /// Token ownership changed hands.
    Transferred {
        token_id: TokenId,
        from: Address,
        to: Address,
        tx_hash: TxHash,
        block_number: BlockNumber,
        timestamp: u64,
    },
}

/// An event emitted by the rewards-chain pool contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardsEvent {
    /// A deposit into the reward pool.
    RewardDeposited {
        commitment_hash: String,
        #[serde(with = "crate::wei_string")]
        amount_wei: Wei,
        tx_hash: TxHash,
        block_number: BlockNumber,
        timestamp: u64,
    },
    /// A holder claimed accumulated rewards for a set of tokens.
    RewardClaimed {
        user: Address,
        #[serde(with = "crate::wei_string")]
        amount_wei: Wei,
        token_ids: Vec<TokenId>,
        tx_hash: TxHash,
        block_number: BlockNumber,
        timestamp: u64,
    },
}

/// Envelope for daemon notifications.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

/// All notification types pushed to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Issuance chain
    MintPending,
    NftMinted,
    NftRegisteredForRewards,
    OwnershipChanged,

    // Rewards chain
    EarningsSynced,
    RewardReceived,
    RewardClaimed,

    // Time rewards
    SpecialNftStarted,
    TimeRewardClaimed,

    // System
    DaemonStarted,
}
