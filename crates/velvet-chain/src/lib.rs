//! # velvet-chain
//!
//! Read/write access to the two chain nodes the daemon coordinates
//! with: the issuance chain (NFT contract) and the rewards chain
//! (reward pool + admin operations). Both nodes expose a domain
//! JSON-RPC surface; this crate wraps it in typed async traits and
//! decodes event logs exactly once at the RPC boundary.
//!
//! [`mock::MockChain`] implements both traits in memory for tests and
//! development.

pub mod client;
pub mod mock;
pub mod rpc;

pub use client::{
    link_affiliate_with_retry, wait_confirmed, AdminCall, Confirmation, EarningsRead,
    HttpIssuanceChain, HttpRewardsChain, IssuanceChain, OwnerInfo, OwnerRead, RewardsChain,
    TxStatus, TxStatusInfo,
};

/// Chain access error types.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("rate limited by RPC endpoint")]
    RateLimited,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("timed out waiting for confirmation of {0}")]
    ConfirmTimeout(String),
}

impl ChainError {
    /// Transient errors are logged at reduced verbosity and retried on
    /// the next scheduled interval; they are never fatal to a service.
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::Http(_) | ChainError::RateLimited => true,
            ChainError::Rpc { .. }
            | ChainError::Decode(_)
            | ChainError::Reverted(_)
            | ChainError::ConfirmTimeout(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// JSON-RPC error code used by rate-limiting proxies.
pub(crate) const RPC_RATE_LIMIT_CODE: i64 = -32005;
