//! # velvet-timereward
//!
//! Fixed-rate, fixed-duration (180-day) reward accrual for the special
//! sub-range of token ids, mirroring the on-chain per-tier constant
//! rate table. Pending amounts for routine display are computed from
//! locally cached start/claim timestamps without any contract call;
//! a chain-verification path re-derives the claim cursor when local
//! state is suspected stale.

pub mod accrual;
pub mod rates;
pub mod tracker;

pub use accrual::{pending_wei, AccrualStatus};
pub use rates::{rate_numerator, RATE_SCALE, TIME_RATE_NUMERATORS};
pub use tracker::TimeRewardTracker;

/// Time reward error types.
#[derive(Debug, thiserror::Error)]
pub enum TimeRewardError {
    #[error("token {0} is outside the special range")]
    NotSpecial(velvet_types::TokenId),

    #[error("token {0} is not registered")]
    NotRegistered(velvet_types::TokenId),

    #[error("invalid hostess index: {0}")]
    InvalidTier(u8),

    #[error(transparent)]
    Db(#[from] velvet_db::DbError),

    #[error(transparent)]
    Chain(#[from] velvet_chain::ChainError),
}

pub type Result<T> = std::result::Result<T, TimeRewardError>;
