//! Per-tier accrual rate table.
//!
//! Rates are stored exactly as the contract stores them: an integer
//! wei-per-second numerator over a 1e18 denominator. All accrual math
//! must use these integers; floating point would drift from the
//! contract's accounting.

use velvet_types::Wei;

use crate::{Result, TimeRewardError};

/// Fixed-point denominator for accrual rates.
pub const RATE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Wei-per-second numerators for tiers 0..7, over [`RATE_SCALE`].
pub const TIME_RATE_NUMERATORS: [u128; 8] = [
    64_300_000_000_000_000_000_000_000,
    57_870_000_000_000_000_000_000_000,
    51_440_000_000_000_000_000_000_000,
    45_010_000_000_000_000_000_000_000,
    38_580_000_000_000_000_000_000_000,
    32_150_000_000_000_000_000_000_000,
    25_720_000_000_000_000_000_000_000,
    19_290_000_000_000_000_000_000_000,
];

/// Rate numerator for a tier.
pub fn rate_numerator(hostess_index: u8) -> Result<Wei> {
    TIME_RATE_NUMERATORS
        .get(hostess_index as usize)
        .copied()
        .ok_or(TimeRewardError::InvalidTier(hostess_index))
}
