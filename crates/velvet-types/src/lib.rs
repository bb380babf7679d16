//! # velvet-types
//!
//! Shared domain types for the Velvet coordination daemon: token and
//! block identifiers, wei amounts, the hostess tier table, decoded
//! chain events, and the clock abstraction used by all accrual math.

pub mod address;
pub mod clock;
pub mod event;
pub mod tier;

pub use address::{Address, TxHash};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{IssuanceEvent, RewardsEvent};
pub use tier::HostessIndex;

/// Token identifier on the issuance chain. Always positive.
pub type TokenId = u64;

/// Block number on either chain.
pub type BlockNumber = u64;

/// Amount in wei. Cumulative totals exceed u64, so all wei arithmetic
/// is done in u128.
pub type Wei = u128;

/// Mint request identifier assigned by the issuance contract.
pub type RequestId = u64;

/// Rolling earnings window (24 hours) in seconds.
pub const REWARD_WINDOW_SECS: u64 = 86_400;

/// Basis points denominator for APY figures.
pub const BASIS_POINTS: u128 = 10_000;

/// Days used for annualizing the 24h window.
pub const DAYS_PER_YEAR: u128 = 365;

/// Number of hostess reward tiers.
pub const TIER_COUNT: usize = 8;

/// Duration of the special-NFT time reward program (180 days).
pub const TIME_REWARD_DURATION_SECS: u64 = 180 * 86_400;

/// Serde helper for wei fields: amounts cross JSON boundaries as
/// base-10 strings, since u128 exceeds what a JSON number can carry
/// safely. Small legacy payloads with plain numbers still decode.
pub mod wei_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Wei;

    pub fn serialize<S: Serializer>(wei: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&wei.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Wei, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(Wei::from(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
