//! Hostess reward tiers.
//!
//! Every NFT is assigned one of 8 tiers at mint time, fixed for its
//! lifetime. The tier determines the NFT's multiplier in the
//! proportional earnings formula and its time-reward accrual rate.

use serde::{Deserialize, Serialize};

use crate::TIER_COUNT;

/// Earnings multiplier per tier, tier 0 highest.
pub const TIER_MULTIPLIERS: [u64; TIER_COUNT] = [100, 90, 80, 70, 60, 50, 40, 30];

/// A validated hostess tier index (0..7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostessIndex(u8);

/// Error for out-of-range tier indexes.
#[derive(Debug, thiserror::Error)]
#[error("hostess index out of range: {0}")]
pub struct InvalidHostessIndex(pub u8);

impl HostessIndex {
    /// Validate a raw tier index.
    pub fn new(raw: u8) -> Result<Self, InvalidHostessIndex> {
        if (raw as usize) < TIER_COUNT {
            Ok(Self(raw))
        } else {
            Err(InvalidHostessIndex(raw))
        }
    }

    /// The raw index value.
    pub fn get(&self) -> u8 {
        self.0
    }

    /// The earnings multiplier for this tier.
    pub fn multiplier(&self) -> u64 {
        TIER_MULTIPLIERS[self.0 as usize]
    }

    /// All tiers in ascending index order.
    pub fn all() -> impl Iterator<Item = HostessIndex> {
        (0..TIER_COUNT as u8).map(HostessIndex)
    }
}

impl TryFrom<u8> for HostessIndex {
    type Error = InvalidHostessIndex;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl std::fmt::Display for HostessIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_range() {
        for i in 0..8u8 {
            HostessIndex::new(i).expect("tier in range");
        }
        assert!(HostessIndex::new(8).is_err());
    }

    #[test]
    fn test_multipliers() {
        let top = HostessIndex::new(0).expect("tier 0");
        let bottom = HostessIndex::new(7).expect("tier 7");
        assert_eq!(top.multiplier(), 100);
        assert_eq!(bottom.multiplier(), 30);
    }

    #[test]
    fn test_all_descending() {
        let mults: Vec<u64> = HostessIndex::all().map(|t| t.multiplier()).collect();
        let mut sorted = mults.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(mults, sorted, "multipliers descend with tier index");
    }
}
