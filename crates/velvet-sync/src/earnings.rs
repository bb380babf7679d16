//! Proportional earnings math.
//!
//! Each NFT's share of the rolling 24-hour reward window is
//! `global24h × tier_multiplier / total_multiplier_points`, computed
//! in u128 with the multiplication before the division so no precision
//! is lost ahead of the final floor. The same formula must produce
//! identical results whether evaluated for one NFT or for the whole
//! collection, and doubling the window must exactly double every share.

use velvet_types::tier::TIER_MULTIPLIERS;
use velvet_types::{Wei, BASIS_POINTS, DAYS_PER_YEAR};

/// An NFT's share of the 24h window.
pub fn share_of_window(global24h: Wei, multiplier: u64, total_points: u64) -> Wei {
    if total_points == 0 {
        return 0;
    }
    global24h * Wei::from(multiplier) / Wei::from(total_points)
}

/// Annualized yield in basis points, denominated in the NFT's value
/// expressed in the reward token (supplied by the price feed).
pub fn apy_basis_points(last24h: Wei, nft_value_wei: Wei) -> u64 {
    if nft_value_wei == 0 {
        return 0;
    }
    let bp = last24h * DAYS_PER_YEAR * BASIS_POINTS / nft_value_wei;
    u64::try_from(bp).unwrap_or(u64::MAX)
}

/// Sum of multiplier points over a collection described by `(token,
/// tier)` pairs.
pub fn total_points<I: IntoIterator<Item = u8>>(tiers: I) -> u64 {
    tiers
        .into_iter()
        .map(|tier| TIER_MULTIPLIERS.get(tier as usize).copied().unwrap_or(0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_nft_scenario() {
        // global24h = 1000, tiers with multipliers 100 and 50.
        let total = total_points([0u8, 5]);
        assert_eq!(total, 150);
        assert_eq!(share_of_window(1_000, 100, total), 666);
        assert_eq!(share_of_window(1_000, 50, total), 333);
    }

    #[test]
    fn test_shares_sum_to_global_within_rounding() {
        let tiers: Vec<u8> = (0..8u8).cycle().take(100).collect();
        let total = total_points(tiers.iter().copied());
        let global: Wei = 1_234_567_890_123_456_789;

        let sum: Wei = tiers
            .iter()
            .map(|t| share_of_window(global, TIER_MULTIPLIERS[*t as usize], total))
            .sum();
        assert!(sum <= global);
        // Each NFT floors away strictly less than one wei-per-point
        // unit, so the total shortfall is bounded by the NFT count.
        assert!(global - sum < tiers.len() as Wei);
    }

    #[test]
    fn test_monotonic_scaling() {
        let total = total_points([0u8, 3, 7]);
        for multiplier in [100u64, 70, 30] {
            let one = share_of_window(600_000, multiplier, total);
            let double = share_of_window(1_200_000, multiplier, total);
            assert_eq!(double, one * 2, "doubling the window doubles every share");
        }
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(share_of_window(1_000, 100, 0), 0);
    }

    #[test]
    fn test_apy() {
        // 1 wei-token earning 10% of its value per year.
        let value: Wei = 1_000_000_000_000_000_000;
        let per_day = value / 10 / 365;
        let apy = apy_basis_points(per_day, value);
        // 10% = 1000 bp, allowing for the per-day floor.
        assert!((995..=1_000).contains(&apy), "got {apy}");
    }

    #[test]
    fn test_apy_zero_value() {
        assert_eq!(apy_basis_points(1_000, 0), 0);
    }

    #[test]
    fn test_large_window_no_overflow() {
        // A year of 1M-token daily volume in wei still fits u128 math.
        let global: Wei = 1_000_000 * 1_000_000_000_000_000_000;
        let share = share_of_window(global, 100, 150);
        assert_eq!(share, global * 100 / 150);
    }
}
