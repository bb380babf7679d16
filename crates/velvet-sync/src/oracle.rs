//! Price feed seam.
//!
//! The earnings pass denominates APY in the NFT's value expressed in
//! the reward token. The live rate comes from an external price-feed
//! poller; this module defines the seam and a stub implementation with
//! a fixed rate for development and tests.

use std::sync::RwLock;

use velvet_types::Wei;

/// Default NFT value: 1.5 reward tokens in wei.
pub const DEFAULT_NFT_VALUE_WEI: Wei = 1_500_000_000_000_000_000;

/// Source of the current NFT value in reward-token wei.
pub trait PriceOracle: Send + Sync {
    fn nft_value_wei(&self) -> Wei;
}

/// A stub oracle returning a fixed value, adjustable for development
/// and testing.
#[derive(Debug)]
pub struct StubPriceOracle {
    value: RwLock<Wei>,
}

impl StubPriceOracle {
    pub fn new() -> Self {
        Self::with_value(DEFAULT_NFT_VALUE_WEI)
    }

    pub fn with_value(value: Wei) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Adjust the rate (development/testing only).
    pub fn dev_set_value(&self, value: Wei) {
        tracing::warn!(new_value = %value, "stub price oracle: value changed (dev only)");
        if let Ok(mut guard) = self.value.write() {
            *guard = value;
        }
    }
}

impl Default for StubPriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceOracle for StubPriceOracle {
    fn nft_value_wei(&self) -> Wei {
        self.value.read().map(|v| *v).unwrap_or(DEFAULT_NFT_VALUE_WEI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_default_and_override() {
        let oracle = StubPriceOracle::new();
        assert_eq!(oracle.nft_value_wei(), DEFAULT_NFT_VALUE_WEI);
        oracle.dev_set_value(42);
        assert_eq!(oracle.nft_value_wei(), 42);
    }
}
