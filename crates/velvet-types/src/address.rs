//! Chain addresses and transaction hashes.
//!
//! Both chains use 0x-prefixed hex identifiers. Addresses are stored
//! lowercased so that string equality matches chain equality.

use serde::{Deserialize, Serialize};

/// An account or contract address on either chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address, normalizing to lowercase.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_lowercase())
    }

    /// The zero address, used by the issuance contract as the transfer
    /// sender for mints.
    pub fn zero() -> Self {
        Self("0x0000000000000000000000000000000000000000".to_string())
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        let hex_part = self.0.strip_prefix("0x").unwrap_or(&self.0);
        !hex_part.is_empty() && hex_part.bytes().all(|b| b == b'0')
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A transaction hash on either chain.
///
/// Reconciliation inserts synthetic placeholder hashes (prefix
/// `synthetic:`) for sales whose real mint transaction was never
/// observed; those are upgraded in place when the real event arrives.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_lowercase())
    }

    /// Build a synthetic placeholder hash for a reconciled mint.
    pub fn synthetic(token_id: u64) -> Self {
        Self(format!("synthetic:{token_id}"))
    }

    /// Whether this hash is a reconciliation placeholder rather than a
    /// real chain transaction hash.
    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with("synthetic:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
