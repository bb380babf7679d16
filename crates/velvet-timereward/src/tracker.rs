//! Time reward tracker over the persisted state rows.

use rusqlite::Connection;
use velvet_chain::RewardsChain;
use velvet_db::queries::time_rewards;
use velvet_types::{Address, TokenId, Wei, TIME_REWARD_DURATION_SECS};

use crate::accrual::{pending_wei, AccrualStatus};
use crate::rates::{rate_numerator, RATE_SCALE};
use crate::{Result, TimeRewardError};

/// Tracker for the special token range.
#[derive(Clone, Copy, Debug)]
pub struct TimeRewardTracker {
    special_start: TokenId,
    special_end: TokenId,
}

impl TimeRewardTracker {
    /// Create a tracker for the inclusive token range
    /// `[special_start, special_end]`.
    pub fn new(special_start: TokenId, special_end: TokenId) -> Self {
        Self {
            special_start,
            special_end,
        }
    }

    /// Whether a token participates in time rewards.
    pub fn is_special(&self, token_id: TokenId) -> bool {
        token_id >= self.special_start && token_id <= self.special_end
    }

    /// Register a token exactly once, with the registration block
    /// timestamp from the chain (never local wall-clock time).
    /// Returns false when the token was already registered.
    pub fn register(
        &self,
        conn: &Connection,
        token_id: TokenId,
        hostess_index: u8,
        owner: &Address,
        block_timestamp: u64,
    ) -> Result<bool> {
        if !self.is_special(token_id) {
            return Err(TimeRewardError::NotSpecial(token_id));
        }
        rate_numerator(hostess_index)?;
        let created =
            time_rewards::register(conn, token_id, hostess_index, owner, block_timestamp)?;
        if created {
            tracing::info!(token_id, hostess_index, start_time = block_timestamp,
                "time reward accrual started");
        }
        Ok(created)
    }

    /// Current accrual status of a token.
    pub fn status(&self, conn: &Connection, token_id: TokenId, now: u64) -> Result<AccrualStatus> {
        match time_rewards::get(conn, token_id)? {
            None => Ok(AccrualStatus::NotStarted),
            Some(row) => Ok(AccrualStatus::at(row.start_time, now)),
        }
    }

    /// Unclaimed accrual at `now`, from local state only (no contract
    /// call). Unregistered tokens have nothing pending.
    pub fn pending(&self, conn: &Connection, token_id: TokenId, now: u64) -> Result<Wei> {
        match time_rewards::get(conn, token_id)? {
            None => Ok(0),
            Some(row) => {
                let rate = rate_numerator(row.hostess_index)?;
                Ok(pending_wei(rate, row.start_time, row.last_claim_time, now))
            }
        }
    }

    /// Apply a confirmed on-chain claim: advance the claim cursor to
    /// the claim's block timestamp and credit the claimed amount.
    /// Returns the amount credited. Must never be called optimistically
    /// before the claim transaction is confirmed.
    pub fn apply_confirmed_claim(
        &self,
        conn: &Connection,
        token_id: TokenId,
        claim_timestamp: u64,
    ) -> Result<Wei> {
        let row = time_rewards::get(conn, token_id)?
            .ok_or(TimeRewardError::NotRegistered(token_id))?;
        let rate = rate_numerator(row.hostess_index)?;
        let claimed = pending_wei(rate, row.start_time, row.last_claim_time, claim_timestamp);
        time_rewards::apply_claim(conn, token_id, claimed, claim_timestamp)?;
        tracing::info!(token_id, claimed_wei = %claimed, claim_timestamp, "time reward claim applied");
        Ok(claimed)
    }

    /// Keep the cached owner in step with ownership changes.
    pub fn update_owner(
        &self,
        conn: &Connection,
        token_id: TokenId,
        owner: &Address,
    ) -> Result<()> {
        if self.is_special(token_id) {
            time_rewards::set_owner(conn, token_id, owner)?;
        }
        Ok(())
    }

    /// Re-derive the claim cursor from the contract's own pending
    /// amount. Used when local state is suspected stale (recovery
    /// after data loss): `last_claim = now − pending × SCALE / rate`,
    /// clamped to the accrual window.
    pub async fn verify_from_chain(
        &self,
        conn: &Connection,
        chain: &dyn RewardsChain,
        token_id: TokenId,
        now: u64,
    ) -> Result<u64> {
        let row = time_rewards::get(conn, token_id)?
            .ok_or(TimeRewardError::NotRegistered(token_id))?;
        let rate = rate_numerator(row.hostess_index)?;
        let chain_pending = chain.time_reward_pending(token_id).await?;

        let end_time = row.start_time + TIME_REWARD_DURATION_SECS;
        let reference = now.min(end_time);
        let pending_secs = (chain_pending * RATE_SCALE / rate) as u64;
        let derived = reference
            .saturating_sub(pending_secs)
            .clamp(row.start_time, end_time);

        if derived != row.last_claim_time {
            tracing::warn!(
                token_id,
                local = row.last_claim_time,
                derived,
                "time reward claim cursor diverged from chain, correcting"
            );
            time_rewards::set_last_claim_time(conn, token_id, derived)?;
        }
        Ok(derived)
    }
}
