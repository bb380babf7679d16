//! Pure accrual math.
//!
//! `pending = rate × (min(now, end) − max(last_claim, start))`,
//! computed in fixed point over [`crate::RATE_SCALE`]. `start` is the
//! on-chain registration block timestamp; callers supply `now` from an
//! injected clock, never directly from the wall clock.

use velvet_types::{Wei, TIME_REWARD_DURATION_SECS};

use crate::rates::RATE_SCALE;

/// Lifecycle of a tracked token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccrualStatus {
    /// No state row exists yet.
    NotStarted,
    /// `start ≤ now < start + duration`.
    Active,
    /// `now ≥ start + duration`; accrual has stopped.
    Expired,
}

impl AccrualStatus {
    /// Status for a registered token at `now`.
    pub fn at(start_time: u64, now: u64) -> Self {
        if now >= start_time + TIME_REWARD_DURATION_SECS {
            AccrualStatus::Expired
        } else {
            AccrualStatus::Active
        }
    }
}

/// Unclaimed accrual for a registered token at `now`.
pub fn pending_wei(rate_num: Wei, start_time: u64, last_claim_time: u64, now: u64) -> Wei {
    let end_time = start_time + TIME_REWARD_DURATION_SECS;
    let accrue_until = now.min(end_time);
    let accrue_from = last_claim_time.max(start_time);
    if accrue_until <= accrue_from {
        return 0;
    }
    let elapsed = Wei::from(accrue_until - accrue_from);
    rate_num * elapsed / RATE_SCALE
}
