//! # velvet-sync
//!
//! The synchronization services that keep the local cache consistent
//! with both chains: the issuance event listener and its pending-mint
//! reconciliation, the rewards event listener, the owner sync service
//! and the earnings sync service, plus the proportional earnings math
//! they share.
//!
//! All services are interval-driven tokio tasks. Transient RPC errors
//! abandon the current unit of work and the next interval retries;
//! missed events are an expected steady-state condition handled by
//! reconciliation, not an error.

pub mod earnings;
pub mod earnings_sync;
pub mod listener;
pub mod oracle;
pub mod owner_sync;
pub mod reconcile;
pub mod reward_listener;

use std::sync::Arc;

use tokio::sync::broadcast;
use velvet_types::event::{Event, EventType};

/// The shared database handle every service writes through.
pub type Db = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] velvet_db::DbError),

    #[error(transparent)]
    Chain(#[from] velvet_chain::ChainError),

    #[error(transparent)]
    TimeReward(#[from] velvet_timereward::TimeRewardError),
}

impl SyncError {
    /// Transient errors get reduced log verbosity; the next scheduled
    /// interval retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Chain(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Fire-and-forget broadcast to connected clients. Delivery is
/// best-effort and never required for correctness.
pub(crate) fn emit(
    bus: &broadcast::Sender<Event>,
    event_type: EventType,
    timestamp: u64,
    payload: serde_json::Value,
) {
    let _ = bus.send(Event {
        event_type,
        timestamp,
        payload,
    });
}

/// Log one failed service tick with verbosity matched to the error
/// class.
pub(crate) fn log_tick_error(service: &str, error: &SyncError) {
    if error.is_transient() {
        tracing::debug!(service, error = %error, "tick failed (transient), will retry");
    } else {
        tracing::warn!(service, error = %error, "tick failed");
    }
}
