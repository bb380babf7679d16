//! Pending mint reconciliation.
//!
//! A second, independent timer that inspects pending mints the event
//! listener has not settled. A pending mint past the resolve age whose
//! token now has an on-chain owner is a missed mint-completed event:
//! the same handling path is replayed with directly queried data in
//! place of event arguments. A pending mint past the abandon age with
//! no resolvable owner is dropped and logged — a deliberate
//! bounded-wait policy, not data loss.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use velvet_db::queries::pending_mints;
use velvet_types::TxHash;

use crate::listener::{EventListener, MintData};
use crate::{log_tick_error, Result};

/// Reconciler timing configuration.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    pub check_interval: std::time::Duration,
    /// Age after which a pending mint is checked against the contract.
    pub resolve_after_secs: u64,
    /// Age after which an unresolvable pending mint is abandoned.
    pub abandon_after_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            check_interval: std::time::Duration::from_secs(30),
            resolve_after_secs: 60,
            abandon_after_secs: 300,
        }
    }
}

/// Fallback reconciliation for mints whose completion event was missed.
pub struct PendingMintReconciler {
    listener: Arc<EventListener>,
    config: ReconcilerConfig,
}

impl PendingMintReconciler {
    pub fn new(listener: Arc<EventListener>, config: ReconcilerConfig) -> Self {
        Self { listener, config }
    }

    /// One reconciliation cycle. Returns `(recovered, abandoned)`.
    pub async fn tick(&self) -> Result<(usize, usize)> {
        let now = self.listener.clock.now();
        let stale = {
            let conn = self.listener.db.lock().await;
            pending_mints::older_than(&conn, now.saturating_sub(self.config.resolve_after_secs))?
        };
        if stale.is_empty() {
            return Ok((0, 0));
        }

        let mut recovered = 0usize;
        let mut abandoned = 0usize;

        for pending in stale {
            match self.listener.chain.owner_of(pending.token_id).await {
                Ok(Some(owner)) => {
                    // The mint completed without us seeing the event;
                    // read the tier directly and replay the handler.
                    let hostess_index =
                        match self.listener.chain.hostess_index_of(pending.token_id).await {
                            Ok(tier) => tier,
                            Err(e) => {
                                tracing::debug!(
                                    token_id = pending.token_id,
                                    error = %e,
                                    "tier read failed, retrying next cycle"
                                );
                                continue;
                            }
                        };
                    tracing::info!(
                        token_id = pending.token_id,
                        request_id = pending.request_id,
                        "recovering missed mint completion"
                    );
                    self.listener
                        .apply_mint(MintData {
                            request_id: Some(pending.request_id),
                            token_id: pending.token_id,
                            owner,
                            hostess_index,
                            price_wei: pending.price_wei,
                            affiliate_tier1: None,
                            affiliate_tier2: None,
                            tx_hash: TxHash::synthetic(pending.token_id),
                            timestamp: now,
                            synthetic: true,
                        })
                        .await?;
                    recovered += 1;
                }
                Ok(None) => {
                    let age = now.saturating_sub(pending.created_at);
                    if age >= self.config.abandon_after_secs {
                        tracing::warn!(
                            request_id = pending.request_id,
                            token_id = pending.token_id,
                            age_secs = age,
                            "abandoning pending mint with no resolvable owner"
                        );
                        let conn = self.listener.db.lock().await;
                        pending_mints::delete(&conn, pending.request_id)?;
                        abandoned += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        token_id = pending.token_id,
                        error = %e,
                        "owner read failed, retrying next cycle"
                    );
                }
            }
        }
        Ok((recovered, abandoned))
    }

    /// Interval loop until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("pending mint reconciler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        log_tick_error("pending_mint_reconciler", &e);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("pending mint reconciler stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ListenerConfig;
    use crate::Db;
    use velvet_chain::mock::MockChain;
    use velvet_db::queries::{nfts, sales};
    use velvet_timereward::TimeRewardTracker;
    use velvet_txqueue::{AdminTxQueue, QueueConfig};
    use velvet_types::event::Event;
    use velvet_types::{Address, IssuanceEvent, ManualClock};

    fn setup(chain: MockChain, clock: ManualClock) -> (Arc<EventListener>, Db) {
        let conn = velvet_db::open_memory().expect("open db");
        let db: Db = Arc::new(tokio::sync::Mutex::new(conn));
        let (bus, _rx) = broadcast::channel::<Event>(64);
        let queue = AdminTxQueue::new(
            Arc::new(chain.clone()),
            Some(Address::new("0xadmin")),
            QueueConfig {
                inter_tx_delay: std::time::Duration::from_millis(1),
                confirm_poll_interval: std::time::Duration::from_millis(1),
                confirm_timeout: std::time::Duration::from_secs(2),
            },
        );
        let listener = Arc::new(EventListener::new(
            db.clone(),
            Arc::new(chain),
            queue,
            TimeRewardTracker::new(1_000, 1_999),
            bus,
            Arc::new(clock),
            ListenerConfig::default(),
        ));
        (listener, db)
    }

    async fn seed_pending(listener: &EventListener, request_id: u64, token_id: u64, at: u64) {
        let conn = listener.db.lock().await;
        velvet_db::queries::pending_mints::insert(
            &conn,
            request_id,
            &Address::new("0xbuyer"),
            token_id,
            2_000,
            &velvet_types::TxHash::new("0xreq"),
            at,
        )
        .expect("pending");
    }

    #[tokio::test]
    async fn test_recovers_missed_completion_with_synthetic_sale() {
        let chain = MockChain::new();
        chain.set_owner(77, Address::new("0xbuyer"), 3);
        let clock = ManualClock::new(10_000);
        let (listener, db) = setup(chain, clock);
        seed_pending(&listener, 9, 77, 9_000).await;

        let reconciler =
            PendingMintReconciler::new(listener.clone(), ReconcilerConfig::default());
        let (recovered, abandoned) = reconciler.tick().await.expect("tick");
        assert_eq!((recovered, abandoned), (1, 0));

        let conn = db.lock().await;
        let nft = nfts::get(&conn, 77).expect("get").expect("exists");
        assert_eq!(nft.hostess_index, 3, "tier from direct read");
        let sale_rows = sales::by_token(&conn, 77).expect("sales");
        assert_eq!(sale_rows.len(), 1);
        assert!(sale_rows[0].synthetic);
        assert_eq!(pending_mints::count(&conn).expect("count"), 0);
    }

    #[tokio::test]
    async fn test_young_pending_left_alone() {
        let chain = MockChain::new();
        let clock = ManualClock::new(10_000);
        let (listener, db) = setup(chain, clock);
        seed_pending(&listener, 9, 77, 9_970).await;

        let reconciler =
            PendingMintReconciler::new(listener.clone(), ReconcilerConfig::default());
        let (recovered, abandoned) = reconciler.tick().await.expect("tick");
        assert_eq!((recovered, abandoned), (0, 0));
        let conn = db.lock().await;
        assert_eq!(pending_mints::count(&conn).expect("count"), 1);
    }

    #[tokio::test]
    async fn test_abandons_unresolvable_exactly_once() {
        let chain = MockChain::new();
        let clock = ManualClock::new(10_000);
        let (listener, db) = setup(chain, clock);
        // Older than the 5-minute abandon threshold, token never minted.
        seed_pending(&listener, 9, 77, 9_000).await;

        let reconciler =
            PendingMintReconciler::new(listener.clone(), ReconcilerConfig::default());
        let (_, abandoned) = reconciler.tick().await.expect("first tick");
        assert_eq!(abandoned, 1);

        let (_, abandoned_again) = reconciler.tick().await.expect("second tick");
        assert_eq!(abandoned_again, 0, "abandonment happens exactly once");

        let conn = db.lock().await;
        assert_eq!(pending_mints::count(&conn).expect("count"), 0);
    }

    #[tokio::test]
    async fn test_later_real_event_upgrades_synthetic() {
        // Recovery inserted a synthetic sale; the real event then
        // arrives late and must upgrade rather than duplicate.
        let chain = MockChain::new();
        chain.set_owner(77, Address::new("0xbuyer"), 3);
        let clock = ManualClock::new(10_000);
        let (listener, db) = setup(chain.clone(), clock);
        seed_pending(&listener, 9, 77, 9_000).await;

        let reconciler =
            PendingMintReconciler::new(listener.clone(), ReconcilerConfig::default());
        reconciler.tick().await.expect("recover");

        chain.push_issuance_event(
            20,
            IssuanceEvent::MintCompleted {
                request_id: 9,
                token_id: 77,
                owner: Address::new("0xbuyer"),
                hostess_index: 3,
                price_wei: 2_000,
                affiliate_tier1: Address::zero(),
                affiliate_tier2: Address::zero(),
                tx_hash: velvet_types::TxHash::new("0xreal77"),
                block_number: 20,
                timestamp: 9_100,
            },
        );
        listener.tick().await.expect("listener tick");

        let conn = db.lock().await;
        let sale_rows = sales::by_token(&conn, 77).expect("sales");
        assert_eq!(sale_rows.len(), 1, "upgraded, not duplicated");
        assert!(!sale_rows[0].synthetic);
        assert_eq!(sale_rows[0].tx_hash, velvet_types::TxHash::new("0xreal77"));
    }
}
