//! Owner synchronization service.
//!
//! Two interleaved policies against the same store. The full pass
//! walks every token id from 1 to the current supply in small batches
//! with a fixed inter-batch delay; a failed batch is logged and
//! skipped, never fatal to the pass. The incremental pass only
//! inspects tokens minted since the last synced id. Both funnel into
//! the same idempotent upsert, so they can run concurrently: the last
//! writer with the freshest read wins.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{sleep, MissedTickBehavior};
use velvet_chain::IssuanceChain;
use velvet_db::queries::{nfts, stats};
use velvet_types::{Clock, TokenId};

use crate::{log_tick_error, Db, Result};

/// Owner sync timing configuration.
#[derive(Clone, Debug)]
pub struct OwnerSyncConfig {
    /// Coarse full-collection reconciliation interval.
    pub full_interval: std::time::Duration,
    /// Fine interval for catching newly minted tokens.
    pub incremental_interval: std::time::Duration,
    /// Tokens per batched read.
    pub batch_size: usize,
    /// Rate-limiting delay between batches.
    pub batch_delay: std::time::Duration,
}

impl Default for OwnerSyncConfig {
    fn default() -> Self {
        Self {
            full_interval: std::time::Duration::from_secs(300),
            incremental_interval: std::time::Duration::from_secs(30),
            batch_size: 20,
            batch_delay: std::time::Duration::from_millis(200),
        }
    }
}

/// Outcome of one full pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OwnerSyncReport {
    pub synced: usize,
    pub failed_reads: usize,
    pub failed_batches: usize,
}

/// Periodic reconciliation of every token's true owner.
pub struct OwnerSyncService {
    db: Db,
    chain: Arc<dyn IssuanceChain>,
    clock: Arc<dyn Clock>,
    config: OwnerSyncConfig,
}

impl OwnerSyncService {
    pub fn new(
        db: Db,
        chain: Arc<dyn IssuanceChain>,
        clock: Arc<dyn Clock>,
        config: OwnerSyncConfig,
    ) -> Self {
        Self {
            db,
            chain,
            clock,
            config,
        }
    }

    /// Reconcile every token from 1 to the current supply, then
    /// recompute tier counts from the authoritative table.
    pub async fn full_pass(&self) -> Result<OwnerSyncReport> {
        let supply = self.chain.total_supply().await?;
        let mut report = OwnerSyncReport::default();
        if supply > 0 {
            report = self.sync_range(1, supply).await?;
        }

        let now = self.clock.now();
        {
            let conn = self.db.lock().await;
            let counts = nfts::count_by_tier(&conn)?;
            stats::update_tier_counts(&conn, &counts, now)?;
        }
        tracing::info!(
            supply,
            synced = report.synced,
            failed_reads = report.failed_reads,
            failed_batches = report.failed_batches,
            "owner full sync complete"
        );
        Ok(report)
    }

    /// Sync only the range minted since the highest tracked token id.
    pub async fn incremental_pass(&self) -> Result<usize> {
        let supply = self.chain.total_supply().await?;
        let highest = {
            let conn = self.db.lock().await;
            nfts::highest_token_id(&conn)?
        };
        if supply <= highest {
            return Ok(0);
        }

        let report = self.sync_range(highest + 1, supply).await?;
        tracing::debug!(
            from = highest + 1,
            to = supply,
            synced = report.synced,
            "owner incremental sync"
        );
        Ok(report.synced)
    }

    /// Batched, rate-limited read-and-upsert over an inclusive range.
    async fn sync_range(&self, from: TokenId, to: TokenId) -> Result<OwnerSyncReport> {
        let mut report = OwnerSyncReport::default();
        let ids: Vec<TokenId> = (from..=to).collect();

        for chunk in ids.chunks(self.config.batch_size) {
            match self.chain.batch_owners(chunk).await {
                Err(e) => {
                    report.failed_batches += 1;
                    if e.is_transient() {
                        tracing::debug!(error = %e, "owner batch read failed, skipping");
                    } else {
                        tracing::warn!(error = %e, "owner batch read failed, skipping");
                    }
                }
                Ok(reads) => {
                    let now = self.clock.now();
                    let conn = self.db.lock().await;
                    for read in reads {
                        match read.info {
                            Some(info) => {
                                nfts::upsert_owner(
                                    &conn,
                                    read.token_id,
                                    &info.owner,
                                    info.hostess_index,
                                    now,
                                )?;
                                report.synced += 1;
                            }
                            None => {
                                report.failed_reads += 1;
                                tracing::debug!(
                                    token_id = read.token_id,
                                    "owner read failed, skipping token"
                                );
                            }
                        }
                    }
                }
            }
            sleep(self.config.batch_delay).await;
        }
        Ok(report)
    }

    /// Both policies on their own timers until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut full_ticker = tokio::time::interval(self.config.full_interval);
        full_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut incremental_ticker = tokio::time::interval(self.config.incremental_interval);
        incremental_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("owner sync service started");
        loop {
            tokio::select! {
                _ = full_ticker.tick() => {
                    if let Err(e) = self.full_pass().await {
                        log_tick_error("owner_sync_full", &e);
                    }
                }
                _ = incremental_ticker.tick() => {
                    if let Err(e) = self.incremental_pass().await {
                        log_tick_error("owner_sync_incremental", &e);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("owner sync service stopping");
                    break;
                }
            }
        }
    }
}
