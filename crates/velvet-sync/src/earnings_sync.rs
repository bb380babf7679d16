//! Earnings synchronization service.
//!
//! Keeps the per-NFT earnings snapshots fresh without ever looping
//! over the collection on-chain: one ledger scan for the 24h window,
//! one multiplier-point total, then batched cumulative reads with the
//! proportional share computed locally. A pass can take longer than
//! its own interval under load, so a boolean re-entrancy flag skips
//! overlapping passes instead of queueing them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::{sleep, MissedTickBehavior};
use velvet_chain::{EarningsRead, RewardsChain};
use velvet_db::queries::{earnings as earnings_q, nfts, rewards, sales, stats};
use velvet_types::event::{Event, EventType};
use velvet_types::tier::TIER_MULTIPLIERS;
use velvet_types::{Clock, TokenId, Wei, REWARD_WINDOW_SECS};

use crate::earnings::{apy_basis_points, share_of_window, total_points};
use crate::oracle::PriceOracle;
use crate::{emit, log_tick_error, Db, Result};

/// Earnings sync timing configuration.
#[derive(Clone, Debug)]
pub struct EarningsSyncConfig {
    pub interval: std::time::Duration,
    /// Tokens per batched earnings read.
    pub batch_size: usize,
    /// Rate-limiting delay between batches.
    pub batch_delay: std::time::Duration,
}

impl Default for EarningsSyncConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
            batch_size: 100,
            batch_delay: std::time::Duration::from_millis(100),
        }
    }
}

/// Outcome of one completed pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct EarningsSyncReport {
    pub nfts_synced: usize,
    pub global24h: Wei,
    pub corrected: bool,
    pub failed_batches: usize,
}

/// The earnings synchronization service.
pub struct EarningsSyncService {
    db: Db,
    chain: Arc<dyn RewardsChain>,
    oracle: Arc<dyn PriceOracle>,
    bus: broadcast::Sender<Event>,
    clock: Arc<dyn Clock>,
    config: EarningsSyncConfig,
    running: AtomicBool,
}

impl EarningsSyncService {
    pub fn new(
        db: Db,
        chain: Arc<dyn RewardsChain>,
        oracle: Arc<dyn PriceOracle>,
        bus: broadcast::Sender<Event>,
        clock: Arc<dyn Clock>,
        config: EarningsSyncConfig,
    ) -> Self {
        Self {
            db,
            chain,
            oracle,
            bus,
            clock,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Run one pass unless the previous pass is still running, in
    /// which case the whole pass is skipped (`Ok(None)`).
    pub async fn sync_pass(&self) -> Result<Option<EarningsSyncReport>> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("previous earnings pass still running, skipping");
            return Ok(None);
        }
        let result = self.sync_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn sync_inner(&self) -> Result<EarningsSyncReport> {
        let now = self.clock.now();
        let cutoff = now.saturating_sub(REWARD_WINDOW_SECS);

        let (global24h, tokens) = {
            let conn = self.db.lock().await;
            (
                rewards::sum_since(&conn, cutoff)?,
                nfts::all_tokens_with_tier(&conn)?,
            )
        };
        let points = total_points(tokens.iter().map(|(_, tier)| *tier));
        let nft_value = self.oracle.nft_value_wei();

        let mut report = EarningsSyncReport {
            global24h,
            ..EarningsSyncReport::default()
        };

        for chunk in tokens.chunks(self.config.batch_size) {
            let ids: Vec<TokenId> = chunk.iter().map(|(id, _)| *id).collect();
            match self.chain.batch_earnings(&ids).await {
                Err(e) => {
                    report.failed_batches += 1;
                    if e.is_transient() {
                        tracing::debug!(error = %e, "earnings batch read failed, skipping");
                    } else {
                        tracing::warn!(error = %e, "earnings batch read failed, skipping");
                    }
                }
                Ok(reads) => {
                    let read_map: HashMap<TokenId, EarningsRead> =
                        reads.into_iter().map(|r| (r.token_id, r)).collect();
                    let conn = self.db.lock().await;
                    for (token_id, tier) in chunk {
                        let Some(read) = read_map.get(token_id) else {
                            continue;
                        };
                        let multiplier = tier_multiplier(*tier);
                        let share = share_of_window(global24h, multiplier, points);
                        let apy = apy_basis_points(share, nft_value);
                        earnings_q::upsert(
                            &conn,
                            *token_id,
                            read.total_earned_wei,
                            read.pending_wei,
                            share,
                            apy,
                            now,
                        )?;
                        report.nfts_synced += 1;
                    }
                }
            }
            sleep(self.config.batch_delay).await;
        }

        // New deposits may have arrived while the batches ran; one
        // cheap bulk correction per tier brings every snapshot to the
        // same window before finalizing.
        let global_after = {
            let conn = self.db.lock().await;
            rewards::sum_since(&conn, cutoff)?
        };
        if global_after != global24h {
            tracing::info!(
                before = %global24h,
                after = %global_after,
                "24h window changed mid-pass, applying tier correction"
            );
            report.corrected = true;
            report.global24h = global_after;
            let conn = self.db.lock().await;
            for tier in 0..TIER_MULTIPLIERS.len() as u8 {
                let share = share_of_window(global_after, tier_multiplier(tier), points);
                let apy = apy_basis_points(share, nft_value);
                earnings_q::correct_tier(&conn, tier, share, apy, now)?;
            }
        }

        self.refresh_aggregates(report.global24h, points, now).await?;

        emit(
            &self.bus,
            EventType::EarningsSynced,
            now,
            json!({
                "global24h_wei": report.global24h.to_string(),
                "nfts_synced": report.nfts_synced,
            }),
        );
        tracing::info!(
            nfts = report.nfts_synced,
            global24h = %report.global24h,
            corrected = report.corrected,
            "earnings sync complete"
        );
        Ok(report)
    }

    /// Recompute the global and per-tier aggregate caches.
    async fn refresh_aggregates(&self, global24h: Wei, points: u64, now: u64) -> Result<()> {
        let conn = self.db.lock().await;
        let counts = nfts::count_by_tier(&conn)?;
        let total_rewards = rewards::total(&conn)?;
        let total_sales = sales::total_sales_wei(&conn)?;
        let nft_count = nfts::count(&conn)?;
        stats::update_global(&conn, total_rewards, global24h, nft_count, total_sales, now)?;

        let earned_by_tier = earnings_q::sum_total_by_tier(&conn)?;
        for tier in 0..TIER_MULTIPLIERS.len() as u8 {
            let per_nft = share_of_window(global24h, tier_multiplier(tier), points);
            let tier_24h = per_nft * Wei::from(counts[tier as usize]);
            stats::update_tier(
                &conn,
                tier,
                counts[tier as usize],
                tier_24h,
                earned_by_tier[tier as usize],
                now,
            )?;
        }
        Ok(())
    }

    /// Interval loop until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("earnings sync service started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_pass().await {
                        log_tick_error("earnings_sync", &e);
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("earnings sync service stopping");
                    break;
                }
            }
        }
    }
}

fn tier_multiplier(tier: u8) -> u64 {
    TIER_MULTIPLIERS.get(tier as usize).copied().unwrap_or(0)
}
